//! End-to-end notebook export through files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use nbfunc_core::export::{EnvSource, ExportSettings, NotebookExporter, strip_header};
use nbfunc_core::{Error, ToolRequestKind};
use nbfunc_ipynb::{JupyterCell, JupyterNotebook};
use serde_json::json;
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

fn write_notebook(dir: &Path, name: &str, cells: Vec<JupyterCell>) -> PathBuf {
    let path = dir.join(name);
    JupyterNotebook::from_cells(cells)
        .write_to_file(&path)
        .expect("Failed to write notebook");
    path
}

fn exporter(settings: ExportSettings) -> NotebookExporter {
    NotebookExporter::new(settings).with_env(EnvSource::fixed([
        ("V3IO_USERNAME", "admin"),
        ("V3IO_ACCESS_KEY", "key"),
    ]))
}

#[test]
fn test_full_notebook() {
    let temp = temp_dir();
    let env_file = temp.path().join("prod.env");
    fs::write(&env_file, "# production\nDB_HOST=db.local\n").unwrap();

    let path = write_notebook(
        temp.path(),
        "Greeter_Function.ipynb",
        vec![
            JupyterCell::markdown("# Greeter"),
            JupyterCell::code("import os\n%matplotlib inline"),
            JupyterCell::code(format!(
                "%nuclio env_file {}\n%nuclio env GREETING=Hello",
                env_file.display()
            )),
            JupyterCell::code("%%nuclio cmd\npip install requests\n# comment\napk add curl"),
            JupyterCell::code("%nuclio config spec.build.baseImage = \"python:3.9\""),
            JupyterCell::code("%nuclio mount /data ~/datasets"),
            JupyterCell::code("test_event = {'body': 'x'}").with_tags(["nuclio-ignore"]),
            JupyterCell::code(
                "%%nuclio handler greet\nname = event.body\nos.environ['GREETING'] + ' ' + name",
            ),
            JupyterCell::code("greet(None, test_event)\n# nuclio: ignore"),
        ],
    );

    let export = exporter(ExportSettings::default())
        .export_file(&path)
        .unwrap();
    let config = &export.config;

    assert_eq!(config.name(), Some("greeter-function"));
    assert_eq!(config.handler(), ("handler".to_string(), "greet".to_string()));
    assert_eq!(config.env_value("DB_HOST"), Some("db.local"));
    assert_eq!(config.env_value("GREETING"), Some("Hello"));
    assert_eq!(config.build_commands(), ["pip install requests", "apk add curl"]);
    assert_eq!(config.get("spec.build.baseImage"), Some(&json!("python:3.9")));
    assert_eq!(
        config.get("spec.volumes").unwrap()[0]["volume"]["flexVolume"]["options"]["subPath"],
        "/admin/datasets"
    );

    let body = strip_header(&export.code);
    assert!(body.contains("import os\n"));
    assert!(body.contains("def greet(context, event):\n    name = event.body\n    return os.environ"));
    assert!(!body.contains("matplotlib"));
    assert!(!body.contains("test_event"));
    assert_eq!(config.embedded_source().unwrap().as_deref(), Some(export.code.as_str()));
}

#[test]
fn test_scenario_a() {
    let temp = temp_dir();
    let path = write_notebook(
        temp.path(),
        "a.ipynb",
        vec![
            JupyterCell::code("x = 1"),
            JupyterCell::code("%nuclio env USER=daffy"),
        ],
    );
    let export = exporter(ExportSettings::default())
        .export_file(&path)
        .unwrap();
    assert_eq!(
        export.config.get("spec.env"),
        Some(&json!([{"name": "USER", "value": "daffy"}]))
    );
    assert!(export.code.contains("x = 1"));
}

#[test]
fn test_scenario_b() {
    let temp = temp_dir();
    let path = write_notebook(
        temp.path(),
        "b.ipynb",
        vec![
            JupyterCell::code("a=1"),
            JupyterCell::code("# nuclio: start-code my-fn\nb=2"),
            JupyterCell::code("# nuclio: end-code my-fn\nc=3"),
            JupyterCell::code("d=4"),
        ],
    );
    let settings = ExportSettings::from_source(&EnvSource::fixed([(
        "NUCLIO_FUNCTION_NAME",
        "my-fn",
    )]))
    .unwrap();
    let export = exporter(settings).export_file(&path).unwrap();
    assert_eq!(export.body().trim(), "b=2");
}

#[test]
fn test_env_failure_aborts_export() {
    let temp = temp_dir();
    let path = write_notebook(
        temp.path(),
        "bad.ipynb",
        vec![JupyterCell::code("%nuclio env FOO")],
    );
    let err = exporter(ExportSettings::default())
        .export_file(&path)
        .unwrap_err();
    assert!(matches!(err, Error::EnvParse { .. }));
}

#[test]
fn test_duplicate_start_aborts_export() {
    let temp = temp_dir();
    let path = write_notebook(
        temp.path(),
        "dup.ipynb",
        vec![
            JupyterCell::code("# start-code\na=1"),
            JupyterCell::code("# start-code\nb=2"),
        ],
    );
    let err = exporter(ExportSettings::default())
        .export_file(&path)
        .unwrap_err();
    assert!(matches!(err, Error::State { .. }));
}

#[test]
fn test_missing_extra_file_aborts_export() {
    let temp = temp_dir();
    let missing = temp.path().join("weights.bin");
    let path = write_notebook(
        temp.path(),
        "add.ipynb",
        vec![JupyterCell::code(format!("%nuclio add {}", missing.display()))],
    );
    let err = exporter(ExportSettings::default())
        .export_file(&path)
        .unwrap_err();
    assert!(matches!(err, Error::MissingFile(p) if p == missing));
}

#[test]
fn test_missing_env_file_is_skipped() {
    let temp = temp_dir();
    let path = write_notebook(
        temp.path(),
        "env.ipynb",
        vec![
            JupyterCell::code("%nuclio env_file /no/such/file.env"),
            JupyterCell::code("%nuclio show"),
            JupyterCell::code("x = 1"),
        ],
    );
    let export = exporter(ExportSettings::default())
        .export_file(&path)
        .unwrap();
    assert_eq!(export.config.env_entries().count(), 0);
    assert_eq!(export.requests[0].kind, ToolRequestKind::Show);
    assert_eq!(export.body().trim(), "x = 1");
}

#[test]
fn test_env_overlay_feeds_expansion() {
    let temp = temp_dir();
    let path = write_notebook(
        temp.path(),
        "overlay.ipynb",
        vec![
            JupyterCell::code("%nuclio env -l VERSION=1.2"),
            JupyterCell::code("%nuclio cmd pip install mylib==$VERSION"),
            JupyterCell::code("%nuclio config metadata.labels.version = \"${VERSION}\""),
        ],
    );
    let export = exporter(ExportSettings::default())
        .export_file(&path)
        .unwrap();
    assert_eq!(export.config.env_entries().count(), 0);
    assert_eq!(export.config.build_commands(), ["pip install mylib==1.2"]);
    assert_eq!(
        export.config.get("metadata.labels.version"),
        Some(&json!("1.2"))
    );
}
