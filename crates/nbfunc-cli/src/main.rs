//! nbfunc CLI - turn Jupyter notebooks into nuclio functions.

mod build;
mod colors;
mod directives;
mod export;
mod show;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use nbfunc_core::ExportSettings;

#[derive(Parser)]
#[command(name = "nbfunc")]
#[command(about = "Turn Jupyter notebooks into nuclio serverless functions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Scan options shared by the notebook commands; override `NUCLIO_*` variables.
#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Emit only the code between `start-code NAME` and `end-code NAME`
    #[arg(long)]
    target: Option<String>,

    /// Handler function name (fixes `spec.handler`)
    #[arg(long)]
    handler_name: Option<String>,

    /// Skip cells carrying this tag (repeatable)
    #[arg(long = "ignore-tag")]
    ignore_tags: Vec<String>,

    /// Apply this env file at the end of the export (repeatable)
    #[arg(long = "env-file")]
    env_files: Vec<PathBuf>,
}

impl ScanArgs {
    fn settings(self) -> anyhow::Result<ExportSettings> {
        let mut settings = ExportSettings::from_env()?;
        if self.target.is_some() {
            settings.target = self.target;
        }
        if self.handler_name.is_some() {
            settings.handler_name = self.handler_name;
        }
        settings.ignored_tags.extend(self.ignore_tags);
        settings.env_files.extend(self.env_files);
        Ok(settings)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export a notebook to function.yaml
    Export {
        /// Path to the notebook (.ipynb file)
        notebook: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Write the handler next to function.yaml instead of embedding it
        #[arg(long)]
        no_embed: bool,

        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Build a function from a notebook, code file or function.yaml
    Build {
        /// Source file (.ipynb, .py, .go, .js, .java, .sh or .yaml)
        source: String,

        /// Function name (default: file name)
        #[arg(long)]
        name: Option<String>,

        /// Handler function name
        #[arg(long)]
        handler: Option<String>,

        /// Value of the nuclio.io/tag label
        #[arg(long)]
        tag: Option<String>,

        /// Project name label
        #[arg(long)]
        project: Option<String>,

        /// Write function.yaml, code and extra files here instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Environment variable KEY=VALUE (repeatable)
        #[arg(short, long = "env")]
        env: Vec<String>,

        /// Configuration override path=value (repeatable)
        #[arg(short, long = "config")]
        config: Vec<String>,

        /// Build command (repeatable)
        #[arg(long = "cmd")]
        commands: Vec<String>,

        /// Extra file shipped with the function (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        /// Volume mount "[-t TYPE] [-n NAME] [-k KEY] [-r] MOUNT_PATH REMOTE" (repeatable)
        #[arg(long = "mount", allow_hyphen_values = true)]
        mounts: Vec<String>,

        /// Expose the function on this HTTP trigger port
        #[arg(long)]
        http_port: Option<u16>,

        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Print the handler code generated from a notebook
    Show {
        /// Path to the notebook (.ipynb file)
        notebook: String,

        /// Print function.yaml after the code
        #[arg(long)]
        config: bool,

        #[command(flatten)]
        scan: ScanArgs,
    },

    /// List the %nuclio directives, or describe one
    Directives {
        /// Directive name
        name: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format nbfunc-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<nbfunc_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Export {
            notebook,
            output,
            no_embed,
            scan,
        } => {
            let mut settings = scan.settings()?;
            settings.no_embed |= no_embed;
            export::execute(&notebook, &output, settings).map_err(format_error)?;
        }

        Commands::Build {
            source,
            name,
            handler,
            tag,
            project,
            output,
            env,
            config,
            commands,
            files,
            mounts,
            http_port,
            scan,
        } => {
            let request = build::BuildRequest {
                name,
                handler,
                tag,
                project,
                output,
                env,
                config,
                commands,
                files,
                mounts,
                http_port,
                settings: scan.settings()?,
            };
            build::execute(&source, request).map_err(format_error)?;
        }

        Commands::Show {
            notebook,
            config,
            scan,
        } => {
            show::execute(&notebook, config, scan.settings()?).map_err(format_error)?;
        }

        Commands::Directives { name } => {
            directives::execute(name.as_deref()).map_err(format_error)?;
        }
    }

    Ok(())
}
