//! Literal values accepted on the right-hand side of config assignments.
//!
//! Grammar:
//!
//! ```text
//! value  := number | string | bool | null | list | object
//! number := [+-]? digits ('.' digits)? ([eE] [+-]? digits)?
//! string := '...' | "..."          (\\ \' \" \n \r \t \0 \uXXXX escapes)
//! bool   := true | false | True | False
//! null   := null | None
//! list   := '[' (value (',' value)* ','?)? ']'
//! object := '{' (string ':' value (',' string ':' value)* ','?)? '}'
//! ```
//!
//! Tuples, sets, calls and bare words are rejected.

use serde_json::{Map, Number, Value};

/// Literal parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Parse a complete literal; trailing input is an error.
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser { text, pos: 0 };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < text.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct LiteralParser<'a> {
    text: &'a str,
    pos: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: &str) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        match self.bump() {
            Some(ch) if ch == want => Ok(()),
            _ => Err(self.error(&format!("expected {want:?}"))),
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            None => Err(self.error("expected a value")),
            Some('"') | Some('\'') => self.string().map(Value::String),
            Some('[') => self.list(),
            Some('{') => self.object(),
            Some('(') => Err(self.error("tuple syntax is not supported")),
            Some(ch) if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.') => self.number(),
            Some(ch) if ch.is_alphabetic() || ch == '_' => self.keyword(),
            Some(ch) => Err(self.error(&format!("unexpected character {ch:?}"))),
        }
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|ch| ch.is_alphanumeric() || ch == '_')
        {
            self.bump();
        }
        match &self.text[start..self.pos] {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            word => Err(LiteralError {
                offset: start,
                message: format!("{word:?} is not a literal (quote strings)"),
            }),
        }
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut is_float = false;
        let mut digits = 0;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => digits += 1,
                '.' if !is_float => is_float = true,
                'e' | 'E' if digits > 0 => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }
        let raw = &self.text[start..self.pos];
        if digits == 0 {
            return Err(LiteralError {
                offset: start,
                message: format!("bad number {raw:?}"),
            });
        }
        let raw = raw.trim_start_matches('+');

        if !is_float {
            if let Ok(n) = raw.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                offset: start,
                message: format!("bad number {raw:?}"),
            })
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or_else(|| self.error("expected a string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(ch) if ch == quote => return Ok(out),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('u') => self.unicode_escape()?,
                        Some(ch @ ('\\' | '\'' | '"')) => ch,
                        Some(ch) => {
                            // Unknown escapes stay literal.
                            out.push('\\');
                            ch
                        }
                        None => return Err(self.error("unterminated string")),
                    };
                    out.push(escaped);
                }
                Some(ch) => out.push(ch),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        let start = self.pos;
        let end = start + 4;
        let hex = self
            .text
            .get(start..end)
            .ok_or_else(|| self.error("short \\u escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("bad \\u escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("bad \\u escape"))
    }

    fn list(&mut self) -> Result<Value, LiteralError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn object(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }
            if !matches!(self.peek(), Some('"' | '\'')) {
                return Err(self.error("mapping keys must be quoted strings"));
            }
            let key = self.string()?;
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}
