// src/services/literal.rs

//! Literal-syntax payload parser.
//!
//! The list endpoint does not answer with strict JSON: it prints a literal
//! expression with single-quoted strings, tuples and `True`/`False`/`None`.
//! This module turns such text into a [`serde_json::Value`] so that the rest
//! of the pipeline only deals with plain JSON values.
//!
//! Supported forms:
//!
//! ```text
//! {'key': value, 1: value}   mappings (string or integer keys)
//! [a, b] (a, b)              sequences and tuples, trailing commas allowed
//! 'text' "text" u'text'      strings with \\ \' \" \n \r \t \xHH \uXXXX escapes
//! -12 3.5 1e3                numbers
//! True False None            constants
//! ```

use serde_json::{Map, Number, Value};

use crate::error::{AppError, Result};

/// Deepest container nesting accepted before the payload is rejected.
const MAX_DEPTH: usize = 128;

/// Parse a literal-syntax document into a JSON value.
pub fn parse(input: &str) -> Result<Value> {
    let mut parser = Parser::new(input);
    let value = parser.value()?;
    parser.skip_ws();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected trailing '{c}'")));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        // Strip a UTF-8 byte order mark some upstream encoders emit.
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self { src, pos: 0, depth: 0 }
    }

    fn error(&self, message: impl Into<String>) -> AppError {
        AppError::decode(
            "literal payload",
            format!("{} at offset {}", message.into(), self.pos),
        )
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.nested(Self::mapping),
            Some('[') => self.nested(|p| p.sequence('[', ']')),
            Some('(') => self.nested(|p| p.sequence('(', ')')),
            Some('\'' | '"') => self.string().map(Value::String),
            Some('u' | 'U') if matches!(self.src[self.pos + 1..].chars().next(), Some('\'' | '"')) => {
                self.pos += 1;
                self.string().map(Value::String)
            }
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() => self.constant(),
            Some(c) => Err(self.error(format!("unexpected '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<Value>) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn mapping(&mut self) -> Result<Value> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                other => return Err(self.error(format!("unsupported mapping key {other}"))),
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => return Err(self.error(format!("expected ',' or '}}', found '{c}'"))),
                None => return Err(self.error("unterminated mapping")),
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.value()?);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(Value::Array(items)),
                Some(c) => {
                    return Err(self.error(format!("expected ',' or '{close}', found '{c}'")));
                }
                None => return Err(self.error("unterminated sequence")),
            }
        }
    }

    fn string(&mut self) -> Result<String> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<()> {
        match self.bump() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some('x') => out.push(self.hex_char(2)?),
            Some('u') => out.push(self.hex_char(4)?),
            Some('U') => out.push(self.hex_char(8)?),
            // Unknown escapes are kept verbatim.
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => return Err(self.error("unterminated escape")),
        }
        Ok(())
    }

    fn hex_char(&mut self, digits: usize) -> Result<char> {
        let end = self.pos + digits;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated escape"))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| self.error(format!("invalid escape digits '{hex}'")))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point {code:#x}")))
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let sign_after_exponent =
                (c == '-' || c == '+') && matches!(self.src[..self.pos].chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit()
                || c == '.'
                || c == 'e'
                || c == 'E'
                || c == '_'
                || sign_after_exponent
                || (self.pos == start && (c == '-' || c == '+'))
            {
                self.pos += 1;
            } else {
                break;
            }
        }

        let text = self.src[start..self.pos].replace('_', "");
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.error(format!("invalid number '{text}'")))
    }

    fn constant(&mut self) -> Result<Value> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        match &self.src[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            word => {
                self.pos = start;
                Err(self.error(format!("unknown name '{word}'")))
            }
        }
    }
}
