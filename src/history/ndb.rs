//! Attribute/value record files in the style of Plan 9 ndb.
//!
//! A record starts on a line whose first character is not blank and runs on
//! through any following lines that begin with a space or tab. Each record is a
//! sequence of `attr` or `attr=value` tuples. Values may be bare, double-quoted
//! with backslash escapes, or single-quoted (`''` stands for one quote). Blank
//! lines and lines starting with `#` are skipped.
//!
//! [`Record`]'s `Display` always produces a single physical line, so appending
//! one record never splits across lines.

use std::fmt::{self, Write as _};
use std::io::{self, BufRead};
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: &'static str },
    #[error("reading records")]
    Io(#[from] io::Error),
}

fn syntax(line: usize, reason: &'static str) -> RecordError {
    RecordError::Syntax { line, reason }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub attr: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    tuples: Vec<Tuple>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attr: impl Into<String>, value: impl Into<String>) -> Self {
        self.tuples.push(Tuple {
            attr: attr.into(),
            value: value.into(),
        });
        self
    }

    #[cfg(test)]
    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    /// Last value recorded for `attr`.
    pub fn get(&self, attr: &str) -> Option<&str> {
        self.tuples
            .iter()
            .rev()
            .find(|tuple| tuple.attr == attr)
            .map(|tuple| tuple.value.as_str())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, tuple) in self.tuples.iter().enumerate() {
            if idx > 0 {
                f.write_char(' ')?;
            }
            f.write_str(&tuple.attr)?;
            if !tuple.value.is_empty() {
                write!(f, "={}", quote(&tuple.value))?;
            }
        }
        Ok(())
    }
}

pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub struct RecordReader<R> {
    lines: io::Lines<R>,
    line_no: usize,
    pending: Option<Record>,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            pending: None,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                None => {
                    self.done = true;
                    return self.pending.take().map(Ok);
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                Some(Ok(line)) => line,
            };
            self.line_no += 1;

            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let tuples = match parse_tuples(&line, self.line_no) {
                Ok(tuples) => tuples,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };

            if line.starts_with([' ', '\t']) {
                self.pending
                    .get_or_insert_with(Record::new)
                    .tuples
                    .extend(tuples);
                continue;
            }

            if let Some(previous) = self.pending.replace(Record { tuples }) {
                return Some(Ok(previous));
            }
        }
    }
}

fn parse_tuples(text: &str, line: usize) -> Result<Vec<Tuple>, RecordError> {
    let mut chars = text.chars().peekable();
    let mut tuples = Vec::new();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut attr = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            if c == '"' || c == '\'' {
                return Err(syntax(line, "quote in attribute name"));
            }
            attr.push(c);
        }
        if attr.is_empty() {
            return Err(syntax(line, "missing attribute name"));
        }

        let value = if chars.next_if_eq(&'=').is_some() {
            match chars.peek() {
                Some('"') => {
                    chars.next();
                    let value = parse_double_quoted(&mut chars, line)?;
                    expect_separator(&mut chars, line)?;
                    value
                }
                Some('\'') => {
                    chars.next();
                    let value = parse_single_quoted(&mut chars, line)?;
                    expect_separator(&mut chars, line)?;
                    value
                }
                _ => {
                    let mut value = String::new();
                    while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                        value.push(c);
                    }
                    value
                }
            }
        } else {
            String::new()
        };

        tuples.push(Tuple { attr, value });
    }

    Ok(tuples)
}

fn expect_separator(chars: &mut Peekable<Chars<'_>>, line: usize) -> Result<(), RecordError> {
    match chars.peek() {
        Some(c) if !c.is_whitespace() => Err(syntax(line, "unexpected text after quoted value")),
        _ => Ok(()),
    }
}

fn parse_single_quoted(
    chars: &mut Peekable<Chars<'_>>,
    line: usize,
) -> Result<String, RecordError> {
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(syntax(line, "unterminated quoted value")),
            Some('\'') => {
                if chars.next_if_eq(&'\'').is_some() {
                    value.push('\'');
                } else {
                    return Ok(value);
                }
            }
            Some(c) => value.push(c),
        }
    }
}

fn parse_double_quoted(
    chars: &mut Peekable<Chars<'_>>,
    line: usize,
) -> Result<String, RecordError> {
    // \xNN and octal escapes are raw bytes, so decode into bytes and validate at the end.
    let mut bytes = Vec::new();
    loop {
        let c = chars
            .next()
            .ok_or_else(|| syntax(line, "unterminated quoted value"))?;
        match c {
            '"' => break,
            '\\' => {
                let escape = chars
                    .next()
                    .ok_or_else(|| syntax(line, "unterminated quoted value"))?;
                match escape {
                    'n' => bytes.push(b'\n'),
                    'r' => bytes.push(b'\r'),
                    't' => bytes.push(b'\t'),
                    'a' => bytes.push(0x07),
                    'b' => bytes.push(0x08),
                    'f' => bytes.push(0x0c),
                    'v' => bytes.push(0x0b),
                    '\\' => bytes.push(b'\\'),
                    '"' => bytes.push(b'"'),
                    '\'' => bytes.push(b'\''),
                    'x' => {
                        let value = read_digits(chars, 2, 16, line)?;
                        bytes.push(value as u8);
                    }
                    'u' => push_char(&mut bytes, read_digits(chars, 4, 16, line)?, line)?,
                    'U' => push_char(&mut bytes, read_digits(chars, 8, 16, line)?, line)?,
                    '0'..='7' => {
                        let rest = read_digits(chars, 2, 8, line)?;
                        let value = (escape as u32 - '0' as u32) * 64 + rest;
                        if value > 0xff {
                            return Err(syntax(line, "octal escape out of range"));
                        }
                        bytes.push(value as u8);
                    }
                    _ => return Err(syntax(line, "unknown escape sequence")),
                }
            }
            other => push_char(&mut bytes, other as u32, line)?,
        }
    }

    String::from_utf8(bytes).map_err(|_| syntax(line, "invalid UTF-8 in quoted value"))
}

fn read_digits(
    chars: &mut Peekable<Chars<'_>>,
    count: usize,
    radix: u32,
    line: usize,
) -> Result<u32, RecordError> {
    let mut value = 0u32;
    for _ in 0..count {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(radix))
            .ok_or_else(|| syntax(line, "malformed numeric escape"))?;
        value = value * radix + digit;
    }
    Ok(value)
}

fn push_char(bytes: &mut Vec<u8>, code: u32, line: usize) -> Result<(), RecordError> {
    let ch = char::from_u32(code).ok_or_else(|| syntax(line, "invalid unicode escape"))?;
    let mut buf = [0u8; 4];
    bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    Ok(())
}
