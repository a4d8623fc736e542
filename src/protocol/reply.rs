//! Module `reply`
//!
//! Parses FTP control-channel replies into structured `Reply` values.
//!
//! A reply is a three-digit code followed by either a space (single-line
//! reply) or a hyphen (multi-line reply). A multi-line reply ends at the
//! first line that starts with the same code followed by a space.

use std::fmt;

use crate::error::ReplyError;

/// Reply classification by the leading digit of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    Preliminary,
    Completion,
    Intermediate,
    TransientNegative,
    PermanentNegative,
}

/// A complete control-channel reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Message lines, with the code prefix stripped from the first and last line.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn first_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    /// All message lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn class(&self) -> ReplyClass {
        match self.code / 100 {
            1 => ReplyClass::Preliminary,
            2 => ReplyClass::Completion,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::TransientNegative,
            _ => ReplyClass::PermanentNegative,
        }
    }

    pub fn is_preliminary(&self) -> bool {
        self.class() == ReplyClass::Preliminary
    }

    pub fn is_completion(&self) -> bool {
        self.class() == ReplyClass::Completion
    }

    pub fn is_intermediate(&self) -> bool {
        self.class() == ReplyClass::Intermediate
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.first_line())
    }
}

struct MultiLine {
    code: u16,
    end_prefix: [u8; 4],
    lines: Vec<String>,
}

/// Incremental reply parser, fed one line at a time (delimiter already removed).
pub struct ReplyParser {
    max_lines: usize,
    multi: Option<MultiLine>,
}

impl ReplyParser {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            multi: None,
        }
    }

    /// Returns `Some(reply)` once the line completing a reply has been fed.
    pub fn feed_line(&mut self, line: &[u8]) -> Result<Option<Reply>, ReplyError> {
        let Some(mut multi) = self.multi.take() else {
            return self.feed_first_line(line);
        };

        if line.starts_with(&multi.end_prefix) {
            multi.lines.push(line_to_string(&line[4..])?);
            return Ok(Some(Reply::new(multi.code, multi.lines)));
        }

        if multi.lines.len() >= self.max_lines {
            return Err(ReplyError::TooManyLines(multi.code, self.max_lines));
        }
        // leading whitespace is meaningful in continuation lines
        multi.lines.push(line_to_string(line)?);
        self.multi = Some(multi);
        Ok(None)
    }

    fn feed_first_line(&mut self, line: &[u8]) -> Result<Option<Reply>, ReplyError> {
        let code = parse_code(line)?;
        match line.get(3) {
            None => Ok(Some(Reply::new(code, vec![String::new()]))),
            Some(b' ') => Ok(Some(Reply::new(code, vec![line_to_string(&line[4..])?]))),
            Some(b'-') => {
                self.multi = Some(MultiLine {
                    code,
                    end_prefix: [line[0], line[1], line[2], b' '],
                    lines: vec![line_to_string(&line[4..])?],
                });
                Ok(None)
            }
            Some(_) => Err(ReplyError::InvalidSeparator(
                String::from_utf8_lossy(line).into_owned(),
            )),
        }
    }

    /// Code of the multi-line reply still waiting for its terminating line.
    pub fn pending_code(&self) -> Option<u16> {
        self.multi.as_ref().map(|m| m.code)
    }
}

/// Parses one reply from the head of `lines`.
///
/// Returns the reply and how many input lines it consumed.
pub fn parse<S: AsRef<str>>(lines: &[S], max_lines: usize) -> Result<(Reply, usize), ReplyError> {
    let mut parser = ReplyParser::new(max_lines);
    for (i, line) in lines.iter().enumerate() {
        if let Some(reply) = parser.feed_line(trim_line_end(line.as_ref().as_bytes()))? {
            return Ok((reply, i + 1));
        }
    }
    match parser.pending_code() {
        Some(code) => Err(ReplyError::Unterminated(code)),
        None => Err(ReplyError::EmptyLine),
    }
}

/// Strips a trailing `\r\n` or `\n`.
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_code(line: &[u8]) -> Result<u16, ReplyError> {
    if line.is_empty() {
        return Err(ReplyError::EmptyLine);
    }
    let valid = line.len() >= 3
        && (b'1'..=b'5').contains(&line[0])
        && line[1].is_ascii_digit()
        && line[2].is_ascii_digit();
    if !valid {
        return Err(ReplyError::InvalidCode(
            String::from_utf8_lossy(line).into_owned(),
        ));
    }
    Ok(line[..3]
        .iter()
        .fold(0u16, |acc, c| acc * 10 + u16::from(c - b'0')))
}

fn line_to_string(line: &[u8]) -> Result<String, ReplyError> {
    std::str::from_utf8(line)
        .map(|s| s.trim_end().to_string())
        .map_err(|_| ReplyError::LineIsNotUtf8)
}
