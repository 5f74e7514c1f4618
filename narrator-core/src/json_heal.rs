//! Best-effort recovery of JSON from model output.
//!
//! Models wrap JSON in markdown fences, chat around it, truncate it, or write
//! it the way Python or JavaScript would print it. [`repair`] rewrites such text
//! into strict JSON; [`parse_with_healing`] and [`try_parse_with_healing`] go on
//! to deserialize the result.
//!
//! Valid JSON is returned unchanged (after trimming), and the output of
//! [`repair`] is always valid JSON, so `repair(repair(x)) == repair(x)`.
//! Nesting deeper than 127 levels is beyond what `serde_json` parses and is
//! reported as [`HealError::Unrepairable`].

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum nesting of objects and arrays the repairer will follow. Matches
/// the deepest document `serde_json` accepts.
const MAX_DEPTH: usize = 127;

const FENCE: &str = "```";

/// Errors from healing.
#[derive(Debug, Error)]
pub enum HealError {
    #[error("Input is empty")]
    Empty,

    #[error("Could not repair JSON: {0}")]
    Unrepairable(String),

    #[error("Repaired JSON does not match the expected shape: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Repair `text` and deserialize it into `T`.
pub fn parse_with_healing<T: DeserializeOwned>(text: &str) -> Result<T, HealError> {
    let repaired = repair(text)?;
    Ok(serde_json::from_str(&repaired)?)
}

/// Like [`parse_with_healing`], but any failure yields `None`.
pub fn try_parse_with_healing<T: DeserializeOwned>(text: &str) -> Option<T> {
    match parse_with_healing(text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "healing failed");
            None
        }
    }
}

/// Rewrite `text` into strict JSON.
pub fn repair(text: &str) -> Result<String, HealError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(HealError::Empty);
    }

    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    let body = strip_fences(trimmed);
    let start = body
        .find(['{', '['])
        .ok_or_else(|| HealError::Unrepairable("no object or array found".to_string()))?;

    let mut repairer = Repairer::new(&body[start..]);
    repairer.value(0)?;
    let out = repairer.out;

    serde_json::from_str::<serde_json::Value>(&out)
        .map_err(|e| HealError::Unrepairable(format!("{e}: {out}")))?;

    Ok(out)
}

/// Pull the JSON-bearing part out of markdown fences.
fn strip_fences(text: &str) -> &str {
    let fences: Vec<usize> = text.match_indices(FENCE).map(|(i, _)| i).collect();
    match fences.as_slice() {
        [] => text,
        [only] => {
            let before = &text[..*only];
            if before.contains(['{', '[']) {
                before
            } else {
                &text[only + FENCE.len()..]
            }
        }
        [open, close, ..] => &text[open + FENCE.len()..*close],
    }
}

/// Lenient recursive-descent rewriter. Reads loose JSON and writes strict JSON.
struct Repairer {
    chars: Vec<char>,
    pos: usize,
    out: String,
}

impl Repairer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            out: String::with_capacity(text.len()),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_comment(&self) -> bool {
        self.peek() == Some('/') && matches!(self.peek_at(1), Some('/') | Some('*'))
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            if !self.at_comment() {
                return;
            }
            if self.peek_at(1) == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else {
                self.pos += 2;
                while self.pos < self.chars.len()
                    && !(self.peek() == Some('*') && self.peek_at(1) == Some('/'))
                {
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.chars.len());
            }
        }
    }

    fn skip_separators(&mut self) {
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(',') | Some(';') => self.pos += 1,
                _ => return,
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<(), HealError> {
        self.skip_trivia();
        match self.peek() {
            None => self.out.push_str("null"),
            Some('{') => self.object(depth + 1)?,
            Some('[') => self.array(depth + 1)?,
            Some(c) if is_open_quote(c) => {
                let s = self.string();
                self.write_string(&s);
            }
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(_) => self.bare_value(),
        }
        Ok(())
    }

    fn object(&mut self, depth: usize) -> Result<(), HealError> {
        if depth > MAX_DEPTH {
            return Err(HealError::Unrepairable("nesting too deep".to_string()));
        }
        self.pos += 1;
        self.out.push('{');
        let mut first = true;

        loop {
            self.skip_separators();
            let key = match self.peek() {
                None | Some(']') => break,
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(':') => {
                    self.pos += 1;
                    continue;
                }
                Some(c) if is_open_quote(c) => self.string(),
                Some(_) => match self.bare_key() {
                    Some(key) => key,
                    None => {
                        self.pos += 1;
                        continue;
                    }
                },
            };

            if !first {
                self.out.push(',');
            }
            first = false;
            self.write_string(&key);
            self.out.push(':');

            self.skip_trivia();
            if matches!(self.peek(), Some(':') | Some('=')) {
                self.pos += 1;
            }
            self.skip_trivia();
            match self.peek() {
                None | Some(',') | Some('}') | Some(']') => self.out.push_str("null"),
                _ => self.value(depth)?,
            }
        }

        self.out.push('}');
        Ok(())
    }

    fn array(&mut self, depth: usize) -> Result<(), HealError> {
        if depth > MAX_DEPTH {
            return Err(HealError::Unrepairable("nesting too deep".to_string()));
        }
        self.pos += 1;
        self.out.push('[');
        let mut first = true;

        loop {
            self.skip_separators();
            match self.peek() {
                None | Some('}') => break,
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    if !first {
                        self.out.push(',');
                    }
                    first = false;
                    self.value(depth)?;
                }
            }
        }

        self.out.push(']');
        Ok(())
    }

    /// Read a quoted string starting at the opening quote.
    ///
    /// A closing quote only ends the string when what follows looks like
    /// structure; otherwise it is kept as an embedded quote. Truncation ends
    /// the string.
    fn string(&mut self) -> String {
        let open = self.chars[self.pos];
        self.pos += 1;
        let mut s = String::new();

        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\\' {
                self.escape(&mut s);
            } else if is_close_quote(open, c) && self.quote_ends_here() {
                return s;
            } else {
                s.push(c);
            }
        }
        s
    }

    fn quote_ends_here(&self) -> bool {
        let i = self.skip_whitespace_from(self.pos);
        let Some(&c) = self.chars.get(i) else {
            return true;
        };
        if self.chars[self.pos..i].contains(&'\n') {
            return true;
        }
        match c {
            ',' | '}' | ']' | ':' | '/' => true,
            '"' => self.key_follows(i),
            _ => false,
        }
    }

    /// Whether the quoted token opening at `quote` reads as an object key,
    /// as when a comma between two pairs is missing. Truncation counts.
    fn key_follows(&self, quote: usize) -> bool {
        let mut i = quote + 1;
        while let Some(&c) = self.chars.get(i) {
            match c {
                '\\' => i += 2,
                '"' => {
                    let after = self.skip_whitespace_from(i + 1);
                    return matches!(self.chars.get(after), None | Some(':'));
                }
                _ => i += 1,
            }
        }
        true
    }

    fn skip_whitespace_from(&self, mut i: usize) -> usize {
        while self.chars.get(i).is_some_and(|c| c.is_whitespace()) {
            i += 1;
        }
        i
    }

    fn escape(&mut self, s: &mut String) {
        let Some(c) = self.peek() else { return };
        self.pos += 1;
        match c {
            'n' => s.push('\n'),
            't' => s.push('\t'),
            'r' => s.push('\r'),
            'b' => s.push('\u{8}'),
            'f' => s.push('\u{c}'),
            'u' => {
                let high = self.hex4();
                let ch = match high {
                    Some(h @ 0xD800..=0xDBFF)
                        if self.peek() == Some('\\') && self.peek_at(1) == Some('u') =>
                    {
                        self.pos += 2;
                        match self.hex4() {
                            Some(l @ 0xDC00..=0xDFFF) => {
                                char::from_u32(0x10000 + ((h - 0xD800) << 10) + (l - 0xDC00))
                            }
                            _ => None,
                        }
                    }
                    Some(code) => char::from_u32(code),
                    None => None,
                };
                s.push(ch.unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => s.push(other),
        }
    }

    fn hex4(&mut self) -> Option<u32> {
        let end = (self.pos + 4).min(self.chars.len());
        let digits: String = self.chars[self.pos..end].iter().collect();
        let code = u32::from_str_radix(&digits, 16).ok().filter(|_| digits.len() == 4)?;
        self.pos = end;
        Some(code)
    }

    fn bare_key(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ':' | ',' | '{' | '}' | '[' | ']' | '=') {
                break;
            }
            self.pos += 1;
        }
        (self.pos > start).then(|| self.chars[start..self.pos].iter().collect())
    }

    fn number(&mut self) {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            self.pos = start;
            return self.bare_value();
        }

        let token: String = self.chars[start..self.pos].iter().collect();
        if serde_json::from_str::<serde_json::Value>(&token).is_ok_and(|v| v.is_number()) {
            self.out.push_str(&token);
        } else if let Ok(n) = token.trim_start_matches('+').parse::<i64>() {
            self.out.push_str(&n.to_string());
        } else if let Some(n) = token
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            self.out.push_str(&n.to_string());
        } else {
            self.out.push_str("null");
        }
    }

    /// An unquoted value: a literal from another language, or a bare word.
    fn bare_value(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '}' | ']' | '\n') || self.at_comment() {
                break;
            }
            self.pos += 1;
        }

        let word: String = self.chars[start..self.pos].iter().collect();
        let word = word.trim();
        if word.is_empty() {
            self.pos += 1;
            self.out.push_str("null");
            return;
        }

        match word {
            "true" | "True" | "TRUE" => self.out.push_str("true"),
            "false" | "False" | "FALSE" => self.out.push_str("false"),
            "null" | "None" | "NULL" | "nil" | "undefined" | "NaN" | "Infinity" | "-Infinity" => {
                self.out.push_str("null")
            }
            _ => self.write_string(word),
        }
    }

    fn write_string(&mut self, s: &str) {
        match serde_json::to_string(s) {
            Ok(quoted) => self.out.push_str(&quoted),
            Err(_) => self.out.push_str("\"\""),
        }
    }
}

fn is_open_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{201C}' | '\u{2018}')
}

fn is_close_quote(open: char, c: char) -> bool {
    match open {
        '\u{201C}' => matches!(c, '\u{201D}' | '"'),
        '\u{2018}' => matches!(c, '\u{2019}' | '\''),
        _ => c == open,
    }
}
