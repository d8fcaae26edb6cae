//! Dotenv payload parser.
//!
//! Accepted syntax, one assignment per line:
//!
//! ```text
//! # comment
//! export KEY=value        # trailing comment
//! QUOTED="line one\nline two"
//! LITERAL='no # comment here'
//! MULTI="spans
//! several lines"
//! ```
//!
//! A key assigned twice keeps its first position and takes the last value.
//! Assignments with an empty key are skipped.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::types::Snapshot;

/// Parse a dotenv payload into a [`Snapshot`] with ids `"1"`, `"2"`, … in
/// first-appearance order.
pub fn parse(text: &str) -> Result<Snapshot, ParseError> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    let mut lines = text.lines().enumerate();
    while let Some((idx, raw)) = lines.next() {
        let line_no = idx + 1;
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line
            .strip_prefix("export ")
            .map(str::trim_start)
            .unwrap_or(line);
        let Some((key, rest)) = line.split_once('=') else {
            return Err(ParseError::NotAnAssignment { line: line_no });
        };
        let key = key.trim();
        if !key.is_empty() && !is_valid_key(key) {
            return Err(ParseError::NotAnAssignment { line: line_no });
        }

        let rest = rest.trim_start();
        let value = match rest.chars().next() {
            Some(quote @ ('"' | '\'' | '`')) => {
                read_quoted(quote, &rest[1..], &mut lines, line_no, key)?
            }
            _ => unquoted(rest).to_string(),
        };

        if key.is_empty() {
            continue;
        }

        match positions.get(key) {
            Some(&pos) => entries[pos].1 = value,
            None => {
                positions.insert(key.to_string(), entries.len());
                entries.push((key.to_string(), value));
            }
        }
    }

    Ok(Snapshot::from_pairs(entries))
}

fn is_valid_key(key: &str) -> bool {
    key.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn unquoted(rest: &str) -> &str {
    match rest.find('#') {
        Some(idx) => rest[..idx].trim(),
        None => rest.trim(),
    }
}

/// Read a quoted value starting just after the opening quote, pulling more
/// lines from `lines` until the closing quote is found.
fn read_quoted<'a, I>(
    quote: char,
    first: &'a str,
    lines: &mut I,
    line_no: usize,
    key: &str,
) -> Result<String, ParseError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut value = String::new();
    let mut segment = first;
    loop {
        if let Some(end) = closing_quote(segment, quote) {
            value.push_str(&segment[..end]);
            break;
        }
        value.push_str(segment);
        match lines.next() {
            Some((_, next)) => {
                value.push('\n');
                segment = next;
            }
            None => {
                return Err(ParseError::UnterminatedQuote {
                    line: line_no,
                    key: key.to_string(),
                    quote,
                })
            }
        }
    }

    if quote == '"' {
        value = value.replace("\\n", "\n").replace("\\r", "\r");
    }
    Ok(value)
}

/// Single quotes and backticks are literal; only double quotes honour `\`.
fn closing_quote(segment: &str, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in segment.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quote == '"' => escaped = true,
            c if c == quote => return Some(idx),
            _ => {}
        }
    }
    None
}
