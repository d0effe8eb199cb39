//! Label files written next to captures.
//!
//! One label per line:
//!
//! ```text
//! <time> <time2> [<index>: <text>]
//! ```
//!
//! Times are seconds and the bracket group is required. Blank lines are
//! skipped.

use std::fs;
use std::path::Path;

use crate::models::error::EditorError;
use crate::models::file_set::Label;

/// Longest label text kept, in bytes.
pub const MAX_LABEL_TEXT: usize = 511;

/// Parse a whole label file. Any bad line rejects the file.
pub fn parse_labels(text: &str) -> Result<Vec<Label>, EditorError> {
    let mut labels = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        labels.push(parse_line(line).map_err(|reason| EditorError::LabelParse { line: n + 1, reason })?);
    }
    Ok(labels)
}

pub fn load_labels(path: &Path) -> Result<Vec<Label>, EditorError> {
    let text = fs::read_to_string(path)
        .map_err(|e| EditorError::Storage(format!("failed to read {}: {}", path.display(), e)))?;
    parse_labels(&text)
}

fn parse_line(line: &str) -> Result<Label, String> {
    let (time, rest) = split_field(line);
    let (time2, rest) = split_field(rest);
    let time = parse_time(time)?;
    let time2 = parse_time(time2)?;

    let inner = rest.strip_prefix('[').ok_or("missing label group")?;
    let inner = inner.strip_suffix(']').ok_or("unterminated label")?;
    let (idx, text) = inner.split_once(':').ok_or("missing ':' after label index")?;
    let index = idx.trim().parse::<u32>().map_err(|_| format!("bad label index {:?}", idx.trim()))?;
    let text = text.trim_start();

    Ok(Label { time, time2, index, text: truncate(text, MAX_LABEL_TEXT).to_string() })
}

fn split_field(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}

fn parse_time(field: &str) -> Result<f64, String> {
    if field.is_empty() {
        return Err("missing time".into());
    }
    match field.parse::<f64>() {
        Ok(t) if t.is_finite() && t >= 0.0 => Ok(t),
        _ => Err(format!("bad time {:?}", field)),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
