//! Structured-output extraction from free-form model text
//!
//! Models wrap their JSON in prose, code fences and reasoning blocks, and
//! sometimes stop mid-object when they run out of tokens. [`extract`] tries,
//! in order:
//!
//! 1. the whole text (after stripping reasoning blocks),
//! 2. every balanced `{...}` / `[...]` span that opens like JSON, longest first,
//! 3. the same spans with trailing commas removed, then the unterminated
//!    tail of the text closed off.
//!
//! The scan is a single bracket-depth pass over at most [`MAX_SCAN_CHARS`]
//! characters, so the cost is bounded regardless of input.

use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use thiserror::Error;

/// Input beyond this many characters is ignored
pub const MAX_SCAN_CHARS: usize = 50_000;

static REASONING_BLOCK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:think|thinking|reasoning)>.*?</(?:think|thinking|reasoning)>").ok()
});

/// Error returned when no structured output can be recovered
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("model output is empty")]
    Empty,

    #[error("no JSON object or array found in model output")]
    NoJson,

    /// JSON was found but none of it matched the expected shape
    #[error("no candidate matched the expected schema: {0}")]
    SchemaMismatch(String),
}

/// Parse `raw` into `T`, tolerating surrounding prose and damaged JSON
pub fn extract<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractionError> {
    let text = strip_reasoning(truncate(raw, MAX_SCAN_CHARS));
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let mut last_error = None;
    let mut attempt = |candidate: &str| -> Option<T> {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => Some(value),
            Err(e) => {
                last_error = Some(e.to_string());
                None
            }
        }
    };

    if let Some(value) = attempt(text) {
        return Ok(value);
    }
    let whole_looked_like_json = text.starts_with(['{', '[']);

    let scan = scan(text);
    let mut spans = scan.spans;
    // Markdown links and bracketed asides are never candidates
    spans.retain(|&(start, end)| opens_like_json(&text[start..end]));
    // Longest first; ties by position keep the order deterministic
    spans.sort_by(|a, b| (b.1 - b.0).cmp(&(a.1 - a.0)).then(a.0.cmp(&b.0)));

    for &(start, end) in &spans {
        if let Some(value) = attempt(&text[start..end]) {
            return Ok(value);
        }
    }

    for &(start, end) in &spans {
        let repaired = remove_trailing_commas(&text[start..end]);
        if repaired.len() != end - start {
            if let Some(value) = attempt(&repaired) {
                return Ok(value);
            }
        }
    }

    if let Some(start) = scan.unterminated_from {
        let closed = close_unterminated(&text[start..]);
        if let Some(value) = attempt(&remove_trailing_commas(&closed)) {
            return Ok(value);
        }
    }

    if spans.is_empty() && scan.unterminated_from.is_none() && !whole_looked_like_json {
        return Err(ExtractionError::NoJson);
    }
    Err(ExtractionError::SchemaMismatch(
        last_error.unwrap_or_else(|| "unparseable JSON".to_string()),
    ))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Drop `<think>...</think>` style blocks, and anything before a dangling close tag
fn strip_reasoning(text: &str) -> String {
    let stripped = match REASONING_BLOCK.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    let lower = stripped.to_ascii_lowercase();
    let dangling = ["</think>", "</thinking>", "</reasoning>"]
        .iter()
        .filter_map(|tag| lower.rfind(tag).map(|pos| pos + tag.len()))
        .max();
    match dangling {
        Some(pos) => stripped[pos..].to_string(),
        None => stripped,
    }
}

/// Whether the first token inside a balanced span can begin a JSON object or array
fn opens_like_json(span: &str) -> bool {
    let mut chars = span.chars();
    let opener = chars.next();
    let first = chars.find(|c| !c.is_whitespace());
    match (opener, first) {
        (Some('{'), Some(c)) => matches!(c, '"' | '}'),
        (Some('['), Some(c)) => {
            matches!(c, ']' | '{' | '[' | '"' | '-' | 't' | 'f' | 'n') || c.is_ascii_digit()
        }
        _ => false,
    }
}

struct Scan {
    /// Byte ranges of balanced spans, at any depth
    spans: Vec<(usize, usize)>,
    /// Start of the outermost span still open at end of input
    unterminated_from: Option<usize>,
}

/// One pass of bracket-depth counting that ignores brackets inside strings
fn scan(text: &str) -> Scan {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if !stack.is_empty() => in_string = true,
            b'{' => stack.push((b'}', i)),
            b'[' => stack.push((b']', i)),
            b'}' | b']' => match stack.last() {
                Some(&(closer, start)) if closer == b => {
                    stack.pop();
                    spans.push((start, i + 1));
                }
                // Mismatched closer: the open span is broken
                Some(_) => stack.clear(),
                None => {}
            },
            _ => {}
        }
    }

    Scan {
        spans,
        unterminated_from: stack.first().map(|&(_, start)| start),
    }
}

/// Remove commas that directly precede a closing bracket, outside strings
fn remove_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_comma: Option<String> = None;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if let Some(buffered) = pending_comma.as_mut() {
            if c.is_whitespace() {
                buffered.push(c);
                continue;
            }
            let buffered = pending_comma.take().unwrap_or_default();
            if c == '}' || c == ']' {
                out.push_str(buffered.trim_start_matches(','));
            } else {
                out.push_str(&buffered);
            }
        }
        match c {
            ',' => pending_comma = Some(String::from(",")),
            '"' => {
                in_string = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    if let Some(buffered) = pending_comma {
        out.push_str(&buffered);
    }
    out
}

/// Close an open string and every open bracket at the end of `text`
fn close_unterminated(text: &str) -> String {
    let mut closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                closers.pop();
            }
            _ => {}
        }
    }

    let mut out = text.trim_end().to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    // A dangling key or colon cannot be completed; drop back to the last value
    let trimmed_len = out.trim_end_matches([':', ' ', '\n', '\t']).len();
    out.truncate(trimmed_len);
    while let Some(closer) = closers.pop() {
        out.push(closer);
    }
    out
}
