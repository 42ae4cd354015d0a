//! Post-processing: normalise model output before it is structured.
//!
//! Chat models add noise that is invisible in a browser but confuses a
//! line-based parser: CRLF endings, trailing spaces, zero-width characters,
//! and the habit of wrapping an entire answer in a ```` ```markdown ````
//! fence. Each pass below is a pure `&str → String` function; they run in
//! the order listed in [`PASSES`]. Passes after the wrapper removal only
//! touch prose: fenced code is passed through byte for byte.
//!
//! The raw response is kept untouched in
//! [`crate::output::AnalysisOutput::response_text`]; only the structurer
//! sees the cleaned text.

use once_cell::sync::Lazy;
use regex::Regex;

use super::structure::Fence;

type Pass = fn(&str) -> String;

/// Cleanup passes, in application order.
///
/// Line endings go first so every later pass can assume `\n`.
const PASSES: &[(&str, Pass)] = &[
    ("line-endings", normalise_line_endings),
    ("markdown-wrapper", unwrap_markdown_wrapper),
    ("invisible-chars", |s| outside_fences(s, remove_invisible_chars)),
    ("trailing-whitespace", |s| outside_fences(s, trim_trailing_whitespace)),
    ("blank-lines", |s| outside_fences(s, collapse_blank_lines)),
    ("mid-table-separators", |s| outside_fences(s, drop_mid_table_separators)),
];

/// Apply `pass` to each run of lines outside fenced code. Fence lines and
/// everything between them are emitted unchanged; an unclosed fence runs to
/// the end of the input.
fn outside_fences(input: &str, pass: Pass) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut prose: Vec<&str> = Vec::new();
    let mut fence: Option<Fence> = None;
    for line in input.split('\n') {
        if fence.is_some() {
            if fence.as_ref().is_some_and(|f| f.closes(line)) {
                fence = None;
            }
            out.push(line.to_string());
        } else if let Some((opened, _)) = Fence::open(line) {
            flush_prose(&mut prose, &mut out, pass);
            fence = Some(opened);
            out.push(line.to_string());
        } else {
            prose.push(line);
        }
    }
    flush_prose(&mut prose, &mut out, pass);
    out.join("\n")
}

fn flush_prose(prose: &mut Vec<&str>, out: &mut Vec<String>, pass: Pass) {
    if !prose.is_empty() {
        out.push(pass(&prose.join("\n")));
        prose.clear();
    }
}

/// Run every cleanup pass over `input`.
pub fn clean_response(input: &str) -> String {
    PASSES
        .iter()
        .fold(input.to_string(), |text, (_, pass)| pass(&text))
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

static RE_MARKDOWN_WRAPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)[ \t]*\n(.*?)\n?```[ \t]*$").unwrap());

/// Only a fence explicitly tagged `markdown`/`md` around the whole answer is
/// removed. A bare or `js` fence is real content and must survive.
fn unwrap_markdown_wrapper(input: &str) -> String {
    match RE_MARKDOWN_WRAPPER.captures(input.trim()) {
        Some(caps) if inner_fences_balanced(&caps[1]) => caps[1].to_string(),
        _ => input.to_string(),
    }
}

/// True when every fence inside a wrapper is a tagged opener followed by a
/// bare closer. A bare fence with nothing open means the wrapper itself
/// closed early and the "wrapper" is really two separate blocks.
fn inner_fences_balanced(inner: &str) -> bool {
    let mut open = false;
    for line in inner.lines().map(str::trim) {
        let Some(info) = line.strip_prefix("```") else {
            continue;
        };
        let info = info.trim_start_matches('`').trim();
        match (open, info.is_empty()) {
            (false, true) => return false,
            (false, false) => open = true,
            (true, true) => open = false,
            (true, false) => {}
        }
    }
    !open
}

/// ZWJ and ZWNJ are left alone: they join emoji sequences and shape
/// Indic and Persian scripts.
fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'], "")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_RUN.replace_all(input, "\n\n\n").into_owned()
}

static RE_SEPARATOR_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\|?(?:\s*:?-+:?\s*\|)+\s*:?-*:?\s*$").unwrap());

/// Some models repeat the `|---|` row between body rows. Only the one
/// directly under the header is meaningful.
fn drop_mid_table_separators(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut run = 0usize;
    for line in input.split('\n') {
        if line.trim_start().starts_with('|') {
            run += 1;
            if run > 2 && RE_SEPARATOR_ROW.is_match(line) {
                continue;
            }
        } else {
            run = 0;
        }
        out.push(line);
    }
    out.join("\n")
}
