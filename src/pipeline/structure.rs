//! Block-level segmentation of model output into [`ResponseBlock`]s.
//!
//! Models answer in loosely GitHub-flavoured Markdown. Renderers need to
//! know where a table starts and ends, which lines belong to a code block,
//! and where one list stops and the next paragraph begins. This module
//! answers exactly that and nothing more: inline emphasis, links and code
//! spans are left verbatim inside the block text for the rendering layer.
//!
//! ## Modes
//!
//! ```text
//!            fence open                      header + separator
//!   normal ─────────────▶ in-code-block    normal ───────────────▶ in-table
//!     ▲                        │              ▲                        │
//!     └── fence close / EOF ───┘              └── non-pipe line / EOF ─┘
//! ```
//!
//! The parser is total: every string, however malformed, yields a finite
//! sequence of blocks. An unterminated fence swallows the rest of the
//! input into one code block; a pipe line without a separator row is just
//! a paragraph.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// One structurally distinct unit of a model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    /// Running text. Lines are joined with `\n`; inline markup is untouched.
    Paragraph { text: String },
    /// ATX heading, `level` in 1..=6.
    Heading { level: u8, text: String },
    /// Bulleted (`ordered == false`) or numbered list.
    List { ordered: bool, items: Vec<String> },
    /// Fenced code block with the optional info-string language.
    CodeBlock {
        language: Option<String>,
        text: String,
    },
    /// Pipe table. Short rows are padded with empty cells; long rows keep
    /// their extra cells.
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

impl ResponseBlock {
    pub fn paragraph(text: impl Into<String>) -> Self {
        ResponseBlock::Paragraph { text: text.into() }
    }

    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        ResponseBlock::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn code(language: Option<&str>, text: impl Into<String>) -> Self {
        ResponseBlock::CodeBlock {
            language: language.map(str::to_string),
            text: text.into(),
        }
    }

    /// Short name of the variant, used in logs and the JSON `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseBlock::Paragraph { .. } => "paragraph",
            ResponseBlock::Heading { .. } => "heading",
            ResponseBlock::List { .. } => "list",
            ResponseBlock::CodeBlock { .. } => "code_block",
            ResponseBlock::Table { .. } => "table",
        }
    }
}

/// Split `text` into blocks, lazily.
///
/// The returned iterator borrows `text` and holds no state beyond its read
/// position, so calling this twice on the same input (or cloning the
/// iterator) yields identical sequences.
///
/// ```
/// use gemini_lens::pipeline::structure::{structure_response, ResponseBlock};
///
/// let blocks: Vec<_> = structure_response("# Title\n\nBody text").collect();
/// assert_eq!(
///     blocks,
///     vec![ResponseBlock::heading(1, "Title"), ResponseBlock::paragraph("Body text")]
/// );
/// ```
pub fn structure_response(text: &str) -> Blocks<'_> {
    Blocks {
        lines: text.lines().collect(),
        pos: 0,
    }
}

/// Iterator over the blocks of one response. See [`structure_response`].
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

/// What the line at the read position opens.
enum Mode {
    Normal,
    InCodeBlock(Fence, Option<String>),
    InTable,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = ResponseBlock;

    fn next(&mut self) -> Option<ResponseBlock> {
        while self.lines.get(self.pos).is_some_and(|l| is_blank(l)) {
            self.pos += 1;
        }
        let line = *self.lines.get(self.pos)?;

        let block = match self.mode_at(self.pos) {
            Mode::InCodeBlock(fence, language) => self.code_block(fence, language),
            Mode::InTable => self.table(),
            Mode::Normal => {
                if let Some(block) = parse_heading(line) {
                    self.pos += 1;
                    block
                } else if is_thematic_break(line) {
                    self.pos += 1;
                    ResponseBlock::paragraph(line.trim())
                } else if let Some(item) = ListItem::parse(line) {
                    self.list(item)
                } else {
                    self.paragraph()
                }
            }
        };
        Some(block)
    }
}

impl FusedIterator for Blocks<'_> {}

impl<'a> Blocks<'a> {
    fn mode_at(&self, pos: usize) -> Mode {
        let line = self.lines[pos];
        if let Some((fence, language)) = Fence::open(line) {
            Mode::InCodeBlock(fence, language)
        } else if self.table_starts_at(pos) {
            Mode::InTable
        } else {
            Mode::Normal
        }
    }

    fn table_starts_at(&self, pos: usize) -> bool {
        is_pipe_row(self.lines[pos])
            && self
                .lines
                .get(pos + 1)
                .is_some_and(|next| is_separator_row(next))
    }

    /// True when the line at `pos` begins a block other than a paragraph.
    fn interrupts_paragraph(&self, pos: usize) -> bool {
        let line = self.lines[pos];
        !matches!(self.mode_at(pos), Mode::Normal)
            || parse_heading(line).is_some()
            || is_thematic_break(line)
            || ListItem::parse(line).is_some()
    }

    fn code_block(&mut self, fence: Fence, language: Option<String>) -> ResponseBlock {
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.lines.len() && !fence.closes(self.lines[self.pos]) {
            self.pos += 1;
        }
        let text = self.lines[start..self.pos].join("\n");
        // Step over the closing fence; at EOF the block is simply unterminated.
        if self.pos < self.lines.len() {
            self.pos += 1;
        }
        ResponseBlock::CodeBlock { language, text }
    }

    fn table(&mut self) -> ResponseBlock {
        let headers = split_cells(self.lines[self.pos]);
        self.pos += 2;

        let mut rows = Vec::new();
        while let Some(line) = self.lines.get(self.pos) {
            if !is_pipe_row(line) {
                break;
            }
            let mut cells = split_cells(line);
            if cells.len() < headers.len() {
                cells.resize(headers.len(), String::new());
            }
            rows.push(cells);
            self.pos += 1;
        }
        ResponseBlock::Table { headers, rows }
    }

    fn list(&mut self, first: ListItem<'a>) -> ResponseBlock {
        let ordered = first.ordered;
        let base_indent = first.indent;
        let content_offset = first.content_offset;
        let mut items = vec![first.content.to_string()];
        self.pos += 1;

        while let Some(&line) = self.lines.get(self.pos) {
            if is_blank(line) {
                // A blank line only continues the list when another sibling follows.
                let next = (self.pos + 1..self.lines.len()).find(|&i| !is_blank(self.lines[i]));
                match next.and_then(|i| ListItem::parse(self.lines[i]).map(|item| (i, item))) {
                    Some((i, item)) if item.ordered == ordered && item.indent <= base_indent + 1 => {
                        self.pos = i;
                        continue;
                    }
                    _ => break,
                }
            }

            let indent = leading_spaces(line);
            match ListItem::parse(line) {
                Some(item) if item.indent <= base_indent + 1 => {
                    if item.ordered != ordered {
                        break;
                    }
                    items.push(item.content.to_string());
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }

            if indent <= base_indent && self.interrupts_paragraph(self.pos) {
                break;
            }

            // A fence inside an item runs to its close, blank lines included.
            if let Some((fence, _)) = Fence::open(line) {
                let start = self.pos;
                self.pos += 1;
                while self.pos < self.lines.len() && !fence.closes(self.lines[self.pos]) {
                    self.pos += 1;
                }
                let end = (self.pos + 1).min(self.lines.len());
                if let Some(last) = items.last_mut() {
                    for &l in &self.lines[start..end] {
                        last.push('\n');
                        last.push_str(strip_indent(l, content_offset));
                    }
                }
                self.pos = end;
                continue;
            }

            // Nested items and continuation lines belong to the last item.
            let stripped = strip_indent(line, content_offset.min(indent));
            if let Some(last) = items.last_mut() {
                last.push('\n');
                last.push_str(stripped.trim_end());
            }
            self.pos += 1;
        }

        ResponseBlock::List { ordered, items }
    }

    fn paragraph(&mut self) -> ResponseBlock {
        let mut text = self.lines[self.pos].trim().to_string();
        self.pos += 1;
        while let Some(&line) = self.lines.get(self.pos) {
            if is_blank(line) || self.interrupts_paragraph(self.pos) {
                break;
            }
            text.push('\n');
            text.push_str(line.trim());
            self.pos += 1;
        }
        ResponseBlock::Paragraph { text }
    }
}

// ── Fences ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub(crate) struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    /// Recognise an opening fence and its language token.
    pub(crate) fn open(line: &str) -> Option<(Fence, Option<String>)> {
        let t = line.trim_start();
        let marker = t.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = t.chars().take_while(|c| *c == marker).count();
        if len < 3 {
            return None;
        }
        // The marker is ASCII, so `len` chars == `len` bytes.
        let info = t[len..].trim();
        if marker == '`' && info.contains('`') {
            return None;
        }
        let language = info.split_whitespace().next().map(str::to_string);
        Some((Fence { marker, len }, language))
    }

    pub(crate) fn closes(&self, line: &str) -> bool {
        let t = line.trim();
        let run = t.chars().take_while(|c| *c == self.marker).count();
        run >= self.len && t[run..].trim().is_empty()
    }
}

// ── Headings ─────────────────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?[ \t]*$").unwrap());

fn parse_heading(line: &str) -> Option<ResponseBlock> {
    let caps = RE_HEADING.captures(line)?;
    let level = caps[1].len() as u8;
    let raw = caps.get(2).map_or("", |m| m.as_str());

    // Optional closing sequence: `## Title ##`
    let without_closing = raw.trim_end_matches('#');
    let text = if without_closing.is_empty() {
        ""
    } else if without_closing.ends_with([' ', '\t']) {
        without_closing.trim_end()
    } else {
        raw
    };
    Some(ResponseBlock::heading(level, text))
}

// ── Lists ────────────────────────────────────────────────────────────────────

static RE_UNORDERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( *)[-*+][ \t]+(\S.*)$").unwrap());
static RE_ORDERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( *)\d{1,9}[.)][ \t]+(\S.*)$").unwrap());

struct ListItem<'a> {
    ordered: bool,
    indent: usize,
    /// Byte column where the item text starts; continuation lines are
    /// de-indented by up to this much.
    content_offset: usize,
    content: &'a str,
}

impl<'a> ListItem<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let (ordered, caps) = match RE_UNORDERED.captures(line) {
            Some(caps) => (false, caps),
            None => (true, RE_ORDERED.captures(line)?),
        };
        let content = caps.get(2)?;
        Some(ListItem {
            ordered,
            indent: caps[1].len(),
            content_offset: content.start(),
            content: content.as_str().trim_end(),
        })
    }
}

// ── Tables ───────────────────────────────────────────────────────────────────

static RE_SEPARATOR_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:?-+:?$").unwrap());

fn is_pipe_row(line: &str) -> bool {
    !is_blank(line) && line.contains('|')
}

fn is_separator_row(line: &str) -> bool {
    if !line.contains('|') {
        return false;
    }
    let cells = split_cells(line);
    !cells.is_empty() && cells.iter().all(|c| RE_SEPARATOR_CELL.is_match(c))
}

/// Split a pipe row into trimmed cells. Leading and trailing pipes are
/// optional; `\|` is a literal pipe inside a cell.
fn split_cells(line: &str) -> Vec<String> {
    let mut t = line.trim();
    if let Some(rest) = t.strip_prefix('|') {
        t = rest;
    }
    if t.ends_with('|') && !t.ends_with("\\|") {
        t = &t[..t.len() - 1];
    }

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = t.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

// ── Line helpers ─────────────────────────────────────────────────────────────

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_thematic_break(line: &str) -> bool {
    let t = line.trim();
    let Some(marker) = t.chars().next().filter(|c| matches!(c, '-' | '*' | '_')) else {
        return false;
    };
    t.chars().all(|c| c == marker || c == ' ' || c == '\t')
        && t.chars().filter(|c| *c == marker).count() >= 3
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

fn strip_indent(line: &str, max: usize) -> &str {
    let n = leading_spaces(line).min(max);
    &line[n..]
}
