//! Plain-text rendering of [`ResponseBlock`]s for a terminal.
//!
//! Deliberately ANSI-free so the output can be piped or saved. Inline
//! Markdown (`**bold**`, links) is printed as-is.

use crate::pipeline::structure::ResponseBlock;
use unicode_width::UnicodeWidthStr;

const CODE_INDENT: &str = "    ";

/// Render blocks separated by one blank line, with a trailing newline.
pub fn render_blocks(blocks: &[ResponseBlock]) -> String {
    if blocks.is_empty() {
        return String::new();
    }
    let mut out = blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push('\n');
    out
}

fn render_block(block: &ResponseBlock) -> String {
    match block {
        ResponseBlock::Paragraph { text } => text.clone(),
        ResponseBlock::Heading { level, text } => render_heading(*level, text),
        ResponseBlock::List { ordered, items } => render_list(*ordered, items),
        ResponseBlock::CodeBlock { language, text } => render_code(language.as_deref(), text),
        ResponseBlock::Table { headers, rows } => render_table(headers, rows),
    }
}

fn render_heading(level: u8, text: &str) -> String {
    match level {
        1 => format!("{text}\n{}", "=".repeat(text.width())),
        2 => format!("{text}\n{}", "-".repeat(text.width())),
        n => format!("{} {text}", "#".repeat(n as usize)),
    }
}

fn render_list(ordered: bool, items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let marker = if ordered {
                format!("{}. ", i + 1)
            } else {
                "• ".to_string()
            };
            let hang = " ".repeat(marker.width());
            let mut lines = item.lines();
            let mut rendered = format!("{marker}{}", lines.next().unwrap_or_default());
            for line in lines {
                rendered.push('\n');
                rendered.push_str(&hang);
                rendered.push_str(line);
            }
            rendered
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_code(language: Option<&str>, text: &str) -> String {
    let body = text
        .lines()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("{CODE_INDENT}{l}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    match language {
        Some(lang) => format!("[{lang}]\n{body}"),
        None => body,
    }
}

/// Columns are sized to the widest cell. Rows shorter than the header print
/// empty cells; cells past the last header print under a blank header.
fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);

    let cell = |row: &[String], col: usize| -> String { row.get(col).cloned().unwrap_or_default() };

    let mut widths = vec![0usize; columns];
    for (col, width) in widths.iter_mut().enumerate() {
        *width = std::iter::once(headers)
            .chain(rows.iter().map(Vec::as_slice))
            .map(|row| cell(row, col).width())
            .max()
            .unwrap_or(0);
    }

    let format_row = |row: &[String]| -> String {
        widths
            .iter()
            .enumerate()
            .map(|(col, w)| {
                let text = cell(row, col);
                let pad = w.saturating_sub(text.width());
                format!("{text}{}", " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(headers)];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat((*w).max(1)))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(rows.iter().map(|r| format_row(r.as_slice())));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_renders_empty() {
        assert_eq!(render_blocks(&[]), "");
    }

    #[test]
    fn headings() {
        assert_eq!(render_heading(1, "Title"), "Title\n=====");
        assert_eq!(render_heading(2, "Sub"), "Sub\n---");
        assert_eq!(render_heading(4, "Deep"), "#### Deep");
    }

    #[test]
    fn lists_hang_continuation_lines() {
        let items = vec!["Fruit\n- apple".to_string(), "Veg".to_string()];
        assert_eq!(render_list(true, &items), "1. Fruit\n   - apple\n2. Veg");
        assert_eq!(render_list(false, &items[1..]), "• Veg");
    }

    #[test]
    fn code_is_indented_under_language() {
        assert_eq!(render_code(Some("rs"), "fn x() {}\n\n}"), "[rs]\n    fn x() {}\n\n    }");
    }

    #[test]
    fn table_is_aligned() {
        let headers = vec!["A".to_string(), "Name".to_string()];
        let rows = vec![vec!["10".to_string(), "x".to_string()]];
        assert_eq!(
            render_table(&headers, &rows),
            "A  | Name\n---+-----\n10 | x"
        );
    }

    #[test]
    fn table_handles_ragged_rows() {
        let headers = vec!["A".to_string()];
        let rows = vec![vec!["1".to_string(), "extra".to_string()]];
        assert_eq!(render_table(&headers, &rows), "A |\n--+------\n1 | extra");
    }

    #[test]
    fn blocks_are_separated_by_blank_lines() {
        let blocks = vec![
            ResponseBlock::heading(3, "H"),
            ResponseBlock::paragraph("text"),
        ];
        assert_eq!(render_blocks(&blocks), "### H\n\ntext\n");
    }
}
