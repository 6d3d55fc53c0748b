//! GFM-style table rendering for a contiguous run of pipe-delimited lines.
//!
//! Column alignment comes from colon decorations on the *header* cells, not
//! from a separator row; a separator row, when present, is detected
//! heuristically and skipped. Fewer than two lines degrade to plain
//! paragraphs.

use std::sync::LazyLock;

use regex::Regex;

use crate::inline::escape_html;

/// A row whose pipe-joined text is only separator characters.
static SEPARATOR_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s|:,\-\d]+$").expect("separator row regex"));

/// Render a run of table lines into `<table class="md-table">`.
///
/// Lines that cannot form a table (fewer than two) fall back to one escaped
/// `<p>` per line.
pub fn render_table(lines: &[&str]) -> String {
    if lines.len() < 2 {
        return lines
            .iter()
            .map(|line| format!("<p>{}</p>", escape_html(line)))
            .collect();
    }

    let rows: Vec<Vec<String>> = lines
        .iter()
        .map(|line| {
            line.trim_matches('|')
                .split('|')
                .map(|cell| cell.trim().to_string())
                .collect()
        })
        .collect();

    let header = &rows[0];
    let align: Vec<Option<&'static str>> = header.iter().map(|cell| cell_alignment(cell)).collect();

    let mut html: Vec<String> = vec!["<table class=\"md-table\">".into()];

    html.push("<thead><tr>".into());
    for (j, cell) in header.iter().enumerate() {
        html.push(format!("<th{}>{}</th>", style_attr(&align, j), escape_html(cell)));
    }
    html.push("</tr></thead>".into());

    let body_start = body_start_row(&rows);

    if body_start < rows.len() {
        html.push("<tbody>".into());
        for row in &rows[body_start..] {
            html.push("<tr>".into());
            for (j, cell) in row.iter().enumerate() {
                html.push(format!("<td{}>{}</td>", style_attr(&align, j), escape_html(cell)));
            }
            html.push("</tr>".into());
        }
        html.push("</tbody>".into());
    }

    html.push("</table>".into());
    html.join("\n")
}

/// Alignment from a header cell's colon decorations: both → center,
/// leading → left, trailing → right, none → unstyled.
fn cell_alignment(cell: &str) -> Option<&'static str> {
    if cell.len() > 1 && cell.starts_with(':') && cell.ends_with(':') {
        Some("center")
    } else if cell.starts_with(':') {
        Some("left")
    } else if cell.ends_with(':') {
        Some("right")
    } else {
        None
    }
}

/// Style attribute for column `j`; out-of-range columns get none.
fn style_attr(align: &[Option<&'static str>], j: usize) -> String {
    match align.get(j).copied().flatten() {
        Some(dir) => format!(" style=\"text-align:{dir}\""),
        None => String::new(),
    }
}

/// Locate the first body row.
///
/// Two-branch heuristic: if row 1 is not made entirely of cells starting
/// with `-` or `:`, there is no separator row and the body starts at row 1.
/// Otherwise scan forward for the first separator-character-only row and
/// start right after it, defaulting to row 2 when none matches.
fn body_start_row(rows: &[Vec<String>]) -> usize {
    let row_is_decorated = rows.len() > 1
        && rows[1]
            .iter()
            .all(|c| c.starts_with('-') || c.starts_with(':'));

    if !row_is_decorated {
        return 1;
    }

    (1..rows.len())
        .find(|&idx| SEPARATOR_ROW_RE.is_match(&rows[idx].join("|")))
        .map(|idx| idx + 1)
        .unwrap_or(2)
}
