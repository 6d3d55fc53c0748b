//! Line-oriented block scanner and dispatcher.
//!
//! Walks the source line stream with a single forward cursor and classifies
//! each region by first-match priority: blank, heading, rule, blockquote,
//! fenced block, list, table, paragraph. Every line is consumed by exactly
//! one region and every region emits something; malformed input degrades
//! locally instead of failing.

use std::sync::LazyLock;

use regex::Regex;

use crate::inline::{escape_html, format_inline};
use crate::table::render_table;

/// Matches the start of an ordered-list item (`1. `, `23.\t`, …).
static ORDERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s").expect("ordered item regex"));

/// Strips the numeric prefix from an ordered-list item.
static ORDERED_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("ordered prefix regex"));

/// Render lightweight markup to an HTML fragment.
///
/// The output is the newline-joined concatenation of each region's HTML, in
/// source order. Never fails: arbitrary text always yields a fragment.
pub fn render_markdown(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut html: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();

        if trimmed.is_empty() {
            html.push("<br>".into());
            i += 1;
        } else if let Some(rest) = trimmed.strip_prefix("# ") {
            html.push(format!("<h1>{}</h1>", format_inline(rest)));
            i += 1;
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            html.push(format!("<h2>{}</h2>", format_inline(rest)));
            i += 1;
        } else if let Some(rest) = trimmed.strip_prefix("### ") {
            html.push(format!("<h3>{}</h3>", format_inline(rest)));
            i += 1;
        } else if trimmed == "---" {
            html.push("<hr>".into());
            i += 1;
        } else if trimmed.starts_with("> ") {
            let mut quoted: Vec<String> = Vec::new();
            while i < lines.len() {
                let t = lines[i].trim();
                let Some(rest) = t.strip_prefix("> ") else {
                    break;
                };
                quoted.push(format_inline(rest));
                i += 1;
            }
            html.push(format!("<blockquote>{}</blockquote>", quoted.join("<br>")));
        } else if trimmed.starts_with("```") {
            let lang = trimmed[3..].trim();
            let body_start = i + 1;
            let mut body_end = body_start;
            while body_end < lines.len() && !lines[body_end].trim_end().starts_with("```") {
                body_end += 1;
            }
            html.push(render_fenced(lang, &lines[body_start..body_end]));
            // Skip the closing fence; an unterminated fence consumes to end.
            i = if body_end < lines.len() {
                body_end + 1
            } else {
                body_end
            };
        } else if trimmed.starts_with("- ") {
            let mut items = String::new();
            while i < lines.len() {
                let t = lines[i].trim();
                let Some(item) = t.strip_prefix("- ") else {
                    break;
                };
                items.push_str(&format!("<li>{}</li>", format_inline(item)));
                i += 1;
            }
            html.push(format!("<ul>{items}</ul>"));
        } else if ORDERED_ITEM_RE.is_match(trimmed) {
            let mut items = String::new();
            while i < lines.len() && ORDERED_ITEM_RE.is_match(lines[i].trim()) {
                let item = ORDERED_PREFIX_RE.replace(lines[i].trim(), "");
                items.push_str(&format!("<li>{}</li>", format_inline(&item)));
                i += 1;
            }
            html.push(format!("<ol>{items}</ol>"));
        } else if trimmed.starts_with('|') && trimmed[1..].contains('|') {
            let mut table_lines: Vec<&str> = Vec::new();
            while i < lines.len() && lines[i].trim().starts_with('|') {
                table_lines.push(lines[i].trim_end());
                i += 1;
            }
            html.push(render_table(&table_lines));
        } else {
            html.push(format!("<p>{}</p>", format_inline(trimmed)));
            i += 1;
        }
    }

    html.join("\n")
}

/// Render a fenced region: a client-side diagram block for diagram tags,
/// otherwise an escaped code block.
fn render_fenced(lang: &str, body: &[&str]) -> String {
    if is_diagram_tag(lang) {
        // Diagram source is handed to the client renderer untouched; for
        // shorthand tags the tag line itself is part of the diagram source.
        let joined = body.join("\n");
        let code = if lang == "mermaid" {
            joined
        } else {
            format!("{lang}\n{joined}")
        };
        format!("<div class=\"mermaid\">{}</div>", code.trim())
    } else {
        let escaped: Vec<String> = body.iter().map(|line| escape_html(line)).collect();
        format!(
            "<pre><code class=\"language-{lang}\">{}</code></pre>",
            escaped.join("<br>")
        )
    }
}

/// Tags whose fenced body is a client-rendered diagram rather than code.
fn is_diagram_tag(lang: &str) -> bool {
    lang == "mermaid"
        || lang.starts_with("gantt")
        || lang.starts_with("flowchart")
        || lang.starts_with("graph")
}
