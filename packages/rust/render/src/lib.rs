//! Markup-to-HTML conversion engine for the document reader.
//!
//! Turns `.md`/`.txt` source text (or pre-extracted word-processor HTML) into
//! HTML fragments the static front end inserts directly into its container
//! element. Several tag/class names are byte-level contracts with that front
//! end: `txt-wrapper content-prose`, `docx-wrapper`, `md-table`, `mermaid`,
//! and the `doc-metadata` banner.
//!
//! The engine is a pure function of its input strings: no I/O, no shared
//! state, safe to call concurrently, and it never fails — malformed input
//! degrades to readable output instead of raising.

mod block;
mod cleanup;
mod inline;
mod table;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use docshelf_shared::DocKind;

pub use block::render_markdown;
pub use cleanup::clean_extracted_html;
pub use inline::{escape_html, format_inline};
pub use table::render_table;

/// Reading speed used for the banner estimate, characters per minute.
const CHARS_PER_MINUTE: f64 = 400.0;

/// Matches HTML tags, for plain-text extraction when counting.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

/// Matches bare URLs in plain-text paragraphs.
static TXT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https?://\S+)").expect("txt link regex"));

// ---------------------------------------------------------------------------
// Per-kind entry points
// ---------------------------------------------------------------------------

/// Render a document of the given kind to a complete HTML fragment with the
/// metadata banner.
///
/// For [`DocKind::Docx`], `source` is the extraction collaborator's HTML
/// output, and the rendered HTML doubles as the character-count source (the
/// raw document text is not available on that path).
pub fn render_document(kind: DocKind, source: &str) -> String {
    let html = match kind {
        DocKind::Markdown => {
            let html = render_markdown(source);
            inject_metadata(&html, source)
        }
        DocKind::PlainText => {
            let html = render_plain_text(source);
            inject_metadata(&html, source)
        }
        DocKind::Docx => {
            let html = render_docx_html(source);
            inject_metadata(&html, &html)
        }
    };

    debug!(?kind, input_len = source.len(), output_len = html.len(), "document rendered");
    html
}

/// Render raw text as paragraphs inside the plain-text wrapper.
///
/// Paragraphs split on blank lines; single newlines inside a paragraph become
/// `<br>`; bare URLs are autolinked.
pub fn render_plain_text(content: &str) -> String {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut parts: Vec<String> = Vec::new();
    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let escaped = escape_html(paragraph).replace('\n', "<br>");
        let linked = TXT_LINK_RE
            .replace_all(&escaped, r#"<a href="${1}" target="_blank">${1}</a>"#)
            .into_owned();
        parts.push(format!("<p>{linked}</p>"));
    }

    format!(
        "<div class=\"txt-wrapper content-prose\">{}</div>",
        parts.join("\n")
    )
}

/// Wrap pre-extracted word-processor HTML after the cleanup pass.
pub fn render_docx_html(extracted: &str) -> String {
    let cleaned = clean_extracted_html(extracted);
    format!("<div class=\"docx-wrapper\">{cleaned}</div>")
}

// ---------------------------------------------------------------------------
// Metadata banner
// ---------------------------------------------------------------------------

/// Prepend the word-count / read-time banner to `html`.
///
/// `text_for_count` is stripped of tags and counted in Unicode scalar
/// values; the estimate floors at one minute. An empty count source returns
/// `html` unchanged.
pub fn inject_metadata(html: &str, text_for_count: &str) -> String {
    let clean_text = TAG_RE.replace_all(text_for_count, "");
    let clean_text = clean_text.trim();
    if clean_text.is_empty() {
        return html.to_string();
    }

    let char_count = clean_text.chars().count();
    let read_minutes = ((char_count as f64 / CHARS_PER_MINUTE).round() as u64).max(1);

    format!(
        "<div class=\"doc-metadata\" style=\"color: #666; font-size: 0.9em; \
         margin-bottom: 20px; padding-bottom: 10px; border-bottom: 1px solid #eee;\">\
         <span>字数: {char_count}</span> &nbsp; <span>预计阅读: {read_minutes} 分钟</span>\
         </div>{html}"
    )
}

/// A single escaped error paragraph, substituted for a document's content
/// when an external collaborator (file read, extraction) fails.
pub fn error_fragment(message: &str) -> String {
    format!("<p class=\"error\">{}</p>", escape_html(message))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // --- plain text path ---

    #[test]
    fn plain_text_wraps_and_splits_paragraphs() {
        let out = render_plain_text("first paragraph\n\nsecond paragraph");
        assert!(out.starts_with("<div class=\"txt-wrapper content-prose\">"));
        assert!(out.ends_with("</div>"));
        assert!(out.contains("<p>first paragraph</p>"));
        assert!(out.contains("<p>second paragraph</p>"));
    }

    #[test]
    fn plain_text_intra_paragraph_newline_is_br() {
        let out = render_plain_text("line one\nline two");
        assert!(out.contains("<p>line one<br>line two</p>"));
    }

    #[test]
    fn plain_text_normalizes_crlf() {
        let out = render_plain_text("a\r\n\r\nb\rc");
        assert!(out.contains("<p>a</p>"));
        assert!(out.contains("<p>b<br>c</p>"));
    }

    #[test]
    fn plain_text_escapes_and_autolinks() {
        let out = render_plain_text("1 < 2, see https://example.com/x");
        assert!(out.contains("1 &lt; 2"));
        assert!(out.contains(r#"<a href="https://example.com/x" target="_blank">https://example.com/x</a>"#));
    }

    // --- docx path ---

    #[test]
    fn docx_html_is_cleaned_and_wrapped() {
        let out = render_docx_html("<p>body</p>====第2页====<p>&nbsp;</p>");
        assert_eq!(out, "<div class=\"docx-wrapper\"><p>body</p></div>");
    }

    // --- metadata banner ---

    #[test]
    fn metadata_rounds_to_minutes_with_floor_of_one() {
        let text_1200: String = "字".repeat(1200);
        let out = inject_metadata("<p>x</p>", &text_1200);
        assert!(out.contains("<span>字数: 1200</span>"));
        assert!(out.contains("<span>预计阅读: 3 分钟</span>"));

        let text_50: String = "a".repeat(50);
        let out = inject_metadata("<p>x</p>", &text_50);
        assert!(out.contains("<span>字数: 50</span>"));
        assert!(out.contains("<span>预计阅读: 1 分钟</span>"));
    }

    #[test]
    fn metadata_strips_tags_before_counting() {
        let out = inject_metadata("<p>irrelevant</p>", "<p>abcd</p>");
        assert!(out.contains("<span>字数: 4</span>"));
    }

    #[test]
    fn metadata_skipped_for_empty_count_source() {
        assert_eq!(inject_metadata("<p>x</p>", "  "), "<p>x</p>");
        assert_eq!(inject_metadata("<p>x</p>", "<br><hr>"), "<p>x</p>");
    }

    #[test]
    fn metadata_banner_precedes_content() {
        let out = inject_metadata("<p>content</p>", "some words");
        assert!(out.starts_with("<div class=\"doc-metadata\""));
        assert!(out.ends_with("<p>content</p>"));
    }

    // --- dispatch ---

    #[test]
    fn render_document_markdown_counts_source_text() {
        let out = render_document(DocKind::Markdown, "# Hello");
        assert!(out.contains("<h1>Hello</h1>"));
        // Count source is the raw markup, marker included
        assert!(out.contains("<span>字数: 7</span>"));
    }

    #[test]
    fn render_document_plain_text_has_wrapper_and_banner() {
        let out = render_document(DocKind::PlainText, "hello world");
        assert!(out.contains("txt-wrapper content-prose"));
        assert!(out.contains("doc-metadata"));
    }

    #[test]
    fn render_document_docx_counts_rendered_html() {
        let out = render_document(DocKind::Docx, "<h1>T</h1><p>12345</p>");
        assert!(out.contains("docx-wrapper"));
        // Tag-stripped count of the rendered HTML: "T" + "12345"
        assert!(out.contains("<span>字数: 6</span>"));
    }

    #[test]
    fn render_document_is_deterministic() {
        let src = "# A\n\ntext https://example.com\n| a | b |\n| 1 | 2 |";
        assert_eq!(
            render_document(DocKind::Markdown, src),
            render_document(DocKind::Markdown, src)
        );
    }

    #[test]
    fn no_raw_angle_brackets_survive_outside_tags() {
        let out = render_document(DocKind::Markdown, "evil <script>alert(1)</script>");
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    // --- error fragment ---

    #[test]
    fn error_fragment_is_escaped() {
        let out = error_fragment("read failed: <os error 2>");
        assert_eq!(out, "<p class=\"error\">read failed: &lt;os error 2&gt;</p>");
    }
}
