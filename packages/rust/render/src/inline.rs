//! Inline-run formatting: emphasis, code, links, and images within one
//! logical text span.
//!
//! The formatter is an ordered list of (pattern, replacement) passes applied
//! to an already-escaped string. The order is a contract the front end's
//! output depends on — in particular, the markdown-link pass runs before
//! bare-URL autolinking, and the image pass runs last. Reordering the passes
//! changes observable output (see the tests pinning `![alt](url)`), so the
//! list must stay exactly as written.

use std::sync::LazyLock;

use regex::Regex;

/// The ordered substitution pipeline. Each pass sees the output of the
/// previous one; substituted tag markup is never re-escaped.
static INLINE_RULES: LazyLock<[(Regex, &'static str); 6]> = LazyLock::new(|| {
    [
        // **bold** (non-greedy via the no-asterisk class)
        (
            Regex::new(r"\*\*([^*]+)\*\*").expect("bold regex"),
            "<strong>${1}</strong>",
        ),
        // *italic* — runs after bold so the outer ** pair is consumed
        (
            Regex::new(r"\*([^*]+)\*").expect("italic regex"),
            "<em>${1}</em>",
        ),
        // `inline code`
        (
            Regex::new(r"`([^`]+)`").expect("code regex"),
            "<code>${1}</code>",
        ),
        // [label](url)
        (
            Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link regex"),
            r#"<a href="${2}" target="_blank">${1}</a>"#,
        ),
        // Bare http(s) URL. The leading group stands in for a negative
        // lookbehind: a URL directly preceded by `(` or `"` is left alone,
        // which keeps href="…" values and freshly substituted links from
        // being wrapped twice.
        (
            Regex::new(r#"(^|[^("])(https?://[^\s<">]+)"#).expect("autolink regex"),
            r#"${1}<a href="${2}" target="_blank">${2}</a>"#,
        ),
        // ![alt](url) — last by contract. A non-empty alt has already been
        // consumed by the link pass above; only empty-alt images reach this.
        (
            Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("image regex"),
            r#"<img src="${2}" alt="${1}">"#,
        ),
    ]
});

/// Escape `&`, `<`, `>` for safe HTML text content.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Format one inline run: escape, then apply the substitution pipeline in
/// order.
pub fn format_inline(text: &str) -> String {
    let mut out = escape_html(text);
    for (pattern, replacement) in INLINE_RULES.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_entities_first() {
        assert_eq!(format_inline("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(
            format_inline("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
    }

    #[test]
    fn bold_before_italic() {
        assert_eq!(
            format_inline("**strong** and *soft*"),
            "<strong>strong</strong> and <em>soft</em>"
        );
    }

    #[test]
    fn inline_code() {
        assert_eq!(format_inline("use `cargo build`"), "use <code>cargo build</code>");
    }

    #[test]
    fn markdown_link() {
        assert_eq!(
            format_inline("[docs](https://example.com/docs)"),
            r#"<a href="https://example.com/docs" target="_blank">docs</a>"#
        );
    }

    #[test]
    fn bare_url_autolinked() {
        assert_eq!(
            format_inline("see https://example.com/page here"),
            r#"see <a href="https://example.com/page" target="_blank">https://example.com/page</a> here"#
        );
    }

    #[test]
    fn bare_url_at_start_of_span() {
        let out = format_inline("https://example.com");
        assert_eq!(
            out,
            r#"<a href="https://example.com" target="_blank">https://example.com</a>"#
        );
    }

    #[test]
    fn link_href_not_double_wrapped() {
        // The URL captured by the link pass sits after `"` in href="…",
        // so autolinking must not touch it again.
        let out = format_inline("[x](https://example.com/a)");
        assert_eq!(out.matches("<a href=").count(), 1);
    }

    #[test]
    fn url_after_open_paren_untouched() {
        assert_eq!(
            format_inline("(https://example.com)"),
            "(https://example.com)"
        );
    }

    #[test]
    fn image_with_alt_is_consumed_by_link_pass() {
        // Contract: the link pass matches the `[alt](url)` portion first,
        // leaving a literal `!` ahead of the anchor.
        assert_eq!(
            format_inline("![logo](https://example.com/logo.png)"),
            r#"!<a href="https://example.com/logo.png" target="_blank">logo</a>"#
        );
    }

    #[test]
    fn image_with_empty_alt_becomes_img() {
        assert_eq!(
            format_inline("![](https://example.com/pic.png)"),
            r#"<img src="https://example.com/pic.png" alt="">"#
        );
    }
}
