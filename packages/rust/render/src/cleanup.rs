//! Cleanup pass for externally produced HTML (the word-processor path).
//!
//! Extraction libraries leave page-break markers and piles of empty
//! paragraphs in their output; both are stripped before the fragment is
//! wrapped and handed to metadata injection. Running the pass twice is a
//! no-op.

use std::sync::LazyLock;

use regex::Regex;

/// Page-break markers like `==========第1页==========` or
/// `====== 第 12 页 ======`.
static PAGE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)={3,}.*?第\s?\d+\s?页.*?={3,}").expect("page marker regex"));

/// Empty paragraph variants: `<p></p>`, `<p> </p>`, `<p>&nbsp;</p>`,
/// `<p><br /></p>` and whitespace combinations.
static EMPTY_P_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p>\s*(?:&nbsp;|<br\s*/?>)?\s*</p>").expect("empty p regex"));

/// Strip page-break markers and empty paragraphs, then trim.
pub fn clean_extracted_html(html: &str) -> String {
    let result = PAGE_MARKER_RE.replace_all(html, "");
    let result = EMPTY_P_RE.replace_all(&result, "");
    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_page_markers() {
        let input = "<p>before</p>==========第1页==========<p>after</p>";
        assert_eq!(clean_extracted_html(input), "<p>before</p><p>after</p>");
    }

    #[test]
    fn strips_page_markers_with_spaces() {
        let input = "<p>a</p>===== 第 12 页 =====<p>b</p>";
        assert_eq!(clean_extracted_html(input), "<p>a</p><p>b</p>");
    }

    #[test]
    fn collapses_empty_paragraph_variants() {
        let input = "<p>keep</p><p></p><p> </p><p>&nbsp;</p><p><br></p><p><br /></p>";
        assert_eq!(clean_extracted_html(input), "<p>keep</p>");
    }

    #[test]
    fn case_insensitive_empty_paragraphs() {
        let input = "<p>keep</p><P>&NBSP;</P>";
        assert_eq!(clean_extracted_html(input), "<p>keep</p>");
    }

    #[test]
    fn trims_result() {
        assert_eq!(clean_extracted_html("  <p>x</p>\n\n"), "<p>x</p>");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "<p>before</p>====第3页====<p>&nbsp;</p><p>after</p>",
            "  plain text  ",
            "",
            "<p><br/></p>",
        ];
        for input in inputs {
            let once = clean_extracted_html(input);
            assert_eq!(clean_extracted_html(&once), once);
        }
    }
}
