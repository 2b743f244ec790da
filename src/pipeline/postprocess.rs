//! Post-processing: deterministic cleanup of model-generated HTML.
//!
//! Even well-prompted models wrap their answer in ```` ```html ```` fences
//! now and then, mix line endings, or leak zero-width characters copied
//! from the source scan. These rules fix those quirks without touching the
//! markup itself; well-formedness is left to
//! [`crate::pipeline::extract`].
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so a fence
//! followed by `\r\n` leaves no stray carriage return, and trimming runs
//! last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to the raw model output.
///
/// Rules (applied in order):
/// 1. Remove code-fence markers (` ```html `, ` ``` `) wherever they appear
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 4. Trim surrounding whitespace
pub fn clean_html(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip code fences ────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```(?:html)?").unwrap());

fn strip_code_fences(input: &str) -> String {
    RE_FENCE.replace_all(input, "").into_owned()
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_fence() {
        let input = "```html\n<div class=\"page-container\">x</div>\n```";
        assert_eq!(clean_html(input), "<div class=\"page-container\">x</div>");
    }

    #[test]
    fn test_strip_bare_fence() {
        assert_eq!(clean_html("```\n<p>a</p>\n```\n"), "<p>a</p>");
    }

    #[test]
    fn test_strip_uppercase_fence() {
        assert_eq!(clean_html("```HTML\n<p>a</p>```"), "<p>a</p>");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(clean_html("  <p>a</p>\n"), "<p>a</p>");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_keeps_translated_unicode_text() {
        let input = "<p>Température ≤ 40 °C — 警告</p>";
        assert_eq!(clean_html(input), input);
    }
}
