//! Page-specification parsing: `"1-3, 5"` → `[1, 2, 3, 5]`.
//!
//! Operators type the physical page numbers they want rebuilt. The parser
//! is lenient on purpose: tokens it cannot read are skipped rather than
//! rejected, and only a specification that yields no page at all is an
//! error.
//!
//! A token starting with `-` (e.g. `-3`) reads as a range with an empty
//! start and is skipped; signed page numbers are not supported.

use crate::error::Manual2HtmlError;
use std::collections::BTreeSet;

/// Highest page number accepted. Larger numbers are skipped and range ends
/// are clamped, so `1-99999999` cannot allocate a huge set.
pub const MAX_PAGE_NUMBER: u32 = 9_999;

/// Parse a page specification into an ascending, duplicate-free list of
/// page numbers (1-indexed).
///
/// # Rules
/// - Tokens are separated by `,` and trimmed; empty tokens are skipped.
/// - `a-b` adds every page from `a` to `b` inclusive. A reversed range
///   (`3-1`) adds nothing. A range with a non-numeric endpoint is skipped.
/// - Any other token must be a single number, or it is skipped.
/// - `0` and numbers above [`MAX_PAGE_NUMBER`] are skipped.
///
/// # Errors
/// [`Manual2HtmlError::InvalidPageRange`] when nothing survives.
///
/// # Example
/// ```rust
/// use edgequake_manual2html::parse_pages;
///
/// assert_eq!(parse_pages("1-3, 5").unwrap(), vec![1, 2, 3, 5]);
/// assert_eq!(parse_pages("5, 3, 1, 3").unwrap(), vec![1, 3, 5]);
/// assert!(parse_pages("3-1").is_err());
/// ```
pub fn parse_pages(spec: &str) -> Result<Vec<u32>, Manual2HtmlError> {
    let mut pages = BTreeSet::new();

    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some((start, end)) = token.split_once('-') {
            if let (Some(start), Some(end)) = (parse_number(start), parse_number(end)) {
                let start = start.max(1);
                let end = end.min(MAX_PAGE_NUMBER);
                pages.extend(start..=end);
            }
        } else if let Some(page) = parse_number(token) {
            if (1..=MAX_PAGE_NUMBER).contains(&page) {
                pages.insert(page);
            }
        }
    }

    if pages.is_empty() {
        return Err(Manual2HtmlError::InvalidPageRange {
            input: spec.to_string(),
        });
    }

    Ok(pages.into_iter().collect())
}

fn parse_number(s: &str) -> Option<u32> {
    s.trim().parse().ok()
}
