//! Container extraction: pull the page markup out of a model answer.
//!
//! The prompt asks for exactly one `<div class="page-container">`, but
//! models sometimes answer with a whole document, add prose around the
//! markup, or forget the wrapper. [`extract_fragment`] normalises all of
//! these into one or more complete page-container elements and never
//! fails.
//!
//! Parsing uses `scraper` (html5ever), which repairs malformed markup the
//! way a browser would instead of rejecting it.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Class name marking one physical page in the output document.
pub const PAGE_CONTAINER_CLASS: &str = "page-container";

static SEL_CONTAINER: Lazy<Selector> = Lazy::new(|| Selector::parse(".page-container").unwrap());
static SEL_BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Extract the page markup from raw model output.
///
/// 1. Every outermost `.page-container` element is returned as complete
///    outer HTML, joined with a blank line. A container nested inside
///    another one stays part of its parent.
/// 2. Without a container, non-blank body content is wrapped in a single
///    synthetic `<div class="page-container">`.
/// 3. Otherwise the raw text is returned unchanged (last resort).
///
/// Feeding the result back in yields the same markup.
pub fn extract_fragment(raw: &str) -> String {
    let document = Html::parse_document(raw);

    let containers: Vec<String> = document
        .select(&SEL_CONTAINER)
        .filter(|el| !has_container_ancestor(el))
        .map(|el| el.html())
        .collect();

    if !containers.is_empty() {
        debug!("Extracted {} page container(s)", containers.len());
        return containers.join("\n\n");
    }

    if let Some(body) = document.select(&SEL_BODY).next() {
        let inner = body.inner_html();
        let inner = inner.trim();
        if !inner.is_empty() {
            debug!("No page container in model output; wrapping body content");
            return format!("<div class=\"{PAGE_CONTAINER_CLASS}\">{inner}</div>");
        }
    }

    debug!("Nothing extractable in model output; keeping raw text");
    raw.to_string()
}

fn has_container_ancestor(el: &ElementRef<'_>) -> bool {
    el.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| e.classes().any(|c| c == PAGE_CONTAINER_CLASS))
    })
}
