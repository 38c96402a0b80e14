//! Read-only navigation helpers over the parsed document.
//!
//! Everything here walks the tree through `parent()` and descendants only; the
//! document is never modified.

use scraper::ElementRef;

/// The parent node, if it is an element (the document root is not).
pub fn parent_element<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.parent().and_then(ElementRef::wrap)
}

/// Nearest strict ancestor matching `pred`.
pub fn closest<'a, F>(el: ElementRef<'a>, pred: F) -> Option<ElementRef<'a>>
where
    F: Fn(&ElementRef<'a>) -> bool,
{
    let mut current = parent_element(el);
    while let Some(node) = current {
        if pred(&node) {
            return Some(node);
        }
        current = parent_element(node);
    }
    None
}

pub fn class_contains(el: &ElementRef<'_>, needle: &str) -> bool {
    el.value()
        .attr("class")
        .map(|class| class.contains(needle))
        .unwrap_or(false)
}

/// True if the element or any element below it has an attribute value
/// containing `needle`.
pub fn subtree_attr_contains(el: ElementRef<'_>, needle: &str) -> bool {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().attrs().any(|(_, value)| value.contains(needle)))
}

/// Text nodes of the subtree, each trimmed, joined without a separator.
pub fn stripped_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}
