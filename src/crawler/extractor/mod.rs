
use scraper::{ElementRef, Html};
use tracing::debug;

/// Elements whose text never reaches the chunk store
const EXCLUDED_TAGS: [&str; 7] = [
    "script", "style", "noscript", "nav", "footer", "header", "iframe",
];

/// Elements that visually separate their text from the neighbouring text
const BLOCK_TAGS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "p", "section", "table", "td", "tr",
];

/// Extract the primary viewable text of an HTML page.
///
/// Walks `<body>`, skips page chrome and scripts, and collapses every run of
/// whitespace into a single space.
#[inline]
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let body = root
        .children()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == "body")
        .unwrap_or(root);

    let mut raw = String::with_capacity(html.len() / 2);
    collect_visible_text(body, &mut raw);
    let text = collapse_whitespace(&raw);

    debug!(
        "Extracted {} chars of text from {} chars of HTML",
        text.len(),
        html.len()
    );

    text
}

/// Replace every whitespace run with one space and trim the ends
#[inline]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if EXCLUDED_TAGS.contains(&name) {
                continue;
            }
            collect_visible_text(child_element, out);
            if BLOCK_TAGS.contains(&name) {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}
