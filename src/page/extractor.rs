//! Visible-text extraction from a parsed HTML document.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

use super::PageSnapshot;

/// Extraction stops once the joined text grows past this many UTF-16 code
/// units, the unit browsers measure string length in.
///
/// Checked after each fragment is appended, so the result may run over by
/// up to one fragment.
pub const MAX_TEXT_CHARS: usize = 14_000;

/// Elements whose text children are never part of the visible text.
const SKIPPED_PARENTS: &[&str] = &["script", "style", "noscript"];

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapse whitespace runs to single spaces and trim.
fn normalize(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Parse `html` and capture its title and visible body text.
///
/// `Html` is `!Send`, so this stays synchronous and is called from inside
/// the page task rather than held across an await.
pub fn extract_snapshot(html: &str, url: &str) -> PageSnapshot {
    let document = Html::parse_document(html);
    PageSnapshot {
        title: document_title(&document),
        url: url.to_string(),
        text: visible_text(&document),
    }
}

fn document_title(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "title")
        .map(|el| normalize(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn visible_text(document: &Html) -> String {
    let Some(body) = document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
    else {
        return String::new();
    };

    let mut fragments: Vec<String> = Vec::new();
    // Length of `fragments.join(" ")`, tracked incrementally.
    let mut joined_len = 0usize;

    for node in body.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
            continue;
        };
        if SKIPPED_PARENTS.contains(&parent.value().name()) {
            continue;
        }

        let fragment = normalize(text);
        if fragment.is_empty() {
            continue;
        }

        if !fragments.is_empty() {
            joined_len += 1;
        }
        joined_len += fragment.encode_utf16().count();
        fragments.push(fragment);

        if joined_len > MAX_TEXT_CHARS {
            break;
        }
    }

    fragments.join(" ")
}
