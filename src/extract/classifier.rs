//! Structural text classification of act bodies.
//!
//! INLabs renders each act body as flat HTML where plain paragraphs carry no
//! `class` attribute while annotations are tagged: `assina` marks signatures
//! and `cargo` marks the signer's role. The classifier walks every element of
//! the fragment in document order and partitions text on that basis.

use scraper::{ElementRef, Html};
use tracing::trace;

/// Class marking a signature paragraph.
pub const SIGNATURE_CLASS: &str = "assina";

/// Class marking a role (office title) paragraph.
pub const ROLE_CLASS: &str = "cargo";

/// Excerpt anchors, in priority order.
///
/// `"onde se l"` matches both "onde se lê" and "onde se le".
pub const EXCERPT_KEYWORDS: [&str; 5] = ["resolve", "outorga", "onde se l", "objeto", "espécie"];

/// Text fields derived from an act body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextClassification {
    /// Newline-joined text of every element without a class.
    pub principal_text: Option<String>,
    /// Lower-cased suffix of the principal text anchored on a keyword.
    pub excerpt: Option<String>,
    /// Pipe-joined signature texts.
    pub signature: Option<String>,
    /// Pipe-joined role texts.
    pub role: Option<String>,
}

/// Classifies the text of an HTML body.
///
/// Blank input yields an all-`None` classification. HTML parsing is error
/// tolerant, so malformed markup never fails; it is classified as parsed.
#[must_use]
pub fn classify(html: &str) -> TextClassification {
    if html.trim().is_empty() {
        return TextClassification::default();
    }

    let fragment = Html::parse_fragment(html);
    let mut principal = Vec::new();
    let mut signatures = Vec::new();
    let mut roles = Vec::new();

    // The fragment root is a synthetic <html> wrapper, not part of the body.
    for element in fragment
        .root_element()
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
    {
        let value = element.value();
        if value.attr("class").is_none() {
            principal.push(element_text(element));
            continue;
        }
        if value.classes().any(|class| class == SIGNATURE_CLASS) {
            signatures.push(element_text(element));
        }
        if value.classes().any(|class| class == ROLE_CLASS) {
            roles.push(element_text(element));
        }
    }

    trace!(
        principal = principal.len(),
        signatures = signatures.len(),
        roles = roles.len(),
        "classified body elements"
    );

    let principal_text = principal.join("\n");
    let excerpt = excerpt_of(&principal_text);

    TextClassification {
        principal_text: Some(principal_text),
        excerpt,
        signature: join_non_empty(&signatures),
        role: join_non_empty(&roles),
    }
}

/// Finds the keyword-anchored excerpt of a principal text.
///
/// The first keyword in [`EXCERPT_KEYWORDS`] order that occurs anywhere wins,
/// even when a later keyword occurs earlier in the text.
#[must_use]
pub fn excerpt_of(principal_text: &str) -> Option<String> {
    if principal_text.is_empty() {
        return None;
    }
    let lowered = principal_text.to_lowercase();
    EXCERPT_KEYWORDS
        .iter()
        .find_map(|keyword| lowered.find(keyword))
        .map(|start| lowered[start..].to_string())
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn join_non_empty(parts: &[String]) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("|"))
    }
}
