//! Document-order harvest of translatable text units.

use std::collections::HashSet;

use markup5ever_rcdom::Handle;

use crate::dom::{self, NodeKey};
use crate::filter::EligibilityFilter;

/// One translatable text location plus its trimmed content at observation
/// time. Transient: owned by the queue for the duration of one translation
/// cycle, never persisted.
#[derive(Clone)]
pub struct TextUnit {
    pub node: Handle,
    pub text: String,
}

impl TextUnit {
    pub fn key(&self) -> NodeKey {
        NodeKey::of(&self.node)
    }
}

/// Walks every text node under `body` in document order and keeps the ones
/// passing the eligibility filter. Each call is a fresh walk; the only state
/// consulted between calls is the caller's membership sets.
pub fn harvest(
    body: &Handle,
    filter: &EligibilityFilter,
    translated: &HashSet<NodeKey>,
    translating: &HashSet<NodeKey>,
) -> Vec<TextUnit> {
    let mut units = Vec::new();
    dom::walk_text_nodes(body, &mut |node| {
        if filter.is_eligible(node, translated, translating) {
            if let Some(text) = dom::text_content(node) {
                units.push(TextUnit {
                    node: node.clone(),
                    text: text.trim().to_string(),
                });
            }
        }
    });
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harvest_page(html: &str) -> Vec<String> {
        let dom = dom::parse_html(html);
        let body = dom::find_body(&dom.document).expect("body");
        let filter = EligibilityFilter::new();
        let empty = HashSet::new();
        harvest(&body, &filter, &empty, &empty)
            .into_iter()
            .map(|unit| unit.text)
            .collect()
    }

    #[test]
    fn harvest_preserves_document_order() {
        let texts = harvest_page(
            "<html><body><main>\
             <h1>headline about weather</h1>\
             <p>first paragraph text</p>\
             <script>var ignored = true;</script>\
             <p>second paragraph text</p>\
             </main></body></html>",
        );
        assert_eq!(
            texts,
            vec![
                "headline about weather",
                "first paragraph text",
                "second paragraph text"
            ]
        );
    }

    #[test]
    fn harvest_is_deterministic_for_a_fixed_dom() {
        let dom = dom::parse_html(
            "<html><body><main><p>alpha sentence here</p><p>beta sentence here</p></main></body></html>",
        );
        let body = dom::find_body(&dom.document).unwrap();
        let filter = EligibilityFilter::new();
        let empty = HashSet::new();

        let first = harvest(&body, &filter, &empty, &empty);
        let second = harvest(&body, &filter, &empty, &empty);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.key(), b.key());
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn harvest_skips_units_in_the_membership_sets() {
        let dom = dom::parse_html(
            "<html><body><main><p>alpha sentence here</p><p>beta sentence here</p></main></body></html>",
        );
        let body = dom::find_body(&dom.document).unwrap();
        let filter = EligibilityFilter::new();
        let empty = HashSet::new();

        let all = harvest(&body, &filter, &empty, &empty);
        assert_eq!(all.len(), 2);

        let mut translated = HashSet::new();
        translated.insert(all[0].key());
        let remaining = harvest(&body, &filter, &translated, &empty);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].text, "beta sentence here");
    }
}
