//! Text-unit eligibility heuristics.
//!
//! Best-effort separation of page content from boilerplate. Skipping a
//! translatable string is acceptable; rewriting UI chrome is not, so the
//! rejection rules are deliberately aggressive.

use std::collections::HashSet;
use std::sync::OnceLock;

use markup5ever_rcdom::Handle;
use regex::Regex;

use crate::config::constants;
use crate::dom::{self, NodeKey};

/// Noise patterns, checked in order against the trimmed string.
fn noise_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Pure whitespace, punctuation or digits
            r"^[\s\W\d]+$",
            // Common UI words
            r"(?i)^(menu|navigation|search|login|sign|register|subscribe|follow|share|like|comment|reply|edit|delete|save|cancel|close|back|next|previous|home|about|contact|privacy|terms|policy|cookie|advertisement|ad|banner|sponsored|promoted)$",
            // Copyright boilerplate
            r"(?i)^(©|copyright|all rights reserved|powered by|made with|built with)$",
            // Status words
            r"(?i)^(loading|please wait|error|success|warning|info|notice)$",
            // Disclosure controls
            r"(?i)^(expand|collapse|show|hide|more|less|read more|read less)$",
            // Position words
            r"(?i)^(top|bottom|left|right|center|middle)$",
            // Confirmation words
            r"(?i)^(yes|no|ok|cancel|confirm|submit|reset|clear)$",
            // Short all-caps acronyms
            r"^[A-Z\s]{1,3}$",
            // Pure numerals
            r"^\d+$",
            // Short symbol runs
            r"^[^\w\s]{1,3}$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("noise pattern must compile"))
        .collect()
    })
}

/// Decides whether a text node is worth translating.
///
/// Pure function of the DOM state at call time plus the caller's membership
/// sets; keeps no state of its own.
#[derive(Debug, Default)]
pub struct EligibilityFilter;

impl EligibilityFilter {
    pub fn new() -> Self {
        Self
    }

    /// Full eligibility check for one text node.
    pub fn is_eligible(
        &self,
        node: &Handle,
        translated: &HashSet<NodeKey>,
        translating: &HashSet<NodeKey>,
    ) -> bool {
        let Some(parent) = dom::parent_element(node) else {
            return false;
        };
        let Some(tag) = dom::node_name(&parent) else {
            return false;
        };
        if constants::SKIP_TAGS.contains(&tag) {
            return false;
        }
        if !Self::is_visible(&parent) {
            return false;
        }

        let text = match dom::text_content(node) {
            Some(text) => text,
            None => return false,
        };
        let text = text.trim();
        if text.chars().count() < constants::MIN_TEXT_LENGTH {
            return false;
        }
        if Self::is_noise(text) {
            return false;
        }
        if !Self::is_main_content(&parent) {
            return false;
        }

        let key = NodeKey::of(node);
        if translated.contains(&key) || translating.contains(&key) {
            return false;
        }
        // Durable marker left by a previous pass, possibly before a script
        // reload that emptied the in-memory sets.
        if dom::get_attr(&parent, constants::TRANSLATED_ATTR).is_some() {
            return false;
        }

        true
    }

    fn is_noise(text: &str) -> bool {
        noise_patterns().iter().any(|pattern| pattern.is_match(text))
    }

    fn is_visible(parent: &Handle) -> bool {
        !dom::element_chain(parent)
            .iter()
            .any(dom::is_element_hidden)
    }

    /// Content-role inclusion is checked before UI-role exclusion; a node
    /// matching neither set defaults to eligible.
    fn is_main_content(parent: &Handle) -> bool {
        let chain = dom::element_chain(parent);
        for element in &chain {
            if Self::matches_role(
                element,
                constants::CONTENT_TAGS,
                constants::CONTENT_CLASSES,
            ) || dom::get_attr(element, "role").as_deref() == Some("main")
            {
                return true;
            }
        }
        for element in &chain {
            if Self::matches_role(element, constants::UI_TAGS, constants::UI_CLASSES) {
                return false;
            }
        }
        true
    }

    fn matches_role(element: &Handle, tags: &[&str], classes: &[&str]) -> bool {
        if let Some(tag) = dom::node_name(element) {
            if tags.contains(&tag) {
                return true;
            }
        }
        if let Some(class_attr) = dom::get_attr(element, "class") {
            return class_attr
                .split_whitespace()
                .any(|token| classes.contains(&token.to_lowercase().as_str()));
        }
        false
    }
}
