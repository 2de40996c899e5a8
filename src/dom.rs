//! DOM access layer.
//!
//! Thin helpers over `markup5ever_rcdom` covering exactly what the pipeline
//! needs: parsing, a document-order text-node walk, attribute and text
//! access, and pointer-based node identity. Writes are limited to direct
//! text replacement and one marker attribute on the parent element.

use std::rc::Rc;

use html5ever::interface::{Attribute, QualName};
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::format_tendril;
use html5ever::tendril::TendrilSink;
use html5ever::{namespace_url, ns, parse_document, LocalName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

/// Identity of a text-bearing location.
///
/// Two nodes with equal text are distinct units, so identity is the node
/// allocation, never the string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn of(node: &Handle) -> Self {
        NodeKey(Rc::as_ptr(node) as usize)
    }
}

/// Parses an HTML document.
pub fn parse_html(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .one(html.as_bytes())
}

/// Serializes the whole document back to HTML.
pub fn serialize_html(dom: &RcDom) -> std::io::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    let document: SerializableHandle = dom.document.clone().into();
    serialize(&mut buf, &document, SerializeOpts::default())?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Tag name of an element node.
pub fn node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// Attribute value of an element node. Boolean attributes yield `Some("")`.
pub fn get_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Sets or replaces an attribute on an element node.
pub fn set_attr(node: &Handle, attr_name: &str, attr_value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        if let Some(attr) = attrs.iter_mut().find(|attr| &*attr.name.local == attr_name) {
            attr.value.clear();
            attr.value.push_slice(attr_value);
        } else {
            attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                value: format_tendril!("{}", attr_value),
            });
        }
    }
}

/// Nearest ancestor that is an element, if any.
pub fn parent_element(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|weak| weak.upgrade());
    node.parent.set(weak);
    parent.filter(|node| matches!(node.data, NodeData::Element { .. }))
}

/// The element chain starting at `node` (when it is an element) and walking
/// up to the document root, nearest first.
pub fn element_chain(node: &Handle) -> Vec<Handle> {
    let mut chain = Vec::new();
    let mut current = if matches!(node.data, NodeData::Element { .. }) {
        Some(node.clone())
    } else {
        parent_element(node)
    };
    while let Some(element) = current {
        current = parent_element(&element);
        chain.push(element);
    }
    chain
}

/// Content of a text node.
pub fn text_content(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Replaces the content of a text node in place.
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        let mut contents = contents.borrow_mut();
        contents.clear();
        contents.push_slice(text);
    }
}

/// First `<body>` element under the document node.
pub fn find_body(document: &Handle) -> Option<Handle> {
    if node_name(document) == Some("body") {
        return Some(document.clone());
    }
    for child in document.children.borrow().iter() {
        if let Some(body) = find_body(child) {
            return Some(body);
        }
    }
    None
}

/// Visits every text node under `root` in document order.
pub fn walk_text_nodes<F: FnMut(&Handle)>(root: &Handle, visit: &mut F) {
    for child in root.children.borrow().iter() {
        match child.data {
            NodeData::Text { .. } => visit(child),
            _ => walk_text_nodes(child, visit),
        }
    }
}

/// Static visibility check for one element: inline `display:none` /
/// `visibility:hidden`, the `hidden` attribute, or `aria-hidden="true"`.
/// Computed style is out of reach for a parsed document, so inline state is
/// the best available approximation.
pub fn is_element_hidden(element: &Handle) -> bool {
    if let Some(style) = get_attr(element, "style") {
        let style: String = style
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }
    if get_attr(element, "hidden").is_some() {
        return true;
    }
    get_attr(element, "aria-hidden").as_deref() == Some("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_text_node(dom: &RcDom) -> Handle {
        let body = find_body(&dom.document).expect("document should have a body");
        let mut found = None;
        walk_text_nodes(&body, &mut |node| {
            if found.is_none() {
                found = Some(node.clone());
            }
        });
        found.expect("body should contain a text node")
    }

    #[test]
    fn text_nodes_walk_in_document_order() {
        let dom = parse_html("<html><body><p>first</p><div><span>second</span></div>third</body></html>");
        let body = find_body(&dom.document).unwrap();
        let mut texts = Vec::new();
        walk_text_nodes(&body, &mut |node| {
            texts.push(text_content(node).unwrap());
        });
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn set_text_rewrites_in_place() {
        let dom = parse_html("<html><body><p>Hello world</p></body></html>");
        let node = first_text_node(&dom);
        set_text(&node, "안녕하세요 세계");
        assert_eq!(text_content(&node).as_deref(), Some("안녕하세요 세계"));

        let html = serialize_html(&dom).expect("serialization should succeed");
        assert!(html.contains("안녕하세요 세계"));
        assert!(!html.contains("Hello world"));
    }

    #[test]
    fn attributes_are_set_and_replaced() {
        let dom = parse_html("<html><body><p>text</p></body></html>");
        let node = first_text_node(&dom);
        let parent = parent_element(&node).expect("text node should have a parent");
        assert_eq!(node_name(&parent), Some("p"));

        assert_eq!(get_attr(&parent, "data-translated"), None);
        set_attr(&parent, "data-translated", "true");
        assert_eq!(get_attr(&parent, "data-translated").as_deref(), Some("true"));
        set_attr(&parent, "data-translated", "false");
        assert_eq!(get_attr(&parent, "data-translated").as_deref(), Some("false"));
    }

    #[test]
    fn node_keys_distinguish_equal_text() {
        let dom = parse_html("<html><body><p>same</p><p>same</p></body></html>");
        let body = find_body(&dom.document).unwrap();
        let mut keys = Vec::new();
        walk_text_nodes(&body, &mut |node| keys.push(NodeKey::of(node)));
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0], keys[1], "identity is by node, not by string value");
    }

    #[test]
    fn element_chain_walks_to_root() {
        let dom = parse_html("<html><body><main><article><p>deep</p></article></main></body></html>");
        let node = first_text_node(&dom);
        let chain: Vec<String> = element_chain(&node)
            .iter()
            .map(|el| node_name(el).unwrap_or("").to_string())
            .collect();
        assert_eq!(chain, vec!["p", "article", "main", "body", "html"]);
    }

    #[test]
    fn hidden_detection_covers_inline_state() {
        let dom = parse_html(
            "<html><body>\
             <p id=\"a\" style=\"display: none\">a</p>\
             <p id=\"b\" style=\"color:red; visibility:hidden\">b</p>\
             <p id=\"c\" hidden>c</p>\
             <p id=\"d\" aria-hidden=\"true\">d</p>\
             <p id=\"e\">e</p>\
             </body></html>",
        );
        let body = find_body(&dom.document).unwrap();
        let mut hidden = Vec::new();
        walk_text_nodes(&body, &mut |node| {
            let parent = parent_element(node).unwrap();
            hidden.push((text_content(node).unwrap(), is_element_hidden(&parent)));
        });
        assert_eq!(
            hidden,
            vec![
                ("a".to_string(), true),
                ("b".to_string(), true),
                ("c".to_string(), true),
                ("d".to_string(), true),
                ("e".to_string(), false),
            ]
        );
    }
}
