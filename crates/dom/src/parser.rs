//! Bridge from html5ever's tree (via `scraper`) into the arena
//!
//! Tokenizing and tree construction (error recovery, implied `html`/`head`/
//! `body`, misnested tags) are entirely html5ever's job. We only copy the
//! resulting tree.

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::{DomNode, NodeId, NodeType};
use ahash::AHashMap;
use scraper::{Html, Node};

/// Parse a full HTML document into `arena`, returning the `#document` node
pub fn parse_document(source: &str, arena: &mut DomArena) -> Result<NodeId> {
    let html = Html::parse_document(source);
    arena.clear();

    // html5ever tree id → arena id
    let mut id_map = AHashMap::with_capacity(256);
    let mut root_id = None;

    // descendants() is pre-order, so a parent is always mapped before its children
    for node_ref in html.tree.root().descendants() {
        let node = match node_ref.value() {
            Node::Document | Node::Fragment => DomNode::new(NodeType::Document, "#document"),
            Node::Doctype(doctype) => {
                let mut node = DomNode::new(NodeType::DocumentType, doctype.name());
                node.node_value = doctype.name().to_string();
                node
            }
            Node::Comment(comment) => DomNode::comment(comment.to_string()),
            Node::Text(text) => DomNode::text(text.to_string()),
            Node::Element(element) => {
                let mut node = DomNode::element(element.name());
                node.attributes = element
                    .attrs()
                    .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                    .collect();
                node
            }
            Node::ProcessingInstruction(pi) => {
                let mut node = DomNode::new(NodeType::ProcessingInstruction, pi.target.to_string());
                node.node_value = pi.data.to_string();
                node
            }
        };

        let arena_id = arena.add_node(node);
        id_map.insert(node_ref.id(), arena_id);

        match node_ref.parent().and_then(|parent| id_map.get(&parent.id()).copied()) {
            Some(parent_id) => arena.append_child(parent_id, arena_id)?,
            None => root_id = Some(arena_id),
        }
    }

    let root_id = match root_id {
        Some(id) => id,
        None => arena.add_node(DomNode::new(NodeType::Document, "#document")),
    };
    arena.set_root(root_id)?;
    Ok(root_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_dom() {
        let mut arena = DomArena::new();
        let root_id = parse_document("<html><body><p>Hello</p></body></html>", &mut arena).unwrap();

        assert_eq!(root_id, 0);
        assert_eq!(arena.get(root_id).unwrap().node_type, NodeType::Document);
        assert_eq!(arena.find_by_tag("p").len(), 1);
    }

    #[test]
    fn test_implied_structure() {
        let mut arena = DomArena::new();
        parse_document("just text", &mut arena).unwrap();

        assert_eq!(arena.find_by_tag("html").len(), 1);
        assert_eq!(arena.find_by_tag("head").len(), 1);
        assert_eq!(arena.find_by_tag("body").len(), 1);
    }

    #[test]
    fn test_attributes_keep_order() {
        let mut arena = DomArena::new();
        parse_document("<a HREF='/x' id='l' class='c'>x</a>", &mut arena).unwrap();

        let a = arena.find_by_tag("a")[0];
        let names: Vec<&str> = arena
            .get(a)
            .unwrap()
            .attributes
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(names, vec!["href", "id", "class"]);
    }

    #[test]
    fn test_comments_and_doctype() {
        let mut arena = DomArena::new();
        parse_document("<!DOCTYPE html><!-- c --><p>x</p>", &mut arena).unwrap();

        assert!(arena.find_one(|n| n.node_type == NodeType::DocumentType).is_some());
        assert!(arena
            .find_one(|n| n.node_type == NodeType::Comment && n.node_value == " c ")
            .is_some());
    }
}
