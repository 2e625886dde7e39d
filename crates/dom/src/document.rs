//! Parsed HTML document and its queries

use crate::arena::DomArena;
use crate::error::Result;
use crate::parser;
use crate::serializer::DomSerializer;
use crate::types::{DomNode, NodeId, NodeType};
use crate::utils::collapse_whitespace;

/// An HTML document backed by a [`DomArena`]
#[derive(Debug, Clone, Default)]
pub struct Document {
    arena: DomArena,
}

impl Document {
    /// Parse HTML source. html5ever never rejects input, so neither do we.
    pub fn parse_html(source: &str) -> Self {
        let mut arena = DomArena::new();
        if parser::parse_document(source, &mut arena).is_err() {
            // Only reachable with an inconsistent tree from the parser
            arena.clear();
        }
        Self { arena }
    }

    pub fn arena(&self) -> &DomArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut DomArena {
        &mut self.arena
    }

    pub fn node(&self, node_id: NodeId) -> Result<&DomNode> {
        self.arena.get(node_id)
    }

    /// The `<html>` element
    pub fn document_element(&self) -> Option<NodeId> {
        let root = self.arena.root().ok()?;
        root.children_ids
            .iter()
            .copied()
            .find(|&id| self.arena.get(id).is_ok_and(|n| n.is_element()))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.arena.find_by_tag("head").into_iter().next()
    }

    /// The `<body>` element, or the outermost `<frameset>`
    pub fn body(&self) -> Option<NodeId> {
        self.arena
            .find_one(|n| n.is_tag("body"))
            .or_else(|| self.arena.find_one(|n| n.is_tag("frameset")))
    }

    /// Text of the first `<title>`, whitespace collapsed
    pub fn title_text(&self) -> String {
        self.arena
            .find_one(|n| n.is_tag("title"))
            .map(|id| self.text_content(id))
            .unwrap_or_default()
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.arena.find_by_tag(tag)
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.arena.find_by_id(id)
    }

    /// Elements of `tag` (or any tag with `"*"`) whose `attribute` equals `value`
    pub fn elements_by_attribute(&self, tag: &str, attribute: &str, value: &str) -> Vec<NodeId> {
        self.arena.find(|n| {
            n.is_element() && (tag == "*" || n.is_tag(tag)) && n.attr(attribute) == Some(value)
        })
    }

    /// Concatenated descendant text, whitespace collapsed and trimmed
    pub fn text_content(&self, node_id: NodeId) -> String {
        collapse_whitespace(&self.raw_text_content(node_id))
    }

    /// Concatenated descendant text exactly as parsed
    pub fn raw_text_content(&self, node_id: NodeId) -> String {
        let mut text = String::new();
        let _ = self.arena.traverse_df(node_id, |node| {
            if node.node_type == NodeType::Text {
                text.push_str(&node.node_value);
            }
            Ok(())
        });
        text
    }

    /// Nearest ancestor-or-self element with the given tag
    pub fn closest(&self, node_id: NodeId, tag: &str) -> Option<NodeId> {
        if self.arena.get(node_id).ok()?.is_tag(tag) {
            return Some(node_id);
        }
        self.arena
            .ancestors(node_id)
            .ok()?
            .into_iter()
            .find(|&id| self.arena.get(id).is_ok_and(|n| n.is_tag(tag)))
    }

    /// Element descendants of `node_id` (excluding itself) in document order
    pub fn descendant_elements(&self, node_id: NodeId) -> Vec<NodeId> {
        self.arena
            .descendants(node_id)
            .into_iter()
            .skip(1)
            .filter(|&id| self.arena.get(id).is_ok_and(|n| n.is_element()))
            .collect()
    }

    /// Markup of the whole document
    pub fn as_xml(&self) -> String {
        DomSerializer::new().as_xml(&self.arena).unwrap_or_default()
    }

    /// Rendered text of the whole document
    pub fn as_text(&self) -> String {
        DomSerializer::new().as_text(&self.arena).unwrap_or_default()
    }
}
