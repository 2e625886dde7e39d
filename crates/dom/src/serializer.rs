//! DOM Serializer
//!
//! This module handles:
//! - Re-serializing the tree as indented markup (`as_xml`)
//! - Rendering the visible text of a page (`as_text`)
//! - XPath generation for element identification

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::*;
use crate::utils::{collapse_whitespace, escape_attribute, escape_text};

/// Serializer configuration
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// Indentation added per nesting level in `as_xml`
    pub indent: String,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
        }
    }
}

/// DOM Tree Serializer
pub struct DomSerializer {
    config: SerializerConfig,
}

impl DomSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Serialize the whole tree as markup
    pub fn as_xml(&self, arena: &DomArena) -> Result<String> {
        let root_id = arena.root_id().ok_or(DomError::NoRoot)?;
        self.node_as_xml(arena, root_id)
    }

    /// Serialize a subtree as markup
    pub fn node_as_xml(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::with_capacity(4096);
        self.serialize_node(arena, node_id, 0, &mut output)?;
        Ok(output)
    }

    fn serialize_node(
        &self,
        arena: &DomArena,
        node_id: NodeId,
        depth: usize,
        output: &mut String,
    ) -> Result<()> {
        let node = arena.get(node_id)?;
        let indent = self.config.indent.repeat(depth);

        match node.node_type {
            NodeType::Element => {
                output.push_str(&indent);
                output.push('<');
                output.push_str(&node.node_name);
                for (name, value) in &node.attributes {
                    output.push_str(&format!(" {}=\"{}\"", name, escape_attribute(value)));
                }

                if VOID_ELEMENTS.contains(&node.node_name.as_str()) {
                    output.push_str("/>\n");
                    return Ok(());
                }
                output.push_str(">\n");

                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, depth + 1, output)?;
                }

                output.push_str(&indent);
                output.push_str("</");
                output.push_str(&node.node_name);
                output.push_str(">\n");
            }
            NodeType::Text | NodeType::CdataSection => {
                let text = node.node_value.trim();
                if !text.is_empty() {
                    output.push_str(&indent);
                    output.push_str(&escape_text(text));
                    output.push('\n');
                }
            }
            NodeType::Comment => {
                output.push_str(&indent);
                output.push_str("<!--");
                output.push_str(&node.node_value);
                output.push_str("-->\n");
            }
            NodeType::DocumentType => {
                output.push_str(&format!("<!DOCTYPE {}>\n", node.node_name));
            }
            NodeType::Document | NodeType::DocumentFragment => {
                for &child_id in &node.children_ids {
                    self.serialize_node(arena, child_id, depth, output)?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Visible text of the whole tree
    ///
    /// Block elements start new lines, runs of whitespace collapse to one
    /// space, and script/style/head content is skipped.
    pub fn as_text(&self, arena: &DomArena) -> Result<String> {
        let root_id = arena.root_id().ok_or(DomError::NoRoot)?;
        self.node_as_text(arena, root_id)
    }

    pub fn node_as_text(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut lines = vec![String::new()];
        self.collect_text(arena, node_id, &mut lines)?;
        let lines: Vec<String> = lines
            .iter()
            .map(|line| collapse_whitespace(line))
            .filter(|line| !line.is_empty())
            .collect();
        Ok(lines.join("\n"))
    }

    fn collect_text(&self, arena: &DomArena, node_id: NodeId, lines: &mut Vec<String>) -> Result<()> {
        let node = arena.get(node_id)?;
        match node.node_type {
            NodeType::Text | NodeType::CdataSection => {
                if let Some(line) = lines.last_mut() {
                    line.push_str(&node.node_value);
                }
            }
            NodeType::Element => {
                let tag = node.node_name.as_str();
                if NON_RENDERED_ELEMENTS.contains(&tag) {
                    return Ok(());
                }
                let is_block = BLOCK_ELEMENTS.contains(&tag);
                if is_block {
                    lines.push(String::new());
                }
                if tag == "input" {
                    if let Some(value) = node.attr("value") {
                        if matches!(node.attr("type"), Some("submit" | "button" | "reset")) {
                            if let Some(line) = lines.last_mut() {
                                line.push_str(value);
                            }
                        }
                    }
                }
                for &child_id in &node.children_ids {
                    self.collect_text(arena, child_id, lines)?;
                }
                if is_block {
                    lines.push(String::new());
                } else if let Some(line) = lines.last_mut() {
                    // keeps inline siblings like <td> apart
                    if matches!(tag, "td" | "th") {
                        line.push(' ');
                    }
                }
            }
            NodeType::Document | NodeType::DocumentFragment => {
                for &child_id in &node.children_ids {
                    self.collect_text(arena, child_id, lines)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Generate XPath for a node
    pub fn generate_xpath(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut path_parts = Vec::new();
        let mut current_id = Some(node_id);

        while let Some(id) = current_id {
            let node = arena.get(id)?;

            if node.node_type == NodeType::Element {
                // Get position among siblings with same tag name
                let position = if let Some(parent_id) = node.parent_id {
                    let parent = arena.get(parent_id)?;
                    parent
                        .children_ids
                        .iter()
                        .filter_map(|&child_id| arena.get(child_id).ok())
                        .filter(|child| {
                            child.node_type == NodeType::Element
                                && child.node_name == node.node_name
                        })
                        .position(|child| child.node_id == node.node_id)
                        .map(|p| p + 1) // XPath is 1-indexed
                        .unwrap_or(1)
                } else {
                    1
                };

                path_parts.push(format!("{}[{}]", node.node_name, position));
            }

            current_id = node.parent_id;
        }

        path_parts.reverse();
        Ok(format!("/{}", path_parts.join("/")))
    }
}

impl Default for DomSerializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn test_as_xml() {
        let doc = Document::parse_html("<p class=\"a&b\">x &lt; y<br></p>");
        let xml = DomSerializer::new().as_xml(doc.arena()).unwrap();

        assert!(xml.contains("<p class=\"a&amp;b\">"), "got: {xml}");
        assert!(xml.contains("x &lt; y"), "got: {xml}");
        assert!(xml.contains("<br/>"), "got: {xml}");
        assert!(xml.contains("</html>"), "got: {xml}");
    }

    #[test]
    fn test_as_text() {
        let doc = Document::parse_html(
            "<html><head><title>T</title><script>var a;</script></head>\
             <body><h1>Head</h1><p>one   two</p>tail</body></html>",
        );
        let text = DomSerializer::new().as_text(doc.arena()).unwrap();
        assert_eq!(text, "Head\none two\ntail");
    }

    #[test]
    fn test_generate_xpath() {
        let doc = Document::parse_html("<div></div><div><span id='s'></span></div>");
        let span = doc.element_by_id("s").unwrap();
        let xpath = DomSerializer::new().generate_xpath(doc.arena(), span).unwrap();
        assert_eq!(xpath, "/html[1]/body[1]/div[2]/span[1]");
    }
}
