//! Arena-based DOM tree storage
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [Node0][Node1][Node2]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```
//!
//! Nodes are never freed. Detached nodes stay in the vector but are no
//! longer reachable from the root, and every query walks from the root.

use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};

/// Arena allocator for DOM nodes
#[derive(Debug, Clone)]
pub struct DomArena {
    /// All nodes stored sequentially
    nodes: Vec<DomNode>,

    /// Root node ID (if set)
    root_id: Option<NodeId>,
}

impl DomArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(256),
            root_id: None,
        }
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root_id: None,
        }
    }

    /// Add a detached node to the arena, returns its ID
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        node.parent_id = None;
        self.nodes.push(node);
        node_id
    }

    /// Append `child` as the last child of `parent`, detaching it first
    pub fn append_child(&mut self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        self.get(parent_id)?;
        self.detach(child_id)?;
        self.get_mut(child_id)?.parent_id = Some(parent_id);
        self.get_mut(parent_id)?.children_ids.push(child_id);
        Ok(())
    }

    /// Remove a node from its parent's child list
    pub fn detach(&mut self, node_id: NodeId) -> Result<()> {
        let parent_id = self.get(node_id)?.parent_id;
        if let Some(parent_id) = parent_id {
            let parent = self.get_mut(parent_id)?;
            parent.children_ids.retain(|id| *id != node_id);
            self.get_mut(node_id)?.parent_id = None;
        }
        Ok(())
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get an element node, failing for text/comment/document nodes
    pub fn element(&self, node_id: NodeId) -> Result<&DomNode> {
        let node = self.get(node_id)?;
        if node.is_element() {
            Ok(node)
        } else {
            Err(DomError::NotAnElement(node_id))
        }
    }

    /// Set root node
    pub fn set_root(&mut self, node_id: NodeId) -> Result<()> {
        self.get(node_id)?;
        self.root_id = Some(node_id);
        Ok(())
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    pub fn root(&self) -> Result<&DomNode> {
        let root_id = self.root_id.ok_or(DomError::NoRoot)?;
        self.get(root_id)
    }

    /// Total number of nodes, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomNode> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| i as NodeId)
    }

    /// Get children of a node
    pub fn children(&self, node_id: NodeId) -> Result<Vec<&DomNode>> {
        let node = self.get(node_id)?;
        node.children_ids
            .iter()
            .map(|&child_id| self.get(child_id))
            .collect()
    }

    /// Get parent of a node
    pub fn parent(&self, node_id: NodeId) -> Result<Option<&DomNode>> {
        let node = self.get(node_id)?;
        match node.parent_id {
            Some(parent_id) => Ok(Some(self.get(parent_id)?)),
            None => Ok(None),
        }
    }

    /// Ancestors from the direct parent up to the root
    pub fn ancestors(&self, node_id: NodeId) -> Result<Vec<NodeId>> {
        let mut result = Vec::new();
        let mut current = self.get(node_id)?.parent_id;
        while let Some(id) = current {
            result.push(id);
            current = self.get(id)?.parent_id;
        }
        Ok(result)
    }

    /// Traverse tree depth-first in document order (iterative, no recursion)
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// All nodes below (and including) `start_id` in document order
    pub fn descendants(&self, start_id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let _ = self.traverse_df(start_id, |node| {
            ids.push(node.node_id);
            Ok(())
        });
        ids
    }

    /// Find attached nodes matching predicate, in document order
    pub fn find<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        let Some(root_id) = self.root_id else {
            return Vec::new();
        };
        self.descendants(root_id)
            .into_iter()
            .filter(|&id| self.nodes.get(id as usize).is_some_and(&predicate))
            .collect()
    }

    /// Find first attached node matching predicate
    pub fn find_one<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        let root_id = self.root_id?;
        let mut stack = vec![root_id];
        while let Some(node_id) = stack.pop() {
            let node = self.nodes.get(node_id as usize)?;
            if predicate(node) {
                return Some(node_id);
            }
            stack.extend(node.children_ids.iter().rev().copied());
        }
        None
    }

    /// Find all elements by tag name
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.find(|node| node.is_tag(tag))
    }

    /// Find element by ID attribute
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_one(|node| node.node_type == NodeType::Element && node.attr("id") == Some(id))
    }

    /// Find elements by name attribute
    pub fn find_by_name(&self, name: &str) -> Vec<NodeId> {
        self.find(|node| node.is_element() && node.attr("name") == Some(name))
    }

    pub fn set_attribute(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let node = self.get_mut(node_id)?;
        if !node.is_element() {
            return Err(DomError::NotAnElement(node_id));
        }
        node.set_attr(name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, node_id: NodeId, name: &str) -> Result<Option<String>> {
        let node = self.get_mut(node_id)?;
        if !node.is_element() {
            return Err(DomError::NotAnElement(node_id));
        }
        Ok(node.remove_attr(name))
    }

    /// Replace all children of a node with a single text node
    pub fn set_text_content(&mut self, node_id: NodeId, text: &str) -> Result<()> {
        let children: Vec<NodeId> = self.get(node_id)?.children_ids.to_vec();
        for child in children {
            self.detach(child)?;
        }
        if !text.is_empty() {
            let text_id = self.add_node(DomNode::text(text));
            self.append_child(node_id, text_id)?;
        }
        Ok(())
    }

    /// Clear arena (reuse allocation)
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root_id = None;
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomArena, NodeId, NodeId, NodeId) {
        let mut arena = DomArena::new();
        let root = arena.add_node(DomNode::element("div"));
        let child1 = arena.add_node(DomNode::element("span"));
        let child2 = arena.add_node(DomNode::element("SPAN"));
        arena.append_child(root, child1).unwrap();
        arena.append_child(root, child2).unwrap();
        arena.set_root(root).unwrap();
        (arena, root, child1, child2)
    }

    #[test]
    fn test_arena_basic() {
        let mut arena = DomArena::new();
        let id = arena.add_node(DomNode::element("div"));
        assert_eq!(id, 0);

        let retrieved = arena.get(id).unwrap();
        assert_eq!(retrieved.node_name, "div");
        assert!(arena.get(42).is_err());
    }

    #[test]
    fn test_traverse_df() {
        let (arena, root, _, _) = sample();

        let mut visited = Vec::new();
        arena
            .traverse_df(root, |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["div", "span", "span"]);
    }

    #[test]
    fn test_detached_nodes_are_not_found() {
        let (mut arena, _, child1, child2) = sample();
        arena.detach(child1).unwrap();

        assert_eq!(arena.find_by_tag("span"), vec![child2]);
        assert_eq!(arena.get(child1).unwrap().parent_id, None);
    }

    #[test]
    fn test_set_text_content() {
        let (mut arena, root, _, _) = sample();
        arena.set_text_content(root, "hello").unwrap();

        let children = arena.children(root).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].node_value, "hello");
        assert!(arena.find_by_tag("span").is_empty());
    }

    #[test]
    fn test_attributes_on_text_fail() {
        let mut arena = DomArena::new();
        let text = arena.add_node(DomNode::text("x"));
        assert!(matches!(
            arena.set_attribute(text, "id", "a"),
            Err(DomError::NotAnElement(_))
        ));
    }
}
