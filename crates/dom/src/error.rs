//! Error types for DOM operations
//!
//! Simple, flat error hierarchy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Node {0} is not an element")]
    NotAnElement(u32),

    #[error("Document has no root node")]
    NoRoot,
}
