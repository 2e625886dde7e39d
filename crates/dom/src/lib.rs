//! DOM for the headless browser
//!
//! Parsed documents live in an index-addressed arena. The HTML tokenizer and
//! tree builder are html5ever's (through `scraper`); this crate only turns
//! their tree into something the browser can query, mutate and serialize.
//!
//! ```text
//! HTML text → html5ever tree → DomArena (owned) → queries / serializer
//!                                   ↓
//!                             NodeId (u32)
//! ```

pub mod arena;
pub mod document;
pub mod error;
pub mod parser;
pub mod serializer;
pub mod types;
pub mod utils;

pub use arena::DomArena;
pub use document::Document;
pub use error::{DomError, Result};
pub use serializer::DomSerializer;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_query() {
        let doc = Document::parse_html("<p id='x'>hi</p>");
        let p = doc.element_by_id("x").unwrap();
        assert_eq!(doc.text_content(p), "hi");
    }
}
