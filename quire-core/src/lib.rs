//! # quire-core: Document model for the Quire paper editor
//!
//! A document is a title, a type (IEEE template or free-form), an owner
//! and an ordered tree of blocks:
//!
//! ```text
//! Document
//! ├── title / doc_type / owner_id
//! └── ContentTree
//!     ├── Heading { level, [Inline] }
//!     ├── Paragraph { [Inline] }
//!     ├── Table { rows: [[Cell]] }
//!     └── Image { src, alt, caption }
//! ```
//!
//! The tree serializes to the JSON the backend stores; see [`block`].

pub mod block;
pub mod document;
pub mod template;

pub use block::{Block, Cell, Inline, Mark, Span};
pub use document::{ContentTree, Document, DocumentError, DocumentType, Edit};
pub use template::IEEE_SECTIONS;
