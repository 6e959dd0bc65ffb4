//! Shared wire types for the on-chain document graph.
//!
//! Documents and edges are read from the DAO contract's `documents` and
//! `edges` tables. Both are immutable once written; the hash of a document is
//! its identity everywhere in the system.

mod content;
mod document;
mod edge;
mod error;
mod hash;
pub mod timestamp;

pub use content::{Content, ContentGroup, ContentValue};
pub use document::{Document, LABEL_CONTENT, TYPE_CONTENT};
pub use edge::Edge;
pub use error::DocumentError;
pub use hash::{DocumentHash, HASH_HEX_LEN};
