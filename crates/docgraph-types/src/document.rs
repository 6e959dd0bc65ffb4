use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::content::{Content, ContentGroup, ContentValue};
use crate::error::DocumentError;
use crate::hash::DocumentHash;

/// Content label holding a document's type.
pub const TYPE_CONTENT: &str = "type";
/// Content label holding a document's human readable label.
pub const LABEL_CONTENT: &str = "node_label";

/// Immutable, content-addressed node of the document graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub hash: DocumentHash,
    pub creator: String,
    pub content_groups: Vec<ContentGroup>,
    #[serde(with = "crate::timestamp")]
    pub created_date: OffsetDateTime,
}

impl Document {
    /// First content with `label`, searching groups in order.
    pub fn content(&self, label: &str) -> Option<&Content> {
        self.content_groups
            .iter()
            .flatten()
            .find(|content| content.label == label)
    }

    pub fn document_type(&self) -> Result<&str, DocumentError> {
        let content = self
            .content(TYPE_CONTENT)
            .ok_or_else(|| DocumentError::MissingType {
                hash: self.hash.to_string(),
            })?;

        match &content.value {
            ContentValue::Name(value) | ContentValue::String(value) if !value.is_empty() => {
                Ok(value.as_str())
            }
            other => Err(DocumentError::InvalidType {
                hash: self.hash.to_string(),
                kind: other.kind(),
            }),
        }
    }

    pub fn node_label(&self) -> Option<String> {
        self.content(LABEL_CONTENT)
            .map(|content| content.value.to_string())
            .filter(|label| !label.is_empty())
    }
}
