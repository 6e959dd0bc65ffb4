use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::hash::DocumentHash;

/// Directed, named relationship between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: u64,
    pub from_node: DocumentHash,
    pub to_node: DocumentHash,
    pub edge_name: String,
    #[serde(with = "crate::timestamp")]
    pub created_date: OffsetDateTime,
}

impl Edge {
    /// The endpoint that is not `node`. Self loops return `node` itself.
    pub fn other_end(&self, node: &DocumentHash) -> &DocumentHash {
        if &self.from_node == node {
            &self.to_node
        } else {
            &self.from_node
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_table_row() {
        let row = r#"{
            "id": 12,
            "from_node": "1111111111111111111111111111111111111111111111111111111111111111",
            "to_node": "2222222222222222222222222222222222222222222222222222222222222222",
            "edge_name": "member",
            "created_date": "2021-01-02T03:04:05.000"
        }"#;
        let edge: Edge = serde_json::from_str(row).expect("decode");
        assert_eq!(edge.id, 12);
        assert_eq!(edge.edge_name, "member");
        assert_eq!(edge.other_end(&edge.from_node), &edge.to_node);
        assert_eq!(edge.other_end(&edge.to_node), &edge.from_node);
    }
}
