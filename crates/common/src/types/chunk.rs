use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BrandwatchError;
use crate::types::Mention;

/// Optional chunking hints carried alongside a [`Chunk`].
///
/// Wire fields are camelCase (`chunkIndex`/`totalChunks`); the `alias`
/// keeps snake_case acceptable too, since producers are not strictly
/// required to speak camelCase for every optional field.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChunkMeta {
    #[serde(
        default,
        rename = "chunkIndex",
        alias = "chunk_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub chunk_index: Option<u32>,
    #[serde(
        default,
        rename = "totalChunks",
        alias = "total_chunks",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_chunks: Option<u32>,
}

/// A unit of work: a bounded batch of brand mentions delivered as one queue item.
///
/// Field naming follows camelCase on the wire and snake_case internally;
/// the `rename`/`alias` pair on `chunk_id`/`created_at` is the single
/// point where that divergence is bridged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    pub brand: String,
    #[serde(rename = "chunkId", alias = "chunk_id")]
    pub chunk_id: String,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: DateTime<Utc>,
    pub mentions: Vec<Mention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ChunkMeta>,
}

impl Chunk {
    /// Validate invariants beyond what deserialization already enforces.
    ///
    /// `mentions` may legitimately be empty (the processor short-circuits
    /// on that), so only `brand` non-emptiness is checked here.
    pub fn validate(&self) -> Result<(), BrandwatchError> {
        if self.brand.trim().is_empty() {
            return Err(BrandwatchError::Validation("brand must not be empty".into()));
        }
        if self.chunk_id.trim().is_empty() {
            return Err(BrandwatchError::Validation(
                "chunkId must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_wire_format() {
        let json = r#"{
            "brand": "acme",
            "chunkId": "c1",
            "createdAt": "2024-01-01T00:00:00Z",
            "mentions": []
        }"#;
        let chunk: Chunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.chunk_id, "c1");
        assert!(chunk.validate().is_ok());
    }

    #[test]
    fn accepts_snake_case_alias_too() {
        let json = r#"{
            "brand": "acme",
            "chunk_id": "c1",
            "created_at": "2024-01-01T00:00:00Z",
            "mentions": []
        }"#;
        let chunk: Chunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.chunk_id, "c1");
    }

    #[test]
    fn missing_required_fields_fails_to_deserialize() {
        let json = r#"{"brand": "acme", "mentions": []}"#;
        let result: Result<Chunk, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_brand() {
        let chunk = Chunk {
            brand: "  ".to_string(),
            chunk_id: "c1".to_string(),
            created_at: Utc::now(),
            mentions: Vec::new(),
            meta: None,
        };
        assert!(chunk.validate().is_err());
    }
}
