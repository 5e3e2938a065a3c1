use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single piece of user-generated text referring to a brand.
///
/// Immutable once constructed; its lifetime is bounded by the [`Chunk`](super::Chunk)
/// that carries it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub source: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<HashMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}
