use serde::{Deserialize, Serialize};

/// A dead-lettered chunk: unparseable, invalid, or failed during processing.
///
/// Produced once per failure and written verbatim to the failure queue;
/// `payload` carries the original raw input text for later inspection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureRecord {
    pub worker_id: String,
    pub brand: String,
    pub chunk_id: String,
    pub reason: String,
    pub payload: String,
}
