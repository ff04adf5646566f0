//! Listing and hydration: reads persisted records back for the landing and
//! detail views.
//!
//! Listing is the one place best-effort recovery is sanctioned — a single
//! corrupt stored value is skipped with a warning instead of failing the
//! whole enumeration. Single-record hydration surfaces corruption as a typed
//! error instead.

use thiserror::Error;
use tracing::warn;

use crate::models::feedback::{record_key, AnalysisRecord, FeedbackState, RECORD_KEY_PREFIX};
use crate::stores::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum HydrationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Returns every decodable record under the `resume:` prefix, in the store's
/// own order. Read-only; safe to call concurrently.
pub async fn list_records(records: &dyn RecordStore) -> Result<Vec<AnalysisRecord>, StoreError> {
    let entries = records.list(RECORD_KEY_PREFIX).await?;

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match decode_record(&entry.value) {
            Ok(record) => out.push(record),
            Err(reason) => {
                warn!(key = %entry.key, %reason, "Skipping undecodable resume record");
            }
        }
    }
    Ok(out)
}

/// Hydrates a single record by id. `Ok(None)` when absent.
pub async fn get_record(
    records: &dyn RecordStore,
    id: &str,
) -> Result<Option<AnalysisRecord>, HydrationError> {
    let Some(value) = records.get(&record_key(id)).await? else {
        return Ok(None);
    };
    decode_record(&value)
        .map(Some)
        .map_err(HydrationError::Corrupt)
}

/// Decodes a stored value and re-checks the score bounds, so a record that
/// was persisted by something that skipped validation still cannot surface an
/// out-of-range score.
fn decode_record(value: &str) -> Result<AnalysisRecord, String> {
    let record: AnalysisRecord = serde_json::from_str(value).map_err(|e| e.to_string())?;
    if let FeedbackState::Analyzed(feedback) = &record.feedback {
        feedback.validate().map_err(|e| e.to_string())?;
    }
    Ok(record)
}
