#![allow(dead_code)]

//! The persisted data model: one `AnalysisRecord` per resume submission, with
//! its eventual `Feedback`.
//!
//! Wire format is camelCase JSON stored under the key `resume:<id>`. The
//! `feedback` field is a two-state union on the wire — the empty string until
//! analysis completes, a full Feedback object afterwards. In memory that union
//! is an explicit enum so a half-populated Feedback is unrepresentable.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Key prefix under which every record is stored. `resume:*` is the
/// enumeration contract used by listing.
pub const RECORD_KEY_PREFIX: &str = "resume:";

pub fn record_key(id: &str) -> String {
    format!("{RECORD_KEY_PREFIX}{id}")
}

/// One persisted resume submission plus its eventual analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// UUID v4, generated at submission time, immutable. Doubles as the
    /// storage key suffix and the lookup/route key.
    pub id: String,
    /// Handle to the uploaded original document. Write-once.
    pub document_path: String,
    /// Handle to the uploaded preview image. Write-once.
    pub preview_image_path: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub feedback: FeedbackState,
}

impl AnalysisRecord {
    pub fn key(&self) -> String {
        record_key(&self.id)
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self.feedback, FeedbackState::Analyzed(_))
    }
}

/// The two observable states of a record. No third state exists: a record is
/// either untouched by analysis or carries a fully valid Feedback.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackState {
    Unanalyzed,
    Analyzed(Feedback),
}

impl Serialize for FeedbackState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // The wire sentinel for "not yet analyzed" is the empty string.
            FeedbackState::Unanalyzed => serializer.serialize_str(""),
            FeedbackState::Analyzed(feedback) => feedback.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FeedbackState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Sentinel(String),
            Full(Feedback),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Sentinel(s) if s.is_empty() => Ok(FeedbackState::Unanalyzed),
            Wire::Sentinel(s) => Err(D::Error::custom(format!(
                "feedback must be \"\" or a feedback object, got string {s:?}"
            ))),
            Wire::Full(feedback) => Ok(FeedbackState::Analyzed(feedback)),
        }
    }
}

/// The full evaluation of one resume. Exactly four categories — the set is
/// closed, there is no dynamic category list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: u8,
    pub tone_and_style: Category,
    pub content: Category,
    pub structure: Category,
    pub skills: Category,
}

impl Feedback {
    /// The four categories with their wire names, in display order.
    pub fn categories(&self) -> [(&'static str, &Category); 4] {
        [
            ("toneAndStyle", &self.tone_and_style),
            ("content", &self.content),
            ("structure", &self.structure),
            ("skills", &self.skills),
        ]
    }

    /// Enforces the score bounds the schema cannot express: every score is an
    /// integer in 0..=100. Out-of-range values are a data-integrity error,
    /// never a display-time concern.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        check_score("overallScore", self.overall_score)?;
        for (name, category) in self.categories() {
            check_score(name, category.score)?;
        }
        Ok(())
    }
}

fn check_score(field: &'static str, value: u8) -> Result<(), SchemaViolation> {
    if value > 100 {
        return Err(SchemaViolation::ScoreOutOfRange { field, value });
    }
    Ok(())
}

/// A bound the serde schema alone cannot reject.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("score '{field}' is {value}, outside 0..=100")]
    ScoreOutOfRange { field: &'static str, value: u8 },
}

/// One evaluation dimension: a score plus ordered tips (order is display
/// order; the list may be empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub score: u8,
    #[serde(default)]
    pub tips: Vec<Tip>,
}

/// One atomic piece of feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    /// Short headline.
    pub tip: String,
    /// Longer elaboration. Always present in persisted feedback.
    pub explanation: String,
}

/// `good` | `improve` — exhaustive, no other value is valid on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}
