//! The ingestion pipeline: accept file → upload original → convert to preview
//! → upload preview → persist unanalyzed record → analyze → parse/validate →
//! persist analyzed record.
//!
//! A strict linear state machine. Every stage failure halts the submission
//! with a typed error naming the stage; nothing is retried here. The
//! unanalyzed record is made durable before analysis starts, so a failure in
//! a later stage always leaves a discoverable record behind.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::analysis::instructions::prepare_instructions;
use crate::analysis::preview::{PreviewRenderer, RenderError};
use crate::analysis::service::{strip_json_fences, AnalysisError, AnalysisMessage, AnalysisService};
use crate::models::feedback::{AnalysisRecord, Feedback, FeedbackState, SchemaViolation};
use crate::stores::{DocumentStore, RecordStore, StoreError};

/// Stage labels emitted on the progress channel as the pipeline advances.
/// Observability only — correctness never depends on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Uploading,
    Converting,
    UploadingPreview,
    PersistingRecord,
    Analyzing,
    Parsing,
    PersistingFeedback,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Uploading => "uploading resume",
            PipelineStage::Converting => "converting to image",
            PipelineStage::UploadingPreview => "uploading preview image",
            PipelineStage::PersistingRecord => "saving record",
            PipelineStage::Analyzing => "analyzing resume",
            PipelineStage::Parsing => "reading analysis",
            PipelineStage::PersistingFeedback => "saving feedback",
            PipelineStage::Done => "analysis complete",
        };
        f.write_str(label)
    }
}

/// Per-submission progress reporting. `Progress::channel()` gives callers a
/// watch receiver; `Progress::disabled()` for callers that only want the
/// final result.
#[derive(Clone)]
pub struct Progress(Option<watch::Sender<PipelineStage>>);

impl Progress {
    pub fn channel() -> (Self, watch::Receiver<PipelineStage>) {
        let (tx, rx) = watch::channel(PipelineStage::Idle);
        (Self(Some(tx)), rx)
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    fn emit(&self, stage: PipelineStage) {
        info!(%stage, "pipeline stage");
        if let Some(tx) = &self.0 {
            // Receiver may have been dropped; progress is best-effort.
            let _ = tx.send(stage);
        }
    }
}

/// A feedback payload that decoded but violated the schema, or never decoded
/// at all. A bad payload is a hard stop — it is never persisted as feedback.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("malformed feedback JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),
}

/// Fatal, per-submission, stage-tagged errors. None are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} failed: {source}")]
    Upload {
        stage: PipelineStage,
        #[source]
        source: StoreError,
    },

    #[error("converting to image failed: {source}")]
    Conversion {
        #[source]
        source: RenderError,
    },

    #[error("{stage} failed: {source}")]
    Store {
        stage: PipelineStage,
        #[source]
        source: StoreError,
    },

    #[error("analyzing resume failed: {source}")]
    Analysis {
        #[source]
        source: AnalysisError,
    },

    #[error("reading analysis failed: {source}")]
    Validation {
        #[source]
        source: ValidationError,
    },
}

impl PipelineError {
    /// The stage at which the submission failed.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Upload { stage, .. } | PipelineError::Store { stage, .. } => *stage,
            PipelineError::Conversion { .. } => PipelineStage::Converting,
            PipelineError::Analysis { .. } => PipelineStage::Analyzing,
            PipelineError::Validation { .. } => PipelineStage::Parsing,
        }
    }
}

/// One submission's inputs. The three text fields are user-supplied free text
/// and may be empty.
#[derive(Debug, Clone)]
pub struct SubmitInput {
    pub document: Bytes,
    pub filename: String,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
}

/// The ingestion pipeline. All collaborators are injected so tests can swap
/// in doubles; cloning shares the underlying clients.
#[derive(Clone)]
pub struct Pipeline {
    documents: Arc<dyn DocumentStore>,
    records: Arc<dyn RecordStore>,
    renderer: Arc<dyn PreviewRenderer>,
    analysis: Arc<dyn AnalysisService>,
}

impl Pipeline {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        records: Arc<dyn RecordStore>,
        renderer: Arc<dyn PreviewRenderer>,
        analysis: Arc<dyn AnalysisService>,
    ) -> Self {
        Self {
            documents,
            records,
            renderer,
            analysis,
        }
    }

    /// Runs one submission through the full state machine and returns the
    /// finalized record. Stages run strictly in sequence; no stage starts
    /// before its predecessor's result is available.
    pub async fn submit(
        &self,
        input: SubmitInput,
        progress: &Progress,
    ) -> Result<AnalysisRecord, PipelineError> {
        progress.emit(PipelineStage::Uploading);
        let document = self
            .documents
            .upload(&input.document, &input.filename)
            .await
            .map_err(|source| PipelineError::Upload {
                stage: PipelineStage::Uploading,
                source,
            })?;

        progress.emit(PipelineStage::Converting);
        let preview = self
            .renderer
            .render(&input.document)
            .await
            .map_err(|source| PipelineError::Conversion { source })?;

        progress.emit(PipelineStage::UploadingPreview);
        let preview_file = self
            .documents
            .upload(&preview.bytes, &preview.filename)
            .await
            .map_err(|source| PipelineError::Upload {
                stage: PipelineStage::UploadingPreview,
                source,
            })?;

        // Recovery point: the unanalyzed record is durable before the
        // analysis call is attempted. A crash past this line still leaves a
        // discoverable record under resume:<id>.
        progress.emit(PipelineStage::PersistingRecord);
        let mut record = AnalysisRecord {
            id: Uuid::new_v4().to_string(),
            document_path: document.path,
            preview_image_path: preview_file.path,
            company_name: input.company_name,
            job_title: input.job_title,
            job_description: input.job_description,
            feedback: FeedbackState::Unanalyzed,
        };
        self.persist(&record, PipelineStage::PersistingRecord)
            .await?;

        // The analysis gets the document handle, not the preview.
        progress.emit(PipelineStage::Analyzing);
        let instructions = prepare_instructions(&record.job_title, &record.job_description);
        let reply = self
            .analysis
            .feedback(&record.document_path, &instructions)
            .await
            .map_err(|source| PipelineError::Analysis { source })?;

        progress.emit(PipelineStage::Parsing);
        let feedback = parse_feedback(reply)?;

        // Overwrite under the same key; last write wins, no merge.
        progress.emit(PipelineStage::PersistingFeedback);
        record.feedback = FeedbackState::Analyzed(feedback);
        self.persist(&record, PipelineStage::PersistingFeedback)
            .await?;

        progress.emit(PipelineStage::Done);
        info!(id = %record.id, "resume analysis complete");
        Ok(record)
    }

    async fn persist(
        &self,
        record: &AnalysisRecord,
        stage: PipelineStage,
    ) -> Result<(), PipelineError> {
        let value = serde_json::to_string(record).map_err(|e| PipelineError::Store {
            stage,
            source: StoreError::Backend(format!("record serialization failed: {e}")),
        })?;
        self.records
            .set(&record.key(), &value)
            .await
            .map_err(|source| PipelineError::Store { stage, source })
    }
}

/// Normalizes the reply content to one string, parses it as JSON, and
/// enforces the Feedback bounds. An empty reply counts as the analysis
/// returning no response.
fn parse_feedback(reply: AnalysisMessage) -> Result<Feedback, PipelineError> {
    let text = reply
        .message
        .content
        .into_text()
        .ok_or(PipelineError::Analysis {
            source: AnalysisError::EmptyResponse,
        })?;

    let text = strip_json_fences(&text);
    let feedback: Feedback = serde_json::from_str(text).map_err(|e| PipelineError::Validation {
        source: ValidationError::Json(e),
    })?;
    feedback
        .validate()
        .map_err(|violation| PipelineError::Validation {
            source: ValidationError::Schema(violation),
        })?;
    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::analysis::preview::RenderedPreview;
    use crate::analysis::service::{ContentPart, MessageBody, MessageContent};
    use crate::models::feedback::record_key;
    use crate::stores::memory::{MemoryDocumentStore, MemoryRecordStore};
    use crate::stores::StoredFile;

    const GOOD_FEEDBACK_JSON: &str = r#"{"overallScore":82,
        "toneAndStyle":{"score":90,"tips":[]},
        "content":{"score":75,"tips":[{"type":"improve","tip":"Add metrics","explanation":"Quantify impact."}]},
        "structure":{"score":80,"tips":[]},
        "skills":{"score":85,"tips":[]}}"#;

    struct StubRenderer;

    #[async_trait]
    impl PreviewRenderer for StubRenderer {
        async fn render(&self, _document: &[u8]) -> Result<RenderedPreview, RenderError> {
            Ok(RenderedPreview {
                bytes: vec![0x89, b'P', b'N', b'G'],
                filename: "preview.png".to_string(),
            })
        }
    }

    struct FailingRenderer;

    #[async_trait]
    impl PreviewRenderer for FailingRenderer {
        async fn render(&self, _document: &[u8]) -> Result<RenderedPreview, RenderError> {
            Err(RenderError::NoImage("converter offline".to_string()))
        }
    }

    /// Always replies with the configured content.
    struct StubAnalysis(MessageContent);

    #[async_trait]
    impl AnalysisService for StubAnalysis {
        async fn feedback(
            &self,
            _document_path: &str,
            _instructions: &str,
        ) -> Result<AnalysisMessage, AnalysisError> {
            Ok(AnalysisMessage {
                message: MessageBody {
                    content: self.0.clone(),
                },
            })
        }
    }

    struct FailingAnalysis;

    #[async_trait]
    impl AnalysisService for FailingAnalysis {
        async fn feedback(
            &self,
            _document_path: &str,
            _instructions: &str,
        ) -> Result<AnalysisMessage, AnalysisError> {
            Err(AnalysisError::EmptyResponse)
        }
    }

    struct FailingDocumentStore;

    #[async_trait]
    impl DocumentStore for FailingDocumentStore {
        async fn upload(&self, _bytes: &[u8], _filename: &str) -> Result<StoredFile, StoreError> {
            Err(StoreError::NoHandle)
        }

        async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::NotFound(path.to_string()))
        }
    }

    fn sample_input() -> SubmitInput {
        SubmitInput {
            document: Bytes::from_static(b"%PDF-1.7 five pages of resume"),
            filename: "resume.pdf".to_string(),
            company_name: "Acme".to_string(),
            job_title: "Backend Engineer".to_string(),
            job_description: "Go, distributed systems...".to_string(),
        }
    }

    struct Harness {
        documents: Arc<MemoryDocumentStore>,
        records: Arc<MemoryRecordStore>,
        pipeline: Pipeline,
    }

    fn harness(analysis: impl AnalysisService + 'static) -> Harness {
        harness_with(Arc::new(StubRenderer), analysis)
    }

    fn harness_with(
        renderer: Arc<dyn PreviewRenderer>,
        analysis: impl AnalysisService + 'static,
    ) -> Harness {
        let documents = Arc::new(MemoryDocumentStore::new());
        let records = Arc::new(MemoryRecordStore::new());
        let pipeline = Pipeline::new(
            documents.clone(),
            records.clone(),
            renderer,
            Arc::new(analysis),
        );
        Harness {
            documents,
            records,
            pipeline,
        }
    }

    async fn stored_record(records: &MemoryRecordStore, id: &str) -> AnalysisRecord {
        let value = records
            .get(&record_key(id))
            .await
            .unwrap()
            .expect("record present");
        serde_json::from_str(&value).expect("stored record decodes")
    }

    #[tokio::test]
    async fn test_submit_persists_analyzed_record() {
        let h = harness(StubAnalysis(MessageContent::Text(
            GOOD_FEEDBACK_JSON.to_string(),
        )));

        let record = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap();

        let feedback = match &record.feedback {
            FeedbackState::Analyzed(f) => f,
            FeedbackState::Unanalyzed => panic!("record not analyzed"),
        };
        assert_eq!(feedback.overall_score, 82);
        assert_eq!(feedback.content.tips.len(), 1);
        assert_eq!(feedback.content.tips[0].tip, "Add metrics");

        // Both uploads happened: original + preview.
        assert_eq!(h.documents.len(), 2);
        assert_ne!(record.document_path, record.preview_image_path);

        // The durable copy equals the returned record.
        let stored = stored_record(&h.records, &record.id).await;
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_parts_content_shape_is_normalized() {
        let h = harness(StubAnalysis(MessageContent::Parts(vec![ContentPart {
            text: GOOD_FEEDBACK_JSON.to_string(),
        }])));

        let record = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap();
        assert!(record.is_analyzed());
    }

    #[tokio::test]
    async fn test_fenced_json_reply_is_accepted() {
        let fenced = format!("```json\n{GOOD_FEEDBACK_JSON}\n```");
        let h = harness(StubAnalysis(MessageContent::Text(fenced)));

        let record = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap();
        assert!(record.is_analyzed());
    }

    #[tokio::test]
    async fn test_upload_failure_writes_no_record() {
        let records = Arc::new(MemoryRecordStore::new());
        let pipeline = Pipeline::new(
            Arc::new(FailingDocumentStore),
            records.clone(),
            Arc::new(StubRenderer),
            Arc::new(StubAnalysis(MessageContent::Text(
                GOOD_FEEDBACK_JSON.to_string(),
            ))),
        );

        let err = pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Upload { .. }));
        assert_eq!(err.stage(), PipelineStage::Uploading);
        assert!(records.is_empty(), "no record may be written");
    }

    #[tokio::test]
    async fn test_conversion_failure_carries_cause() {
        let h = harness_with(
            Arc::new(FailingRenderer),
            StubAnalysis(MessageContent::Text(GOOD_FEEDBACK_JSON.to_string())),
        );

        let err = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), PipelineStage::Converting);
        assert!(err.to_string().contains("converter offline"));
        assert!(h.records.is_empty());
    }

    #[tokio::test]
    async fn test_analysis_failure_leaves_durable_unanalyzed_record() {
        let h = harness(FailingAnalysis);

        let err = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Analyzing);

        // The recovery point held: exactly one record, still unanalyzed.
        let entries = h.records.list("resume:").await.unwrap();
        assert_eq!(entries.len(), 1);
        let stored: AnalysisRecord = serde_json::from_str(&entries[0].value).unwrap();
        assert_eq!(stored.feedback, FeedbackState::Unanalyzed);
        assert_eq!(stored.company_name, "Acme");
    }

    #[tokio::test]
    async fn test_malformed_json_reply_is_a_validation_error() {
        let h = harness(StubAnalysis(MessageContent::Text(
            "I think this resume is great!".to_string(),
        )));

        let err = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Parsing);
        assert!(matches!(err, PipelineError::Validation { .. }));

        // Hard stop: the stored record stays unanalyzed.
        let entries = h.records.list("resume:").await.unwrap();
        let stored: AnalysisRecord = serde_json::from_str(&entries[0].value).unwrap();
        assert_eq!(stored.feedback, FeedbackState::Unanalyzed);
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_rejected_at_parsing() {
        let bad = GOOD_FEEDBACK_JSON.replace("\"overallScore\":82", "\"overallScore\":182");
        let h = harness(StubAnalysis(MessageContent::Text(bad)));

        let err = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Parsing);

        let entries = h.records.list("resume:").await.unwrap();
        let stored: AnalysisRecord = serde_json::from_str(&entries[0].value).unwrap();
        assert!(!stored.is_analyzed(), "bad payload must never be persisted");
    }

    #[tokio::test]
    async fn test_unknown_tip_type_is_rejected_at_parsing() {
        let bad = GOOD_FEEDBACK_JSON.replace("\"type\":\"improve\"", "\"type\":\"neutral\"");
        let h = harness(StubAnalysis(MessageContent::Text(bad)));

        let err = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_missing_category_is_rejected_at_parsing() {
        let bad =
            GOOD_FEEDBACK_JSON.replace("\"skills\":{\"score\":85,\"tips\":[]}", "\"skills\":null");
        let h = harness(StubAnalysis(MessageContent::Text(bad)));

        let err = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), PipelineStage::Parsing);
    }

    #[tokio::test]
    async fn test_empty_parts_reply_is_an_analysis_error() {
        let h = harness(StubAnalysis(MessageContent::Parts(vec![])));

        let err = h
            .pipeline
            .submit(sample_input(), &Progress::disabled())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Analysis {
                source: AnalysisError::EmptyResponse
            }
        ));
    }

    #[tokio::test]
    async fn test_progress_reaches_done_on_success() {
        let h = harness(StubAnalysis(MessageContent::Text(
            GOOD_FEEDBACK_JSON.to_string(),
        )));
        let (progress, rx) = Progress::channel();

        h.pipeline.submit(sample_input(), &progress).await.unwrap();
        assert_eq!(*rx.borrow(), PipelineStage::Done);
    }

    #[tokio::test]
    async fn test_progress_stops_at_failing_stage() {
        let h = harness(FailingAnalysis);
        let (progress, rx) = Progress::channel();

        let err = h
            .pipeline
            .submit(sample_input(), &progress)
            .await
            .unwrap_err();
        assert_eq!(*rx.borrow(), PipelineStage::Analyzing);
        assert_eq!(err.stage(), PipelineStage::Analyzing);
    }
}
