//! Preview conversion collaborator: turns the first page of an uploaded
//! document into a raster image. The conversion itself is external — this
//! module only owns the contract and the HTTP client for it.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("renderer produced no image: {0}")]
    NoImage(String),
}

pub struct RenderedPreview {
    pub bytes: Vec<u8>,
    pub filename: String,
}

#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    async fn render(&self, document: &[u8]) -> Result<RenderedPreview, RenderError>;
}

/// Posts the raw PDF to a converter endpoint and expects PNG bytes back.
pub struct HttpPreviewRenderer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPreviewRenderer {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint,
        }
    }
}

#[async_trait]
impl PreviewRenderer for HttpPreviewRenderer {
    async fn render(&self, document: &[u8]) -> Result<RenderedPreview, RenderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/pdf")
            .body(document.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RenderError::NoImage(format!(
                "converter returned {status}: {body}"
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(RenderError::NoImage("converter returned empty body".to_string()));
        }

        debug!("Rendered preview image ({} bytes)", bytes.len());

        Ok(RenderedPreview {
            bytes: bytes.to_vec(),
            filename: "preview.png".to_string(),
        })
    }
}
