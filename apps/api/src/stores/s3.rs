use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;
use uuid::Uuid;

use crate::stores::{DocumentStore, StoreError, StoredFile};

/// DocumentStore backed by S3 (or MinIO locally). Each upload gets a unique
/// key so handles are never reused or overwritten.
pub struct S3DocumentStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3DocumentStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl DocumentStore for S3DocumentStore {
    async fn upload(&self, bytes: &[u8], filename: &str) -> Result<StoredFile, StoreError> {
        let key = format!("uploads/{}/{}", Uuid::new_v4(), sanitize_filename(filename));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type_for(filename))
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 upload failed: {e}")))?;

        debug!(
            "Uploaded {} bytes to s3://{}/{}",
            bytes.len(),
            self.bucket,
            key
        );

        Ok(StoredFile { path: key })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StoreError::NotFound(path.to_string())
                } else {
                    StoreError::Backend(format!("S3 read failed: {service_error}"))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend(format!("S3 body read failed: {e}")))?;

        Ok(data.into_bytes().to_vec())
    }
}

/// Keeps object keys predictable: alphanumerics, dot, dash, underscore.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_path_separators() {
        assert_eq!(sanitize_filename("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_filename("my resume.pdf"), "my_resume.pdf");
        assert_eq!(sanitize_filename(""), "upload.bin");
    }

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for("resume.PDF"), "application/pdf");
        assert_eq!(content_type_for("preview.png"), "image/png");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }
}
