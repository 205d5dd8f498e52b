//! Off-chain metadata storage

pub mod pinata;

use async_trait::async_trait;
use thiserror::Error;

pub use pinata::PinataClient;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Metadata storage is not configured: {0}")]
    NotConfigured(String),

    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected upload response: {0}")]
    InvalidResponse(String),
}

impl StorageError {
    /// Failures worth retrying: transport errors, throttling, and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// Content-addressed store returning a durable URI per upload.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn upload_file(&self, file: FileUpload) -> Result<String, StorageError>;

    async fn upload_json(&self, name: &str, content: &serde_json::Value) -> Result<String, StorageError>;
}
