// Classifier port - image-to-label inference engine
use crate::domain::frame::Frame;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("inference request failed: {0}")]
    Request(String),

    #[error("inference server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode inference response: {0}")]
    Decode(String),
}

/// A loaded model. Read-only once created and cheap to clone across frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    id: Arc<str>,
}

impl ModelHandle {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
pub trait ClassifierPort: Send + Sync {
    /// Load the model once per session.
    async fn load_model(&self, model_path: &Path) -> Result<ModelHandle, ClassifierError>;

    /// Classify one frame. Must not fail: an unclassifiable frame yields an empty label.
    async fn predict(&self, frame: &Frame, model: &ModelHandle, labels_path: &Path) -> String;
}
