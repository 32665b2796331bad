// Remote classifier - HTTP client for the CNN inference server
use crate::application::classifier_port::{ClassifierError, ClassifierPort, ModelHandle};
use crate::domain::frame::Frame;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RemoteClassifier {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct LoadModelRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoadModelResponse {
    model: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    label: String,
}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        ClassifierError::Request(e.to_string())
    }
}

impl RemoteClassifier {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn try_predict(
        &self,
        frame: &Frame,
        model: &ModelHandle,
        labels_path: &Path,
    ) -> Result<String, ClassifierError> {
        let labels = labels_path.display().to_string();
        let width = frame.width.to_string();
        let height = frame.height.to_string();
        let response = self
            .client
            .post(format!("{}/predict", self.endpoint))
            .query(&[
                ("model", model.id()),
                ("labels", labels.as_str()),
                ("width", width.as_str()),
                ("height", height.as_str()),
            ])
            .header("Content-Type", "application/octet-stream")
            .body(frame.pixels.clone())
            .send()
            .await?;

        let body: PredictResponse = decode(response).await?;
        Ok(body.label)
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClassifierError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClassifierError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClassifierError::Decode(e.to_string()))
}

#[async_trait]
impl ClassifierPort for RemoteClassifier {
    async fn load_model(&self, model_path: &Path) -> Result<ModelHandle, ClassifierError> {
        let path = model_path.display().to_string();
        let response = self
            .client
            .post(format!("{}/models", self.endpoint))
            .json(&LoadModelRequest { path: &path })
            .send()
            .await?;

        let body: LoadModelResponse = decode(response).await?;
        tracing::info!("Inference server loaded {} as {}", path, body.model);
        Ok(ModelHandle::new(body.model))
    }

    async fn predict(&self, frame: &Frame, model: &ModelHandle, labels_path: &Path) -> String {
        match self.try_predict(frame, model, labels_path).await {
            Ok(label) => label,
            Err(e) => {
                // Empty label maps to a stop
                tracing::warn!("Classification failed: {}", e);
                String::new()
            }
        }
    }
}
