use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::difficulty::Difficulty;

/// Predicts a difficulty label from question text alone.
#[async_trait]
pub trait DifficultyClassifier: Send + Sync {
    async fn classify(&self, question_text: &str) -> Result<Difficulty>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    question_text: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the external prediction service.
#[derive(Clone)]
pub struct HttpClassifier {
    client: Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build classifier client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DifficultyClassifier for HttpClassifier {
    async fn classify(&self, question_text: &str) -> Result<Difficulty> {
        let res = self
            .client
            .post(&self.url)
            .json(&PredictRequest { question_text })
            .send()
            .await?;

        let status = res.status();
        let body: PredictResponse = res.json().await.map_err(|e| {
            Error::UpstreamUnavailable(format!(
                "Unreadable classifier response (HTTP {}): {}",
                status, e
            ))
        })?;

        if let Some(err) = body.error.filter(|e| !e.is_empty()) {
            return Err(Error::UpstreamUnavailable(format!(
                "Classifier error: {}",
                err
            )));
        }
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "Classifier returned HTTP {}",
                status
            )));
        }

        let label = body.difficulty.ok_or_else(|| {
            Error::UpstreamUnavailable("Classifier response has no difficulty".to_string())
        })?;
        label.parse().map_err(|_| {
            Error::UpstreamUnavailable(format!("Classifier returned unknown label '{}'", label))
        })
    }
}
