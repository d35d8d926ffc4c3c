//! HTTP client for the QA service, used by the chat front end.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::BotConfig;

/// Fields the front end reads from a `/predict` response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PredictReply {
    pub answer: String,
    pub score: f32,
    #[serde(default)]
    pub context: Option<String>,
}

/// What `/stats` returned.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsReply {
    Image(Vec<u8>),
    Message(String),
}

/// The operations the bot needs from the QA service.
#[async_trait]
pub trait QaBackend: Send + Sync {
    async fn predict(&self, question: &str) -> Result<PredictReply>;
    async fn stats(&self) -> Result<StatsReply>;
}

pub struct QaClient {
    base_url: String,
    client: reqwest::Client,
}

impl QaClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self> {
        Self::new(
            config.resolved_api_url(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QaBackend for QaClient {
    async fn predict(&self, question: &str) -> Result<PredictReply> {
        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&serde_json::json!({ "question": question }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("QA service returned {}: {}", status, body);
        }
        response
            .json()
            .await
            .context("Invalid /predict response")
    }

    async fn stats(&self) -> Result<StatsReply> {
        let response = self
            .client
            .get(format!("{}/stats", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("QA service returned {}: {}", status, body);
        }

        let is_image = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("image/"))
            .unwrap_or(false);

        if is_image {
            Ok(StatsReply::Image(response.bytes().await?.to_vec()))
        } else {
            let json: serde_json::Value =
                response.json().await.context("Invalid /stats response")?;
            let message = json
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("No stats available.")
                .to_string();
            Ok(StatsReply::Message(message))
        }
    }
}
