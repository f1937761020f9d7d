
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::LlmConfig;

/// Client for an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    endpoint: Url,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint("embeddings")
            .context("Failed to build embeddings URL from config")?;
        let api_key = config.resolve_api_key()?;

        Ok(Self {
            endpoint,
            api_key,
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension as usize,
            batch_size: (config.batch_size as usize).max(1),
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed `texts`, returning one vector per input in input order.
    ///
    /// Any failure fails the whole call.
    #[inline]
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts with {} (batch size {})",
            texts.len(),
            self.model,
            self.batch_size
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self
                .embed_batch(batch)
                .with_context(|| format!("Failed to embed batch of {} texts", batch.len()))?;
            vectors.extend(batch_vectors);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }

    fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: batch,
            encoding_format: "float",
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;

        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send(&request_json)
            .with_context(|| format!("Embedding request to {} failed", self.endpoint))?;

        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read embedding response")?;

        if !status.is_success() {
            warn!("Embedding endpoint returned {}: {}", status, body);
            anyhow::bail!("Embedding API error: HTTP {}: {}", status.as_u16(), body);
        }

        let parsed: EmbeddingResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        order_vectors(parsed, batch.len(), self.dimension)
    }
}

fn order_vectors(
    response: EmbeddingResponse,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    anyhow::ensure!(
        data.len() == expected,
        "Mismatch between request and response counts: {} vs {}",
        expected,
        data.len()
    );

    data.sort_by_key(|item| item.index);

    for (position, item) in data.iter().enumerate() {
        anyhow::ensure!(
            item.index == position,
            "Embedding response is missing index {}",
            position
        );
        anyhow::ensure!(
            item.embedding.len() == dimension,
            "Embedding dimension mismatch: expected {}, got {}",
            dimension,
            item.embedding.len()
        );
    }

    Ok(data.into_iter().map(|item| item.embedding).collect())
}
