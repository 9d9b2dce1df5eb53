//! Embedding providers.
//!
//! The index only needs "text in, vector out"; [`OpenAiEmbedder`] is the
//! production implementation and talks to any OpenAI-compatible
//! `/embeddings` endpoint.

use async_trait::async_trait;
use labelscan_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "embedding provider";

/// Default model used for field-name embeddings
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Default reduced dimensionality requested from the provider
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 999;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embeddings client for OpenAI-compatible endpoints
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("missing embedding API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| Error::InvalidConfig("invalid embedding API key".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build embedding client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
            dimensions,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::upstream(SERVICE, format!("HTTP {}: {}", status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::decode("embedding response", e))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| Error::decode("embedding response", "no embeddings returned"))
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::UpstreamTimeout { service: SERVICE }
    } else {
        Error::upstream(SERVICE, err)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = OpenAiEmbedder::new(
            "  ",
            "https://api.openai.com/v1",
            DEFAULT_EMBEDDING_MODEL,
            None,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let embedder = OpenAiEmbedder::new(
            "sk-test",
            "http://localhost:9000/v1/",
            DEFAULT_EMBEDDING_MODEL,
            Some(DEFAULT_EMBEDDING_DIMENSIONS),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(embedder.endpoint, "http://localhost:9000/v1/embeddings");
        assert_eq!(embedder.model(), DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn test_request_omits_missing_dimensions() {
        let request = EmbeddingRequest {
            model: "m",
            input: "serial",
            dimensions: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"model": "m", "input": "serial"}));
    }
}
