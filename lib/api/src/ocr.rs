//! OCR provider client.

use crate::config::OcrConfig;
use async_trait::async_trait;
use labelscan_core::{Error, RawOcrFields, Result};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "OCR service";

pub const SINGLE_IMAGE_TIMEOUT: Duration = Duration::from_secs(30);
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(120);
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
pub struct OcrRequest {
    /// Base64 payloads without a data-URL prefix
    pub images: Vec<String>,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub image_type: String,
    pub inventory_id: String,
}

impl OcrRequest {
    pub fn timeout(&self) -> Duration {
        if self.images.len() > 1 {
            BATCH_TIMEOUT
        } else {
            SINGLE_IMAGE_TIMEOUT
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: RawOcrFields,
    #[serde(default)]
    pub timestamp: String,
}

#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn scan(&self, request: &OcrRequest) -> Result<OcrResponse>;

    /// Ok when the provider answers the way a live instance does
    async fn health(&self) -> Result<()>;
}

pub struct HttpOcrClient {
    client: reqwest::Client,
    scan_client: reqwest::Client,
    api_url: String,
    header: HeaderName,
    key: HeaderValue,
}

impl HttpOcrClient {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let header = HeaderName::from_bytes(config.api_header.as_bytes())
            .map_err(|_| Error::InvalidConfig(format!("invalid header name {:?}", config.api_header)))?;
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| Error::InvalidConfig("invalid OCR API key".to_string()))?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build OCR client: {}", e)))?;

        let scan_client = match &config.proxy {
            Some(proxy) => {
                let proxy = reqwest::Proxy::all(proxy.as_str())
                    .map_err(|e| Error::InvalidConfig(format!("invalid proxy URL: {}", e)))?;
                info!("Routing OCR scans through proxy");
                reqwest::Client::builder()
                    .proxy(proxy)
                    .build()
                    .map_err(|e| Error::InvalidConfig(format!("failed to build OCR client: {}", e)))?
            }
            None => client.clone(),
        };

        Ok(Self {
            client,
            scan_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            header,
            key,
        })
    }
}

#[async_trait]
impl OcrProvider for HttpOcrClient {
    async fn scan(&self, request: &OcrRequest) -> Result<OcrResponse> {
        debug!(
            "Sending {} image(s) to OCR, type {:?}",
            request.images.len(),
            request.image_type
        );

        let response = self
            .scan_client
            .post(format!("{}/scan", self.api_url))
            .header(self.header.clone(), self.key.clone())
            .timeout(request.timeout())
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(Error::upstream(
                SERVICE,
                format!("HTTP {}: {}", status, String::from_utf8_lossy(&body)),
            ));
        }

        serde_json::from_slice(&body).map_err(|e| Error::decode("OCR response", e))
    }

    async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.api_url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(map_transport_error)?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::decode("OCR health response", e))?;
        check_health_body(&body)
    }
}

/// A live OCR service answers `GET /` with `{"detail": "Not Found"}`
fn check_health_body(body: &serde_json::Value) -> Result<()> {
    if body.get("detail").and_then(|d| d.as_str()) == Some("Not Found") {
        Ok(())
    } else {
        Err(Error::upstream(SERVICE, "unexpected health response"))
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::UpstreamTimeout { service: SERVICE }
    } else {
        Error::upstream(SERVICE, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(images: usize, image_type: &str) -> OcrRequest {
        OcrRequest {
            images: vec!["aGVsbG8=".to_string(); images],
            image_type: image_type.to_string(),
            inventory_id: "INV-1".to_string(),
        }
    }

    #[test]
    fn test_timeout_depends_on_batch_size() {
        assert_eq!(request(1, "hard").timeout(), SINGLE_IMAGE_TIMEOUT);
        assert_eq!(request(3, "hard").timeout(), BATCH_TIMEOUT);
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_value(request(1, "hard")).unwrap();
        assert_eq!(
            body,
            json!({"images": ["aGVsbG8="], "type": "hard", "inventory_id": "INV-1"})
        );

        let body = serde_json::to_value(request(1, "")).unwrap();
        assert!(body.get("type").is_none());
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let response: OcrResponse = serde_json::from_value(json!({"data": {"psid": "P1"}})).unwrap();
        assert_eq!(response.data.get("psid"), Some(&json!("P1")));
        assert!(response.status.is_empty());
    }

    #[test]
    fn test_health_body() {
        assert!(check_health_body(&json!({"detail": "Not Found"})).is_ok());
        assert!(matches!(
            check_health_body(&json!({"status": "ok"})),
            Err(Error::UpstreamUnavailable { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_header_name() {
        let config = OcrConfig {
            api_url: "http://localhost:8000".to_string(),
            api_key: "k".to_string(),
            api_header: "bad header".to_string(),
            proxy: None,
        };
        assert!(matches!(HttpOcrClient::new(&config), Err(Error::InvalidConfig(_))));
    }
}
