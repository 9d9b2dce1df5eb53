use labelscan_core::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Everything the HTTP layer needs, resolved by the binary from flags and
/// environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Public origin used to build image URLs
    pub base_url: String,
    pub upload_dir: PathBuf,
    pub ocr: OcrConfig,
    pub webservice: WebserviceConfig,
    pub bearer: BearerConfig,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub api_url: String,
    pub api_key: String,
    /// Header carrying `api_key` on scan calls
    pub api_header: String,
    /// Proxy used for scan calls only
    pub proxy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WebserviceConfig {
    pub header_key: String,
    pub api_key: String,
    pub allowed_ips: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BearerConfig {
    /// File of accepted token digests; no file means no bearer access
    pub tokens_file: Option<PathBuf>,
    pub refresh_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            ocr: OcrConfig {
                api_url: "http://localhost:8000".to_string(),
                api_key: String::new(),
                api_header: "X-API-Key".to_string(),
                proxy: None,
            },
            webservice: WebserviceConfig {
                header_key: "X-API-Key".to_string(),
                api_key: String::new(),
                allowed_ips: Vec::new(),
            },
            bearer: BearerConfig {
                tokens_file: None,
                refresh_interval: Duration::from_secs(300),
            },
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ocr.api_url.trim().is_empty() {
            return Err(Error::InvalidConfig("OCR API URL is required".to_string()));
        }
        if self.ocr.api_header.trim().is_empty() || self.webservice.header_key.trim().is_empty() {
            return Err(Error::InvalidConfig("API key header names must not be empty".to_string()));
        }
        if self.bearer.refresh_interval.is_zero() {
            return Err(Error::InvalidConfig("bearer refresh interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Split a comma-separated allow-list
    pub fn parse_ip_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .collect()
    }
}
