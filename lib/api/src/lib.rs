//! # labelscan API
//!
//! HTTP surface of the label scanner: scan endpoints for webservice
//! clients, operator catalog endpoints behind bearer tokens, one-shot PSID
//! reader links and image serving.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod images;
pub mod ocr;
pub mod rest;
pub mod scan;

pub use auth::{BearerAuth, TokenRegistry, WebserviceClient};
pub use config::{BearerConfig, OcrConfig, ServerConfig, WebserviceConfig};
pub use error::ApiError;
pub use images::ImageStore;
pub use ocr::{HttpOcrClient, OcrProvider, OcrRequest, OcrResponse};
pub use rest::{AppState, RestApi};
pub use scan::{PsidReading, ScanOutcome, ScanRequest, ScanService, UploadedImage};
