//! Request guards.
//!
//! Both guards are extractors: a handler that takes [`WebserviceClient`] or
//! [`BearerAuth`] as an argument only runs once the check has passed.

use crate::config::WebserviceConfig;
use crate::error::ApiError;
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use labelscan_core::{Error, Result};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const INVALID_API_KEY: &str = "Invalid API key";
pub const INVALID_IP: &str = "invalid IP address";

/// Addresses a request claims to come from: `X-Forwarded-For` entries if
/// present, otherwise the peer address.
pub fn client_ips(req: &HttpRequest) -> Vec<String> {
    let forwarded = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if !forwarded.is_empty() {
        return forwarded;
    }
    req.peer_addr()
        .map(|addr| vec![addr.ip().to_string()])
        .unwrap_or_default()
}

/// Caller that passed the webservice API-key and IP allow-list check
#[derive(Debug, Clone)]
pub struct WebserviceClient {
    pub ip: String,
}

impl WebserviceClient {
    fn check(req: &HttpRequest) -> Result<Self> {
        let config = req
            .app_data::<web::Data<WebserviceConfig>>()
            .ok_or_else(|| Error::InvalidConfig("webservice guard is not configured".to_string()))?;

        let provided = req
            .headers()
            .get(config.header_key.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided.is_empty() || config.api_key.is_empty() || provided != config.api_key {
            return Err(Error::Unauthorized(INVALID_API_KEY.to_string()));
        }

        let ips = client_ips(req);
        match ips.into_iter().find(|ip| config.allowed_ips.contains(ip)) {
            Some(ip) => Ok(Self { ip }),
            None => {
                warn!("Rejected webservice call from disallowed address");
                Err(Error::Unauthorized(INVALID_IP.to_string()))
            }
        }
    }
}

impl FromRequest for WebserviceClient {
    type Error = ApiError;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Self::check(req).map_err(ApiError::from))
    }
}

/// Accepted bearer tokens, stored as SHA-256 hex digests.
///
/// Shared read-mostly; [`TokenRegistry::spawn_refresh`] reloads the backing
/// file periodically so tokens can be rotated without a restart.
pub struct TokenRegistry {
    digests: RwLock<HashSet<String>>,
    path: Option<PathBuf>,
}

impl TokenRegistry {
    /// Registry with no backing file
    pub fn from_digests<I, S>(digests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            digests: RwLock::new(
                digests
                    .into_iter()
                    .map(|d| d.into().to_ascii_lowercase())
                    .collect(),
            ),
            path: None,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let registry = Self {
            digests: RwLock::new(HashSet::new()),
            path: Some(path.as_ref().to_path_buf()),
        };
        registry.reload()?;
        Ok(registry)
    }

    pub fn digest(token: &str) -> String {
        format!("{:x}", Sha256::digest(token.as_bytes()))
    }

    pub fn accepts(&self, token: &str) -> bool {
        self.digests.read().contains(&Self::digest(token))
    }

    pub fn len(&self) -> usize {
        self.digests.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.read().is_empty()
    }

    /// Re-read the backing file; a registry without one is left unchanged
    pub fn reload(&self) -> Result<usize> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(self.len()),
        };
        let content = std::fs::read_to_string(path)?;
        let digests = parse_digests(&content);
        let count = digests.len();
        *self.digests.write() = digests;
        debug!("Loaded {} bearer token digests from {:?}", count, path);
        Ok(count)
    }

    /// Reload the registry every `interval` until the runtime shuts down.
    /// A failed reload keeps the previous token set.
    pub fn spawn_refresh(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.reload() {
                    warn!("Bearer token refresh failed: {}", e);
                }
            }
        })
    }
}

fn parse_digests(content: &str) -> HashSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Caller holding an accepted bearer token
#[derive(Debug, Clone)]
pub struct BearerAuth {
    pub digest: String,
}

impl BearerAuth {
    fn check(req: &HttpRequest) -> Result<Self> {
        let registry = req
            .app_data::<web::Data<TokenRegistry>>()
            .ok_or_else(|| Error::InvalidConfig("token registry is not configured".to_string()))?;

        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("Missing Authorization header".to_string()))?;

        let token = match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
                token.trim()
            }
            _ => {
                return Err(Error::Unauthorized(
                    "Invalid Authorization header format".to_string(),
                ))
            }
        };

        if !registry.accepts(token) {
            info!("Rejected unknown bearer token");
            return Err(Error::Unauthorized("Invalid token".to_string()));
        }
        Ok(Self {
            digest: TokenRegistry::digest(token),
        })
    }
}

impl FromRequest for BearerAuth {
    type Error = ApiError;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Self::check(req).map_err(ApiError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn webservice_config() -> web::Data<WebserviceConfig> {
        web::Data::new(WebserviceConfig {
            header_key: "X-API-Key".to_string(),
            api_key: "secret".to_string(),
            allowed_ips: vec!["10.0.0.5".to_string()],
        })
    }

    #[test]
    fn test_client_ips_prefers_forwarded_for() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "10.0.0.5, 192.168.1.1"))
            .peer_addr("127.0.0.1:9000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ips(&req), vec!["10.0.0.5", "192.168.1.1"]);

        let req = TestRequest::default()
            .peer_addr("127.0.0.1:9000".parse().unwrap())
            .to_http_request();
        assert_eq!(client_ips(&req), vec!["127.0.0.1"]);
    }

    #[test]
    fn test_webservice_guard() {
        let ok = TestRequest::default()
            .app_data(webservice_config())
            .insert_header(("X-API-Key", "secret"))
            .insert_header(("X-Forwarded-For", "1.1.1.1, 10.0.0.5"))
            .to_http_request();
        assert_eq!(WebserviceClient::check(&ok).unwrap().ip, "10.0.0.5");

        let bad_key = TestRequest::default()
            .app_data(webservice_config())
            .insert_header(("X-API-Key", "nope"))
            .insert_header(("X-Forwarded-For", "10.0.0.5"))
            .to_http_request();
        match WebserviceClient::check(&bad_key) {
            Err(Error::Unauthorized(msg)) => assert_eq!(msg, INVALID_API_KEY),
            other => panic!("unexpected {:?}", other),
        }

        let bad_ip = TestRequest::default()
            .app_data(webservice_config())
            .insert_header(("X-API-Key", "secret"))
            .peer_addr("8.8.8.8:1234".parse().unwrap())
            .to_http_request();
        match WebserviceClient::check(&bad_ip) {
            Err(Error::Unauthorized(msg)) => assert_eq!(msg, INVALID_IP),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bearer_guard() {
        let registry = web::Data::new(TokenRegistry::from_digests([TokenRegistry::digest("tok-1")]));

        let ok = TestRequest::default()
            .app_data(registry.clone())
            .insert_header((AUTHORIZATION, "Bearer tok-1"))
            .to_http_request();
        assert!(BearerAuth::check(&ok).is_ok());

        for header in ["Bearer tok-2", "Basic tok-1", "Bearer "] {
            let req = TestRequest::default()
                .app_data(registry.clone())
                .insert_header((AUTHORIZATION, header))
                .to_http_request();
            assert!(matches!(BearerAuth::check(&req), Err(Error::Unauthorized(_))));
        }

        let missing = TestRequest::default().app_data(registry).to_http_request();
        assert!(matches!(BearerAuth::check(&missing), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_registry_file_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens");
        std::fs::write(&path, format!("# accepted\n{}\n\n", TokenRegistry::digest("a"))).unwrap();

        let registry = TokenRegistry::from_file(&path).unwrap();
        assert!(registry.accepts("a"));
        assert!(!registry.accepts("b"));

        std::fs::write(&path, TokenRegistry::digest("b").to_uppercase()).unwrap();
        assert_eq!(registry.reload().unwrap(), 1);
        assert!(registry.accepts("b"));
        assert!(!registry.accepts("a"));
    }
}
