use actix_web::web;
use clap::Parser;
use labelscan_api::{
    AppState, BearerConfig, HttpOcrClient, ImageStore, OcrConfig, RestApi, ScanService,
    ServerConfig, TokenRegistry, WebserviceConfig,
};
use labelscan_matching::{
    EmbeddingIndex, EmbeddingProvider, FieldMatcher, Normalizer, OpenAiEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};
use labelscan_storage::{InventoryManager, LmdbStore, PsidRequests};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(30);

/// Hardware label scanning backend
#[derive(Parser, Debug)]
#[command(name = "labelscan")]
#[command(about = "OCR label scanning and hardware inventory service", long_about = None)]
struct Args {
    /// HTTP API port
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Public origin used in image URLs
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Path to the data directory
    #[arg(short, long, env = "DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Directory for uploaded label images
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads")]
    upload_dir: PathBuf,

    #[arg(long, env = "OCR_API_URL", default_value = "http://localhost:8000")]
    ocr_api_url: String,

    #[arg(long, env = "OCR_API_KEY", default_value = "")]
    ocr_api_key: String,

    #[arg(long, env = "OCR_API_HEADER", default_value = "X-API-Key")]
    ocr_api_header: String,

    #[arg(long, env = "PROXY_URL")]
    proxy_url: Option<String>,

    /// Send OCR scan calls through the proxy
    #[arg(long, env = "PROXY_SCAN", default_value_t = false)]
    proxy_scan: bool,

    /// Embedding cache file, defaults to <data_dir>/vectors.json
    #[arg(long, env = "VECTORS_FILE")]
    vectors_file: Option<PathBuf>,

    /// Without a key only cached embeddings are used
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    #[arg(long, env = "WEBSERVICE_HEADER_KEY", default_value = "X-API-Key")]
    webservice_header_key: String,

    #[arg(long, env = "WEBSERVICE_API_KEY", default_value = "")]
    webservice_api_key: String,

    /// Comma-separated client addresses allowed on webservice routes
    #[arg(long, env = "WEBSERVICE_ALLOWED_IPS", default_value = "")]
    webservice_allowed_ips: String,

    /// File of accepted bearer token SHA-256 digests
    #[arg(long, env = "BEARER_TOKENS_FILE")]
    bearer_tokens_file: Option<PathBuf>,

    #[arg(long, env = "BEARER_REFRESH_SECS", default_value_t = 300)]
    bearer_refresh_secs: u64,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            base_url: self.base_url.clone(),
            upload_dir: self.upload_dir.clone(),
            ocr: OcrConfig {
                api_url: self.ocr_api_url.clone(),
                api_key: self.ocr_api_key.clone(),
                api_header: self.ocr_api_header.clone(),
                proxy: self.proxy_url.clone().filter(|_| self.proxy_scan),
            },
            webservice: WebserviceConfig {
                header_key: self.webservice_header_key.clone(),
                api_key: self.webservice_api_key.clone(),
                allowed_ips: ServerConfig::parse_ip_list(&self.webservice_allowed_ips),
            },
            bearer: BearerConfig {
                tokens_file: self.bearer_tokens_file.clone(),
                refresh_interval: Duration::from_secs(self.bearer_refresh_secs),
            },
        }
    }

    fn embedder(&self) -> anyhow::Result<Option<Arc<dyn EmbeddingProvider>>> {
        let key = match self.openai_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Ok(None),
        };
        let embedder = OpenAiEmbedder::new(
            key,
            &self.openai_base_url,
            self.embedding_model.clone(),
            Some(self.embedding_dimensions),
            EMBEDDING_TIMEOUT,
        )?;
        Ok(Some(Arc::new(embedder)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},actix_web=info", args.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.server_config();
    config.validate()?;

    info!("Starting labelscan v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", args.data_dir);
    info!("Upload directory: {:?}", config.upload_dir);
    info!("HTTP API port: {}", config.port);

    std::fs::create_dir_all(&args.data_dir)?;
    let store = Arc::new(LmdbStore::open(args.data_dir.join("lmdb"))?);
    info!("Storage initialized");

    let embedder = args.embedder()?;
    if embedder.is_none() {
        warn!("No embedding API key configured, unknown OCR keys will land in extra fields");
    }
    let vectors_file = args
        .vectors_file
        .clone()
        .unwrap_or_else(|| args.data_dir.join("vectors.json"));
    let index = Arc::new(EmbeddingIndex::open(&vectors_file, embedder)?);

    let tokens = match &config.bearer.tokens_file {
        Some(path) => {
            let registry = Arc::new(TokenRegistry::from_file(path)?);
            info!("Loaded {} bearer tokens", registry.len());
            registry.clone().spawn_refresh(config.bearer.refresh_interval);
            registry
        }
        None => {
            warn!("No bearer tokens file configured, catalog routes will reject every call");
            Arc::new(TokenRegistry::from_digests(Vec::<String>::new()))
        }
    };

    let inventory = InventoryManager::new(store.clone());
    let scan = ScanService::new(
        Arc::new(HttpOcrClient::new(&config.ocr)?),
        Normalizer::new(FieldMatcher::new(index)),
        inventory.clone(),
        Arc::new(ImageStore::new(&config.upload_dir, &config.base_url)?),
    );
    let state = web::Data::new(AppState {
        scan,
        inventory,
        requests: PsidRequests::new(store),
    });
    let webservice = web::Data::new(config.webservice.clone());
    let tokens = web::Data::from(tokens);

    let http_port = config.port;
    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on port {}", http_port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(state, webservice, tokens, http_port).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    info!("labelscan started successfully");
    info!("HTTP API: http://localhost:{}/", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
