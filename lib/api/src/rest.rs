use crate::auth::{BearerAuth, TokenRegistry, WebserviceClient};
use crate::catalog;
use crate::config::WebserviceConfig;
use crate::error::ApiError;
use crate::scan::{ScanRequest, ScanService, UploadedImage};
use actix_cors::Cors;
use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer};
use futures_util::StreamExt;
use labelscan_core::{Error, NaturalKey, NewRecord, RecordEdit, RecordId, RecordQuery};
use labelscan_matching::SenderContext;
use labelscan_storage::{InventoryManager, PsidRequests};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

type ApiResult<T> = Result<T, ApiError>;

const MAX_JSON_BYTES: usize = 64 * 1024 * 1024;
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared services behind every handler
pub struct AppState {
    pub scan: ScanService,
    pub inventory: InventoryManager,
    pub requests: PsidRequests,
}

#[derive(Deserialize)]
struct PsidRequestBody {
    #[serde(default)]
    serial_numbers: Vec<String>,
}

#[derive(Deserialize)]
struct StoreRequest {
    #[serde(default)]
    serial_number: String,
    #[serde(default)]
    psid: String,
    #[serde(default)]
    image: String,
}

#[derive(Serialize)]
struct SerialNumbers {
    serial_numbers: Vec<String>,
}

fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "data": data,
        "timestamp": chrono::Utc::now(),
    }))
}

pub struct RestApi;

impl RestApi {
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/api/types", web::get().to(list_types))
            .route("/api/types/{type}", web::get().to(get_type))
            .route("/api/storages", web::get().to(list_storages))
            .route("/api/scan_type", web::post().to(scan_type))
            .service(
                web::scope("/api/webservice")
                    .route("/health", web::get().to(health))
                    .route("/scan", web::post().to(scan))
                    .route("/scan_file", web::post().to(scan_file))
                    .route("/hards", web::get().to(list_hards))
                    .route("/hards", web::post().to(add_hard))
                    .route("/hards/{id}", web::put().to(edit_hard))
                    .route("/wipe_accept", web::post().to(wipe_accept))
                    .route("/invalidate_psid", web::post().to(invalidate_psid))
                    .route("/psid_requests", web::post().to(create_psid_request)),
            )
            .route("/api/reader/validate/{token}", web::post().to(reader_validate))
            .route("/api/reader/scan/{token}", web::post().to(reader_scan))
            .route("/api/reader/store/{token}", web::post().to(reader_store))
            .route("/image/{filename}", web::get().to(get_image));
    }

    pub async fn start(
        state: web::Data<AppState>,
        webservice: web::Data<WebserviceConfig>,
        tokens: web::Data<TokenRegistry>,
        port: u16,
    ) -> std::io::Result<()> {
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(state.clone())
                .app_data(webservice.clone())
                .app_data(tokens.clone())
                .app_data(web::JsonConfig::default().limit(MAX_JSON_BYTES))
                .configure(RestApi::configure)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

/// Multipart body split into uploaded files and plain text values
#[derive(Default)]
struct UploadForm {
    files: Vec<(String, UploadedImage)>,
    values: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut payload: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();
        while let Some(item) = payload.next().await {
            let mut field = item.map_err(|e| {
                Error::InvalidInput(format!("Failed to parse multipart form: {}", e))
            })?;
            let name = field.name().unwrap_or_default().to_string();
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);

            let mut data = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| {
                    Error::InvalidInput(format!("Failed to read multipart field {}: {}", name, e))
                })?;
                if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                    return Err(Error::InvalidInput(format!("field {} is too large", name)).into());
                }
                data.extend_from_slice(&chunk);
            }

            match filename {
                Some(filename) => form.files.push((name, UploadedImage { filename, data })),
                None => {
                    form.values
                        .insert(name, String::from_utf8_lossy(&data).trim().to_string());
                }
            }
        }
        Ok(form)
    }

    fn files(&self, name: &str) -> Vec<UploadedImage> {
        self.files
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, file)| file.clone())
            .collect()
    }

    fn value(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    fn sender(&self) -> SenderContext {
        SenderContext::from_sender(self.values.get("sender").map(String::as_str))
    }
}

async fn list_types(_auth: BearerAuth) -> HttpResponse {
    HttpResponse::Ok().json(catalog::device_types())
}

async fn get_type(_auth: BearerAuth, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let name = path.into_inner();
    let fields = catalog::device_type(&name)
        .ok_or_else(|| Error::NotFound(format!("device type {}", name)))?;
    Ok(HttpResponse::Ok().json(fields))
}

async fn list_storages(_auth: BearerAuth) -> HttpResponse {
    HttpResponse::Ok().json(catalog::storages())
}

async fn scan_type(
    _auth: BearerAuth,
    state: web::Data<AppState>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let form = UploadForm::read(payload).await?;
    let fields = state
        .scan
        .scan_only(&form.files("images"), form.value("type"), form.sender())
        .await?;
    Ok(success(fields))
}

async fn health(_client: WebserviceClient, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    state.scan.ocr().health().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    })))
}

async fn scan(
    _client: WebserviceClient,
    state: web::Data<AppState>,
    body: web::Json<ScanRequest>,
) -> ApiResult<HttpResponse> {
    let outcome = state.scan.scan_base64(body.into_inner()).await?;
    Ok(success(outcome))
}

async fn scan_file(
    _client: WebserviceClient,
    state: web::Data<AppState>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let form = UploadForm::read(payload).await?;
    let outcome = state
        .scan
        .scan_files(
            &form.files("images"),
            form.value("type"),
            form.value("inventory_id"),
            form.sender(),
        )
        .await?;
    Ok(success(outcome))
}

async fn list_hards(
    _client: WebserviceClient,
    state: web::Data<AppState>,
    query: web::Query<RecordQuery>,
) -> ApiResult<HttpResponse> {
    let records: Vec<_> = state
        .inventory
        .query(&query)?
        .into_iter()
        .map(|r| state.scan.present(r))
        .collect();
    Ok(success(records))
}

async fn add_hard(
    _client: WebserviceClient,
    state: web::Data<AppState>,
    body: web::Json<NewRecord>,
) -> ApiResult<HttpResponse> {
    let record = state.inventory.add(body.into_inner(), Vec::new())?;
    Ok(success(state.scan.present(record)))
}

async fn edit_hard(
    _client: WebserviceClient,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RecordEdit>,
) -> ApiResult<HttpResponse> {
    let raw = path.into_inner();
    let id = RecordId::parse(&raw)
        .ok_or_else(|| Error::InvalidInput(format!("invalid record id {:?}", raw)))?;
    let record = state.inventory.edit(id, &body)?;
    Ok(success(state.scan.present(record)))
}

async fn wipe_accept(
    _client: WebserviceClient,
    state: web::Data<AppState>,
    body: web::Json<NaturalKey>,
) -> ApiResult<HttpResponse> {
    let record = state.inventory.confirm(&body)?;
    Ok(success(state.scan.present(record)))
}

async fn invalidate_psid(
    _client: WebserviceClient,
    state: web::Data<AppState>,
    body: web::Json<NaturalKey>,
) -> ApiResult<HttpResponse> {
    let record = state.inventory.invalidate(&body)?;
    Ok(success(state.scan.present(record)))
}

async fn create_psid_request(
    _client: WebserviceClient,
    state: web::Data<AppState>,
    body: web::Json<PsidRequestBody>,
) -> ApiResult<HttpResponse> {
    let request = state.requests.create(&body.serial_numbers)?;
    Ok(success(serde_json::json!({
        "request_id": request.id,
        "serial_numbers": request.pending(),
    })))
}

fn parse_token(token: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(token).map_err(|_| Error::NotFound("psid request".to_string()))
}

/// Pending serials of a request link, or `NotFound` for a spent or unknown link
fn pending_for(state: &AppState, token: &str) -> Result<(Uuid, Vec<String>), Error> {
    let id = parse_token(token)?;
    let pending = state.requests.pending_serials(id)?;
    Ok((id, pending))
}

async fn reader_validate(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let (_, serial_numbers) = pending_for(&state, &path)?;
    Ok(HttpResponse::Ok().json(SerialNumbers { serial_numbers }))
}

async fn reader_scan(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let (_, pending) = pending_for(&state, &path)?;
    let form = UploadForm::read(payload).await?;

    let serial_number = form.value("serial_number");
    if !pending.iter().any(|s| s == serial_number) {
        return Err(Error::InvalidInput(
            "Serial number not in the valid serial numbers list".to_string(),
        )
        .into());
    }

    let file = form
        .files("image")
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidInput("No images provided".to_string()))?;
    let reading = state.scan.read_psid(&file).await?;
    Ok(HttpResponse::Ok().json(reading))
}

async fn reader_store(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<StoreRequest>,
) -> ApiResult<HttpResponse> {
    let (id, pending) = pending_for(&state, &path)?;
    let body = body.into_inner();

    if !pending.contains(&body.serial_number) {
        return Err(Error::InvalidInput(
            "Serial number not in the valid serial numbers list".to_string(),
        )
        .into());
    }

    let mut images = Vec::new();
    if !body.image.is_empty() {
        state.scan.images().resolve(&body.image)?;
        images.push(body.image);
    }

    let new = NewRecord {
        serial_number: body.serial_number.clone(),
        psid: body.psid,
        ..Default::default()
    };
    state.inventory.add(new, images)?;
    state.requests.mark_stored(id, &body.serial_number)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Hard data stored successfully"
    })))
}

async fn get_image(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult<NamedFile> {
    let file = state.scan.images().resolve(&path)?;
    Ok(NamedFile::open_async(file).await.map_err(Error::Io)?)
}
