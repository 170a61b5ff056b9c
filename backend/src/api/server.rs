//! HTTP Server for the SheetMap API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/convert`    | Convert JSON rows with a preset      |
//! | POST   | `/api/upload`     | Upload a CSV for conversion          |
//! | GET    | `/api/presets`    | List stored presets                  |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::Multipart,
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, ConvertRequest, ConvertResponse, PresetSummary};
use crate::error::{PipelineError, PresetError, ServerError, ServerResult};
use crate::models::{ConvertOptions, MappingPreset};
use crate::presets::PresetRegistry;
use crate::transform::batch::run_json_rows;
use crate::transform::pipeline::{convert_bytes, PipelineOptions};

type ApiError = (StatusCode, Json<Value>);

/// Build the application router
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/convert", post(convert_rows))
        .route("/api/upload", post(upload_csv))
        .route("/api/presets", get(list_presets))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("🚀 SheetMap server running on http://localhost:{}", port);
    eprintln!("   POST /api/convert - Convert JSON rows");
    eprintln!("   POST /api/upload  - Upload CSV file");
    eprintln!("   GET  /api/presets - Stored presets");
    eprintln!("   GET  /api/logs    - SSE log stream");
    eprintln!("   GET  /health      - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Map an error to its HTTP status and JSON body
fn reject(err: ServerError) -> ApiError {
    let status = match &err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Preset(PresetError::NotFound(_))) => StatusCode::NOT_FOUND,
        ServerError::Pipeline(
            PipelineError::Csv(_)
            | PipelineError::Json(_)
            | PipelineError::EmptyInput
            | PipelineError::MissingColumns(_)
            | PipelineError::Preset(PresetError::Invalid(_) | PresetError::Json(_)),
        ) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        log_error(format!("Request failed: {}", err));
    }
    (status, Json(error_response(&err.to_string())))
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sheetmap",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": "POST /api/convert",
            "upload": "POST /api/upload",
            "presets": "GET /api/presets",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Convert JSON rows with the preset from the request body
async fn convert_rows(Json(request): Json<ConvertRequest>) -> Result<Json<ConvertResponse>, ApiError> {
    log_info(format!("📄 Converting {} JSON rows", request.rows.len()));

    let response = tokio::task::spawn_blocking(move || {
        let batch = run_json_rows(&request.rows, &request.preset, request.options);
        ConvertResponse::from_batch(batch, request.options.wrap_array)
    })
    .await
    .map_err(|e| reject(ServerError::Internal(e.to_string())))?;

    Ok(Json(response))
}

/// Fields read from an upload form
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(Option<String>, Vec<u8>)>,
    preset: Option<String>,
    preset_id: Option<String>,
    options: Option<String>,
}

impl UploadForm {
    /// Turn the text fields into pipeline options
    fn pipeline_options(&self) -> ServerResult<PipelineOptions> {
        let preset = self
            .preset
            .as_deref()
            .map(MappingPreset::from_json)
            .transpose()
            .map_err(|e| ServerError::BadRequest(format!("Invalid preset: {}", e)))?;

        let convert = self
            .options
            .as_deref()
            .map(serde_json::from_str::<ConvertOptions>)
            .transpose()
            .map_err(|e| ServerError::BadRequest(format!("Invalid options: {}", e)))?
            .unwrap_or_default();

        Ok(PipelineOptions {
            preset,
            preset_id: self.preset_id.clone(),
            convert,
            ..Default::default()
        })
    }
}

/// Upload CSV endpoint.
///
/// Multipart fields: `file` (required), `preset` (JSON), `presetId`,
/// `options` (JSON).
async fn upload_csv(mut multipart: Multipart) -> Result<Json<ConvertResponse>, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;

        match name.as_str() {
            "file" => form.file = Some((file_name, data.to_vec())),
            "preset" => form.preset = Some(String::from_utf8_lossy(&data).into_owned()),
            "presetId" => form.preset_id = Some(String::from_utf8_lossy(&data).trim().to_string()),
            "options" => form.options = Some(String::from_utf8_lossy(&data).into_owned()),
            _ => {}
        }
    }

    let options = form.pipeline_options().map_err(reject)?;
    let (file_name, bytes) = form
        .file
        .take()
        .ok_or_else(|| reject(ServerError::BadRequest("No file provided".to_string())))?;

    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let report = tokio::task::spawn_blocking(move || convert_bytes(&bytes, options))
        .await
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?
        .map_err(|e| reject(e.into()))?;

    Ok(Json(ConvertResponse::from(report)))
}

/// List stored presets
async fn list_presets() -> Result<Json<Vec<PresetSummary>>, ApiError> {
    let presets = tokio::task::spawn_blocking(|| {
        let registry = PresetRegistry::new();
        registry.list().into_iter().map(PresetSummary::from).collect::<Vec<_>>()
    })
    .await
    .map_err(|e| reject(ServerError::Internal(e.to_string())))?;

    Ok(Json(presets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "sheetmap");
    }

    #[tokio::test]
    async fn test_convert_rows() {
        let request: ConvertRequest = serde_json::from_value(json!({
            "rows": [
                {"Order": "1", "SKU": "A"},
                {"Order": "2", "SKU": "B"}
            ],
            "preset": {
                "mapping": [
                    {"originalKey": "Order", "targetPath": "id", "dataType": "number"},
                    {"originalKey": "SKU", "targetPath": "lines[].sku"}
                ],
                "customKeys": [{"key": "source", "value": "api", "type": "string"}]
            },
            "options": {"wrapArray": false}
        }))
        .unwrap();

        let Json(response) = convert_rows(Json(request)).await.unwrap();
        assert_eq!(response.status, "ready");
        assert_eq!(
            response.output,
            json!({"id": 1, "lines": [{"sku": "A"}], "source": "api"})
        );
        assert_eq!(response.metadata.converted_rows, 2);
    }

    #[test]
    fn test_reject_status_codes() {
        let (status, Json(body)) = reject(ServerError::BadRequest("No file provided".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = reject(PipelineError::Preset(PresetError::NotFound("x".into())).into());
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = reject(PipelineError::EmptyInput.into());
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = reject(ServerError::Internal("join error".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upload_form_options() {
        let form = UploadForm {
            preset: Some(r#"{"mapping": [{"originalKey": "A", "targetPath": "a"}]}"#.into()),
            options: Some(r#"{"skipEmpty": true}"#.into()),
            ..Default::default()
        };
        let options = form.pipeline_options().unwrap();
        assert!(options.preset.is_some());
        assert!(options.convert.skip_empty);
        assert!(options.convert.wrap_array);

        let bad = UploadForm {
            preset: Some("{not json".into()),
            ..Default::default()
        };
        assert!(matches!(bad.pipeline_options(), Err(ServerError::BadRequest(_))));
    }
}
