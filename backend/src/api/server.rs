//! HTTP Server for the Octagon API.
//!
//! Provides extract uploads (one loader stage per request), fight
//! reconstruction and a live log stream.
//!
//! # API Endpoints
//!
//! | Method | Path                              | Description                      |
//! |--------|-----------------------------------|----------------------------------|
//! | GET    | `/health`                         | Health check with store counts   |
//! | POST   | `/api/import/{kind}`              | Upload and import one extract    |
//! | GET    | `/api/events/{event_id}/fights`   | Reconstructed fights of an event |
//! | GET    | `/api/fighters/{name}/history`    | A fighter's stat rows            |
//! | GET    | `/api/logs`                       | SSE stream for real-time logs    |

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, log_success, LOG_BROADCASTER};
use super::types::{error_response, CsvMetadata, FightsResponse, ImportResponse};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::models::{FightStatRecord, RecordKind};
use crate::parser::parse_bytes_auto;
use crate::store::RecordStore;
use crate::transform::{
    event_status_counts, fighter_history, import_extract, reconstruct, store_counts, ImportContext, LoaderOptions,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub options: LoaderOptions,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, options: LoaderOptions) -> Self {
        Self { store, options }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(PipelineError::Extract(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the router. Split out of [`start_server`] so it can be driven
/// without a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/import/{kind}", post(upload_extract))
        .route("/api/events/{event_id}/fights", get(event_fights))
        .route("/api/fighters/{name}/history", get(history))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Octagon server running on http://localhost:{}", port);
    println!("   POST /api/import/{{kind}}            - Upload an extract (field: file)");
    println!("   GET  /api/events/{{event_id}}/fights - Reconstructed fights");
    println!("   GET  /api/fighters/{{name}}/history  - Fighter stat history");
    println!("   GET  /api/logs                     - SSE log stream");
    println!("   GET  /health                       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run blocking store work off the async executor.
async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("Task failed: {}", e)))?
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let store = Arc::clone(&state.store);
    let (counts, events) = blocking(move || {
        Ok((store_counts(store.as_ref())?, event_status_counts(store.as_ref())?))
    })
    .await?;

    Ok(Json(json!({
        "status": "ok",
        "service": "octagon",
        "version": env!("CARGO_PKG_VERSION"),
        "counts": counts,
        "events": events,
    })))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers just skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload one extract and run its loader stage.
async fn upload_extract(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> ServerResult<Json<ImportResponse>> {
    let kind = RecordKind::from_name(&kind)
        .ok_or_else(|| ServerError::BadRequest(format!("Unknown record kind: {}", kind)))?;

    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;
    log_info(format!(
        "📄 Upload for {}: {} ({} bytes)",
        kind,
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let store = Arc::clone(&state.store);
    let options = state.options;
    let (summary, csv_info) = blocking(move || {
        let extract = parse_bytes_auto(&bytes).map_err(PipelineError::from)?;
        let summary = import_extract(store.as_ref(), kind, &extract, &ImportContext::at_now(), &options)
            .map_err(PipelineError::from)?;
        Ok((summary, CsvMetadata::from_extract(&extract, file_name)))
    })
    .await?;

    log_success(format!(
        "Imported {} {} ({} errors)",
        summary.imported_count, kind, summary.error_count
    ));

    Ok(Json(ImportResponse::new(kind, summary, csv_info)))
}

/// Fights of one event, rebuilt from fight stats.
async fn event_fights(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ServerResult<Json<FightsResponse>> {
    let store = Arc::clone(&state.store);
    let id = event_id.clone();
    let fights = blocking(move || Ok(reconstruct(store.as_ref(), &id)?)).await?;

    Ok(Json(FightsResponse::new(event_id, fights)))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ServerResult<Json<Vec<FightStatRecord>>> {
    let store = Arc::clone(&state.store);
    let rows = blocking(move || Ok(fighter_history(store.as_ref(), &name, query.limit)?)).await?;

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_error_status_codes() {
        let status = |err: ServerError| err.into_response().status();

        assert_eq!(status(ServerError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(ServerError::Pipeline(PipelineError::Extract(crate::error::ExtractError::Empty))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(crate::error::StoreError::Poisoned.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_event_fights_handler() {
        let store = Arc::new(MemoryStore::new());
        let extract = crate::parser::assemble(
            "fight_id,fighter_name,fighter_position\nufc1_1,Royce Gracie,1\nufc1_1,Art Jimmerson,2\n",
            "utf-8",
        )
        .unwrap();
        import_extract(
            store.as_ref(),
            RecordKind::FightStats,
            &extract,
            &ImportContext::at_now(),
            &LoaderOptions::default(),
        )
        .unwrap();

        let state = AppState::new(store, LoaderOptions::default());
        let Json(response) = event_fights(State(state), Path("UFC1".to_string())).await.unwrap();

        assert_eq!(response.count, 1);
        assert_eq!(response.partial, 0);
        assert_eq!(response.fights[0].fighter_names(), vec!["Royce Gracie", "Art Jimmerson"]);
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let state = AppState::new(Arc::new(MemoryStore::new()), LoaderOptions::default());
        let Json(body) = health(State(state)).await.unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["counts"]["fighters"], 0);
        assert_eq!(body["events"]["upcoming"], 0);
    }
}
