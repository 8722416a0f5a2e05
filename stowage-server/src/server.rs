use crate::config::Config;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use stowage_core::{
    BlobDb, ContentStore, MetadataStore, Result, RetrieveBlobOperation,
    RetrieveBlobOperationRequest, SqliteMetadataStore, StoreBlobOperation,
    StoreBlobOperationRequest, StowageError,
};
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub backend: &'static str,
    pub store_blob: StoreBlobOperation,
    pub retrieve_blob: RetrieveBlobOperation,
}

impl ServerState {
    pub fn new(
        content: Arc<dyn ContentStore>,
        metadata: Arc<dyn MetadataStore>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            backend: content.name(),
            store_blob: StoreBlobOperation::new(content.clone(), metadata.clone())
                .with_timeout(timeout),
            retrieve_blob: RetrieveBlobOperation::new(content, metadata).with_timeout(timeout),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct StoreBlobRequest {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Serialize)]
struct StoreBlobResponse {
    id: String,
    size: u64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct BlobResponse {
    id: String,
    data: String,
    size: u64,
    created_at: DateTime<Utc>,
}

pub async fn run_server(config: Config) -> Result<()> {
    let db = BlobDb::open(&config.database.path)?;
    let content = config.content_store_builder(db.clone()).build()?;
    let metadata: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::new(db));

    let state = Arc::new(ServerState::new(
        content,
        metadata,
        config.storage.request_timeout(),
    ));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/blobs", post(store_blob))
        .route("/v1/blobs/:id", get(retrieve_blob))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let resp = ErrorResponse {
        error: message.into(),
    };
    (status, Json(resp)).into_response()
}

fn operation_error(error: StowageError) -> Response {
    match error {
        StowageError::InvalidEncoding(_) => error_response(
            StatusCode::BAD_REQUEST,
            "data must be a valid Base64 string",
        ),
        StowageError::NotFound(id) => {
            error_response(StatusCode::NOT_FOUND, format!("blob {} not found", id))
        }
        other => {
            tracing::error!("Blob request failed: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "backend": state.backend,
    });

    (StatusCode::OK, Json(response))
}

async fn store_blob(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<StoreBlobRequest>,
) -> Response {
    let Some(data) = request.data.filter(|data| !data.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "data is required");
    };

    match state
        .store_blob
        .run(StoreBlobOperationRequest { data })
        .await
    {
        Ok(result) => {
            let location = format!("/v1/blobs/{}", result.id);
            let resp = StoreBlobResponse {
                id: result.id,
                size: result.size,
                created_at: result.created_at,
            };
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(resp),
            )
                .into_response()
        }
        Err(error) => operation_error(error),
    }
}

async fn retrieve_blob(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    match state
        .retrieve_blob
        .run(RetrieveBlobOperationRequest { id })
        .await
    {
        Ok(result) => {
            let resp = BlobResponse {
                id: result.id,
                data: result.data,
                size: result.size,
                created_at: result.created_at,
            };
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(error) => operation_error(error),
    }
}
