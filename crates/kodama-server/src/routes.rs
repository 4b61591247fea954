//! Route handlers for the kodama HTTP surface.

use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use kodama_core::{create_service, CompletionError, CompletionService};
use kodama_types::{CompletionQuery, PluginSettings};

/// Shared application state: the loaded settings plus the backend
/// service built from them. A configuration error is kept around and
/// reported per completion request, so the settings route keeps
/// working on a misconfigured host.
pub struct AppState {
    settings: PluginSettings,
    service: Result<Arc<dyn CompletionService>, CompletionError>,
}

impl AppState {
    pub fn new(settings: PluginSettings) -> Self {
        let service = create_service(&settings);
        Self { settings, service }
    }

    /// Build state around an existing service (tests).
    pub fn with_service(settings: PluginSettings, service: Arc<dyn CompletionService>) -> Self {
        Self {
            settings,
            service: Ok(service),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/kodama/settings", get(get_settings))
        .route("/kodama/completion", post(post_completion))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct SettingsResponse {
    completion: kodama_types::CompletionSettings,
}

async fn get_settings(State(state): State<SharedState>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        completion: state.settings.completion_settings(),
    })
}

#[derive(Deserialize)]
struct CompletionParams {
    query: Option<String>,
}

#[derive(Serialize)]
struct CompletionResponse {
    query: String,
    result: String,
}

async fn post_completion(
    State(state): State<SharedState>,
    Form(params): Form<CompletionParams>,
) -> Response {
    let Some(raw) = params.query else {
        return (StatusCode::BAD_REQUEST, "query is required").into_response();
    };
    let query: CompletionQuery = match serde_json::from_str(&raw) {
        Ok(query) => query,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("query is not valid JSON: {err}"),
            )
                .into_response();
        }
    };
    let service = match &state.service {
        Ok(service) => service.clone(),
        Err(err) => return error_response(err),
    };
    info!(segments = query.content.len(), "performing completion");
    match service.completion(&query).await {
        Ok(result) => Json(CompletionResponse { query: raw, result }).into_response(),
        Err(err) => {
            error!(%err, "completion failed");
            error_response(&err)
        }
    }
}

/// Serialize a backend failure so the client can unpack a
/// human-readable message from recognizable provider payloads.
fn error_response(err: &CompletionError) -> Response {
    let body = match err {
        CompletionError::Api {
            status,
            code,
            message,
            ..
        } => serde_json::json!({
            "status": status,
            "code": code,
            "error": {"message": message},
        }),
        other => serde_json::json!({
            "status": 500,
            "error": {"message": other.to_string()},
        }),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
