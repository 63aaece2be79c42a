// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2025 Vizier Project
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::render::PlottersRenderer;
use crate::settings::Settings;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use vizier::{ChartEngine, EngineError, EngineResult, IntentClassifier, OllamaClassifier};

/// Extensions accepted at the service boundary. The engine understands more
/// formats, but the upload contract is CSV and Excel only.
const ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "xls", "xlsx"];

pub struct AppState {
    pub engine: ChartEngine,
    pub renderer: PlottersRenderer,
    pub classifier: Option<OllamaClassifier>,
    pub settings: Settings,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.max_upload_bytes + 64 * 1024;
    Router::new()
        .route("/health", get(health))
        .route("/api/charts", post(generate_chart))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Liveness only; does not exercise the engine.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "vizier-server" }))
}

#[derive(Debug, Serialize)]
struct ChartResponse {
    success: bool,
    session_id: String,
    #[serde(flatten)]
    body: ResponseBody,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ResponseBody {
    Engine(EngineResult),
    Suggestions { suggestions: Vec<String> },
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    PayloadTooLarge { limit: usize },
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        ApiError::Engine(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::PayloadTooLarge { limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("file exceeds the {limit}-byte upload ceiling"),
            ),
            ApiError::Engine(error) => {
                let status = match error {
                    EngineError::Parse(_) => StatusCode::BAD_REQUEST,
                    EngineError::Render(_) => StatusCode::BAD_GATEWAY,
                    EngineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, error.user_message())
            }
        };
        let body = Json(json!({ "success": false, "error": message }));
        (status, body).into_response()
    }
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
    query: String,
    session_id: String,
}

async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<Upload, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut query: Option<String> = None;
    let mut session_id: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart payload: {e}")))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(ToString::to_string)
                    .ok_or_else(|| ApiError::BadRequest("no file selected".to_string()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("failed to read file: {e}")))?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("query") => {
                query = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("failed to read query: {e}"))
                })?);
            }
            Some("session_id") => {
                session_id = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("failed to read session_id: {e}"))
                })?);
            }
            _ => {}
        }
    }
    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("no file provided".to_string()))?;
    let query = query.ok_or_else(|| ApiError::BadRequest("no query provided".to_string()))?;
    if bytes.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge { limit: max_bytes });
    }
    let extension = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "unsupported file type '.{extension}'; upload one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    Ok(Upload {
        file_name,
        bytes,
        query,
        session_id: session_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
    })
}

async fn generate_chart(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ChartResponse>, ApiError> {
    let upload = read_upload(multipart, state.settings.max_upload_bytes).await?;
    info!(
        session_id = %upload.session_id,
        file = %upload.file_name,
        query = %upload.query,
        "chart request received"
    );

    // Reserved query: return data-grounded example queries without running
    // intent resolution.
    if upload.query.trim().eq_ignore_ascii_case("generate suggestions") {
        let (_, profiles) = state
            .engine
            .profile(&upload.bytes, &upload.file_name)
            .map_err(|e| ApiError::Engine(EngineError::Parse(e)))?;
        return Ok(Json(ChartResponse {
            success: true,
            session_id: upload.session_id,
            body: ResponseBody::Suggestions {
                suggestions: state.engine.suggest_queries(&profiles),
            },
        }));
    }

    let classifier = state
        .classifier
        .as_ref()
        .map(|c| c as &dyn IntentClassifier);
    let result = state
        .engine
        .run(
            &upload.bytes,
            &upload.file_name,
            &upload.query,
            classifier,
            &state.renderer,
        )
        .await?;
    if !result.is_rendered() {
        warn!(session_id = %upload.session_id, "request resolved to a clarification");
    }
    Ok(Json(ChartResponse {
        success: result.is_rendered(),
        session_id: upload.session_id,
        body: ResponseBody::Engine(result),
    }))
}
