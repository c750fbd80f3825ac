use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lc_forms::schema::{FieldDefinition, FormSettings};
use leadcapture::CaptureError;
use serde::Serialize;
use serde_json::json;

use super::ApiError;
use crate::state::AppState;

const LOADER_SCRIPT: &str = include_str!("../../static/embed.js");

/// The public part of a form definition handed to third-party pages.
#[derive(Serialize)]
pub struct EmbeddedForm<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub fields: &'a [FieldDefinition],
    pub settings: &'a FormSettings,
}

pub async fn embed_form(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.capture.fetch_form(&id) {
        Ok(form) => {
            let public = EmbeddedForm {
                id: &form.id,
                name: &form.name,
                description: &form.description,
                fields: &form.fields,
                settings: &form.settings,
            };
            let body = json!({ "success": true, "form": public });
            let cache = format!("public, max-age={}", state.embed.cache_max_age);
            ([(header::CACHE_CONTROL, cache)], Json(body)).into_response()
        }
        Err(CaptureError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Form not found or inactive" })),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Bare `OPTIONS` without CORS request headers; real preflights are answered by the
/// CORS layer.
pub async fn preflight() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [(header::ALLOW, "GET, OPTIONS")])
}

pub async fn loader_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        LOADER_SCRIPT,
    )
}
