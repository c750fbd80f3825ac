use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use leadcapture::CaptureError;
use serde_json::json;
use std::collections::BTreeMap;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::state::AppState;

pub mod embed;
pub mod forms;
pub mod hosted;
pub mod submissions;

pub const UNAVAILABLE_MESSAGE: &str = "This form is currently unavailable.";
pub const RETRY_MESSAGE: &str = "We could not save your submission. Please try again.";
pub const DUPLICATE_MESSAGE: &str = "You have already submitted this form.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/api/forms", get(forms::list_forms).post(forms::create_form))
        .route(
            "/api/forms/:id",
            get(forms::get_form).put(forms::replace_form).delete(forms::delete_form),
        )
        .route("/api/forms/:id/leads", get(forms::leads))
        .route("/api/forms/:id/leads/export", get(forms::export_leads))
        .route("/api/sheets/test", get(forms::test_sheets))
        .route(
            "/api/form-submissions",
            get(submissions::list_submissions)
                .post(submissions::submit)
                .layer(CorsLayer::permissive()),
        )
        .route(
            "/api/embed/form/:id",
            get(embed::embed_form)
                .options(embed::preflight)
                .layer(CorsLayer::permissive()),
        )
        .route("/embed.js", get(embed::loader_script))
        .route("/forms/:id", get(hosted::show_form).post(hosted::post_form))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// JSON error body for the API routes.
#[derive(Debug)]
pub enum ApiError {
    Capture(CaptureError),
    BadRequest(String),
}

impl From<CaptureError> for ApiError {
    fn from(e: CaptureError) -> Self {
        ApiError::Capture(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "message": message })),
            ApiError::Capture(CaptureError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                json!({ "message": "Form not found or inactive" }),
            ),
            ApiError::Capture(CaptureError::ValidationFailed(errors)) => {
                let by_field: BTreeMap<String, String> =
                    errors.into_iter().map(|e| (e.field_id, e.message)).collect();
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "message": "Validation failed", "errors": by_field }),
                )
            }
            ApiError::Capture(CaptureError::AlreadySubmitted(_)) => {
                (StatusCode::CONFLICT, json!({ "message": DUPLICATE_MESSAGE }))
            }
            ApiError::Capture(CaptureError::InvalidDefinition(e)) => {
                (StatusCode::BAD_REQUEST, json!({ "message": e.to_string() }))
            }
            ApiError::Capture(CaptureError::SinkUnavailable(e)) => {
                log::error!("Store unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, json!({ "message": RETRY_MESSAGE }))
            }
            ApiError::Capture(e @ CaptureError::Export(_)) => {
                log::error!("{}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Failed to export leads" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
