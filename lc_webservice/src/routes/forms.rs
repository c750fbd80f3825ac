use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lc_forms::error::DefinitionError;
use lc_forms::schema::FormDefinition;
use lc_forms::submission::Submission;
use leadcapture::CaptureError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormListing {
    #[serde(flatten)]
    pub form: FormDefinition,
    pub submission_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadsResponse {
    pub form_config: FormDefinition,
    pub leads: Vec<Submission>,
    pub total_count: usize,
}

fn parse_definition(body: Value) -> Result<FormDefinition, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        ApiError::Capture(CaptureError::InvalidDefinition(DefinitionError::Malformed(e.to_string())))
    })
}

pub async fn list_forms(State(state): State<AppState>) -> Result<Json<Vec<FormListing>>, ApiError> {
    let listings = state
        .capture
        .list_forms()?
        .into_iter()
        .map(|s| FormListing {
            form: s.form,
            submission_count: s.submission_count,
        })
        .collect();
    Ok(Json(listings))
}

pub async fn create_form(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state.capture.save_form(parse_definition(body)?)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Form saved successfully", "formId": saved.id })),
    ))
}

pub async fn get_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FormDefinition>, ApiError> {
    Ok(Json(state.capture.get_form(&id)?))
}

/// Full replace of an existing form. The path id wins over any id in the body.
pub async fn replace_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<FormDefinition>, ApiError> {
    state.capture.get_form(&id)?;
    let mut form = parse_definition(body)?;
    form.id = id;
    Ok(Json(state.capture.save_form(form)?))
}

pub async fn delete_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.capture.delete_form(&id)?;
    Ok(Json(json!({ "message": "Form deleted successfully" })))
}

pub async fn leads(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LeadsResponse>, ApiError> {
    let (form_config, leads) = state.capture.leads(&id)?;
    Ok(Json(LeadsResponse {
        form_config,
        total_count: leads.len(),
        leads,
    }))
}

/// File name stem for the CSV download: the form name, lowercased, with runs of other
/// characters collapsed to `-`.
pub fn export_file_stem(name: &str) -> String {
    let mut stem = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.ends_with('-') {
            stem.push('-');
        }
    }
    let stem = stem.trim_matches('-');
    if stem.is_empty() { "form".to_string() } else { stem.to_string() }
}

pub async fn export_leads(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (form, csv) = state.capture.export_leads(&id)?;
    let disposition = format!("attachment; filename=\"{}-leads.csv\"", export_file_stem(&form.name));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetsTestQuery {
    pub spreadsheet_id: Option<String>,
}

/// Reports whether the configured service account can open a spreadsheet.
pub async fn test_sheets(
    State(state): State<AppState>,
    Query(query): Query<SheetsTestQuery>,
) -> Response {
    let Some(mirror) = state.sheets.as_ref() else {
        return Json(json!({
            "success": false,
            "message": "Google Sheets credentials are not configured"
        }))
        .into_response();
    };
    let Some(spreadsheet_id) = query.spreadsheet_id.filter(|s| !s.trim().is_empty()) else {
        return ApiError::BadRequest("spreadsheetId is required".to_string()).into_response();
    };

    match mirror.test_connection(&spreadsheet_id).await {
        Ok(title) => Json(json!({ "success": true, "title": title })).into_response(),
        Err(e) => {
            log::warn!("Spreadsheet connection test failed for {}: {}", spreadsheet_id, e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "success": false, "message": e.to_string() })),
            )
                .into_response()
        }
    }
}
