use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use lc_forms::binding::{Binder, JsonBinder};
use lc_forms::normalize::NavigationContext;
use lc_forms::submission::Submission;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;

use super::ApiError;
use crate::client::client_info;
use crate::state::AppState;

/// Body of `POST /api/form-submissions`. Older clients send `formConfigId` and `data`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    #[serde(alias = "formConfigId")]
    pub form_id: String,
    #[serde(default, alias = "data")]
    pub values: Map<String, Value>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub utm_id: Option<String>,
    pub referrer: Option<String>,
    pub landing_page: Option<String>,
}

impl SubmitRequest {
    /// Older embed scripts put the tracking keys inside `data` next to the field values.
    fn carried<'a>(&'a self, top_level: &'a Option<String>, key: &str) -> Option<&'a str> {
        top_level
            .as_deref()
            .or_else(|| self.values.get(key).and_then(Value::as_str))
    }

    /// Navigation context for the request. Explicit `utm*` fields override the ones
    /// found in `landingPage`.
    pub fn navigation(&self) -> NavigationContext {
        let mut nav = NavigationContext::from_landing_page(
            self.carried(&self.landing_page, "landingPage"),
            self.carried(&self.referrer, "referrer"),
        );
        let explicit = [
            ("utm_source", &self.utm_source, "utmSource"),
            ("utm_medium", &self.utm_medium, "utmMedium"),
            ("utm_campaign", &self.utm_campaign, "utmCampaign"),
            ("utm_term", &self.utm_term, "utmTerm"),
            ("utm_content", &self.utm_content, "utmContent"),
            ("utm_id", &self.utm_id, "utmId"),
        ];
        for (param, value, key) in explicit {
            if let Some(v) = self.carried(value, key) {
                nav.set_param(param, v);
            }
        }
        nav
    }
}

pub async fn submit(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let request: SubmitRequest =
        serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("Invalid submission: {}", e)))?;
    log::trace!("Submission request: {:?}", request);

    let form = state.capture.fetch_form(&request.form_id)?;
    let values = JsonBinder.extract(&form, &request.values);
    let navigation = request
        .navigation()
        .with_client(client_info(&headers, peer.map(|ConnectInfo(addr)| addr)));

    let id = state.capture.submit(&form.id, &values, &navigation).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Form submitted successfully", "submissionId": id })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
    #[serde(alias = "formId")]
    pub form_config_id: Option<String>,
}

pub async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<SubmissionQuery>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let form_id = query.form_config_id.as_deref().filter(|id| !id.is_empty());
    Ok(Json(state.capture.list_submissions(form_id)?))
}
