//! The hosted form page. Browsers without scripting get the whole flow here: render,
//! post, inline errors, then a redirect or a thank-you page.

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use lc_forms::binding::{navigation_from_post, Binder, FormPostBinder};
use lc_forms::normalize::{NavigationContext, UTM_PARAMS};
use lc_forms::render::FormEngine;
use lc_forms::schema::{FormDefinition, Values};
use lc_forms::traits::RenderContext;
use leadcapture::CaptureError;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;

use super::{DUPLICATE_MESSAGE, RETRY_MESSAGE, UNAVAILABLE_MESSAGE};
use crate::client::{client_info, referrer};
use crate::pages::Page;
use crate::state::AppState;

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Thank you for your submission. We will get back to you soon.";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub embed: Option<String>,
    /// Page that hosts the embedded form.
    #[serde(default)]
    pub landing: Option<String>,
    #[serde(default, rename = "ref")]
    pub referrer: Option<String>,
    #[serde(flatten)]
    pub rest: HashMap<String, String>,
}

impl PageQuery {
    fn embedded(&self) -> bool {
        matches!(self.embed.as_deref(), Some("1") | Some("true"))
    }
}

struct FormView<'a> {
    form: &'a FormDefinition,
    values: Option<&'a Values>,
    errors: HashMap<String, String>,
    navigation: &'a NavigationContext,
    notice: Option<&'a str>,
    embedded: bool,
}

fn action_for(form_id: &str, embedded: bool) -> String {
    if embedded {
        format!("/forms/{}?embed=1", form_id)
    } else {
        format!("/forms/{}", form_id)
    }
}

fn page_response(state: &AppState, status: StatusCode, page: Page) -> Response {
    match state.pages.render(&page) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            log::error!("Failed to render page '{}': {}", page.title, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

fn notice_page(state: &AppState, status: StatusCode, title: &str, message: &str, kind: &str, embedded: bool) -> Response {
    page_response(
        state,
        status,
        Page {
            title,
            notice: Some(message),
            notice_kind: kind,
            embedded,
            ..Default::default()
        },
    )
}

fn form_page(state: &AppState, status: StatusCode, view: FormView) -> Response {
    let engine = FormEngine::new(&state.registry);
    let action = action_for(&view.form.id, view.embedded);
    let ctx = RenderContext {
        values: view.values,
        errors: &view.errors,
        navigation: view.navigation,
        action: &action,
    };
    match engine.render(view.form, &ctx) {
        Ok(content) => page_response(
            state,
            status,
            Page {
                title: &view.form.name,
                content,
                notice: view.notice,
                notice_kind: "error",
                embedded: view.embedded,
            },
        ),
        Err(e) => {
            log::error!("Form '{}' cannot be rendered: {}", view.form.id, e);
            notice_page(state, StatusCode::NOT_FOUND, "Form unavailable", UNAVAILABLE_MESSAGE, "error", view.embedded)
        }
    }
}

pub async fn show_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let embedded = query.embedded();
    let form = match state.capture.fetch_form(&id) {
        Ok(form) => form,
        Err(CaptureError::NotFound(_)) => {
            return notice_page(&state, StatusCode::NOT_FOUND, "Form unavailable", UNAVAILABLE_MESSAGE, "error", embedded);
        }
        Err(e) => {
            log::error!("Loading form '{}' failed: {}", id, e);
            return notice_page(&state, StatusCode::SERVICE_UNAVAILABLE, "Form unavailable", RETRY_MESSAGE, "error", embedded);
        }
    };

    let landing = query.landing.clone().unwrap_or_else(|| uri.to_string());
    let referred_by = query.referrer.as_deref().or_else(|| referrer(&headers));
    let mut navigation = NavigationContext::from_landing_page(Some(&landing), referred_by);
    for key in UTM_PARAMS {
        if let Some(v) = query.rest.get(key) {
            navigation.set_param(key, v);
        }
    }

    form_page(
        &state,
        StatusCode::OK,
        FormView {
            form: &form,
            values: None,
            errors: HashMap::new(),
            navigation: &navigation,
            notice: None,
            embedded,
        },
    )
}

pub async fn post_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(data): Form<Vec<(String, String)>>,
) -> Response {
    let embedded = query.embedded();
    let form = match state.capture.fetch_form(&id) {
        Ok(form) => form,
        Err(_) => {
            return notice_page(&state, StatusCode::NOT_FOUND, "Form unavailable", UNAVAILABLE_MESSAGE, "error", embedded);
        }
    };

    let values = FormPostBinder.extract(&form, data.as_slice());
    let navigation =
        navigation_from_post(&data).with_client(client_info(&headers, peer.map(|ConnectInfo(addr)| addr)));

    let view = |errors: HashMap<String, String>, notice: Option<&'static str>| FormView {
        form: &form,
        values: Some(&values),
        errors,
        navigation: &navigation,
        notice,
        embedded,
    };

    match state.capture.submit(&form.id, &values, &navigation).await {
        Ok(_) => match form.settings.redirect_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Redirect::to(url).into_response(),
            None => {
                let message = form
                    .settings
                    .success_message
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or(DEFAULT_SUCCESS_MESSAGE);
                notice_page(&state, StatusCode::OK, &form.name, message, "success", embedded)
            }
        },
        Err(CaptureError::ValidationFailed(errors)) => {
            let errors = errors.into_iter().map(|e| (e.field_id, e.message)).collect();
            form_page(&state, StatusCode::UNPROCESSABLE_ENTITY, view(errors, None))
        }
        Err(CaptureError::AlreadySubmitted(_)) => {
            notice_page(&state, StatusCode::CONFLICT, &form.name, DUPLICATE_MESSAGE, "error", embedded)
        }
        Err(CaptureError::NotFound(_)) => {
            notice_page(&state, StatusCode::NOT_FOUND, "Form unavailable", UNAVAILABLE_MESSAGE, "error", embedded)
        }
        Err(e) => {
            log::error!("Submission to form '{}' failed: {}", form.id, e);
            form_page(&state, StatusCode::SERVICE_UNAVAILABLE, view(HashMap::new(), Some(RETRY_MESSAGE)))
        }
    }
}
