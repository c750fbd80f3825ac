use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use lc_persistence::{MemoryDriver, SubmissionSink};
use lc_webservice::{router, AppState, EmbedConfig};
use leadcapture::LeadCapture;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    let capture = LeadCapture::new(SubmissionSink::new(Arc::new(MemoryDriver::new())));
    router(AppState::new(capture, EmbedConfig::default()).unwrap())
}

fn newsletter(settings: Value) -> Value {
    json!({
        "id": "newsletter",
        "name": "Newsletter Signup",
        "description": "Monthly product news",
        "fields": [
            { "id": "email", "type": "email", "label": "Email", "required": true },
            { "id": "name", "type": "text", "label": "Name", "required": true, "validation": { "minLength": 2 } }
        ],
        "settings": settings
    })
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_form(app: &Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

async fn app_with_newsletter(settings: Value) -> Router {
    let app = test_app();
    let response = send_json(&app, Method::POST, "/api/forms", newsletter(settings)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    app
}

#[tokio::test]
async fn test_ping() {
    let response = get(&test_app(), "/ping").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_form_crud() {
    let app = test_app();

    let response = send_json(&app, Method::POST, "/api/forms", newsletter(json!({}))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["formId"], "newsletter");

    let form = body_json(get(&app, "/api/forms/newsletter").await).await;
    assert_eq!(form["name"], "Newsletter Signup");
    assert_eq!(form["isActive"], true);
    assert!(form["createdAt"].is_string());

    let listing = body_json(get(&app, "/api/forms").await).await;
    assert_eq!(listing.as_array().unwrap().len(), 1);
    assert_eq!(listing[0]["submissionCount"], 0);

    let mut replacement = newsletter(json!({}));
    replacement["id"] = json!("ignored");
    replacement["name"] = json!("Renamed");
    let response = send_json(&app, Method::PUT, "/api/forms/newsletter", replacement).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["id"], "newsletter");
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["createdAt"], form["createdAt"]);

    let response = send(
        &app,
        Request::builder()
            .method(Method::DELETE)
            .uri("/api/forms/newsletter")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get(&app, "/api/forms/newsletter").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replace_missing_form_is_not_found() {
    let app = test_app();
    let response = send_json(&app, Method::PUT, "/api/forms/nope", newsletter(json!({}))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_definition_rejected() {
    let app = test_app();
    let mut form = newsletter(json!({}));
    form["fields"][1]["id"] = json!("email");
    let response = send_json(&app, Method::POST, "/api/forms", form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let select_without_options = json!({
        "name": "Broken",
        "fields": [{ "id": "plan", "type": "select", "label": "Plan" }]
    });
    let response = send_json(&app, Method::POST, "/api/forms", select_without_options).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let not_a_form = json!({ "fields": "nope" });
    let response = send_json(&app, Method::POST, "/api/forms", not_a_form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submission_accepted_with_attribution() {
    let app = app_with_newsletter(json!({ "allowMultipleSubmissions": true })).await;

    let response = send_json(
        &app,
        Method::POST,
        "/api/form-submissions",
        json!({
            "formId": "newsletter",
            "values": { "email": "ada@example.com", "name": "Ada", "extra": "dropped" },
            "landingPage": "https://site.example/pricing?utm_source=google&utm_campaign=spring",
            "utmCampaign": "summer",
            "referrer": "https://search.example/"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Form submitted successfully");
    assert!(body["submissionId"].is_string());

    let submissions = body_json(get(&app, "/api/form-submissions?formConfigId=newsletter").await).await;
    let submissions = submissions.as_array().unwrap();
    assert_eq!(submissions.len(), 1);
    let lead = &submissions[0];
    assert_eq!(lead["values"]["email"], "ada@example.com");
    assert!(lead["values"].get("extra").is_none());
    assert_eq!(lead["attribution"]["utmSource"], "google");
    assert_eq!(lead["attribution"]["utmCampaign"], "summer");
    assert_eq!(lead["attribution"]["referrer"], "https://search.example/");
}

#[tokio::test]
async fn test_legacy_submission_body() {
    let app = app_with_newsletter(json!({})).await;
    let response = send_json(
        &app,
        Method::POST,
        "/api/form-submissions",
        json!({ "formConfigId": "newsletter", "data": { "email": "ada@example.com", "name": "Ada" } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_legacy_body_carries_attribution_in_data() {
    let app = app_with_newsletter(json!({})).await;
    let response = send_json(
        &app,
        Method::POST,
        "/api/form-submissions",
        json!({
            "formConfigId": "newsletter",
            "data": {
                "email": "ada@example.com",
                "name": "Ada",
                "utmSource": "google",
                "utmMedium": "cpc",
                "utmId": "spring-24",
                "referrer": "https://search.example/",
                "landingPage": "https://site.example/pricing?utm_campaign=spring"
            }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let submissions = body_json(get(&app, "/api/form-submissions?formConfigId=newsletter").await).await;
    let lead = &submissions[0];
    assert_eq!(lead["attribution"]["utmSource"], "google");
    assert_eq!(lead["attribution"]["utmMedium"], "cpc");
    assert_eq!(lead["attribution"]["utmId"], "spring-24");
    assert_eq!(lead["attribution"]["utmCampaign"], "spring");
    assert_eq!(lead["attribution"]["referrer"], "https://search.example/");
    assert_eq!(lead["attribution"]["landingPage"], "https://site.example/pricing?utm_campaign=spring");
    assert!(lead["values"].get("utmSource").is_none());
}

#[tokio::test]
async fn test_top_level_attribution_wins_over_data() {
    let app = app_with_newsletter(json!({})).await;
    let response = send_json(
        &app,
        Method::POST,
        "/api/form-submissions",
        json!({
            "formId": "newsletter",
            "utmSource": "newsletter",
            "values": { "email": "ada@example.com", "name": "Ada", "utmSource": "google" }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let submissions = body_json(get(&app, "/api/form-submissions").await).await;
    assert_eq!(submissions[0]["attribution"]["utmSource"], "newsletter");
}

#[tokio::test]
async fn test_validation_errors_are_reported_per_field() {
    let app = app_with_newsletter(json!({})).await;
    let response = send_json(
        &app,
        Method::POST,
        "/api/form-submissions",
        json!({ "formId": "newsletter", "values": { "email": "not-an-email", "name": "A" } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["errors"]["email"].is_string());
    assert_eq!(body["errors"]["name"], "Name must be at least 2 characters");

    let submissions = body_json(get(&app, "/api/form-submissions").await).await;
    assert!(submissions.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_submission_to_unknown_or_inactive_form() {
    let app = test_app();
    let mut form = newsletter(json!({}));
    form["isActive"] = json!(false);
    send_json(&app, Method::POST, "/api/forms", form).await;

    for form_id in ["newsletter", "missing"] {
        let response = send_json(
            &app,
            Method::POST,
            "/api/form-submissions",
            json!({ "formId": form_id, "values": { "email": "ada@example.com", "name": "Ada" } }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_malformed_submission_body() {
    let app = test_app();
    let response = send_json(&app, Method::POST, "/api/form-submissions", json!({ "values": {} })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_repeat_submission_from_same_address() {
    let app = app_with_newsletter(json!({ "allowMultipleSubmissions": false })).await;
    let submit = |ip: &'static str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/form-submissions")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(
                json!({ "formId": "newsletter", "values": { "email": "ada@example.com", "name": "Ada" } })
                    .to_string(),
            ))
            .unwrap()
    };

    assert_eq!(send(&app, submit("203.0.113.9, 10.0.0.1")).await.status(), StatusCode::CREATED);
    assert_eq!(send(&app, submit("203.0.113.9")).await.status(), StatusCode::CONFLICT);
    assert_eq!(send(&app, submit("198.51.100.4")).await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_repeats_from_same_address_allowed_by_default() {
    let app = app_with_newsletter(json!({})).await;
    for _ in 0..2 {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/form-submissions")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from(
                json!({ "formId": "newsletter", "values": { "email": "ada@example.com", "name": "Ada" } })
                    .to_string(),
            ))
            .unwrap();
        assert_eq!(send(&app, request).await.status(), StatusCode::CREATED);
    }
    let listing = body_json(get(&app, "/api/forms").await).await;
    assert_eq!(listing[0]["submissionCount"], 2);
    assert_eq!(listing[0]["settings"]["allowMultipleSubmissions"], true);
}

#[tokio::test]
async fn test_leads_and_csv_export() {
    let app = app_with_newsletter(json!({ "allowMultipleSubmissions": true })).await;
    for (email, name) in [("ada@example.com", "Ada"), ("grace@example.com", "Grace, G.")] {
        let response = send_json(
            &app,
            Method::POST,
            "/api/form-submissions",
            json!({ "formId": "newsletter", "values": { "email": email, "name": name } }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let leads = body_json(get(&app, "/api/forms/newsletter/leads").await).await;
    assert_eq!(leads["totalCount"], 2);
    assert_eq!(leads["formConfig"]["id"], "newsletter");

    let response = get(&app, "/api/forms/newsletter/leads/export").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"newsletter-signup-leads.csv\""
    );
    let csv = body_text(response).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("\"Submission ID\",\"Created At\""));
    assert!(lines[0].ends_with("\"Email\",\"Name\""));
    assert!(csv.contains("\"Grace, G.\""));

    assert_eq!(get(&app, "/api/forms/missing/leads/export").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sheets_test_without_credentials() {
    let app = test_app();
    let response = get(&app, "/api/sheets/test?spreadsheetId=abc").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_embed_definition_is_public_and_cacheable() {
    let app = app_with_newsletter(json!({ "successMessage": "Thanks!" })).await;
    let response = send(
        &app,
        Request::builder()
            .uri("/api/embed/form/newsletter")
            .header(header::ORIGIN, "https://partner.example")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=300");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["form"]["fields"].as_array().unwrap().len(), 2);
    assert_eq!(body["form"]["settings"]["successMessage"], "Thanks!");
    assert!(body["form"].get("isActive").is_none());
    assert!(body["form"].get("createdAt").is_none());

    let missing = get(&app, "/api/embed/form/missing").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["success"], false);
}

#[tokio::test]
async fn test_embed_preflight() {
    let app = test_app();
    let response = send(
        &app,
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/embed/form/newsletter")
            .header(header::ORIGIN, "https://partner.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(response.status().is_success());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_loader_script() {
    let response = get(&test_app(), "/embed.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("application/javascript"));
    assert!(body_text(response).await.contains("LeadCaptureForms"));
}

#[tokio::test]
async fn test_hosted_form_carries_navigation() {
    let app = app_with_newsletter(json!({})).await;
    let response = get(&app, "/forms/newsletter?utm_source=newsletter&utm_medium=email").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"action="&#x2F;forms&#x2F;newsletter""#));
    assert!(html.contains(r#"name="_lc_utm_source" value="newsletter""#));
    assert!(html.contains(r#"name="_lc_utm_medium" value="email""#));
    assert!(html.contains(r#"name="_lc_landing_page""#));
    assert!(html.contains("Newsletter Signup"));
}

#[tokio::test]
async fn test_hosted_embedded_form_uses_host_page() {
    let app = app_with_newsletter(json!({})).await;
    let response = get(
        &app,
        "/forms/newsletter?embed=1&landing=https%3A%2F%2Fpartner.example%2F%3Futm_source%3Dads&ref=https%3A%2F%2Fsearch.example%2F",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(r#"name="_lc_utm_source" value="ads""#));
    assert!(html.contains(r#"name="_lc_referrer""#));
    assert!(html.contains("lc-form-height"));
}

#[tokio::test]
async fn test_hosted_form_unavailable() {
    let app = test_app();
    let response = get(&app, "/forms/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("This form is currently unavailable."));
}

#[tokio::test]
async fn test_hosted_post_rerenders_with_errors() {
    let app = app_with_newsletter(json!({})).await;
    let response = post_form(&app, "/forms/newsletter", "email=not-an-email&name=Ada").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains(r#"id="lc-email-error""#));
    assert!(html.contains(r#"value="Ada""#));
    assert!(!html.contains(r#"id="lc-name-error""#));
}

#[tokio::test]
async fn test_hosted_post_redirects_when_configured() {
    let app = app_with_newsletter(json!({ "redirectUrl": "https://site.example/thanks" })).await;
    let response = post_form(
        &app,
        "/forms/newsletter",
        "email=ada%40example.com&name=Ada&_lc_utm_source=ads&_lc_landing_page=https%3A%2F%2Fsite.example%2F",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "https://site.example/thanks");

    let submissions = body_json(get(&app, "/api/form-submissions?formId=newsletter").await).await;
    assert_eq!(submissions[0]["attribution"]["utmSource"], "ads");
    assert_eq!(submissions[0]["attribution"]["landingPage"], "https://site.example/");
}

#[tokio::test]
async fn test_hosted_post_shows_success_message() {
    let app = app_with_newsletter(json!({})).await;
    let response = post_form(&app, "/forms/newsletter", "email=ada%40example.com&name=Ada").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Thank you for your submission. We will get back to you soon."));
}
