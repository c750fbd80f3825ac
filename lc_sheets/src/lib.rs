//! Google Sheets mirror for recorded submissions.
//!
//! Authenticates as a service account and appends one row per submission to the
//! worksheet named in the form's sync settings, creating the worksheet and its header
//! row when needed.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use lc_forms::export::{sheet_headers, sheet_row};
use lc_forms::schema::FormDefinition;
use lc_forms::submission::Submission;
use lc_persistence::{MirrorError, SubmissionMirror};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

pub mod config;

pub use config::SheetsConfig;

pub const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize, Default)]
struct SpreadsheetMeta {
    #[serde(default)]
    properties: Option<SheetProperties>,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Deserialize, Default)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

fn transport(e: reqwest::Error) -> MirrorError {
    MirrorError::Transport(e.to_string())
}

async fn check(response: Response) -> Result<Response, MirrorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MirrorError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// A1 range for a worksheet title, quoted so spaces and apostrophes survive.
pub fn sheet_range(title: &str, cells: &str) -> String {
    format!("'{}'!{}", title.replace('\'', "''"), cells)
}

pub struct GoogleSheetsMirror {
    client: Client,
    config: SheetsConfig,
    signing_key: EncodingKey,
    token: RwLock<Option<CachedToken>>,
}

impl GoogleSheetsMirror {
    pub fn new(config: SheetsConfig) -> Result<Self, MirrorError> {
        if config.service_account_email.trim().is_empty() {
            return Err(MirrorError::NotConfigured("service account email is empty".to_string()));
        }
        let pem = config.load_private_key()?;
        let signing_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| MirrorError::Auth(format!("invalid private key: {}", e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            config,
            signing_key,
            token: RwLock::new(None),
        })
    }

    pub fn claims(&self, issued_at: i64) -> Claims {
        Claims {
            iss: self.config.service_account_email.clone(),
            scope: SCOPE.to_string(),
            aud: self.config.token_url.clone(),
            iat: issued_at,
            exp: issued_at + TOKEN_LIFETIME_SECS,
        }
    }

    async fn access_token(&self) -> Result<String, MirrorError> {
        {
            let cached = self.token.read().await;
            if let Some(t) = cached.as_ref().filter(|t| Instant::now() < t.expires_at) {
                return Ok(t.value.clone());
            }
        }

        let assertion = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &self.claims(Utc::now().timestamp()),
            &self.signing_key,
        )
        .map_err(|e| MirrorError::Auth(e.to_string()))?;

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(transport)?;
        let token: TokenResponse = check(response)
            .await
            .map_err(|e| MirrorError::Auth(e.to_string()))?
            .json()
            .await
            .map_err(transport)?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        let mut cached = self.token.write().await;
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_SLACK),
        });
        log::debug!("Obtained spreadsheet access token for {}", self.config.service_account_email);
        Ok(token.access_token)
    }

    /// `{api_base}/v4/spreadsheets/{id}` followed by the given path segments.
    fn url(&self, spreadsheet_id: &str, segments: &[&str]) -> Result<Url, MirrorError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| MirrorError::NotConfigured(format!("bad api base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MirrorError::NotConfigured("api base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id])
            .extend(segments);
        Ok(url)
    }

    async fn metadata(&self, token: &str, spreadsheet_id: &str) -> Result<SpreadsheetMeta, MirrorError> {
        let mut url = self.url(spreadsheet_id, &[])?;
        url.query_pairs_mut().append_pair("fields", "properties.title,sheets.properties.title");
        let response = self.client.get(url).bearer_auth(token).send().await.map_err(transport)?;
        check(response).await?.json().await.map_err(transport)
    }

    async fn ensure_worksheet(&self, token: &str, spreadsheet_id: &str, title: &str) -> Result<(), MirrorError> {
        let meta = self.metadata(token, spreadsheet_id).await?;
        if meta.sheets.iter().any(|s| s.properties.title == title) {
            return Ok(());
        }
        log::info!("Creating worksheet '{}' in spreadsheet {}", title, spreadsheet_id);
        let url = self.url(&format!("{}:batchUpdate", spreadsheet_id), &[])?;
        let body = json!({ "requests": [{ "addSheet": { "properties": { "title": title } } }] });
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    async fn ensure_headers(
        &self,
        token: &str,
        spreadsheet_id: &str,
        title: &str,
        headers: &[String],
    ) -> Result<(), MirrorError> {
        let range = sheet_range(title, "1:1");
        let url = self.url(spreadsheet_id, &["values", &range])?;
        let response = self.client.get(url).bearer_auth(token).send().await.map_err(transport)?;
        let current: ValueRange = check(response).await?.json().await.map_err(transport)?;
        if current.values.first().map(Vec::as_slice) == Some(headers) {
            return Ok(());
        }

        log::info!("Writing header row of '{}' in spreadsheet {}", title, spreadsheet_id);
        let mut url = self.url(spreadsheet_id, &["values", &sheet_range(title, "A1")])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&json!({ "values": [headers] }))
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    async fn append_row(
        &self,
        token: &str,
        spreadsheet_id: &str,
        title: &str,
        row: &[String],
    ) -> Result<(), MirrorError> {
        let append = format!("{}:append", sheet_range(title, "A1"));
        let mut url = self.url(spreadsheet_id, &["values", &append])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    /// Opens the spreadsheet and returns its title.
    pub async fn test_connection(&self, spreadsheet_id: &str) -> Result<String, MirrorError> {
        let token = self.access_token().await?;
        let meta = self.metadata(&token, spreadsheet_id).await?;
        Ok(meta.properties.map(|p| p.title).unwrap_or_default())
    }
}

#[async_trait]
impl SubmissionMirror for GoogleSheetsMirror {
    async fn mirror(&self, form: &FormDefinition, submission: &Submission) -> Result<(), MirrorError> {
        let sync = form
            .settings
            .external_sync
            .as_ref()
            .filter(|s| s.is_active())
            .ok_or_else(|| MirrorError::NotConfigured(format!("form '{}' has no active sync", form.id)))?;
        let spreadsheet_id = sync.target_id.trim();
        let title = sync.worksheet_title();

        let token = self.access_token().await?;
        self.ensure_worksheet(&token, spreadsheet_id, title).await?;
        self.ensure_headers(&token, spreadsheet_id, title, &sheet_headers(form)).await?;
        self.append_row(&token, spreadsheet_id, title, &sheet_row(form, submission)).await?;
        log::info!(
            "Appended submission {} to '{}' in spreadsheet {}",
            submission.id,
            title,
            spreadsheet_id
        );
        Ok(())
    }
}
