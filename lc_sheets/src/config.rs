use lc_persistence::MirrorError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_SERVICE_ACCOUNT_EMAIL: &str = "GOOGLE_SERVICE_ACCOUNT_EMAIL";
pub const ENV_PRIVATE_KEY: &str = "GOOGLE_PRIVATE_KEY";

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Service account credentials and endpoints for the spreadsheet mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub service_account_email: String,
    /// PEM text. Literal `\n` sequences, as found in environment variables, are accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_timeout() -> u64 {
    10
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            service_account_email: String::new(),
            private_key: None,
            private_key_path: None,
            timeout_secs: default_timeout(),
            token_url: default_token_url(),
            api_base: default_api_base(),
        }
    }
}

impl SheetsConfig {
    /// Overrides the credentials with `GOOGLE_SERVICE_ACCOUNT_EMAIL` and
    /// `GOOGLE_PRIVATE_KEY` when they are set.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_SERVICE_ACCOUNT_EMAIL).ok(),
            std::env::var(ENV_PRIVATE_KEY).ok(),
        );
    }

    pub fn apply_overrides(&mut self, email: Option<String>, private_key: Option<String>) {
        if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
            self.service_account_email = email;
        }
        if let Some(key) = private_key.filter(|k| !k.trim().is_empty()) {
            self.private_key = Some(key);
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.service_account_email.trim().is_empty()
            && (self.private_key.is_some() || self.private_key_path.is_some())
    }

    /// The PEM text of the signing key. An inline key wins over `private_key_path`.
    pub fn load_private_key(&self) -> Result<String, MirrorError> {
        let raw = match (&self.private_key, &self.private_key_path) {
            (Some(key), _) => key.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                MirrorError::NotConfigured(format!("cannot read {}: {}", path.display(), e))
            })?,
            (None, None) => {
                return Err(MirrorError::NotConfigured("no private key configured".to_string()))
            }
        };
        Ok(raw.replace("\\n", "\n"))
    }
}
