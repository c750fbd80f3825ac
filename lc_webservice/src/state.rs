use anyhow::Context;
use lc_forms::registry::TypeRegistry;
use lc_forms_std_renderers::standard_registry;
use lc_persistence::{open_driver, SubmissionSink};
use lc_sheets::GoogleSheetsMirror;
use leadcapture::LeadCapture;
use log::info;
use std::sync::Arc;

use crate::pages::Pages;
use crate::{EmbedConfig, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub capture: LeadCapture,
    pub registry: Arc<TypeRegistry>,
    pub pages: Arc<Pages>,
    pub embed: EmbedConfig,
    /// Present when spreadsheet credentials are configured.
    pub sheets: Option<Arc<GoogleSheetsMirror>>,
}

impl AppState {
    pub fn new(capture: LeadCapture, embed: EmbedConfig) -> anyhow::Result<Self> {
        Ok(Self {
            capture,
            registry: Arc::new(standard_registry()),
            pages: Arc::new(Pages::new().context("loading page templates")?),
            embed,
            sheets: None,
        })
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let driver = open_driver(&config.storage).context("opening storage")?;
        let mut sink = SubmissionSink::new(driver);

        let mirror = match config.sheets.as_ref().filter(|s| s.has_credentials()) {
            Some(sheets) => {
                let mirror = Arc::new(
                    GoogleSheetsMirror::new(sheets.clone()).context("configuring spreadsheet mirror")?,
                );
                info!("Spreadsheet mirror enabled for {}", sheets.service_account_email);
                sink = sink.with_mirror(mirror.clone());
                Some(mirror)
            }
            None => {
                info!("Spreadsheet mirror disabled: no service account configured");
                None
            }
        };

        let mut state = Self::new(LeadCapture::new(sink), config.embed.clone())?;
        state.sheets = mirror;
        Ok(state)
    }
}
