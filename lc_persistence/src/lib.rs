use chrono::Utc;
use lc_forms::error::DefinitionError;
use lc_forms::schema::FormDefinition;
use lc_forms::submission::Submission;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod json_file;
pub mod memory;
pub mod sink;

pub use json_file::JsonFileDriver;
pub use memory::MemoryDriver;
pub use sink::{MirrorError, SinkError, SubmissionMirror, SubmissionSink};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("form '{0}' not found")]
    FormNotFound(String),
    #[error("form '{0}' already has a submission from {1}")]
    DuplicateSubmission(String, String),
    #[error(transparent)]
    InvalidDefinition(#[from] DefinitionError),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored data is unreadable: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("unknown storage driver '{0}'")]
    UnknownDriver(String),
}

/// Form definitions and submissions, behind one driver.
///
/// Deleting a form removes its submissions; a submission for a form the driver
/// does not hold is refused.
pub trait PersistenceDriver: Send + Sync {
    fn name(&self) -> &str;

    fn get_form(&self, id: &str) -> Result<Option<FormDefinition>, StoreError>;

    /// All forms, most recently updated first.
    fn list_forms(&self) -> Result<Vec<FormDefinition>, StoreError>;

    /// Inserts or fully replaces a form. Returns the stored copy with its id and
    /// timestamps filled in.
    fn save_form(&self, form: FormDefinition) -> Result<FormDefinition, StoreError>;

    fn delete_form(&self, id: &str) -> Result<(), StoreError>;

    fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError>;

    /// Submissions newest first, optionally for a single form.
    fn list_submissions(&self, form_id: Option<&str>) -> Result<Vec<Submission>, StoreError>;

    fn count_submissions(&self, form_id: &str) -> Result<usize, StoreError> {
        Ok(self.list_submissions(Some(form_id))?.len())
    }

    /// Inserts unless the form already holds a submission from the same client
    /// address, checking and writing under one lock. A submission without an
    /// address is inserted as usual.
    fn insert_submission_once(&self, submission: &Submission) -> Result<(), StoreError>;
}

/// Refuses `submission` when `existing` already has one for its form from its address.
pub(crate) fn ensure_first_from_client(
    existing: &[Submission],
    submission: &Submission,
) -> Result<(), StoreError> {
    let Some(ip) = submission.client.ip_address.as_deref() else {
        return Ok(());
    };
    let seen = existing
        .iter()
        .any(|s| s.form_id == submission.form_id && s.client.ip_address.as_deref() == Some(ip));
    if seen {
        return Err(StoreError::DuplicateSubmission(submission.form_id.clone(), ip.to_string()));
    }
    Ok(())
}

/// Checks a definition and stamps it for storage. `existing` is the stored copy being
/// replaced, if any.
pub(crate) fn prepare_form(
    mut form: FormDefinition,
    existing: Option<&FormDefinition>,
) -> Result<FormDefinition, StoreError> {
    form.check()?;
    if form.id.trim().is_empty() {
        form.id = Uuid::new_v4().to_string();
    }
    let now = Utc::now();
    form.created_at = existing.and_then(|f| f.created_at).or(Some(now));
    form.updated_at = Some(now);
    Ok(form)
}

pub(crate) fn sort_forms(forms: &mut [FormDefinition]) {
    forms.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

pub(crate) fn sort_submissions(submissions: &mut [Submission]) {
    submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Json,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub driver: DriverKind,
    /// Directory holding `forms.json` and `submissions.json`.
    #[serde(default = "default_location")]
    pub location: PathBuf,
}

fn default_location() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            location: default_location(),
        }
    }
}

pub fn open_driver(config: &StorageConfig) -> Result<Arc<dyn PersistenceDriver>, StoreError> {
    let driver: Arc<dyn PersistenceDriver> = match config.driver {
        DriverKind::Json => Arc::new(JsonFileDriver::open(&config.location)?),
        DriverKind::Memory => Arc::new(MemoryDriver::new()),
    };
    log::info!("Using '{}' storage driver", driver.name());
    Ok(driver)
}
