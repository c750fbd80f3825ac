use async_trait::async_trait;
use lc_forms::schema::FormDefinition;
use lc_forms::submission::{Submission, SubmissionId};
use std::sync::Arc;
use thiserror::Error;

use crate::{PersistenceDriver, StoreError};

#[derive(Debug, Error)]
pub enum SinkError {
    /// The form was removed between lookup and write.
    #[error("form '{0}' no longer exists")]
    FormGone(String),
    #[error("form '{0}' already has a submission from this client")]
    Duplicate(String),
    #[error("submission store unavailable: {0}")]
    Unavailable(StoreError),
}

impl From<StoreError> for SinkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::FormNotFound(id) => SinkError::FormGone(id),
            StoreError::DuplicateSubmission(id, _) => SinkError::Duplicate(id),
            other => SinkError::Unavailable(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror is not configured: {0}")]
    NotConfigured(String),
    #[error("mirror authentication failed: {0}")]
    Auth(String),
    #[error("mirror request failed: {0}")]
    Transport(String),
    #[error("mirror target answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Best-effort copy of a recorded submission to somewhere outside the store.
#[async_trait]
pub trait SubmissionMirror: Send + Sync {
    async fn mirror(&self, form: &FormDefinition, submission: &Submission) -> Result<(), MirrorError>;
}

/// Durable write of submissions, followed by the optional mirror.
#[derive(Clone)]
pub struct SubmissionSink {
    driver: Arc<dyn PersistenceDriver>,
    mirror: Option<Arc<dyn SubmissionMirror>>,
}

impl SubmissionSink {
    pub fn new(driver: Arc<dyn PersistenceDriver>) -> Self {
        Self { driver, mirror: None }
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn SubmissionMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn driver(&self) -> &Arc<dyn PersistenceDriver> {
        &self.driver
    }

    /// Stores the submission and returns its id once the store has it. Forms that
    /// refuse repeat submissions get the once-per-client insert.
    ///
    /// The mirror runs afterwards on its own task; its outcome is only logged and
    /// never reaches the caller.
    pub async fn record(
        &self,
        form: &FormDefinition,
        submission: Submission,
    ) -> Result<SubmissionId, SinkError> {
        let id = submission.id;
        let stored = if form.settings.allow_multiple_submissions {
            self.driver.insert_submission(&submission)
        } else {
            self.driver.insert_submission_once(&submission)
        };
        if let Err(e) = stored {
            match &e {
                StoreError::DuplicateSubmission(_, ip) => {
                    log::info!("Rejected repeat submission to form '{}' from {}", form.id, ip)
                }
                StoreError::FormNotFound(_) => log::warn!("Form '{}' vanished before submission {}", form.id, id),
                _ => log::error!("Failed to store submission {} for form '{}': {}", id, form.id, e),
            }
            return Err(e.into());
        }
        log::info!("Recorded submission {} for form '{}'", id, form.id);

        let sync_enabled = form
            .settings
            .external_sync
            .as_ref()
            .is_some_and(|s| s.is_active());
        if let (true, Some(mirror)) = (sync_enabled, self.mirror.clone()) {
            let form = form.clone();
            tokio::spawn(async move {
                match mirror.mirror(&form, &submission).await {
                    Ok(()) => log::debug!("Mirrored submission {}", submission.id),
                    Err(e) => log::warn!(
                        "Mirror failed for submission {} of form '{}': {}",
                        submission.id,
                        form.id,
                        e
                    ),
                }
            });
        }

        Ok(id)
    }

    pub fn list_submissions(&self, form_id: Option<&str>) -> Result<Vec<Submission>, SinkError> {
        Ok(self.driver.list_submissions(form_id)?)
    }

    pub fn count_submissions(&self, form_id: &str) -> Result<usize, SinkError> {
        Ok(self.driver.count_submissions(form_id)?)
    }
}
