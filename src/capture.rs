use lc_forms::error::{DefinitionError, FieldError};
use lc_forms::export::leads_csv;
use lc_forms::normalize::{normalize, NavigationContext};
use lc_forms::schema::{FormDefinition, Values};
use lc_forms::submission::{Submission, SubmissionId};
use lc_forms::validation::Validator;
use lc_persistence::{PersistenceDriver, SinkError, StoreError, SubmissionSink};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("form '{0}' is unavailable")]
    NotFound(String),
    #[error("{} field(s) failed validation", .0.len())]
    ValidationFailed(Vec<FieldError>),
    #[error(transparent)]
    SinkUnavailable(SinkError),
    #[error("form '{0}' already has a submission from this client")]
    AlreadySubmitted(String),
    #[error(transparent)]
    InvalidDefinition(#[from] DefinitionError),
    #[error("lead export failed: {0}")]
    Export(String),
}

impl From<StoreError> for CaptureError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::FormNotFound(id) => CaptureError::NotFound(id),
            StoreError::InvalidDefinition(d) => CaptureError::InvalidDefinition(d),
            other => SinkError::from(other).into(),
        }
    }
}

impl From<SinkError> for CaptureError {
    fn from(e: SinkError) -> Self {
        match e {
            SinkError::FormGone(id) => CaptureError::NotFound(id),
            SinkError::Duplicate(id) => CaptureError::AlreadySubmitted(id),
            other => CaptureError::SinkUnavailable(other),
        }
    }
}

/// A form as listed for administrators.
#[derive(Debug, Clone)]
pub struct FormSummary {
    pub form: FormDefinition,
    pub submission_count: usize,
}

/// The submit path (fetch, validate, normalize, record) plus the form administration
/// calls the web service exposes.
#[derive(Clone)]
pub struct LeadCapture {
    forms: Arc<dyn PersistenceDriver>,
    sink: SubmissionSink,
}

impl LeadCapture {
    pub fn new(sink: SubmissionSink) -> Self {
        Self {
            forms: sink.driver().clone(),
            sink,
        }
    }

    /// A form that can take submissions. Missing and deactivated forms look the same.
    pub fn fetch_form(&self, form_id: &str) -> Result<FormDefinition, CaptureError> {
        match self.forms.get_form(form_id)? {
            Some(form) if form.is_active => Ok(form),
            Some(_) => {
                log::debug!("Form '{}' is deactivated", form_id);
                Err(CaptureError::NotFound(form_id.to_string()))
            }
            None => Err(CaptureError::NotFound(form_id.to_string())),
        }
    }

    /// Validates, normalizes and records one submission.
    ///
    /// Every field error is returned together. Nothing is written unless validation
    /// passes. When the form refuses repeats, the store rejects a second submission
    /// from the same client address atomically with the write.
    pub async fn submit(
        &self,
        form_id: &str,
        values: &Values,
        navigation: &NavigationContext,
    ) -> Result<SubmissionId, CaptureError> {
        let form = self.fetch_form(form_id)?;
        let accepted = Validator
            .validate(&form, values)
            .map_err(CaptureError::ValidationFailed)?;

        let submission = normalize(&form.id, accepted, navigation);
        Ok(self.sink.record(&form, submission).await?)
    }

    pub fn get_form(&self, form_id: &str) -> Result<FormDefinition, CaptureError> {
        self.forms
            .get_form(form_id)?
            .ok_or_else(|| CaptureError::NotFound(form_id.to_string()))
    }

    pub fn list_forms(&self) -> Result<Vec<FormSummary>, CaptureError> {
        self.forms
            .list_forms()?
            .into_iter()
            .map(|form| {
                let submission_count = self.forms.count_submissions(&form.id)?;
                Ok(FormSummary { form, submission_count })
            })
            .collect()
    }

    pub fn save_form(&self, form: FormDefinition) -> Result<FormDefinition, CaptureError> {
        let saved = self.forms.save_form(form)?;
        log::info!("Saved form '{}' ({})", saved.id, saved.name);
        Ok(saved)
    }

    pub fn delete_form(&self, form_id: &str) -> Result<(), CaptureError> {
        self.forms.delete_form(form_id)?;
        log::info!("Deleted form '{}' and its submissions", form_id);
        Ok(())
    }

    /// Submissions newest first, optionally for a single form.
    pub fn list_submissions(&self, form_id: Option<&str>) -> Result<Vec<Submission>, CaptureError> {
        Ok(self.sink.list_submissions(form_id)?)
    }

    pub fn leads(&self, form_id: &str) -> Result<(FormDefinition, Vec<Submission>), CaptureError> {
        let form = self.get_form(form_id)?;
        let leads = self.list_submissions(Some(form_id))?;
        Ok((form, leads))
    }

    pub fn export_leads(&self, form_id: &str) -> Result<(FormDefinition, String), CaptureError> {
        let (form, leads) = self.leads(form_id)?;
        let csv = leads_csv(&form, &leads).map_err(|e| CaptureError::Export(e.to_string()))?;
        Ok((form, csv))
    }
}
