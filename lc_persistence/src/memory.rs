use lc_forms::schema::FormDefinition;
use lc_forms::submission::Submission;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    ensure_first_from_client, prepare_form, sort_forms, sort_submissions, PersistenceDriver, StoreError,
};

#[derive(Default)]
struct Tables {
    forms: Vec<FormDefinition>,
    submissions: Vec<Submission>,
}

/// Keeps everything in process memory. Used for tests and throwaway servers.
#[derive(Default)]
pub struct MemoryDriver {
    tables: RwLock<Tables>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

impl PersistenceDriver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_form(&self, id: &str) -> Result<Option<FormDefinition>, StoreError> {
        Ok(self.read()?.forms.iter().find(|f| f.id == id).cloned())
    }

    fn list_forms(&self) -> Result<Vec<FormDefinition>, StoreError> {
        let mut forms = self.read()?.forms.clone();
        sort_forms(&mut forms);
        Ok(forms)
    }

    fn save_form(&self, form: FormDefinition) -> Result<FormDefinition, StoreError> {
        let mut tables = self.write()?;
        let position = tables.forms.iter().position(|f| f.id == form.id && !f.id.is_empty());
        let stored = prepare_form(form, position.map(|i| &tables.forms[i]))?;
        match position {
            Some(i) => tables.forms[i] = stored.clone(),
            None => tables.forms.push(stored.clone()),
        }
        Ok(stored)
    }

    fn delete_form(&self, id: &str) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let before = tables.forms.len();
        tables.forms.retain(|f| f.id != id);
        if tables.forms.len() == before {
            return Err(StoreError::FormNotFound(id.to_string()));
        }
        tables.submissions.retain(|s| s.form_id != id);
        Ok(())
    }

    fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.forms.iter().any(|f| f.id == submission.form_id) {
            return Err(StoreError::FormNotFound(submission.form_id.clone()));
        }
        tables.submissions.push(submission.clone());
        Ok(())
    }

    fn insert_submission_once(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.forms.iter().any(|f| f.id == submission.form_id) {
            return Err(StoreError::FormNotFound(submission.form_id.clone()));
        }
        ensure_first_from_client(&tables.submissions, submission)?;
        tables.submissions.push(submission.clone());
        Ok(())
    }

    fn list_submissions(&self, form_id: Option<&str>) -> Result<Vec<Submission>, StoreError> {
        let mut submissions: Vec<Submission> = self
            .read()?
            .submissions
            .iter()
            .filter(|s| form_id.map_or(true, |id| s.form_id == id))
            .cloned()
            .collect();
        sort_submissions(&mut submissions);
        Ok(submissions)
    }

    fn count_submissions(&self, form_id: &str) -> Result<usize, StoreError> {
        Ok(self.read()?.submissions.iter().filter(|s| s.form_id == form_id).count())
    }
}
