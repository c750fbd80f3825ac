use lc_forms::schema::FormDefinition;
use lc_forms::submission::Submission;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::{
    ensure_first_from_client, prepare_form, sort_forms, sort_submissions, PersistenceDriver, StoreError,
};

const FORMS_FILE: &str = "forms.json";
const SUBMISSIONS_FILE: &str = "submissions.json";

/// Stores forms and submissions as two pretty-printed JSON arrays in a directory.
///
/// Every operation reads the whole file; writes rewrite it. Writers are serialized by
/// a process-wide mutex, so two drivers must not share a directory.
pub struct JsonFileDriver {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(records)?;
    // Replace in one step so readers never see a half-written file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl JsonFileDriver {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        log::debug!("JSON storage at {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn forms_path(&self) -> PathBuf {
        self.dir.join(FORMS_FILE)
    }

    fn submissions_path(&self) -> PathBuf {
        self.dir.join(SUBMISSIONS_FILE)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock.lock().map_err(|_| StoreError::Poisoned)
    }

    fn forms(&self) -> Result<Vec<FormDefinition>, StoreError> {
        read_records(&self.forms_path())
    }

    fn submissions(&self) -> Result<Vec<Submission>, StoreError> {
        read_records(&self.submissions_path())
    }
}

impl PersistenceDriver for JsonFileDriver {
    fn name(&self) -> &str {
        "json"
    }

    fn get_form(&self, id: &str) -> Result<Option<FormDefinition>, StoreError> {
        Ok(self.forms()?.into_iter().find(|f| f.id == id))
    }

    fn list_forms(&self) -> Result<Vec<FormDefinition>, StoreError> {
        let mut forms = self.forms()?;
        sort_forms(&mut forms);
        Ok(forms)
    }

    fn save_form(&self, form: FormDefinition) -> Result<FormDefinition, StoreError> {
        let _guard = self.lock()?;
        let mut forms = self.forms()?;
        let position = forms.iter().position(|f| f.id == form.id && !f.id.is_empty());
        let stored = prepare_form(form, position.map(|i| &forms[i]))?;
        match position {
            Some(i) => forms[i] = stored.clone(),
            None => forms.push(stored.clone()),
        }
        write_records(&self.forms_path(), &forms)?;
        log::debug!("Saved form '{}' to {}", stored.id, self.forms_path().display());
        Ok(stored)
    }

    fn delete_form(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        let mut forms = self.forms()?;
        let before = forms.len();
        forms.retain(|f| f.id != id);
        if forms.len() == before {
            return Err(StoreError::FormNotFound(id.to_string()));
        }
        let mut submissions = self.submissions()?;
        let kept = submissions.len();
        submissions.retain(|s| s.form_id != id);
        // forms.json goes first so a failed cascade can only leave orphaned submissions.
        write_records(&self.forms_path(), &forms)?;
        if submissions.len() != kept {
            write_records(&self.submissions_path(), &submissions)?;
        }
        Ok(())
    }

    fn insert_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        if !self.forms()?.iter().any(|f| f.id == submission.form_id) {
            return Err(StoreError::FormNotFound(submission.form_id.clone()));
        }
        let mut submissions = self.submissions()?;
        submissions.push(submission.clone());
        write_records(&self.submissions_path(), &submissions)
    }

    fn insert_submission_once(&self, submission: &Submission) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        if !self.forms()?.iter().any(|f| f.id == submission.form_id) {
            return Err(StoreError::FormNotFound(submission.form_id.clone()));
        }
        let mut submissions = self.submissions()?;
        ensure_first_from_client(&submissions, submission)?;
        submissions.push(submission.clone());
        write_records(&self.submissions_path(), &submissions)
    }

    fn list_submissions(&self, form_id: Option<&str>) -> Result<Vec<Submission>, StoreError> {
        let mut submissions: Vec<Submission> = self
            .submissions()?
            .into_iter()
            .filter(|s| form_id.map_or(true, |id| s.form_id == id))
            .collect();
        sort_submissions(&mut submissions);
        Ok(submissions)
    }
}
