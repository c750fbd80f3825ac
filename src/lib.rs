pub mod capture;

pub use capture::{CaptureError, FormSummary, LeadCapture};
pub use lc_forms::{
    FieldDefinition, FieldError, FieldType, FieldValue, FormDefinition, NavigationContext,
    Submission, SubmissionId, ValidationError, Values,
};
pub use lc_persistence::{PersistenceDriver, SubmissionMirror, SubmissionSink};
