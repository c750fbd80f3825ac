use serde::Serialize;
use thiserror::Error;

/// Why a single value was rejected. Produced by the field validator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationError {
    #[error("value is required")]
    MissingRequiredField,
    #[error("length {actual} is outside {min:?}..={max:?}")]
    LengthOutOfRange {
        min: Option<usize>,
        max: Option<usize>,
        actual: usize,
    },
    #[error("value does not match pattern {pattern}")]
    PatternMismatch { pattern: String },
    #[error("value is not a valid {expected}")]
    InvalidFormat { expected: String },
}

/// A validation failure tagged with its field, plus the message shown next to the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field_id: String,
    pub error: ValidationError,
    pub message: String,
}

/// A form definition that cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("field '{field_id}' of type {field_type} needs at least one option")]
    MissingOptions { field_id: String, field_type: String },
    #[error("field id '{field_id}' is used more than once")]
    DuplicateFieldId { field_id: String },
    #[error("field '{label}' has an empty id")]
    EmptyFieldId { label: String },
    #[error("field '{field_id}' has minLength {min} greater than maxLength {max}")]
    InvalidLengthBounds { field_id: String, min: usize, max: usize },
    #[error("field '{field_id}' has an invalid pattern: {reason}")]
    InvalidPattern { field_id: String, reason: String },
    #[error("malformed form definition: {0}")]
    Malformed(String),
}
