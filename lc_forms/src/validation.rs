use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{FieldError, ValidationError};
use crate::schema::{FieldDefinition, FieldType, FieldValue, FormDefinition, Values};

static EMAIL_SHAPE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"));

/// Field patterns compiled once per distinct pattern string.
static PATTERNS: Lazy<RwLock<HashMap<String, Regex>>> = Lazy::new(|| RwLock::new(HashMap::new()));

fn is_email(text: &str) -> bool {
    match EMAIL_SHAPE.as_ref() {
        Ok(re) => re.is_match(text),
        Err(e) => {
            log::error!("Email shape expression failed to compile: {}", e);
            false
        }
    }
}

/// Matches `text` against a field pattern. A pattern that does not compile never
/// matches.
pub(crate) fn pattern_matches(pattern: &str, text: &str) -> bool {
    if let Ok(cache) = PATTERNS.read() {
        if let Some(re) = cache.get(pattern) {
            return re.is_match(text);
        }
    }
    match Regex::new(pattern) {
        Ok(re) => {
            let matched = re.is_match(text);
            if let Ok(mut cache) = PATTERNS.write() {
                cache.insert(pattern.to_string(), re);
            }
            matched
        }
        Err(e) => {
            log::debug!("Pattern '{}' does not compile: {}", pattern, e);
            false
        }
    }
}

/// Checks one value against one field definition.
///
/// Rules run in order (required, length, pattern, type shape) and stop at the first
/// failure. An empty value on an optional field is accepted and yields `None`.
/// Checkbox selections come back de-duplicated and in `options` order.
pub fn validate(
    field: &FieldDefinition,
    value: Option<&FieldValue>,
) -> Result<Option<FieldValue>, ValidationError> {
    let value = match value {
        Some(FieldValue::Flag(false)) if field.required => {
            return Err(ValidationError::MissingRequiredField)
        }
        Some(v @ FieldValue::Flag(_)) => v,
        Some(v) if !v.is_empty() => v,
        _ if field.required => return Err(ValidationError::MissingRequiredField),
        _ => return Ok(None),
    };

    if let (Some(rules), FieldValue::Text(text)) = (&field.validation, value) {
        if field.field_type.is_string_valued() {
            let actual = text.chars().count();
            let (min, max) = (rules.min(), rules.max());
            if min.is_some_and(|m| actual < m) || max.is_some_and(|m| actual > m) {
                return Err(ValidationError::LengthOutOfRange { min, max, actual });
            }
            if let Some(pattern) = rules.pattern() {
                if !pattern_matches(pattern, text) {
                    return Err(ValidationError::PatternMismatch { pattern: pattern.to_string() });
                }
            }
        }
    }

    check_shape(field, value).map(Some)
}

fn invalid(expected: &str) -> ValidationError {
    ValidationError::InvalidFormat { expected: expected.to_string() }
}

fn check_shape(field: &FieldDefinition, value: &FieldValue) -> Result<FieldValue, ValidationError> {
    match &field.field_type {
        FieldType::Text | FieldType::Textarea | FieldType::Phone => match value {
            FieldValue::Text(_) => Ok(value.clone()),
            _ => Err(invalid("text")),
        },
        FieldType::Email => match value {
            FieldValue::Text(s) if is_email(s.trim()) => Ok(value.clone()),
            _ => Err(invalid("email address")),
        },
        FieldType::Number => match value {
            FieldValue::Text(s) if s.trim().parse::<f64>().is_ok_and(f64::is_finite) => Ok(value.clone()),
            _ => Err(invalid("number")),
        },
        FieldType::Date => match value {
            FieldValue::Text(s) if NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").is_ok() => {
                Ok(value.clone())
            }
            _ => Err(invalid("date")),
        },
        FieldType::Select | FieldType::Radio => match value {
            FieldValue::Text(s) if field.options().iter().any(|o| o == s) => Ok(value.clone()),
            _ => Err(invalid("option")),
        },
        FieldType::Checkbox => match value {
            FieldValue::Flag(_) => Ok(value.clone()),
            FieldValue::Text(s) => order_selection(field, std::slice::from_ref(s)),
            FieldValue::Multi(items) => order_selection(field, items),
        },
        FieldType::Unknown(_) => Ok(value.clone()),
    }
}

fn order_selection(field: &FieldDefinition, picked: &[String]) -> Result<FieldValue, ValidationError> {
    let picked: Vec<&String> = picked.iter().filter(|p| !p.trim().is_empty()).collect();
    if picked.iter().any(|p| !field.options().contains(*p)) {
        return Err(invalid("option"));
    }
    let ordered = field
        .options()
        .iter()
        .filter(|o| picked.contains(o))
        .cloned()
        .collect();
    Ok(FieldValue::Multi(ordered))
}

/// Message shown next to the input for a failed field.
pub fn message_for(field: &FieldDefinition, error: &ValidationError) -> String {
    let label = field.display_label();
    match error {
        ValidationError::MissingRequiredField => format!("{} is required", label),
        ValidationError::LengthOutOfRange { min: Some(min), actual, .. } if actual < min => {
            format!("{} must be at least {} characters", label, min)
        }
        ValidationError::LengthOutOfRange { max, .. } => match max {
            Some(max) => format!("{} must be no more than {} characters", label, max),
            None => format!("{} has an invalid length", label),
        },
        ValidationError::PatternMismatch { .. } => format!("{} format is invalid", label),
        ValidationError::InvalidFormat { expected } => format!("{} must be a valid {}", label, expected),
    }
}

/// Validates a whole submission against a form definition.
pub struct Validator;

impl Validator {
    /// Runs every field and reports all failures together. Keys the form does not
    /// define are dropped from the accepted values.
    pub fn validate(&self, form: &FormDefinition, values: &Values) -> Result<Values, Vec<FieldError>> {
        let mut accepted = Values::new();
        let mut errors = Vec::new();

        for field in &form.fields {
            match validate(field, values.get(&field.id)) {
                Ok(Some(v)) => {
                    accepted.insert(field.id.clone(), v);
                }
                Ok(None) => {}
                Err(error) => errors.push(FieldError {
                    field_id: field.id.clone(),
                    message: message_for(field, &error),
                    error,
                }),
            }
        }

        if errors.is_empty() {
            Ok(accepted)
        } else {
            log::debug!("Form '{}' rejected with {} field error(s)", form.id, errors.len());
            Err(errors)
        }
    }
}
