use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::DefinitionError;

/// Submitted values keyed by field id.
pub type Values = BTreeMap<String, FieldValue>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub settings: FormSettings,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Default for FormDefinition {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            fields: Vec::new(),
            settings: FormSettings::default(),
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormSettings {
    /// When `false`, a second submission from the same client address is refused.
    #[serde(default = "default_allow_multiple")]
    pub allow_multiple_submissions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    /// Spreadsheet mirror target. Older documents call this `googleSheets`.
    #[serde(default, alias = "googleSheets", skip_serializing_if = "Option::is_none")]
    pub external_sync: Option<ExternalSync>,
}

fn default_allow_multiple() -> bool {
    true
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            allow_multiple_submissions: default_allow_multiple(),
            redirect_url: None,
            success_message: None,
            external_sync: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSync {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, alias = "spreadsheetId")]
    pub target_id: String,
    #[serde(default, alias = "sheetName", skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,
}

impl ExternalSync {
    pub const DEFAULT_LABEL: &'static str = "Form Submissions";

    pub fn is_active(&self) -> bool {
        self.enabled && !self.target_id.trim().is_empty()
    }

    pub fn worksheet_title(&self) -> &str {
        self.target_label
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(Self::DEFAULT_LABEL)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FieldDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
}

impl FieldDefinition {
    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }

    /// Label used in messages and export headers; falls back to the id.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ValidationRules {
    /// The builder writes `0` for bounds it leaves blank.
    pub fn min(&self) -> Option<usize> {
        self.min_length.filter(|n| *n > 0)
    }

    pub fn max(&self) -> Option<usize> {
        self.max_length.filter(|n| *n > 0)
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref().filter(|p| !p.is_empty())
    }
}

/// Closed set of input types. Anything else is kept verbatim in `Unknown`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Phone,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Date,
    Number,
    Unknown(String),
}

impl FieldType {
    pub const ALL: [FieldType; 9] = [
        FieldType::Text,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Textarea,
        FieldType::Select,
        FieldType::Checkbox,
        FieldType::Radio,
        FieldType::Date,
        FieldType::Number,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Textarea => "textarea",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Date => "date",
            FieldType::Number => "number",
            FieldType::Unknown(other) => other,
        }
    }

    pub fn requires_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Checkbox | FieldType::Radio)
    }

    pub fn is_string_valued(&self) -> bool {
        !matches!(self, FieldType::Checkbox | FieldType::Unknown(_))
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text" => FieldType::Text,
            "email" => FieldType::Email,
            "phone" | "tel" => FieldType::Phone,
            "textarea" => FieldType::Textarea,
            "select" => FieldType::Select,
            "checkbox" => FieldType::Checkbox,
            "radio" => FieldType::Radio,
            "date" => FieldType::Date,
            "number" => FieldType::Number,
            _ => FieldType::Unknown(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single submitted value: a string, a checkbox selection, or a boolean flag.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    Multi(Vec<String>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Flag(b) => !*b,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Multi(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flat string used for spreadsheet cells and CSV export.
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Flag(b) => if *b { "Yes".to_string() } else { "No".to_string() },
            FieldValue::Text(s) => s.clone(),
            FieldValue::Multi(items) => items.join(", "),
        }
    }
}

impl FormDefinition {
    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Load-time checks. A definition that fails here is never rendered or stored.
    pub fn check(&self) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.id.trim().is_empty() {
                return Err(DefinitionError::EmptyFieldId { label: field.label.clone() });
            }
            if !seen.insert(field.id.as_str()) {
                return Err(DefinitionError::DuplicateFieldId { field_id: field.id.clone() });
            }
            if field.field_type.requires_options() && field.options().is_empty() {
                return Err(DefinitionError::MissingOptions {
                    field_id: field.id.clone(),
                    field_type: field.field_type.to_string(),
                });
            }
            if let Some(rules) = &field.validation {
                if let (Some(min), Some(max)) = (rules.min(), rules.max()) {
                    if min > max {
                        return Err(DefinitionError::InvalidLengthBounds {
                            field_id: field.id.clone(),
                            min,
                            max,
                        });
                    }
                }
                if let Some(pattern) = rules.pattern() {
                    Regex::new(pattern).map_err(|e| DefinitionError::InvalidPattern {
                        field_id: field.id.clone(),
                        reason: e.to_string(),
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Parses a definition from JSON and runs the load-time checks.
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let form: FormDefinition =
            serde_json::from_str(json).map_err(|e| DefinitionError::Malformed(e.to_string()))?;
        form.check()?;
        Ok(form)
    }
}
