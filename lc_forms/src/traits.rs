use crate::normalize::NavigationContext;
use crate::schema::{FieldDefinition, FieldType, FieldValue, Values};
use anyhow::Error;
use std::collections::HashMap;

/// Context passed to renderers
pub struct RenderContext<'a> {
    /// Values to show again after a rejected post. `None` on first load.
    pub values: Option<&'a Values>,
    /// Inline messages keyed by field id.
    pub errors: &'a HashMap<String, String>,
    pub navigation: &'a NavigationContext,
    /// Where the browser posts the form.
    pub action: &'a str,
}

impl<'a> RenderContext<'a> {
    pub fn value_of(&self, field_id: &str) -> Option<&'a FieldValue> {
        self.values.and_then(|v| v.get(field_id))
    }

    pub fn error_for(&self, field_id: &str) -> Option<&'a str> {
        self.errors.get(field_id).map(String::as_str).filter(|m| !m.is_empty())
    }
}

pub trait ElementRenderer: Send + Sync {
    /// Returns the field types this renderer handles
    fn handled_types(&self) -> Vec<FieldType>;

    /// Render the field to a string (HTML)
    fn render(&self, field: &FieldDefinition, ctx: &RenderContext) -> Result<String, Error>;
}
