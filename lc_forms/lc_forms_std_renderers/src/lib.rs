use anyhow::{Error, Result};
use lc_forms::registry::TypeRegistry;
use lc_forms::render::escape;
use lc_forms::schema::{FieldDefinition, FieldType, FieldValue};
use lc_forms::traits::{ElementRenderer, RenderContext};
use std::sync::Arc;

/// Draws every built-in field type as plain HTML.
pub struct StandardRenderer;

impl ElementRenderer for StandardRenderer {
    fn handled_types(&self) -> Vec<FieldType> {
        FieldType::ALL.to_vec()
    }

    fn render(&self, field: &FieldDefinition, ctx: &RenderContext) -> Result<String, Error> {
        let value = ctx.value_of(&field.id);
        let control = match &field.field_type {
            FieldType::Text => input(field, "text", value),
            FieldType::Email => input(field, "email", value),
            FieldType::Phone => input(field, "tel", value),
            FieldType::Date => input(field, "date", value),
            FieldType::Number => input(field, "number", value),
            FieldType::Textarea => textarea(field, value),
            FieldType::Select => select(field, value),
            FieldType::Radio => choices(field, "radio", value),
            FieldType::Checkbox => choices(field, "checkbox", value),
            FieldType::Unknown(name) => {
                return Ok(format!(
                    r#"<div class="lc-unknown-field">Unknown field type: {}</div>"#,
                    escape(name)
                ))
            }
        };

        let mut html = label(field);
        html.push_str(&control);
        if let Some(message) = ctx.error_for(&field.id) {
            html.push_str(&format!(
                r#"<p class="lc-field-error" id="lc-{}-error">{}</p>"#,
                escape(&field.id),
                escape(message)
            ));
        }
        Ok(html)
    }
}

fn dom_id(field: &FieldDefinition) -> String {
    format!("lc-{}", escape(&field.id))
}

fn label(field: &FieldDefinition) -> String {
    let marker = if field.required {
        r#" <span class="lc-required">*</span>"#
    } else {
        ""
    };
    format!(
        r#"<label for="{}">{}{}</label>"#,
        dom_id(field),
        escape(field.display_label()),
        marker
    )
}

fn common_attrs(field: &FieldDefinition) -> String {
    let mut attrs = String::new();
    if let Some(p) = field.placeholder.as_deref().filter(|p| !p.is_empty()) {
        attrs.push_str(&format!(r#" placeholder="{}""#, escape(p)));
    }
    if field.required {
        attrs.push_str(" required");
    }
    if let Some(rules) = &field.validation {
        if let Some(min) = rules.min() {
            attrs.push_str(&format!(r#" minlength="{}""#, min));
        }
        if let Some(max) = rules.max() {
            attrs.push_str(&format!(r#" maxlength="{}""#, max));
        }
        if let Some(pattern) = rules.pattern() {
            attrs.push_str(&format!(r#" pattern="{}""#, escape(pattern)));
        }
    }
    attrs
}

fn text_of(value: Option<&FieldValue>) -> String {
    value.and_then(FieldValue::as_text).map(escape).unwrap_or_default()
}

fn is_selected(value: Option<&FieldValue>, option: &str) -> bool {
    match value {
        Some(FieldValue::Text(s)) => s == option,
        Some(FieldValue::Multi(items)) => items.iter().any(|i| i == option),
        _ => false,
    }
}

fn input(field: &FieldDefinition, html_type: &str, value: Option<&FieldValue>) -> String {
    format!(
        r#"<input type="{}" id="{}" name="{}" value="{}" class="lc-input"{} />"#,
        html_type,
        dom_id(field),
        escape(&field.id),
        text_of(value),
        common_attrs(field)
    )
}

fn textarea(field: &FieldDefinition, value: Option<&FieldValue>) -> String {
    format!(
        r#"<textarea id="{}" name="{}" rows="4" class="lc-input"{}>{}</textarea>"#,
        dom_id(field),
        escape(&field.id),
        common_attrs(field),
        text_of(value)
    )
}

fn select(field: &FieldDefinition, value: Option<&FieldValue>) -> String {
    let mut html = format!(
        r#"<select id="{}" name="{}" class="lc-input"{}>"#,
        dom_id(field),
        escape(&field.id),
        if field.required { " required" } else { "" }
    );
    html.push_str(r#"<option value="">Select an option</option>"#);
    for option in field.options() {
        html.push_str(&format!(
            r#"<option value="{0}"{1}>{0}</option>"#,
            escape(option),
            if is_selected(value, option) { " selected" } else { "" }
        ));
    }
    html.push_str("</select>");
    html
}

/// Radio groups and checkbox groups, one input per option in `options` order.
fn choices(field: &FieldDefinition, html_type: &str, value: Option<&FieldValue>) -> String {
    let name = escape(&field.id);
    let mut html = format!(r#"<div class="lc-choices" id="{}">"#, dom_id(field));
    for (i, option) in field.options().iter().enumerate() {
        html.push_str(&format!(
            r#"<label class="lc-choice"><input type="{}" id="{}-{}" name="{}" value="{}"{} /> {}</label>"#,
            html_type,
            dom_id(field),
            i,
            name,
            escape(option),
            if is_selected(value, option) { " checked" } else { "" },
            escape(option)
        ));
    }
    html.push_str("</div>");
    html
}

pub fn register_standard_renderers(registry: &mut TypeRegistry) {
    log::debug!("Registering standard form renderers");
    registry.register(Arc::new(StandardRenderer));
}

/// Registry with the standard renderers already in place.
pub fn standard_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    register_standard_renderers(&mut registry);
    registry
}
