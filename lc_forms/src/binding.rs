use serde_json::Value;

use crate::normalize::{NavigationContext, UTM_PARAMS};
use crate::render::{NAV_LANDING_PAGE, NAV_PREFIX, NAV_REFERRER};
use crate::schema::{FieldType, FieldValue, FormDefinition, Values};

/// Collects raw submitted data into a value map keyed by field id.
///
/// Only ids the form defines are kept; anything else in the payload is ignored.
pub trait Binder<T: ?Sized> {
    fn extract(&self, form: &FormDefinition, data: &T) -> Values;
}

/// Binds a JSON object, as posted by the embed script or the API.
pub struct JsonBinder;

impl Binder<serde_json::Map<String, Value>> for JsonBinder {
    fn extract(&self, form: &FormDefinition, data: &serde_json::Map<String, Value>) -> Values {
        let mut values = Values::new();
        for field in &form.fields {
            if let Some(v) = data.get(&field.id).and_then(json_to_field_value) {
                values.insert(field.id.clone(), v);
            }
        }
        values
    }
}

pub fn json_to_field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Flag(*b)),
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Number(n) => Some(FieldValue::Text(n.to_string())),
        Value::Array(items) => Some(FieldValue::Multi(
            items
                .iter()
                .filter(|i| !i.is_null())
                .map(|i| match i {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )),
        Value::Object(_) => {
            log::debug!("Ignoring object value in form payload");
            None
        }
    }
}

/// Binds an url-encoded browser post. Checkbox groups arrive as repeated keys.
pub struct FormPostBinder;

impl Binder<[(String, String)]> for FormPostBinder {
    fn extract(&self, form: &FormDefinition, data: &[(String, String)]) -> Values {
        let mut values = Values::new();
        for field in &form.fields {
            let mut posted = data.iter().filter(|(k, _)| *k == field.id).map(|(_, v)| v.clone());
            let value = if field.field_type == FieldType::Checkbox {
                let picked: Vec<String> = posted.collect();
                (!picked.is_empty()).then_some(FieldValue::Multi(picked))
            } else {
                posted.next().map(FieldValue::Text)
            };
            if let Some(v) = value {
                values.insert(field.id.clone(), v);
            }
        }
        values
    }
}

/// Recovers the navigation context the renderer stored in hidden inputs.
pub fn navigation_from_post(data: &[(String, String)]) -> NavigationContext {
    let find = |name: &str| data.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
    let mut nav = NavigationContext::from_landing_page(find(NAV_LANDING_PAGE), find(NAV_REFERRER));
    for key in UTM_PARAMS {
        if let Some(v) = find(&format!("{}{}", NAV_PREFIX, key)) {
            nav.set_param(key, v);
        }
    }
    nav
}
