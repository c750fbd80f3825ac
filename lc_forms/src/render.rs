use crate::normalize::{NavigationContext, UTM_PARAMS};
use crate::registry::TypeRegistry;
use crate::schema::{FieldDefinition, FormDefinition};
use crate::traits::RenderContext;
use anyhow::Result;

/// Prefix of the hidden inputs that carry the navigation context through a post.
pub const NAV_PREFIX: &str = "_lc_";
pub const NAV_REFERRER: &str = "_lc_referrer";
pub const NAV_LANDING_PAGE: &str = "_lc_landing_page";

pub fn escape(text: &str) -> String {
    tera::escape_html(text)
}

pub struct FormEngine<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> FormEngine<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Renders the whole form. The definition is checked first; a definition that
    /// fails the load-time checks is never rendered.
    pub fn render(&self, form: &FormDefinition, ctx: &RenderContext) -> Result<String> {
        form.check()?;

        let mut output = String::new();
        output.push_str(&format!(
            r#"<form id="lc-form-{}" class="lc-form" method="post" action="{}" novalidate>"#,
            escape(&form.id),
            escape(ctx.action)
        ));
        output.push_str(&self.render_header(form));
        output.push_str(&self.render_fields(&form.fields, ctx)?);
        output.push_str(&render_navigation(ctx.navigation));
        output.push_str(r#"<button type="submit" class="lc-submit">Submit Form</button>"#);
        output.push_str("</form>");
        Ok(output)
    }

    fn render_header(&self, form: &FormDefinition) -> String {
        let description = if form.description.trim().is_empty() {
            String::new()
        } else {
            format!(r#"<p class="lc-form-description">{}</p>"#, escape(&form.description))
        };
        format!(
            r#"<div class="lc-form-header"><h2 class="lc-form-title">{}</h2>{}</div>"#,
            escape(&form.name),
            description
        )
    }

    pub fn render_fields(&self, fields: &[FieldDefinition], ctx: &RenderContext) -> Result<String> {
        let mut output = String::new();
        for field in fields {
            output.push_str(&format!(
                r#"<div class="lc-field" data-field-id="{}">"#,
                escape(&field.id)
            ));
            output.push_str(&self.render_field(field, ctx)?);
            output.push_str("</div>");
        }
        Ok(output)
    }

    /// Draws one field. Types without a renderer get a visible placeholder so the
    /// field is never silently dropped.
    pub fn render_field(&self, field: &FieldDefinition, ctx: &RenderContext) -> Result<String> {
        match self.registry.get_element_renderer(&field.field_type) {
            Some(renderer) => renderer.render(field, ctx),
            None => {
                log::warn!("No renderer for field '{}' of type '{}'", field.id, field.field_type);
                Ok(format!(
                    r#"<div class="lc-unknown-field">Unknown field type: {}</div>"#,
                    escape(field.field_type.as_str())
                ))
            }
        }
    }
}

fn hidden(name: &str, value: &str) -> String {
    format!(r#"<input type="hidden" name="{}" value="{}" />"#, escape(name), escape(value))
}

fn render_navigation(nav: &NavigationContext) -> String {
    let mut output = String::new();
    for key in UTM_PARAMS {
        if let Some(v) = nav.params.get(key) {
            output.push_str(&hidden(&format!("{}{}", NAV_PREFIX, key), v));
        }
    }
    if let Some(r) = &nav.referrer {
        output.push_str(&hidden(NAV_REFERRER, r));
    }
    if let Some(p) = &nav.landing_page {
        output.push_str(&hidden(NAV_LANDING_PAGE, p));
    }
    output
}
