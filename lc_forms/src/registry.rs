use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::FieldType;
use crate::traits::ElementRenderer;

pub struct TypeRegistry {
    /// Maps field types to the renderer that draws them
    element_renderers: HashMap<FieldType, Arc<dyn ElementRenderer>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            element_renderers: HashMap::new(),
        }
    }

    /// Registers a renderer for every type it reports as handled.
    pub fn register(&mut self, renderer: Arc<dyn ElementRenderer>) {
        for field_type in renderer.handled_types() {
            self.register_element_renderer(field_type, renderer.clone());
        }
    }

    pub fn register_element_renderer(&mut self, field_type: FieldType, renderer: Arc<dyn ElementRenderer>) {
        if let FieldType::Unknown(name) = &field_type {
            log::warn!("Registering renderer for non-standard field type '{}'", name);
        }
        self.element_renderers.insert(field_type, renderer);
    }

    pub fn get_element_renderer(&self, field_type: &FieldType) -> Option<Arc<dyn ElementRenderer>> {
        self.element_renderers.get(field_type).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.element_renderers.is_empty()
    }
}
