//! Declarative model descriptors and the application registry.

pub mod fields;

pub use fields::{FieldAction, FieldDescriptor, FieldKind, ReferentialAction};

use std::collections::BTreeMap;

/// One declared table: a name plus an ordered set of field descriptors.
///
/// Descriptors are ephemeral; they are rebuilt from the declarations on
/// every engine invocation and never persisted directly.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub table_name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_lowercase(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Explicit registry of declared models, keyed by application name.
///
/// Application modules register their models at startup; enumeration order
/// is deterministic (sorted by app, then registration order). This replaces
/// any notion of discovering declarations through runtime introspection.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    apps: BTreeMap<String, Vec<ModelDescriptor>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under an application. A model without an `id` field
    /// gets the default auto-increment primary key prepended.
    pub fn register(&mut self, app: &str, mut model: ModelDescriptor) {
        if model.field_named("id").is_none() {
            model.fields.insert(0, FieldDescriptor::auto_increment("id"));
        }
        self.apps.entry(app.to_string()).or_default().push(model);
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn app_names(&self) -> impl Iterator<Item = &str> {
        self.apps.keys().map(String::as_str)
    }

    pub fn models_of(&self, app: &str) -> &[ModelDescriptor] {
        self.apps.get(app).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All registered models across apps, in enumeration order.
    pub fn all_models(&self) -> Vec<&ModelDescriptor> {
        self.apps.values().flatten().collect()
    }

    /// The application a table was registered under.
    pub fn app_of(&self, table_name: &str) -> Option<&str> {
        for (app, models) in &self.apps {
            if models.iter().any(|m| m.table_name == table_name) {
                return Some(app.as_str());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_injects_default_id() {
        let mut registry = ModelRegistry::new();
        registry.register(
            "blog",
            ModelDescriptor::new("Post").field(FieldDescriptor::char("title", 100)),
        );

        let post = &registry.models_of("blog")[0];
        assert_eq!(post.table_name, "post");
        assert_eq!(post.fields[0].name, "id");
        assert_eq!(post.fields[0].kind, FieldKind::AutoIncrement);
        assert_eq!(post.fields[1].name, "title");
    }

    #[test]
    fn test_register_keeps_declared_id() {
        let mut registry = ModelRegistry::new();
        registry.register(
            "blog",
            ModelDescriptor::new("tag").field(FieldDescriptor::int("id")),
        );

        let tag = &registry.models_of("blog")[0];
        assert_eq!(tag.fields.len(), 1);
        assert_eq!(tag.fields[0].kind, FieldKind::Int);
    }

    #[test]
    fn test_app_lookup_is_deterministic() {
        let mut registry = ModelRegistry::new();
        registry.register("shop", ModelDescriptor::new("order"));
        registry.register("blog", ModelDescriptor::new("post"));

        let apps: Vec<_> = registry.app_names().collect();
        assert_eq!(apps, vec!["blog", "shop"]);
        assert_eq!(registry.app_of("order"), Some("shop"));
        assert_eq!(registry.app_of("missing"), None);
    }
}
