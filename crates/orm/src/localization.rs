//! Label lookup collaborator

use std::collections::HashMap;

/// Resolves language keys. Consulted on every label request, never cached
/// by the schema registry.
pub trait Localizer: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// A fixed key to text table
#[derive(Debug, Clone, Default)]
pub struct StaticLocalizer {
    lines: HashMap<String, String>,
}

impl StaticLocalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.lines.insert(key.into(), text.into());
        self
    }
}

impl Localizer for StaticLocalizer {
    fn lookup(&self, key: &str) -> Option<String> {
        self.lines.get(key).cloned()
    }
}

/// Substitute `${model}`, `${table}` and `${field}` in a key template
pub fn expand_template(template: &str, model: &str, table: &str, field: &str) -> String {
    template
        .replace("${model}", model)
        .replace("${table}", table)
        .replace("${field}", field)
}
