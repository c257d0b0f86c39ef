use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A table's declared structure: field name mapped to a pipe-delimited set
/// of accepted primitive type names, e.g. `"age" => "number"` or
/// `"nickname" => "string|null"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableStructure(pub BTreeMap<String, String>);

impl TableStructure {
    pub fn new() -> Self {
        TableStructure(BTreeMap::new())
    }

    /// Declare a field. Builder-style, used mostly by tests and the CLI.
    pub fn field(mut self, name: &str, types: &str) -> Self {
        self.0.insert(name.to_string(), types.to_string());
        self
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// The accepted type names for a field, split on `|`.
    pub fn accepted_types(&self, name: &str) -> Option<Vec<&str>> {
        self.0
            .get(name)
            .map(|spec| spec.split('|').map(str::trim).collect())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TableStructure {
    fn from(pairs: [(&str, &str); N]) -> Self {
        TableStructure(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// The primitive type tag of a JSON value, as used in structure declarations.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
