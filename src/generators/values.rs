//! Leaf value generation
//!
//! Maps XSD simple types to type-valid placeholder strings. Enumerated
//! types always yield their first enumerated value so output is
//! deterministic.

use crate::namespaces::strip_prefix;
use crate::schema::{AttributeDecl, SchemaModel, SimpleType};

/// Generates type-valid leaf text for elements and attributes
pub struct ValueGenerator<'a> {
    model: &'a SchemaModel,
}

impl<'a> ValueGenerator<'a> {
    /// Create a value generator over a schema
    pub fn new(model: &'a SchemaModel) -> Self {
        Self { model }
    }

    /// Value for a declared attribute
    pub fn attribute_value(&self, attr: &AttributeDecl) -> String {
        if let Some(inline) = &attr.inline_type {
            return self.simple_type_value(&attr.name, inline);
        }
        self.value_for(&attr.name, attr.type_ref.as_deref())
    }

    /// Text for an element with the given type reference
    pub fn value_for(&self, local_name: &str, type_ref: Option<&str>) -> String {
        let type_ref = match type_ref {
            Some(t) => t,
            None => return format!("{}_value", local_name),
        };

        if let Some(values) = self.model.enumeration_values(type_ref) {
            return values[0].clone();
        }

        match self.resolve_to_builtin(type_ref) {
            Some(builtin) => builtin_value(&builtin, local_name),
            None => format!("{}_value", local_name),
        }
    }

    /// Text for an anonymous inline simple type
    pub fn simple_type_value(&self, local_name: &str, st: &SimpleType) -> String {
        if !st.enumeration.is_empty() {
            return st.enumeration[0].clone();
        }
        self.value_for(local_name, st.base.as_deref())
    }

    /// Follow named simple-type restriction bases down to a built-in name
    fn resolve_to_builtin(&self, type_ref: &str) -> Option<String> {
        if self.model.is_builtin_ref(type_ref) {
            return Some(strip_prefix(type_ref).to_string());
        }
        let mut current = self.model.lookup_simple(type_ref)?;
        for _ in 0..64 {
            let base = current.base.as_deref()?;
            if self.model.is_builtin_ref(base) {
                return Some(strip_prefix(base).to_string());
            }
            current = self.model.lookup_simple(base)?;
        }
        None
    }
}

/// Placeholder value for an XSD built-in simple type
fn builtin_value(builtin: &str, local_name: &str) -> String {
    match builtin {
        "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "positiveInteger" | "unsignedLong" | "unsignedInt" | "unsignedShort"
        | "unsignedByte" => "1".to_string(),
        "nonPositiveInteger" | "negativeInteger" => "-1".to_string(),
        "decimal" | "float" | "double" => "1.0".to_string(),
        "boolean" => "true".to_string(),
        "date" => "2024-01-01".to_string(),
        "dateTime" => "2024-01-01T00:00:00Z".to_string(),
        "time" => "12:00:00".to_string(),
        "gYear" => "2024".to_string(),
        "base64Binary" => "U2FtcGxlRGF0YQ==".to_string(),
        "hexBinary" => "48656C6C6F".to_string(),
        "anyURI" => "http://example.com".to_string(),
        _ => format!("{}_value", local_name),
    }
}
