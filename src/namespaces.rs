//! XML namespace handling
//!
//! Prefix utilities and the namespace-declaration context shared by the
//! schema loader, the coverage walker, and the document serializer.

use std::collections::HashMap;

/// Strip a namespace prefix from a raw XML name (`my:Item` -> `Item`)
pub fn strip_prefix(name: &str) -> &str {
    match name.split_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

/// Split a raw XML name into (prefix, local) where prefix is "" when absent
pub fn split_name(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", name),
    }
}

/// Namespace declarations in scope on an element
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<String, String>,
    /// Default namespace (no prefix)
    default_namespace: Option<String>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Find the prefix bound to a namespace URI, if any
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, ns)| ns.as_str() == namespace)
            .map(|(prefix, _)| prefix.as_str())
    }

    /// Iterate over all declared (prefix, namespace) pairs
    pub fn iter_prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, n)| (p.as_str(), n.as_str()))
    }
}
