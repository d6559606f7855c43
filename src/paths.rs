//! Hierarchical schema paths
//!
//! A path encodes the position of an element or attribute in the schema
//! tree: `/Order/Item` for elements, `/Order/Item@status` for attributes.
//! Paths are order-sensitive and case-sensitive; the same recursive element
//! unfolded at different depths yields distinct paths.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A hierarchical element or attribute path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaPath(String);

impl SchemaPath {
    /// Create a root element path (`/Name`)
    pub fn root(name: &str) -> Self {
        Self(format!("/{}", name))
    }

    /// Create a child element path under this element path
    pub fn child(&self, name: &str) -> Self {
        debug_assert!(!self.is_attribute());
        Self(format!("{}/{}", self.0, name))
    }

    /// Create an attribute path owned by this element path
    pub fn attribute(&self, name: &str) -> Self {
        debug_assert!(!self.is_attribute());
        Self(format!("{}@{}", self.0, name))
    }

    /// Parse a path from its string form
    pub fn parse(s: &str) -> Option<Self> {
        if !s.starts_with('/') || s.len() < 2 {
            return None;
        }
        Some(Self(s.to_string()))
    }

    /// The raw string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is an attribute path
    pub fn is_attribute(&self) -> bool {
        self.0.contains('@')
    }

    /// Path depth: the count of `/` separators; attribute paths inherit
    /// the depth of their owning element path
    pub fn depth(&self) -> usize {
        self.element_part().matches('/').count()
    }

    /// Whether this is a root element path (depth 1, not an attribute)
    pub fn is_root(&self) -> bool {
        !self.is_attribute() && self.depth() == 1
    }

    /// The element portion of the path (identity for element paths)
    fn element_part(&self) -> &str {
        match self.0.split_once('@') {
            Some((elem, _)) => elem,
            None => &self.0,
        }
    }

    /// The owning element path of an attribute path, or self for elements
    pub fn owner(&self) -> SchemaPath {
        Self(self.element_part().to_string())
    }

    /// Parent path: the owning element for attributes, the enclosing
    /// element for non-root elements, None for roots
    pub fn parent(&self) -> Option<SchemaPath> {
        if self.is_attribute() {
            return Some(self.owner());
        }
        let (head, _) = self.0.rsplit_once('/')?;
        if head.is_empty() {
            None
        } else {
            Some(Self(head.to_string()))
        }
    }

    /// The last name segment: attribute name for attribute paths, element
    /// local name otherwise
    pub fn local_name(&self) -> &str {
        if let Some((_, attr)) = self.0.split_once('@') {
            return attr;
        }
        match self.0.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.0,
        }
    }

    /// Collision-free identifier form for solver variables
    /// (`/` -> `_`, `@` -> `_AT_`, `-` -> `_`)
    pub fn variable_name(&self) -> String {
        self.0.replace('@', "_AT_").replace(['/', '-'], "_")
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The full set of element and attribute paths enumerated from a schema
#[derive(Debug, Clone, Default)]
pub struct GroundSet {
    /// Element paths
    pub elements: BTreeSet<SchemaPath>,
    /// Attribute paths
    pub attributes: BTreeSet<SchemaPath>,
}

impl GroundSet {
    /// Create an empty ground set
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of paths
    pub fn len(&self) -> usize {
        self.elements.len() + self.attributes.len()
    }

    /// Whether the ground set is empty
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.attributes.is_empty()
    }

    /// Whether a path belongs to the ground set
    pub fn contains(&self, path: &SchemaPath) -> bool {
        if path.is_attribute() {
            self.attributes.contains(path)
        } else {
            self.elements.contains(path)
        }
    }

    /// Iterate element paths then attribute paths, both in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &SchemaPath> {
        self.elements.iter().chain(self.attributes.iter())
    }

    /// Root element paths in sorted order
    pub fn roots(&self) -> impl Iterator<Item = &SchemaPath> {
        self.elements.iter().filter(|p| p.is_root())
    }
}

/// Structural constraints extracted alongside the ground set
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    /// Parent path for every non-root path
    pub parent_of: BTreeMap<SchemaPath, SchemaPath>,
    /// (parent, required child-or-attribute) pairs
    pub required: BTreeSet<(SchemaPath, SchemaPath)>,
    /// Choice groups as (owning element, alternatives) in encounter order
    pub choice_groups: Vec<(SchemaPath, Vec<SchemaPath>)>,
    /// Paths where the walk stopped unfolding a recursive type
    pub recursive: BTreeSet<SchemaPath>,
}

impl ConstraintSet {
    /// Create an empty constraint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Required children and attributes of a parent path, in sorted order
    pub fn required_children_of<'a>(
        &'a self,
        parent: &'a SchemaPath,
    ) -> impl Iterator<Item = &'a SchemaPath> {
        self.required
            .iter()
            .filter(move |(p, _)| p == parent)
            .map(|(_, c)| c)
    }
}
