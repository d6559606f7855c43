//! Schema model components
//!
//! Tagged representations of XSD particles, content models, and attribute
//! declarations, plus the schema-wide model with its type cache.
//! Polymorphism is data-driven: consumers match on the particle and
//! content-model tags instead of dispatching through trait objects.

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{ParseError, Result};
use crate::namespaces::{split_name, strip_prefix, NamespaceContext};

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self {
            min: 1,
            max: Some(1),
        }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self {
            min: 0,
            max: Some(1),
        }
    }

    /// Check if this particle can be absent (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle is mandatory (minOccurs >= 1)
    pub fn is_required(&self) -> bool {
        self.min >= 1
    }

    /// Parse minOccurs/maxOccurs attribute values
    pub fn parse(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Self> {
        let mut occurs = Occurs::once();

        if let Some(min_str) = min_occurs {
            occurs.min = min_str.parse::<u32>().map_err(|_| {
                ParseError::new("minOccurs value is not a valid non-negative integer")
            })?;
        }

        match max_occurs {
            Some("unbounded") => occurs.max = None,
            Some(max_str) => {
                let max = max_str.parse::<u32>().map_err(|_| {
                    ParseError::new("maxOccurs value must be a non-negative integer or 'unbounded'")
                })?;
                if occurs.min > max {
                    return Err(ParseError::new(
                        "maxOccurs must be 'unbounded' or not less than minOccurs",
                    )
                    .into());
                }
                occurs.max = Some(max);
            }
            None => {
                if occurs.min > 1 {
                    occurs.max = Some(occurs.min);
                }
            }
        }

        Ok(occurs)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Attribute use constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUse {
    /// Attribute may be present (default)
    #[default]
    Optional,
    /// Attribute must be present
    Required,
    /// Attribute must not be present
    Prohibited,
}

impl AttributeUse {
    /// Parse from the `use` attribute value
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "optional" => Some(Self::Optional),
            "required" => Some(Self::Required),
            "prohibited" => Some(Self::Prohibited),
            _ => None,
        }
    }
}

/// Declared attribute on a complex type
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// Attribute local name
    pub name: String,
    /// Type reference as written in the schema (possibly prefixed)
    pub type_ref: Option<String>,
    /// Use constraint
    pub use_mode: AttributeUse,
    /// Anonymous inline simple type, when declared inline
    pub inline_type: Option<Arc<SimpleType>>,
}

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compositor {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// Exactly one of the alternatives
    Choice,
    /// Unordered set of particles
    All,
}

impl Compositor {
    /// Parse from an XSD element local name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" => Some(Self::Sequence),
            "choice" => Some(Self::Choice),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl fmt::Display for Compositor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// A particle in a content model
#[derive(Debug, Clone)]
pub enum Particle {
    /// Element declaration or reference
    Element(ElementParticle),
    /// Nested model group
    Group(ParticleGroup),
}

/// Element particle within a model group
#[derive(Debug, Clone)]
pub struct ElementParticle {
    /// Element local name
    pub name: String,
    /// Type reference as written in the schema (possibly prefixed)
    pub type_ref: Option<String>,
    /// Reference to a top-level element declaration (`ref="..."`)
    pub ref_name: Option<String>,
    /// Anonymous inline complex type
    pub inline_complex: Option<Arc<ComplexType>>,
    /// Anonymous inline simple type
    pub inline_simple: Option<Arc<SimpleType>>,
    /// Occurrence constraints
    pub occurs: Occurs,
}

impl ElementParticle {
    /// Create a named element particle
    pub fn new(name: impl Into<String>, occurs: Occurs) -> Self {
        Self {
            name: name.into(),
            type_ref: None,
            ref_name: None,
            inline_complex: None,
            inline_simple: None,
            occurs,
        }
    }
}

/// Model group (sequence, choice, all) with its particles
#[derive(Debug, Clone)]
pub struct ParticleGroup {
    /// Compositor kind
    pub compositor: Compositor,
    /// Occurrence constraints of the group itself
    pub occurs: Occurs,
    /// Particles in declaration order
    pub particles: Vec<Particle>,
}

impl ParticleGroup {
    /// Create an empty group
    pub fn new(compositor: Compositor) -> Self {
        Self {
            compositor,
            occurs: Occurs::once(),
            particles: Vec::new(),
        }
    }

    /// Immediate element children (not descending into nested groups)
    pub fn element_children(&self) -> impl Iterator<Item = &ElementParticle> {
        self.particles.iter().filter_map(|p| match p {
            Particle::Element(e) => Some(e),
            Particle::Group(_) => None,
        })
    }
}

/// Content model classification of a complex type
#[derive(Debug, Clone)]
pub enum ContentModel {
    /// No text, no children
    Empty,
    /// Text content of a simple type, no children
    Simple {
        /// Base simple type reference
        base: Option<String>,
    },
    /// Children only
    ElementOnly(ParticleGroup),
    /// Interleaved text and children
    Mixed(ParticleGroup),
}

impl ContentModel {
    /// The content group for element-only/mixed content
    pub fn group(&self) -> Option<&ParticleGroup> {
        match self {
            Self::ElementOnly(g) | Self::Mixed(g) => Some(g),
            _ => None,
        }
    }
}

/// Complex type definition
#[derive(Debug, Clone)]
pub struct ComplexType {
    /// Type name (None for anonymous inline types)
    pub name: Option<String>,
    /// Content model
    pub content: ContentModel,
    /// Attributes declared directly on this type
    pub attributes: Vec<AttributeDecl>,
    /// Extension/restriction base type reference
    pub base_type: Option<String>,
}

/// Simple type definition with the facets this toolkit consumes
#[derive(Debug, Clone)]
pub struct SimpleType {
    /// Type name (None for anonymous inline types)
    pub name: Option<String>,
    /// Restriction base type reference
    pub base: Option<String>,
    /// Enumeration facet values in declaration order
    pub enumeration: Vec<String>,
}

/// A named type in the schema cache
#[derive(Debug, Clone)]
pub enum TypeDef {
    /// Complex type
    Complex(Arc<ComplexType>),
    /// Simple type
    Simple(Arc<SimpleType>),
}

/// XSD built-in simple type local names
static BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "string",
        "normalizedString",
        "token",
        "language",
        "Name",
        "NCName",
        "ID",
        "IDREF",
        "IDREFS",
        "ENTITY",
        "ENTITIES",
        "NMTOKEN",
        "NMTOKENS",
        "boolean",
        "decimal",
        "integer",
        "long",
        "int",
        "short",
        "byte",
        "nonNegativeInteger",
        "positiveInteger",
        "unsignedLong",
        "unsignedInt",
        "unsignedShort",
        "unsignedByte",
        "nonPositiveInteger",
        "negativeInteger",
        "float",
        "double",
        "duration",
        "dateTime",
        "time",
        "date",
        "gYearMonth",
        "gYear",
        "gMonthDay",
        "gDay",
        "gMonth",
        "hexBinary",
        "base64Binary",
        "anyURI",
        "QName",
        "NOTATION",
        "anyType",
        "anySimpleType",
    ]
    .into_iter()
    .collect()
});

/// Check whether a local type name is an XSD built-in simple type
pub fn is_builtin_type(local_name: &str) -> bool {
    BUILTIN_TYPES.contains(local_name)
}

/// Resolution of an element particle's type
#[derive(Debug, Clone)]
pub enum ResolvedType<'a> {
    /// Named or inline complex type
    Complex(&'a ComplexType),
    /// Named or inline simple type
    Simple(&'a SimpleType),
    /// XSD built-in simple type (local name)
    Builtin(&'a str),
    /// Type in an opaque imported namespace (raw reference)
    Opaque(&'a str),
    /// Reference that cannot be resolved
    Unknown,
}

/// The parsed schema: root declarations, type cache, namespace facts
///
/// Built once by the loader and immutable for the rest of the run.
#[derive(Debug, Default)]
pub struct SchemaModel {
    /// Target namespace of the primary schema document
    pub target_namespace: Option<String>,
    /// Detected XSD namespace prefix ("" when XSD is the default namespace)
    pub xsd_prefix: String,
    /// Namespace declarations on the primary schema root
    pub namespaces: NamespaceContext,
    /// Top-level element declarations in document order
    pub roots: Vec<ElementParticle>,
    /// Named complex and simple types, keyed by local name
    pub types: HashMap<String, TypeDef>,
    /// Top-level element declarations by name (for `ref` resolution)
    pub global_elements: HashMap<String, ElementParticle>,
    /// Imported namespaces whose schema could not be opened
    pub opaque_namespaces: BTreeSet<String>,
}

impl SchemaModel {
    /// Look up a named type, stripping any namespace prefix from the reference
    pub fn lookup_type(&self, type_ref: &str) -> Option<&TypeDef> {
        self.types.get(strip_prefix(type_ref))
    }

    /// Look up a named complex type
    pub fn lookup_complex(&self, type_ref: &str) -> Option<&Arc<ComplexType>> {
        match self.lookup_type(type_ref)? {
            TypeDef::Complex(ct) => Some(ct),
            TypeDef::Simple(_) => None,
        }
    }

    /// Look up a named simple type
    pub fn lookup_simple(&self, type_ref: &str) -> Option<&Arc<SimpleType>> {
        match self.lookup_type(type_ref)? {
            TypeDef::Simple(st) => Some(st),
            TypeDef::Complex(_) => None,
        }
    }

    /// Whether a type reference denotes an XSD built-in simple type
    pub fn is_builtin_ref(&self, type_ref: &str) -> bool {
        let (prefix, local) = split_name(type_ref);
        if prefix == self.xsd_prefix || prefix == "xs" || prefix == "xsd" {
            is_builtin_type(local)
        } else {
            false
        }
    }

    /// Whether a type reference points into an opaque imported namespace
    pub fn is_opaque_ref(&self, type_ref: &str) -> bool {
        let (prefix, _) = split_name(type_ref);
        if prefix.is_empty() {
            return false;
        }
        match self.namespaces.get_namespace(prefix) {
            Some(ns) => self.opaque_namespaces.contains(ns),
            None => false,
        }
    }

    /// Attributes of a complex type including those inherited through
    /// extension bases, base-first, derived declarations overriding
    pub fn inherited_attributes<'a>(&'a self, ct: &'a ComplexType) -> Vec<&'a AttributeDecl> {
        let mut chain: Vec<&ComplexType> = Vec::new();
        let mut current = Some(ct);
        let mut visited: HashSet<*const ComplexType> = HashSet::new();

        while let Some(c) = current {
            if !visited.insert(c as *const ComplexType) {
                break;
            }
            chain.push(c);
            current = c
                .base_type
                .as_deref()
                .and_then(|base| self.lookup_complex(base))
                .map(|arc| arc.as_ref());
        }

        let mut result: Vec<&AttributeDecl> = Vec::new();
        for c in chain.iter().rev() {
            for attr in &c.attributes {
                if let Some(pos) = result.iter().position(|a| a.name == attr.name) {
                    result[pos] = attr;
                } else {
                    result.push(attr);
                }
            }
        }
        result
    }

    /// Content groups of a complex type including extension bases,
    /// base content first (extension appends to the base model)
    pub fn content_groups<'a>(&'a self, ct: &'a ComplexType) -> Vec<&'a ParticleGroup> {
        let mut chain: Vec<&ComplexType> = Vec::new();
        let mut current = Some(ct);
        let mut visited: HashSet<*const ComplexType> = HashSet::new();

        while let Some(c) = current {
            if !visited.insert(c as *const ComplexType) {
                break;
            }
            chain.push(c);
            current = c
                .base_type
                .as_deref()
                .and_then(|base| self.lookup_complex(base))
                .map(|arc| arc.as_ref());
        }

        chain
            .iter()
            .rev()
            .filter_map(|c| c.content.group())
            .collect()
    }

    /// Resolve the type of an element particle: inline types win, then
    /// `ref` indirection through the top-level element, then the named
    /// type cache, then built-in and opaque classification
    pub fn resolve_particle_type<'a>(&'a self, particle: &'a ElementParticle) -> ResolvedType<'a> {
        if let Some(ct) = &particle.inline_complex {
            return ResolvedType::Complex(ct);
        }
        if let Some(st) = &particle.inline_simple {
            return ResolvedType::Simple(st);
        }

        let mut type_ref: Option<&str> = particle.type_ref.as_deref();

        if let Some(ref_name) = particle.ref_name.as_deref() {
            match self.global_elements.get(strip_prefix(ref_name)) {
                Some(target) => {
                    if let Some(ct) = &target.inline_complex {
                        return ResolvedType::Complex(ct);
                    }
                    if let Some(st) = &target.inline_simple {
                        return ResolvedType::Simple(st);
                    }
                    type_ref = target.type_ref.as_deref();
                }
                None => {
                    if self.is_opaque_ref(ref_name) {
                        return ResolvedType::Opaque(ref_name);
                    }
                }
            }
        }

        let type_ref = match type_ref {
            Some(t) => t,
            None => return ResolvedType::Unknown,
        };

        match self.lookup_type(type_ref) {
            Some(TypeDef::Complex(ct)) => ResolvedType::Complex(ct),
            Some(TypeDef::Simple(st)) => ResolvedType::Simple(st),
            None => {
                if self.is_builtin_ref(type_ref) {
                    ResolvedType::Builtin(strip_prefix(type_ref))
                } else if self.is_opaque_ref(type_ref) {
                    ResolvedType::Opaque(type_ref)
                } else {
                    ResolvedType::Unknown
                }
            }
        }
    }

    /// Enumeration facet values for a type reference, following the
    /// restriction base chain of named simple types
    pub fn enumeration_values(&self, type_ref: &str) -> Option<&[String]> {
        let mut current = self.lookup_simple(type_ref)?;
        let mut guard = 0;
        loop {
            if !current.enumeration.is_empty() {
                return Some(&current.enumeration);
            }
            let base = current.base.as_deref()?;
            current = self.lookup_simple(base)?;
            guard += 1;
            if guard > 64 {
                return None;
            }
        }
    }
}
