//! XSD schema parsing
//!
//! Parses XSD documents into the schema model: prefix auto-detection,
//! named-type caching, import/include resolution against the local
//! filesystem, and opaque-namespace fallback for imports that cannot be
//! opened.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use super::types::{
    AttributeDecl, AttributeUse, ComplexType, Compositor, ContentModel, ElementParticle, Occurs,
    Particle, ParticleGroup, SchemaModel, SimpleType, TypeDef,
};
use crate::documents::{Document, Element};
use crate::error::{Error, ParseError, Result};
use crate::namespaces::{split_name, strip_prefix};
use crate::XSD_NAMESPACE;

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const EXTENSION: &str = "extension";
    pub const RESTRICTION: &str = "restriction";
    pub const ENUMERATION: &str = "enumeration";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    pub const BASE: &str = "base";
    pub const VALUE: &str = "value";
    pub const USE: &str = "use";
    pub const MIXED: &str = "mixed";
    pub const MIN_OCCURS: &str = "minOccurs";
    pub const MAX_OCCURS: &str = "maxOccurs";
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const NAMESPACE: &str = "namespace";
}

impl SchemaModel {
    /// Parse a schema from a file, resolving imports and includes relative
    /// to the file's directory
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = Document::from_file(path).map_err(|e| {
            Error::Parse(
                ParseError::new(format!("Failed to read schema: {}", e))
                    .with_location(path.display().to_string()),
            )
        })?;

        let mut model = SchemaModel::default();
        let mut loader = Loader::new();
        if let Ok(canonical) = path.canonicalize() {
            loader.processed.insert(canonical);
        }
        loader.load_document(&mut model, &doc, path.parent(), true)?;
        model.check_type_definitions()?;
        model.check_type_references()?;
        debug!(
            "Loaded schema: {} named types, {} root elements",
            model.types.len(),
            model.roots.len()
        );
        Ok(model)
    }

    /// Parse a schema from a string; imports cannot be resolved and their
    /// namespaces are recorded as opaque
    pub fn from_string(xml: &str) -> Result<Self> {
        let doc = Document::from_string(xml).map_err(|e| {
            Error::Parse(ParseError::new(format!("Failed to parse schema: {}", e)))
        })?;

        let mut model = SchemaModel::default();
        let mut loader = Loader::new();
        loader.load_document(&mut model, &doc, None, true)?;
        model.check_type_definitions()?;
        model.check_type_references()?;
        Ok(model)
    }

    /// Reject element and attribute type references that resolve to
    /// nothing: not a cached type, not a built-in, and not a reference
    /// into a foreign namespace (which stays opaque)
    fn check_type_references(&self) -> Result<()> {
        let mut refs: Vec<(String, String)> = Vec::new();

        for root in &self.roots {
            collect_particle_refs(root, &mut refs);
        }
        for (name, def) in &self.types {
            if let TypeDef::Complex(ct) = def {
                collect_complex_refs(name, ct, &mut refs);
            }
        }

        for (location, type_ref) in refs {
            if self.lookup_type(&type_ref).is_some() || self.is_builtin_ref(&type_ref) {
                continue;
            }
            let (prefix, _) = split_name(&type_ref);
            if !prefix.is_empty() {
                if let Some(ns) = self.namespaces.get_namespace(prefix) {
                    if Some(ns) != self.target_namespace.as_deref() {
                        continue; // foreign namespace, opaque at worst
                    }
                }
            }
            return Err(Error::Parse(
                ParseError::new(format!("Unresolved type reference '{}'", type_ref))
                    .with_location(location),
            ));
        }
        Ok(())
    }

    /// Detect cyclic type definitions that do not pass through an element
    /// (cyclic element references through named types are legal and handled
    /// by depth bounding)
    fn check_type_definitions(&self) -> Result<()> {
        for name in self.types.keys() {
            let mut visited = BTreeSet::new();
            let mut current = name.clone();
            loop {
                if !visited.insert(current.clone()) {
                    return Err(Error::Parse(
                        ParseError::new(format!("Cyclic type definition involving '{}'", name))
                            .with_location(format!("type {}", current)),
                    ));
                }
                let base = match self.types.get(&current) {
                    Some(TypeDef::Complex(ct)) => ct.base_type.clone(),
                    Some(TypeDef::Simple(st)) => st.base.clone(),
                    None => None,
                };
                match base {
                    Some(b) => {
                        let local = strip_prefix(&b).to_string();
                        if self.types.contains_key(&local) {
                            current = local;
                        } else {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
        Ok(())
    }
}

/// Per-run loader tracking processed files to cut include cycles
struct Loader {
    processed: BTreeSet<PathBuf>,
}

impl Loader {
    fn new() -> Self {
        Self {
            processed: BTreeSet::new(),
        }
    }

    /// Load one schema document into the model
    fn load_document(
        &mut self,
        model: &mut SchemaModel,
        doc: &Document,
        base_dir: Option<&Path>,
        primary: bool,
    ) -> Result<()> {
        let root = doc
            .root()
            .ok_or_else(|| Error::Parse(ParseError::new("Schema document has no root element")))?;

        let xsd_prefix = detect_xsd_prefix(root);

        let (root_prefix, root_local) = split_name(&root.name);
        if root_local != xsd_elements::SCHEMA || root_prefix != xsd_prefix {
            return Err(Error::Parse(
                ParseError::new(format!(
                    "Root element '{}' is not an XSD schema",
                    root.name
                ))
                .with_source(format!(
                    "expected <{}:schema>",
                    if xsd_prefix.is_empty() { "xs" } else { xsd_prefix.as_str() }
                )),
            ));
        }

        if primary {
            model.target_namespace = root
                .get_attribute(xsd_attrs::TARGET_NAMESPACE)
                .map(|s| s.to_string());
            model.xsd_prefix = xsd_prefix.clone();
            model.namespaces = root.namespaces.clone();
        }

        let parser = DocumentParser {
            xsd_prefix: &xsd_prefix,
        };

        // Imports and includes first, so type references in this document
        // can resolve against everything the schema set declares
        for child in &root.children {
            match parser.xsd_local(child) {
                Some(xsd_elements::IMPORT) => {
                    let namespace = child.get_attribute(xsd_attrs::NAMESPACE);
                    let location = child.get_attribute(xsd_attrs::SCHEMA_LOCATION);
                    self.resolve_reference(model, namespace, location, base_dir)?;
                }
                Some(xsd_elements::INCLUDE) => {
                    let location = child.get_attribute(xsd_attrs::SCHEMA_LOCATION);
                    self.resolve_reference(model, None, location, base_dir)?;
                }
                _ => {}
            }
        }

        // Cache all named type definitions
        parser.collect_named_types(root, model)?;

        // Top-level element declarations
        for child in &root.children {
            if parser.xsd_local(child) == Some(xsd_elements::ELEMENT)
                && child.get_attribute(xsd_attrs::NAME).is_some()
            {
                let particle = parser.parse_element_particle(child)?;
                model
                    .global_elements
                    .insert(particle.name.clone(), particle.clone());
                if primary {
                    model.roots.push(particle);
                }
            }
        }

        Ok(())
    }

    /// Resolve an import/include location; unopenable imports record their
    /// namespace as opaque instead of failing
    fn resolve_reference(
        &mut self,
        model: &mut SchemaModel,
        namespace: Option<&str>,
        location: Option<&str>,
        base_dir: Option<&Path>,
    ) -> Result<()> {
        let resolved = location.and_then(|loc| {
            let candidate = match base_dir {
                Some(dir) if !Path::new(loc).is_absolute() => dir.join(loc),
                _ => PathBuf::from(loc),
            };
            candidate.canonicalize().ok()
        });

        match resolved {
            Some(path) => {
                if !self.processed.insert(path.clone()) {
                    return Ok(());
                }
                match Document::from_file(&path) {
                    Ok(doc) => {
                        self.load_document(model, &doc, path.parent(), false)?;
                    }
                    Err(e) => {
                        warn!("Failed to load schema '{}': {}", path.display(), e);
                        if let Some(ns) = namespace {
                            model.opaque_namespaces.insert(ns.to_string());
                        }
                    }
                }
            }
            None => {
                if let Some(ns) = namespace {
                    debug!("Import of '{}' has no openable location, treating as opaque", ns);
                    model.opaque_namespaces.insert(ns.to_string());
                }
            }
        }
        Ok(())
    }
}

/// Record the type references of an element particle and its inline types
fn collect_particle_refs(particle: &ElementParticle, refs: &mut Vec<(String, String)>) {
    if let Some(type_ref) = &particle.type_ref {
        refs.push((format!("element {}", particle.name), type_ref.clone()));
    }
    if let Some(ct) = &particle.inline_complex {
        collect_complex_refs(&particle.name, ct, refs);
    }
}

/// Record the attribute and particle type references of a complex type
fn collect_complex_refs(location: &str, ct: &ComplexType, refs: &mut Vec<(String, String)>) {
    for attr in &ct.attributes {
        if let Some(type_ref) = &attr.type_ref {
            refs.push((
                format!("attribute {} of {}", attr.name, location),
                type_ref.clone(),
            ));
        }
    }
    if let Some(group) = ct.content.group() {
        collect_group_refs(location, group, refs);
    }
}

fn collect_group_refs(location: &str, group: &ParticleGroup, refs: &mut Vec<(String, String)>) {
    for particle in &group.particles {
        match particle {
            Particle::Element(ep) => collect_particle_refs(ep, refs),
            Particle::Group(nested) => collect_group_refs(location, nested, refs),
        }
    }
}

/// Detect the prefix bound to the XSD namespace on a schema root
fn detect_xsd_prefix(root: &Element) -> String {
    if let Some(prefix) = root.namespaces.prefix_for(XSD_NAMESPACE) {
        return prefix.to_string();
    }
    if root.namespaces.get_default_namespace() == Some(XSD_NAMESPACE) {
        return String::new();
    }
    "xs".to_string()
}

/// Parses one schema document with its detected XSD prefix
struct DocumentParser<'a> {
    xsd_prefix: &'a str,
}

impl<'a> DocumentParser<'a> {
    /// The XSD local name of an element, when it is in the XSD namespace
    fn xsd_local<'e>(&self, elem: &'e Element) -> Option<&'e str> {
        let (prefix, local) = split_name(&elem.name);
        if prefix == self.xsd_prefix {
            Some(local)
        } else {
            None
        }
    }

    /// Walk the document caching every named complexType/simpleType
    fn collect_named_types(&self, elem: &Element, model: &mut SchemaModel) -> Result<()> {
        for child in &elem.children {
            match self.xsd_local(child) {
                Some(xsd_elements::COMPLEX_TYPE) => {
                    if let Some(name) = child.get_attribute(xsd_attrs::NAME) {
                        let ct = self.parse_complex_type(child)?;
                        model
                            .types
                            .insert(name.to_string(), TypeDef::Complex(Arc::new(ct)));
                    }
                }
                Some(xsd_elements::SIMPLE_TYPE) => {
                    if let Some(name) = child.get_attribute(xsd_attrs::NAME) {
                        let st = self.parse_simple_type(child)?;
                        model
                            .types
                            .insert(name.to_string(), TypeDef::Simple(Arc::new(st)));
                    }
                }
                _ => {}
            }
            self.collect_named_types(child, model)?;
        }
        Ok(())
    }

    /// Parse an xs:element declaration into a particle
    fn parse_element_particle(&self, elem: &Element) -> Result<ElementParticle> {
        let occurs = Occurs::parse(
            elem.get_attribute(xsd_attrs::MIN_OCCURS),
            elem.get_attribute(xsd_attrs::MAX_OCCURS),
        )?;

        let ref_name = elem.get_attribute(xsd_attrs::REF).map(|s| s.to_string());
        let name = match elem.get_attribute(xsd_attrs::NAME) {
            Some(name) => name.to_string(),
            None => match &ref_name {
                Some(r) => strip_prefix(r).to_string(),
                None => {
                    return Err(Error::Parse(ParseError::new(
                        "Element declaration has neither 'name' nor 'ref'",
                    )))
                }
            },
        };

        let mut particle = ElementParticle::new(name, occurs);
        particle.type_ref = elem.get_attribute(xsd_attrs::TYPE).map(|s| s.to_string());
        particle.ref_name = ref_name;

        for child in &elem.children {
            match self.xsd_local(child) {
                Some(xsd_elements::COMPLEX_TYPE) => {
                    particle.inline_complex = Some(Arc::new(self.parse_complex_type(child)?));
                }
                Some(xsd_elements::SIMPLE_TYPE) => {
                    particle.inline_simple = Some(Arc::new(self.parse_simple_type(child)?));
                }
                _ => {}
            }
        }

        Ok(particle)
    }

    /// Parse an xs:complexType definition
    fn parse_complex_type(&self, elem: &Element) -> Result<ComplexType> {
        let name = elem.get_attribute(xsd_attrs::NAME).map(|s| s.to_string());
        let mut mixed = elem.get_attribute(xsd_attrs::MIXED) == Some("true");
        let mut attributes = self.parse_attributes(elem)?;
        let mut base_type = None;
        let mut group = None;
        let mut simple_base = None;
        let mut has_simple_content = false;

        for child in &elem.children {
            match self.xsd_local(child) {
                Some(tag @ (xsd_elements::SEQUENCE | xsd_elements::CHOICE | xsd_elements::ALL)) => {
                    let compositor = Compositor::from_tag(tag).unwrap_or_default();
                    group = Some(self.parse_group(child, compositor)?);
                }
                Some(xsd_elements::SIMPLE_CONTENT) => {
                    has_simple_content = true;
                    for derivation in &child.children {
                        match self.xsd_local(derivation) {
                            Some(xsd_elements::EXTENSION | xsd_elements::RESTRICTION) => {
                                simple_base = derivation
                                    .get_attribute(xsd_attrs::BASE)
                                    .map(|s| s.to_string());
                                attributes.extend(self.parse_attributes(derivation)?);
                            }
                            _ => {}
                        }
                    }
                }
                Some(xsd_elements::COMPLEX_CONTENT) => {
                    if child.get_attribute(xsd_attrs::MIXED) == Some("true") {
                        mixed = true;
                    }
                    for derivation in &child.children {
                        match self.xsd_local(derivation) {
                            Some(kind @ (xsd_elements::EXTENSION | xsd_elements::RESTRICTION)) => {
                                // Extension appends to the base model;
                                // restriction replaces it, so only the
                                // former keeps an inheritance link
                                if kind == xsd_elements::EXTENSION {
                                    base_type = derivation
                                        .get_attribute(xsd_attrs::BASE)
                                        .map(|s| s.to_string());
                                }
                                attributes.extend(self.parse_attributes(derivation)?);
                                for nested in &derivation.children {
                                    if let Some(
                                        tag @ (xsd_elements::SEQUENCE
                                        | xsd_elements::CHOICE
                                        | xsd_elements::ALL),
                                    ) = self.xsd_local(nested)
                                    {
                                        group = Some(self.parse_group(
                                            nested,
                                            Compositor::from_tag(tag).unwrap_or_default(),
                                        )?);
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        let content = if has_simple_content {
            ContentModel::Simple { base: simple_base }
        } else if let Some(g) = group {
            if mixed {
                ContentModel::Mixed(g)
            } else {
                ContentModel::ElementOnly(g)
            }
        } else if base_type.is_some() {
            // Derived type with no own particles; content comes from the base
            let empty = ParticleGroup::new(Compositor::Sequence);
            if mixed {
                ContentModel::Mixed(empty)
            } else {
                ContentModel::ElementOnly(empty)
            }
        } else {
            ContentModel::Empty
        };

        Ok(ComplexType {
            name,
            content,
            attributes,
            base_type,
        })
    }

    /// Parse the xs:attribute children of a node
    fn parse_attributes(&self, elem: &Element) -> Result<Vec<AttributeDecl>> {
        let mut attributes = Vec::new();
        for child in &elem.children {
            if self.xsd_local(child) != Some(xsd_elements::ATTRIBUTE) {
                continue;
            }
            let name = match child.get_attribute(xsd_attrs::NAME) {
                Some(n) => n.to_string(),
                None => continue, // attribute references are not modeled
            };
            let use_mode = child
                .get_attribute(xsd_attrs::USE)
                .and_then(AttributeUse::from_str)
                .unwrap_or_default();
            let type_ref = child.get_attribute(xsd_attrs::TYPE).map(|s| s.to_string());

            let inline_type = child
                .children
                .iter()
                .find(|c| self.xsd_local(c) == Some(xsd_elements::SIMPLE_TYPE))
                .map(|c| self.parse_simple_type(c))
                .transpose()?
                .map(Arc::new);

            attributes.push(AttributeDecl {
                name,
                type_ref,
                use_mode,
                inline_type,
            });
        }
        Ok(attributes)
    }

    /// Parse a model group (sequence/choice/all) and its particle tree
    fn parse_group(&self, elem: &Element, compositor: Compositor) -> Result<ParticleGroup> {
        let mut group = ParticleGroup::new(compositor);
        group.occurs = Occurs::parse(
            elem.get_attribute(xsd_attrs::MIN_OCCURS),
            elem.get_attribute(xsd_attrs::MAX_OCCURS),
        )?;

        for child in &elem.children {
            match self.xsd_local(child) {
                Some(xsd_elements::ELEMENT) => {
                    group
                        .particles
                        .push(Particle::Element(self.parse_element_particle(child)?));
                }
                Some(tag @ (xsd_elements::SEQUENCE | xsd_elements::CHOICE | xsd_elements::ALL)) => {
                    group.particles.push(Particle::Group(
                        self.parse_group(child, Compositor::from_tag(tag).unwrap_or_default())?,
                    ));
                }
                _ => {} // annotations, wildcards
            }
        }

        Ok(group)
    }

    /// Parse an xs:simpleType definition (restriction base + enumeration facet)
    fn parse_simple_type(&self, elem: &Element) -> Result<SimpleType> {
        let name = elem.get_attribute(xsd_attrs::NAME).map(|s| s.to_string());
        let mut base = None;
        let mut enumeration = Vec::new();

        for child in &elem.children {
            if self.xsd_local(child) == Some(xsd_elements::RESTRICTION) {
                base = child.get_attribute(xsd_attrs::BASE).map(|s| s.to_string());
                for facet in &child.children {
                    if self.xsd_local(facet) == Some(xsd_elements::ENUMERATION) {
                        if let Some(value) = facet.get_attribute(xsd_attrs::VALUE) {
                            enumeration.push(value.to_string());
                        }
                    }
                }
            }
        }

        Ok(SimpleType {
            name,
            base,
            enumeration,
        })
    }
}
