//! Schema-aware XML materialization
//!
//! Builds schema-valid XML documents from an abstract selection of paths.
//! One materializer serves all three generation strategies; what varies is
//! the inclusion policy deciding optional items, choice branches, and the
//! descent frontier. Required content is always included regardless of the
//! policy.

use std::collections::BTreeSet;

use log::warn;
use once_cell::sync::Lazy;

use super::values::ValueGenerator;
use crate::documents::{Document, Element};
use crate::namespaces::strip_prefix;
use crate::paths::SchemaPath;
use crate::schema::{
    AttributeUse, ComplexType, Compositor, ContentModel, ElementParticle, Particle, ParticleGroup,
    ResolvedType, SchemaModel, SimpleType,
};
use crate::{XMLDSIG_NAMESPACE, XSI_NAMESPACE};

/// Levels of required-content descent allowed past the depth frontier
/// before truncating (termination safeguard for recursive types)
const EMERGENCY_DESCENT_LEVELS: usize = 2;

/// Decides which optional items to realize and where descent stops
pub trait InclusionPolicy {
    /// Whether an optional item at this path should be included
    fn include_optional(&self, path: &SchemaPath) -> bool;

    /// Which alternative of a choice group to realize
    fn choice_branch(&self, branches: &[SchemaPath]) -> usize;

    /// Whether to descend into children below an element at this depth
    fn descend(&self, depth: usize) -> bool;

    /// Whether required content still gets a bounded descent at the frontier
    fn frontier_emits_required(&self) -> bool {
        true
    }
}

/// Policy over an explicit selected-path set (solver models, greedy hints)
pub struct SelectedPaths<'a> {
    selected: &'a BTreeSet<SchemaPath>,
    max_depth: usize,
}

impl<'a> SelectedPaths<'a> {
    /// Create a policy from a selected-path set and depth bound
    pub fn new(selected: &'a BTreeSet<SchemaPath>, max_depth: usize) -> Self {
        Self {
            selected,
            max_depth,
        }
    }
}

impl InclusionPolicy for SelectedPaths<'_> {
    fn include_optional(&self, path: &SchemaPath) -> bool {
        self.selected.contains(path)
    }

    fn choice_branch(&self, branches: &[SchemaPath]) -> usize {
        branches
            .iter()
            .position(|b| self.selected.contains(b))
            .unwrap_or(0)
    }

    fn descend(&self, depth: usize) -> bool {
        depth < self.max_depth
    }
}

/// Policy for the greedy snippet family: bounded depth, a blanket
/// optional flag, and a rotating choice index
pub struct SnippetPolicy {
    /// How many levels below the root to realize; 0 leaves the root
    /// childless, 1 stops at its children, and so on
    pub target_depth: usize,
    /// Whether optional items are realized
    pub include_optional: bool,
    /// Which alternative every choice realizes (modulo branch count)
    pub choice_index: usize,
}

impl InclusionPolicy for SnippetPolicy {
    fn include_optional(&self, _path: &SchemaPath) -> bool {
        self.include_optional
    }

    fn choice_branch(&self, branches: &[SchemaPath]) -> usize {
        self.choice_index % branches.len().max(1)
    }

    fn descend(&self, depth: usize) -> bool {
        // The root sits at depth 1, so an element at depth d is
        // target_depth levels down when d == target_depth + 1
        depth <= self.target_depth
    }

    fn frontier_emits_required(&self) -> bool {
        false
    }
}

/// Materialization output: the document plus what it covers
#[derive(Debug, Clone)]
pub struct Materialized {
    /// The assembled document
    pub document: Document,
    /// Element paths the document covers
    pub covered_elements: BTreeSet<SchemaPath>,
    /// Attribute paths the document covers
    pub covered_attributes: BTreeSet<SchemaPath>,
    /// Whether required content was truncated at the descent cap
    pub truncated: bool,
}

impl Materialized {
    /// All covered paths, elements then attributes
    pub fn covered(&self) -> BTreeSet<SchemaPath> {
        self.covered_elements
            .union(&self.covered_attributes)
            .cloned()
            .collect()
    }
}

/// Builds schema-valid XML from the schema model and an inclusion policy
pub struct Materializer<'a> {
    model: &'a SchemaModel,
    values: ValueGenerator<'a>,
    namespace: Option<String>,
    schema_location: Option<String>,
}

impl<'a> Materializer<'a> {
    /// Create a materializer for a schema
    pub fn new(model: &'a SchemaModel) -> Self {
        Self {
            model,
            values: ValueGenerator::new(model),
            namespace: model.target_namespace.clone(),
            schema_location: None,
        }
    }

    /// Override the output namespace (instead of the target namespace)
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        if namespace.is_some() {
            self.namespace = namespace;
        }
        self
    }

    /// Set the schema location hint emitted as xsi:schemaLocation
    pub fn with_schema_location(mut self, location: impl Into<String>) -> Self {
        self.schema_location = Some(location.into());
        self
    }

    /// Materialize a document rooted at a top-level element declaration
    pub fn materialize(
        &self,
        root: &ElementParticle,
        policy: &dyn InclusionPolicy,
    ) -> Materialized {
        let mut state = BuildState {
            covered_elements: BTreeSet::new(),
            covered_attributes: BTreeSet::new(),
            truncated: false,
        };

        let path = SchemaPath::root(&root.name);
        let mut elem = self.build_element(root, &path, 1, policy, &mut state);

        if let Some(ns) = &self.namespace {
            if let Some(location) = &self.schema_location {
                elem.namespaces.add_prefix("xsi", XSI_NAMESPACE);
                elem.set_attribute("xsi:schemaLocation", format!("{} {}", ns, location));
            }
        }

        if state.truncated {
            warn!(
                "Required content below '{}' was truncated at the depth frontier",
                root.name
            );
        }

        Materialized {
            document: Document::with_root(elem),
            covered_elements: state.covered_elements,
            covered_attributes: state.covered_attributes,
            truncated: state.truncated,
        }
    }

    /// Build one element: resolve type, add attributes, classify content
    fn build_element(
        &self,
        particle: &ElementParticle,
        path: &SchemaPath,
        depth: usize,
        policy: &dyn InclusionPolicy,
        state: &mut BuildState,
    ) -> Element {
        let mut elem = Element::in_namespace(particle.name.clone(), self.namespace.clone());
        state.covered_elements.insert(path.clone());

        match self.model.resolve_particle_type(particle) {
            ResolvedType::Complex(ct) => {
                self.add_attributes(&mut elem, ct, path, policy, state);
                match &ct.content {
                    ContentModel::Empty => {}
                    ContentModel::Simple { base } => {
                        elem.set_text(self.values.value_for(&particle.name, base.as_deref()));
                    }
                    ContentModel::ElementOnly(_) | ContentModel::Mixed(_) => {
                        if policy.descend(depth) {
                            for group in self.model.content_groups(ct) {
                                self.visit_group(group, &mut elem, path, depth, policy, state);
                            }
                        } else if policy.frontier_emits_required() {
                            self.emergency_descent(ct, &mut elem, path, 0, state);
                        }
                    }
                }
            }
            ResolvedType::Simple(st) => {
                elem.set_text(self.simple_text(&particle.name, st));
            }
            ResolvedType::Builtin(_) => {
                elem.set_text(
                    self.values
                        .value_for(&particle.name, particle.type_ref.as_deref()),
                );
            }
            ResolvedType::Opaque(type_ref) => {
                if is_signature_ref(&particle.name, type_ref) {
                    append_signature_subtree(&mut elem);
                }
            }
            ResolvedType::Unknown => {}
        }

        elem
    }

    /// Add declared attributes (including extension-inherited ones):
    /// required always, optional when selected, prohibited never
    fn add_attributes(
        &self,
        elem: &mut Element,
        ct: &ComplexType,
        path: &SchemaPath,
        policy: &dyn InclusionPolicy,
        state: &mut BuildState,
    ) {
        for attr in self.model.inherited_attributes(ct) {
            let attr_path = path.attribute(&attr.name);
            let include = match attr.use_mode {
                AttributeUse::Required => true,
                AttributeUse::Optional => policy.include_optional(&attr_path),
                AttributeUse::Prohibited => false,
            };
            if include {
                elem.set_attribute(&attr.name, self.values.attribute_value(attr));
                state.covered_attributes.insert(attr_path);
            }
        }
    }

    /// Walk a content group adding children per the policy
    fn visit_group(
        &self,
        group: &ParticleGroup,
        elem: &mut Element,
        path: &SchemaPath,
        depth: usize,
        policy: &dyn InclusionPolicy,
        state: &mut BuildState,
    ) {
        if group.compositor == Compositor::Choice {
            let branches: Vec<(&ElementParticle, SchemaPath)> = group
                .element_children()
                .map(|ep| (ep, path.child(&ep.name)))
                .collect();
            if branches.is_empty() {
                return;
            }
            let branch_paths: Vec<SchemaPath> =
                branches.iter().map(|(_, p)| p.clone()).collect();
            let index = policy.choice_branch(&branch_paths).min(branches.len() - 1);
            let (ep, child_path) = &branches[index];
            let child = self.build_element(ep, child_path, depth + 1, policy, state);
            elem.add_child(child);
            return;
        }

        for particle in &group.particles {
            match particle {
                Particle::Element(ep) => {
                    let child_path = path.child(&ep.name);
                    if ep.occurs.is_required() || policy.include_optional(&child_path) {
                        let child = self.build_element(ep, &child_path, depth + 1, policy, state);
                        elem.add_child(child);
                    }
                }
                Particle::Group(nested) => {
                    self.visit_group(nested, elem, path, depth, policy, state);
                }
            }
        }
    }

    /// Bounded required-only descent at the depth frontier. Recursive types
    /// could otherwise force unbounded required chains, so after
    /// `EMERGENCY_DESCENT_LEVELS` levels deeper required content is dropped
    /// and the truncation is reported once per document.
    fn emergency_descent(
        &self,
        ct: &ComplexType,
        elem: &mut Element,
        path: &SchemaPath,
        level: usize,
        state: &mut BuildState,
    ) {
        if level >= EMERGENCY_DESCENT_LEVELS {
            if has_required_elements(self.model, ct) {
                state.truncated = true;
            }
            return;
        }
        for group in self.model.content_groups(ct) {
            self.emergency_group(group, elem, path, level, state);
        }
    }

    fn emergency_group(
        &self,
        group: &ParticleGroup,
        elem: &mut Element,
        path: &SchemaPath,
        level: usize,
        state: &mut BuildState,
    ) {
        if group.compositor == Compositor::Choice {
            // A required choice still needs one branch; take the first
            if group.occurs.is_required() {
                if let Some(ep) = group.element_children().next() {
                    self.emergency_child(ep, elem, path, level, state);
                }
            }
            return;
        }
        for particle in &group.particles {
            match particle {
                Particle::Element(ep) => {
                    if ep.occurs.is_required() {
                        self.emergency_child(ep, elem, path, level, state);
                    }
                }
                Particle::Group(nested) => {
                    if nested.occurs.is_required() {
                        self.emergency_group(nested, elem, path, level, state);
                    }
                }
            }
        }
    }

    fn emergency_child(
        &self,
        ep: &ElementParticle,
        parent: &mut Element,
        path: &SchemaPath,
        level: usize,
        state: &mut BuildState,
    ) {
        let child_path = path.child(&ep.name);
        let mut child = Element::in_namespace(ep.name.clone(), self.namespace.clone());
        state.covered_elements.insert(child_path.clone());

        match self.model.resolve_particle_type(ep) {
            ResolvedType::Complex(ct) => {
                for attr in self.model.inherited_attributes(ct) {
                    if attr.use_mode == AttributeUse::Required {
                        child.set_attribute(&attr.name, self.values.attribute_value(attr));
                        state
                            .covered_attributes
                            .insert(child_path.attribute(&attr.name));
                    }
                }
                match &ct.content {
                    ContentModel::Simple { base } => {
                        child.set_text(self.values.value_for(&ep.name, base.as_deref()));
                    }
                    ContentModel::ElementOnly(_) | ContentModel::Mixed(_) => {
                        self.emergency_descent(ct, &mut child, &child_path, level + 1, state);
                    }
                    ContentModel::Empty => {}
                }
            }
            ResolvedType::Simple(st) => child.set_text(self.simple_text(&ep.name, st)),
            ResolvedType::Builtin(_) => {
                child.set_text(self.values.value_for(&ep.name, ep.type_ref.as_deref()));
            }
            ResolvedType::Opaque(type_ref) => {
                if is_signature_ref(&ep.name, type_ref) {
                    append_signature_subtree(&mut child);
                }
            }
            ResolvedType::Unknown => {}
        }

        parent.add_child(child);
    }

    fn simple_text(&self, name: &str, st: &SimpleType) -> String {
        self.values.simple_type_value(name, st)
    }
}

struct BuildState {
    covered_elements: BTreeSet<SchemaPath>,
    covered_attributes: BTreeSet<SchemaPath>,
    truncated: bool,
}

/// Whether a complex type declares any required element children
fn has_required_elements(model: &SchemaModel, ct: &ComplexType) -> bool {
    fn group_has_required(group: &ParticleGroup) -> bool {
        group.particles.iter().any(|p| match p {
            Particle::Element(ep) => ep.occurs.is_required(),
            Particle::Group(nested) => nested.occurs.is_required() && group_has_required(nested),
        })
    }
    model.content_groups(ct).iter().any(|g| group_has_required(g))
}

/// Whether an element with an opaque type reference is a well-known
/// XML Digital Signature
fn is_signature_ref(elem_name: &str, type_ref: &str) -> bool {
    elem_name == "Signature" || strip_prefix(type_ref) == "SignatureType"
}

/// Algorithm URIs for the minimal XML Signature subtree (W3C recommendation)
static SIGNATURE_ALGORITHMS: Lazy<[(&'static str, &'static str); 4]> = Lazy::new(|| {
    [
        (
            "CanonicalizationMethod",
            "http://www.w3.org/TR/2001/REC-xml-c14n-20010315",
        ),
        ("SignatureMethod", "http://www.w3.org/2000/09/xmldsig#rsa-sha1"),
        (
            "Transform",
            "http://www.w3.org/2000/09/xmldsig#enveloped-signature",
        ),
        ("DigestMethod", "http://www.w3.org/2000/09/xmldsig#sha1"),
    ]
});

fn algorithm_for(name: &str) -> &'static str {
    SIGNATURE_ALGORITHMS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, uri)| *uri)
        .unwrap_or("")
}

/// Append the minimal valid XML Signature structure to an element whose
/// type lives in the unmodeled xmldsig namespace
fn append_signature_subtree(elem: &mut Element) {
    let ds = Some(XMLDSIG_NAMESPACE.to_string());

    let mut signed_info = Element::in_namespace("SignedInfo", ds.clone());

    let mut canon = Element::in_namespace("CanonicalizationMethod", ds.clone());
    canon.set_attribute("Algorithm", algorithm_for("CanonicalizationMethod"));
    signed_info.add_child(canon);

    let mut sig_method = Element::in_namespace("SignatureMethod", ds.clone());
    sig_method.set_attribute("Algorithm", algorithm_for("SignatureMethod"));
    signed_info.add_child(sig_method);

    let mut reference = Element::in_namespace("Reference", ds.clone());
    reference.set_attribute("URI", "");

    let mut transforms = Element::in_namespace("Transforms", ds.clone());
    let mut transform = Element::in_namespace("Transform", ds.clone());
    transform.set_attribute("Algorithm", algorithm_for("Transform"));
    transforms.add_child(transform);
    reference.add_child(transforms);

    let mut digest_method = Element::in_namespace("DigestMethod", ds.clone());
    digest_method.set_attribute("Algorithm", algorithm_for("DigestMethod"));
    reference.add_child(digest_method);

    let mut digest_value = Element::in_namespace("DigestValue", ds.clone());
    digest_value.set_text("U2FtcGxlRGlnZXN0VmFsdWU=");
    reference.add_child(digest_value);

    signed_info.add_child(reference);
    elem.add_child(signed_info);

    let mut sig_value = Element::in_namespace("SignatureValue", ds);
    sig_value.set_text("U2FtcGxlU2lnbmF0dXJlVmFsdWU=");
    elem.add_child(sig_value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::enumerate_paths;

    fn model(xsd: &str) -> SchemaModel {
        SchemaModel::from_string(xsd).unwrap()
    }

    const EMPTY_ROOT: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="R" type="RType"/>
  <xs:complexType name="RType">
    <xs:attribute name="id" type="xs:string" use="required"/>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_empty_root_with_required_attribute() {
        let m = model(EMPTY_ROOT);
        let selected = BTreeSet::new();
        let policy = SelectedPaths::new(&selected, 10);

        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);
        let root = out.document.root().unwrap();

        assert_eq!(root.local_name(), "R");
        assert_eq!(root.get_attribute("id"), Some("id_value"));
        assert!(root.children.is_empty());
        assert!(root.text.is_none());

        assert!(out.covered_elements.contains(&SchemaPath::root("R")));
        assert!(out
            .covered_attributes
            .contains(&SchemaPath::root("R").attribute("id")));
    }

    const CHOICE_SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="C" type="CType"/>
  <xs:complexType name="CType">
    <xs:choice>
      <xs:element name="A" type="xs:string" minOccurs="0"/>
      <xs:element name="B" type="xs:string" minOccurs="0"/>
    </xs:choice>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_choice_picks_selected_branch() {
        let m = model(CHOICE_SCHEMA);
        let b = SchemaPath::root("C").child("B");
        let selected: BTreeSet<_> = [b.clone()].into_iter().collect();
        let policy = SelectedPaths::new(&selected, 10);

        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);
        let root = out.document.root().unwrap();

        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].local_name(), "B");
        assert!(out.covered_elements.contains(&b));
    }

    #[test]
    fn test_choice_falls_back_to_first_branch() {
        let m = model(CHOICE_SCHEMA);
        let selected = BTreeSet::new();
        let policy = SelectedPaths::new(&selected, 10);

        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);
        let root = out.document.root().unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].local_name(), "A");
    }

    #[test]
    fn test_snippet_choice_rotation() {
        let m = model(CHOICE_SCHEMA);
        let policy = SnippetPolicy {
            target_depth: 0,
            include_optional: true,
            choice_index: 1,
        };
        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);
        // target depth 0: the root stays childless under the snippet policy
        assert!(out.document.root().unwrap().children.is_empty());

        let policy = SnippetPolicy {
            target_depth: 1,
            include_optional: true,
            choice_index: 1,
        };
        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);
        assert_eq!(out.document.root().unwrap().children[0].local_name(), "B");
    }

    const RECURSIVE_REQUIRED: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Node" type="NodeType"/>
  <xs:complexType name="NodeType">
    <xs:sequence>
      <xs:element name="Child" type="NodeType"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:string" use="required"/>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_emergency_descent_bounded() {
        let m = model(RECURSIVE_REQUIRED);
        let selected = BTreeSet::new();
        let policy = SelectedPaths::new(&selected, 2);

        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);
        assert!(out.truncated);

        // Root at depth 1, normal child at 2, then two emergency levels
        let mut elem = out.document.root().unwrap();
        let mut chain = 0;
        while let Some(child) = elem.find_child("Child") {
            assert_eq!(child.get_attribute("id"), Some("id_value"));
            elem = child;
            chain += 1;
        }
        assert_eq!(chain, 3, "one regular level plus two emergency levels");
    }

    #[test]
    fn test_enumeration_attribute_value() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="R" type="RType"/>
  <xs:complexType name="RType">
    <xs:attribute name="status" type="StatusType" use="required"/>
  </xs:complexType>
  <xs:simpleType name="StatusType">
    <xs:restriction base="xs:string">
      <xs:enumeration value="Pending"/>
      <xs:enumeration value="Completed"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;
        let m = model(schema);
        let selected = BTreeSet::new();
        let policy = SelectedPaths::new(&selected, 10);

        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);
        assert_eq!(
            out.document.root().unwrap().get_attribute("status"),
            Some("Pending")
        );
    }

    #[test]
    fn test_namespace_and_schema_location() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    targetNamespace="http://example.com/r">
  <xs:element name="R" type="xs:string"/>
</xs:schema>"#;
        let m = model(schema);
        let selected = BTreeSet::new();
        let policy = SelectedPaths::new(&selected, 10);

        let out = Materializer::new(&m)
            .with_schema_location("r.xsd")
            .materialize(&m.roots[0], &policy);

        let text = out.document.to_pretty_string().unwrap();
        assert!(text.contains("xmlns=\"http://example.com/r\""));
        assert!(text.contains("xsi:schemaLocation=\"http://example.com/r r.xsd\""));
    }

    #[test]
    fn test_signature_fallback() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
    xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
  <xs:import namespace="http://www.w3.org/2000/09/xmldsig#"
             schemaLocation="xmldsig-core-schema.xsd"/>
  <xs:element name="R" type="RType"/>
  <xs:complexType name="RType">
    <xs:sequence>
      <xs:element name="Signature" type="ds:SignatureType"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;
        let m = model(schema);
        let selected = BTreeSet::new();
        let policy = SelectedPaths::new(&selected, 10);

        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);
        let root = out.document.root().unwrap();
        let signature = root.find_child("Signature").unwrap();
        let signed_info = signature.find_child("SignedInfo").unwrap();

        assert!(signed_info.find_child("CanonicalizationMethod").is_some());
        assert!(signed_info.find_child("SignatureMethod").is_some());
        let reference = signed_info.find_child("Reference").unwrap();
        assert!(reference.find_child("Transforms").is_some());
        assert!(reference.find_child("DigestMethod").is_some());
        assert_eq!(
            reference.find_child("DigestValue").unwrap().text.as_deref(),
            Some("U2FtcGxlRGlnZXN0VmFsdWU=")
        );
        assert!(signature.find_child("SignatureValue").is_some());
    }

    #[test]
    fn test_round_trip_against_enumeration() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Order" type="OrderType"/>
  <xs:complexType name="OrderType">
    <xs:sequence>
      <xs:element name="Customer" type="xs:string"/>
      <xs:element name="Note" type="xs:string" minOccurs="0"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:string" use="required"/>
    <xs:attribute name="channel" type="xs:string"/>
  </xs:complexType>
</xs:schema>"#;
        let m = model(schema);
        let e = enumerate_paths(&m, 10).unwrap();

        // Select everything; the document must cover the whole ground set
        let selected: BTreeSet<_> = e.ground.iter().cloned().collect();
        let policy = SelectedPaths::new(&selected, 10);
        let out = Materializer::new(&m).materialize(&m.roots[0], &policy);

        for path in e.ground.elements.iter() {
            assert!(
                out.covered_elements.contains(path),
                "missing element {}",
                path
            );
        }
        for path in e.ground.attributes.iter() {
            assert!(
                out.covered_attributes.contains(path),
                "missing attribute {}",
                path
            );
        }
    }
}
