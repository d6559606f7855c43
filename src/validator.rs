//! Structural XML validation
//!
//! Validates XML documents against the loaded schema model: declared
//! attributes and their enumerated values, required children, occurrence
//! bounds, and choice exclusivity. Validation stops at the first error
//! per file; a batch produces a summary with valid/invalid counts.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::documents::{Document, Element};
use crate::namespaces::strip_prefix;
use crate::paths::SchemaPath;
use crate::schema::{
    AttributeDecl, AttributeUse, ComplexType, Compositor, ContentModel, ElementParticle, Particle,
    ParticleGroup, ResolvedType, SchemaModel, SimpleType,
};

/// Attributes that belong to the instance-document plumbing, not the schema
const INSTANCE_ATTRIBUTES: [&str; 4] =
    ["schemaLocation", "noNamespaceSchemaLocation", "type", "nil"];

/// A validation failure with the path where it occurred
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    /// What went wrong
    pub message: String,
    /// Path of the offending element or attribute
    pub path: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.path)
    }
}

/// Per-file validation outcome
#[derive(Debug, Clone, Serialize)]
pub struct FileValidation {
    /// Input file path
    pub file: String,
    /// Whether the document validates
    pub valid: bool,
    /// First error, when invalid
    pub error: Option<ValidationIssue>,
}

/// Batch validation outcome
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    /// Per-file results in input order
    pub results: Vec<FileValidation>,
    /// Number of valid files
    pub valid_count: usize,
    /// Number of invalid files
    pub invalid_count: usize,
}

impl ValidationSummary {
    /// Whether every file validated
    pub fn all_valid(&self) -> bool {
        self.invalid_count == 0
    }

    /// Render the per-file results and counts as text
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            match (&result.valid, &result.error) {
                (true, _) => out.push_str(&format!("  valid    {}\n", result.file)),
                (false, Some(issue)) => {
                    out.push_str(&format!("  INVALID  {}\n           {}\n", result.file, issue))
                }
                (false, None) => out.push_str(&format!("  INVALID  {}\n", result.file)),
            }
        }
        out.push_str(&format!(
            "\n{} valid, {} invalid\n",
            self.valid_count, self.invalid_count
        ));
        out
    }
}

/// Validates documents against a schema model
pub struct XmlValidator<'a> {
    model: &'a SchemaModel,
}

impl<'a> XmlValidator<'a> {
    /// Create a validator for a schema
    pub fn new(model: &'a SchemaModel) -> Self {
        Self { model }
    }

    /// Validate one parsed document; returns the first issue found
    pub fn validate_document(&self, doc: &Document) -> std::result::Result<(), ValidationIssue> {
        let root = doc.root().ok_or_else(|| ValidationIssue {
            message: "Document has no root element".to_string(),
            path: "/".to_string(),
        })?;

        let root_name = root.local_name();
        let decl = self
            .model
            .roots
            .iter()
            .find(|r| r.name == root_name)
            .ok_or_else(|| ValidationIssue {
                message: format!("Unknown root element '{}'", root_name),
                path: format!("/{}", root_name),
            })?;

        let path = SchemaPath::root(root_name);
        self.validate_element(root, decl, &path)
    }

    /// Validate one file; parse failures are invalid results, not panics
    pub fn validate_file(&self, path: impl AsRef<Path>) -> FileValidation {
        let path = path.as_ref();
        let file = path.display().to_string();
        match Document::from_file(path) {
            Ok(doc) => match self.validate_document(&doc) {
                Ok(()) => FileValidation {
                    file,
                    valid: true,
                    error: None,
                },
                Err(issue) => FileValidation {
                    file,
                    valid: false,
                    error: Some(issue),
                },
            },
            Err(e) => FileValidation {
                file,
                valid: false,
                error: Some(ValidationIssue {
                    message: format!("Failed to parse: {}", e),
                    path: "/".to_string(),
                }),
            },
        }
    }

    /// Validate a batch of files
    pub fn validate_files(&self, paths: &[impl AsRef<Path>]) -> ValidationSummary {
        let results: Vec<FileValidation> =
            paths.iter().map(|p| self.validate_file(p)).collect();
        let valid_count = results.iter().filter(|r| r.valid).count();
        let invalid_count = results.len() - valid_count;
        ValidationSummary {
            results,
            valid_count,
            invalid_count,
        }
    }

    fn validate_element(
        &self,
        elem: &Element,
        particle: &ElementParticle,
        path: &SchemaPath,
    ) -> std::result::Result<(), ValidationIssue> {
        match self.model.resolve_particle_type(particle) {
            ResolvedType::Complex(ct) => self.validate_complex(elem, ct, path),
            ResolvedType::Simple(st) => self.validate_simple_text(elem, Some(st), path),
            ResolvedType::Builtin(_) => self.validate_simple_text(elem, None, path),
            // Opaque subtrees and unresolvable types are not judged
            ResolvedType::Opaque(_) | ResolvedType::Unknown => Ok(()),
        }
    }

    fn validate_complex(
        &self,
        elem: &Element,
        ct: &ComplexType,
        path: &SchemaPath,
    ) -> std::result::Result<(), ValidationIssue> {
        self.validate_attributes(elem, ct, path)?;

        match &ct.content {
            ContentModel::Empty => {
                if !elem.children.is_empty() {
                    return Err(issue(path, "Element with empty content has children"));
                }
                if elem.text.is_some() {
                    return Err(issue(path, "Element with empty content has text"));
                }
                Ok(())
            }
            ContentModel::Simple { base } => {
                if !elem.children.is_empty() {
                    return Err(issue(path, "Element with simple content has children"));
                }
                if let Some(base) = base {
                    self.check_enumerated_value(elem.text.as_deref(), base, path)?;
                }
                Ok(())
            }
            ContentModel::ElementOnly(_) => {
                if elem.text.is_some() {
                    return Err(issue(path, "Element-only content has text"));
                }
                self.validate_children(elem, ct, path)
            }
            ContentModel::Mixed(_) => self.validate_children(elem, ct, path),
        }
    }

    fn validate_attributes(
        &self,
        elem: &Element,
        ct: &ComplexType,
        path: &SchemaPath,
    ) -> std::result::Result<(), ValidationIssue> {
        let declared: HashMap<&str, &AttributeDecl> = self
            .model
            .inherited_attributes(ct)
            .into_iter()
            .map(|a| (a.name.as_str(), a))
            .collect();

        for (name, value) in &elem.attributes {
            let local = strip_prefix(name);
            if INSTANCE_ATTRIBUTES.contains(&local) {
                continue;
            }
            let attr_path = path.attribute(local);
            match declared.get(local) {
                None => {
                    return Err(ValidationIssue {
                        message: format!("Undeclared attribute '{}'", local),
                        path: attr_path.as_str().to_string(),
                    })
                }
                Some(decl) => {
                    if decl.use_mode == AttributeUse::Prohibited {
                        return Err(ValidationIssue {
                            message: format!("Prohibited attribute '{}'", local),
                            path: attr_path.as_str().to_string(),
                        });
                    }
                    self.check_attribute_value(decl, value, &attr_path)?;
                }
            }
        }

        for (name, decl) in &declared {
            if decl.use_mode == AttributeUse::Required && elem.get_attribute(name).is_none() {
                return Err(ValidationIssue {
                    message: format!("Missing required attribute '{}'", name),
                    path: path.attribute(name).as_str().to_string(),
                });
            }
        }

        Ok(())
    }

    fn check_attribute_value(
        &self,
        decl: &AttributeDecl,
        value: &str,
        attr_path: &SchemaPath,
    ) -> std::result::Result<(), ValidationIssue> {
        let allowed: Option<Vec<String>> = if let Some(inline) = &decl.inline_type {
            if inline.enumeration.is_empty() {
                None
            } else {
                Some(inline.enumeration.clone())
            }
        } else {
            decl.type_ref
                .as_deref()
                .and_then(|t| self.model.enumeration_values(t))
                .map(|v| v.to_vec())
        };

        if let Some(allowed) = allowed {
            if !allowed.iter().any(|v| v == value) {
                return Err(ValidationIssue {
                    message: format!(
                        "Value '{}' is not one of the enumerated values [{}]",
                        value,
                        allowed.join(", ")
                    ),
                    path: attr_path.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_simple_text(
        &self,
        elem: &Element,
        st: Option<&SimpleType>,
        path: &SchemaPath,
    ) -> std::result::Result<(), ValidationIssue> {
        if !elem.children.is_empty() {
            return Err(issue(path, "Simple-typed element has children"));
        }
        if let Some(st) = st {
            if !st.enumeration.is_empty() {
                let text = elem.text.as_deref().unwrap_or("");
                if !st.enumeration.iter().any(|v| v == text) {
                    return Err(ValidationIssue {
                        message: format!(
                            "Text '{}' is not one of the enumerated values [{}]",
                            text,
                            st.enumeration.join(", ")
                        ),
                        path: path.as_str().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_enumerated_value(
        &self,
        text: Option<&str>,
        type_ref: &str,
        path: &SchemaPath,
    ) -> std::result::Result<(), ValidationIssue> {
        if let Some(values) = self.model.enumeration_values(type_ref) {
            let text = text.unwrap_or("");
            if !values.iter().any(|v| v == text) {
                return Err(ValidationIssue {
                    message: format!(
                        "Text '{}' is not one of the enumerated values [{}]",
                        text,
                        values.join(", ")
                    ),
                    path: path.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_children(
        &self,
        elem: &Element,
        ct: &ComplexType,
        path: &SchemaPath,
    ) -> std::result::Result<(), ValidationIssue> {
        let groups = self.model.content_groups(ct);

        // Flatten the declared element particles for lookup
        let mut particles: HashMap<&str, &ElementParticle> = HashMap::new();
        for group in &groups {
            collect_particles(group, &mut particles);
        }

        // Undeclared children (opaque subtrees excepted)
        for child in &elem.children {
            let name = child.local_name();
            if !particles.contains_key(name) {
                return Err(ValidationIssue {
                    message: format!("Undeclared element '{}'", name),
                    path: path.child(name).as_str().to_string(),
                });
            }
        }

        // Occurrence bounds and required presence
        let mut counts: HashMap<&str, u32> = HashMap::new();
        for child in &elem.children {
            *counts.entry(child.local_name()).or_insert(0) += 1;
        }

        for group in &groups {
            self.check_group(group, &counts, path, true)?;
        }

        // Recurse
        for child in &elem.children {
            let name = child.local_name();
            if let Some(particle) = particles.get(name) {
                self.validate_element(child, particle, &path.child(name))?;
            }
        }

        Ok(())
    }

    fn check_group(
        &self,
        group: &ParticleGroup,
        counts: &HashMap<&str, u32>,
        path: &SchemaPath,
        gate: bool,
    ) -> std::result::Result<(), ValidationIssue> {
        if group.compositor == Compositor::Choice {
            let present: Vec<&ElementParticle> = group
                .element_children()
                .filter(|ep| counts.contains_key(ep.name.as_str()))
                .collect();
            if present.len() > 1 {
                return Err(issue(
                    path,
                    "More than one alternative of a choice is present",
                ));
            }
            if present.is_empty() && gate && group.occurs.is_required() {
                return Err(issue(path, "No alternative of a required choice is present"));
            }
            return Ok(());
        }

        for particle in &group.particles {
            match particle {
                Particle::Element(ep) => {
                    let count = counts.get(ep.name.as_str()).copied().unwrap_or(0);
                    if gate && ep.occurs.is_required() && count == 0 {
                        return Err(ValidationIssue {
                            message: format!("Missing required element '{}'", ep.name),
                            path: path.child(&ep.name).as_str().to_string(),
                        });
                    }
                    if let Some(max) = ep.occurs.max {
                        if count > max {
                            return Err(ValidationIssue {
                                message: format!(
                                    "Element '{}' occurs {} times (max {})",
                                    ep.name, count, max
                                ),
                                path: path.child(&ep.name).as_str().to_string(),
                            });
                        }
                    }
                }
                Particle::Group(nested) => {
                    let nested_gate = gate && nested.occurs.is_required();
                    self.check_group(nested, counts, path, nested_gate)?;
                }
            }
        }

        Ok(())
    }
}

fn issue(path: &SchemaPath, message: &str) -> ValidationIssue {
    ValidationIssue {
        message: message.to_string(),
        path: path.as_str().to_string(),
    }
}

fn collect_particles<'p>(group: &'p ParticleGroup, out: &mut HashMap<&'p str, &'p ElementParticle>) {
    for particle in &group.particles {
        match particle {
            Particle::Element(ep) => {
                out.entry(ep.name.as_str()).or_insert(ep);
            }
            Particle::Group(nested) => collect_particles(nested, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Order" type="OrderType"/>
  <xs:complexType name="OrderType">
    <xs:sequence>
      <xs:element name="Customer" type="xs:string"/>
      <xs:element name="Note" type="xs:string" minOccurs="0" maxOccurs="2"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:string" use="required"/>
    <xs:attribute name="status" type="StatusType"/>
  </xs:complexType>
  <xs:simpleType name="StatusType">
    <xs:restriction base="xs:string">
      <xs:enumeration value="Open"/>
      <xs:enumeration value="Closed"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

    fn validator_model() -> SchemaModel {
        SchemaModel::from_string(SCHEMA).unwrap()
    }

    fn check(model: &SchemaModel, xml: &str) -> std::result::Result<(), ValidationIssue> {
        let doc = Document::from_string(xml).unwrap();
        XmlValidator::new(model).validate_document(&doc)
    }

    #[test]
    fn test_valid_document() {
        let m = validator_model();
        assert!(check(&m, r#"<Order id="1"><Customer>x</Customer></Order>"#).is_ok());
        assert!(check(
            &m,
            r#"<Order id="1" status="Open"><Customer>x</Customer><Note>n</Note></Order>"#
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_root() {
        let m = validator_model();
        let err = check(&m, "<Nope/>").unwrap_err();
        assert!(err.message.contains("Unknown root"));
    }

    #[test]
    fn test_missing_required_attribute() {
        let m = validator_model();
        let err = check(&m, r#"<Order><Customer>x</Customer></Order>"#).unwrap_err();
        assert!(err.message.contains("required attribute 'id'"));
        assert_eq!(err.path, "/Order@id");
    }

    #[test]
    fn test_missing_required_child() {
        let m = validator_model();
        let err = check(&m, r#"<Order id="1"/>"#).unwrap_err();
        assert!(err.message.contains("required element 'Customer'"));
    }

    #[test]
    fn test_undeclared_child() {
        let m = validator_model();
        let err =
            check(&m, r#"<Order id="1"><Customer>x</Customer><Bogus/></Order>"#).unwrap_err();
        assert!(err.message.contains("Undeclared element 'Bogus'"));
    }

    #[test]
    fn test_undeclared_attribute() {
        let m = validator_model();
        let err = check(&m, r#"<Order id="1" bogus="y"><Customer>x</Customer></Order>"#)
            .unwrap_err();
        assert!(err.message.contains("Undeclared attribute 'bogus'"));
    }

    #[test]
    fn test_enumeration_value_checked() {
        let m = validator_model();
        let err = check(
            &m,
            r#"<Order id="1" status="Pending"><Customer>x</Customer></Order>"#,
        )
        .unwrap_err();
        assert!(err.message.contains("not one of the enumerated values"));
        assert!(check(
            &m,
            r#"<Order id="1" status="Closed"><Customer>x</Customer></Order>"#
        )
        .is_ok());
    }

    #[test]
    fn test_max_occurs_exceeded() {
        let m = validator_model();
        let err = check(
            &m,
            r#"<Order id="1"><Customer>x</Customer><Note>1</Note><Note>2</Note><Note>3</Note></Order>"#,
        )
        .unwrap_err();
        assert!(err.message.contains("occurs 3 times"));
    }

    #[test]
    fn test_choice_exclusivity() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="P" type="PType"/>
  <xs:complexType name="PType">
    <xs:choice>
      <xs:element name="A" type="xs:string"/>
      <xs:element name="B" type="xs:string"/>
    </xs:choice>
  </xs:complexType>
</xs:schema>"#;
        let m = SchemaModel::from_string(schema).unwrap();

        assert!(check(&m, "<P><A>x</A></P>").is_ok());
        let err = check(&m, "<P><A>x</A><B>y</B></P>").unwrap_err();
        assert!(err.message.contains("More than one alternative"));
        let err = check(&m, "<P/>").unwrap_err();
        assert!(err.message.contains("No alternative"));
    }

    #[test]
    fn test_batch_summary() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let m = validator_model();

        let good = dir.path().join("good.xml");
        write!(
            std::fs::File::create(&good).unwrap(),
            r#"<Order id="1"><Customer>x</Customer></Order>"#
        )
        .unwrap();
        let bad = dir.path().join("bad.xml");
        write!(std::fs::File::create(&bad).unwrap(), r#"<Order id="1"/>"#).unwrap();

        let validator = XmlValidator::new(&m);
        let summary = validator.validate_files(&[good, bad]);

        assert_eq!(summary.valid_count, 1);
        assert_eq!(summary.invalid_count, 1);
        assert!(!summary.all_valid());

        let text = summary.render_text();
        assert!(text.contains("1 valid, 1 invalid"));
        assert!(text.contains("INVALID"));
    }
}
