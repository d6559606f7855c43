//! Coverage measurement
//!
//! Walks XML documents, collects the element/attribute paths actually
//! present, and diffs them against the ground set. Multiple input
//! documents are unioned before reporting.

use std::collections::BTreeSet;
use std::path::Path;

use log::warn;
use serde::Serialize;

use crate::documents::{Document, Element};
use crate::paths::{GroundSet, SchemaPath};

/// XSI bookkeeping attributes that are not coverage items
const SKIPPED_ATTRIBUTES: [&str; 4] = ["schemaLocation", "noNamespaceSchemaLocation", "type", "nil"];

/// Collect the element and attribute paths present in a document
pub fn document_paths(doc: &Document) -> (BTreeSet<SchemaPath>, BTreeSet<SchemaPath>) {
    let mut elements = BTreeSet::new();
    let mut attributes = BTreeSet::new();
    if let Some(root) = doc.root() {
        let path = SchemaPath::root(root.local_name());
        collect_element(root, &path, &mut elements, &mut attributes);
    }
    (elements, attributes)
}

fn collect_element(
    elem: &Element,
    path: &SchemaPath,
    elements: &mut BTreeSet<SchemaPath>,
    attributes: &mut BTreeSet<SchemaPath>,
) {
    elements.insert(path.clone());

    for (name, _) in &elem.attributes {
        let local = crate::namespaces::strip_prefix(name);
        if SKIPPED_ATTRIBUTES.contains(&local) {
            continue;
        }
        attributes.insert(path.attribute(local));
    }

    for child in &elem.children {
        let child_path = path.child(child.local_name());
        collect_element(child, &child_path, elements, attributes);
    }
}

/// Measures path coverage of XML documents against a ground set
pub struct CoverageMeasurer<'a> {
    ground: &'a GroundSet,
    used_elements: BTreeSet<SchemaPath>,
    used_attributes: BTreeSet<SchemaPath>,
    failed_files: Vec<String>,
}

impl<'a> CoverageMeasurer<'a> {
    /// Create a measurer over a ground set
    pub fn new(ground: &'a GroundSet) -> Self {
        Self {
            ground,
            used_elements: BTreeSet::new(),
            used_attributes: BTreeSet::new(),
            failed_files: Vec::new(),
        }
    }

    /// Add one parsed document to the measurement
    pub fn add_document(&mut self, doc: &Document) {
        let (elements, attributes) = document_paths(doc);
        self.used_elements.extend(elements);
        self.used_attributes.extend(attributes);
    }

    /// Add an XML file; parse failures are recorded and do not abort the batch
    pub fn add_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match Document::from_file(path) {
            Ok(doc) => self.add_document(&doc),
            Err(e) => {
                warn!("Skipping '{}': {}", path.display(), e);
                self.failed_files
                    .push(format!("{}: {}", path.display(), e));
            }
        }
    }

    /// Produce the coverage report over everything added so far
    pub fn report(&self) -> CoverageReport {
        CoverageReport::compute(
            self.ground,
            &self.used_elements,
            &self.used_attributes,
            self.failed_files.clone(),
        )
    }
}

/// Coverage figures and path lists for one measurement
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    /// Number of element paths defined by the schema
    pub defined_elements: usize,
    /// Number of attribute paths defined by the schema
    pub defined_attributes: usize,
    /// Defined element paths present in the documents
    pub covered_elements: usize,
    /// Defined attribute paths present in the documents
    pub covered_attributes: usize,
    /// Element coverage percentage
    pub element_coverage: f64,
    /// Attribute coverage percentage
    pub attribute_coverage: f64,
    /// Overall coverage percentage
    pub overall_coverage: f64,
    /// Defined element paths never used
    pub unused_elements: Vec<String>,
    /// Defined attribute paths never used
    pub unused_attributes: Vec<String>,
    /// Used element paths not defined by the schema
    pub undefined_elements: Vec<String>,
    /// Used attribute paths not defined by the schema
    pub undefined_attributes: Vec<String>,
    /// Undefined paths living under an externally-defined subtree
    pub external_paths: Vec<String>,
    /// All element paths present in the documents
    pub used_elements: Vec<String>,
    /// All attribute paths present in the documents
    pub used_attributes: Vec<String>,
    /// Input files that failed to parse
    pub failed_files: Vec<String>,
}

impl CoverageReport {
    /// Compute a report from the ground set and used-path sets
    pub fn compute(
        ground: &GroundSet,
        used_elements: &BTreeSet<SchemaPath>,
        used_attributes: &BTreeSet<SchemaPath>,
        failed_files: Vec<String>,
    ) -> Self {
        let covered_elements = used_elements.intersection(&ground.elements).count();
        let covered_attributes = used_attributes.intersection(&ground.attributes).count();

        let undefined_all: Vec<&SchemaPath> = used_elements
            .difference(&ground.elements)
            .chain(used_attributes.difference(&ground.attributes))
            .collect();

        // Paths under an unmodeled imported subtree (e.g. an XML Signature)
        // are reported informationally, apart from truly undefined paths
        let (external, undefined): (Vec<&SchemaPath>, Vec<&SchemaPath>) = undefined_all
            .into_iter()
            .partition(|p| p.as_str().contains("/Signature/") || p.as_str().contains("/Signature@"));

        let defined_elements = ground.elements.len();
        let defined_attributes = ground.attributes.len();
        let total_defined = defined_elements + defined_attributes;
        let total_covered = covered_elements + covered_attributes;

        Self {
            defined_elements,
            defined_attributes,
            covered_elements,
            covered_attributes,
            element_coverage: percentage(covered_elements, defined_elements),
            attribute_coverage: percentage(covered_attributes, defined_attributes),
            overall_coverage: percentage(total_covered, total_defined),
            unused_elements: to_strings(ground.elements.difference(used_elements)),
            unused_attributes: to_strings(ground.attributes.difference(used_attributes)),
            undefined_elements: undefined
                .iter()
                .filter(|p| !p.is_attribute())
                .map(|p| p.as_str().to_string())
                .collect(),
            undefined_attributes: undefined
                .iter()
                .filter(|p| p.is_attribute())
                .map(|p| p.as_str().to_string())
                .collect(),
            external_paths: external.iter().map(|p| p.as_str().to_string()).collect(),
            used_elements: to_strings(used_elements.iter()),
            used_attributes: to_strings(used_attributes.iter()),
            failed_files,
        }
    }

    /// Overall coverage as a fraction in [0, 1]
    pub fn overall_fraction(&self) -> f64 {
        self.overall_coverage / 100.0
    }

    /// Whether any used path is not defined by the schema
    pub fn has_undefined_paths(&self) -> bool {
        !self.undefined_elements.is_empty() || !self.undefined_attributes.is_empty()
    }

    /// Render the report as the sectioned text format
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let line = "=".repeat(72);

        out.push_str(&line);
        out.push_str("\nXSD path coverage report\n");
        out.push_str(&line);
        out.push('\n');

        out.push_str("\nElement coverage\n");
        out.push_str(&format!("  defined: {}\n", self.defined_elements));
        out.push_str(&format!("  used:    {}\n", self.covered_elements));
        out.push_str(&format!(
            "  unused:  {}\n",
            self.defined_elements - self.covered_elements
        ));
        out.push_str(&format!("  coverage: {:.2}%\n", self.element_coverage));

        out.push_str("\nAttribute coverage\n");
        out.push_str(&format!("  defined: {}\n", self.defined_attributes));
        out.push_str(&format!("  used:    {}\n", self.covered_attributes));
        out.push_str(&format!(
            "  unused:  {}\n",
            self.defined_attributes - self.covered_attributes
        ));
        out.push_str(&format!("  coverage: {:.2}%\n", self.attribute_coverage));

        out.push_str("\nOverall coverage\n");
        out.push_str(&format!(
            "  defined: {}\n",
            self.defined_elements + self.defined_attributes
        ));
        out.push_str(&format!(
            "  used:    {}\n",
            self.covered_elements + self.covered_attributes
        ));
        out.push_str(&format!("  coverage: {:.2}%\n", self.overall_coverage));

        if !self.unused_elements.is_empty() || !self.unused_attributes.is_empty() {
            out.push_str("\nUnused paths\n");
            for p in self.unused_elements.iter().chain(&self.unused_attributes) {
                out.push_str(&format!("  - {}\n", p));
            }
        }

        if !self.external_paths.is_empty() {
            out.push_str("\nInfo: paths defined by external schemas\n");
            for p in &self.external_paths {
                out.push_str(&format!("  . {}\n", p));
            }
        }

        if self.has_undefined_paths() {
            out.push_str("\nWarning: undefined paths\n");
            for p in self
                .undefined_elements
                .iter()
                .chain(&self.undefined_attributes)
            {
                out.push_str(&format!("  ! {}\n", p));
            }
        }

        out.push_str("\nUsed paths\n");
        for p in self.used_elements.iter().chain(&self.used_attributes) {
            out.push_str(&format!("  {}\n", p));
        }

        if !self.failed_files.is_empty() {
            out.push_str("\nFiles skipped due to parse errors\n");
            for f in &self.failed_files {
                out.push_str(&format!("  ! {}\n", f));
            }
        }

        out.push_str(&line);
        out.push('\n');
        out
    }
}

fn percentage(covered: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

fn to_strings<'a>(paths: impl Iterator<Item = &'a SchemaPath>) -> Vec<String> {
    paths.map(|p| p.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::enumerate_paths;
    use crate::schema::SchemaModel;

    const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="R" type="RType"/>
  <xs:complexType name="RType">
    <xs:sequence>
      <xs:element name="A" type="xs:string"/>
      <xs:element name="B" type="xs:string" minOccurs="0"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:string" use="required"/>
  </xs:complexType>
</xs:schema>"#;

    fn ground() -> GroundSet {
        let model = SchemaModel::from_string(SCHEMA).unwrap();
        enumerate_paths(&model, 10).unwrap().ground
    }

    #[test]
    fn test_document_paths() {
        let doc = Document::from_string(r#"<R id="1"><A>x</A></R>"#).unwrap();
        let (elements, attributes) = document_paths(&doc);

        assert!(elements.contains(&SchemaPath::root("R")));
        assert!(elements.contains(&SchemaPath::root("R").child("A")));
        assert!(attributes.contains(&SchemaPath::root("R").attribute("id")));
    }

    #[test]
    fn test_prefixes_stripped() {
        let doc = Document::from_string(
            r#"<my:R xmlns:my="http://x" my:id="1"><my:A>x</my:A></my:R>"#,
        )
        .unwrap();
        let (elements, attributes) = document_paths(&doc);
        assert!(elements.contains(&SchemaPath::root("R").child("A")));
        assert!(attributes.contains(&SchemaPath::root("R").attribute("id")));
    }

    #[test]
    fn test_xsi_attributes_skipped() {
        let doc = Document::from_string(
            r#"<R xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                 xsi:schemaLocation="http://x r.xsd" id="1"/>"#,
        )
        .unwrap();
        let (_, attributes) = document_paths(&doc);
        assert_eq!(attributes.len(), 1);
        assert!(attributes.contains(&SchemaPath::root("R").attribute("id")));
    }

    #[test]
    fn test_full_coverage() {
        let ground = ground();
        let mut measurer = CoverageMeasurer::new(&ground);
        let doc = Document::from_string(r#"<R id="1"><A>x</A><B>y</B></R>"#).unwrap();
        measurer.add_document(&doc);

        let report = measurer.report();
        assert_eq!(report.covered_elements, 3);
        assert_eq!(report.covered_attributes, 1);
        assert_eq!(report.overall_coverage, 100.0);
        assert!(report.unused_elements.is_empty());
        assert!(!report.has_undefined_paths());
    }

    #[test]
    fn test_partial_coverage_and_undefined() {
        let ground = ground();
        let mut measurer = CoverageMeasurer::new(&ground);
        let doc = Document::from_string(r#"<R id="1"><A>x</A><Zzz/></R>"#).unwrap();
        measurer.add_document(&doc);

        let report = measurer.report();
        assert_eq!(report.covered_elements, 2);
        assert_eq!(report.unused_elements, vec!["/R/B".to_string()]);
        assert_eq!(report.undefined_elements, vec!["/R/Zzz".to_string()]);
        assert!(report.has_undefined_paths());
        assert!(report.overall_coverage < 100.0);
    }

    #[test]
    fn test_union_monotonicity() {
        let ground = ground();
        let mut measurer = CoverageMeasurer::new(&ground);

        let doc1 = Document::from_string(r#"<R id="1"><A>x</A></R>"#).unwrap();
        measurer.add_document(&doc1);
        let before = measurer.report();

        let doc2 = Document::from_string(r#"<R><B>y</B></R>"#).unwrap();
        measurer.add_document(&doc2);
        let after = measurer.report();

        assert!(after.covered_elements >= before.covered_elements);
        assert!(after.covered_attributes >= before.covered_attributes);
        assert!(after.overall_coverage >= before.overall_coverage);
    }

    #[test]
    fn test_report_text_sections() {
        let ground = ground();
        let mut measurer = CoverageMeasurer::new(&ground);
        let doc = Document::from_string(r#"<R id="1"><A>x</A><Zzz/></R>"#).unwrap();
        measurer.add_document(&doc);

        let text = measurer.report().render_text();
        assert!(text.contains("Element coverage"));
        assert!(text.contains("Attribute coverage"));
        assert!(text.contains("Overall coverage"));
        assert!(text.contains("Unused paths"));
        assert!(text.contains("Warning: undefined paths"));
        assert!(text.contains("Used paths"));
        // Two-decimal percentages
        assert!(text.contains('%'));
    }

    #[test]
    fn test_missing_file_recorded() {
        let ground = ground();
        let mut measurer = CoverageMeasurer::new(&ground);
        measurer.add_file("/nonexistent/file.xml");

        let report = measurer.report();
        assert_eq!(report.failed_files.len(), 1);
        assert_eq!(report.covered_elements, 0);
    }

    #[test]
    fn test_signature_subtree_is_informational() {
        let ground = ground();
        let mut measurer = CoverageMeasurer::new(&ground);
        let doc = Document::from_string(
            r#"<R id="1"><A>x</A><Signature><SignedInfo/></Signature></R>"#,
        )
        .unwrap();
        measurer.add_document(&doc);

        let report = measurer.report();
        assert!(report
            .external_paths
            .contains(&"/R/Signature/SignedInfo".to_string()));
        // The Signature element itself is genuinely undefined
        assert!(report
            .undefined_elements
            .contains(&"/R/Signature".to_string()));
    }
}
