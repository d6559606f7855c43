//! Schema path enumeration
//!
//! Walks the schema from each top-level element and produces the ground
//! set of element/attribute paths together with the structural constraints
//! over them. The walk is depth-bounded: every unfolded level of a
//! recursive type contributes its own paths, so nested structures can be
//! measured level by level.

use std::collections::BTreeSet;

use log::debug;

use crate::error::{Error, Result};
use crate::paths::{ConstraintSet, GroundSet, SchemaPath};
use crate::schema::{
    AttributeUse, ComplexType, Compositor, Particle, ParticleGroup, ResolvedType, SchemaModel,
};

/// Result of one enumeration run over a schema
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// All element and attribute paths
    pub ground: GroundSet,
    /// Structural constraints extracted during the same walk
    pub constraints: ConstraintSet,
    /// Element paths with minOccurs=0 (outside choice groups)
    pub optional_elements: BTreeSet<SchemaPath>,
    /// Attribute paths with use="optional"
    pub optional_attributes: BTreeSet<SchemaPath>,
}

/// Depth-bounded walker over the particle trees of a schema
pub struct PathEnumerator<'a> {
    model: &'a SchemaModel,
    max_depth: usize,
}

impl<'a> PathEnumerator<'a> {
    /// Create an enumerator for a schema and depth bound
    pub fn new(model: &'a SchemaModel, max_depth: usize) -> Self {
        Self { model, max_depth }
    }

    /// Run the walk from every top-level element
    pub fn enumerate(&self) -> Result<Enumeration> {
        let mut walk = Walk {
            model: self.model,
            max_depth: self.max_depth,
            out: Enumeration::default(),
            visited: BTreeSet::new(),
            type_stack: Vec::new(),
        };

        for root in &self.model.roots {
            let path = SchemaPath::root(&root.name);
            walk.out.ground.elements.insert(path.clone());

            if 1 <= self.max_depth {
                if let ResolvedType::Complex(ct) = self.model.resolve_particle_type(root) {
                    walk.enter_type(ct, &path, 1)?;
                }
            }
        }

        // Depth bound is an invariant of the walk; a violation is a bug
        for path in walk.out.ground.iter() {
            if path.depth() > self.max_depth.max(1) {
                return Err(Error::Enumeration(format!(
                    "Path '{}' exceeds the depth bound {}",
                    path, self.max_depth
                )));
            }
        }

        debug!(
            "Enumerated {} element paths, {} attribute paths ({} choice groups, {} required pairs)",
            walk.out.ground.elements.len(),
            walk.out.ground.attributes.len(),
            walk.out.constraints.choice_groups.len(),
            walk.out.constraints.required.len()
        );

        Ok(walk.out)
    }
}

/// Convenience wrapper: enumerate a schema with a depth bound
pub fn enumerate_paths(model: &SchemaModel, max_depth: usize) -> Result<Enumeration> {
    PathEnumerator::new(model, max_depth).enumerate()
}

struct Walk<'a> {
    model: &'a SchemaModel,
    max_depth: usize,
    out: Enumeration,
    /// (path, type name, depth) triples already entered
    visited: BTreeSet<(SchemaPath, String, usize)>,
    /// Named types on the current descent, for recursion tagging
    type_stack: Vec<String>,
}

impl<'a> Walk<'a> {
    /// Enter a complex type at a path, emitting its attribute paths and
    /// walking its content model
    fn enter_type(&mut self, ct: &'a ComplexType, path: &SchemaPath, depth: usize) -> Result<()> {
        let type_label = ct.name.clone().unwrap_or_else(|| "{anonymous}".to_string());

        let key = (path.clone(), type_label.clone(), depth);
        if !self.visited.insert(key) {
            return Ok(());
        }

        if ct.name.is_some() && self.type_stack.contains(&type_label) {
            self.out.constraints.recursive.insert(path.clone());
        }
        self.type_stack.push(type_label);

        for attr in self.model.inherited_attributes(ct) {
            if attr.use_mode == AttributeUse::Prohibited {
                continue;
            }
            let attr_path = path.attribute(&attr.name);
            self.out.ground.attributes.insert(attr_path.clone());
            self.out
                .constraints
                .parent_of
                .insert(attr_path.clone(), path.clone());
            match attr.use_mode {
                AttributeUse::Required => {
                    self.out
                        .constraints
                        .required
                        .insert((path.clone(), attr_path));
                }
                AttributeUse::Optional => {
                    self.out.optional_attributes.insert(attr_path);
                }
                AttributeUse::Prohibited => unreachable!(),
            }
        }

        for group in self.model.content_groups(ct) {
            self.visit_group(group, path, depth, group.occurs.is_required())?;
        }

        self.type_stack.pop();
        Ok(())
    }

    /// Walk a model group; compositors extend the walk but not the path.
    /// `gate` is true while every enclosing compositor is itself required,
    /// which is what makes a child's minOccurs unconditional.
    fn visit_group(
        &mut self,
        group: &'a ParticleGroup,
        parent_path: &SchemaPath,
        depth: usize,
        gate: bool,
    ) -> Result<()> {
        let is_choice = group.compositor == Compositor::Choice;
        let mut choice_branches: Vec<SchemaPath> = Vec::new();

        for particle in &group.particles {
            match particle {
                Particle::Element(ep) => {
                    if depth + 1 > self.max_depth {
                        continue;
                    }
                    let child_path = parent_path.child(&ep.name);
                    self.out.ground.elements.insert(child_path.clone());
                    self.out
                        .constraints
                        .parent_of
                        .insert(child_path.clone(), parent_path.clone());

                    if is_choice {
                        choice_branches.push(child_path.clone());
                    } else if ep.occurs.is_required() && gate {
                        self.out
                            .constraints
                            .required
                            .insert((parent_path.clone(), child_path.clone()));
                    }
                    if !is_choice && ep.occurs.is_emptiable() {
                        self.out.optional_elements.insert(child_path.clone());
                    }

                    if let ResolvedType::Complex(ct) = self.model.resolve_particle_type(ep) {
                        self.enter_type(ct, &child_path, depth + 1)?;
                    }
                }
                Particle::Group(nested) => {
                    let nested_gate = gate && !is_choice && nested.occurs.is_required();
                    self.visit_group(nested, parent_path, depth, nested_gate)?;
                }
            }
        }

        if is_choice && !choice_branches.is_empty() {
            self.out
                .constraints
                .choice_groups
                .push((parent_path.clone(), choice_branches));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(xsd: &str) -> SchemaModel {
        SchemaModel::from_string(xsd).unwrap()
    }

    const ORDER_SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Order" type="OrderType"/>
  <xs:complexType name="OrderType">
    <xs:sequence>
      <xs:element name="Customer" type="xs:string"/>
      <xs:element name="Note" type="xs:string" minOccurs="0"/>
      <xs:element name="Item" type="ItemType" maxOccurs="unbounded"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:string" use="required"/>
    <xs:attribute name="channel" type="xs:string"/>
  </xs:complexType>
  <xs:complexType name="ItemType">
    <xs:sequence>
      <xs:element name="Sku" type="xs:string"/>
    </xs:sequence>
    <xs:attribute name="qty" type="xs:int" use="required"/>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_basic_enumeration() {
        let m = model(ORDER_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();

        let elements: Vec<&str> = e.ground.elements.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            elements,
            vec![
                "/Order",
                "/Order/Customer",
                "/Order/Item",
                "/Order/Item/Sku",
                "/Order/Note",
            ]
        );

        // '/' sorts before '@', so the nested attribute path comes first
        let attributes: Vec<&str> = e.ground.attributes.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            attributes,
            vec!["/Order/Item@qty", "/Order@channel", "/Order@id"]
        );
    }

    #[test]
    fn test_parent_closure() {
        let m = model(ORDER_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();

        for path in e.ground.iter() {
            let mut current = path.clone();
            let mut steps = 0;
            while let Some(parent) = e.constraints.parent_of.get(&current) {
                assert!(e.ground.elements.contains(parent));
                current = parent.clone();
                steps += 1;
                assert!(steps < 100, "parent chain does not terminate");
            }
            assert!(current.is_root(), "chain from {} ended at {}", path, current);
        }
    }

    #[test]
    fn test_required_pairs() {
        let m = model(ORDER_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();

        let order = SchemaPath::root("Order");
        let required: Vec<String> = e
            .constraints
            .required_children_of(&order)
            .map(|p| p.as_str().to_string())
            .collect();
        assert_eq!(required, vec!["/Order/Customer", "/Order/Item", "/Order@id"]);

        assert!(e.optional_elements.contains(&order.child("Note")));
        assert!(e.optional_attributes.contains(&order.attribute("channel")));
    }

    #[test]
    fn test_max_depth_zero() {
        let m = model(ORDER_SCHEMA);
        let e = enumerate_paths(&m, 0).unwrap();

        assert_eq!(e.ground.elements.len(), 1);
        assert!(e.ground.elements.contains(&SchemaPath::root("Order")));
        assert!(e.ground.attributes.is_empty());
    }

    const RECURSIVE_SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Item" type="ItemType"/>
  <xs:complexType name="ItemType">
    <xs:sequence>
      <xs:element name="SubItem" type="ItemType" minOccurs="0"/>
    </xs:sequence>
    <xs:attribute name="label" type="xs:string"/>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_recursion_bounded() {
        let m = model(RECURSIVE_SCHEMA);
        let e = enumerate_paths(&m, 3).unwrap();

        let elements: Vec<&str> = e.ground.elements.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            elements,
            vec!["/Item", "/Item/SubItem", "/Item/SubItem/SubItem"]
        );
        // Each unfolded level carries its own attribute path
        assert_eq!(e.ground.attributes.len(), 3);
        assert!(!e.constraints.recursive.is_empty());
    }

    #[test]
    fn test_recursion_depth_exact() {
        let m = model(RECURSIVE_SCHEMA);
        for depth in 1..6 {
            let e = enumerate_paths(&m, depth).unwrap();
            assert_eq!(e.ground.elements.len(), depth, "maxDepth {}", depth);
        }
    }

    #[test]
    fn test_determinism() {
        let m = model(ORDER_SCHEMA);
        let a = enumerate_paths(&m, 10).unwrap();
        let b = enumerate_paths(&m, 10).unwrap();
        assert_eq!(a.ground.elements, b.ground.elements);
        assert_eq!(a.ground.attributes, b.ground.attributes);
        assert_eq!(a.constraints.required, b.constraints.required);
        assert_eq!(a.constraints.choice_groups, b.constraints.choice_groups);
    }

    const CHOICE_SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Payment" type="PaymentType"/>
  <xs:complexType name="PaymentType">
    <xs:choice>
      <xs:element name="Card" type="xs:string"/>
      <xs:element name="Cash" type="xs:string"/>
      <xs:element name="Transfer" type="xs:string"/>
    </xs:choice>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_choice_groups() {
        let m = model(CHOICE_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();

        assert_eq!(e.constraints.choice_groups.len(), 1);
        let (owner, branches) = &e.constraints.choice_groups[0];
        assert_eq!(owner.as_str(), "/Payment");
        let names: Vec<&str> = branches.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            names,
            vec!["/Payment/Card", "/Payment/Cash", "/Payment/Transfer"]
        );

        // Choice branches are never unconditionally required
        assert!(e.constraints.required.is_empty());
    }

    #[test]
    fn test_optional_sequence_does_not_require_children() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="R" type="RType"/>
  <xs:complexType name="RType">
    <xs:sequence>
      <xs:element name="Always" type="xs:string"/>
      <xs:sequence minOccurs="0">
        <xs:element name="Conditional" type="xs:string"/>
      </xs:sequence>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;
        let m = model(schema);
        let e = enumerate_paths(&m, 10).unwrap();

        let r = SchemaPath::root("R");
        assert!(e.ground.elements.contains(&r.child("Conditional")));
        assert!(e
            .constraints
            .required
            .contains(&(r.clone(), r.child("Always"))));
        assert!(!e
            .constraints
            .required
            .contains(&(r.clone(), r.child("Conditional"))));
    }

    #[test]
    fn test_inherited_attributes_enumerated() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="BaseType">
    <xs:attribute name="version" type="xs:string" use="required"/>
  </xs:complexType>
  <xs:complexType name="DerivedType">
    <xs:complexContent>
      <xs:extension base="BaseType">
        <xs:attribute name="extra" type="xs:string"/>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="R" type="DerivedType"/>
</xs:schema>"#;
        let m = model(schema);
        let e = enumerate_paths(&m, 10).unwrap();

        let r = SchemaPath::root("R");
        assert!(e.ground.attributes.contains(&r.attribute("version")));
        assert!(e.ground.attributes.contains(&r.attribute("extra")));
        assert!(e
            .constraints
            .required
            .contains(&(r.clone(), r.attribute("version"))));
    }
}
