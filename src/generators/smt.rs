//! Path-selection encoding and solver driver
//!
//! Maps ground-set paths to boolean variables, emits the hard clauses of
//! the generation problem (hierarchy, required, choice exactly-one, depth,
//! root presence) in a deterministic sorted order, drives the optimizer,
//! and decodes the model back into a selected-path set.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use super::sat::{Lit, MaxSatSolver, SolveOutcome, Var};
use crate::enumerator::Enumeration;
use crate::error::{GenerationError, Result};
use crate::paths::SchemaPath;

/// Bidirectional mapping between ground-set paths and solver variables
#[derive(Debug, Clone, Default)]
pub struct PathVariableMap {
    paths: Vec<SchemaPath>,
    index: BTreeMap<SchemaPath, Var>,
}

impl PathVariableMap {
    /// Number variables over the ground set: element paths first, then
    /// attribute paths, each in sorted order
    pub fn build(enumeration: &Enumeration) -> Self {
        let mut map = Self::default();
        for path in enumeration.ground.iter() {
            let var = map.paths.len() as Var;
            map.index.insert(path.clone(), var);
            map.paths.push(path.clone());
        }
        map
    }

    /// Variable for a path
    pub fn var(&self, path: &SchemaPath) -> Option<Var> {
        self.index.get(path).copied()
    }

    /// Path for a variable
    pub fn path(&self, var: Var) -> &SchemaPath {
        &self.paths[var as usize]
    }

    /// Printable solver name of a variable (collision-free)
    pub fn variable_name(&self, var: Var) -> String {
        self.paths[var as usize].variable_name()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Builds the clause set for one enumeration
pub struct SmtEncoder<'a> {
    enumeration: &'a Enumeration,
    max_depth: usize,
}

impl<'a> SmtEncoder<'a> {
    /// Create an encoder over an enumeration and its depth bound
    pub fn new(enumeration: &'a Enumeration, max_depth: usize) -> Self {
        Self {
            enumeration,
            max_depth,
        }
    }

    /// Emit variables and hard clauses into a fresh solver
    pub fn encode(&self, timeout_ms: u64) -> (PathVariableMap, MaxSatSolver) {
        let map = PathVariableMap::build(self.enumeration);
        let mut solver = MaxSatSolver::new(map.len()).with_timeout_ms(timeout_ms);
        let constraints = &self.enumeration.constraints;

        // Hierarchy: child -> parent
        for path in &map.paths {
            if let Some(parent) = constraints.parent_of.get(path) {
                if let (Some(child_var), Some(parent_var)) = (map.var(path), map.var(parent)) {
                    solver.add_clause(vec![Lit::neg(child_var), Lit::pos(parent_var)]);
                }
            }
        }

        // Required: parent -> required child
        for (parent, child) in &constraints.required {
            if let (Some(parent_var), Some(child_var)) = (map.var(parent), map.var(child)) {
                solver.add_clause(vec![Lit::neg(parent_var), Lit::pos(child_var)]);
            }
        }

        // Choice: parent -> (a1 | ... | ak), plus pairwise exclusion
        for (owner, branches) in &constraints.choice_groups {
            let owner_var = match map.var(owner) {
                Some(v) => v,
                None => continue,
            };
            let branch_vars: Vec<Var> =
                branches.iter().filter_map(|b| map.var(b)).collect();
            if branch_vars.is_empty() {
                continue;
            }

            let mut at_least_one = vec![Lit::neg(owner_var)];
            at_least_one.extend(branch_vars.iter().map(|v| Lit::pos(*v)));
            solver.add_clause(at_least_one);

            for (i, a) in branch_vars.iter().enumerate() {
                for b in &branch_vars[i + 1..] {
                    solver.add_clause(vec![Lit::neg(*a), Lit::neg(*b)]);
                }
            }
        }

        // Depth bound (redundant with the enumerator, kept for safety)
        for path in &map.paths {
            if path.depth() > self.max_depth.max(1) {
                if let Some(var) = map.var(path) {
                    solver.add_clause(vec![Lit::neg(var)]);
                }
            }
        }

        // Root presence
        if let Some(root) = self.enumeration.ground.roots().next() {
            if let Some(var) = map.var(root) {
                solver.add_clause(vec![Lit::pos(var)]);
            }
        }

        debug!(
            "Encoded {} variables, {} clauses",
            map.len(),
            solver.clause_count()
        );

        (map, solver)
    }
}

/// Decoded solution of one solver run
#[derive(Debug, Clone)]
pub struct SmtSolution {
    /// Paths assigned true in the model
    pub selected: BTreeSet<SchemaPath>,
    /// Fraction of the ground set the selection covers
    pub coverage: f64,
}

/// Coverage-maximizing generator driven by the boolean optimizer
pub struct SmtGenerator {
    /// Depth bound matching the enumeration
    pub max_depth: usize,
    /// Solver deadline in milliseconds
    pub timeout_ms: u64,
}

impl SmtGenerator {
    /// Create a generator with a depth bound and solver deadline
    pub fn new(max_depth: usize, timeout_ms: u64) -> Self {
        Self {
            max_depth,
            timeout_ms,
        }
    }

    /// Encode, solve, and decode the model into a selected-path set
    pub fn solve(&self, enumeration: &Enumeration) -> Result<SmtSolution> {
        let encoder = SmtEncoder::new(enumeration, self.max_depth);
        let (map, solver) = encoder.encode(self.timeout_ms);

        match solver.solve() {
            SolveOutcome::Sat(model) => {
                let selected: BTreeSet<SchemaPath> = (0..map.len() as Var)
                    .filter(|v| model.is_true(*v))
                    .map(|v| map.path(v).clone())
                    .collect();
                let total = enumeration.ground.len();
                let coverage = if total == 0 {
                    1.0
                } else {
                    selected.len() as f64 / total as f64
                };
                debug!(
                    "Solver selected {}/{} paths ({:.2}%)",
                    selected.len(),
                    total,
                    coverage * 100.0
                );
                Ok(SmtSolution { selected, coverage })
            }
            SolveOutcome::Unsat => Err(GenerationError::Infeasible {
                conflict: Some("hard clauses over the ground set conflict".to_string()),
            }
            .into()),
            SolveOutcome::Unknown => Err(GenerationError::Timeout {
                timeout_ms: self.timeout_ms,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::enumerate_paths;
    use crate::schema::SchemaModel;

    fn enumeration(xsd: &str, max_depth: usize) -> Enumeration {
        let model = SchemaModel::from_string(xsd).unwrap();
        enumerate_paths(&model, max_depth).unwrap()
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
    fn test_variable_map_deterministic() {
        let e = enumeration(CHOICE_SCHEMA, 10);
        let a = PathVariableMap::build(&e);
        let b = PathVariableMap::build(&e);
        assert_eq!(a.paths, b.paths);
        assert_eq!(a.len(), 3);
        assert_eq!(a.variable_name(0), "_C");
    }

    #[test]
    fn test_choice_exactly_one_in_model() {
        let e = enumeration(CHOICE_SCHEMA, 10);
        let solution = SmtGenerator::new(10, 10_000).solve(&e).unwrap();

        let a = SchemaPath::root("C").child("A");
        let b = SchemaPath::root("C").child("B");
        assert!(solution.selected.contains(&SchemaPath::root("C")));
        // Exactly one branch
        assert_eq!(
            solution.selected.contains(&a) as usize + solution.selected.contains(&b) as usize,
            1
        );
        assert_eq!(solution.selected.len(), 2);
    }

    const RECURSIVE_SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="Item" type="ItemType"/>
  <xs:complexType name="ItemType">
    <xs:sequence>
      <xs:element name="SubItem" type="ItemType" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    #[test]
    fn test_recursion_satisfiable_full_selection() {
        let e = enumeration(RECURSIVE_SCHEMA, 3);
        let solution = SmtGenerator::new(3, 10_000).solve(&e).unwrap();

        // No exclusions: the optimizer selects the whole unfolded chain
        assert_eq!(solution.coverage, 1.0);
        assert!(solution
            .selected
            .contains(&SchemaPath::parse("/Item/SubItem/SubItem").unwrap()));
    }

    #[test]
    fn test_model_satisfies_hard_clauses() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="R" type="RType"/>
  <xs:complexType name="RType">
    <xs:sequence>
      <xs:element name="Must" type="xs:string"/>
      <xs:element name="May" type="xs:string" minOccurs="0"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:string" use="required"/>
  </xs:complexType>
</xs:schema>"#;
        let e = enumeration(schema, 10);
        let solution = SmtGenerator::new(10, 10_000).solve(&e).unwrap();

        // Hierarchy: every selected path's parent is selected
        for path in &solution.selected {
            if let Some(parent) = e.constraints.parent_of.get(path) {
                assert!(solution.selected.contains(parent));
            }
        }
        // Required: parent selected implies required child selected
        for (parent, child) in &e.constraints.required {
            if solution.selected.contains(parent) {
                assert!(solution.selected.contains(child), "missing {}", child);
            }
        }
        // Root presence
        assert!(solution.selected.contains(&SchemaPath::root("R")));
        // Objective: nothing conflicts, so everything is selected
        assert_eq!(solution.coverage, 1.0);
    }

    #[test]
    fn test_empty_schema_ground_set() {
        let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="R" type="RType"/>
  <xs:complexType name="RType"/>
</xs:schema>"#;
        let e = enumeration(schema, 10);
        let solution = SmtGenerator::new(10, 10_000).solve(&e).unwrap();
        assert_eq!(solution.selected.len(), 1);
        assert_eq!(solution.coverage, 1.0);
    }
}
