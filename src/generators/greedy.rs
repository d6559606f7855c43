//! Greedy snippet generation and set-cover optimization
//!
//! Enumerates a bounded family of candidate documents (by target depth,
//! optional-item inclusion, and choice rotation), then repeatedly picks
//! the candidate covering the most still-uncovered paths. Selection is a
//! pure function of the candidate list and the uncovered set; the loop
//! only applies its result.

use std::collections::BTreeSet;

use log::debug;

use super::materializer::{Materializer, SnippetPolicy};
use crate::documents::Document;
use crate::paths::{GroundSet, SchemaPath};
use crate::schema::SchemaModel;

/// Snippet variants generated per (root, depth): all-optional and
/// required-only with the first choice branch, then two choice rotations
const VARIANTS: [(bool, usize); 4] = [(true, 0), (false, 0), (true, 1), (true, 2)];

/// A candidate document with the paths it covers
#[derive(Debug, Clone)]
pub struct Snippet {
    /// Stable candidate id (generation order)
    pub id: usize,
    /// The candidate document
    pub document: Document,
    /// Paths the document covers
    pub covered: BTreeSet<SchemaPath>,
    /// Depth frontier this candidate was generated with
    pub target_depth: usize,
}

/// Generates the candidate snippet family for a schema
pub struct SnippetGenerator<'a> {
    materializer: Materializer<'a>,
    model: &'a SchemaModel,
    max_gen_depth: usize,
}

impl<'a> SnippetGenerator<'a> {
    /// Create a generator producing candidates up to a depth frontier
    pub fn new(model: &'a SchemaModel, materializer: Materializer<'a>, max_gen_depth: usize) -> Self {
        Self {
            materializer,
            model,
            max_gen_depth,
        }
    }

    /// Produce all candidate snippets
    pub fn generate(&self) -> Vec<Snippet> {
        let mut snippets = Vec::new();

        for root in &self.model.roots {
            for target_depth in 0..=self.max_gen_depth {
                for (include_optional, choice_index) in VARIANTS {
                    let policy = SnippetPolicy {
                        target_depth,
                        include_optional,
                        choice_index,
                    };
                    let out = self.materializer.materialize(root, &policy);
                    snippets.push(Snippet {
                        id: snippets.len(),
                        document: out.document.clone(),
                        covered: out.covered(),
                        target_depth,
                    });
                }
            }
        }

        debug!("Generated {} candidate snippets", snippets.len());
        snippets
    }
}

/// Pick the snippet with the highest new-coverage count. Ties break by
/// fewest total covered paths (smaller output), then by lowest id.
pub fn select_best<'s>(
    snippets: &'s [Snippet],
    uncovered: &BTreeSet<SchemaPath>,
) -> Option<&'s Snippet> {
    let mut best: Option<(&Snippet, usize)> = None;

    for snippet in snippets {
        let gain = snippet.covered.intersection(uncovered).count();
        if gain == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((chosen, best_gain)) => {
                gain > best_gain
                    || (gain == best_gain && snippet.covered.len() < chosen.covered.len())
            }
        };
        if better {
            best = Some((snippet, gain));
        }
    }

    best.map(|(snippet, _)| snippet)
}

/// Result of a set-cover run
#[derive(Debug, Clone)]
pub struct GreedySelection {
    /// Selected snippets in selection order
    pub selected: Vec<Snippet>,
    /// Union of ground-set paths the selection covers
    pub covered: BTreeSet<SchemaPath>,
    /// Achieved coverage fraction over the ground set
    pub coverage: f64,
}

/// Greedy set-cover over the candidate snippets
pub struct SetCoverOptimizer {
    /// Stop once this coverage fraction is reached
    pub target_coverage: f64,
    /// Never select more than this many snippets
    pub max_files: usize,
}

impl SetCoverOptimizer {
    /// Create an optimizer with a coverage target and file budget
    pub fn new(target_coverage: f64, max_files: usize) -> Self {
        Self {
            target_coverage,
            max_files,
        }
    }

    /// Run the selection loop until target coverage, the file budget, or
    /// zero gain. Running out of useful candidates is an outcome, not an
    /// error.
    pub fn solve(&self, universe: &GroundSet, snippets: &[Snippet]) -> GreedySelection {
        let total = universe.len();
        let mut uncovered: BTreeSet<SchemaPath> = universe.iter().cloned().collect();
        let mut covered: BTreeSet<SchemaPath> = BTreeSet::new();
        let mut selected = Vec::new();

        while !uncovered.is_empty() && selected.len() < self.max_files {
            let coverage = fraction(total - uncovered.len(), total);
            if coverage >= self.target_coverage {
                break;
            }

            let best = match select_best(snippets, &uncovered) {
                Some(s) => s,
                None => break,
            };

            let newly: Vec<SchemaPath> =
                best.covered.intersection(&uncovered).cloned().collect();
            debug!(
                "Selected snippet {} (depth {}): +{} paths",
                best.id,
                best.target_depth,
                newly.len()
            );
            for path in newly {
                uncovered.remove(&path);
                covered.insert(path);
            }
            selected.push(best.clone());
        }

        let coverage = fraction(total - uncovered.len(), total);
        GreedySelection {
            selected,
            covered,
            coverage,
        }
    }
}

fn fraction(part: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::enumerate_paths;

    fn model(xsd: &str) -> SchemaModel {
        SchemaModel::from_string(xsd).unwrap()
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
    fn test_choice_covered_by_two_files() {
        let m = model(CHOICE_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();
        assert_eq!(e.ground.len(), 3);

        let gen = SnippetGenerator::new(&m, Materializer::new(&m), 1);
        let snippets = gen.generate();

        let optimizer = SetCoverOptimizer::new(1.0, 10);
        let result = optimizer.solve(&e.ground, &snippets);

        assert_eq!(result.coverage, 1.0);
        assert_eq!(result.selected.len(), 2);
    }

    #[test]
    fn test_max_files_respected() {
        let m = model(CHOICE_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();
        let gen = SnippetGenerator::new(&m, Materializer::new(&m), 1);
        let snippets = gen.generate();

        let optimizer = SetCoverOptimizer::new(1.0, 1);
        let result = optimizer.solve(&e.ground, &snippets);

        assert_eq!(result.selected.len(), 1);
        assert!(result.coverage < 1.0);
    }

    #[test]
    fn test_selection_is_maximal_each_step() {
        let m = model(CHOICE_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();
        let gen = SnippetGenerator::new(&m, Materializer::new(&m), 1);
        let snippets = gen.generate();

        let uncovered: BTreeSet<SchemaPath> = e.ground.iter().cloned().collect();
        let best = select_best(&snippets, &uncovered).unwrap();
        let best_gain = best.covered.intersection(&uncovered).count();

        for s in &snippets {
            assert!(s.covered.intersection(&uncovered).count() <= best_gain);
        }
    }

    #[test]
    fn test_tie_breaks_prefer_smaller_snippet() {
        let m = model(CHOICE_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();
        let gen = SnippetGenerator::new(&m, Materializer::new(&m), 1);
        let snippets = gen.generate();

        // After covering /C and /C/A, only /C/B remains; the winner must be
        // a minimal snippet among those containing it (lowest id on ties)
        let uncovered: BTreeSet<SchemaPath> =
            [SchemaPath::root("C").child("B")].into_iter().collect();
        let best = select_best(&snippets, &uncovered).unwrap();
        assert!(best.covered.contains(&SchemaPath::root("C").child("B")));
        for s in &snippets {
            if s.covered.contains(&SchemaPath::root("C").child("B")) {
                assert!(best.covered.len() <= s.covered.len());
            }
        }
    }

    #[test]
    fn test_zero_gain_terminates() {
        let m = model(CHOICE_SCHEMA);
        let gen = SnippetGenerator::new(&m, Materializer::new(&m), 1);
        let snippets = gen.generate();

        // A universe disjoint from anything the snippets cover
        let mut universe = GroundSet::new();
        universe.elements.insert(SchemaPath::root("Unrelated"));

        let optimizer = SetCoverOptimizer::new(1.0, 10);
        let result = optimizer.solve(&universe, &snippets);
        assert!(result.selected.is_empty());
        assert_eq!(result.coverage, 0.0);
    }

    #[test]
    fn test_deterministic_selection() {
        let m = model(CHOICE_SCHEMA);
        let e = enumerate_paths(&m, 10).unwrap();
        let gen = SnippetGenerator::new(&m, Materializer::new(&m), 1);
        let snippets = gen.generate();

        let optimizer = SetCoverOptimizer::new(1.0, 10);
        let a = optimizer.solve(&e.ground, &snippets);
        let b = optimizer.solve(&e.ground, &snippets);

        let ids_a: Vec<usize> = a.selected.iter().map(|s| s.id).collect();
        let ids_b: Vec<usize> = b.selected.iter().map(|s| s.id).collect();
        assert_eq!(ids_a, ids_b);
    }
}
