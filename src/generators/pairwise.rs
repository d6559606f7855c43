//! Optional-item extraction and pairwise covering arrays
//!
//! Lists the free dimensions of a schema (minOccurs=0 elements,
//! use=optional attributes, choice branches) and builds a 2-way covering
//! array over them by greedy selection from seeded random candidates.
//! Choice exclusivity is not modeled combinatorially; the materializer
//! enforces it when a pattern is turned into XML.

use std::collections::BTreeMap;

use log::debug;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use super::materializer::InclusionPolicy;
use crate::enumerator::Enumeration;
use crate::paths::SchemaPath;

/// Above this many optional items the list is truncated
pub const OPTIONAL_SOFT_CAP: usize = 1000;

/// How many items survive truncation (shallower items are more impactful)
pub const OPTIONAL_TOP_K: usize = 300;

/// Candidate assignments sampled per greedy round
const CANDIDATES_PER_ROUND: usize = 100;

/// What kind of schema construct an optional item is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalKind {
    /// Element with minOccurs=0
    Element,
    /// Attribute with use="optional"
    Attribute,
    /// One branch of a choice group
    ChoiceBranch,
}

/// A free presence/absence dimension of the schema
#[derive(Debug, Clone)]
pub struct OptionalItem {
    /// Path of the construct
    pub path: SchemaPath,
    /// Construct kind
    pub kind: OptionalKind,
}

/// List the optional items of an enumeration, ordered by ascending depth
/// (ties lexicographic), truncated past the soft cap
pub fn extract_optional_items(enumeration: &Enumeration) -> Vec<OptionalItem> {
    let mut by_path: BTreeMap<SchemaPath, OptionalKind> = BTreeMap::new();

    for (_, branches) in &enumeration.constraints.choice_groups {
        for branch in branches {
            by_path.insert(branch.clone(), OptionalKind::ChoiceBranch);
        }
    }
    for path in &enumeration.optional_elements {
        by_path.entry(path.clone()).or_insert(OptionalKind::Element);
    }
    for path in &enumeration.optional_attributes {
        by_path
            .entry(path.clone())
            .or_insert(OptionalKind::Attribute);
    }

    let mut items: Vec<OptionalItem> = by_path
        .into_iter()
        .map(|(path, kind)| OptionalItem { path, kind })
        .collect();

    items.sort_by(|a, b| {
        a.path
            .depth()
            .cmp(&b.path.depth())
            .then_with(|| a.path.cmp(&b.path))
    });

    if items.len() > OPTIONAL_SOFT_CAP {
        debug!(
            "Truncating {} optional items to the {} shallowest",
            items.len(),
            OPTIONAL_TOP_K
        );
        items.truncate(OPTIONAL_TOP_K);
    }

    items
}

/// A truth assignment over the optional items (one generated document)
#[derive(Debug, Clone)]
pub struct TestPattern {
    /// Pattern number in generation order
    pub id: usize,
    /// Presence assignment per optional path
    pub assignments: BTreeMap<SchemaPath, bool>,
}

impl TestPattern {
    /// Assignment for a path; absent paths default to false
    pub fn get(&self, path: &SchemaPath) -> bool {
        self.assignments.get(path).copied().unwrap_or(false)
    }
}

/// A covering array plus its residual pair accounting
#[derive(Debug, Clone)]
pub struct CoveringArray {
    /// The optional items the array ranges over
    pub items: Vec<OptionalItem>,
    /// Selected test patterns
    pub patterns: Vec<TestPattern>,
    /// Fraction of value pairs covered
    pub coverage: f64,
    /// Pairs left uncovered when the loop stopped
    pub uncovered_pairs: usize,
    /// Total pairs: C(n,2) * 4
    pub total_pairs: usize,
}

/// Greedy pairwise covering-array construction with candidate sampling
pub struct PairwiseGenerator {
    /// Hard cap on the number of patterns
    pub max_patterns: usize,
    /// RNG seed for reproducible candidate sampling
    pub seed: u64,
}

impl PairwiseGenerator {
    /// Create a generator with a pattern budget and RNG seed
    pub fn new(max_patterns: usize, seed: u64) -> Self {
        Self { max_patterns, seed }
    }

    /// Build the covering array over the given optional items
    pub fn generate(&self, items: &[OptionalItem]) -> CoveringArray {
        let n = items.len();

        // No free dimensions: the single all-required baseline document
        if n == 0 {
            return CoveringArray {
                items: Vec::new(),
                patterns: vec![TestPattern {
                    id: 0,
                    assignments: BTreeMap::new(),
                }],
                coverage: 1.0,
                uncovered_pairs: 0,
                total_pairs: 0,
            };
        }

        let pairs = PairTable::new(n);
        if pairs.total == 0 {
            // One item has no pairs; exercise it present once
            let assignments = items.iter().map(|i| (i.path.clone(), true)).collect();
            return CoveringArray {
                items: items.to_vec(),
                patterns: vec![TestPattern { id: 0, assignments }],
                coverage: 1.0,
                uncovered_pairs: 0,
                total_pairs: 0,
            };
        }

        let mut uncovered = vec![true; pairs.total];
        let mut uncovered_count = pairs.total;
        let mut patterns: Vec<TestPattern> = Vec::new();
        let mut rng = XorShiftRng::from_seed(seed_bytes(self.seed));

        while uncovered_count > 0 && patterns.len() < self.max_patterns {
            let mut best: Option<Vec<bool>> = None;
            let mut best_gain = 0usize;

            for _ in 0..CANDIDATES_PER_ROUND {
                let candidate: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.5)).collect();
                let gain = pairs.gain(&candidate, &uncovered);
                if gain > best_gain {
                    best_gain = gain;
                    best = Some(candidate);
                }
            }

            let best = match best {
                Some(b) if best_gain > 0 => b,
                _ => break,
            };

            uncovered_count -= pairs.mark_covered(&best, &mut uncovered);
            let assignments = items
                .iter()
                .zip(best.iter())
                .map(|(item, value)| (item.path.clone(), *value))
                .collect();
            patterns.push(TestPattern {
                id: patterns.len(),
                assignments,
            });

            debug!(
                "Pattern {}: +{} pairs, {} uncovered",
                patterns.len() - 1,
                best_gain,
                uncovered_count
            );
        }

        CoveringArray {
            items: items.to_vec(),
            patterns,
            coverage: 1.0 - uncovered_count as f64 / pairs.total as f64,
            uncovered_pairs: uncovered_count,
            total_pairs: pairs.total,
        }
    }
}

/// Index arithmetic over the (i, j, v_i, v_j) pair universe
struct PairTable {
    n: usize,
    total: usize,
}

impl PairTable {
    fn new(n: usize) -> Self {
        let combos = n * n.saturating_sub(1) / 2;
        Self {
            n,
            total: combos * 4,
        }
    }

    /// Flat index of the pair (i < j) with values (vi, vj)
    fn index(&self, i: usize, j: usize, vi: bool, vj: bool) -> usize {
        let rank = i * (2 * self.n - i - 1) / 2 + (j - i - 1);
        rank * 4 + (vi as usize) * 2 + (vj as usize)
    }

    /// How many still-uncovered pairs an assignment satisfies
    fn gain(&self, assignment: &[bool], uncovered: &[bool]) -> usize {
        let mut gain = 0;
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                if uncovered[self.index(i, j, assignment[i], assignment[j])] {
                    gain += 1;
                }
            }
        }
        gain
    }

    /// Mark an assignment's pairs covered; returns how many were new
    fn mark_covered(&self, assignment: &[bool], uncovered: &mut [bool]) -> usize {
        let mut newly = 0;
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                let idx = self.index(i, j, assignment[i], assignment[j]);
                if uncovered[idx] {
                    uncovered[idx] = false;
                    newly += 1;
                }
            }
        }
        newly
    }
}

fn seed_bytes(seed: u64) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).to_le_bytes());
    bytes
}

/// Inclusion policy realizing one test pattern. Items truncated out of
/// the pattern count as included, so sampled patterns on large schemas
/// still produce full documents; choice branches absent from the pattern
/// fall back to the materializer's first-branch rule.
pub struct PatternPolicy<'a> {
    pattern: &'a TestPattern,
    max_depth: usize,
}

impl<'a> PatternPolicy<'a> {
    /// Create a policy for one pattern under a depth bound
    pub fn new(pattern: &'a TestPattern, max_depth: usize) -> Self {
        Self { pattern, max_depth }
    }
}

impl InclusionPolicy for PatternPolicy<'_> {
    fn include_optional(&self, path: &SchemaPath) -> bool {
        self.pattern.assignments.get(path).copied().unwrap_or(true)
    }

    fn choice_branch(&self, branches: &[SchemaPath]) -> usize {
        branches
            .iter()
            .position(|b| self.pattern.assignments.get(b) == Some(&true))
            .unwrap_or(0)
    }

    fn descend(&self, depth: usize) -> bool {
        depth < self.max_depth
    }
}
