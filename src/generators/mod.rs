//! Coverage-optimizing XML generation
//!
//! Three strategies share one pipeline: greedy set-cover over enumerated
//! snippets, boolean maximization over the path constraints, and pairwise
//! covering arrays over the schema's optional items. All three hand their
//! selections to the same schema-aware materializer.

pub mod greedy;
pub mod materializer;
pub mod pairwise;
pub mod sat;
pub mod smt;
pub mod values;

pub use greedy::{GreedySelection, SetCoverOptimizer, Snippet, SnippetGenerator};
pub use materializer::{InclusionPolicy, Materialized, Materializer, SelectedPaths, SnippetPolicy};
pub use pairwise::{
    extract_optional_items, CoveringArray, OptionalItem, OptionalKind, PairwiseGenerator,
    PatternPolicy, TestPattern,
};
pub use smt::{PathVariableMap, SmtEncoder, SmtGenerator, SmtSolution};
pub use values::ValueGenerator;
