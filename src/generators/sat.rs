//! Boolean constraint optimization
//!
//! A self-contained maximization solver for the path-selection encoding:
//! unit-propagating DPLL search with true-first branching in ascending
//! variable order, branch-and-bound pruning against the best model found,
//! and a millisecond deadline. The search is fully deterministic for a
//! given clause set.

use std::time::{Duration, Instant};

/// Boolean variable index
pub type Var = u32;

/// A literal: a variable with a polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lit {
    /// Variable index
    pub var: Var,
    /// True for the positive literal
    pub positive: bool,
}

impl Lit {
    /// Positive literal
    pub fn pos(var: Var) -> Self {
        Self {
            var,
            positive: true,
        }
    }

    /// Negative literal
    pub fn neg(var: Var) -> Self {
        Self {
            var,
            positive: false,
        }
    }
}

/// A disjunction of literals
#[derive(Debug, Clone)]
pub struct Clause {
    /// Literals of the disjunction
    pub literals: Vec<Lit>,
}

impl Clause {
    /// Create a clause from literals
    pub fn new(literals: Vec<Lit>) -> Self {
        Self { literals }
    }
}

/// A complete assignment satisfying the clause set
#[derive(Debug, Clone)]
pub struct Model {
    assignment: Vec<bool>,
}

impl Model {
    /// Value of a variable in the model
    pub fn is_true(&self, var: Var) -> bool {
        self.assignment[var as usize]
    }

    /// Number of true variables (the maximized objective)
    pub fn true_count(&self) -> usize {
        self.assignment.iter().filter(|v| **v).count()
    }
}

/// Outcome of a solver run
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    /// A model was found (the best known when the deadline expired)
    Sat(Model),
    /// The clause set is contradictory
    Unsat,
    /// Deadline expired before any model was found
    Unknown,
}

/// Maximizes the number of true variables subject to hard clauses
pub struct MaxSatSolver {
    num_vars: usize,
    clauses: Vec<Clause>,
    timeout: Duration,
}

impl MaxSatSolver {
    /// Create a solver over a fixed variable count
    pub fn new(num_vars: usize) -> Self {
        Self {
            num_vars,
            clauses: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the search deadline
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Add a hard clause
    pub fn add_clause(&mut self, literals: Vec<Lit>) {
        self.clauses.push(Clause::new(literals));
    }

    /// Number of clauses added so far
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    /// Run the search
    pub fn solve(&self) -> SolveOutcome {
        let mut search = Search {
            clauses: &self.clauses,
            assignment: vec![None; self.num_vars],
            trail: Vec::new(),
            best: None,
            deadline: Instant::now() + self.timeout,
            timed_out: false,
        };

        // Top-level propagation failing means the hard clauses conflict
        let mark = search.trail.len();
        if !search.propagate() {
            return SolveOutcome::Unsat;
        }
        search.undo_to(mark);

        search.dfs();

        match search.best {
            Some(model) => SolveOutcome::Sat(model),
            None if search.timed_out => SolveOutcome::Unknown,
            None => SolveOutcome::Unsat,
        }
    }
}

struct Search<'a> {
    clauses: &'a [Clause],
    assignment: Vec<Option<bool>>,
    trail: Vec<Var>,
    best: Option<Model>,
    deadline: Instant,
    timed_out: bool,
}

impl<'a> Search<'a> {
    fn assign(&mut self, var: Var, value: bool) {
        self.assignment[var as usize] = Some(value);
        self.trail.push(var);
    }

    fn undo_to(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(var) = self.trail.pop() {
                self.assignment[var as usize] = None;
            }
        }
    }

    /// Scan clauses to fixpoint, assigning forced literals.
    /// Returns false on conflict.
    fn propagate(&mut self) -> bool {
        loop {
            let mut changed = false;
            for clause in self.clauses {
                let mut satisfied = false;
                let mut unassigned: Option<Lit> = None;
                let mut unassigned_count = 0;

                for lit in &clause.literals {
                    match self.assignment[lit.var as usize] {
                        Some(value) => {
                            if value == lit.positive {
                                satisfied = true;
                                break;
                            }
                        }
                        None => {
                            unassigned_count += 1;
                            unassigned = Some(*lit);
                        }
                    }
                }

                if satisfied {
                    continue;
                }
                match (unassigned_count, unassigned) {
                    (0, _) => return false,
                    (1, Some(lit)) => {
                        self.assign(lit.var, lit.positive);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                return true;
            }
        }
    }

    fn true_count(&self) -> usize {
        self.assignment.iter().filter(|v| **v == Some(true)).count()
    }

    fn unassigned_count(&self) -> usize {
        self.assignment.iter().filter(|v| v.is_none()).count()
    }

    fn first_unassigned(&self) -> Option<Var> {
        self.assignment
            .iter()
            .position(|v| v.is_none())
            .map(|i| i as Var)
    }

    fn record_model(&mut self) {
        let count = self.true_count();
        let improves = match &self.best {
            Some(model) => count > model.true_count(),
            None => true,
        };
        if improves {
            self.best = Some(Model {
                assignment: self
                    .assignment
                    .iter()
                    .map(|v| v.unwrap_or(false))
                    .collect(),
            });
        }
    }

    fn optimum_reached(&self) -> bool {
        match &self.best {
            Some(model) => model.true_count() == self.assignment.len(),
            None => false,
        }
    }

    fn dfs(&mut self) {
        if self.timed_out || self.optimum_reached() {
            return;
        }
        if Instant::now() >= self.deadline {
            self.timed_out = true;
            return;
        }

        let mark = self.trail.len();
        if !self.propagate() {
            self.undo_to(mark);
            return;
        }

        let var = match self.first_unassigned() {
            Some(v) => v,
            None => {
                self.record_model();
                self.undo_to(mark);
                return;
            }
        };

        // Cannot beat the best model even if everything left goes true
        if let Some(best) = &self.best {
            if self.true_count() + self.unassigned_count() <= best.true_count() {
                self.undo_to(mark);
                return;
            }
        }

        for value in [true, false] {
            let decision_mark = self.trail.len();
            self.assign(var, value);
            self.dfs();
            self.undo_to(decision_mark);
            if self.timed_out || self.optimum_reached() {
                break;
            }
        }

        self.undo_to(mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconstrained_maximization() {
        let solver = MaxSatSolver::new(3);
        match solver.solve() {
            SolveOutcome::Sat(model) => assert_eq!(model.true_count(), 3),
            other => panic!("expected sat, got {:?}", other),
        }
    }

    #[test]
    fn test_implication_chain() {
        let mut solver = MaxSatSolver::new(3);
        // 2 -> 1, 1 -> 0
        solver.add_clause(vec![Lit::neg(2), Lit::pos(1)]);
        solver.add_clause(vec![Lit::neg(1), Lit::pos(0)]);
        match solver.solve() {
            SolveOutcome::Sat(model) => {
                assert_eq!(model.true_count(), 3);
                assert!(model.is_true(0) && model.is_true(1) && model.is_true(2));
            }
            other => panic!("expected sat, got {:?}", other),
        }
    }

    #[test]
    fn test_exclusion_limits_objective() {
        let mut solver = MaxSatSolver::new(3);
        // At most one of {1, 2}
        solver.add_clause(vec![Lit::neg(1), Lit::neg(2)]);
        match solver.solve() {
            SolveOutcome::Sat(model) => {
                assert_eq!(model.true_count(), 2);
                assert!(!(model.is_true(1) && model.is_true(2)));
            }
            other => panic!("expected sat, got {:?}", other),
        }
    }

    #[test]
    fn test_unsat() {
        let mut solver = MaxSatSolver::new(1);
        solver.add_clause(vec![Lit::pos(0)]);
        solver.add_clause(vec![Lit::neg(0)]);
        assert!(matches!(solver.solve(), SolveOutcome::Unsat));
    }

    #[test]
    fn test_unit_clauses_respected() {
        let mut solver = MaxSatSolver::new(3);
        solver.add_clause(vec![Lit::neg(1)]);
        match solver.solve() {
            SolveOutcome::Sat(model) => {
                assert!(!model.is_true(1));
                assert_eq!(model.true_count(), 2);
            }
            other => panic!("expected sat, got {:?}", other),
        }
    }

    #[test]
    fn test_model_satisfies_all_clauses() {
        let mut solver = MaxSatSolver::new(5);
        solver.add_clause(vec![Lit::neg(4), Lit::pos(3)]);
        solver.add_clause(vec![Lit::neg(3), Lit::pos(0)]);
        solver.add_clause(vec![Lit::neg(1), Lit::neg(2)]);
        solver.add_clause(vec![Lit::neg(0), Lit::pos(1), Lit::pos(2)]);
        let clauses = vec![
            vec![Lit::neg(4), Lit::pos(3)],
            vec![Lit::neg(3), Lit::pos(0)],
            vec![Lit::neg(1), Lit::neg(2)],
            vec![Lit::neg(0), Lit::pos(1), Lit::pos(2)],
        ];

        match solver.solve() {
            SolveOutcome::Sat(model) => {
                for clause in clauses {
                    assert!(
                        clause.iter().any(|l| model.is_true(l.var) == l.positive),
                        "clause violated"
                    );
                }
            }
            other => panic!("expected sat, got {:?}", other),
        }
    }

    #[test]
    fn test_determinism() {
        let build = || {
            let mut solver = MaxSatSolver::new(4);
            solver.add_clause(vec![Lit::neg(1), Lit::neg(2)]);
            solver.add_clause(vec![Lit::neg(3), Lit::pos(0)]);
            solver
        };
        let a = match build().solve() {
            SolveOutcome::Sat(m) => m.assignment,
            _ => panic!(),
        };
        let b = match build().solve() {
            SolveOutcome::Sat(m) => m.assignment,
            _ => panic!(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_variables() {
        let solver = MaxSatSolver::new(0);
        match solver.solve() {
            SolveOutcome::Sat(model) => assert_eq!(model.true_count(), 0),
            other => panic!("expected sat, got {:?}", other),
        }
    }
}
