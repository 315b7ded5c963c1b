//! The constraint model and the search that solves it.
//!
//! Split the way the spec names them: [`builder`] turns normalized
//! activities and nurse constraints into variable domains and derived
//! constraint data; [`solver`] walks that data with a branch-and-bound
//! search bounded by a wall-clock budget.

pub mod builder;
pub mod solver;

use std::time::Duration;

pub use builder::{ActivityVar, CpModel, ModelBuilder};
pub use solver::{SolveStatus, Solution, SolverDriver};

pub const DEFAULT_BUDGET_SECS: u64 = 15;
pub const MAX_BUDGET_SECS: u64 = 60;

/// Knobs shared by the Model Builder and the Solver Driver (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub budget: Duration,
    /// Frees non-fixed, non-alert activities' presence booleans (§4.4).
    pub relax_optional: bool,
    /// Fixes tie-breaking order for reproducible replay (§9).
    pub seed: Option<u64>,
    /// `(predecessor_id, successor_id)` pairs (§4.4 constraint 5).
    pub precedence: Vec<(String, String)>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(DEFAULT_BUDGET_SECS),
            relax_optional: false,
            seed: None,
            precedence: Vec::new(),
        }
    }
}

impl SolverConfig {
    /// Clamps an over-long budget to the documented maximum (§4.5).
    pub fn clamp_budget(mut self) -> Self {
        let max = Duration::from_secs(MAX_BUDGET_SECS);
        if self.budget > max {
            tracing::warn!(
                requested_secs = self.budget.as_secs(),
                max_secs = MAX_BUDGET_SECS,
                "solver budget exceeds maximum; clamping"
            );
            self.budget = max;
        }
        self
    }
}
