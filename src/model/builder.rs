//! Builds the CP variable set the solver walks.
//!
//! There is no separate constraint-graph object here: `NoOverlap` is
//! enforced structurally by the search (it only ever places an interval
//! into a free gap on the timeline), and the remaining constraints
//! (deadlines, fixed-time, travel sequencing, precedence) are checked as
//! placement guards during that search (see `model::solver`). This module's
//! job is to turn normalized activities and nurse constraints into the
//! domains, weights, and derived constraint inputs the driver consumes.

use std::collections::HashMap;

use crate::activity::{Activity, BlockedInterval, LunchConfig, ShiftWindow, TravelMatrix};
use crate::oracle::{ObjectiveWeights, ParameterOracle};
use crate::time::Minute;

use super::SolverConfig;

/// One activity's derived placement domain and droppability.
#[derive(Debug, Clone)]
pub struct ActivityVar {
    pub activity: Activity,
    /// Inclusive `[lo, hi]` domain for `start`; `lo > hi` means no feasible
    /// start exists (e.g. a flexible activity longer than the shift).
    pub start_domain: (Minute, Minute),
    /// `true` only when `relax_optional` is set and the activity is neither
    /// fixed-start nor an alert/vital-alert kind (§4.4).
    pub droppable: bool,
}

#[derive(Debug, Clone)]
pub struct CpModel {
    pub shift: ShiftWindow,
    pub activity_vars: Vec<ActivityVar>,
    pub lunch_domain: (Minute, Minute),
    pub lunch_duration: Minute,
    pub lunch_preferred_start: Minute,
    pub blocks: Vec<BlockedInterval>,
    pub travel: Option<TravelMatrix>,
    /// Index pairs into `activity_vars`: `(predecessor, successor)`.
    pub precedence: Vec<(usize, usize)>,
    pub weights: ObjectiveWeights,
    pub high_priority_threshold: i32,
}

pub struct ModelBuilder;

impl ModelBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        activities: &[Activity],
        shift: ShiftWindow,
        lunch: LunchConfig,
        blocks: &[BlockedInterval],
        travel: Option<&TravelMatrix>,
        oracle: &dyn ParameterOracle,
        config: &SolverConfig,
    ) -> CpModel {
        let activity_vars = activities
            .iter()
            .map(|activity| {
                let start_domain = match activity.fixed_start {
                    Some(fixed) => (fixed, fixed),
                    None => (shift.shift_start, shift.shift_end - activity.duration),
                };
                let droppable = config.relax_optional
                    && activity.fixed_start.is_none()
                    && !activity.kind.is_alert();
                ActivityVar {
                    activity: activity.clone(),
                    start_domain,
                    droppable,
                }
            })
            .collect();

        let id_index: HashMap<&str, usize> = activities
            .iter()
            .enumerate()
            .map(|(idx, activity)| (activity.id.as_str(), idx))
            .collect();

        let precedence = config
            .precedence
            .iter()
            .filter_map(|(pred, succ)| {
                let pred_idx = id_index.get(pred.as_str())?;
                let succ_idx = id_index.get(succ.as_str())?;
                Some((*pred_idx, *succ_idx))
            })
            .collect();

        CpModel {
            shift,
            activity_vars,
            lunch_domain: (shift.shift_start, shift.shift_end - lunch.duration),
            lunch_duration: lunch.duration,
            lunch_preferred_start: lunch.preferred_start,
            blocks: blocks.to_vec(),
            travel: travel.cloned(),
            precedence,
            weights: oracle.objective_weights(),
            high_priority_threshold: oracle.high_priority_threshold(),
        }
    }
}
