//! Reads the solver's incumbent back into a human-facing schedule: sorted
//! entries, the unachievable list, the optimization score, and warnings
//! (§4.6). On solver failure every normalized activity — fixed-start
//! survivors included — flows to `unachievableItems` per §4.5/§7.

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityKind, BlockedInterval, UnachievableItem, UnachievableReason};
use crate::model::builder::CpModel;
use crate::model::solver::{SolveStatus, Solution};
use crate::time::{format_time, Minute};

/// Activities finishing within this many minutes of their deadline earn a
/// "close to deadline" warning (§4.6).
const DEADLINE_PROXIMITY_WARNING_MINUTES: Minute = 5;

/// Lunch starts deviating from the preferred time by more than this earn a
/// warning (§4.6).
const LUNCH_DEVIATION_WARNING_MINUTES: Minute = 15;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub slot_start_time: String,
    pub slot_end_time: String,
    pub activity_type: String,
    pub title: String,
    #[serde(default)]
    pub details: Option<String>,
    pub related_item_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectedResult {
    pub schedule: Vec<ScheduleEntry>,
    pub unachievable: Vec<UnachievableItem>,
    pub score: f64,
    pub warnings: Vec<String>,
}

/// Projects a solved model. `prefilter_rejects` are items the Normalizer's
/// pre-solve pass already dropped (§4.3/§7); they are always reported
/// unachievable regardless of solver outcome.
pub fn project(
    model: &CpModel,
    solution: &Solution,
    prefilter_rejects: &[UnachievableItem],
) -> ProjectedResult {
    let mut unachievable = prefilter_rejects.to_vec();

    if matches!(solution.status, SolveStatus::Infeasible | SolveStatus::Unknown) {
        let reason = if solution.status == SolveStatus::Unknown {
            UnachievableReason::TimeoutNoSolution
        } else {
            UnachievableReason::Infeasible
        };
        for var in &model.activity_vars {
            unachievable.push(UnachievableItem {
                item_id: var.activity.id.clone(),
                item_type: var.activity.kind.as_tag().to_string(),
                reason,
            });
        }
        return ProjectedResult {
            schedule: Vec::new(),
            unachievable,
            score: 0.0,
            warnings: vec![infeasibility_warning(solution.status)],
        };
    }

    let mut schedule = Vec::with_capacity(model.activity_vars.len() + model.blocks.len() + 1);
    let mut warnings = Vec::new();

    for &(idx, start) in &solution.placements {
        let var = &model.activity_vars[idx];
        let activity = &var.activity;
        let end = start + activity.duration;

        if let Some(deadline) = activity.deadline {
            if deadline - end <= DEADLINE_PROXIMITY_WARNING_MINUTES {
                warnings.push(format!(
                    "Activity {} finishes close to its deadline.",
                    activity.id
                ));
            }
        }

        schedule.push(ScheduleEntry {
            slot_start_time: format_time(start),
            slot_end_time: format_time(end),
            activity_type: activity.kind.as_tag().to_string(),
            title: activity.title.clone(),
            details: activity.details.clone(),
            related_item_id: activity.id.clone(),
        });
    }

    for &idx in &solution.dropped {
        let activity = &model.activity_vars[idx].activity;
        unachievable.push(UnachievableItem {
            item_id: activity.id.clone(),
            item_type: activity.kind.as_tag().to_string(),
            reason: UnachievableReason::Infeasible,
        });
    }

    schedule.push(lunch_entry(solution.lunch_start, model.lunch_duration));
    if (solution.lunch_start - model.lunch_preferred_start).abs() > LUNCH_DEVIATION_WARNING_MINUTES
    {
        warnings.push("Lunch break scheduled more than 15 minutes from preferred time.".to_string());
    }

    for (index, block) in model.blocks.iter().enumerate() {
        schedule.push(block_entry(index, block));
    }

    schedule.sort_by_key(|entry| entry.slot_start_time.clone());

    if solution.status == SolveStatus::Feasible {
        warnings.push("Time limit reached; schedule may be suboptimal.".to_string());
    }

    ProjectedResult {
        schedule,
        unachievable,
        score: solution.objective,
        warnings,
    }
}

fn lunch_entry(start: Minute, duration: Minute) -> ScheduleEntry {
    ScheduleEntry {
        slot_start_time: format_time(start),
        slot_end_time: format_time(start + duration),
        activity_type: ActivityKind::Break.as_tag().to_string(),
        title: "Lunch".to_string(),
        details: None,
        related_item_id: "LUNCH".to_string(),
    }
}

fn block_entry(index: usize, block: &BlockedInterval) -> ScheduleEntry {
    ScheduleEntry {
        slot_start_time: format_time(block.start),
        slot_end_time: format_time(block.end),
        activity_type: ActivityKind::Blocked.as_tag().to_string(),
        title: block.reason.clone(),
        details: None,
        related_item_id: format!("BLOCK_{index}"),
    }
}

fn infeasibility_warning(status: SolveStatus) -> String {
    match status {
        SolveStatus::Unknown => {
            "Solver exhausted its time budget without finding a feasible schedule.".to_string()
        }
        _ => "No feasible schedule exists for the supplied constraints.".to_string(),
    }
}
