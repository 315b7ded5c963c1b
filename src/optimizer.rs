//! Top-level entry point: `optimize_schedule` wires the Normalizer, Model
//! Builder, Solver Driver, and Solution Projector into the single pure
//! function the rest of the system calls (§5).

use std::time::Duration;

use tracing::{info, warn};

use crate::activity::{BlockedInterval, LunchConfig, ShiftWindow, TravelMatrix, UnachievableItem, UnachievableReason};
use crate::envelope::ResultEnvelope;
use crate::model::{ModelBuilder, SolverConfig, SolverDriver};
use crate::normalizer;
use crate::oracle::ParameterOracle;
use crate::projector;
use crate::request::OptimizeRequest;
use crate::time::parse_time;

/// Runs the whole pipeline for one request. Never fails: malformed global
/// inputs (shift window, lunch window, blocked-time bounds) produce a
/// well-formed envelope with every item unachievable and a single warning,
/// per §7.
pub fn optimize_schedule(
    request: &OptimizeRequest,
    oracle: &dyn ParameterOracle,
) -> ResultEnvelope {
    info!(
        nurse_id = %request.nurse_id,
        schedule_date = %request.schedule_date,
        "optimizing schedule"
    );

    let outcome = normalizer::normalize(&request.work_items, oracle);

    if let Err(message) = validate_schedule_date(&request.schedule_date) {
        warn!(%message, "malformed scheduleDate; failing whole solve");
        let mut unachievable = outcome.rejects;
        unachievable.extend(outcome.activities.into_iter().map(|activity| UnachievableItem {
            item_id: activity.id,
            item_type: activity.kind.as_tag().to_string(),
            reason: UnachievableReason::Infeasible,
        }));
        return ResultEnvelope::global_failure(
            request.nurse_id.clone(),
            request.schedule_date.clone(),
            unachievable,
            message,
        );
    }

    let (shift, lunch, blocks, travel) = match parse_constraints(request) {
        Ok(parsed) => parsed,
        Err(message) => {
            warn!(%message, "global constraint parse failure; failing whole solve");
            let mut unachievable = outcome.rejects;
            unachievable.extend(outcome.activities.into_iter().map(|activity| UnachievableItem {
                item_id: activity.id,
                item_type: activity.kind.as_tag().to_string(),
                reason: UnachievableReason::Infeasible,
            }));
            return ResultEnvelope::global_failure(
                request.nurse_id.clone(),
                request.schedule_date.clone(),
                unachievable,
                message,
            );
        }
    };

    let (activities, prefilter_rejects) = normalizer::prefilter(outcome.activities, &shift, &blocks);
    let mut unachievable = outcome.rejects;
    unachievable.extend(prefilter_rejects);

    let config = SolverConfig {
        budget: Duration::from_secs(request.solver_budget_seconds.unwrap_or(crate::model::DEFAULT_BUDGET_SECS)),
        relax_optional: request.relax_optional,
        seed: request.seed,
        precedence: request
            .precedence
            .iter()
            .map(|edge| (edge.predecessor.clone(), edge.successor.clone()))
            .collect(),
    }
    .clamp_budget();

    let model = ModelBuilder::build(&activities, shift, lunch, &blocks, travel.as_ref(), oracle, &config);
    let solution = SolverDriver::new(&model, &config).solve();
    let projected = projector::project(&model, &solution, &unachievable);

    ResultEnvelope::from_projection(request.nurse_id.clone(), request.schedule_date.clone(), projected)
}

/// `scheduleDate` is only ever echoed back (§4.7), never used in solver
/// arithmetic, but a malformed date is still a global defect per §7 — the
/// envelope's `scheduleDate` field would otherwise silently carry garbage.
fn validate_schedule_date(value: &str) -> Result<(), String> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| "scheduleDate is not a valid YYYY-MM-DD date.".to_string())
}

fn parse_constraints(
    request: &OptimizeRequest,
) -> Result<(ShiftWindow, LunchConfig, Vec<BlockedInterval>, Option<TravelMatrix>), String> {
    let constraints = &request.nurse_constraints;

    let shift_start = constraints
        .shift_start_time
        .as_deref()
        .map(parse_time)
        .transpose()
        .map_err(|_| "Shift start time is not a valid time value.".to_string())?
        .unwrap_or(0);
    let shift_end = constraints
        .shift_end_time
        .as_deref()
        .map(parse_time)
        .transpose()
        .map_err(|_| "Shift end time is not a valid time value.".to_string())?
        .unwrap_or(crate::time::MINUTES_PER_DAY);

    if shift_end <= shift_start {
        return Err("Shift end time must be after shift start time.".to_string());
    }
    let shift = ShiftWindow {
        shift_start,
        shift_end,
    };

    let lunch_duration = constraints.lunch_break_duration.unwrap_or(30).max(0) as i32;
    let lunch_preferred_start = constraints
        .lunch_break_preferred_start_time
        .as_deref()
        .map(parse_time)
        .transpose()
        .map_err(|_| "Lunch preferred start time is not a valid time value.".to_string())?
        .unwrap_or(shift_start + (shift_end - shift_start) / 2);

    if lunch_duration > shift.duration() {
        return Err("Lunch break duration does not fit inside the shift.".to_string());
    }
    let lunch = LunchConfig {
        preferred_start: lunch_preferred_start,
        duration: lunch_duration,
    };

    let mut blocks = Vec::new();
    for raw in &constraints.blocked_out_times {
        let start = parse_time(&raw.start).map_err(|_| "A blocked interval has an invalid start time.".to_string())?;
        let end = parse_time(&raw.end).map_err(|_| "A blocked interval has an invalid end time.".to_string())?;
        if end <= start {
            // Zero/negative-length blocks are dropped, per §3.
            continue;
        }
        blocks.push(BlockedInterval {
            start,
            end,
            reason: raw.reason.clone().unwrap_or_default(),
        });
    }

    let travel = constraints.travel_matrix.as_ref().map(|raw| {
        let mut matrix = TravelMatrix::new();
        for (from, destinations) in raw {
            for (to, minutes) in destinations {
                matrix.insert(from.clone(), to.clone(), *minutes as i32);
            }
        }
        matrix
    });

    Ok((shift, lunch, blocks, travel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DefaultParameterOracle;
    use crate::request::{
        OptimizeRequest, RawAppointmentOrMeeting, RawBlockedInterval, RawIdentifiers,
        RawNurseConstraints, WorkItems,
    };

    fn base_request() -> OptimizeRequest {
        OptimizeRequest {
            nurse_id: "nurse-1".to_string(),
            schedule_date: "2026-07-28".to_string(),
            work_items: WorkItems::default(),
            nurse_constraints: RawNurseConstraints {
                shift_start_time: Some("08:00:00".to_string()),
                shift_end_time: Some("17:00:00".to_string()),
                lunch_break_preferred_start_time: Some("12:00:00".to_string()),
                lunch_break_duration: Some(30),
                blocked_out_times: Vec::new(),
                travel_matrix: None,
                current_location: None,
                patient_preference: None,
            },
            relax_optional: false,
            precedence: Vec::new(),
            seed: None,
            solver_budget_seconds: None,
        }
    }

    /// Scenario S1: empty day schedules only lunch at the preferred time.
    #[test]
    fn s1_empty_day_schedules_only_lunch() {
        let request = base_request();
        let envelope = optimize_schedule(&request, &DefaultParameterOracle);
        assert_eq!(envelope.optimized_schedule.len(), 1);
        assert_eq!(envelope.optimized_schedule[0].related_item_id, "LUNCH");
        assert_eq!(envelope.optimized_schedule[0].slot_start_time, "12:00:00");
        assert!(envelope.unachievable_items.is_empty());
    }

    /// Scenario S2: two fixed appointments at the same time clash; exactly
    /// one survives and the other is reported unachievable.
    #[test]
    fn s2_fixed_time_clash_keeps_exactly_one() {
        let mut request = base_request();
        request.work_items.appointments = vec![
            RawAppointmentOrMeeting {
                ids: RawIdentifiers {
                    item_id: Some("APT-A".to_string()),
                    ..Default::default()
                },
                estimated_duration: Some(30),
                is_fixed_time: Some(true),
                start_time: Some("09:00:00".to_string()),
                initial_priority_score: Some(5),
                ..Default::default()
            },
            RawAppointmentOrMeeting {
                ids: RawIdentifiers {
                    item_id: Some("APT-B".to_string()),
                    ..Default::default()
                },
                estimated_duration: Some(30),
                is_fixed_time: Some(true),
                start_time: Some("09:00:00".to_string()),
                initial_priority_score: Some(5),
                ..Default::default()
            },
        ];

        let envelope = optimize_schedule(&request, &DefaultParameterOracle);
        let scheduled_appointments: Vec<_> = envelope
            .optimized_schedule
            .iter()
            .filter(|e| e.activity_type == "appointment")
            .collect();
        assert_eq!(scheduled_appointments.len(), 1);
        assert_eq!(envelope.unachievable_items.len(), 1);
    }

    #[test]
    fn bad_shift_window_produces_global_failure_envelope() {
        let mut request = base_request();
        request.nurse_constraints.shift_start_time = Some("17:00:00".to_string());
        request.nurse_constraints.shift_end_time = Some("08:00:00".to_string());

        let envelope = optimize_schedule(&request, &DefaultParameterOracle);
        assert!(envelope.optimized_schedule.is_empty());
        assert_eq!(envelope.optimization_score, 0.0);
        assert_eq!(envelope.warnings.len(), 1);
    }

    #[test]
    fn malformed_schedule_date_produces_global_failure_envelope() {
        let mut request = base_request();
        request.schedule_date = "28-07-2026".to_string();

        let envelope = optimize_schedule(&request, &DefaultParameterOracle);
        assert!(envelope.optimized_schedule.is_empty());
        assert_eq!(envelope.warnings.len(), 1);
    }

    /// Scenario S5: three mandatory 30-minute tasks cannot fit into a
    /// 60-minute shift; the whole solve fails and the score is zero.
    #[test]
    fn s5_oversubscribed_shift_is_wholly_infeasible() {
        use crate::request::RawTask;

        let mut request = base_request();
        request.nurse_constraints.shift_start_time = Some("08:00:00".to_string());
        request.nurse_constraints.shift_end_time = Some("09:00:00".to_string());
        request.nurse_constraints.lunch_break_duration = Some(0);
        request.work_items.tasks = vec![
            RawTask {
                ids: RawIdentifiers {
                    item_id: Some("T1".to_string()),
                    ..Default::default()
                },
                estimated_duration: Some(30),
                ..Default::default()
            },
            RawTask {
                ids: RawIdentifiers {
                    item_id: Some("T2".to_string()),
                    ..Default::default()
                },
                estimated_duration: Some(30),
                ..Default::default()
            },
            RawTask {
                ids: RawIdentifiers {
                    item_id: Some("T3".to_string()),
                    ..Default::default()
                },
                estimated_duration: Some(30),
                ..Default::default()
            },
        ];

        let envelope = optimize_schedule(&request, &DefaultParameterOracle);
        assert_eq!(envelope.optimization_score, 0.0);
        assert_eq!(envelope.unachievable_items.len(), 3);
    }

    #[test]
    fn zero_length_blocked_interval_is_dropped() {
        let mut request = base_request();
        request.nurse_constraints.blocked_out_times = vec![RawBlockedInterval {
            start: "10:00:00".to_string(),
            end: "10:00:00".to_string(),
            reason: Some("noop".to_string()),
        }];
        let envelope = optimize_schedule(&request, &DefaultParameterOracle);
        assert!(!envelope
            .optimized_schedule
            .iter()
            .any(|e| e.activity_type == "blocked"));
    }
}
