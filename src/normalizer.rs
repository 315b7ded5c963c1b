//! Collapses the raw heterogeneous `work_items` categories into a single
//! list of [`Activity`] records, plus the pre-solve defect detection that
//! keeps the solver from ever seeing an item that is unschedulable on its
//! face (§7: "detectable pre-solve during normalization").

use std::collections::HashSet;

use crate::activity::{Activity, ActivityKind, BlockedInterval, ShiftWindow, UnachievableItem, UnachievableReason};
use crate::oracle::{ParameterOracle, DEFAULT_PRIORITY};
use crate::request::{
    RawAlert, RawAppointmentOrMeeting, RawCarePlanOrIntervention, RawFollowUp, RawIdentifiers,
    RawTask, WorkItems,
};
use crate::time::parse_time;

/// Normalized activities plus every item that was rejected before it ever
/// became one, so the Projector never has to re-derive rejection reasons.
#[derive(Debug, Clone, Default)]
pub struct NormalizationOutcome {
    pub activities: Vec<Activity>,
    pub rejects: Vec<UnachievableItem>,
}

pub fn normalize(work_items: &WorkItems, oracle: &dyn ParameterOracle) -> NormalizationOutcome {
    let mut activities = Vec::new();
    let mut rejects = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for raw in &work_items.appointments {
        push(
            normalize_appointment_or_meeting(raw, ActivityKind::Appointment, &mut seen_ids),
            &mut activities,
            &mut rejects,
        );
    }
    for raw in &work_items.calendar_events {
        push(
            normalize_appointment_or_meeting(raw, ActivityKind::Meeting, &mut seen_ids),
            &mut activities,
            &mut rejects,
        );
    }
    for raw in &work_items.tasks {
        push(
            normalize_task(raw, oracle, &mut seen_ids),
            &mut activities,
            &mut rejects,
        );
    }
    for raw in &work_items.critical_alerts_to_address {
        push(
            normalize_alert(raw, ActivityKind::Alert, oracle, &mut seen_ids),
            &mut activities,
            &mut rejects,
        );
    }
    for raw in &work_items.patient_vital_alerts {
        push(
            normalize_alert(raw, ActivityKind::VitalAlert, oracle, &mut seen_ids),
            &mut activities,
            &mut rejects,
        );
    }
    for raw in &work_items.follow_ups {
        push(
            normalize_follow_up(raw, &mut seen_ids),
            &mut activities,
            &mut rejects,
        );
    }
    for raw in &work_items.care_plans {
        push(
            normalize_care_plan_or_intervention(raw, ActivityKind::CarePlan, &mut seen_ids),
            &mut activities,
            &mut rejects,
        );
    }
    for raw in &work_items.interventions {
        push(
            normalize_care_plan_or_intervention(raw, ActivityKind::Intervention, &mut seen_ids),
            &mut activities,
            &mut rejects,
        );
    }

    NormalizationOutcome { activities, rejects }
}

fn push(
    result: Result<Activity, UnachievableItem>,
    activities: &mut Vec<Activity>,
    rejects: &mut Vec<UnachievableItem>,
) {
    match result {
        Ok(activity) => activities.push(activity),
        Err(item) => rejects.push(item),
    }
}

/// Picks the first non-empty of the six identifier fields and disambiguates
/// it against ids already seen in this normalization pass by suffixing the
/// kind tag (e.g. `P-100#task`), per §4.3.
fn resolve_id(
    ids: &RawIdentifiers,
    kind: ActivityKind,
    seen: &mut HashSet<String>,
) -> Result<String, UnachievableItem> {
    let raw_id = ids.resolve().ok_or_else(|| UnachievableItem {
        item_id: String::new(),
        item_type: kind.as_tag().to_string(),
        reason: UnachievableReason::MissingIdentifier,
    })?;

    let candidate = if seen.contains(raw_id) {
        format!("{raw_id}#{}", kind.as_tag())
    } else {
        raw_id.to_string()
    };
    seen.insert(candidate.clone());
    Ok(candidate)
}

fn malformed(id: &str, kind: ActivityKind) -> UnachievableItem {
    UnachievableItem {
        item_id: id.to_string(),
        item_type: kind.as_tag().to_string(),
        reason: UnachievableReason::MalformedInput,
    }
}

fn normalize_appointment_or_meeting(
    raw: &RawAppointmentOrMeeting,
    kind: ActivityKind,
    seen: &mut HashSet<String>,
) -> Result<Activity, UnachievableItem> {
    let id = resolve_id(&raw.ids, kind, seen)?;

    let duration = raw
        .estimated_duration
        .filter(|d| *d > 0)
        .map(|d| d as i32)
        .ok_or_else(|| malformed(&id, kind))?;

    let fixed_start = if raw.is_fixed_time.unwrap_or(false) {
        let start_time = raw.start_time.as_deref().ok_or_else(|| malformed(&id, kind))?;
        Some(parse_time(start_time).map_err(|_| malformed(&id, kind))?)
    } else {
        None
    };

    Ok(Activity {
        id,
        kind,
        duration,
        priority: raw.initial_priority_score.unwrap_or(DEFAULT_PRIORITY),
        fixed_start,
        deadline: None,
        location: raw.location.clone(),
        title: raw.title.clone().unwrap_or_default(),
        details: raw.description.clone(),
        pgi_context: raw.pgi_context.clone(),
    })
}

fn normalize_task(
    raw: &RawTask,
    oracle: &dyn ParameterOracle,
    seen: &mut HashSet<String>,
) -> Result<Activity, UnachievableItem> {
    let id = resolve_id(&raw.ids, ActivityKind::Task, seen)?;

    let duration = match raw.estimated_duration {
        Some(d) if d > 0 => d as i32,
        Some(_) => return Err(malformed(&id, ActivityKind::Task)),
        None => oracle.task_default_duration(),
    };

    let priority = if let Some(score) = raw.initial_priority_score {
        score
    } else if let Some(label) = raw.initial_priority_score_text.as_deref() {
        oracle.priority_weight(label)
    } else {
        DEFAULT_PRIORITY
    };

    let deadline = match raw.deadline.as_deref() {
        Some(value) => Some(parse_time(value).map_err(|_| malformed(&id, ActivityKind::Task))?),
        None => None,
    };

    Ok(Activity {
        id,
        kind: ActivityKind::Task,
        duration,
        priority,
        fixed_start: None,
        deadline,
        location: raw.location.clone(),
        title: raw.title.clone().unwrap_or_default(),
        details: raw.description.clone(),
        pgi_context: raw.pgi_context.clone(),
    })
}

fn normalize_alert(
    raw: &RawAlert,
    kind: ActivityKind,
    oracle: &dyn ParameterOracle,
    seen: &mut HashSet<String>,
) -> Result<Activity, UnachievableItem> {
    let id = resolve_id(&raw.ids, kind, seen)?;

    let duration = match raw.estimated_time_to_address {
        Some(d) if d > 0 => d as i32,
        Some(_) => return Err(malformed(&id, kind)),
        None => oracle.alert_default_address_time(),
    };

    Ok(Activity {
        id,
        kind,
        duration,
        priority: raw.urgency_score.unwrap_or(DEFAULT_PRIORITY),
        fixed_start: None,
        deadline: None,
        location: raw.location.clone(),
        title: raw.title.clone().unwrap_or_default(),
        details: raw.description.clone(),
        pgi_context: raw.pgi_context.clone(),
    })
}

fn normalize_follow_up(
    raw: &RawFollowUp,
    seen: &mut HashSet<String>,
) -> Result<Activity, UnachievableItem> {
    let id = resolve_id(&raw.ids, ActivityKind::FollowUp, seen)?;

    let duration = raw
        .estimated_duration_for_follow_up_action
        .filter(|d| *d > 0)
        .map(|d| d as i32)
        .ok_or_else(|| malformed(&id, ActivityKind::FollowUp))?;

    Ok(Activity {
        id,
        kind: ActivityKind::FollowUp,
        duration,
        priority: raw.initial_priority_score.unwrap_or(DEFAULT_PRIORITY),
        fixed_start: None,
        deadline: None,
        location: raw.location.clone(),
        title: raw.title.clone().unwrap_or_default(),
        details: raw.description.clone(),
        pgi_context: raw.pgi_context.clone(),
    })
}

fn normalize_care_plan_or_intervention(
    raw: &RawCarePlanOrIntervention,
    kind: ActivityKind,
    seen: &mut HashSet<String>,
) -> Result<Activity, UnachievableItem> {
    let id = resolve_id(&raw.ids, kind, seen)?;

    let duration = raw
        .estimated_duration
        .filter(|d| *d > 0)
        .map(|d| d as i32)
        .ok_or_else(|| malformed(&id, kind))?;

    let deadline = match raw.deadline.as_deref() {
        Some(value) if value.eq_ignore_ascii_case("none") => None,
        Some(value) => Some(parse_time(value).map_err(|_| malformed(&id, kind))?),
        None => None,
    };

    Ok(Activity {
        id,
        kind,
        duration,
        priority: raw.priority.unwrap_or(DEFAULT_PRIORITY),
        fixed_start: None,
        deadline,
        location: raw.location.clone(),
        title: raw.title.clone().unwrap_or_default(),
        details: raw.description.clone(),
        pgi_context: raw.pgi_context.clone(),
    })
}

/// Drops items that cannot possibly be placed before the solver ever runs
/// (§7): expired deadlines, fixed starts outside the shift, fixed starts
/// clashing with a block, and fixed starts clashing with each other.
pub fn prefilter(
    activities: Vec<Activity>,
    shift: &ShiftWindow,
    blocks: &[BlockedInterval],
) -> (Vec<Activity>, Vec<UnachievableItem>) {
    let mut kept = Vec::with_capacity(activities.len());
    let mut rejected = Vec::new();

    for activity in activities {
        if let Some(deadline) = activity.deadline {
            if deadline <= shift.shift_start {
                rejected.push(reject(&activity, UnachievableReason::DeadlinePast));
                continue;
            }
        }

        if let Some(start) = activity.fixed_start {
            let end = activity.end_if_started_at(start);
            if !shift.contains_interval(start, end) {
                rejected.push(reject(&activity, UnachievableReason::FixedTimeOutsideShift));
                continue;
            }
            if blocks
                .iter()
                .any(|block| intervals_overlap(start, end, block.start, block.end))
            {
                rejected.push(reject(&activity, UnachievableReason::FixedTimeClashesBlock));
                continue;
            }
        }

        kept.push(activity);
    }

    rejected.extend(resolve_fixed_clashes(&mut kept));
    (kept, rejected)
}

fn reject(activity: &Activity, reason: UnachievableReason) -> UnachievableItem {
    UnachievableItem {
        item_id: activity.id.clone(),
        item_type: activity.kind.as_tag().to_string(),
        reason,
    }
}

fn intervals_overlap(start_a: i32, end_a: i32, start_b: i32, end_b: i32) -> bool {
    start_a < end_b && start_b < end_a
}

/// Repeatedly finds a pair of fixed-start activities whose intervals
/// overlap and drops the lower-priority one (ties broken by id, the larger
/// id losing) until no such pair remains.
fn resolve_fixed_clashes(activities: &mut Vec<Activity>) -> Vec<UnachievableItem> {
    let mut rejected = Vec::new();

    loop {
        let mut loser = None;
        'search: for i in 0..activities.len() {
            let Some(start_i) = activities[i].fixed_start else {
                continue;
            };
            let end_i = activities[i].end_if_started_at(start_i);

            for j in (i + 1)..activities.len() {
                let Some(start_j) = activities[j].fixed_start else {
                    continue;
                };
                let end_j = activities[j].end_if_started_at(start_j);

                if intervals_overlap(start_i, end_i, start_j, end_j) {
                    loser = Some(if activities[i].priority != activities[j].priority {
                        if activities[i].priority < activities[j].priority {
                            i
                        } else {
                            j
                        }
                    } else if activities[i].id > activities[j].id {
                        i
                    } else {
                        j
                    });
                    break 'search;
                }
            }
        }

        match loser {
            Some(index) => {
                let removed = activities.remove(index);
                rejected.push(reject(&removed, UnachievableReason::Infeasible));
            }
            None => break,
        }
    }

    rejected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DefaultParameterOracle;
    use crate::request::{RawIdentifiers, WorkItems};

    fn ids(item_id: &str) -> RawIdentifiers {
        RawIdentifiers {
            item_id: Some(item_id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let work_items = WorkItems {
            tasks: vec![RawTask {
                estimated_duration: Some(20),
                ..Default::default()
            }],
            ..Default::default()
        };
        let outcome = normalize(&work_items, &DefaultParameterOracle);
        assert!(outcome.activities.is_empty());
        assert_eq!(outcome.rejects.len(), 1);
        assert_eq!(
            outcome.rejects[0].reason,
            UnachievableReason::MissingIdentifier
        );
    }

    #[test]
    fn duplicate_ids_across_categories_are_suffixed() {
        let work_items = WorkItems {
            appointments: vec![RawAppointmentOrMeeting {
                ids: ids("P-100"),
                estimated_duration: Some(30),
                ..Default::default()
            }],
            tasks: vec![RawTask {
                ids: ids("P-100"),
                estimated_duration: Some(20),
                ..Default::default()
            }],
            ..Default::default()
        };
        let outcome = normalize(&work_items, &DefaultParameterOracle);
        assert_eq!(outcome.activities.len(), 2);
        assert_eq!(outcome.activities[0].id, "P-100");
        assert_eq!(outcome.activities[1].id, "P-100#task");
    }

    #[test]
    fn task_without_duration_falls_back_to_oracle_default() {
        let work_items = WorkItems {
            tasks: vec![RawTask {
                ids: ids("T1"),
                ..Default::default()
            }],
            ..Default::default()
        };
        let outcome = normalize(&work_items, &DefaultParameterOracle);
        assert_eq!(outcome.activities[0].duration, 30);
    }

    #[test]
    fn task_priority_text_label_is_looked_up() {
        let work_items = WorkItems {
            tasks: vec![RawTask {
                ids: ids("T1"),
                estimated_duration: Some(10),
                initial_priority_score_text: Some("High".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let outcome = normalize(&work_items, &DefaultParameterOracle);
        assert_eq!(outcome.activities[0].priority, 10);
    }

    #[test]
    fn care_plan_literal_none_deadline_is_absent() {
        let work_items = WorkItems {
            care_plans: vec![RawCarePlanOrIntervention {
                ids: ids("CP1"),
                estimated_duration: Some(30),
                deadline: Some("None".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let outcome = normalize(&work_items, &DefaultParameterOracle);
        assert_eq!(outcome.activities[0].deadline, None);
    }

    #[test]
    fn malformed_duration_is_rejected() {
        let work_items = WorkItems {
            appointments: vec![RawAppointmentOrMeeting {
                ids: ids("A1"),
                estimated_duration: Some(0),
                ..Default::default()
            }],
            ..Default::default()
        };
        let outcome = normalize(&work_items, &DefaultParameterOracle);
        assert!(outcome.activities.is_empty());
        assert_eq!(outcome.rejects[0].reason, UnachievableReason::MalformedInput);
    }

    fn activity(id: &str, fixed_start: i32, duration: i32, priority: i32) -> Activity {
        Activity {
            id: id.to_string(),
            kind: ActivityKind::Appointment,
            duration,
            priority,
            fixed_start: Some(fixed_start),
            deadline: None,
            location: None,
            title: String::new(),
            details: None,
            pgi_context: None,
        }
    }

    #[test]
    fn prefilter_drops_deadline_already_past_shift_start() {
        let shift = ShiftWindow {
            shift_start: 480,
            shift_end: 1020,
        };
        let mut late = activity("T1", 500, 30, 5);
        late.fixed_start = None;
        late.deadline = Some(400);
        let (kept, rejected) = prefilter(vec![late], &shift, &[]);
        assert!(kept.is_empty());
        assert_eq!(rejected[0].reason, UnachievableReason::DeadlinePast);
    }

    #[test]
    fn prefilter_drops_fixed_start_outside_shift() {
        let shift = ShiftWindow {
            shift_start: 480,
            shift_end: 1020,
        };
        let a = activity("A1", 400, 30, 5);
        let (kept, rejected) = prefilter(vec![a], &shift, &[]);
        assert!(kept.is_empty());
        assert_eq!(rejected[0].reason, UnachievableReason::FixedTimeOutsideShift);
    }

    #[test]
    fn prefilter_drops_fixed_start_clashing_with_block() {
        let shift = ShiftWindow {
            shift_start: 480,
            shift_end: 1020,
        };
        let a = activity("A1", 540, 30, 5);
        let blocks = vec![BlockedInterval {
            start: 530,
            end: 560,
            reason: "meeting".to_string(),
        }];
        let (kept, rejected) = prefilter(vec![a], &shift, &blocks);
        assert!(kept.is_empty());
        assert_eq!(
            rejected[0].reason,
            UnachievableReason::FixedTimeClashesBlock
        );
    }

    #[test]
    fn prefilter_resolves_fixed_vs_fixed_clash_by_priority() {
        let shift = ShiftWindow {
            shift_start: 480,
            shift_end: 1020,
        };
        let low = activity("LOW", 540, 30, 3);
        let high = activity("HIGH", 540, 30, 9);
        let (kept, rejected) = prefilter(vec![low, high], &shift, &[]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "HIGH");
        assert_eq!(rejected[0].item_id, "LOW");
        assert_eq!(rejected[0].reason, UnachievableReason::Infeasible);
    }
}
