//! Inbound request shapes (§6). These are plain `serde` structs the caller
//! feeds from a deserialized request body — the core never touches a wire
//! format itself, and unknown fields/categories are ignored rather than
//! rejected (no `deny_unknown_fields` anywhere in this module).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// The six identifier fields a raw item may carry; the Normalizer resolves
/// the first non-empty one (§4.3).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIdentifiers {
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub alert_id: Option<String>,
    #[serde(default)]
    pub follow_up_id: Option<String>,
    #[serde(default)]
    pub care_plan_id: Option<String>,
    #[serde(default)]
    pub intervention_id: Option<String>,
}

impl RawIdentifiers {
    pub fn resolve(&self) -> Option<&str> {
        [
            &self.item_id,
            &self.task_id,
            &self.alert_id,
            &self.follow_up_id,
            &self.care_plan_id,
            &self.intervention_id,
        ]
        .into_iter()
        .find_map(|candidate| candidate.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAppointmentOrMeeting {
    #[serde(flatten)]
    pub ids: RawIdentifiers,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
    #[serde(default)]
    pub initial_priority_score: Option<i32>,
    #[serde(default)]
    pub is_fixed_time: Option<bool>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pgi_context: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTask {
    #[serde(flatten)]
    pub ids: RawIdentifiers,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
    #[serde(default)]
    pub initial_priority_score: Option<i32>,
    #[serde(default, rename = "initialPriorityScore_text")]
    pub initial_priority_score_text: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pgi_context: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAlert {
    #[serde(flatten)]
    pub ids: RawIdentifiers,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_time_to_address: Option<i64>,
    #[serde(default)]
    pub urgency_score: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pgi_context: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFollowUp {
    #[serde(flatten)]
    pub ids: RawIdentifiers,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_duration_for_follow_up_action: Option<i64>,
    #[serde(default)]
    pub initial_priority_score: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pgi_context: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCarePlanOrIntervention {
    #[serde(flatten)]
    pub ids: RawIdentifiers,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
    #[serde(default)]
    pub priority: Option<i32>,
    /// Either a time string, an ISO datetime, or the literal `"None"`
    /// (case-insensitive), meaning no deadline (§4.3).
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub pgi_context: Option<JsonValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItems {
    #[serde(default)]
    pub appointments: Vec<RawAppointmentOrMeeting>,
    #[serde(default)]
    pub calendar_events: Vec<RawAppointmentOrMeeting>,
    #[serde(default)]
    pub tasks: Vec<RawTask>,
    #[serde(default)]
    pub critical_alerts_to_address: Vec<RawAlert>,
    #[serde(default)]
    pub follow_ups: Vec<RawFollowUp>,
    #[serde(default)]
    pub care_plans: Vec<RawCarePlanOrIntervention>,
    #[serde(default)]
    pub patient_vital_alerts: Vec<RawAlert>,
    #[serde(default)]
    pub interventions: Vec<RawCarePlanOrIntervention>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlockedInterval {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNurseConstraints {
    #[serde(default)]
    pub shift_start_time: Option<String>,
    #[serde(default)]
    pub shift_end_time: Option<String>,
    #[serde(default)]
    pub lunch_break_preferred_start_time: Option<String>,
    #[serde(default)]
    pub lunch_break_duration: Option<i64>,
    #[serde(default)]
    pub blocked_out_times: Vec<RawBlockedInterval>,
    /// `location_a -> location_b -> minutes`.
    #[serde(default)]
    pub travel_matrix: Option<HashMap<String, HashMap<String, i64>>>,
    #[serde(default)]
    pub current_location: Option<String>,
    /// Accepted but never consulted by the objective (SPEC_FULL.md Open
    /// Question 1).
    #[serde(default)]
    pub patient_preference: Option<String>,
}

/// A caller-supplied precedence edge: `predecessor` must finish before
/// `successor` starts (§4.4 constraint 5).
#[derive(Debug, Clone, Deserialize)]
pub struct PrecedenceEdge {
    pub predecessor: String,
    pub successor: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub nurse_id: String,
    pub schedule_date: String,
    #[serde(default)]
    pub work_items: WorkItems,
    #[serde(default)]
    pub nurse_constraints: RawNurseConstraints,
    /// Frees non-fixed, non-alert activities' presence booleans (§4.4).
    #[serde(default)]
    pub relax_optional: bool,
    #[serde(default)]
    pub precedence: Vec<PrecedenceEdge>,
    /// Fixes the solver's tie-breaking order for reproducible replay (§9).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Wall-clock solver budget in seconds; defaults to 15, clamped to 60 (§4.5).
    #[serde(default)]
    pub solver_budget_seconds: Option<u64>,
}
