//! The uniform, normalized scheduling unit every input category collapses into.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::time::Minute;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    Appointment,
    Meeting,
    Task,
    Alert,
    FollowUp,
    CarePlan,
    Intervention,
    VitalAlert,
    /// Synthetic — inserted by the Model Builder, never supplied by a caller.
    Break,
    /// Synthetic — inserted by the Model Builder, never supplied by a caller.
    Blocked,
}

impl ActivityKind {
    /// Lowercase tag used as `activityType` in the projected schedule.
    pub fn as_tag(self) -> &'static str {
        match self {
            ActivityKind::Appointment => "appointment",
            ActivityKind::Meeting => "meeting",
            ActivityKind::Task => "task",
            ActivityKind::Alert => "alert",
            ActivityKind::FollowUp => "followup",
            ActivityKind::CarePlan => "careplan",
            ActivityKind::Intervention => "intervention",
            ActivityKind::VitalAlert => "vitalalert",
            ActivityKind::Break => "break",
            ActivityKind::Blocked => "blocked",
        }
    }

    /// Alerts and vital alerts can never be fixed-time (§4.3) and are never
    /// droppable under `relax_optional` (§4.4), unlike other activity kinds.
    pub fn is_alert(self) -> bool {
        matches!(self, ActivityKind::Alert | ActivityKind::VitalAlert)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    pub duration: Minute,
    pub priority: i32,
    #[serde(default)]
    pub fixed_start: Option<Minute>,
    #[serde(default)]
    pub deadline: Option<Minute>,
    #[serde(default)]
    pub location: Option<String>,
    pub title: String,
    #[serde(default)]
    pub details: Option<String>,
    /// Inert pass-through for the `pgiContext` field named in the originating
    /// system; accepted and carried verbatim, never interpreted (see
    /// SPEC_FULL.md Open Question 3).
    #[serde(default)]
    pub pgi_context: Option<JsonValue>,
}

impl Activity {
    pub fn end_if_started_at(&self, start: Minute) -> Minute {
        start + self.duration
    }
}

/// A half-open wall-clock window `[shift_start, shift_end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShiftWindow {
    pub shift_start: Minute,
    pub shift_end: Minute,
}

impl ShiftWindow {
    pub fn duration(&self) -> Minute {
        self.shift_end - self.shift_start
    }

    pub fn contains_interval(&self, start: Minute, end: Minute) -> bool {
        self.shift_start <= start && end <= self.shift_end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedInterval {
    pub start: Minute,
    pub end: Minute,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LunchConfig {
    pub preferred_start: Minute,
    pub duration: Minute,
}

/// `(location_a, location_b) -> travel minutes`. Asymmetric; missing entries
/// are treated as zero (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TravelMatrix {
    entries: std::collections::BTreeMap<(String, String), Minute>,
}

impl TravelMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>, minutes: Minute) {
        self.entries.insert((from.into(), to.into()), minutes);
    }

    pub fn travel_minutes(&self, from: &str, to: &str) -> Minute {
        self.entries
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Reasons an input item never made it into `optimizedSchedule`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum UnachievableReason {
    MalformedInput,
    MissingIdentifier,
    Infeasible,
    TimeoutNoSolution,
    DeadlinePast,
    FixedTimeOutsideShift,
    FixedTimeClashesBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnachievableItem {
    pub item_id: String,
    pub item_type: String,
    pub reason: UnachievableReason,
}
