//! The fixed-shape record returned to the external caller (§4.7/§6).

use serde::{Deserialize, Serialize};

use crate::activity::UnachievableItem;
use crate::projector::{ProjectedResult, ScheduleEntry};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    pub nurse_id: String,
    pub schedule_date: String,
    pub optimized_schedule: Vec<ScheduleEntry>,
    pub unachievable_items: Vec<UnachievableItem>,
    pub optimization_score: f64,
    pub warnings: Vec<String>,
}

impl ResultEnvelope {
    pub fn from_projection(nurse_id: String, schedule_date: String, projected: ProjectedResult) -> Self {
        Self {
            nurse_id,
            schedule_date,
            optimized_schedule: projected.schedule,
            unachievable_items: projected.unachievable,
            optimization_score: projected.score,
            warnings: projected.warnings,
        }
    }

    /// A well-formed envelope for a global defect (§7): every known item
    /// unachievable, zero schedule, one explanatory warning.
    pub fn global_failure(
        nurse_id: String,
        schedule_date: String,
        unachievable_items: Vec<UnachievableItem>,
        warning: String,
    ) -> Self {
        Self {
            nurse_id,
            schedule_date,
            optimized_schedule: Vec::new(),
            unachievable_items,
            optimization_score: 0.0,
            warnings: vec![warning],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_failure_has_empty_schedule_and_zero_score() {
        let envelope = ResultEnvelope::global_failure(
            "nurse-1".to_string(),
            "2026-07-28".to_string(),
            Vec::new(),
            "bad shift window".to_string(),
        );
        assert!(envelope.optimized_schedule.is_empty());
        assert_eq!(envelope.optimization_score, 0.0);
        assert_eq!(envelope.warnings.len(), 1);
    }
}
