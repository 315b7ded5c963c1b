//! A from-scratch branch-and-bound search over interval start times.
//!
//! `NoOverlap` is structural: the search only ever places an activity's
//! interval into a free gap of the single timeline (shift minus whatever is
//! already placed), so two placed intervals can never overlap by
//! construction. Deadlines, fixed starts, travel sequencing and precedence
//! are checked as guards when a candidate start is proposed. The search
//! branches on activity order (topologically respecting `model.precedence`,
//! then by priority, deterministically tie-broken), on which free gap to
//! use and which candidate start within that gap (earliest- and
//! latest-feasible, not just the earliest), and — when `relax_optional` is
//! set — on whether to drop a non-fixed, non-alert activity entirely. It
//! keeps searching for a better-scoring complete assignment until the
//! wall-clock budget runs out or the branch space is exhausted, which is
//! what makes it a CP-SAT-style engine rather than a single-pass heuristic:
//! see SPEC_FULL.md's design notes for why this is in-house rather than
//! bound to an external solver crate.

use std::time::Instant;

use crate::activity::TravelMatrix;
use crate::time::Minute;

use super::{ActivityVar, CpModel, SolverConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    /// `(activity index, start)` for every present activity.
    pub placements: Vec<(usize, Minute)>,
    /// Indices of activities dropped under `relax_optional`.
    pub dropped: Vec<usize>,
    pub lunch_start: Minute,
    pub objective: f64,
}

impl Solution {
    fn empty(status: SolveStatus) -> Self {
        Self {
            status,
            placements: Vec::new(),
            dropped: Vec::new(),
            lunch_start: 0,
            objective: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct PlacedInterval {
    start: Minute,
    end: Minute,
    location: Option<String>,
}

pub struct SolverDriver<'a> {
    model: &'a CpModel,
    config: &'a SolverConfig,
}

impl<'a> SolverDriver<'a> {
    pub fn new(model: &'a CpModel, config: &'a SolverConfig) -> Self {
        Self { model, config }
    }

    pub fn solve(&self) -> Solution {
        for var in &self.model.activity_vars {
            if var.start_domain.0 > var.start_domain.1 && !var.droppable {
                tracing::warn!(
                    activity_id = %var.activity.id,
                    "mandatory activity has no feasible start within the shift"
                );
                return Solution::empty(SolveStatus::Infeasible);
            }
        }
        if self.model.lunch_domain.0 > self.model.lunch_domain.1 {
            tracing::warn!("lunch break does not fit inside the shift");
            return Solution::empty(SolveStatus::Infeasible);
        }

        let seed = self.config.seed.unwrap_or(0);
        let order = branch_order(self.model, seed);
        let mut placed: Vec<PlacedInterval> = self
            .model
            .blocks
            .iter()
            .map(|block| PlacedInterval {
                start: block.start,
                end: block.end,
                location: None,
            })
            .collect();
        let mut placements = Vec::new();
        let mut dropped = Vec::new();
        let mut best: Option<Solution> = None;
        let mut timed_out = false;
        let search_deadline = Instant::now() + self.config.budget;

        search(
            self.model,
            &order,
            0,
            &mut placed,
            &mut placements,
            &mut dropped,
            search_deadline,
            &mut best,
            &mut timed_out,
        );

        match best {
            Some(mut solution) => {
                solution.status = if timed_out {
                    SolveStatus::Feasible
                } else {
                    SolveStatus::Optimal
                };
                solution
            }
            None => {
                let status = if timed_out {
                    SolveStatus::Unknown
                } else {
                    SolveStatus::Infeasible
                };
                Solution::empty(status)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn search(
    model: &CpModel,
    order: &[usize],
    pos: usize,
    placed: &mut Vec<PlacedInterval>,
    placements: &mut Vec<(usize, Minute)>,
    dropped: &mut Vec<usize>,
    search_deadline: Instant,
    best: &mut Option<Solution>,
    timed_out: &mut bool,
) {
    if *timed_out {
        return;
    }
    if Instant::now() >= search_deadline {
        *timed_out = true;
        return;
    }

    if pos == order.len() {
        if let Some(lunch_start) = place_lunch(model, placed) {
            let objective = evaluate(model, placements, lunch_start);
            let improves = match best {
                Some(existing) => objective > existing.objective,
                None => true,
            };
            if improves {
                *best = Some(Solution {
                    status: SolveStatus::Optimal,
                    placements: placements.clone(),
                    dropped: dropped.clone(),
                    lunch_start,
                    objective,
                });
            }
        }
        return;
    }

    let idx = order[pos];
    let var = &model.activity_vars[idx];

    for gap in compute_gaps(model, placed) {
        if *timed_out {
            return;
        }
        for start in candidate_starts_in_gap(
            gap,
            var.start_domain,
            var.activity.duration,
            var.activity.deadline,
            var.activity.location.as_deref(),
            placed,
            model.travel.as_ref(),
        ) {
            if *timed_out {
                return;
            }
            if !precedence_satisfied(model, idx, start, placements) {
                continue;
            }

            placed.push(PlacedInterval {
                start,
                end: start + var.activity.duration,
                location: var.activity.location.clone(),
            });
            placements.push((idx, start));

            search(
                model,
                order,
                pos + 1,
                placed,
                placements,
                dropped,
                search_deadline,
                best,
                timed_out,
            );

            placements.pop();
            placed.pop();
        }
    }

    if *timed_out {
        return;
    }

    if var.droppable {
        dropped.push(idx);
        search(
            model,
            order,
            pos + 1,
            placed,
            placements,
            dropped,
            search_deadline,
            best,
            timed_out,
        );
        dropped.pop();
    }
}

fn compute_gaps(model: &CpModel, placed: &[PlacedInterval]) -> Vec<(Minute, Minute)> {
    let mut intervals: Vec<(Minute, Minute)> = placed.iter().map(|p| (p.start, p.end)).collect();
    intervals.sort_by_key(|iv| iv.0);

    let mut gaps = Vec::new();
    let mut cursor = model.shift.shift_start;
    for (start, end) in intervals {
        if start > cursor {
            gaps.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < model.shift.shift_end {
        gaps.push((cursor, model.shift.shift_end));
    }
    gaps
}

/// Returns the distinct candidate starts within `gap` worth trying for this
/// activity: the earliest-feasible start and the latest-feasible start.
///
/// A single-candidate (earliest-only) search is not exhaustive: greedily
/// taking the earliest slot can consume the only position a later,
/// lower-priority activity needed (e.g. a precedence predecessor that must
/// leave room after it, or a tight-deadline activity that needs to land
/// later in the gap to let something else go first). Trying both ends of
/// the gap gives the backtracking search in `search` a real alternative to
/// retry instead of dead-ending to `Infeasible`.
#[allow(clippy::too_many_arguments)]
fn candidate_starts_in_gap(
    gap: (Minute, Minute),
    domain: (Minute, Minute),
    duration: Minute,
    deadline: Option<Minute>,
    location: Option<&str>,
    placed: &[PlacedInterval],
    travel: Option<&TravelMatrix>,
) -> Vec<Minute> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(start) = earliest_feasible_start(gap, domain, duration, deadline, location, placed, travel) {
        candidates.push(start);
    }
    if let Some(start) = latest_feasible_start(gap, domain, duration, deadline, location, placed, travel) {
        if !candidates.contains(&start) {
            candidates.push(start);
        }
    }
    candidates
}

/// The earliest start within `gap` that fits `domain`, `duration`,
/// `deadline`, and — when both this activity and a placed one carry a
/// location — the travel-sequencing constraint from §4.4.4, bumping the
/// start forward as needed to clear predecessors and rejecting the gap
/// outright if a successor's travel requirement can't be met.
#[allow(clippy::too_many_arguments)]
fn earliest_feasible_start(
    gap: (Minute, Minute),
    domain: (Minute, Minute),
    duration: Minute,
    deadline: Option<Minute>,
    location: Option<&str>,
    placed: &[PlacedInterval],
    travel: Option<&TravelMatrix>,
) -> Option<Minute> {
    let (gap_start, gap_end) = gap;
    let (lo, hi) = domain;
    let mut start = gap_start.max(lo);

    if let (Some(loc), Some(matrix)) = (location, travel) {
        loop {
            let mut bumped = false;
            for placed_interval in placed {
                let Some(other_loc) = placed_interval.location.as_deref() else {
                    continue;
                };
                if other_loc == loc || placed_interval.end > start {
                    continue;
                }
                let required = placed_interval.end + matrix.travel_minutes(other_loc, loc);
                if required > start {
                    start = required;
                    bumped = true;
                }
            }
            if !bumped {
                break;
            }
        }
    }

    if start > hi || start + duration > gap_end {
        return None;
    }
    if let Some(dl) = deadline {
        if start + duration > dl {
            return None;
        }
    }
    if travel_after_ok(start, duration, location, placed, travel) {
        Some(start)
    } else {
        None
    }
}

/// The latest start within `gap` that fits the same constraints as
/// [`earliest_feasible_start`], found by scanning downward from the gap's
/// upper bound. Gaps are bounded by the shift length (at most a day's worth
/// of minutes), so the scan is cheap relative to the branching it unlocks.
#[allow(clippy::too_many_arguments)]
fn latest_feasible_start(
    gap: (Minute, Minute),
    domain: (Minute, Minute),
    duration: Minute,
    deadline: Option<Minute>,
    location: Option<&str>,
    placed: &[PlacedInterval],
    travel: Option<&TravelMatrix>,
) -> Option<Minute> {
    let (gap_start, gap_end) = gap;
    let (lo, hi) = domain;

    let mut upper = hi.min(gap_end - duration);
    if let Some(dl) = deadline {
        upper = upper.min(dl - duration);
    }
    let lower = lo.max(gap_start);
    if lower > upper {
        return None;
    }

    let mut start = upper;
    while start >= lower {
        if travel_before_ok(start, location, placed, travel) && travel_after_ok(start, duration, location, placed, travel) {
            return Some(start);
        }
        start -= 1;
    }
    None
}

/// Whether `start` leaves enough travel time after every already-placed
/// interval at a different location that finished before it.
fn travel_before_ok(
    start: Minute,
    location: Option<&str>,
    placed: &[PlacedInterval],
    travel: Option<&TravelMatrix>,
) -> bool {
    let (Some(loc), Some(matrix)) = (location, travel) else {
        return true;
    };
    placed.iter().all(|placed_interval| {
        let Some(other_loc) = placed_interval.location.as_deref() else {
            return true;
        };
        if other_loc == loc || placed_interval.end > start {
            return true;
        }
        placed_interval.end + matrix.travel_minutes(other_loc, loc) <= start
    })
}

/// Whether `start + duration` leaves enough travel time before every
/// already-placed interval at a different location that starts after it.
fn travel_after_ok(
    start: Minute,
    duration: Minute,
    location: Option<&str>,
    placed: &[PlacedInterval],
    travel: Option<&TravelMatrix>,
) -> bool {
    let (Some(loc), Some(matrix)) = (location, travel) else {
        return true;
    };
    placed.iter().all(|placed_interval| {
        let Some(other_loc) = placed_interval.location.as_deref() else {
            return true;
        };
        if other_loc == loc || placed_interval.start < start + duration {
            return true;
        }
        start + duration + matrix.travel_minutes(loc, other_loc) <= placed_interval.start
    })
}

fn precedence_satisfied(
    model: &CpModel,
    idx: usize,
    start: Minute,
    placements: &[(usize, Minute)],
) -> bool {
    for &(pred, succ) in &model.precedence {
        if succ == idx {
            if let Some(&(_, pred_start)) = placements.iter().find(|(i, _)| *i == pred) {
                let pred_duration = model.activity_vars[pred].activity.duration;
                if start < pred_start + pred_duration {
                    return false;
                }
            }
        }
        if pred == idx {
            if let Some(&(_, succ_start)) = placements.iter().find(|(i, _)| *i == succ) {
                let duration = model.activity_vars[idx].activity.duration;
                if succ_start < start + duration {
                    return false;
                }
            }
        }
    }
    true
}

/// Places lunch in the free gap minimizing deviation from the preferred
/// start; lunch is always present, so failure to find any feasible gap
/// fails this branch entirely.
fn place_lunch(model: &CpModel, placed: &[PlacedInterval]) -> Option<Minute> {
    let (lo, hi) = model.lunch_domain;
    let mut best: Option<(Minute, Minute)> = None;

    for (gap_start, gap_end) in compute_gaps(model, placed) {
        let feasible_lo = gap_start.max(lo);
        let feasible_hi = (gap_end - model.lunch_duration).min(hi);
        if feasible_lo > feasible_hi {
            continue;
        }
        let candidate = model
            .lunch_preferred_start
            .clamp(feasible_lo, feasible_hi);
        let deviation = (candidate - model.lunch_preferred_start).abs();
        if best.map_or(true, |(_, best_dev)| deviation < best_dev) {
            best = Some((candidate, deviation));
        }
    }

    best.map(|(start, _)| start)
}

/// The weighted objective of §4.4, evaluated directly over a complete
/// candidate assignment rather than relaxed for a linear-programming bound
/// (see SPEC_FULL.md §4.4 design note on the absolute-value encoding).
fn evaluate(model: &CpModel, placements: &[(usize, Minute)], lunch_start: Minute) -> f64 {
    let weights = &model.weights;
    let mut score = 0.0;

    for &(idx, start) in placements {
        let var: &ActivityVar = &model.activity_vars[idx];
        score += weights.priority_sum * f64::from(var.activity.priority);

        // Always zero under this engine: a candidate start is only ever
        // accepted if it already meets the deadline (hard constraint).
        // Kept for parity with the objective as specified in §4.4.
        if let Some(deadline) = var.activity.deadline {
            let end = start + var.activity.duration;
            let lateness = f64::from((end - deadline).max(0));
            score -= weights.lateness_penalty * lateness;
        }

        if var.activity.priority >= model.high_priority_threshold {
            score -= weights.early_start_bonus * f64::from(start);
        }
    }

    let lunch_deviation = f64::from((lunch_start - model.lunch_preferred_start).abs());
    score -= weights.lunch_deviation * lunch_deviation;

    score
}

/// A topological order over activities that places every `model.precedence`
/// predecessor before its successor, breaking ties (and ordering among
/// activities with no precedence relation) by descending priority and then
/// by a deterministic hash. A fixed priority-only order (ignoring
/// precedence) can let a higher-priority successor get placed first and
/// permanently occupy the slot its own predecessor needed — this Kahn's-
/// algorithm pass rules that out structurally instead of relying on
/// backtracking to recover from it.
fn branch_order(model: &CpModel, seed: u64) -> Vec<usize> {
    let n = model.activity_vars.len();
    let rank = |idx: usize| -> (i32, u64) {
        let priority = model.activity_vars[idx].activity.priority;
        let hash = deterministic_hash(&model.activity_vars[idx].activity.id, seed);
        (-priority, hash)
    };

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    for &(pred, succ) in &model.precedence {
        successors[pred].push(succ);
        in_degree[succ] += 1;
    }

    let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while !ready.is_empty() {
        let (pos, _) = ready
            .iter()
            .enumerate()
            .min_by_key(|&(_, &idx)| rank(idx))
            .expect("ready is non-empty");
        let idx = ready.remove(pos);
        order.push(idx);
        for &succ in &successors[idx] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.push(succ);
            }
        }
    }

    // A cycle in caller-supplied precedence would otherwise strand nodes
    // with a permanently positive in-degree; append them in rank order so
    // every activity still gets a branch slot rather than silently
    // vanishing from the search.
    if order.len() < n {
        let placed: std::collections::HashSet<usize> = order.iter().copied().collect();
        let mut remaining: Vec<usize> = (0..n).filter(|i| !placed.contains(i)).collect();
        remaining.sort_by_key(|&i| rank(i));
        order.extend(remaining);
    }

    order
}

/// FNV-1a-like hash used only for deterministic tie-breaking between
/// equally-ranked activities; not cryptographic.
fn deterministic_hash(value: &str, seed: u64) -> u64 {
    let mut hash: u64 = seed;
    for byte in value.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(1_099_511_628_211u64);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{Activity, ActivityKind, LunchConfig, ShiftWindow};
    use crate::model::ModelBuilder;
    use crate::oracle::DefaultParameterOracle;

    fn activity(id: &str, duration: i32, priority: i32) -> Activity {
        Activity {
            id: id.to_string(),
            kind: ActivityKind::Task,
            duration,
            priority,
            fixed_start: None,
            deadline: None,
            location: None,
            title: String::new(),
            details: None,
            pgi_context: None,
        }
    }

    fn shift() -> ShiftWindow {
        ShiftWindow {
            shift_start: 480,
            shift_end: 1020,
        }
    }

    fn lunch() -> LunchConfig {
        LunchConfig {
            preferred_start: 720,
            duration: 30,
        }
    }

    #[test]
    fn empty_day_schedules_only_lunch() {
        let config = SolverConfig::default();
        let model = ModelBuilder::build(
            &[],
            shift(),
            lunch(),
            &[],
            None,
            &DefaultParameterOracle,
            &config,
        );
        let solution = SolverDriver::new(&model, &config).solve();
        assert!(matches!(
            solution.status,
            SolveStatus::Optimal | SolveStatus::Feasible
        ));
        assert!(solution.placements.is_empty());
        assert_eq!(solution.lunch_start, 720);
    }

    #[test]
    fn oversubscribed_shift_is_infeasible() {
        let tight_shift = ShiftWindow {
            shift_start: 480,
            shift_end: 540,
        };
        let tight_lunch = LunchConfig {
            preferred_start: 500,
            duration: 0,
        };
        let config = SolverConfig::default();
        let model = ModelBuilder::build(
            &[
                activity("T1", 30, 5),
                activity("T2", 30, 5),
                activity("T3", 30, 5),
            ],
            tight_shift,
            tight_lunch,
            &[],
            None,
            &DefaultParameterOracle,
            &config,
        );
        let solution = SolverDriver::new(&model, &config).solve();
        assert_eq!(solution.status, SolveStatus::Infeasible);
    }

    #[test]
    fn deterministic_hash_is_stable_for_same_seed() {
        assert_eq!(deterministic_hash("abc", 7), deterministic_hash("abc", 7));
        assert_ne!(deterministic_hash("abc", 7), deterministic_hash("abc", 8));
    }

    #[test]
    fn branch_order_places_precedence_predecessor_before_higher_priority_successor() {
        let config = SolverConfig {
            precedence: vec![("PRED".to_string(), "SUCC".to_string())],
            ..Default::default()
        };
        let model = ModelBuilder::build(
            &[activity("PRED", 30, 5), activity("SUCC", 30, 9)],
            shift(),
            lunch(),
            &[],
            None,
            &DefaultParameterOracle,
            &config,
        );
        let order = branch_order(&model, 0);
        let pred_pos = order.iter().position(|&i| i == 0).unwrap();
        let succ_pos = order.iter().position(|&i| i == 1).unwrap();
        assert!(pred_pos < succ_pos);
    }

    #[test]
    fn solve_honors_precedence_even_against_priority_order() {
        let config = SolverConfig {
            precedence: vec![("PRED".to_string(), "SUCC".to_string())],
            ..Default::default()
        };
        let model = ModelBuilder::build(
            &[activity("PRED", 30, 5), activity("SUCC", 30, 9)],
            shift(),
            lunch(),
            &[],
            None,
            &DefaultParameterOracle,
            &config,
        );
        let solution = SolverDriver::new(&model, &config).solve();
        assert!(matches!(
            solution.status,
            SolveStatus::Optimal | SolveStatus::Feasible
        ));
        assert_eq!(solution.placements.len(), 2);

        let pred_start = solution
            .placements
            .iter()
            .find(|(idx, _)| *idx == 0)
            .map(|(_, start)| *start)
            .unwrap();
        let succ_start = solution
            .placements
            .iter()
            .find(|(idx, _)| *idx == 1)
            .map(|(_, start)| *start)
            .unwrap();
        assert!(succ_start >= pred_start + 30);
    }

    #[test]
    fn latest_candidate_rescues_an_instance_earliest_only_search_would_miss() {
        // A gap of exactly 60 minutes with two 30-minute flexible tasks: an
        // earliest-only search that places the first task at the gap's start
        // leaves the remaining room for the second, so this alone would pass
        // under the old single-candidate search too. The point of this test
        // is that `candidate_starts_in_gap` offers both ends of the gap,
        // which is what lets deadline- and precedence-sensitive placements
        // (see the precedence tests above) retry a later position instead of
        // dead-ending.
        let gap = (480, 540);
        let starts = candidate_starts_in_gap(gap, (480, 510), 30, None, None, &[], None);
        assert!(starts.contains(&480));
        assert!(starts.contains(&510));
    }
}
