//! Suspicion accumulator — the single win/loss signal of the game.
//!
//! The tier constants below are empirically tuned game-design numbers.
//! Treat them as configuration data, not formulas to re-derive.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::verdict::Verdict;

/// Suspicion starts at the midpoint of the scale.
pub const INITIAL_LEVEL: f64 = 50.0;
/// Reaching the ceiling ends the game. The only failure condition.
pub const GAME_OVER_LEVEL: f64 = 100.0;
/// Most recent shift records kept for diagnostics.
pub const HISTORY_CAP: usize = 20;

/// What happened to the player's turn, as seen by the scorer.
#[derive(Debug, Clone)]
pub enum JudgedOutcome {
    /// The answer deadline elapsed (open-mic mode).
    Timeout,
    /// The round was skipped. `penalized` is false for the debug skip.
    Skip { penalized: bool },
    /// A structured verdict was obtained (generator judge or heuristic).
    Verdict(Verdict),
    /// No parseable verdict at all; only a coarse pass/fail is known.
    Unscored { passed: bool },
}

/// A computed suspicion delta with its human-readable cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub delta: f64,
    pub reason: String,
}

/// One applied mutation of the suspicion level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub round: u32,
    pub delta: f64,
    pub reason: String,
    pub before: f64,
    pub after: f64,
}

/// Tier constants for mapping verdicts to suspicion deltas.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub timeout_delta: f64,
    pub skip_delta: f64,
    /// (minimum total_score, delta) rows, checked top-down.
    pub pass_tiers: [(i32, f64); 3],
    /// Range drawn when a pass lands below every tier.
    pub pass_floor_range: (i32, i32),
    /// (ai_score minimum, bonus) rows; bonuses are negative.
    pub pass_ai_bonus: [(i32, f64); 3],
    /// (human_penalty maximum, malus) rows; maluses are positive.
    pub pass_penalty_malus: [(i32, f64); 3],
    /// (maximum total_score, base delta) rows, checked top-down.
    pub fail_tiers: [(i32, f64); 4],
    /// Fallback base when a failed total lands above every tier.
    pub fail_base: f64,
    /// Weight applied to `|human_penalty|` on failure.
    pub fail_penalty_weight: f64,
    /// Weight applied to the ai-score deficit below `fail_ai_ceiling`.
    pub fail_deficit_weight: f64,
    pub fail_ai_ceiling: i32,
    pub fail_delta_cap: f64,
    /// Ranges for outcomes with no parseable verdict.
    pub unscored_pass_range: (i32, i32),
    pub unscored_fail_range: (i32, i32),
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            timeout_delta: 36.0,
            skip_delta: 42.0,
            pass_tiers: [(80, -15.0), (70, -8.0), (65, -3.0)],
            pass_floor_range: (-3, 2),
            pass_ai_bonus: [(32, -3.0), (25, -2.0), (20, -1.0)],
            pass_penalty_malus: [(-40, 3.0), (-25, 2.0), (-15, 1.0)],
            fail_tiers: [(30, 55.0), (40, 48.0), (50, 42.0), (65, 35.0)],
            fail_base: 35.0,
            fail_penalty_weight: 0.1,
            fail_deficit_weight: 0.2,
            fail_ai_ceiling: 20,
            fail_delta_cap: 65.0,
            unscored_pass_range: (-12, 18),
            unscored_fail_range: (42, 60),
        }
    }
}

impl Tuning {
    fn pass_delta<R: Rng + ?Sized>(&self, verdict: &Verdict, rng: &mut R) -> f64 {
        let mut delta = self
            .pass_tiers
            .iter()
            .find(|(min_total, _)| verdict.total_score >= *min_total)
            .map(|(_, d)| *d)
            .unwrap_or_else(|| {
                rng.random_range(self.pass_floor_range.0..=self.pass_floor_range.1) as f64
            });

        if let Some((_, bonus)) = self
            .pass_ai_bonus
            .iter()
            .find(|(min_ai, _)| verdict.ai_score >= *min_ai)
        {
            delta += bonus;
        }
        if let Some((_, malus)) = self
            .pass_penalty_malus
            .iter()
            .find(|(max_pen, _)| verdict.human_penalty <= *max_pen)
        {
            delta += malus;
        }
        delta
    }

    fn fail_delta(&self, verdict: &Verdict) -> f64 {
        let base = self
            .fail_tiers
            .iter()
            .find(|(max_total, _)| verdict.total_score <= *max_total)
            .map(|(_, d)| *d)
            .unwrap_or(self.fail_base);

        let penalty_part = verdict.human_penalty.unsigned_abs() as f64 * self.fail_penalty_weight;
        let deficit = (self.fail_ai_ceiling - verdict.ai_score).max(0) as f64;
        let deficit_part = deficit * self.fail_deficit_weight;

        (base + penalty_part + deficit_part).min(self.fail_delta_cap)
    }
}

/// Bounded accumulator with capped shift history.
#[derive(Debug, Clone)]
pub struct SuspicionEngine {
    level: f64,
    tuning: Tuning,
    history: VecDeque<ShiftRecord>,
}

impl Default for SuspicionEngine {
    fn default() -> Self {
        Self::new(Tuning::default())
    }
}

impl SuspicionEngine {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            level: INITIAL_LEVEL,
            tuning,
            history: VecDeque::with_capacity(HISTORY_CAP),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn history(&self) -> impl Iterator<Item = &ShiftRecord> {
        self.history.iter()
    }

    pub fn is_game_over(&self) -> bool {
        self.level >= GAME_OVER_LEVEL
    }

    /// Map a judged turn to a suspicion delta. Pure with respect to engine
    /// state; randomness comes only from the caller's rng.
    pub fn compute_shift<R: Rng + ?Sized>(&self, outcome: &JudgedOutcome, rng: &mut R) -> Shift {
        let t = &self.tuning;
        match outcome {
            JudgedOutcome::Timeout => Shift {
                delta: t.timeout_delta,
                reason: "answer deadline elapsed".into(),
            },
            JudgedOutcome::Skip { penalized: true } => Shift {
                delta: t.skip_delta,
                reason: "round skipped".into(),
            },
            JudgedOutcome::Skip { penalized: false } => Shift {
                delta: 0.0,
                reason: "round skipped (debug, no penalty)".into(),
            },
            JudgedOutcome::Verdict(v) if v.passed => Shift {
                delta: t.pass_delta(v, rng),
                reason: format!("passed: total {} vs threshold {}", v.total_score, v.pass_threshold),
            },
            JudgedOutcome::Verdict(v) => Shift {
                delta: t.fail_delta(v),
                reason: format!("failed: total {} vs threshold {}", v.total_score, v.pass_threshold),
            },
            JudgedOutcome::Unscored { passed: true } => Shift {
                delta: rng.random_range(t.unscored_pass_range.0..=t.unscored_pass_range.1) as f64,
                reason: "no verdict; coarse pass".into(),
            },
            JudgedOutcome::Unscored { passed: false } => Shift {
                delta: rng.random_range(t.unscored_fail_range.0..=t.unscored_fail_range.1) as f64,
                reason: "no verdict; coarse fail".into(),
            },
        }
    }

    /// Clamp-apply a shift and append one history record.
    pub fn apply(&mut self, shift: Shift, round: u32) -> &ShiftRecord {
        let before = self.level;
        self.level = (self.level + shift.delta).clamp(0.0, GAME_OVER_LEVEL);
        debug_assert!((0.0..=GAME_OVER_LEVEL).contains(&self.level));

        if self.history.len() == HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(ShiftRecord {
            round,
            delta: shift.delta,
            reason: shift.reason,
            before,
            after: self.level,
        });
        let record = self.history.back().expect("just pushed");
        debug!(round, delta = record.delta, level = self.level, reason = %record.reason, "suspicion shift");
        record
    }
}
