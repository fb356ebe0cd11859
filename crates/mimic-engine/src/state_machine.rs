//! Round state machine — explicit phases and legal transition guards.
//!
//! The session advances through phases by calling `advance()`; every
//! transition is validated against the phase graph and recorded, so a replay
//! of the transition log reconstructs the exact round lifecycle. "Is the
//! session busy" is derived from the current phase rather than tracked in
//! separate boolean latches.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Phases of the round lifecycle.
///
/// Every game starts at `Idle` and terminates at `GameOver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Constructed but not started.
    Idle,
    /// Driving each active agent through one chat utterance.
    GeneratingConversation,
    /// Weighted pick of the agent that questions the player.
    SelectingQuestioner,
    /// Suspended until the player answers (or a deadline/skip fires).
    AwaitingPlayerAnswer,
    /// Generator-as-judge call plus verdict parsing.
    Judging,
    /// Applying the suspicion shift and memory updates.
    Scoring,
    /// Incrementing the round, redrawing actives, clearing scenario state.
    AdvancingRound,
    /// Running the closing/bridging/opening theme handoff.
    ThemeTransition,
    /// Terminal: suspicion ceiling reached or debug end.
    GameOver,
}

impl RoundPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver)
    }

    /// A session is busy whenever it is mid-phase; only `Idle` and
    /// `AwaitingPlayerAnswer` (and the terminal phase) are at-rest.
    pub fn is_busy(self) -> bool {
        !matches!(self, Self::Idle | Self::AwaitingPlayerAnswer | Self::GameOver)
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Legal edges of the phase graph:
/// ```text
/// Idle → GeneratingConversation
/// GeneratingConversation → SelectingQuestioner
/// SelectingQuestioner → AwaitingPlayerAnswer
/// AwaitingPlayerAnswer → Judging | Scoring       (scoring direct on timeout)
/// Judging → Scoring
/// Scoring → AdvancingRound | SelectingQuestioner  (open-mic follow-up turn)
/// AdvancingRound → ThemeTransition | GeneratingConversation
/// ThemeTransition → GeneratingConversation
/// ```
/// Additionally, any non-terminal phase may move to `GameOver`, and any
/// non-terminal phase except `Idle` may move to `AdvancingRound` — that is
/// the skip path, which must be honored at every suspension point.
fn is_legal_transition(from: RoundPhase, to: RoundPhase) -> bool {
    use RoundPhase::*;

    if from.is_terminal() {
        return false;
    }
    if to == GameOver {
        return true;
    }
    if to == AdvancingRound && from != Idle {
        return true;
    }

    matches!(
        (from, to),
        (Idle, GeneratingConversation)
            | (GeneratingConversation, SelectingQuestioner)
            | (SelectingQuestioner, AwaitingPlayerAnswer)
            | (AwaitingPlayerAnswer, Judging)
            | (AwaitingPlayerAnswer, Scoring)
            | (Judging, Scoring)
            | (Scoring, SelectingQuestioner)
            | (AdvancingRound, ThemeTransition)
            | (AdvancingRound, GeneratingConversation)
            | (ThemeTransition, GeneratingConversation)
    )
}

/// One recorded phase transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RoundPhase,
    pub to: RoundPhase,
    pub round: u32,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal phase transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: RoundPhase,
    pub to: RoundPhase,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal phase transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Tracks the current phase, enforces the graph, and logs transitions.
pub struct RoundMachine {
    current: RoundPhase,
    round: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl RoundMachine {
    pub fn new() -> Self {
        Self {
            current: RoundPhase::Idle,
            round: 1,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> RoundPhase {
        self.current
    }

    pub fn set_round(&mut self, round: u32) {
        self.round = round;
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Attempt to advance; rejects edges outside the phase graph.
    pub fn advance(&mut self, to: RoundPhase, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }
        tracing::debug!(from = %self.current, to = %to, round = self.round, "phase transition");
        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            round: self.round,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Move to `GameOver` from any non-terminal phase.
    pub fn terminate(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(RoundPhase::GameOver, Some(reason))
    }
}

impl Default for RoundMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(phase: RoundPhase) -> RoundMachine {
        RoundMachine {
            current: phase,
            round: 1,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    #[test]
    fn starts_idle_and_not_busy() {
        let m = RoundMachine::new();
        assert_eq!(m.current(), RoundPhase::Idle);
        assert!(!m.current().is_busy());
        assert!(!m.is_terminal());
    }

    #[test]
    fn happy_round_path() {
        let mut m = RoundMachine::new();
        m.advance(RoundPhase::GeneratingConversation, None).unwrap();
        m.advance(RoundPhase::SelectingQuestioner, None).unwrap();
        m.advance(RoundPhase::AwaitingPlayerAnswer, None).unwrap();
        m.advance(RoundPhase::Judging, None).unwrap();
        m.advance(RoundPhase::Scoring, Some("verdict applied")).unwrap();
        m.advance(RoundPhase::AdvancingRound, None).unwrap();
        m.advance(RoundPhase::GeneratingConversation, None).unwrap();
        assert_eq!(m.transitions().len(), 7);
    }

    #[test]
    fn theme_transition_sits_between_advance_and_chat() {
        let mut m = at(RoundPhase::AdvancingRound);
        m.advance(RoundPhase::ThemeTransition, Some("theme boundary")).unwrap();
        m.advance(RoundPhase::GeneratingConversation, None).unwrap();
    }

    #[test]
    fn timeout_scores_without_judging() {
        let mut m = at(RoundPhase::AwaitingPlayerAnswer);
        m.advance(RoundPhase::Scoring, Some("answer deadline")).unwrap();
    }

    #[test]
    fn open_mic_follow_up_question_is_legal() {
        let mut m = at(RoundPhase::Scoring);
        m.advance(RoundPhase::SelectingQuestioner, Some("open-mic turn 2")).unwrap();
    }

    #[test]
    fn skip_is_legal_from_every_suspension_point() {
        for phase in [
            RoundPhase::GeneratingConversation,
            RoundPhase::SelectingQuestioner,
            RoundPhase::AwaitingPlayerAnswer,
            RoundPhase::Judging,
            RoundPhase::Scoring,
            RoundPhase::ThemeTransition,
        ] {
            let mut m = at(phase);
            assert!(
                m.advance(RoundPhase::AdvancingRound, Some("skip")).is_ok(),
                "skip rejected from {phase}"
            );
        }
    }

    #[test]
    fn skip_is_rejected_before_start() {
        let mut m = RoundMachine::new();
        assert!(m.advance(RoundPhase::AdvancingRound, None).is_err());
    }

    #[test]
    fn game_over_reachable_from_any_non_terminal_phase() {
        for phase in [
            RoundPhase::Idle,
            RoundPhase::GeneratingConversation,
            RoundPhase::AwaitingPlayerAnswer,
            RoundPhase::Scoring,
            RoundPhase::ThemeTransition,
        ] {
            let mut m = at(phase);
            assert!(m.terminate("test").is_ok());
            assert!(m.is_terminal());
        }
    }

    #[test]
    fn terminal_phase_admits_nothing() {
        let mut m = at(RoundPhase::GameOver);
        let err = m.advance(RoundPhase::GeneratingConversation, None).unwrap_err();
        assert_eq!(err.from, RoundPhase::GameOver);
        assert!(m.terminate("again").is_err());
    }

    #[test]
    fn illegal_skip_ahead_is_rejected() {
        let mut m = RoundMachine::new();
        let err = m.advance(RoundPhase::Judging, None).unwrap_err();
        assert_eq!(err.from, RoundPhase::Idle);
        assert_eq!(err.to, RoundPhase::Judging);
    }

    #[test]
    fn busy_is_derived_from_phase() {
        assert!(!RoundPhase::Idle.is_busy());
        assert!(!RoundPhase::AwaitingPlayerAnswer.is_busy());
        assert!(!RoundPhase::GameOver.is_busy());
        assert!(RoundPhase::GeneratingConversation.is_busy());
        assert!(RoundPhase::Judging.is_busy());
    }

    #[test]
    fn transition_records_carry_round_and_reason() {
        let mut m = RoundMachine::new();
        m.set_round(3);
        m.advance(RoundPhase::GeneratingConversation, Some("round 3 start")).unwrap();
        let rec = &m.transitions()[0];
        assert_eq!(rec.round, 3);
        assert_eq!(rec.reason.as_deref(), Some("round 3 start"));
        let json = serde_json::to_string(rec).unwrap();
        let back: TransitionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to, RoundPhase::GeneratingConversation);
    }
}
