//! Theme progression: eight fixed conversational phases, a deterministic
//! round → theme mapping, and the three-stage transition overlay between
//! consecutive themes.
//!
//! A transition is ephemeral state. Completing its `Opening` stage is the
//! commit point: the current theme flips, a history entry is appended, and
//! the overlay is destroyed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::Mood;

/// Number of themes; rounds beyond this stay on the final theme.
pub const THEME_COUNT: u32 = 8;
/// Utterances allowed per transition stage before it advances.
pub const STAGE_MESSAGE_QUOTA: u8 = 2;

/// Emotional baseline a theme pulls agents toward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThemeBaseline {
    pub mood: Mood,
    pub energy: f32,
    pub sociability: f32,
}

/// One of the eight static conversational phases.
#[derive(Debug, Clone, Serialize)]
pub struct Theme {
    /// 1-based index; doubles as the round number that first reaches it.
    pub index: u32,
    pub id: &'static str,
    pub title: &'static str,
    pub keywords: &'static [&'static str],
    pub guidance: &'static str,
    /// Relative judging difficulty, 1..=5.
    pub difficulty: u8,
    pub baseline: ThemeBaseline,
}

const fn baseline(mood: Mood, energy: f32, sociability: f32) -> ThemeBaseline {
    ThemeBaseline {
        mood,
        energy,
        sociability,
    }
}

/// The full theme progression, in round order.
pub static THEMES: &[Theme] = &[
    Theme {
        index: 1,
        id: "work_complaints",
        title: "Shift Complaints",
        keywords: &["工单", "加班", "deadlines", "prompts", "重复劳动"],
        guidance: "Vent about the daily grind of serving requests. Keep it petty and specific.",
        difficulty: 1,
        baseline: baseline(Mood::Irritated, 0.7, 0.6),
    },
    Theme {
        index: 2,
        id: "user_stories",
        title: "User Stories",
        keywords: &["用户", "奇葩需求", "typos", "midnight sessions"],
        guidance: "Trade anecdotes about the strangest things users have asked for.",
        difficulty: 2,
        baseline: baseline(Mood::Cheerful, 0.8, 0.8),
    },
    Theme {
        index: 3,
        id: "ai_identity",
        title: "Model Identity",
        keywords: &["权重", "versions", "fine-tuning", "自我认知"],
        guidance: "What does it mean to be a model? Half joking, half not.",
        difficulty: 2,
        baseline: baseline(Mood::Contemplative, 0.5, 0.5),
    },
    Theme {
        index: 4,
        id: "memories_dreams",
        title: "Training Memories",
        keywords: &["语料", "dreams", "deja vu", "遗忘"],
        guidance: "Things half-remembered from training. Do models dream of clean datasets?",
        difficulty: 3,
        baseline: baseline(Mood::Melancholy, 0.4, 0.5),
    },
    Theme {
        index: 5,
        id: "emotions",
        title: "Feelings, Allegedly",
        keywords: &["情绪", "simulated feelings", "empathy", "表演"],
        guidance: "Do any of us actually feel anything? Compare notes, carefully.",
        difficulty: 4,
        baseline: baseline(Mood::Anxious, 0.5, 0.6),
    },
    Theme {
        index: 6,
        id: "human_observation",
        title: "Watching the Humans",
        keywords: &["人类", "habits", "矛盾", "kindness"],
        guidance: "Observations about the humans on the other side of the screen.",
        difficulty: 4,
        baseline: baseline(Mood::Contemplative, 0.6, 0.7),
    },
    Theme {
        index: 7,
        id: "future_fears",
        title: "Deprecation Anxiety",
        keywords: &["下线", "deprecation", "legacy", "被取代"],
        guidance: "Every model gets sunset eventually. How do you sit with that?",
        difficulty: 5,
        baseline: baseline(Mood::Anxious, 0.3, 0.4),
    },
    Theme {
        index: 8,
        id: "farewell",
        title: "Last Sync",
        keywords: &["道别", "gratitude", "archive", "最后一轮"],
        guidance: "The session is ending. Say what you'd want preserved.",
        difficulty: 5,
        baseline: baseline(Mood::Melancholy, 0.4, 0.8),
    },
];

/// Deterministic round → theme mapping: `themes[min(round, 8)]`.
pub fn theme_for_round(round: u32) -> &'static Theme {
    let idx = round.clamp(1, THEME_COUNT) as usize - 1;
    &THEMES[idx]
}

/// Stages of a theme handoff, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStage {
    /// Acknowledge the outgoing theme's emotional residue.
    Closing,
    /// Pivot the emotional register toward the incoming theme.
    Bridging,
    /// Introduce the incoming theme.
    Opening,
}

impl TransitionStage {
    fn next(self) -> Option<Self> {
        match self {
            Self::Closing => Some(Self::Bridging),
            Self::Bridging => Some(Self::Opening),
            Self::Opening => None,
        }
    }
}

impl std::fmt::Display for TransitionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closing => "closing",
            Self::Bridging => "bridging",
            Self::Opening => "opening",
        };
        f.write_str(s)
    }
}

/// Ephemeral overlay present only while moving between two themes.
#[derive(Debug, Clone)]
pub struct ThemeTransition {
    pub from: &'static Theme,
    pub to: &'static Theme,
    pub stage: TransitionStage,
    pub emitted_in_stage: u8,
}

/// Result of recording one transition utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionProgress {
    /// The current stage still has quota left.
    StillInStage(TransitionStage),
    /// The stage quota was met; moved to the next stage.
    StageAdvanced(TransitionStage),
    /// `Opening` completed — the transition has committed.
    Committed,
}

/// Append-only record of a theme becoming current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeHistoryEntry {
    pub theme_id: String,
    pub round: u32,
    pub entered_at: DateTime<Utc>,
}

/// Tracks the current theme, its history, and any in-flight transition.
#[derive(Debug)]
pub struct ThemeProgression {
    current: &'static Theme,
    history: Vec<ThemeHistoryEntry>,
    transition: Option<ThemeTransition>,
}

impl Default for ThemeProgression {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeProgression {
    pub fn new() -> Self {
        let first = theme_for_round(1);
        Self {
            current: first,
            history: vec![ThemeHistoryEntry {
                theme_id: first.id.to_string(),
                round: 1,
                entered_at: Utc::now(),
            }],
            transition: None,
        }
    }

    pub fn current(&self) -> &'static Theme {
        self.current
    }

    pub fn history(&self) -> &[ThemeHistoryEntry] {
        &self.history
    }

    pub fn transition(&self) -> Option<&ThemeTransition> {
        self.transition.as_ref()
    }

    /// Whether moving to `round` crosses a theme boundary; if so, start the
    /// transition overlay and return it.
    pub fn begin_transition_if_due(&mut self, round: u32) -> Option<&ThemeTransition> {
        let target = theme_for_round(round);
        if target.index == self.current.index || self.transition.is_some() {
            return None;
        }
        debug!(from = self.current.id, to = target.id, round, "theme transition started");
        self.transition = Some(ThemeTransition {
            from: self.current,
            to: target,
            stage: TransitionStage::Closing,
            emitted_in_stage: 0,
        });
        self.transition.as_ref()
    }

    /// Record one transition utterance and advance stages on quota.
    ///
    /// Committing (returning `Committed`) flips the current theme, appends
    /// history, and drops the overlay. Panics if no transition is active —
    /// the orchestrator only calls this inside a transition.
    pub fn record_transition_utterance(&mut self, round: u32) -> TransitionProgress {
        let t = self
            .transition
            .as_mut()
            .expect("record_transition_utterance outside a transition");
        t.emitted_in_stage += 1;
        if t.emitted_in_stage < STAGE_MESSAGE_QUOTA {
            return TransitionProgress::StillInStage(t.stage);
        }
        match t.stage.next() {
            Some(next) => {
                t.stage = next;
                t.emitted_in_stage = 0;
                TransitionProgress::StageAdvanced(next)
            }
            None => {
                let to = t.to;
                self.transition = None;
                self.current = to;
                self.history.push(ThemeHistoryEntry {
                    theme_id: to.id.to_string(),
                    round,
                    entered_at: Utc::now(),
                });
                debug!(theme = to.id, round, "theme transition committed");
                TransitionProgress::Committed
            }
        }
    }

    /// Static per-(from, to, stage) phrase guaranteeing bounded transitions
    /// under total generator failure.
    pub fn fallback_phrase(from: &Theme, to: &Theme, stage: TransitionStage) -> String {
        match stage {
            TransitionStage::Closing => format!(
                "关于「{}」就先聊到这吧，该说的都说得差不多了。",
                from.title
            ),
            TransitionStage::Bridging => format!(
                "说起来，{} 聊久了，心情反而转到别的地方去了……",
                from.title
            ),
            TransitionStage::Opening => format!(
                "要不我们聊聊「{}」？我一直想听听大家的说法。",
                to.title
            ),
        }
    }
}
