//! Presenter contract: discrete events the core emits and collaborators
//! consume. Consumers render or log; they never feed data back except
//! through `GameSession::submit_player_answer`.

use mimic_core::agent::AgentId;
use mimic_core::theme::TransitionStage;
use mimic_core::verdict::Verdict;
use serde::Serialize;
use tokio::sync::mpsc;

/// One chat message in the current round.
#[derive(Debug, Clone, Serialize)]
pub struct Utterance {
    pub agent: AgentId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    AgentSpoke {
        agent: AgentId,
        text: String,
        round: u32,
    },
    QuestionPosed {
        agent: AgentId,
        text: String,
        round: u32,
    },
    AnswerJudged {
        /// `None` when the turn ended without a verdict (timeout, skip).
        verdict: Option<Verdict>,
        suspicion_delta: f64,
        suspicion_after: f64,
        round: u32,
    },
    ThemeTransitionStage {
        stage: TransitionStage,
        agent: AgentId,
        text: String,
    },
    RoundAdvanced {
        round: u32,
        theme_id: String,
        difficulty: u8,
    },
    GameOver {
        final_round: u32,
        final_suspicion: f64,
        reason: String,
    },
}

/// Sender half of the presenter channel. Dropped receivers are tolerated:
/// the game must progress even with no one watching.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<GameEvent>,
}

impl EventSink {
    /// Create a sink plus the receiver a presenter drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GameEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: GameEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("presenter receiver dropped; event discarded");
        }
    }
}
