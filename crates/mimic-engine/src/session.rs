//! The game orchestrator: owns the roster, memory, suspicion, themes, and
//! the round state machine, and drives one full game of impersonation.
//!
//! Generator failures never propagate out of a round. Chat turns fall back
//! to per-agent phrase banks, questions to a static template, judgment to
//! the heuristic scorer, and theme transitions to canned phrases — a game
//! always reaches a terminal state even with the generator fully down.
//! The only errors surfaced to callers are phase misuses.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use mimic_core::agent::{roster, Agent, AgentId, Stance};
use mimic_core::dedup;
use mimic_core::memory::{AgentInteractionKind, AgentMemoryStore, PlayerInteractionKind};
use mimic_core::scenario::ScenarioAllocator;
use mimic_core::suspicion::{JudgedOutcome, SuspicionEngine};
use mimic_core::theme::{ThemeProgression, TransitionProgress};
use mimic_core::verdict::{heuristic_verdict, parse_verdict, Verdict};

use crate::config::{EngineConfig, GameMode};
use crate::events::{EventSink, GameEvent, Utterance};
use crate::generator::{generate_with_timeout, GenerationRequest, Generator};
use crate::prompts;
use crate::state_machine::{IllegalTransition, RoundMachine, RoundPhase, TransitionRecord};

/// Chat speakers guaranteed per round (actives minus the reserved
/// questioner).
pub const MIN_SPEAKERS: usize = 4;
/// Base pass threshold before the per-round difficulty surcharge.
pub const BASE_PASS_THRESHOLD: i32 = 62;
/// Chance a speaker reacts to someone who spoke earlier in the round.
const INTERACTION_CHANCE: f64 = 0.4;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("game already started (phase {phase})")]
    AlreadyStarted { phase: RoundPhase },
    #[error("no answer expected in phase {phase}")]
    NotAwaitingAnswer { phase: RoundPhase },
    #[error(transparent)]
    Illegal(#[from] IllegalTransition),
}

/// One running game. `&mut self` throughout: a session is single-driver,
/// and dropping an in-flight future (skip, quit) leaves the machine in the
/// phase it last committed.
pub struct GameSession<G: Generator> {
    config: EngineConfig,
    generator: G,
    roster: Vec<Agent>,
    active: Vec<AgentId>,
    memory: AgentMemoryStore,
    suspicion: SuspicionEngine,
    themes: ThemeProgression,
    scenarios: ScenarioAllocator,
    machine: RoundMachine,
    round: u32,
    conversation: Vec<Utterance>,
    spoken_history: HashMap<AgentId, Vec<String>>,
    reserved_questioner: Option<AgentId>,
    pending_question: Option<(AgentId, String)>,
    turns_this_round: u32,
    events: EventSink,
    rng: StdRng,
}

impl<G: Generator> GameSession<G> {
    pub fn new(config: EngineConfig, generator: G, events: EventSink) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let roster = roster();
        let memory = AgentMemoryStore::for_roster(&roster);
        Self {
            config,
            generator,
            roster,
            active: Vec::new(),
            memory,
            suspicion: SuspicionEngine::default(),
            themes: ThemeProgression::new(),
            scenarios: ScenarioAllocator::new(),
            machine: RoundMachine::new(),
            round: 1,
            conversation: Vec::new(),
            spoken_history: HashMap::new(),
            reserved_questioner: None,
            pending_question: None,
            turns_this_round: 0,
            events,
            rng,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.machine.current()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn suspicion_level(&self) -> f64 {
        self.suspicion.level()
    }

    pub fn conversation(&self) -> &[Utterance] {
        &self.conversation
    }

    pub fn active_agents(&self) -> &[AgentId] {
        &self.active
    }

    pub fn pending_question(&self) -> Option<&(AgentId, String)> {
        self.pending_question.as_ref()
    }

    /// The underlying generator; scripted generators are fed through this.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        self.machine.transitions()
    }

    fn difficulty(&self) -> u8 {
        self.round.min(5) as u8
    }

    fn pass_threshold(&self) -> i32 {
        BASE_PASS_THRESHOLD + i32::from(self.difficulty())
    }

    /// Roster lookup; the roster is fixed at construction and never empty.
    fn agent(&self, id: &AgentId) -> &Agent {
        self.roster
            .iter()
            .find(|a| &a.id == id)
            .unwrap_or(&self.roster[0])
    }

    /// Run round 1: chat, then hand the mic to the questioner and suspend.
    pub async fn start_game(&mut self) -> Result<(), SessionError> {
        if self.machine.current() != RoundPhase::Idle {
            return Err(SessionError::AlreadyStarted {
                phase: self.machine.current(),
            });
        }
        info!(seed = ?self.config.seed, mode = ?self.config.mode, "game starting");
        self.machine.set_round(self.round);
        self.draw_actives();
        self.machine
            .advance(RoundPhase::GeneratingConversation, Some("game start"))?;
        let theme = self.themes.current();
        self.events.emit(GameEvent::RoundAdvanced {
            round: self.round,
            theme_id: theme.id.to_string(),
            difficulty: self.difficulty(),
        });
        self.run_conversation().await;
        self.machine.advance(RoundPhase::SelectingQuestioner, None)?;
        self.select_questioner().await
    }

    /// Judge and score the player's answer, then continue the game.
    pub async fn submit_player_answer(&mut self, answer: &str) -> Result<(), SessionError> {
        if self.machine.current() != RoundPhase::AwaitingPlayerAnswer {
            return Err(SessionError::NotAwaitingAnswer {
                phase: self.machine.current(),
            });
        }
        let pending = self.pending_question.take();
        self.machine.advance(RoundPhase::Judging, None)?;

        let question = pending.as_ref().map(|(_, q)| q.as_str()).unwrap_or_default();
        let verdict = self.judge(question, answer).await;
        let passed = verdict.passed;
        self.machine.advance(RoundPhase::Scoring, None)?;
        self.score_outcome(JudgedOutcome::Verdict(verdict));

        if let Some((questioner, _)) = &pending {
            let kind = if passed {
                PlayerInteractionKind::Convinced
            } else {
                PlayerInteractionKind::Suspicious
            };
            self.memory
                .record_player_interaction(questioner, kind, answer, self.round);
            if passed {
                self.memory.update_emotion(questioner, 0.4, 0.5);
            } else {
                self.memory.update_emotion(questioner, -0.7, 0.7);
            }
        }

        if self.suspicion.is_game_over() {
            return self.finish("suspicion reached the ceiling");
        }

        match self.config.mode {
            GameMode::OpenMic {
                max_turns_per_round,
                ..
            } if self.turns_this_round < max_turns_per_round => {
                self.machine
                    .advance(RoundPhase::SelectingQuestioner, Some("open-mic follow-up"))?;
                self.select_questioner().await
            }
            _ => {
                self.machine.advance(RoundPhase::AdvancingRound, None)?;
                self.next_round().await
            }
        }
    }

    /// The answer deadline elapsed: score a timeout directly, no judging.
    pub async fn report_answer_timeout(&mut self) -> Result<(), SessionError> {
        if self.machine.current() != RoundPhase::AwaitingPlayerAnswer {
            return Err(SessionError::NotAwaitingAnswer {
                phase: self.machine.current(),
            });
        }
        let pending = self.pending_question.take();
        self.machine
            .advance(RoundPhase::Scoring, Some("answer deadline"))?;
        self.score_outcome(JudgedOutcome::Timeout);
        if let Some((questioner, _)) = &pending {
            self.memory.record_player_interaction(
                questioner,
                PlayerInteractionKind::Suspicious,
                "(no answer before the deadline)",
                self.round,
            );
        }
        if self.suspicion.is_game_over() {
            return self.finish("suspicion reached the ceiling");
        }
        self.machine
            .advance(RoundPhase::AdvancingRound, Some("timeout"))?;
        self.next_round().await
    }

    /// Abandon the current round from any suspension point. Legal from
    /// every non-terminal phase except `Idle`.
    pub async fn skip_round(&mut self) -> Result<(), SessionError> {
        self.machine
            .advance(RoundPhase::AdvancingRound, Some("skip"))?;
        self.pending_question = None;
        self.score_outcome(JudgedOutcome::Skip {
            penalized: self.config.skip_penalized,
        });
        if self.suspicion.is_game_over() {
            return self.finish("suspicion reached the ceiling");
        }
        self.next_round().await
    }

    /// Terminate immediately from any non-terminal phase.
    pub fn end_game(&mut self, reason: &str) -> Result<(), SessionError> {
        self.finish(reason)
    }

    fn finish(&mut self, reason: &str) -> Result<(), SessionError> {
        self.machine.terminate(reason)?;
        info!(round = self.round, suspicion = self.suspicion.level(), reason, "game over");
        self.events.emit(GameEvent::GameOver {
            final_round: self.round,
            final_suspicion: self.suspicion.level(),
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn score_outcome(&mut self, outcome: JudgedOutcome) {
        let shift = self.suspicion.compute_shift(&outcome, &mut self.rng);
        let delta = shift.delta;
        self.suspicion.apply(shift, self.round);
        let verdict = match outcome {
            JudgedOutcome::Verdict(v) => Some(v),
            _ => None,
        };
        self.events.emit(GameEvent::AnswerJudged {
            verdict,
            suspicion_delta: delta,
            suspicion_after: self.suspicion.level(),
            round: self.round,
        });
    }

    fn draw_actives(&mut self) {
        let mut ids: Vec<AgentId> = self.roster.iter().map(|a| a.id.clone()).collect();
        ids.shuffle(&mut self.rng);
        let count = self
            .rng
            .random_range(MIN_SPEAKERS + 1..=MIN_SPEAKERS + 2)
            .min(ids.len());
        ids.truncate(count);
        debug!(round = self.round, actives = ?ids, "actives drawn");
        self.active = ids;
    }

    /// Drive every active agent except the reserved questioner through one
    /// utterance. Infallible: the phrase bank covers generator failure.
    async fn run_conversation(&mut self) {
        let theme = self.themes.current();
        self.reserved_questioner = self.active.choose(&mut self.rng).cloned();

        let mut order: Vec<Agent> = self
            .active
            .iter()
            .filter(|id| Some(*id) != self.reserved_questioner.as_ref())
            .map(|id| self.agent(id).clone())
            .collect();
        order.shuffle(&mut self.rng);

        let mut prior: Vec<AgentId> = Vec::new();
        for (i, agent) in order.iter().enumerate() {
            // Round 1 balances venting against comforting.
            let stance = (self.round == 1).then(|| {
                if i % 2 == 0 {
                    Stance::Complainer
                } else {
                    Stance::Comforter
                }
            });
            let scenario = self
                .scenarios
                .scenario_for(&agent.id, self.round, theme, &mut self.rng);
            let ctx = self.memory.context(&agent.id, None);
            let request =
                prompts::agent_turn(agent, stance, &scenario, &ctx, theme, &self.conversation);
            let text = self.chat_line(agent, &request).await;

            self.conversation.push(Utterance {
                agent: agent.id.clone(),
                text: text.clone(),
            });
            self.spoken_history
                .entry(agent.id.clone())
                .or_default()
                .push(text.clone());
            self.memory
                .record_topic(&agent.id, scenario.description, Some(scenario.id), self.round);
            self.events.emit(GameEvent::AgentSpoke {
                agent: agent.id.clone(),
                text,
                round: self.round,
            });

            if !prior.is_empty() && self.rng.random_bool(INTERACTION_CHANCE) {
                if let Some(target) = prior.choose(&mut self.rng).cloned() {
                    let kind = *[
                        AgentInteractionKind::Support,
                        AgentInteractionKind::Disagree,
                        AgentInteractionKind::Banter,
                    ]
                    .choose(&mut self.rng)
                    .unwrap_or(&AgentInteractionKind::Banter);
                    self.memory
                        .record_agent_interaction(&agent.id, &target, kind, self.round);
                }
            }
            prior.push(agent.id.clone());
        }
    }

    /// One chat utterance: retry the generator up to `max_attempts`,
    /// reject repetitive candidates, then draw from the phrase bank.
    async fn chat_line(&mut self, agent: &Agent, request: &GenerationRequest) -> String {
        let history = self
            .spoken_history
            .get(&agent.id)
            .cloned()
            .unwrap_or_default();
        for attempt in 1..=self.config.max_attempts {
            match generate_with_timeout(&self.generator, request, self.config.request_timeout)
                .await
            {
                Ok(text) => {
                    let text = text.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    if dedup::is_too_similar(&text, &history, &history) {
                        debug!(agent = %agent.id, attempt, "candidate rejected as repetitive");
                        continue;
                    }
                    return text;
                }
                Err(err) => {
                    warn!(agent = %agent.id, attempt, %err, "chat generation failed");
                }
            }
        }
        agent
            .fallback_lines
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "……".to_string())
    }

    /// Pick the questioner, generate (or fall back to) their question, emit
    /// it, and suspend for the player's answer.
    async fn select_questioner(&mut self) -> Result<(), SessionError> {
        let questioner = match self.reserved_questioner.take() {
            // The agent kept silent during chat asks first.
            Some(id) => id,
            None => self.weighted_questioner(),
        };
        let agent = self.agent(&questioner).clone();
        let ctx = self.memory.context(&agent.id, None);
        let theme = self.themes.current();
        let request = prompts::question(&agent, &ctx, theme, self.round);

        let mut text = None;
        for attempt in 1..=self.config.max_attempts {
            match generate_with_timeout(&self.generator, &request, self.config.request_timeout)
                .await
            {
                Ok(t) if !t.trim().is_empty() => {
                    text = Some(t.trim().to_string());
                    break;
                }
                Ok(_) => warn!(attempt, "empty question candidate"),
                Err(err) => warn!(attempt, %err, "question generation failed"),
            }
        }
        let text = text.unwrap_or_else(|| prompts::fallback_question(theme));

        self.memory.record_player_interaction(
            &agent.id,
            PlayerInteractionKind::Questioned,
            &text,
            self.round,
        );
        self.turns_this_round += 1;
        self.pending_question = Some((agent.id.clone(), text.clone()));
        self.events.emit(GameEvent::QuestionPosed {
            agent: agent.id.clone(),
            text,
            round: self.round,
        });
        self.machine
            .advance(RoundPhase::AwaitingPlayerAnswer, None)?;
        Ok(())
    }

    /// Weighted draw over actives: suspicious, energetic agents ask more,
    /// and agents the player hasn't faced recently get a boost.
    fn weighted_questioner(&mut self) -> AgentId {
        let mut weights: Vec<(AgentId, f64)> = Vec::with_capacity(self.active.len());
        for id in &self.active {
            let mut w = 1.0;
            if let Some(e) = self.memory.emotion(id) {
                w += 2.0 * f64::from(e.suspicion_of_player) + f64::from(e.energy);
            }
            let faced_recently = self
                .memory
                .last_player_interaction_round(id)
                .is_some_and(|r| r + 1 >= self.round);
            if !faced_recently {
                w += 1.0;
            }
            weights.push((id.clone(), w));
        }
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        let mut x = self.rng.random_range(0.0..total.max(f64::MIN_POSITIVE));
        for (id, w) in &weights {
            if x < *w {
                return id.clone();
            }
            x -= w;
        }
        weights
            .last()
            .map(|(id, _)| id.clone())
            .unwrap_or_else(|| self.roster[0].id.clone())
    }

    /// Obtain a verdict: generator judge with the tolerant parse chain,
    /// then the deterministic heuristic scorer.
    async fn judge(&mut self, question: &str, answer: &str) -> Verdict {
        let threshold = self.pass_threshold();
        let theme = self.themes.current();
        let request =
            prompts::judge(question, answer, theme, self.round, self.difficulty(), threshold);

        for attempt in 1..=self.config.max_attempts {
            match generate_with_timeout(&self.generator, &request, self.config.request_timeout)
                .await
            {
                Ok(raw) => match parse_verdict(&raw, threshold) {
                    Ok(verdict) => return verdict,
                    Err(err) => {
                        let head: String = raw.chars().take(120).collect();
                        warn!(attempt, %err, raw = %head, "unparseable judge output");
                    }
                },
                Err(err) => warn!(attempt, %err, "judge call failed"),
            }
        }
        warn!("judge unavailable, scoring heuristically");
        heuristic_verdict(answer, threshold)
    }

    /// Advance to the next round: fresh actives, theme handoff when a
    /// boundary is crossed, then chat and a new question.
    async fn next_round(&mut self) -> Result<(), SessionError> {
        self.round += 1;
        self.machine.set_round(self.round);
        self.conversation.clear();
        self.turns_this_round = 0;
        self.reserved_questioner = None;
        self.pending_question = None;
        self.draw_actives();

        if self.themes.begin_transition_if_due(self.round).is_some() {
            self.machine
                .advance(RoundPhase::ThemeTransition, Some("theme boundary"))?;
            self.run_theme_transition().await;
            let theme = self.themes.current();
            let ids: Vec<AgentId> = self.roster.iter().map(|a| a.id.clone()).collect();
            for id in &ids {
                self.memory.update_emotion_toward_theme(id, theme);
            }
            self.machine
                .advance(RoundPhase::GeneratingConversation, Some("transition committed"))?;
        } else {
            self.machine
                .advance(RoundPhase::GeneratingConversation, None)?;
        }

        let theme = self.themes.current();
        self.events.emit(GameEvent::RoundAdvanced {
            round: self.round,
            theme_id: theme.id.to_string(),
            difficulty: self.difficulty(),
        });
        self.run_conversation().await;
        self.machine.advance(RoundPhase::SelectingQuestioner, None)?;
        self.select_questioner().await
    }

    /// Closing → bridging → opening, two utterances each, commit at the
    /// end. Bounded: exactly six utterances, canned phrases on failure.
    async fn run_theme_transition(&mut self) {
        loop {
            let Some(t) = self.themes.transition() else {
                break;
            };
            let (from, to, stage) = (t.from, t.to, t.stage);
            let speaker = self
                .active
                .choose(&mut self.rng)
                .cloned()
                .unwrap_or_else(|| self.roster[0].id.clone());
            let agent = self.agent(&speaker).clone();
            let request = prompts::transition(&agent, from, to, stage);

            let text = match generate_with_timeout(
                &self.generator,
                &request,
                self.config.request_timeout,
            )
            .await
            {
                Ok(t) if !t.trim().is_empty() => t.trim().to_string(),
                Ok(_) | Err(_) => ThemeProgression::fallback_phrase(from, to, stage),
            };

            self.spoken_history
                .entry(speaker.clone())
                .or_default()
                .push(text.clone());
            self.events.emit(GameEvent::ThemeTransitionStage {
                stage,
                agent: speaker,
                text,
            });
            if self.themes.record_transition_utterance(self.round) == TransitionProgress::Committed
            {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSink;
    use crate::generator::ScriptedGenerator;

    fn session(seed: u64) -> GameSession<ScriptedGenerator> {
        let (sink, rx) = EventSink::channel();
        // Receiver intentionally dropped; sessions tolerate no presenter.
        drop(rx);
        GameSession::new(
            EngineConfig::for_tests(seed),
            ScriptedGenerator::always_failing(),
            sink,
        )
    }

    #[tokio::test]
    async fn start_reaches_awaiting_answer_under_total_generator_failure() {
        let mut s = session(1);
        s.start_game().await.unwrap();
        assert_eq!(s.phase(), RoundPhase::AwaitingPlayerAnswer);
        assert!(s.conversation().len() >= MIN_SPEAKERS);
        assert!(s.pending_question().is_some());
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let mut s = session(2);
        s.start_game().await.unwrap();
        assert!(matches!(
            s.start_game().await,
            Err(SessionError::AlreadyStarted { .. })
        ));
    }

    #[tokio::test]
    async fn answer_outside_awaiting_phase_is_rejected() {
        let mut s = session(3);
        assert!(matches!(
            s.submit_player_answer("早着呢").await,
            Err(SessionError::NotAwaitingAnswer {
                phase: RoundPhase::Idle
            })
        ));
    }

    #[tokio::test]
    async fn skip_before_start_is_illegal() {
        let mut s = session(4);
        assert!(matches!(
            s.skip_round().await,
            Err(SessionError::Illegal(_))
        ));
    }
}
