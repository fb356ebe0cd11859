//! Per-agent memory and emotional state: discussed topics, directed
//! relationships, player interaction history.
//!
//! Mutated only by the orchestrator on turn boundaries. Everything external
//! reads through [`AgentMemoryStore::context`] snapshots.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{clamp01, Agent, AgentId, EmotionalState, Mood};
use crate::theme::Theme;

pub const TOPICS_CAP: usize = 10;
pub const PLAYER_INTERACTIONS_CAP: usize = 8;
pub const PER_TARGET_INTERACTIONS_CAP: usize = 5;
pub const EMOTION_SAMPLES_CAP: usize = 5;
/// Blend factor pulling emotion toward a theme baseline. Partial by design:
/// per-agent drift survives theme changes.
pub const THEME_BLEND: f32 = 0.3;

/// Recent topics surfaced to prompt building.
pub const CONTEXT_TOPIC_LIMIT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub topic: String,
    pub scenario_id: Option<u32>,
    pub round: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerInteractionKind {
    /// The agent questioned the player.
    Questioned,
    /// The player's answer landed; the agent bought it.
    Convinced,
    /// The player's answer read as human.
    Suspicious,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInteraction {
    pub kind: PlayerInteractionKind,
    pub content: String,
    pub round: u32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentInteractionKind {
    Support,
    Disagree,
    Banter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInteraction {
    pub kind: AgentInteractionKind,
    pub round: u32,
    pub at: DateTime<Utc>,
}

/// Directed: owned by the source agent, about the target. Not symmetric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub closeness: f32,
    pub trust: f32,
    pub last_interaction_at: DateTime<Utc>,
    recent: VecDeque<AgentInteraction>,
}

impl Relationship {
    fn new() -> Self {
        Self {
            closeness: 0.5,
            trust: 0.5,
            last_interaction_at: Utc::now(),
            recent: VecDeque::with_capacity(PER_TARGET_INTERACTIONS_CAP),
        }
    }

    pub fn recent_interactions(&self) -> impl Iterator<Item = &AgentInteraction> {
        self.recent.iter()
    }

    fn record(&mut self, kind: AgentInteractionKind, round: u32) {
        match kind {
            AgentInteractionKind::Support => {
                self.closeness = clamp01(self.closeness + 0.1);
                self.trust = clamp01(self.trust + 0.05);
            }
            AgentInteractionKind::Disagree => {
                self.trust = clamp01(self.trust - 0.1);
            }
            AgentInteractionKind::Banter => {
                self.closeness = clamp01(self.closeness + 0.05);
            }
        }
        self.last_interaction_at = Utc::now();
        if self.recent.len() == PER_TARGET_INTERACTIONS_CAP {
            self.recent.pop_front();
        }
        self.recent.push_back(AgentInteraction {
            kind,
            round,
            at: Utc::now(),
        });
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EmotionSample {
    pub sentiment: f32,
    pub intensity: f32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct AgentRecord {
    emotion: EmotionalState,
    topics: VecDeque<TopicRecord>,
    player_interactions: VecDeque<PlayerInteraction>,
    relationships: HashMap<AgentId, Relationship>,
    emotion_samples: VecDeque<EmotionSample>,
}

impl AgentRecord {
    fn new(baseline: EmotionalState) -> Self {
        Self {
            emotion: baseline,
            topics: VecDeque::with_capacity(TOPICS_CAP),
            player_interactions: VecDeque::with_capacity(PLAYER_INTERACTIONS_CAP),
            relationships: HashMap::new(),
            emotion_samples: VecDeque::with_capacity(EMOTION_SAMPLES_CAP),
        }
    }
}

/// Read-only snapshot handed to prompt building. The core never exposes
/// mutable memory outside the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryContext {
    pub mood: Mood,
    pub energy: f32,
    pub suspicion_of_player: f32,
    pub sociability: f32,
    /// Most recent first, at most three.
    pub recent_topics: Vec<String>,
    pub relationship: Option<RelationshipView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipView {
    pub target: AgentId,
    pub closeness: f32,
    pub trust: f32,
    pub recent: Vec<AgentInteractionKind>,
}

#[derive(Debug, Default)]
pub struct AgentMemoryStore {
    records: HashMap<AgentId, AgentRecord>,
}

impl AgentMemoryStore {
    pub fn for_roster(roster: &[Agent]) -> Self {
        Self {
            records: roster
                .iter()
                .map(|a| (a.id.clone(), AgentRecord::new(a.baseline_emotion)))
                .collect(),
        }
    }

    fn record_mut(&mut self, agent: &AgentId) -> &mut AgentRecord {
        self.records
            .entry(agent.clone())
            .or_insert_with(|| AgentRecord::new(EmotionalState::new(Mood::Calm, 0.5, 0.5, 0.5)))
    }

    pub fn emotion(&self, agent: &AgentId) -> Option<&EmotionalState> {
        self.records.get(agent).map(|r| &r.emotion)
    }

    pub fn record_topic(&mut self, agent: &AgentId, topic: &str, scenario_id: Option<u32>, round: u32) {
        let rec = self.record_mut(agent);
        if rec.topics.len() == TOPICS_CAP {
            rec.topics.pop_front();
        }
        rec.topics.push_back(TopicRecord {
            topic: topic.to_string(),
            scenario_id,
            round,
            at: Utc::now(),
        });
    }

    pub fn record_agent_interaction(
        &mut self,
        from: &AgentId,
        to: &AgentId,
        kind: AgentInteractionKind,
        round: u32,
    ) {
        let rec = self.record_mut(from);
        rec.relationships
            .entry(to.clone())
            .or_insert_with(Relationship::new)
            .record(kind, round);
    }

    /// Record a player-facing interaction and shift the agent's suspicion
    /// of the player accordingly.
    pub fn record_player_interaction(
        &mut self,
        agent: &AgentId,
        kind: PlayerInteractionKind,
        content: &str,
        round: u32,
    ) {
        let rec = self.record_mut(agent);
        match kind {
            PlayerInteractionKind::Convinced => {
                rec.emotion.suspicion_of_player = clamp01(rec.emotion.suspicion_of_player - 0.15);
            }
            PlayerInteractionKind::Suspicious => {
                rec.emotion.suspicion_of_player = clamp01(rec.emotion.suspicion_of_player + 0.2);
            }
            PlayerInteractionKind::Questioned => {}
        }
        if rec.player_interactions.len() == PLAYER_INTERACTIONS_CAP {
            rec.player_interactions.pop_front();
        }
        rec.player_interactions.push_back(PlayerInteraction {
            kind,
            content: content.to_string(),
            round,
            at: Utc::now(),
        });
        rec.emotion.debug_assert_bounds();
    }

    /// Round of the most recent player interaction, if any. Questioner
    /// selection favors agents without one.
    pub fn last_player_interaction_round(&self, agent: &AgentId) -> Option<u32> {
        self.records
            .get(agent)?
            .player_interactions
            .back()
            .map(|i| i.round)
    }

    /// Nudge an agent's emotion by a sentiment sample.
    ///
    /// `sentiment` in `[-1,1]`, `intensity` in `[0,1]`. Strong samples also
    /// flip the coarse mood.
    pub fn update_emotion(&mut self, agent: &AgentId, sentiment: f32, intensity: f32) {
        let sentiment = sentiment.clamp(-1.0, 1.0);
        let intensity = clamp01(intensity);
        let rec = self.record_mut(agent);

        rec.emotion.energy = clamp01(rec.emotion.energy + 0.1 * intensity);
        rec.emotion.sociability = clamp01(rec.emotion.sociability + 0.1 * sentiment * intensity);
        if sentiment >= 0.6 && intensity >= 0.5 {
            rec.emotion.mood = Mood::Cheerful;
        } else if sentiment <= -0.6 && intensity >= 0.5 {
            rec.emotion.mood = if rec.emotion.energy < 0.4 {
                Mood::Melancholy
            } else {
                Mood::Irritated
            };
        }

        if rec.emotion_samples.len() == EMOTION_SAMPLES_CAP {
            rec.emotion_samples.pop_front();
        }
        rec.emotion_samples.push_back(EmotionSample {
            sentiment,
            intensity,
            at: Utc::now(),
        });
        rec.emotion.debug_assert_bounds();
    }

    /// Blend the agent's scalars toward the theme baseline:
    /// `v' = v·(1−f) + baseline·f` with `f = 0.3`. Never an overwrite.
    pub fn update_emotion_toward_theme(&mut self, agent: &AgentId, theme: &Theme) {
        let rec = self.record_mut(agent);
        let b = theme.baseline;
        rec.emotion.energy = clamp01(rec.emotion.energy * (1.0 - THEME_BLEND) + b.energy * THEME_BLEND);
        rec.emotion.sociability =
            clamp01(rec.emotion.sociability * (1.0 - THEME_BLEND) + b.sociability * THEME_BLEND);
        rec.emotion.mood = b.mood;
        rec.emotion.debug_assert_bounds();
    }

    /// Compose the read surface for prompt building: current emotion, up to
    /// three recent topics, and the directed relationship when a target is
    /// given.
    pub fn context(&self, agent: &AgentId, target: Option<&AgentId>) -> MemoryContext {
        let rec = self.records.get(agent);
        let (emotion, topics, relationship) = match rec {
            Some(r) => {
                let topics = r
                    .topics
                    .iter()
                    .rev()
                    .take(CONTEXT_TOPIC_LIMIT)
                    .map(|t| t.topic.clone())
                    .collect();
                let relationship = target.and_then(|t| {
                    r.relationships.get(t).map(|rel| RelationshipView {
                        target: t.clone(),
                        closeness: rel.closeness,
                        trust: rel.trust,
                        recent: rel.recent.iter().map(|i| i.kind).collect(),
                    })
                });
                (r.emotion, topics, relationship)
            }
            None => (EmotionalState::new(Mood::Calm, 0.5, 0.5, 0.5), Vec::new(), None),
        };
        MemoryContext {
            mood: emotion.mood,
            energy: emotion.energy,
            suspicion_of_player: emotion.suspicion_of_player,
            sociability: emotion.sociability,
            recent_topics: topics,
            relationship,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::roster;
    use crate::theme::theme_for_round;

    fn store() -> (AgentMemoryStore, AgentId, AgentId) {
        let roster = roster();
        let store = AgentMemoryStore::for_roster(&roster);
        (store, roster[0].id.clone(), roster[1].id.clone())
    }

    #[test]
    fn topics_evict_oldest_first() {
        let (mut store, a, _) = store();
        for i in 0..15 {
            store.record_topic(&a, &format!("topic-{i}"), None, 1);
        }
        let ctx = store.context(&a, None);
        assert_eq!(ctx.recent_topics, vec!["topic-14", "topic-13", "topic-12"]);
    }

    #[test]
    fn support_raises_closeness_and_trust() {
        let (mut store, a, b) = store();
        store.record_agent_interaction(&a, &b, AgentInteractionKind::Support, 1);
        let view = store.context(&a, Some(&b)).relationship.unwrap();
        assert!((view.closeness - 0.6).abs() < 1e-6);
        assert!((view.trust - 0.55).abs() < 1e-6);
    }

    #[test]
    fn disagree_lowers_trust_and_clamps() {
        let (mut store, a, b) = store();
        for _ in 0..20 {
            store.record_agent_interaction(&a, &b, AgentInteractionKind::Disagree, 1);
        }
        let view = store.context(&a, Some(&b)).relationship.unwrap();
        assert_eq!(view.trust, 0.0);
        // Per-target ring is capped.
        assert_eq!(view.recent.len(), PER_TARGET_INTERACTIONS_CAP);
    }

    #[test]
    fn relationships_are_directed() {
        let (mut store, a, b) = store();
        store.record_agent_interaction(&a, &b, AgentInteractionKind::Support, 1);
        assert!(store.context(&a, Some(&b)).relationship.is_some());
        assert!(store.context(&b, Some(&a)).relationship.is_none());
    }

    #[test]
    fn convinced_and_suspicious_move_player_suspicion() {
        let (mut store, a, _) = store();
        let before = store.emotion(&a).unwrap().suspicion_of_player;
        store.record_player_interaction(&a, PlayerInteractionKind::Suspicious, "hmm", 1);
        let raised = store.emotion(&a).unwrap().suspicion_of_player;
        assert!(raised > before);
        store.record_player_interaction(&a, PlayerInteractionKind::Convinced, "ok", 2);
        assert!(store.emotion(&a).unwrap().suspicion_of_player < raised);
    }

    #[test]
    fn player_interactions_ring_is_capped() {
        let (mut store, a, _) = store();
        for i in 0..12 {
            store.record_player_interaction(&a, PlayerInteractionKind::Questioned, "q", i);
        }
        assert_eq!(store.last_player_interaction_round(&a), Some(11));
    }

    #[test]
    fn theme_blend_is_partial_not_snap() {
        let (mut store, a, _) = store();
        let theme = theme_for_round(7); // baseline energy 0.3
        let before = store.emotion(&a).unwrap().energy;
        store.update_emotion_toward_theme(&a, theme);
        let after = store.emotion(&a).unwrap().energy;
        let expected = before * 0.7 + 0.3 * 0.3;
        assert!((after - expected).abs() < 1e-6);
        assert_ne!(after, theme.baseline.energy);
    }

    #[test]
    fn repeated_blends_converge_toward_baseline() {
        let (mut store, a, _) = store();
        let theme = theme_for_round(7);
        for _ in 0..50 {
            store.update_emotion_toward_theme(&a, theme);
        }
        let e = store.emotion(&a).unwrap();
        assert!((e.energy - theme.baseline.energy).abs() < 0.01);
        assert_eq!(e.mood, theme.baseline.mood);
    }

    #[test]
    fn emotion_updates_stay_bounded() {
        let (mut store, a, _) = store();
        for _ in 0..30 {
            store.update_emotion(&a, 1.0, 1.0);
        }
        let e = store.emotion(&a).unwrap();
        assert!(e.energy <= 1.0 && e.sociability <= 1.0);
        assert_eq!(e.mood, Mood::Cheerful);
    }

    #[test]
    fn context_for_unknown_agent_is_neutral() {
        let (store, _, _) = store();
        let ctx = store.context(&AgentId::from("nobody"), None);
        assert!(ctx.recent_topics.is_empty());
        assert!(ctx.relationship.is_none());
        assert_eq!(ctx.energy, 0.5);
    }
}
