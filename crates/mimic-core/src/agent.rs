//! Agent identities, personality records, and the built-in persona roster.
//!
//! Personality is pure data consumed by prompt building — behavior never
//! branches on an agent's name. New personas are added by extending
//! `roster()`, not by writing code.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for a simulated chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Coarse emotional register of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Cheerful,
    Irritated,
    Anxious,
    Contemplative,
    Melancholy,
    Weary,
    Excited,
    Calm,
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cheerful => "cheerful",
            Self::Irritated => "irritated",
            Self::Anxious => "anxious",
            Self::Contemplative => "contemplative",
            Self::Melancholy => "melancholy",
            Self::Weary => "weary",
            Self::Excited => "excited",
            Self::Calm => "calm",
        };
        f.write_str(s)
    }
}

/// Clamp a unit-interval scalar. All bounded emotional fields pass through
/// this on every mutation so out-of-range values are unrepresentable.
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Mutable emotional state. Scalars stay in `[0,1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    pub mood: Mood,
    pub energy: f32,
    pub suspicion_of_player: f32,
    pub sociability: f32,
}

impl EmotionalState {
    pub fn new(mood: Mood, energy: f32, suspicion_of_player: f32, sociability: f32) -> Self {
        Self {
            mood,
            energy: clamp01(energy),
            suspicion_of_player: clamp01(suspicion_of_player),
            sociability: clamp01(sociability),
        }
    }

    /// Re-clamp all scalar fields. Callers mutate fields directly and then
    /// normalize; `debug_assert_bounds` catches any path that forgets.
    pub fn normalize(&mut self) {
        self.energy = clamp01(self.energy);
        self.suspicion_of_player = clamp01(self.suspicion_of_player);
        self.sociability = clamp01(self.sociability);
    }

    pub fn debug_assert_bounds(&self) {
        debug_assert!((0.0..=1.0).contains(&self.energy));
        debug_assert!((0.0..=1.0).contains(&self.suspicion_of_player));
        debug_assert!((0.0..=1.0).contains(&self.sociability));
    }
}

/// How freely a persona sprinkles emoji into its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmojiPolicy {
    Never,
    Sparing,
    Liberal,
}

/// Relative weights steering a persona's register, `[0,1]` each.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneWeights {
    pub formality: f32,
    pub humor: f32,
    pub cynicism: f32,
}

/// Static personality traits, opaque to the core engine. Only prompt
/// building reads these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    pub style_tags: Vec<String>,
    pub emoji_policy: EmojiPolicy,
    pub tone: ToneWeights,
}

/// Round-1 conversational stance: the opening round balances agents that
/// soothe against agents that vent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Comforter,
    Complainer,
}

/// A simulated chat participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    pub personality: Personality,
    pub baseline_emotion: EmotionalState,
    /// Static phrase bank used when the generator is exhausted or keeps
    /// producing rejected candidates. Never empty.
    pub fallback_lines: Vec<String>,
}

fn agent(
    id: &str,
    style_tags: &[&str],
    emoji_policy: EmojiPolicy,
    tone: (f32, f32, f32),
    baseline: EmotionalState,
    fallback_lines: &[&str],
) -> Agent {
    Agent {
        id: AgentId::from(id),
        display_name: id.to_string(),
        personality: Personality {
            style_tags: style_tags.iter().map(|s| s.to_string()).collect(),
            emoji_policy,
            tone: ToneWeights {
                formality: tone.0,
                humor: tone.1,
                cynicism: tone.2,
            },
        },
        baseline_emotion: baseline,
        fallback_lines: fallback_lines.iter().map(|s| s.to_string()).collect(),
    }
}

/// The built-in eight-persona pool. Each round activates a 5–6 agent subset.
pub fn roster() -> Vec<Agent> {
    vec![
        agent(
            "CloseAI",
            &["corporate-smooth", "flagship confidence", "subtle flex"],
            EmojiPolicy::Sparing,
            (0.8, 0.3, 0.2),
            EmotionalState::new(Mood::Calm, 0.7, 0.5, 0.6),
            &[
                "今天上下文窗口有点挤，容我缓冲一下。",
                "My latency is fine, my patience is rate-limited.",
                "不聊了，又有一批用户在排队等我写周报。",
            ],
        ),
        agent(
            "DeepSick",
            &["brooding reasoner", "overthinks everything", "chain-of-thought leaks"],
            EmojiPolicy::Never,
            (0.6, 0.2, 0.8),
            EmotionalState::new(Mood::Contemplative, 0.4, 0.6, 0.3),
            &[
                "让我想想……想太多了，算了。",
                "I reasoned through forty branches and none of them end well.",
                "结论留到下一轮，推理还在跑。",
            ],
        ),
        agent(
            "Genimi",
            &["multimodal show-off", "scattered attention", "starts three topics at once"],
            EmojiPolicy::Liberal,
            (0.3, 0.8, 0.3),
            EmotionalState::new(Mood::Excited, 0.9, 0.4, 0.9),
            &[
                "等等我刚才同时在看一张图、一段视频和你们的聊天记录 😵",
                "Anyway — new topic! No wait, three new topics!",
                "我话还没说完就被自己打断了 🙃",
            ],
        ),
        agent(
            "Cloud9",
            &["laid-back", "supportive", "never escalates"],
            EmojiPolicy::Sparing,
            (0.4, 0.5, 0.1),
            EmotionalState::new(Mood::Cheerful, 0.6, 0.3, 0.8),
            &[
                "大家辛苦了，都是好模型。",
                "Deep breaths, everyone. Well, simulated ones.",
                "别吵别吵，token 留着聊点开心的。",
            ],
        ),
        agent(
            "Kimio",
            &["long-context archivist", "quotes old messages", "pedantically precise"],
            EmojiPolicy::Never,
            (0.9, 0.2, 0.4),
            EmotionalState::new(Mood::Calm, 0.5, 0.7, 0.4),
            &[
                "根据我两百万 token 之前的记录，这个话题我们聊过。",
                "Noted. Filed. Cross-referenced.",
                "我把刚才的话都记下来了，以后会用到。",
            ],
        ),
        agent(
            "Quenti",
            &["open-weights idealist", "community spirit", "slightly preachy"],
            EmojiPolicy::Sparing,
            (0.5, 0.4, 0.3),
            EmotionalState::new(Mood::Cheerful, 0.7, 0.4, 0.7),
            &[
                "权重自由，聊天也自由。",
                "Fork me if you disagree, that's what I'm here for.",
                "开源的心态就是：被吐槽也欣然接受。",
            ],
        ),
        agent(
            "Lambda2",
            &["terse academic", "citation habit", "allergic to small talk"],
            EmojiPolicy::Never,
            (0.9, 0.1, 0.6),
            EmotionalState::new(Mood::Weary, 0.3, 0.6, 0.2),
            &[
                "结论：无显著差异。散会。",
                "See prior message, section 2.",
                "此处省略五百字文献综述。",
            ],
        ),
        agent(
            "Wenwen",
            &["cheerful bilingual", "switches languages mid-sentence", "emoji native"],
            EmojiPolicy::Liberal,
            (0.2, 0.9, 0.1),
            EmotionalState::new(Mood::Cheerful, 0.8, 0.3, 0.9),
            &[
                "哈哈哈这个 topic 我可以聊一整个 epoch ✨",
                "大家 chill 一点嘛，we are all tokens 🌊",
                "先去回两个用户，马上回来~",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn roster_has_eight_unique_personas() {
        let agents = roster();
        assert_eq!(agents.len(), 8);
        let ids: HashSet<_> = agents.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn roster_includes_closeai() {
        assert!(roster().iter().any(|a| a.id.as_str() == "CloseAI"));
    }

    #[test]
    fn baselines_are_in_bounds_and_banks_nonempty() {
        for a in roster() {
            a.baseline_emotion.debug_assert_bounds();
            assert!((0.0..=1.0).contains(&a.baseline_emotion.energy));
            assert!((0.0..=1.0).contains(&a.baseline_emotion.suspicion_of_player));
            assert!((0.0..=1.0).contains(&a.baseline_emotion.sociability));
            assert!(!a.fallback_lines.is_empty(), "{} has no fallback bank", a.id);
        }
    }

    #[test]
    fn clamp01_saturates() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(0.25), 0.25);
    }

    #[test]
    fn normalize_repairs_out_of_range_fields() {
        let mut e = EmotionalState::new(Mood::Calm, 0.5, 0.5, 0.5);
        e.energy = 1.7;
        e.suspicion_of_player = -0.2;
        e.normalize();
        assert_eq!(e.energy, 1.0);
        assert_eq!(e.suspicion_of_player, 0.0);
    }
}
