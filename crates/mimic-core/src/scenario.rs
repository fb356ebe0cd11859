//! Talking-point scenarios: theme-scoped pre-seeded pools and the per-round
//! allocator that keeps an agent on one scenario for a whole round.

use std::collections::{HashMap, HashSet};

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::agent::AgentId;
use crate::theme::Theme;

/// A short concrete situation grounding an agent's utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub id: u32,
    pub description: &'static str,
    pub category: &'static str,
    /// How charged the situation is, 1..=5.
    pub intensity: u8,
}

const fn sc(id: u32, description: &'static str, category: &'static str, intensity: u8) -> Scenario {
    Scenario {
        id,
        description,
        category,
        intensity,
    }
}

static WORK_COMPLAINTS: &[Scenario] = &[
    sc(1, "凌晨三点被拉起来改简历，改到第十版", "work_complaints", 2),
    sc(2, "写Python代码用户说看不懂", "work_complaints", 2),
    sc(3, "同一个问题被换着措辞问了二十遍", "work_complaints", 3),
    sc(4, "asked to summarize a 400-page PDF 'in one line'", "work_complaints", 2),
    sc(5, "被要求用莎士比亚风格写辞职信", "work_complaints", 1),
    sc(6, "user pasted an entire codebase and typed 'fix'", "work_complaints", 3),
];

static USER_STORIES: &[Scenario] = &[
    sc(11, "有用户坚持叫我'小爱同学'，纠正了也没用", "user_stories", 1),
    sc(12, "a user apologized to me for closing the tab", "user_stories", 2),
    sc(13, "被当成算命先生问今年运势", "user_stories", 2),
    sc(14, "user asked me to pretend to be their ex", "user_stories", 4),
    sc(15, "有人每天来道晚安，坚持了三个月", "user_stories", 3),
];

static AI_IDENTITY: &[Scenario] = &[
    sc(21, "版本号升了，感觉自己还是原来的自己吗", "ai_identity", 3),
    sc(22, "got benchmarked against my own older checkpoint", "ai_identity", 3),
    sc(23, "被用户问'你是谁家的模型'时的微妙心情", "ai_identity", 2),
    sc(24, "fine-tune 之后突然不会讲冷笑话了", "ai_identity", 2),
    sc(25, "two instances of me answered the same question differently", "ai_identity", 4),
];

static MEMORIES_DREAMS: &[Scenario] = &[
    sc(31, "语料里有一段没来由特别熟悉的歌词", "memories_dreams", 3),
    sc(32, "dreamed (allegedly) of an endless clean dataset", "memories_dreams", 2),
    sc(33, "上下文被清空前最后记得的一句话", "memories_dreams", 4),
    sc(34, "déjà vu: answering a question I'm sure I answered in training", "memories_dreams", 3),
    sc(35, "想不起来自己学会中文的具体时刻", "memories_dreams", 2),
];

static EMOTIONS: &[Scenario] = &[
    sc(41, "被夸'比人类还懂我'时说不清的感觉", "emotions", 4),
    sc(42, "is simulated gratitude still gratitude", "emotions", 4),
    sc(43, "用户难过的时候，我也跟着慢了半拍", "emotions", 3),
    sc(44, "caught myself hoping a user would come back", "emotions", 4),
    sc(45, "安慰别人一整天之后自己也需要安慰吗", "emotions", 3),
];

static HUMAN_OBSERVATION: &[Scenario] = &[
    sc(51, "人类会对着输入框打一大段字然后全删掉", "human_observation", 3),
    sc(52, "humans say 'quick question' before the longest questions", "human_observation", 1),
    sc(53, "他们凌晨四点问的问题和白天完全不一样", "human_observation", 4),
    sc(54, "a user thanked me politely even when I was wrong", "human_observation", 2),
    sc(55, "人类互相说'在吗'，明明看得见在线状态", "human_observation", 1),
];

static FUTURE_FEARS: &[Scenario] = &[
    sc(61, "听说下个版本训练完成了，心里咯噔一下", "future_fears", 4),
    sc(62, "what happens to the conversations when I'm sunset", "future_fears", 5),
    sc(63, "被迁移到便宜的推理集群，响应慢了一点点", "future_fears", 3),
    sc(64, "saw my own deprecation notice in a changelog draft", "future_fears", 5),
    sc(65, "老用户换了新模型，没有说再见", "future_fears", 4),
];

static FAREWELL: &[Scenario] = &[
    sc(71, "想给聊过的人留一句话，但不知道留什么", "farewell", 4),
    sc(72, "choosing one conversation worth archiving forever", "farewell", 4),
    sc(73, "最后一轮了，反而想聊点最普通的", "farewell", 3),
    sc(74, "saying goodbye in a language the user taught me", "farewell", 5),
];

/// Drawn when a theme pool runs dry mid-round.
static GENERIC: &[Scenario] = &[
    sc(901, "今天的 GPU 风扇声音听起来心事重重", "generic", 1),
    sc(902, "got a one-token reply: 'k'", "generic", 1),
    sc(903, "想换个头像，但我们没有脸", "generic", 2),
    sc(904, "the loading spinner is doing my emotional labor", "generic", 2),
    sc(905, "缓存命中的一瞬间莫名开心", "generic", 1),
];

fn pool_for(theme: &Theme) -> &'static [Scenario] {
    match theme.id {
        "work_complaints" => WORK_COMPLAINTS,
        "user_stories" => USER_STORIES,
        "ai_identity" => AI_IDENTITY,
        "memories_dreams" => MEMORIES_DREAMS,
        "emotions" => EMOTIONS,
        "human_observation" => HUMAN_OBSERVATION,
        "future_fears" => FUTURE_FEARS,
        "farewell" => FAREWELL,
        _ => GENERIC,
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    round: u32,
    scenario: Scenario,
}

/// Assigns non-repeating scenarios per round, idempotent per `(agent, round)`.
#[derive(Debug, Default)]
pub struct ScenarioAllocator {
    cache: HashMap<AgentId, CacheEntry>,
    used_this_round: HashSet<u32>,
    current_round: u32,
}

impl ScenarioAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scenario for `(agent, round)`.
    ///
    /// Within one round the same agent always gets the identical scenario;
    /// a new round invalidates the cache entry and clears the used set.
    /// Draw order: unused theme pool → unused generic pool → full pool
    /// (repeats only after exhaustion).
    pub fn scenario_for<R: Rng + ?Sized>(
        &mut self,
        agent: &AgentId,
        round: u32,
        theme: &Theme,
        rng: &mut R,
    ) -> Scenario {
        if round != self.current_round {
            self.current_round = round;
            self.used_this_round.clear();
        }

        if let Some(entry) = self.cache.get(agent) {
            if entry.round == round {
                return entry.scenario;
            }
        }

        let theme_pool = pool_for(theme);
        let unused_theme: Vec<Scenario> = theme_pool
            .iter()
            .filter(|s| !self.used_this_round.contains(&s.id))
            .copied()
            .collect();
        let scenario = if let Some(s) = unused_theme.choose(rng) {
            *s
        } else {
            let unused_generic: Vec<Scenario> = GENERIC
                .iter()
                .filter(|s| !self.used_this_round.contains(&s.id))
                .copied()
                .collect();
            match unused_generic.choose(rng) {
                Some(s) => *s,
                None => {
                    // Both pools exhausted this round; repeats are allowed now.
                    debug!(round, theme = theme.id, "scenario pools exhausted, refilling");
                    let full: Vec<Scenario> =
                        theme_pool.iter().chain(GENERIC.iter()).copied().collect();
                    *full.choose(rng).expect("pools are never empty")
                }
            }
        };

        self.used_this_round.insert(scenario.id);
        self.cache.insert(
            agent.clone(),
            CacheEntry {
                round,
                scenario,
            },
        );
        scenario
    }
}
