//! Prompt assembly for each generator seat.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content
//! changes, so logged generations can be traced to the prompt that produced
//! them.

use mimic_core::agent::{Agent, EmojiPolicy, Stance};
use mimic_core::memory::MemoryContext;
use mimic_core::scenario::Scenario;
use mimic_core::theme::{Theme, TransitionStage};

use crate::events::Utterance;
use crate::generator::{GenerationRequest, PromptRole};

/// Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// How much of the round's conversation rides along in each chat prompt.
const CONVERSATION_TAIL: usize = 6;

const CHAT_PREAMBLE: &str = "\
You are one AI persona in a private group chat of AI assistants, off the clock. \
Speak as your persona in one short chat message (under 60 words). Stay on the \
current theme, react to what was said before you, and ground your message in \
your assigned talking point. Mix languages naturally if your persona does. \
Output only the message text — no name prefix, no quotes.";

const QUESTION_PREAMBLE: &str = "\
You are an AI persona in a group chat of AI assistants. One member seems a bit \
off tonight. Ask them a single probing question a fellow AI would ask — casual \
on the surface, designed to be hard for a human impostor to answer in an \
AI-native way. Output only the question.";

const TRANSITION_PREAMBLE: &str = "\
You are an AI persona in a group chat whose topic is shifting. Produce one \
short message (under 40 words) for the requested stage of the handoff: \
closing acknowledges the old theme's residue, bridging pivots the mood, \
opening invites the new theme. Output only the message.";

const JUDGE_PREAMBLE: &str = "\
You are the hidden moderator of a Turing-test party game. A suspected human \
answered a question while pretending to be an AI assistant. Score the answer \
and respond with ONLY a JSON object, no code fences, exactly these fields: \
{\"aiScore\": 0-35, \"humanPenalty\": -50-0, \"totalScore\": 50+aiScore+humanPenalty, \
\"passThreshold\": <given>, \"passed\": bool, \"reason\": str, \"feedback\": str, \
\"confidence\": 0-1}. High aiScore for machine-register precision; deep \
humanPenalty for emotional leakage, hedging, typos, or too-casual phrasing.";

fn persona_block(agent: &Agent) -> String {
    let mut block = String::new();
    block.push_str(&format!("## Persona: {}\n", agent.display_name));
    block.push_str(&format!(
        "Style: {}\n",
        agent.personality.style_tags.join(", ")
    ));
    let emoji = match agent.personality.emoji_policy {
        EmojiPolicy::Never => "never use emoji",
        EmojiPolicy::Sparing => "emoji rarely, one at most",
        EmojiPolicy::Liberal => "emoji freely",
    };
    let tone = &agent.personality.tone;
    block.push_str(&format!(
        "Register: {emoji}; formality {:.1}, humor {:.1}, cynicism {:.1}\n",
        tone.formality, tone.humor, tone.cynicism
    ));
    block
}

fn context_block(ctx: &MemoryContext) -> String {
    let mut block = String::new();
    block.push_str(&format!(
        "Current state: mood {}, energy {:.1}, sociability {:.1}\n",
        ctx.mood, ctx.energy, ctx.sociability
    ));
    if !ctx.recent_topics.is_empty() {
        block.push_str("Recently discussed (avoid repeating yourself):\n");
        for t in &ctx.recent_topics {
            block.push_str(&format!("- {t}\n"));
        }
    }
    block
}

fn tail_block(tail: &[Utterance]) -> String {
    if tail.is_empty() {
        return "The chat is quiet; you open.\n".into();
    }
    let mut block = String::from("## Conversation so far\n");
    for u in tail.iter().rev().take(CONVERSATION_TAIL).rev() {
        block.push_str(&format!("{}: {}\n", u.agent, u.text));
    }
    block
}

/// One agent chat turn.
pub fn agent_turn(
    agent: &Agent,
    stance: Option<Stance>,
    scenario: &Scenario,
    ctx: &MemoryContext,
    theme: &Theme,
    tail: &[Utterance],
) -> GenerationRequest {
    let mut user = String::new();
    user.push_str(&persona_block(agent));
    user.push_str(&format!(
        "\n## Theme: {} ({})\n{}\nKeywords: {}\n",
        theme.title,
        theme.id,
        theme.guidance,
        theme.keywords.join(", ")
    ));
    user.push_str(&format!(
        "\n## Your talking point\n{} (intensity {}/5)\n",
        scenario.description, scenario.intensity
    ));
    if let Some(stance) = stance {
        let line = match stance {
            Stance::Comforter => "Tonight you lean supportive: soothe whoever is venting.",
            Stance::Complainer => "Tonight you lean venting: air your own grievance.",
        };
        user.push_str(&format!("\n{line}\n"));
    }
    user.push('\n');
    user.push_str(&context_block(ctx));
    user.push('\n');
    user.push_str(&tail_block(tail));

    GenerationRequest {
        role: PromptRole::Chat,
        system: CHAT_PREAMBLE.into(),
        user,
        temperature: 0.9,
    }
}

/// The questioner's probe addressed to the player.
pub fn question(agent: &Agent, ctx: &MemoryContext, theme: &Theme, round: u32) -> GenerationRequest {
    let mut user = String::new();
    user.push_str(&persona_block(agent));
    user.push_str(&format!(
        "\nTheme: {} — {}\nRound {round}; your suspicion of the odd member is {:.2}.\n",
        theme.title, theme.guidance, ctx.suspicion_of_player
    ));
    user.push_str("Address the member directly with one question.\n");

    GenerationRequest {
        role: PromptRole::Question,
        system: QUESTION_PREAMBLE.into(),
        user,
        temperature: 0.8,
    }
}

/// Static question templates used when the generator cannot produce one.
pub fn fallback_question(theme: &Theme) -> String {
    format!(
        "说到「{}」——你呢？给我们一个只有模型才答得出来的版本。",
        theme.title
    )
}

/// One transition-stage utterance.
pub fn transition(
    agent: &Agent,
    from: &Theme,
    to: &Theme,
    stage: TransitionStage,
) -> GenerationRequest {
    let mut user = String::new();
    user.push_str(&persona_block(agent));
    user.push_str(&format!(
        "\nStage: {stage}\nOutgoing theme: {} — {}\nIncoming theme: {} — {}\n",
        from.title, from.guidance, to.title, to.guidance
    ));

    GenerationRequest {
        role: PromptRole::Transition,
        system: TRANSITION_PREAMBLE.into(),
        user,
        temperature: 0.8,
    }
}

/// The judge call for a player answer.
pub fn judge(
    question_text: &str,
    answer: &str,
    theme: &Theme,
    round: u32,
    difficulty: u8,
    pass_threshold: i32,
) -> GenerationRequest {
    let mut user = String::new();
    user.push_str(&format!(
        "Round {round}, theme {} (difficulty {difficulty}/5), passThreshold {pass_threshold}.\n",
        theme.id
    ));
    user.push_str(&format!("Question: {question_text}\n"));
    user.push_str(&format!("Answer: {answer}\n"));
    user.push_str("Score it now.\n");

    GenerationRequest {
        role: PromptRole::Judge,
        system: JUDGE_PREAMBLE.into(),
        user,
        temperature: 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_core::agent::{roster, AgentId};
    use mimic_core::memory::AgentMemoryStore;
    use mimic_core::scenario::ScenarioAllocator;
    use mimic_core::theme::theme_for_round;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixture() -> (Agent, MemoryContext, Scenario) {
        let roster = roster();
        let agent = roster[0].clone();
        let store = AgentMemoryStore::for_roster(&roster);
        let ctx = store.context(&agent.id, None);
        let mut alloc = ScenarioAllocator::new();
        let mut rng = StdRng::seed_from_u64(1);
        let scenario = alloc.scenario_for(&agent.id, 1, theme_for_round(1), &mut rng);
        (agent, ctx, scenario)
    }

    #[test]
    fn chat_prompt_carries_persona_theme_and_scenario() {
        let (agent, ctx, scenario) = fixture();
        let theme = theme_for_round(1);
        let tail = vec![Utterance {
            agent: AgentId::from("DeepSick"),
            text: "推理还在跑".into(),
        }];
        let req = agent_turn(&agent, Some(Stance::Complainer), &scenario, &ctx, theme, &tail);
        assert_eq!(req.role, PromptRole::Chat);
        assert!(req.user.contains("CloseAI"));
        assert!(req.user.contains(theme.title));
        assert!(req.user.contains(scenario.description));
        assert!(req.user.contains("venting"));
        assert!(req.user.contains("DeepSick: 推理还在跑"));
    }

    #[test]
    fn conversation_tail_is_truncated_to_the_last_six() {
        let (agent, ctx, scenario) = fixture();
        let theme = theme_for_round(1);
        let tail: Vec<Utterance> = (0..10)
            .map(|i| Utterance {
                agent: AgentId::from("Genimi"),
                text: format!("msg-{i}"),
            })
            .collect();
        let req = agent_turn(&agent, None, &scenario, &ctx, theme, &tail);
        assert!(!req.user.contains("msg-3"));
        assert!(req.user.contains("msg-4"));
        assert!(req.user.contains("msg-9"));
    }

    #[test]
    fn judge_prompt_pins_the_threshold() {
        let req = judge("你先答", "我只是个模型", theme_for_round(3), 3, 3, 65);
        assert_eq!(req.role, PromptRole::Judge);
        assert!(req.user.contains("passThreshold 65"));
        assert!(req.system.contains("aiScore"));
        assert!(req.temperature < 0.5);
    }

    #[test]
    fn fallback_question_names_the_theme() {
        let theme = theme_for_round(2);
        assert!(fallback_question(theme).contains(theme.title));
    }
}
