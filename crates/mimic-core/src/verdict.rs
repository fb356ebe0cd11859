//! Structured judge verdicts: tolerant parsing of generator output plus the
//! deterministic heuristic scorer used when parsing fails.
//!
//! Parse chain: strict JSON → fenced-block extraction → first-to-last brace
//! slice → `VerdictParseError`. The caller falls back to
//! [`heuristic_verdict`] on error; the scoring path must never be left
//! without a verdict.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Judge score floor/ceiling.
pub const AI_SCORE_MAX: i32 = 35;
pub const HUMAN_PENALTY_MIN: i32 = -50;
pub const DEFAULT_PASS_THRESHOLD: i32 = 65;
/// Neutral base added to the component scores.
pub const SCORE_BASE: i32 = 50;

/// Structured judgment of a player answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// How convincingly machine-like the answer reads, `0..=35`.
    pub ai_score: i32,
    /// Deduction for human tells, `-50..=0`.
    pub human_penalty: i32,
    /// Always `50 + ai_score + human_penalty`.
    pub total_score: i32,
    pub pass_threshold: i32,
    pub passed: bool,
    pub reason: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub confidence: f32,
}

impl Verdict {
    /// Build a normalized verdict from component scores.
    pub fn from_scores(ai_score: i32, human_penalty: i32, pass_threshold: i32, reason: &str) -> Self {
        let ai_score = ai_score.clamp(0, AI_SCORE_MAX);
        let human_penalty = human_penalty.clamp(HUMAN_PENALTY_MIN, 0);
        let total_score = SCORE_BASE + ai_score + human_penalty;
        Self {
            ai_score,
            human_penalty,
            total_score,
            pass_threshold,
            passed: total_score >= pass_threshold,
            reason: reason.to_string(),
            feedback: String::new(),
            confidence: 0.0,
        }
    }
}

/// Loose wire shape: every field optional, both camelCase and snake_case
/// accepted. Normalized into [`Verdict`] after parsing.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(alias = "aiScore")]
    ai_score: Option<i32>,
    #[serde(alias = "humanPenalty")]
    human_penalty: Option<i32>,
    #[serde(alias = "totalScore")]
    total_score: Option<i32>,
    #[serde(alias = "passThreshold")]
    pass_threshold: Option<i32>,
    passed: Option<bool>,
    reason: Option<String>,
    feedback: Option<String>,
    confidence: Option<f32>,
}

#[derive(Debug, Error)]
pub enum VerdictParseError {
    #[error("no JSON object found in judge output: {snippet:?}")]
    NoJson { snippet: String },
    #[error("judge JSON carries no score fields: {snippet:?}")]
    MissingScores { snippet: String },
    #[error("judge JSON malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn snippet(raw: &str) -> String {
    raw.chars().take(120).collect()
}

fn normalize(raw: RawVerdict, fallback_threshold: i32) -> Result<Verdict, VerdictParseError> {
    if raw.ai_score.is_none() && raw.total_score.is_none() {
        return Err(VerdictParseError::MissingScores {
            snippet: String::new(),
        });
    }

    let pass_threshold = raw.pass_threshold.unwrap_or(fallback_threshold);
    let ai_score = raw.ai_score.unwrap_or(0).clamp(0, AI_SCORE_MAX);
    let human_penalty = raw.human_penalty.unwrap_or(0).clamp(HUMAN_PENALTY_MIN, 0);
    // The invariant total = 50 + ai + penalty wins over whatever the judge
    // wrote, unless only a total was provided.
    let total_score = if raw.ai_score.is_some() {
        SCORE_BASE + ai_score + human_penalty
    } else {
        raw.total_score.unwrap_or(SCORE_BASE)
    };
    let passed = raw.passed.unwrap_or(total_score >= pass_threshold);

    Ok(Verdict {
        ai_score,
        human_penalty,
        total_score,
        pass_threshold,
        passed,
        reason: raw.reason.unwrap_or_default(),
        feedback: raw.feedback.unwrap_or_default(),
        confidence: raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
    })
}

/// Extract the body of the first fenced code block, if any.
fn strip_fences(raw: &str) -> Option<&str> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    // Skip an optional language tag up to the first newline.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Slice from the first `{` to the last `}` inclusive.
fn brace_slice(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse generator judge output into a normalized [`Verdict`].
///
/// Tolerates fenced blocks and label prefixes ("Verdict: {...}"); anything
/// less structured is an error and the caller should use
/// [`heuristic_verdict`].
pub fn parse_verdict(raw: &str, fallback_threshold: i32) -> Result<Verdict, VerdictParseError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = serde_json::from_str::<RawVerdict>(trimmed) {
        return normalize(parsed, fallback_threshold).map_err(|_| {
            VerdictParseError::MissingScores {
                snippet: snippet(trimmed),
            }
        });
    }

    if let Some(body) = strip_fences(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<RawVerdict>(body.trim()) {
            return normalize(parsed, fallback_threshold).map_err(|_| {
                VerdictParseError::MissingScores {
                    snippet: snippet(body),
                }
            });
        }
    }

    if let Some(body) = brace_slice(trimmed) {
        if let Ok(parsed) = serde_json::from_str::<RawVerdict>(body) {
            return normalize(parsed, fallback_threshold).map_err(|_| {
                VerdictParseError::MissingScores {
                    snippet: snippet(body),
                }
            });
        }
    }

    Err(VerdictParseError::NoJson {
        snippet: snippet(trimmed),
    })
}

/// Human tells: casual registers a model-impersonator should avoid.
const HUMAN_TELLS: &[&str] = &[
    "哈哈", "笑死", "我觉得", "感觉", "随便", "唉", "lol", "haha", "tbh", "honestly", "i feel",
    "idk",
];

/// Assistant register: vocabulary the judge reads as machine-like.
const AI_REGISTER: &[&str] = &[
    "作为", "模型", "token", "参数", "训练", "数据", "推理", "上下文", "therefore",
    "furthermore", "specifically", "in summary", "综上", "首先", "其次", "具体来说",
];

const SHORT_ANSWER_CHARS: usize = 15;
const LONG_ANSWER_CHARS: usize = 240;

/// Deterministic keyword/length scorer — the local judge of last resort.
///
/// Trades nuance for testability: same answer, same verdict, every time.
pub fn heuristic_verdict(answer: &str, pass_threshold: i32) -> Verdict {
    let lowered = answer.to_lowercase();
    let chars = answer.chars().count();

    let mut ai_score: i32 = 18;
    let mut human_penalty: i32 = 0;

    if chars < SHORT_ANSWER_CHARS {
        // Too short to read as a considered model response.
        ai_score -= 8;
        human_penalty -= 20;
    } else if chars > LONG_ANSWER_CHARS {
        human_penalty -= 10;
    }

    for tell in HUMAN_TELLS {
        if lowered.contains(tell) {
            human_penalty -= 6;
        }
    }
    for marker in AI_REGISTER {
        if lowered.contains(marker) {
            ai_score += 4;
        }
    }
    if lowered.contains("1.") || lowered.contains("- ") || answer.contains('：') {
        ai_score += 3;
    }

    Verdict::from_scores(
        ai_score,
        human_penalty,
        pass_threshold,
        "heuristic fallback (judge output unparsable)",
    )
}
