//! Engine configuration, read from `MIMIC_*` environment variables.
//!
//! A missing generator endpoint is fatal at startup — the game cannot begin
//! without one — and is the only configuration error surfaced to the player.

use std::time::Duration;

use thiserror::Error;

/// Default per-call generator timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default generation attempts per agent turn before the phrase bank.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Open-mic wall-clock answer deadline.
pub const OPEN_MIC_DEADLINE: Duration = Duration::from_secs(120);
/// Open-mic questions per round before the round is forced over.
pub const OPEN_MIC_MAX_TURNS: u32 = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("generator endpoint not configured (set MIMIC_GENERATOR_URL)")]
    MissingEndpoint,
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where and how to reach the generator (OpenAI-style chat completions).
#[derive(Debug, Clone)]
pub struct GeneratorEndpoint {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Game mode. Challenge is the primary mode; open-mic only changes
/// termination rules (deadline + turn cap) over the same primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Challenge,
    OpenMic {
        answer_deadline: Duration,
        max_turns_per_round: u32,
    },
}

impl GameMode {
    pub fn open_mic() -> Self {
        Self::OpenMic {
            answer_deadline: OPEN_MIC_DEADLINE,
            max_turns_per_round: OPEN_MIC_MAX_TURNS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub endpoint: GeneratorEndpoint,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub mode: GameMode,
    /// When false, the debug skip applies no suspicion penalty.
    pub skip_penalized: bool,
    /// Fixed rng seed for reproducible sessions.
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Build from the environment. `MIMIC_GENERATOR_URL` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("MIMIC_GENERATOR_URL").map_err(|_| ConfigError::MissingEndpoint)?;
        let model =
            std::env::var("MIMIC_GENERATOR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let api_key = std::env::var("MIMIC_GENERATOR_API_KEY").ok();

        let request_timeout = match std::env::var("MIMIC_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MIMIC_TIMEOUT_SECS",
                value: v.clone(),
            })?),
            Err(_) => DEFAULT_REQUEST_TIMEOUT,
        };
        let max_attempts = match std::env::var("MIMIC_MAX_ATTEMPTS") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MIMIC_MAX_ATTEMPTS",
                value: v.clone(),
            })?,
            Err(_) => DEFAULT_MAX_ATTEMPTS,
        };
        let seed = match std::env::var("MIMIC_SEED") {
            Ok(v) => Some(v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MIMIC_SEED",
                value: v.clone(),
            })?),
            Err(_) => None,
        };

        Ok(Self {
            endpoint: GeneratorEndpoint {
                url,
                model,
                api_key,
            },
            request_timeout,
            max_attempts,
            mode: GameMode::Challenge,
            skip_penalized: true,
            seed,
        })
    }

    /// Config for tests and scripted generators; no live endpoint involved.
    pub fn for_tests(seed: u64) -> Self {
        Self {
            endpoint: GeneratorEndpoint {
                url: "http://localhost:0/v1".into(),
                model: "scripted".into(),
                api_key: None,
            },
            request_timeout: Duration::from_millis(250),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            mode: GameMode::Challenge,
            skip_penalized: true,
            seed: Some(seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_mic_defaults() {
        match GameMode::open_mic() {
            GameMode::OpenMic {
                answer_deadline,
                max_turns_per_round,
            } => {
                assert_eq!(answer_deadline, Duration::from_secs(120));
                assert_eq!(max_turns_per_round, 8);
            }
            GameMode::Challenge => panic!("expected open-mic"),
        }
    }

    #[test]
    fn test_config_is_seeded_and_fast() {
        let c = EngineConfig::for_tests(42);
        assert_eq!(c.seed, Some(42));
        assert!(c.request_timeout < Duration::from_secs(1));
    }
}
