//! Deterministic primitives for the mimic impostor-chat game.
//!
//! Everything in this crate is synchronous and free of I/O: the suspicion
//! accumulator, per-agent memory, theme progression, scenario allocation,
//! content deduplication, and verdict parsing. The async orchestration that
//! drives these lives in `mimic-engine`.

pub mod agent;
pub mod dedup;
pub mod memory;
pub mod scenario;
pub mod suspicion;
pub mod theme;
pub mod verdict;

pub use agent::{Agent, AgentId, EmotionalState, Mood, Personality, Stance};
pub use memory::{AgentMemoryStore, MemoryContext};
pub use scenario::{Scenario, ScenarioAllocator};
pub use suspicion::{JudgedOutcome, Shift, SuspicionEngine};
pub use theme::{Theme, ThemeProgression, TransitionProgress, TransitionStage};
pub use verdict::{heuristic_verdict, parse_verdict, Verdict, VerdictParseError};
