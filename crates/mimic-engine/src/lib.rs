//! Async orchestration for the impersonation game: round lifecycle,
//! generator plumbing, prompt assembly, and the presenter event stream.
//! Deterministic game rules live in `mimic-core`.

pub mod config;
pub mod events;
pub mod generator;
pub mod prompts;
pub mod session;
pub mod state_machine;

pub use config::{EngineConfig, GameMode};
pub use events::{EventSink, GameEvent, Utterance};
pub use generator::{Generator, GeneratorError, HttpGenerator, ScriptedGenerator};
pub use session::{GameSession, SessionError};
pub use state_machine::{RoundPhase, RoundMachine};
