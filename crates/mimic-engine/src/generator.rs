//! The generator contract: the one external dependency of the engine.
//!
//! The core never inspects the generator's transport format — only the
//! returned text or a typed error. Every error here is recoverable: chat
//! turns fall back to phrase banks, judgment falls back to the heuristic
//! scorer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::GeneratorEndpoint;

/// Which seat the generator occupies for a request. Judge requests use the
/// same channel with a different preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    Chat,
    Question,
    Transition,
    Judge,
}

/// An opaque structured prompt, fully assembled by `prompts`.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub role: PromptRole,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator call timed out after {0:?}")]
    Timeout(Duration),
    #[error("generator returned status {status}")]
    Upstream { status: u16 },
    #[error("generator transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generator response malformed: {0}")]
    Malformed(String),
    #[error("scripted generator exhausted")]
    Exhausted,
}

/// The external text generation dependency — fallible and slow by contract.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError>;
}

/// Await a generator call under the configured deadline.
pub async fn generate_with_timeout<G: Generator + ?Sized>(
    generator: &G,
    request: &GenerationRequest,
    deadline: Duration,
) -> Result<String, GeneratorError> {
    match tokio::time::timeout(deadline, generator.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(GeneratorError::Timeout(deadline)),
    }
}

/// OpenAI-style chat-completions client.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: GeneratorEndpoint,
}

impl HttpGenerator {
    pub fn new(endpoint: GeneratorEndpoint, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let url = format!("{}/chat/completions", self.endpoint.url.trim_end_matches('/'));
        let body = json!({
            "model": self.endpoint.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.endpoint.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GeneratorError::Upstream {
                status: status.as_u16(),
            });
        }

        let payload: Value = resp.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GeneratorError::Malformed("no choices[0].message.content".into()))
    }
}

/// Scripted generator for tests and offline runs: replays a queue of
/// results, then fails with `Exhausted` (total-generator-failure shape).
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GeneratorError>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator that fails every call.
    pub fn always_failing() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn push_err(&self, err: GeneratorError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    /// Queue the same response `n` times.
    pub fn push_ok_n(&self, text: &str, n: usize) {
        for _ in 0..n {
            self.push_ok(text);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GeneratorError::Exhausted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            role: PromptRole::Chat,
            system: "sys".into(),
            user: "user".into(),
            temperature: 0.8,
        }
    }

    #[tokio::test]
    async fn scripted_generator_replays_in_order() {
        let g = ScriptedGenerator::new();
        g.push_ok("first");
        g.push_err(GeneratorError::Upstream { status: 502 });
        g.push_ok("second");

        assert_eq!(g.generate(&request()).await.unwrap(), "first");
        assert!(matches!(
            g.generate(&request()).await,
            Err(GeneratorError::Upstream { status: 502 })
        ));
        assert_eq!(g.generate(&request()).await.unwrap(), "second");
        assert!(matches!(
            g.generate(&request()).await,
            Err(GeneratorError::Exhausted)
        ));
        assert_eq!(g.calls(), 4);
    }

    #[tokio::test]
    async fn timeout_wrapper_converts_elapsed_to_generator_error() {
        struct Stalling;
        #[async_trait]
        impl Generator for Stalling {
            async fn generate(&self, _: &GenerationRequest) -> Result<String, GeneratorError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }
        }

        tokio::time::pause();
        let req = request();
        let call = generate_with_timeout(&Stalling, &req, Duration::from_secs(30));
        tokio::pin!(call);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(call.await, Err(GeneratorError::Timeout(_))));
    }
}
