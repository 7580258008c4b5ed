//! Scripted tier providers

use async_trait::async_trait;
use cellar_ratings::error::ProviderError;
use cellar_ratings::resolution::{ProviderRequest, ProviderResponse, RatingProvider, SearchArtifact};
use cellar_ratings::types::RatingCandidate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// 100-point candidate with a matched label
pub fn candidate(source: &str, score: &str, label: &str) -> RatingCandidate {
    RatingCandidate::new(source, "100pt", score).with_label(label)
}

enum Script {
    Respond(ProviderResponse),
    Fail(String),
}

/// Returns the same response (or error) on every call and records what it saw
pub struct ScriptedProvider {
    dependency: String,
    script: Script,
    available: bool,
    calls: AtomicUsize,
    seen_artifacts: Mutex<Vec<Option<SearchArtifact>>>,
}

impl ScriptedProvider {
    pub fn responding(dependency: &str, response: ProviderResponse) -> Self {
        Self::with_script(dependency, Script::Respond(response))
    }

    pub fn failing(dependency: &str, message: &str) -> Self {
        Self::with_script(dependency, Script::Fail(message.to_string()))
    }

    pub fn unavailable(dependency: &str) -> Self {
        Self {
            available: false,
            ..Self::with_script(dependency, Script::Respond(ProviderResponse::default()))
        }
    }

    fn with_script(dependency: &str, script: Script) -> Self {
        Self {
            dependency: dependency.to_string(),
            script,
            available: true,
            calls: AtomicUsize::new(0),
            seen_artifacts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prior artifact passed on each call, in order
    pub fn seen_artifacts(&self) -> Vec<Option<SearchArtifact>> {
        self.seen_artifacts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RatingProvider for ScriptedProvider {
    fn dependency(&self) -> &str {
        &self.dependency
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn attempt(&self, request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_artifacts
            .lock()
            .unwrap()
            .push(request.prior_artifact.cloned());
        match &self.script {
            Script::Respond(response) => Ok(response.clone()),
            Script::Fail(message) => Err(ProviderError::Network(message.clone())),
        }
    }
}

/// Sleeps before answering; pair with a paused clock
pub struct SlowProvider {
    pub delay: Duration,
    pub response: ProviderResponse,
    calls: AtomicUsize,
}

impl SlowProvider {
    pub fn new(delay: Duration, response: ProviderResponse) -> Self {
        Self {
            delay,
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RatingProvider for SlowProvider {
    fn dependency(&self) -> &str {
        "slow-source"
    }

    async fn attempt(&self, _request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

pub struct PanickingProvider;

#[async_trait]
impl RatingProvider for PanickingProvider {
    fn dependency(&self) -> &str {
        "panicky-source"
    }

    async fn attempt(&self, _request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError> {
        panic!("provider blew up");
    }
}
