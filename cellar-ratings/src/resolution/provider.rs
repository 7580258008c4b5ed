//! Tier capability provider contract
//!
//! Providers live outside this crate (search APIs, page scrapers, LLM
//! extraction). Each one is registered with the orchestrator for one tier.

use super::tokens::IdentityTokenSet;
use crate::error::ProviderError;
use crate::types::{RatingCandidate, Tier, Wine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intermediate result a tier can hand to later tiers (e.g. search hits)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchArtifact {
    pub query: String,
    pub produced_by: Tier,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl SearchArtifact {
    pub fn new(query: impl Into<String>, produced_by: Tier, payload: serde_json::Value) -> Self {
        Self {
            query: query.into(),
            produced_by,
            payload,
            fetched_at: Utc::now(),
        }
    }
}

/// Everything a provider gets for one attempt
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    pub wine: &'a Wine,
    pub tokens: &'a IdentityTokenSet,
    /// Artifact from an earlier tier or a cached earlier resolution
    pub prior_artifact: Option<&'a SearchArtifact>,
}

/// What a provider found
///
/// An empty rating list with a search note is the normal way to report
/// "nothing found" or "content gated".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub ratings: Vec<RatingCandidate>,
    pub tasting_notes: Option<String>,
    pub search_notes: Option<String>,
    pub artifact: Option<SearchArtifact>,
}

impl ProviderResponse {
    pub fn found(ratings: Vec<RatingCandidate>) -> Self {
        Self {
            ratings,
            ..Self::default()
        }
    }

    pub fn nothing(note: impl Into<String>) -> Self {
        Self {
            search_notes: Some(note.into()),
            ..Self::default()
        }
    }

    pub fn with_artifact(mut self, artifact: SearchArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_tasting_notes(mut self, notes: impl Into<String>) -> Self {
        self.tasting_notes = Some(notes.into());
        self
    }

    pub fn with_search_notes(mut self, notes: impl Into<String>) -> Self {
        self.search_notes = Some(notes.into());
        self
    }
}

/// One tier's rating source
///
/// Expected misses must come back as an empty [`ProviderResponse`].
/// `Err` is for exceptional conditions only; the orchestrator treats it (and
/// panics, and timeouts) as "zero candidates from this tier".
#[async_trait]
pub trait RatingProvider: Send + Sync {
    /// Dependency name used as the circuit-breaker key
    fn dependency(&self) -> &str;

    /// Providers missing credentials or configuration report false and are skipped
    fn is_available(&self) -> bool {
        true
    }

    async fn attempt(&self, request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError>;
}
