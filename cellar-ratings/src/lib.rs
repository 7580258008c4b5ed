//! cellar-ratings library interface
//!
//! Resolves critic, competition and community ratings for wines through a
//! tiered provider waterfall, normalizes them onto a 0-100 scale, persists
//! them and derives wine-level purchase indices.

pub mod config;
pub mod db;
pub mod error;
pub mod resolution;
pub mod scoring;
pub mod services;
pub mod types;

pub use crate::error::{RatingsError, RatingsResult};
pub use crate::services::RatingsService;

use crate::config::RatingsConfig;
use crate::resolution::{
    CircuitBreaker, IdentityValidator, RatingProvider, SearchArtifact, TierOrchestrator,
    VintageSensitivityFilter,
};
use crate::services::{TelemetrySink, TtlCache};
use crate::types::Tier;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Assemble the orchestrator and service from configuration
///
/// Providers are supplied by the embedding application, one per tier.
pub struct PipelineBuilder {
    config: RatingsConfig,
    providers: Vec<(Tier, Arc<dyn RatingProvider>)>,
    breaker: Option<Arc<CircuitBreaker>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    artifact_cache: Option<Arc<TtlCache<String, SearchArtifact>>>,
}

impl PipelineBuilder {
    pub fn new(config: RatingsConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            breaker: None,
            telemetry: None,
            artifact_cache: None,
        }
    }

    pub fn provider(mut self, tier: Tier, provider: Arc<dyn RatingProvider>) -> Self {
        self.providers.push((tier, provider));
        self
    }

    /// Share a breaker across pipelines; otherwise one is built from config
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Share an artifact cache; otherwise one is built with the configured TTL
    /// and sweep interval
    pub fn artifact_cache(mut self, cache: Arc<TtlCache<String, SearchArtifact>>) -> Self {
        self.artifact_cache = Some(cache);
        self
    }

    pub fn build_orchestrator(&self) -> TierOrchestrator {
        let breaker = self
            .breaker
            .clone()
            .unwrap_or_else(|| Arc::new(CircuitBreaker::new(self.config.circuit.clone())));
        let cache = self
            .artifact_cache
            .clone()
            .unwrap_or_else(|| {
                Arc::new(TtlCache::with_sweep_interval(
                    self.config.cache.artifact_ttl(),
                    self.config.cache.sweep_interval(),
                ))
            });

        let mut orchestrator = TierOrchestrator::new(
            breaker,
            IdentityValidator::new(self.config.identity.clone()),
            VintageSensitivityFilter::new(self.config.vintage.clone()),
        )
        .with_artifact_cache(cache);

        if let Some(telemetry) = &self.telemetry {
            orchestrator = orchestrator.with_telemetry(Arc::clone(telemetry));
        }
        for (tier, provider) in &self.providers {
            orchestrator =
                orchestrator.with_provider(*tier, Arc::clone(provider), self.config.tiers.for_tier(*tier));
        }
        orchestrator
    }

    pub fn build(self, pool: SqlitePool) -> RatingsService {
        let orchestrator = Arc::new(self.build_orchestrator());
        RatingsService::new(pool, orchestrator, &self.config)
    }
}
