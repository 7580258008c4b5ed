//! Tier Orchestrator
//!
//! Runs the tier waterfall for one wine. Each tier, in order:
//! 1. skipped when cancelled, unavailable, or its circuit is open
//! 2. paced by its rate limiter (if configured)
//! 3. raced against its timeout inside the circuit breaker
//! 4. candidates run through identity validation then the vintage filter
//!
//! The first tier with surviving candidates wins and later tiers are never
//! invoked. Every tier failure (error, panic, timeout, open circuit) counts
//! as "zero candidates" so the waterfall always completes.

use super::circuit_breaker::CircuitBreaker;
use super::identity_validator::{IdentityValidator, RejectedCandidate};
use super::provider::{ProviderRequest, ProviderResponse, RatingProvider, SearchArtifact};
use super::tokens::IdentityTokenSet;
use super::vintage_filter::VintageSensitivityFilter;
use crate::error::{RatingsError, RatingsResult};
use crate::services::telemetry::{TelemetrySink, TracingTelemetry};
use crate::services::ttl_cache::TtlCache;
use crate::types::{RatingCandidate, Tier, TierOutcome, Wine};
use futures::FutureExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// `used_method` when no tier was attempted
pub const NO_METHOD: &str = "none";

/// Timeout and pacing for one tier
#[derive(Debug, Clone, PartialEq)]
pub struct TierSettings {
    /// `None` means no timeout
    pub timeout_secs: Option<u64>,
    pub requests_per_minute: Option<u32>,
}

impl TierSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn merged(mut self, raw: Option<RawTierSettings>) -> Self {
        if let Some(raw) = raw {
            if raw.timeout_secs.is_some() {
                self.timeout_secs = raw.timeout_secs;
            }
            if raw.requests_per_minute.is_some() {
                self.requests_per_minute = raw.requests_per_minute;
            }
        }
        self
    }
}

/// `[tiers]` config section
///
/// Each `[tiers.tierN]` table overrides only the keys it sets; the rest keep
/// that tier's defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(from = "RawTiersConfig")]
pub struct TiersConfig {
    pub tier1: TierSettings,
    pub tier2: TierSettings,
    pub tier3: TierSettings,
}

#[derive(Debug, Default, Deserialize)]
struct RawTierSettings {
    timeout_secs: Option<u64>,
    requests_per_minute: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTiersConfig {
    tier1: Option<RawTierSettings>,
    tier2: Option<RawTierSettings>,
    tier3: Option<RawTierSettings>,
}

impl From<RawTiersConfig> for TiersConfig {
    fn from(raw: RawTiersConfig) -> Self {
        let defaults = TiersConfig::default();
        Self {
            tier1: defaults.tier1.merged(raw.tier1),
            tier2: defaults.tier2.merged(raw.tier2),
            tier3: defaults.tier3.merged(raw.tier3),
        }
    }
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            tier1: TierSettings {
                timeout_secs: Some(15),
                requests_per_minute: None,
            },
            tier2: TierSettings {
                timeout_secs: Some(45),
                requests_per_minute: None,
            },
            // Final tier runs to completion
            tier3: TierSettings {
                timeout_secs: None,
                requests_per_minute: None,
            },
        }
    }
}

impl TiersConfig {
    pub fn for_tier(&self, tier: Tier) -> &TierSettings {
        match tier {
            Tier::Tier1 => &self.tier1,
            Tier::Tier2 => &self.tier2,
            Tier::Tier3 => &self.tier3,
        }
    }
}

/// Outcome of one waterfall run
#[derive(Debug, Clone, Default)]
pub struct ResolutionOutcome {
    /// Identity-valid, vintage-filtered candidates from the winning tier
    pub ratings: Vec<RatingCandidate>,
    /// Winning tier tag, else the last tier attempted, else [`NO_METHOD`]
    pub used_method: String,
    pub winning_tier: Option<Tier>,
    pub search_notes: Vec<String>,
    pub tasting_notes: Option<String>,
    /// Candidates declined by identity validation or the vintage filter
    pub rejected: Vec<RejectedCandidate>,
    pub tier_outcomes: Vec<TierOutcome>,
    /// Cancellation stopped the waterfall before every tier was considered
    pub cancelled: bool,
}

impl ResolutionOutcome {
    pub fn notes(&self) -> String {
        self.search_notes.join(" | ")
    }
}

struct TierSlot {
    tier: Tier,
    provider: Arc<dyn RatingProvider>,
    timeout: Option<Duration>,
    limiter: Option<DefaultDirectRateLimiter>,
}

/// Sequential tier waterfall
pub struct TierOrchestrator {
    slots: Vec<TierSlot>,
    breaker: Arc<CircuitBreaker>,
    validator: IdentityValidator,
    vintage_filter: VintageSensitivityFilter,
    telemetry: Arc<dyn TelemetrySink>,
    artifact_cache: Option<Arc<TtlCache<String, SearchArtifact>>>,
}

impl TierOrchestrator {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        validator: IdentityValidator,
        vintage_filter: VintageSensitivityFilter,
    ) -> Self {
        Self {
            slots: Vec::new(),
            breaker,
            validator,
            vintage_filter,
            telemetry: Arc::new(TracingTelemetry),
            artifact_cache: None,
        }
    }

    /// Register the provider for a tier, replacing any earlier one
    pub fn with_provider(
        mut self,
        tier: Tier,
        provider: Arc<dyn RatingProvider>,
        settings: &TierSettings,
    ) -> Self {
        let limiter = settings
            .requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));

        self.slots.retain(|slot| slot.tier != tier);
        self.slots.push(TierSlot {
            tier,
            provider,
            timeout: settings.timeout(),
            limiter,
        });
        self.slots.sort_by_key(|slot| slot.tier);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_artifact_cache(mut self, cache: Arc<TtlCache<String, SearchArtifact>>) -> Self {
        self.artifact_cache = Some(cache);
        self
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.slots.iter().map(|slot| slot.tier).collect()
    }

    /// Run the waterfall for one wine
    pub async fn resolve(
        &self,
        wine: &Wine,
        tokens: &IdentityTokenSet,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::default();
        let mut last_attempted: Option<Tier> = None;

        let fingerprint = tokens.fingerprint();
        let mut artifact = self
            .artifact_cache
            .as_ref()
            .and_then(|cache| cache.get(&fingerprint));

        for slot in &self.slots {
            let tier = slot.tier;
            let dependency = slot.provider.dependency();

            if cancel.is_cancelled() {
                info!(wine_id = wine.id, tier = %tier, "Resolution cancelled, no further tiers");
                outcome.search_notes.push(format!("{}: cancelled", tier));
                outcome.cancelled = true;
                break;
            }

            if !slot.provider.is_available() {
                debug!(wine_id = wine.id, tier = %tier, dependency = %dependency, "Provider unavailable, skipping");
                outcome
                    .search_notes
                    .push(format!("{}: {} unavailable", tier, dependency));
                continue;
            }

            if self.breaker.is_open(dependency) {
                debug!(wine_id = wine.id, tier = %tier, dependency = %dependency, "Circuit open, skipping");
                outcome
                    .search_notes
                    .push(format!("{}: circuit open for {}", tier, dependency));
                continue;
            }

            last_attempted = Some(tier);
            if let Some(limiter) = &slot.limiter {
                limiter.until_ready().await;
            }

            let started = Instant::now();
            let request = ProviderRequest {
                wine,
                tokens,
                prior_artifact: artifact.as_ref(),
            };
            let result = self
                .breaker
                .execute(dependency, || invoke(slot, request))
                .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    warn!(wine_id = wine.id, tier = %tier, error = %e, "Tier failed");
                    outcome.search_notes.push(format!("{}: {}", tier, e));
                    self.record(wine, tier, false, 0, latency_ms, Some(e.to_string()), &mut outcome);
                    continue;
                }
            };

            if let Some(produced) = response.artifact.clone() {
                if artifact.is_none() {
                    if let Some(cache) = &self.artifact_cache {
                        cache.insert(fingerprint.clone(), produced.clone());
                    }
                    artifact = Some(produced);
                }
            }
            if let Some(notes) = &response.search_notes {
                outcome.search_notes.push(format!("{}: {}", tier, notes));
            }
            if outcome.tasting_notes.is_none() {
                outcome.tasting_notes = response.tasting_notes.clone();
            }

            let surviving = self.screen(wine, tokens, response, &mut outcome);
            let found = surviving.len();
            self.record(wine, tier, found > 0, found, latency_ms, None, &mut outcome);

            if found > 0 {
                info!(wine_id = wine.id, tier = %tier, ratings = found, "Tier produced ratings");
                outcome.ratings = surviving;
                outcome.winning_tier = Some(tier);
                outcome.used_method = tier.method_tag().to_string();
                return outcome;
            }

            debug!(wine_id = wine.id, tier = %tier, "No surviving candidates, falling through");
        }

        outcome.used_method = last_attempted
            .map(|tier| tier.method_tag().to_string())
            .unwrap_or_else(|| NO_METHOD.to_string());
        outcome
    }

    /// Identity validation followed by the vintage filter
    fn screen(
        &self,
        wine: &Wine,
        tokens: &IdentityTokenSet,
        response: ProviderResponse,
        outcome: &mut ResolutionOutcome,
    ) -> Vec<RatingCandidate> {
        let validated = self.validator.validate(wine, tokens, response.ratings);
        outcome.rejected.extend(validated.rejected);

        let filtered = self.vintage_filter.filter(wine, validated.accepted);
        outcome.rejected.extend(filtered.dropped);
        filtered.surviving
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        wine: &Wine,
        tier: Tier,
        success: bool,
        ratings_found: usize,
        latency_ms: u64,
        error: Option<String>,
        outcome: &mut ResolutionOutcome,
    ) {
        let tier_outcome = TierOutcome {
            wine_id: wine.id,
            tier,
            used_method: tier.method_tag().to_string(),
            success,
            ratings_found,
            latency_ms,
            error,
        };
        outcome.tier_outcomes.push(tier_outcome.clone());
        self.telemetry.record(tier_outcome);
    }
}

/// One provider call raced against the tier timeout, panics caught
async fn invoke(slot: &TierSlot, request: ProviderRequest<'_>) -> RatingsResult<ProviderResponse> {
    let call = AssertUnwindSafe(slot.provider.attempt(request)).catch_unwind();

    let caught = match slot.timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| RatingsError::TierTimeout {
                tier: slot.tier,
                timeout: limit,
            })?,
        None => call.await,
    };

    match caught {
        Ok(result) => result.map_err(RatingsError::from),
        Err(_) => Err(RatingsError::Provider(format!(
            "{} provider panicked",
            slot.tier
        ))),
    }
}
