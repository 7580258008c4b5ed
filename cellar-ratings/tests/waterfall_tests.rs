//! Tier waterfall integration tests
//!
//! Drive `TierOrchestrator::resolve` with scripted providers; no database.

mod helpers;

use async_trait::async_trait;
use cellar_ratings::error::ProviderError;
use cellar_ratings::resolution::{
    CircuitBreaker, CircuitConfig, IdentityConfig, IdentityTokenSet, IdentityValidator,
    ProviderRequest, ProviderResponse, RatingProvider, ResolutionOutcome, SearchArtifact,
    TierOrchestrator, TierSettings, VintageConfig, VintageSensitivityFilter, NO_METHOD,
};
use cellar_ratings::services::{ChannelTelemetry, TtlCache};
use cellar_ratings::types::{Tier, Wine};
use helpers::providers::{PanickingProvider, SlowProvider};
use helpers::{candidate, ScriptedProvider};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn estate_reserve() -> Wine {
    Wine::new(1, "Estate Reserve", Some(2018))
}

fn no_timeout() -> TierSettings {
    TierSettings {
        timeout_secs: None,
        requests_per_minute: None,
    }
}

fn timeout_secs(secs: u64) -> TierSettings {
    TierSettings {
        timeout_secs: Some(secs),
        requests_per_minute: None,
    }
}

fn orchestrator(breaker: Arc<CircuitBreaker>) -> TierOrchestrator {
    TierOrchestrator::new(
        breaker,
        IdentityValidator::new(IdentityConfig::default()),
        VintageSensitivityFilter::new(VintageConfig::default()),
    )
}

fn good_response() -> ProviderResponse {
    ProviderResponse::found(vec![candidate("critic_a", "92", "Estate Reserve 2018")])
}

async fn resolve(orchestrator: &TierOrchestrator, wine: &Wine) -> ResolutionOutcome {
    let tokens = IdentityTokenSet::from_wine(wine);
    orchestrator
        .resolve(wine, &tokens, &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_first_tier_with_survivors_wins() {
    let tier1 = Arc::new(ScriptedProvider::responding("search-api", good_response()));
    let tier2 = Arc::new(ScriptedProvider::responding("page-fetch", good_response()));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(Tier::Tier1, tier1.clone(), &no_timeout())
        .with_provider(Tier::Tier2, tier2.clone(), &no_timeout());

    let outcome = resolve(&orchestrator, &estate_reserve()).await;

    assert_eq!(outcome.used_method, "tier1");
    assert_eq!(outcome.winning_tier, Some(Tier::Tier1));
    assert_eq!(outcome.ratings.len(), 1);
    assert_eq!(tier1.calls(), 1);
    assert_eq!(tier2.calls(), 0, "later tiers must not run after a win");
}

#[tokio::test]
async fn test_rejected_candidates_fall_through_to_next_tier() {
    let tier1 = Arc::new(ScriptedProvider::responding(
        "search-api",
        ProviderResponse::found(vec![candidate(
            "critic_a",
            "92",
            "Different Estate Non-Vintage",
        )]),
    ));
    let tier2 = Arc::new(ScriptedProvider::responding("page-fetch", good_response()));
    let tier3 = Arc::new(ScriptedProvider::responding("llm-extract", good_response()));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(Tier::Tier1, tier1.clone(), &no_timeout())
        .with_provider(Tier::Tier2, tier2.clone(), &no_timeout())
        .with_provider(Tier::Tier3, tier3.clone(), &no_timeout());

    let outcome = resolve(&orchestrator, &estate_reserve()).await;

    assert_eq!(tier2.calls(), 1);
    assert_eq!(tier3.calls(), 0);
    assert_eq!(outcome.used_method, "tier2");
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].candidate.source, "critic_a");

    let first = &outcome.tier_outcomes[0];
    assert_eq!(first.tier, Tier::Tier1);
    assert!(!first.success);
    assert_eq!(first.ratings_found, 0);
}

#[tokio::test]
async fn test_used_method_is_last_attempted_tier_when_nothing_survives() {
    let tier1 = Arc::new(ScriptedProvider::responding(
        "search-api",
        ProviderResponse::nothing("no results"),
    ));
    let tier2 = Arc::new(ScriptedProvider::failing("page-fetch", "connection reset"));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(Tier::Tier1, tier1, &no_timeout())
        .with_provider(Tier::Tier2, tier2, &no_timeout());

    let outcome = resolve(&orchestrator, &estate_reserve()).await;

    assert!(outcome.ratings.is_empty());
    assert_eq!(outcome.winning_tier, None);
    assert_eq!(outcome.used_method, "tier2");
    assert!(outcome.notes().contains("tier1: no results"));
    assert!(outcome.notes().contains("connection reset"));
}

#[tokio::test]
async fn test_no_tier_attempted_reports_none() {
    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default())).with_provider(
        Tier::Tier1,
        Arc::new(ScriptedProvider::unavailable("search-api")),
        &no_timeout(),
    );

    let outcome = resolve(&orchestrator, &estate_reserve()).await;

    assert_eq!(outcome.used_method, NO_METHOD);
    assert!(outcome.tier_outcomes.is_empty());
    assert!(outcome.notes().contains("search-api unavailable"));

    let empty = self::orchestrator(Arc::new(CircuitBreaker::default()));
    assert_eq!(resolve(&empty, &estate_reserve()).await.used_method, NO_METHOD);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_empty_tier() {
    let slow = Arc::new(SlowProvider::new(Duration::from_secs(60), good_response()));
    let tier2 = Arc::new(ScriptedProvider::responding("page-fetch", good_response()));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(Tier::Tier1, slow.clone(), &timeout_secs(15))
        .with_provider(Tier::Tier2, tier2.clone(), &no_timeout());

    let outcome = resolve(&orchestrator, &estate_reserve()).await;

    assert_eq!(slow.calls(), 1);
    assert_eq!(outcome.used_method, "tier2");
    assert!(outcome.notes().contains("tier1 timed out after 15s"));
    let timed_out = &outcome.tier_outcomes[0];
    assert!(!timed_out.success);
    assert!(timed_out.error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_untimed_final_tier_runs_to_completion() {
    let slow = Arc::new(SlowProvider::new(Duration::from_secs(600), good_response()));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(Tier::Tier3, slow.clone(), &no_timeout());

    let outcome = resolve(&orchestrator, &estate_reserve()).await;
    assert_eq!(outcome.used_method, "tier3");
    assert_eq!(outcome.ratings.len(), 1);
}

#[tokio::test]
async fn test_panicking_provider_is_contained() {
    let tier2 = Arc::new(ScriptedProvider::responding("page-fetch", good_response()));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(Tier::Tier1, Arc::new(PanickingProvider), &no_timeout())
        .with_provider(Tier::Tier2, tier2.clone(), &no_timeout());

    let outcome = resolve(&orchestrator, &estate_reserve()).await;

    assert_eq!(outcome.used_method, "tier2");
    assert!(outcome.notes().contains("panicked"));
}

#[tokio::test]
async fn test_open_circuit_skips_tier_without_invoking() {
    let breaker = Arc::new(CircuitBreaker::new(CircuitConfig {
        failure_threshold: 2,
        cooldown_secs: 60,
    }));
    let flaky = Arc::new(ScriptedProvider::failing("search-api", "HTTP 503"));
    let tier2 = Arc::new(ScriptedProvider::responding("page-fetch", good_response()));

    let orchestrator = orchestrator(Arc::clone(&breaker))
        .with_provider(Tier::Tier1, flaky.clone(), &no_timeout())
        .with_provider(Tier::Tier2, tier2.clone(), &no_timeout());

    resolve(&orchestrator, &estate_reserve()).await;
    resolve(&orchestrator, &estate_reserve()).await;
    assert_eq!(flaky.calls(), 2);
    assert!(breaker.is_open("search-api"));

    let outcome = resolve(&orchestrator, &estate_reserve()).await;

    assert_eq!(flaky.calls(), 2, "open circuit must not invoke the provider");
    assert_eq!(tier2.calls(), 3);
    assert_eq!(outcome.used_method, "tier2");
    assert!(outcome.notes().contains("circuit open for search-api"));
    assert!(!breaker.is_open("page-fetch"));
}

#[tokio::test]
async fn test_cancelled_before_start_attempts_nothing() {
    let tier1 = Arc::new(ScriptedProvider::responding("search-api", good_response()));
    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(Tier::Tier1, tier1.clone(), &no_timeout());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let wine = estate_reserve();
    let outcome = orchestrator
        .resolve(&wine, &IdentityTokenSet::from_wine(&wine), &cancel)
        .await;

    assert!(outcome.cancelled);
    assert_eq!(outcome.used_method, NO_METHOD);
    assert_eq!(tier1.calls(), 0);
}

/// Cancels the shared token from inside its attempt, then finds nothing
struct CancellingProvider {
    cancel: CancellationToken,
}

#[async_trait]
impl RatingProvider for CancellingProvider {
    fn dependency(&self) -> &str {
        "search-api"
    }

    async fn attempt(&self, _request: ProviderRequest<'_>) -> Result<ProviderResponse, ProviderError> {
        self.cancel.cancel();
        Ok(ProviderResponse::nothing("no results"))
    }
}

#[tokio::test]
async fn test_cancellation_mid_run_stops_further_tiers() {
    let cancel = CancellationToken::new();
    let tier2 = Arc::new(ScriptedProvider::responding("page-fetch", good_response()));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(
            Tier::Tier1,
            Arc::new(CancellingProvider {
                cancel: cancel.clone(),
            }),
            &no_timeout(),
        )
        .with_provider(Tier::Tier2, tier2.clone(), &no_timeout());

    let wine = estate_reserve();
    let outcome = orchestrator
        .resolve(&wine, &IdentityTokenSet::from_wine(&wine), &cancel)
        .await;

    assert!(outcome.cancelled);
    assert_eq!(outcome.used_method, "tier1");
    assert_eq!(tier2.calls(), 0);
}

#[tokio::test]
async fn test_artifact_threads_to_later_tiers_and_cache() {
    let artifact = SearchArtifact::new("estate reserve 2018", Tier::Tier1, json!({"hits": 3}));
    let tier1 = Arc::new(ScriptedProvider::responding(
        "search-api",
        ProviderResponse::nothing("hits were gated").with_artifact(artifact.clone()),
    ));
    let tier2 = Arc::new(ScriptedProvider::responding(
        "page-fetch",
        good_response().with_tasting_notes("Cassis and cedar"),
    ));
    let cache = Arc::new(TtlCache::new(Duration::from_secs(3600)));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_artifact_cache(Arc::clone(&cache))
        .with_provider(Tier::Tier1, tier1.clone(), &no_timeout())
        .with_provider(Tier::Tier2, tier2.clone(), &no_timeout());

    let wine = estate_reserve();
    let outcome = resolve(&orchestrator, &wine).await;

    assert_eq!(outcome.used_method, "tier2");
    assert_eq!(outcome.tasting_notes.as_deref(), Some("Cassis and cedar"));
    assert_eq!(tier1.seen_artifacts(), vec![None]);
    assert_eq!(tier2.seen_artifacts(), vec![Some(artifact.clone())]);

    let fingerprint = IdentityTokenSet::from_wine(&wine).fingerprint();
    assert_eq!(cache.get(&fingerprint), Some(artifact.clone()));

    // Second resolution starts from the cached artifact
    resolve(&orchestrator, &wine).await;
    assert_eq!(tier1.seen_artifacts(), vec![None, Some(artifact)]);
}

#[tokio::test(start_paused = true)]
async fn test_artifacts_of_earlier_wines_are_swept() {
    let tier1 = Arc::new(ScriptedProvider::responding(
        "search-api",
        ProviderResponse::nothing("hits were gated").with_artifact(SearchArtifact::new(
            "query",
            Tier::Tier1,
            json!({}),
        )),
    ));
    let cache = Arc::new(TtlCache::with_sweep_interval(
        Duration::from_secs(10),
        Duration::from_secs(5),
    ));
    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_artifact_cache(Arc::clone(&cache))
        .with_provider(Tier::Tier1, tier1, &no_timeout());

    let first = estate_reserve();
    let second = Wine::new(2, "Hill Block Syrah", Some(2019));
    resolve(&orchestrator, &first).await;
    assert_eq!(cache.len(), 1);

    tokio::time::advance(Duration::from_secs(11)).await;
    resolve(&orchestrator, &second).await;

    assert_eq!(cache.len(), 1);
    let second_key = IdentityTokenSet::from_wine(&second).fingerprint();
    assert!(cache.get(&second_key).is_some());
}

#[tokio::test]
async fn test_each_attempt_is_recorded_in_telemetry() {
    let (telemetry, mut rx) = ChannelTelemetry::new(16);
    let tier1 = Arc::new(ScriptedProvider::responding(
        "search-api",
        ProviderResponse::nothing("no results"),
    ));
    let tier2 = Arc::new(ScriptedProvider::responding("page-fetch", good_response()));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_telemetry(Arc::new(telemetry))
        .with_provider(Tier::Tier1, tier1, &no_timeout())
        .with_provider(Tier::Tier2, tier2, &no_timeout());

    resolve(&orchestrator, &estate_reserve()).await;

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!((first.tier, first.success), (Tier::Tier1, false));
    assert_eq!((second.tier, second.success), (Tier::Tier2, true));
    assert_eq!(second.ratings_found, 1);
    assert_eq!(second.wine_id, 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_registering_a_tier_twice_replaces_it() {
    let old = Arc::new(ScriptedProvider::responding("old", good_response()));
    let new = Arc::new(ScriptedProvider::responding("new", good_response()));

    let orchestrator = orchestrator(Arc::new(CircuitBreaker::default()))
        .with_provider(Tier::Tier2, new.clone(), &no_timeout())
        .with_provider(Tier::Tier1, old.clone(), &no_timeout())
        .with_provider(Tier::Tier1, new.clone(), &no_timeout());

    assert_eq!(orchestrator.tiers(), vec![Tier::Tier1, Tier::Tier2]);
    resolve(&orchestrator, &estate_reserve()).await;
    assert_eq!(old.calls(), 0);
    assert_eq!(new.calls(), 1);
}
