//! Tier outcome telemetry
//!
//! Sinks are fire-and-forget: `record` is synchronous and must never block
//! or fail the pipeline.

use crate::types::TierOutcome;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub trait TelemetrySink: Send + Sync {
    fn record(&self, outcome: TierOutcome);
}

/// Emits each outcome as a structured tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, outcome: TierOutcome) {
        info!(
            target: "cellar_ratings::telemetry",
            wine_id = outcome.wine_id,
            tier = %outcome.tier,
            used_method = %outcome.used_method,
            success = outcome.success,
            ratings_found = outcome.ratings_found,
            latency_ms = outcome.latency_ms,
            error = outcome.error.as_deref().unwrap_or(""),
            "Tier outcome"
        );
    }
}

/// Forwards outcomes to a bounded channel for an external consumer
///
/// When the channel is full or closed the outcome is dropped.
#[derive(Debug, Clone)]
pub struct ChannelTelemetry {
    tx: mpsc::Sender<TierOutcome>,
}

impl ChannelTelemetry {
    /// Create a sink and the receiver that drains it
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TierOutcome>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelTelemetry {
    fn record(&self, outcome: TierOutcome) {
        if let Err(e) = self.tx.try_send(outcome) {
            debug!(error = %e, "Telemetry record dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tier;

    fn outcome(tier: Tier) -> TierOutcome {
        TierOutcome {
            wine_id: 7,
            tier,
            used_method: tier.method_tag().to_string(),
            success: true,
            ratings_found: 2,
            latency_ms: 120,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelTelemetry::new(4);
        sink.record(outcome(Tier::Tier1));
        sink.record(outcome(Tier::Tier2));

        assert_eq!(rx.recv().await.unwrap().tier, Tier::Tier1);
        assert_eq!(rx.recv().await.unwrap().tier, Tier::Tier2);
    }

    #[tokio::test]
    async fn test_full_channel_drops_without_blocking() {
        let (sink, mut rx) = ChannelTelemetry::new(1);
        sink.record(outcome(Tier::Tier1));
        sink.record(outcome(Tier::Tier2));
        sink.record(outcome(Tier::Tier3));

        assert_eq!(rx.recv().await.unwrap().tier, Tier::Tier1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (sink, rx) = ChannelTelemetry::new(1);
        drop(rx);
        sink.record(outcome(Tier::Tier1));
        TracingTelemetry.record(outcome(Tier::Tier3));
    }
}
