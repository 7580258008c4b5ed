//! Pipeline services: persistence, the refresh pipeline, background
//! enrichment, caching and telemetry

pub mod enrichment_queue;
pub mod persistence_coordinator;
pub mod ratings_service;
pub mod telemetry;
pub mod ttl_cache;

pub use enrichment_queue::{EnrichmentJob, EnrichmentQueue, EnrichmentStats};
pub use persistence_coordinator::{CommitSummary, PersistenceCoordinator};
pub use ratings_service::{RatingsService, RefreshReport};
pub use telemetry::{ChannelTelemetry, TelemetrySink, TracingTelemetry};
pub use ttl_cache::TtlCache;
