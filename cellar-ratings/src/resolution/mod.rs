//! Rating resolution: identity tokens, tier waterfall, validation and filtering

pub mod circuit_breaker;
pub mod identity_validator;
pub mod orchestrator;
pub mod provider;
pub mod tokens;
pub mod vintage_filter;

pub use circuit_breaker::{CircuitBreaker, CircuitConfig, CircuitSnapshot, CircuitState};
pub use identity_validator::{
    IdentityAssessment, IdentityConfig, IdentityValidator, RejectedCandidate, ValidationOutcome,
};
pub use orchestrator::{ResolutionOutcome, TierOrchestrator, TierSettings, TiersConfig, NO_METHOD};
pub use provider::{ProviderRequest, ProviderResponse, RatingProvider, SearchArtifact};
pub use tokens::IdentityTokenSet;
pub use vintage_filter::{
    rated_vintage, VintageConfig, VintageFilterOutcome, VintageSensitivity, VintageSensitivityFilter,
};
