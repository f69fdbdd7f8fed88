//! # notecheck-runtime
//!
//! Async pipeline around `notecheck-core`.
//!
//! The core crate decides; this crate asks. It issues one text-generation
//! request per checklist element, feeds the replies through the core parser
//! and aggregator, and requests a narrative summary.
//!
//! ## Example
//!
//! ```rust,ignore
//! use notecheck_runtime::{AssessmentOrchestrator, AssessmentRequest, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("notecheck.yaml")?;
//! let orchestrator = AssessmentOrchestrator::from_config(config)?;
//!
//! let request = AssessmentRequest::new().meeting_type("annual_review");
//! let report = orchestrator
//!     .assess_reference(&note, "fca_suitability_v1", &request)
//!     .await?;
//! println!("{}", report.to_json_pretty()?);
//! ```

pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use config::{
    ConfigError, DeterminismConfig, MaxTokensConfig, ProviderConfig, ProviderKind, RuntimeConfig,
    TimeoutConfig,
};
pub use orchestrator::{
    AssessmentOrchestrator, AssessmentOrchestratorBuilder, AssessmentRequest, RuntimeError,
};
pub use providers::{build_provider, AnthropicClient, OpenAiClient, ProviderError, TextGenerator};
