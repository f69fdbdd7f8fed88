//! Assessment orchestrator.
//!
//! Runs the pipeline for one note:
//!
//! 1. Redact PII (when requested)
//! 2. Apply meeting-type overrides to the checklist (deterministic)
//! 3. Fan-out: one provider request per effective element
//! 4. Parse each reply into an element result (deterministic)
//! 5. Fan-in: aggregate results into a verdict (deterministic)
//! 6. One summary request, with a templated fallback
//!
//! The effective checklist is fixed before the first request is issued, so
//! every element request sees the same definitions. Results are kept in
//! checklist order whether requests run sequentially or concurrently.

use chrono::{SecondsFormat, Utc};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use notecheck_core::{
    fallback_summary, resolve_checklist, Aggregator, Checklist, ChecklistError, ComplianceReport,
    ComplianceStats, Element, ElementResult, Redactor, ResponseParser,
};

use crate::config::{ConfigError, RuntimeConfig};
use crate::prompts::{element_prompt, summary_prompt};
use crate::providers::{build_provider, ProviderError, TextGenerator};

/// Errors from the assessment pipeline.
///
/// Reply content never produces an error; only configuration, checklist
/// resolution and provider transport failures do.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checklist error: {0}")]
    Checklist(#[from] ChecklistError),

    #[error("Provider call for element '{element_id}' failed: {source}")]
    Provider {
        element_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("Provider call for element '{element_id}' timed out after {timeout:?}")]
    Timeout { element_id: String, timeout: Duration },

    #[error("Failed to set up provider: {0}")]
    ProviderSetup(#[source] ProviderError),
}

impl RuntimeError {
    /// Map a `build_provider` failure. Only configuration problems count as
    /// "not configured"; transport setup failures keep their source.
    fn from_provider_setup(e: ProviderError) -> Self {
        match e {
            ProviderError::Configuration(message) => RuntimeError::ProviderNotConfigured(message),
            other => RuntimeError::ProviderSetup(other),
        }
    }
}

/// Per-note options.
#[derive(Debug, Clone, Default)]
pub struct AssessmentRequest {
    /// Meeting type whose overrides should apply
    pub meeting_type: Option<String>,

    /// Caller audit fields; these win over generated metadata keys
    pub metadata: BTreeMap<String, String>,

    /// Redact PII before assessment (in addition to the config switch)
    pub redact_pii: bool,
}

impl AssessmentRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meeting_type(mut self, meeting_type: impl Into<String>) -> Self {
        self.meeting_type = Some(meeting_type.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn redact_pii(mut self, redact: bool) -> Self {
        self.redact_pii = redact;
        self
    }
}

/// Drives element requests through a text generator and assembles reports.
pub struct AssessmentOrchestrator {
    generator: Arc<dyn TextGenerator>,
    config: RuntimeConfig,
    parser: ResponseParser,
    aggregator: Aggregator,
    redactor: Redactor,
}

impl AssessmentOrchestrator {
    /// Create an orchestrator around an existing generator.
    ///
    /// Provider settings are not checked since the generator is supplied
    /// directly; limits still are.
    pub fn new(generator: Arc<dyn TextGenerator>, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate_limits()?;

        let parser = ResponseParser::new(config.policy).verbose(config.verbose);
        let aggregator = Aggregator::new(config.policy);

        Ok(Self {
            generator,
            config,
            parser,
            aggregator,
            redactor: Redactor::new(),
        })
    }

    /// Validate the config and build the configured HTTP provider.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let generator =
            build_provider(&config.provider).map_err(RuntimeError::from_provider_setup)?;
        Self::new(generator, config)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Resolve a checklist reference, then assess.
    ///
    /// An unresolvable reference fails before any request is made.
    pub async fn assess_reference(
        &self,
        note_text: &str,
        checklist_ref: &str,
        request: &AssessmentRequest,
    ) -> Result<ComplianceReport, RuntimeError> {
        let checklist = resolve_checklist(checklist_ref)?;
        self.assess(note_text, &checklist, request).await
    }

    /// Assess a note against a checklist.
    pub async fn assess(
        &self,
        note_text: &str,
        checklist: &Checklist,
        request: &AssessmentRequest,
    ) -> Result<ComplianceReport, RuntimeError> {
        let redact = self.config.redact_pii || request.redact_pii;
        let note = if redact {
            self.redactor.redact(note_text).text
        } else {
            note_text.to_string()
        };

        let effective = checklist.apply_meeting_type(request.meeting_type.as_deref());

        tracing::info!(
            checklist = %effective.checklist.id,
            meeting_type = ?effective.meeting_type,
            elements = effective.checklist.elements.len(),
            concurrency = self.config.concurrency,
            "Starting assessment"
        );

        let results = self.assess_elements(&note, &effective.checklist.elements).await?;

        let stats = self.aggregator.stats(&results);
        let summary = self.generate_summary(&effective.checklist, &results, &stats).await;

        let evaluated_at = self.config.determinism.evaluated_at.unwrap_or_else(Utc::now);
        let mut report = self.aggregator.aggregate_at(
            &effective.checklist,
            effective.meeting_type,
            results,
            summary,
            evaluated_at,
        );
        report.pii_redacted = redact;

        report.metadata.insert("model".to_string(), self.generator.model_id().to_string());
        report
            .metadata
            .insert("provider".to_string(), self.generator.provider_name().to_string());
        report.metadata.insert(
            "evaluation_time".to_string(),
            evaluated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        report
            .metadata
            .extend(request.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

        tracing::info!(
            checklist = %report.checklist_id,
            passed = report.passed,
            rating = %report.overall_rating,
            "Assessment complete"
        );

        Ok(report)
    }

    async fn assess_elements(
        &self,
        note: &str,
        elements: &[Arc<Element>],
    ) -> Result<Vec<ElementResult>, RuntimeError> {
        if self.config.concurrency <= 1 {
            let mut results = Vec::with_capacity(elements.len());
            for element in elements {
                results.push(self.assess_element(note, element).await?);
            }
            return Ok(results);
        }

        // `buffered` yields in input order regardless of completion order
        stream::iter(elements.iter().map(|element| self.assess_element(note, element)))
            .buffered(self.config.concurrency)
            .try_collect()
            .await
    }

    async fn assess_element(&self, note: &str, element: &Element) -> Result<ElementResult, RuntimeError> {
        let prompt = element_prompt(note, element, self.config.custom_instruction.as_deref());
        let timeout = self.config.timeouts.llm_call;

        let reply = match tokio::time::timeout(
            timeout,
            self.generator.generate(&prompt, self.config.max_tokens.element),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(element_id = %element.id, error = %e, "Element request failed");
                return Err(RuntimeError::Provider {
                    element_id: element.id.clone(),
                    source: e,
                });
            }
            Err(_) => {
                tracing::warn!(element_id = %element.id, timeout = ?timeout, "Element request timed out");
                return Err(RuntimeError::Timeout {
                    element_id: element.id.clone(),
                    timeout,
                });
            }
        };

        let result = self.parser.parse(&reply, element);
        tracing::debug!(
            element_id = %result.element_id,
            status = %result.status,
            score = result.score,
            "Element assessed"
        );
        Ok(result)
    }

    /// Narrative summary. Any failure falls back to the templated sentence.
    async fn generate_summary(
        &self,
        checklist: &Checklist,
        results: &[ElementResult],
        stats: &ComplianceStats,
    ) -> String {
        let prompt = summary_prompt(checklist, results);
        let timeout = self.config.timeouts.llm_call;

        match tokio::time::timeout(
            timeout,
            self.generator.generate(&prompt, self.config.max_tokens.summary),
        )
        .await
        {
            Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(Ok(_)) => {
                tracing::warn!("Summary generation returned no text; using fallback");
                fallback_summary(stats)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Summary generation failed; using fallback");
                fallback_summary(stats)
            }
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Summary generation timed out; using fallback");
                fallback_summary(stats)
            }
        }
    }
}

/// Builder for AssessmentOrchestrator.
pub struct AssessmentOrchestratorBuilder {
    generator: Option<Arc<dyn TextGenerator>>,
    config: RuntimeConfig,
}

impl AssessmentOrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            generator: None,
            config: RuntimeConfig::default(),
        }
    }

    /// Set the text generator.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<AssessmentOrchestrator, RuntimeError> {
        let generator = self
            .generator
            .ok_or_else(|| RuntimeError::ProviderNotConfigured("No generator set".to_string()))?;

        AssessmentOrchestrator::new(generator, self.config)
    }
}

impl Default for AssessmentOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoStatus {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for EchoStatus {
        async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.contains("compliance analyst") {
                return Err(ProviderError::InvalidResponse("no summaries today".to_string()));
            }
            Ok("STATUS: present\nSCORE: 0.9\nEVIDENCE: documented".to_string())
        }

        fn provider_name(&self) -> &str {
            "mock"
        }

        fn model_id(&self) -> &str {
            "mock-1"
        }
    }

    const CHECKLIST: &str = r#"
framework_id: tiny
name: Tiny
version: "2"
regulator: TEST
elements:
  - {id: a, description: "A documented", required: true, severity: critical}
  - {id: b, description: "B documented", required: false, severity: low}
"#;

    #[test]
    fn test_builder_requires_generator() {
        assert!(matches!(
            AssessmentOrchestratorBuilder::new().build(),
            Err(RuntimeError::ProviderNotConfigured(_))
        ));
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        let mut config = RuntimeConfig::default();
        config.concurrency = 0;
        let result = AssessmentOrchestratorBuilder::new()
            .generator(Arc::new(EchoStatus { calls: AtomicUsize::new(0) }))
            .config(config)
            .build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_new_rejects_zero_timeout() {
        let mut config = RuntimeConfig::default();
        config.timeouts.llm_call = Duration::ZERO;

        let result = AssessmentOrchestrator::new(Arc::new(EchoStatus { calls: AtomicUsize::new(0) }), config);
        match result {
            Err(RuntimeError::Config(ConfigError::InvalidField { field, .. })) => {
                assert_eq!(field, "timeouts.llm_call");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("zero timeout accepted"),
        }
    }

    #[test]
    fn test_provider_setup_errors_keep_their_kind() {
        let missing = RuntimeError::from_provider_setup(ProviderError::Configuration(
            "api_key is required".to_string(),
        ));
        assert!(matches!(missing, RuntimeError::ProviderNotConfigured(ref m) if m == "api_key is required"));

        let transport = RuntimeError::from_provider_setup(ProviderError::InvalidResponse("tls".to_string()));
        assert!(matches!(transport, RuntimeError::ProviderSetup(ProviderError::InvalidResponse(_))));
        assert!(!transport.to_string().contains("not configured"));
    }

    #[test]
    fn test_from_config_without_key_is_config_error() {
        let mut config = RuntimeConfig::default();
        config.provider.model_id = "model-x".to_string();
        config.provider.api_key_env = Some("NOTECHECK_TEST_KEY_THAT_IS_NEVER_SET".to_string());

        assert!(matches!(
            AssessmentOrchestrator::from_config(config),
            Err(RuntimeError::Config(ConfigError::MissingField { .. }))
        ));
    }

    #[tokio::test]
    async fn test_one_request_per_element_plus_summary() {
        let generator = Arc::new(EchoStatus { calls: AtomicUsize::new(0) });
        let orchestrator = AssessmentOrchestrator::new(generator.clone(), RuntimeConfig::default()).unwrap();
        let checklist = Checklist::from_yaml(CHECKLIST).unwrap();

        let report = orchestrator
            .assess("note", &checklist, &AssessmentRequest::new())
            .await
            .unwrap();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert!(report.passed);
        assert_eq!(
            report.summary,
            "Evaluated 2 framework elements; 2 present, 0 gap(s) identified."
        );
        assert_eq!(report.metadata.get("provider").map(String::as_str), Some("mock"));
        assert_eq!(report.metadata.get("model").map(String::as_str), Some("mock-1"));
    }

    #[tokio::test]
    async fn test_unresolvable_reference_makes_no_requests() {
        let generator = Arc::new(EchoStatus { calls: AtomicUsize::new(0) });
        let orchestrator = AssessmentOrchestrator::new(generator.clone(), RuntimeConfig::default()).unwrap();

        let err = orchestrator
            .assess_reference("note", "does_not_exist", &AssessmentRequest::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Checklist(ChecklistError::NotFound { .. })));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
