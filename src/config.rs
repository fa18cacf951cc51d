//! Indicator token lists and per-run analysis options.
//!
//! `IndicatorSets` holds every fixed token the extractors match against. It is
//! built once (defaults, or a JSON override file) and shared read-only by all
//! extractors through an `Arc`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ExtractError;

/// Immutable token lists driving every heuristic in the extractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSets {
    /// Directory or assembly name endings that mark a test project.
    pub test_project_markers: Vec<String>,
    /// Tokens whose presence marks code as running inside a background-job framework.
    pub background_job_markers: Vec<String>,
    /// Interface-name fragment identifying a job type in compiled modules.
    pub job_interface_token: String,
    /// Method names that emit an event.
    pub publisher_methods: Vec<String>,
    /// Type names with publish capability (interfaces or base types).
    pub publisher_types: Vec<String>,
    /// Field-name endings identifying a publisher field in source text.
    pub publisher_field_suffixes: Vec<String>,
    /// Type-name endings identifying an event type.
    pub event_suffixes: Vec<String>,
    /// Base types an event definition derives from.
    pub event_base_types: Vec<String>,
    /// Generic handler interfaces implemented by consumers.
    pub handler_interfaces: Vec<String>,
    /// Keywords marking a dependency-registration context.
    pub registration_keywords: Vec<String>,
    /// File-name tokens of startup/entry/configuration units.
    pub entry_unit_tokens: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for IndicatorSets {
    fn default() -> Self {
        Self {
            test_project_markers: strings(&[
                "Tests",
                "Test",
                "UnitTests",
                "IntegrationTests",
                "Specs",
                "Testing",
            ]),
            background_job_markers: strings(&[
                "Hangfire",
                "BackgroundJob",
                "RecurringJob",
                "AutomaticRetry",
                "DisableConcurrentExecution",
                "Quartz",
                "IJob",
            ]),
            job_interface_token: "IJob".to_string(),
            publisher_methods: strings(&["Publish", "PublishAsync", "Send", "SendAsync"]),
            publisher_types: strings(&[
                "IMessagePublisher",
                "IEventBus",
                "IIntegrationEventPublisher",
                "IPublishEndpoint",
                "IBus",
            ]),
            publisher_field_suffixes: strings(&["Publisher", "EventBus", "Bus", "PublishEndpoint"]),
            event_suffixes: strings(&["IntegrationEvent", "Event"]),
            event_base_types: strings(&["IntegrationEventBase", "IntegrationEvent"]),
            handler_interfaces: strings(&[
                "IIntegrationEventHandler",
                "IEventHandler",
                "IConsumer",
            ]),
            registration_keywords: strings(&[
                "services.",
                "AddScoped",
                "AddTransient",
                "AddSingleton",
                "AddConsumer",
                "AddHostedService",
                "AddMassTransit",
            ]),
            entry_unit_tokens: strings(&["Startup", "Program", "Configuration"]),
        }
    }
}

impl IndicatorSets {
    /// Load overrides from a JSON file; keys that are absent keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ExtractError> {
        let raw = fs::read_to_string(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let sets: IndicatorSets =
            serde_json::from_str(&raw).map_err(|err| ExtractError::InvalidConfig(err.to_string()))?;
        sets.validate()?;
        Ok(sets)
    }

    pub fn validate(&self) -> Result<(), ExtractError> {
        let required = [
            ("publisher_methods", &self.publisher_methods),
            ("event_suffixes", &self.event_suffixes),
            ("handler_interfaces", &self.handler_interfaces),
            ("event_base_types", &self.event_base_types),
        ];
        for (field, values) in required {
            if values.iter().all(|v| v.trim().is_empty()) {
                return Err(ExtractError::InvalidConfig(format!(
                    "{field} must contain at least one token"
                )));
            }
        }
        Ok(())
    }

    /// Whether `text` contains any background-job marker, case-insensitively.
    pub fn mentions_background_job(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.background_job_markers
            .iter()
            .filter(|marker| !marker.is_empty())
            .any(|marker| lowered.contains(&marker.to_lowercase()))
    }

    /// Whether a directory or assembly name is a test project: it equals a
    /// marker or ends with `.`, `-` or `_` followed by one.
    pub fn is_test_name(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.test_project_markers
            .iter()
            .filter(|marker| !marker.is_empty())
            .map(|marker| marker.to_lowercase())
            .any(|marker| {
                lowered == marker
                    || ['.', '-', '_']
                        .iter()
                        .any(|sep| lowered.ends_with(&format!("{sep}{marker}")))
            })
    }

    /// Whether a type name ends with one of the event-type suffixes.
    pub fn has_event_suffix(&self, type_name: &str) -> bool {
        self.event_suffixes
            .iter()
            .filter(|suffix| !suffix.is_empty())
            .any(|suffix| type_name.ends_with(suffix.as_str()))
    }

    pub fn is_publisher_method(&self, method_name: &str) -> bool {
        self.publisher_methods.iter().any(|m| m == method_name)
    }
}

/// Switches handed in by the CLI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Capture handler body snippets for consumers.
    pub include_details: bool,
    /// Drop publish and consume sites outside background-job code.
    pub background_jobs_only: bool,
    /// Skip test projects and test assemblies during discovery.
    pub exclude_tests: bool,
    /// Take publish sites from compiled module dumps instead of source text.
    pub bytecode_publishers: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_details: false,
            background_jobs_only: false,
            exclude_tests: true,
            bytecode_publishers: false,
        }
    }
}
