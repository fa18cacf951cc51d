use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Properties every integration event carries through its base type.
pub const STANDARD_EVENT_PROPERTIES: &[&str] = &["Guid Id", "DateTime CreationDate"];

/// Placeholder event name for a publish argument whose origin was not found.
pub fn unknown_event_name(identifier: &str) -> String {
    format!("Unknown({identifier})")
}

/// Event name recorded when bytecode tracing cannot resolve the argument.
pub const UNKNOWN_EVENT: &str = "Unknown";

/// Where a fact was found: repository, project and unit path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitOrigin {
    pub repository: String,
    pub project: String,
    pub path: PathBuf,
}

impl UnitOrigin {
    pub fn new(repository: impl Into<String>, project: impl Into<String>, path: PathBuf) -> Self {
        Self {
            repository: repository.into(),
            project: project.into(),
            path,
        }
    }

    /// File name without directories, used for entry-unit detection.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    pub fully_qualified_name: String,
    pub origin_unit: PathBuf,
    pub repository: String,
    pub project: String,
    /// Declared properties as "Type Name" strings, in source order.
    pub properties: Vec<String>,
    pub payload_class_name: Option<String>,
    pub standard_properties: Vec<String>,
}

impl EventDefinition {
    pub fn new(name: String, namespace: Option<&str>, origin: &UnitOrigin) -> Self {
        let fully_qualified_name = match namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}.{name}"),
            _ => name.clone(),
        };
        Self {
            name,
            fully_qualified_name,
            origin_unit: origin.path.clone(),
            repository: origin.repository.clone(),
            project: origin.project.clone(),
            properties: Vec::new(),
            payload_class_name: None,
            standard_properties: STANDARD_EVENT_PROPERTIES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_payload_class(mut self, payload: Option<String>) -> Self {
        self.payload_class_name = payload;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSite {
    pub event_name: String,
    pub repository: String,
    pub project: String,
    pub origin_unit: PathBuf,
    pub class_name: String,
    pub method_name: String,
    /// 1-based line in source mode; debug line in bytecode mode, 0 when unknown.
    pub position: usize,
    pub context: Option<String>,
    pub is_in_background_job: bool,
    pub background_job_class_name: Option<String>,
}

impl PublishSite {
    pub fn new(
        event_name: String,
        origin: &UnitOrigin,
        class_name: String,
        method_name: String,
        position: usize,
    ) -> Self {
        Self {
            event_name,
            repository: origin.repository.clone(),
            project: origin.project.clone(),
            origin_unit: origin.path.clone(),
            class_name,
            method_name,
            position,
            context: None,
            is_in_background_job: false,
            background_job_class_name: None,
        }
    }

    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    /// Mark the site as running inside a background job owned by `job_class`.
    pub fn in_background_job(mut self, job_class: String) -> Self {
        self.is_in_background_job = true;
        self.background_job_class_name = Some(job_class);
        self
    }
}

pub const HANDLER_METHOD_NAME: &str = "Handle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeSite {
    pub event_name: String,
    pub repository: String,
    pub project: String,
    pub origin_unit: PathBuf,
    pub handler_class_name: String,
    pub handler_method_name: String,
    pub position: usize,
    pub is_in_background_job: bool,
    pub handler_body_snippet: Option<Vec<String>>,
}

impl ConsumeSite {
    pub fn new(event_name: String, origin: &UnitOrigin, handler_class_name: String, position: usize) -> Self {
        Self {
            event_name,
            repository: origin.repository.clone(),
            project: origin.project.clone(),
            origin_unit: origin.path.clone(),
            handler_class_name,
            handler_method_name: HANDLER_METHOD_NAME.to_string(),
            position,
            is_in_background_job: false,
            handler_body_snippet: None,
        }
    }

    pub fn with_background_job(mut self, is_in_background_job: bool) -> Self {
        self.is_in_background_job = is_in_background_job;
        self
    }

    pub fn with_body_snippet(mut self, snippet: Vec<String>) -> Self {
        self.handler_body_snippet = Some(snippet);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionKind {
    DependencyRegistration,
    EventBusSubscription,
}

impl SubscriptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionKind::DependencyRegistration => "DependencyRegistration",
            SubscriptionKind::EventBusSubscription => "EventBusSubscription",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub event_name: String,
    pub repository: String,
    pub project: String,
    pub origin_unit: PathBuf,
    pub kind: SubscriptionKind,
    pub position: usize,
    pub context: Option<String>,
    pub is_in_background_job: bool,
}

impl SubscriptionRecord {
    pub fn new(event_name: String, origin: &UnitOrigin, kind: SubscriptionKind, position: usize) -> Self {
        Self {
            event_name,
            repository: origin.repository.clone(),
            project: origin.project.clone(),
            origin_unit: origin.path.clone(),
            kind,
            position,
            context: None,
            is_in_background_job: false,
        }
    }

    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_background_job(mut self, is_in_background_job: bool) -> Self {
        self.is_in_background_job = is_in_background_job;
        self
    }
}

/// Facts extracted from a single unit before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFacts {
    pub events: Vec<EventDefinition>,
    pub publishers: Vec<PublishSite>,
    pub consumers: Vec<ConsumeSite>,
    pub subscriptions: Vec<SubscriptionRecord>,
}

impl UnitFacts {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.publishers.is_empty()
            && self.consumers.is_empty()
            && self.subscriptions.is_empty()
    }

    pub fn absorb(&mut self, other: UnitFacts) {
        self.events.extend(other.events);
        self.publishers.extend(other.publishers);
        self.consumers.extend(other.consumers);
        self.subscriptions.extend(other.subscriptions);
    }
}

/// The merged result of one analysis run. Owns every fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub events: Vec<EventDefinition>,
    pub publishers: Vec<PublishSite>,
    pub consumers: Vec<ConsumeSite>,
    pub subscriptions: Vec<SubscriptionRecord>,
    pub generated_at: DateTime<Utc>,
    pub repository_count: usize,
    pub project_count: usize,
}

impl FlowReport {
    pub fn new(repository_count: usize) -> Self {
        Self {
            events: Vec::new(),
            publishers: Vec::new(),
            consumers: Vec::new(),
            subscriptions: Vec::new(),
            generated_at: Utc::now(),
            repository_count,
            project_count: 0,
        }
    }

    /// Merge per-unit partial results, then sort once so output order does not
    /// depend on the order units finished in.
    pub fn from_partials<I>(repository_count: usize, partials: I) -> Self
    where
        I: IntoIterator<Item = UnitFacts>,
    {
        let mut report = Self::new(repository_count);
        for facts in partials {
            report.events.extend(facts.events);
            report.publishers.extend(facts.publishers);
            report.consumers.extend(facts.consumers);
            report.subscriptions.extend(facts.subscriptions);
        }
        report.sort();
        report.project_count = report.distinct_projects();
        report
    }

    pub fn sort(&mut self) {
        self.events.sort_by(|a, b| {
            (&a.repository, &a.project, &a.origin_unit, &a.name)
                .cmp(&(&b.repository, &b.project, &b.origin_unit, &b.name))
        });
        self.publishers.sort_by(|a, b| {
            (&a.repository, &a.project, &a.origin_unit, a.position, &a.event_name)
                .cmp(&(&b.repository, &b.project, &b.origin_unit, b.position, &b.event_name))
        });
        self.consumers.sort_by(|a, b| {
            (&a.repository, &a.project, &a.origin_unit, a.position, &a.event_name)
                .cmp(&(&b.repository, &b.project, &b.origin_unit, b.position, &b.event_name))
        });
        self.subscriptions.sort_by(|a, b| {
            (&a.repository, &a.project, &a.origin_unit, a.position, &a.event_name)
                .cmp(&(&b.repository, &b.project, &b.origin_unit, b.position, &b.event_name))
        });
    }

    /// Drop publish and consume sites that are not inside background-job code.
    /// Subscription records are left untouched.
    pub fn retain_background_jobs(&mut self) {
        self.publishers.retain(|p| p.is_in_background_job);
        self.consumers.retain(|c| c.is_in_background_job);
    }

    pub fn distinct_projects(&self) -> usize {
        let mut projects: HashSet<(&str, &str)> = HashSet::new();
        projects.extend(self.events.iter().map(|e| (e.repository.as_str(), e.project.as_str())));
        projects.extend(
            self.publishers
                .iter()
                .map(|p| (p.repository.as_str(), p.project.as_str())),
        );
        projects.extend(
            self.consumers
                .iter()
                .map(|c| (c.repository.as_str(), c.project.as_str())),
        );
        projects.extend(
            self.subscriptions
                .iter()
                .map(|s| (s.repository.as_str(), s.project.as_str())),
        );
        projects.len()
    }

    pub fn fact_count(&self) -> usize {
        self.events.len() + self.publishers.len() + self.consumers.len() + self.subscriptions.len()
    }
}
