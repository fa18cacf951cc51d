//! Read-time cross-referencing of events and facts.
//!
//! Nothing here mutates the report. A fact belongs to an event when its event
//! name equals the event's name or contains it, both compared
//! case-insensitively. Containment is one-directional, so an event named
//! `Order` also picks up facts for `OrderCancelled`.

use serde::Serialize;
use std::collections::BTreeMap;

use super::model::{ConsumeSite, EventDefinition, FlowReport, PublishSite, SubscriptionRecord};

/// Whether a fact's event name refers to `definition_name`.
pub fn fuzzy_matches(fact_event_name: &str, definition_name: &str) -> bool {
    if fact_event_name.eq_ignore_ascii_case(definition_name) {
        return true;
    }
    if definition_name.is_empty() {
        return false;
    }
    fact_event_name
        .to_lowercase()
        .contains(&definition_name.to_lowercase())
}

/// One event definition with every fact that fuzzy-matches it.
#[derive(Debug, Clone, Serialize)]
pub struct EventFlow<'a> {
    pub definition: &'a EventDefinition,
    pub publishers: Vec<&'a PublishSite>,
    pub consumers: Vec<&'a ConsumeSite>,
    pub subscriptions: Vec<&'a SubscriptionRecord>,
}

impl EventFlow<'_> {
    /// No publish site refers to this event.
    pub fn is_orphaned(&self) -> bool {
        self.publishers.is_empty()
    }

    /// No consume site refers to this event.
    pub fn is_dead_letter(&self) -> bool {
        self.consumers.is_empty()
    }
}

/// Cross-reference counts for one distinct event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRow {
    pub event_name: String,
    pub has_definition: bool,
    pub publishers: usize,
    pub consumers: usize,
    pub subscriptions: usize,
}

pub struct FlowCorrelator<'a> {
    report: &'a FlowReport,
}

impl<'a> FlowCorrelator<'a> {
    pub fn new(report: &'a FlowReport) -> Self {
        Self { report }
    }

    pub fn flow_for(&self, definition: &'a EventDefinition) -> EventFlow<'a> {
        let name = definition.name.as_str();
        EventFlow {
            definition,
            publishers: self
                .report
                .publishers
                .iter()
                .filter(|p| fuzzy_matches(&p.event_name, name))
                .collect(),
            consumers: self
                .report
                .consumers
                .iter()
                .filter(|c| fuzzy_matches(&c.event_name, name))
                .collect(),
            subscriptions: self
                .report
                .subscriptions
                .iter()
                .filter(|s| fuzzy_matches(&s.event_name, name))
                .collect(),
        }
    }

    /// One flow per event definition, in report order.
    pub fn flows(&self) -> Vec<EventFlow<'a>> {
        self.report.events.iter().map(|e| self.flow_for(e)).collect()
    }

    pub fn orphaned(&self) -> Vec<&'a EventDefinition> {
        self.flows()
            .into_iter()
            .filter(EventFlow::is_orphaned)
            .map(|f| f.definition)
            .collect()
    }

    pub fn dead_letters(&self) -> Vec<&'a EventDefinition> {
        self.flows()
            .into_iter()
            .filter(EventFlow::is_dead_letter)
            .map(|f| f.definition)
            .collect()
    }

    /// Counts per distinct event name across definitions and all fact kinds,
    /// whether or not a definition exists for the name. Sorted by name.
    pub fn matrix(&self) -> Vec<MatrixRow> {
        let mut names: BTreeMap<&str, bool> = BTreeMap::new();
        for event in &self.report.events {
            names.insert(event.name.as_str(), true);
        }
        let fact_names = self
            .report
            .publishers
            .iter()
            .map(|p| p.event_name.as_str())
            .chain(self.report.consumers.iter().map(|c| c.event_name.as_str()))
            .chain(self.report.subscriptions.iter().map(|s| s.event_name.as_str()));
        for name in fact_names {
            names.entry(name).or_insert(false);
        }

        names
            .into_iter()
            .map(|(name, has_definition)| MatrixRow {
                event_name: name.to_string(),
                has_definition,
                publishers: self
                    .report
                    .publishers
                    .iter()
                    .filter(|p| fuzzy_matches(&p.event_name, name))
                    .count(),
                consumers: self
                    .report
                    .consumers
                    .iter()
                    .filter(|c| fuzzy_matches(&c.event_name, name))
                    .count(),
                subscriptions: self
                    .report
                    .subscriptions
                    .iter()
                    .filter(|s| fuzzy_matches(&s.event_name, name))
                    .count(),
            })
            .collect()
    }
}

/// Owned summary of a correlation pass, for exporters.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationSummary {
    pub events: Vec<EventSummary>,
    pub orphaned: Vec<String>,
    pub dead_letters: Vec<String>,
    pub matrix: Vec<MatrixRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub name: String,
    pub fully_qualified_name: String,
    pub repository: String,
    pub publishers: usize,
    pub consumers: usize,
    pub subscriptions: usize,
    pub orphaned: bool,
    pub dead_letter: bool,
}

impl CorrelationSummary {
    pub fn from_report(report: &FlowReport) -> Self {
        let correlator = FlowCorrelator::new(report);
        let flows = correlator.flows();
        let events: Vec<EventSummary> = flows
            .iter()
            .map(|flow| EventSummary {
                name: flow.definition.name.clone(),
                fully_qualified_name: flow.definition.fully_qualified_name.clone(),
                repository: flow.definition.repository.clone(),
                publishers: flow.publishers.len(),
                consumers: flow.consumers.len(),
                subscriptions: flow.subscriptions.len(),
                orphaned: flow.is_orphaned(),
                dead_letter: flow.is_dead_letter(),
            })
            .collect();

        Self {
            orphaned: events.iter().filter(|e| e.orphaned).map(|e| e.name.clone()).collect(),
            dead_letters: events
                .iter()
                .filter(|e| e.dead_letter)
                .map(|e| e.name.clone())
                .collect(),
            matrix: correlator.matrix(),
            events,
        }
    }
}
