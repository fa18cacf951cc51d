use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::state::declared_type;
use super::window::{SourceWindow, CLASS_SEARCH_RADIUS, FORWARD_WINDOW, SNIPPET_MAX_LINES};
use super::{alternation, FactExtractor, SourceUnit};
use crate::config::IndicatorSets;
use crate::core::{ConsumeSite, UnitFacts};

/// Finds classes implementing a generic handler interface.
///
/// The same `IIntegrationEventHandler<T>` text also shows up inside
/// `services.AddScoped<...>()` registrations; those occurrences are rejected
/// here and picked up by the subscription extractor instead.
pub struct ConsumerExtractor {
    indicators: Arc<IndicatorSets>,
    handler: Regex,
    include_details: bool,
}

fn handle_signature_regex() -> &'static Regex {
    static HANDLE_REGEX: OnceLock<Regex> = OnceLock::new();
    HANDLE_REGEX.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:public|private|protected|internal|async|virtual|override)\s+)*[\w.<>]+\s+Handle(?:Async)?\s*\(",
        )
        .expect("Invalid Handle signature regex")
    })
}

impl ConsumerExtractor {
    pub fn new(indicators: Arc<IndicatorSets>) -> Result<Self> {
        let interfaces = alternation(&indicators.handler_interfaces);
        let handler = Regex::new(&format!(
            r"\b(?:{interfaces})\s*<\s*(?:[A-Za-z_]\w*\.)*([A-Za-z_]\w*)\s*>"
        ))?;
        Ok(Self {
            indicators,
            handler,
            include_details: false,
        })
    }

    /// Also capture the body of each handler's `Handle` method.
    pub fn with_details(mut self, include_details: bool) -> Self {
        self.include_details = include_details;
        self
    }

    /// Startup, Program and Configuration units only wire handlers up.
    pub fn is_entry_unit(&self, file_name: &str) -> bool {
        self.indicators
            .entry_unit_tokens
            .iter()
            .filter(|t| !t.is_empty())
            .any(|token| file_name.contains(token.as_str()))
    }

    pub fn extract_consumers(&self, unit: &SourceUnit) -> Vec<ConsumeSite> {
        if self.is_entry_unit(&unit.origin.file_name()) {
            return Vec::new();
        }

        let lines = unit.lines();
        let window = SourceWindow::new(&lines);
        let in_background_job = unit.mentions_background_job(&self.indicators);
        let mut sites = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let mut matches = self.handler.captures_iter(line).peekable();
            if matches.peek().is_none() {
                continue;
            }
            if window.in_registration_context(index, &self.indicators.registration_keywords) {
                continue;
            }

            let class_name = window
                .scan_around(index, CLASS_SEARCH_RADIUS, declared_type)
                .unwrap_or_else(|| "Unknown".to_string());
            let snippet = if self.include_details {
                self.handler_body(&window, index)
            } else {
                None
            };

            for caps in matches {
                let mut site = ConsumeSite::new(caps[1].to_string(), &unit.origin, class_name.clone(), index + 1)
                    .with_background_job(in_background_job);
                if let Some(body) = &snippet {
                    site = site.with_body_snippet(body.clone());
                }
                sites.push(site);
            }
        }

        sites
    }

    fn handler_body(&self, window: &SourceWindow<'_>, from: usize) -> Option<Vec<String>> {
        let signature =
            window.scan_forward(from, FORWARD_WINDOW, |line| handle_signature_regex().is_match(line))?;
        Some(window.body_after(signature, SNIPPET_MAX_LINES))
    }
}

impl FactExtractor for ConsumerExtractor {
    fn extract(&self, unit: &SourceUnit, facts: &mut UnitFacts) {
        facts.consumers.extend(self.extract_consumers(unit));
    }

    fn extractor_name(&self) -> &'static str {
        "consumers"
    }
}
