use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::window::{closes_block, SourceWindow, FORWARD_WINDOW};
use super::{alternation, FactExtractor, ScanState, SourceUnit};
use crate::config::IndicatorSets;
use crate::core::{EventDefinition, UnitFacts};

/// Finds integration-event class declarations and their declared properties.
pub struct EventDefinitionExtractor {
    declaration: Regex,
}

fn property_regex() -> &'static Regex {
    static PROPERTY_REGEX: OnceLock<Regex> = OnceLock::new();
    PROPERTY_REGEX.get_or_init(|| {
        Regex::new(r"public\s+([\w.]+(?:<[^{}]*?>)?[?\[\]]*)\s+([A-Za-z_]\w*)\s*\{\s*get")
            .expect("Invalid property regex")
    })
}

fn nested_class_regex() -> &'static Regex {
    static NESTED_CLASS_REGEX: OnceLock<Regex> = OnceLock::new();
    NESTED_CLASS_REGEX.get_or_init(|| {
        Regex::new(r"public\s+class\s+([A-Za-z_]\w*)").expect("Invalid nested class regex")
    })
}

impl EventDefinitionExtractor {
    pub fn new(indicators: Arc<IndicatorSets>) -> Result<Self> {
        let bases = alternation(&indicators.event_base_types);
        let declaration = Regex::new(&format!(
            r"(?i)public\s+(?:(?:sealed|abstract|partial)\s+)*class\s+([A-Za-z_]\w*)\s*:\s*(?:[\w.]+\.)?(?:{bases})\b"
        ))?;
        Ok(Self { declaration })
    }

    pub fn extract_events(&self, unit: &SourceUnit) -> Vec<EventDefinition> {
        let lines = unit.lines();
        let window = SourceWindow::new(&lines);
        let mut events = Vec::new();
        let mut state = ScanState::new();

        for (index, line) in lines.iter().enumerate() {
            state = state.advance(line);

            let Some(caps) = self.declaration.captures(line) else {
                continue;
            };
            let name = caps[1].to_string();
            let (properties, payload) = self.collect_body(&window, index);

            events.push(
                EventDefinition::new(name, state.namespace.as_deref(), &unit.origin)
                    .with_properties(properties)
                    .with_payload_class(payload),
            );
        }

        events
    }

    /// Properties and nested payload class within the declaration's forward window.
    fn collect_body(&self, window: &SourceWindow<'_>, start: usize) -> (Vec<String>, Option<String>) {
        let mut properties = Vec::new();
        let mut payload = None;
        let end = (start + FORWARD_WINDOW).min(window.len());

        for index in start..end {
            let Some(line) = window.line(index) else {
                break;
            };

            for caps in property_regex().captures_iter(line) {
                properties.push(format!("{} {}", caps[1].trim(), &caps[2]));
            }

            if index > start && line.contains("public class") && line.contains("Data") {
                if let Some(caps) = nested_class_regex().captures(line) {
                    payload = Some(caps[1].to_string());
                }
            }

            if closes_block(line) {
                break;
            }
        }

        (properties, payload)
    }
}

impl FactExtractor for EventDefinitionExtractor {
    fn extract(&self, unit: &SourceUnit, facts: &mut UnitFacts) {
        facts.events.extend(self.extract_events(unit));
    }

    fn extractor_name(&self) -> &'static str {
        "events"
    }
}
