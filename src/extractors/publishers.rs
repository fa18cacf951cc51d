use anyhow::Result;
use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::window::SourceWindow;
use super::{alternation, FactExtractor, ScanState, SourceUnit};
use crate::config::IndicatorSets;
use crate::core::lookback::TRACE_WINDOW;
use crate::core::{unknown_event_name, PublishSite, UnitFacts};

/// Finds publish call sites in source text and resolves the published event type.
pub struct SourcePublisherExtractor {
    indicators: Arc<IndicatorSets>,
    /// `_publisher.Publish(evt)`: a publisher field called with one bare identifier.
    field_call: Regex,
    /// `.Publish(new OrderPlacedIntegrationEvent(...))`: inline construction.
    inline_construction: Regex,
}

fn construction_regex() -> &'static Regex {
    static CONSTRUCTION_REGEX: OnceLock<Regex> = OnceLock::new();
    CONSTRUCTION_REGEX.get_or_init(|| {
        Regex::new(r"\bnew\s+(?:[A-Za-z_]\w*\.)*([A-Za-z_]\w*)").expect("Invalid construction regex")
    })
}

impl SourcePublisherExtractor {
    pub fn new(indicators: Arc<IndicatorSets>) -> Result<Self> {
        let fields = alternation(&indicators.publisher_field_suffixes);
        let methods = alternation(&indicators.publisher_methods);

        let field_call = Regex::new(&format!(
            r"\b(_?\w*?(?i:{fields}))\s*\.\s*(?:{methods})\s*(?:<[^>()]*>)?\s*\(\s*([A-Za-z_]\w*)\s*\)"
        ))?;
        let inline_construction = Regex::new(&format!(
            r"\.\s*(?:{methods})\s*(?:<[^>()]*>)?\s*\(\s*new\s+(?:[A-Za-z_]\w*\.)*([A-Za-z_]\w*)\s*[({{]"
        ))?;

        Ok(Self {
            indicators,
            field_call,
            inline_construction,
        })
    }

    pub fn extract_publishers(&self, unit: &SourceUnit) -> Vec<PublishSite> {
        let lines = unit.lines();
        let window = SourceWindow::new(&lines);
        let in_background_job = unit.mentions_background_job(&self.indicators);
        let mut sites = Vec::new();
        let mut state = ScanState::new();

        for (index, line) in lines.iter().enumerate() {
            state = state.advance(line);

            for caps in self.field_call.captures_iter(line) {
                let identifier = &caps[2];
                let event_name = self
                    .trace_identifier(&window, index, identifier)
                    .unwrap_or_else(|| unknown_event_name(identifier));
                sites.push(self.site(unit, &state, event_name, index, line, in_background_job));
            }

            for caps in self.inline_construction.captures_iter(line) {
                let type_name = &caps[1];
                if self.indicators.has_event_suffix(type_name) {
                    sites.push(self.site(
                        unit,
                        &state,
                        type_name.to_string(),
                        index,
                        line,
                        in_background_job,
                    ));
                }
            }
        }

        sites
    }

    /// Walk back from the call for the line that defines `identifier` and pull
    /// the constructed event type out of it. Stops at the nearest defining line.
    pub fn trace_identifier(
        &self,
        window: &SourceWindow<'_>,
        call_index: usize,
        identifier: &str,
    ) -> Option<String> {
        let defining_line = window.scan_backward(call_index, TRACE_WINDOW, |line| {
            let defines = (line.contains("new ") && line.contains(identifier)) || assigns_to(line, identifier);
            defines.then_some(line)
        })?;

        construction_regex()
            .captures_iter(defining_line)
            .map(|caps| caps[1].to_string())
            .find(|name| self.indicators.has_event_suffix(name))
    }

    fn site(
        &self,
        unit: &SourceUnit,
        state: &ScanState,
        event_name: String,
        index: usize,
        line: &str,
        in_background_job: bool,
    ) -> PublishSite {
        let site = PublishSite::new(
            event_name,
            &unit.origin,
            state.class_or_unknown(),
            state.method_or_unknown(),
            index + 1,
        )
        .with_context(line.trim().to_string());

        if in_background_job {
            site.in_background_job(state.class_or_unknown())
        } else {
            site
        }
    }
}

/// `identifier = ...` as a whole word, excluding `==` and `=>`.
fn assigns_to(line: &str, identifier: &str) -> bool {
    if identifier.is_empty() {
        return false;
    }
    line.match_indices(identifier).any(|(start, _)| {
        let rest = &line[start + identifier.len()..];
        if line[..start].chars().next_back().is_some_and(is_word_char)
            || rest.chars().next().is_some_and(is_word_char)
        {
            return false;
        }
        let mut after = rest.trim_start().chars();
        after.next() == Some('=') && !matches!(after.next(), Some('=' | '>'))
    })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl FactExtractor for SourcePublisherExtractor {
    fn extract(&self, unit: &SourceUnit, facts: &mut UnitFacts) {
        facts.publishers.extend(self.extract_publishers(unit));
    }

    fn extractor_name(&self) -> &'static str {
        "publishers"
    }
}
