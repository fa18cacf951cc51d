pub mod consumers;
pub mod events;
pub mod publishers;
pub mod state;
pub mod subscriptions;
pub mod window;

use anyhow::Result;
use std::fs;
use std::sync::Arc;

use crate::config::{AnalysisOptions, IndicatorSets};
use crate::core::{UnitFacts, UnitOrigin};
use crate::error::ExtractError;

pub use consumers::ConsumerExtractor;
pub use events::EventDefinitionExtractor;
pub use publishers::SourcePublisherExtractor;
pub use state::ScanState;
pub use subscriptions::SubscriptionExtractor;
pub use window::SourceWindow;

/// One source-text file plus where it came from.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub origin: UnitOrigin,
    pub text: String,
}

impl SourceUnit {
    pub fn new(origin: UnitOrigin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
        }
    }

    pub fn read(origin: UnitOrigin) -> Result<Self, ExtractError> {
        let text = fs::read_to_string(&origin.path).map_err(|source| ExtractError::Io {
            path: origin.path.clone(),
            source,
        })?;
        Ok(Self { origin, text })
    }

    pub fn lines(&self) -> Vec<&str> {
        self.text.lines().collect()
    }

    /// Whole-unit background-job flag shared by every source extractor.
    pub fn mentions_background_job(&self, indicators: &IndicatorSets) -> bool {
        indicators.mentions_background_job(&self.text)
    }
}

/// A scan over one source unit that appends facts to the unit's partial result.
pub trait FactExtractor {
    fn extract(&self, unit: &SourceUnit, facts: &mut UnitFacts);
    fn extractor_name(&self) -> &'static str;
}

/// All source-text extractors, built once per run with the same indicator sets.
pub struct ExtractorSet {
    extractors: Vec<Box<dyn FactExtractor + Send + Sync>>,
}

impl ExtractorSet {
    /// Build the extractors a run needs. Source publishers are skipped when
    /// publish sites come from compiled modules instead.
    pub fn new(indicators: Arc<IndicatorSets>, options: &AnalysisOptions) -> Result<Self> {
        let mut extractors: Vec<Box<dyn FactExtractor + Send + Sync>> = vec![Box::new(
            EventDefinitionExtractor::new(Arc::clone(&indicators))?,
        )];
        if !options.bytecode_publishers {
            extractors.push(Box::new(SourcePublisherExtractor::new(Arc::clone(&indicators))?));
        }
        extractors.push(Box::new(
            ConsumerExtractor::new(Arc::clone(&indicators))?.with_details(options.include_details),
        ));
        extractors.push(Box::new(SubscriptionExtractor::new(indicators)?));
        Ok(Self { extractors })
    }

    pub fn extract(&self, unit: &SourceUnit) -> UnitFacts {
        let mut facts = UnitFacts::default();
        for extractor in &self.extractors {
            extractor.extract(unit, &mut facts);
        }
        facts
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.extractor_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

/// Alternation of escaped tokens for embedding in a larger pattern.
pub(crate) fn alternation(tokens: &[String]) -> String {
    tokens
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|")
}
