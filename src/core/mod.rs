pub mod analyzer;
pub mod correlator;
pub mod lookback;
pub mod model;
pub mod scanner;

pub use analyzer::{AnalysisOutcome, FlowAnalyzer, UnitFailure};
pub use correlator::{fuzzy_matches, CorrelationSummary, EventFlow, FlowCorrelator, MatrixRow};
pub use model::{
    unknown_event_name, ConsumeSite, EventDefinition, FlowReport, PublishSite, SubscriptionKind,
    SubscriptionRecord, UnitFacts, UnitOrigin, HANDLER_METHOD_NAME, STANDARD_EVENT_PROPERTIES,
    UNKNOWN_EVENT,
};
pub use scanner::{FileScanner, RepositoryInfo};
