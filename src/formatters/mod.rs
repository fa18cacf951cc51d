use clap::ValueEnum;
use std::collections::HashSet;

pub mod cypher;
pub mod json;
pub mod markdown;

pub use cypher::{build_flow_graph, CypherFormatter, FlowGraph};
pub use json::JsonFormatter;
pub use markdown::MarkdownFormatter;

/// Export format selectable on the command line.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    Json,
    Markdown,
    Cypher,
}

impl OutputFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            OutputFormat::Json => "flow-report.json",
            OutputFormat::Markdown => "flow-report.md",
            OutputFormat::Cypher => "flow-graph.cypher",
        }
    }

    /// Drops repeated formats, keeping the order each first appeared in.
    pub fn distinct(formats: impl IntoIterator<Item = OutputFormat>) -> Vec<OutputFormat> {
        let mut seen = HashSet::new();
        formats.into_iter().filter(|format| seen.insert(*format)).collect()
    }
}
