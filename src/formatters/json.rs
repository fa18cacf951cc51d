use anyhow::Result;
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::core::{CorrelationSummary, FlowReport};

/// Structured-document export: every fact plus the correlation summary.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Single-line output.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    pub fn format_to_file(&self, report: &FlowReport, output_path: &Path) -> Result<()> {
        let json_content = self.format_report(report)?;
        fs::write(output_path, json_content)?;
        Ok(())
    }

    pub fn format_report(&self, report: &FlowReport) -> Result<String> {
        let summary = CorrelationSummary::from_report(report);

        let output = json!({
            "meta": {
                "generated_at": report.generated_at.to_rfc3339(),
                "repositories": report.repository_count,
                "projects": report.project_count,
                "events": report.events.len(),
                "publishers": report.publishers.len(),
                "consumers": report.consumers.len(),
                "subscriptions": report.subscriptions.len(),
            },
            "events": report.events,
            "publishers": report.publishers,
            "consumers": report.consumers,
            "subscriptions": report.subscriptions,
            "flows": summary.events,
            "orphaned": summary.orphaned,
            "dead_letters": summary.dead_letters,
            "matrix": summary.matrix,
        });

        if self.pretty {
            Ok(serde_json::to_string_pretty(&output)?)
        } else {
            Ok(serde_json::to_string(&output)?)
        }
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}
