//! Rendered flow report.
//!
//! ## Output Structure
//!
//! - **Summary**: repository, project and fact counts
//! - **Events**: one row per definition with matched publisher/consumer counts
//! - **Orphaned / Dead-letter**: events nobody publishes / nobody consumes
//! - **Repositories**: publish and consume sites grouped by repository

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::core::{FlowCorrelator, FlowReport};

pub struct MarkdownFormatter {
    include_matrix: bool,
}

impl MarkdownFormatter {
    pub fn new() -> Self {
        Self {
            include_matrix: true,
        }
    }

    pub fn with_matrix(mut self, include: bool) -> Self {
        self.include_matrix = include;
        self
    }

    pub fn format_to_file(&self, report: &FlowReport, output_path: &Path) -> Result<()> {
        let content = self.format_report(report)?;
        fs::write(output_path, content)?;
        Ok(())
    }

    pub fn format_report(&self, report: &FlowReport) -> Result<String> {
        let correlator = FlowCorrelator::new(report);
        let flows = correlator.flows();
        let mut out = String::new();

        writeln!(out, "# MESSAGE_FLOW")?;
        writeln!(out)?;
        writeln!(out, "Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(out)?;
        writeln!(out, "## Summary")?;
        writeln!(out)?;
        writeln!(out, "| Metric | Count |")?;
        writeln!(out, "| --- | ---: |")?;
        writeln!(out, "| Repositories | {} |", report.repository_count)?;
        writeln!(out, "| Projects | {} |", report.project_count)?;
        writeln!(out, "| Events | {} |", report.events.len())?;
        writeln!(out, "| Publishers | {} |", report.publishers.len())?;
        writeln!(out, "| Consumers | {} |", report.consumers.len())?;
        writeln!(out, "| Subscriptions | {} |", report.subscriptions.len())?;
        writeln!(out)?;

        writeln!(out, "## Events")?;
        writeln!(out)?;
        if flows.is_empty() {
            writeln!(out, "_No event definitions found._")?;
        } else {
            writeln!(out, "| Event | Repository | Publishers | Consumers | Subscriptions | Status |")?;
            writeln!(out, "| --- | --- | ---: | ---: | ---: | --- |")?;
            for flow in &flows {
                let status = match (flow.is_orphaned(), flow.is_dead_letter()) {
                    (true, true) => "orphaned, dead-letter",
                    (true, false) => "orphaned",
                    (false, true) => "dead-letter",
                    (false, false) => "ok",
                };
                writeln!(
                    out,
                    "| `{}` | {} | {} | {} | {} | {} |",
                    flow.definition.name,
                    flow.definition.repository,
                    flow.publishers.len(),
                    flow.consumers.len(),
                    flow.subscriptions.len(),
                    status
                )?;
            }
        }
        writeln!(out)?;

        self.write_event_list(&mut out, "Orphaned Events", "published by nobody", &correlator.orphaned())?;
        self.write_event_list(&mut out, "Dead-letter Events", "consumed by nobody", &correlator.dead_letters())?;

        if self.include_matrix {
            writeln!(out, "## Event Matrix")?;
            writeln!(out)?;
            writeln!(out, "| Event name | Defined | Publishers | Consumers | Subscriptions |")?;
            writeln!(out, "| --- | --- | ---: | ---: | ---: |")?;
            for row in correlator.matrix() {
                writeln!(
                    out,
                    "| `{}` | {} | {} | {} | {} |",
                    row.event_name,
                    if row.has_definition { "yes" } else { "no" },
                    row.publishers,
                    row.consumers,
                    row.subscriptions
                )?;
            }
            writeln!(out)?;
        }

        self.write_repositories(&mut out, report)?;
        Ok(out)
    }

    fn write_event_list(
        &self,
        out: &mut String,
        title: &str,
        meaning: &str,
        events: &[&crate::core::EventDefinition],
    ) -> Result<()> {
        writeln!(out, "## {title}")?;
        writeln!(out)?;
        if events.is_empty() {
            writeln!(out, "_None._")?;
        } else {
            writeln!(out, "Events {meaning}:")?;
            writeln!(out)?;
            for event in events {
                writeln!(
                    out,
                    "- `{}` ({}, {})",
                    event.fully_qualified_name,
                    event.repository,
                    event.origin_unit.display()
                )?;
            }
        }
        writeln!(out)?;
        Ok(())
    }

    fn write_repositories(&self, out: &mut String, report: &FlowReport) -> Result<()> {
        let mut by_repository: BTreeMap<&str, (Vec<String>, Vec<String>)> = BTreeMap::new();
        for site in &report.publishers {
            let job = site
                .background_job_class_name
                .as_deref()
                .map(|class| format!(" [job: {class}]"))
                .unwrap_or_default();
            by_repository
                .entry(site.repository.as_str())
                .or_default()
                .0
                .push(format!(
                    "`{}` from `{}.{}` ({}:{}){}",
                    site.event_name,
                    site.class_name,
                    site.method_name,
                    site.origin_unit.display(),
                    site.position,
                    job
                ));
        }
        for site in &report.consumers {
            by_repository
                .entry(site.repository.as_str())
                .or_default()
                .1
                .push(format!(
                    "`{}` in `{}.{}` ({}:{})",
                    site.event_name,
                    site.handler_class_name,
                    site.handler_method_name,
                    site.origin_unit.display(),
                    site.position
                ));
        }

        writeln!(out, "## Repositories")?;
        writeln!(out)?;
        for (repository, (publishers, consumers)) in by_repository {
            writeln!(out, "### {repository}")?;
            writeln!(out)?;
            writeln!(out, "Publishes:")?;
            for line in &publishers {
                writeln!(out, "- {line}")?;
            }
            if publishers.is_empty() {
                writeln!(out, "- _nothing_")?;
            }
            writeln!(out)?;
            writeln!(out, "Consumes:")?;
            for line in &consumers {
                writeln!(out, "- {line}")?;
            }
            if consumers.is_empty() {
                writeln!(out, "- _nothing_")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl Default for MarkdownFormatter {
    fn default() -> Self {
        Self::new()
    }
}
