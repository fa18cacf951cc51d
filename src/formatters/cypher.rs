//! Graph-database script export.
//!
//! The report is first folded into a `petgraph` graph of repositories,
//! services, events and the sites that touch them, then emitted as Cypher
//! `CREATE` statements.

use anyhow::Result;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Graph};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::core::FlowReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowNodeKind {
    Repository,
    Service,
    Event,
    Publisher,
    Consumer,
    Subscription,
}

impl FlowNodeKind {
    fn label(self) -> &'static str {
        match self {
            FlowNodeKind::Repository => "Repository",
            FlowNodeKind::Service => "Service",
            FlowNodeKind::Event => "Event",
            FlowNodeKind::Publisher => "Publisher",
            FlowNodeKind::Consumer => "Consumer",
            FlowNodeKind::Subscription => "Subscription",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            FlowNodeKind::Repository => "repo",
            FlowNodeKind::Service => "svc",
            FlowNodeKind::Event => "evt",
            FlowNodeKind::Publisher => "pub",
            FlowNodeKind::Consumer => "con",
            FlowNodeKind::Subscription => "sub",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowEdgeKind {
    Contains,
    Defines,
    Publishes,
    Consumes,
    Subscribes,
}

impl FlowEdgeKind {
    fn relationship(self) -> &'static str {
        match self {
            FlowEdgeKind::Contains => "CONTAINS",
            FlowEdgeKind::Defines => "DEFINES",
            FlowEdgeKind::Publishes => "PUBLISHES",
            FlowEdgeKind::Consumes => "CONSUMES",
            FlowEdgeKind::Subscribes => "SUBSCRIBES",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowNode {
    pub kind: FlowNodeKind,
    pub name: String,
    pub properties: Vec<(&'static str, String)>,
}

pub type FlowGraph = Graph<FlowNode, FlowEdgeKind, Directed>;

/// Deduplicating builder: nodes are keyed by kind and a caller-chosen key.
struct FlowGraphBuilder {
    graph: FlowGraph,
    node_map: HashMap<(FlowNodeKind, String), NodeIndex>,
}

impl FlowGraphBuilder {
    fn new() -> Self {
        Self {
            graph: Graph::new(),
            node_map: HashMap::new(),
        }
    }

    fn node(&mut self, kind: FlowNodeKind, key: String, name: &str, properties: Vec<(&'static str, String)>) -> NodeIndex {
        if let Some(index) = self.node_map.get(&(kind, key.clone())) {
            return *index;
        }
        let index = self.graph.add_node(FlowNode {
            kind,
            name: name.to_string(),
            properties,
        });
        self.node_map.insert((kind, key), index);
        index
    }

    fn service(&mut self, repository: &str, project: &str) -> NodeIndex {
        let repo = self.node(FlowNodeKind::Repository, repository.to_string(), repository, Vec::new());
        let service = self.node(
            FlowNodeKind::Service,
            format!("{repository}/{project}"),
            project,
            vec![("repository", repository.to_string())],
        );
        if self.graph.find_edge(repo, service).is_none() {
            self.graph.add_edge(repo, service, FlowEdgeKind::Contains);
        }
        service
    }

    fn event(&mut self, name: &str) -> NodeIndex {
        self.node(FlowNodeKind::Event, name.to_string(), name, Vec::new())
    }

    fn build(self) -> FlowGraph {
        self.graph
    }
}

pub fn build_flow_graph(report: &FlowReport) -> FlowGraph {
    let mut builder = FlowGraphBuilder::new();

    for event in &report.events {
        let service = builder.service(&event.repository, &event.project);
        let node = builder.event(&event.name);
        if let Some(weight) = builder.graph.node_weight_mut(node) {
            weight.properties = vec![
                ("fullName", event.fully_qualified_name.clone()),
                ("properties", event.properties.join(", ")),
            ];
        }
        builder.graph.add_edge(service, node, FlowEdgeKind::Defines);
    }

    for (i, site) in report.publishers.iter().enumerate() {
        let service = builder.service(&site.repository, &site.project);
        let publisher = builder.node(
            FlowNodeKind::Publisher,
            format!("{i}"),
            &format!("{}.{}", site.class_name, site.method_name),
            vec![
                ("file", site.origin_unit.display().to_string()),
                ("line", site.position.to_string()),
                ("backgroundJob", site.is_in_background_job.to_string()),
            ],
        );
        let event = builder.event(&site.event_name);
        builder.graph.add_edge(service, publisher, FlowEdgeKind::Contains);
        builder.graph.add_edge(publisher, event, FlowEdgeKind::Publishes);
    }

    for (i, site) in report.consumers.iter().enumerate() {
        let service = builder.service(&site.repository, &site.project);
        let consumer = builder.node(
            FlowNodeKind::Consumer,
            format!("{i}"),
            &site.handler_class_name,
            vec![
                ("file", site.origin_unit.display().to_string()),
                ("line", site.position.to_string()),
                ("backgroundJob", site.is_in_background_job.to_string()),
            ],
        );
        let event = builder.event(&site.event_name);
        builder.graph.add_edge(service, consumer, FlowEdgeKind::Contains);
        builder.graph.add_edge(consumer, event, FlowEdgeKind::Consumes);
    }

    for (i, record) in report.subscriptions.iter().enumerate() {
        let service = builder.service(&record.repository, &record.project);
        let subscription = builder.node(
            FlowNodeKind::Subscription,
            format!("{i}"),
            record.kind.as_str(),
            vec![
                ("file", record.origin_unit.display().to_string()),
                ("line", record.position.to_string()),
            ],
        );
        let event = builder.event(&record.event_name);
        builder.graph.add_edge(service, subscription, FlowEdgeKind::Contains);
        builder.graph.add_edge(subscription, event, FlowEdgeKind::Subscribes);
    }

    builder.build()
}

/// Escape a value for a single-quoted Cypher string literal.
pub fn cypher_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }
    escaped.push('\'');
    escaped
}

pub struct CypherFormatter;

impl CypherFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format_to_file(&self, report: &FlowReport, output_path: &Path) -> Result<()> {
        let script = self.format_report(report)?;
        fs::write(output_path, script)?;
        Ok(())
    }

    pub fn format_report(&self, report: &FlowReport) -> Result<String> {
        let graph = build_flow_graph(report);
        let mut out = String::new();

        writeln!(out, "// msgflow graph generated {}", report.generated_at.to_rfc3339())?;
        for index in graph.node_indices() {
            let node = &graph[index];
            let mut props = vec![format!("name: {}", cypher_string(&node.name))];
            props.extend(
                node.properties
                    .iter()
                    .map(|(key, value)| format!("{key}: {}", cypher_string(value))),
            );
            writeln!(
                out,
                "CREATE ({}:{} {{{}}})",
                variable(node.kind, index),
                node.kind.label(),
                props.join(", ")
            )?;
        }

        for edge in graph.edge_references() {
            let source = &graph[edge.source()];
            let target = &graph[edge.target()];
            writeln!(
                out,
                "CREATE ({})-[:{}]->({})",
                variable(source.kind, edge.source()),
                edge.weight().relationship(),
                variable(target.kind, edge.target())
            )?;
        }
        writeln!(out, ";")?;

        Ok(out)
    }
}

impl Default for CypherFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn variable(kind: FlowNodeKind, index: NodeIndex) -> String {
    format!("{}{}", kind.prefix(), index.index())
}
