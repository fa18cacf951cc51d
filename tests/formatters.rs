use clap::ValueEnum;
use msgflow::core::{
    ConsumeSite, EventDefinition, FlowReport, PublishSite, SubscriptionKind, SubscriptionRecord, UnitFacts,
    UnitOrigin,
};
use msgflow::formatters::cypher::cypher_string;
use msgflow::formatters::{build_flow_graph, CypherFormatter, JsonFormatter, MarkdownFormatter, OutputFormat};
use std::fs;
use std::path::PathBuf;

fn sample_report() -> FlowReport {
    let orders = UnitOrigin::new("orders", "Orders.Api", PathBuf::from("orders/OrderService.cs"));
    let shipping = UnitOrigin::new("shipping", "Shipping.Worker", PathBuf::from("shipping/Handler.cs"));

    FlowReport::from_partials(
        2,
        vec![
            UnitFacts {
                events: vec![
                    EventDefinition::new("OrderPlaced".to_string(), Some("Shop.Events"), &orders)
                        .with_properties(vec!["Guid OrderId".to_string()]),
                    EventDefinition::new("InvoiceIssued".to_string(), Some("Shop.Events"), &orders),
                ],
                publishers: vec![PublishSite::new(
                    "OrderPlaced".to_string(),
                    &orders,
                    "OrderService".to_string(),
                    "PlaceOrder".to_string(),
                    12,
                )
                .in_background_job("OrderService".to_string())],
                ..UnitFacts::default()
            },
            UnitFacts {
                consumers: vec![ConsumeSite::new(
                    "OrderPlaced".to_string(),
                    &shipping,
                    "O'Brien Handler".to_string(),
                    4,
                )],
                subscriptions: vec![SubscriptionRecord::new(
                    "OrderPlaced".to_string(),
                    &shipping,
                    SubscriptionKind::EventBusSubscription,
                    9,
                )],
                ..UnitFacts::default()
            },
        ],
    )
}

#[test]
fn json_contains_facts_and_correlation() {
    let output = JsonFormatter::new().format_report(&sample_report()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(value["meta"]["repositories"], 2);
    assert_eq!(value["meta"]["projects"], 2);
    assert_eq!(value["events"].as_array().unwrap().len(), 2);
    assert_eq!(value["publishers"][0]["event_name"], "OrderPlaced");
    assert_eq!(value["publishers"][0]["is_in_background_job"], true);
    assert_eq!(value["subscriptions"][0]["kind"], "EventBusSubscription");
    assert_eq!(value["orphaned"], serde_json::json!(["InvoiceIssued"]));
    assert_eq!(value["dead_letters"], serde_json::json!(["InvoiceIssued"]));
    assert_eq!(value["matrix"].as_array().unwrap().len(), 2);
}

#[test]
fn compact_json_is_single_line() {
    let output = JsonFormatter::new().compact().format_report(&sample_report()).unwrap();
    assert!(!output.contains('\n'));
}

#[test]
fn markdown_lists_sections_and_statuses() {
    let output = MarkdownFormatter::new().format_report(&sample_report()).unwrap();

    assert!(output.starts_with("# MESSAGE_FLOW"));
    assert!(output.contains("| Repositories | 2 |"));
    assert!(output.contains("| `InvoiceIssued` | orders | 0 | 0 | 0 | orphaned, dead-letter |"));
    assert!(output.contains("| `OrderPlaced` | orders | 1 | 1 | 1 | ok |"));
    assert!(output.contains("## Event Matrix"));
    assert!(output.contains("### shipping"));
    assert!(output.contains("[job: OrderService]"));

    let without_matrix = MarkdownFormatter::new()
        .with_matrix(false)
        .format_report(&sample_report())
        .unwrap();
    assert!(!without_matrix.contains("## Event Matrix"));
}

#[test]
fn flow_graph_deduplicates_repositories_services_and_events() {
    let graph = build_flow_graph(&sample_report());
    // 2 repositories, 2 services, 2 events, 1 publisher, 1 consumer, 1 subscription
    assert_eq!(graph.node_count(), 9);
}

#[test]
fn cypher_script_creates_nodes_and_relationships() {
    let output = CypherFormatter::new().format_report(&sample_report()).unwrap();

    assert!(output.contains(":Repository {name: 'orders'}"));
    assert!(output.contains(":Event {name: 'OrderPlaced'"));
    assert!(output.contains(":Consumer {name: 'O\\'Brien Handler'"));
    for relationship in ["CONTAINS", "DEFINES", "PUBLISHES", "CONSUMES", "SUBSCRIBES"] {
        assert!(output.contains(&format!("-[:{relationship}]->")), "missing {relationship}");
    }
    assert!(output.trim_end().ends_with(';'));
}

#[test]
fn cypher_strings_are_escaped() {
    assert_eq!(cypher_string("plain"), "'plain'");
    assert_eq!(cypher_string("it's"), "'it\\'s'");
    assert_eq!(cypher_string("a\\b\r\nc"), "'a\\\\b\\nc'");
}

#[test]
fn reports_are_written_to_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let report = sample_report();
    let json = dir.path().join("flow-report.json");
    let markdown = dir.path().join("flow-report.md");
    let cypher = dir.path().join("flow-graph.cypher");

    JsonFormatter::new().format_to_file(&report, &json).unwrap();
    MarkdownFormatter::new().format_to_file(&report, &markdown).unwrap();
    CypherFormatter::new().format_to_file(&report, &cypher).unwrap();

    assert!(fs::read_to_string(json).unwrap().contains("\"flows\""));
    assert!(fs::read_to_string(markdown).unwrap().contains("## Summary"));
    assert!(fs::read_to_string(cypher).unwrap().contains("CREATE ("));
}

#[test]
fn repeated_output_formats_are_written_once() {
    use OutputFormat::{Cypher, Json, Markdown};

    assert_eq!(OutputFormat::distinct([Json, Markdown, Json]), vec![Json, Markdown]);
    assert_eq!(
        OutputFormat::distinct([Cypher, Json, Cypher, Markdown, Json]),
        vec![Cypher, Json, Markdown]
    );
    assert_eq!(OutputFormat::from_str("markdown", false), Ok(Markdown));
    assert_eq!(Cypher.file_name(), "flow-graph.cypher");
}
