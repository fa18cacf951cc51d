use msgflow::config::IndicatorSets;
use msgflow::core::UnitOrigin;
use msgflow::extractors::{SourcePublisherExtractor, SourceUnit};
use std::path::PathBuf;
use std::sync::Arc;

fn extractor() -> SourcePublisherExtractor {
    SourcePublisherExtractor::new(Arc::new(IndicatorSets::default())).unwrap()
}

fn unit(text: &str) -> SourceUnit {
    SourceUnit::new(
        UnitOrigin::new("orders", "Orders.Api", PathBuf::from("src/OrderService.cs")),
        text,
    )
}

#[test]
fn traces_local_variable_to_constructed_event() {
    let text = r#"
public class OrderService
{
    public async Task PlaceOrder(Guid id)
    {
        var evt = new OrderPlacedIntegrationEvent(id);
        await _repository.Save(id);
        _messagePublisher.Publish(evt);
    }
}
"#;
    let sites = extractor().extract_publishers(&unit(text));

    assert_eq!(sites.len(), 1);
    let site = &sites[0];
    assert_eq!(site.event_name, "OrderPlacedIntegrationEvent");
    assert_eq!(site.class_name, "OrderService");
    assert_eq!(site.method_name, "PlaceOrder");
    assert_eq!(site.position, 8);
    assert_eq!(site.context.as_deref(), Some("_messagePublisher.Publish(evt);"));
    assert!(!site.is_in_background_job);
    assert_eq!(site.background_job_class_name, None);
}

#[test]
fn unresolved_identifier_gets_placeholder_name() {
    let text = r#"
public class OrderService
{
    public void Forward(OrderPlacedIntegrationEvent evt)
    {
        _messagePublisher.Publish(evt);
    }
}
"#;
    let sites = extractor().extract_publishers(&unit(text));
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].event_name, "Unknown(evt)");
}

#[test]
fn assignment_outside_trace_window_is_not_used() {
    let mut text = String::from("var evt = new OrderPlacedIntegrationEvent(id);\n");
    for _ in 0..25 {
        text.push_str("Log();\n");
    }
    text.push_str("_eventBus.Publish(evt);\n");

    let sites = extractor().extract_publishers(&unit(&text));
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].event_name, "Unknown(evt)");
}

#[test]
fn nearest_reassignment_wins() {
    let text = r#"
message = new OrderPlacedIntegrationEvent(id);
message = new OrderCancelledIntegrationEvent(id);
_bus.PublishAsync(message);
"#;
    let sites = extractor().extract_publishers(&unit(text));
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].event_name, "OrderCancelledIntegrationEvent");
}

#[test]
fn inline_construction_is_recorded() {
    let text = r#"
public class ShippingService
{
    public async Task Ship(Guid orderId)
    {
        await _endpoint.Publish(new Contracts.OrderShippedIntegrationEvent(orderId));
        await _mediator.Send(new ShipCommand(orderId));
    }
}
"#;
    let sites = extractor().extract_publishers(&unit(text));

    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].event_name, "OrderShippedIntegrationEvent");
    assert_eq!(sites[0].class_name, "ShippingService");
    assert_eq!(sites[0].method_name, "Ship");
}

#[test]
fn non_publisher_fields_are_ignored() {
    let text = r#"
var evt = new OrderPlacedIntegrationEvent(id);
_logger.Publish(evt);
_repository.Send(evt);
"#;
    assert!(extractor().extract_publishers(&unit(text)).is_empty());
}

#[test]
fn background_job_unit_marks_site_with_current_class() {
    let text = r#"
using Hangfire;

public class NightlyExportJob
{
    [AutomaticRetry(Attempts = 3)]
    public void Execute()
    {
        var evt = new ExportFinishedEvent();
        _eventBus.Publish(evt);
    }
}
"#;
    let sites = extractor().extract_publishers(&unit(text));

    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].event_name, "ExportFinishedEvent");
    assert!(sites[0].is_in_background_job);
    assert_eq!(sites[0].background_job_class_name.as_deref(), Some("NightlyExportJob"));
}

#[test]
fn empty_unit_yields_no_publishers() {
    assert!(extractor().extract_publishers(&unit("")).is_empty());
}

#[test]
fn every_publish_call_on_a_line_is_recorded() {
    let text = r#"
var evt = new OrderPlacedEvent(id);
_bus.Publish(evt); _bus.Publish(new OrderShippedEvent(id));
"#;
    let sites = extractor().extract_publishers(&unit(text));

    let events: Vec<&str> = sites.iter().map(|s| s.event_name.as_str()).collect();
    assert_eq!(events, vec!["OrderPlacedEvent", "OrderShippedEvent"]);
    assert!(sites.iter().all(|s| s.position == 3));
}

#[test]
fn repeated_field_calls_on_a_line_are_traced_separately() {
    let text = r#"
var placed = new OrderPlacedEvent(id);
var shipped = new OrderShippedEvent(id);
_bus.Publish(placed); _bus.Publish(shipped);
"#;
    let sites = extractor().extract_publishers(&unit(text));

    let events: Vec<&str> = sites.iter().map(|s| s.event_name.as_str()).collect();
    assert_eq!(events, vec!["OrderPlacedEvent", "OrderShippedEvent"]);
}

#[test]
fn short_identifiers_resolve_through_substring_matches() {
    // A defining line is any line with `new ` that contains the identifier,
    // so `a` is found inside `var` on the nearer line.
    let text = r#"
var a = new AEvent();
var b = new BEvent();
_bus.Publish(a); _bus.Publish(b);
"#;
    let sites = extractor().extract_publishers(&unit(text));

    let events: Vec<&str> = sites.iter().map(|s| s.event_name.as_str()).collect();
    assert_eq!(events, vec!["BEvent", "BEvent"]);
}

#[test]
fn comparisons_and_lambdas_are_not_assignments() {
    let text = r#"
var evt = new OrderPlacedIntegrationEvent(id);
if (evt == null) return;
Func<bool> ready = () => evt != null;
var evtCount = 1;
_bus.Publish(evt);
"#;
    let sites = extractor().extract_publishers(&unit(text));
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].event_name, "OrderPlacedIntegrationEvent");
}

#[test]
fn plain_assignment_stops_the_trace() {
    let text = r#"
var evt = new OrderPlacedIntegrationEvent(id);
evt=_factory.Create(id);
_bus.Publish(evt);
"#;
    let sites = extractor().extract_publishers(&unit(text));
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].event_name, "Unknown(evt)");
}
