use msgflow::config::IndicatorSets;
use msgflow::core::{UnitOrigin, HANDLER_METHOD_NAME};
use msgflow::extractors::{ConsumerExtractor, SourceUnit};
use std::path::PathBuf;
use std::sync::Arc;

fn extractor() -> ConsumerExtractor {
    ConsumerExtractor::new(Arc::new(IndicatorSets::default())).unwrap()
}

fn unit_named(file: &str, text: &str) -> SourceUnit {
    SourceUnit::new(
        UnitOrigin::new("orders", "Orders.Worker", PathBuf::from(format!("src/{file}"))),
        text,
    )
}

const HANDLER: &str = r#"
namespace Orders.Worker.Handlers;

public class OrderHandler : IIntegrationEventHandler<OrderPlacedIntegrationEvent>
{
    public async Task Handle(OrderPlacedIntegrationEvent @event)
    {
        await _store.Save(@event.OrderId);
    }
}
"#;

#[test]
fn handler_implementation_yields_one_consume_site() {
    let sites = extractor().extract_consumers(&unit_named("OrderHandler.cs", HANDLER));

    assert_eq!(sites.len(), 1);
    let site = &sites[0];
    assert_eq!(site.event_name, "OrderPlacedIntegrationEvent");
    assert_eq!(site.handler_class_name, "OrderHandler");
    assert_eq!(site.handler_method_name, HANDLER_METHOD_NAME);
    assert_eq!(site.position, 4);
    assert!(!site.is_in_background_job);
    assert_eq!(site.handler_body_snippet, None);
}

#[test]
fn details_capture_handle_body() {
    let sites = extractor()
        .with_details(true)
        .extract_consumers(&unit_named("OrderHandler.cs", HANDLER));

    let snippet = sites[0].handler_body_snippet.as_ref().unwrap();
    assert_eq!(snippet.len(), 3);
    assert!(snippet[1].contains("_store.Save"));
    assert_eq!(snippet[2].trim(), "}");
}

#[test]
fn class_on_previous_line_is_found() {
    let text = r#"
public sealed class PaymentHandler
    : IEventHandler<PaymentReceivedEvent>
{
}
"#;
    let sites = extractor().extract_consumers(&unit_named("PaymentHandler.cs", text));
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].handler_class_name, "PaymentHandler");
}

#[test]
fn missing_class_declaration_falls_back_to_unknown() {
    let mut text = String::from("public class FarAway\n");
    for _ in 0..8 {
        text.push('\n');
    }
    text.push_str("    IConsumer<StockReserved>\n");

    let sites = extractor().extract_consumers(&unit_named("Misc.cs", &text));
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].handler_class_name, "Unknown");
}

#[test]
fn registration_context_is_not_a_consumer() {
    let text = r#"
public static class MessagingExtensions
{
    public static IServiceCollection AddMessaging(this IServiceCollection services)
    {
        services.AddScoped<IIntegrationEventHandler<OrderPlacedIntegrationEvent>, OrderHandler>();
        return services;
    }
}
"#;
    assert!(extractor()
        .extract_consumers(&unit_named("MessagingExtensions.cs", text))
        .is_empty());
}

#[test]
fn entry_units_are_skipped() {
    for file in ["Startup.cs", "Program.cs", "BusConfiguration.cs"] {
        assert!(
            extractor().extract_consumers(&unit_named(file, HANDLER)).is_empty(),
            "{file} should be treated as an entry unit"
        );
    }
}

#[test]
fn background_job_flag_follows_unit_text() {
    let text = format!("using Quartz;\n{HANDLER}");
    let sites = extractor().extract_consumers(&unit_named("OrderHandler.cs", &text));
    assert_eq!(sites.len(), 1);
    assert!(sites[0].is_in_background_job);
}

#[test]
fn empty_unit_yields_no_consumers() {
    assert!(extractor().extract_consumers(&unit_named("Empty.cs", "")).is_empty());
}
