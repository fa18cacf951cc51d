use msgflow::extractors::state::declared_type;
use msgflow::extractors::window::{closes_block, SourceWindow};
use msgflow::extractors::ScanState;

#[test]
fn scan_state_tracks_latest_declarations() {
    let lines = [
        "namespace Orders.Api.Services;",
        "public class OrderService",
        "{",
        "    public async Task PlaceOrder(Guid id)",
        "    {",
        "        var evt = new OrderPlacedIntegrationEvent(id);",
        "    }",
        "}",
    ];
    let state = lines.iter().fold(ScanState::new(), |state, line| state.advance(line));

    assert_eq!(state.namespace.as_deref(), Some("Orders.Api.Services"));
    assert_eq!(state.class_or_unknown(), "OrderService");
    assert_eq!(state.method_or_unknown(), "PlaceOrder");
}

#[test]
fn scan_state_is_not_reset_by_closing_braces() {
    let state = ScanState::new()
        .advance("public class First")
        .advance("    private void Run()")
        .advance("}")
        .advance("}");
    assert_eq!(state.class_or_unknown(), "First");
    assert_eq!(state.method_or_unknown(), "Run");
}

#[test]
fn scan_state_advance_returns_a_new_value() {
    let before = ScanState::new();
    let after = before.advance("internal sealed class Worker");
    assert_eq!(before, ScanState::default());
    assert_eq!(after.current_class.as_deref(), Some("Worker"));
    assert_eq!(before.class_or_unknown(), "Unknown");
}

#[test]
fn declared_type_recognizes_type_keywords() {
    assert_eq!(declared_type("public record OrderDto(Guid Id);").as_deref(), Some("OrderDto"));
    assert_eq!(declared_type("    interface IOrders").as_deref(), Some("IOrders"));
    assert_eq!(declared_type("var x = classification;"), None);
}

#[test]
fn closes_block_only_for_unopened_brace() {
    assert!(closes_block("    }"));
    assert!(closes_block("} // end"));
    assert!(!closes_block("public int Id { get; set; }"));
    assert!(!closes_block("    {"));
}

#[test]
fn scan_around_prefers_nearest_line() {
    let lines = [
        "public class Far",
        "",
        "public class Near",
        "    : IIntegrationEventHandler<OrderPlaced>",
        "",
    ];
    let window = SourceWindow::new(&lines);
    assert_eq!(window.scan_around(3, 5, declared_type).as_deref(), Some("Near"));
    assert_eq!(window.scan_around(4, 1, declared_type), None);
}

#[test]
fn body_after_stops_at_closing_brace_of_body() {
    let lines = [
        "    public async Task Handle(OrderPlaced @event)",
        "    {",
        "",
        "        await _store.Save(@event.OrderId);",
        "    }",
        "    public void Other() { }",
    ];
    let window = SourceWindow::new(&lines);
    let body = window.body_after(0, 15);
    assert_eq!(body.len(), 3);
    assert_eq!(body[1].trim(), "await _store.Save(@event.OrderId);");
    assert_eq!(body[2].trim(), "}");
}

#[test]
fn body_after_respects_line_limit() {
    let mut lines = vec!["void Handle(X x)", "{"];
    lines.extend(std::iter::repeat("    Step();").take(30));
    lines.push("}");
    let window = SourceWindow::new(&lines);
    assert_eq!(window.body_after(0, 15).len(), 15);
}

#[test]
fn registration_context_spans_ten_before_and_three_after() {
    let keywords = vec!["services.".to_string()];
    let mut lines = vec!["services.AddLogging();"];
    lines.extend(std::iter::repeat("").take(10));
    lines.push("IIntegrationEventHandler<OrderPlaced>");
    lines.extend(std::iter::repeat("").take(5));
    let window = SourceWindow::new(&lines);

    assert!(window.in_registration_context(10, &keywords));
    assert!(!window.in_registration_context(11, &keywords));
}
