use msgflow::bytecode::{
    Instruction, MethodDef, MethodRef, ModuleDef, ModuleReader, OpCode, Operand, SequencePoint, TypeDef,
};
use msgflow::config::{AnalysisOptions, IndicatorSets};
use msgflow::core::{FlowAnalyzer, FlowCorrelator, SubscriptionKind, UnitFacts, UnitOrigin};
use msgflow::error::ExtractError;
use msgflow::extractors::{ExtractorSet, SourceUnit};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::Arc;
use std::path::{Path, PathBuf};

fn write<P: AsRef<Path>>(p: P, content: &str) {
    let p = p.as_ref();
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, content).unwrap();
}

const CONTRACTS: &str = r#"
namespace Shop.Contracts.Events;

public class OrderPlacedIntegrationEvent : IntegrationEventBase
{
    public Guid OrderId { get; set; }
}

public class InvoiceIssuedIntegrationEvent : IntegrationEventBase
{
    public Guid InvoiceId { get; set; }
}
"#;

const ORDER_SERVICE: &str = r#"
namespace Orders.Api.Services;

public class OrderService
{
    public async Task PlaceOrder(Guid id)
    {
        var evt = new OrderPlacedIntegrationEvent(id);
        await _eventBus.PublishAsync(evt);
    }
}
"#;

const SHIPPING_HANDLER: &str = r#"
namespace Shipping.Worker.Handlers;

public class OrderPlacedHandler : IIntegrationEventHandler<OrderPlacedIntegrationEvent>
{
    public async Task Handle(OrderPlacedIntegrationEvent @event)
    {
        await _shipments.Create(@event.OrderId);
    }
}
"#;

const SHIPPING_STARTUP: &str = r#"
public class Startup
{
    public void ConfigureServices(IServiceCollection services)
    {
        services.AddScoped<IIntegrationEventHandler<OrderPlacedIntegrationEvent>, OrderPlacedHandler>();
    }
}
"#;

/// Two repositories: `orders` publishes and defines events, `shipping`
/// consumes and registers. `orders` also carries a test project.
fn workspace() -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path();

    write(root.join("orders/Orders.sln"), "");
    write(root.join("orders/src/Orders.Api/Orders.Api.csproj"), "<Project />");
    write(root.join("orders/src/Orders.Api/Services/OrderService.cs"), ORDER_SERVICE);
    write(root.join("orders/src/Shop.Contracts/Shop.Contracts.csproj"), "<Project />");
    write(root.join("orders/src/Shop.Contracts/Events.cs"), CONTRACTS);
    write(
        root.join("orders/tests/Orders.Tests/OrderServiceTests.cs"),
        "var evt = new OrderPlacedIntegrationEvent(id);\n_eventBus.Publish(evt);\n",
    );

    write(root.join("shipping/Shipping.sln"), "");
    write(root.join("shipping/src/Shipping.Worker/Shipping.Worker.csproj"), "<Project />");
    write(
        root.join("shipping/src/Shipping.Worker/Handlers/OrderPlacedHandler.cs"),
        SHIPPING_HANDLER,
    );
    write(root.join("shipping/src/Shipping.Worker/Startup.cs"), SHIPPING_STARTUP);

    write(root.join("docs/architecture.md"), "# not a repository");
    dir
}

fn analyzer(options: AnalysisOptions) -> FlowAnalyzer {
    FlowAnalyzer::new(IndicatorSets::default(), options).unwrap()
}

#[test]
fn analyze_collects_facts_across_repositories() {
    let dir = workspace();
    let outcome = analyzer(AnalysisOptions::default()).analyze(dir.path()).unwrap();
    let report = &outcome.report;

    assert!(outcome.failures.is_empty());
    assert_eq!(report.repository_count, 2);
    assert_eq!(report.project_count, 3);

    let events: Vec<&str> = report.events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(events, vec!["InvoiceIssuedIntegrationEvent", "OrderPlacedIntegrationEvent"]);

    assert_eq!(report.publishers.len(), 1);
    assert_eq!(report.publishers[0].event_name, "OrderPlacedIntegrationEvent");
    assert_eq!(report.publishers[0].project, "Orders.Api");

    assert_eq!(report.consumers.len(), 1);
    assert_eq!(report.consumers[0].handler_class_name, "OrderPlacedHandler");
    assert_eq!(report.consumers[0].repository, "shipping");
    assert_eq!(report.consumers[0].handler_body_snippet, None);

    assert_eq!(report.subscriptions.len(), 1);
    assert_eq!(report.subscriptions[0].kind, SubscriptionKind::DependencyRegistration);

    let correlator = FlowCorrelator::new(report);
    let orphaned: Vec<&str> = correlator.orphaned().iter().map(|e| e.name.as_str()).collect();
    let dead: Vec<&str> = correlator.dead_letters().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(orphaned, vec!["InvoiceIssuedIntegrationEvent"]);
    assert_eq!(dead, vec!["InvoiceIssuedIntegrationEvent"]);
}

#[test]
fn including_tests_adds_test_project_facts() {
    let dir = workspace();
    let options = AnalysisOptions {
        exclude_tests: false,
        ..AnalysisOptions::default()
    };
    let outcome = analyzer(options).analyze(dir.path()).unwrap();
    assert_eq!(outcome.report.publishers.len(), 2);
}

#[test]
fn details_attach_handler_snippets() {
    let dir = workspace();
    let options = AnalysisOptions {
        include_details: true,
        ..AnalysisOptions::default()
    };
    let outcome = analyzer(options).analyze(dir.path()).unwrap();
    let snippet = outcome.report.consumers[0].handler_body_snippet.as_ref().unwrap();
    assert!(snippet.iter().any(|line| line.contains("_shipments.Create")));
}

#[test]
fn unreadable_unit_is_isolated() {
    let dir = workspace();
    let broken = dir.path().join("orders/src/Orders.Api/Broken.cs");
    fs::write(&broken, [0xffu8, 0xfe, 0x00, 0xc3, 0x28]).unwrap();

    let outcome = analyzer(AnalysisOptions::default()).analyze(dir.path()).unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].path, broken);
    assert!(!outcome.failures[0].reason.is_empty());
    assert_eq!(outcome.report.publishers.len(), 1);
    assert_eq!(outcome.report.events.len(), 2);
}

#[test]
fn background_jobs_only_keeps_job_sites() {
    let dir = workspace();
    write(
        dir.path().join("orders/src/Orders.Api/Jobs/ReminderJob.cs"),
        r#"
using Hangfire;

public class ReminderJob
{
    public void Execute()
    {
        _eventBus.Publish(new InvoiceIssuedIntegrationEvent());
    }
}
"#,
    );
    let options = AnalysisOptions {
        background_jobs_only: true,
        ..AnalysisOptions::default()
    };
    let outcome = analyzer(options).analyze(dir.path()).unwrap();
    let report = &outcome.report;

    assert_eq!(report.publishers.len(), 1);
    assert_eq!(report.publishers[0].background_job_class_name.as_deref(), Some("ReminderJob"));
    assert!(report.consumers.is_empty());
    assert_eq!(report.subscriptions.len(), 1);
    assert_eq!(report.events.len(), 2);
}

#[test]
fn analysis_is_deterministic() {
    let dir = workspace();
    let analyzer = analyzer(AnalysisOptions::default());
    let first = analyzer.analyze(dir.path()).unwrap().report;
    let second = analyzer.analyze(dir.path()).unwrap().report;

    assert_eq!(first.events, second.events);
    assert_eq!(first.publishers, second.publishers);
    assert_eq!(first.consumers, second.consumers);
    assert_eq!(first.subscriptions, second.subscriptions);
}

fn order_module() -> ModuleDef {
    let ctor = MethodRef {
        name: ".ctor".to_string(),
        declaring_type: "Shop.Contracts.Events.OrderPlacedIntegrationEvent".to_string(),
    };
    let publish = MethodRef {
        name: "PublishAsync".to_string(),
        declaring_type: "Shop.Messaging.IEventBus".to_string(),
    };
    ModuleDef {
        name: "Orders.Api".to_string(),
        types: vec![TypeDef {
            full_name: "Orders.Api.Services.OrderService".to_string(),
            is_interface: false,
            is_abstract: false,
            base_type: Some("System.Object".to_string()),
            interfaces: Vec::new(),
            attributes: Vec::new(),
            methods: vec![MethodDef {
                name: "PlaceOrder".to_string(),
                attributes: Vec::new(),
                body: Some(vec![
                    Instruction::new(0, OpCode::NewObj, Operand::Method(ctor)),
                    Instruction::new(5, OpCode::StoreLocal, Operand::Local(0)),
                    Instruction::new(6, OpCode::LoadLocal, Operand::Local(0)),
                    Instruction::new(7, OpCode::CallVirt, Operand::Method(publish)),
                ]),
                sequence_points: vec![SequencePoint { offset: 0, line: 8 }],
            }],
        }],
    }
}

#[test]
fn bytecode_mode_takes_publishers_from_module_dumps() {
    let dir = workspace();
    write(
        dir.path().join("orders/src/Orders.Api/bin/Debug/net8.0/Orders.Api.module.json"),
        &serde_json::to_string(&order_module()).unwrap(),
    );
    write(
        dir.path().join("orders/src/Orders.Api/bin/Debug/net8.0/Corrupt.module.json"),
        "{ \"name\": ",
    );

    let options = AnalysisOptions {
        bytecode_publishers: true,
        ..AnalysisOptions::default()
    };
    let outcome = analyzer(options).analyze(dir.path()).unwrap();
    let report = &outcome.report;

    assert_eq!(report.publishers.len(), 1);
    let site = &report.publishers[0];
    assert_eq!(site.event_name, "OrderPlacedIntegrationEvent");
    assert_eq!(site.class_name, "OrderService");
    assert_eq!(site.position, 8);
    assert!(site.origin_unit.ends_with("Orders.Api.module.json"));

    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].path.ends_with("Corrupt.module.json"));
    assert_eq!(report.consumers.len(), 1);
}

/// Serves modules by file name regardless of what is on disk.
struct InMemoryModuleReader {
    modules: HashMap<String, ModuleDef>,
}

impl ModuleReader for InMemoryModuleReader {
    fn read(&self, path: &Path) -> Result<ModuleDef, ExtractError> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.modules.get(file_name).cloned().ok_or_else(|| ExtractError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "module not loaded"),
        })
    }
}

#[test]
fn bytecode_mode_uses_the_configured_module_reader() {
    let dir = workspace();
    let bin = dir.path().join("orders/src/Orders.Api/bin/Release/net8.0");
    write(bin.join("Orders.Api.module.json"), "compiled image");
    write(bin.join("Orders.Legacy.module.json"), "compiled image");

    let reader = InMemoryModuleReader {
        modules: HashMap::from([("Orders.Api.module.json".to_string(), order_module())]),
    };
    let options = AnalysisOptions {
        bytecode_publishers: true,
        ..AnalysisOptions::default()
    };
    let outcome = analyzer(options)
        .with_module_reader(Box::new(reader))
        .analyze(dir.path())
        .unwrap();

    assert_eq!(outcome.report.publishers.len(), 1);
    assert_eq!(outcome.report.publishers[0].event_name, "OrderPlacedIntegrationEvent");
    assert_eq!(outcome.report.publishers[0].method_name, "PlaceOrder");
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].path.ends_with("Orders.Legacy.module.json"));
}

#[test]
fn extract_unit_on_empty_text_yields_nothing() {
    let unit = SourceUnit::new(
        UnitOrigin::new("orders", "Orders.Api", PathBuf::from("Empty.cs")),
        "",
    );
    let facts = analyzer(AnalysisOptions::default()).extract_unit(&unit);
    assert_eq!(facts, UnitFacts::default());
    assert!(facts.is_empty());
}

#[test]
fn invalid_indicators_are_rejected() {
    let indicators = IndicatorSets {
        publisher_methods: Vec::new(),
        ..IndicatorSets::default()
    };
    assert!(FlowAnalyzer::new(indicators, AnalysisOptions::default()).is_err());
}

#[test]
fn bytecode_mode_drops_the_source_publisher_extractor() {
    let indicators = Arc::new(IndicatorSets::default());
    let source = ExtractorSet::new(Arc::clone(&indicators), &AnalysisOptions::default()).unwrap();
    let bytecode = ExtractorSet::new(
        indicators,
        &AnalysisOptions {
            bytecode_publishers: true,
            ..AnalysisOptions::default()
        },
    )
    .unwrap();

    assert_eq!(source.names(), vec!["events", "publishers", "consumers", "subscriptions"]);
    assert_eq!(bytecode.len(), 3);
    assert!(!bytecode.names().contains(&"publishers"));
}
