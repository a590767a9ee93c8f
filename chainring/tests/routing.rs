use chainring::testing::RecordingHandler;
use chainring::{
    ChainringError, CompileError, Engine, EngineConfig, Event, HandlerDescriptor, StageDefinition,
};

mod common;

fn engine_with(config: EngineConfig, recorder: &RecordingHandler) -> Engine<Event> {
    Engine::<Event>::builder(config)
        .terminal("validate", recorder.clone())
        .terminal("persist", recorder.clone())
        .terminal("notify", recorder.clone())
        .build()
        .unwrap()
}

#[test]
fn matched_key_runs_rule_chain_and_unmatched_runs_default() {
    common::init_tracing();
    let recorder = RecordingHandler::new();
    let config = EngineConfig::default()
        .with_ring_buffer_size(16)
        .with_stage(StageDefinition::new("main").with_rule("orders/**", "validate,persist"));
    let mut engine = engine_with(config, &recorder);
    engine.start().unwrap();

    let publisher = engine.publisher();
    publisher.publish_event(&Event::routed("orders/create")).unwrap();
    publisher.publish_event(&Event::routed("users/create")).unwrap();
    engine.stop().unwrap();

    let orders: Vec<_> = recorder
        .records()
        .into_iter()
        .filter(|r| r.routing_key == "orders/create")
        .map(|r| r.handler)
        .collect();
    assert_eq!(orders, vec!["validate", "persist"]);

    let users: Vec<_> = recorder
        .records()
        .into_iter()
        .filter(|r| r.routing_key == "users/create")
        .map(|r| r.handler)
        .collect();
    assert_eq!(users, vec!["validate", "persist", "notify"]);
}

#[test]
fn earlier_declared_pattern_wins() {
    common::init_tracing();
    let recorder = RecordingHandler::new();
    let config = EngineConfig::default().with_ring_buffer_size(8).with_stage(
        StageDefinition::new("main").with_definitions(
            "[rules]\n/order/created/** = notify\n/order/** = validate, persist\n",
        ),
    );
    let mut engine = engine_with(config, &recorder);
    engine.start().unwrap();
    let publisher = engine.publisher();
    publisher.publish_event(&Event::new("order", "created", "1")).unwrap();
    publisher.publish_event(&Event::new("order", "deleted", "1")).unwrap();
    engine.stop().unwrap();

    assert_eq!(
        recorder.names(),
        vec!["notify", "validate", "persist"],
        "specific pattern declared first must shadow the general one"
    );
}

#[test]
fn handler_rules_seed_the_default_stage() {
    common::init_tracing();
    let recorder = RecordingHandler::new();
    let mut engine = Engine::<Event>::builder(EngineConfig::default().with_ring_buffer_size(8))
        .handler(HandlerDescriptor::terminal("validate", recorder.clone()).with_rule("/order/**"))
        .handler(HandlerDescriptor::terminal("persist", recorder.clone()).with_rule("/order/**"))
        .handler(HandlerDescriptor::terminal("notify", recorder.clone()))
        .build()
        .unwrap();
    assert_eq!(engine.stages().len(), 1);
    assert_eq!(engine.stages()[0].name, "default");

    engine.start().unwrap();
    engine
        .publisher()
        .publish_event(&Event::new("order", "created", "9"))
        .unwrap();
    engine.stop().unwrap();
    assert_eq!(recorder.names(), vec!["validate", "persist"]);
}

#[test]
fn unknown_handler_reference_aborts_startup() {
    let recorder = RecordingHandler::new();
    let config = EngineConfig::default().with_stage(
        StageDefinition::new("main")
            .with_rule("orders/**", "validate")
            .with_rule("users/**", "validate, audit"),
    );
    let err = Engine::<Event>::builder(config)
        .terminal("validate", recorder.clone())
        .build()
        .err()
        .unwrap();

    assert!(matches!(
        &err,
        ChainringError::Compile(CompileError::UnresolvedHandlerReference { handler, pattern })
            if handler == "audit" && pattern == "users/**"
    ));
    let message = err.to_string();
    assert!(message.contains("audit") && message.contains("users/**"));
    assert_eq!(recorder.count(), 0);
}

#[test]
fn configuration_loads_from_file() {
    let path = std::env::temp_dir().join(format!("chainring-routing-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
        ring_buffer_size = 32
        wait_strategy = "spin-loop-hint"

        [[stages]]
        name = "main"
        rules = [{ pattern = "/order/**", handlers = "persist" }]
        "#,
    )
    .unwrap();
    let config = EngineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let recorder = RecordingHandler::new();
    let mut engine = engine_with(config, &recorder);
    engine.start().unwrap();
    engine
        .publisher()
        .publish_event(&Event::new("order", "paid", "3"))
        .unwrap();
    engine.stop().unwrap();
    assert_eq!(recorder.names(), vec!["persist"]);
}
