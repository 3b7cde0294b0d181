use adlsim::core::execution::Runtime;
use adlsim::core::model::elements::{
    Action, Activity, Constraint, ControlMode, Executable, Param, Protocol, ProtocolAction,
};
use adlsim::{
    run_batch, ConcurrencyMode, Direction, Expr, Model, ModelBuilder, PortRef, SimError,
    SimulationConfig, SimulationEngine, SimulationInputs, StepKind, Stmt, TypeRef, Value,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 5 * (f - 32) / 9
fn celsius_of(f: Expr) -> Expr {
    Expr::binary(
        "/",
        Expr::binary("*", Expr::lit(5i64), Expr::binary("-", f, Expr::lit(32i64))),
        Expr::lit(9i64),
    )
}

/// Sensor.f --[transform + constraint]--> Display.c
fn fahrenheit_model(postcondition: Expr) -> Model {
    let mut builder = ModelBuilder::new("Thermometer");
    builder.add_component("Sensor");
    builder.add_component("Display");
    let f = builder.add_port("Sensor", "f", Direction::Out, TypeRef::Real).unwrap();
    let c = builder.add_port("Display", "c", Direction::In, TypeRef::Real).unwrap();

    builder.add_executable(Executable::new(
        "FahrenheitToCelsiusEX",
        vec![Param::new("f", TypeRef::Real)],
        TypeRef::Real,
        vec![Stmt::ret(celsius_of(Expr::var("f")))],
    ));
    let mut constraint = Constraint::new("FahrenheitToCelsiusEQ");
    constraint.inputs = vec!["f".to_string()];
    constraint.outputs = vec!["c".to_string()];
    constraint.postcondition = Some(postcondition);
    builder.add_constraint(constraint);

    let mut convert = Activity::new("FahrenheitToCelsiusAC");
    convert.actions.push(Action {
        name: "FahrenheitToCelsiusAN".to_string(),
        constraint: Some("FahrenheitToCelsiusEQ".to_string()),
    });
    builder.add_activity(convert);

    builder.add_connector("FahrenheitToCelsiusCN", None, None);
    builder
        .connect("FahrenheitToCelsiusCN", f, c, TypeRef::Real)
        .unwrap();
    builder.allocate_activity("FahrenheitToCelsiusAC", "FahrenheitToCelsiusCN");
    builder.allocate_executable("FahrenheitToCelsiusEX", "FahrenheitToCelsiusAN");
    builder.build().unwrap()
}

fn exact_conversion() -> Expr {
    Expr::binary("==", Expr::var("c"), celsius_of(Expr::var("f")))
}

fn forwarding_executable() -> Executable {
    Executable::new(
        "IncrementEX",
        vec![Param::new("x", TypeRef::Integer)],
        TypeRef::Integer,
        vec![Stmt::ret(Expr::binary("+", Expr::var("x"), Expr::lit(1i64)))],
    )
}

/// Activity reading port `i` and writing its result to port `o`
fn forwarding_activity(name: &str, action: &str) -> Activity {
    let mut activity = Activity::new(name);
    activity.inputs = vec![Param::new("i", TypeRef::Integer)];
    activity.outputs = vec![Param::new("o", TypeRef::Integer)];
    activity.actions.push(Action {
        name: action.to_string(),
        constraint: None,
    });
    activity
}

fn port_arrivals(trace: &adlsim::Trace) -> Vec<(String, Value)> {
    trace
        .of_kind(StepKind::Port)
        .filter_map(|e| e.output.clone().map(|v| (e.element.clone(), v)))
        .collect()
}

#[test]
fn test_fahrenheit_to_celsius_scenario() {
    let inputs = SimulationInputs::new().with_port("Sensor.f", 77.0);
    let mut engine = SimulationEngine::load(fahrenheit_model(exact_conversion()))
        .unwrap()
        .with_inputs(inputs);
    let trace = engine.run();

    let execs: Vec<_> = trace.of_kind(StepKind::Exec).collect();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].element, "FahrenheitToCelsiusEX");
    assert_eq!(execs[0].output, Some(Value::Real(25.0)));
    assert_eq!(
        execs[0].input,
        Some(Value::record([("f", Value::Real(77.0))]))
    );
    assert_eq!(trace.errors().count(), 0);
    assert_eq!(engine.port_value("Display.c"), Some(Value::Real(25.0)));
    assert_eq!(engine.component_state("Display").unwrap()["c"], Value::Real(25.0));
}

#[test]
fn test_constraint_failure_scenario() {
    init_logging();
    let wrong = Expr::binary("==", Expr::var("c"), Expr::var("f"));
    let inputs = SimulationInputs::new().with_port("Sensor.f", 77.0);
    let mut engine = SimulationEngine::load(fahrenheit_model(wrong))
        .unwrap()
        .with_inputs(inputs);
    let trace = engine.run();

    let errors: Vec<_> = trace.errors().collect();
    assert_eq!(errors.len(), 1);
    match &errors[0].error {
        Some(SimError::ConstraintViolation {
            name,
            expression,
            evaluated,
        }) => {
            assert_eq!(name, "FahrenheitToCelsiusEQ");
            assert_eq!(expression, "c == f");
            assert_eq!(evaluated, "25.0 == 77.0");
        }
        other => panic!("expected a constraint violation, got {:?}", other),
    }
    assert_eq!(engine.port_value("Display.c"), None);
    assert!(!trace.halted());
}

/// Monitor averaging whatever is present on `s1` and `s2` into `avg`
fn add_average_monitor(builder: &mut ModelBuilder) {
    builder.add_component("Monitor");
    builder.add_port("Monitor", "s1", Direction::In, TypeRef::Real).unwrap();
    builder.add_port("Monitor", "s2", Direction::In, TypeRef::Real).unwrap();
    builder.add_port("Monitor", "average", Direction::Out, TypeRef::Real).unwrap();
    builder.add_executable(Executable::new(
        "AverageEX",
        vec![Param::new("a", TypeRef::Real), Param::new("b", TypeRef::Real)],
        TypeRef::Real,
        vec![Stmt::ret(Expr::binary(
            "/",
            Expr::binary("+", Expr::var("a"), Expr::var("b")),
            Expr::lit(2i64),
        ))],
    ));
    let mut average = Activity::new("AverageAC");
    average.inputs = vec![Param::new("s1", TypeRef::Real), Param::new("s2", TypeRef::Real)];
    average.outputs = vec![Param::new("avg", TypeRef::Real)];
    average.actions.push(Action {
        name: "AverageAN".to_string(),
        constraint: None,
    });
    builder.add_activity(average);
    builder.allocate_activity("AverageAC", "Monitor");
    builder.allocate_executable("AverageEX", "AverageAN");
}

#[test]
fn test_monitor_cascade_scenario() {
    let mut builder = ModelBuilder::new("Monitoring");
    add_average_monitor(&mut builder);

    let inputs = SimulationInputs::new()
        .with_port("Monitor.s1", 20.0)
        .with_port("Monitor.s2", 30.0);
    let mut engine = SimulationEngine::load(builder.build().unwrap())
        .unwrap()
        .with_inputs(inputs);
    let trace = engine.run();

    let kinds: Vec<StepKind> = trace.entries().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![StepKind::Port, StepKind::Port, StepKind::Exec]);
    assert_eq!(engine.component_state("Monitor").unwrap()["avg"], Value::Real(25.0));
}

#[test]
fn test_fan_out_to_one_component_fires_once() {
    let mut builder = ModelBuilder::new("Splitter");
    add_average_monitor(&mut builder);
    builder.add_component("Feeder");
    let feed = builder.add_port("Feeder", "o", Direction::Out, TypeRef::Real).unwrap();
    builder.add_connector("Split", None, None);
    builder
        .connect("Split", feed.clone(), PortRef::new("Monitor", "s1"), TypeRef::Real)
        .unwrap();
    builder
        .connect("Split", feed, PortRef::new("Monitor", "s2"), TypeRef::Real)
        .unwrap();

    let mut engine = SimulationEngine::load(builder.build().unwrap()).unwrap();
    assert!(engine.send_to_port("Feeder.o", Value::Real(4.0)));

    let execs: Vec<_> = engine.trace().of_kind(StepKind::Exec).collect();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].output, Some(Value::Real(4.0)));
    assert_eq!(engine.component_state("Monitor").unwrap()["avg"], Value::Real(4.0));
}

/// Sensor.f -> Display.i, Display adds one onto Display.o, Display.o -> Logger.i
fn relay_chain(sensor_link: &str, logger_link: &str) -> Model {
    let mut builder = ModelBuilder::new("RelayChain");
    for name in ["Sensor", "Display", "Logger"] {
        builder.add_component(name);
    }
    let f = builder.add_port("Sensor", "f", Direction::Out, TypeRef::Integer).unwrap();
    let display_in = builder.add_port("Display", "i", Direction::In, TypeRef::Integer).unwrap();
    let display_out = builder.add_port("Display", "o", Direction::Out, TypeRef::Integer).unwrap();
    let logger_in = builder.add_port("Logger", "i", Direction::In, TypeRef::Integer).unwrap();
    builder.add_connector(sensor_link, None, None);
    builder.add_connector(logger_link, None, None);
    builder.connect(sensor_link, f, display_in, TypeRef::Integer).unwrap();
    builder.connect(logger_link, display_out, logger_in, TypeRef::Integer).unwrap();
    builder.add_executable(forwarding_executable());
    builder.add_activity(forwarding_activity("RelayAC", "RelayAN"));
    builder.allocate_activity("RelayAC", "Display");
    builder.allocate_executable("IncrementEX", "RelayAN");
    builder.build().unwrap()
}

#[test]
fn test_flows_deliver_once_whatever_the_connector_names() {
    for (sensor_link, logger_link) in [("A_first", "B_second"), ("B_first", "A_second")] {
        let inputs = SimulationInputs::new().with_port("Sensor.f", Value::Int(1));
        let mut engine = SimulationEngine::load(relay_chain(sensor_link, logger_link))
            .unwrap()
            .with_inputs(inputs);
        let trace = engine.run();

        assert_eq!(
            port_arrivals(&trace),
            vec![
                ("Display.i".to_string(), Value::Int(1)),
                ("Logger.i".to_string(), Value::Int(2)),
            ],
            "connectors {} / {}",
            sensor_link,
            logger_link
        );
        assert_eq!(trace.of_kind(StepKind::Exec).count(), 1);
    }
}

#[test]
fn test_declared_flow_without_connector_delivers_unchanged() {
    let mut builder = ModelBuilder::new("Direct");
    for name in ["Source", "Direct", "Wired"] {
        builder.add_component(name);
    }
    let out = builder.add_port("Source", "out", Direction::Out, TypeRef::Integer).unwrap();
    let direct = builder.add_port("Direct", "in", Direction::In, TypeRef::Integer).unwrap();
    let wired = builder.add_port("Wired", "in", Direction::In, TypeRef::Integer).unwrap();
    builder.set_initial(&out, Value::Int(5)).unwrap();
    builder.add_connector("Wire", None, None);
    builder.connect("Wire", out.clone(), wired, TypeRef::Integer).unwrap();
    builder.add_flow(out, direct, TypeRef::Integer).unwrap();

    let mut engine = SimulationEngine::load(builder.build().unwrap()).unwrap();
    let trace = engine.run();

    assert_eq!(port_arrivals(&trace), vec![("Direct.in".to_string(), Value::Int(5))]);
    assert_eq!(engine.port_value("Direct.in"), Some(Value::Int(5)));
    // Only declared flows are scheduled once the model declares any
    assert_eq!(engine.port_value("Wired.in"), None);
}

/// Worker adding one to `i`, guarded by `x > 0` before and `y < 10` after
fn guarded_worker() -> Model {
    let mut builder = ModelBuilder::new("Guarded");
    builder.add_component("Worker");
    builder.add_port("Worker", "i", Direction::In, TypeRef::Integer).unwrap();
    builder.add_port("Worker", "o", Direction::Out, TypeRef::Integer).unwrap();
    builder.add_executable(forwarding_executable());
    let mut guard = Constraint::new("BoundedEQ");
    guard.inputs = vec!["x".to_string()];
    guard.outputs = vec!["y".to_string()];
    guard.precondition = Some(Expr::binary(">", Expr::var("x"), Expr::lit(0i64)));
    guard.postcondition = Some(Expr::binary("<", Expr::var("y"), Expr::lit(10i64)));
    builder.add_constraint(guard);
    let mut work = forwarding_activity("WorkAC", "WorkAN");
    work.actions[0].constraint = Some("BoundedEQ".to_string());
    builder.add_activity(work);
    builder.allocate_activity("WorkAC", "Worker");
    builder.allocate_executable("IncrementEX", "WorkAN");
    builder.build().unwrap()
}

#[test]
fn test_action_constraint_guards_activity() {
    init_logging();
    for (input, runs) in [(-1i64, 0usize), (9, 1)] {
        let inputs = SimulationInputs::new().with_port("Worker.i", Value::Int(input));
        let mut engine = SimulationEngine::load(guarded_worker()).unwrap().with_inputs(inputs);
        let trace = engine.run();

        assert_eq!(trace.of_kind(StepKind::Exec).filter(|e| e.error.is_none()).count(), runs);
        let errors: Vec<_> = trace.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].element, "IncrementEX");
        assert_eq!(errors[0].kind, StepKind::Exec);
        match &errors[0].error {
            Some(SimError::ConstraintViolation { name, .. }) => assert_eq!(name, "BoundedEQ"),
            other => panic!("expected a constraint violation, got {:?}", other),
        }
        assert!(!engine.component_state("Worker").unwrap().contains_key("o"));
        assert_eq!(engine.port_value("Worker.o"), None);
        assert!(!trace.halted());
    }

    let inputs = SimulationInputs::new().with_port("Worker.i", Value::Int(3));
    let mut engine = SimulationEngine::load(guarded_worker()).unwrap().with_inputs(inputs);
    assert_eq!(engine.run().errors().count(), 0);
    assert_eq!(engine.port_value("Worker.o"), Some(Value::Int(4)));
}

#[test]
fn test_connector_keeps_fifo_order_through_cascade() {
    let mut builder = ModelBuilder::new("Pipeline");
    for name in ["Source", "Stage", "Sink"] {
        builder.add_component(name);
    }
    let source = builder.add_port("Source", "o", Direction::Out, TypeRef::Integer).unwrap();
    let stage_in = builder.add_port("Stage", "i", Direction::In, TypeRef::Integer).unwrap();
    let stage_out = builder.add_port("Stage", "o", Direction::Out, TypeRef::Integer).unwrap();
    let sink = builder.add_port("Sink", "i", Direction::In, TypeRef::Integer).unwrap();
    builder.add_connector("Bus", None, None);
    builder.connect("Bus", source, stage_in, TypeRef::Integer).unwrap();
    builder.connect("Bus", stage_out, sink, TypeRef::Integer).unwrap();
    builder.add_executable(forwarding_executable());
    builder.add_activity(forwarding_activity("ForwardAC", "ForwardAN"));
    builder.allocate_activity("ForwardAC", "Stage");
    builder.allocate_executable("IncrementEX", "ForwardAN");

    let mut engine = SimulationEngine::load(builder.build().unwrap()).unwrap();
    assert!(engine.send_to_port("Source.o", Value::Int(1)));
    assert!(engine.send_to_port("Source.o", Value::Int(2)));

    assert_eq!(
        port_arrivals(engine.trace()),
        vec![
            ("Stage.i".to_string(), Value::Int(1)),
            ("Sink.i".to_string(), Value::Int(2)),
            ("Stage.i".to_string(), Value::Int(2)),
            ("Sink.i".to_string(), Value::Int(3)),
        ]
    );
}

#[test]
fn test_direction_invariant() {
    let mut builder = ModelBuilder::new("Wrong way");
    builder.add_component("A");
    builder.add_component("B");
    let a = builder.add_port("A", "x", Direction::In, TypeRef::Real).unwrap();
    let b = builder.add_port("B", "y", Direction::In, TypeRef::Real).unwrap();
    builder.add_connector("C", None, None);
    assert!(matches!(
        builder.connect("C", a.clone(), b, TypeRef::Real),
        Err(SimError::InvalidDirection { .. })
    ));

    let mut runtime = Runtime::new(builder.build().unwrap(), SimulationConfig::default());
    let err = runtime.send(&a, Value::Real(1.0)).unwrap_err();
    match err {
        SimError::InvalidDirection { port, operation, .. } => {
            assert_eq!(port, "A.x");
            assert_eq!(operation, "send");
        }
        other => panic!("expected InvalidDirection, got {:?}", other),
    }
    assert_eq!(runtime.model().port(&a).unwrap().value, None);
}

#[test]
fn test_cyclic_model_hits_cascade_limit() {
    init_logging();
    let mut builder = ModelBuilder::new("PingPong");
    builder.add_component("Ping");
    builder.add_component("Pong");
    let ping_in = builder.add_port("Ping", "i", Direction::In, TypeRef::Integer).unwrap();
    let ping_out = builder.add_port("Ping", "o", Direction::Out, TypeRef::Integer).unwrap();
    let pong_in = builder.add_port("Pong", "i", Direction::In, TypeRef::Integer).unwrap();
    let pong_out = builder.add_port("Pong", "o", Direction::Out, TypeRef::Integer).unwrap();
    builder.add_connector("Serve", None, None);
    builder.add_connector("Return", None, None);
    builder.connect("Serve", ping_out, pong_in, TypeRef::Integer).unwrap();
    builder.connect("Return", pong_out, ping_in, TypeRef::Integer).unwrap();
    builder.add_executable(forwarding_executable());
    builder.add_activity(forwarding_activity("PingAC", "PingAN"));
    builder.add_activity(forwarding_activity("PongAC", "PongAN"));
    builder.allocate_activity("PingAC", "Ping");
    builder.allocate_activity("PongAC", "Pong");
    builder.allocate_executable("IncrementEX", "PingAN");
    builder.allocate_executable("IncrementEX", "PongAN");

    let config = SimulationConfig::new().with_max_cascade_depth(8);
    let mut engine = SimulationEngine::load_with_config(builder.build().unwrap(), config).unwrap();
    assert!(!engine.send_to_port("Ping.o", Value::Int(0)));

    let trace = engine.trace();
    assert!(trace.halted());
    let last = trace.entries().last().unwrap();
    assert_eq!(last.error, Some(SimError::CascadeLimitExceeded { limit: 8 }));
    assert_eq!(trace.of_kind(StepKind::Exec).count(), 9);
}

#[test]
fn test_missing_allocations_are_reported_not_fatal() {
    let mut builder = ModelBuilder::new("Unallocated");
    builder.add_component("Worker");
    builder.add_port("Worker", "i", Direction::In, TypeRef::Integer).unwrap();
    builder.add_activity(forwarding_activity("WorkAC", "WorkAN"));
    builder.allocate_activity("WorkAC", "Worker");
    builder.allocate_activity("WorkAC", "NoSuchConnector");

    let inputs = SimulationInputs::new().with_port("Worker.i", Value::Int(1));
    let mut engine = SimulationEngine::load(builder.build().unwrap())
        .unwrap()
        .with_inputs(inputs);
    let trace = engine.run();

    let missing: Vec<_> = trace
        .errors()
        .filter(|e| matches!(e.error, Some(SimError::MissingAllocation(_))))
        .collect();
    assert_eq!(missing.len(), 2);
    assert!(missing.iter().any(|e| e.element == "WorkAC"));
    assert!(!trace.halted());
    assert_eq!(engine.port_value("Worker.i"), Some(Value::Int(1)));
}

#[test]
fn test_orphan_executables_run_with_supplied_arguments() {
    let mut builder = ModelBuilder::new("Library");
    builder.add_executable(Executable::new(
        "ScaleEX",
        vec![Param::new("x", TypeRef::Integer)],
        TypeRef::Integer,
        vec![Stmt::ret(Expr::binary("*", Expr::var("x"), Expr::lit(3i64)))],
    ));
    builder.add_executable(Executable::new(
        "GreetEX",
        vec![Param::new("name", TypeRef::Text)],
        TypeRef::Text,
        vec![Stmt::ret(Expr::binary("+", Expr::lit("hello "), Expr::var("name")))],
    ));

    let inputs = SimulationInputs::new().with_executable("ScaleEX", vec![Value::Int(4)]);
    let mut engine = SimulationEngine::load(builder.build().unwrap())
        .unwrap()
        .with_inputs(inputs);
    let trace = engine.run();

    let outputs: Vec<(String, Option<Value>)> = trace
        .of_kind(StepKind::Exec)
        .map(|e| (e.element.clone(), e.output.clone()))
        .collect();
    assert_eq!(
        outputs,
        vec![
            ("GreetEX".to_string(), Some(Value::text("hello "))),
            ("ScaleEX".to_string(), Some(Value::Int(12))),
        ]
    );
}

#[test]
fn test_component_protocol_drives_ports() {
    let mut builder = ModelBuilder::new("Handshake");
    builder.add_component("Client");
    builder.add_component("Server");
    let request = builder.add_port("Client", "request", Direction::Out, TypeRef::Integer).unwrap();
    let incoming = builder.add_port("Server", "incoming", Direction::In, TypeRef::Integer).unwrap();
    builder.add_connector("Link", None, None);
    builder.connect("Link", request, incoming, TypeRef::Integer).unwrap();
    builder.add_protocol(Protocol {
        name: "HandshakePR".to_string(),
        component: Some("Client".to_string()),
        actions: vec![ProtocolAction::Send {
            port: "request".to_string(),
            payload: Expr::lit(1i64),
        }],
        control: ControlMode::Several,
    });
    builder.add_protocol(Protocol {
        name: "DetachedPR".to_string(),
        component: None,
        actions: vec![ProtocolAction::Send {
            port: "request".to_string(),
            payload: Expr::lit(2i64),
        }],
        control: ControlMode::Once,
    });

    let mut engine = SimulationEngine::load(builder.build().unwrap()).unwrap();
    let trace = engine.run();

    let protocol_steps: Vec<_> = trace.of_kind(StepKind::Protocol).collect();
    assert_eq!(protocol_steps.len(), 3);
    assert!(protocol_steps.iter().all(|e| e.element == "HandshakePR"));
    assert_eq!(port_arrivals(&trace).len(), 3);
    assert_eq!(engine.port_value("Server.incoming"), Some(Value::Int(1)));
}

#[test]
fn test_protocol_failure_does_not_stop_run() {
    init_logging();
    let mut builder = ModelBuilder::new("Misuse");
    builder.add_component("Client");
    builder.add_port("Client", "reply", Direction::In, TypeRef::Integer).unwrap();
    builder.add_protocol(Protocol {
        name: "BadPR".to_string(),
        component: Some("Client".to_string()),
        actions: vec![ProtocolAction::Send {
            port: "reply".to_string(),
            payload: Expr::lit(1i64),
        }],
        control: ControlMode::Always,
    });
    builder.add_executable(Executable::new("AfterEX", vec![], TypeRef::Boolean, vec![Stmt::ret(Expr::lit(true))]));

    let mut engine = SimulationEngine::load(builder.build().unwrap()).unwrap();
    let trace = engine.run();
    let errors: Vec<_> = trace.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, StepKind::Protocol);
    assert!(matches!(errors[0].error, Some(SimError::InvalidDirection { .. })));
    assert_eq!(trace.of_kind(StepKind::Exec).count(), 1);
}

#[test]
fn test_composite_delegation_forwards_both_ways() {
    let mut builder = ModelBuilder::new("Plant");
    builder.add_component("Station");
    builder.add_component("Gauge");
    builder.add_component("Panel");
    builder.add_subcomponent("Station", "Gauge").unwrap();
    builder.add_port("Station", "feed", Direction::In, TypeRef::Real).unwrap();
    let station_level = builder.add_port("Station", "level", Direction::Out, TypeRef::Real).unwrap();
    let reading = builder.add_port("Gauge", "reading", Direction::In, TypeRef::Real).unwrap();
    let gauge_level = builder.add_port("Gauge", "level", Direction::Out, TypeRef::Real).unwrap();
    let show = builder.add_port("Panel", "show", Direction::In, TypeRef::Real).unwrap();
    builder.delegate_port("Station", "feed", reading).unwrap();
    builder.delegate_port("Station", "level", gauge_level).unwrap();
    builder.add_connector("Display", None, None);
    builder.connect("Display", station_level, show, TypeRef::Real).unwrap();

    let mut engine = SimulationEngine::load(builder.build().unwrap()).unwrap();
    assert!(engine.send_to_port("Station.feed", Value::Real(12.5)));
    assert_eq!(engine.port_value("Gauge.reading"), Some(Value::Real(12.5)));

    assert!(engine.send_to_port("Gauge.level", Value::Real(3.0)));
    assert_eq!(engine.port_value("Station.level"), Some(Value::Real(3.0)));
    assert_eq!(engine.port_value("Panel.show"), Some(Value::Real(3.0)));

    let arrivals: Vec<String> = port_arrivals(engine.trace()).into_iter().map(|(p, _)| p).collect();
    assert_eq!(arrivals, vec!["Station.feed", "Gauge.reading", "Panel.show"]);
}

#[test]
fn test_run_batch_keeps_job_order() {
    let jobs: Vec<(Model, SimulationInputs)> = [77.0, 212.0, 32.0]
        .iter()
        .map(|f| {
            (
                fahrenheit_model(exact_conversion()),
                SimulationInputs::new().with_port("Sensor.f", *f),
            )
        })
        .collect();

    for config in [
        SimulationConfig::new(),
        SimulationConfig::new().with_concurrency(ConcurrencyMode::Rayon),
        SimulationConfig::new()
            .with_concurrency(ConcurrencyMode::Rayon)
            .with_thread_pool_size(2),
    ] {
        let results = run_batch(jobs.clone(), &config);
        let celsius: Vec<Option<Value>> = results
            .into_iter()
            .map(|r| {
                r.unwrap()
                    .of_kind(StepKind::Exec)
                    .next()
                    .and_then(|e| e.output.clone())
            })
            .collect();
        assert_eq!(
            celsius,
            vec![
                Some(Value::Real(25.0)),
                Some(Value::Real(100.0)),
                Some(Value::Real(0.0)),
            ]
        );
    }
}

#[test]
fn test_trace_json_lines() {
    let inputs = SimulationInputs::new().with_port("Sensor.f", 77.0);
    let mut engine = SimulationEngine::load(fahrenheit_model(exact_conversion()))
        .unwrap()
        .with_inputs(inputs);
    let text = engine.run().to_json_lines().unwrap();

    let records: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["kind"], "exec");
    assert_eq!(records[0]["input"]["f"], 77.0);
    assert_eq!(records[1]["kind"], "port");
    assert_eq!(records[1]["element"], "Display.c");
    assert_eq!(records[1]["output"], 25.0);
    assert_eq!(records[1]["seq"], 1);
}

#[test]
fn test_unknown_port_in_inputs_is_recorded() {
    let inputs = SimulationInputs::new()
        .with_port("Sensor.nope", 1.0)
        .with_port("Sensor.f", 77.0);
    let mut engine = SimulationEngine::load(fahrenheit_model(exact_conversion()))
        .unwrap()
        .with_inputs(inputs);
    let trace = engine.run();
    let errors: Vec<_> = trace.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].element, "Sensor.nope");
    assert!(matches!(errors[0].error, Some(SimError::UnresolvedReference(_))));
    assert_eq!(engine.port_value("Display.c"), Some(Value::Real(25.0)));
}

#[test]
fn test_load_rejects_dangling_references() {
    let mut model = fahrenheit_model(exact_conversion());
    model
        .connectors
        .get_mut("FahrenheitToCelsiusCN")
        .unwrap()
        .flows[0]
        .target = PortRef::new("Ghost", "c");
    assert!(matches!(
        SimulationEngine::load(model),
        Err(SimError::UnresolvedReference(_))
    ));
}
