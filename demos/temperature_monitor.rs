use adlsim::core::model::elements::{Action, Activity, Constraint, Executable, Param, PinDelegation};
use adlsim::{Direction, Expr, ModelBuilder, SimError, SimulationEngine, SimulationInputs, Stmt, TypeRef, Value};

/// Two sensors report Fahrenheit readings; a connector converts them to
/// Celsius and a monitor averages what arrives.
fn build_model() -> Result<adlsim::Model, SimError> {
    let mut builder = ModelBuilder::new("TemperatureMonitor");

    builder.add_component("Sensor1");
    builder.add_component("Sensor2");
    let sensor1 = builder.add_port("Sensor1", "current", Direction::Out, TypeRef::Real)?;
    let sensor2 = builder.add_port("Sensor2", "current", Direction::Out, TypeRef::Real)?;
    builder.add_component("Monitor");
    let s1 = builder.add_port("Monitor", "s1", Direction::In, TypeRef::Real)?;
    let s2 = builder.add_port("Monitor", "s2", Direction::In, TypeRef::Real)?;
    builder.add_port("Monitor", "average", Direction::Out, TypeRef::Real)?;

    // 5 * (f - 32) / 9
    builder.add_executable(Executable::new(
        "FahrenheitToCelsiusEX",
        vec![Param::new("f", TypeRef::Real)],
        TypeRef::Real,
        vec![Stmt::ret(Expr::binary(
            "/",
            Expr::binary("*", Expr::lit(5i64), Expr::binary("-", Expr::var("f"), Expr::lit(32i64))),
            Expr::lit(9i64),
        ))],
    ));
    let mut range = Constraint::new("PlausibleCelsiusEQ");
    range.inputs = vec!["f".to_string()];
    range.outputs = vec!["c".to_string()];
    range.postcondition = Some(Expr::binary(
        "and",
        Expr::binary(">=", Expr::var("c"), Expr::lit(-90i64)),
        Expr::binary("<=", Expr::var("c"), Expr::lit(60i64)),
    ));
    builder.add_constraint(range);

    builder.add_connector("FahrenheitToCelsiusCN", Some("FahrenheitToCelsiusEX"), Some("PlausibleCelsiusEQ"));
    builder.connect("FahrenheitToCelsiusCN", sensor1, s1, TypeRef::Real)?;
    builder.connect("FahrenheitToCelsiusCN", sensor2, s2, TypeRef::Real)?;

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
    average.delegations.push(PinDelegation {
        pin: "avg".to_string(),
        port: "average".to_string(),
    });
    builder.add_activity(average);
    builder.allocate_activity("AverageAC", "Monitor");
    builder.allocate_executable("AverageEX", "AverageAN");

    builder.build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .init();

    println!("Starting temperature monitor simulation");

    let inputs = SimulationInputs::new()
        .with_port("Sensor1.current", 68.0)
        .with_port("Sensor2.current", 86.0);
    let mut engine = SimulationEngine::load(build_model()?)?.with_inputs(inputs);
    let trace = engine.run();

    println!("\n{}", trace.narrative());
    if let Some(state) = engine.component_state("Monitor") {
        for (name, value) in state {
            println!("Monitor.{} = {}", name, value);
        }
    }

    // A reading far outside the plausible range is rejected by the connector
    engine.send_to_port("Sensor1.current", Value::Real(500.0));
    for entry in engine.trace().errors() {
        if let Some(err) = &entry.error {
            println!("rejected at {}: {}", entry.element, err);
        }
    }

    println!("\nJSON trace:");
    print!("{}", engine.trace().to_json_lines()?);
    Ok(())
}
