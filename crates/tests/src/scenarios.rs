//! End-to-end scenarios: engine, built-in processors and test processors together

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{
    data_map, Callback, CallbackErrorPolicy, ContractError, DataMap, InstanceHandle,
    InstanceState, PortInfo, Processor, Properties, RouteState, Selector, Value,
};
use dispatcher::instance::key_handle;
use dispatcher::{MemorySink, RecordFilter, RoutingEngine, SinkFanout, SinkHandle};
use processors::shapes::{ShapesProcessor, CIRCLE, SQUARE, TRIANGLE};

use crate::conformance::{ConformanceFactory, ExpectedPorts, SharedReport, PROP1, PROP2};
use crate::harness::{
    blueprint, build, eventually, plugins_with, port, route, ScriptedFactory, SHAPE_TYPE,
};

fn props(pairs: &[(&str, &str)]) -> Properties {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn blue() -> InstanceHandle {
    key_handle(&data_map! { "color" => "BLUE" })
}

/// One-input route on stream `Shapes` that stays Started until resumed
fn paused_watcher() -> contracts::RouteConfig {
    let mut config = route("watcher", "scripted", vec![port("in", "Shapes")], Vec::new());
    config.start_paused = true;
    config
}

// ---------------------------------------------------------------------------
// Conformance processor
// ---------------------------------------------------------------------------

fn conformance_route(properties: Properties) -> contracts::RouteConfig {
    let mut config = route(
        "conformance",
        "conformance",
        vec![
            port("Input1", "Example ComplexType"),
            port("Input2", "Other topic"),
        ],
        vec![
            port("Output1", "Example ComplexType"),
            port("Output2", "Other topic"),
        ],
    );
    config.properties = properties;
    config.periodic_period_ms = Some(10);
    config
}

fn conformance_plugins(report: &SharedReport) -> dispatcher::PluginRegistry {
    let expected = ExpectedPorts {
        inputs: vec![
            PortInfo::new(0, "Input1", "Example ComplexType", SHAPE_TYPE),
            PortInfo::new(1, "Input2", "Other topic", SHAPE_TYPE),
        ],
        outputs: vec![
            PortInfo::new(0, "Output1", "Example ComplexType", SHAPE_TYPE),
            PortInfo::new(1, "Output2", "Other topic", SHAPE_TYPE),
        ],
    };
    let mut plugins = processors::builtin_plugins();
    plugins.register(
        "conformance",
        ConformanceFactory {
            expected,
            report: Arc::clone(report),
        },
    );
    plugins
}

#[tokio::test]
async fn test_conformance_full_lifecycle() {
    let report = SharedReport::default();
    let config = conformance_route(props(&[(PROP1, "value1"), (PROP2, "value2")]));
    let (engine, _log) = build(&blueprint(vec![config]), conformance_plugins(&report));

    assert!(engine.activate_all().await.is_empty());
    engine
        .publish("Example ComplexType", data_map! { "color" => "BLUE", "x" => 3 })
        .unwrap();
    engine.flush().await.unwrap();

    let periodic_seen = eventually(|| {
        report.lock().unwrap().count(Callback::PeriodicEvent) > 0
    })
    .await;
    assert!(periodic_seen, "no periodic event while running");

    {
        let route = engine.route("conformance").unwrap();
        assert_eq!(route.pause().await.unwrap(), RouteState::Paused);
        assert_eq!(route.resume().await.unwrap(), RouteState::Running);
        assert_eq!(route.stop().await.unwrap(), RouteState::Stopped);
        route.disable().await.unwrap();
        assert_eq!(route.state(), None);
    }
    engine.shutdown().await;

    let report = report.lock().unwrap();
    assert!(report.violations.is_empty(), "{:#?}", report.violations);
    assert!(report.never_called().is_empty(), "{:?}", report.never_called());
    assert_eq!(report.count(Callback::Create), 1);
    assert_eq!(report.count(Callback::InputEnabled), 2);
    assert_eq!(report.count(Callback::OutputDisabled), 2);
    assert_eq!(report.count(Callback::Stop), 1);
    assert_eq!(report.samples_seen.len(), 1);
    assert!(report.samples_seen[0].contains("BLUE"));
}

#[tokio::test]
async fn test_missing_property_fails_construction() {
    let report = SharedReport::default();
    let config = conformance_route(props(&[(PROP1, "value1")]));
    let (engine, _log) = build(&blueprint(vec![config]), conformance_plugins(&report));

    let failures = engine.activate_all().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].callback(), Some(Callback::Create));
    assert!(failures[0].to_string().contains(PROP2));

    let route = engine.route("conformance").unwrap();
    assert_eq!(route.state(), None);
    assert!(route.start().await.is_err());
    engine.shutdown().await;

    let report = report.lock().unwrap();
    assert_eq!(report.count(Callback::Create), 0);
    assert_eq!(report.count(Callback::Start), 0);
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

fn shapes_route(processor: &str) -> contracts::RouteConfig {
    route(
        "shapes",
        processor,
        vec![port(SQUARE, "Square"), port(CIRCLE, "Circle")],
        vec![port(TRIANGLE, "Triangle")],
    )
}

#[tokio::test]
async fn test_shapes_join() {
    let plugins = processors::builtin_plugins();
    let (engine, log) = build(&blueprint(vec![shapes_route("shapes")]), plugins);
    assert!(engine.activate_all().await.is_empty());

    engine
        .publish("Circle", data_map! { "color" => "BLUE", "y" => 9 })
        .unwrap();
    engine.flush().await.unwrap();
    engine
        .publish("Square", data_map! { "color" => "BLUE", "x" => 1, "y" => 2 })
        .unwrap();
    engine.flush().await.unwrap();
    engine.shutdown().await;

    let triangles = log.on_stream("Triangle");
    assert_eq!(triangles.len(), 1);
    assert_eq!(
        triangles[0].sample.data,
        Some(data_map! { "color" => "BLUE", "x" => 1, "y" => 2, "shapesize" => 9 })
    );
    assert_eq!(triangles[0].sample.instance_handle(), blue());
}

#[tokio::test]
async fn test_shapes_dispose_passed_through_and_instance_taken() {
    let armed = Arc::new(AtomicBool::new(false));
    let taken = Arc::new(Mutex::new(Vec::new()));
    let watcher = {
        let armed = Arc::clone(&armed);
        let taken = Arc::clone(&taken);
        ScriptedFactory::new(move |route| {
            ShapesProcessor.on_data_available(route)?;
            if armed.load(Ordering::SeqCst) {
                let left = route.require_input(SQUARE)?.take(&Selector::instance(blue()))?;
                taken.lock().unwrap().push(left.len());
            }
            Ok(())
        })
    };
    let (engine, log) = build(&blueprint(vec![shapes_route("scripted")]), plugins_with(watcher));
    assert!(engine.activate_all().await.is_empty());

    engine
        .publish("Square", data_map! { "color" => "BLUE", "x" => 1, "y" => 2 })
        .unwrap();
    engine.flush().await.unwrap();

    armed.store(true, Ordering::SeqCst);
    engine
        .dispose("Square", &data_map! { "color" => "BLUE" })
        .unwrap();
    engine.flush().await.unwrap();
    engine.shutdown().await;

    let triangles = log.on_stream("Triangle");
    assert_eq!(triangles.len(), 2);
    let dispose = &triangles[1].sample;
    assert!(!dispose.valid_data());
    assert!(dispose.data.is_none());
    assert_eq!(dispose.info.instance_state, InstanceState::NotAliveDisposed);
    assert_eq!(dispose.instance_handle(), triangles[0].sample.instance_handle());

    assert_eq!(*taken.lock().unwrap(), vec![0]);
}

// ---------------------------------------------------------------------------
// Read / take semantics
// ---------------------------------------------------------------------------

fn data_of(samples: &contracts::LoanedSamples<'_>) -> Vec<Option<DataMap>> {
    samples.iter().map(|s| s.data.clone()).collect()
}

#[tokio::test]
async fn test_read_repeats_and_take_consumes() {
    type Observation = (Vec<Option<DataMap>>, Vec<Option<DataMap>>, usize, usize);
    let seen: Arc<Mutex<Vec<Observation>>> = Arc::default();
    let watcher = {
        let seen = Arc::clone(&seen);
        ScriptedFactory::new(move |route| {
            let input = route.require_input("in")?;
            let first = data_of(&input.read_all()?);
            let second = data_of(&input.read_all()?);
            let took = input.take_all()?.len();
            let took_again = input.take_all()?.len();
            seen.lock().unwrap().push((first, second, took, took_again));
            Ok(())
        })
    };
    let (engine, _log) = build(&blueprint(vec![paused_watcher()]), plugins_with(watcher));
    assert!(engine.activate_all().await.is_empty());

    engine.publish("Shapes", data_map! { "color" => "RED", "x" => 1 }).unwrap();
    engine.publish("Shapes", data_map! { "color" => "BLUE", "x" => 2 }).unwrap();
    let watcher_route = engine.route("watcher").unwrap();
    assert_eq!(watcher_route.resume().await.unwrap(), RouteState::Running);
    engine.shutdown().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (first, second, took, took_again) = &seen[0];
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(*took, 2);
    assert_eq!(*took_again, 0);
}

#[tokio::test]
async fn test_lifecycle_sample_keeps_instance_handle() {
    let seen: Arc<Mutex<Vec<(bool, bool, InstanceHandle)>>> = Arc::default();
    let watcher = {
        let seen = Arc::clone(&seen);
        ScriptedFactory::new(move |route| {
            for sample in &route.require_input("in")?.take_all()? {
                seen.lock().unwrap().push((
                    sample.valid_data(),
                    sample.data.is_some(),
                    sample.instance_handle(),
                ));
            }
            Ok(())
        })
    };
    let (engine, _log) = build(&blueprint(vec![paused_watcher()]), plugins_with(watcher));
    assert!(engine.activate_all().await.is_empty());

    engine.publish("Shapes", data_map! { "color" => "BLUE", "x" => 1 }).unwrap();
    engine.unregister("Shapes", &data_map! { "color" => "BLUE" }).unwrap();
    engine.route("watcher").unwrap().resume().await.unwrap();
    engine.shutdown().await;

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![(true, true, blue()), (false, false, blue())]);
}

#[tokio::test]
async fn test_next_instance_walks_whole_cache() {
    let visited: Arc<Mutex<Vec<(InstanceHandle, usize)>>> = Arc::default();
    let watcher = {
        let visited = Arc::clone(&visited);
        ScriptedFactory::new(move |route| {
            let input = route.require_input("in")?;
            let mut previous = InstanceHandle::NIL;
            loop {
                let batch = input.take(&Selector::next_instance(previous))?;
                let Some(first) = batch.get(0) else {
                    break;
                };
                previous = first.instance_handle();
                visited.lock().unwrap().push((previous, batch.len()));
            }
            Ok(())
        })
    };
    let (engine, _log) = build(&blueprint(vec![paused_watcher()]), plugins_with(watcher));
    assert!(engine.activate_all().await.is_empty());

    for (color, x) in [("RED", 1), ("BLUE", 2), ("GREEN", 3), ("BLUE", 4)] {
        engine
            .publish("Shapes", data_map! { "color" => color, "x" => x })
            .unwrap();
    }
    engine.route("watcher").unwrap().resume().await.unwrap();
    engine.shutdown().await;

    let visited = visited.lock().unwrap();
    assert_eq!(visited.len(), 3);
    assert!(visited.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(visited.iter().map(|(_, n)| n).sum::<usize>(), 4);
    assert!(visited.contains(&(blue(), 2)));
}

#[tokio::test]
async fn test_content_filter_and_unknown_instance() {
    let counts: Arc<Mutex<Vec<usize>>> = Arc::default();
    let watcher = {
        let counts = Arc::clone(&counts);
        ScriptedFactory::new(move |route| {
            let input = route.require_input("in")?;
            let big = input.read(&Selector::all().with_filter("x > 10", Vec::new()))?;
            let red = input.read(&Selector::all().with_filter("color = %0", vec!["RED".into()]))?;
            let unknown = input.read(&Selector::instance(key_handle(
                &data_map! { "color" => "PURPLE" },
            )))?;
            counts
                .lock()
                .unwrap()
                .extend([big.len(), red.len(), unknown.len()]);
            Ok(())
        })
    };
    let (engine, _log) = build(&blueprint(vec![paused_watcher()]), plugins_with(watcher));
    assert!(engine.activate_all().await.is_empty());

    engine.publish("Shapes", data_map! { "color" => "RED", "x" => 5 }).unwrap();
    engine.publish("Shapes", data_map! { "color" => "BLUE", "x" => 20 }).unwrap();
    engine.route("watcher").unwrap().resume().await.unwrap();
    engine.shutdown().await;

    assert_eq!(*counts.lock().unwrap(), vec![1, 1, 0]);
}

#[tokio::test]
async fn test_history_depth_keeps_newest() {
    let kept: Arc<Mutex<Vec<Value>>> = Arc::default();
    let watcher = {
        let kept = Arc::clone(&kept);
        ScriptedFactory::new(move |route| {
            for sample in &route.require_input("in")?.take_all()? {
                if let Some(x) = sample.get("x") {
                    kept.lock().unwrap().push(x.clone());
                }
            }
            Ok(())
        })
    };
    let mut config = paused_watcher();
    config.inputs[0].history_depth = Some(2);
    let (engine, _log) = build(&blueprint(vec![config]), plugins_with(watcher));
    assert!(engine.activate_all().await.is_empty());

    for x in 1..=5 {
        engine
            .publish("Shapes", data_map! { "color" => "RED", "x" => x })
            .unwrap();
    }
    let watcher_route = engine.route("watcher").unwrap();
    watcher_route.resume().await.unwrap();
    assert_eq!(watcher_route.metrics().snapshot().samples_evicted, 3);
    engine.shutdown().await;

    assert_eq!(*kept.lock().unwrap(), vec![Value::Int(4), Value::Int(5)]);
}

#[tokio::test]
async fn test_loans_released_on_early_exit() {
    let watcher = ScriptedFactory::new(|route| {
        let batch = route.require_input("in")?.read_all()?;
        if !batch.is_empty() {
            return Err(ContractError::processor("bailing out with a batch in hand"));
        }
        Ok(())
    });
    let (engine, _log) = build(&blueprint(vec![paused_watcher()]), plugins_with(watcher));
    assert!(engine.activate_all().await.is_empty());

    engine.publish("Shapes", data_map! { "color" => "RED" }).unwrap();
    let watcher_route = engine.route("watcher").unwrap();
    watcher_route.resume().await.unwrap();

    let metrics = watcher_route.metrics();
    assert_eq!(metrics.snapshot().callback_failures, 1);
    assert_eq!(metrics.outstanding_loans(), 0);
    // a failing data callback does not change the route state
    assert_eq!(watcher_route.state(), Some(RouteState::Running));
    engine.shutdown().await;
}

// ---------------------------------------------------------------------------
// Callback failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_callbacks_roll_back_transitions() {
    let mut plugins = processors::builtin_plugins();
    plugins.register(
        "fails_on_start",
        ScriptedFactory::new(|_| Ok(())).failing_on(Callback::Start),
    );
    plugins.register(
        "fails_on_pause",
        ScriptedFactory::new(|route| {
            route.require_input("in")?.take_all()?;
            Ok(())
        })
        .failing_on(Callback::Pause),
    );
    let routes = vec![
        route("starter", "fails_on_start", vec![port("in", "A")], Vec::new()),
        route("pauser", "fails_on_pause", vec![port("in", "B")], Vec::new()),
    ];
    let (engine, _log) = build(&blueprint(routes), plugins);

    let failures = engine.activate_all().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].callback(), Some(Callback::Start));
    assert_eq!(
        engine.route("starter").unwrap().state(),
        Some(RouteState::Created)
    );

    let pauser = engine.route("pauser").unwrap();
    let err = pauser.pause().await.unwrap_err();
    assert_eq!(err.callback(), Some(Callback::Pause));
    assert_eq!(pauser.state(), Some(RouteState::Running));

    // still running, so data keeps flowing
    engine.publish("B", data_map! { "color" => "RED" }).unwrap();
    engine.flush().await.unwrap();
    assert_eq!(pauser.metrics().snapshot().samples_taken, 1);
    engine.shutdown().await;
}

// ---------------------------------------------------------------------------
// Blueprint driven
// ---------------------------------------------------------------------------

const CHAIN: &str = r#"
[[types]]
name = "ShapeType"
members = [
    { name = "color", kind = "string", key = true },
    { name = "x", kind = "int32" },
    { name = "y", kind = "int32" },
    { name = "shapesize", kind = "int32" },
]

[[routes]]
name = "ingress"
processor = "fwd_by_input_name"
properties = { forwarding_table = '[{"input": "raw*", "output": "square"}]' }

[[routes.inputs]]
name = "raw_square"
stream_name = "RawSquare"
type_name = "ShapeType"

[[routes.outputs]]
name = "square"
stream_name = "Square"
type_name = "ShapeType"

[[routes]]
name = "shapes"
processor = "shapes"

[[routes.inputs]]
name = "Square"
stream_name = "Square"
type_name = "ShapeType"

[[routes.inputs]]
name = "Circle"
stream_name = "Circle"
type_name = "ShapeType"

[[routes.outputs]]
name = "Triangle"
stream_name = "Triangle"
type_name = "ShapeType"
"#;

#[tokio::test]
async fn test_blueprint_forwarding_into_shapes() {
    let bp = ConfigLoader::load_from_str(CHAIN, ConfigFormat::Toml).unwrap();
    let (engine, log) = build(&bp, processors::builtin_plugins());
    assert!(engine.activate_all().await.is_empty());

    engine
        .publish("Circle", data_map! { "color" => "GREEN", "y" => 30 })
        .unwrap();
    engine.flush().await.unwrap();
    engine
        .publish("RawSquare", data_map! { "color" => "GREEN", "x" => 7, "y" => 8 })
        .unwrap();
    // upstream route first, so one flush settles the chain
    engine.flush().await.unwrap();
    engine.shutdown().await;

    assert_eq!(log.on_stream("Square").len(), 1);
    let triangles = log.on_stream("Triangle");
    assert_eq!(triangles.len(), 1);
    assert_eq!(
        triangles[0].sample.data,
        Some(data_map! { "color" => "GREEN", "x" => 7, "y" => 8, "shapesize" => 30 })
    );
    assert_eq!(triangles[0].writer.as_deref(), Some("shapes/Triangle"));
}

#[tokio::test]
async fn test_failing_data_callback_disables_route_under_policy() {
    let armed = Arc::new(AtomicBool::new(false));
    let watcher = {
        let armed = Arc::clone(&armed);
        ScriptedFactory::new(move |route| {
            route.require_input("in")?.take_all()?;
            if armed.load(Ordering::SeqCst) {
                return Err(ContractError::processor("bad sample"));
            }
            Ok(())
        })
    };
    let mut bp = blueprint(vec![route(
        "watcher",
        "scripted",
        vec![port("in", "Shapes")],
        Vec::new(),
    )]);
    bp.engine.on_callback_error = CallbackErrorPolicy::Disable;
    let (engine, _log) = build(&bp, plugins_with(watcher));
    assert!(engine.activate_all().await.is_empty());

    engine.publish("Shapes", data_map! { "color" => "RED", "x" => 1 }).unwrap();
    engine.flush().await.unwrap();
    assert!(engine.callback_failures().is_empty());

    armed.store(true, Ordering::SeqCst);
    engine.publish("Shapes", data_map! { "color" => "RED", "x" => 2 }).unwrap();
    engine.flush().await.unwrap();

    let failures = engine.callback_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].route, "watcher");
    assert_eq!(failures[0].callback, Callback::DataAvailable);
    assert!(failures[0].message.contains("bad sample"));
    assert_eq!(engine.route("watcher").unwrap().state(), None);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_sink_observes_only_selected_writers() {
    let (sink, log) = MemorySink::new("joined");
    let filter = RecordFilter::all()
        .writers(["shapes/*"])
        .unwrap()
        .include_lifecycle(false);
    let mut sinks = SinkFanout::default();
    sinks.push(SinkHandle::spawn(sink, filter, 64));
    let engine = RoutingEngine::with_sinks(
        &blueprint(vec![shapes_route("shapes")]),
        processors::builtin_plugins(),
        sinks,
    )
    .unwrap();
    assert!(engine.activate_all().await.is_empty());

    engine
        .publish("Circle", data_map! { "color" => "BLUE", "y" => 9 })
        .unwrap();
    engine.flush().await.unwrap();
    engine
        .publish("Square", data_map! { "color" => "BLUE", "x" => 1, "y" => 2 })
        .unwrap();
    engine.flush().await.unwrap();
    engine.dispose("Square", &data_map! { "color" => "BLUE" }).unwrap();
    engine.flush().await.unwrap();
    engine.shutdown().await;

    let records = log.snapshot();
    assert!(!records.is_empty());
    assert!(records
        .iter()
        .all(|r| r.writer.as_deref() == Some("shapes/Triangle") && r.sample.valid_data()));
    assert_eq!(log.on_stream("Triangle").len(), records.len());
}
