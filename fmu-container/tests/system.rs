mod common;

use std::{path::Path, sync::Arc};

use assert_approx_eq::assert_approx_eq;
use common::{Messages, MockLoader, config};
use fmi_unit::Status;
use fmu_container::{Error, System};
use rstest::rstest;
use serde_json::json;

fn instantiate(loader: &MockLoader, config: fmu_container::Config) -> Result<System, Error> {
    System::instantiate_with(
        loader,
        config,
        Path::new("resources"),
        "container",
        Messages::default().logger(),
        false,
        false,
    )
}

/// `a.out (vr 1)` drives `b.in (vr 1)`. The container exposes `b.in` as vr 1 and `a.out` as vr 2.
fn a_to_b(parallel: bool) -> fmu_container::Config {
    config(
        &["a", "b"],
        parallel,
        json!([{
            "type": "Real",
            "startComponent": 0,
            "startValueReference": 1,
            "endComponent": 1,
            "endValueReference": 1,
        }]),
        json!([
            {"type": "Real", "components": [1], "valueReferences": [1], "start": 0.0},
            {"type": "Real", "components": [0], "valueReferences": [1]},
        ]),
    )
}

#[rstest]
#[case::sequential(false)]
#[case::parallel(true)]
#[test_log::test]
fn test_propagation_latency(#[case] parallel: bool) {
    let loader = MockLoader::new();
    loader.observe("a").step_outputs.lock().unwrap().push((1, 5.0));
    let mut system = instantiate(&loader, a_to_b(parallel)).unwrap();
    assert_eq!(system.active_workers(), if parallel { 2 } else { 0 });

    assert_eq!(system.enter_initialization_mode(None, 0.0, None), Status::OK);
    assert_eq!(system.exit_initialization_mode(), Status::OK);

    let mut values = [f64::NAN];
    assert_eq!(system.do_step(0.0, 1.0, true), Status::OK);
    assert_eq!(system.get_real(&[1], &mut values), Status::OK);
    assert_approx_eq!(values[0], 0.0);

    assert_eq!(system.do_step(1.0, 1.0, true), Status::OK);
    assert_eq!(system.get_real(&[1], &mut values), Status::OK);
    assert_approx_eq!(values[0], 5.0);
    assert_approx_eq!(system.time(), 2.0);
}

#[test_log::test]
fn test_parallel_steps_run_on_workers() {
    let loader = MockLoader::new();
    let mut system = instantiate(&loader, a_to_b(true)).unwrap();
    assert_eq!(system.do_step(0.0, 1.0, true), Status::OK);
    assert_eq!(
        *loader.observe("b").step_threads.lock().unwrap(),
        ["fmu-container-b"]
    );
}

#[test_log::test]
fn test_fan_out_write_single_source_read() {
    let loader = MockLoader::new();
    let config = config(
        &["a", "b"],
        false,
        json!([]),
        json!([{"type": "Real", "components": [0, 1], "valueReferences": [3, 4]}]),
    );
    let system = instantiate(&loader, config).unwrap();

    assert_eq!(system.set_real(&[1], &[3.0]), Status::OK);
    assert_approx_eq!(loader.observe("a").real(3), 3.0);
    assert_approx_eq!(loader.observe("b").real(4), 3.0);

    loader.observe("b").reals.lock().unwrap().insert(4, 7.0);
    let mut values = [0.0];
    assert_eq!(system.get_real(&[1], &mut values), Status::OK);
    assert_approx_eq!(values[0], 3.0);
}

#[test_log::test]
fn test_fan_out_stops_at_failure() {
    let loader = MockLoader::new();
    let config = config(
        &["a", "b", "c"],
        false,
        json!([]),
        json!([{"type": "Integer", "components": [0, 1, 2], "valueReferences": [1, 1, 1]}]),
    );
    let system = instantiate(&loader, config).unwrap();
    loader.observe("b").fail_sets(Status::Error);

    assert_eq!(system.set_integer(&[1], &[42]), Status::Error);
    assert_eq!(loader.observe("a").integers.lock().unwrap().get(&1), Some(&42));
    assert_eq!(loader.observe("c").integers.lock().unwrap().get(&1), None);
}

#[test_log::test]
fn test_time_reference() {
    let loader = MockLoader::new();
    let mut system = instantiate(&loader, a_to_b(false)).unwrap();
    let mut values = [f64::NAN];

    assert_eq!(system.enter_initialization_mode(Some(1e-6), 2.0, Some(10.0)), Status::OK);
    assert_eq!(system.get_real(&[0], &mut values), Status::OK);
    assert_approx_eq!(values[0], 2.0);

    assert_eq!(system.do_step(2.0, 0.5, true), Status::OK);
    assert_eq!(system.get_real(&[0], &mut values), Status::OK);
    assert_approx_eq!(values[0], 2.5);

    // Propagation reads `a`, but time reads never reach a unit
    let gets = loader.observe("b").gets.load(std::sync::atomic::Ordering::SeqCst);
    assert_eq!(gets, 0);

    // Time is read only
    assert_eq!(system.set_real(&[0], &[1.0]), Status::Error);
    let mut integers = [0];
    assert_eq!(system.get_integer(&[0], &mut integers), Status::Error);
}

#[test_log::test]
fn test_out_of_range_get() {
    let loader = MockLoader::new();
    let messages = Messages::default();
    let system = System::instantiate_with(
        &loader,
        a_to_b(false),
        Path::new("resources"),
        "container",
        messages.logger(),
        false,
        false,
    )
    .unwrap();
    loader.observe("a").reals.lock().unwrap().insert(1, 9.0);

    let mut values = [f64::NAN; 3];
    assert_eq!(system.get_real(&[1, 2, 3], &mut values), Status::Error);
    assert_approx_eq!(values[0], 0.0);
    assert_approx_eq!(values[1], 9.0);
    assert!(values[2].is_nan());

    let (status, category, message) = messages.all().pop().unwrap();
    assert_eq!(status, Status::Error);
    assert_eq!(category, "logError");
    assert!(message.contains("value reference 3"), "{message}");

    assert_eq!(system.set_real(&[1], &[]), Status::Error);
}

#[rstest]
#[case::sequential(false)]
#[case::parallel(true)]
#[test_log::test]
fn test_failed_step_keeps_time(#[case] parallel: bool) {
    let loader = MockLoader::new();
    let mut system = instantiate(&loader, a_to_b(parallel)).unwrap();
    assert_eq!(system.do_step(0.0, 1.0, true), Status::OK);
    loader.observe("a").fail_steps(Status::Discard);
    assert_eq!(system.do_step(1.0, 1.0, true), Status::Discard);
    assert_approx_eq!(system.time(), 1.0);

    loader.observe("a").fail_steps(Status::Warning);
    assert_eq!(system.do_step(1.0, 1.0, true), Status::Warning);
    assert_approx_eq!(system.time(), 2.0);
}

#[test_log::test]
fn test_sequential_short_circuit() {
    let loader = MockLoader::new();
    let mut system =
        instantiate(&loader, config(&["a", "b", "c"], false, json!([]), json!([]))).unwrap();
    loader.observe("b").fail_steps(Status::Error);

    assert_eq!(system.do_step(0.0, 1.0, true), Status::Error);
    assert_eq!(loader.observe("a").steps(), 1);
    assert_eq!(loader.observe("b").steps(), 1);
    assert_eq!(loader.observe("c").steps(), 0);
}

#[test_log::test]
fn test_parallel_total_wait() {
    let loader = MockLoader::new();
    let mut system =
        instantiate(&loader, config(&["a", "b", "c"], true, json!([]), json!([]))).unwrap();
    loader.observe("a").fail_steps(Status::Fatal);
    loader.observe("b").fail_steps(Status::Error);

    assert_eq!(system.do_step(0.0, 1.0, true), Status::Fatal);
    for name in ["a", "b", "c"] {
        assert_eq!(loader.observe(name).steps(), 1, "{name}");
    }
    assert_eq!(system.components()[1].status(), Status::Error);
}

#[test_log::test]
fn test_crashed_worker_step_is_fatal() {
    let loader = MockLoader::new();
    let mut system =
        instantiate(&loader, config(&["a", "b"], true, json!([]), json!([]))).unwrap();
    loader
        .observe("b")
        .crash_steps
        .store(true, std::sync::atomic::Ordering::SeqCst);

    assert_eq!(system.do_step(0.0, 1.0, true), Status::Fatal);
    assert_eq!(system.components()[1].status(), Status::Fatal);
    assert_eq!(loader.observe("a").steps(), 1);
    assert_approx_eq!(system.time(), 0.0);

    // The worker survives and answers the next request
    loader
        .observe("b")
        .crash_steps
        .store(false, std::sync::atomic::Ordering::SeqCst);
    assert_eq!(system.do_step(0.0, 1.0, true), Status::OK);
    assert_eq!(system.active_workers(), 2);
    drop(system);
    assert_eq!(loader.live(), 0);
}

#[rstest]
#[case::sequential(false)]
#[case::parallel(true)]
#[test_log::test]
fn test_idempotent_reset(#[case] parallel: bool) {
    let loader = MockLoader::new();
    loader.observe("a").step_outputs.lock().unwrap().push((1, 5.0));
    let mut system = instantiate(&loader, a_to_b(parallel)).unwrap();
    assert_eq!(system.enter_initialization_mode(None, 1.0, None), Status::OK);
    assert_eq!(system.do_step(1.0, 1.0, true), Status::OK);
    assert_eq!(system.do_step(2.0, 1.0, true), Status::OK);
    assert_eq!(system.terminate(), Status::OK);
    assert_eq!(system.active_workers(), 0);

    let snapshot = |system: &System| {
        let reals = ["a", "b"].map(|name| loader.observe(name).reals.lock().unwrap().clone());
        let states = system
            .components()
            .iter()
            .map(|c| c.with_unit(|unit| unit.state()))
            .collect::<Vec<_>>();
        (system.time(), reals, states)
    };

    assert_eq!(system.reset(), Status::OK);
    let first = snapshot(&system);
    assert_eq!(system.reset(), Status::OK);
    let second = snapshot(&system);

    assert_eq!(first, second);
    assert_approx_eq!(second.0, 0.0);
    assert_eq!(loader.observe("a").resets.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(system.active_workers(), if parallel { 2 } else { 0 });

    // The system steps again after a reset
    assert_eq!(system.do_step(0.0, 1.0, true), Status::OK);
}

#[rstest]
#[case::sequential(false)]
#[case::parallel(true)]
#[test_log::test]
fn test_teardown(#[case] parallel: bool) {
    let loader = MockLoader::new();
    let mut system =
        instantiate(&loader, config(&["a", "b", "c"], parallel, json!([]), json!([]))).unwrap();
    assert_eq!(loader.live(), 3);
    assert_eq!(system.do_step(0.0, 1.0, true), Status::OK);

    // Workers share ownership of their unit, so no unit outlives a running worker
    drop(system);
    assert_eq!(loader.live(), 0);
}

#[test_log::test]
fn test_failed_load_unwinds() {
    let loader = MockLoader {
        fail_load: Some("c".to_owned()),
        ..Default::default()
    };
    let result = instantiate(&loader, config(&["a", "b", "c"], true, json!([]), json!([])));
    assert!(
        matches!(&result, Err(Error::Component { name, .. }) if name == "c"),
        "{result:?}"
    );
    assert_eq!(loader.loads.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(loader.live(), 0);
}

#[test_log::test]
fn test_failed_start_value_unwinds() {
    let loader = MockLoader::new();
    loader.observe("b").fail_sets(Status::Error);
    let result = instantiate(&loader, a_to_b(true));
    assert!(
        matches!(
            result,
            Err(Error::StartValue {
                index: 0,
                status: Status::Error
            })
        ),
        "{result:?}"
    );
    assert_eq!(loader.live(), 0);
}

#[test_log::test]
fn test_incompatible_start_value() {
    let loader = MockLoader::new();
    let config = config(
        &["a"],
        false,
        json!([]),
        json!([{"type": "Boolean", "components": [0], "valueReferences": [1], "start": "yes"}]),
    );
    assert!(matches!(instantiate(&loader, config), Err(Error::Config(_))));
    assert_eq!(loader.live(), 0);
}

#[test_log::test]
fn test_invalid_config_loads_nothing() {
    let loader = MockLoader::new();
    let config = config(
        &["a", "a"],
        false,
        json!([]),
        json!([]),
    );
    assert!(matches!(instantiate(&loader, config), Err(Error::Config(_))));
    assert_eq!(loader.loads.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test_log::test]
fn test_scalar_kinds() {
    let loader = MockLoader::new();
    let config = config(
        &["a", "b"],
        false,
        json!([
            {"type": "I", "startComponent": 0, "startValueReference": 2,
             "endComponent": 1, "endValueReference": 2},
            {"type": "B", "startComponent": 0, "startValueReference": 3,
             "endComponent": 1, "endValueReference": 3},
            {"type": "S", "startComponent": 0, "startValueReference": 4,
             "endComponent": 1, "endValueReference": 4},
        ]),
        json!([
            {"type": "Integer", "components": [0], "valueReferences": [2], "start": 3},
            {"type": "Boolean", "components": [0], "valueReferences": [3], "start": true},
            {"type": "String", "components": [0], "valueReferences": [4], "start": "hello"},
            {"type": "Integer", "components": [1], "valueReferences": [2]},
            {"type": "Boolean", "components": [1], "valueReferences": [3]},
            {"type": "String", "components": [1], "valueReferences": [4]},
        ]),
    );
    let mut system = instantiate(&loader, config).unwrap();
    assert_eq!(system.do_step(0.0, 1.0, true), Status::OK);

    let mut integers = [0];
    let mut booleans = [false];
    let mut strings = [String::new()];
    assert_eq!(system.get_integer(&[4], &mut integers), Status::OK);
    assert_eq!(system.get_boolean(&[5], &mut booleans), Status::OK);
    assert_eq!(system.get_string(&[6], &mut strings), Status::OK);
    assert_eq!((integers[0], booleans[0], strings[0].as_str()), (3, true, "hello"));

    assert_eq!(system.set_string(&[3], &["world"]), Status::OK);
    assert_eq!(system.get_string(&[3], &mut strings), Status::OK);
    assert_eq!(strings[0], "world");
}

#[test_log::test]
fn test_component_messages_are_prefixed() {
    let loader = MockLoader::new();
    let messages = Messages::default();
    let _system = System::instantiate_with(
        &loader,
        a_to_b(false),
        Path::new("resources"),
        "container",
        messages.logger(),
        true,
        false,
    )
    .unwrap();
    assert_eq!(
        messages.all()[..2],
        [
            (Status::OK, "logStatusOK".to_owned(), "[a]: instantiated".to_owned()),
            (Status::OK, "logStatusOK".to_owned(), "[b]: instantiated".to_owned()),
        ]
    );
}

#[test_log::test]
fn test_instantiate_from_resources() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        json!({"components": [{"name": "a", "guid": "{a}", "modelIdentifier": "Missing"}]})
            .to_string(),
    )
    .unwrap();
    let uri = fmi_unit::platform::path_to_uri(dir.path());

    let result = System::instantiate(
        fmi_unit::FmiVersion::V2,
        &uri,
        "container",
        Arc::new(|_: Status, _: &str, _: &str| {}),
        false,
        false,
    );
    assert!(
        matches!(&result, Err(Error::Component { name, .. }) if name == "a"),
        "{result:?}"
    );

    let result = System::instantiate(
        fmi_unit::FmiVersion::V3,
        "/nonexistent/resources",
        "container",
        Arc::new(|_: Status, _: &str, _: &str| {}),
        false,
        false,
    );
    assert!(matches!(result, Err(Error::Config(_))), "{result:?}");
}
