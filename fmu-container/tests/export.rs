//! The exported entry points driving a container built from in-process units

mod common;

use std::{os::raw::c_void, path::Path, ptr};

use assert_approx_eq::assert_approx_eq;
use common::{Messages, MockLoader, config};
use fmi_sys::{fmi2, fmi3};
use fmu_container::{
    System,
    export::{Container, fmi2::*, fmi3::*},
};
use serde_json::json;

/// A container around `a` and `b`, handed out the way `Instantiate` does. The container exposes
/// `b.in (vr 1)` as vr 1 and `a.out (vr 1)` as vr 2.
fn instance(loader: &MockLoader) -> *mut c_void {
    let config = config(
        &["a", "b"],
        false,
        json!([]),
        json!([
            {"type": "Real", "components": [1], "valueReferences": [1], "start": 0.0},
            {"type": "Real", "components": [0], "valueReferences": [1]},
        ]),
    );
    let system = System::instantiate_with(
        loader,
        config,
        Path::new("resources"),
        "container",
        Messages::default().logger(),
        false,
        false,
    )
    .unwrap();
    Box::into_raw(Box::new(Container::new(system))) as *mut c_void
}

#[test_log::test]
fn test_fmi3_float64_round_trip() {
    let loader = MockLoader::new();
    let instance = instance(&loader);
    unsafe {
        let vrs = [1, 2];
        assert_eq!(
            fmi3_set_float64(instance, vrs.as_ptr(), 2, [3.5, -1.0].as_ptr(), 2),
            fmi3::fmi3Status_fmi3OK
        );
        assert_approx_eq!(loader.observe("b").real(1), 3.5);
        assert_approx_eq!(loader.observe("a").real(1), -1.0);

        let mut values = [f64::NAN; 2];
        assert_eq!(
            fmi3_get_float64(instance, vrs.as_ptr(), 2, values.as_mut_ptr(), 2),
            fmi3::fmi3Status_fmi3OK
        );
        assert_approx_eq!(values[0], 3.5);
        assert_approx_eq!(values[1], -1.0);
        fmi3_free_instance(instance);
    }
}

#[test_log::test]
fn test_fmi3_time_and_do_step() {
    let loader = MockLoader::new();
    let instance = instance(&loader);
    unsafe {
        assert_eq!(
            fmi3_enter_initialization_mode(instance, false, 0.0, 2.0, false, 0.0),
            fmi3::fmi3Status_fmi3OK
        );
        assert_eq!(fmi3_exit_initialization_mode(instance), fmi3::fmi3Status_fmi3OK);

        let mut time = [f64::NAN];
        assert_eq!(
            fmi3_get_float64(instance, [0].as_ptr(), 1, time.as_mut_ptr(), 1),
            fmi3::fmi3Status_fmi3OK
        );
        assert_approx_eq!(time[0], 2.0);

        let (mut event_handling_needed, mut terminate_simulation, mut early_return) =
            (true, true, true);
        let mut last_successful_time = f64::NAN;
        assert_eq!(
            fmi3_do_step(
                instance,
                2.0,
                0.5,
                true,
                &mut event_handling_needed,
                &mut terminate_simulation,
                &mut early_return,
                &mut last_successful_time,
            ),
            fmi3::fmi3Status_fmi3OK
        );
        assert!(!event_handling_needed);
        assert!(!terminate_simulation);
        assert!(!early_return);
        assert_approx_eq!(last_successful_time, 2.5);

        assert_eq!(
            fmi3_do_step(
                instance,
                2.5,
                0.5,
                true,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            ),
            fmi3::fmi3Status_fmi3OK
        );
        assert_eq!(
            fmi3_get_float64(instance, [0].as_ptr(), 1, time.as_mut_ptr(), 1),
            fmi3::fmi3Status_fmi3OK
        );
        assert_approx_eq!(time[0], 3.0);
        assert_eq!(loader.observe("a").steps(), 2);
        fmi3_free_instance(instance);
    }
}

#[test_log::test]
fn test_fmi2_do_step_and_get_real() {
    let loader = MockLoader::new();
    loader.observe("a").step_outputs.lock().unwrap().push((1, 5.0));
    let instance = instance(&loader);
    unsafe {
        assert_eq!(
            fmi2_setup_experiment(instance, 0, 0.0, 1.0, 0, 0.0),
            fmi2::fmi2Status_fmi2OK
        );
        assert_eq!(fmi2_enter_initialization_mode(instance), fmi2::fmi2Status_fmi2OK);
        assert_eq!(fmi2_exit_initialization_mode(instance), fmi2::fmi2Status_fmi2OK);
        assert_eq!(fmi2_do_step(instance, 1.0, 0.25, 1), fmi2::fmi2Status_fmi2OK);

        let vrs = [0, 2];
        let mut values = [f64::NAN; 2];
        assert_eq!(
            fmi2_get_real(instance, vrs.as_ptr(), 2, values.as_mut_ptr()),
            fmi2::fmi2Status_fmi2OK
        );
        assert_approx_eq!(values[0], 1.25);
        assert_approx_eq!(values[1], 5.0);
        fmi2_free_instance(instance);
    }
}

#[test_log::test]
fn test_free_instance_drops_every_unit() {
    let loader = MockLoader::new();
    let first = instance(&loader);
    let second = instance(&loader);
    assert_eq!(loader.live(), 4);
    unsafe {
        fmi2_free_instance(first);
        assert_eq!(loader.live(), 2);
        fmi3_free_instance(second);
    }
    assert_eq!(loader.live(), 0);
}
