//! Tests against an in-process stub of the FMI 2.0 entry points

use std::{
    ffi::CString,
    os::raw::c_int,
    slice,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use assert_approx_eq::assert_approx_eq;

use super::*;
use crate::{CS, SE, traits::CoSimulationUnit, unit::tests::recording_unit};

struct Model {
    reals: [f64; 4],
    integers: [c_int; 4],
    booleans: [c_int; 4],
    strings: Vec<CString>,
    freed: Arc<AtomicBool>,
}

fn model<'a>(c: binding::fmi2Component) -> &'a mut Model {
    unsafe { &mut *(c as *mut Model) }
}

unsafe fn read<T: Copy>(store: &[T], vr: *const u32, nvr: usize, value: *mut T) -> c_int {
    let (vr, value) = unsafe { (slice::from_raw_parts(vr, nvr), slice::from_raw_parts_mut(value, nvr)) };
    for (value, vr) in value.iter_mut().zip(vr) {
        match store.get(*vr as usize) {
            Some(v) => *value = *v,
            None => return binding::fmi2Status_fmi2Error,
        }
    }
    binding::fmi2Status_fmi2OK
}

unsafe fn write<T: Copy>(store: &mut [T], vr: *const u32, nvr: usize, value: *const T) -> c_int {
    let (vr, value) = unsafe { (slice::from_raw_parts(vr, nvr), slice::from_raw_parts(value, nvr)) };
    for (value, vr) in value.iter().zip(vr) {
        match store.get_mut(*vr as usize) {
            Some(v) => *v = *value,
            None => return binding::fmi2Status_fmi2Error,
        }
    }
    binding::fmi2Status_fmi2OK
}

unsafe extern "C" fn get_real(c: binding::fmi2Component, vr: *const u32, nvr: usize, value: *mut f64) -> c_int {
    unsafe { read(&model(c).reals, vr, nvr, value) }
}

unsafe extern "C" fn set_real(c: binding::fmi2Component, vr: *const u32, nvr: usize, value: *const f64) -> c_int {
    unsafe { write(&mut model(c).reals, vr, nvr, value) }
}

unsafe extern "C" fn get_integer(c: binding::fmi2Component, vr: *const u32, nvr: usize, value: *mut c_int) -> c_int {
    unsafe { read(&model(c).integers, vr, nvr, value) }
}

unsafe extern "C" fn set_integer(c: binding::fmi2Component, vr: *const u32, nvr: usize, value: *const c_int) -> c_int {
    unsafe { write(&mut model(c).integers, vr, nvr, value) }
}

unsafe extern "C" fn get_boolean(c: binding::fmi2Component, vr: *const u32, nvr: usize, value: *mut c_int) -> c_int {
    unsafe { read(&model(c).booleans, vr, nvr, value) }
}

unsafe extern "C" fn set_boolean(c: binding::fmi2Component, vr: *const u32, nvr: usize, value: *const c_int) -> c_int {
    unsafe { write(&mut model(c).booleans, vr, nvr, value) }
}

unsafe extern "C" fn get_string(
    c: binding::fmi2Component,
    vr: *const u32,
    nvr: usize,
    value: *mut binding::fmi2String,
) -> c_int {
    let pointers: Vec<_> = model(c).strings.iter().map(|s| s.as_ptr()).collect();
    unsafe { read(&pointers, vr, nvr, value) }
}

unsafe extern "C" fn set_string(
    c: binding::fmi2Component,
    vr: *const u32,
    nvr: usize,
    value: *const binding::fmi2String,
) -> c_int {
    let (vr, value) = unsafe { (slice::from_raw_parts(vr, nvr), slice::from_raw_parts(value, nvr)) };
    let model = model(c);
    for (value, vr) in value.iter().zip(vr) {
        model.strings[*vr as usize] = unsafe { std::ffi::CStr::from_ptr(*value) }.to_owned();
    }
    binding::fmi2Status_fmi2OK
}

unsafe extern "C" fn ok(_c: binding::fmi2Component) -> c_int {
    binding::fmi2Status_fmi2OK
}

unsafe extern "C" fn setup_experiment(
    _c: binding::fmi2Component,
    _tolerance_defined: c_int,
    _tolerance: f64,
    _start_time: f64,
    _stop_time_defined: c_int,
    _stop_time: f64,
) -> c_int {
    binding::fmi2Status_fmi2OK
}

unsafe extern "C" fn do_step(c: binding::fmi2Component, _t: f64, h: f64, _no_set: c_int) -> c_int {
    if h <= 0.0 {
        return binding::fmi2Status_fmi2Discard;
    }
    model(c).reals[0] += h;
    binding::fmi2Status_fmi2OK
}

unsafe extern "C" fn free_instance(c: binding::fmi2Component) {
    let model = unsafe { Box::from_raw(c as *mut Model) };
    model.freed.store(true, Ordering::SeqCst);
}

unsafe extern "C" fn get_fmu_state(c: binding::fmi2Component, state: *mut binding::fmi2FMUstate) -> c_int {
    let reals = model(c).reals;
    unsafe {
        if (*state).is_null() {
            *state = Box::into_raw(Box::new(reals)) as binding::fmi2FMUstate;
        } else {
            *(*state as *mut [f64; 4]) = reals;
        }
    }
    binding::fmi2Status_fmi2OK
}

unsafe extern "C" fn set_fmu_state(c: binding::fmi2Component, state: binding::fmi2FMUstate) -> c_int {
    model(c).reals = unsafe { *(state as *const [f64; 4]) };
    binding::fmi2Status_fmi2OK
}

unsafe extern "C" fn free_fmu_state(_c: binding::fmi2Component, state: *mut binding::fmi2FMUstate) -> c_int {
    unsafe {
        drop(Box::from_raw(*state as *mut [f64; 4]));
        *state = std::ptr::null_mut();
    }
    binding::fmi2Status_fmi2OK
}

fn stub_functions() -> Functions {
    Functions {
        fmi2FreeInstance: Some(free_instance),
        fmi2SetupExperiment: Some(setup_experiment),
        fmi2EnterInitializationMode: Some(ok),
        fmi2ExitInitializationMode: Some(ok),
        fmi2Terminate: Some(ok),
        fmi2Reset: Some(ok),
        fmi2GetReal: Some(get_real),
        fmi2SetReal: Some(set_real),
        fmi2GetInteger: Some(get_integer),
        fmi2SetInteger: Some(set_integer),
        fmi2GetBoolean: Some(get_boolean),
        fmi2SetBoolean: Some(set_boolean),
        fmi2GetString: Some(get_string),
        fmi2SetString: Some(set_string),
        fmi2DoStep: Some(do_step),
        ..Default::default()
    }
}

fn stub_instance(
    functions: Functions,
) -> (Instance<CS>, Arc<crate::unit::tests::Recorder>, Arc<AtomicBool>) {
    let (unit, recorder) = recording_unit("stub");
    let freed = Arc::new(AtomicBool::new(false));
    let model = Box::new(Model {
        reals: [0.0; 4],
        integers: [0; 4],
        booleans: [0; 4],
        strings: vec![CString::default(); 4],
        freed: freed.clone(),
    });
    let component = Box::into_raw(model) as binding::fmi2Component;
    (
        Instance::instantiate_with(unit, functions, component),
        recorder,
        freed,
    )
}

#[test_log::test]
fn test_get_set_real() {
    let (mut instance, recorder, _) = stub_instance(stub_functions());

    assert_eq!(instance.set_real(&[1, 2], &[1.5, 2.0]), Status::OK);
    assert_eq!(
        recorder.last_call(),
        "fmi2SetReal(vr={1, 2}, nvr=2, value={1.5, 2})"
    );

    let mut values = [0.0; 2];
    assert_eq!(instance.get_real(&[2, 1], &mut values), Status::OK);
    assert_eq!(values, [2.0, 1.5]);
    assert_eq!(
        recorder.last_call(),
        "fmi2GetReal(vr={2, 1}, nvr=2, value={2, 1.5})"
    );
}

#[test_log::test]
fn test_integer_boolean_string() {
    let (mut instance, recorder, _) = stub_instance(stub_functions());

    assert_eq!(instance.set_integer(&[3], &[-7]), Status::OK);
    let mut integers = [0];
    instance.get_integer(&[3], &mut integers);
    assert_eq!(integers, [-7]);

    instance.set_boolean(&[0, 1], &[true, false]);
    assert_eq!(
        recorder.last_call(),
        "fmi2SetBoolean(vr={0, 1}, nvr=2, value={1, 0})"
    );
    let mut booleans = [false; 2];
    instance.get_boolean(&[0, 1], &mut booleans);
    assert_eq!(booleans, [true, false]);

    instance.set_string(&[2], &["hello"]);
    assert_eq!(
        recorder.last_call(),
        r#"fmi2SetString(vr={2}, nvr=1, value={"hello"})"#
    );
    let mut strings = vec![String::new()];
    assert_eq!(instance.get_string(&[2], &mut strings), Status::OK);
    assert_eq!(strings, ["hello"]);
}

#[test_log::test]
fn test_lifecycle_through_trait_object() {
    let (instance, recorder, _) = stub_instance(stub_functions());
    let mut unit: Box<dyn CoSimulationUnit> = Box::new(instance);
    assert_eq!(unit.version(), FmiVersion::V2);
    assert_eq!(unit.state(), State::Instantiated);

    assert_eq!(
        unit.enter_initialization_mode(None, 0.0, Some(10.0)),
        Status::OK
    );
    assert_eq!(unit.state(), State::InitializationMode);
    let calls = recorder.calls();
    assert_eq!(
        calls[calls.len() - 2].1,
        "fmi2SetupExperiment(toleranceDefined=0, tolerance=0, startTime=0, stopTimeDefined=1, stopTime=10)"
    );
    assert_eq!(calls[calls.len() - 1].1, "fmi2EnterInitializationMode()");

    unit.exit_initialization_mode();
    assert_eq!(unit.state(), State::StepComplete);

    assert_eq!(unit.do_step(0.0, 0.5, true), Status::OK);
    assert_approx_eq!(unit.time(), 0.5);
    assert_eq!(
        recorder.last_call(),
        "fmi2DoStep(currentCommunicationPoint=0, communicationStepSize=0.5, noSetFMUStatePriorToCurrentPoint=1)"
    );

    unit.terminate();
    assert_eq!(unit.state(), State::Terminated);
    unit.reset();
    assert_eq!(unit.state(), State::Instantiated);
}

#[test_log::test]
fn test_failed_call_is_traced_but_not_folded() {
    let (mut instance, recorder, _) = stub_instance(stub_functions());
    let mut values = [0.0];
    assert_eq!(instance.get_real(&[99], &mut values), Status::Error);
    assert_eq!(recorder.calls().last().map(|c| c.0), Some(Status::Error));
    assert_eq!(instance.unit().status(), Status::OK);

    assert_eq!(instance.do_step(1.0, 0.0, false), Status::Discard);
    assert_eq!(instance.unit().state(), State::StepFailed);
    assert_eq!(instance.do_step(1.0, 0.5, false), Status::OK);
    assert_eq!(instance.unit().state(), State::StepComplete);
}

#[test_log::test]
fn test_fewer_values_than_references() {
    let (mut instance, recorder, _) = stub_instance(stub_functions());
    let mut values = [0.0];
    assert_eq!(instance.get_real(&[0, 1], &mut values), Status::Error);
    assert!(recorder.calls().is_empty());
    assert_eq!(recorder.messages()[0].1, Status::Error);
}

#[test_log::test]
fn test_unavailable_optional_function() {
    let (mut instance, recorder, _) = stub_instance(stub_functions());
    assert_eq!(instance.get_fmu_state(None), Err(Status::Error));
    assert_eq!(
        recorder.messages()[0].3,
        "Function fmi2GetFMUstate is not available in shared library."
    );
}

#[test_log::test]
fn test_fmu_state() {
    let functions = Functions {
        fmi2GetFMUstate: Some(get_fmu_state),
        fmi2SetFMUstate: Some(set_fmu_state),
        fmi2FreeFMUstate: Some(free_fmu_state),
        ..stub_functions()
    };
    let (mut instance, _, _) = stub_instance(functions);

    instance.set_real(&[1], &[3.0]);
    let state = instance.get_fmu_state(None).unwrap();
    instance.set_real(&[1], &[4.0]);
    assert_eq!(instance.set_fmu_state(state), Status::OK);

    let mut values = [0.0];
    instance.get_real(&[1], &mut values);
    assert_eq!(values, [3.0]);

    // Updating a saved state keeps its handle
    instance.set_real(&[1], &[5.0]);
    assert_eq!(instance.get_fmu_state(Some(state)), Ok(state));

    assert_eq!(instance.free_fmu_state(state), Status::OK);
    assert_eq!(instance.set_fmu_state(state), Status::Error);

    // A state that is still saved is freed with the instance
    instance.get_fmu_state(None).unwrap();
}

#[test_log::test]
fn test_drop_frees_instance() {
    let (instance, recorder, freed) = stub_instance(stub_functions());
    drop(instance);
    assert!(freed.load(Ordering::SeqCst));
    assert_eq!(recorder.last_call(), "fmi2FreeInstance()");
}

#[test_log::test]
fn test_missing_symbol_fails_instantiation() {
    let (unit, recorder) = recording_unit("stub");
    let result = Instance::<CS>::instantiate(unit, "{guid}", "file:///tmp/", false, false);
    assert!(matches!(
        result,
        Err(Error::MissingSymbol { ref name, .. }) if name == "fmi2GetTypesPlatform"
    ));
    assert_eq!(
        recorder.messages(),
        vec![(
            "stub".to_owned(),
            Status::Error,
            "error".to_owned(),
            "Symbol fmi2GetTypesPlatform is missing in shared library.".to_owned()
        )]
    );
}

#[test_log::test]
fn test_scheduled_execution_is_unsupported() {
    let (unit, _) = recording_unit("stub");
    let result = Instance::<SE>::instantiate(unit, "{guid}", "file:///tmp/", false, false);
    assert!(matches!(
        result,
        Err(Error::UnsupportedInterface(InterfaceType::ScheduledExecution, FmiVersion::V2))
    ));
}
