//! FMI 2.0 Co-Simulation entry points of the container

use std::{
    ffi::CString,
    os::raw::c_char,
    ptr,
    sync::Arc,
};

use fmi_sys::fmi2 as binding;
use fmi_unit::{FmiVersion, Status};

use super::{Container, Experiment, checked_deref, lossy, slice, slice_mut, truncated};
use crate::{Logger, System};

const ERROR: binding::fmi2Status = binding::fmi2Status_fmi2Error;

/// The importer's variadic logger together with the arguments it is always called with
struct HostLogger {
    logger: unsafe extern "C" fn(
        binding::fmi2ComponentEnvironment,
        binding::fmi2String,
        binding::fmi2Status,
        binding::fmi2String,
        binding::fmi2String,
        ...
    ),
    environment: binding::fmi2ComponentEnvironment,
    instance_name: CString,
}

// The importer owns the environment and is responsible for logger calls from any thread
unsafe impl Send for HostLogger {}
unsafe impl Sync for HostLogger {}

impl HostLogger {
    fn log(&self, status: Status, category: &str, message: &str) {
        let category = truncated(category);
        let message = truncated(message);
        unsafe {
            (self.logger)(
                self.environment,
                self.instance_name.as_ptr(),
                status.into(),
                category.as_ptr(),
                c"%s".as_ptr(),
                message.as_ptr(),
            )
        };
    }
}

#[unsafe(export_name = "fmi2GetTypesPlatform")]
pub extern "C" fn fmi2_get_types_platform() -> *const c_char {
    binding::fmi2TypesPlatform.as_ptr()
}

#[unsafe(export_name = "fmi2GetVersion")]
pub extern "C" fn fmi2_get_version() -> *const c_char {
    binding::fmi2Version.as_ptr()
}

#[unsafe(export_name = "fmi2SetDebugLogging")]
pub unsafe extern "C" fn fmi2_set_debug_logging(
    c: binding::fmi2Component,
    logging_on: binding::fmi2Boolean,
    n_categories: usize,
    categories: *const binding::fmi2String,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let categories = unsafe { slice(categories, n_categories) }
        .iter()
        .map(|&category| lossy(category))
        .collect::<Vec<_>>();
    let categories = categories.iter().map(AsRef::as_ref).collect::<Vec<_>>();
    container
        .system
        .set_debug_logging(logging_on != 0, &categories)
        .into()
}

#[unsafe(export_name = "fmi2Instantiate")]
pub unsafe extern "C" fn fmi2_instantiate(
    instance_name: binding::fmi2String,
    fmu_type: binding::fmi2Type,
    _fmu_guid: binding::fmi2String,
    fmu_resource_location: binding::fmi2String,
    functions: *const binding::fmi2CallbackFunctions,
    visible: binding::fmi2Boolean,
    logging_on: binding::fmi2Boolean,
) -> binding::fmi2Component {
    let Some(functions) = (unsafe { functions.as_ref() }) else {
        return ptr::null_mut();
    };
    let Some(logger) = functions.logger else {
        return ptr::null_mut();
    };
    let name = lossy(instance_name).into_owned();
    let host = HostLogger {
        logger,
        environment: functions.componentEnvironment,
        instance_name: truncated(name.as_str()),
    };

    if fmu_type != binding::fmi2Type_fmi2CoSimulation {
        host.log(
            Status::Error,
            "logError",
            "Argument fmuType must be fmi2CoSimulation.",
        );
        return ptr::null_mut();
    }

    let resource_location = lossy(fmu_resource_location).into_owned();
    let host = Arc::new(host);
    let logger: Arc<Logger> = {
        let host = Arc::clone(&host);
        Arc::new(move |status: Status, category: &str, message: &str| {
            host.log(status, category, message)
        })
    };

    match System::instantiate(
        FmiVersion::V2,
        &resource_location,
        &name,
        logger,
        logging_on != 0,
        visible != 0,
    ) {
        Ok(system) => Box::into_raw(Box::new(Container::new(system))) as binding::fmi2Component,
        Err(e) => {
            log::error!("Failed to instantiate {name}: {e}");
            host.log(Status::Error, "logError", &e.to_string());
            ptr::null_mut()
        }
    }
}

#[unsafe(export_name = "fmi2FreeInstance")]
pub unsafe extern "C" fn fmi2_free_instance(c: binding::fmi2Component) {
    if !c.is_null() {
        drop(unsafe { Box::from_raw(c as *mut Container) });
    }
}

#[unsafe(export_name = "fmi2SetupExperiment")]
pub unsafe extern "C" fn fmi2_setup_experiment(
    c: binding::fmi2Component,
    tolerance_defined: binding::fmi2Boolean,
    tolerance: binding::fmi2Real,
    start_time: binding::fmi2Real,
    stop_time_defined: binding::fmi2Boolean,
    stop_time: binding::fmi2Real,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    container.experiment = Experiment {
        tolerance: (tolerance_defined != 0).then_some(tolerance),
        start_time,
        stop_time: (stop_time_defined != 0).then_some(stop_time),
    };
    binding::fmi2Status_fmi2OK
}

#[unsafe(export_name = "fmi2EnterInitializationMode")]
pub unsafe extern "C" fn fmi2_enter_initialization_mode(
    c: binding::fmi2Component,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let Experiment {
        tolerance,
        start_time,
        stop_time,
    } = container.experiment;
    container
        .system
        .enter_initialization_mode(tolerance, start_time, stop_time)
        .into()
}

#[unsafe(export_name = "fmi2ExitInitializationMode")]
pub unsafe extern "C" fn fmi2_exit_initialization_mode(
    c: binding::fmi2Component,
) -> binding::fmi2Status {
    checked_deref!(c, ERROR).system.exit_initialization_mode().into()
}

#[unsafe(export_name = "fmi2Terminate")]
pub unsafe extern "C" fn fmi2_terminate(c: binding::fmi2Component) -> binding::fmi2Status {
    checked_deref!(c, ERROR).system.terminate().into()
}

#[unsafe(export_name = "fmi2Reset")]
pub unsafe extern "C" fn fmi2_reset(c: binding::fmi2Component) -> binding::fmi2Status {
    checked_deref!(c, ERROR).system.reset().into()
}

#[unsafe(export_name = "fmi2GetReal")]
pub unsafe extern "C" fn fmi2_get_real(
    c: binding::fmi2Component,
    vr: *const binding::fmi2ValueReference,
    nvr: usize,
    value: *mut binding::fmi2Real,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let (vrs, values) = unsafe { (slice(vr, nvr), slice_mut(value, nvr)) };
    container.system.get_real(vrs, values).into()
}

#[unsafe(export_name = "fmi2GetInteger")]
pub unsafe extern "C" fn fmi2_get_integer(
    c: binding::fmi2Component,
    vr: *const binding::fmi2ValueReference,
    nvr: usize,
    value: *mut binding::fmi2Integer,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let (vrs, values) = unsafe { (slice(vr, nvr), slice_mut(value, nvr)) };
    container.system.get_integer(vrs, values).into()
}

#[unsafe(export_name = "fmi2GetBoolean")]
pub unsafe extern "C" fn fmi2_get_boolean(
    c: binding::fmi2Component,
    vr: *const binding::fmi2ValueReference,
    nvr: usize,
    value: *mut binding::fmi2Boolean,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let (vrs, values) = unsafe { (slice(vr, nvr), slice_mut(value, nvr)) };
    let mut booleans = vec![false; values.len()];
    let status = container.system.get_boolean(vrs, &mut booleans);
    for (value, boolean) in values.iter_mut().zip(booleans) {
        *value = boolean as binding::fmi2Boolean;
    }
    status.into()
}

#[unsafe(export_name = "fmi2GetString")]
pub unsafe extern "C" fn fmi2_get_string(
    c: binding::fmi2Component,
    vr: *const binding::fmi2ValueReference,
    nvr: usize,
    value: *mut binding::fmi2String,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let (vrs, values) = unsafe { (slice(vr, nvr), slice_mut(value, nvr)) };
    let mut strings = vec![String::new(); values.len()];
    let status = container.system.get_string(vrs, &mut strings);
    for (value, string) in values.iter_mut().zip(container.hold_strings(strings)) {
        *value = string;
    }
    status.into()
}

#[unsafe(export_name = "fmi2SetReal")]
pub unsafe extern "C" fn fmi2_set_real(
    c: binding::fmi2Component,
    vr: *const binding::fmi2ValueReference,
    nvr: usize,
    value: *const binding::fmi2Real,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let (vrs, values) = unsafe { (slice(vr, nvr), slice(value, nvr)) };
    container.system.set_real(vrs, values).into()
}

#[unsafe(export_name = "fmi2SetInteger")]
pub unsafe extern "C" fn fmi2_set_integer(
    c: binding::fmi2Component,
    vr: *const binding::fmi2ValueReference,
    nvr: usize,
    value: *const binding::fmi2Integer,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let (vrs, values) = unsafe { (slice(vr, nvr), slice(value, nvr)) };
    container.system.set_integer(vrs, values).into()
}

#[unsafe(export_name = "fmi2SetBoolean")]
pub unsafe extern "C" fn fmi2_set_boolean(
    c: binding::fmi2Component,
    vr: *const binding::fmi2ValueReference,
    nvr: usize,
    value: *const binding::fmi2Boolean,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let (vrs, values) = unsafe { (slice(vr, nvr), slice(value, nvr)) };
    let values = values.iter().map(|&v| v != 0).collect::<Vec<_>>();
    container.system.set_boolean(vrs, &values).into()
}

#[unsafe(export_name = "fmi2SetString")]
pub unsafe extern "C" fn fmi2_set_string(
    c: binding::fmi2Component,
    vr: *const binding::fmi2ValueReference,
    nvr: usize,
    value: *const binding::fmi2String,
) -> binding::fmi2Status {
    let container = checked_deref!(c, ERROR);
    let (vrs, values) = unsafe { (slice(vr, nvr), slice(value, nvr)) };
    let values = values.iter().map(|&v| lossy(v)).collect::<Vec<_>>();
    let values = values.iter().map(AsRef::as_ref).collect::<Vec<_>>();
    container.system.set_string(vrs, &values).into()
}

#[unsafe(export_name = "fmi2DoStep")]
pub unsafe extern "C" fn fmi2_do_step(
    c: binding::fmi2Component,
    current_communication_point: binding::fmi2Real,
    communication_step_size: binding::fmi2Real,
    no_set_fmu_state_prior_to_current_point: binding::fmi2Boolean,
) -> binding::fmi2Status {
    checked_deref!(c, ERROR)
        .system
        .do_step(
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point != 0,
        )
        .into()
}

/// Entry points the container does not support. They report Error.
macro_rules! not_implemented {
    ($($export:literal fn $name:ident($($arg:ident: $ty:ty),* $(,)?);)*) => {$(
        #[unsafe(export_name = $export)]
        pub unsafe extern "C" fn $name(c: binding::fmi2Component, $(_: $ty),*) -> binding::fmi2Status {
            checked_deref!(c, ERROR).not_implemented($export).into()
        }
    )*};
}

not_implemented! {
    "fmi2GetFMUstate" fn fmi2_get_fmu_state(state: *mut binding::fmi2FMUstate);
    "fmi2SetFMUstate" fn fmi2_set_fmu_state(state: binding::fmi2FMUstate);
    "fmi2FreeFMUstate" fn fmi2_free_fmu_state(state: *mut binding::fmi2FMUstate);
    "fmi2SerializedFMUstateSize" fn fmi2_serialized_fmu_state_size(
        state: binding::fmi2FMUstate,
        size: *mut usize,
    );
    "fmi2SerializeFMUstate" fn fmi2_serialize_fmu_state(
        state: binding::fmi2FMUstate,
        serialized: *mut binding::fmi2Byte,
        size: usize,
    );
    "fmi2DeSerializeFMUstate" fn fmi2_deserialize_fmu_state(
        serialized: *const binding::fmi2Byte,
        size: usize,
        state: *mut binding::fmi2FMUstate,
    );
    "fmi2GetDirectionalDerivative" fn fmi2_get_directional_derivative(
        unknowns: *const binding::fmi2ValueReference,
        n_unknowns: usize,
        knowns: *const binding::fmi2ValueReference,
        n_knowns: usize,
        dv_known: *const binding::fmi2Real,
        dv_unknown: *mut binding::fmi2Real,
    );
    "fmi2SetRealInputDerivatives" fn fmi2_set_real_input_derivatives(
        vr: *const binding::fmi2ValueReference,
        nvr: usize,
        order: *const binding::fmi2Integer,
        value: *const binding::fmi2Real,
    );
    "fmi2GetRealOutputDerivatives" fn fmi2_get_real_output_derivatives(
        vr: *const binding::fmi2ValueReference,
        nvr: usize,
        order: *const binding::fmi2Integer,
        value: *mut binding::fmi2Real,
    );
    "fmi2CancelStep" fn fmi2_cancel_step();
    "fmi2GetStatus" fn fmi2_get_status(
        kind: binding::fmi2StatusKind,
        value: *mut binding::fmi2Status,
    );
    "fmi2GetRealStatus" fn fmi2_get_real_status(
        kind: binding::fmi2StatusKind,
        value: *mut binding::fmi2Real,
    );
    "fmi2GetIntegerStatus" fn fmi2_get_integer_status(
        kind: binding::fmi2StatusKind,
        value: *mut binding::fmi2Integer,
    );
    "fmi2GetBooleanStatus" fn fmi2_get_boolean_status(
        kind: binding::fmi2StatusKind,
        value: *mut binding::fmi2Boolean,
    );
    "fmi2GetStringStatus" fn fmi2_get_string_status(
        kind: binding::fmi2StatusKind,
        value: *mut binding::fmi2String,
    );
}

// The exported functions must match the declared entry point types
const _: binding::fmi2GetTypesPlatformTYPE = fmi2_get_types_platform;
const _: binding::fmi2InstantiateTYPE = fmi2_instantiate;
const _: binding::fmi2FreeInstanceTYPE = fmi2_free_instance;
const _: binding::fmi2SetupExperimentTYPE = fmi2_setup_experiment;
const _: binding::fmi2GetRealTYPE = fmi2_get_real;
const _: binding::fmi2GetStringTYPE = fmi2_get_string;
const _: binding::fmi2SetBooleanTYPE = fmi2_set_boolean;
const _: binding::fmi2DoStepTYPE = fmi2_do_step;
const _: binding::fmi2GetDirectionalDerivativeTYPE = fmi2_get_directional_derivative;
const _: binding::fmi2GetStringStatusTYPE = fmi2_get_string_status;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_instance() {
        unsafe {
            assert_eq!(fmi2_terminate(ptr::null_mut()), ERROR);
            assert_eq!(fmi2_get_real(ptr::null_mut(), ptr::null(), 0, ptr::null_mut()), ERROR);
            assert_eq!(fmi2_cancel_step(ptr::null_mut()), ERROR);
            fmi2_free_instance(ptr::null_mut());
        }
        assert_eq!(
            unsafe { std::ffi::CStr::from_ptr(fmi2_get_version()) },
            binding::fmi2Version
        );
    }

    #[test]
    fn test_host_logger_passes_message_as_argument() {
        let records = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = fmi_sys::logger::LogSink::new({
            let records = Arc::clone(&records);
            move |status, category: &str, message: &str| {
                records
                    .lock()
                    .unwrap()
                    .push((status, category.to_owned(), message.to_owned()))
            }
        });
        let host = HostLogger {
            logger: fmi_sys::logger::fmi2_callback_logger,
            environment: sink.as_environment(),
            instance_name: truncated("container"),
        };
        host.log(Status::Warning, "logAll", "100% done, %s %d");
        host.log(Status::Error, "logError", "cut\0 here");
        assert_eq!(
            *records.lock().unwrap(),
            [
                (
                    binding::fmi2Status_fmi2Warning,
                    "logAll".to_owned(),
                    "100% done, %s %d".to_owned()
                ),
                (
                    binding::fmi2Status_fmi2Error,
                    "logError".to_owned(),
                    "cut".to_owned()
                ),
            ]
        );
    }

    #[test]
    fn test_instantiate_without_callbacks() {
        let instance = unsafe {
            fmi2_instantiate(
                c"container".as_ptr(),
                binding::fmi2Type_fmi2CoSimulation,
                c"{}".as_ptr(),
                c"file:///nonexistent/".as_ptr(),
                ptr::null(),
                0,
                0,
            )
        };
        assert!(instance.is_null());
    }
}
