//! FMI 3.0 Co-Simulation entry points of the container

use std::{ffi::CString, os::raw::c_char, ptr, sync::Arc};

use fmi_sys::fmi3 as binding;
use fmi_unit::{FmiVersion, Status};

use super::{Container, checked_deref, lossy, slice, slice_mut, truncated};
use crate::{Logger, System};

const ERROR: binding::fmi3Status = binding::fmi3Status_fmi3Error;

struct HostLogger {
    log_message: unsafe extern "C" fn(
        binding::fmi3InstanceEnvironment,
        binding::fmi3Status,
        binding::fmi3String,
        binding::fmi3String,
    ),
    environment: binding::fmi3InstanceEnvironment,
}

// The importer owns the environment and is responsible for logger calls from any thread
unsafe impl Send for HostLogger {}
unsafe impl Sync for HostLogger {}

impl HostLogger {
    fn log(&self, status: Status, category: &str, message: &str) {
        let category = truncated(category);
        let message = truncated(message);
        unsafe {
            (self.log_message)(
                self.environment,
                status.into(),
                category.as_ptr(),
                message.as_ptr(),
            )
        };
    }
}

fn logger(
    instance_name: &str,
    log_message: binding::fmi3LogMessageCallback,
    environment: binding::fmi3InstanceEnvironment,
) -> Arc<Logger> {
    match log_message {
        Some(log_message) => {
            let host = HostLogger {
                log_message,
                environment,
            };
            Arc::new(move |status: Status, category: &str, message: &str| {
                host.log(status, category, message)
            })
        }
        None => {
            let instance_name = instance_name.to_owned();
            Arc::new(move |status: Status, category: &str, message: &str| {
                log::log!(status.log_level(), "{instance_name} [{category}] {message}")
            })
        }
    }
}

#[unsafe(export_name = "fmi3GetVersion")]
pub extern "C" fn fmi3_get_version() -> *const c_char {
    binding::fmi3Version.as_ptr()
}

#[unsafe(export_name = "fmi3SetDebugLogging")]
pub unsafe extern "C" fn fmi3_set_debug_logging(
    instance: binding::fmi3Instance,
    logging_on: binding::fmi3Boolean,
    n_categories: usize,
    categories: *const binding::fmi3String,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let categories = unsafe { slice(categories, n_categories) }
        .iter()
        .map(|&category| lossy(category))
        .collect::<Vec<_>>();
    let categories = categories.iter().map(AsRef::as_ref).collect::<Vec<_>>();
    container
        .system
        .set_debug_logging(logging_on, &categories)
        .into()
}

#[unsafe(export_name = "fmi3InstantiateModelExchange")]
pub unsafe extern "C" fn fmi3_instantiate_model_exchange(
    _instance_name: binding::fmi3String,
    _instantiation_token: binding::fmi3String,
    _resource_path: binding::fmi3String,
    _visible: binding::fmi3Boolean,
    _logging_on: binding::fmi3Boolean,
    _instance_environment: binding::fmi3InstanceEnvironment,
    _log_message: binding::fmi3LogMessageCallback,
) -> binding::fmi3Instance {
    ptr::null_mut()
}

#[unsafe(export_name = "fmi3InstantiateCoSimulation")]
pub unsafe extern "C" fn fmi3_instantiate_co_simulation(
    instance_name: binding::fmi3String,
    _instantiation_token: binding::fmi3String,
    resource_path: binding::fmi3String,
    visible: binding::fmi3Boolean,
    logging_on: binding::fmi3Boolean,
    _event_mode_used: binding::fmi3Boolean,
    _early_return_allowed: binding::fmi3Boolean,
    _required_intermediate_variables: *const binding::fmi3ValueReference,
    _n_required_intermediate_variables: usize,
    instance_environment: binding::fmi3InstanceEnvironment,
    log_message: binding::fmi3LogMessageCallback,
    _intermediate_update: binding::fmi3IntermediateUpdateCallback,
) -> binding::fmi3Instance {
    let name = lossy(instance_name).into_owned();
    let resource_path = lossy(resource_path).into_owned();
    let logger = logger(&name, log_message, instance_environment);

    match System::instantiate(
        FmiVersion::V3,
        &resource_path,
        &name,
        Arc::clone(&logger),
        logging_on,
        visible,
    ) {
        Ok(system) => Box::into_raw(Box::new(Container::new(system))) as binding::fmi3Instance,
        Err(e) => {
            log::error!("Failed to instantiate {name}: {e}");
            logger(Status::Error, "logError", &e.to_string());
            ptr::null_mut()
        }
    }
}

#[unsafe(export_name = "fmi3InstantiateScheduledExecution")]
pub unsafe extern "C" fn fmi3_instantiate_scheduled_execution(
    _instance_name: binding::fmi3String,
    _instantiation_token: binding::fmi3String,
    _resource_path: binding::fmi3String,
    _visible: binding::fmi3Boolean,
    _logging_on: binding::fmi3Boolean,
    _instance_environment: binding::fmi3InstanceEnvironment,
    _log_message: binding::fmi3LogMessageCallback,
    _clock_update: binding::fmi3ClockUpdateCallback,
    _lock_preemption: binding::fmi3LockPreemptionCallback,
    _unlock_preemption: binding::fmi3UnlockPreemptionCallback,
) -> binding::fmi3Instance {
    ptr::null_mut()
}

#[unsafe(export_name = "fmi3FreeInstance")]
pub unsafe extern "C" fn fmi3_free_instance(instance: binding::fmi3Instance) {
    if !instance.is_null() {
        drop(unsafe { Box::from_raw(instance as *mut Container) });
    }
}

#[unsafe(export_name = "fmi3EnterInitializationMode")]
pub unsafe extern "C" fn fmi3_enter_initialization_mode(
    instance: binding::fmi3Instance,
    tolerance_defined: binding::fmi3Boolean,
    tolerance: binding::fmi3Float64,
    start_time: binding::fmi3Float64,
    stop_time_defined: binding::fmi3Boolean,
    stop_time: binding::fmi3Float64,
) -> binding::fmi3Status {
    checked_deref!(instance, ERROR)
        .system
        .enter_initialization_mode(
            tolerance_defined.then_some(tolerance),
            start_time,
            stop_time_defined.then_some(stop_time),
        )
        .into()
}

#[unsafe(export_name = "fmi3ExitInitializationMode")]
pub unsafe extern "C" fn fmi3_exit_initialization_mode(
    instance: binding::fmi3Instance,
) -> binding::fmi3Status {
    checked_deref!(instance, ERROR)
        .system
        .exit_initialization_mode()
        .into()
}

#[unsafe(export_name = "fmi3Terminate")]
pub unsafe extern "C" fn fmi3_terminate(instance: binding::fmi3Instance) -> binding::fmi3Status {
    checked_deref!(instance, ERROR).system.terminate().into()
}

#[unsafe(export_name = "fmi3Reset")]
pub unsafe extern "C" fn fmi3_reset(instance: binding::fmi3Instance) -> binding::fmi3Status {
    checked_deref!(instance, ERROR).system.reset().into()
}

#[unsafe(export_name = "fmi3GetFloat64")]
pub unsafe extern "C" fn fmi3_get_float64(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *mut binding::fmi3Float64,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice_mut(values, n_values),
        )
    };
    container.system.get_real(vrs, values).into()
}

#[unsafe(export_name = "fmi3SetFloat64")]
pub unsafe extern "C" fn fmi3_set_float64(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *const binding::fmi3Float64,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice(values, n_values),
        )
    };
    container.system.set_real(vrs, values).into()
}

#[unsafe(export_name = "fmi3GetInt32")]
pub unsafe extern "C" fn fmi3_get_int32(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *mut binding::fmi3Int32,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice_mut(values, n_values),
        )
    };
    container.system.get_integer(vrs, values).into()
}

#[unsafe(export_name = "fmi3SetInt32")]
pub unsafe extern "C" fn fmi3_set_int32(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *const binding::fmi3Int32,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice(values, n_values),
        )
    };
    container.system.set_integer(vrs, values).into()
}

/// Int64 variables are read from the Integer variables of the units
#[unsafe(export_name = "fmi3GetInt64")]
pub unsafe extern "C" fn fmi3_get_int64(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *mut binding::fmi3Int64,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice_mut(values, n_values),
        )
    };
    let mut integers = vec![0; values.len()];
    let status = container.system.get_integer(vrs, &mut integers);
    for (value, integer) in values.iter_mut().zip(integers) {
        *value = integer.into();
    }
    status.into()
}

#[unsafe(export_name = "fmi3SetInt64")]
pub unsafe extern "C" fn fmi3_set_int64(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *const binding::fmi3Int64,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice(values, n_values),
        )
    };
    let integers = match values
        .iter()
        .map(|&value| i32::try_from(value))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(integers) => integers,
        Err(e) => {
            container
                .system
                .log(Status::Error, "logError", &format!("fmi3SetInt64: {e}"));
            return ERROR;
        }
    };
    container.system.set_integer(vrs, &integers).into()
}

#[unsafe(export_name = "fmi3GetBoolean")]
pub unsafe extern "C" fn fmi3_get_boolean(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *mut binding::fmi3Boolean,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice_mut(values, n_values),
        )
    };
    container.system.get_boolean(vrs, values).into()
}

#[unsafe(export_name = "fmi3SetBoolean")]
pub unsafe extern "C" fn fmi3_set_boolean(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *const binding::fmi3Boolean,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice(values, n_values),
        )
    };
    container.system.set_boolean(vrs, values).into()
}

#[unsafe(export_name = "fmi3GetString")]
pub unsafe extern "C" fn fmi3_get_string(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *mut binding::fmi3String,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice_mut(values, n_values),
        )
    };
    let mut strings = vec![String::new(); values.len()];
    let status = container.system.get_string(vrs, &mut strings);
    for (value, string) in values.iter_mut().zip(container.hold_strings(strings)) {
        *value = string;
    }
    status.into()
}

#[unsafe(export_name = "fmi3SetString")]
pub unsafe extern "C" fn fmi3_set_string(
    instance: binding::fmi3Instance,
    value_references: *const binding::fmi3ValueReference,
    n_value_references: usize,
    values: *const binding::fmi3String,
    n_values: usize,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let (vrs, values) = unsafe {
        (
            slice(value_references, n_value_references),
            slice(values, n_values),
        )
    };
    let values = values.iter().map(|&v| lossy(v)).collect::<Vec<_>>();
    let values = values.iter().map(AsRef::as_ref).collect::<Vec<_>>();
    container.system.set_string(vrs, &values).into()
}

/// Steps the system. Events, termination requests and early returns are never reported and the
/// last successful time is the system time after the step.
#[unsafe(export_name = "fmi3DoStep")]
pub unsafe extern "C" fn fmi3_do_step(
    instance: binding::fmi3Instance,
    current_communication_point: binding::fmi3Float64,
    communication_step_size: binding::fmi3Float64,
    no_set_fmu_state_prior_to_current_point: binding::fmi3Boolean,
    event_handling_needed: *mut binding::fmi3Boolean,
    terminate_simulation: *mut binding::fmi3Boolean,
    early_return: *mut binding::fmi3Boolean,
    last_successful_time: *mut binding::fmi3Float64,
) -> binding::fmi3Status {
    let container = checked_deref!(instance, ERROR);
    let status = container.system.do_step(
        current_communication_point,
        communication_step_size,
        no_set_fmu_state_prior_to_current_point,
    );
    unsafe {
        if let Some(event_handling_needed) = event_handling_needed.as_mut() {
            *event_handling_needed = false;
        }
        if let Some(terminate_simulation) = terminate_simulation.as_mut() {
            *terminate_simulation = false;
        }
        if let Some(early_return) = early_return.as_mut() {
            *early_return = false;
        }
        if let Some(last_successful_time) = last_successful_time.as_mut() {
            *last_successful_time = container.system.time();
        }
    }
    status.into()
}

/// Entry points the container does not support. They report Error.
macro_rules! not_implemented {
    ($($export:literal fn $name:ident($($ty:ty),* $(,)?);)*) => {$(
        #[unsafe(export_name = $export)]
        pub unsafe extern "C" fn $name(
            instance: binding::fmi3Instance,
            $(_: $ty),*
        ) -> binding::fmi3Status {
            checked_deref!(instance, ERROR).not_implemented($export).into()
        }
    )*};
}

/// Array accessors of the kinds the container does not expose
macro_rules! not_implemented_get_set {
    ($($get:literal fn $get_name:ident, $set:literal fn $set_name:ident: $value:ty;)*) => {
        not_implemented! {$(
            $get fn $get_name(*const binding::fmi3ValueReference, usize, *mut $value, usize);
            $set fn $set_name(*const binding::fmi3ValueReference, usize, *const $value, usize);
        )*}
    };
}

not_implemented_get_set! {
    "fmi3GetFloat32" fn fmi3_get_float32, "fmi3SetFloat32" fn fmi3_set_float32: binding::fmi3Float32;
    "fmi3GetInt8" fn fmi3_get_int8, "fmi3SetInt8" fn fmi3_set_int8: binding::fmi3Int8;
    "fmi3GetUInt8" fn fmi3_get_uint8, "fmi3SetUInt8" fn fmi3_set_uint8: binding::fmi3UInt8;
    "fmi3GetInt16" fn fmi3_get_int16, "fmi3SetInt16" fn fmi3_set_int16: binding::fmi3Int16;
    "fmi3GetUInt16" fn fmi3_get_uint16, "fmi3SetUInt16" fn fmi3_set_uint16: binding::fmi3UInt16;
    "fmi3GetUInt32" fn fmi3_get_uint32, "fmi3SetUInt32" fn fmi3_set_uint32: binding::fmi3UInt32;
    "fmi3GetUInt64" fn fmi3_get_uint64, "fmi3SetUInt64" fn fmi3_set_uint64: binding::fmi3UInt64;
}

not_implemented! {
    "fmi3GetBinary" fn fmi3_get_binary(
        *const binding::fmi3ValueReference,
        usize,
        *mut usize,
        *mut binding::fmi3Binary,
        usize,
    );
    "fmi3SetBinary" fn fmi3_set_binary(
        *const binding::fmi3ValueReference,
        usize,
        *const usize,
        *const binding::fmi3Binary,
        usize,
    );
    "fmi3GetClock" fn fmi3_get_clock(
        *const binding::fmi3ValueReference,
        usize,
        *mut binding::fmi3Clock,
    );
    "fmi3SetClock" fn fmi3_set_clock(
        *const binding::fmi3ValueReference,
        usize,
        *const binding::fmi3Clock,
    );
    "fmi3GetNumberOfVariableDependencies" fn fmi3_get_number_of_variable_dependencies(
        binding::fmi3ValueReference,
        *mut usize,
    );
    "fmi3GetVariableDependencies" fn fmi3_get_variable_dependencies(
        binding::fmi3ValueReference,
        *mut usize,
        *mut binding::fmi3ValueReference,
        *mut usize,
        *mut binding::fmi3DependencyKind,
        usize,
    );
    "fmi3GetFMUState" fn fmi3_get_fmu_state(*mut binding::fmi3FMUState);
    "fmi3SetFMUState" fn fmi3_set_fmu_state(binding::fmi3FMUState);
    "fmi3FreeFMUState" fn fmi3_free_fmu_state(*mut binding::fmi3FMUState);
    "fmi3SerializedFMUStateSize" fn fmi3_serialized_fmu_state_size(
        binding::fmi3FMUState,
        *mut usize,
    );
    "fmi3SerializeFMUState" fn fmi3_serialize_fmu_state(
        binding::fmi3FMUState,
        *mut binding::fmi3Byte,
        usize,
    );
    "fmi3DeserializeFMUState" fn fmi3_deserialize_fmu_state(
        *const binding::fmi3Byte,
        usize,
        *mut binding::fmi3FMUState,
    );
    "fmi3GetDirectionalDerivative" fn fmi3_get_directional_derivative(
        *const binding::fmi3ValueReference,
        usize,
        *const binding::fmi3ValueReference,
        usize,
        *const binding::fmi3Float64,
        usize,
        *mut binding::fmi3Float64,
        usize,
    );
    "fmi3GetAdjointDerivative" fn fmi3_get_adjoint_derivative(
        *const binding::fmi3ValueReference,
        usize,
        *const binding::fmi3ValueReference,
        usize,
        *const binding::fmi3Float64,
        usize,
        *mut binding::fmi3Float64,
        usize,
    );
    "fmi3EnterEventMode" fn fmi3_enter_event_mode();
    "fmi3EnterConfigurationMode" fn fmi3_enter_configuration_mode();
    "fmi3ExitConfigurationMode" fn fmi3_exit_configuration_mode();
    "fmi3GetIntervalDecimal" fn fmi3_get_interval_decimal(
        *const binding::fmi3ValueReference,
        usize,
        *mut binding::fmi3Float64,
        *mut binding::fmi3IntervalQualifier,
    );
    "fmi3GetIntervalFraction" fn fmi3_get_interval_fraction(
        *const binding::fmi3ValueReference,
        usize,
        *mut binding::fmi3UInt64,
        *mut binding::fmi3UInt64,
        *mut binding::fmi3IntervalQualifier,
    );
    "fmi3SetIntervalDecimal" fn fmi3_set_interval_decimal(
        *const binding::fmi3ValueReference,
        usize,
        *const binding::fmi3Float64,
    );
    "fmi3SetIntervalFraction" fn fmi3_set_interval_fraction(
        *const binding::fmi3ValueReference,
        usize,
        *const binding::fmi3UInt64,
        *const binding::fmi3UInt64,
    );
    "fmi3UpdateDiscreteStates" fn fmi3_update_discrete_states(
        *mut binding::fmi3Boolean,
        *mut binding::fmi3Boolean,
        *mut binding::fmi3Boolean,
        *mut binding::fmi3Boolean,
        *mut binding::fmi3Boolean,
        *mut binding::fmi3Float64,
    );
    "fmi3EnterContinuousTimeMode" fn fmi3_enter_continuous_time_mode();
    "fmi3CompletedIntegratorStep" fn fmi3_completed_integrator_step(
        binding::fmi3Boolean,
        *mut binding::fmi3Boolean,
        *mut binding::fmi3Boolean,
    );
    "fmi3SetTime" fn fmi3_set_time(binding::fmi3Float64);
    "fmi3SetContinuousStates" fn fmi3_set_continuous_states(*const binding::fmi3Float64, usize);
    "fmi3GetContinuousStateDerivatives" fn fmi3_get_continuous_state_derivatives(
        *mut binding::fmi3Float64,
        usize,
    );
    "fmi3GetEventIndicators" fn fmi3_get_event_indicators(*mut binding::fmi3Float64, usize);
    "fmi3GetContinuousStates" fn fmi3_get_continuous_states(*mut binding::fmi3Float64, usize);
    "fmi3GetNominalsOfContinuousStates" fn fmi3_get_nominals_of_continuous_states(
        *mut binding::fmi3Float64,
        usize,
    );
    "fmi3GetNumberOfEventIndicators" fn fmi3_get_number_of_event_indicators(*mut usize);
    "fmi3GetNumberOfContinuousStates" fn fmi3_get_number_of_continuous_states(*mut usize);
    "fmi3EnterStepMode" fn fmi3_enter_step_mode();
    "fmi3GetOutputDerivatives" fn fmi3_get_output_derivatives(
        *const binding::fmi3ValueReference,
        usize,
        *const binding::fmi3Int32,
        *mut binding::fmi3Float64,
        usize,
    );
    "fmi3ActivateModelPartition" fn fmi3_activate_model_partition(
        binding::fmi3ValueReference,
        binding::fmi3Float64,
    );
}

// The exported functions must match the declared entry point types
const _: binding::fmi3InstantiateCoSimulationTYPE = fmi3_instantiate_co_simulation;
const _: binding::fmi3InstantiateScheduledExecutionTYPE = fmi3_instantiate_scheduled_execution;
const _: binding::fmi3EnterInitializationModeTYPE = fmi3_enter_initialization_mode;
const _: binding::fmi3GetFloat64TYPE = fmi3_get_float64;
const _: binding::fmi3SetStringTYPE = fmi3_set_string;
const _: binding::fmi3GetUInt64TYPE = fmi3_get_uint64;
const _: binding::fmi3GetBinaryTYPE = fmi3_get_binary;
const _: binding::fmi3GetIntervalFractionTYPE = fmi3_get_interval_fraction;
const _: binding::fmi3UpdateDiscreteStatesTYPE = fmi3_update_discrete_states;
const _: binding::fmi3GetAdjointDerivativeTYPE = fmi3_get_adjoint_derivative;
const _: binding::fmi3DoStepTYPE = fmi3_do_step;

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    static MESSAGES: Mutex<Vec<(binding::fmi3Status, String)>> = Mutex::new(Vec::new());

    unsafe extern "C" fn log_message(
        _environment: binding::fmi3InstanceEnvironment,
        status: binding::fmi3Status,
        _category: binding::fmi3String,
        message: binding::fmi3String,
    ) {
        MESSAGES
            .lock()
            .unwrap()
            .push((status, lossy(message).into_owned()));
    }

    #[test]
    fn test_null_instance() {
        unsafe {
            assert_eq!(fmi3_reset(ptr::null_mut()), ERROR);
            assert_eq!(fmi3_enter_event_mode(ptr::null_mut()), ERROR);
            assert_eq!(
                fmi3_do_step(
                    ptr::null_mut(),
                    0.0,
                    1.0,
                    true,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut()
                ),
                ERROR
            );
            fmi3_free_instance(ptr::null_mut());
        }
    }

    #[test]
    fn test_host_logger_truncates_at_nul() {
        let logger = logger("container", Some(log_message), ptr::null_mut());
        logger(Status::Warning, "logAll", "kept\0 dropped");
        assert!(
            MESSAGES
                .lock()
                .unwrap()
                .contains(&(binding::fmi3Status_fmi3Warning, "kept".to_owned()))
        );
    }

    #[test]
    fn test_unsupported_interfaces() {
        let instance = unsafe {
            fmi3_instantiate_model_exchange(
                c"container".as_ptr(),
                c"{}".as_ptr(),
                c"/tmp".as_ptr(),
                false,
                false,
                ptr::null_mut(),
                Some(log_message),
            )
        };
        assert!(instance.is_null());
    }

    #[test]
    fn test_missing_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let resource_path = CString::new(dir.path().to_string_lossy().as_bytes()).unwrap();
        let instance = unsafe {
            fmi3_instantiate_co_simulation(
                c"container".as_ptr(),
                c"{}".as_ptr(),
                resource_path.as_ptr(),
                false,
                false,
                false,
                false,
                ptr::null(),
                0,
                ptr::null_mut(),
                Some(log_message),
                None,
            )
        };
        assert!(instance.is_null());
        let messages = MESSAGES.lock().unwrap();
        assert!(
            messages
                .iter()
                .any(|(status, message)| *status == ERROR && message.contains("config.mp"))
        );
    }
}
