use std::{ffi::CString, ptr};

use fmi_sys::logger::fmi1_callback_logger;

use crate::{
    CS, Error, FmiVersion, InterfaceType, State, Status, UnitHandle,
    fmi1::{Functions, StatusKind, binding},
    format::G16,
    traits::CoSimulationUnit,
    unit::{lossy, owned_str},
};

use super::{Experiment, Instance, call};

const MIME_TYPE: &str = "application/x-fmu-sharedlibrary";

impl Instance<CS> {
    /// Bind the `<model_identifier>_fmi*` entry points of `unit` and instantiate a slave.
    ///
    /// `fmu_location` is the URI of the extracted unit directory.
    pub fn instantiate(
        mut unit: UnitHandle,
        model_identifier: &str,
        guid: &str,
        fmu_location: &str,
        visible: bool,
        logging_on: bool,
    ) -> Result<Self, Error> {
        let functions = unit.load_functions(|library| unsafe {
            Functions::load(library, InterfaceType::CoSimulation, |name| {
                format!("{model_identifier}_{name}")
            })
        })?;
        let instantiate = functions
            .fmiInstantiateSlave
            .ok_or(Error::Unavailable("fmiInstantiateSlave"))?;

        let callbacks = binding::fmiCallbackFunctions {
            logger: Some(fmi1_callback_logger),
            allocateMemory: Some(libc::calloc),
            freeMemory: Some(libc::free),
            stepFinished: None,
        };
        let instance_name = CString::new(unit.name())?;
        let guid_c = CString::new(guid)?;
        let fmu_location_c = CString::new(fmu_location)?;
        let mime_type = CString::new(MIME_TYPE)?;
        let timeout = 0.0;
        let interactive = false;

        unit.state = State::StartAndEnd;

        let component = {
            let _guard = unit.sink().enter();
            unsafe {
                instantiate(
                    instance_name.as_ptr(),
                    guid_c.as_ptr(),
                    fmu_location_c.as_ptr(),
                    mime_type.as_ptr(),
                    timeout,
                    visible as binding::fmiBoolean,
                    interactive as binding::fmiBoolean,
                    callbacks,
                    logging_on as binding::fmiBoolean,
                )
            }
        };

        let status = if component.is_null() {
            Status::Error
        } else {
            Status::OK
        };
        unit.trace_with(status, |_| {
            format!(
                "fmiInstantiateSlave(instanceName=\"{}\", fmuGUID=\"{guid}\", \
                 fmuLocation=\"{fmu_location}\", mimeType=\"{MIME_TYPE}\", timeout={}, \
                 visible={}, interactive={}, functions={:p}, loggingOn={})",
                instance_name.to_string_lossy(),
                G16(timeout),
                visible as i32,
                interactive as i32,
                &callbacks,
                logging_on as i32,
            )
        });

        if component.is_null() {
            return Err(Error::Instantiation(unit.name().to_owned()));
        }
        log::trace!("Created slave {component:?}");

        unit.state = State::Instantiated;

        let free_instance = (functions.fmiFreeSlaveInstance, "fmiFreeSlaveInstance");
        Ok(Self::from_component(unit, functions, component, free_instance))
    }

    pub fn get_types_platform(&mut self) -> Result<String, Error> {
        let get_types_platform = self
            .functions
            .fmiGetTypesPlatform
            .ok_or(Error::Unavailable("fmiGetTypesPlatform"))?;
        let types_platform = owned_str(unsafe { get_types_platform() })?;
        self.unit.trace(Status::OK, "fmiGetTypesPlatform()");
        Ok(types_platform)
    }

    pub fn initialize_slave(&mut self, start_time: f64, stop_time: Option<f64>) -> Status {
        self.unit.time = start_time;
        let status = call!(self.fmiInitializeSlave(
            start_time,
            stop_time.is_some() as binding::fmiBoolean,
            stop_time.unwrap_or_default(),
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmiInitializeSlave(tStart={}, stopTimeDefined={}, tStop={})",
                G16(start_time),
                stop_time.is_some() as i32,
                G16(stop_time.unwrap_or_default()),
            )
        });
        status
    }

    pub fn terminate_slave(&mut self) -> Status {
        self.unit.state = State::Terminated;
        self.call_no_args(self.functions.fmiTerminateSlave, "fmiTerminateSlave")
    }

    pub fn reset_slave(&mut self) -> Status {
        self.unit.state = State::Instantiated;
        self.call_no_args(self.functions.fmiResetSlave, "fmiResetSlave")
    }

    pub fn set_real_input_derivatives(
        &mut self,
        vrs: &[binding::fmiValueReference],
        orders: &[binding::fmiInteger],
        values: &[f64],
    ) -> Status {
        if orders.len() < vrs.len() || values.len() < vrs.len() {
            return self.invalid_arguments(
                "fmiSetRealInputDerivatives",
                "fewer values than value references",
            );
        }
        let status = call!(self.fmiSetRealInputDerivatives(
            vrs.as_ptr(),
            vrs.len(),
            orders.as_ptr(),
            values.as_ptr(),
        ));
        self.unit.trace_with(status, |fmt| {
            let orders = fmt.values(&orders[..vrs.len()]).to_owned();
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!(
                "fmiSetRealInputDerivatives(vr={vrs_str}, nvr={}, order={orders}, value={values_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn get_real_output_derivatives(
        &mut self,
        vrs: &[binding::fmiValueReference],
        orders: &[binding::fmiInteger],
        values: &mut [f64],
    ) -> Status {
        if orders.len() < vrs.len() || values.len() < vrs.len() {
            return self.invalid_arguments(
                "fmiGetRealOutputDerivatives",
                "fewer values than value references",
            );
        }
        let status = call!(self.fmiGetRealOutputDerivatives(
            vrs.as_ptr(),
            vrs.len(),
            orders.as_ptr(),
            values.as_mut_ptr(),
        ));
        self.unit.trace_with(status, |fmt| {
            let orders = fmt.values(&orders[..vrs.len()]).to_owned();
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!(
                "fmiGetRealOutputDerivatives(vr={vrs_str}, nvr={}, order={orders}, value={values_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn cancel_step(&mut self) -> Status {
        self.unit.state = State::StepCanceled;
        self.call_no_args(self.functions.fmiCancelStep, "fmiCancelStep")
    }

    /// Advance the slave by one communication step. The unit time is set to the end of the step
    /// before the call.
    pub fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        new_step: bool,
    ) -> Status {
        self.unit.time = current_communication_point + communication_step_size;
        let status = call!(self.fmiDoStep(
            current_communication_point,
            communication_step_size,
            new_step as binding::fmiBoolean,
        ));
        self.unit.finish_step(status);
        self.unit.trace_with(status, |_| {
            format!(
                "fmiDoStep(currentCommunicationPoint={}, communicationStepSize={}, newStep={})",
                G16(current_communication_point),
                G16(communication_step_size),
                new_step as i32,
            )
        });
        status
    }

    pub fn get_status(&mut self, kind: StatusKind) -> Result<Status, Status> {
        let mut value = binding::fmiStatus_fmiOK;
        let status = call!(self.fmiGetStatus(kind as binding::fmiStatusKind, &mut value));
        self.unit.trace_with(status, |_| {
            format!("fmiGetStatus(s={}, value={value})", kind.as_str())
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(Status::from(value))
        }
    }

    pub fn get_real_status(&mut self, kind: StatusKind) -> Result<f64, Status> {
        let mut value = 0.0;
        let status = call!(self.fmiGetRealStatus(kind as binding::fmiStatusKind, &mut value));
        self.unit.trace_with(status, |_| {
            format!("fmiGetRealStatus(s={}, value={})", kind.as_str(), G16(value))
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(value)
        }
    }

    pub fn get_integer_status(&mut self, kind: StatusKind) -> Result<i32, Status> {
        let mut value = 0;
        let status = call!(self.fmiGetIntegerStatus(kind as binding::fmiStatusKind, &mut value));
        self.unit.trace_with(status, |_| {
            format!("fmiGetIntegerStatus(s={}, value={value})", kind.as_str())
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(value)
        }
    }

    pub fn get_boolean_status(&mut self, kind: StatusKind) -> Result<bool, Status> {
        let mut value = binding::fmiFalse;
        let status = call!(self.fmiGetBooleanStatus(kind as binding::fmiStatusKind, &mut value));
        self.unit.trace_with(status, |_| {
            format!("fmiGetBooleanStatus(s={}, value={value})", kind.as_str())
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(value != binding::fmiFalse)
        }
    }

    pub fn get_string_status(&mut self, kind: StatusKind) -> Result<String, Status> {
        let mut value: binding::fmiString = ptr::null();
        let status = call!(self.fmiGetStringStatus(kind as binding::fmiStatusKind, &mut value));
        let value = lossy(value).into_owned();
        self.unit.trace_with(status, |_| {
            format!("fmiGetStringStatus(s={}, value={value})", kind.as_str())
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(value)
        }
    }
}

impl CoSimulationUnit for Instance<CS> {
    fn name(&self) -> &str {
        self.unit.name()
    }

    fn version(&self) -> FmiVersion {
        FmiVersion::V1
    }

    fn time(&self) -> f64 {
        self.unit.time()
    }

    fn state(&self) -> State {
        self.unit.state()
    }

    fn status(&self) -> Status {
        self.unit.status()
    }

    /// FMI 1.0 has no logging categories, `categories` is ignored
    fn set_debug_logging(&mut self, logging_on: bool, _categories: &[&str]) -> Status {
        Instance::set_debug_logging(self, logging_on)
    }

    /// Records the experiment. The slave is initialized by
    /// [`exit_initialization_mode`](CoSimulationUnit::exit_initialization_mode), after the start
    /// values have been set.
    fn enter_initialization_mode(
        &mut self,
        _tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Status {
        self.experiment = Experiment {
            start_time,
            stop_time,
        };
        self.unit.time = start_time;
        self.unit.state = State::InitializationMode;
        Status::OK
    }

    fn exit_initialization_mode(&mut self) -> Status {
        let Experiment {
            start_time,
            stop_time,
        } = self.experiment;
        self.unit.state = State::StepComplete;
        self.initialize_slave(start_time, stop_time)
    }

    fn terminate(&mut self) -> Status {
        self.terminate_slave()
    }

    fn reset(&mut self) -> Status {
        self.reset_slave()
    }

    fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Status {
        Instance::get_real(self, vrs, values)
    }

    fn get_integer(&mut self, vrs: &[u32], values: &mut [i32]) -> Status {
        Instance::get_integer(self, vrs, values)
    }

    fn get_boolean(&mut self, vrs: &[u32], values: &mut [bool]) -> Status {
        Instance::get_boolean(self, vrs, values)
    }

    fn get_string(&mut self, vrs: &[u32], values: &mut [String]) -> Status {
        Instance::get_string(self, vrs, values)
    }

    fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Status {
        Instance::set_real(self, vrs, values)
    }

    fn set_integer(&mut self, vrs: &[u32], values: &[i32]) -> Status {
        Instance::set_integer(self, vrs, values)
    }

    fn set_boolean(&mut self, vrs: &[u32], values: &[bool]) -> Status {
        Instance::set_boolean(self, vrs, values)
    }

    fn set_string(&mut self, vrs: &[u32], values: &[&str]) -> Status {
        Instance::set_string(self, vrs, values)
    }

    /// Steps are never repeated, so every step is a new step
    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        _no_set_fmu_state_prior_to_current_point: bool,
    ) -> Status {
        Instance::do_step(self, current_communication_point, communication_step_size, true)
    }
}
