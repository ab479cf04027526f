use std::ffi::CString;

use fmi_sys::logger::fmi1_callback_logger;

use crate::{
    Error, InterfaceType, ME, State, Status, UnitHandle,
    fmi1::{EventInfo, Functions, binding},
    format::G16,
    unit::owned_str,
};

use super::{Instance, call};

fn event_info_fields(info: &binding::fmiEventInfo) -> String {
    format!(
        "eventInfo={{iterationConverged={}, stateValueReferencesChanged={}, \
         stateValuesChanged={}, terminateSimulation={}, upcomingTimeEvent={}, nextEventTime={}}}",
        info.iterationConverged,
        info.stateValueReferencesChanged,
        info.stateValuesChanged,
        info.terminateSimulation,
        info.upcomingTimeEvent,
        G16(info.nextEventTime),
    )
}

impl Instance<ME> {
    /// Bind the `<model_identifier>_fmi*` entry points of `unit` and instantiate a model.
    pub fn instantiate(
        mut unit: UnitHandle,
        model_identifier: &str,
        guid: &str,
        logging_on: bool,
    ) -> Result<Self, Error> {
        let functions = unit.load_functions(|library| unsafe {
            Functions::load(library, InterfaceType::ModelExchange, |name| {
                format!("{model_identifier}_{name}")
            })
        })?;
        let instantiate = functions
            .fmiInstantiateModel
            .ok_or(Error::Unavailable("fmiInstantiateModel"))?;

        let callbacks = binding::fmiMECallbackFunctions {
            logger: Some(fmi1_callback_logger),
            allocateMemory: Some(libc::calloc),
            freeMemory: Some(libc::free),
        };
        let instance_name = CString::new(unit.name())?;
        let guid_c = CString::new(guid)?;

        unit.state = State::StartAndEnd;

        let component = {
            let _guard = unit.sink().enter();
            unsafe {
                instantiate(
                    instance_name.as_ptr(),
                    guid_c.as_ptr(),
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
                "fmiInstantiateModel(instanceName=\"{}\", GUID=\"{guid}\", functions={:p}, \
                 loggingOn={})",
                instance_name.to_string_lossy(),
                &callbacks,
                logging_on as i32,
            )
        });

        if component.is_null() {
            return Err(Error::Instantiation(unit.name().to_owned()));
        }
        log::trace!("Created model {component:?}");

        unit.state = State::Instantiated;

        let free_instance = (functions.fmiFreeModelInstance, "fmiFreeModelInstance");
        Ok(Self::from_component(unit, functions, component, free_instance))
    }

    pub fn get_model_types_platform(&mut self) -> Result<String, Error> {
        let get_model_types_platform = self
            .functions
            .fmiGetModelTypesPlatform
            .ok_or(Error::Unavailable("fmiGetModelTypesPlatform"))?;
        let types_platform = owned_str(unsafe { get_model_types_platform() })?;
        self.unit.trace(Status::OK, "fmiGetModelTypesPlatform()");
        Ok(types_platform)
    }

    pub fn set_time(&mut self, time: f64) -> Status {
        self.unit.time = time;
        let status = call!(self.fmiSetTime(time));
        self.unit
            .trace_with(status, |_| format!("fmiSetTime(time={})", G16(time)));
        status
    }

    pub fn set_continuous_states(&mut self, states: &[f64]) -> Status {
        let status = call!(self.fmiSetContinuousStates(states.as_ptr(), states.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmiSetContinuousStates(x={}, nx={})",
                fmt.values(states),
                states.len()
            )
        });
        status
    }

    /// Returns the status and whether the model requests an event update
    pub fn completed_integrator_step(&mut self) -> (Status, bool) {
        let mut call_event_update = binding::fmiFalse;
        let status = call!(self.fmiCompletedIntegratorStep(&mut call_event_update));
        self.unit.trace_with(status, |_| {
            format!("fmiCompletedIntegratorStep(callEventUpdate={call_event_update})")
        });
        (status, call_event_update != binding::fmiFalse)
    }

    /// Initialize the model. `relative_tolerance` enables tolerance control when `Some(..)`.
    pub fn initialize(&mut self, relative_tolerance: Option<f64>) -> (Status, EventInfo) {
        self.unit.state = State::InitializationMode;
        let mut info = binding::fmiEventInfo::default();
        let status = call!(self.fmiInitialize(
            relative_tolerance.is_some() as binding::fmiBoolean,
            relative_tolerance.unwrap_or_default(),
            &mut info,
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmiInitialize(toleranceControlled={}, relativeTolerance={}, {})",
                relative_tolerance.is_some() as i32,
                G16(relative_tolerance.unwrap_or_default()),
                event_info_fields(&info),
            )
        });
        self.unit.state = State::ContinuousTimeMode;
        (status, info.into())
    }

    pub fn get_derivatives(&mut self, derivatives: &mut [f64]) -> Status {
        let status = call!(self.fmiGetDerivatives(derivatives.as_mut_ptr(), derivatives.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmiGetDerivatives(derivatives={}, nx={})",
                fmt.values(derivatives),
                derivatives.len()
            )
        });
        status
    }

    pub fn get_event_indicators(&mut self, event_indicators: &mut [f64]) -> Status {
        let status = call!(self.fmiGetEventIndicators(
            event_indicators.as_mut_ptr(),
            event_indicators.len()
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmiGetEventIndicators(eventIndicators={}, ni={})",
                fmt.values(event_indicators),
                event_indicators.len()
            )
        });
        status
    }

    pub fn event_update(&mut self, intermediate_results: bool) -> (Status, EventInfo) {
        self.unit.state = State::EventMode;
        let mut info = binding::fmiEventInfo::default();
        let status = call!(self.fmiEventUpdate(
            intermediate_results as binding::fmiBoolean,
            &mut info
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmiEventUpdate(intermediateResults={}, {})",
                intermediate_results as i32,
                event_info_fields(&info),
            )
        });
        self.unit.state = State::ContinuousTimeMode;
        (status, info.into())
    }

    pub fn get_continuous_states(&mut self, states: &mut [f64]) -> Status {
        let status = call!(self.fmiGetContinuousStates(states.as_mut_ptr(), states.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmiGetContinuousStates(x={}, nx={})",
                fmt.values(states),
                states.len()
            )
        });
        status
    }

    pub fn get_nominal_continuous_states(&mut self, nominals: &mut [f64]) -> Status {
        let status = call!(self.fmiGetNominalContinuousStates(
            nominals.as_mut_ptr(),
            nominals.len()
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmiGetNominalContinuousStates(x_nominal={}, nx={})",
                fmt.values(nominals),
                nominals.len()
            )
        });
        status
    }

    pub fn get_state_value_references(&mut self, vrs: &mut [binding::fmiValueReference]) -> Status {
        let status = call!(self.fmiGetStateValueReferences(vrs.as_mut_ptr(), vrs.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmiGetStateValueReferences(vrx={}, nx={})",
                fmt.value_references(vrs),
                vrs.len()
            )
        });
        status
    }

    pub fn terminate(&mut self) -> Status {
        self.unit.state = State::Terminated;
        self.call_no_args(self.functions.fmiTerminate, "fmiTerminate")
    }
}
