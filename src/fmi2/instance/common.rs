use std::ptr;

use crate::{
    Error, State, Status,
    binding::invoke,
    fmi2::binding,
    format::G16,
    traits::InstanceTag,
    unit::{c_strings, lossy, owned_str},
};

use super::{FmuState, Instance, impl_getter_setter};

impl<Tag: InstanceTag> Instance<Tag> {
    pub fn get_types_platform(&mut self) -> Result<String, Error> {
        let get_types_platform = self
            .functions
            .fmi2GetTypesPlatform
            .ok_or(Error::Unavailable("fmi2GetTypesPlatform"))?;
        let types_platform = owned_str(unsafe { get_types_platform() })?;
        self.unit.trace(Status::OK, "fmi2GetTypesPlatform()");
        Ok(types_platform)
    }

    pub fn get_version(&mut self) -> Result<String, Error> {
        let get_version = self
            .functions
            .fmi2GetVersion
            .ok_or(Error::Unavailable("fmi2GetVersion"))?;
        let version = owned_str(unsafe { get_version() })?;
        self.unit.trace(Status::OK, "fmi2GetVersion()");
        Ok(version)
    }

    pub fn set_debug_logging(&mut self, logging_on: bool, categories: &[&str]) -> Status {
        let Ok(categories_c) = c_strings(categories) else {
            return self.invalid_arguments("fmi2SetDebugLogging", "category contains a nul byte");
        };
        let category_ptrs: Vec<_> = categories_c.iter().map(|c| c.as_ptr()).collect();

        let status = invoke!(self.fmi2SetDebugLogging(
            logging_on as binding::fmi2Boolean,
            category_ptrs.len(),
            category_ptrs.as_ptr(),
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi2SetDebugLogging(loggingOn={}, nCategories={}, categories={})",
                logging_on as i32,
                categories.len(),
                fmt.values(categories)
            )
        });
        status
    }

    /// Informs the unit about the experiment. The unit time is set to `start_time`.
    ///
    /// `tolerance` and `stop_time` are only defined for the unit if they are `Some(..)`.
    pub fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Status {
        self.unit.time = start_time;
        let status = invoke!(self.fmi2SetupExperiment(
            tolerance.is_some() as binding::fmi2Boolean,
            tolerance.unwrap_or_default(),
            start_time,
            stop_time.is_some() as binding::fmi2Boolean,
            stop_time.unwrap_or_default(),
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi2SetupExperiment(toleranceDefined={}, tolerance={}, startTime={}, \
                 stopTimeDefined={}, stopTime={})",
                tolerance.is_some() as i32,
                G16(tolerance.unwrap_or_default()),
                G16(start_time),
                stop_time.is_some() as i32,
                G16(stop_time.unwrap_or_default()),
            )
        });
        status
    }

    pub fn enter_initialization_mode(&mut self) -> Status {
        self.unit.state = State::InitializationMode;
        self.call_no_args(
            self.functions.fmi2EnterInitializationMode,
            "fmi2EnterInitializationMode",
        )
    }

    /// Leaves Initialization Mode for Event Mode (model exchange) or Step Mode (co-simulation)
    pub fn exit_initialization_mode(&mut self) -> Status {
        self.unit.state = match Tag::TYPE {
            crate::InterfaceType::ModelExchange => State::EventMode,
            _ => State::StepComplete,
        };
        self.call_no_args(
            self.functions.fmi2ExitInitializationMode,
            "fmi2ExitInitializationMode",
        )
    }

    pub fn terminate(&mut self) -> Status {
        self.unit.state = State::Terminated;
        self.call_no_args(self.functions.fmi2Terminate, "fmi2Terminate")
    }

    pub fn reset(&mut self) -> Status {
        self.unit.state = State::Instantiated;
        self.call_no_args(self.functions.fmi2Reset, "fmi2Reset")
    }

    impl_getter_setter!(binding::fmi2Real, get_real, set_real, fmi2GetReal, fmi2SetReal);
    impl_getter_setter!(
        binding::fmi2Integer,
        get_integer,
        set_integer,
        fmi2GetInteger,
        fmi2SetInteger
    );

    pub fn get_boolean(&mut self, vrs: &[binding::fmi2ValueReference], values: &mut [bool]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi2GetBoolean", "fewer values than value references");
        }
        let mut raw = vec![binding::fmi2False; vrs.len()];
        let status = invoke!(self.fmi2GetBoolean(vrs.as_ptr(), vrs.len(), raw.as_mut_ptr()));
        for (value, raw) in values.iter_mut().zip(&raw) {
            *value = *raw != binding::fmi2False;
        }
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &raw);
            format!("fmi2GetBoolean(vr={vrs_str}, nvr={}, value={values_str})", vrs.len())
        });
        status
    }

    pub fn set_boolean(&mut self, vrs: &[binding::fmi2ValueReference], values: &[bool]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi2SetBoolean", "fewer values than value references");
        }
        let raw: Vec<binding::fmi2Boolean> = values[..vrs.len()]
            .iter()
            .map(|&value| value as binding::fmi2Boolean)
            .collect();
        let status = invoke!(self.fmi2SetBoolean(vrs.as_ptr(), vrs.len(), raw.as_ptr()));
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &raw);
            format!("fmi2SetBoolean(vr={vrs_str}, nvr={}, value={values_str})", vrs.len())
        });
        status
    }

    /// Strings are copied out of the unit before returning
    pub fn get_string(
        &mut self,
        vrs: &[binding::fmi2ValueReference],
        values: &mut [String],
    ) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi2GetString", "fewer values than value references");
        }
        let mut raw: Vec<binding::fmi2String> = vec![ptr::null(); vrs.len()];
        let status = invoke!(self.fmi2GetString(vrs.as_ptr(), vrs.len(), raw.as_mut_ptr()));
        for (value, raw) in values.iter_mut().zip(&raw) {
            *value = lossy(*raw).into_owned();
        }
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &raw);
            format!("fmi2GetString(vr={vrs_str}, nvr={}, value={values_str})", vrs.len())
        });
        status
    }

    pub fn set_string(&mut self, vrs: &[binding::fmi2ValueReference], values: &[&str]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi2SetString", "fewer values than value references");
        }
        let Ok(values_c) = c_strings(&values[..vrs.len()]) else {
            return self.invalid_arguments("fmi2SetString", "value contains a nul byte");
        };
        let raw: Vec<binding::fmi2String> = values_c.iter().map(|v| v.as_ptr()).collect();
        let status = invoke!(self.fmi2SetString(vrs.as_ptr(), vrs.len(), raw.as_ptr()));
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!("fmi2SetString(vr={vrs_str}, nvr={}, value={values_str})", vrs.len())
        });
        status
    }

    /// Save the state of the unit. Passing a previously saved `state` overwrites it, `None`
    /// allocates a new one.
    pub fn get_fmu_state(&mut self, state: Option<FmuState>) -> Result<FmuState, Status> {
        let mut raw = state
            .and_then(|state| self.saved_state(state))
            .unwrap_or(ptr::null_mut());
        let status = invoke!(self.fmi2GetFMUstate(&mut raw));
        self.unit
            .trace_with(status, |_| format!("fmi2GetFMUstate(FMUstate={raw:p})"));
        if status.is_failure() {
            return Err(status);
        }

        Ok(match state {
            Some(state) if state.0 < self.saved_states.len() => {
                self.saved_states[state.0] = raw;
                state
            }
            _ => {
                self.saved_states.push(raw);
                FmuState(self.saved_states.len() - 1)
            }
        })
    }

    pub fn set_fmu_state(&mut self, state: FmuState) -> Status {
        let Some(raw) = self.saved_state(state) else {
            return self.invalid_arguments("fmi2SetFMUstate", "unknown FMU state");
        };
        let status = invoke!(self.fmi2SetFMUstate(raw));
        self.unit
            .trace_with(status, |_| format!("fmi2SetFMUstate(FMUstate={raw:p})"));
        status
    }

    pub fn free_fmu_state(&mut self, state: FmuState) -> Status {
        let Some(mut raw) = self.saved_state(state) else {
            return self.invalid_arguments("fmi2FreeFMUstate", "unknown FMU state");
        };
        let freed = raw;
        let status = invoke!(self.fmi2FreeFMUstate(&mut raw));
        self.unit
            .trace_with(status, |_| format!("fmi2FreeFMUstate(FMUstate={freed:p})"));
        self.saved_states[state.0] = raw;
        status
    }

    pub fn serialized_fmu_state_size(&mut self, state: FmuState) -> Result<usize, Status> {
        let Some(raw) = self.saved_state(state) else {
            return Err(self.invalid_arguments("fmi2SerializedFMUstateSize", "unknown FMU state"));
        };
        let mut size = 0;
        let status = invoke!(self.fmi2SerializedFMUstateSize(raw, &mut size));
        self.unit.trace_with(status, |_| {
            format!("fmi2SerializedFMUstateSize(FMUstate={raw:p}, size={size})")
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(size)
        }
    }

    pub fn serialize_fmu_state(&mut self, state: FmuState) -> Result<Vec<u8>, Status> {
        let size = self.serialized_fmu_state_size(state)?;
        let raw = self.saved_state(state).unwrap_or(ptr::null_mut());
        let mut serialized = vec![0u8; size];
        let status = invoke!(self.fmi2SerializeFMUstate(
            raw,
            serialized.as_mut_ptr() as *mut binding::fmi2Byte,
            size
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi2SerializeFMUstate(FMUstate={raw:p}, serializedState={:p}, size={size})",
                serialized.as_ptr()
            )
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(serialized)
        }
    }

    pub fn deserialize_fmu_state(&mut self, serialized: &[u8]) -> Result<FmuState, Status> {
        let mut raw = ptr::null_mut();
        let status = invoke!(self.fmi2DeSerializeFMUstate(
            serialized.as_ptr() as *const binding::fmi2Byte,
            serialized.len(),
            &mut raw
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi2DeSerializeFMUstate(serializedState={:p}, size={}, FMUstate={raw:p})",
                serialized.as_ptr(),
                serialized.len()
            )
        });
        if status.is_failure() {
            return Err(status);
        }
        self.saved_states.push(raw);
        Ok(FmuState(self.saved_states.len() - 1))
    }

    /// Directional derivative of the `unknowns` with respect to the `knowns`, seeded with
    /// `dv_known`.
    pub fn get_directional_derivative(
        &mut self,
        unknowns: &[binding::fmi2ValueReference],
        knowns: &[binding::fmi2ValueReference],
        dv_known: &[f64],
        dv_unknown: &mut [f64],
    ) -> Status {
        if dv_known.len() < knowns.len() || dv_unknown.len() < unknowns.len() {
            return self.invalid_arguments(
                "fmi2GetDirectionalDerivative",
                "fewer values than value references",
            );
        }
        let status = invoke!(self.fmi2GetDirectionalDerivative(
            unknowns.as_ptr(),
            unknowns.len(),
            knowns.as_ptr(),
            knowns.len(),
            dv_known.as_ptr(),
            dv_unknown.as_mut_ptr(),
        ));
        self.unit.trace_with(status, |fmt| {
            let (unknowns_str, dv_unknown_str) = fmt.format(unknowns, &dv_unknown[..unknowns.len()]);
            let head = format!(
                "fmi2GetDirectionalDerivative(vUnknown_ref={unknowns_str}, nUnknown={}, ",
                unknowns.len()
            );
            let tail = format!(", dvUnknown={dv_unknown_str})");
            let (knowns_str, dv_known_str) = fmt.format(knowns, &dv_known[..knowns.len()]);
            format!(
                "{head}vKnown_ref={knowns_str}, nKnown={}, dvKnown={dv_known_str}{tail}",
                knowns.len()
            )
        });
        status
    }
}
