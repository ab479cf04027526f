use std::{ptr, slice};

use crate::{
    Error, InterfaceType, State, Status,
    fmi3::{Dependency, DiscreteStates, IntervalQualifier, binding},
    format::G16,
    traits::InstanceTag,
    unit::{c_strings, lossy, owned_str},
};

use super::{FmuState, Instance, call, impl_getter_setter};

/// Directional or adjoint derivative, both share one signature
macro_rules! impl_derivative {
    ($name:ident, $fmi:ident) => {
        pub fn $name(
            &mut self,
            unknowns: &[binding::fmi3ValueReference],
            knowns: &[binding::fmi3ValueReference],
            seed: &[f64],
            sensitivity: &mut [f64],
        ) -> Status {
            let status = call!(self.$fmi(
                unknowns.as_ptr(),
                unknowns.len(),
                knowns.as_ptr(),
                knowns.len(),
                seed.as_ptr(),
                seed.len(),
                sensitivity.as_mut_ptr(),
                sensitivity.len(),
            ));
            self.unit.trace_with(status, |fmt| {
                let unknowns_str = fmt.value_references(unknowns).to_owned();
                let seed_str = fmt.values(seed).to_owned();
                let (knowns_str, sensitivity_str) = fmt.format(knowns, &*sensitivity);
                format!(
                    concat!(
                        stringify!($fmi),
                        "(unknowns={}, nUnknowns={}, knowns={}, nKnowns={}, seed={}, nSeed={}, \
                         sensitivity={}, nSensitivity={})"
                    ),
                    unknowns_str,
                    unknowns.len(),
                    knowns_str,
                    knowns.len(),
                    seed_str,
                    seed.len(),
                    sensitivity_str,
                    sensitivity.len(),
                )
            });
            status
        }
    };
}

impl<Tag: InstanceTag> Instance<Tag> {
    pub fn get_version(&mut self) -> Result<String, Error> {
        let get_version = self
            .functions
            .fmi3GetVersion
            .ok_or(Error::Unavailable("fmi3GetVersion"))?;
        let version = owned_str(unsafe { get_version() })?;
        self.unit.trace(Status::OK, "fmi3GetVersion()");
        Ok(version)
    }

    pub fn set_debug_logging(&mut self, logging_on: bool, categories: &[&str]) -> Status {
        let Ok(categories_c) = c_strings(categories) else {
            return self.invalid_arguments("fmi3SetDebugLogging", "category contains a nul byte");
        };
        let category_ptrs: Vec<_> = categories_c.iter().map(|c| c.as_ptr()).collect();

        let status = call!(self.fmi3SetDebugLogging(
            logging_on,
            category_ptrs.len(),
            category_ptrs.as_ptr(),
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi3SetDebugLogging(loggingOn={}, nCategories={}, categories={})",
                logging_on as i32,
                categories.len(),
                fmt.values(categories)
            )
        });
        status
    }

    /// Enter Initialization Mode. The unit time is set to `start_time`.
    pub fn enter_initialization_mode(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Status {
        self.unit.time = start_time;
        self.unit.state = State::InitializationMode;
        let status = call!(self.fmi3EnterInitializationMode(
            tolerance.is_some(),
            tolerance.unwrap_or_default(),
            start_time,
            stop_time.is_some(),
            stop_time.unwrap_or_default(),
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi3EnterInitializationMode(toleranceDefined={}, tolerance={}, startTime={}, \
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

    /// Leaves Initialization Mode for Event Mode (model exchange, or co-simulation with event
    /// mode) or Step Mode
    pub fn exit_initialization_mode(&mut self) -> Status {
        self.unit.state = match Tag::TYPE {
            InterfaceType::ModelExchange => State::EventMode,
            InterfaceType::CoSimulation if self.event_mode_used => State::EventMode,
            _ => State::StepComplete,
        };
        self.call_no_args(
            self.functions.fmi3ExitInitializationMode,
            "fmi3ExitInitializationMode",
        )
    }

    pub fn enter_event_mode(&mut self) -> Status {
        self.unit.state = State::EventMode;
        self.call_no_args(self.functions.fmi3EnterEventMode, "fmi3EnterEventMode")
    }

    pub fn terminate(&mut self) -> Status {
        self.unit.state = State::Terminated;
        self.call_no_args(self.functions.fmi3Terminate, "fmi3Terminate")
    }

    pub fn reset(&mut self) -> Status {
        self.unit.state = State::Instantiated;
        self.call_no_args(self.functions.fmi3Reset, "fmi3Reset")
    }

    impl_getter_setter!(f32, get_float32, set_float32, fmi3GetFloat32, fmi3SetFloat32);
    impl_getter_setter!(f64, get_float64, set_float64, fmi3GetFloat64, fmi3SetFloat64);
    impl_getter_setter!(i8, get_int8, set_int8, fmi3GetInt8, fmi3SetInt8);
    impl_getter_setter!(u8, get_uint8, set_uint8, fmi3GetUInt8, fmi3SetUInt8);
    impl_getter_setter!(i16, get_int16, set_int16, fmi3GetInt16, fmi3SetInt16);
    impl_getter_setter!(u16, get_uint16, set_uint16, fmi3GetUInt16, fmi3SetUInt16);
    impl_getter_setter!(i32, get_int32, set_int32, fmi3GetInt32, fmi3SetInt32);
    impl_getter_setter!(u32, get_uint32, set_uint32, fmi3GetUInt32, fmi3SetUInt32);
    impl_getter_setter!(i64, get_int64, set_int64, fmi3GetInt64, fmi3SetInt64);
    impl_getter_setter!(u64, get_uint64, set_uint64, fmi3GetUInt64, fmi3SetUInt64);
    impl_getter_setter!(bool, get_boolean, set_boolean, fmi3GetBoolean, fmi3SetBoolean);

    /// Strings are copied out of the unit before returning
    pub fn get_string(
        &mut self,
        vrs: &[binding::fmi3ValueReference],
        values: &mut [String],
    ) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi3GetString", "fewer values than value references");
        }
        let mut raw: Vec<binding::fmi3String> = vec![ptr::null(); values.len()];
        let status = call!(self.fmi3GetString(vrs.as_ptr(), vrs.len(), raw.as_mut_ptr(), raw.len()));
        for (value, raw) in values.iter_mut().zip(&raw) {
            *value = lossy(*raw).into_owned();
        }
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &raw);
            format!(
                "fmi3GetString(valueReferences={vrs_str}, nValueReferences={}, values={values_str}, \
                 nValues={})",
                vrs.len(),
                raw.len()
            )
        });
        status
    }

    pub fn set_string(&mut self, vrs: &[binding::fmi3ValueReference], values: &[&str]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi3SetString", "fewer values than value references");
        }
        let Ok(values_c) = c_strings(values) else {
            return self.invalid_arguments("fmi3SetString", "value contains a nul byte");
        };
        let raw: Vec<binding::fmi3String> = values_c.iter().map(|v| v.as_ptr()).collect();
        let status = call!(self.fmi3SetString(vrs.as_ptr(), vrs.len(), raw.as_ptr(), raw.len()));
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, values);
            format!(
                "fmi3SetString(valueReferences={vrs_str}, nValueReferences={}, values={values_str}, \
                 nValues={})",
                vrs.len(),
                values.len()
            )
        });
        status
    }

    /// Binary values are copied out of the unit before returning
    pub fn get_binary(
        &mut self,
        vrs: &[binding::fmi3ValueReference],
        values: &mut [Vec<u8>],
    ) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi3GetBinary", "fewer values than value references");
        }
        let mut sizes = vec![0usize; values.len()];
        let mut raw: Vec<binding::fmi3Binary> = vec![ptr::null(); values.len()];
        let status = call!(self.fmi3GetBinary(
            vrs.as_ptr(),
            vrs.len(),
            sizes.as_mut_ptr(),
            raw.as_mut_ptr(),
            raw.len(),
        ));
        for ((value, &data), &size) in values.iter_mut().zip(&raw).zip(&sizes) {
            value.clear();
            if !data.is_null() {
                value.extend_from_slice(unsafe { slice::from_raw_parts(data, size) });
            }
        }
        self.unit.trace_with(status, |fmt| {
            let vrs_str = fmt.value_references(vrs).to_owned();
            let views: Vec<&[u8]> = values.iter().map(Vec::as_slice).collect();
            format!(
                "fmi3GetBinary(valueReferences={vrs_str}, nValueReferences={}, sizes={:p}, \
                 values={}, nValues={})",
                vrs.len(),
                sizes.as_ptr(),
                fmt.binaries(&views),
                values.len()
            )
        });
        status
    }

    pub fn set_binary(&mut self, vrs: &[binding::fmi3ValueReference], values: &[&[u8]]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi3SetBinary", "fewer values than value references");
        }
        let sizes: Vec<usize> = values.iter().map(|value| value.len()).collect();
        let raw: Vec<binding::fmi3Binary> = values.iter().map(|value| value.as_ptr()).collect();
        let status = call!(self.fmi3SetBinary(
            vrs.as_ptr(),
            vrs.len(),
            sizes.as_ptr(),
            raw.as_ptr(),
            raw.len(),
        ));
        self.unit.trace_with(status, |fmt| {
            let vrs_str = fmt.value_references(vrs).to_owned();
            format!(
                "fmi3SetBinary(valueReferences={vrs_str}, nValueReferences={}, sizes={:p}, \
                 values={}, nValues={})",
                vrs.len(),
                sizes.as_ptr(),
                fmt.binaries(values),
                values.len()
            )
        });
        status
    }

    pub fn get_clock(&mut self, vrs: &[binding::fmi3ValueReference], values: &mut [bool]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi3GetClock", "fewer values than value references");
        }
        let status = call!(self.fmi3GetClock(vrs.as_ptr(), vrs.len(), values.as_mut_ptr()));
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!(
                "fmi3GetClock(valueReferences={vrs_str}, nValueReferences={}, values={values_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn set_clock(&mut self, vrs: &[binding::fmi3ValueReference], values: &[bool]) -> Status {
        if values.len() < vrs.len() {
            return self.invalid_arguments("fmi3SetClock", "fewer values than value references");
        }
        let status = call!(self.fmi3SetClock(vrs.as_ptr(), vrs.len(), values.as_ptr()));
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!(
                "fmi3SetClock(valueReferences={vrs_str}, nValueReferences={}, values={values_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn get_interval_decimal(
        &mut self,
        vrs: &[binding::fmi3ValueReference],
        intervals: &mut [f64],
        qualifiers: &mut [IntervalQualifier],
    ) -> Status {
        if intervals.len() < vrs.len() || qualifiers.len() < vrs.len() {
            return self.invalid_arguments(
                "fmi3GetIntervalDecimal",
                "fewer values than value references",
            );
        }
        let mut raw = vec![binding::fmi3IntervalQualifier_fmi3IntervalNotYetKnown; vrs.len()];
        let status = call!(self.fmi3GetIntervalDecimal(
            vrs.as_ptr(),
            vrs.len(),
            intervals.as_mut_ptr(),
            raw.as_mut_ptr(),
        ));
        for (qualifier, raw) in qualifiers.iter_mut().zip(&raw) {
            *qualifier = IntervalQualifier::from(*raw);
        }
        self.unit.trace_with(status, |fmt| {
            let qualifiers_str = fmt.values(&raw).to_owned();
            let (vrs_str, intervals_str) = fmt.format(vrs, &intervals[..vrs.len()]);
            format!(
                "fmi3GetIntervalDecimal(valueReferences={vrs_str}, nValueReferences={}, \
                 intervals={intervals_str}, qualifiers={qualifiers_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn get_interval_fraction(
        &mut self,
        vrs: &[binding::fmi3ValueReference],
        counters: &mut [u64],
        resolutions: &mut [u64],
        qualifiers: &mut [IntervalQualifier],
    ) -> Status {
        if counters.len() < vrs.len() || resolutions.len() < vrs.len() || qualifiers.len() < vrs.len()
        {
            return self.invalid_arguments(
                "fmi3GetIntervalFraction",
                "fewer values than value references",
            );
        }
        let mut raw = vec![binding::fmi3IntervalQualifier_fmi3IntervalNotYetKnown; vrs.len()];
        let status = call!(self.fmi3GetIntervalFraction(
            vrs.as_ptr(),
            vrs.len(),
            counters.as_mut_ptr(),
            resolutions.as_mut_ptr(),
            raw.as_mut_ptr(),
        ));
        for (qualifier, raw) in qualifiers.iter_mut().zip(&raw) {
            *qualifier = IntervalQualifier::from(*raw);
        }
        self.unit.trace_with(status, |fmt| {
            let qualifiers_str = fmt.values(&raw).to_owned();
            let resolutions_str = fmt.values(&resolutions[..vrs.len()]).to_owned();
            let (vrs_str, counters_str) = fmt.format(vrs, &counters[..vrs.len()]);
            format!(
                "fmi3GetIntervalFraction(valueReferences={vrs_str}, nValueReferences={}, \
                 counters={counters_str}, resolutions={resolutions_str}, \
                 qualifiers={qualifiers_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn set_interval_decimal(
        &mut self,
        vrs: &[binding::fmi3ValueReference],
        intervals: &[f64],
    ) -> Status {
        if intervals.len() < vrs.len() {
            return self.invalid_arguments(
                "fmi3SetIntervalDecimal",
                "fewer values than value references",
            );
        }
        let status = call!(self.fmi3SetIntervalDecimal(vrs.as_ptr(), vrs.len(), intervals.as_ptr()));
        self.unit.trace_with(status, |fmt| {
            let (vrs_str, intervals_str) = fmt.format(vrs, &intervals[..vrs.len()]);
            format!(
                "fmi3SetIntervalDecimal(valueReferences={vrs_str}, nValueReferences={}, \
                 intervals={intervals_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn set_interval_fraction(
        &mut self,
        vrs: &[binding::fmi3ValueReference],
        counters: &[u64],
        resolutions: &[u64],
    ) -> Status {
        if counters.len() < vrs.len() || resolutions.len() < vrs.len() {
            return self.invalid_arguments(
                "fmi3SetIntervalFraction",
                "fewer values than value references",
            );
        }
        let status = call!(self.fmi3SetIntervalFraction(
            vrs.as_ptr(),
            vrs.len(),
            counters.as_ptr(),
            resolutions.as_ptr(),
        ));
        self.unit.trace_with(status, |fmt| {
            let resolutions_str = fmt.values(&resolutions[..vrs.len()]).to_owned();
            let (vrs_str, counters_str) = fmt.format(vrs, &counters[..vrs.len()]);
            format!(
                "fmi3SetIntervalFraction(valueReferences={vrs_str}, nValueReferences={}, \
                 counters={counters_str}, resolutions={resolutions_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn enter_configuration_mode(&mut self) -> Status {
        self.call_no_args(
            self.functions.fmi3EnterConfigurationMode,
            "fmi3EnterConfigurationMode",
        )
    }

    pub fn exit_configuration_mode(&mut self) -> Status {
        self.call_no_args(
            self.functions.fmi3ExitConfigurationMode,
            "fmi3ExitConfigurationMode",
        )
    }

    pub fn update_discrete_states(&mut self) -> (Status, DiscreteStates) {
        let mut discrete_states_need_update = false;
        let mut terminate_simulation = false;
        let mut nominals_changed = false;
        let mut values_changed = false;
        let mut next_event_time_defined = false;
        let mut next_event_time = 0.0;
        let status = call!(self.fmi3UpdateDiscreteStates(
            &mut discrete_states_need_update,
            &mut terminate_simulation,
            &mut nominals_changed,
            &mut values_changed,
            &mut next_event_time_defined,
            &mut next_event_time,
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi3UpdateDiscreteStates(discreteStatesNeedUpdate={}, terminateSimulation={}, \
                 nominalsOfContinuousStatesChanged={}, valuesOfContinuousStatesChanged={}, \
                 nextEventTimeDefined={}, nextEventTime={})",
                discrete_states_need_update as i32,
                terminate_simulation as i32,
                nominals_changed as i32,
                values_changed as i32,
                next_event_time_defined as i32,
                G16(next_event_time),
            )
        });
        (
            status,
            DiscreteStates {
                discrete_states_need_update,
                terminate_simulation,
                nominals_of_continuous_states_changed: nominals_changed,
                values_of_continuous_states_changed: values_changed,
                next_event_time: next_event_time_defined.then_some(next_event_time),
            },
        )
    }

    pub fn get_number_of_variable_dependencies(
        &mut self,
        vr: binding::fmi3ValueReference,
    ) -> Result<usize, Status> {
        let mut n_dependencies = 0;
        let status = call!(self.fmi3GetNumberOfVariableDependencies(vr, &mut n_dependencies));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi3GetNumberOfVariableDependencies(valueReference={vr}, \
                 nDependencies={n_dependencies})"
            )
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(n_dependencies)
        }
    }

    pub fn get_variable_dependencies(
        &mut self,
        dependent: binding::fmi3ValueReference,
    ) -> Result<Vec<Dependency>, Status> {
        let n = self.get_number_of_variable_dependencies(dependent)?;
        let mut element_indices_of_dependent = vec![0usize; n];
        let mut independents = vec![0; n];
        let mut element_indices_of_independents = vec![0usize; n];
        let mut kinds = vec![binding::fmi3DependencyKind_fmi3Dependent; n];
        let status = call!(self.fmi3GetVariableDependencies(
            dependent,
            element_indices_of_dependent.as_mut_ptr(),
            independents.as_mut_ptr(),
            element_indices_of_independents.as_mut_ptr(),
            kinds.as_mut_ptr(),
            n,
        ));
        self.unit.trace_with(status, |fmt| {
            let dependent_indices = fmt.values(&element_indices_of_dependent).to_owned();
            let independent_indices = fmt.values(&element_indices_of_independents).to_owned();
            let (independents_str, kinds_str) = fmt.format(&independents, &kinds);
            format!(
                "fmi3GetVariableDependencies(dependent={dependent}, \
                 elementIndicesOfDependent={dependent_indices}, independents={independents_str}, \
                 elementIndicesOfIndependents={independent_indices}, \
                 dependencyKinds={kinds_str}, nDependencies={n})"
            )
        });
        if status.is_failure() {
            return Err(status);
        }

        Ok((0..n)
            .map(|i| Dependency {
                element_index_of_dependent: element_indices_of_dependent[i],
                independent: independents[i],
                element_index_of_independent: element_indices_of_independents[i],
                kind: kinds[i].into(),
            })
            .collect())
    }

    /// Save the state of the unit. Passing a previously saved `state` overwrites it, `None`
    /// allocates a new one.
    pub fn get_fmu_state(&mut self, state: Option<FmuState>) -> Result<FmuState, Status> {
        let mut raw = state
            .and_then(|state| self.saved_state(state))
            .unwrap_or(ptr::null_mut());
        let status = call!(self.fmi3GetFMUState(&mut raw));
        self.unit
            .trace_with(status, |_| format!("fmi3GetFMUState(FMUState={raw:p})"));
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
            return self.invalid_arguments("fmi3SetFMUState", "unknown FMU state");
        };
        let status = call!(self.fmi3SetFMUState(raw));
        self.unit
            .trace_with(status, |_| format!("fmi3SetFMUState(FMUState={raw:p})"));
        status
    }

    pub fn free_fmu_state(&mut self, state: FmuState) -> Status {
        let Some(mut raw) = self.saved_state(state) else {
            return self.invalid_arguments("fmi3FreeFMUState", "unknown FMU state");
        };
        let freed = raw;
        let status = call!(self.fmi3FreeFMUState(&mut raw));
        self.unit
            .trace_with(status, |_| format!("fmi3FreeFMUState(FMUState={freed:p})"));
        self.saved_states[state.0] = raw;
        status
    }

    pub fn serialized_fmu_state_size(&mut self, state: FmuState) -> Result<usize, Status> {
        let Some(raw) = self.saved_state(state) else {
            return Err(self.invalid_arguments("fmi3SerializedFMUStateSize", "unknown FMU state"));
        };
        let mut size = 0;
        let status = call!(self.fmi3SerializedFMUStateSize(raw, &mut size));
        self.unit.trace_with(status, |_| {
            format!("fmi3SerializedFMUStateSize(FMUState={raw:p}, size={size})")
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
        let status = call!(self.fmi3SerializeFMUState(raw, serialized.as_mut_ptr(), size));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi3SerializeFMUState(FMUState={raw:p}, serializedState={:p}, size={size})",
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
        let status = call!(self.fmi3DeserializeFMUState(
            serialized.as_ptr(),
            serialized.len(),
            &mut raw
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi3DeserializeFMUState(serializedState={:p}, size={}, FMUState={raw:p})",
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

    impl_derivative!(get_directional_derivative, fmi3GetDirectionalDerivative);
    impl_derivative!(get_adjoint_derivative, fmi3GetAdjointDerivative);
}
