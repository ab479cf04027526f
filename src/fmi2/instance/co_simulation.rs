use std::ptr;

use crate::{
    CS, FmiVersion, State, Status,
    binding::invoke,
    fmi2::{StatusKind, binding},
    format::G16,
    traits::CoSimulationUnit,
    unit::lossy,
};

use super::Instance;

impl Instance<CS> {
    pub fn set_real_input_derivatives(
        &mut self,
        vrs: &[binding::fmi2ValueReference],
        orders: &[binding::fmi2Integer],
        values: &[f64],
    ) -> Status {
        if orders.len() < vrs.len() || values.len() < vrs.len() {
            return self.invalid_arguments(
                "fmi2SetRealInputDerivatives",
                "fewer values than value references",
            );
        }
        let status = invoke!(self.fmi2SetRealInputDerivatives(
            vrs.as_ptr(),
            vrs.len(),
            orders.as_ptr(),
            values.as_ptr(),
        ));
        self.unit.trace_with(status, |fmt| {
            let orders = fmt.values(&orders[..vrs.len()]).to_owned();
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!(
                "fmi2SetRealInputDerivatives(vr={vrs_str}, nvr={}, order={orders}, value={values_str})",
                vrs.len()
            )
        });
        status
    }

    pub fn get_real_output_derivatives(
        &mut self,
        vrs: &[binding::fmi2ValueReference],
        orders: &[binding::fmi2Integer],
        values: &mut [f64],
    ) -> Status {
        if orders.len() < vrs.len() || values.len() < vrs.len() {
            return self.invalid_arguments(
                "fmi2GetRealOutputDerivatives",
                "fewer values than value references",
            );
        }
        let status = invoke!(self.fmi2GetRealOutputDerivatives(
            vrs.as_ptr(),
            vrs.len(),
            orders.as_ptr(),
            values.as_mut_ptr(),
        ));
        self.unit.trace_with(status, |fmt| {
            let orders = fmt.values(&orders[..vrs.len()]).to_owned();
            let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
            format!(
                "fmi2GetRealOutputDerivatives(vr={vrs_str}, nvr={}, order={orders}, value={values_str})",
                vrs.len()
            )
        });
        status
    }

    /// Advance the unit by one communication step. The unit time is set to the end of the step
    /// before the call.
    pub fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Status {
        self.unit.time = current_communication_point + communication_step_size;
        let status = invoke!(self.fmi2DoStep(
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point as binding::fmi2Boolean,
        ));
        self.unit.finish_step(status);
        self.unit.trace_with(status, |_| {
            format!(
                "fmi2DoStep(currentCommunicationPoint={}, communicationStepSize={}, \
                 noSetFMUStatePriorToCurrentPoint={})",
                G16(current_communication_point),
                G16(communication_step_size),
                no_set_fmu_state_prior_to_current_point as i32,
            )
        });
        status
    }

    pub fn cancel_step(&mut self) -> Status {
        self.unit.state = State::StepCanceled;
        self.call_no_args(self.functions.fmi2CancelStep, "fmi2CancelStep")
    }

    pub fn get_status(&mut self, kind: StatusKind) -> Result<Status, Status> {
        let mut value = binding::fmi2Status_fmi2OK;
        let status = invoke!(self.fmi2GetStatus(kind as binding::fmi2StatusKind, &mut value));
        self.unit.trace_with(status, |_| {
            format!("fmi2GetStatus(s={}, value={value})", kind.as_str())
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(Status::from(value))
        }
    }

    pub fn get_real_status(&mut self, kind: StatusKind) -> Result<f64, Status> {
        let mut value = 0.0;
        let status = invoke!(self.fmi2GetRealStatus(kind as binding::fmi2StatusKind, &mut value));
        self.unit.trace_with(status, |_| {
            format!("fmi2GetRealStatus(s={}, value={})", kind.as_str(), G16(value))
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(value)
        }
    }

    pub fn get_integer_status(&mut self, kind: StatusKind) -> Result<i32, Status> {
        let mut value = 0;
        let status =
            invoke!(self.fmi2GetIntegerStatus(kind as binding::fmi2StatusKind, &mut value));
        self.unit.trace_with(status, |_| {
            format!("fmi2GetIntegerStatus(s={}, value={value})", kind.as_str())
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(value)
        }
    }

    pub fn get_boolean_status(&mut self, kind: StatusKind) -> Result<bool, Status> {
        let mut value = binding::fmi2False;
        let status =
            invoke!(self.fmi2GetBooleanStatus(kind as binding::fmi2StatusKind, &mut value));
        self.unit.trace_with(status, |_| {
            format!("fmi2GetBooleanStatus(s={}, value={value})", kind.as_str())
        });
        if status.is_failure() {
            Err(status)
        } else {
            Ok(value != binding::fmi2False)
        }
    }

    pub fn get_string_status(&mut self, kind: StatusKind) -> Result<String, Status> {
        let mut value: binding::fmi2String = ptr::null();
        let status =
            invoke!(self.fmi2GetStringStatus(kind as binding::fmi2StatusKind, &mut value));
        let value = lossy(value).into_owned();
        self.unit.trace_with(status, |_| {
            format!("fmi2GetStringStatus(s={}, value={value})", kind.as_str())
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
        FmiVersion::V2
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

    fn set_debug_logging(&mut self, logging_on: bool, categories: &[&str]) -> Status {
        Instance::set_debug_logging(self, logging_on, categories)
    }

    fn enter_initialization_mode(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Status {
        let status = self.setup_experiment(tolerance, start_time, stop_time);
        if status.is_failure() {
            return status;
        }
        status.max(Instance::enter_initialization_mode(self))
    }

    fn exit_initialization_mode(&mut self) -> Status {
        Instance::exit_initialization_mode(self)
    }

    fn terminate(&mut self) -> Status {
        Instance::terminate(self)
    }

    fn reset(&mut self) -> Status {
        Instance::reset(self)
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

    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Status {
        Instance::do_step(
            self,
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point,
        )
    }
}
