use crate::{
    CS, FmiVersion, State, Status,
    fmi3::{StepResult, binding},
    format::G16,
    traits::CoSimulationUnit,
};

use super::{Instance, call};

impl Instance<CS> {
    pub fn enter_step_mode(&mut self) -> Status {
        self.unit.state = State::StepComplete;
        self.call_no_args(self.functions.fmi3EnterStepMode, "fmi3EnterStepMode")
    }

    pub fn get_output_derivatives(
        &mut self,
        vrs: &[binding::fmi3ValueReference],
        orders: &[i32],
        values: &mut [f64],
    ) -> Status {
        if orders.len() < vrs.len() || values.len() < vrs.len() {
            return self.invalid_arguments(
                "fmi3GetOutputDerivatives",
                "fewer values than value references",
            );
        }
        let status = call!(self.fmi3GetOutputDerivatives(
            vrs.as_ptr(),
            vrs.len(),
            orders.as_ptr(),
            values.as_mut_ptr(),
            values.len(),
        ));
        self.unit.trace_with(status, |fmt| {
            let orders = fmt.values(&orders[..vrs.len()]).to_owned();
            let (vrs_str, values_str) = fmt.format(vrs, &*values);
            format!(
                "fmi3GetOutputDerivatives(valueReferences={vrs_str}, nValueReferences={}, \
                 orders={orders}, values={values_str}, nValues={})",
                vrs.len(),
                values.len()
            )
        });
        status
    }

    /// Advance the unit by one communication step. The unit time is set to the
    /// `lastSuccessfulTime` reported by the unit.
    pub fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> (Status, StepResult) {
        let mut result = StepResult {
            last_successful_time: current_communication_point,
            ..Default::default()
        };
        let status = call!(self.fmi3DoStep(
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point,
            &mut result.event_handling_needed,
            &mut result.terminate_simulation,
            &mut result.early_return,
            &mut result.last_successful_time,
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi3DoStep(currentCommunicationPoint={}, communicationStepSize={}, \
                 noSetFMUStatePriorToCurrentPoint={}, eventEncountered={}, terminate={}, \
                 earlyReturn={}, lastSuccessfulTime={})",
                G16(current_communication_point),
                G16(communication_step_size),
                no_set_fmu_state_prior_to_current_point as i32,
                result.event_handling_needed as i32,
                result.terminate_simulation as i32,
                result.early_return as i32,
                G16(result.last_successful_time),
            )
        });
        self.unit.time = result.last_successful_time;
        self.unit.finish_step(status);
        (status, result)
    }
}

impl CoSimulationUnit for Instance<CS> {
    fn name(&self) -> &str {
        self.unit.name()
    }

    fn version(&self) -> FmiVersion {
        FmiVersion::V3
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
        Instance::enter_initialization_mode(self, tolerance, start_time, stop_time)
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
        self.get_float64(vrs, values)
    }

    fn get_integer(&mut self, vrs: &[u32], values: &mut [i32]) -> Status {
        self.get_int32(vrs, values)
    }

    fn get_boolean(&mut self, vrs: &[u32], values: &mut [bool]) -> Status {
        Instance::get_boolean(self, vrs, values)
    }

    fn get_string(&mut self, vrs: &[u32], values: &mut [String]) -> Status {
        Instance::get_string(self, vrs, values)
    }

    fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Status {
        self.set_float64(vrs, values)
    }

    fn set_integer(&mut self, vrs: &[u32], values: &[i32]) -> Status {
        self.set_int32(vrs, values)
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
        let (status, _) = Instance::do_step(
            self,
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point,
        );
        status
    }
}
