use crate::{ME, State, Status, format::G16};

use super::{Instance, call};

impl Instance<ME> {
    pub fn enter_continuous_time_mode(&mut self) -> Status {
        self.unit.state = State::ContinuousTimeMode;
        self.call_no_args(
            self.functions.fmi3EnterContinuousTimeMode,
            "fmi3EnterContinuousTimeMode",
        )
    }

    /// Returns the status and whether the unit requests Event Mode or the end of the simulation,
    /// in that order
    pub fn completed_integrator_step(
        &mut self,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> (Status, bool, bool) {
        let mut enter_event_mode = false;
        let mut terminate_simulation = false;
        let status = call!(self.fmi3CompletedIntegratorStep(
            no_set_fmu_state_prior_to_current_point,
            &mut enter_event_mode,
            &mut terminate_simulation,
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi3CompletedIntegratorStep(noSetFMUStatePriorToCurrentPoint={}, \
                 enterEventMode={}, terminateSimulation={})",
                no_set_fmu_state_prior_to_current_point as i32,
                enter_event_mode as i32,
                terminate_simulation as i32,
            )
        });
        (status, enter_event_mode, terminate_simulation)
    }

    pub fn set_time(&mut self, time: f64) -> Status {
        self.unit.time = time;
        let status = call!(self.fmi3SetTime(time));
        self.unit
            .trace_with(status, |_| format!("fmi3SetTime(time={})", G16(time)));
        status
    }

    pub fn set_continuous_states(&mut self, states: &[f64]) -> Status {
        let status = call!(self.fmi3SetContinuousStates(states.as_ptr(), states.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi3SetContinuousStates(continuousStates={}, nContinuousStates={})",
                fmt.values(states),
                states.len()
            )
        });
        status
    }

    pub fn get_continuous_state_derivatives(&mut self, derivatives: &mut [f64]) -> Status {
        let status = call!(self.fmi3GetContinuousStateDerivatives(
            derivatives.as_mut_ptr(),
            derivatives.len()
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi3GetContinuousStateDerivatives(derivatives={}, nContinuousStates={})",
                fmt.values(derivatives),
                derivatives.len()
            )
        });
        status
    }

    pub fn get_event_indicators(&mut self, event_indicators: &mut [f64]) -> Status {
        let status = call!(self.fmi3GetEventIndicators(
            event_indicators.as_mut_ptr(),
            event_indicators.len()
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi3GetEventIndicators(eventIndicators={}, nEventIndicators={})",
                fmt.values(event_indicators),
                event_indicators.len()
            )
        });
        status
    }

    pub fn get_continuous_states(&mut self, states: &mut [f64]) -> Status {
        let status = call!(self.fmi3GetContinuousStates(states.as_mut_ptr(), states.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi3GetContinuousStates(continuousStates={}, nContinuousStates={})",
                fmt.values(states),
                states.len()
            )
        });
        status
    }

    pub fn get_nominals_of_continuous_states(&mut self, nominals: &mut [f64]) -> Status {
        let status = call!(self.fmi3GetNominalsOfContinuousStates(
            nominals.as_mut_ptr(),
            nominals.len()
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi3GetNominalsOfContinuousStates(nominals={}, nContinuousStates={})",
                fmt.values(nominals),
                nominals.len()
            )
        });
        status
    }

    pub fn get_number_of_event_indicators(&mut self) -> Result<usize, Status> {
        let mut n = 0;
        let status = call!(self.fmi3GetNumberOfEventIndicators(&mut n));
        self.unit.trace_with(status, |_| {
            format!("fmi3GetNumberOfEventIndicators(nEventIndicators={n})")
        });
        if status.is_failure() { Err(status) } else { Ok(n) }
    }

    pub fn get_number_of_continuous_states(&mut self) -> Result<usize, Status> {
        let mut n = 0;
        let status = call!(self.fmi3GetNumberOfContinuousStates(&mut n));
        self.unit.trace_with(status, |_| {
            format!("fmi3GetNumberOfContinuousStates(nContinuousStates={n})")
        });
        if status.is_failure() { Err(status) } else { Ok(n) }
    }
}
