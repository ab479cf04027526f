use crate::{
    ME, State, Status,
    binding::invoke,
    fmi2::{EventInfo, binding},
    format::G16,
};

use super::Instance;

impl Instance<ME> {
    pub fn enter_event_mode(&mut self) -> Status {
        self.unit.state = State::EventMode;
        self.call_no_args(self.functions.fmi2EnterEventMode, "fmi2EnterEventMode")
    }

    /// Evaluate the discrete-time equations and return the updated event information
    pub fn new_discrete_states(&mut self) -> (Status, EventInfo) {
        let mut info = binding::fmi2EventInfo::default();
        let status = invoke!(self.fmi2NewDiscreteStates(&mut info));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi2NewDiscreteStates(eventInfo={{newDiscreteStatesNeeded={}, \
                 terminateSimulation={}, nominalsOfContinuousStatesChanged={}, \
                 valuesOfContinuousStatesChanged={}, nextEventTimeDefined={}, nextEventTime={}}})",
                info.newDiscreteStatesNeeded,
                info.terminateSimulation,
                info.nominalsOfContinuousStatesChanged,
                info.valuesOfContinuousStatesChanged,
                info.nextEventTimeDefined,
                G16(info.nextEventTime),
            )
        });
        (status, info.into())
    }

    pub fn enter_continuous_time_mode(&mut self) -> Status {
        self.unit.state = State::ContinuousTimeMode;
        self.call_no_args(
            self.functions.fmi2EnterContinuousTimeMode,
            "fmi2EnterContinuousTimeMode",
        )
    }

    /// Returns the status together with the `(enter_event_mode, terminate_simulation)` flags
    pub fn completed_integrator_step(
        &mut self,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> (Status, bool, bool) {
        let mut enter_event_mode = binding::fmi2False;
        let mut terminate_simulation = binding::fmi2False;
        let status = invoke!(self.fmi2CompletedIntegratorStep(
            no_set_fmu_state_prior_to_current_point as binding::fmi2Boolean,
            &mut enter_event_mode,
            &mut terminate_simulation,
        ));
        self.unit.trace_with(status, |_| {
            format!(
                "fmi2CompletedIntegratorStep(noSetFMUStatePriorToCurrentPoint={}, \
                 enterEventMode={enter_event_mode}, terminateSimulation={terminate_simulation})",
                no_set_fmu_state_prior_to_current_point as i32,
            )
        });
        (
            status,
            enter_event_mode != binding::fmi2False,
            terminate_simulation != binding::fmi2False,
        )
    }

    pub fn set_time(&mut self, time: f64) -> Status {
        self.unit.time = time;
        let status = invoke!(self.fmi2SetTime(time));
        self.unit
            .trace_with(status, |_| format!("fmi2SetTime(time={})", G16(time)));
        status
    }

    pub fn set_continuous_states(&mut self, states: &[f64]) -> Status {
        let status = invoke!(self.fmi2SetContinuousStates(states.as_ptr(), states.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi2SetContinuousStates(x={}, nx={})",
                fmt.values(states),
                states.len()
            )
        });
        status
    }

    pub fn get_derivatives(&mut self, derivatives: &mut [f64]) -> Status {
        let status = invoke!(self.fmi2GetDerivatives(derivatives.as_mut_ptr(), derivatives.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi2GetDerivatives(derivatives={}, nx={})",
                fmt.values(derivatives),
                derivatives.len()
            )
        });
        status
    }

    pub fn get_event_indicators(&mut self, event_indicators: &mut [f64]) -> Status {
        let status = invoke!(self.fmi2GetEventIndicators(
            event_indicators.as_mut_ptr(),
            event_indicators.len()
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi2GetEventIndicators(eventIndicators={}, ni={})",
                fmt.values(event_indicators),
                event_indicators.len()
            )
        });
        status
    }

    pub fn get_continuous_states(&mut self, states: &mut [f64]) -> Status {
        let status = invoke!(self.fmi2GetContinuousStates(states.as_mut_ptr(), states.len()));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi2GetContinuousStates(x={}, nx={})",
                fmt.values(states),
                states.len()
            )
        });
        status
    }

    pub fn get_nominals_of_continuous_states(&mut self, nominals: &mut [f64]) -> Status {
        let status = invoke!(self.fmi2GetNominalsOfContinuousStates(
            nominals.as_mut_ptr(),
            nominals.len()
        ));
        self.unit.trace_with(status, |fmt| {
            format!(
                "fmi2GetNominalsOfContinuousStates(x_nominal={}, nx={})",
                fmt.values(nominals),
                nominals.len()
            )
        });
        status
    }
}
