//! FMI 2.0 units

mod instance;

pub use fmi_sys::fmi2 as binding;
pub use instance::{FmuState, Instance};

crate::binding::function_table! {
    /// Entry points of an FMI 2.0 shared library
    pub struct Functions for binding {
        required: [
            fmi2GetTypesPlatform,
            fmi2GetVersion,
            fmi2SetDebugLogging,
            fmi2Instantiate,
            fmi2FreeInstance,
            fmi2SetupExperiment,
            fmi2EnterInitializationMode,
            fmi2ExitInitializationMode,
            fmi2Terminate,
            fmi2Reset,
            fmi2GetReal,
            fmi2GetInteger,
            fmi2GetBoolean,
            fmi2GetString,
            fmi2SetReal,
            fmi2SetInteger,
            fmi2SetBoolean,
            fmi2SetString,
        ],
        optional: [
            fmi2GetFMUstate,
            fmi2SetFMUstate,
            fmi2FreeFMUstate,
            fmi2SerializedFMUstateSize,
            fmi2SerializeFMUstate,
            fmi2DeSerializeFMUstate,
            fmi2GetDirectionalDerivative,
        ],
        model_exchange: [
            fmi2EnterEventMode,
            fmi2NewDiscreteStates,
            fmi2EnterContinuousTimeMode,
            fmi2CompletedIntegratorStep,
            fmi2SetTime,
            fmi2SetContinuousStates,
            fmi2GetDerivatives,
            fmi2GetEventIndicators,
            fmi2GetContinuousStates,
            fmi2GetNominalsOfContinuousStates,
        ],
        co_simulation: [
            fmi2SetRealInputDerivatives,
            fmi2GetRealOutputDerivatives,
            fmi2DoStep,
            fmi2CancelStep,
            fmi2GetStatus,
            fmi2GetRealStatus,
            fmi2GetIntegerStatus,
            fmi2GetBooleanStatus,
            fmi2GetStringStatus,
        ],
        scheduled_execution: [],
    }
}

/// Event information returned by [`Instance::new_discrete_states`]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EventInfo {
    pub new_discrete_states_needed: bool,
    pub terminate_simulation: bool,
    pub nominals_of_continuous_states_changed: bool,
    pub values_of_continuous_states_changed: bool,
    pub next_event_time: Option<f64>,
}

impl From<binding::fmi2EventInfo> for EventInfo {
    fn from(info: binding::fmi2EventInfo) -> Self {
        Self {
            new_discrete_states_needed: info.newDiscreteStatesNeeded != binding::fmi2False,
            terminate_simulation: info.terminateSimulation != binding::fmi2False,
            nominals_of_continuous_states_changed: info.nominalsOfContinuousStatesChanged
                != binding::fmi2False,
            values_of_continuous_states_changed: info.valuesOfContinuousStatesChanged
                != binding::fmi2False,
            next_event_time: (info.nextEventTimeDefined != binding::fmi2False)
                .then_some(info.nextEventTime),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusKind {
    /// Can be called when `do_step` returned `Pending`. Delivers `Pending` while the computation
    /// is not finished, otherwise the result of the asynchronously executed step.
    DoStepStatus = binding::fmi2StatusKind_fmi2DoStepStatus,
    /// A string describing the currently running asynchronous step
    PendingStatus = binding::fmi2StatusKind_fmi2PendingStatus,
    /// End time of the last successfully completed communication step. Can be called after
    /// `do_step` returned `Discard`.
    LastSuccessfulTime = binding::fmi2StatusKind_fmi2LastSuccessfulTime,
    /// True if the slave wants to terminate the simulation. Can be called after `do_step`
    /// returned `Discard`.
    Terminated = binding::fmi2StatusKind_fmi2Terminated,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::DoStepStatus => "fmi2DoStepStatus",
            StatusKind::PendingStatus => "fmi2PendingStatus",
            StatusKind::LastSuccessfulTime => "fmi2LastSuccessfulTime",
            StatusKind::Terminated => "fmi2Terminated",
        }
    }
}
