//! FMI 1.0 units
//!
//! FMI 1.0 exports its entry points with the model identifier as prefix and hands no environment
//! pointer to the logger. Every call into an instance therefore makes the instance's log sink the
//! current one on the calling thread.

mod instance;

pub use fmi_sys::fmi1 as binding;
pub use instance::Instance;

crate::binding::function_table! {
    /// Entry points of an FMI 1.0 shared library, without the `<modelIdentifier>_` prefix
    pub struct Functions for binding {
        required: [
            fmiGetVersion,
            fmiSetDebugLogging,
            fmiGetReal,
            fmiGetInteger,
            fmiGetBoolean,
            fmiGetString,
            fmiSetReal,
            fmiSetInteger,
            fmiSetBoolean,
            fmiSetString,
        ],
        optional: [],
        model_exchange: [
            fmiGetModelTypesPlatform,
            fmiInstantiateModel,
            fmiFreeModelInstance,
            fmiSetTime,
            fmiSetContinuousStates,
            fmiCompletedIntegratorStep,
            fmiInitialize,
            fmiGetDerivatives,
            fmiGetEventIndicators,
            fmiEventUpdate,
            fmiGetContinuousStates,
            fmiGetNominalContinuousStates,
            fmiGetStateValueReferences,
            fmiTerminate,
        ],
        co_simulation: [
            fmiGetTypesPlatform,
            fmiInstantiateSlave,
            fmiInitializeSlave,
            fmiTerminateSlave,
            fmiResetSlave,
            fmiFreeSlaveInstance,
            fmiSetRealInputDerivatives,
            fmiGetRealOutputDerivatives,
            fmiCancelStep,
            fmiDoStep,
            fmiGetStatus,
            fmiGetRealStatus,
            fmiGetIntegerStatus,
            fmiGetBooleanStatus,
            fmiGetStringStatus,
        ],
        scheduled_execution: [],
    }
}

/// Event information returned by [`Instance::initialize`] and [`Instance::event_update`]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EventInfo {
    pub iteration_converged: bool,
    pub state_value_references_changed: bool,
    pub state_values_changed: bool,
    pub terminate_simulation: bool,
    /// Time of the next time event, if one is upcoming
    pub next_event_time: Option<f64>,
}

impl From<binding::fmiEventInfo> for EventInfo {
    fn from(info: binding::fmiEventInfo) -> Self {
        Self {
            iteration_converged: info.iterationConverged != binding::fmiFalse,
            state_value_references_changed: info.stateValueReferencesChanged != binding::fmiFalse,
            state_values_changed: info.stateValuesChanged != binding::fmiFalse,
            terminate_simulation: info.terminateSimulation != binding::fmiFalse,
            next_event_time: (info.upcomingTimeEvent != binding::fmiFalse)
                .then_some(info.nextEventTime),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusKind {
    DoStepStatus = binding::fmiStatusKind_fmiDoStepStatus,
    PendingStatus = binding::fmiStatusKind_fmiPendingStatus,
    LastSuccessfulTime = binding::fmiStatusKind_fmiLastSuccessfulTime,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::DoStepStatus => "fmiDoStepStatus",
            StatusKind::PendingStatus => "fmiPendingStatus",
            StatusKind::LastSuccessfulTime => "fmiLastSuccessfulTime",
        }
    }
}
