//! FMI 3.0 units

mod instance;

pub use fmi_sys::fmi3 as binding;
pub use instance::{Callbacks, FmuState, Instance, InstantiateOptions};

crate::binding::function_table! {
    /// Entry points of an FMI 3.0 shared library
    pub struct Functions for binding {
        required: [
            fmi3GetVersion,
            fmi3SetDebugLogging,
            fmi3FreeInstance,
            fmi3EnterInitializationMode,
            fmi3ExitInitializationMode,
            fmi3EnterEventMode,
            fmi3Terminate,
            fmi3Reset,
            fmi3GetFloat32,
            fmi3GetFloat64,
            fmi3GetInt8,
            fmi3GetUInt8,
            fmi3GetInt16,
            fmi3GetUInt16,
            fmi3GetInt32,
            fmi3GetUInt32,
            fmi3GetInt64,
            fmi3GetUInt64,
            fmi3GetBoolean,
            fmi3GetString,
            fmi3GetBinary,
            fmi3GetClock,
            fmi3SetFloat32,
            fmi3SetFloat64,
            fmi3SetInt8,
            fmi3SetUInt8,
            fmi3SetInt16,
            fmi3SetUInt16,
            fmi3SetInt32,
            fmi3SetUInt32,
            fmi3SetInt64,
            fmi3SetUInt64,
            fmi3SetBoolean,
            fmi3SetString,
            fmi3SetBinary,
            fmi3SetClock,
            fmi3EnterConfigurationMode,
            fmi3ExitConfigurationMode,
            fmi3GetIntervalDecimal,
            fmi3GetIntervalFraction,
            fmi3SetIntervalDecimal,
            fmi3SetIntervalFraction,
            fmi3UpdateDiscreteStates,
        ],
        optional: [
            fmi3GetNumberOfVariableDependencies,
            fmi3GetVariableDependencies,
            fmi3GetFMUState,
            fmi3SetFMUState,
            fmi3FreeFMUState,
            fmi3SerializedFMUStateSize,
            fmi3SerializeFMUState,
            fmi3DeserializeFMUState,
            fmi3GetDirectionalDerivative,
            fmi3GetAdjointDerivative,
        ],
        model_exchange: [
            fmi3InstantiateModelExchange,
            fmi3EnterContinuousTimeMode,
            fmi3CompletedIntegratorStep,
            fmi3SetTime,
            fmi3SetContinuousStates,
            fmi3GetContinuousStateDerivatives,
            fmi3GetEventIndicators,
            fmi3GetContinuousStates,
            fmi3GetNominalsOfContinuousStates,
            fmi3GetNumberOfEventIndicators,
            fmi3GetNumberOfContinuousStates,
        ],
        co_simulation: [
            fmi3InstantiateCoSimulation,
            fmi3EnterStepMode,
            fmi3GetOutputDerivatives,
            fmi3DoStep,
        ],
        scheduled_execution: [
            fmi3InstantiateScheduledExecution,
            fmi3ActivateModelPartition,
        ],
    }
}

/// Result of [`Instance::update_discrete_states`]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DiscreteStates {
    pub discrete_states_need_update: bool,
    pub terminate_simulation: bool,
    pub nominals_of_continuous_states_changed: bool,
    pub values_of_continuous_states_changed: bool,
    pub next_event_time: Option<f64>,
}

/// Out-parameters of [`Instance::do_step`]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub event_handling_needed: bool,
    pub terminate_simulation: bool,
    pub early_return: bool,
    pub last_successful_time: f64,
}

/// Arguments of the intermediate update callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntermediateUpdate {
    pub time: f64,
    pub variable_set_requested: bool,
    pub variable_get_allowed: bool,
    pub step_finished: bool,
    pub can_return_early: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum IntervalQualifier {
    #[default]
    NotYetKnown = binding::fmi3IntervalQualifier_fmi3IntervalNotYetKnown,
    Unchanged = binding::fmi3IntervalQualifier_fmi3IntervalUnchanged,
    Changed = binding::fmi3IntervalQualifier_fmi3IntervalChanged,
}

impl From<binding::fmi3IntervalQualifier> for IntervalQualifier {
    fn from(value: binding::fmi3IntervalQualifier) -> Self {
        match value {
            binding::fmi3IntervalQualifier_fmi3IntervalUnchanged => Self::Unchanged,
            binding::fmi3IntervalQualifier_fmi3IntervalChanged => Self::Changed,
            _ => Self::NotYetKnown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DependencyKind {
    Independent = binding::fmi3DependencyKind_fmi3Independent,
    Constant = binding::fmi3DependencyKind_fmi3Constant,
    Fixed = binding::fmi3DependencyKind_fmi3Fixed,
    Tunable = binding::fmi3DependencyKind_fmi3Tunable,
    Discrete = binding::fmi3DependencyKind_fmi3Discrete,
    Dependent = binding::fmi3DependencyKind_fmi3Dependent,
}

impl From<binding::fmi3DependencyKind> for DependencyKind {
    fn from(value: binding::fmi3DependencyKind) -> Self {
        match value {
            binding::fmi3DependencyKind_fmi3Independent => Self::Independent,
            binding::fmi3DependencyKind_fmi3Constant => Self::Constant,
            binding::fmi3DependencyKind_fmi3Fixed => Self::Fixed,
            binding::fmi3DependencyKind_fmi3Tunable => Self::Tunable,
            binding::fmi3DependencyKind_fmi3Discrete => Self::Discrete,
            _ => Self::Dependent,
        }
    }
}

/// One entry reported by [`Instance::get_variable_dependencies`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub element_index_of_dependent: usize,
    pub independent: binding::fmi3ValueReference,
    pub element_index_of_independent: usize,
    pub kind: DependencyKind,
}
