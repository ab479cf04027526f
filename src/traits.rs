//! Traits shared by the instances of every FMI version.

use crate::{FmiVersion, InterfaceType, State, Status};

/// Marks the interface type an [`Instance`](crate::fmi2::Instance) was created for
pub trait InstanceTag {
    const TYPE: InterfaceType;
}

/// A co-simulation unit of any FMI version.
///
/// This is the interface an orchestrator drives: the scalar kinds common to all versions, the
/// lifecycle and stepping. FMI 3.0 units map `Real` to `Float64` and `Integer` to `Int32`.
pub trait CoSimulationUnit: Send {
    /// The instance name
    fn name(&self) -> &str;

    /// The FMI version implemented by the unit
    fn version(&self) -> FmiVersion;

    /// The simulation time as last communicated to the unit
    fn time(&self) -> f64;

    fn state(&self) -> State;

    /// The most severe status returned by the unit so far
    fn status(&self) -> Status;

    fn set_debug_logging(&mut self, logging_on: bool, categories: &[&str]) -> Status;

    /// Set up the experiment and enter Initialization Mode.
    ///
    /// `tolerance` and `stop_time` are only passed to the unit if they are `Some(..)`.
    fn enter_initialization_mode(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Status;

    fn exit_initialization_mode(&mut self) -> Status;

    fn terminate(&mut self) -> Status;

    /// Reset the unit to the state right after instantiation
    fn reset(&mut self) -> Status;

    fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Status;
    fn get_integer(&mut self, vrs: &[u32], values: &mut [i32]) -> Status;
    fn get_boolean(&mut self, vrs: &[u32], values: &mut [bool]) -> Status;
    fn get_string(&mut self, vrs: &[u32], values: &mut [String]) -> Status;

    fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Status;
    fn set_integer(&mut self, vrs: &[u32], values: &[i32]) -> Status;
    fn set_boolean(&mut self, vrs: &[u32], values: &[bool]) -> Status;
    fn set_string(&mut self, vrs: &[u32], values: &[&str]) -> Status;

    /// Advance the unit from `current_communication_point` by `communication_step_size`
    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Status;
}

impl<T: CoSimulationUnit + ?Sized> CoSimulationUnit for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn version(&self) -> FmiVersion {
        (**self).version()
    }

    fn time(&self) -> f64 {
        (**self).time()
    }

    fn state(&self) -> State {
        (**self).state()
    }

    fn status(&self) -> Status {
        (**self).status()
    }

    fn set_debug_logging(&mut self, logging_on: bool, categories: &[&str]) -> Status {
        (**self).set_debug_logging(logging_on, categories)
    }

    fn enter_initialization_mode(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Status {
        (**self).enter_initialization_mode(tolerance, start_time, stop_time)
    }

    fn exit_initialization_mode(&mut self) -> Status {
        (**self).exit_initialization_mode()
    }

    fn terminate(&mut self) -> Status {
        (**self).terminate()
    }

    fn reset(&mut self) -> Status {
        (**self).reset()
    }

    fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Status {
        (**self).get_real(vrs, values)
    }

    fn get_integer(&mut self, vrs: &[u32], values: &mut [i32]) -> Status {
        (**self).get_integer(vrs, values)
    }

    fn get_boolean(&mut self, vrs: &[u32], values: &mut [bool]) -> Status {
        (**self).get_boolean(vrs, values)
    }

    fn get_string(&mut self, vrs: &[u32], values: &mut [String]) -> Status {
        (**self).get_string(vrs, values)
    }

    fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Status {
        (**self).set_real(vrs, values)
    }

    fn set_integer(&mut self, vrs: &[u32], values: &[i32]) -> Status {
        (**self).set_integer(vrs, values)
    }

    fn set_boolean(&mut self, vrs: &[u32], values: &[bool]) -> Status {
        (**self).set_boolean(vrs, values)
    }

    fn set_string(&mut self, vrs: &[u32], values: &[&str]) -> Status {
        (**self).set_string(vrs, values)
    }

    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Status {
        (**self).do_step(
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point,
        )
    }
}
