//! FMI 1.0 instance interface

use std::{marker::PhantomData, sync::Arc};

use super::{Functions, binding};
use crate::{Status, UnitHandle};

mod co_simulation;
mod common;
mod model_exchange;

/// An instantiated FMI 1.0 unit, either a slave (`Instance<CS>`) or a model (`Instance<ME>`).
pub struct Instance<Tag> {
    unit: UnitHandle,
    functions: Functions,
    component: binding::fmiComponent,
    /// `fmiFreeSlaveInstance` or `fmiFreeModelInstance`
    free_instance: (Option<unsafe extern "C" fn(binding::fmiComponent)>, &'static str),
    /// Experiment recorded by `CoSimulationUnit::enter_initialization_mode`
    experiment: Experiment,
    _tag: PhantomData<Tag>,
}

unsafe impl<Tag> Send for Instance<Tag> {}

#[derive(Debug, Default, Clone, Copy)]
struct Experiment {
    start_time: f64,
    stop_time: Option<f64>,
}

impl<Tag> Drop for Instance<Tag> {
    fn drop(&mut self) {
        if let (Some(free_instance), name) = self.free_instance {
            log::trace!("Freeing component {:?}", self.component);
            let sink = Arc::clone(self.unit.sink());
            let _guard = sink.enter();
            unsafe { free_instance(self.component) };
            self.unit.trace(Status::OK, &format!("{name}()"));
        }
    }
}

/// Like [`invoke`](crate::binding::invoke), with the unit's log sink current for the duration of
/// the call
macro_rules! call {
    ($self:ident . $f:ident ( $($arg:expr),* $(,)? )) => {{
        let sink = ::std::sync::Arc::clone($self.unit.sink());
        let _guard = sink.enter();
        $crate::binding::invoke!($self.$f($($arg),*))
    }};
}

pub(crate) use call;

impl<Tag> Instance<Tag> {
    fn from_component(
        unit: UnitHandle,
        functions: Functions,
        component: binding::fmiComponent,
        free_instance: (Option<unsafe extern "C" fn(binding::fmiComponent)>, &'static str),
    ) -> Self {
        Self {
            unit,
            functions,
            component,
            free_instance,
            experiment: Experiment::default(),
            _tag: PhantomData,
        }
    }

    /// Wrap an already created component
    #[cfg(test)]
    pub(crate) fn instantiate_with(
        mut unit: UnitHandle,
        functions: Functions,
        component: binding::fmiComponent,
    ) -> Self {
        unit.state = crate::State::Instantiated;
        let free_instance = match functions.fmiFreeSlaveInstance {
            Some(free) => (Some(free), "fmiFreeSlaveInstance"),
            None => (functions.fmiFreeModelInstance, "fmiFreeModelInstance"),
        };
        Self::from_component(unit, functions, component, free_instance)
    }

    pub fn unit(&self) -> &UnitHandle {
        &self.unit
    }

    fn invalid_arguments(&self, function: &str, reason: &str) -> Status {
        self.unit
            .log_message(Status::Error, "error", &format!("{function}: {reason}"));
        Status::Error
    }

    /// Call an entry point that only takes the component
    fn call_no_args(
        &mut self,
        function: Option<unsafe extern "C" fn(binding::fmiComponent) -> binding::fmiStatus>,
        name: &'static str,
    ) -> Status {
        let status = match function {
            Some(f) => {
                let sink = Arc::clone(self.unit.sink());
                let _guard = sink.enter();
                Status::from(unsafe { f(self.component) })
            }
            None => {
                self.unit.log_message(
                    Status::Error,
                    "error",
                    &format!("Function {name} is not available in shared library."),
                );
                Status::Error
            }
        };
        self.unit.trace_with(status, |_| format!("{name}()"));
        status
    }
}

/// Getter and setter for a kind whose Rust type matches the ABI type
macro_rules! impl_getter_setter {
    ($ty:ty, $get:ident, $set:ident, $fmi_get:ident, $fmi_set:ident) => {
        pub fn $get(&mut self, vrs: &[binding::fmiValueReference], values: &mut [$ty]) -> Status {
            if values.len() < vrs.len() {
                return self.invalid_arguments(stringify!($fmi_get), "fewer values than value references");
            }
            let status = call!(self.$fmi_get(vrs.as_ptr(), vrs.len(), values.as_mut_ptr()));
            self.unit.trace_with(status, |fmt| {
                let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
                format!(
                    concat!(stringify!($fmi_get), "(vr={}, nvr={}, value={})"),
                    vrs_str,
                    vrs.len(),
                    values_str
                )
            });
            status
        }

        pub fn $set(&mut self, vrs: &[binding::fmiValueReference], values: &[$ty]) -> Status {
            if values.len() < vrs.len() {
                return self.invalid_arguments(stringify!($fmi_set), "fewer values than value references");
            }
            let status = call!(self.$fmi_set(vrs.as_ptr(), vrs.len(), values.as_ptr()));
            self.unit.trace_with(status, |fmt| {
                let (vrs_str, values_str) = fmt.format(vrs, &values[..vrs.len()]);
                format!(
                    concat!(stringify!($fmi_set), "(vr={}, nvr={}, value={})"),
                    vrs_str,
                    vrs.len(),
                    values_str
                )
            });
            status
        }
    };
}

pub(crate) use impl_getter_setter;
