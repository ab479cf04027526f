//! FMI 3.0 instance interface

use std::{
    ffi::{CString, c_void},
    marker::PhantomData,
};

use super::{Functions, binding};
use crate::{Error, InterfaceType, State, Status, UnitHandle, traits::InstanceTag};

mod callbacks;
mod co_simulation;
mod common;
mod model_exchange;
mod scheduled_execution;

pub use callbacks::Callbacks;
use callbacks::Environment;

/// An instantiated FMI 3.0 unit.
///
/// Every status returned by the unit is folded into [`UnitHandle::status`].
pub struct Instance<Tag> {
    unit: UnitHandle,
    functions: Functions,
    /// Pointer to the raw FMI 3.0 instance
    component: binding::fmi3Instance,
    environment: Box<Environment>,
    event_mode_used: bool,
    saved_states: Vec<binding::fmi3FMUState>,
    _tag: PhantomData<Tag>,
}

// Calls into the instance are serialized through `&mut self`
unsafe impl<Tag> Send for Instance<Tag> {}

/// Handle to an FMU state saved with [`Instance::get_fmu_state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmuState(usize);

/// Arguments of the `fmi3Instantiate*` functions besides name, token and resource path
#[derive(Debug, Default)]
pub struct InstantiateOptions {
    pub visible: bool,
    pub logging_on: bool,
    /// Co-simulation only
    pub event_mode_used: bool,
    /// Co-simulation only
    pub early_return_allowed: bool,
    /// Co-simulation only
    pub required_intermediate_variables: Vec<binding::fmi3ValueReference>,
    pub callbacks: Callbacks,
}

impl<Tag> Drop for Instance<Tag> {
    fn drop(&mut self) {
        if let Some(free_state) = self.functions.fmi3FreeFMUState {
            for mut state in std::mem::take(&mut self.saved_states) {
                if !state.is_null() {
                    log::trace!("Freeing FMU state {state:?}");
                    unsafe { free_state(self.component, &mut state) };
                }
            }
        }

        if let Some(free_instance) = self.functions.fmi3FreeInstance {
            log::trace!("Freeing instance {:?}", self.component);
            unsafe { free_instance(self.component) };
            self.unit.trace(Status::OK, "fmi3FreeInstance()");
        }
    }
}

impl<Tag: InstanceTag> Instance<Tag> {
    /// Bind the entry points of `unit` and instantiate it with the `fmi3Instantiate*` function
    /// matching `Tag`.
    ///
    /// A missing entry point is reported through the unit's message logger and fails with
    /// [`Error::MissingSymbol`].
    pub fn instantiate(
        mut unit: UnitHandle,
        instantiation_token: &str,
        resource_path: &str,
        options: InstantiateOptions,
    ) -> Result<Self, Error> {
        let functions = unit.load_functions(|library| unsafe {
            Functions::load(library, Tag::TYPE, |name| name.to_owned())
        })?;

        let InstantiateOptions {
            visible,
            logging_on,
            event_mode_used,
            early_return_allowed,
            required_intermediate_variables,
            callbacks: user_callbacks,
        } = options;

        let environment = Box::new(Environment {
            sink: unit.sink().clone(),
            callbacks: user_callbacks,
        });
        let instance_name = CString::new(unit.name())?;
        let token_c = CString::new(instantiation_token)?;
        let resource_path_c = CString::new(resource_path)?;
        let env = environment.as_ptr();

        unit.state = State::StartAndEnd;

        let component = match Tag::TYPE {
            InterfaceType::ModelExchange => {
                let instantiate = functions
                    .fmi3InstantiateModelExchange
                    .ok_or(Error::Unavailable("fmi3InstantiateModelExchange"))?;
                unsafe {
                    instantiate(
                        instance_name.as_ptr(),
                        token_c.as_ptr(),
                        resource_path_c.as_ptr(),
                        visible,
                        logging_on,
                        env,
                        Some(callbacks::log_message),
                    )
                }
            }
            InterfaceType::CoSimulation => {
                let instantiate = functions
                    .fmi3InstantiateCoSimulation
                    .ok_or(Error::Unavailable("fmi3InstantiateCoSimulation"))?;
                unsafe {
                    instantiate(
                        instance_name.as_ptr(),
                        token_c.as_ptr(),
                        resource_path_c.as_ptr(),
                        visible,
                        logging_on,
                        event_mode_used,
                        early_return_allowed,
                        required_intermediate_variables.as_ptr(),
                        required_intermediate_variables.len(),
                        env,
                        Some(callbacks::log_message),
                        Some(callbacks::intermediate_update),
                    )
                }
            }
            InterfaceType::ScheduledExecution => {
                let instantiate = functions
                    .fmi3InstantiateScheduledExecution
                    .ok_or(Error::Unavailable("fmi3InstantiateScheduledExecution"))?;
                unsafe {
                    instantiate(
                        instance_name.as_ptr(),
                        token_c.as_ptr(),
                        resource_path_c.as_ptr(),
                        visible,
                        logging_on,
                        env,
                        Some(callbacks::log_message),
                        Some(callbacks::clock_update),
                        Some(callbacks::lock_preemption),
                        Some(callbacks::unlock_preemption),
                    )
                }
            }
        };

        let status = if component.is_null() {
            Status::Error
        } else {
            Status::OK
        };
        unit.fold_status(status);
        unit.trace_with(status, |_| {
            let common = format!(
                "instanceName=\"{}\", instantiationToken=\"{instantiation_token}\", \
                 resourcePath=\"{resource_path}\", visible={}, loggingOn={}",
                instance_name.to_string_lossy(),
                visible as i32,
                logging_on as i32,
            );
            let log_message = callbacks::log_message as *const c_void;
            match Tag::TYPE {
                InterfaceType::ModelExchange => format!(
                    "fmi3InstantiateModelExchange({common}, instanceEnvironment={env:p}, \
                     logMessage={log_message:p})"
                ),
                InterfaceType::CoSimulation => format!(
                    "fmi3InstantiateCoSimulation({common}, eventModeUsed={}, \
                     earlyReturnAllowed={}, requiredIntermediateVariables={:p}, \
                     nRequiredIntermediateVariables={}, instanceEnvironment={env:p}, \
                     logMessage={log_message:p}, intermediateUpdate={:p})",
                    event_mode_used as i32,
                    early_return_allowed as i32,
                    required_intermediate_variables.as_ptr(),
                    required_intermediate_variables.len(),
                    callbacks::intermediate_update as *const c_void,
                ),
                InterfaceType::ScheduledExecution => format!(
                    "fmi3InstantiateScheduledExecution({common}, instanceEnvironment={env:p}, \
                     logMessage={log_message:p}, clockUpdate={:p}, lockPreemption={:p}, \
                     unlockPreemption={:p})",
                    callbacks::clock_update as *const c_void,
                    callbacks::lock_preemption as *const c_void,
                    callbacks::unlock_preemption as *const c_void,
                ),
            }
        });

        if component.is_null() {
            return Err(Error::Instantiation(unit.name().to_owned()));
        }
        log::trace!("Created {:?} instance {component:?}", Tag::TYPE);

        unit.state = State::Instantiated;

        Ok(Self {
            unit,
            functions,
            component,
            environment,
            event_mode_used,
            saved_states: Vec::new(),
            _tag: PhantomData,
        })
    }
}

impl<Tag> Instance<Tag> {
    /// Wrap an already created instance
    #[cfg(test)]
    pub(crate) fn instantiate_with(
        mut unit: UnitHandle,
        functions: Functions,
        component: binding::fmi3Instance,
        callbacks: Callbacks,
    ) -> Self {
        let environment = Box::new(Environment {
            sink: unit.sink().clone(),
            callbacks,
        });
        unit.state = State::Instantiated;
        Self {
            unit,
            functions,
            component,
            environment,
            event_mode_used: false,
            saved_states: Vec::new(),
            _tag: PhantomData,
        }
    }

    pub fn unit(&self) -> &UnitHandle {
        &self.unit
    }

    /// Report an argument error through the unit's message logger
    fn invalid_arguments(&mut self, function: &str, reason: &str) -> Status {
        self.unit
            .log_message(Status::Error, "error", &format!("{function}: {reason}"));
        self.unit.fold_status(Status::Error)
    }

    fn saved_state(&self, state: FmuState) -> Option<binding::fmi3FMUState> {
        self.saved_states
            .get(state.0)
            .copied()
            .filter(|state| !state.is_null())
    }

    /// Call an entry point that only takes the instance
    fn call_no_args(
        &mut self,
        function: Option<unsafe extern "C" fn(binding::fmi3Instance) -> binding::fmi3Status>,
        name: &'static str,
    ) -> Status {
        let status = match function {
            Some(f) => Status::from(unsafe { f(self.component) }),
            None => {
                self.unit.log_message(
                    Status::Error,
                    "error",
                    &format!("Function {name} is not available in shared library."),
                );
                Status::Error
            }
        };
        self.unit.fold_status(status);
        self.unit.trace_with(status, |_| format!("{name}()"));
        status
    }
}

/// Invoke an entry point and fold the returned status into the unit's status
macro_rules! call {
    ($self:ident . $f:ident ( $($arg:expr),* $(,)? )) => {{
        let status = $crate::binding::invoke!($self.$f($($arg),*));
        $self.unit.fold_status(status)
    }};
}

/// Getter and setter for an array kind whose Rust type matches the ABI type
macro_rules! impl_getter_setter {
    ($ty:ty, $get:ident, $set:ident, $fmi_get:ident, $fmi_set:ident) => {
        pub fn $get(&mut self, vrs: &[binding::fmi3ValueReference], values: &mut [$ty]) -> Status {
            if values.len() < vrs.len() {
                return self.invalid_arguments(stringify!($fmi_get), "fewer values than value references");
            }
            let status = call!(self.$fmi_get(vrs.as_ptr(), vrs.len(), values.as_mut_ptr(), values.len()));
            self.unit.trace_with(status, |fmt| {
                let (vrs_str, values_str) = fmt.format(vrs, &*values);
                format!(
                    concat!(
                        stringify!($fmi_get),
                        "(valueReferences={}, nValueReferences={}, values={}, nValues={})"
                    ),
                    vrs_str,
                    vrs.len(),
                    values_str,
                    values.len()
                )
            });
            status
        }

        pub fn $set(&mut self, vrs: &[binding::fmi3ValueReference], values: &[$ty]) -> Status {
            if values.len() < vrs.len() {
                return self.invalid_arguments(stringify!($fmi_set), "fewer values than value references");
            }
            let status = call!(self.$fmi_set(vrs.as_ptr(), vrs.len(), values.as_ptr(), values.len()));
            self.unit.trace_with(status, |fmt| {
                let (vrs_str, values_str) = fmt.format(vrs, &*values);
                format!(
                    concat!(
                        stringify!($fmi_set),
                        "(valueReferences={}, nValueReferences={}, values={}, nValues={})"
                    ),
                    vrs_str,
                    vrs.len(),
                    values_str,
                    values.len()
                )
            });
            status
        }
    };
}

pub(crate) use call;
pub(crate) use impl_getter_setter;
