//! FMI 2.0 instance interface

use std::{
    ffi::{CString, c_void},
    marker::PhantomData,
    ptr,
};

use fmi_sys::logger::fmi2_callback_logger;

use super::{Functions, binding};
use crate::{
    Error, FmiVersion, InterfaceType, State, Status, UnitHandle, traits::InstanceTag,
};

mod co_simulation;
mod common;
mod model_exchange;
#[cfg(test)]
mod tests;

/// An instantiated FMI 2.0 unit.
///
/// The instance owns its [`UnitHandle`]; dropping it frees the saved FMU states, the instance and
/// finally the shared library.
pub struct Instance<Tag> {
    unit: UnitHandle,
    functions: Functions,
    /// Pointer to the raw FMI 2.0 instance
    component: binding::fmi2Component,
    /// Callbacks struct, referenced by the unit for its whole lifetime
    #[allow(dead_code)]
    callbacks: Box<binding::fmi2CallbackFunctions>,
    saved_states: Vec<binding::fmi2FMUstate>,
    _tag: PhantomData<Tag>,
}

// Calls into the component are serialized through `&mut self`
unsafe impl<Tag> Send for Instance<Tag> {}

/// Handle to an FMU state saved with [`Instance::get_fmu_state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmuState(usize);

impl<Tag> Drop for Instance<Tag> {
    fn drop(&mut self) {
        if let Some(free_state) = self.functions.fmi2FreeFMUstate {
            for mut state in std::mem::take(&mut self.saved_states) {
                if !state.is_null() {
                    log::trace!("Freeing FMU state {state:?}");
                    unsafe { free_state(self.component, &mut state) };
                }
            }
        }

        if let Some(free_instance) = self.functions.fmi2FreeInstance {
            log::trace!("Freeing component {:?}", self.component);
            unsafe { free_instance(self.component) };
            self.unit.trace(Status::OK, "fmi2FreeInstance()");
        }
    }
}

fn callback_functions(environment: *mut c_void) -> Box<binding::fmi2CallbackFunctions> {
    Box::new(binding::fmi2CallbackFunctions {
        logger: Some(fmi2_callback_logger),
        allocateMemory: Some(libc::calloc),
        freeMemory: Some(libc::free),
        stepFinished: None,
        componentEnvironment: environment,
    })
}

impl<Tag: InstanceTag> Instance<Tag> {
    /// Bind the entry points of `unit` and instantiate it.
    ///
    /// A missing entry point is reported through the unit's message logger and fails with
    /// [`Error::MissingSymbol`].
    pub fn instantiate(
        mut unit: UnitHandle,
        guid: &str,
        resource_location: &str,
        visible: bool,
        logging_on: bool,
    ) -> Result<Self, Error> {
        let fmu_type = match Tag::TYPE {
            InterfaceType::ModelExchange => binding::fmi2Type_fmi2ModelExchange,
            InterfaceType::CoSimulation => binding::fmi2Type_fmi2CoSimulation,
            InterfaceType::ScheduledExecution => {
                return Err(Error::UnsupportedInterface(Tag::TYPE, FmiVersion::V2));
            }
        };

        let functions = unit.load_functions(|library| unsafe {
            Functions::load(library, Tag::TYPE, |name| name.to_owned())
        })?;
        let instantiate = functions
            .fmi2Instantiate
            .ok_or(Error::Unavailable("fmi2Instantiate"))?;

        let callbacks = callback_functions(unit.sink().as_environment());
        let instance_name = CString::new(unit.name())?;
        let guid_c = CString::new(guid)?;
        let resource_location_c = CString::new(resource_location)?;

        unit.state = State::StartAndEnd;

        let component = unsafe {
            instantiate(
                instance_name.as_ptr(),
                fmu_type,
                guid_c.as_ptr(),
                resource_location_c.as_ptr(),
                &*callbacks,
                visible as binding::fmi2Boolean,
                logging_on as binding::fmi2Boolean,
            )
        };

        let status = if component.is_null() {
            Status::Error
        } else {
            Status::OK
        };
        unit.trace_with(status, |_| {
            format!(
                "fmi2Instantiate(instanceName=\"{}\", fmuType={fmu_type}, fmuGUID=\"{guid}\", \
                 fmuResourceLocation=\"{resource_location}\", functions={{logger={:p}, \
                 allocateMemory={:p}, freeMemory={:p}, stepFinished={:p}, \
                 componentEnvironment={:p}}}, visible={}, loggingOn={})",
                instance_name.to_string_lossy(),
                callbacks.logger.map_or(ptr::null(), |f| f as *const c_void),
                callbacks.allocateMemory.map_or(ptr::null(), |f| f as *const c_void),
                callbacks.freeMemory.map_or(ptr::null(), |f| f as *const c_void),
                callbacks.stepFinished.map_or(ptr::null(), |f| f as *const c_void),
                callbacks.componentEnvironment,
                visible as i32,
                logging_on as i32,
            )
        });

        if component.is_null() {
            return Err(Error::Instantiation(unit.name().to_owned()));
        }
        log::trace!("Created {:?} component {component:?}", Tag::TYPE);

        unit.state = State::Instantiated;

        Ok(Self {
            unit,
            functions,
            component,
            callbacks,
            saved_states: Vec::new(),
            _tag: PhantomData,
        })
    }
}

impl<Tag> Instance<Tag> {
    /// Wrap an already created component
    #[cfg(test)]
    pub(crate) fn instantiate_with(
        mut unit: UnitHandle,
        functions: Functions,
        component: binding::fmi2Component,
    ) -> Self {
        let callbacks = callback_functions(unit.sink().as_environment());
        unit.state = State::Instantiated;
        Self {
            unit,
            functions,
            component,
            callbacks,
            saved_states: Vec::new(),
            _tag: PhantomData,
        }
    }

    pub fn unit(&self) -> &UnitHandle {
        &self.unit
    }

    /// Report an argument error through the unit's message logger
    fn invalid_arguments(&self, function: &str, reason: &str) -> Status {
        self.unit
            .log_message(Status::Error, "error", &format!("{function}: {reason}"));
        Status::Error
    }

    fn saved_state(&self, state: FmuState) -> Option<binding::fmi2FMUstate> {
        self.saved_states
            .get(state.0)
            .copied()
            .filter(|state| !state.is_null())
    }
}

/// Getter and setter for a kind whose Rust type matches the ABI type
macro_rules! impl_getter_setter {
    ($ty:ty, $get:ident, $set:ident, $fmi_get:ident, $fmi_set:ident) => {
        pub fn $get(&mut self, vrs: &[binding::fmi2ValueReference], values: &mut [$ty]) -> Status {
            if values.len() < vrs.len() {
                return self.invalid_arguments(stringify!($fmi_get), "fewer values than value references");
            }
            let status = $crate::binding::invoke!(self.$fmi_get(vrs.as_ptr(), vrs.len(), values.as_mut_ptr()));
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

        pub fn $set(&mut self, vrs: &[binding::fmi2ValueReference], values: &[$ty]) -> Status {
            if values.len() < vrs.len() {
                return self.invalid_arguments(stringify!($fmi_set), "fewer values than value references");
            }
            let status = $crate::binding::invoke!(self.$fmi_set(vrs.as_ptr(), vrs.len(), values.as_ptr()));
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

impl<Tag> Instance<Tag> {
    /// Call an entry point that only takes the component
    fn call_no_args(
        &mut self,
        function: Option<unsafe extern "C" fn(binding::fmi2Component) -> binding::fmi2Status>,
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
        self.unit.trace_with(status, |_| format!("{name}()"));
        status
    }
}
