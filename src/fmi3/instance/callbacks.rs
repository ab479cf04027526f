//! Callbacks installed into FMI 3.0 units.
//!
//! Every unit receives a pointer to its [`Environment`] as `instanceEnvironment`. The preemption
//! callbacks carry no environment and find it through the instance that is activating a model
//! partition on the calling thread.

use std::{cell::Cell, ffi::c_void, marker::PhantomData, ptr, sync::Arc};

use fmi_sys::logger::LogSink;

use crate::{
    fmi3::{IntermediateUpdate, binding},
    unit::lossy,
};

type Callback = Box<dyn Fn() + Send + Sync>;

/// User closures a unit may call back into
#[derive(Default)]
pub struct Callbacks {
    /// Called on intermediate updates of a co-simulation step. Returning `Some(time)` requests an
    /// early return at `time` when the unit allows it.
    pub intermediate_update: Option<Box<dyn Fn(&IntermediateUpdate) -> Option<f64> + Send + Sync>>,
    pub clock_update: Option<Callback>,
    pub lock_preemption: Option<Callback>,
    pub unlock_preemption: Option<Callback>,
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("intermediate_update", &self.intermediate_update.is_some())
            .field("clock_update", &self.clock_update.is_some())
            .field("lock_preemption", &self.lock_preemption.is_some())
            .field("unlock_preemption", &self.unlock_preemption.is_some())
            .finish()
    }
}

/// Referenced by the unit as `instanceEnvironment` for its whole lifetime
pub(crate) struct Environment {
    pub(crate) sink: Arc<LogSink>,
    pub(crate) callbacks: Callbacks,
}

impl Environment {
    pub(crate) fn as_ptr(&self) -> binding::fmi3InstanceEnvironment {
        self as *const Self as *mut c_void
    }
}

thread_local! {
    static PREEMPTING: Cell<*const Environment> = const { Cell::new(ptr::null()) };
}

/// Routes the preemption callbacks to `environment` until dropped
pub(crate) struct PreemptionScope<'a> {
    previous: *const Environment,
    _environment: PhantomData<&'a Environment>,
}

impl<'a> PreemptionScope<'a> {
    pub(crate) fn enter(environment: &'a Environment) -> Self {
        let previous = PREEMPTING.with(|current| current.replace(environment));
        Self {
            previous,
            _environment: PhantomData,
        }
    }
}

impl Drop for PreemptionScope<'_> {
    fn drop(&mut self) {
        PREEMPTING.with(|current| current.set(self.previous));
    }
}

unsafe fn environment<'a>(environment: binding::fmi3InstanceEnvironment) -> Option<&'a Environment> {
    unsafe { (environment as *const Environment).as_ref() }
}

pub(crate) unsafe extern "C" fn log_message(
    instance_environment: binding::fmi3InstanceEnvironment,
    status: binding::fmi3Status,
    category: binding::fmi3String,
    message: binding::fmi3String,
) {
    if let Some(environment) = unsafe { environment(instance_environment) } {
        environment
            .sink
            .log(status, &lossy(category), &lossy(message));
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) unsafe extern "C" fn intermediate_update(
    instance_environment: binding::fmi3InstanceEnvironment,
    intermediate_update_time: binding::fmi3Float64,
    intermediate_variable_set_requested: binding::fmi3Boolean,
    intermediate_variable_get_allowed: binding::fmi3Boolean,
    intermediate_step_finished: binding::fmi3Boolean,
    can_return_early: binding::fmi3Boolean,
    early_return_requested: *mut binding::fmi3Boolean,
    early_return_time: *mut binding::fmi3Float64,
) {
    log::trace!("Intermediate update at {intermediate_update_time}");
    let update = IntermediateUpdate {
        time: intermediate_update_time,
        variable_set_requested: intermediate_variable_set_requested,
        variable_get_allowed: intermediate_variable_get_allowed,
        step_finished: intermediate_step_finished,
        can_return_early,
    };
    let request = unsafe { environment(instance_environment) }
        .and_then(|environment| environment.callbacks.intermediate_update.as_ref())
        .and_then(|callback| callback(&update))
        .filter(|_| can_return_early);

    unsafe {
        if let Some(requested) = early_return_requested.as_mut() {
            *requested = request.is_some();
        }
        if let (Some(time), Some(out)) = (request, early_return_time.as_mut()) {
            *out = time;
        }
    }
}

pub(crate) unsafe extern "C" fn clock_update(instance_environment: binding::fmi3InstanceEnvironment) {
    log::trace!("Clock update");
    if let Some(callback) = unsafe { environment(instance_environment) }
        .and_then(|environment| environment.callbacks.clock_update.as_ref())
    {
        callback();
    }
}

fn preempting(select: impl FnOnce(&Callbacks) -> Option<&Callback>) {
    let current = PREEMPTING.with(Cell::get);
    if let Some(callback) = unsafe { current.as_ref() }.and_then(|environment| select(&environment.callbacks)) {
        callback();
    }
}

pub(crate) unsafe extern "C" fn lock_preemption() {
    log::trace!("Lock preemption");
    preempting(|callbacks| callbacks.lock_preemption.as_ref());
}

pub(crate) unsafe extern "C" fn unlock_preemption() {
    log::trace!("Unlock preemption");
    preempting(|callbacks| callbacks.unlock_preemption.as_ref());
}
