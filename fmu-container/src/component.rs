//! A unit inside the container, optionally stepped by its own worker thread.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

use fmi_unit::{Status, traits::CoSimulationUnit};

use crate::Error;

#[derive(Debug, Clone, Copy)]
struct StepRequest {
    current_communication_point: f64,
    communication_step_size: f64,
    no_set_fmu_state_prior_to_current_point: bool,
}

struct Slot {
    unit: Box<dyn CoSimulationUnit>,
    /// Set while a step is requested and not yet finished
    step: Option<StepRequest>,
    terminate: bool,
    status: Status,
}

struct Shared {
    slot: Mutex<Slot>,
    signal: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Component {
    name: String,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("worker", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

impl Component {
    pub fn new(unit: Box<dyn CoSimulationUnit>) -> Self {
        Self {
            name: unit.name().to_owned(),
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    unit,
                    step: None,
                    terminate: false,
                    status: Status::OK,
                }),
                signal: Condvar::new(),
            }),
            worker: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Run `f` on the unit while holding the component's lock
    pub fn with_unit<R>(&self, f: impl FnOnce(&mut dyn CoSimulationUnit) -> R) -> R {
        let mut slot = self.shared.lock();
        f(slot.unit.as_mut())
    }

    /// The status of the last step
    pub fn status(&self) -> Status {
        self.shared.lock().status
    }

    /// Start the worker thread that performs requested steps
    pub fn spawn_worker(&mut self) -> Result<(), Error> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.shared.lock().terminate = false;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("fmu-container-{}", self.name))
            .spawn(move || run_worker(&shared))
            .map_err(|source| Error::Worker {
                name: self.name.clone(),
                source,
            })?;
        log::trace!("Spawned worker for component {}", self.name);
        self.worker = Some(handle);
        Ok(())
    }

    /// Record the step parameters and wake the worker. Without a worker the step is performed
    /// right away.
    pub fn request_step(
        &self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) {
        let request = StepRequest {
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point,
        };
        let mut slot = self.shared.lock();
        if self.worker.is_some() {
            slot.step = Some(request);
            self.shared.signal.notify_all();
        } else {
            step(&mut slot, request);
        }
    }

    /// Block until the requested step has been performed and return its status
    pub fn wait_step(&self) -> Status {
        let slot = self.shared.lock();
        let slot = self
            .shared
            .signal
            .wait_while(slot, |slot| slot.step.is_some())
            .unwrap_or_else(PoisonError::into_inner);
        slot.status
    }

    /// Perform one step on the calling thread
    pub fn do_step(
        &self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Status {
        let mut slot = self.shared.lock();
        step(
            &mut slot,
            StepRequest {
                current_communication_point,
                communication_step_size,
                no_set_fmu_state_prior_to_current_point,
            },
        )
    }

    /// Signal the worker to finish and join it
    pub fn stop_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            {
                let mut slot = self.shared.lock();
                slot.terminate = true;
                self.shared.signal.notify_all();
            }
            if handle.join().is_err() {
                log::error!("Worker of component {} panicked", self.name);
            }
            log::trace!("Joined worker of component {}", self.name);
        }
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        self.stop_worker();
        log::trace!("Freeing component {}", self.name);
    }
}

fn step(slot: &mut Slot, request: StepRequest) -> Status {
    let status = slot.unit.do_step(
        request.current_communication_point,
        request.communication_step_size,
        request.no_set_fmu_state_prior_to_current_point,
    );
    slot.status = status;
    status
}

fn run_worker(shared: &Shared) {
    let mut slot = shared.lock();
    loop {
        slot = shared
            .signal
            .wait_while(slot, |slot| slot.step.is_none() && !slot.terminate)
            .unwrap_or_else(PoisonError::into_inner);

        if slot.terminate {
            break;
        }

        if let Some(request) = slot.step {
            let stepped = panic::catch_unwind(AssertUnwindSafe(|| step(&mut slot, request)));
            if stepped.is_err() {
                log::error!("Step of component {} panicked", slot.unit.name());
                slot.status = Status::Fatal;
            }
            slot.step = None;
            shared.signal.notify_all();
        }
    }
}
