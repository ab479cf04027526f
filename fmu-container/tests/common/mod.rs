//! In-process units standing in for shared libraries

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
};

use fmi_unit::{
    Error, FmiVersion, LogMessageFn, State, Status, traits::CoSimulationUnit,
};
use fmu_container::{Config, Logger, UnitLoader, UnitRequest};

/// Observable side of one mock unit, shared between the unit and the test
#[derive(Debug, Default)]
pub struct Observer {
    pub steps: AtomicUsize,
    pub resets: AtomicUsize,
    pub gets: AtomicUsize,
    /// Status returned by `do_step`
    pub step_status: Mutex<Status>,
    /// Status returned by the setters
    pub set_status: Mutex<Status>,
    /// Values written to the given Real outputs by every step
    pub step_outputs: Mutex<Vec<(u32, f64)>>,
    pub reals: Mutex<BTreeMap<u32, f64>>,
    pub integers: Mutex<BTreeMap<u32, i32>>,
    pub booleans: Mutex<BTreeMap<u32, bool>>,
    pub strings: Mutex<BTreeMap<u32, String>>,
    /// Names of the threads `do_step` ran on
    pub step_threads: Mutex<Vec<String>>,
    /// `do_step` panics
    pub crash_steps: AtomicBool,
}

impl Observer {
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn real(&self, vr: u32) -> f64 {
        self.reals.lock().unwrap().get(&vr).copied().unwrap_or_default()
    }

    pub fn fail_steps(&self, status: Status) {
        *self.step_status.lock().unwrap() = status;
    }

    pub fn fail_sets(&self, status: Status) {
        *self.set_status.lock().unwrap() = status;
    }
}

pub struct MockUnit {
    name: String,
    observer: Arc<Observer>,
    live: Arc<AtomicUsize>,
    state: State,
    time: f64,
    status: Status,
}

impl Drop for MockUnit {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockUnit {
    fn get<T: Clone + Default>(
        &mut self,
        map: &Mutex<BTreeMap<u32, T>>,
        vrs: &[u32],
        values: &mut [T],
    ) -> Status {
        self.observer.gets.fetch_add(1, Ordering::SeqCst);
        let map = map.lock().unwrap();
        for (vr, value) in vrs.iter().zip(values.iter_mut()) {
            *value = map.get(vr).cloned().unwrap_or_default();
        }
        Status::OK
    }

    fn set<T: Clone>(&mut self, map: &Mutex<BTreeMap<u32, T>>, vrs: &[u32], values: &[T]) -> Status {
        let status = *self.observer.set_status.lock().unwrap();
        if status.is_failure() {
            return status;
        }
        let mut map = map.lock().unwrap();
        for (vr, value) in vrs.iter().zip(values) {
            map.insert(*vr, value.clone());
        }
        status
    }
}

impl CoSimulationUnit for MockUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> FmiVersion {
        FmiVersion::V2
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn state(&self) -> State {
        self.state
    }

    fn status(&self) -> Status {
        self.status
    }

    fn set_debug_logging(&mut self, _logging_on: bool, _categories: &[&str]) -> Status {
        Status::OK
    }

    fn enter_initialization_mode(
        &mut self,
        _tolerance: Option<f64>,
        start_time: f64,
        _stop_time: Option<f64>,
    ) -> Status {
        self.time = start_time;
        self.state = State::InitializationMode;
        Status::OK
    }

    fn exit_initialization_mode(&mut self) -> Status {
        self.state = State::StepComplete;
        Status::OK
    }

    fn terminate(&mut self) -> Status {
        self.state = State::Terminated;
        Status::OK
    }

    fn reset(&mut self) -> Status {
        self.observer.resets.fetch_add(1, Ordering::SeqCst);
        self.observer.reals.lock().unwrap().clear();
        self.observer.integers.lock().unwrap().clear();
        self.observer.booleans.lock().unwrap().clear();
        self.observer.strings.lock().unwrap().clear();
        self.time = 0.0;
        self.state = State::Instantiated;
        Status::OK
    }

    fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Status {
        let observer = Arc::clone(&self.observer);
        self.get(&observer.reals, vrs, values)
    }

    fn get_integer(&mut self, vrs: &[u32], values: &mut [i32]) -> Status {
        let observer = Arc::clone(&self.observer);
        self.get(&observer.integers, vrs, values)
    }

    fn get_boolean(&mut self, vrs: &[u32], values: &mut [bool]) -> Status {
        let observer = Arc::clone(&self.observer);
        self.get(&observer.booleans, vrs, values)
    }

    fn get_string(&mut self, vrs: &[u32], values: &mut [String]) -> Status {
        let observer = Arc::clone(&self.observer);
        self.get(&observer.strings, vrs, values)
    }

    fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Status {
        let observer = Arc::clone(&self.observer);
        self.set(&observer.reals, vrs, values)
    }

    fn set_integer(&mut self, vrs: &[u32], values: &[i32]) -> Status {
        let observer = Arc::clone(&self.observer);
        self.set(&observer.integers, vrs, values)
    }

    fn set_boolean(&mut self, vrs: &[u32], values: &[bool]) -> Status {
        let observer = Arc::clone(&self.observer);
        self.set(&observer.booleans, vrs, values)
    }

    fn set_string(&mut self, vrs: &[u32], values: &[&str]) -> Status {
        let observer = Arc::clone(&self.observer);
        let values = values.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        self.set(&observer.strings, vrs, &values)
    }

    fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        _no_set_fmu_state_prior_to_current_point: bool,
    ) -> Status {
        self.observer.steps.fetch_add(1, Ordering::SeqCst);
        if self.observer.crash_steps.load(Ordering::SeqCst) {
            panic!("{} crashed", self.name);
        }
        self.observer.step_threads.lock().unwrap().push(
            thread::current()
                .name()
                .unwrap_or_default()
                .to_owned(),
        );
        let status = *self.observer.step_status.lock().unwrap();
        self.status = self.status.max(status);
        if status.is_failure() {
            self.state = State::StepFailed;
            return status;
        }
        let outputs = self.observer.step_outputs.lock().unwrap().clone();
        let mut reals = self.observer.reals.lock().unwrap();
        for (vr, value) in outputs {
            reals.insert(vr, value);
        }
        self.time = current_communication_point + communication_step_size;
        self.state = State::StepComplete;
        status
    }
}

/// Hands out [`MockUnit`]s by component name and counts the units alive
#[derive(Debug, Default)]
pub struct MockLoader {
    pub observers: Mutex<HashMap<String, Arc<Observer>>>,
    pub live: Arc<AtomicUsize>,
    pub loads: AtomicUsize,
    /// Loading the component with this name fails
    pub fail_load: Option<String>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The observer of the unit created for component `name`
    pub fn observe(&self, name: &str) -> Arc<Observer> {
        Arc::clone(
            self.observers
                .lock()
                .unwrap()
                .entry(name.to_owned())
                .or_default(),
        )
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl UnitLoader for MockLoader {
    fn load(&self, request: UnitRequest<'_>) -> Result<Box<dyn CoSimulationUnit>, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.as_deref() == Some(request.name) {
            return Err(Error::Instantiation(request.name.to_owned()));
        }
        if let Some(log_message) = &request.log_message {
            let log_message: &LogMessageFn = &**log_message;
            log_message(request.name, Status::OK, "logStatusOK", "instantiated");
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockUnit {
            name: request.name.to_owned(),
            observer: self.observe(request.name),
            live: Arc::clone(&self.live),
            state: State::Instantiated,
            time: 0.0,
            status: Status::OK,
        }))
    }
}

/// Messages received by the container's logger
#[derive(Debug, Default, Clone)]
pub struct Messages(Arc<Mutex<Vec<(Status, String, String)>>>);

impl Messages {
    pub fn logger(&self) -> Arc<Logger> {
        let messages = Arc::clone(&self.0);
        Arc::new(move |status: Status, category: &str, message: &str| {
            messages
                .lock()
                .unwrap()
                .push((status, category.to_owned(), message.to_owned()))
        })
    }

    pub fn all(&self) -> Vec<(Status, String, String)> {
        self.0.lock().unwrap().clone()
    }
}

/// A composition of `components`, all with `modelIdentifier` equal to their name
pub fn config(
    components: &[&str],
    parallel_do_step: bool,
    connections: serde_json::Value,
    variables: serde_json::Value,
) -> Config {
    let components = components
        .iter()
        .map(|name| {
            serde_json::json!({
                "name": name,
                "guid": format!("{{{name}}}"),
                "modelIdentifier": name,
            })
        })
        .collect::<Vec<_>>();
    serde_json::from_value(serde_json::json!({
        "parallelDoStep": parallel_do_step,
        "components": components,
        "connections": connections,
        "variables": variables,
    }))
    .unwrap()
}
