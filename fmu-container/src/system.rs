//! The composed system: its components, the variables it exposes and the connections between
//! the components.

use std::{
    path::{Path, PathBuf},
    slice,
    sync::Arc,
};

use fmi_unit::{
    FmiVersion, LogCallFn, LogMessageFn, Status, platform::uri_to_path, traits::CoSimulationUnit,
};
use itertools::Itertools;

use crate::{
    Error,
    component::Component,
    config::{Config, ConnectionConfig, Kind, StartValue, VariableConfig},
    loader::{LibraryLoader, UnitLoader, UnitRequest},
};

/// Receives `(status, category, message)` for every message of the container and its units
pub type Logger = dyn Fn(Status, &str, &str) + Send + Sync;

/// Value reference of the simulation time
pub const TIME_VALUE_REFERENCE: u32 = 0;

/// Directed link from an output of one component to an input of another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub kind: Kind,
    pub start_component: usize,
    pub start_value_reference: u32,
    pub end_component: usize,
    pub end_value_reference: u32,
}

impl From<&ConnectionConfig> for Connection {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            kind: config.kind,
            start_component: config.start_component,
            start_value_reference: config.start_value_reference,
            end_component: config.end_component,
            end_value_reference: config.end_value_reference,
        }
    }
}

/// The `(component, value reference)` pairs behind one variable of the container. Writes go to
/// all of them, reads come from the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMapping {
    pub kind: Kind,
    pub targets: Vec<(usize, u32)>,
}

impl From<&VariableConfig> for VariableMapping {
    fn from(config: &VariableConfig) -> Self {
        Self {
            kind: config.kind,
            targets: config
                .components
                .iter()
                .copied()
                .zip(config.value_references.iter().copied())
                .collect(),
        }
    }
}

pub struct System {
    name: String,
    components: Vec<Component>,
    variables: Vec<VariableMapping>,
    connections: Vec<Connection>,
    parallel_do_step: bool,
    time: f64,
    logger: Arc<Logger>,
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("components", &self.components)
            .field("variables", &self.variables)
            .field("connections", &self.connections)
            .field("parallel_do_step", &self.parallel_do_step)
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

/// Stop at the first status worse than Warning, keeping the worst status seen otherwise
macro_rules! check_status {
    ($status:ident, $e:expr) => {{
        $status = $status.max($e);
        if $status.is_failure() {
            return $status;
        }
    }};
}

impl System {
    /// Load the composition from the resource location handed to the container and create its
    /// units from their shared libraries.
    ///
    /// `interface_version` is the FMI version the container itself is instantiated through. It
    /// decides whether `resource_location` is a `file:` URI (FMI 1.0, 2.0) or a path (FMI 3.0).
    pub fn instantiate(
        interface_version: FmiVersion,
        resource_location: &str,
        instance_name: &str,
        logger: Arc<Logger>,
        logging_on: bool,
        visible: bool,
    ) -> Result<Self, Error> {
        let resource_dir = match interface_version {
            FmiVersion::V1 | FmiVersion::V2 => uri_to_path(resource_location)?,
            FmiVersion::V3 => PathBuf::from(resource_location),
        };
        let config = Config::load(&resource_dir)?;
        Self::instantiate_with(
            &LibraryLoader,
            config,
            &resource_dir,
            instance_name,
            logger,
            logging_on,
            visible,
        )
    }

    /// Build the system described by `config`, creating the units through `loader`.
    ///
    /// Units already created are released again if a later step fails.
    pub fn instantiate_with(
        loader: &dyn UnitLoader,
        config: Config,
        resource_dir: &Path,
        instance_name: &str,
        logger: Arc<Logger>,
        logging_on: bool,
        visible: bool,
    ) -> Result<Self, Error> {
        let config = config.validate()?;
        log::trace!(
            "Instantiating {instance_name} with components {}",
            config.components.iter().map(|c| &c.name).join(", ")
        );

        let log_message: Arc<LogMessageFn> = {
            let logger = Arc::clone(&logger);
            Arc::new(move |name: &str, status: Status, category: &str, message: &str| {
                logger(status, category, &format!("[{name}]: {message}"))
            })
        };
        let log_call = logging_on.then(|| {
            let logger = Arc::clone(&logger);
            Arc::new(move |name: &str, status: Status, call: &str| {
                logger(status, "debug", &format!("[{name}]: {call}"))
            }) as Arc<LogCallFn>
        });

        let mut components = Vec::with_capacity(config.components.len());
        for component in &config.components {
            let unit_directory = resource_dir.join(&component.model_identifier);
            let unit = loader
                .load(UnitRequest {
                    name: &component.name,
                    guid: &component.guid,
                    model_identifier: &component.model_identifier,
                    version: component.version()?,
                    unit_directory: &unit_directory,
                    visible,
                    logging_on,
                    log_message: Some(Arc::clone(&log_message)),
                    log_call: log_call.clone(),
                })
                .map_err(|source| Error::Component {
                    name: component.name.clone(),
                    source,
                })?;
            components.push(Component::new(unit));
        }

        let mut system = Self {
            name: instance_name.to_owned(),
            components,
            variables: config.variables.iter().map(VariableMapping::from).collect(),
            connections: config.connections.iter().map(Connection::from).collect(),
            parallel_do_step: config.parallel_do_step,
            time: 0.0,
            logger,
        };

        if system.parallel_do_step {
            system.spawn_workers()?;
        }

        for (index, variable) in config.variables.iter().enumerate() {
            if let Some(start) = &variable.start {
                system.apply_start_value(index, start)?;
            }
        }

        Ok(system)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The simulation time, as last set by initialization, reset or a successful step
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn variables(&self) -> &[VariableMapping] {
        &self.variables
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn parallel_do_step(&self) -> bool {
        self.parallel_do_step
    }

    /// Number of components currently stepped by a worker thread
    pub fn active_workers(&self) -> usize {
        self.components.iter().filter(|c| c.has_worker()).count()
    }

    /// Report a message of the container itself
    pub fn log(&self, status: Status, category: &str, message: &str) {
        (self.logger)(status, category, message)
    }

    fn spawn_workers(&mut self) -> Result<(), Error> {
        self.components
            .iter_mut()
            .try_for_each(Component::spawn_worker)
    }

    fn apply_start_value(&self, index: usize, start: &StartValue) -> Result<(), Error> {
        let mapping = &self.variables[index];
        let incompatible = || {
            Error::Config(format!(
                "start value {start:?} of variable {index} is not a {}",
                mapping.kind
            ))
        };
        let status = match mapping.kind {
            Kind::Real => {
                let value = start.as_real().ok_or_else(incompatible)?;
                self.broadcast(mapping, |unit, vr| unit.set_real(&[vr], &[value]))
            }
            Kind::Integer => {
                let value = start.as_integer().ok_or_else(incompatible)?;
                self.broadcast(mapping, |unit, vr| unit.set_integer(&[vr], &[value]))
            }
            Kind::Boolean => {
                let value = start.as_boolean().ok_or_else(incompatible)?;
                self.broadcast(mapping, |unit, vr| unit.set_boolean(&[vr], &[value]))
            }
            Kind::String => {
                let value = start.as_string().ok_or_else(incompatible)?;
                self.broadcast(mapping, |unit, vr| unit.set_string(&[vr], &[value]))
            }
        };
        if status.is_failure() {
            return Err(Error::StartValue { index, status });
        }
        Ok(())
    }

    /// Run `f` on every constituent of `mapping` in order, stopping at the first failure
    fn broadcast(
        &self,
        mapping: &VariableMapping,
        mut f: impl FnMut(&mut dyn CoSimulationUnit, u32) -> Status,
    ) -> Status {
        let mut status = Status::OK;
        for &(ci, vr) in &mapping.targets {
            check_status!(status, self.components[ci].with_unit(|unit| f(unit, vr)));
        }
        status
    }

    fn mapping(&self, vr: u32) -> Option<&VariableMapping> {
        let index = (vr as usize).checked_sub(1)?;
        self.variables.get(index)
    }

    fn out_of_range(&self, function: &str, vr: u32) -> Status {
        self.log(
            Status::Error,
            "logError",
            &format!(
                "{function}: value reference {vr} is out of range 0..={}",
                self.variables.len()
            ),
        );
        Status::Error
    }

    fn get_values<T>(
        &self,
        function: &str,
        vrs: &[u32],
        values: &mut [T],
        time: Option<fn(f64) -> T>,
        get: impl Fn(&mut dyn CoSimulationUnit, u32, &mut T) -> Status,
    ) -> Status {
        if values.len() < vrs.len() {
            return self.log_invalid(function, "fewer values than value references");
        }
        let mut status = Status::OK;
        for (&vr, value) in vrs.iter().zip(values.iter_mut()) {
            if vr == TIME_VALUE_REFERENCE {
                if let Some(time) = time {
                    *value = time(self.time);
                    continue;
                }
            }
            let Some(mapping) = self.mapping(vr) else {
                return self.out_of_range(function, vr);
            };
            let (ci, cvr) = mapping.targets[0];
            check_status!(
                status,
                self.components[ci].with_unit(|unit| get(unit, cvr, value))
            );
        }
        status
    }

    fn set_values<T>(
        &self,
        function: &str,
        vrs: &[u32],
        values: &[T],
        set: impl Fn(&mut dyn CoSimulationUnit, u32, &T) -> Status,
    ) -> Status {
        if values.len() < vrs.len() {
            return self.log_invalid(function, "fewer values than value references");
        }
        let mut status = Status::OK;
        for (&vr, value) in vrs.iter().zip(values) {
            let Some(mapping) = self.mapping(vr) else {
                return self.out_of_range(function, vr);
            };
            check_status!(status, self.broadcast(mapping, |unit, cvr| set(unit, cvr, value)));
        }
        status
    }

    fn log_invalid(&self, function: &str, message: &str) -> Status {
        self.log(Status::Error, "logError", &format!("{function}: {message}"));
        Status::Error
    }

    /// Value reference `0` reads the simulation time
    pub fn get_real(&self, vrs: &[u32], values: &mut [f64]) -> Status {
        let time: fn(f64) -> f64 = |time| time;
        self.get_values("GetReal", vrs, values, Some(time), |unit, vr, value| {
            unit.get_real(&[vr], slice::from_mut(value))
        })
    }

    pub fn get_integer(&self, vrs: &[u32], values: &mut [i32]) -> Status {
        self.get_values("GetInteger", vrs, values, None, |unit, vr, value| {
            unit.get_integer(&[vr], slice::from_mut(value))
        })
    }

    pub fn get_boolean(&self, vrs: &[u32], values: &mut [bool]) -> Status {
        self.get_values("GetBoolean", vrs, values, None, |unit, vr, value| {
            unit.get_boolean(&[vr], slice::from_mut(value))
        })
    }

    pub fn get_string(&self, vrs: &[u32], values: &mut [String]) -> Status {
        self.get_values("GetString", vrs, values, None, |unit, vr, value| {
            unit.get_string(&[vr], slice::from_mut(value))
        })
    }

    /// Write `values` to every unit variable behind each value reference. Value references
    /// processed before a failure keep their new values.
    pub fn set_real(&self, vrs: &[u32], values: &[f64]) -> Status {
        self.set_values("SetReal", vrs, values, |unit, vr, value| {
            unit.set_real(&[vr], slice::from_ref(value))
        })
    }

    pub fn set_integer(&self, vrs: &[u32], values: &[i32]) -> Status {
        self.set_values("SetInteger", vrs, values, |unit, vr, value| {
            unit.set_integer(&[vr], slice::from_ref(value))
        })
    }

    pub fn set_boolean(&self, vrs: &[u32], values: &[bool]) -> Status {
        self.set_values("SetBoolean", vrs, values, |unit, vr, value| {
            unit.set_boolean(&[vr], slice::from_ref(value))
        })
    }

    pub fn set_string(&self, vrs: &[u32], values: &[&str]) -> Status {
        self.set_values("SetString", vrs, values, |unit, vr, value| {
            unit.set_string(&[vr], slice::from_ref(value))
        })
    }

    pub fn set_debug_logging(&mut self, logging_on: bool, categories: &[&str]) -> Status {
        let mut status = Status::OK;
        for component in &self.components {
            check_status!(
                status,
                component.with_unit(|unit| unit.set_debug_logging(logging_on, categories))
            );
        }
        status
    }

    pub fn enter_initialization_mode(
        &mut self,
        tolerance: Option<f64>,
        start_time: f64,
        stop_time: Option<f64>,
    ) -> Status {
        self.time = start_time;
        let mut status = Status::OK;
        for component in &self.components {
            check_status!(
                status,
                component.with_unit(|unit| {
                    unit.enter_initialization_mode(tolerance, start_time, stop_time)
                })
            );
        }
        status
    }

    pub fn exit_initialization_mode(&mut self) -> Status {
        let mut status = Status::OK;
        for component in &self.components {
            check_status!(
                status,
                component.with_unit(|unit| unit.exit_initialization_mode())
            );
        }
        status
    }

    /// Copy every connection's source value to its destination, in table order
    fn propagate(&self) -> Status {
        let mut status = Status::OK;
        for connection in &self.connections {
            let source = &self.components[connection.start_component];
            let destination = &self.components[connection.end_component];
            let (svr, dvr) = (
                [connection.start_value_reference],
                [connection.end_value_reference],
            );
            let result = match connection.kind {
                Kind::Real => {
                    let mut value = [0.0];
                    let read = source.with_unit(|unit| unit.get_real(&svr, &mut value));
                    check_status!(status, read);
                    destination.with_unit(|unit| unit.set_real(&dvr, &value))
                }
                Kind::Integer => {
                    let mut value = [0];
                    let read = source.with_unit(|unit| unit.get_integer(&svr, &mut value));
                    check_status!(status, read);
                    destination.with_unit(|unit| unit.set_integer(&dvr, &value))
                }
                Kind::Boolean => {
                    let mut value = [false];
                    let read = source.with_unit(|unit| unit.get_boolean(&svr, &mut value));
                    check_status!(status, read);
                    destination.with_unit(|unit| unit.set_boolean(&dvr, &value))
                }
                Kind::String => {
                    let mut value = [String::new()];
                    let read = source.with_unit(|unit| unit.get_string(&svr, &mut value));
                    check_status!(status, read);
                    destination.with_unit(|unit| unit.set_string(&dvr, &[value[0].as_str()]))
                }
            };
            check_status!(status, result);
        }
        status
    }

    fn step_sequential(&self, current: f64, step: f64, no_set_prior: bool) -> Status {
        let mut status = Status::OK;
        for component in &self.components {
            check_status!(status, component.do_step(current, step, no_set_prior));
        }
        status
    }

    fn step_parallel(&self, current: f64, step: f64, no_set_prior: bool) -> Status {
        for component in &self.components {
            component.request_step(current, step, no_set_prior);
        }
        self.components
            .iter()
            .map(|component| {
                let status = component.wait_step();
                if status.is_failure() {
                    log::error!("Component {} failed to step: {status}", component.name());
                }
                status
            })
            .fold(Status::OK, Status::max)
    }

    /// Propagate the connections, then advance every component from `current_communication_point`
    /// by `communication_step_size`.
    ///
    /// Sequential stepping stops at the first component that fails. Parallel stepping waits for
    /// every component and returns the worst status.
    pub fn do_step(
        &mut self,
        current_communication_point: f64,
        communication_step_size: f64,
        no_set_fmu_state_prior_to_current_point: bool,
    ) -> Status {
        let status = self.propagate();
        if status.is_failure() {
            return status;
        }

        let step_status = if self.parallel_do_step {
            self.step_parallel(
                current_communication_point,
                communication_step_size,
                no_set_fmu_state_prior_to_current_point,
            )
        } else {
            self.step_sequential(
                current_communication_point,
                communication_step_size,
                no_set_fmu_state_prior_to_current_point,
            )
        };

        let status = status.max(step_status);
        if !status.is_failure() {
            self.time = current_communication_point + communication_step_size;
        }
        status
    }

    /// Terminate the components in order and stop their workers
    pub fn terminate(&mut self) -> Status {
        let mut status = Status::OK;
        for component in &mut self.components {
            check_status!(status, component.with_unit(|unit| unit.terminate()));
            component.stop_worker();
        }
        status
    }

    /// Reset the time and the components. Workers stopped by [`terminate`](Self::terminate) are
    /// started again.
    pub fn reset(&mut self) -> Status {
        self.time = 0.0;
        let mut status = Status::OK;
        for component in &self.components {
            check_status!(status, component.with_unit(|unit| unit.reset()));
        }
        if self.parallel_do_step {
            if let Err(e) = self.spawn_workers() {
                self.log(Status::Error, "logError", &e.to_string());
                return Status::Error;
            }
        }
        status
    }
}

impl Drop for System {
    fn drop(&mut self) {
        log::trace!("Freeing {}", self.name);
        // Components go in reverse order of creation
        while let Some(component) = self.components.pop() {
            drop(component);
        }
    }
}
