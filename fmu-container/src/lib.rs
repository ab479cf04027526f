//! An FMU Container composes several FMI co-simulation units into one system and exposes it
//! through the same ABI the units implement.
//!
//! The composition is described by `config.mp` in the container's resource directory: the
//! components, the connections stepped between them and the variables the container exposes.
//! Value reference `0` of the container is the simulation time; the exposed variables follow
//! from `1` in configuration order.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fmi_unit::{FmiVersion, Status};
//! use fmu_container::System;
//!
//! let logger = Arc::new(|status: Status, category: &str, message: &str| {
//!     println!("{status} [{category}] {message}");
//! });
//! let mut system = System::instantiate(
//!     FmiVersion::V2,
//!     "file:///tmp/container/resources/",
//!     "container",
//!     logger,
//!     false,
//!     false,
//! )
//! .unwrap();
//! system.enter_initialization_mode(None, 0.0, None);
//! system.exit_initialization_mode();
//! system.do_step(0.0, 0.1, true);
//! ```
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
#![deny(clippy::all)]

mod component;
pub mod config;
#[cfg(feature = "export")]
pub mod export;
pub mod loader;
mod system;

use std::path::PathBuf;

use fmi_unit::Status;

pub use component::Component;
pub use config::Config;
pub use loader::{LibraryLoader, UnitLoader, UnitRequest};
pub use system::{Connection, Logger, System, VariableMapping};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Error decoding configuration: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Error parsing configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error spawning worker for component {name}: {source}")]
    Worker {
        name: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Unit(#[from] fmi_unit::Error),

    #[error("Error instantiating component {name}: {source}")]
    Component {
        name: String,
        source: fmi_unit::Error,
    },

    #[error("Failed to set the start value of variable {index}: {status}")]
    StartValue { index: usize, status: Status },
}
