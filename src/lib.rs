//! The `fmi-unit` crate loads FMI simulation units (shared libraries following the FMI 1.0, 2.0 or
//! 3.0 standard), binds their entry points and drives them through typed wrappers that record the
//! lifecycle state, the simulation time and a formatted trace of every call.
//!
//! See <http://www.fmi-standard.org/>
//!
//! ## Examples
//!
//! ```rust,no_run
//! use fmi_unit::{CS, UnitHandle, fmi2::Instance, traits::CoSimulationUnit};
//!
//! let unit = UnitHandle::new("inst1", "BouncingBall/binaries/linux64/BouncingBall.so", None, None)
//!     .unwrap();
//! let mut instance = Instance::<CS>::instantiate(
//!     unit,
//!     "{1AE5E10D-9521-4DE3-80B9-D0EAAA7D5AF1}",
//!     "file:///tmp/BouncingBall/resources/",
//!     false,
//!     false,
//! )
//! .unwrap();
//! CoSimulationUnit::enter_initialization_mode(&mut instance, None, 0.0, None);
//! instance.exit_initialization_mode();
//! instance.do_step(0.0, 0.1, true);
//! ```
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
#![deny(clippy::all)]

mod binding;
#[cfg(feature = "fmi1")]
pub mod fmi1;
#[cfg(feature = "fmi2")]
pub mod fmi2;
#[cfg(feature = "fmi3")]
pub mod fmi3;
pub mod format;
pub mod platform;
mod status;
pub mod traits;
pub mod unit;

pub use status::Status;
pub use unit::{LogCallFn, LogMessageFn, State, UnitHandle};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error instantiating {0}")]
    Instantiation(String),

    #[error("Symbol {name} is missing in shared library")]
    MissingSymbol {
        name: String,
        source: libloading::Error,
    },

    #[error("Function {0} is not available in shared library")]
    Unavailable(&'static str),

    #[error("Unsupported platform {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Interface type {0:?} is not supported by FMI {1}")]
    UnsupportedInterface(InterfaceType, FmiVersion),

    #[error("Invalid file URI: {0}")]
    InvalidUri(String),

    #[error(transparent)]
    LibLoading {
        #[from]
        source: libloading::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Nul(#[from] std::ffi::NulError),

    #[error(transparent)]
    Utf8Error(#[from] std::str::Utf8Error),
}

/// Major version of the FMI standard a unit implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FmiVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
}

impl FmiVersion {
    pub fn from_major(major: u32) -> Option<Self> {
        match major {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }
}

impl std::fmt::Display for FmiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.0", *self as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    ModelExchange,
    CoSimulation,
    ScheduledExecution,
}

/// Tag for Model Exchange
pub struct ME;

impl traits::InstanceTag for ME {
    const TYPE: InterfaceType = InterfaceType::ModelExchange;
}

/// Tag for Co-Simulation
pub struct CS;

impl traits::InstanceTag for CS {
    const TYPE: InterfaceType = InterfaceType::CoSimulation;
}

/// Tag for Scheduled Execution
pub struct SE;

impl traits::InstanceTag for SE {
    const TYPE: InterfaceType = InterfaceType::ScheduledExecution;
}
