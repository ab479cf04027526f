#![doc=include_str!( "../README.md")]
#![deny(clippy::all)]

pub mod fmi1;
pub mod fmi2;
pub mod fmi3;
pub mod logger;
