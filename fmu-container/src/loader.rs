//! Creation of the container's units from their extracted directories.

use std::{path::Path, sync::Arc};

use fmi_unit::{
    CS, Error, FmiVersion, LogCallFn, LogMessageFn, UnitHandle, fmi1, fmi2, fmi3,
    platform::{path_to_uri, resolve_binary_path},
    traits::CoSimulationUnit,
};

/// Everything needed to create one co-simulation unit
pub struct UnitRequest<'a> {
    pub name: &'a str,
    pub guid: &'a str,
    pub model_identifier: &'a str,
    pub version: FmiVersion,
    /// The extracted unit, `<resources>/<modelIdentifier>/`
    pub unit_directory: &'a Path,
    pub visible: bool,
    pub logging_on: bool,
    pub log_message: Option<Arc<LogMessageFn>>,
    pub log_call: Option<Arc<LogCallFn>>,
}

impl std::fmt::Debug for UnitRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitRequest")
            .field("name", &self.name)
            .field("guid", &self.guid)
            .field("model_identifier", &self.model_identifier)
            .field("version", &self.version)
            .field("unit_directory", &self.unit_directory)
            .field("visible", &self.visible)
            .field("logging_on", &self.logging_on)
            .finish_non_exhaustive()
    }
}

/// Creates the units of a [`System`](crate::System)
pub trait UnitLoader: Send + Sync {
    /// Load the unit and instantiate it for co-simulation
    fn load(&self, request: UnitRequest<'_>) -> Result<Box<dyn CoSimulationUnit>, Error>;
}

/// Loads units from their shared libraries under `binaries/<platform>/`
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryLoader;

impl UnitLoader for LibraryLoader {
    fn load(&self, request: UnitRequest<'_>) -> Result<Box<dyn CoSimulationUnit>, Error> {
        let library_path = resolve_binary_path(
            request.unit_directory,
            request.model_identifier,
            request.version,
        )?;
        let unit = UnitHandle::new(
            request.name,
            &library_path,
            request.log_message,
            request.log_call,
        )?;
        let resources = request.unit_directory.join("resources");

        Ok(match request.version {
            FmiVersion::V1 => Box::new(fmi1::Instance::<CS>::instantiate(
                unit,
                request.model_identifier,
                request.guid,
                &path_to_uri(request.unit_directory),
                request.visible,
                request.logging_on,
            )?),
            FmiVersion::V2 => Box::new(fmi2::Instance::<CS>::instantiate(
                unit,
                request.guid,
                &path_to_uri(&resources),
                request.visible,
                request.logging_on,
            )?),
            FmiVersion::V3 => {
                let mut resource_path = resources.into_os_string();
                resource_path.push(std::path::MAIN_SEPARATOR_STR);
                Box::new(fmi3::Instance::<CS>::instantiate(
                    unit,
                    request.guid,
                    &resource_path.to_string_lossy(),
                    fmi3::InstantiateOptions {
                        visible: request.visible,
                        logging_on: request.logging_on,
                        ..Default::default()
                    },
                )?)
            }
        })
    }
}
