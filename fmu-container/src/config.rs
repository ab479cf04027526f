//! The composition read from `config.mp` (or `config.json`) in the container's resource directory.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use fmi_unit::FmiVersion;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::Error;

pub const CONFIG_FILE: &str = "config.mp";
pub const CONFIG_JSON_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Step the components on one worker thread each
    #[serde(default)]
    pub parallel_do_step: bool,
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    /// The variables exposed by the container, in value reference order starting at 1
    #[serde(default)]
    pub variables: Vec<VariableConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    pub name: String,
    pub guid: String,
    /// Name of the sub directory of the resources holding the extracted unit
    pub model_identifier: String,
    /// Major FMI version of the unit
    #[serde(default = "default_fmi_version")]
    pub fmi_version: u32,
}

fn default_fmi_version() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub start_component: usize,
    pub start_value_reference: u32,
    pub end_component: usize,
    pub end_value_reference: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableConfig {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub components: Vec<usize>,
    pub value_references: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<StartValue>,
}

/// Data kind of a connection or an exposed variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawKind")]
pub enum Kind {
    Real,
    Integer,
    Boolean,
    String,
}

/// Kinds are written either by name (or its first letter) or as the numeric type code of the
/// FMI 3.0 variable types
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKind {
    Code(u32),
    Name(String),
}

impl TryFrom<RawKind> for Kind {
    type Error = String;

    fn try_from(raw: RawKind) -> Result<Self, Self::Error> {
        match raw {
            RawKind::Code(2 | 3) => Ok(Kind::Real),
            RawKind::Code(8) => Ok(Kind::Integer),
            RawKind::Code(12) => Ok(Kind::Boolean),
            RawKind::Code(13) => Ok(Kind::String),
            RawKind::Code(code) => Err(format!("unsupported variable type code {code}")),
            RawKind::Name(name) => match name.as_str() {
                "R" | "Real" | "Float64" => Ok(Kind::Real),
                "I" | "Integer" | "Int32" | "Enumeration" => Ok(Kind::Integer),
                "B" | "Boolean" => Ok(Kind::Boolean),
                "S" | "String" => Ok(Kind::String),
                _ => Err(format!("unsupported variable type {name:?}")),
            },
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Kind::Real => "Real",
            Kind::Integer => "Integer",
            Kind::Boolean => "Boolean",
            Kind::String => "String",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartValue {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl StartValue {
    /// The start value as a Real, if the encoded type is compatible
    pub fn as_real(&self) -> Option<f64> {
        match *self {
            StartValue::Real(value) => Some(value),
            StartValue::Integer(value) => Some(value as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match *self {
            StartValue::Integer(value) => i32::try_from(value).ok(),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match *self {
            StartValue::Boolean(value) => Some(value),
            StartValue::Integer(value) => Some(value != 0),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            StartValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl ComponentConfig {
    pub fn version(&self) -> Result<FmiVersion, Error> {
        FmiVersion::from_major(self.fmi_version).ok_or_else(|| {
            Error::Config(format!(
                "component {:?} has unsupported fmiVersion {}",
                self.name, self.fmi_version
            ))
        })
    }
}

impl Config {
    /// Read `config.mp` from `resource_dir`, or `config.json` if there is none
    pub fn load(resource_dir: &Path) -> Result<Self, Error> {
        let path = resource_dir.join(CONFIG_FILE);
        let config = if path.is_file() {
            log::debug!("Reading configuration {path:?}");
            rmp_serde::from_slice(&read(&path)?)?
        } else {
            let json_path = resource_dir.join(CONFIG_JSON_FILE);
            if !json_path.is_file() {
                return Err(Error::Config(format!(
                    "neither {CONFIG_FILE} nor {CONFIG_JSON_FILE} found in {resource_dir:?}"
                )));
            }
            log::debug!("Reading configuration {json_path:?}");
            serde_json::from_slice(&read(&json_path)?)?
        };
        Self::validate(config)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, Error> {
        Self::validate(rmp_serde::from_slice(bytes)?)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, Error> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject compositions the system cannot be built from
    pub fn validate(self) -> Result<Self, Error> {
        let n = self.components.len();

        let duplicates = self
            .components
            .iter()
            .map(|c| c.name.as_str())
            .duplicates()
            .join(", ");
        if !duplicates.is_empty() {
            return Err(Error::Config(format!(
                "duplicate component names: {duplicates}"
            )));
        }

        for component in &self.components {
            component.version()?;
        }

        for (i, connection) in self.connections.iter().enumerate() {
            if connection.start_component >= n || connection.end_component >= n {
                return Err(Error::Config(format!(
                    "connection {i} refers to a component outside 0..{n}"
                )));
            }
        }

        for (i, variable) in self.variables.iter().enumerate() {
            if variable.components.is_empty() {
                return Err(Error::Config(format!("variable {i} has no components")));
            }
            if variable.components.len() != variable.value_references.len() {
                return Err(Error::Config(format!(
                    "variable {i} has {} components but {} value references",
                    variable.components.len(),
                    variable.value_references.len()
                )));
            }
            let invalid = variable
                .components
                .iter()
                .filter(|&&ci| ci >= n)
                .collect::<HashSet<_>>();
            if !invalid.is_empty() {
                return Err(Error::Config(format!(
                    "variable {i} refers to components {{{}}} outside 0..{n}",
                    invalid.iter().sorted().join(", ")
                )));
            }
        }

        Ok(self)
    }
}

fn read(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|source| Error::Io {
        path: PathBuf::from(path),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str) -> ComponentConfig {
        ComponentConfig {
            name: name.to_owned(),
            guid: "{guid}".to_owned(),
            model_identifier: name.to_owned(),
            fmi_version: 2,
        }
    }

    fn config() -> Config {
        Config {
            parallel_do_step: true,
            components: vec![component("a"), component("b")],
            connections: vec![ConnectionConfig {
                kind: Kind::Real,
                start_component: 0,
                start_value_reference: 1,
                end_component: 1,
                end_value_reference: 2,
            }],
            variables: vec![VariableConfig {
                kind: Kind::Real,
                components: vec![0, 1],
                value_references: vec![3, 4],
                start: Some(StartValue::Real(1.5)),
            }],
        }
    }

    #[test_log::test]
    fn test_msgpack() {
        let bytes = config().to_msgpack().unwrap();
        assert_eq!(Config::from_msgpack(&bytes).unwrap(), config());
    }

    #[test_log::test]
    fn test_json_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "components": [{"name": "a", "guid": "{1}", "modelIdentifier": "A"}],
                "variables": [
                    {"type": "R", "components": [0], "valueReferences": [1], "start": 2},
                    {"type": 12, "components": [0], "valueReferences": [2], "start": true},
                    {"type": "Int32", "components": [0], "valueReferences": [3]}
                ]
            }"#,
        )
        .unwrap();

        assert!(!config.parallel_do_step);
        assert!(config.connections.is_empty());
        assert_eq!(config.components[0].version().unwrap(), FmiVersion::V2);
        assert_eq!(config.variables[0].kind, Kind::Real);
        assert_eq!(config.variables[0].start.as_ref().unwrap().as_real(), Some(2.0));
        assert_eq!(config.variables[1].kind, Kind::Boolean);
        assert_eq!(config.variables[1].start, Some(StartValue::Boolean(true)));
        assert_eq!(config.variables[2].kind, Kind::Integer);
        assert_eq!(config.variables[2].start, None);
    }

    #[test_log::test]
    fn test_unknown_kind() {
        let result = serde_json::from_str::<Kind>(r#""Clock""#);
        assert!(result.is_err());
        assert!(serde_json::from_str::<Kind>("15").is_err());
        assert_eq!(serde_json::from_str::<Kind>(r#""S""#).unwrap(), Kind::String);
    }

    #[test_log::test]
    fn test_validate() {
        let mut c = config();
        c.components.push(component("a"));
        assert!(matches!(c.validate(), Err(Error::Config(msg)) if msg.contains("duplicate")));

        let mut c = config();
        c.connections[0].end_component = 2;
        assert!(matches!(c.validate(), Err(Error::Config(msg)) if msg.contains("connection 0")));

        let mut c = config();
        c.variables[0].value_references.pop();
        assert!(matches!(c.validate(), Err(Error::Config(msg)) if msg.contains("value references")));

        let mut c = config();
        c.variables[0].components.clear();
        c.variables[0].value_references.clear();
        assert!(matches!(c.validate(), Err(Error::Config(msg)) if msg.contains("no components")));

        let mut c = config();
        c.variables[0].components = vec![5, 0];
        assert!(matches!(c.validate(), Err(Error::Config(msg)) if msg.contains("{5}")));

        let mut c = config();
        c.components[1].fmi_version = 4;
        assert!(matches!(c.validate(), Err(Error::Config(msg)) if msg.contains("fmiVersion")));
    }

    #[test_log::test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));

        std::fs::write(dir.path().join(CONFIG_FILE), config().to_msgpack().unwrap()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), config());
    }
}
