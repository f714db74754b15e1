//! Command catalog and planner.
//!
//! The catalog is a YAML document mapping catalog keys to ordered command
//! lists. The planner picks one list per device type, or a single explicit
//! command when the operator supplies one.

use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

use crate::error::{CatalogError, Result};
use crate::platform::DeviceType;

/// Key used when no device-specific list applies.
pub const GENERAL_KEY: &str = "general_show_commands";

const BUILTIN: &str = include_str!("../catalog/show_cmds.yml");

/// Ordered commands for one device. Never reordered or deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBatch {
    commands: Vec<String>,
}

impl CommandBatch {
    pub fn new(commands: Vec<String>) -> Self {
        Self { commands }
    }

    pub fn single(command: impl Into<String>) -> Self {
        Self {
            commands: vec![command.into()],
        }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(String::as_str)
    }
}

#[derive(Deserialize)]
#[serde(transparent)]
struct RawCatalog(IndexMap<String, Option<Vec<Option<String>>>>);

/// Catalog keys to command lists, in document order.
#[derive(Debug, Clone, Default)]
pub struct CommandCatalog {
    entries: IndexMap<String, Vec<String>>,
}

impl CommandCatalog {
    /// Parse a catalog document. Blank commands are dropped.
    pub fn from_yaml_str(document: &str) -> Result<Self> {
        let raw: RawCatalog = serde_yaml::from_str(document).map_err(CatalogError::Parse)?;

        let entries = raw
            .0
            .into_iter()
            .map(|(key, commands)| {
                let commands = commands
                    .unwrap_or_default()
                    .into_iter()
                    .flatten()
                    .map(|command| command.trim().to_string())
                    .filter(|command| !command.is_empty())
                    .collect();
                (key, commands)
            })
            .collect();

        Ok(Self { entries })
    }

    /// Read and parse a catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded command catalog from {}", path.display());
        Self::from_yaml_str(&document)
    }

    /// The catalog bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN)
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Catalog key for a device type.
pub fn catalog_key(device_type: DeviceType) -> &'static str {
    match device_type.normalized() {
        DeviceType::CiscoIos => "ios_show_commands",
        DeviceType::CiscoNxos => "nxos_show_commands",
        DeviceType::CiscoWlc => "wlc_show_commands",
        _ => GENERAL_KEY,
    }
}

/// Chooses the command batch for a device.
#[derive(Debug, Clone)]
pub struct CommandPlanner {
    catalog: CommandCatalog,
}

impl CommandPlanner {
    pub fn new(catalog: CommandCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    /// An explicit command always wins; otherwise the device type's list,
    /// falling back to the general list when the specific key is missing.
    pub fn plan(&self, device_type: DeviceType, explicit: Option<&str>) -> Result<CommandBatch> {
        if let Some(command) = explicit.map(str::trim).filter(|c| !c.is_empty()) {
            return Ok(CommandBatch::single(command));
        }

        let key = catalog_key(device_type);
        if let Some(commands) = self.catalog.get(key) {
            return Ok(CommandBatch::new(commands.to_vec()));
        }

        debug!("Catalog has no '{}'; using '{}'", key, GENERAL_KEY);
        self.catalog
            .get(GENERAL_KEY)
            .map(|commands| CommandBatch::new(commands.to_vec()))
            .ok_or_else(|| {
                CatalogError::UnknownCatalogKey {
                    key: GENERAL_KEY.to_string(),
                }
                .into()
            })
    }
}
