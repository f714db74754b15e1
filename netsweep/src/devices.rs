//! Device list input.
//!
//! Identifiers come from a single value, a pasted block, and any number of
//! files. Text files hold one identifier per line; `.json` files hold an
//! array of strings, the format discovery writes.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{OutputError, Result};

/// Ordered, trimmed device identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceList {
    devices: Vec<String>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one identifier.
    pub fn push(&mut self, device: &str) {
        let device = device.trim();
        if !device.is_empty() {
            self.devices.push(device.to_string());
        }
    }

    /// Add one identifier per line.
    pub fn extend_from_block(&mut self, block: &str) {
        for line in block.lines() {
            self.push(line);
        }
    }

    /// Add the identifiers in a text or JSON file.
    pub fn extend_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| OutputError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let before = self.devices.len();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            let devices: Vec<String> =
                serde_json::from_str(&contents).map_err(|source| OutputError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
            for device in &devices {
                self.push(device);
            }
        } else {
            self.extend_from_block(&contents);
        }

        debug!(
            "Read {} devices from {}",
            self.devices.len() - before,
            path.display()
        );
        Ok(())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl IntoIterator for DeviceList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}
