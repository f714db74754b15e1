//! Global platform registry for looking up platform definitions.

use std::collections::HashMap;
use std::sync::RwLock;

use log::warn;
use once_cell::sync::Lazy;

use super::definition::PlatformDefinition;
use super::device_type::DeviceType;
use super::vendors;
use crate::error::{PlatformError, Result};

/// Global platform registry.
static REGISTRY: Lazy<RwLock<PlatformRegistry>> = Lazy::new(|| {
    let mut registry = PlatformRegistry::new();
    registry.register_builtin_platforms();
    RwLock::new(registry)
});

/// Registry for platform definitions, keyed by platform name.
#[derive(Debug, Default)]
pub struct PlatformRegistry {
    platforms: HashMap<String, PlatformDefinition>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            platforms: HashMap::new(),
        }
    }

    /// Get the global registry.
    pub fn global() -> &'static RwLock<PlatformRegistry> {
        &REGISTRY
    }

    /// Clone the definition for a device type out of the global registry.
    pub fn lookup(device_type: DeviceType) -> Result<PlatformDefinition> {
        let name = device_type.normalized().as_str();
        Self::global()
            .read()
            .map_err(|_| PlatformError::InvalidDefinition {
                message: "Failed to acquire registry lock".to_string(),
            })?
            .get(name)
            .cloned()
            .ok_or_else(|| {
                PlatformError::UnknownPlatform {
                    name: name.to_string(),
                }
                .into()
            })
    }

    fn register_builtin_platforms(&mut self) {
        for platform in [
            vendors::cisco::ios(),
            vendors::cisco::nxos(),
            vendors::cisco::wlc(),
            vendors::cisco::asa(),
            vendors::silverpeak::platform(),
        ] {
            if let Err(e) = self.register(platform) {
                warn!("Skipping built-in platform: {}", e);
            }
        }
    }

    /// Register a platform definition.
    pub fn register(&mut self, platform: PlatformDefinition) -> Result<()> {
        if self.platforms.contains_key(&platform.name) {
            return Err(PlatformError::AlreadyRegistered {
                name: platform.name.clone(),
            }
            .into());
        }
        self.platforms.insert(platform.name.clone(), platform);
        Ok(())
    }

    /// Get a platform by name.
    pub fn get(&self, name: &str) -> Option<&PlatformDefinition> {
        self.platforms.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_cover_every_concrete_type() {
        for device_type in DeviceType::CONCRETE {
            let platform = PlatformRegistry::lookup(device_type).unwrap();
            assert_eq!(platform.name, device_type.as_str());
        }
    }

    #[test]
    fn test_unknown_resolves_to_ios() {
        let platform = PlatformRegistry::lookup(DeviceType::Unknown).unwrap();
        assert_eq!(platform.name, "cisco_ios");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = PlatformRegistry::new();
        registry.register(vendors::cisco::ios()).unwrap();
        let err = registry.register(vendors::cisco::ios()).unwrap_err();
        assert!(err.to_string().contains("cisco_ios"));
        assert!(registry.get("cisco_ios").is_some());
        assert!(registry.get("cisco_nxos").is_none());
    }
}
