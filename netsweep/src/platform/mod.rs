//! Platform definitions for multi-vendor support.
//!
//! This module defines the device type tags and, per tag, the prompt
//! patterns, paging commands, and failure markers the SSH driver uses.

mod definition;
mod device_type;
mod registry;
pub mod vendors;

pub use definition::{LoginAnswer, LoginPrompt, PlatformDefinition};
pub use device_type::DeviceType;
pub use registry::PlatformRegistry;
