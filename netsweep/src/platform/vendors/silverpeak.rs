//! Silver Peak VXOA platform definition.
//!
//! Appliances land in exec mode (`>`) and use `enable` to reach `#`.

use crate::platform::PlatformDefinition;

/// Create the Silver Peak platform definition.
pub fn platform() -> PlatformDefinition {
    PlatformDefinition::new("silverpeak", r"(?m)^[\w.\-@()/: ]{1,63}\s?[>#]\s?$")
        .unwrap()
        .with_escalation(r"(?m)^[\w.\-@()/: ]{1,63}\s?>\s?$", "enable", r"(?mi)^password:\s?$")
        .unwrap()
        .with_failure_pattern("% Unrecognized command")
        .with_failure_pattern("% Incomplete command")
        .with_on_open_command("no cli session paging enable")
}
