//! Device type tags.

use std::fmt;
use std::str::FromStr;

use crate::error::PlatformError;

/// Which command dialect / vendor family a device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    /// IOS and IOS-XE routers and switches.
    #[default]
    CiscoIos,
    /// Nexus switches.
    CiscoNxos,
    /// AireOS wireless LAN controllers.
    CiscoWlc,
    /// ASA firewalls.
    CiscoAsa,
    /// Silver Peak SD-WAN appliances.
    SilverPeak,
    /// No rule matched.
    Unknown,
}

impl DeviceType {
    /// All concrete types, in registry order.
    pub const CONCRETE: [DeviceType; 5] = [
        DeviceType::CiscoIos,
        DeviceType::CiscoNxos,
        DeviceType::CiscoWlc,
        DeviceType::CiscoAsa,
        DeviceType::SilverPeak,
    ];

    /// The name used on the command line and in platform lookups.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::CiscoIos => "cisco_ios",
            DeviceType::CiscoNxos => "cisco_nxos",
            DeviceType::CiscoWlc => "cisco_wlc",
            DeviceType::CiscoAsa => "cisco_asa",
            DeviceType::SilverPeak => "silverpeak",
            DeviceType::Unknown => "unknown",
        }
    }

    /// Replace `Unknown` with the IOS default; transports need a concrete type.
    pub fn normalized(self) -> DeviceType {
        match self {
            DeviceType::Unknown => DeviceType::CiscoIos,
            other => other,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cisco_ios" | "cisco_xe" | "ios" => Ok(DeviceType::CiscoIos),
            "cisco_nxos" | "nxos" => Ok(DeviceType::CiscoNxos),
            "cisco_wlc" | "wlc" => Ok(DeviceType::CiscoWlc),
            "cisco_asa" | "asa" => Ok(DeviceType::CiscoAsa),
            "silverpeak" | "silverpeak_vxoa" => Ok(DeviceType::SilverPeak),
            "unknown" => Ok(DeviceType::Unknown),
            other => Err(PlatformError::UnknownPlatform {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("cisco_ios".parse::<DeviceType>().unwrap(), DeviceType::CiscoIos);
        assert_eq!("CISCO_NXOS".parse::<DeviceType>().unwrap(), DeviceType::CiscoNxos);
        assert_eq!(" cisco_wlc ".parse::<DeviceType>().unwrap(), DeviceType::CiscoWlc);
        assert_eq!("silverpeak".parse::<DeviceType>().unwrap(), DeviceType::SilverPeak);
        assert!("juniper_junos".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_display_round_trips_for_concrete_types() {
        for device_type in DeviceType::CONCRETE {
            let parsed: DeviceType = device_type.to_string().parse().unwrap();
            assert_eq!(parsed, device_type);
        }
    }

    #[test]
    fn test_unknown_normalizes_to_ios() {
        assert_eq!(DeviceType::Unknown.normalized(), DeviceType::CiscoIos);
        assert_eq!(DeviceType::CiscoAsa.normalized(), DeviceType::CiscoAsa);
    }
}
