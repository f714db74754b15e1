//! Device classification.
//!
//! An identifier (hostname, FQDN or IP literal) is mapped to a device type
//! and credential slot by two explicit tables: exact-address overrides,
//! consulted first, then an ordered rule table where the first match wins.

use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnetwork::Ipv4Network;
use log::debug;
use once_cell::sync::Lazy;
use regex::RegexBuilder;

use crate::credentials::{CredentialBook, CredentialSet};
use crate::platform::DeviceType;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Which credential set a device logs in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialSlot {
    #[default]
    Primary,
    ReadOnly,
}

enum Matcher {
    Name(regex::Regex),
    Networks(Vec<Ipv4Network>),
}

impl Matcher {
    fn matches(&self, identifier: &str) -> bool {
        match self {
            Matcher::Name(pattern) => pattern.is_match(identifier),
            Matcher::Networks(networks) => identifier
                .parse::<Ipv4Addr>()
                .is_ok_and(|address| networks.iter().any(|net| net.contains(address))),
        }
    }
}

struct Rule {
    name: &'static str,
    matcher: Matcher,
    device_type: DeviceType,
}

struct Override {
    address: &'static str,
    device_type: DeviceType,
    slot: CredentialSlot,
}

const PRIVATE_NETWORKS: &[&str] = &["10.0.0.0/8", "1.1.1.0/24"];

const OVERRIDES: &[Override] = &[Override {
    address: "10.1.10.109",
    device_type: DeviceType::CiscoWlc,
    slot: CredentialSlot::ReadOnly,
}];

static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let named = [
        ("core-device", r"(ar|as|ds|cs)\d\d", DeviceType::CiscoIos),
        ("server-role", r"-srv\d\d", DeviceType::CiscoNxos),
        ("sd-wan", r"-sp\d\d", DeviceType::SilverPeak),
        ("wireless-controller", r"-wlc\d\d", DeviceType::CiscoWlc),
    ];

    let mut rules: Vec<Rule> = named
        .into_iter()
        .map(|(name, pattern, device_type)| Rule {
            name,
            matcher: Matcher::Name(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("classification pattern"),
            ),
            device_type,
        })
        .collect();

    let networks = PRIVATE_NETWORKS
        .iter()
        .map(|cidr| cidr.parse::<Ipv4Network>().expect("private network"))
        .collect();
    rules.push(Rule {
        name: "private-address",
        matcher: Matcher::Networks(networks),
        device_type: DeviceType::CiscoIos,
    });
    rules
});

/// Outcome of classifying one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub device_type: DeviceType,
    pub port: u16,
    pub slot: CredentialSlot,
    /// Name of the rule or override that matched; `"default"` when none did.
    pub rule: &'static str,
}

/// Everything needed to open a session to one device.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub device: String,
    pub device_type: DeviceType,
    pub port: u16,
    pub credentials: Arc<CredentialSet>,
}

/// Maps identifiers to connection profiles.
#[derive(Debug, Clone, Copy)]
pub struct DeviceClassifier {
    port: u16,
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceClassifier {
    pub fn new() -> Self {
        Self { port: DEFAULT_PORT }
    }

    /// Use `port` for every device instead of 22.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Classify an identifier. Pure: the same input always yields the same output.
    pub fn classify(&self, identifier: &str) -> Classification {
        let identifier = identifier.trim();

        if let Some(entry) = OVERRIDES.iter().find(|o| o.address == identifier) {
            return Classification {
                device_type: entry.device_type,
                port: self.port,
                slot: entry.slot,
                rule: "static-override",
            };
        }

        match RULES.iter().find(|rule| rule.matcher.matches(identifier)) {
            Some(rule) => Classification {
                device_type: rule.device_type,
                port: self.port,
                slot: CredentialSlot::Primary,
                rule: rule.name,
            },
            None => Classification {
                device_type: DeviceType::Unknown,
                port: self.port,
                slot: CredentialSlot::Primary,
                rule: "default",
            },
        }
    }

    /// Build the connection profile for `identifier`.
    ///
    /// An explicit `forced_type` replaces only the tag; credentials stay primary.
    pub fn profile(
        &self,
        identifier: &str,
        forced_type: Option<DeviceType>,
        book: &CredentialBook,
    ) -> ConnectionProfile {
        let device = identifier.trim().to_string();

        let (device_type, credentials) = match forced_type {
            Some(device_type) => (device_type, book.primary()),
            None => {
                let classification = self.classify(&device);
                debug!(
                    "{} classified as {} by {}",
                    device, classification.device_type, classification.rule
                );
                let credentials = match classification.slot {
                    CredentialSlot::Primary => book.primary(),
                    CredentialSlot::ReadOnly => book.read_only(),
                };
                (classification.device_type, credentials)
            }
        };

        ConnectionProfile {
            device,
            device_type: device_type.normalized(),
            port: self.port,
            credentials,
        }
    }
}
