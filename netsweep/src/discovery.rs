//! One-hop CDP neighbor discovery.
//!
//! A single session to the seed device asks for its hostname, its inventory
//! and its CDP neighbors. Switch-class neighbors are kept, deduplicated by
//! name, and the seed itself is added so the key set doubles as a device
//! list for a later bulk run.

use indexmap::IndexMap;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::classify::ConnectionProfile;
use crate::driver::{Connector, Driver};
use crate::error::{DiscoveryError, Result};
use crate::parse::{Record, field};

pub const HOSTNAME_QUERY: &str = "show run | inc hostname";
pub const INVENTORY_QUERY: &str = "show inventory";
pub const NEIGHBOR_QUERY: &str = "show cdp neighbors detail";

/// Matches switch-class hardware (`WS-C3850`, `C9300`).
static SWITCH_PLATFORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".+(WS-)?C\d{4}").expect("switch platform pattern"));

/// One adjacency kept in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborRecord {
    #[serde(rename = "fqdn")]
    pub neighbor_name: String,
    #[serde(rename = "mgmt_ip")]
    pub management_address: String,
    pub platform: String,
}

/// Seed plus its switch-class neighbors, keyed by name.
#[derive(Debug, Clone)]
pub struct DiscoveryInventory {
    pub seed: String,
    pub hostname: String,
    pub entries: IndexMap<String, NeighborRecord>,
}

impl DiscoveryInventory {
    /// The key set, in insertion order.
    pub fn device_list(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Second token of the first non-blank line, or the seed when there is none.
pub fn parse_hostname(output: &str, seed: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or(seed)
        .to_string()
}

pub fn is_switch_class(platform: &str) -> bool {
    SWITCH_PLATFORM.is_match(platform)
}

/// Platform from the first inventory record: PID, else description.
pub fn inventory_platform(records: &[Record]) -> Option<String> {
    let first = records.first()?;
    let platform = field(first, "pid")
        .filter(|pid| !pid.is_empty())
        .or_else(|| field(first, "descr"))
        .unwrap_or_default();
    Some(platform.to_string())
}

/// Filter, deduplicate (last seen wins) and add the seed.
pub fn build_inventory(
    seed: &str,
    hostname: &str,
    seed_platform: &str,
    neighbors: &[Record],
) -> DiscoveryInventory {
    let mut entries = IndexMap::new();

    for record in neighbors {
        let platform = field(record, "platform").unwrap_or_default();
        let Some(name) = field(record, "neighbor_name").filter(|n| !n.is_empty()) else {
            continue;
        };
        if !is_switch_class(platform) {
            debug!("Skipping {} ({})", name, platform);
            continue;
        }

        let neighbor = NeighborRecord {
            neighbor_name: name.to_string(),
            management_address: field(record, "mgmt_address").unwrap_or_default().to_string(),
            platform: platform.to_string(),
        };
        if let Some(previous) = entries.insert(name.to_string(), neighbor) {
            debug!("{} seen again; replacing {}", name, previous.management_address);
        }
    }

    entries.insert(
        seed.to_string(),
        NeighborRecord {
            neighbor_name: seed.to_string(),
            management_address: seed.to_string(),
            platform: seed_platform.to_string(),
        },
    );

    DiscoveryInventory {
        seed: seed.to_string(),
        hostname: hostname.to_string(),
        entries,
    }
}

/// Runs discovery sessions.
#[derive(Debug)]
pub struct NeighborDiscovery<C> {
    connector: C,
}

impl<C: Connector> NeighborDiscovery<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Query the seed and build its inventory. Any failure aborts the run.
    pub async fn discover(&self, seed: &ConnectionProfile) -> Result<DiscoveryInventory> {
        let device = seed.device.as_str();
        let mut driver = self.connector.connect(seed).await.map_err(|e| {
            DiscoveryError::Connect {
                device: device.to_string(),
                source: Box::new(e),
            }
        })?;

        let inventory = query_seed(&mut driver, device).await;

        if let Err(e) = driver.close().await {
            debug!("{}: ignoring close error: {}", device, e);
        }

        let inventory = inventory?;
        info!(
            "{} ({}): {} devices in inventory",
            inventory.hostname,
            device,
            inventory.len()
        );
        Ok(inventory)
    }
}

async fn query_seed<D: Driver>(driver: &mut D, device: &str) -> Result<DiscoveryInventory> {
    let response = driver.send_command(HOSTNAME_QUERY).await?;
    let hostname = parse_hostname(&response.result, device);
    debug!("{}: hostname {}", device, hostname);

    let parsed = driver.send_command_parsed(INVENTORY_QUERY).await?;
    let records = parsed.records.ok_or_else(|| DiscoveryError::Unparsed {
        device: device.to_string(),
        command: INVENTORY_QUERY.to_string(),
    })?;
    let seed_platform = inventory_platform(&records).ok_or_else(|| DiscoveryError::NoResponse {
        device: device.to_string(),
        command: INVENTORY_QUERY.to_string(),
    })?;

    let parsed = driver.send_command_parsed(NEIGHBOR_QUERY).await?;
    if parsed.response.result.contains("not enabled") {
        warn!("{}: CDP is not enabled", device);
        return Err(DiscoveryError::DiscoveryDisabled {
            device: device.to_string(),
        }
        .into());
    }
    let neighbors = parsed.records.ok_or_else(|| DiscoveryError::Unparsed {
        device: device.to_string(),
        command: NEIGHBOR_QUERY.to_string(),
    })?;

    Ok(build_inventory(device, &hostname, &seed_platform, &neighbors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::platform::DeviceType;
    use crate::testing::{ConnectFault, MockConnector, MockDevice, init_logging, profile};

    const SEED: &str = "10.1.10.66";

    const INVENTORY: &str = "\
NAME: \"1\", DESCR: \"WS-C3850-24T\"
PID: WS-C3850-24T      , VID: V05  , SN: FOC0000X1AA
";

    const NEIGHBORS: &str = "\
-------------------------
Device ID: idf1-as01.example.net
Entry address(es):
  IP address: 10.1.20.11
Platform: cisco WS-C2960X-48FPD-L,  Capabilities: Switch IGMP
Interface: GigabitEthernet1/0/1,  Port ID (outgoing port): GigabitEthernet1/0/49

-------------------------
Device ID: SEP0011AABBCCDD
Entry address(es):
  IP address: 10.1.30.40
Platform: Cisco IP Phone 8845,  Capabilities: Host Phone
Interface: GigabitEthernet1/0/9,  Port ID (outgoing port): Port 1

-------------------------
Device ID: idf1-as01.example.net
Entry address(es):
  IP address: 10.1.20.12
Platform: cisco WS-C2960X-48FPD-L,  Capabilities: Switch IGMP
Interface: GigabitEthernet1/0/2,  Port ID (outgoing port): GigabitEthernet1/0/50
";

    fn record(name: &str, address: &str, platform: &str) -> Record {
        Record::from([
            ("NEIGHBOR_NAME".to_string(), name.to_string()),
            ("MGMT_ADDRESS".to_string(), address.to_string()),
            ("PLATFORM".to_string(), platform.to_string()),
        ])
    }

    fn seed_device() -> MockDevice {
        MockDevice::ok()
            .with_response(HOSTNAME_QUERY, "hostname CORE1")
            .with_response(INVENTORY_QUERY, INVENTORY)
            .with_response(NEIGHBOR_QUERY, NEIGHBORS)
    }

    #[test]
    fn test_parse_hostname() {
        assert_eq!(parse_hostname("hostname CORE1\n", SEED), "CORE1");
        assert_eq!(parse_hostname("\nhostname dist-01\nx", SEED), "dist-01");
        assert_eq!(parse_hostname("", SEED), SEED);
        assert_eq!(parse_hostname("hostname", SEED), SEED);
    }

    #[test]
    fn test_switch_filter() {
        assert!(is_switch_class("cisco WS-C3850-48P"));
        assert!(is_switch_class("cisco C9300-48U"));
        assert!(!is_switch_class("Cisco IP Phone 7945"));
        assert!(!is_switch_class("AIR-AP2802I-B-K9"));
    }

    #[test]
    fn test_dedup_last_seen_wins() {
        let inventory = build_inventory(
            SEED,
            "CORE1",
            "WS-C3850-24T",
            &[
                record("sw1", "10.0.0.1", "cisco WS-C3850-48P"),
                record("sw1", "10.0.0.2", "cisco WS-C3850-48P"),
            ],
        );

        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.entries["sw1"].management_address, "10.0.0.2");
    }

    #[test]
    fn test_phone_never_in_inventory() {
        let inventory = build_inventory(
            SEED,
            "CORE1",
            "WS-C3850-24T",
            &[record("SEP0011", "10.1.30.40", "Cisco IP Phone 8845")],
        );
        assert_eq!(inventory.device_list(), [SEED]);
    }

    #[test]
    fn test_seed_entry() {
        let inventory = build_inventory(SEED, "CORE1", "WS-C3850-24T", &[]);
        let seed = &inventory.entries[SEED];
        assert_eq!(seed.neighbor_name, SEED);
        assert_eq!(seed.management_address, SEED);
        assert_eq!(seed.platform, "WS-C3850-24T");
    }

    #[test]
    fn test_inventory_platform_falls_back_to_descr() {
        let records = vec![Record::from([
            ("PID".to_string(), String::new()),
            ("DESCR".to_string(), "Cisco ISR4331 Chassis".to_string()),
        ])];
        assert_eq!(
            inventory_platform(&records).as_deref(),
            Some("Cisco ISR4331 Chassis")
        );
        assert_eq!(inventory_platform(&[]), None);
    }

    #[test]
    fn test_serialized_keys() {
        let record = NeighborRecord {
            neighbor_name: "sw1".to_string(),
            management_address: "10.0.0.1".to_string(),
            platform: "cisco WS-C3850-48P".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fqdn"], "sw1");
        assert_eq!(json["mgmt_ip"], "10.0.0.1");
        assert_eq!(json["platform"], "cisco WS-C3850-48P");
    }

    #[tokio::test]
    async fn test_discover_from_core_seed() {
        init_logging();
        let connector = MockConnector::new().with_device(SEED, seed_device());
        let discovery = NeighborDiscovery::new(connector);

        let inventory = discovery.discover(&profile(SEED)).await.unwrap();

        assert_eq!(inventory.hostname, "CORE1");
        assert_eq!(inventory.device_list(), ["idf1-as01.example.net", SEED]);
        assert_eq!(
            inventory.entries["idf1-as01.example.net"].management_address,
            "10.1.20.12"
        );
        assert_eq!(inventory.entries[SEED].platform, "WS-C3850-24T");

        let sent: Vec<String> = discovery
            .connector()
            .sent()
            .into_iter()
            .map(|(_, command)| command)
            .collect();
        assert_eq!(sent, [HOSTNAME_QUERY, INVENTORY_QUERY, NEIGHBOR_QUERY]);
    }

    #[tokio::test]
    async fn test_cdp_disabled_aborts() {
        let connector = MockConnector::new().with_device(
            SEED,
            seed_device().with_response(NEIGHBOR_QUERY, "% CDP is not enabled"),
        );

        let err = NeighborDiscovery::new(connector)
            .discover(&profile(SEED))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Discovery(DiscoveryError::DiscoveryDisabled { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_inventory_aborts() {
        let connector = MockConnector::new()
            .with_device(SEED, seed_device().with_response(INVENTORY_QUERY, ""));

        let err = NeighborDiscovery::new(connector)
            .discover(&profile(SEED))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Discovery(DiscoveryError::NoResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_unindexed_platform_is_unparsed() {
        let connector = MockConnector::new().with_device(SEED, seed_device());
        let mut seed = profile(SEED);
        seed.device_type = DeviceType::CiscoWlc;

        let err = NeighborDiscovery::new(connector)
            .discover(&seed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Discovery(DiscoveryError::Unparsed { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_seed_aborts() {
        let connector = MockConnector::new()
            .with_device(SEED, MockDevice::unreachable(ConnectFault::AuthRejected));

        let err = NeighborDiscovery::new(connector)
            .discover(&profile(SEED))
            .await
            .unwrap_err();
        let Error::Discovery(DiscoveryError::Connect { source, .. }) = err else {
            panic!("expected connect error");
        };
        assert!(source.is_auth_rejected());
    }
}
