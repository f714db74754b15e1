//! # netsweep
//!
//! Bulk show-command collection and CDP seed discovery for fleets of
//! network devices reachable over SSH.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with prompt-anchored reads
//! - Device classification from naming conventions and address ranges
//! - Per-device command batches from a YAML catalog
//! - Sequential or bounded-concurrency bulk runs with per-device failure isolation
//! - One-hop CDP discovery that seeds a device list
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netsweep::{
//!     AuthMode, BulkRunner, CommandCatalog, CommandPlanner, CredentialConfig,
//!     CredentialResolver, DeviceClassifier, DeviceJob, ResultWriter, RunOptions,
//!     SshConfig, SshConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netsweep::Error> {
//!     let book = CredentialResolver::new(CredentialConfig::from_env())
//!         .resolve_book(&AuthMode::Environment)?;
//!     let classifier = DeviceClassifier::new();
//!     let planner = CommandPlanner::new(CommandCatalog::builtin()?);
//!
//!     let mut jobs = Vec::new();
//!     for device in ["bldg1-as01", "10.1.10.1"] {
//!         let profile = classifier.profile(device, None, &book);
//!         let batch = planner.plan(profile.device_type, None)?;
//!         jobs.push(DeviceJob::new(profile, batch));
//!     }
//!
//!     let runner = BulkRunner::new(SshConnector::new(SshConfig::default()), RunOptions::default());
//!     let report = runner.run(jobs).await;
//!
//!     let writer = ResultWriter::new("local");
//!     for result in &report.results {
//!         writer.write_result(result)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod channel;
pub mod classify;
pub mod credentials;
pub mod devices;
pub mod discovery;
pub mod driver;
pub mod engine;
pub mod error;
pub mod output;
pub mod parse;
pub mod platform;
pub mod runner;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use catalog::{CommandBatch, CommandCatalog, CommandPlanner};
pub use classify::{Classification, ConnectionProfile, CredentialSlot, DeviceClassifier};
pub use credentials::{AuthMode, CredentialBook, CredentialConfig, CredentialResolver, CredentialSet};
pub use devices::DeviceList;
pub use discovery::{DiscoveryInventory, NeighborDiscovery, NeighborRecord};
pub use driver::{Connector, Driver, GenericDriver, Response, SshConnector};
pub use engine::{
    ConnectFailureKind, DeviceJob, ExecutionEngine, ExecutionResult, Outcome, ParsedCommand,
};
pub use error::{Error, Result};
pub use output::ResultWriter;
pub use platform::{DeviceType, PlatformDefinition};
pub use runner::{BulkRunner, CancelHandle, EmptyOutputPolicy, RunOptions, RunReport};
pub use transport::{HostKeyVerification, SshConfig};
