//! Artifact writing.
//!
//! Per-device output lands in `{device}_{YYYY-MM-DD_HH-MM-SS}[_{note}].txt`
//! under the chosen directory; discovery writes a JSON key list, a JSON map
//! and a plain text list named after the seed's hostname.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use log::{debug, info};
use serde::Serialize;

use crate::discovery::DiscoveryInventory;
use crate::engine::ExecutionResult;
use crate::error::{OutputError, Result};
use crate::parse::Record;
use crate::runner::EmptyOutputPolicy;

/// Default output subdirectory.
pub const DEFAULT_DIR: &str = "local";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Trim, then collapse each whitespace run into one underscore.
pub fn replace_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join("_")
}

/// File name for one device's output.
pub fn artifact_name(device: &str, timestamp: NaiveDateTime, note: Option<&str>) -> String {
    let stamp = timestamp.format(TIMESTAMP_FORMAT);
    match note.map(replace_space).filter(|n| !n.is_empty()) {
        Some(note) => format!("{device}_{stamp}_{note}.txt"),
        None => format!("{device}_{stamp}.txt"),
    }
}

/// File name for one command's parsed rows: `{device}_{command}.json`.
pub fn parsed_name(device: &str, command: &str) -> String {
    format!("{device}_{}.json", replace_space(command))
}

/// Paths written for one discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryArtifacts {
    pub device_list: PathBuf,
    pub device_map: PathBuf,
    pub text_list: PathBuf,
}

/// Writes results and discovery artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    dir: PathBuf,
    note: Option<String>,
    policy: EmptyOutputPolicy,
}

impl ResultWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            note: None,
            policy: EmptyOutputPolicy::default(),
        }
    }

    /// Suffix added to every per-device file name.
    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn with_policy(mut self, policy: EmptyOutputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the output directory if it does not exist.
    pub fn ensure_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.dir).map_err(|source| OutputError::Io {
            path: self.dir.clone(),
            source,
        })?;
        Ok(&self.dir)
    }

    /// Write one device's output stamped with the current local time.
    pub fn write_result(&self, result: &ExecutionResult) -> Result<Option<PathBuf>> {
        self.write_result_at(result, Local::now().naive_local())
    }

    /// Write one device's output; `None` when there is nothing to keep.
    pub fn write_result_at(
        &self,
        result: &ExecutionResult,
        timestamp: NaiveDateTime,
    ) -> Result<Option<PathBuf>> {
        let Some(output) = result.outcome.output() else {
            return Ok(None);
        };
        if result.empty_output && self.policy == EmptyOutputPolicy::TreatAsFailure {
            debug!("{}: no output, nothing written", result.device);
            return Ok(None);
        }

        self.ensure_dir()?;
        let path = self
            .dir
            .join(artifact_name(&result.device, timestamp, self.note.as_deref()));
        write_text(&path, output)?;

        info!("{}: saved output to {}", result.device, path.display());
        Ok(Some(path))
    }

    /// Write one command's parsed rows as a JSON array; keys are sorted.
    pub fn write_parsed(&self, device: &str, command: &str, records: &[Record]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.dir.join(parsed_name(device, command));
        let rows: Vec<BTreeMap<&str, &str>> = records
            .iter()
            .map(|record| {
                record
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str()))
                    .collect()
            })
            .collect();
        write_json(&path, &rows)?;

        info!("{}: saved parsed '{}' to {}", device, command, path.display());
        Ok(path)
    }

    /// Write every parsed command of a result; connection failures have none.
    pub fn write_parsed_result(&self, result: &ExecutionResult) -> Result<Vec<PathBuf>> {
        result
            .parsed
            .iter()
            .map(|parsed| self.write_parsed(&result.device, &parsed.command, &parsed.records))
            .collect()
    }

    /// Write the three discovery artifacts.
    pub fn write_inventory(&self, inventory: &DiscoveryInventory) -> Result<DiscoveryArtifacts> {
        self.ensure_dir()?;
        let hostname = inventory.hostname.trim();
        let devices = inventory.device_list();

        let artifacts = DiscoveryArtifacts {
            device_list: self.dir.join(format!("{hostname}_auto_devlist.json")),
            device_map: self.dir.join(format!("{hostname}_auto_devdict.json")),
            text_list: self.dir.join(format!("{hostname}_devlist.txt")),
        };

        write_json(&artifacts.device_list, &devices)?;
        write_json(&artifacts.device_map, &inventory.entries)?;

        let text: String = devices.iter().map(|d| format!("{}\n", d.trim())).collect();
        write_text(&artifacts.text_list, &text)?;

        info!(
            "Saved {} devices to {}",
            devices.len(),
            artifacts.device_list.display()
        );
        Ok(artifacts)
    }
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| OutputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_text(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::build_inventory;
    use crate::engine::{ConnectFailureKind, Outcome, ParsedCommand};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 7))
            .unwrap()
    }

    fn result(device: &str, outcome: Outcome, empty_output: bool) -> ExecutionResult {
        ExecutionResult {
            device: device.to_string(),
            connected: !matches!(outcome, Outcome::ConnectionFailure { .. }),
            outcome,
            empty_output,
            parsed: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_replace_space() {
        assert_eq!(replace_space("pre deploy"), "pre_deploy");
        assert_eq!(replace_space("  change \t 42  "), "change_42");
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_name("sw1", stamp(), None),
            "sw1_2024-03-09_14-05-07.txt"
        );
        assert_eq!(
            artifact_name("sw1", stamp(), Some("pre deploy")),
            "sw1_2024-03-09_14-05-07_pre_deploy.txt"
        );
        assert_eq!(
            artifact_name("sw1", stamp(), Some("   ")),
            "sw1_2024-03-09_14-05-07.txt"
        );
    }

    #[test]
    fn test_write_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path().join("local").join("nested"))
            .with_note(Some("post change".to_string()));
        let output = "\n!--- show clock\n10:00:00 UTC";

        let path = writer
            .write_result_at(&result("sw1", Outcome::Success(output.to_string()), false), stamp())
            .unwrap()
            .unwrap();

        assert!(path.ends_with("sw1_2024-03-09_14-05-07_post_change.txt"));
        assert_eq!(fs::read_to_string(path).unwrap(), output);
    }

    #[test]
    fn test_partial_output_is_written() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path());
        let outcome = Outcome::CommandFailure {
            output: "\n!--- show bogus\n% Invalid input".to_string(),
            failed_commands: vec!["show bogus".to_string()],
        };

        let written = writer.write_result_at(&result("sw1", outcome, false), stamp()).unwrap();
        assert!(written.is_some());
    }

    #[test]
    fn test_connection_failure_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path().join("out"));
        let failure = ExecutionResult::connection_failure(
            "sw2",
            ConnectFailureKind::Timeout,
            "timed out",
            Duration::ZERO,
        );

        assert_eq!(writer.write_result_at(&failure, stamp()).unwrap(), None);
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_empty_output_follows_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = result("sw3", Outcome::Success("\n!--- show clock\n".to_string()), true);

        let dropping = ResultWriter::new(tmp.path());
        assert_eq!(dropping.write_result_at(&empty, stamp()).unwrap(), None);

        let keeping = ResultWriter::new(tmp.path()).with_policy(EmptyOutputPolicy::Keep);
        assert!(keeping.write_result_at(&empty, stamp()).unwrap().is_some());
    }

    #[test]
    fn test_parsed_name() {
        assert_eq!(
            parsed_name("10.1.10.1", "show cdp neighbors detail"),
            "10.1.10.1_show_cdp_neighbors_detail.json"
        );
    }

    #[test]
    fn test_write_parsed_records() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path().join("local"));
        let mut record = Record::new();
        record.insert("PID".to_string(), "WS-C3850-24T".to_string());
        record.insert("SN".to_string(), "FOC0000X1YZ".to_string());

        let path = writer.write_parsed("sw1", "show inventory", &[record]).unwrap();

        assert!(path.ends_with("sw1_show_inventory.json"));
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.find("\"PID\"").unwrap() < contents.find("\"SN\"").unwrap());
        let rows: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(rows[0]["PID"], "WS-C3850-24T");
        assert_eq!(rows[0]["SN"], "FOC0000X1YZ");
    }

    #[test]
    fn test_write_parsed_result() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path());
        let mut done = result("sw1", Outcome::Success("x".to_string()), false);
        done.parsed.push(ParsedCommand {
            command: "show inventory".to_string(),
            records: Vec::new(),
        });

        let paths = writer.write_parsed_result(&done).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "[]");

        let failure = ExecutionResult::connection_failure(
            "sw2",
            ConnectFailureKind::Other,
            "refused",
            Duration::ZERO,
        );
        assert!(writer.write_parsed_result(&failure).unwrap().is_empty());
    }

    #[test]
    fn test_discovery_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path().join("local"));
        let inventory = build_inventory("10.1.10.66", "CORE1", "WS-C3850-24T", &[]);

        let artifacts = writer.write_inventory(&inventory).unwrap();

        assert!(artifacts.device_list.ends_with("CORE1_auto_devlist.json"));
        assert!(artifacts.device_map.ends_with("CORE1_auto_devdict.json"));
        assert!(artifacts.text_list.ends_with("CORE1_devlist.txt"));

        let list: Vec<String> =
            serde_json::from_str(&fs::read_to_string(&artifacts.device_list).unwrap()).unwrap();
        assert_eq!(list, ["10.1.10.66"]);

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&artifacts.device_map).unwrap()).unwrap();
        assert_eq!(map["10.1.10.66"]["platform"], "WS-C3850-24T");

        assert_eq!(
            fs::read_to_string(&artifacts.text_list).unwrap(),
            "10.1.10.66\n"
        );
    }
}
