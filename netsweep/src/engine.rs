//! Per-device command execution.
//!
//! One session per device: connect, run each command of the batch in order,
//! close. A command that fails is noted inline and the batch continues; only
//! a failed connection ends a device early. There are no retries here.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::catalog::CommandBatch;
use crate::classify::ConnectionProfile;
use crate::driver::{Connector, Driver};
use crate::error::Error;
use crate::parse::{self, Record};

/// Prefix of the header line written before each command's output.
pub const COMMAND_MARKER: &str = "!---";

/// One unit of bulk work.
#[derive(Debug, Clone)]
pub struct DeviceJob {
    pub profile: ConnectionProfile,
    pub batch: CommandBatch,
    /// Also run each command's output through the template index.
    pub parse: bool,
}

impl DeviceJob {
    pub fn new(profile: ConnectionProfile, batch: CommandBatch) -> Self {
        Self {
            profile,
            batch,
            parse: false,
        }
    }

    pub fn with_parsing(mut self, parse: bool) -> Self {
        self.parse = parse;
        self
    }

    pub fn device(&self) -> &str {
        &self.profile.device
    }
}

/// Session lifecycle of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Disconnected,
    Connecting,
    Connected,
    Running(usize),
    Done,
    Failed,
}

/// Why a device could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailureKind {
    Timeout,
    AuthRejected,
    Other,
}

impl From<&Error> for ConnectFailureKind {
    fn from(err: &Error) -> Self {
        if err.is_timeout() {
            ConnectFailureKind::Timeout
        } else if err.is_auth_rejected() {
            ConnectFailureKind::AuthRejected
        } else {
            ConnectFailureKind::Other
        }
    }
}

impl fmt::Display for ConnectFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectFailureKind::Timeout => "timeout",
            ConnectFailureKind::AuthRejected => "authentication rejected",
            ConnectFailureKind::Other => "connection error",
        })
    }
}

/// What happened on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every command ran; concatenated output.
    Success(String),
    /// Connected, but some commands failed; partial output with inline notes.
    CommandFailure {
        output: String,
        failed_commands: Vec<String>,
    },
    /// The session never opened.
    ConnectionFailure {
        kind: ConnectFailureKind,
        message: String,
    },
}

impl Outcome {
    /// Collected text, if the device was reached.
    pub fn output(&self) -> Option<&str> {
        match self {
            Outcome::Success(output) | Outcome::CommandFailure { output, .. } => Some(output),
            Outcome::ConnectionFailure { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "ok",
            Outcome::CommandFailure { .. } => "partial",
            Outcome::ConnectionFailure { .. } => "unreachable",
        }
    }
}

/// Structured rows for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: String,
    pub records: Vec<Record>,
}

/// Result for one attempted device. Created once, never mutated.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub device: String,
    pub outcome: Outcome,
    /// A session was opened.
    pub connected: bool,
    /// Every command came back blank.
    pub empty_output: bool,
    /// Commands a template applied to, in batch order.
    pub parsed: Vec<ParsedCommand>,
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// Result for a device whose session never opened.
    pub fn connection_failure(
        device: impl Into<String>,
        kind: ConnectFailureKind,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            device: device.into(),
            outcome: Outcome::ConnectionFailure {
                kind,
                message: message.into(),
            },
            connected: false,
            empty_output: true,
            parsed: Vec::new(),
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn is_connection_failure(&self) -> bool {
        !self.connected
    }
}

/// Runs command batches over sessions from a [`Connector`].
#[derive(Debug)]
pub struct ExecutionEngine<C> {
    connector: C,
}

impl<C: Connector> ExecutionEngine<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run one device's batch to completion.
    pub async fn run(&self, job: &DeviceJob) -> ExecutionResult {
        let device = job.device();
        let start = Instant::now();
        let mut state = DeviceState::Disconnected;

        advance(device, &mut state, DeviceState::Connecting);
        let mut driver = match self.connector.connect(&job.profile).await {
            Ok(driver) => driver,
            Err(e) => {
                advance(device, &mut state, DeviceState::Failed);
                let kind = ConnectFailureKind::from(&e);
                warn!("{}: cannot connect ({}): {}", device, kind, e);
                return ExecutionResult::connection_failure(
                    device,
                    kind,
                    e.to_string(),
                    start.elapsed(),
                );
            }
        };
        advance(device, &mut state, DeviceState::Connected);

        let mut output = String::new();
        let mut failed_commands = Vec::new();
        let mut empty_output = true;
        let mut parsed = Vec::new();

        for (index, command) in job.batch.iter().enumerate() {
            advance(device, &mut state, DeviceState::Running(index));

            match driver.send_command(command).await {
                Ok(response) => {
                    if !response.is_empty() {
                        empty_output = false;
                    }
                    if let Some(marker) = &response.failure_message {
                        warn!("{}: '{}' rejected ({})", device, command, marker);
                        failed_commands.push(command.to_string());
                    }
                    if job.parse && response.failure_message.is_none() {
                        match parse::parse_output(driver.device_type(), command, &response.result)
                        {
                            Ok(Some(records)) => parsed.push(ParsedCommand {
                                command: command.to_string(),
                                records,
                            }),
                            Ok(None) => debug!("{}: no template for '{}'", device, command),
                            Err(e) => warn!("{}: cannot parse '{}': {}", device, command, e),
                        }
                    }
                    push_block(&mut output, command, &response.result);
                }
                Err(e) => {
                    warn!("{}: '{}' failed: {}", device, command, e);
                    failed_commands.push(command.to_string());
                    push_block(&mut output, command, &format!("% command failed: {e}"));
                }
            }
        }

        if let Err(e) = driver.close().await {
            debug!("{}: ignoring close error: {}", device, e);
        }
        advance(device, &mut state, DeviceState::Done);

        let outcome = if failed_commands.is_empty() {
            Outcome::Success(output)
        } else {
            Outcome::CommandFailure {
                output,
                failed_commands,
            }
        };
        info!(
            "{}: {} ({} commands{})",
            device,
            outcome.label(),
            job.batch.len(),
            if empty_output { ", no output" } else { "" }
        );

        ExecutionResult {
            device: device.to_string(),
            outcome,
            connected: true,
            empty_output,
            parsed,
            elapsed: start.elapsed(),
        }
    }
}

fn advance(device: &str, state: &mut DeviceState, next: DeviceState) {
    debug!("{}: {:?} -> {:?}", device, state, next);
    *state = next;
}

/// Append `"\n!--- <command>\n<output>"`.
fn push_block(buffer: &mut String, command: &str, output: &str) {
    buffer.push('\n');
    buffer.push_str(COMMAND_MARKER);
    buffer.push(' ');
    buffer.push_str(command);
    buffer.push('\n');
    buffer.push_str(output);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ConnectFault, MockConnector, MockDevice, profile};

    fn job(device: &str, commands: &[&str]) -> DeviceJob {
        DeviceJob::new(
            profile(device),
            CommandBatch::new(commands.iter().map(|c| c.to_string()).collect()),
        )
    }

    #[tokio::test]
    async fn test_success_concatenates_blocks_in_order() {
        let connector = MockConnector::new().with_device(
            "sw1",
            MockDevice::ok()
                .with_response("show version", "Cisco IOS XE 17.9")
                .with_response("show clock", "10:00:00 UTC"),
        );
        let engine = ExecutionEngine::new(connector);

        let result = engine.run(&job("sw1", &["show version", "show clock"])).await;

        assert!(result.connected);
        assert!(!result.empty_output);
        assert_eq!(
            result.outcome,
            Outcome::Success(
                "\n!--- show version\nCisco IOS XE 17.9\n!--- show clock\n10:00:00 UTC".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_failed_command_is_noted_and_batch_continues() {
        let connector = MockConnector::new().with_device(
            "sw1",
            MockDevice::ok()
                .with_broken("show tech")
                .with_rejected("show bogus"),
        );
        let engine = ExecutionEngine::new(connector);

        let result = engine
            .run(&job("sw1", &["show tech", "show bogus", "show clock"]))
            .await;

        let Outcome::CommandFailure {
            output,
            failed_commands,
        } = &result.outcome
        else {
            panic!("expected command failure, got {:?}", result.outcome);
        };
        assert_eq!(failed_commands, &["show tech", "show bogus"]);
        assert!(output.contains("!--- show tech\n% command failed"));
        assert!(output.contains("% Invalid input"));
        assert!(output.ends_with("!--- show clock\noutput of show clock"));
        assert_eq!(
            engine.connector().sent().len(),
            3,
            "every command is attempted"
        );
    }

    #[tokio::test]
    async fn test_parsing_keeps_templated_commands() {
        let inventory = "NAME: \"1\", DESCR: \"WS-C3850-24T\"\nPID: WS-C3850-24T      , VID: V02  , SN: FOC0000X1YZ\n";
        let connector = MockConnector::new().with_device(
            "sw1",
            MockDevice::ok()
                .with_response("show clock", "10:00:00 UTC")
                .with_response("show inventory", inventory),
        );
        let engine = ExecutionEngine::new(connector);

        let plain = engine.run(&job("sw1", &["show clock", "show inventory"])).await;
        assert!(plain.parsed.is_empty());

        let result = engine
            .run(&job("sw1", &["show clock", "show inventory"]).with_parsing(true))
            .await;

        assert!(result.is_success());
        assert_eq!(result.parsed.len(), 1);
        assert_eq!(result.parsed[0].command, "show inventory");
        assert_eq!(
            parse::field(&result.parsed[0].records[0], "pid"),
            Some("WS-C3850-24T")
        );
        assert!(result.outcome.output().unwrap().contains("!--- show clock"));
    }

    #[tokio::test]
    async fn test_connection_failure_kinds() {
        let connector = MockConnector::new()
            .with_device("slow", MockDevice::unreachable(ConnectFault::Timeout))
            .with_device("locked", MockDevice::unreachable(ConnectFault::AuthRejected));
        let engine = ExecutionEngine::new(connector);

        for (device, expected) in [
            ("slow", ConnectFailureKind::Timeout),
            ("locked", ConnectFailureKind::AuthRejected),
            ("absent", ConnectFailureKind::Other),
        ] {
            let result = engine.run(&job(device, &["show version"])).await;
            assert!(!result.connected);
            assert!(result.is_connection_failure());
            assert!(
                matches!(result.outcome, Outcome::ConnectionFailure { kind, .. } if kind == expected),
                "{device}: {:?}",
                result.outcome
            );
        }
    }

    #[tokio::test]
    async fn test_empty_output_is_tracked_separately() {
        let connector = MockConnector::new().with_device("sw1", MockDevice::silent());
        let engine = ExecutionEngine::new(connector);

        let result = engine.run(&job("sw1", &["show version", "show clock"])).await;

        assert!(result.connected);
        assert!(result.empty_output);
        assert!(result.is_success());
    }

    #[test]
    fn test_outcome_output() {
        let failure = Outcome::ConnectionFailure {
            kind: ConnectFailureKind::Other,
            message: "refused".to_string(),
        };
        assert_eq!(failure.output(), None);
        assert_eq!(Outcome::Success("x".to_string()).output(), Some("x"));
    }
}
