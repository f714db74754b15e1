//! Scripted sessions for engine, runner and discovery tests.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::classify::ConnectionProfile;
use crate::credentials::{CredentialBook, CredentialSet};
use crate::driver::{Connector, Driver, Response};
use crate::error::{ChannelError, Error, Result, TransportError};
use crate::platform::DeviceType;

/// Route log output through the test harness; `RUST_LOG=debug` shows state transitions.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn book() -> CredentialBook {
    CredentialBook::new(CredentialSet::new("netops", "s3cret", None).unwrap())
}

pub(crate) fn profile(device: &str) -> ConnectionProfile {
    ConnectionProfile {
        device: device.to_string(),
        device_type: DeviceType::CiscoIos,
        port: 22,
        credentials: book().primary(),
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnectFault {
    Timeout,
    AuthRejected,
    Refused,
}

impl ConnectFault {
    fn to_error(self, device: &str) -> Error {
        match self {
            ConnectFault::Timeout => TransportError::Timeout(Duration::from_secs(30)).into(),
            ConnectFault::AuthRejected => TransportError::AuthenticationFailed {
                user: "netops".to_string(),
            }
            .into(),
            ConnectFault::Refused => TransportError::ConnectionFailed {
                host: device.to_string(),
                port: 22,
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            }
            .into(),
        }
    }
}

/// How one scripted device behaves.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockDevice {
    responses: HashMap<String, String>,
    rejected: Vec<String>,
    broken: Vec<String>,
    silent: bool,
    panics: bool,
    fault: Option<ConnectFault>,
    connect_delay: Duration,
    command_delay: Duration,
}

impl MockDevice {
    /// Answers every command with `output of <command>`.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn unreachable(fault: ConnectFault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::default()
        }
    }

    /// Connecting panics the calling task.
    pub fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }

    /// Answers every command with nothing.
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    pub fn with_response(mut self, command: &str, output: &str) -> Self {
        self.responses.insert(command.to_string(), output.to_string());
        self
    }

    /// Device answers with an error marker.
    pub fn with_rejected(mut self, command: &str) -> Self {
        self.rejected.push(command.to_string());
        self
    }

    /// Channel times out waiting for the prompt.
    pub fn with_broken(mut self, command: &str) -> Self {
        self.broken.push(command.to_string());
        self
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn with_command_delay(mut self, delay: Duration) -> Self {
        self.command_delay = delay;
        self
    }
}

/// Connector over a table of scripted devices; unknown devices refuse.
#[derive(Debug, Default)]
pub(crate) struct MockConnector {
    devices: HashMap<String, MockDevice>,
    attempts: Mutex<Vec<String>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: &str, behavior: MockDevice) -> Self {
        self.devices.insert(device.to_string(), behavior);
        self
    }

    /// Devices a connection was attempted to, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Highest number of sessions open at once.
    pub fn peak_sessions(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// `(device, command)` pairs in the order they were sent.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    type Driver = MockDriver;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<MockDriver> {
        self.attempts.lock().unwrap().push(profile.device.clone());

        let behavior = self
            .devices
            .get(&profile.device)
            .cloned()
            .unwrap_or_else(|| MockDevice::unreachable(ConnectFault::Refused));

        if !behavior.connect_delay.is_zero() {
            tokio::time::sleep(behavior.connect_delay).await;
        }
        if behavior.panics {
            panic!("scripted panic connecting to {}", profile.device);
        }
        if let Some(fault) = behavior.fault {
            return Err(fault.to_error(&profile.device));
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        Ok(MockDriver {
            device: profile.device.clone(),
            device_type: profile.device_type,
            behavior,
            active: self.active.clone(),
            sent: self.sent.clone(),
            open: true,
        })
    }
}

pub(crate) struct MockDriver {
    device: String,
    device_type: DeviceType,
    behavior: MockDevice,
    active: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
    open: bool,
}

impl Driver for MockDriver {
    async fn send_command(&mut self, command: &str) -> Result<Response> {
        self.sent
            .lock()
            .unwrap()
            .push((self.device.clone(), command.to_string()));

        if !self.behavior.command_delay.is_zero() {
            tokio::time::sleep(self.behavior.command_delay).await;
        }
        if self.behavior.broken.iter().any(|c| c == command) {
            return Err(ChannelError::PatternTimeout(Duration::from_secs(60)).into());
        }

        let prompt = format!("{}#", self.device);
        if self.behavior.rejected.iter().any(|c| c == command) {
            let output = "% Invalid input detected at '^' marker.";
            return Ok(
                Response::new(command, output, output, prompt, Duration::ZERO)
                    .with_failure("% Invalid input"),
            );
        }

        let output = match self.behavior.responses.get(command) {
            Some(output) => output.clone(),
            None if self.behavior.silent => String::new(),
            None => format!("output of {command}"),
        };
        Ok(Response::new(command, output.clone(), output, prompt, Duration::ZERO))
    }

    fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn is_alive(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockDriver {
    fn drop(&mut self) {
        if self.open {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
