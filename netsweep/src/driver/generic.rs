//! SSH-backed driver that works with any registered platform.

use std::time::{Duration, Instant};

use log::{debug, info};
use regex::bytes::Regex;
use secrecy::ExposeSecret;

use super::response::Response;
use super::{Connector, Driver};
use crate::channel::PtyChannel;
use crate::classify::ConnectionProfile;
use crate::credentials::CredentialSet;
use crate::error::{DriverError, Result};
use crate::platform::{DeviceType, LoginAnswer, PlatformDefinition, PlatformRegistry};
use crate::transport::{Login, SshConfig, SshTransport};

/// Bytes from the end of the buffer searched for a prompt.
const SEARCH_DEPTH: usize = 1000;

/// Interactive shell session driven by prompt matching.
///
/// Opening the driver connects, answers any interactive login prompts,
/// escalates to privileged mode when the device lands at an unprivileged
/// prompt, and disables paging. Each [`send_command`](Driver::send_command)
/// then writes one line and reads until the prompt returns.
pub struct GenericDriver {
    device: String,
    device_type: DeviceType,
    platform: PlatformDefinition,

    /// SSH transport (None once closed).
    transport: Option<SshTransport>,
    channel: PtyChannel,

    login_timeout: Duration,
    command_timeout: Duration,
    prompt: String,
}

impl GenericDriver {
    /// Connect to the profile's device and bring the shell to a privileged prompt.
    pub async fn open(profile: &ConnectionProfile, config: &SshConfig) -> Result<Self> {
        let device_type = profile.device_type.normalized();
        let platform = PlatformRegistry::lookup(device_type)?;
        let credentials = &profile.credentials;

        let login = Login {
            username: credentials.username(),
            password: credentials.password(),
            none_first: !platform.login_prompts.is_empty(),
        };
        let transport = SshTransport::connect(&profile.device, profile.port, login, config).await?;

        let width = config.terminal_width.unwrap_or(platform.terminal_width);
        let height = config.terminal_height.unwrap_or(platform.terminal_height);
        let channel = transport.open_channel(width, height).await?;

        let mut driver = Self {
            device: profile.device.clone(),
            device_type,
            platform,
            transport: Some(transport),
            channel: PtyChannel::new(channel, SEARCH_DEPTH),
            login_timeout: config.timeout,
            command_timeout: config.command_timeout,
            prompt: String::new(),
        };

        driver.login(credentials).await?;
        driver.escalate(credentials).await?;

        for command in driver.platform.on_open_commands.clone() {
            driver.send_command(&command).await?;
        }

        info!("{}: session open as {}", driver.device, driver.platform.name);
        Ok(driver)
    }

    /// Answer the platform's login prompts, then wait for the first CLI prompt.
    async fn login(&mut self, credentials: &CredentialSet) -> Result<()> {
        let timeout = self.login_timeout;

        for step in self.platform.login_prompts.clone() {
            let (index, data) = self
                .channel
                .read_until_any(&[&step.pattern, &self.platform.prompt], timeout)
                .await?;

            if index == 1 {
                self.prompt = last_line(&data);
                debug!("{}: prompt reached before login prompts were exhausted", self.device);
                return Ok(());
            }

            match step.answer {
                LoginAnswer::Username => self.channel.send_line(credentials.username()).await?,
                LoginAnswer::Password => {
                    self.channel
                        .send_line(credentials.password().expose_secret())
                        .await?
                }
            }
        }

        // A login prompt showing up again means the answers were rejected.
        let mut patterns: Vec<&Regex> = vec![&self.platform.prompt];
        patterns.extend(self.platform.login_prompts.iter().map(|p| &p.pattern));

        let (index, data) = self.channel.read_until_any(&patterns, timeout).await?;
        if index != 0 {
            return Err(DriverError::LoginFailed {
                message: format!("{} repeated its login prompt", self.device),
            }
            .into());
        }

        self.prompt = last_line(&data);
        debug!("{}: initial prompt {:?}", self.device, self.prompt);
        Ok(())
    }

    /// Enter privileged mode with the enable secret when sitting at an unprivileged prompt.
    async fn escalate(&mut self, credentials: &CredentialSet) -> Result<()> {
        if !self.platform.is_unprivileged(&self.prompt) {
            return Ok(());
        }
        let (Some(command), Some(auth_prompt)) = (
            self.platform.escalate_command.clone(),
            self.platform.escalate_auth_prompt.clone(),
        ) else {
            return Ok(());
        };

        debug!("{}: escalating with '{}'", self.device, command);
        self.channel.send_line(&command).await?;

        let (index, data) = self
            .channel
            .read_until_any(&[&auth_prompt, &self.platform.prompt], self.login_timeout)
            .await?;

        let data = if index == 0 {
            self.channel
                .send_line(credentials.enable_secret().expose_secret())
                .await?;
            self.channel
                .read_until(&self.platform.prompt, self.login_timeout)
                .await?
        } else {
            data
        };

        self.prompt = last_line(&data);
        if self.platform.is_unprivileged(&self.prompt) {
            return Err(DriverError::PrivilegeAcquisitionFailed {
                device: self.device.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Platform definition the session was opened with.
    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    /// Most recently matched prompt.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

impl Driver for GenericDriver {
    async fn send_command(&mut self, command: &str) -> Result<Response> {
        if self.transport.is_none() {
            return Err(DriverError::NotConnected.into());
        }

        let start = Instant::now();
        self.channel.send_line(command).await?;
        let data = self
            .channel
            .read_until(&self.platform.prompt, self.command_timeout)
            .await?;
        let elapsed = start.elapsed();

        let raw_result = String::from_utf8_lossy(&data).into_owned();
        self.prompt = last_line(&data);
        let result = self.platform.normalize_output(&raw_result, command);
        debug!(
            "{}: '{}' returned {} bytes in {:?}",
            self.device,
            command,
            result.len(),
            elapsed
        );

        let failure = self.platform.detect_failure(&result).map(str::to_string);
        let response = Response::new(command, result, raw_result, self.prompt.clone(), elapsed);
        Ok(match failure {
            Some(marker) => response.with_failure(marker),
            None => response,
        })
    }

    fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn is_alive(&self) -> bool {
        self.transport.as_ref().is_some_and(SshTransport::is_alive)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
            debug!("{}: session closed", self.device);
        }
        Ok(())
    }
}

/// Opens [`GenericDriver`] sessions with one shared [`SshConfig`].
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

impl Connector for SshConnector {
    type Driver = GenericDriver;

    async fn connect(&self, profile: &ConnectionProfile) -> Result<GenericDriver> {
        GenericDriver::open(profile, &self.config).await
    }
}

/// Last non-empty line of a read, trimmed.
fn last_line(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_line() {
        assert_eq!(last_line(b"Cisco IOS\r\nsw1>"), "sw1>");
        assert_eq!(last_line(b"banner\r\n\r\nsw1# \r\n"), "sw1#");
        assert_eq!(last_line(b""), "");
    }

    #[test]
    fn test_connector_keeps_config() {
        let config = SshConfig::default().with_timeout(Duration::from_secs(5));
        let connector = SshConnector::new(config);
        assert_eq!(connector.config().timeout, Duration::from_secs(5));
    }
}
