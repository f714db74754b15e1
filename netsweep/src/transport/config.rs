//! SSH connection configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// Transport settings shared by every session in a run.
///
/// Per-device values (host, port, credentials) come from the
/// [`ConnectionProfile`](crate::classify::ConnectionProfile).
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Connect and authenticate timeout.
    pub timeout: Duration,

    /// How long to wait for the prompt after sending a command.
    pub command_timeout: Duration,

    /// Terminal width override for PTY; platform default when `None`.
    pub terminal_width: Option<u32>,

    /// Terminal height override for PTY; platform default when `None`.
    pub terminal_height: Option<u32>,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file; the user's default when `None`.
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            terminal_width: None,
            terminal_height: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

impl SshConfig {
    /// Set the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the host key verification mode.
    pub fn with_host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }
}
