//! Error types for netsweep.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netsweep operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform definition errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Credential resolution errors
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Command catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Neighbor discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Structured output parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Artifact and device list I/O errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key is not in known_hosts and verification is strict
    #[error("Unknown host key for {host}:{port}")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts file could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Channel layer errors (prompt matching, shell I/O).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern matching timed out
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),
}

/// Driver layer errors (session lifecycle, command execution).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Driver not connected
    #[error("Driver not connected")]
    NotConnected,

    /// Interactive login sequence did not complete
    #[error("Interactive login failed: {message}")]
    LoginFailed { message: String },

    /// Enable escalation did not reach a privileged prompt
    #[error("Failed to acquire privileged mode on '{device}'")]
    PrivilegeAcquisitionFailed { device: String },
}

/// Platform definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// No definition registered under this name
    #[error("Unknown platform: {name}")]
    UnknownPlatform { name: String },

    /// A definition with this name already exists
    #[error("Platform already registered: {name}")]
    AlreadyRegistered { name: String },

    /// Invalid platform definition
    #[error("Invalid platform definition: {message}")]
    InvalidDefinition { message: String },
}

/// Credential resolution errors.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Required credential material is absent
    #[error("Missing credential: {field}")]
    MissingCredential { field: &'static str },

    /// Reading from the terminal failed
    #[error("Failed to read {field} from terminal: {source}")]
    Prompt {
        field: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Command catalog errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A catalog key that must exist is missing
    #[error("Unknown catalog key: {key}")]
    UnknownCatalogKey { key: String },

    /// Catalog file could not be read
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Catalog document is not valid YAML of the expected shape
    #[error("Invalid catalog document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Neighbor discovery errors. All of these abort the discovery run.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Seed device reports CDP is not enabled
    #[error("CDP is not enabled on {device}")]
    DiscoveryDisabled { device: String },

    /// Seed device returned nothing for a required query
    #[error("No response from {device} for '{command}'")]
    NoResponse { device: String, command: String },

    /// Output had no usable template or could not be parsed into records
    #[error("Unparsed output from {device} for '{command}'")]
    Unparsed { device: String, command: String },

    /// Session to the seed device could not be established
    #[error("Cannot connect to seed device {device}: {source}")]
    Connect {
        device: String,
        #[source]
        source: Box<Error>,
    },
}

/// Structured output parsing errors.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Template failed to compile or parse the output
    #[error("Template '{template}' failed: {message}")]
    Template { template: String, message: String },
}

/// Artifact and device list I/O errors.
#[derive(Error, Debug)]
pub enum OutputError {
    /// Filesystem operation failed
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON encode/decode failed
    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Whether this error means the peer rejected our credentials.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::AuthenticationFailed { .. })
                | Error::Driver(DriverError::LoginFailed { .. })
        )
    }

    /// Whether this error is a timeout at any layer.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::Timeout(_))
                | Error::Channel(ChannelError::PatternTimeout(_))
        )
    }
}

/// Result type alias using netsweep's Error.
pub type Result<T> = std::result::Result<T, Error>;
