//! Credential resolution.
//!
//! A run resolves credentials once, from one of three authentication modes,
//! into an immutable [`CredentialSet`]. Configuration values are injected
//! through [`CredentialConfig`] so the resolver never reads the process
//! environment on its own.
//!
//! | Mode        | Username   | Password                 | Enable secret |
//! |-------------|------------|--------------------------|---------------|
//! | Environment | `NET_USR`  | `NET_PWD`                | `NET_PWD`     |
//! | Interactive | prompted   | prompted (no echo)       | prompted, else password |
//! | Mfa         | `INET_USR` | `INET_PWD` + one-time code | `INET_PWD`  |

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use secrecy::SecretString;

use crate::error::{CredentialError, Result};

/// Username, password and enable secret for one login.
pub struct CredentialSet {
    username: String,
    password: SecretString,
    enable_secret: SecretString,
}

impl CredentialSet {
    /// Build a credential set; an empty enable secret falls back to the password.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        enable_secret: Option<String>,
    ) -> std::result::Result<Self, CredentialError> {
        let username = username.into();
        let password = password.into();

        if username.trim().is_empty() {
            return Err(CredentialError::MissingCredential { field: "username" });
        }
        if password.is_empty() {
            return Err(CredentialError::MissingCredential { field: "password" });
        }

        let enable_secret = match enable_secret {
            Some(secret) if !secret.is_empty() => secret,
            _ => password.clone(),
        };

        Ok(Self {
            username: username.trim().to_string(),
            password: SecretString::from(password),
            enable_secret: SecretString::from(enable_secret),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn enable_secret(&self) -> &SecretString {
        &self.enable_secret
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("enable_secret", &"<redacted>")
            .finish()
    }
}

/// How the operator authenticates for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Credentials from pre-loaded configuration values.
    Environment,
    /// Credentials typed in by the operator.
    Interactive,
    /// Static password plus a one-time code.
    Mfa { code: String },
}

/// Credential material loaded from configuration.
#[derive(Default)]
pub struct CredentialConfig {
    values: HashMap<&'static str, String>,
}

impl CredentialConfig {
    pub const NET_USR: &'static str = "NET_USR";
    pub const NET_PWD: &'static str = "NET_PWD";
    pub const INET_USR: &'static str = "INET_USR";
    pub const INET_PWD: &'static str = "INET_PWD";
    pub const NET_RO_USR: &'static str = "NET_RO_USR";
    pub const NET_RO_PWD: &'static str = "NET_RO_PWD";

    const KEYS: [&'static str; 8] = [
        Self::NET_USR,
        Self::NET_PWD,
        Self::INET_USR,
        Self::INET_PWD,
        Self::NET_RO_USR,
        Self::NET_RO_PWD,
        "USER",
        "USERNAME",
    ];

    /// Read the known keys from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the known keys from the process environment, then fill the gaps
    /// from a `.env` file in the current directory or one of its parents.
    pub fn from_env_and_dotenv() -> Self {
        let config = Self::from_env();
        match dotenvy::dotenv_iter() {
            Ok(entries) => config.fill_from(entries),
            Err(e) if e.not_found() => config,
            Err(e) => {
                warn!("Ignoring .env file: {}", e);
                config
            }
        }
    }

    /// Fill keys that are unset or empty from the `.env` file at `path`.
    /// A missing file leaves the config unchanged.
    pub fn with_dotenv_file(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match dotenvy::from_path_iter(path) {
            Ok(entries) => {
                debug!("Reading credentials from {}", path.display());
                self.fill_from(entries)
            }
            Err(e) if e.not_found() => self,
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                self
            }
        }
    }

    fn fill_from(
        mut self,
        entries: impl Iterator<Item = dotenvy::Result<(String, String)>>,
    ) -> Self {
        for entry in entries {
            let (key, value) = match entry {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Skipping .env line: {}", e);
                    continue;
                }
            };
            if let Some(&known) = Self::KEYS.iter().find(|&&k| k == key) {
                let slot = self.values.entry(known).or_default();
                if slot.is_empty() {
                    *slot = value;
                }
            }
        }
        self
    }

    /// Read the known keys through an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let values = Self::KEYS
            .iter()
            .filter_map(|&key| lookup(key).map(|value| (key, value)))
            .collect();
        Self { values }
    }

    /// Value for `key`, treating empty as missing.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn require(&self, key: &'static str) -> std::result::Result<&str, CredentialError> {
        self.get(key)
            .ok_or(CredentialError::MissingCredential { field: key })
    }

    /// The operator's login name, used as the interactive default.
    pub fn login_name(&self) -> Option<&str> {
        self.get("USER").or_else(|| self.get("USERNAME"))
    }
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("CredentialConfig").field("keys", &keys).finish()
    }
}

/// Source of interactive answers.
pub trait Prompter: Send + Sync {
    /// Ask for a visible value; `default` is shown and used when the answer is empty.
    fn prompt_line(&self, label: &str, default: Option<&str>) -> io::Result<String>;

    /// Ask for a value without echoing it.
    fn prompt_secret(&self, label: &str) -> io::Result<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt_line(&self, label: &str, default: Option<&str>) -> io::Result<String> {
        let mut stderr = io::stderr();
        match default {
            Some(default) => write!(stderr, "{label} [{default}]: ")?,
            None => write!(stderr, "{label}: ")?,
        }
        stderr.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        let answer = answer.trim();

        Ok(match (answer.is_empty(), default) {
            (true, Some(default)) => default.to_string(),
            _ => answer.to_string(),
        })
    }

    fn prompt_secret(&self, label: &str) -> io::Result<String> {
        rpassword::prompt_password(format!("{label}: "))
    }
}

/// The credential sets a run may hand out.
#[derive(Debug, Clone)]
pub struct CredentialBook {
    primary: Arc<CredentialSet>,
    read_only: Option<Arc<CredentialSet>>,
}

impl CredentialBook {
    pub fn new(primary: CredentialSet) -> Self {
        Self {
            primary: Arc::new(primary),
            read_only: None,
        }
    }

    pub fn with_read_only(mut self, read_only: CredentialSet) -> Self {
        self.read_only = Some(Arc::new(read_only));
        self
    }

    pub fn primary(&self) -> Arc<CredentialSet> {
        self.primary.clone()
    }

    /// Read-only credentials, or the primary set when none are configured.
    pub fn read_only(&self) -> Arc<CredentialSet> {
        match &self.read_only {
            Some(read_only) => read_only.clone(),
            None => {
                warn!("No read-only credentials configured; using primary credentials");
                self.primary.clone()
            }
        }
    }
}

/// Turns an [`AuthMode`] into a [`CredentialSet`].
pub struct CredentialResolver {
    config: CredentialConfig,
    prompter: Box<dyn Prompter>,
}

impl CredentialResolver {
    /// Create a resolver that prompts on the terminal.
    pub fn new(config: CredentialConfig) -> Self {
        Self::with_prompter(config, Box::new(TerminalPrompter))
    }

    /// Create a resolver with a custom prompter.
    pub fn with_prompter(config: CredentialConfig, prompter: Box<dyn Prompter>) -> Self {
        Self { config, prompter }
    }

    /// Resolve the primary credential set for `mode`.
    pub fn resolve(&self, mode: &AuthMode) -> Result<CredentialSet> {
        let credentials = match mode {
            AuthMode::Environment => {
                let username = self.config.require(CredentialConfig::NET_USR)?;
                let password = self.config.require(CredentialConfig::NET_PWD)?;
                CredentialSet::new(username, password, None)?
            }
            AuthMode::Interactive => self.resolve_interactive()?,
            AuthMode::Mfa { code } => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(CredentialError::MissingCredential {
                        field: "one-time code",
                    }
                    .into());
                }
                let username = self.config.require(CredentialConfig::INET_USR)?;
                let static_password = self.config.require(CredentialConfig::INET_PWD)?;
                CredentialSet::new(
                    username,
                    format!("{static_password}{code}"),
                    Some(static_password.to_string()),
                )?
            }
        };

        debug!(
            "Resolved credentials for {} ({:?} mode)",
            credentials.username(),
            mode_name(mode)
        );
        Ok(credentials)
    }

    /// Resolve `mode` and attach read-only credentials when configured.
    pub fn resolve_book(&self, mode: &AuthMode) -> Result<CredentialBook> {
        let book = CredentialBook::new(self.resolve(mode)?);

        match (
            self.config.get(CredentialConfig::NET_RO_USR),
            self.config.get(CredentialConfig::NET_RO_PWD),
        ) {
            (Some(username), Some(password)) => {
                Ok(book.with_read_only(CredentialSet::new(username, password, None)?))
            }
            _ => Ok(book),
        }
    }

    fn resolve_interactive(&self) -> std::result::Result<CredentialSet, CredentialError> {
        let default_user = self.config.login_name();
        let username = self
            .prompter
            .prompt_line("Username", default_user)
            .map_err(|source| CredentialError::Prompt {
                field: "username",
                source,
            })?;

        let password = self
            .prompter
            .prompt_secret("Password")
            .map_err(|source| CredentialError::Prompt {
                field: "password",
                source,
            })?;

        let enable = self
            .prompter
            .prompt_secret("Enable")
            .map_err(|source| CredentialError::Prompt {
                field: "enable secret",
                source,
            })?;

        CredentialSet::new(username, password, Some(enable))
    }
}

fn mode_name(mode: &AuthMode) -> &'static str {
    match mode {
        AuthMode::Environment => "environment",
        AuthMode::Interactive => "interactive",
        AuthMode::Mfa { .. } => "mfa",
    }
}

/// Expose a secret for comparison in tests without leaking it elsewhere.
#[cfg(test)]
pub(crate) fn reveal(secret: &SecretString) -> &str {
    use secrecy::ExposeSecret;
    secret.expose_secret()
}
