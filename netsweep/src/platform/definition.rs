//! Platform definition for vendor-specific session handling.

use regex::bytes::Regex;

/// A login prompt answered during interactive login.
#[derive(Debug, Clone)]
pub struct LoginPrompt {
    /// Pattern to wait for.
    pub pattern: Regex,

    /// What to answer with.
    pub answer: LoginAnswer,
}

/// Value sent back to a login prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAnswer {
    Username,
    Password,
}

/// Everything the SSH driver needs to know about one device family.
#[derive(Debug, Clone)]
pub struct PlatformDefinition {
    /// Platform name (e.g., "cisco_ios", "cisco_wlc").
    pub name: String,

    /// Matches any prompt this platform can present.
    pub prompt: Regex,

    /// Matches the unprivileged prompt, when the platform has one.
    pub unprivileged_prompt: Option<Regex>,

    /// Command that escalates from the unprivileged prompt.
    pub escalate_command: Option<String>,

    /// Password prompt shown after the escalate command.
    pub escalate_auth_prompt: Option<Regex>,

    /// Prompts answered in order before the first CLI prompt appears.
    pub login_prompts: Vec<LoginPrompt>,

    /// Output fragments that mark a command as rejected.
    pub failed_when_contains: Vec<String>,

    /// Commands to run when the session opens (paging off).
    pub on_open_commands: Vec<String>,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,
}

impl PlatformDefinition {
    /// Create a new platform definition from a name and combined prompt pattern.
    pub fn new(name: impl Into<String>, prompt: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            prompt: Regex::new(prompt)?,
            unprivileged_prompt: None,
            escalate_command: None,
            escalate_auth_prompt: None,
            login_prompts: vec![],
            failed_when_contains: vec![],
            on_open_commands: vec![],
            terminal_width: 511,
            terminal_height: 24,
        })
    }

    /// Configure enable escalation.
    pub fn with_escalation(
        mut self,
        unprivileged_prompt: &str,
        command: impl Into<String>,
        auth_prompt: &str,
    ) -> Result<Self, regex::Error> {
        self.unprivileged_prompt = Some(Regex::new(unprivileged_prompt)?);
        self.escalate_command = Some(command.into());
        self.escalate_auth_prompt = Some(Regex::new(auth_prompt)?);
        Ok(self)
    }

    /// Add an interactive login prompt.
    pub fn with_login_prompt(
        mut self,
        pattern: &str,
        answer: LoginAnswer,
    ) -> Result<Self, regex::Error> {
        self.login_prompts.push(LoginPrompt {
            pattern: Regex::new(pattern)?,
            answer,
        });
        Ok(self)
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    /// Add an on_open command.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// Set terminal dimensions.
    pub fn with_terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Whether a prompt is the unprivileged one.
    pub fn is_unprivileged(&self, prompt: &str) -> bool {
        self.unprivileged_prompt
            .as_ref()
            .is_some_and(|p| p.is_match(prompt.as_bytes()))
    }

    /// First failure pattern found in the output.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failed_when_contains
            .iter()
            .find(|pattern| output.contains(pattern.as_str()))
            .map(String::as_str)
    }

    /// Strip the command echo and the trailing prompt line.
    pub fn normalize_output(&self, raw: &str, command: &str) -> String {
        let output = raw.replace("\r\n", "\n").replace('\r', "");
        let output = output.trim_start_matches('\n');
        let output = output.strip_prefix(command).unwrap_or(output);
        let output = output.trim_start_matches([' ', '\n']);

        match output.rfind('\n') {
            Some(pos) => output[..pos].trim_end().to_string(),
            // Only the prompt came back.
            None if self.prompt.is_match(output.as_bytes()) => String::new(),
            None => output.trim_end().to_string(),
        }
    }
}
