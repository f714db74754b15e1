//! Cisco platform definitions.
//!
//! Supported families and their prompts:
//!
//! ```text
//! sw1>                         # IOS / IOS-XE exec
//! sw1#                         # IOS / IOS-XE privileged exec
//! dc1-srv01#                   # NX-OS
//! fw1/pri/act>                 # ASA exec (multi-context prompts carry slashes)
//! (Cisco Controller) >         # AireOS WLC
//! ```
//!
//! The WLC does not authenticate over SSH in the usual way: the server accepts
//! the connection and then asks for `User:` and `Password:` in the shell.

use crate::platform::{LoginAnswer, PlatformDefinition};

const IOS_PROMPT: &str = r"(?m)^[\w.\-@()/: ]{1,63}[>#]\s?$";
const IOS_EXEC_PROMPT: &str = r"(?m)^[\w.\-@()/: ]{1,63}>\s?$";
const ENABLE_PASSWORD_PROMPT: &str = r"(?mi)^password:\s?$";

/// Cisco IOS and IOS-XE.
pub fn ios() -> PlatformDefinition {
    PlatformDefinition::new("cisco_ios", IOS_PROMPT)
        .unwrap()
        .with_escalation(IOS_EXEC_PROMPT, "enable", ENABLE_PASSWORD_PROMPT)
        .unwrap()
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Unknown command")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511")
}

/// Cisco NX-OS.
pub fn nxos() -> PlatformDefinition {
    PlatformDefinition::new("cisco_nxos", IOS_PROMPT)
        .unwrap()
        .with_failure_pattern("% Invalid command")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("Syntax error while parsing")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 511")
}

/// Cisco ASA.
pub fn asa() -> PlatformDefinition {
    PlatformDefinition::new("cisco_asa", IOS_PROMPT)
        .unwrap()
        .with_escalation(IOS_EXEC_PROMPT, "enable", ENABLE_PASSWORD_PROMPT)
        .unwrap()
        .with_failure_pattern("ERROR: % Invalid input")
        .with_failure_pattern("ERROR: % Incomplete command")
        .with_failure_pattern("ERROR: % Ambiguous command")
        .with_on_open_command("terminal pager 0")
}

/// Cisco AireOS wireless LAN controller.
pub fn wlc() -> PlatformDefinition {
    PlatformDefinition::new("cisco_wlc", r"(?m)^\([^)\r\n]+\)\s*[>#]\s?$")
        .unwrap()
        .with_login_prompt(r"(?mi)^user:\s?$", LoginAnswer::Username)
        .unwrap()
        .with_login_prompt(r"(?mi)^password:\s?$", LoginAnswer::Password)
        .unwrap()
        .with_failure_pattern("Incorrect usage")
        .with_failure_pattern("Incorrect input")
        .with_on_open_command("config paging disable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ios_prompts() {
        let platform = ios();
        assert!(platform.prompt.is_match(b"sw1>"));
        assert!(platform.prompt.is_match(b"output\nsw1#"));
        assert!(platform.prompt.is_match(b"core-as01.example.com# "));
        assert!(platform.is_unprivileged("sw1>"));
        assert!(!platform.is_unprivileged("sw1#"));
    }

    #[test]
    fn test_ios_paging_disabled_on_open() {
        let platform = ios();
        assert_eq!(platform.on_open_commands[0], "terminal length 0");
    }

    #[test]
    fn test_asa_prompt_with_context() {
        let platform = asa();
        assert!(platform.prompt.is_match(b"fw1/pri/act#"));
        assert_eq!(platform.on_open_commands, vec!["terminal pager 0"]);
    }

    #[test]
    fn test_nxos_has_no_escalation() {
        let platform = nxos();
        assert!(platform.escalate_command.is_none());
        assert!(!platform.is_unprivileged("dc1-srv01>"));
    }

    #[test]
    fn test_wlc_prompt_and_login() {
        let platform = wlc();
        assert!(platform.prompt.is_match(b"(Cisco Controller) >"));
        assert!(platform.prompt.is_match(b"(site-wlc01) >"));
        assert!(!platform.prompt.is_match(b"sw1#"));
        assert_eq!(platform.login_prompts.len(), 2);
        assert_eq!(platform.login_prompts[0].answer, LoginAnswer::Username);
        assert!(platform.login_prompts[0].pattern.is_match(b"User: "));
    }
}
