//! Shell selection
//!
//! The shell for an interactive session is taken from the terminal config,
//! then `$SHELL`, then `/bin/sh`, and must name a known login shell that
//! exists on disk.

use std::path::Path;

use rsh_core::config::TerminalConfig;
use rsh_core::error::SessionError;

/// Shells accepted without consulting `/etc/shells`
const ALLOWED_SHELLS: &[&str] = &[
    "/bin/sh",
    "/bin/bash",
    "/bin/zsh",
    "/bin/fish",
    "/bin/dash",
    "/bin/ksh",
    "/bin/tcsh",
    "/bin/csh",
    "/usr/bin/sh",
    "/usr/bin/bash",
    "/usr/bin/zsh",
    "/usr/bin/fish",
    "/usr/bin/dash",
    "/usr/bin/ksh",
    "/usr/bin/tcsh",
    "/usr/bin/csh",
    "/usr/local/bin/bash",
    "/usr/local/bin/zsh",
    "/usr/local/bin/fish",
    "/opt/homebrew/bin/bash",
    "/opt/homebrew/bin/zsh",
    "/opt/homebrew/bin/fish",
];

const ETC_SHELLS: &str = "/etc/shells";

/// Pick and validate the shell for a new interactive session
pub fn resolve_shell(config: &TerminalConfig) -> Result<String, SessionError> {
    let requested = config.requested_shell();
    validate_shell_path(&requested)
}

/// Check that `shell` is an allowed login shell and exists
pub fn validate_shell_path(shell: &str) -> Result<String, SessionError> {
    let listed = ALLOWED_SHELLS.contains(&shell) || listed_in_etc_shells(shell);
    if !listed {
        return Err(SessionError::InvalidShell(format!(
            "'{}' is neither a known shell nor listed in {}",
            shell, ETC_SHELLS
        )));
    }

    if !Path::new(shell).exists() {
        return Err(SessionError::InvalidShell(format!(
            "'{}' does not exist",
            shell
        )));
    }

    Ok(shell.to_string())
}

fn listed_in_etc_shells(shell: &str) -> bool {
    match std::fs::read_to_string(ETC_SHELLS) {
        Ok(shells) => shells
            .lines()
            .map(str::trim)
            .any(|line| !line.starts_with('#') && line == shell),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_sh_is_valid() {
        assert_eq!(validate_shell_path("/bin/sh").unwrap(), "/bin/sh");
    }

    #[test]
    fn test_unknown_shell_rejected() {
        let err = validate_shell_path("/tmp/definitely-not-a-shell").unwrap_err();
        assert!(matches!(err, SessionError::InvalidShell(_)));
    }

    #[test]
    fn test_relative_name_rejected() {
        assert!(validate_shell_path("sh").is_err());
    }

    #[test]
    fn test_allowed_but_missing_rejected() {
        // On the allow-list on every platform, present on almost none
        if Path::new("/opt/homebrew/bin/fish").exists() {
            return;
        }
        let err = validate_shell_path("/opt/homebrew/bin/fish").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_configured_shell_wins() {
        let config = TerminalConfig {
            shell: Some("/bin/sh".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_shell(&config).unwrap(), "/bin/sh");
    }
}
