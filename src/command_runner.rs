//! Type-Safe Command Execution
//!
//! `run_command` is the only place jmxctl spawns a process. Everything goes
//! through a [`CommandArgs`] implementation so the exact invocation is logged
//! (minus secret values) and output is captured uniformly.

use crate::command_traits::CommandArgs;
use crate::error::{JmxError, Result};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Execute an external command with type-safe arguments.
///
/// A non-zero exit is not an error here; callers decide via
/// [`CommandOutput::ensure_success`]. Failing to spawn (tool not installed)
/// is an error.
pub fn run_command<T: CommandArgs>(args: &T) -> Result<CommandOutput> {
    let program = args.program();
    let cli_args = args.to_args();
    let env_vars = args.get_env_vars();
    let env_names: Vec<&str> = env_vars.iter().map(|(k, _)| k.as_str()).collect();

    debug!(program, args = ?cli_args, env = ?env_names, "run_command");

    let mut cmd = Command::new(program);
    cmd.args(&cli_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    for (key, value) in &env_vars {
        cmd.env(key, value);
    }

    let output = cmd
        .output()
        .map_err(|e| JmxError::command(format!("failed to spawn {}: {}", program, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code();

    if output.status.success() {
        debug!(program, "command succeeded");
    } else {
        info!(program, code = exit_code.unwrap_or(-1), "command exited non-zero");
    }

    Ok(CommandOutput {
        program,
        stdout,
        stderr,
        exit_code,
        success: output.status.success(),
    })
}

/// Output from a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Program that produced this output.
    pub program: &'static str,
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, context: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            let code = self.exit_code.unwrap_or(-1);
            let detail = if self.stderr.trim().is_empty() {
                self.stdout.trim()
            } else {
                self.stderr.trim()
            };
            Err(JmxError::command(format!(
                "{} ({} exit code {}): {}",
                context, self.program, code, detail
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sh(&'static str);

    impl CommandArgs for Sh {
        fn program(&self) -> &'static str {
            "sh"
        }

        fn to_args(&self) -> Vec<String> {
            vec!["-c".to_string(), self.0.to_string()]
        }

        fn get_env_vars(&self) -> Vec<(String, String)> {
            vec![("JMXCTL_TEST_VALUE".to_string(), "hello".to_string())]
        }
    }

    struct Missing;

    impl CommandArgs for Missing {
        fn program(&self) -> &'static str {
            "jmxctl-definitely-not-installed"
        }

        fn to_args(&self) -> Vec<String> {
            vec![]
        }
    }

    #[test]
    fn test_captures_stdout_and_env() {
        let output = run_command(&Sh("printf %s \"$JMXCTL_TEST_VALUE\"")).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "hello");
        assert!(output.ensure_success("echo").is_ok());
    }

    #[test]
    fn test_non_zero_exit_reported_by_ensure_success() {
        let output = run_command(&Sh("echo broken >&2; exit 3")).unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        let err = output.ensure_success("probe").unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_missing_program_is_error() {
        let result = run_command(&Missing);
        assert!(matches!(result, Err(JmxError::Command(_))));
    }
}
