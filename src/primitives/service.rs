//! Restart target notified when managed state changes.

use tracing::info;

use crate::command_runner::run_command;
use crate::command_traits::CommandArgs;
use crate::error::Result;

/// Service handle: restarts the managed Java service
pub trait ServiceHandle {
    fn restart(&self, service: &str) -> Result<()>;
}

/// `systemctl try-restart <unit>`: restarts only if the unit is running
#[derive(Debug, Clone)]
pub struct SystemctlArgs {
    pub action: &'static str,
    pub unit: String,
}

impl CommandArgs for SystemctlArgs {
    fn program(&self) -> &'static str {
        "systemctl"
    }

    fn to_args(&self) -> Vec<String> {
        vec![self.action.to_string(), self.unit.clone()]
    }
}

/// [`ServiceHandle`] backed by systemd
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemdService;

impl SystemdService {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceHandle for SystemdService {
    fn restart(&self, service: &str) -> Result<()> {
        let args = SystemctlArgs {
            action: "try-restart",
            unit: service.to_string(),
        };
        run_command(&args)?.ensure_success(&format!("restarting {}", service))?;
        info!(service, "service restarted");
        Ok(())
    }
}
