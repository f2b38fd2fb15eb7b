//! Relay transport through the mesh client binary.
//!
//! No connection state lives here: every command shells out to the relay
//! client (`meshctl ssh user@host "<command>"`), which routes it over the
//! mesh. [`RelaySession::connect`] still validates reachability up front
//! with a no-op command so callers get the same fail-fast contract as the
//! direct transport.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::session::{
    CommandOutput, Session, SessionConfig, TransportError, TransportMode, TransportSettings,
};
use crate::subprocess;

/// A relay-mediated session for one machine.
pub struct RelaySession {
    relay_bin: String,
    target: String,
    command_timeout: Duration,
}

impl RelaySession {
    /// Validate that the machine is reachable over the mesh.
    pub async fn connect(
        config: &SessionConfig,
        settings: &TransportSettings,
    ) -> Result<Self, TransportError> {
        let session = Self {
            relay_bin: settings.relay_bin.clone(),
            target: config.target(),
            command_timeout: settings.command_timeout(),
        };

        let mut cmd = session.build_command("true");
        let output = subprocess::run(&mut cmd, settings.connect_timeout()).await;
        if !output.success() {
            return Err(TransportError::ConnectionFailed {
                host: config.host.clone(),
                reason: output.error_text().to_string(),
            });
        }

        tracing::info!(target = %session.target, "Validated relay session");
        Ok(session)
    }

    fn build_command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.relay_bin);
        cmd.arg("ssh")
            .arg(&self.target)
            .arg(escape_remote_command(command));
        cmd
    }
}

#[async_trait]
impl Session for RelaySession {
    fn mode(&self) -> TransportMode {
        TransportMode::Relay
    }

    async fn exec(&self, command: &str) -> CommandOutput {
        let mut cmd = self.build_command(command);
        subprocess::run(&mut cmd, self.command_timeout).await
    }

    async fn close(&self) {
        // Per-command transport: nothing is held open.
    }
}

/// Escape a command for the relay client's remote shell handoff.
///
/// The relay binary wraps the command in double quotes before passing it
/// to the remote shell, so embedded double quotes must be escaped to
/// survive the round trip.
pub fn escape_remote_command(command: &str) -> String {
    command.replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
