//! Session abstraction and transport mode selection.

use std::time::Duration;

use async_trait::async_trait;

use crate::direct::DirectSession;
use crate::relay::RelaySession;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Transport knobs, loaded from the environment.
///
/// The defaults work out of the box for a local setup.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Hostname suffix identifying machines reachable only through the
    /// relay mesh (default: `.mesh.net`).
    pub relay_host_suffix: String,
    /// Relay client binary invoked for mesh-mediated commands
    /// (default: `meshctl`).
    pub relay_bin: String,
    /// Connection establishment timeout in seconds (default: `30`).
    pub connect_timeout_secs: u64,
    /// Per-command timeout in seconds (default: `600`). Deployment tool
    /// invocations include image builds, so this is deliberately long.
    pub command_timeout_secs: u64,
}

impl TransportSettings {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                          | Default     |
    /// |----------------------------------|-------------|
    /// | `RELAY_HOST_SUFFIX`              | `.mesh.net` |
    /// | `RELAY_BIN`                      | `meshctl`   |
    /// | `TRANSPORT_CONNECT_TIMEOUT_SECS` | `30`        |
    /// | `TRANSPORT_COMMAND_TIMEOUT_SECS` | `600`       |
    pub fn from_env() -> Self {
        let relay_host_suffix =
            std::env::var("RELAY_HOST_SUFFIX").unwrap_or_else(|_| ".mesh.net".into());

        let relay_bin = std::env::var("RELAY_BIN").unwrap_or_else(|_| "meshctl".into());

        let connect_timeout_secs: u64 = std::env::var("TRANSPORT_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("TRANSPORT_CONNECT_TIMEOUT_SECS must be a valid u64");

        let command_timeout_secs: u64 = std::env::var("TRANSPORT_COMMAND_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("TRANSPORT_COMMAND_TIMEOUT_SECS must be a valid u64");

        Self {
            relay_host_suffix,
            relay_bin,
            connect_timeout_secs,
            command_timeout_secs,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            relay_host_suffix: ".mesh.net".into(),
            relay_bin: "meshctl".into(),
            connect_timeout_secs: 30,
            command_timeout_secs: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Connection parameters for one remote machine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub username: String,
    /// SSH port; `None` lets the client default apply. Ignored by the
    /// relay transport, which addresses machines by mesh name.
    pub port: Option<u16>,
    /// PEM-encoded private key material. Absent for mesh-only machines.
    pub private_key: Option<String>,
    /// Force the relay transport even when a key is available.
    pub force_relay: bool,
}

impl SessionConfig {
    /// `user@host` target string shared by both transports.
    pub fn target(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// True when usable key material is present.
    pub fn has_private_key(&self) -> bool {
        self.private_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Mode selection
// ---------------------------------------------------------------------------

/// How commands reach the remote machine. Fixed at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Long-lived key-authenticated SSH connection.
    Direct,
    /// Per-command invocation of the relay client binary.
    Relay,
}

impl TransportMode {
    /// Pick the transport for a target. Pure and deterministic.
    ///
    /// Relay wins when it is forced, when the hostname carries the relay
    /// suffix, or when there is no key to authenticate directly with.
    pub fn select(host: &str, has_private_key: bool, force_relay: bool, relay_suffix: &str) -> Self {
        if force_relay || host.ends_with(relay_suffix) || !has_private_key {
            TransportMode::Relay
        } else {
            TransportMode::Direct
        }
    }
}

// ---------------------------------------------------------------------------
// CommandOutput
// ---------------------------------------------------------------------------

/// Captured result of one remote command.
///
/// Every exec-path failure lands here with a non-zero `exit_code` —
/// including local spawn errors and timeouts, which report `-1` with the
/// cause in `stderr`. Interpreting a non-zero exit as fatal is the
/// caller's business.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best human-readable failure text: stderr when present, else stdout.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors in establishing a session.
///
/// Only connection establishment is fatal; once a session exists, command
/// failures travel inside [`CommandOutput`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport could not reach or authenticate with the machine.
    #[error("Connection to {host} failed: {reason}")]
    ConnectionFailed { host: String, reason: String },

    /// Key material could not be staged on the local filesystem.
    #[error("Failed to stage key material: {0}")]
    KeyMaterial(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A live channel for running commands on one remote machine.
#[async_trait]
pub trait Session: Send + Sync {
    /// The mode this session was established with.
    fn mode(&self) -> TransportMode;

    /// Run one command on the remote machine.
    ///
    /// Never fails at the transport level: spawn errors and timeouts come
    /// back as a [`CommandOutput`] with `exit_code` `-1`.
    async fn exec(&self, command: &str) -> CommandOutput;

    /// Tear down anything the session holds open. Best effort.
    async fn close(&self);
}

/// Establish a session for the target, picking the transport mode.
pub async fn connect(
    config: &SessionConfig,
    settings: &TransportSettings,
) -> Result<Box<dyn Session>, TransportError> {
    let mode = TransportMode::select(
        &config.host,
        config.has_private_key(),
        config.force_relay,
        &settings.relay_host_suffix,
    );

    tracing::debug!(host = %config.host, ?mode, "Establishing transport session");

    match mode {
        TransportMode::Direct => Ok(Box::new(DirectSession::connect(config, settings).await?)),
        TransportMode::Relay => Ok(Box::new(RelaySession::connect(config, settings).await?)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SUFFIX: &str = ".mesh.net";

    #[test]
    fn direct_when_key_present_and_public_host() {
        let mode = TransportMode::select("203.0.113.7", true, false, SUFFIX);
        assert_eq!(mode, TransportMode::Direct);
    }

    #[test]
    fn relay_when_forced() {
        let mode = TransportMode::select("203.0.113.7", true, true, SUFFIX);
        assert_eq!(mode, TransportMode::Relay);
    }

    #[test]
    fn relay_when_host_carries_mesh_suffix() {
        let mode = TransportMode::select("box.mesh.net", true, false, SUFFIX);
        assert_eq!(mode, TransportMode::Relay);
    }

    #[test]
    fn relay_when_no_key() {
        let mode = TransportMode::select("203.0.113.7", false, false, SUFFIX);
        assert_eq!(mode, TransportMode::Relay);
    }

    #[test]
    fn selection_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(
                TransportMode::select("box.mesh.net", false, false, SUFFIX),
                TransportMode::Relay
            );
            assert_eq!(
                TransportMode::select("203.0.113.7", true, false, SUFFIX),
                TransportMode::Direct
            );
        }
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let config = SessionConfig {
            host: "203.0.113.7".into(),
            username: "root".into(),
            port: None,
            private_key: Some("   ".into()),
            force_relay: false,
        };
        assert!(!config.has_private_key());
    }

    #[test]
    fn target_is_user_at_host() {
        let config = SessionConfig {
            host: "box.mesh.net".into(),
            username: "deploy".into(),
            port: None,
            private_key: None,
            force_relay: false,
        };
        assert_eq!(config.target(), "deploy@box.mesh.net");
    }

    #[test]
    fn output_error_text_prefers_stderr() {
        let output = CommandOutput {
            stdout: "some progress\n".into(),
            stderr: "boom\n".into(),
            exit_code: 1,
        };
        assert_eq!(output.error_text(), "boom");

        let quiet = CommandOutput {
            stdout: "only stdout".into(),
            stderr: String::new(),
            exit_code: 1,
        };
        assert_eq!(quiet.error_text(), "only stdout");
    }
}
