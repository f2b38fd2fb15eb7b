//! Remote command execution over two transports.
//!
//! Every remote operation goes through a [`Session`]: either a direct
//! key-authenticated SSH connection ([`direct::DirectSession`]) or a
//! relay-mediated one through the mesh client binary
//! ([`relay::RelaySession`]). Callers pick neither — [`connect`] selects
//! the mode from the target's shape and hands back a boxed session.

pub mod direct;
pub mod mesh;
pub mod relay;
pub mod session;
mod subprocess;

pub use mesh::{MeshClient, MeshError};
pub use session::{
    connect, CommandOutput, Session, SessionConfig, TransportError, TransportMode,
    TransportSettings,
};
