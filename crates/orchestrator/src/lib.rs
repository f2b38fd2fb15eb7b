//! Deployment and teardown workflow coordination.
//!
//! Workflows are expressed as jobs on resource-scoped queues. The
//! [`Orchestrator`] entry points bind the right workers lazily, enqueue a
//! coordinator job and hand the caller a handle to await. The heavy
//! lifting happens inside processors: [`teardown`] fans out per-project
//! deletion jobs and gates the machine release on their terminal states,
//! [`deploy`] drives the deployment tool over a transport session while
//! republishing its output to the event bus.

pub mod commands;
pub mod deploy;
pub mod orchestrator;
pub mod teardown;

pub use deploy::{DeployProcessor, DeployRequest};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use teardown::{
    DeleteProjectProcessor, ServerTeardown, TeardownError, TeardownOptions, TeardownProcessor,
    TeardownSummary,
};
