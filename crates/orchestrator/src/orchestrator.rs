//! Workflow entry points and the shared handle set behind them.

use std::sync::Arc;

use drydock_core::naming;
use drydock_core::types::DbId;
use drydock_db::models::{Job, Server};
use drydock_db::repositories::{ProjectRepo, ServerRepo};
use drydock_db::DbPool;
use drydock_events::{EventBus, WebhookDispatcher};
use drydock_queue::{EnqueueOptions, QueueRegistry};
use drydock_transport::{MeshClient, SessionConfig, TransportSettings};

use crate::deploy::{DeployProcessor, DeployRequest};
use crate::teardown::{DeleteProjectProcessor, TeardownProcessor};

/// Why an orchestration entry point refused a request.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("server {0} not found")]
    ServerNotFound(DbId),
    #[error("project {0} not found")]
    ProjectNotFound(DbId),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Handles shared by every workflow in the process.
pub(crate) struct Inner {
    pub(crate) pool: DbPool,
    pub(crate) registry: Arc<QueueRegistry>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) webhooks: Arc<WebhookDispatcher>,
    pub(crate) mesh: Option<MeshClient>,
    pub(crate) transport: TransportSettings,
}

/// Entry point for deployment and teardown workflows.
///
/// Cheap to clone; clones share one handle set. Workers are bound lazily
/// by the entry points, so a job enqueued before its worker exists simply
/// waits on the queue.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        pool: DbPool,
        registry: Arc<QueueRegistry>,
        bus: Arc<EventBus>,
        webhooks: Arc<WebhookDispatcher>,
        mesh: Option<MeshClient>,
        transport: TransportSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                registry,
                bus,
                webhooks,
                mesh,
                transport,
            }),
        }
    }

    /// Start a cascading teardown of `server_id`.
    ///
    /// Binds the coordinator and child workers, enqueues the coordinator
    /// job and returns it. Progress streams over the event bus under the
    /// server's log scope; the job itself can be awaited through the
    /// queue's waiter.
    pub async fn teardown_server(&self, server_id: DbId) -> Result<Job, OrchestratorError> {
        let server = ServerRepo::find_by_id(&self.inner.pool, server_id)
            .await?
            .ok_or(OrchestratorError::ServerNotFound(server_id))?;

        let child_queue = naming::queue_name("server", server.id, "delete-project");
        let parent_queue = naming::queue_name("server", server.id, "delete-projects");
        self.inner
            .registry
            .worker(&child_queue, Arc::new(DeleteProjectProcessor::new(self.clone())))
            .await?;
        self.inner
            .registry
            .worker(&parent_queue, Arc::new(TeardownProcessor::new(self.clone())))
            .await?;

        let queue = self.inner.registry.queue(&parent_queue).await?;
        let job_key = naming::job_key("teardown");
        let payload = serde_json::json!({ "server_id": server.id });
        let job = queue
            .enqueue(&job_key, &payload, &EnqueueOptions::default())
            .await?;

        tracing::info!(server_id, job_key = %job.job_key, "Server teardown enqueued");
        Ok(job)
    }

    /// Enqueue a deployment of `project_id` from a git source.
    pub async fn deploy_project(
        &self,
        project_id: DbId,
        request: DeployRequest,
    ) -> Result<Job, OrchestratorError> {
        let project = ProjectRepo::find_by_id(&self.inner.pool, project_id)
            .await?
            .ok_or(OrchestratorError::ProjectNotFound(project_id))?;
        let server = ServerRepo::find_by_id(&self.inner.pool, project.server_id)
            .await?
            .ok_or(OrchestratorError::ServerNotFound(project.server_id))?;

        let queue_name = naming::queue_name("server", server.id, "deploy-app");
        self.inner
            .registry
            .worker(&queue_name, Arc::new(DeployProcessor::new(self.clone())))
            .await?;

        let queue = self.inner.registry.queue(&queue_name).await?;
        let job_key = naming::job_key(&format!("deploy-{}", project.id));
        let payload = serde_json::json!({
            "project_id": project.id,
            "server_id": server.id,
            "app_name": project.app_name,
            "repo_url": request.repo_url,
            "branch": request.branch,
        });
        let job = queue
            .enqueue(&job_key, &payload, &EnqueueOptions::default())
            .await?;

        tracing::info!(
            project_id,
            server_id = server.id,
            job_key = %job.job_key,
            "Deploy enqueued"
        );
        Ok(job)
    }
}

/// Connection parameters for a server row.
pub(crate) fn session_config(server: &Server) -> SessionConfig {
    SessionConfig {
        host: server.hostname.clone(),
        username: server.username.clone(),
        port: u16::try_from(server.port).ok(),
        private_key: server.private_key.clone(),
        force_relay: server.force_relay,
    }
}
