//! Command lines for the deployment tool on managed servers.
//!
//! The orchestration layer treats these as opaque strings to run over a
//! transport session; everything tool-specific lives in this module.

/// Exit-zero check for whether an app exists on the host.
pub fn app_exists(app_name: &str) -> String {
    format!("dokku apps:exists {app_name}")
}

/// Create an app. Fails when the app already exists, so callers check
/// [`app_exists`] first.
pub fn create_app(app_name: &str) -> String {
    format!("dokku apps:create {app_name}")
}

/// Destroy an app and everything attached to it.
pub fn destroy_app(app_name: &str) -> String {
    format!("dokku --force apps:destroy {app_name}")
}

/// Fetch a branch into the app repository and build-deploy it.
pub fn sync_app(app_name: &str, repo_url: &str, branch: &str) -> String {
    format!("dokku git:sync --build {app_name} {repo_url} {branch}")
}
