use std::net::SocketAddr;

/// HTTP server configuration, loaded from the environment.
///
/// Defaults suit local development against a Vite dashboard; production
/// deployments override per variable.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, comma-separated in `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Bounds time to
    /// first response byte, so SSE connections outlive it.
    pub request_timeout_secs: u64,
    /// Whether this process runs the stalled-job reaper (default: `true`).
    /// Exactly one process per database should; extra sweepers are safe
    /// but redundant.
    pub run_reaper: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `REAPER_ENABLED`       | `true`                     |
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .expect("PORT must be a valid u16"),
            cors_origins,
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .expect("REQUEST_TIMEOUT_SECS must be a valid u64"),
            run_reaper: std::env::var("REAPER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// The socket address to bind, from `host` and `port`.
    pub fn bind_addr(&self) -> SocketAddr {
        let ip = self.host.parse().expect("Invalid HOST address");
        SocketAddr::new(ip, self.port)
    }
}
