use crate::agents::{AgentGateway, HttpAgentGateway};
use crate::cli::ServeOpts;
use crate::config::{validate_config_object, Config};
use crate::dashboard::routes;
use crate::sessions::SessionStore;

use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// Shared state for the dashboard server.
#[derive(Clone)]
pub struct DashboardState {
    pub gateway: Arc<dyn AgentGateway>,
    pub sessions: Arc<SessionStore>,
    pub start_time: std::time::Instant,
    pub version: String,
}

impl DashboardState {
    pub fn new(gateway: Arc<dyn AgentGateway>, sessions: SessionStore) -> Self {
        Self {
            gateway,
            sessions: Arc::new(sessions),
            start_time: std::time::Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The dashboard server.
pub struct DashboardServer {
    state: DashboardState,
    addr: SocketAddr,
    backend_url: String,
}

impl DashboardServer {
    /// Prepare the server: command-line overrides win over the config file.
    pub fn new(mut config: Config, opts: &ServeOpts) -> Result<Self> {
        if let Some(url) = &opts.backend_url {
            config.backend.base_url = url.clone();
            validate_config_object(&config)?;
        }
        let port = opts.port.unwrap_or(config.server.port);
        let bind = opts.bind.as_deref().unwrap_or(&config.server.bind);
        let addr = resolve_bind_address(bind, port)?;

        let gateway = HttpAgentGateway::from_config(&config.backend)
            .context("Cannot create backend client")?;
        info!("Using agent backend at {}", gateway.base_url());

        let state = DashboardState::new(Arc::new(gateway), SessionStore::new(&config.sessions));

        Ok(Self {
            state,
            addr,
            backend_url: config.backend.base_url,
        })
    }

    /// Run the server until a shutdown signal is received.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let app = routes::build_routes(self.state.clone());

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Cannot bind {}", self.addr))?;
        let addr = listener.local_addr()?;

        print_startup_banner(&self.state, &addr, &self.backend_url);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Dashboard shut down gracefully");
        Ok(())
    }

    /// Get the configured listen address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}

/// Resolve the listen address from a bind host and port.
fn resolve_bind_address(bind: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address '{bind}'"))?;
    Ok(SocketAddr::new(ip, port))
}

fn print_startup_banner(state: &DashboardState, addr: &SocketAddr, backend_url: &str) {
    info!("-------------------------------------------");
    info!("  OpAMP Dashboard v{}", state.version);
    info!("  Listening on: http://{}", addr);
    info!("  Backend: {}", backend_url);
    info!("  Health: http://{}/api/health", addr);
    info!("-------------------------------------------");
}
