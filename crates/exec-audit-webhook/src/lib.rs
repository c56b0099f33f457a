pub mod admission_review;
pub mod annotator;
mod api;
mod certs;
pub mod cli;
pub mod config;
pub mod errors;
pub mod filter;
pub mod response;
pub mod store;
pub mod tracing;

#[cfg(test)]
mod test_utils;

use std::{net::SocketAddr, process, sync::Arc, sync::RwLock, time::Duration};

use ::tracing::{error, info, warn};
use anyhow::{anyhow, Result};
use axum::Router;
use axum_server::Handle;
use lazy_static::lazy_static;

use crate::{
    annotator::Annotator,
    api::state::ApiServerState,
    certs::create_tls_config_and_watch_certificate_changes,
    config::{Config, TlsConfig},
    store::{KubePodStore, PodStore, UnavailablePodStore},
};

pub use api::{MUTATE_PATH, READINESS_PATH};

/// Time given to in-flight reviews before the server is shut down
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

lazy_static! {
    static ref TRACE_SYSTEM_INITIALIZED: RwLock<bool> = RwLock::new(false);
}

pub struct ExecAuditWebhook {
    router: Router,
    addr: SocketAddr,
    tls_config: TlsConfig,
}

impl ExecAuditWebhook {
    /// Build the webhook talking to the Kubernetes cluster the process runs
    /// against.
    ///
    /// When the client cannot be built and
    /// `ignore_kubernetes_connection_failure` is set, the webhook still
    /// starts: every exec request is then denied.
    pub async fn new_from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn PodStore> = match KubePodStore::try_default().await {
            Ok(store) => Arc::new(store),
            Err(e) if config.ignore_kubernetes_connection_failure => {
                warn!(
                    error = e.to_string().as_str(),
                    "Cannot connect to Kubernetes, exec requests will be denied"
                );
                Arc::new(UnavailablePodStore::new(e.to_string()))
            }
            Err(e) => return Err(anyhow!("Cannot connect to Kubernetes: {e}")),
        };

        Ok(Self::new_with_store(config, store))
    }

    pub fn new_with_store(config: Config, store: Arc<dyn PodStore>) -> Self {
        let state = Arc::new(ApiServerState {
            annotator: Annotator::new(store, config.store_timeout),
        });

        Self {
            router: api::router(state),
            addr: config.addr,
            tls_config: config.tls_config,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve HTTPS requests until SIGINT or SIGTERM is received.
    pub async fn run(self) -> Result<()> {
        let rustls_config = create_tls_config_and_watch_certificate_changes(self.tls_config).await?;

        let handle = Handle::new();
        tokio::spawn(shutdown_signal(handle.clone()));

        info!(
            service = config::SERVICE_NAME,
            address = %self.addr,
            "started HTTPS server"
        );
        axum_server::bind_rustls(self.addr, rustls_config)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await
            .map_err(|e| anyhow!("HTTPS server error: {e}"))?;
        info!("HTTPS server stopped");

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot install the Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Cannot install the SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
}

/// Remember that the tracing system is ready, [`fatal_error`] relies on it.
pub fn mark_tracing_initialized() {
    if let Ok(mut initialized) = TRACE_SYSTEM_INITIALIZED.write() {
        *initialized = true;
    }
}

pub fn fatal_error(msg: String) -> ! {
    let trace_system_ready = TRACE_SYSTEM_INITIALIZED
        .read()
        .map(|initialized| *initialized)
        .unwrap_or(false);
    if trace_system_ready {
        error!("{}", msg);
    } else {
        eprintln!("{msg}");
    }

    process::exit(1);
}
