//! HTTP server provisioning.
//!
//! # Responsibilities
//! - Resolve listener addresses (port override, optional preflight)
//! - Size the worker pool for the run mode
//! - Compose the handler pipeline around the module routes
//! - Optionally add the HTTPS listener and the alternate plaintext listener
//! - Start all listeners and stop them with a bounded drain
//!
//! # Design Decisions
//! - Construction is side-effect free; sockets and key files are touched in `start`
//! - Every listener serves the same pipeline, so the gate covers all of them
//! - One `axum_server::Handle` per listener

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use futures_util::future::join_all;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::{HostConfig, ServerMode};
use crate::http::middleware::GracefulGate;
use crate::http::pipeline::{self, HandlerPipeline};
use crate::http::workers::{size_worker_pool, WorkerPool};
use crate::net::listener::{self, bind_listener, preflight, socket_addr};
use crate::net::tls::{load_tls_config, TlsError};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot bind {addr}: {source}")]
    Resource { addr: String, source: io::Error },

    #[error("TLS initialization failed: {0}")]
    Security(#[from] TlsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Http,
    Https,
    Alt,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Http => write!(f, "http"),
            ListenerKind::Https => write!(f, "https"),
            ListenerKind::Alt => write!(f, "alt"),
        }
    }
}

/// A listener to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerSpec {
    pub kind: ListenerKind,
    pub addr: SocketAddr,
}

/// Builds and starts the listener set.
pub struct ServerProvisioner {
    config: Arc<HostConfig>,
    port_override: Option<u16>,
}

impl ServerProvisioner {
    pub fn new(config: Arc<HostConfig>, port_override: Option<u16>) -> Self {
        Self {
            config,
            port_override,
        }
    }

    pub fn mode(&self) -> ServerMode {
        self.config.server.mode
    }

    /// HTTP port after overrides; preflight-binds it in check-port mode.
    pub fn resolve_port(&self) -> Result<u16, ProvisionError> {
        let server = &self.config.server;
        let port = listener::resolve_port(server.port, self.port_override);
        if server.check_port {
            let addr = resolve(&server.host, port)?;
            preflight(addr).map_err(|source| ProvisionError::Resource {
                addr: addr.to_string(),
                source,
            })?;
        }
        Ok(port)
    }

    pub fn worker_pool(&self, cpu_count: usize) -> WorkerPool {
        let workers = &self.config.workers;
        let pool = size_worker_pool(self.mode(), cpu_count, workers.core_threads, workers.max_threads);
        tracing::info!(
            mode = %self.mode(),
            cpu_count,
            core = pool.core,
            max = pool.max,
            "Worker pool sized"
        );
        pool
    }

    pub fn build_pipeline(&self, base: Router) -> HandlerPipeline {
        pipeline::build_pipeline(base, &self.config, self.mode())
    }

    /// TLS context for the HTTPS listener, `None` when HTTPS is disabled.
    pub async fn enable_tls(&self) -> Result<Option<RustlsConfig>, ProvisionError> {
        let https = &self.config.https;
        if !https.enabled {
            return Ok(None);
        }
        let tls = load_tls_config(&https.cert_path, &https.key_path).await?;
        Ok(Some(tls))
    }

    /// Address of the alternate plaintext listener, `None` when disabled.
    pub fn enable_alt_protocol(&self) -> Result<Option<ListenerSpec>, ProvisionError> {
        let alt = &self.config.alt;
        if !alt.enabled {
            return Ok(None);
        }
        Ok(Some(ListenerSpec {
            kind: ListenerKind::Alt,
            addr: resolve(&alt.host, alt.port)?,
        }))
    }

    /// Every listener that `start` will bind, HTTP first.
    pub fn listener_plan(&self, http_port: u16) -> Result<Vec<ListenerSpec>, ProvisionError> {
        let mut plan = vec![ListenerSpec {
            kind: ListenerKind::Http,
            addr: resolve(&self.config.server.host, http_port)?,
        }];
        if self.config.https.enabled {
            plan.push(ListenerSpec {
                kind: ListenerKind::Https,
                addr: resolve(&self.config.https.host, self.config.https.port)?,
            });
        }
        plan.extend(self.enable_alt_protocol()?);
        Ok(plan)
    }

    /// Bind every enabled listener and start serving `base` through the pipeline.
    pub async fn start(&self, base: Router) -> Result<RunningServer, ProvisionError> {
        let port = self.resolve_port()?;
        self.start_on(port, base).await
    }

    /// `start` with an already resolved HTTP port.
    pub async fn start_on(&self, port: u16, base: Router) -> Result<RunningServer, ProvisionError> {
        let tls = self.enable_tls().await?;
        let plan = self.listener_plan(port)?;
        let pipeline = self.build_pipeline(base);

        // Bind everything before serving anything, so a busy port fails the
        // whole start.
        let mut bound = Vec::with_capacity(plan.len());
        for spec in &plan {
            let std_listener = bind_listener(spec.addr).map_err(|source| ProvisionError::Resource {
                addr: spec.addr.to_string(),
                source,
            })?;
            let local_addr = std_listener
                .local_addr()
                .map_err(|source| ProvisionError::Resource {
                    addr: spec.addr.to_string(),
                    source,
                })?;
            bound.push((spec.kind, local_addr, std_listener));
        }

        let mut listeners = Vec::with_capacity(bound.len());
        let mut handles = Vec::with_capacity(bound.len());
        let mut tasks = Vec::with_capacity(bound.len());
        for (kind, local_addr, std_listener) in bound {
            let handle = Handle::new();
            let app = pipeline.router.clone().into_make_service();
            let task: JoinHandle<io::Result<()>> = match (kind, tls.clone()) {
                (ListenerKind::Https, Some(tls)) => {
                    let server = axum_server::from_tcp_rustls(std_listener, tls).handle(handle.clone());
                    tokio::spawn(async move { server.serve(app).await })
                }
                (ListenerKind::Https, None) => {
                    return Err(ProvisionError::Configuration(
                        "HTTPS listener planned without a TLS context".to_string(),
                    ));
                }
                _ => {
                    let server = axum_server::from_tcp(std_listener).handle(handle.clone());
                    tokio::spawn(async move { server.serve(app).await })
                }
            };
            tracing::info!(listener = %kind, address = %local_addr, "Listening for connections");
            listeners.push((kind, local_addr));
            handles.push(handle);
            tasks.push(task);
        }

        Ok(RunningServer {
            listeners,
            handles,
            tasks,
            gate: pipeline.gate,
        })
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ProvisionError> {
    socket_addr(host, port).map_err(|source| ProvisionError::Resource {
        addr: format!("{host}:{port}"),
        source,
    })
}

/// Outcome of `RunningServer::stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    /// All in-flight requests finished within the grace period.
    pub drained: bool,
    /// Requests still in flight when the listeners were closed.
    pub abandoned: usize,
    pub elapsed: Duration,
}

/// Handle to the started listener set.
pub struct RunningServer {
    listeners: Vec<(ListenerKind, SocketAddr)>,
    handles: Vec<Handle>,
    tasks: Vec<JoinHandle<io::Result<()>>>,
    gate: Arc<GracefulGate>,
}

impl RunningServer {
    pub fn local_addrs(&self) -> &[(ListenerKind, SocketAddr)] {
        &self.listeners
    }

    pub fn local_addr(&self, kind: ListenerKind) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, addr)| *addr)
    }

    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    pub fn gate(&self) -> &Arc<GracefulGate> {
        &self.gate
    }

    /// Reject new requests, drain in-flight ones for up to `grace`, then close.
    pub async fn stop(self, grace: Duration) -> StopReport {
        let start = Instant::now();
        self.gate.begin_shutdown();

        let drained = self.gate.drain(grace).await;
        let abandoned = self.gate.in_flight();
        if !drained {
            tracing::warn!(abandoned, grace_secs = grace.as_secs(), "Grace period expired with requests in flight");
        }

        let remaining = grace.saturating_sub(start.elapsed());
        for handle in &self.handles {
            handle.graceful_shutdown(Some(remaining));
        }
        for result in join_all(self.tasks).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Listener terminated with error"),
                Err(e) => tracing::error!(error = %e, "Listener task failed"),
            }
        }

        let report = StopReport {
            drained,
            abandoned,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            drained = report.drained,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "HTTP server stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisioner(config: HostConfig, port_override: Option<u16>) -> ServerProvisioner {
        ServerProvisioner::new(Arc::new(config), port_override)
    }

    #[test]
    fn port_override_wins() {
        let provisioner = provisioner(HostConfig::default(), Some(9123));
        assert_eq!(provisioner.resolve_port().unwrap(), 9123);
    }

    #[test]
    fn preflight_failure_is_a_resource_error() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();

        let mut config = HostConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.check_port = true;

        let err = provisioner(config, Some(port)).resolve_port().unwrap_err();
        assert!(matches!(err, ProvisionError::Resource { .. }));
    }

    #[tokio::test]
    async fn tls_disabled_touches_nothing() {
        let provisioner = provisioner(HostConfig::default(), None);
        assert!(provisioner.enable_tls().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tls_requested_with_missing_files_fails() {
        let mut config = HostConfig::default();
        config.https.enabled = true;
        config.https.cert_path = "/nonexistent/cert.pem".into();
        let err = provisioner(config, None).enable_tls().await.unwrap_err();
        assert!(matches!(err, ProvisionError::Security(TlsError::MissingFile(_))));
    }

    #[test]
    fn plan_includes_enabled_listeners() {
        let mut config = HostConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.alt.enabled = true;
        let plan = provisioner(config, None).listener_plan(0).unwrap();

        let kinds: Vec<_> = plan.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ListenerKind::Http, ListenerKind::Alt]);
        assert_eq!(plan[1].addr.port(), 8009);
    }

    #[test]
    fn prod_mode_scales_workers() {
        let mut config = HostConfig::default();
        config.server.mode = ServerMode::Prod;
        let pool = provisioner(config, None).worker_pool(16);
        assert_eq!(pool, WorkerPool { core: 128, max: 256 });
    }
}
