//! HTTP server bootstrap.
//!
//! A [`Server`] is built from an [`AppConfig`]: configured caches are opened
//! and started, the router backend named by `router.provider` is prepared
//! with the favicon and static directories, and controller routes are added
//! through [`Server::router_mut`]. Serving speaks HTTP/1.1 through hyper.
//!
//! Each request body is collected before dispatch. The handler runs on its
//! own task with a [`CancelSignal`] attached; if the connection stops
//! waiting for the response the signal fires and the controller answers
//! 499 without rendering.
//!
//! # Example
//!
//! ```rust,no_run
//! use keel_config::AppConfig;
//! use keel_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_file("config.json")?;
//!     let server = Server::from_config(config)?;
//!     server.init_logging()?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use keel_cache::Cache;
use keel_config::AppConfig;
use keel_core::{text_response, CancelSignal, Handler, Request, RequestId, Response};
use keel_middleware::{stages, Chain};
use keel_telemetry::LogConfig;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::manager::RouterManager;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Shutdown timeout used when the config sets none.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// A configured application server.
pub struct Server {
    config: AppConfig,
    router: RouterManager,
    caches: HashMap<String, Arc<dyn Cache>>,
}

impl Server {
    /// Creates a server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Builds a server from a loaded configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let mut caches = HashMap::new();
        for cache in &config.caches {
            if cache.provider.is_empty() {
                continue;
            }
            let cycle = cache.cycle_duration().unwrap_or(Duration::ZERO);
            let handle =
                keel_cache::open(&cache.provider, cycle).map_err(|source| ServerError::Cache {
                    provider: cache.provider.clone(),
                    source,
                })?;
            caches.insert(cache.provider.clone(), handle);
        }

        if config.router.provider.is_empty() {
            return Err(ServerError::NoRouterConfig);
        }
        let mut router = RouterManager::get(&config.router.provider)?;
        let app_path = Path::new(&config.server.app_path);
        if let Some(favicon) = &config.router.favicon {
            router.favicon(resolve(app_path, favicon));
        }
        for dir in &config.router.directories {
            router.public_dir(&dir.url, resolve(app_path, &dir.source));
        }

        Ok(Self {
            config,
            router,
            caches,
        })
    }

    /// The configuration the server was built from.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The router routes are registered on.
    pub fn router(&self) -> &RouterManager {
        &self.router
    }

    /// Mutable access to the router, for registering routes.
    pub fn router_mut(&mut self) -> &mut RouterManager {
        &mut self.router
    }

    /// The cache opened for `provider`, if configured.
    pub fn cache(&self, provider: &str) -> Option<Arc<dyn Cache>> {
        self.caches.get(provider).cloned()
    }

    /// Installs the global tracing subscriber from the `logging` section.
    pub fn init_logging(&self) -> Result<(), ServerError> {
        let log_config = self
            .config
            .logging
            .as_ref()
            .map_or_else(LogConfig::default, |logging| {
                LogConfig::from_level(logging.level.clone(), logging.json)
            });
        keel_telemetry::init_logging(&log_config)?;
        Ok(())
    }

    /// `host:port` the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.http_port)
    }

    /// How long shutdown waits for open connections.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(
            self.config
                .server
                .shutdown_timeout_secs
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        )
    }

    /// Materializes the router with request ids and access logging.
    pub fn handler(&self) -> Result<Handler, ServerError> {
        let routes = self.router.handler()?;
        Ok(Chain::new([stages::request_id(), stages::access_log()]).handle(routes))
    }

    /// Serves until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| ServerError::Bind(format!("failed to bind {addr}: {err}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from `listener` until `shutdown` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let handler = self.handler()?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, app_path = %self.config.server.app_path, "server listening");

        let tracker = ConnectionTracker::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let handler = Arc::clone(&handler);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, handler, shutdown).await {
                                debug!(remote = %remote_addr, error = %err, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(err) => error!(error = %err, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    info!("shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        let timeout = self.shutdown_timeout();
        info!(
            timeout_secs = timeout.as_secs(),
            connections = tracker.active_connections(),
            "waiting for connections to close"
        );
        tokio::select! {
            () = tracker.wait_for_shutdown() => info!("all connections closed"),
            () = tokio::time::sleep(timeout) => warn!(
                connections = tracker.active_connections(),
                "shutdown timeout reached"
            ),
        }

        info!("server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("addr", &self.bind_addr())
            .field("router", &self.router)
            .field("caches", &self.caches.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn resolve(app_path: &Path, path: &Path) -> PathBuf {
    if path.is_relative() && !app_path.as_os_str().is_empty() {
        app_path.join(path)
    } else {
        path.to_path_buf()
    }
}

async fn handle_connection(
    stream: TcpStream,
    handler: Handler,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: http::Request<Incoming>| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, Infallible>(dispatch(handler, req).await) }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => return result,
        () = shutdown.recv() => {
            debug!("finishing connection for shutdown");
            conn.as_mut().graceful_shutdown();
        }
    }
    conn.await
}

/// Runs `handler` for one inbound request.
///
/// Dropping the returned future before it completes cancels the request.
async fn dispatch(handler: Handler, req: http::Request<Incoming>) -> Response {
    let (parts, body) = req.into_parts();
    let body: Bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            return text_response(StatusCode::BAD_REQUEST, "400 bad request\n");
        }
    };

    let mut req = Request::from_parts(parts, Full::new(body));
    let request_id = RequestId::new();
    req.extensions_mut().insert(request_id);
    let signal = CancelSignal::new();
    signal.attach(&mut req);

    let guard = signal.guard();
    let result = tokio::spawn(handler(req)).await;
    guard.disarm();

    match result {
        Ok(response) => response,
        Err(err) => {
            error!(%request_id, error = %err, "request handler failed");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error\n")
        }
    }
}

/// Builder for [`Server`].
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: Option<AppConfig>,
    config_file: Option<PathBuf>,
}

impl ServerBuilder {
    /// A builder with no configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an already loaded configuration.
    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads the configuration from a JSON or TOML file on build.
    #[must_use]
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Builds the server.
    ///
    /// Fails with [`ServerError::ConfigNotLoaded`] when neither a config nor
    /// a config file was given.
    pub fn build(self) -> Result<Server, ServerError> {
        let config = match (self.config, self.config_file) {
            (Some(config), _) => config,
            (None, Some(path)) => AppConfig::from_file(path)?,
            (None, None) => return Err(ServerError::ConfigNotLoaded),
        };
        Server::from_config(config)
    }
}
