//! MCP server implementation - connection acceptor and per-connection loop

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use futures::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dispatcher::Dispatcher;
use super::router::{is_protocol_path, Router};
use super::session::SessionRegistry;
use crate::config::ServerConfig;
use crate::http::{
    wants_keep_alive, AssembleError, Assembly, ConnectionDirective, HttpResponse, RawRequest,
    RequestAssembler,
};
use crate::http_logger;
use crate::library::Library;
use crate::tools::{library_tools, ToolRegistry};

/// State shared by the acceptor, connection routines and the sweep task
struct ServerState {
    config: Arc<ServerConfig>,
    router: Router,
}

/// MCP Server
pub struct McpServer {
    state: Arc<ServerState>,
}

/// Running server; dropping it leaves the listener running until `stop`
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    sweep_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and close the listener; in-flight connections finish on their own
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.accept_task.await {
            warn!("Accept task ended abnormally: {}", e);
        }
        if let Err(e) = self.sweep_task.await {
            warn!("Sweep task ended abnormally: {}", e);
        }
        info!("Server on {} stopped", self.local_addr);
    }

    /// Wait until the listener stops
    pub async fn wait(self) -> Result<()> {
        self.accept_task
            .await
            .map_err(|e| anyhow!("Accept task failed: {}", e))?;
        self.sweep_task.abort();
        Ok(())
    }
}

impl McpServer {
    pub fn new(config: Arc<ServerConfig>, tools: ToolRegistry) -> Self {
        let sessions = Arc::new(SessionRegistry::new(config.session_timeout));
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(tools), sessions));
        Self {
            state: Arc::new(ServerState {
                router: Router::new(dispatcher),
                config,
            }),
        }
    }

    /// Build a server exposing the configured library's tools
    pub fn with_library(config: Arc<ServerConfig>) -> Result<Self> {
        let library = match &config.library_path {
            Some(path) => Library::load(path)?,
            None => Library::default(),
        };
        let mut tools = ToolRegistry::new();
        library_tools::register(&mut tools, Arc::new(library))?;
        Ok(Self::new(config, tools))
    }

    pub fn router(&self) -> &Router {
        &self.state.router
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        self.state.router.dispatcher()
    }

    /// Bind the configured address and start serving
    pub async fn start(&self) -> Result<ServerHandle> {
        let address = self.state.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| anyhow!("Failed to bind {}: {}", address, e))?;
        self.serve(listener)
    }

    /// Serve on an already bound listener
    pub fn serve(&self, listener: TcpListener) -> Result<ServerHandle> {
        let local_addr = listener.local_addr()?;
        self.state.router.set_local_addr(local_addr);
        info!("MCP server listening on http://{}/mcp", local_addr);

        let (shutdown, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            self.state.clone(),
            listener,
            shutdown_rx.clone(),
        ));
        let sweep_task = tokio::spawn(sweep_loop(self.state.clone(), shutdown_rx));

        Ok(ServerHandle {
            local_addr,
            shutdown,
            accept_task,
            sweep_task,
        })
    }
}

/// Accept connections until shutdown; each one gets its own routine
async fn accept_loop(
    state: Arc<ServerState>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        let state = state.clone();
                        tokio::spawn(async move {
                            handle_connection(state, stream, peer).await;
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }
    info!("Listener closed");
}

/// Periodically expire idle sessions
async fn sweep_loop(state: Arc<ServerState>, mut shutdown: watch::Receiver<bool>) {
    let period = state.config.sweep_interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    let sessions = state.router.dispatcher().sessions().clone();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                sessions.sweep().await;
            }
        }
    }
}

/// Serve requests on one connection until it closes, idles out or asks to close
async fn handle_connection(state: Arc<ServerState>, stream: TcpStream, peer: SocketAddr) {
    let config = &state.config;
    let (reader, mut writer) = stream.into_split();
    let mut assembler = RequestAssembler::new(reader, config.read_policy.clone());
    let mut served = 0usize;

    loop {
        let first_byte_wait = (served > 0).then_some(config.keep_alive.timeout);
        let assembly = match assembler.next_request(first_byte_wait).await {
            Ok(assembly) => assembly,
            Err(AssembleError::BodyTooLarge { declared, limit }) => {
                warn!(
                    "Rejecting {} byte body from {} (limit {})",
                    declared, peer, limit
                );
                let response = HttpResponse::text(413, "Payload Too Large");
                if let Err(e) = response.write_to(&mut writer, ConnectionDirective::Close).await {
                    debug!("Write to {} failed: {}", peer, e);
                }
                break;
            }
            Err(AssembleError::InvalidContentLength(raw)) => {
                warn!("Invalid Content-Length {:?} from {}", raw, peer);
                let response = HttpResponse::bad_request("Bad Request");
                if let Err(e) = response.write_to(&mut writer, ConnectionDirective::Close).await {
                    debug!("Write to {} failed: {}", peer, e);
                }
                break;
            }
            Err(AssembleError::Io(e)) => {
                debug!("Read from {} failed: {}", peer, e);
                break;
            }
        };

        let (block, complete) = match assembly {
            Assembly::Empty => {
                if served == 0 {
                    debug!("Empty probe from {}, closing without response", peer);
                }
                break;
            }
            Assembly::Request { block, complete } => (block, complete),
        };

        served += 1;
        let started = Instant::now();

        let (request, response) = match RawRequest::parse(&block) {
            Ok(request) => {
                let response = route_guarded(&state.router, &request).await;
                (Some(request), response)
            }
            Err(e) => {
                warn!("Malformed request from {}: {}", peer, e);
                (None, HttpResponse::bad_request("Bad Request"))
            }
        };

        let keep_alive = request
            .as_ref()
            .map(|r| wants_keep_alive(is_protocol_path(&r.path), r.header("Connection")))
            .unwrap_or(false)
            && complete
            && served < config.keep_alive.max_requests
            && !assembler.is_eof();

        let directive = if keep_alive {
            ConnectionDirective::KeepAlive {
                timeout_secs: config.keep_alive.timeout.as_secs(),
                max_requests: config.keep_alive.max_requests - served,
            }
        } else {
            ConnectionDirective::Close
        };

        if let Err(e) = response.write_to(&mut writer, directive).await {
            debug!("Write to {} failed: {}", peer, e);
            break;
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(req) = &request {
            info!(
                "{} {} {} -> {} ({} bytes, {}ms)",
                peer,
                req.method,
                req.path,
                response.status,
                response.content_length(),
                elapsed_ms
            );
        }
        http_logger::log_exchange(
            &config.http_log_dir,
            &peer.to_string(),
            request.as_ref(),
            &response,
            directive,
            elapsed_ms,
        );

        if !directive.is_keep_alive() {
            break;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of {} failed: {}", peer, e);
    }
}

/// Route with panics converted into a 500 so one request never takes down the listener
async fn route_guarded(router: &Router, request: &RawRequest) -> HttpResponse {
    match AssertUnwindSafe(router.route(request)).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            error!("Request handler panicked for {} {}", request.method, request.path);
            HttpResponse::internal_error()
        }
    }
}
