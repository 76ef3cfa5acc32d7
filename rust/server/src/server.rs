use crate::connections::ConnectionMap;
use crate::events::EventBus;
use crate::handlers;
use crate::ledger::{BalanceLedger, InMemoryLedger};
use crate::records::{GameRecordStore, InMemoryRecordStore};
use crate::registry::{RegistryConfig, TableRegistry};
use crate::roster::{InMemoryTableStore, TableStore};
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;
use warp::filters::BoxedFilter;
use warp::{Filter, Reply};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Shared application state handed to every route.
#[derive(Clone)]
pub struct AppContext {
    config: ServerConfig,
    registry: Arc<TableRegistry>,
}

impl AppContext {
    /// Wires the registry to in-memory collaborators. Deployments that
    /// back the roster, ledger, or records with real storage construct
    /// the registry themselves and use [`AppContext::with_registry`].
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(TableRegistry::new(
            EventBus::new(),
            Arc::new(ConnectionMap::new()),
            Arc::new(InMemoryTableStore::new()) as Arc<dyn TableStore>,
            Arc::new(InMemoryLedger::new()) as Arc<dyn BalanceLedger>,
            Arc::new(InMemoryRecordStore::new()) as Arc<dyn GameRecordStore>,
            RegistryConfig::default(),
        ));
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: ServerConfig, registry: Arc<TableRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<TableRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn event_bus(&self) -> EventBus {
        self.registry.event_bus().clone()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            context: AppContext::new(config),
        }
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let config = context.config().clone();
        let bind_addr = Self::bind_addr(&config)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "table server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    fn routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let health = Self::health_route();
        let api_routes = Self::api_routes(context);
        let sse_routes = Self::sse_routes(context);

        health.or(api_routes).unify().or(sse_routes).unify().boxed()
    }

    fn health_route() -> BoxedFilter<(warp::reply::Response,)> {
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(|| handlers::health().into_response())
            .boxed()
    }

    fn api_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let registry = context.registry();

        let join = warp::path!("api" / "tables" / Uuid / "join")
            .and(warp::post())
            .and(Self::with_registry(registry.clone()))
            .and(warp::body::json())
            .and_then(
                |table_id: Uuid,
                 registry: Arc<TableRegistry>,
                 request: handlers::JoinTableRequest| async move {
                    let response = handlers::join_table(registry, table_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let leave = warp::path!("api" / "tables" / Uuid / "leave")
            .and(warp::post())
            .and(Self::with_registry(registry.clone()))
            .and(warp::body::json())
            .and_then(
                |table_id: Uuid,
                 registry: Arc<TableRegistry>,
                 request: handlers::LeaveTableRequest| async move {
                    let response = handlers::leave_table(registry, table_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let start = warp::path!("api" / "tables" / Uuid / "start")
            .and(warp::post())
            .and(Self::with_registry(registry.clone()))
            .and_then(|table_id: Uuid, registry: Arc<TableRegistry>| async move {
                let response = handlers::start_game(registry, table_id).await;
                Ok::<_, Infallible>(response)
            });

        let actions = warp::path!("api" / "tables" / Uuid / "actions")
            .and(warp::post())
            .and(Self::with_registry(registry.clone()))
            .and(warp::body::json())
            .and_then(
                |table_id: Uuid,
                 registry: Arc<TableRegistry>,
                 request: handlers::PlayerActionRequest| async move {
                    let response = handlers::submit_action(registry, table_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let state = warp::path!("api" / "tables" / Uuid / "state")
            .and(warp::get())
            .and(Self::with_registry(registry.clone()))
            .and_then(|table_id: Uuid, registry: Arc<TableRegistry>| async move {
                let response = handlers::get_state(registry, table_id).await;
                Ok::<_, Infallible>(response)
            });

        let hand = warp::path!("api" / "tables" / Uuid / "hand" / Uuid)
            .and(warp::get())
            .and(Self::with_registry(registry.clone()))
            .and_then(
                |table_id: Uuid, player_id: Uuid, registry: Arc<TableRegistry>| async move {
                    let response = handlers::get_hand(registry, table_id, player_id).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let chat = warp::path!("api" / "tables" / Uuid / "chat")
            .and(warp::post())
            .and(Self::with_registry(registry))
            .and(warp::body::json())
            .and_then(
                |table_id: Uuid,
                 registry: Arc<TableRegistry>,
                 request: handlers::ChatRequest| async move {
                    let response = handlers::send_chat(registry, table_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        join.or(leave)
            .unify()
            .or(start)
            .unify()
            .or(actions)
            .unify()
            .or(state)
            .unify()
            .or(hand)
            .unify()
            .or(chat)
            .unify()
            .boxed()
    }

    fn sse_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let registry = context.registry();

        warp::path!("api" / "events" / Uuid)
            .and(warp::get())
            .and(Self::with_registry(registry))
            .and_then(|conn_id: Uuid, registry: Arc<TableRegistry>| async move {
                let response = handlers::stream_events(conn_id, registry).await;
                Ok::<_, Infallible>(response)
            })
            .boxed()
    }

    fn with_registry(
        registry: Arc<TableRegistry>,
    ) -> impl Filter<Extract = (Arc<TableRegistry>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&registry))
    }
}

pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
