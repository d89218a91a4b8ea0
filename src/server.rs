//! The connection supervisor: owns the listener, enforces the admission
//! ceiling, tracks live connections, and coordinates graceful shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::command::{self, Context, Router};
use crate::config::Config;
use crate::connection::Connection;
use crate::error::{ErrorCode, VerdisError};
use crate::mvcc::Engine;

const BIND_MAX_RETRIES: u32 = 3;
const BIND_INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const BIND_MAX_BACKOFF: Duration = Duration::from_secs(2);
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(50);

pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    router: Arc<Router>,
    permits: Arc<Semaphore>,
    conns: Arc<Mutex<HashMap<u64, CancellationToken>>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Server {
    /// Validate the configuration and wire up the engine and router. The
    /// router is registered once here and published immutably.
    pub fn new(config: Config) -> Result<Self, VerdisError> {
        config.validate()?;

        let engine = Arc::new(Engine::new(config.engine.clone()));
        let mut router = Router::new(Context {
            engine: engine.clone(),
        });
        command::register_all(&mut router)?;

        Ok(Server {
            permits: Arc::new(Semaphore::new(config.max_connections)),
            config,
            engine,
            router: Arc::new(router),
            conns: Arc::new(Mutex::new(HashMap::new())),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn engine(&self) -> Arc<Engine> {
        self.engine.clone()
    }

    /// Token observed by every task this server spawns. Cancelling it (or
    /// calling [`Server::shutdown`]) starts a graceful shutdown; doing so
    /// twice is harmless.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Bind, accept, and serve until shutdown. Returns after every
    /// connection task has drained.
    pub async fn run(&self) -> Result<(), VerdisError> {
        let listener = self.bind_with_retry().await?;
        info!(address = %self.config.address(), "verdis listening");

        self.spawn_pruner();

        let mut next_id: u64 = 0;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        // Admission control: reject on the spot, never block
                        // the accept loop.
                        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                            debug!(%peer, "connection limit reached, closing");
                            drop(stream);
                            continue;
                        };

                        next_id += 1;
                        let id = next_id;
                        let cancel = self.shutdown.child_token();
                        lock(&self.conns).insert(id, cancel.clone());
                        debug!(%peer, id, "accepted connection");

                        let conn = Connection::new(stream, &self.config);
                        let router = self.router.clone();
                        let conns = self.conns.clone();
                        self.tracker.spawn(async move {
                            if let Err(err) = conn.serve(router, cancel).await {
                                debug!(id, error = %err, "connection closed with error");
                            }
                            lock(&conns).remove(&id);
                            drop(permit);
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                    }
                },
            }
        }

        // Shutdown: the listener closes first, then every live connection is
        // cancelled, then we join the serve tasks.
        drop(listener);
        for (_, cancel) in lock(&self.conns).drain() {
            cancel.cancel();
        }
        self.tracker.close();
        self.tracker.wait().await;
        info!("server stopped");
        Ok(())
    }

    /// Bind the listener, retrying with exponential backoff only when the
    /// address is still in use; any other bind failure is immediately fatal.
    async fn bind_with_retry(&self) -> Result<TcpListener, VerdisError> {
        let addr = self.config.address();
        let mut backoff = BIND_INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            match TcpListener::bind(&addr).await {
                Ok(listener) => return Ok(listener),
                Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                    if attempt >= BIND_MAX_RETRIES {
                        return Err(VerdisError::wrap(
                            err,
                            ErrorCode::Busy,
                            format!("address {addr} is already in use"),
                        )
                        .with("attempts", attempt + 1));
                    }
                    attempt += 1;
                    warn!(%addr, attempt, "address in use, retrying");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            return Err(VerdisError::new(
                                ErrorCode::Err,
                                "shutdown requested during bind",
                            ));
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(BIND_MAX_BACKOFF);
                }
                Err(err) => {
                    return Err(VerdisError::wrap(
                        err,
                        ErrorCode::Internal,
                        format!("failed to bind {addr}"),
                    ));
                }
            }
        }
    }

    /// Background retention pruning; never blocks a foreground operation.
    fn spawn_pruner(&self) {
        if self.config.prune_interval_ms == 0 {
            return;
        }
        let engine = self.engine.clone();
        let cancel = self.shutdown.child_token();
        let period = Duration::from_millis(self.config.prune_interval_ms);
        self.tracker.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        engine.prune();
                    }
                }
            }
        });
    }
}

/// Lock the connection registry, recovering from a poisoned mutex; the map
/// holds only cancellation tokens, which cannot be left inconsistent.
fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
