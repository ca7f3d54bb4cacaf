//! # Relay Node
//!
//! Wires the subsystems together and owns their tasks.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Build duplicate filter, handler pipeline, registry and router
//! 3. Bind the author and subscriber ports
//! 4. Start the reconnection supervisor for configured feeds
//!
//! ```text
//!  author port ──→ Listener(author-server) ──┐
//!                                             ├──→ Router ──→ Registry ──→ subscriber sessions
//!  feeds ──→ ReconnectionSupervisor ─────────┘                    ↑
//!  subscriber port ──→ Listener(subscriber-server) ── register ───┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};
use vr_01_transport::{SessionContext, SessionRole};
use vr_02_dedup::DuplicateFilter;
use vr_03_routing::{EventFilter, FaultPolicy, HandlerPipeline, Router, SubscriptionRegistry};
use vr_04_supervisor::{Connector, FeedStatus, ReconnectionSupervisor, TcpConnector};

use crate::adapters::{
    EventWriter, IdentityAllowList, LogEventHandler, RegistrationObserver, RoleFilter,
};
use crate::config::{HandlerConfig, RelayConfig};
use crate::listener::{AddressWhitelist, Listener};

/// A running relay.
pub struct RelayNode {
    router: Arc<Router>,
    author_addr: Option<SocketAddr>,
    subscriber_addr: Option<SocketAddr>,
    supervisor: ReconnectionSupervisor,
    listeners: JoinSet<usize>,
    shutdown_tx: watch::Sender<bool>,
    config: RelayConfig,
}

impl RelayNode {
    /// Start with plain TCP for outbound feeds.
    pub async fn start(config: RelayConfig) -> Result<Self> {
        Self::start_with_connector(config, Arc::new(TcpConnector::default())).await
    }

    pub async fn start_with_connector(
        config: RelayConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let filter = Arc::new(DuplicateFilter::new(config.dedup.clone()));
        let registry = Arc::new(SubscriptionRegistry::new(config.routing.max_send_failures));
        let router = Arc::new(Router::new(
            filter,
            build_pipeline(&config.handlers),
            Arc::clone(&registry),
        ));

        let subscriber_filter = RoleFilter::from_roles(&config.handlers.subscriber_roles)
            .map(|f| Arc::new(f) as Arc<dyn EventFilter>);
        let authorizer = IdentityAllowList::new(config.network.allowed_identities.clone());
        let ctx = Arc::new(SessionContext {
            local_identity: config.local_ivo.clone(),
            config: config.session.clone(),
            sink: router.clone(),
            authorizer: Arc::new(authorizer),
            observer: Arc::new(RegistrationObserver::new(registry, subscriber_filter)),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut listeners = JoinSet::new();

        let author_addr = match config.network.author_addr {
            Some(addr) => {
                let whitelist = AddressWhitelist::new(config.network.whitelist_networks()?);
                if whitelist.is_empty() {
                    warn!("author whitelist is empty; every submission will be refused");
                }
                let listener =
                    Listener::bind(addr, SessionRole::AuthorServer, Some(whitelist), ctx.clone())
                        .await
                        .with_context(|| format!("failed to bind author port {addr}"))?;
                let bound = listener.local_addr()?;
                listeners.spawn(listener.run(shutdown_rx.clone()));
                Some(bound)
            }
            None => None,
        };

        let subscriber_addr = match config.network.subscriber_addr {
            Some(addr) => {
                let listener =
                    Listener::bind(addr, SessionRole::SubscriberServer, None, ctx.clone())
                        .await
                        .with_context(|| format!("failed to bind subscriber port {addr}"))?;
                let bound = listener.local_addr()?;
                listeners.spawn(listener.run(shutdown_rx.clone()));
                Some(bound)
            }
            None => None,
        };

        let supervisor = ReconnectionSupervisor::start(
            config.feeds.clone(),
            config.backoff.clone(),
            ctx,
            connector,
            shutdown_rx,
        )
        .context("failed to start feeds")?;

        info!(
            local_ivo = %config.local_ivo,
            author = ?author_addr,
            subscriber = ?subscriber_addr,
            feeds = config.feeds.len(),
            handlers = ?router.pipeline().names(),
            "relay started"
        );

        Ok(Self {
            router,
            author_addr,
            subscriber_addr,
            supervisor,
            listeners,
            shutdown_tx,
            config,
        })
    }

    /// Bound author port, if enabled.
    pub fn author_addr(&self) -> Option<SocketAddr> {
        self.author_addr
    }

    /// Bound subscriber port, if enabled.
    pub fn subscriber_addr(&self) -> Option<SocketAddr> {
        self.subscriber_addr
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.router.registry()
    }

    pub fn feed_status(&self, address: &str) -> Option<FeedStatus> {
        self.supervisor.feed_status(address)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Stop accepting, close every session and wait for the tasks.
    ///
    /// Sessions get `close_grace` to settle outstanding acknowledgements;
    /// anything still running after that is dropped.
    pub async fn shutdown(mut self) {
        info!("initiating graceful shutdown");
        if self.shutdown_tx.send(true).is_err() {
            warn!("no task was listening for shutdown");
        }

        let mut served = 0;
        while let Some(result) = self.listeners.join_next().await {
            match result {
                Ok(count) => served += count,
                Err(e) => warn!(error = %e, "listener task ended abnormally"),
            }
        }

        let grace = self.config.session.close_grace * 2;
        if tokio::time::timeout(grace, self.supervisor.join())
            .await
            .is_err()
        {
            warn!("feed sessions did not close in time");
        }

        info!(sessions = served, "shutdown complete");
    }
}

/// Handlers in registration order: log-event, then save-event.
fn build_pipeline(config: &HandlerConfig) -> HandlerPipeline {
    let mut pipeline = HandlerPipeline::new();
    if config.log_events {
        pipeline.push(Arc::new(LogEventHandler), FaultPolicy::Continue);
    }
    if let Some(dir) = &config.save_directory {
        pipeline.push(Arc::new(EventWriter::new(dir.clone())), FaultPolicy::Continue);
    }
    pipeline
}
