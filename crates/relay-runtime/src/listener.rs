//! # Listener
//!
//! Accepts inbound TCP connections and runs one server-role session per
//! connection. The author port consults an address whitelist before any
//! session exists.
//!
//! On shutdown the listener stops accepting, lets running sessions move to
//! CLOSING, waits up to `close_grace` plus a margin, then drops whatever is
//! left.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use ipnet::IpNet;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use vr_01_transport::{run_session, SessionContext, SessionRole};
use vr_telemetry::CONNECTIONS_REFUSED;

/// Extra time allowed past `close_grace` before sessions are dropped.
const SHUTDOWN_MARGIN: Duration = Duration::from_secs(1);

/// Networks allowed to open sessions.
#[derive(Debug, Clone)]
pub struct AddressWhitelist {
    networks: Vec<IpNet>,
}

impl AddressWhitelist {
    pub fn new(networks: Vec<IpNet>) -> Self {
        Self { networks }
    }

    pub fn allows(&self, addr: IpAddr) -> bool {
        let addr = addr.to_canonical();
        self.networks.iter().any(|net| net.contains(&addr))
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

/// A bound listening socket serving one session role.
pub struct Listener {
    listener: TcpListener,
    role: SessionRole,
    whitelist: Option<AddressWhitelist>,
    ctx: Arc<SessionContext>,
}

impl Listener {
    pub async fn bind(
        addr: SocketAddr,
        role: SessionRole,
        whitelist: Option<AddressWhitelist>,
        ctx: Arc<SessionContext>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            role,
            whitelist,
            ctx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Accept until `shutdown` turns `true`, then drain. Returns the number
    /// of sessions started.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let local = self.local_addr().ok();
        info!(role = %self.role, addr = ?local, "listening");

        let mut sessions = JoinSet::new();
        let mut started = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if self.admit(&stream, peer) {
                            started += 1;
                            sessions.spawn(run_session(
                                stream,
                                self.role,
                                None,
                                Arc::clone(&self.ctx),
                                shutdown.clone(),
                            ));
                        }
                    }
                    Err(e) => {
                        warn!(role = %self.role, error = %e, "accept failed");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        drop(self.listener);
        let grace = self.ctx.config.close_grace + SHUTDOWN_MARGIN;
        debug!(role = %self.role, live = sessions.len(), "draining sessions");
        let drained = tokio::time::timeout(grace, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(role = %self.role, remaining = sessions.len(), "dropping sessions after grace period");
            sessions.shutdown().await;
        }

        info!(role = %self.role, sessions = started, "listener stopped");
        started
    }

    fn admit(&self, stream: &TcpStream, peer: SocketAddr) -> bool {
        if let Some(whitelist) = &self.whitelist {
            if !whitelist.allows(peer.ip()) {
                CONNECTIONS_REFUSED.inc();
                warn!(role = %self.role, peer = %peer, "connection refused by whitelist");
                return false;
            }
        }
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer, error = %e, "set_nodelay failed");
        }
        debug!(role = %self.role, peer = %peer, "connection accepted");
        true
    }
}
