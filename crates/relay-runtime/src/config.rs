//! # Relay Configuration
//!
//! Unified configuration for the listeners, sessions, dedup, backoff, feeds
//! and handlers.
//!
//! ## Sources (later wins)
//!
//! 1. `Default` impls
//! 2. TOML file at `VR_CONFIG`, or `relay.toml` if present
//! 3. `VR_LOCAL_IVO`, `VR_AUTHOR_ADDR`, `VR_SUBSCRIBER_ADDR`
//!
//! ## File Format
//!
//! ```toml
//! [node]
//! local_ivo = "ivo://example.org/broker"
//!
//! [network]
//! author_addr = "0.0.0.0:8098"      # "" disables the author port
//! subscriber_addr = "0.0.0.0:8099"  # "" disables the subscriber port
//! whitelist = ["10.0.0.0/8"]
//! allowed_identities = []
//!
//! [session]
//! keepalive_interval_ms = 30000
//! idle_timeout_ms = 120000
//!
//! [dedup]
//! max_entries = 100000
//! retention_secs = 2592000          # 0 keeps entries until the cap evicts them
//!
//! [backoff]
//! min_ms = 1000
//! max_ms = 300000
//! multiplier = 2.0
//! stability_secs = 60
//!
//! [[feeds]]
//! address = "upstream.example.org:8099"
//! role = "subscribe"
//!
//! [handlers]
//! log_events = true
//! save_directory = "/var/lib/voevents"
//! subscriber_roles = ["observation"]
//!
//! [routing]
//! max_send_failures = 3
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ipnet::IpNet;
use serde::Deserialize;
use shared_types::{EventRole, IdentifierError};
use thiserror::Error;
use vr_01_transport::{FeedDirection, SessionConfig, SessionConfigError};
use vr_02_dedup::{DedupConfig, DedupConfigError};
use vr_03_routing::DEFAULT_MAX_SEND_FAILURES;
use vr_04_supervisor::{BackoffConfig, FeedConfig, SupervisorError};

/// Default path probed when `VR_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {error}")]
    Io { path: String, error: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("local_ivo must not be empty")]
    EmptyLocalIvo,

    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid whitelist entry {0:?}")]
    InvalidWhitelist(String),

    #[error("invalid feed role {0:?}, expected subscribe or publish")]
    InvalidFeedRole(String),

    #[error(transparent)]
    Role(#[from] IdentifierError),

    #[error(transparent)]
    Session(#[from] SessionConfigError),

    #[error(transparent)]
    Dedup(#[from] DedupConfigError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Identity sent as `Origin` in every control frame.
    pub local_ivo: String,
    pub network: NetworkConfig,
    pub session: SessionConfig,
    pub dedup: DedupConfig,
    pub backoff: BackoffConfig,
    pub feeds: Vec<FeedConfig>,
    pub handlers: HandlerConfig,
    pub routing: RoutingConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            local_ivo: "ivo://voevent-relay/default".to_string(),
            network: NetworkConfig::default(),
            session: SessionConfig::default(),
            dedup: DedupConfig::default(),
            backoff: BackoffConfig::default(),
            feeds: Vec::new(),
            handlers: HandlerConfig::default(),
            routing: RoutingConfig::default(),
        }
    }
}

/// Listening endpoints and peer admission.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Author (receiver) port. `None` disables it.
    pub author_addr: Option<SocketAddr>,
    /// Subscriber (publisher) port. `None` disables it.
    pub subscriber_addr: Option<SocketAddr>,
    /// Networks allowed to connect to the author port.
    pub whitelist: Vec<String>,
    /// Peer identities admitted at handshake. Empty admits everyone.
    pub allowed_identities: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            author_addr: Some(SocketAddr::from(([0, 0, 0, 0], 8098))),
            subscriber_addr: Some(SocketAddr::from(([0, 0, 0, 0], 8099))),
            whitelist: vec!["0.0.0.0/0".to_string(), "::/0".to_string()],
            allowed_identities: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Parsed whitelist networks.
    pub fn whitelist_networks(&self) -> Result<Vec<IpNet>, ConfigError> {
        self.whitelist
            .iter()
            .map(|entry| {
                entry
                    .trim()
                    .parse::<IpNet>()
                    .map_err(|_| ConfigError::InvalidWhitelist(entry.clone()))
            })
            .collect()
    }
}

/// Local event handlers.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub log_events: bool,
    /// Write every accepted event here when set.
    pub save_directory: Option<PathBuf>,
    /// Roles forwarded to downstream subscribers. Empty forwards all.
    pub subscriber_roles: Vec<EventRole>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            log_events: true,
            save_directory: None,
            subscriber_roles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub max_send_failures: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_send_failures: DEFAULT_MAX_SEND_FAILURES,
        }
    }
}

impl RelayConfig {
    /// Configuration for tests: loopback ephemeral ports and short timers.
    pub fn for_testing() -> Self {
        Self {
            local_ivo: "ivo://relay.test/broker".to_string(),
            network: NetworkConfig {
                author_addr: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                subscriber_addr: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                ..NetworkConfig::default()
            },
            session: SessionConfig::for_testing(),
            dedup: DedupConfig {
                max_entries: 1024,
                retention: None,
            },
            backoff: BackoffConfig::for_testing(),
            feeds: Vec::new(),
            handlers: HandlerConfig {
                log_events: false,
                ..HandlerConfig::default()
            },
            routing: RoutingConfig::default(),
        }
    }

    /// Load from the default sources: file (if any), then environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("VR_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            });

        let mut config = match path {
            Some(path) => Self::load_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a TOML file on top of the defaults.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse TOML content on top of the defaults. Missing keys keep their
    /// default value.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(ivo) = file.node.local_ivo {
            config.local_ivo = ivo;
        }

        let net = file.network;
        if let Some(addr) = net.author_addr {
            config.network.author_addr = parse_listen_addr("author_addr", &addr)?;
        }
        if let Some(addr) = net.subscriber_addr {
            config.network.subscriber_addr = parse_listen_addr("subscriber_addr", &addr)?;
        }
        if let Some(whitelist) = net.whitelist {
            config.network.whitelist = whitelist;
        }
        if let Some(ids) = net.allowed_identities {
            config.network.allowed_identities = ids;
        }

        let s = file.session;
        let session = &mut config.session;
        set_millis(&mut session.keepalive_interval, s.keepalive_interval_ms);
        set_millis(&mut session.idle_timeout, s.idle_timeout_ms);
        set_millis(&mut session.handshake_timeout, s.handshake_timeout_ms);
        set_millis(&mut session.close_grace, s.close_grace_ms);
        set_millis(&mut session.write_timeout, s.write_timeout_ms);
        set_millis(&mut session.ack_timeout, s.ack_timeout_ms);
        if let Some(limit) = s.max_consecutive_malformed {
            session.max_consecutive_malformed = limit;
        }
        if let Some(queue) = s.outbound_queue {
            session.outbound_queue = queue;
        }
        if let Some(bytes) = s.max_frame_bytes {
            session.max_frame_bytes = bytes;
        }

        if let Some(max) = file.dedup.max_entries {
            config.dedup.max_entries = max;
        }
        if let Some(secs) = file.dedup.retention_secs {
            config.dedup.retention = (secs > 0).then(|| Duration::from_secs(secs));
        }

        let b = file.backoff;
        set_millis(&mut config.backoff.min, b.min_ms);
        set_millis(&mut config.backoff.max, b.max_ms);
        if let Some(multiplier) = b.multiplier {
            config.backoff.multiplier = multiplier;
        }
        if let Some(secs) = b.stability_secs {
            config.backoff.stability = Duration::from_secs(secs);
        }

        config.feeds = file
            .feeds
            .into_iter()
            .map(FeedFile::into_feed)
            .collect::<Result<_, _>>()?;

        let h = file.handlers;
        if let Some(log) = h.log_events {
            config.handlers.log_events = log;
        }
        config.handlers.save_directory = h
            .save_directory
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);
        if let Some(roles) = h.subscriber_roles {
            config.handlers.subscriber_roles = roles
                .iter()
                .map(|r| r.parse::<EventRole>())
                .collect::<Result<_, _>>()?;
        }

        if let Some(max) = file.routing.max_send_failures {
            config.routing.max_send_failures = max;
        }

        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ivo) = lookup("VR_LOCAL_IVO") {
            self.local_ivo = ivo;
        }
        if let Some(addr) = lookup("VR_AUTHOR_ADDR") {
            self.network.author_addr = parse_listen_addr("author_addr", &addr)?;
        }
        if let Some(addr) = lookup("VR_SUBSCRIBER_ADDR") {
            self.network.subscriber_addr = parse_listen_addr("subscriber_addr", &addr)?;
        }
        Ok(())
    }

    /// Reject configurations the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_ivo.trim().is_empty() {
            return Err(ConfigError::EmptyLocalIvo);
        }
        self.network.whitelist_networks()?;
        self.session.validate()?;
        self.dedup.validate()?;
        self.backoff.validate()?;
        if let Some(feed) = self.feeds.iter().find(|f| f.address.trim().is_empty()) {
            return Err(ConfigError::InvalidAddress {
                field: "feeds.address",
                value: feed.address.clone(),
            });
        }
        Ok(())
    }
}

fn parse_listen_addr(field: &'static str, value: &str) -> Result<Option<SocketAddr>, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<SocketAddr>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

fn set_millis(target: &mut Duration, millis: Option<u64>) {
    if let Some(ms) = millis {
        *target = Duration::from_millis(ms);
    }
}

// ============================================================================
// File layout
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    node: NodeFile,
    #[serde(default)]
    network: NetworkFile,
    #[serde(default)]
    session: SessionFile,
    #[serde(default)]
    dedup: DedupFile,
    #[serde(default)]
    backoff: BackoffFile,
    #[serde(default)]
    feeds: Vec<FeedFile>,
    #[serde(default)]
    handlers: HandlersFile,
    #[serde(default)]
    routing: RoutingFile,
}

#[derive(Debug, Default, Deserialize)]
struct NodeFile {
    local_ivo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkFile {
    author_addr: Option<String>,
    subscriber_addr: Option<String>,
    whitelist: Option<Vec<String>>,
    allowed_identities: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionFile {
    keepalive_interval_ms: Option<u64>,
    idle_timeout_ms: Option<u64>,
    handshake_timeout_ms: Option<u64>,
    close_grace_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    ack_timeout_ms: Option<u64>,
    max_consecutive_malformed: Option<u32>,
    outbound_queue: Option<usize>,
    max_frame_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DedupFile {
    max_entries: Option<usize>,
    retention_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BackoffFile {
    min_ms: Option<u64>,
    max_ms: Option<u64>,
    multiplier: Option<f64>,
    stability_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FeedFile {
    address: String,
    #[serde(default = "default_feed_role")]
    role: String,
    #[serde(default = "default_true")]
    enabled: bool,
    expected_identity: Option<String>,
}

impl FeedFile {
    fn into_feed(self) -> Result<FeedConfig, ConfigError> {
        let direction = match self.role.trim().to_ascii_lowercase().as_str() {
            "subscribe" => FeedDirection::Subscribe,
            "publish" => FeedDirection::Publish,
            _ => return Err(ConfigError::InvalidFeedRole(self.role)),
        };
        Ok(FeedConfig {
            address: self.address,
            direction,
            enabled: self.enabled,
            expected_identity: self.expected_identity.filter(|id| !id.is_empty()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct HandlersFile {
    log_events: Option<bool>,
    save_directory: Option<String>,
    subscriber_roles: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingFile {
    max_send_failures: Option<u32>,
}

fn default_feed_role() -> String {
    "subscribe".to_string()
}

fn default_true() -> bool {
    true
}
