//! Typed configuration structures.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ConfigResult;
use crate::validate;

/// Network endpoint written as `[host, port]` in configuration documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, u16)", into = "(String, u16)")]
pub struct HostPort {
    /// Host name or address literal.
    pub host: String,
    /// Port number.
    pub port: u16,
}

impl HostPort {
    /// Construct an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<(String, u16)> for HostPort {
    fn from((host, port): (String, u16)) -> Self {
        Self { host, port }
    }
}

impl From<HostPort> for (String, u16) {
    fn from(value: HostPort) -> Self {
        (value.host, value.port)
    }
}

impl Display for HostPort {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(formatter, "[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "{}:{}", self.host, self.port)
        }
    }
}

/// Join endpoints into the comma-separated form used by engine settings.
#[must_use]
pub fn join_endpoints(endpoints: &[HostPort]) -> String {
    endpoints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Distributed hash table options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DhtOptions {
    /// Override for the DHT enable flag.
    pub enabled: Option<bool>,
    /// Replacement bootstrap node list.
    pub bootstrap_nodes: Option<Vec<HostPort>>,
}

/// Proxy protocols accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyKind {
    /// No proxy.
    #[default]
    None,
    /// SOCKS4 proxy.
    Socks4,
    /// SOCKS5 proxy.
    Socks5,
    /// SOCKS5 proxy with credentials.
    Socks5Pw,
    /// HTTP proxy.
    Http,
    /// HTTP proxy with credentials.
    HttpPw,
    /// I2P SAM bridge.
    I2pProxy,
}

impl ProxyKind {
    /// Whether this proxy kind authenticates with username and password.
    #[must_use]
    pub const fn requires_credentials(self) -> bool {
        matches!(self, Self::Socks5Pw | Self::HttpPw)
    }
}

/// Proxy options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyOptions {
    /// Proxy protocol.
    #[serde(rename = "type")]
    pub kind: ProxyKind,
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Optional username.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional password.
    #[serde(default)]
    pub password: Option<String>,
    /// Route hostnames, peer and tracker connections through the proxy.
    #[serde(default)]
    pub force: bool,
    /// Resolve hostnames through the proxy.
    #[serde(default)]
    pub force_hostnames: bool,
    /// Route peer connections through the proxy.
    #[serde(default)]
    pub force_peer_connections: bool,
    /// Route tracker connections through the proxy.
    #[serde(default)]
    pub force_tracker_connections: bool,
}

impl ProxyOptions {
    /// Effective hostname proxying flag.
    #[must_use]
    pub const fn proxies_hostnames(&self) -> bool {
        self.force || self.force_hostnames
    }

    /// Effective peer connection proxying flag.
    #[must_use]
    pub const fn proxies_peer_connections(&self) -> bool {
        self.force || self.force_peer_connections
    }

    /// Effective tracker connection proxying flag.
    #[must_use]
    pub const fn proxies_tracker_connections(&self) -> bool {
        self.force || self.force_tracker_connections
    }
}

/// Shutdown behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShutdownOptions {
    /// Upper bound on waiting for resume data at shutdown.
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self {
            drain_timeout_ms: defaults::drain_timeout_ms(),
        }
    }
}

/// Options consumed by session initialisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOptions {
    /// DHT options.
    pub dht: DhtOptions,
    /// Listen (and outgoing) interfaces.
    pub listen_interfaces: Option<Vec<HostPort>>,
    /// Force encrypted peer connections in both directions.
    pub require_encryption: Option<bool>,
    /// Proxy configuration.
    pub proxy: Option<ProxyOptions>,
    /// Shutdown behaviour.
    pub shutdown: ShutdownOptions,
}

impl SessionOptions {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] for the first invalid value.
    pub fn validate(&self) -> ConfigResult<()> {
        validate::validate_session(self)
    }
}

/// Options consumed when restoring persisted transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Default save path for later add calls.
    pub save_path: Option<String>,
    /// Interval between statistics requests.
    pub stats_interval_ms: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            save_path: None,
            stats_interval_ms: defaults::stats_interval_ms(),
        }
    }
}

impl LoadOptions {
    /// Validate load options.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] when the interval is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        validate::validate_load(self)
    }
}

/// Tags supplied either as one label or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    /// Single label.
    One(String),
    /// List of labels.
    Many(Vec<String>),
}

impl Tags {
    /// Normalise into a list.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(tag) => vec![tag],
            Self::Many(tags) => tags,
        }
    }
}

impl From<&str> for Tags {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<String>> for Tags {
    fn from(value: Vec<String>) -> Self {
        Self::Many(value)
    }
}

/// Options for a single add call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddOptions {
    /// Save path override.
    pub save_path: Option<String>,
    /// Labels attached to the transfer.
    pub tags: Option<Tags>,
}

impl AddOptions {
    /// Set the save path.
    #[must_use]
    pub fn with_save_path(mut self, save_path: impl Into<String>) -> Self {
        self.save_path = Some(save_path.into());
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Normalised tag list; empty when no tags were supplied.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        self.tags.clone().map(Tags::into_vec).unwrap_or_default()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// Structured JSON lines.
    Json,
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingOptions {
    /// Filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Durable store options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseOptions {
    /// Database connection URL.
    pub url: String,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            url: defaults::database_url(),
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedlineConfig {
    /// Session initialisation options.
    pub session: SessionOptions,
    /// Transfer restoration options.
    pub load: LoadOptions,
    /// Logging options.
    pub logging: LoggingOptions,
    /// Durable store options.
    pub database: DatabaseOptions,
}

impl SeedlineConfig {
    /// Validate every section of the document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] for the first invalid value.
    pub fn validate(&self) -> ConfigResult<()> {
        self.session.validate()?;
        self.load.validate()
    }
}
