//! Engine-facing DTOs shared by the session and the engine adapters.

use serde::{Deserialize, Serialize};

use seedline_events::{InfoHash, TransferMetadata, TransferSnapshot, TransferState};

/// Engine-native reference to one managed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferHandle {
    /// Engine slot identifier.
    pub id: u64,
    /// Identity of the referenced transfer.
    pub info_hash: InfoHash,
}

impl TransferHandle {
    /// Construct a handle.
    #[must_use]
    pub const fn new(id: u64, info_hash: InfoHash) -> Self {
        Self { id, info_hash }
    }
}

/// Point-in-time status reported by the engine for one transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferStatus {
    /// Handle the status belongs to.
    pub handle: TransferHandle,
    /// Transfer identity.
    pub info_hash: InfoHash,
    /// Display name when metadata is known.
    pub name: Option<String>,
    /// Directory holding the payload.
    pub save_path: String,
    /// Engine lifecycle state.
    pub state: TransferState,
    /// Completion ratio between 0 and 1.
    pub progress: f32,
    /// Relative processing order.
    pub queue_position: i32,
    /// Current payload download rate in bytes per second.
    pub download_payload_rate: u64,
    /// Current payload upload rate in bytes per second.
    pub upload_payload_rate: u64,
    /// Cumulative payload bytes downloaded.
    pub total_payload_download: u64,
    /// Cumulative payload bytes uploaded.
    pub total_payload_upload: u64,
    /// Whether the handle still refers to a live transfer.
    pub is_valid: bool,
    /// Whether the descriptor metadata is known.
    pub has_metadata: bool,
    /// Whether resumable state changed since it was last saved.
    pub need_save_resume: bool,
    /// Whether the transfer is paused.
    pub paused: bool,
}

impl TransferStatus {
    /// Minimal status for a freshly referenced transfer.
    #[must_use]
    pub fn new(handle: TransferHandle, save_path: impl Into<String>) -> Self {
        Self {
            handle,
            info_hash: handle.info_hash,
            name: None,
            save_path: save_path.into(),
            state: TransferState::Unknown,
            progress: 0.0,
            queue_position: 0,
            download_payload_rate: 0,
            upload_payload_rate: 0,
            total_payload_download: 0,
            total_payload_upload: 0,
            is_valid: true,
            has_metadata: false,
            need_save_resume: false,
            paused: false,
        }
    }

    /// Whether a resume-data request is useful at shutdown.
    #[must_use]
    pub const fn wants_resume_save(&self) -> bool {
        self.is_valid && self.has_metadata && self.need_save_resume
    }

    /// Build the public snapshot for this status.
    #[must_use]
    pub fn snapshot(&self, metadata: TransferMetadata) -> TransferSnapshot {
        TransferSnapshot {
            info_hash: self.info_hash,
            name: self.name.clone(),
            state: self.state,
            progress: self.progress,
            queue_position: self.queue_position,
            download_payload_rate: self.download_payload_rate,
            upload_payload_rate: self.upload_payload_rate,
            total_payload_download: self.total_payload_download,
            total_payload_upload: self.total_payload_upload,
            save_path: self.save_path.clone(),
            paused: self.paused,
            metadata,
        }
    }
}

/// Parameters describing a requested addition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTransferParams {
    /// Identity, when known before submission.
    pub info_hash: Option<InfoHash>,
    /// Suggested display name.
    pub name: Option<String>,
    /// Directory the payload should be stored in.
    pub save_path: String,
    /// Tracker announce URLs.
    #[serde(default)]
    pub trackers: Vec<String>,
    /// Serialized descriptor, when metadata is already known.
    pub descriptor: Option<Vec<u8>>,
    /// Engine-private resumable progress.
    pub resume_state: Option<Vec<u8>>,
    /// Start the transfer paused.
    #[serde(default)]
    pub paused: bool,
}

impl AddTransferParams {
    /// Parameters carrying only the identity, used when no resume state exists.
    #[must_use]
    pub fn for_info_hash(info_hash: InfoHash) -> Self {
        Self {
            info_hash: Some(info_hash),
            ..Self::default()
        }
    }
}

/// Peer encryption policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionPolicy {
    /// Enforce encrypted peers exclusively.
    Require,
    /// Prefer encrypted peers but permit plaintext fallback.
    #[default]
    Prefer,
    /// Disable encrypted connections entirely.
    Disable,
}

impl EncryptionPolicy {
    #[must_use]
    /// Numeric representation used by engine settings packs.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Require => 0,
            Self::Prefer => 1,
            Self::Disable => 2,
        }
    }
}

/// Proxy protocols understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyType {
    /// No proxy.
    #[default]
    None,
    /// SOCKS4 proxy.
    Socks4,
    /// SOCKS5 proxy without authentication.
    Socks5,
    /// SOCKS5 proxy with username and password.
    Socks5Pw,
    /// HTTP proxy without authentication.
    Http,
    /// HTTP proxy with username and password.
    HttpPw,
    /// I2P SAM bridge.
    I2pProxy,
}

impl ProxyType {
    #[must_use]
    /// Numeric representation used by engine settings packs.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Socks4 => 1,
            Self::Socks5 => 2,
            Self::Socks5Pw => 3,
            Self::Http => 4,
            Self::HttpPw => 5,
            Self::I2pProxy => 6,
        }
    }
}

/// Proxy settings applied to engine connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Proxy protocol.
    pub kind: ProxyType,
    /// Proxy host.
    pub hostname: String,
    /// Proxy port.
    pub port: u16,
    /// Optional username.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Resolve hostnames through the proxy.
    pub proxy_hostnames: bool,
    /// Route peer connections through the proxy.
    pub proxy_peer_connections: bool,
    /// Route tracker connections through the proxy.
    pub proxy_tracker_connections: bool,
}

/// Effective engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Subscribe to every alert category.
    pub alert_mask_all: bool,
    /// Comma-separated `host:port` DHT bootstrap nodes.
    pub dht_bootstrap_nodes: String,
    /// Whether the DHT is enabled.
    pub enable_dht: bool,
    /// Whether local service discovery is enabled.
    pub enable_lsd: bool,
    /// Inbound encryption policy.
    pub in_enc_policy: EncryptionPolicy,
    /// Outbound encryption policy.
    pub out_enc_policy: EncryptionPolicy,
    /// Comma-separated `host:port` listen interfaces.
    pub listen_interfaces: Option<String>,
    /// Comma-separated `host:port` outgoing interfaces.
    pub outgoing_interfaces: Option<String>,
    /// Proxy configuration, if any.
    pub proxy: Option<ProxySettings>,
    /// Peer id prefix advertised to other peers.
    pub peer_fingerprint: String,
    /// HTTP user agent sent to trackers.
    pub user_agent: String,
    /// Seconds to wait for tracker stop announcements.
    pub stop_tracker_timeout_secs: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            alert_mask_all: false,
            dht_bootstrap_nodes: String::new(),
            enable_dht: true,
            enable_lsd: false,
            in_enc_policy: EncryptionPolicy::Prefer,
            out_enc_policy: EncryptionPolicy::Prefer,
            listen_interfaces: None,
            outgoing_interfaces: None,
            proxy: None,
            peer_fingerprint: String::new(),
            user_agent: String::new(),
            stop_tracker_timeout_secs: 5,
        }
    }
}

/// Engine session parameters: settings plus persisted engine state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Settings pack.
    pub settings: EngineSettings,
    /// Opaque DHT routing state.
    #[serde(default)]
    pub dht_state: Vec<u8>,
}

/// Counter classification reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Monotonic counter.
    Counter,
    /// Instantaneous gauge.
    Gauge,
}

/// One entry of the engine's statistics catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsMetric {
    /// Statistic name.
    pub name: String,
    /// Slot index into a counter snapshot.
    pub value_index: usize,
    /// Counter classification.
    pub kind: MetricKind,
}

impl StatsMetric {
    /// Construct a catalogue entry.
    #[must_use]
    pub fn new(name: impl Into<String>, value_index: usize, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            value_index,
            kind,
        }
    }
}
