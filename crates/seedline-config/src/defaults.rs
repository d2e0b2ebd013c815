//! Default values for configuration records.

/// Default DHT bootstrap routers in `host:port` form.
pub const DHT_BOOTSTRAP_NODES: [&str; 4] = [
    "router.bittorrent.com:6881",
    "router.utorrent.com:6881",
    "dht.transmissionbt.com:6881",
    "dht.aelitis.com:6881",
];
/// Interval between statistics requests.
pub const STATS_INTERVAL_MS: u64 = 1_000;
/// Upper bound on the shutdown resume-data drain.
pub const DRAIN_TIMEOUT_MS: u64 = 60_000;
/// Save path used when neither the add call nor the load defaults name one.
pub const SAVE_PATH: &str = ".";
/// Default log level directive.
pub const LOG_LEVEL: &str = "info";
/// Default database location.
pub const DATABASE_URL: &str = "sqlite://seedline.sqlite?mode=rwc";

pub(crate) const fn stats_interval_ms() -> u64 {
    STATS_INTERVAL_MS
}

pub(crate) const fn drain_timeout_ms() -> u64 {
    DRAIN_TIMEOUT_MS
}

pub(crate) fn log_level() -> String {
    LOG_LEVEL.to_string()
}

pub(crate) fn database_url() -> String {
    DATABASE_URL.to_string()
}
