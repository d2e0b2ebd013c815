//! Engine settings derived from session options.

use seedline_config::defaults::DHT_BOOTSTRAP_NODES;
use seedline_config::{ProxyKind, ProxyOptions, SessionOptions, join_endpoints};
use seedline_torrent_core::{EncryptionPolicy, EngineSettings, ProxySettings, ProxyType};

/// Stop-tracker announce timeout applied to every session.
pub const STOP_TRACKER_TIMEOUT_SECS: u32 = 1;

/// Apply session options on top of `settings`, in a fixed order: alert mask,
/// encryption defaults, DHT bootstrap nodes and enable flag, local service
/// discovery, interfaces, forced encryption, proxy, client identity, and
/// tracker timeout.
pub fn apply_session_options(settings: &mut EngineSettings, options: &SessionOptions) {
    settings.alert_mask_all = true;
    settings.in_enc_policy = EncryptionPolicy::Prefer;
    settings.out_enc_policy = EncryptionPolicy::Prefer;

    settings.dht_bootstrap_nodes = options
        .dht
        .bootstrap_nodes
        .as_deref()
        .map_or_else(|| DHT_BOOTSTRAP_NODES.join(","), join_endpoints);
    settings.enable_dht = options.dht.enabled.unwrap_or(true);
    settings.enable_lsd = true;

    if let Some(interfaces) = options.listen_interfaces.as_deref() {
        let joined = join_endpoints(interfaces);
        settings.listen_interfaces = Some(joined.clone());
        settings.outgoing_interfaces = Some(joined);
    }

    if options.require_encryption == Some(true) {
        settings.in_enc_policy = EncryptionPolicy::Require;
        settings.out_enc_policy = EncryptionPolicy::Require;
    }

    if let Some(proxy) = options.proxy.as_ref() {
        settings.proxy = proxy_settings(proxy);
    }

    settings.peer_fingerprint = peer_fingerprint();
    settings.user_agent = user_agent();
    settings.stop_tracker_timeout_secs = STOP_TRACKER_TIMEOUT_SECS;
}

/// Peer identifier prefix, e.g. `-SL0100-` for version 0.1.0.
#[must_use]
pub fn peer_fingerprint() -> String {
    format!(
        "-SL{}{}{}0-",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH")
    )
}

/// User agent announced to trackers and peers.
#[must_use]
pub fn user_agent() -> String {
    format!("seedline/{}", env!("CARGO_PKG_VERSION"))
}

fn proxy_settings(proxy: &ProxyOptions) -> Option<ProxySettings> {
    let kind = match proxy.kind {
        ProxyKind::None => return None,
        ProxyKind::Socks4 => ProxyType::Socks4,
        ProxyKind::Socks5 => ProxyType::Socks5,
        ProxyKind::Socks5Pw => ProxyType::Socks5Pw,
        ProxyKind::Http => ProxyType::Http,
        ProxyKind::HttpPw => ProxyType::HttpPw,
        ProxyKind::I2pProxy => ProxyType::I2pProxy,
    };
    Some(ProxySettings {
        kind,
        hostname: proxy.host.clone(),
        port: proxy.port,
        username: proxy.username.clone(),
        password: proxy.password.clone(),
        proxy_hostnames: proxy.proxies_hostnames(),
        proxy_peer_connections: proxy.proxies_peer_connections(),
        proxy_tracker_connections: proxy.proxies_tracker_connections(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedline_config::{DhtOptions, HostPort};

    fn applied(options: &SessionOptions) -> EngineSettings {
        let mut settings = EngineSettings::default();
        apply_session_options(&mut settings, options);
        settings
    }

    #[test]
    fn defaults_enable_discovery_and_prefer_encryption() {
        let settings = applied(&SessionOptions::default());
        assert!(settings.alert_mask_all);
        assert!(settings.enable_dht);
        assert!(settings.enable_lsd);
        assert_eq!(settings.in_enc_policy, EncryptionPolicy::Prefer);
        assert_eq!(settings.out_enc_policy, EncryptionPolicy::Prefer);
        assert_eq!(
            settings.dht_bootstrap_nodes,
            "router.bittorrent.com:6881,router.utorrent.com:6881,\
             dht.transmissionbt.com:6881,dht.aelitis.com:6881"
        );
        assert!(settings.listen_interfaces.is_none());
        assert!(settings.proxy.is_none());
        assert_eq!(settings.stop_tracker_timeout_secs, 1);
        assert!(settings.peer_fingerprint.starts_with("-SL"));
        assert!(settings.user_agent.starts_with("seedline/"));
    }

    #[test]
    fn overrides_replace_dht_and_interfaces() {
        let options = SessionOptions {
            dht: DhtOptions {
                enabled: Some(false),
                bootstrap_nodes: Some(vec![HostPort::new("node.example", 6881)]),
            },
            listen_interfaces: Some(vec![
                HostPort::new("0.0.0.0", 6881),
                HostPort::new("::", 6881),
            ]),
            require_encryption: Some(true),
            ..SessionOptions::default()
        };
        let settings = applied(&options);
        assert!(!settings.enable_dht);
        assert_eq!(settings.dht_bootstrap_nodes, "node.example:6881");
        assert_eq!(
            settings.listen_interfaces.as_deref(),
            Some("0.0.0.0:6881,[::]:6881")
        );
        assert_eq!(settings.listen_interfaces, settings.outgoing_interfaces);
        assert_eq!(settings.in_enc_policy, EncryptionPolicy::Require);
        assert_eq!(settings.out_enc_policy, EncryptionPolicy::Require);
    }

    #[test]
    fn require_encryption_false_keeps_prefer() {
        let options = SessionOptions {
            require_encryption: Some(false),
            ..SessionOptions::default()
        };
        assert_eq!(applied(&options).in_enc_policy, EncryptionPolicy::Prefer);
    }

    #[test]
    fn proxy_force_sets_every_routing_flag() {
        let options = SessionOptions {
            proxy: Some(ProxyOptions {
                kind: ProxyKind::Socks5Pw,
                host: "proxy.example".into(),
                port: 1080,
                username: Some("user".into()),
                password: Some("secret".into()),
                force: true,
                force_hostnames: false,
                force_peer_connections: false,
                force_tracker_connections: false,
            }),
            ..SessionOptions::default()
        };
        let proxy = applied(&options).proxy;
        let Some(proxy) = proxy else {
            panic!("proxy should be configured");
        };
        assert_eq!(proxy.kind, ProxyType::Socks5Pw);
        assert_eq!(proxy.hostname, "proxy.example");
        assert_eq!(proxy.port, 1080);
        assert_eq!(proxy.username.as_deref(), Some("user"));
        assert!(proxy.proxy_hostnames);
        assert!(proxy.proxy_peer_connections);
        assert!(proxy.proxy_tracker_connections);
    }

    #[test]
    fn proxy_kind_none_leaves_proxy_unset() {
        let options = SessionOptions {
            proxy: Some(ProxyOptions {
                kind: ProxyKind::None,
                host: String::new(),
                port: 0,
                username: None,
                password: None,
                force: false,
                force_hostnames: false,
                force_peer_connections: true,
                force_tracker_connections: false,
            }),
            ..SessionOptions::default()
        };
        assert!(applied(&options).proxy.is_none());
    }
}
