//! Validation helpers for configuration documents.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{HostPort, LoadOptions, ProxyKind, ProxyOptions, SessionOptions};

fn invalid(section: &str, field: &str, value: Option<String>, reason: &'static str) -> ConfigError {
    ConfigError::InvalidField {
        section: section.to_string(),
        field: field.to_string(),
        value,
        reason,
    }
}

fn validate_endpoints(
    section: &str,
    field: &str,
    endpoints: &[HostPort],
    allow_port_zero: bool,
) -> ConfigResult<()> {
    for endpoint in endpoints {
        if endpoint.host.trim().is_empty() {
            return Err(invalid(section, field, None, "host must not be empty"));
        }
        if endpoint.port == 0 && !allow_port_zero {
            return Err(invalid(
                section,
                field,
                Some(endpoint.to_string()),
                "port must be between 1 and 65535",
            ));
        }
    }
    Ok(())
}

fn validate_proxy(proxy: &ProxyOptions) -> ConfigResult<()> {
    const SECTION: &str = "session.proxy";
    if proxy.kind == ProxyKind::None {
        return Ok(());
    }
    if proxy.host.trim().is_empty() {
        return Err(invalid(SECTION, "host", None, "host must not be empty"));
    }
    if proxy.port == 0 {
        return Err(invalid(
            SECTION,
            "port",
            Some(proxy.port.to_string()),
            "port must be between 1 and 65535",
        ));
    }
    if proxy.kind.requires_credentials() {
        if proxy.username.as_deref().is_none_or(str::is_empty) {
            return Err(invalid(
                SECTION,
                "username",
                None,
                "proxy type requires a username",
            ));
        }
        if proxy.password.as_deref().is_none_or(str::is_empty) {
            return Err(invalid(
                SECTION,
                "password",
                None,
                "proxy type requires a password",
            ));
        }
    }
    Ok(())
}

/// Validate session options.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first invalid value.
pub fn validate_session(options: &SessionOptions) -> ConfigResult<()> {
    if let Some(nodes) = &options.dht.bootstrap_nodes {
        validate_endpoints("session.dht", "bootstrap_nodes", nodes, false)?;
    }
    if let Some(interfaces) = &options.listen_interfaces {
        validate_endpoints("session", "listen_interfaces", interfaces, true)?;
    }
    if let Some(proxy) = &options.proxy {
        validate_proxy(proxy)?;
    }
    if options.shutdown.drain_timeout_ms == 0 {
        return Err(invalid(
            "session.shutdown",
            "drain_timeout_ms",
            Some("0".to_string()),
            "must be greater than zero",
        ));
    }
    Ok(())
}

/// Validate load options.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the statistics interval is zero.
pub fn validate_load(options: &LoadOptions) -> ConfigResult<()> {
    if options.stats_interval_ms == 0 {
        return Err(invalid(
            "load",
            "stats_interval_ms",
            Some("0".to_string()),
            "must be greater than zero",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DhtOptions;

    fn proxy(kind: ProxyKind) -> ProxyOptions {
        ProxyOptions {
            kind,
            host: "127.0.0.1".into(),
            port: 9050,
            username: None,
            password: None,
            force: false,
            force_hostnames: false,
            force_peer_connections: false,
            force_tracker_connections: false,
        }
    }

    fn field_of(err: &ConfigError) -> &str {
        match err {
            ConfigError::InvalidField { field, .. } => field,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn default_session_is_valid() {
        assert!(validate_session(&SessionOptions::default()).is_ok());
    }

    #[test]
    fn authenticated_proxy_requires_credentials() {
        let options = SessionOptions {
            proxy: Some(proxy(ProxyKind::Socks5Pw)),
            ..SessionOptions::default()
        };
        let err = validate_session(&options).unwrap_err();
        assert_eq!(field_of(&err), "username");

        let mut with_user = proxy(ProxyKind::HttpPw);
        with_user.username = Some("alice".into());
        let options = SessionOptions {
            proxy: Some(with_user.clone()),
            ..SessionOptions::default()
        };
        assert_eq!(field_of(&validate_session(&options).unwrap_err()), "password");

        with_user.password = Some("secret".into());
        let options = SessionOptions {
            proxy: Some(with_user),
            ..SessionOptions::default()
        };
        assert!(validate_session(&options).is_ok());
    }

    #[test]
    fn proxy_requires_host_and_port() {
        let mut bad = proxy(ProxyKind::Socks5);
        bad.host = " ".into();
        let options = SessionOptions {
            proxy: Some(bad),
            ..SessionOptions::default()
        };
        assert_eq!(field_of(&validate_session(&options).unwrap_err()), "host");

        let mut bad = proxy(ProxyKind::Http);
        bad.port = 0;
        let options = SessionOptions {
            proxy: Some(bad),
            ..SessionOptions::default()
        };
        assert_eq!(field_of(&validate_session(&options).unwrap_err()), "port");
    }

    #[test]
    fn bootstrap_nodes_need_real_ports() {
        let options = SessionOptions {
            dht: DhtOptions {
                enabled: Some(true),
                bootstrap_nodes: Some(vec![HostPort::new("node.example", 0)]),
            },
            ..SessionOptions::default()
        };
        let err = validate_session(&options).unwrap_err();
        assert_eq!(field_of(&err), "bootstrap_nodes");
    }

    #[test]
    fn listen_interfaces_allow_ephemeral_port() {
        let options = SessionOptions {
            listen_interfaces: Some(vec![HostPort::new("0.0.0.0", 0)]),
            ..SessionOptions::default()
        };
        assert!(validate_session(&options).is_ok());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut session = SessionOptions::default();
        session.shutdown.drain_timeout_ms = 0;
        assert_eq!(
            field_of(&validate_session(&session).unwrap_err()),
            "drain_timeout_ms"
        );
        let load = LoadOptions {
            stats_interval_ms: 0,
            ..LoadOptions::default()
        };
        assert_eq!(
            field_of(&validate_load(&load).unwrap_err()),
            "stats_interval_ms"
        );
    }
}
