//! Server configuration
//!
//! Values come from the environment (`HOST`, `PORT`, `CLIENT_URL`) or from
//! command-line flags layered on top by the binary.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::http::HeaderValue;

use crate::error::{RelayError, RelayResult};

/// Port used when `PORT` is not set
pub const DEFAULT_PORT: u16 = 4000;

/// Address used when `HOST` is not set
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Relay server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address to bind
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Origin allowed to reach the relay from a browser; any origin when `None`
    pub client_url: Option<String>,
}

/// Values given on the command line
///
/// Each one shadows its environment key, which is then not read at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub client_url: Option<String>,
}

impl ConfigOverrides {
    fn shadows(&self, key: &str) -> bool {
        match key {
            "HOST" => self.host.is_some(),
            "PORT" => self.port.is_some(),
            "CLIENT_URL" => self.client_url.is_some(),
            _ => false,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            client_url: None,
        }
    }
}

impl RelayConfig {
    /// Build from `HOST`, `PORT` and `CLIENT_URL`, falling back to defaults
    pub fn from_env() -> RelayResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RelayResult<Self> {
        let mut config = Self::default();

        if let Some(host) = non_empty(lookup("HOST")) {
            config.host = host
                .parse()
                .map_err(|e| RelayError::Config(format!("invalid HOST '{}': {}", host, e)))?;
        }

        if let Some(port) = non_empty(lookup("PORT")) {
            config.port = port
                .parse()
                .map_err(|e| RelayError::Config(format!("invalid PORT '{}': {}", port, e)))?;
        }

        config.client_url = non_empty(lookup("CLIENT_URL"));
        config.allowed_origin()?;

        Ok(config)
    }

    /// Flags first, then the environment, then defaults
    pub fn from_env_with(overrides: ConfigOverrides) -> RelayResult<Self> {
        Self::from_lookup_with(overrides, |key| env::var(key).ok())
    }

    pub fn from_lookup_with(
        overrides: ConfigOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> RelayResult<Self> {
        let mut config = Self::from_lookup(|key| {
            if overrides.shadows(key) {
                None
            } else {
                lookup(key)
            }
        })?;

        if let Some(host) = overrides.host {
            config.host = host;
        }
        if let Some(port) = overrides.port {
            config.port = port;
        }
        if let Some(client_url) = overrides.client_url {
            config.client_url = non_empty(Some(client_url));
        }
        config.allowed_origin()?;

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_client_url(mut self, client_url: impl Into<String>) -> Self {
        self.client_url = Some(client_url.into());
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// The configured origin as a header value, `None` meaning any origin
    ///
    /// Browsers send the scheme and host in lowercase, so the value is
    /// lowercased to match.
    pub fn allowed_origin(&self) -> RelayResult<Option<HeaderValue>> {
        self.client_url
            .as_deref()
            .map(|url| {
                let origin = url.trim_end_matches('/').to_ascii_lowercase();
                HeaderValue::from_str(&origin).map_err(|e| {
                    RelayError::Config(format!("invalid CLIENT_URL '{}': {}", url, e))
                })
            })
            .transpose()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.socket_addr().port(), 4000);
        assert!(config.allowed_origin().unwrap().is_none());
        assert_eq!(config.with_port(9000).socket_addr().port(), 9000);
    }

    #[test]
    fn test_reads_all_keys() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("CLIENT_URL", "http://localhost:3000/"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.allowed_origin().unwrap().unwrap(),
            HeaderValue::from_static("http://localhost:3000")
        );
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config =
            RelayConfig::from_lookup(lookup(&[("PORT", "  "), ("CLIENT_URL", "")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.client_url.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = RelayConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));

        let err = RelayConfig::from_lookup(lookup(&[("HOST", "not-an-ip")])).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));

        let err = RelayConfig::from_lookup(lookup(&[("CLIENT_URL", "http://bad\nhost")]))
            .unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_origin_is_lowercased() {
        let config = RelayConfig::default().with_client_url("HTTP://Localhost:3000/");
        assert_eq!(
            config.allowed_origin().unwrap().unwrap(),
            HeaderValue::from_static("http://localhost:3000")
        );
    }

    #[test]
    fn test_flags_shadow_environment() {
        let env = lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "eighty"),
            ("CLIENT_URL", "http://bad\nhost"),
        ]);
        let overrides = ConfigOverrides {
            port: Some(8080),
            client_url: Some("http://localhost:3000".to_string()),
            ..Default::default()
        };

        let config = RelayConfig::from_lookup_with(overrides, env).unwrap();
        assert_eq!(config.socket_addr(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.client_url.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn test_unshadowed_environment_still_validated() {
        let overrides = ConfigOverrides {
            host: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            ..Default::default()
        };
        let err = RelayConfig::from_lookup_with(overrides, lookup(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));

        let overrides = ConfigOverrides {
            client_url: Some("http://bad\nhost".to_string()),
            ..Default::default()
        };
        let err = RelayConfig::from_lookup_with(overrides, lookup(&[])).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }
}
