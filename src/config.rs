// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup and is read-only afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `BROKER_BACKEND` | `memory` or `kafka` | `memory` |
//! | `BROKER_PEERS` | Comma-separated broker addresses | `localhost:9092` |
//! | `CONSUME_WAIT_MS` | Bound on a waiting pull | `5000` |
//! | `SERVICE_TOKEN` | Operator token bypassing role checks | unset (disabled) |
//! | `PUSH_ENABLED` | Enable push delivery health checks | `false` |
//! | `PUSH_WORKER_TOKEN` | Key of the push worker user | empty |
//! | `PUSH_SERVER_URL` | Base URL of the push server | Required when push is enabled |
//! | `PUSH_HEALTH_TIMEOUT_MS` | Push health probe timeout | `2000` |
//! | `STORE_SEED_PATH` | JSON file seeding the in-memory store | unset (empty store) |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key | unset (plain HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::ServiceConfig;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const BROKER_BACKEND_ENV: &str = "BROKER_BACKEND";
pub const BROKER_PEERS_ENV: &str = "BROKER_PEERS";
pub const CONSUME_WAIT_MS_ENV: &str = "CONSUME_WAIT_MS";
pub const SERVICE_TOKEN_ENV: &str = "SERVICE_TOKEN";
pub const PUSH_ENABLED_ENV: &str = "PUSH_ENABLED";
pub const PUSH_WORKER_TOKEN_ENV: &str = "PUSH_WORKER_TOKEN";
pub const PUSH_SERVER_URL_ENV: &str = "PUSH_SERVER_URL";
pub const PUSH_HEALTH_TIMEOUT_MS_ENV: &str = "PUSH_HEALTH_TIMEOUT_MS";
pub const STORE_SEED_PATH_ENV: &str = "STORE_SEED_PATH";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BROKER_PEERS: &str = "localhost:9092";
pub const DEFAULT_CONSUME_WAIT_MS: u64 = 5000;
pub const DEFAULT_PUSH_HEALTH_TIMEOUT_MS: u64 = 2000;
/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerBackend {
    Memory,
    Kafka,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Everything read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub broker_backend: BrokerBackend,
    pub broker_peers: Vec<String>,
    pub consume_wait: Duration,
    pub service: ServiceConfig,
    pub push_server_url: Option<String>,
    pub push_health_timeout: Duration,
    pub store_seed_path: Option<PathBuf>,
    pub tls: Option<TlsPaths>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: PORT_ENV,
                value: raw,
                reason: "expected a port number",
            })?,
            None => DEFAULT_PORT,
        };

        let broker_backend = match get(BROKER_BACKEND_ENV).as_deref().map(str::trim) {
            None | Some("memory") => BrokerBackend::Memory,
            Some("kafka") => BrokerBackend::Kafka,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: BROKER_BACKEND_ENV,
                    value: other.to_string(),
                    reason: "expected memory or kafka",
                })
            }
        };
        let broker_peers = get(BROKER_PEERS_ENV)
            .unwrap_or_else(|| DEFAULT_BROKER_PEERS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|peer| !peer.is_empty())
            .map(str::to_string)
            .collect();

        let consume_wait = millis(get(CONSUME_WAIT_MS_ENV), CONSUME_WAIT_MS_ENV, DEFAULT_CONSUME_WAIT_MS)?;
        let push_health_timeout = millis(
            get(PUSH_HEALTH_TIMEOUT_MS_ENV),
            PUSH_HEALTH_TIMEOUT_MS_ENV,
            DEFAULT_PUSH_HEALTH_TIMEOUT_MS,
        )?;

        let push_enabled = match get(PUSH_ENABLED_ENV).map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(v) if v == "true" || v == "1" => true,
            Some(v) if v == "false" || v == "0" => false,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    var: PUSH_ENABLED_ENV,
                    value: v,
                    reason: "expected true or false",
                })
            }
        };
        let push_server_url = get(PUSH_SERVER_URL_ENV);
        if push_enabled && push_server_url.is_none() {
            return Err(ConfigError::Missing(PUSH_SERVER_URL_ENV));
        }

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            host,
            port,
            broker_backend,
            broker_peers,
            consume_wait,
            service: ServiceConfig {
                service_token: get(SERVICE_TOKEN_ENV),
                push_enabled,
                push_worker_token: get(PUSH_WORKER_TOKEN_ENV).unwrap_or_default(),
            },
            push_server_url,
            push_health_timeout,
            store_seed_path: get(STORE_SEED_PATH_ENV).map(PathBuf::from),
            tls,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                var: HOST_ENV,
                value: self.host.clone(),
                reason: "expected an IP address",
            })
    }
}

fn millis(raw: Option<String>, var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid {
                var,
                value: raw,
                reason: "expected milliseconds",
            }),
        None => Ok(Duration::from_millis(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.broker_backend, BrokerBackend::Memory);
        assert_eq!(config.broker_peers, vec!["localhost:9092".to_string()]);
        assert_eq!(config.consume_wait, Duration::from_secs(5));
        assert_eq!(config.push_health_timeout, Duration::from_secs(2));
        assert!(config.service.service_token.is_none());
        assert!(!config.service.push_enabled);
        assert!(config.tls.is_none());
        assert!(config.store_seed_path.is_none());
    }

    #[test]
    fn reads_all_settings() {
        let config = load(&[
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (BROKER_BACKEND_ENV, "kafka"),
            (BROKER_PEERS_ENV, "k1:9092, k2:9092,"),
            (CONSUME_WAIT_MS_ENV, "250"),
            (SERVICE_TOKEN_ENV, "SERVICE_TOKEN"),
            (PUSH_ENABLED_ENV, "true"),
            (PUSH_WORKER_TOKEN_ENV, "push_token"),
            (PUSH_SERVER_URL_ENV, "http://push.local:5555"),
            (STORE_SEED_PATH_ENV, "/etc/pubsub/seed.json"),
            (TLS_CERT_PATH_ENV, "/tls/cert.pem"),
            (TLS_KEY_PATH_ENV, "/tls/key.pem"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.broker_backend, BrokerBackend::Kafka);
        assert_eq!(config.broker_peers, vec!["k1:9092".to_string(), "k2:9092".to_string()]);
        assert_eq!(config.consume_wait, Duration::from_millis(250));
        assert_eq!(config.service.service_token.as_deref(), Some("SERVICE_TOKEN"));
        assert!(config.service.push_enabled);
        assert_eq!(config.service.push_worker_token, "push_token");
        assert_eq!(config.store_seed_path, Some(PathBuf::from("/etc/pubsub/seed.json")));
        assert_eq!(
            config.tls,
            Some(TlsPaths {
                cert: "/tls/cert.pem".into(),
                key: "/tls/key.pem".into(),
            })
        );
    }

    #[test]
    fn empty_service_token_is_unset() {
        let config = load(&[(SERVICE_TOKEN_ENV, "")]).unwrap();
        assert!(config.service.service_token.is_none());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            load(&[(PORT_ENV, "eighty")]),
            Err(ConfigError::Invalid { var: PORT_ENV, .. })
        ));
        assert!(matches!(
            load(&[(BROKER_BACKEND_ENV, "redis")]),
            Err(ConfigError::Invalid { var: BROKER_BACKEND_ENV, .. })
        ));
        assert!(matches!(
            load(&[(PUSH_ENABLED_ENV, "maybe")]),
            Err(ConfigError::Invalid { var: PUSH_ENABLED_ENV, .. })
        ));
        assert!(matches!(
            load(&[(CONSUME_WAIT_MS_ENV, "-1")]),
            Err(ConfigError::Invalid { var: CONSUME_WAIT_MS_ENV, .. })
        ));
        assert!(load(&[(HOST_ENV, "not a host")]).unwrap().bind_addr().is_err());
    }

    #[test]
    fn push_requires_server_url() {
        assert_eq!(
            load(&[(PUSH_ENABLED_ENV, "true")]).unwrap_err(),
            ConfigError::Missing(PUSH_SERVER_URL_ENV)
        );
    }

    #[test]
    fn tls_needs_both_paths() {
        assert_eq!(
            load(&[(TLS_CERT_PATH_ENV, "/tls/cert.pem")]).unwrap_err(),
            ConfigError::Missing(TLS_KEY_PATH_ENV)
        );
    }
}
