// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP push client. Probes `GET {base}/health`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::{PushClient, PushHealth};

#[derive(Debug, thiserror::Error)]
pub enum PushClientError {
    #[error("invalid push server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct HttpPushClient {
    base: Url,
    health_url: Url,
    http: Client,
}

impl HttpPushClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, PushClientError> {
        let base = Url::parse(base)?;
        // join() replaces the last segment unless the base ends with '/'.
        let health_url = if base.path().ends_with('/') {
            base.join("health")?
        } else {
            Url::parse(&format!("{}/health", base.as_str()))?
        };
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base,
            health_url,
            http,
        })
    }

    pub fn health_url(&self) -> &Url {
        &self.health_url
    }
}

#[async_trait]
impl PushClient for HttpPushClient {
    fn target(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }

    async fn health_check(&self) -> PushHealth {
        match self.http.get(self.health_url.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %self.health_url, "Push server serving");
                PushHealth::Serving
            }
            Ok(response) => {
                let status = response.status();
                warn!(url = %self.health_url, %status, "Push server not serving");
                PushHealth::NotServing(status.to_string())
            }
            Err(e) => {
                warn!(url = %self.health_url, error = %e, "Push server unreachable");
                PushHealth::Unreachable(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_health_url() {
        let client = HttpPushClient::new("http://push.local:5555", Duration::from_secs(1)).unwrap();
        assert_eq!(client.health_url().as_str(), "http://push.local:5555/health");
        assert_eq!(client.target(), "http://push.local:5555");

        let nested = HttpPushClient::new("http://push.local/api", Duration::from_secs(1)).unwrap();
        assert_eq!(nested.health_url().as_str(), "http://push.local/api/health");

        let slash = HttpPushClient::new("http://push.local/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(slash.health_url().as_str(), "http://push.local/api/health");
        assert_eq!(slash.target(), "http://push.local/api");
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(matches!(
            HttpPushClient::new("not a url", Duration::from_secs(1)),
            Err(PushClientError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_reported() {
        // Port 9 on loopback (discard) is not expected to run an HTTP server.
        let client = HttpPushClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let health = client.health_check().await;
        assert!(matches!(health, PushHealth::Unreachable(_)));
    }
}
