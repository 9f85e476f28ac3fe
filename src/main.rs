// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use relational_pubsub_server::{
    api::router,
    broker::{Broker, BrokerError, MemoryBroker},
    config::{AppConfig, BrokerBackend, ConfigError},
    logging::{init_logging, LogFormat},
    push::{http::PushClientError, HttpPushClient},
    state::AppState,
    store::{InMemoryStore, StoreError},
};

/// Time allowed for in-flight requests once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("store seed: {0}")]
    Store(#[from] StoreError),
    #[error("broker: {0}")]
    Broker(#[from] BrokerError),
    #[error("push client: {0}")]
    Push(#[from] PushClientError),
    #[error("server: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(not(feature = "kafka"))]
    #[error("BROKER_BACKEND=kafka requires building with the `kafka` feature")]
    KafkaDisabled,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging(LogFormat::from_env());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;

    let store = match &config.store_seed_path {
        Some(path) => {
            info!(path = %path.display(), "Seeding store");
            InMemoryStore::load(path)?
        }
        None => InMemoryStore::new(),
    };

    // A broker that cannot be reached is fatal.
    let broker = build_broker(&config).await?;

    let mut state = AppState::new(Arc::clone(&broker), Arc::new(store), config.service.clone());
    if config.service.push_enabled {
        if let Some(url) = &config.push_server_url {
            let client = HttpPushClient::new(url, config.push_health_timeout)?;
            info!(target_url = %url, "Push health checks enabled");
            state = state.with_push_client(Arc::new(client));
        }
    }
    if config.service.service_token.is_none() {
        warn!("SERVICE_TOKEN is not set; service token access is disabled");
    }

    let app = router(state);
    let addr = config.bind_addr()?;

    let shutdown = CancellationToken::new();
    let handle = axum_server::Handle::new();
    tokio::spawn(watch_signals(shutdown.clone()));
    {
        let shutdown = shutdown.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            info!("Shutting down");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });
    }

    let served = match &config.tls {
        Some(tls) => {
            if rustls::crypto::ring::default_provider()
                .install_default()
                .is_err()
            {
                warn!("rustls crypto provider was already installed");
            }
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            info!("Relational Pub/Sub listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!("Relational Pub/Sub listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    broker.close_connections().await;
    shutdown.cancel();
    served?;
    info!("Relational Pub/Sub stopped");
    Ok(())
}

async fn build_broker(config: &AppConfig) -> Result<Arc<dyn Broker>, StartupError> {
    match config.broker_backend {
        BrokerBackend::Memory => {
            let mut broker = MemoryBroker::with_consume_wait(config.consume_wait);
            broker.initialize(&config.broker_peers).await?;
            Ok(Arc::new(broker))
        }
        BrokerBackend::Kafka => kafka_broker(config).await,
    }
}

#[cfg(feature = "kafka")]
async fn kafka_broker(config: &AppConfig) -> Result<Arc<dyn Broker>, StartupError> {
    use relational_pubsub_server::broker::KafkaBroker;

    let mut broker = KafkaBroker::new(config.consume_wait);
    broker.initialize(&config.broker_peers).await?;
    Ok(Arc::new(broker))
}

#[cfg(not(feature = "kafka"))]
async fn kafka_broker(_config: &AppConfig) -> Result<Arc<dyn Broker>, StartupError> {
    Err(StartupError::KafkaDisabled)
}

async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }
    shutdown.cancel();
}
