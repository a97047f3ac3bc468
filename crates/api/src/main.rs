//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use broker::{BrokerConfig, BrokerError, InMemoryBroker};
use messaging::{Collaborators, Node};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM) or a consumer fault.
async fn shutdown_signal(fault: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
        () = fault.cancelled() => {
            tracing::error!("consumer faulted, shutting down for restart");
        }
    }
}

/// Starts the node on Kafka when `KAFKA_BOOTSTRAP_SERVERS` is set and the
/// `kafka` feature is enabled, on the in-memory broker otherwise.
fn start_node(
    config: &Config,
    collaborators: Collaborators,
    cancel: CancellationToken,
) -> Result<Node, BrokerError> {
    let node_config = config.node_config();

    match BrokerConfig::from_env() {
        Ok(broker_config) => {
            #[cfg(feature = "kafka")]
            {
                tracing::info!(
                    servers = %broker_config.bootstrap_servers,
                    "using Kafka broker"
                );
                let broker = broker::KafkaBroker::new(broker_config)?;
                return Ok(Node::start(
                    Arc::new(broker),
                    collaborators,
                    &node_config,
                    cancel,
                ));
            }

            #[cfg(not(feature = "kafka"))]
            tracing::warn!(
                servers = %broker_config.bootstrap_servers,
                "built without the kafka feature, falling back to the in-memory broker"
            );
        }
        Err(BrokerError::ConfigMissing { .. }) => {
            tracing::info!("KAFKA_BOOTSTRAP_SERVERS not set, using the in-memory broker");
        }
        Err(e) => return Err(e),
    }

    Ok(Node::start(
        Arc::new(InMemoryBroker::new()),
        collaborators,
        &node_config,
        cancel,
    ))
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Start the node and its consumers
    let config = Config::from_env();
    let collaborators = api::create_default_collaborators().await;
    let node = start_node(&config, collaborators, CancellationToken::new())
        .expect("failed to start service node");

    // 4. Build the application
    let state = Arc::new(api::AppState::from_node(&node));
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, roles = ?config.roles, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    let fault = node.fault_signal();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(fault.clone()))
        .await
        .expect("server error");

    // 6. Stop consumers and release pending existence checks
    node.shutdown().await;
    if fault.is_cancelled() {
        tracing::error!("exiting after consumer fault");
        std::process::exit(1);
    }
    tracing::info!("server shut down gracefully");
}
