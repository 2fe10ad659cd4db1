// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::graph_resolver::GraphResolver;
use crate::application::meter_service::MeterService;
use crate::application::point_resolver::PlantSelection;
use crate::infrastructure::config::{load_config, TopologySettings};
use crate::infrastructure::file_topology::FileTopology;
use crate::infrastructure::influx_series_store::{InfluxConnection, InfluxSeriesStore};
use crate::infrastructure::sparql_graph_resolver::SparqlGraphResolver;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{calibrate_ahu, health_check, list_ahus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hvac_meter=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = load_config()?;
    // Reject a malformed default window at startup rather than on first request
    config.analysis.window()?;

    // Create collaborators (infrastructure layer)
    let graph: Arc<dyn GraphResolver> = match &config.topology {
        TopologySettings::Sparql {
            endpoint,
            timeout_secs,
        } => Arc::new(SparqlGraphResolver::new(
            endpoint.clone(),
            Duration::from_secs(*timeout_secs),
        )?),
        TopologySettings::File { path } => Arc::new(FileTopology::load(path)?),
    };

    let store = Arc::new(InfluxSeriesStore::new(InfluxConnection {
        host: config.influx.host.clone(),
        token: config.influx.token.clone(),
        database: config.influx.database.clone(),
        retention_policy: config.influx.retention_policy.clone(),
        measurement: config.influx.measurement.clone(),
        tag_key: config.influx.tag_key.clone(),
        timeout: Duration::from_secs(config.influx.timeout_secs),
    })?);

    // Create services (application layer)
    let meter_service = MeterService::new(
        graph,
        store,
        config.analysis.fetch_margin(),
        PlantSelection {
            entity: config.plant.entity.clone(),
            srcid_contains: config.plant.srcid_contains.clone(),
        },
    );

    let state = Arc::new(AppState {
        meter_service,
        analysis: config.analysis.clone(),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/ahus", get(list_ahus))
        .route("/ahus/:id/calibration", get(calibrate_ahu))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    tracing::info!("Starting hvac-meter service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
