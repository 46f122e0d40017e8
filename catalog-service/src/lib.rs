pub mod config;
pub mod handlers;

use std::sync::Arc;

use anyhow::Context;
use common_broker::Broker;
use common_observability::ServiceMetrics;
use common_protocol::subjects;
use common_runtime::ServiceRuntime;
use tracing::info;

use config::Config;
use handlers::CatalogState;

/// Bring up the catalog process (spec §4.4 expansion): connect, open the `catalog` KV
/// bucket, then start serving `catalog.*` requests. Runs until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    common_observability::init_tracing();
    info!(nats_url = %config.nats_url, "starting catalog-service");
    if let Some(otlp_url) = &config.otlp_url {
        info!(%otlp_url, "OTLP endpoint configured (export not wired up)");
    }

    let broker = Broker::connect(&config.nats_url)
        .await
        .context("failed to connect to broker")?;
    let bucket = broker
        .kv_bucket(subjects::CATALOG_BUCKET)
        .await
        .context("failed to open catalog KV bucket")?;

    let metrics = Arc::new(ServiceMetrics::new());
    tokio::spawn(common_observability::serve_metrics(
        config.metrics_addr.clone(),
        metrics.clone(),
    ));

    let state = CatalogState { bucket, metrics };
    let runtime = ServiceRuntime::new(broker, state);

    runtime
        .register_handler("catalog.ping", |state, payload| handlers::ping(state, payload))
        .await
        .context("failed to register ping handler")?;
    runtime
        .register_handler("catalog.create", |state, payload| handlers::create(state, payload))
        .await
        .context("failed to register create handler")?;
    runtime
        .register_handler("catalog.get", |state, payload| handlers::get(state, payload))
        .await
        .context("failed to register get handler")?;
    runtime
        .register_handler("catalog.list", |state, payload| handlers::list(state, payload))
        .await
        .context("failed to register list handler")?;
    runtime
        .register_handler("catalog.update", |state, payload| handlers::update(state, payload))
        .await
        .context("failed to register update handler")?;
    runtime
        .register_handler("catalog.delete", |state, payload| handlers::delete(state, payload))
        .await
        .context("failed to register delete handler")?;

    info!("catalog-service ready");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutting down");
    runtime.shutdown();

    Ok(())
}
