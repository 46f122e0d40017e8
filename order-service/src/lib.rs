pub mod config;
pub mod handlers;
pub mod planner;
pub mod readmodel;

use std::sync::Arc;

use anyhow::Context;
use common_broker::{Broker, DeliverPolicy, StreamSpec};
use common_observability::ServiceMetrics;
use common_protocol::subjects;
use common_runtime::ServiceRuntime;
use tracing::info;

use config::Config;
use handlers::OrderState;

/// Bring up the order service (spec §4.4 startup): connect, ensure the `stock_updates`
/// and `orders` streams exist, replay `stock_updates.>` to converge the read-model,
/// then subscribe live and start serving `order.*` requests.
pub async fn run(config: Config) -> anyhow::Result<()> {
    common_observability::init_tracing();
    info!(nats_url = %config.nats_url, "starting order-service");
    if let Some(otlp_url) = &config.otlp_url {
        info!(%otlp_url, "OTLP endpoint configured (export not wired up)");
    }

    let broker = Broker::connect(&config.nats_url)
        .await
        .context("failed to connect to broker")?;

    broker
        .ensure_stream(StreamSpec::new(
            subjects::STOCK_UPDATES_STREAM,
            vec![format!("{}>", subjects::STOCK_UPDATES_PREFIX)],
        ))
        .await
        .context("failed to ensure stock_updates stream")?;
    broker
        .ensure_stream(StreamSpec::new(
            subjects::ORDERS_STREAM,
            vec![subjects::ORDERS_SUBJECT.to_string(), format!("{}.>", subjects::ORDERS_SUBJECT)],
        ))
        .await
        .context("failed to ensure orders stream")?;

    let metrics = Arc::new(ServiceMetrics::new());
    tokio::spawn(common_observability::serve_metrics(
        config.metrics_addr.clone(),
        metrics.clone(),
    ));

    let state = OrderState::new(broker.clone(), metrics);
    let runtime = ServiceRuntime::new(broker, state);

    info!("replaying stock_updates history");
    runtime
        .register_js_handler_existing(
            subjects::STOCK_UPDATES_STREAM,
            format!("{}>", subjects::STOCK_UPDATES_PREFIX),
            DeliverPolicy::All,
            |state, event| handlers::project_stock_replay(state, event),
        )
        .await
        .context("failed to replay stock_updates")?;

    runtime
        .register_handler("order.ping", |state, payload| handlers::ping(state, payload))
        .await
        .context("failed to register ping handler")?;
    runtime
        .register_handler("order.create", |state, payload| {
            handlers::create_order(state, payload)
        })
        .await
        .context("failed to register create handler")?;

    runtime
        .register_js_handler(
            subjects::STOCK_UPDATES_STREAM,
            "order-service-stock-live",
            format!("{}>", subjects::STOCK_UPDATES_PREFIX),
            DeliverPolicy::New,
            |state, event| handlers::project_stock_live(state, event),
        )
        .await
        .context("failed to subscribe live stock_updates")?;

    info!("order-service ready");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutting down");
    runtime.shutdown();

    Ok(())
}
