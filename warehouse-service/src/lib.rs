pub mod config;
pub mod handlers;
pub mod reservations;
pub mod stock;

use std::sync::Arc;

use anyhow::Context;
use common_broker::{Broker, DeliverPolicy, StreamSpec};
use common_observability::ServiceMetrics;
use common_protocol::subjects;
use common_runtime::ServiceRuntime;
use tracing::info;

use config::Config;
use handlers::WarehouseState;

/// Bring up one warehouse process end to end (spec §4.3 startup): connect, ensure the
/// streams it reads and writes exist, replay `stock_updates`/`reservations` history to
/// rebuild in-memory state, drop anything already expired, then subscribe live and start
/// serving `warehouse.*` requests. Runs until the process receives ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    common_observability::init_tracing();

    let warehouse_id = common_protocol::WarehouseId::new(config.warehouse_id.clone());
    info!(warehouse_id = %warehouse_id, nats_url = %config.nats_url, "starting warehouse-service");
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
        .ensure_stream(
            StreamSpec::new(
                subjects::RESERVATIONS_STREAM,
                vec![format!("{}>", subjects::RESERVATIONS_PREFIX)],
            )
            // MaxAge matches RESERVATION_TIMEOUT so a broker-bounded reboot's replay can
            // never surface an already-expired reservation (spec §9).
            .with_max_age(
                reservations::RESERVATION_TIMEOUT
                    .to_std()
                    .expect("RESERVATION_TIMEOUT is positive"),
            ),
        )
        .await
        .context("failed to ensure reservations stream")?;
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

    let state = WarehouseState::new(warehouse_id.clone(), broker.clone(), metrics);
    let runtime = ServiceRuntime::new(broker, state);

    let stock_subject = subjects::stock_updates_subject(&warehouse_id);
    let reservations_subject = subjects::reservations_subject(&warehouse_id);

    info!("replaying stock_updates history");
    runtime
        .register_js_handler_existing(
            subjects::STOCK_UPDATES_STREAM,
            stock_subject.clone(),
            DeliverPolicy::All,
            |state, event| handlers::project_stock_replay(state, event),
        )
        .await
        .context("failed to replay stock_updates")?;

    info!("replaying reservations history");
    runtime
        .register_js_handler_existing(
            subjects::RESERVATIONS_STREAM,
            reservations_subject.clone(),
            DeliverPolicy::All,
            |state, event| handlers::project_reservations_replay(state, event),
        )
        .await
        .context("failed to replay reservations")?;

    runtime
        .register_handler(subjects::warehouse_ping_subject(&warehouse_id), |state, payload| {
            handlers::ping(state, payload)
        })
        .await
        .context("failed to register ping handler")?;
    runtime
        .register_handler(
            subjects::warehouse_add_stock_subject(&warehouse_id),
            |state, payload| handlers::add_stock(state, payload),
        )
        .await
        .context("failed to register add_stock handler")?;
    runtime
        .register_handler(
            subjects::warehouse_reserve_subject(&warehouse_id),
            |state, payload| handlers::reserve(state, payload),
        )
        .await
        .context("failed to register reserve handler")?;

    runtime
        .register_js_handler(
            subjects::STOCK_UPDATES_STREAM,
            format!("warehouse-{}-stock-live", warehouse_id.as_str()),
            stock_subject,
            DeliverPolicy::New,
            |state, event| handlers::project_stock_live(state, event),
        )
        .await
        .context("failed to subscribe live stock_updates")?;
    runtime
        .register_js_handler(
            subjects::RESERVATIONS_STREAM,
            format!("warehouse-{}-reservations-live", warehouse_id.as_str()),
            reservations_subject,
            DeliverPolicy::New,
            |state, event| handlers::project_reservations_live(state, event),
        )
        .await
        .context("failed to subscribe live reservations")?;
    runtime
        .register_js_handler(
            subjects::ORDERS_STREAM,
            format!("warehouse-{}-orders", warehouse_id.as_str()),
            subjects::ORDERS_SUBJECT,
            DeliverPolicy::New,
            |state, event| handlers::handle_order_created(state, event),
        )
        .await
        .context("failed to subscribe orders stream")?;

    handlers::spawn_decay_loop(runtime.state(), runtime.shutdown_token());

    info!("warehouse-service ready");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutting down");
    runtime.shutdown();

    Ok(())
}
