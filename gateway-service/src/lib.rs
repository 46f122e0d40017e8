pub mod config;
pub mod http;
pub mod readmodel;

use std::sync::Arc;

use anyhow::Context;
use common_broker::{Broker, DeliverPolicy, StreamSpec};
use common_observability::ServiceMetrics;
use common_protocol::{subjects, OrderCreated};
use common_runtime::{Ack, ServiceRuntime, StreamEvent};
use tracing::{info, warn};

use config::Config;
use http::GatewayState;
use readmodel::{warehouse_from_subject, ReadModel};

#[derive(Clone)]
struct ProjectionState {
    read_model: readmodel::SharedReadModel,
}

async fn apply_stock_event(state: &ProjectionState, event: &StreamEvent) {
    let Some(warehouse_id) = warehouse_from_subject(&event.subject) else {
        warn!(subject = %event.subject, "stock_updates message with unexpected subject");
        return;
    };
    let msg = match serde_json::from_slice(&event.payload) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(%err, "malformed stock_updates payload, skipping");
            return;
        }
    };
    state.read_model.write().await.apply_stock(&warehouse_id, &msg);
}

async fn apply_order_event(state: &ProjectionState, event: &StreamEvent) {
    let order: OrderCreated = match serde_json::from_slice(&event.payload) {
        Ok(order) => order,
        Err(err) => {
            warn!(%err, "malformed OrderCreated payload, skipping");
            return;
        }
    };
    state.read_model.write().await.apply_order(order);
}

/// Bring up the gateway (spec §4.5 + expansion): connect, replay `stock_updates.>` and
/// `orders` to converge the read-model, subscribe live, then serve the HTTP surface.
pub async fn run(config: Config) -> anyhow::Result<()> {
    common_observability::init_tracing();
    info!(nats_url = %config.nats_url, http_addr = %config.http_addr, "starting gateway-service");
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

    let read_model = ReadModel::shared();
    let projection_state = ProjectionState {
        read_model: read_model.clone(),
    };
    let runtime = ServiceRuntime::new(broker.clone(), projection_state);

    info!("replaying stock_updates and orders history");
    runtime
        .register_js_handler_existing(
            subjects::STOCK_UPDATES_STREAM,
            format!("{}>", subjects::STOCK_UPDATES_PREFIX),
            DeliverPolicy::All,
            |state, event| async move { apply_stock_event(&state, &event).await },
        )
        .await
        .context("failed to replay stock_updates")?;
    runtime
        .register_js_handler_existing(
            subjects::ORDERS_STREAM,
            subjects::ORDERS_SUBJECT,
            DeliverPolicy::All,
            |state, event| async move { apply_order_event(&state, &event).await },
        )
        .await
        .context("failed to replay orders")?;

    runtime
        .register_js_handler(
            subjects::STOCK_UPDATES_STREAM,
            "gateway-stock-live",
            format!("{}>", subjects::STOCK_UPDATES_PREFIX),
            DeliverPolicy::New,
            |state, event| async move {
                apply_stock_event(&state, &event).await;
                Ack::Ack
            },
        )
        .await
        .context("failed to subscribe live stock_updates")?;
    runtime
        .register_js_handler(
            subjects::ORDERS_STREAM,
            "gateway-orders-live",
            subjects::ORDERS_SUBJECT,
            DeliverPolicy::New,
            |state, event| async move {
                apply_order_event(&state, &event).await;
                Ack::Ack
            },
        )
        .await
        .context("failed to subscribe live orders")?;

    let metrics = Arc::new(ServiceMetrics::new());
    let gateway_state = GatewayState {
        read_model,
        broker,
        metrics,
    };
    let app = http::router(gateway_state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .context("failed to bind HTTP listener")?;

    info!("gateway-service ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server exited with error")?;

    runtime.shutdown();
    Ok(())
}
