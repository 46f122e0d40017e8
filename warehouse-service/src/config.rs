use std::env;

use anyhow::Context;

/// Environment-driven configuration for one warehouse process (spec §4.3 startup).
/// `WAREHOUSE_ID` selects the subject suffix this process owns; a warehouse process
/// never serves more than one warehouse.
pub struct Config {
    pub nats_url: String,
    pub warehouse_id: String,
    pub otlp_url: Option<String>,
    pub metrics_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string()),
            warehouse_id: env::var("WAREHOUSE_ID").context("WAREHOUSE_ID must be set")?,
            otlp_url: env::var("OTLP_URL").ok(),
            metrics_addr: env::var("METRICS_ADDR").unwrap_or_else(|_| "0.0.0.0:9100".to_string()),
        })
    }
}
