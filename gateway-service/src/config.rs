use std::env;

/// Environment-driven configuration for the gateway (spec §6).
pub struct Config {
    pub nats_url: String,
    pub otlp_url: Option<String>,
    pub http_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string()),
            otlp_url: env::var("OTLP_URL").ok(),
            http_addr: env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}
