use warehouse_service::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    warehouse_service::run(config).await
}
