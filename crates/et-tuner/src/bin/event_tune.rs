use anyhow::Context;
use et_types::{TuneConfig, CONFIG_ENV_VAR};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = TuneConfig::from_env()
        .with_context(|| format!("loading configuration (set {CONFIG_ENV_VAR} to override)"))?;

    let summary = et_tuner::run(config).await.context("tuning run failed")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
