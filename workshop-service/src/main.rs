use service_core::observability::{init_tracing, TracingOptions};
use workshop_service::{config::WorkshopConfig, services::metrics::init_metrics, Application};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkshopConfig::from_env()?;

    init_tracing(&TracingOptions {
        service_name: config.service_name.clone(),
        log_level: config.log_level.clone(),
        otlp_endpoint: config.otlp_endpoint.clone(),
    });
    init_metrics();

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
