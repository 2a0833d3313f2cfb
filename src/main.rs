use anyhow::Result;
use meli_etl::config::{ConfigSource, EnvFileConfig, Settings};
use meli_etl::etl::{EtlClient, ProductTable};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meli_etl=info".into()),
        )
        .init();

    info!("Meli ETL starting...");

    let env_file = std::env::var("MELI_ENV_FILE").unwrap_or_else(|_| ".env".to_string());
    let config: Arc<dyn ConfigSource> = Arc::new(EnvFileConfig::new(&env_file));

    match run(config, &env_file).await {
        Ok(Some(table)) => println!("\n{}", table),
        Ok(None) => info!("No products to show"),
        Err(e) => {
            let stage = e.stage();
            error!(stage = stage, error = %e, "ETL run aborted");
            return Err(anyhow::Error::new(e).context(format!("ETL run aborted at {} stage", stage)));
        }
    }

    info!("Meli ETL finished");
    Ok(())
}

async fn run(config: Arc<dyn ConfigSource>, env_file: &str) -> meli_etl::Result<Option<ProductTable>> {
    let settings = Settings::from_source(config.as_ref())?;
    info!(
        env_file = %env_file,
        database_path = %settings.database_path,
        threshold_hours = settings.threshold_hours,
        site_id = %settings.site_id,
        "Configuration loaded"
    );

    let client = EtlClient::from_settings(config, &settings)?;
    client.run().await
}
