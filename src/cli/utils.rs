use serde::Serialize;

use crate::catalog::ProcedureCatalog;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::{load_catalog, DatabaseManager};

/// Print a serializable value as JSON or YAML; text output is left to the caller
pub fn output_structured<T: Serialize>(output_format: OutputFormat, value: &T) -> anyhow::Result<bool> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Text => return Ok(false),
    }
    Ok(true)
}

/// Connect with the configured database and read the prefixed procedures
pub async fn fetch_catalog(config: &AppConfig) -> anyhow::Result<ProcedureCatalog> {
    let pool = DatabaseManager::connect(&config.database).await?;
    let catalog = load_catalog(&pool, &config.routes.prefix).await?;
    pool.close().await;
    Ok(catalog)
}
