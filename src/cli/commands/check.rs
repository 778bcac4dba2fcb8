use serde_json::json;

use crate::cli::utils::{fetch_catalog, output_structured};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::route::RouteCompiler;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let catalog = fetch_catalog(config).await?;
    let compiler = RouteCompiler::from_config(config)?;
    let registered = json!({
        "guards": compiler.guards().names().collect::<Vec<_>>(),
        "hooks": compiler.hooks().names().collect::<Vec<_>>(),
        "validators": compiler.validators().names().collect::<Vec<_>>(),
    });

    match compiler.compile_catalog(&catalog) {
        Ok(table) => {
            let value = json!({
                "success": true,
                "procedures": catalog.len(),
                "routes": table.len(),
                "registered": registered.clone(),
            });
            if !output_structured(output_format, &value)? {
                println!("✓ {} procedures compiled into {} routes", catalog.len(), table.len());
                for kind in ["guards", "hooks", "validators"] {
                    let names: Vec<&str> = registered[kind]
                        .as_array()
                        .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
                        .unwrap_or_default();
                    println!("  {}: {}", kind, names.join(", "));
                }
            }
            Ok(())
        }
        Err(errors) => {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            let value = json!({
                "success": false,
                "procedures": catalog.len(),
                "errors": messages,
                "registered": registered,
            });
            if !output_structured(output_format, &value)? {
                for message in &messages {
                    eprintln!("✗ {}", message);
                }
            }
            Err(anyhow::anyhow!("{} of {} procedures failed to compile", errors.len(), catalog.len()))
        }
    }
}
