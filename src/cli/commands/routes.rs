use clap::Args;

use crate::cli::utils::{fetch_catalog, output_structured};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::route::RouteCompiler;

#[derive(Args)]
pub struct RoutesArgs {
    #[arg(long, help = "Print the JSON Schema of each route in text output")]
    pub schema: bool,
}

pub async fn handle(args: RoutesArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let catalog = fetch_catalog(config).await?;
    let table = RouteCompiler::from_config(config)?.compile_catalog(&catalog)?;

    let routes = table.describe();
    if output_structured(output_format, &routes)? {
        return Ok(());
    }

    for route in &routes {
        println!("{:<8} {:<40} {}", route.method.as_str(), route.path, route.procedure);
        if !route.summary.is_empty() {
            println!("         {}", route.summary);
        }
        if !route.pre_validation.is_empty() {
            println!("         pre-validation: {}", route.pre_validation.join(" -> "));
        }
        for (phase, hooks) in &route.hooks {
            println!("         {}: {}", phase, hooks.join(", "));
        }
        if args.schema {
            println!("{}", serde_json::to_string_pretty(&route.schema)?);
        }
    }
    println!("{} routes", routes.len());
    Ok(())
}
