use clap::Args;
use serde_json::json;

use crate::cli::utils::output_structured;
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Args)]
pub struct PathArgs {
    #[arg(help = "Procedure name, e.g. api_get_users__.id.")]
    pub name: String,
}

pub fn handle(args: PathArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let shape = config().routes.naming().derive(&args.name)?;

    let value = json!({
        "procedure": args.name,
        "method": shape.method,
        "path": shape.path,
        "params": shape.params,
    });
    if !output_structured(output_format, &value)? {
        println!("{} {}", shape.method, shape.path);
    }
    Ok(())
}
