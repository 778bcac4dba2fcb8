use std::process::Command;

use anyhow::Result;
use serde_json::Value;

fn cli() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_procroute-cli"));
    for key in ["ROUTES_PREFIX", "ROUTES_SEGMENT_SEPARATOR", "ROUTES_HYPHENATE", "APP_ENV"] {
        command.env_remove(key);
    }
    command
}

#[test]
fn path_command_derives_routes_offline() -> Result<()> {
    let output = cli()
        .args(["--json", "path", "api_post_user.id.__update_profile"])
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["path"], "/user/:id/update-profile");
    assert_eq!(value["params"], serde_json::json!(["id"]));
    Ok(())
}

#[test]
fn unprefixed_names_fail_with_a_message() -> Result<()> {
    let output = cli().args(["path", "get_users"]).output()?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));
    Ok(())
}
