use anyhow::{Context, Result, ensure};
use log::debug;
use std::time::Duration;
use tokio::{process::Command, time::timeout};

/// Run an external program to completion, bounded by `limit`
///
/// Returns trimmed stdout. A non-zero exit status is an error carrying stderr.
pub async fn run(program: &str, args: &[&str], limit: Duration) -> Result<String> {
    let cmdline = format!("{program} {}", args.join(" "));
    debug!("run {cmdline}");

    let output = timeout(
        limit,
        Command::new(program).args(args).kill_on_drop(true).output(),
    )
    .await
    .context(format!("{cmdline} timed out after {}s", limit.as_secs()))?
    .context(format!("failed to spawn {cmdline}"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    ensure!(
        output.status.success(),
        "{cmdline} failed with {}: {}",
        output.status,
        if stderr.trim().is_empty() {
            "command failed"
        } else {
            stderr.trim()
        }
    );

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
