//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for git operations.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for the auto-coder test suite.
pub const TEST_SUITE_TIMEOUT: Duration = Duration::from_secs(600);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child
/// process is killed automatically if the timeout elapses (via the
/// tokio `Child` drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Stdout of a successful run, or a combined error message.
pub async fn run_capture(
    cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<String, String> {
    let output = run_with_timeout(cmd, timeout, description).await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(format!(
            "{} exited with {}: {}",
            description,
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ))
    }
}
