//! Blocking process execution for the system collaborators.

use std::process::Command;

use anyhow::Context;
use tracing::debug;

/// Run `cmd` to completion and return its stdout.
///
/// A non-zero exit is an error carrying the trimmed stderr.
pub fn run(cmd: &mut Command) -> anyhow::Result<String> {
    let rendered = describe(cmd);
    debug!(command = %rendered, "running");

    let output = cmd
        .output()
        .with_context(|| format!("Failed to spawn `{}`", rendered))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "`{}` exited with {}: {}",
            rendered,
            output.status,
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program().to_string_lossy().into_owned())
        .chain(cmd.get_args().map(|a| a.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ")
}
