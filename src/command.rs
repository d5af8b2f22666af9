//! Helpers for running external commands.

use std::{process::Output, sync::LazyLock};

use regex::Regex;

use crate::prelude::*;

/// Lines of standard error which mean a command failed, even if it exited
/// successfully.
///
/// This only matches fatal setup problems. Leptonica prints plenty of
/// harmless `Error in boxClipToRectangle` style lines during a good run, so a
/// bare "error" is not enough.
pub static DEFAULT_ERROR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(failed loading language|error opening data file|could not initialize tesseract)",
    )
    .expect("failed to compile regex")
});

/// Report any command failures, and include any error output.
///
/// The output of standard error and standard output will be logged at
/// appropriate levels. And standard error may be optionally checked against a
/// regex to determine if the command failed.
pub fn check_for_command_failure(
    command_name: &str,
    output: &Output,
    error_regex: Option<&Regex>,
) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        command_name = command_name,
        output = %stdout,
        "Standard output from command"
    );
    if !stderr.trim().is_empty() {
        debug!(
            command_name = command_name,
            output = %stderr,
            "Standard error from command",
        );
    }

    if output.status.success() {
        if let Some(regex) = error_regex {
            if regex.is_match(&stderr) {
                return Err(anyhow!(
                    "{} printed error output:\n{}",
                    command_name,
                    stderr,
                ));
            }
        }
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr,
        ))
    } else {
        Err(anyhow!(
            "{} failed with error output:\n{}",
            command_name,
            stderr,
        ))
    }
}
