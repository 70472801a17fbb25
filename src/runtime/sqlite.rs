//! Read-only queries against local application databases.
//!
//! IDE state lives in SQLite files that the owning application keeps open;
//! `sqlite3 -readonly` with an `immutable=1` URI reads them without taking
//! locks the IDE would notice.

use super::fsutil;
use anyhow::{bail, Context, Result};
use std::process::Command;

/// Runs `sql` against `db_path` and returns the JSON row output.
pub fn query(db_path: &str, sql: &str) -> Result<String> {
    ensure_no_dot_commands(sql)?;

    let expanded = fsutil::expand_path(db_path);
    let encoded = percent_encode(&expanded.to_string_lossy());
    let uri = format!("file:{encoded}?immutable=1");

    let output = sqlite_command()?
        .args(["-readonly", "-json", uri.as_str(), sql])
        .output()
        .context("run sqlite3")?;
    if !output.status.success() {
        bail!("sqlite3 error: {}", failure_message(&output));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn execute(db_path: &str, sql: &str) -> Result<()> {
    ensure_no_dot_commands(sql)?;

    let expanded = fsutil::expand_path(db_path);
    let db_arg = expanded.to_string_lossy().into_owned();
    let output = sqlite_command()?
        .args([db_arg.as_str(), sql])
        .output()
        .context("run sqlite3")?;
    if !output.status.success() {
        bail!("sqlite3 error: {}", failure_message(&output));
    }
    Ok(())
}

fn sqlite_command() -> Result<Command> {
    let path = which::which("sqlite3").context("sqlite3 not found in PATH")?;
    Ok(Command::new(path))
}

fn ensure_no_dot_commands(sql: &str) -> Result<()> {
    if sql.lines().any(|line| line.trim_start().starts_with('.')) {
        bail!("sqlite3 dot-commands are not allowed");
    }
    Ok(())
}

// URI filename encoding for the characters SQLite treats specially.
fn percent_encode(path: &str) -> String {
    path.replace('%', "%25")
        .replace(' ', "%20")
        .replace('#', "%23")
        .replace('?', "%3F")
}

fn failure_message(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let trimmed = text.trim();
    if trimmed.is_empty() {
        output.status.to_string()
    } else {
        trimmed.to_string()
    }
}
