//! Generic-password access through the macOS `security` CLI.
//!
//! Items are looked up by service name alone because most of them were
//! created by other applications whose account attribute we cannot know in
//! advance. The `keyring` crate requires a (service, account) pair, so it
//! cannot express that lookup.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::process::{Command, Output};
use std::sync::OnceLock;

fn acct_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""acct"<blob>="([^"]+)""#).expect("static regex"))
}

fn ensure_macos() -> Result<()> {
    if !cfg!(target_os = "macos") {
        bail!("keychain access is only supported on macOS");
    }
    Ok(())
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("")
}

fn failure_line(output: &Output) -> String {
    let combined = combined_output(output);
    let line = first_line(&combined);
    if line.is_empty() {
        output.status.to_string()
    } else {
        line.to_string()
    }
}

pub fn read_generic_password(service: &str) -> Result<String> {
    ensure_macos()?;

    let output = Command::new("security")
        .args(["find-generic-password", "-s", service, "-w"])
        .output()
        .context("run security")?;
    if !output.status.success() {
        bail!("keychain item not found: {}", failure_line(&output));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Upserts a generic password, preserving the account attribute of an
/// existing item so other applications keep finding it.
pub fn write_generic_password(service: &str, value: &str) -> Result<()> {
    ensure_macos()?;

    let mut account = String::new();
    if let Ok(find) = Command::new("security")
        .args(["find-generic-password", "-s", service])
        .output()
    {
        if find.status.success() {
            let text = String::from_utf8_lossy(&find.stdout);
            if let Some(caps) = acct_pattern().captures(&text) {
                account = caps[1].to_string();
            }
        }
    }

    let mut args = vec!["add-generic-password", "-s", service];
    if !account.is_empty() {
        args.push("-a");
        args.push(&account);
    }
    args.extend(["-w", value, "-U"]);

    let output = Command::new("security")
        .args(&args)
        .output()
        .context("run security")?;
    if !output.status.success() {
        bail!("keychain write failed: {}", failure_line(&output));
    }
    Ok(())
}

pub fn delete_generic_password(service: &str) -> Result<()> {
    ensure_macos()?;

    let output = Command::new("security")
        .args(["delete-generic-password", "-s", service])
        .output()
        .context("run security")?;
    if !output.status.success() {
        bail!("keychain delete failed: {}", failure_line(&output));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acct_pattern_extracts_account() {
        let listing = r#"
keychain: "/Users/dev/Library/Keychains/login.keychain-db"
attributes:
    "acct"<blob>="dev@example.com"
    "svce"<blob>="Tool-credentials"
"#;
        let caps = acct_pattern().captures(listing).unwrap();
        assert_eq!(&caps[1], "dev@example.com");
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn unsupported_platform_reports_clearly() {
        let err = read_generic_password("Some-service").unwrap_err();
        assert!(err.to_string().contains("only supported on macOS"));
        assert!(write_generic_password("Some-service", "v").is_err());
        assert!(delete_generic_password("Some-service").is_err());
    }
}
