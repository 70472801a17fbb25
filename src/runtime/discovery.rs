//! Discovery of locally running companion servers.
//!
//! IDE-embedded servers publish no discovery mechanism, so the process table
//! is the source of truth: find the process by command-line substring,
//! discriminate between product variants, pull the auth token out of its
//! flags, and enumerate its listening TCP ports. Results are never cached —
//! the server may have restarted between queries.

use super::http::{self, HttpRequest, HttpResponse};
use anyhow::{bail, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Variant discriminator flags some companion servers carry.
pub const IDE_NAME_FLAG: &str = "--ide_name";
pub const APP_DATA_DIR_FLAG: &str = "--app_data_dir";

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Case-insensitive substring of the command line.
    pub process_name: String,
    /// Product variant markers; matched against the discriminator flags when
    /// present, else as a `/marker/` path segment of the command line.
    pub markers: Vec<String>,
    /// Flag carrying the auth token. Required; a process without it is not
    /// a usable server.
    pub token_flag: String,
    /// Flag declaring a port directly, for servers that advertise one.
    pub port_flag: Option<String>,
    /// Additional flags to capture, returned with leading dashes stripped.
    pub extra_flags: Vec<String>,
}

/// One matched companion server process.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    pub pid: i32,
    pub token: String,
    /// Listening TCP ports, ascending.
    pub ports: Vec<u16>,
    pub extra: HashMap<String, String>,
    pub declared_port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

/// Scans the process table for a matching companion server.
///
/// Enumeration failures are fail-soft (`Ok(None)`): a host without `ps` or
/// `lsof` output is indistinguishable from the server not running. Only
/// invalid options are hard errors.
pub fn discover(opts: &DiscoverOptions) -> Result<Option<Discovery>> {
    if opts.process_name.is_empty() {
        bail!("process name is required");
    }
    if opts.markers.is_empty() {
        bail!("at least one marker is required");
    }
    if opts.token_flag.is_empty() {
        bail!("token flag is required");
    }

    let output = match Command::new("/bin/ps")
        .args(["-ax", "-o", "pid=,command="])
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => return Ok(None),
    };
    let listing = String::from_utf8_lossy(&output.stdout);

    let Some((pid, command)) = select_process(&listing, opts) else {
        return Ok(None);
    };

    Ok(build_discovery(pid, &command, listening_ports(pid), opts))
}

/// Probes candidate ports in preference order: every listening port over
/// secure transport first, then insecure; the first responsive one wins.
/// Falls back to the declared port over insecure transport without probing.
pub fn find_responsive_port<F>(discovery: &Discovery, mut probe: F) -> Option<(u16, Scheme)>
where
    F: FnMut(Scheme, u16) -> bool,
{
    for &port in &discovery.ports {
        if probe(Scheme::Https, port) {
            return Some((port, Scheme::Https));
        }
        if probe(Scheme::Http, port) {
            return Some((port, Scheme::Http));
        }
    }
    discovery.declared_port.map(|port| (port, Scheme::Http))
}

/// One request against a discovered local server. TLS verification is
/// disabled for the `https` case: these servers present self-signed
/// certificates on the loopback interface.
#[derive(Debug, Clone)]
pub struct LocalCall<'a> {
    pub scheme: Scheme,
    pub port: u16,
    pub path: &'a str,
    pub method: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a str,
    pub timeout: Duration,
}

pub fn call_local(call: &LocalCall) -> Result<HttpResponse> {
    let url = format!(
        "{}://127.0.0.1:{}/{}",
        call.scheme.as_str(),
        call.port,
        call.path.trim_start_matches('/')
    );
    http::send(&HttpRequest {
        method: call.method.to_string(),
        url,
        headers: call
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        body: call.body.to_string(),
        timeout: Some(call.timeout),
        insecure_tls: call.scheme == Scheme::Https,
    })
}

fn select_process(listing: &str, opts: &DiscoverOptions) -> Option<(i32, String)> {
    let name_lower = opts.process_name.to_lowercase();
    let markers_lower: Vec<String> = opts.markers.iter().map(|m| m.to_lowercase()).collect();

    for line in listing.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let pid_token = match trimmed.split_whitespace().next() {
            Some(token) => token,
            None => continue,
        };
        let Ok(pid) = pid_token.parse::<i32>() else {
            continue;
        };
        let command = trimmed.strip_prefix(pid_token).unwrap_or("").trim();
        if command.is_empty() {
            continue;
        }

        let command_lower = command.to_lowercase();
        if !command_lower.contains(&name_lower) {
            continue;
        }

        let ide_name = extract_flag(command, IDE_NAME_FLAG).to_lowercase();
        let app_data_dir = extract_flag(command, APP_DATA_DIR_FLAG).to_lowercase();

        let matched = markers_lower.iter().any(|marker| {
            if !ide_name.is_empty() {
                ide_name == *marker
            } else if !app_data_dir.is_empty() {
                app_data_dir == *marker
            } else {
                command_lower.contains(&format!("/{marker}/"))
            }
        });
        if !matched {
            continue;
        }

        return Some((pid, command.to_string()));
    }

    None
}

fn build_discovery(
    pid: i32,
    command: &str,
    ports: Vec<u16>,
    opts: &DiscoverOptions,
) -> Option<Discovery> {
    let token = extract_flag(command, &opts.token_flag);
    if token.is_empty() {
        return None;
    }

    let declared_port = opts
        .port_flag
        .as_deref()
        .and_then(|flag| extract_flag(command, flag).parse::<u16>().ok());

    let mut extra = HashMap::with_capacity(opts.extra_flags.len());
    for flag in &opts.extra_flags {
        let value = extract_flag(command, flag);
        if !value.is_empty() {
            extra.insert(flag.trim_start_matches('-').to_string(), value);
        }
    }

    // A server we cannot reach on any port is as good as absent.
    if ports.is_empty() && declared_port.is_none() {
        return None;
    }

    Some(Discovery {
        pid,
        token,
        ports,
        extra,
        declared_port,
    })
}

/// Supports both `--flag value` and `--flag=value`; first occurrence wins.
fn extract_flag(command: &str, flag: &str) -> String {
    let eq_prefix = format!("{flag}=");
    let parts: Vec<&str> = command.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == flag {
            if let Some(next) = parts.get(i + 1) {
                return (*next).to_string();
            }
        }
        if let Some(value) = part.strip_prefix(&eq_prefix) {
            return value.to_string();
        }
    }
    String::new()
}

fn listening_ports(pid: i32) -> Vec<u16> {
    let Some(lsof) = resolve_lsof() else {
        return Vec::new();
    };
    let output = match Command::new(lsof)
        .args(["-nP", "-iTCP", "-sTCP:LISTEN", "-a", "-p", &pid.to_string()])
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => return Vec::new(),
    };
    parse_lsof_ports(&String::from_utf8_lossy(&output.stdout))
}

fn resolve_lsof() -> Option<PathBuf> {
    for candidate in ["/usr/sbin/lsof", "/usr/bin/lsof"] {
        let path = Path::new(candidate);
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }
    which::which("lsof").ok()
}

fn parse_lsof_ports(output: &str) -> Vec<u16> {
    let mut ports = BTreeSet::new();
    for line in output.lines() {
        if !line.contains("LISTEN") {
            continue;
        }
        for token in line.split_whitespace().rev() {
            let Some(idx) = token.rfind(':') else {
                continue;
            };
            let Ok(port) = token[idx + 1..].parse::<u16>() else {
                continue;
            };
            if port > 0 {
                ports.insert(port);
                break;
            }
        }
    }
    ports.into_iter().collect()
}
