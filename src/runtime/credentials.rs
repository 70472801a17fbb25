//! Credential lookup across the four backends providers actually use.
//!
//! Secrets are fetched fresh on every query and carry their origin so a
//! refreshed token can be written back to the store it came from — and only
//! there. Companion-CLI and environment origins are read-only.

use super::{fsutil, keychain, value};
use anyhow::Result;
use std::process::Command;

/// Prefix some CLI keyring backends wrap their stdout secrets in.
pub const CLI_BASE64_PREFIX: &str = "go-keyring-base64:";

/// Where a secret was found. Doubles as the write-back address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOrigin {
    SecureStore { service: String },
    File { path: String },
    CompanionCli { program: String },
    Environment { variable: String },
}

/// A secret plus its provenance.
#[derive(Debug, Clone)]
pub struct Credential {
    pub secret: String,
    pub origin: CredentialOrigin,
}

impl Credential {
    /// Persists a refreshed secret to the origin store. Companion-CLI and
    /// environment origins are never written back.
    pub fn write_back(&self, new_secret: &str) -> Result<()> {
        match &self.origin {
            CredentialOrigin::File { path } => fsutil::write_text(path, new_secret),
            CredentialOrigin::SecureStore { service } => {
                keychain::write_generic_password(service, new_secret)
            }
            CredentialOrigin::CompanionCli { .. } | CredentialOrigin::Environment { .. } => {
                tracing::debug!(origin = ?self.origin, "read-only credential origin, skipping write-back");
                Ok(())
            }
        }
    }
}

/// A companion CLI that prints a secret on stdout. Argument variants are
/// tried in order; the first one that exits zero with non-empty output wins.
#[derive(Debug, Clone, Default)]
pub struct CompanionCli {
    pub program: String,
    pub arg_variants: Vec<Vec<String>>,
}

/// Ordered fallback chain over the credential backends.
#[derive(Debug, Clone, Default)]
pub struct CredentialChain {
    /// Secure-store service name.
    pub service: Option<String>,
    /// Credentials file path, `~`-expandable.
    pub file: Option<String>,
    pub cli: Option<CompanionCli>,
    /// Tried last, in order.
    pub env_vars: Vec<String>,
}

impl CredentialChain {
    /// First backend that yields a usable secret wins.
    pub fn load(&self) -> Option<Credential> {
        if let Some(service) = &self.service {
            match keychain::read_generic_password(service) {
                Ok(secret) if !secret.trim().is_empty() => {
                    return Some(Credential {
                        secret,
                        origin: CredentialOrigin::SecureStore {
                            service: service.clone(),
                        },
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(service = %service, error = %err, "secure store lookup failed");
                }
            }
        }

        if let Some(path) = &self.file {
            if let Some(secret) = load_file_secret(path) {
                return Some(Credential {
                    secret,
                    origin: CredentialOrigin::File { path: path.clone() },
                });
            }
        }

        if let Some(cli) = &self.cli {
            if let Some(secret) = load_cli_secret(cli) {
                return Some(Credential {
                    secret,
                    origin: CredentialOrigin::CompanionCli {
                        program: cli.program.clone(),
                    },
                });
            }
        }

        for variable in &self.env_vars {
            if let Ok(raw) = std::env::var(variable) {
                let token = raw.trim();
                if !token.is_empty() {
                    return Some(Credential {
                        secret: token.to_string(),
                        origin: CredentialOrigin::Environment {
                            variable: variable.clone(),
                        },
                    });
                }
            }
        }

        None
    }
}

fn load_file_secret(path: &str) -> Option<String> {
    if !fsutil::file_exists(path) {
        return None;
    }
    let text = fsutil::read_text(path).ok()?;
    decode_file_secret(&text)
}

/// Accepts a plain JSON blob, or the legacy hex-wrapped form: optionally
/// `0x`-prefixed, even-length hex whose decoded bytes are again JSON. Both
/// conditions must hold before decoding, so plain JSON can never be
/// mis-decoded.
fn decode_file_secret(text: &str) -> Option<String> {
    if value::parse_json_object(text).is_some() {
        return Some(text.trim().to_string());
    }

    let mut hex_text = text.trim();
    if let Some(stripped) = hex_text.strip_prefix("0x").or_else(|| hex_text.strip_prefix("0X")) {
        hex_text = stripped;
    }
    if hex_text.is_empty()
        || hex_text.len() % 2 != 0
        || !hex_text.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }

    let decoded = hex::decode(hex_text).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    value::parse_json_object(&decoded)?;
    Some(decoded)
}

fn load_cli_secret(cli: &CompanionCli) -> Option<String> {
    let no_args = vec![Vec::new()];
    let variants = if cli.arg_variants.is_empty() {
        &no_args
    } else {
        &cli.arg_variants
    };

    for args in variants {
        let output = match Command::new(&cli.program).args(args).output() {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(program = %cli.program, error = %err, "companion CLI unavailable");
                return None;
            }
        };
        if !output.status.success() {
            continue;
        }
        let secret = normalize_cli_secret(&String::from_utf8_lossy(&output.stdout));
        if !secret.is_empty() {
            return Some(secret);
        }
    }
    None
}

fn normalize_cli_secret(raw: &str) -> String {
    let token = raw.trim();
    if let Some(encoded) = token.strip_prefix(CLI_BASE64_PREFIX) {
        if let Ok(decoded) = value::decode_base64_any(encoded) {
            return decoded.trim().to_string();
        }
    }
    token.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use serial_test::serial;

    fn file_chain(path: &str) -> CredentialChain {
        CredentialChain {
            file: Some(path.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn file_source_returns_plain_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"oauth":{"accessToken":"tok"}}"#).unwrap();

        let cred = file_chain(&path.to_string_lossy()).load().unwrap();
        assert_eq!(cred.secret, r#"{"oauth":{"accessToken":"tok"}}"#);
        assert_eq!(
            cred.origin,
            CredentialOrigin::File {
                path: path.to_string_lossy().to_string()
            }
        );
    }

    #[test]
    fn file_source_decodes_hex_wrapped_json() {
        let blob = r#"{"accessToken":"tok"}"#;
        let wrapped = format!("0x{}", hex::encode(blob));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, wrapped).unwrap();

        let cred = file_chain(&path.to_string_lossy()).load().unwrap();
        assert_eq!(cred.secret, blob);
    }

    #[test]
    fn file_source_rejects_non_json_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "deadbeer").unwrap();
        assert!(file_chain(&path.to_string_lossy()).load().is_none());

        // Hex-decodable but not JSON underneath.
        std::fs::write(&path, hex::encode("not json")).unwrap();
        assert!(file_chain(&path.to_string_lossy()).load().is_none());
    }

    #[test]
    fn missing_file_falls_through() {
        assert!(file_chain("/nonexistent/credentials.json").load().is_none());
    }

    #[test]
    fn cli_source_takes_first_working_variant() {
        let chain = CredentialChain {
            cli: Some(CompanionCli {
                program: "/bin/sh".to_string(),
                arg_variants: vec![
                    vec!["-c".to_string(), "exit 1".to_string()],
                    vec!["-c".to_string(), "echo tok-123".to_string()],
                ],
            }),
            ..Default::default()
        };

        let cred = chain.load().unwrap();
        assert_eq!(cred.secret, "tok-123");
        assert_eq!(
            cred.origin,
            CredentialOrigin::CompanionCli {
                program: "/bin/sh".to_string()
            }
        );
    }

    #[test]
    fn cli_source_unwraps_base64_convention() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("wrapped-token");
        let chain = CredentialChain {
            cli: Some(CompanionCli {
                program: "/bin/sh".to_string(),
                arg_variants: vec![vec![
                    "-c".to_string(),
                    format!("echo '{CLI_BASE64_PREFIX}{encoded}'"),
                ]],
            }),
            ..Default::default()
        };

        assert_eq!(chain.load().unwrap().secret, "wrapped-token");
    }

    #[test]
    fn missing_cli_program_falls_through() {
        let chain = CredentialChain {
            cli: Some(CompanionCli {
                program: "/nonexistent/companion-cli".to_string(),
                arg_variants: vec![vec!["token".to_string()]],
            }),
            env_vars: vec!["USAGE_AGENT_DEFINITELY_UNSET".to_string()],
            ..Default::default()
        };
        assert!(chain.load().is_none());
    }

    #[test]
    #[serial]
    fn env_source_is_tried_last() {
        std::env::set_var("USAGE_AGENT_TEST_TOKEN", "env-tok");

        let chain = CredentialChain {
            file: Some("/nonexistent/credentials.json".to_string()),
            env_vars: vec![
                "USAGE_AGENT_TEST_TOKEN_MISSING".to_string(),
                "USAGE_AGENT_TEST_TOKEN".to_string(),
            ],
            ..Default::default()
        };

        let cred = chain.load().unwrap();
        assert_eq!(cred.secret, "env-tok");
        assert_eq!(
            cred.origin,
            CredentialOrigin::Environment {
                variable: "USAGE_AGENT_TEST_TOKEN".to_string()
            }
        );

        std::env::remove_var("USAGE_AGENT_TEST_TOKEN");
    }

    #[test]
    #[serial]
    fn blank_env_value_is_skipped() {
        std::env::set_var("USAGE_AGENT_BLANK_TOKEN", "   ");
        let chain = CredentialChain {
            env_vars: vec!["USAGE_AGENT_BLANK_TOKEN".to_string()],
            ..Default::default()
        };
        assert!(chain.load().is_none());
        std::env::remove_var("USAGE_AGENT_BLANK_TOKEN");
    }

    #[test]
    fn write_back_targets_file_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"accessToken":"old"}"#).unwrap();
        let path_str = path.to_string_lossy().to_string();

        let cred = file_chain(&path_str).load().unwrap();
        cred.write_back(r#"{"accessToken":"new"}"#).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            r#"{"accessToken":"new"}"#
        );
    }

    #[test]
    fn write_back_skips_read_only_origins() {
        let cli = Credential {
            secret: "tok".to_string(),
            origin: CredentialOrigin::CompanionCli {
                program: "gh".to_string(),
            },
        };
        let env = Credential {
            secret: "tok".to_string(),
            origin: CredentialOrigin::Environment {
                variable: "GH_TOKEN".to_string(),
            },
        };
        assert!(cli.write_back("new").is_ok());
        assert!(env.write_back("new").is_ok());
    }
}
