//! Permissive coercion helpers for probing third-party JSON payloads.
//!
//! Vendor APIs disagree on whether numbers arrive as numbers or strings and
//! on how timestamps are spelled, and they change without notice. Everything
//! here returns an `Option` instead of guessing.

use anyhow::{bail, Result};
use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn numeric_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static regex"))
}

fn datetime_no_tz_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})(\.\d+)?$").expect("static regex")
    })
}

fn datetime_with_tz_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})(\.\d+)?(Z|[+-]\d{2}:\d{2})$")
            .expect("static regex")
    })
}

fn tz_no_colon_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+-]\d{4}$").expect("static regex"))
}

/// Finite f64 from a JSON number or a numeric string.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn integer(value: &Value) -> Option<i64> {
    number(value).map(|n| n as i64)
}

/// Parses `text` as a JSON object, returning the full `Value`.
pub fn parse_json_object(text: &str) -> Option<Value> {
    let parsed: Value = serde_json::from_str(text.trim()).ok()?;
    parsed.is_object().then_some(parsed)
}

/// Parses `text` as a JSON array, returning the full `Value`.
pub fn parse_json_array(text: &str) -> Option<Value> {
    let parsed: Value = serde_json::from_str(text.trim()).ok()?;
    parsed.is_array().then_some(parsed)
}

/// Word-initial capitalization for plan labels ("pro plan" -> "Pro Plan").
pub fn plan_label(value: &str) -> String {
    let text = value.trim();
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if at_word_start && ch.is_lowercase() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }
    out
}

/// Cents to dollars, rounded to whole cents.
pub fn dollars(cents: f64) -> f64 {
    cents.round() / 100.0
}

/// Epoch milliseconds from a JSON number (already ms) or a timestamp string.
pub fn parse_date_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Some(t) = parse_time_string(s) {
                return Some(t.timestamp_millis());
            }
            s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64)
        }
        _ => None,
    }
}

/// Normalizes a timestamp value to `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD HH:MM:SS` with an optional ` UTC`
/// suffix, timezone offsets without a colon, missing timezones (assumed UTC),
/// and epoch numbers (seconds or milliseconds, decided by magnitude).
pub fn to_iso(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => {
            let mut s = raw.trim().to_string();
            if s.is_empty() {
                return None;
            }

            if s.contains(' ') && s.starts_with("20") {
                s = s.replacen(' ', "T", 1);
            }
            if let Some(head) = s.strip_suffix(" UTC") {
                s = format!("{head}Z");
            }

            if numeric_pattern().is_match(&s) {
                let n = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
                return number_to_iso(n);
            }

            if tz_no_colon_pattern().is_match(&s) {
                let split = s.len() - 2;
                s = format!("{}:{}", &s[..split], &s[split..]);
            }

            if let Some(m) = datetime_with_tz_pattern().captures(&s) {
                let frac = normalize_fraction(m.get(2).map_or("", |f| f.as_str()));
                s = format!("{}{}{}", &m[1], frac, &m[3]);
            } else if let Some(m) = datetime_no_tz_pattern().captures(&s) {
                let frac = normalize_fraction(m.get(2).map_or("", |f| f.as_str()));
                s = format!("{}{}Z", &m[1], frac);
            }

            parse_time_string(&s).map(|t| format_iso(&t))
        }
        Value::Number(n) => number_to_iso(n.as_f64()?),
        _ => None,
    }
}

/// Whether a token should be refreshed before use. No known expiry means yes.
pub fn needs_refresh_by_expiry(now_ms: i64, expires_at_ms: Option<i64>, buffer_ms: i64) -> bool {
    match expires_at_ms {
        Some(expires_at) => now_ms + buffer_ms >= expires_at,
        None => true,
    }
}

/// Base64 decode trying standard, raw, and URL-safe alphabets in turn.
pub fn decode_base64_any(value: &str) -> Result<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

    for engine in [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD] {
        if let Ok(bytes) = engine.decode(value) {
            if let Ok(text) = String::from_utf8(bytes) {
                return Ok(text);
            }
        }
    }
    bail!("not valid base64")
}

/// Decodes the payload segment of a JWT without verifying the signature.
pub fn decode_jwt_payload(token: &str) -> Option<Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let decoded = decode_base64_any(parts[1]).ok()?;
    parse_json_object(&decoded)
}

pub fn format_iso(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn parse_time_string(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn normalize_fraction(frac: &str) -> String {
    if frac.is_empty() {
        return String::new();
    }
    let mut digits: String = frac.trim_start_matches('.').chars().take(3).collect();
    while digits.len() < 3 {
        digits.push('0');
    }
    format!(".{digits}")
}

fn number_to_iso(n: f64) -> Option<String> {
    if !n.is_finite() {
        return None;
    }
    // Small magnitudes are epoch seconds, large ones already milliseconds.
    let ms = if n.abs() < 1e10 { n * 1000.0 } else { n };
    DateTime::from_timestamp_millis(ms as i64).map(|t| format_iso(&t))
}
