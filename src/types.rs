//! Metric line and output record types shared by the manager and providers.
//!
//! The JSON shape (camelCase fields, `type`-tagged lines) is consumed as-is
//! by presentation layers, so the serde attributes here are part of the
//! contract.

use serde::{Deserialize, Serialize};

/// Red used for error badges.
const ERROR_COLOR: &str = "#ef4444";

/// How a progress line renders its used/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Percent,
    Dollars,
    Count,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressFormat {
    pub kind: FormatKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl ProgressFormat {
    pub fn percent() -> Self {
        Self {
            kind: FormatKind::Percent,
            suffix: None,
        }
    }

    pub fn dollars() -> Self {
        Self {
            kind: FormatKind::Dollars,
            suffix: None,
        }
    }

    pub fn count(suffix: impl Into<String>) -> Self {
        Self {
            kind: FormatKind::Count,
            suffix: Some(suffix.into()),
        }
    }
}

/// One displayable usage row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricLine {
    #[serde(rename_all = "camelCase")]
    Text {
        label: String,
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        label: String,
        used: f64,
        limit: f64,
        format: ProgressFormat,
        #[serde(skip_serializing_if = "Option::is_none")]
        resets_at: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        period_duration_ms: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Badge {
        label: String,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        subtitle: Option<String>,
    },
}

/// Optional decoration for text and badge lines.
#[derive(Debug, Clone, Default)]
pub struct TextLineOptions {
    pub color: Option<String>,
    pub subtitle: Option<String>,
}

/// Optional decoration and period metadata for progress lines.
#[derive(Debug, Clone, Default)]
pub struct ProgressLineOptions {
    pub resets_at: Option<String>,
    pub period_duration_ms: Option<i64>,
    pub color: Option<String>,
    pub subtitle: Option<String>,
}

impl MetricLine {
    pub fn text(
        label: impl Into<String>,
        value: impl Into<String>,
        opts: TextLineOptions,
    ) -> Self {
        MetricLine::Text {
            label: label.into(),
            value: value.into(),
            color: opts.color,
            subtitle: opts.subtitle,
        }
    }

    pub fn badge(label: impl Into<String>, text: impl Into<String>, opts: TextLineOptions) -> Self {
        MetricLine::Badge {
            label: label.into(),
            text: text.into(),
            color: opts.color,
            subtitle: opts.subtitle,
        }
    }

    pub fn progress(
        label: impl Into<String>,
        used: f64,
        limit: f64,
        format: ProgressFormat,
        opts: ProgressLineOptions,
    ) -> Self {
        MetricLine::Progress {
            label: label.into(),
            used,
            limit,
            format,
            resets_at: opts.resets_at,
            period_duration_ms: opts.period_duration_ms.filter(|ms| *ms > 0),
            color: opts.color,
            subtitle: opts.subtitle,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MetricLine::Text { label, .. }
            | MetricLine::Progress { label, .. }
            | MetricLine::Badge { label, .. } => label,
        }
    }
}

/// The single error row a query degrades to when no real lines survive.
pub fn error_lines(message: impl Into<String>) -> Vec<MetricLine> {
    vec![MetricLine::badge(
        "Error",
        message,
        TextLineOptions {
            color: Some(ERROR_COLOR.to_string()),
            ..Default::default()
        },
    )]
}

/// What a live provider returns from one query. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub plan: Option<String>,
    pub lines: Vec<MetricLine>,
}

/// The externally visible record: exactly one per requested provider id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOutput {
    pub provider_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    pub lines: Vec<MetricLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_line_serializes_with_type_tag() {
        let line = MetricLine::text("Status", "Active", TextLineOptions::default());
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["label"], "Status");
        assert_eq!(json["value"], "Active");
        assert!(json.get("color").is_none());
    }

    #[test]
    fn progress_line_uses_camel_case_fields() {
        let line = MetricLine::progress(
            "Session",
            42.0,
            100.0,
            ProgressFormat::percent(),
            ProgressLineOptions {
                resets_at: Some("2026-08-01T00:00:00.000Z".to_string()),
                period_duration_ms: Some(18_000_000),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["format"]["kind"], "percent");
        assert_eq!(json["resetsAt"], "2026-08-01T00:00:00.000Z");
        assert_eq!(json["periodDurationMs"], 18_000_000);
    }

    #[test]
    fn progress_line_drops_non_positive_period() {
        let line = MetricLine::progress(
            "Credits",
            1.0,
            2.0,
            ProgressFormat::count("credits"),
            ProgressLineOptions {
                period_duration_ms: Some(0),
                ..Default::default()
            },
        );
        let json = serde_json::to_value(&line).unwrap();
        assert!(json.get("periodDurationMs").is_none());
        assert_eq!(json["format"]["suffix"], "credits");
    }

    #[test]
    fn error_lines_produce_one_red_badge() {
        let lines = error_lines("boom");
        assert_eq!(lines.len(), 1);
        match &lines[0] {
            MetricLine::Badge { label, text, color, .. } => {
                assert_eq!(label, "Error");
                assert_eq!(text, "boom");
                assert_eq!(color.as_deref(), Some(ERROR_COLOR));
            }
            other => panic!("unexpected line: {other:?}"),
        }
    }

    #[test]
    fn plugin_output_omits_empty_optionals() {
        let output = PluginOutput {
            provider_id: "mock".to_string(),
            display_name: "Mock".to_string(),
            plan: None,
            lines: error_lines("No data"),
            icon_url: None,
            error: None,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["providerId"], "mock");
        assert_eq!(json["displayName"], "Mock");
        assert!(json.get("plan").is_none());
        assert!(json.get("iconUrl").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn clamp_and_round() {
        assert_eq!(clamp(120.0, 0.0, 100.0), 100.0);
        assert_eq!(clamp(-3.0, 0.0, 100.0), 0.0);
        assert_eq!(clamp(55.5, 0.0, 100.0), 55.5);
        assert_eq!(round_to(1.2345, 2), 1.23);
        assert_eq!(round_to(1.25, 1), 1.3);
    }
}
