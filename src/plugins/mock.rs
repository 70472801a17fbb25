//! Deterministic provider used to exercise every line variant end to end.

use crate::manager::{QueryError, UsagePlugin};
use crate::runtime::env::PluginEnv;
use crate::runtime::value::format_iso;
use crate::types::{MetricLine, ProgressFormat, ProgressLineOptions, QueryResult, TextLineOptions};
use chrono::{Duration, Utc};

pub struct MockPlugin;

impl UsagePlugin for MockPlugin {
    fn id(&self) -> &str {
        "mock"
    }

    fn query(&self, _env: &PluginEnv) -> Result<QueryResult, QueryError> {
        let thirty_days_ms = 30 * 24 * 60 * 60 * 1000i64;
        let resets_at = format_iso(&(Utc::now() + Duration::days(15)));
        let past_reset = format_iso(&(Utc::now() - Duration::minutes(1)));

        let window = |resets: &str| ProgressLineOptions {
            resets_at: Some(resets.to_string()),
            period_duration_ms: Some(thirty_days_ms),
            ..Default::default()
        };

        let lines = vec![
            MetricLine::progress("Ahead pace", 30.0, 100.0, ProgressFormat::percent(), window(&resets_at)),
            MetricLine::progress("On Track pace", 45.0, 100.0, ProgressFormat::percent(), window(&resets_at)),
            MetricLine::progress("Behind pace", 65.0, 100.0, ProgressFormat::percent(), window(&resets_at)),
            MetricLine::progress("Empty bar", 0.0, 500.0, ProgressFormat::dollars(), ProgressLineOptions::default()),
            MetricLine::progress("Exactly full", 1000.0, 1000.0, ProgressFormat::count("tokens"), ProgressLineOptions::default()),
            MetricLine::progress("Over limit!", 1337.0, 1000.0, ProgressFormat::count("requests"), ProgressLineOptions::default()),
            MetricLine::progress("Huge numbers", 8_429_301.0, 10_000_000.0, ProgressFormat::count("tokens"), ProgressLineOptions::default()),
            MetricLine::progress("Tiny sliver", 1.0, 10_000.0, ProgressFormat::percent(), ProgressLineOptions::default()),
            MetricLine::progress("Almost full", 9_999.0, 10_000.0, ProgressFormat::percent(), ProgressLineOptions::default()),
            MetricLine::progress("Expired reset", 42.0, 100.0, ProgressFormat::percent(), window(&past_reset)),
            MetricLine::text("Status", "Active", TextLineOptions::default()),
            MetricLine::text(
                "Very long value",
                "This is an extremely long value string that should test text overflow and wrapping behavior in the card layout",
                TextLineOptions::default(),
            ),
            MetricLine::text("", "Empty label", TextLineOptions::default()),
            MetricLine::badge(
                "Tier",
                "Enterprise",
                TextLineOptions {
                    color: Some("#8B5CF6".to_string()),
                    ..Default::default()
                },
            ),
            MetricLine::badge(
                "Alert",
                "Rate limited",
                TextLineOptions {
                    color: Some("#ef4444".to_string()),
                    ..Default::default()
                },
            ),
            MetricLine::badge("Region", "us-east-1", TextLineOptions::default()),
        ];

        Ok(QueryResult {
            plan: Some("stress-test".to_string()),
            lines,
        })
    }
}
