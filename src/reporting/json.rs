//! # JSON Reporting Module / JSON 报告模块
//!
//! Machine-readable report of a run, for CI dashboards.
//!
//! 运行的机器可读报告，供 CI 仪表板使用。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core::models::{ExecutionResult, ExecutionStatus};
use crate::core::summary::RunSummary;

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub success: bool,
    pub interrupted: bool,
    pub exit_code: i32,
    pub environments: Vec<JsonEnvironment<'a>>,
}

#[derive(Debug, Serialize)]
pub struct JsonEnvironment<'a> {
    pub name: &'a str,
    pub status: ExecutionStatus,
    pub exit_code: i32,
    pub duration_secs: f64,
    pub cache_hit: bool,
    pub output: &'a str,
}

impl<'a> From<&'a ExecutionResult> for JsonEnvironment<'a> {
    fn from(result: &'a ExecutionResult) -> Self {
        Self {
            name: &result.name,
            status: result.status,
            exit_code: result.exit_code,
            duration_secs: result.duration.as_secs_f64(),
            cache_hit: result.cache_hit,
            output: &result.output,
        }
    }
}

impl<'a> JsonReport<'a> {
    pub fn new(summary: &'a RunSummary) -> Self {
        Self {
            generated_at: Utc::now(),
            success: summary.success(),
            interrupted: summary.interrupted,
            exit_code: summary.exit_code(),
            environments: summary.results.iter().map(JsonEnvironment::from).collect(),
        }
    }
}

/// Writes the JSON report for `summary` to `output_path`.
/// 将 `summary` 的 JSON 报告写入 `output_path`。
pub fn generate_json_report(summary: &RunSummary, output_path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(&JsonReport::new(summary))?;
    fs::write(output_path, text)
        .with_context(|| format!("failed to write JSON report to {}", output_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn report_lists_environments_in_order() {
        let summary = RunSummary::from_slots(
            vec![
                Some(ExecutionResult::passed("a", "ok\n".to_string(), Duration::from_secs(1), true)),
                Some(ExecutionResult::skipped("c", "no interpreter".to_string())),
            ],
            false,
        );
        let value = serde_json::to_value(JsonReport::new(&summary)).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["exit_code"], 0);
        assert_eq!(value["environments"][0]["name"], "a");
        assert_eq!(value["environments"][0]["status"], "Passed");
        assert_eq!(value["environments"][0]["cache_hit"], true);
        assert_eq!(value["environments"][1]["status"], "Skipped");
    }
}
