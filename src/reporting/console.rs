//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints the end-of-run summary table and the failure details
//! to the console, with colour coding and internationalization support.
//!
//! 此模块在控制台打印运行结束时的摘要表格和失败详情，支持颜色编码和国际化。

use colored::*;

use crate::core::models::{ExecutionResult, ExecutionStatus};
use crate::core::summary::RunSummary;
use crate::infra::t;

fn colored_status(status: ExecutionStatus, locale: &str) -> ColoredString {
    let label = status.label(locale);
    match status {
        ExecutionStatus::Passed => label.green(),
        ExecutionStatus::Failed => label.red(),
        ExecutionStatus::Skipped => label.dimmed(),
        ExecutionStatus::Errored => label.red().bold(),
    }
}

/// Renders the duration column.
pub fn duration_cell(result: &ExecutionResult) -> String {
    match result.status {
        ExecutionStatus::Skipped => "N/A".to_string(),
        _ => format!("{:.2}s", result.duration.as_secs_f64()),
    }
}

/// Prints a formatted summary of the run in matrix order.
///
/// 按矩阵顺序打印格式化的运行摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Summary ---
///   - Passed     | py311                          |      1.23s  (cached)
///   - Failed     | lint                           |      0.45s  exit 1
///   - Skipped    | py38                           |        N/A
/// ```
pub fn print_summary(summary: &RunSummary, locale: &str) {
    println!("\n{}", t!("report.summary_banner", locale = locale).bold());

    for result in &summary.results {
        let mut note = String::new();
        if result.status == ExecutionStatus::Failed || result.status == ExecutionStatus::Errored {
            note = t!("report.exit_code", locale = locale, code = result.exit_code).to_string();
        } else if result.cache_hit {
            note = t!("report.cached", locale = locale).to_string();
        }
        println!(
            "  - {:<10} | {:<30} | {:>10}  {}",
            colored_status(result.status, locale),
            result.name,
            duration_cell(result),
            note.dimmed()
        );
    }

    let counts = t!(
        "report.counts",
        locale = locale,
        passed = summary.count(ExecutionStatus::Passed),
        failed = summary.count(ExecutionStatus::Failed),
        skipped = summary.count(ExecutionStatus::Skipped),
        errored = summary.count(ExecutionStatus::Errored)
    );
    println!("\n{counts}");

    if summary.interrupted {
        println!("{}", t!("report.interrupted", locale = locale).yellow().bold());
    } else if summary.success() {
        println!("{}", t!("report.all_passed", locale = locale).green().bold());
    } else {
        println!("{}", t!("report.some_failed", locale = locale).red().bold());
    }
}

/// Prints the captured output of every Failed or Errored environment.
///
/// 打印每个失败或出错环境的捕获输出。
pub fn print_failure_details(summary: &RunSummary, locale: &str) {
    let failures: Vec<&ExecutionResult> = summary.failures().collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("report.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}'",
            i + 1,
            failures.len(),
            colored_status(result.status, locale),
            result.name.cyan()
        );
        println!("\n--- {} ---\n", t!("report.output_header", locale = locale).yellow());
        println!("{}", result.output.trim_end());
        println!("\n{}", "-".repeat(80));
    }
}
