//! # HTML Reporting Module / HTML 报告模块
//!
//! This module renders a self-contained HTML report with run statistics, a
//! results table in matrix order and collapsible output for failures.
//!
//! 此模块生成独立的 HTML 报告，包含运行统计、按矩阵顺序的结果表格，
//! 以及可折叠的失败输出。

use anyhow::{Context, Result};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::Path;

use crate::core::models::ExecutionStatus;
use crate::core::summary::RunSummary;
use crate::infra::t;
use crate::reporting::console::duration_cell;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 2em; color: #24292f; }
h1 { font-weight: 600; }
.summary-container { display: flex; gap: 1.5em; margin-bottom: 1.5em; }
.summary-item { display: flex; flex-direction: column; align-items: center; padding: 0.8em 1.4em; border: 1px solid #d0d7de; border-radius: 6px; }
.summary-item .count { font-size: 1.8em; font-weight: 600; }
.summary-item .label { color: #57606a; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: 0.5em 0.8em; border-bottom: 1px solid #d0d7de; }
.status-cell { display: inline-block; padding: 0.1em 0.6em; border-radius: 1em; font-weight: 600; }
.status-Passed { background: #dafbe1; color: #1a7f37; }
.status-Failed { background: #ffebe9; color: #cf222e; }
.status-Skipped { background: #eaeef2; color: #57606a; }
.status-Errored { background: #cf222e; color: #ffffff; }
.output-toggle { cursor: pointer; color: #0969da; font-size: 0.9em; }
.output-content { background: #f6f8fa; padding: 1em; overflow-x: auto; white-space: pre-wrap; }
.interrupted { color: #9a6700; font-weight: 600; }
"#;

/// Embedded JavaScript for HTML report interactivity / HTML 报告交互性的嵌入式 JavaScript
const HTML_SCRIPT: &str = r#"
function toggleOutput(id) {
  var row = document.getElementById(id);
  row.style.display = row.style.display === 'none' ? 'table-row' : 'none';
}
"#;

/// Renders the report markup for `summary`.
/// 为 `summary` 生成报告标记。
pub fn render_html_report(summary: &RunSummary, locale: &str) -> Markup {
    let stats = [
        (summary.results.len(), "", t!("report.html.total", locale = locale)),
        (
            summary.count(ExecutionStatus::Passed),
            "status-Passed",
            t!("report.status_passed", locale = locale),
        ),
        (
            summary.count(ExecutionStatus::Failed),
            "status-Failed",
            t!("report.status_failed", locale = locale),
        ),
        (
            summary.count(ExecutionStatus::Skipped),
            "status-Skipped",
            t!("report.status_skipped", locale = locale),
        ),
        (
            summary.count(ExecutionStatus::Errored),
            "status-Errored",
            t!("report.status_errored", locale = locale),
        ),
    ];

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("report.html.title", locale = locale)) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("report.html.title", locale = locale)) }
                @if summary.interrupted {
                    p class="interrupted" { (t!("report.interrupted", locale = locale)) }
                }
                div class="summary-container" {
                    @for (count, class, label) in &stats {
                        div class="summary-item" {
                            span class={ "count " (class) } { (count) }
                            span class="label" { (label) }
                        }
                    }
                }
                table {
                    thead {
                        tr {
                            th { (t!("report.html.name", locale = locale)) }
                            th { (t!("report.html.status", locale = locale)) }
                            th { (t!("report.html.exit_code", locale = locale)) }
                            th { (t!("report.html.duration", locale = locale)) }
                        }
                    }
                    tbody {
                        @for (i, result) in summary.results.iter().enumerate() {
                            @let output_id = format!("output-{i}");
                            tr {
                                td { (result.name) }
                                td {
                                    div class={ "status-cell " (result.status.css_class()) } {
                                        (result.status.label(locale))
                                    }
                                    @if !result.output.is_empty() {
                                        div class="output-toggle"
                                            onclick=(format!("toggleOutput('{output_id}')")) {
                                            (t!("report.html.toggle_output", locale = locale))
                                        }
                                    }
                                }
                                td { (result.exit_code) }
                                td { (duration_cell(result)) }
                            }
                            @if !result.output.is_empty() {
                                tr id=(output_id) style="display:none;" {
                                    td colspan="4" {
                                        pre class="output-content" { (result.output) }
                                    }
                                }
                            }
                        }
                    }
                }
                script { (PreEscaped(HTML_SCRIPT)) }
            }
        }
    }
}

/// Writes the HTML report for `summary` to `output_path`.
///
/// 将 `summary` 的 HTML 报告写入 `output_path`。
pub fn generate_html_report(summary: &RunSummary, output_path: &Path, locale: &str) -> Result<()> {
    let markup = render_html_report(summary, locale);
    fs::write(output_path, markup.into_string())
        .with_context(|| format!("failed to write HTML report to {}", output_path.display()))?;
    Ok(())
}
