//! # Reporting Module / 报告模块
//!
//! This module handles the display of run results in multiple formats:
//! a colourful console summary, a styled HTML report and a JSON report.
//!
//! 此模块以多种格式显示运行结果：彩色控制台摘要、样式化 HTML 报告和 JSON 报告。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
pub use json::generate_json_report;
