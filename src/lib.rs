//! # tox-matrix Library / tox-matrix 库
//!
//! This library provides the core functionality for the `tox-matrix` tool,
//! a configuration-driven orchestrator that provisions isolated, cached test
//! environments from a declarative matrix and runs them in parallel.
//!
//! 此库为 `tox-matrix` 工具提供核心功能，
//! 这是一个配置驱动的编排器，根据声明式矩阵准备隔离且带缓存的测试环境并并行运行它们。
//!
//! ## Modules / 模块
//!
//! - `core` - Matrix loading, provisioning, command running and aggregation
//! - `infra` - Infrastructure services like subprocess capture and file system operations
//! - `reporting` - Console, HTML and JSON reports
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 矩阵加载、环境准备、命令运行和结果汇总
//! - `infra` - 基础设施服务，如子进程捕获和文件系统操作
//! - `reporting` - 控制台、HTML 和 JSON 报告
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// It attempts to match the full locale (e.g., "zh-CN"), then just the
/// language code (e.g., "en"), and finally falls back to "en". Returns the
/// locale that was set.
///
/// 根据系统区域设置初始化国际化，并返回所设置的区域。
pub fn init() -> String {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let lang = resolve_locale(&locale, &rust_i18n::available_locales!());
    rust_i18n::set_locale(&lang);
    lang
}

fn resolve_locale(locale: &str, available: &[&str]) -> String {
    if available.contains(&locale) {
        return locale.to_string();
    }
    locale
        .split(['-', '_'])
        .next()
        .and_then(|code| {
            available
                .iter()
                .find(|a| **a == code || a.split('-').next() == Some(code))
        })
        .map(|a| a.to_string())
        .unwrap_or_else(|| "en".to_string())
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
