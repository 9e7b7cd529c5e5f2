//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the orchestrator:
//! the resolved environment descriptor, the handle to a provisioned context and
//! the per-environment execution result.
//!
//! 此模块定义了整个编排器中使用的核心数据结构：
//! 解析后的环境描述符、已准备上下文的句柄以及每个环境的执行结果。

use crate::infra::t;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A fully resolved test environment. Created once by the matrix loader and
/// read-only afterwards.
/// 完全解析后的测试环境。由矩阵加载器创建一次，之后只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// Unique name of the environment within its matrix.
    /// 环境在矩阵中的唯一名称。
    pub name: String,
    /// Free-form text shown by `list`.
    #[serde(default)]
    pub description: Option<String>,
    /// Interpreter selector: a program name looked up on the search path,
    /// or a path to an executable.
    /// 解释器选择器：在搜索路径上查找的程序名，或可执行文件的路径。
    pub interpreter: String,
    /// Dependency sources in install order. Entries starting with `-r` name
    /// requirement files.
    /// 按安装顺序排列的依赖来源。以 `-r` 开头的条目表示依赖文件。
    pub deps: Vec<String>,
    /// Variables set for every command, applied last.
    pub setenv: BTreeMap<String, String>,
    /// Host variables (or `PREFIX*` patterns) passed through to commands.
    pub passenv: Vec<String>,
    /// Commands to run in order; never empty, and no argv is empty.
    /// 按顺序运行的命令；永不为空，且每个 argv 都不为空。
    pub commands: Vec<Vec<String>>,
    /// Report the environment as skipped rather than errored when its
    /// interpreter cannot be found.
    /// 找不到解释器时，将环境报告为跳过而不是错误。
    pub skip_missing_interpreters: bool,
    /// Install the project itself in develop mode after the dependencies.
    pub usedevelop: bool,
    /// Directory of the configuration file the environment was loaded from.
    pub toxinidir: PathBuf,
    /// Root of the environment's isolated context.
    pub envdir: PathBuf,
    /// Working directory for commands.
    pub changedir: PathBuf,
    /// Installer argv template, `{packages}` is spliced with the install arguments.
    pub install_command: Vec<String>,
    /// Context creation argv template. Empty means "just create the directory".
    pub create_command: Vec<String>,
    /// Keep running commands after a failure; the environment still fails.
    pub ignore_errors: bool,
}

/// The final status of one environment.
/// 单个环境的最终状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Passed,
    /// A command exited non-zero.
    /// 某个命令以非零状态退出。
    Failed,
    /// The interpreter was unavailable and skipping was allowed, or the run
    /// was interrupted before the environment started.
    /// 解释器不可用且允许跳过，或运行在该环境开始前被中断。
    Skipped,
    /// The context could not be provisioned.
    /// 无法准备执行上下文。
    Errored,
}

impl ExecutionStatus {
    /// `Failed` and `Errored` count against overall success.
    pub fn is_failure(self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::Errored)
    }

    /// Localised label for console and HTML output.
    /// 用于控制台和 HTML 输出的本地化标签。
    pub fn label(self, locale: &str) -> String {
        match self {
            ExecutionStatus::Passed => t!("report.status_passed", locale = locale).to_string(),
            ExecutionStatus::Failed => t!("report.status_failed", locale = locale).to_string(),
            ExecutionStatus::Skipped => t!("report.status_skipped", locale = locale).to_string(),
            ExecutionStatus::Errored => t!("report.status_errored", locale = locale).to_string(),
        }
    }

    /// CSS class used by the HTML report.
    pub fn css_class(self) -> &'static str {
        match self {
            ExecutionStatus::Passed => "status-Passed",
            ExecutionStatus::Failed => "status-Failed",
            ExecutionStatus::Skipped => "status-Skipped",
            ExecutionStatus::Errored => "status-Errored",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Passed => "passed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// The outcome of one environment in one invocation. Immutable once built.
/// 单次调用中一个环境的结果。构建后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Name of the environment this result belongs to.
    pub name: String,
    pub status: ExecutionStatus,
    /// Exit code of the failing command, 0 on success or skip, -1 when no
    /// subprocess produced one.
    /// 失败命令的退出码；成功或跳过时为 0；没有子进程提供时为 -1。
    pub exit_code: i32,
    /// Combined stdout and stderr of everything run for this environment.
    pub output: String,
    pub duration: Duration,
    /// Whether provisioning was satisfied from the on-disk cache.
    pub cache_hit: bool,
}

impl ExecutionResult {
    pub fn passed(name: &str, output: String, duration: Duration, cache_hit: bool) -> Self {
        Self {
            name: name.to_string(),
            status: ExecutionStatus::Passed,
            exit_code: 0,
            output,
            duration,
            cache_hit,
        }
    }

    pub fn failed(
        name: &str,
        exit_code: i32,
        output: String,
        duration: Duration,
        cache_hit: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            status: ExecutionStatus::Failed,
            exit_code,
            output,
            duration,
            cache_hit,
        }
    }

    pub fn skipped(name: &str, reason: String) -> Self {
        Self {
            name: name.to_string(),
            status: ExecutionStatus::Skipped,
            exit_code: 0,
            output: reason,
            duration: Duration::ZERO,
            cache_hit: false,
        }
    }

    pub fn errored(name: &str, exit_code: i32, output: String, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            status: ExecutionStatus::Errored,
            exit_code,
            output,
            duration,
            cache_hit: false,
        }
    }
}

/// An opaque handle to a provisioned execution context.
/// 已准备好的执行上下文的句柄。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextHandle {
    /// Root directory of the context.
    pub envdir: PathBuf,
    /// Directory prepended to `PATH` for every command.
    /// 为每个命令添加到 `PATH` 前面的目录。
    pub bin_dir: PathBuf,
    /// Resolved interpreter executable.
    pub interpreter: PathBuf,
    /// `true` when nothing had to be (re)installed.
    pub cache_hit: bool,
    /// Transcript of the creation and installation steps, empty on a cache hit.
    pub provision_log: String,
}
