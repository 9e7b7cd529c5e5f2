//! # Matrix Execution Engine Module / 矩阵执行引擎模块
//!
//! This module drives environments from provisioning to a final
//! [`ExecutionResult`], and runs a whole selection in parallel under a
//! concurrency limit while keeping results in matrix order.
//!
//! 此模块驱动环境从准备到最终的 [`ExecutionResult`]，
//! 并在并发限制下并行运行整个选择，同时保持结果的矩阵顺序。

use colored::*;
use futures::{StreamExt, stream};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::error::ProvisionError;
use crate::core::models::{EnvironmentDescriptor, ExecutionResult, ExecutionStatus};
use crate::core::provision::{self, ProvisionOptions};
use crate::core::runner::{self, HostEnv};
use crate::core::summary::RunSummary;
use crate::infra::t;

/// Everything a run needs besides the descriptors themselves.
/// 运行除描述符外所需的一切。
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum number of environments in flight.
    pub jobs: usize,
    pub provision: ProvisionOptions,
    /// Overrides every descriptor's skip flag when set.
    pub skip_missing_interpreters: Option<bool>,
    /// Print a status line as each environment completes.
    pub progress: bool,
}

impl RunOptions {
    pub fn new(host: HostEnv) -> Self {
        Self {
            jobs: default_jobs(),
            provision: ProvisionOptions::new(host),
            skip_missing_interpreters: None,
            progress: false,
        }
    }

    fn host(&self) -> &HostEnv {
        &self.provision.host
    }
}

/// Default concurrency limit.
pub fn default_jobs() -> usize {
    num_cpus::get() / 2 + 1
}

/// The main entry point for a single environment: provision its context, run
/// its commands, and classify the outcome.
///
/// 单个环境的主入口：准备其上下文，运行其命令，并对结果分类。
pub async fn run_environment(
    descriptor: &EnvironmentDescriptor,
    options: &RunOptions,
) -> ExecutionResult {
    let started = Instant::now();
    let name = descriptor.name.as_str();

    let ctx = match provision::provision(descriptor, &options.provision).await {
        Ok(ctx) => ctx,
        Err(ProvisionError::InterpreterUnavailable(interpreter)) => {
            let message = t!("run.interpreter_missing", name = name, interpreter = &interpreter).to_string();
            let skip = options
                .skip_missing_interpreters
                .unwrap_or(descriptor.skip_missing_interpreters);
            tracing::warn!(env = name, interpreter = %interpreter, skip, "interpreter unavailable");
            return if skip {
                ExecutionResult::skipped(name, message)
            } else {
                ExecutionResult::errored(name, -1, message, started.elapsed())
            };
        }
        Err(e) => {
            tracing::error!(env = name, error = %e, "provisioning failed");
            let mut output = format!("{e}\n");
            if let Some(log) = e.output() {
                output.push_str(log);
            }
            return ExecutionResult::errored(name, e.exit_code(), output, started.elapsed());
        }
    };

    let outcome = runner::run_commands(&ctx, descriptor, options.host()).await;
    let output = format!("{}{}", ctx.provision_log, outcome.output);
    if outcome.success() {
        ExecutionResult::passed(name, output, started.elapsed(), ctx.cache_hit)
    } else {
        ExecutionResult::failed(
            name,
            outcome.exit_code,
            output,
            started.elapsed(),
            ctx.cache_hit,
        )
    }
}

/// Runs every descriptor, at most `options.jobs` at a time.
///
/// Results are slotted by position, so the summary is in matrix order no
/// matter which environment finishes first. Once `cancel` fires, environments
/// that have not started are reported Skipped and in-flight ones are dropped
/// (killing their subprocesses) without a result.
///
/// 运行所有描述符，同时最多运行 `options.jobs` 个。结果按位置存放，
/// 因此无论哪个环境先完成，摘要都保持矩阵顺序。一旦 `cancel` 触发，
/// 尚未开始的环境被报告为跳过，正在运行的环境被丢弃（终止其子进程）且不产生结果。
pub async fn run_matrix(
    descriptors: Vec<EnvironmentDescriptor>,
    options: &RunOptions,
    cancel: CancellationToken,
) -> RunSummary {
    let total = descriptors.len();
    let options = Arc::new(options.clone());

    let completed: Vec<(usize, Option<ExecutionResult>)> =
        stream::iter(descriptors.into_iter().enumerate().map(|(index, descriptor)| {
            let options = Arc::clone(&options);
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    let reason = t!("run.not_started").to_string();
                    return (index, Some(ExecutionResult::skipped(&descriptor.name, reason)));
                }
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!(env = %descriptor.name, "cancelled while running");
                        None
                    }
                    result = run_environment(&descriptor, &options) => Some(result),
                };
                if options.progress {
                    if let Some(result) = &result {
                        print_progress(result);
                    }
                }
                (index, result)
            }
        }))
        .buffer_unordered(options.jobs.max(1))
        .collect()
        .await;

    let mut slots: Vec<Option<ExecutionResult>> = vec![None; total];
    for (index, result) in completed {
        slots[index] = result;
    }
    RunSummary::from_slots(slots, cancel.is_cancelled())
}

fn print_progress(result: &ExecutionResult) {
    let duration = format!("{:.2}", result.duration.as_secs_f64());
    let line = match result.status {
        ExecutionStatus::Passed => {
            t!("run.env_passed", name = &result.name, duration = &duration).green()
        }
        ExecutionStatus::Failed => t!(
            "run.env_failed",
            name = &result.name,
            code = result.exit_code,
            duration = &duration
        )
        .red(),
        ExecutionStatus::Skipped => t!("run.env_skipped", name = &result.name).yellow(),
        ExecutionStatus::Errored => t!("run.env_errored", name = &result.name).red().bold(),
    };
    println!("{line}");
}
