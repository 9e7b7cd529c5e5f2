//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command, which loads the matrix, selects
//! environments, runs them in parallel and reports the outcome.
//!
//! 此模块实现 `run` 命令：加载矩阵、选择环境、并行运行它们并报告结果。

use anyhow::{Context, Result};
use colored::*;
use std::{path::PathBuf, process::ExitCode};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        config,
        execution::{RunOptions, default_jobs, run_matrix},
        planner::{self, Selection},
        runner::HostEnv,
    },
    infra::t,
    reporting::{generate_html_report, generate_json_report, print_failure_details, print_summary},
};

/// Everything `run` accepts on the command line.
/// `run` 在命令行上接受的所有参数。
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub config: PathBuf,
    pub envs: Option<Vec<String>>,
    pub jobs: Option<usize>,
    pub recreate: bool,
    pub skip_missing_interpreters: Option<bool>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub posargs: Vec<String>,
}

/// Executes the run command with the provided arguments.
///
/// Configuration errors abort before anything runs. Otherwise the returned
/// exit code reflects the run summary.
///
/// 使用提供的参数执行运行命令。配置错误会在运行任何内容之前终止。
/// 否则返回的退出码反映运行摘要。
pub async fn execute(args: RunArgs, locale: &str) -> Result<ExitCode> {
    let matrix = config::load_matrix(&args.config, args.posargs.clone())
        .with_context(|| t!("run.config_failed", locale = locale, path = args.config.display()).to_string())?;
    println!(
        "{}",
        t!("run.loaded_matrix", locale = locale, path = args.config.display(), count = matrix.environments.len())
    );

    let selection = Selection {
        envs: args.envs.clone(),
        total_runners: args.total_runners,
        runner_index: args.runner_index,
    };
    let plan = planner::plan_execution(&matrix, &selection)?;

    if let (Some(total), Some(index)) = (args.total_runners, args.runner_index) {
        println!(
            "{}",
            t!(
                "run.split_runner",
                locale = locale,
                index = index + 1,
                total = total,
                count = plan.environments.len()
            )
            .bold()
        );
    }

    if plan.environments.is_empty() {
        println!("{}", t!("run.nothing_to_run", locale = locale).green());
        return Ok(ExitCode::SUCCESS);
    }

    let jobs = args.jobs.unwrap_or_else(default_jobs).max(1);
    println!(
        "{}",
        t!("run.starting", locale = locale, count = plan.environments.len(), jobs = jobs).bold()
    );

    let mut options = RunOptions::new(HostEnv::capture());
    options.jobs = jobs;
    options.provision.recreate = args.recreate;
    options.skip_missing_interpreters = args.skip_missing_interpreters;
    options.progress = true;

    let cancel = setup_signal_handler(locale);
    let summary = run_matrix(plan.environments, &options, cancel).await;

    print_summary(&summary, locale);
    print_failure_details(&summary, locale);

    if let Some(path) = &args.html {
        println!("\n{}", t!("run.writing_html", locale = locale, path = path.display()));
        if let Err(e) = generate_html_report(&summary, path, locale) {
            eprintln!("{} {:#}", t!("run.report_failed", locale = locale).red(), e);
        }
    }
    if let Some(path) = &args.json {
        println!("{}", t!("run.writing_json", locale = locale, path = path.display()));
        if let Err(e) = generate_json_report(&summary, path) {
            eprintln!("{} {:#}", t!("run.report_failed", locale = locale).red(), e);
        }
    }

    tracing::debug!(exit_code = summary.exit_code(), "run finished");
    Ok(ExitCode::from(summary.exit_code() as u8))
}

/// Sets up a signal handler for graceful shutdown.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("\n{}", t!("run.shutdown_signal", locale = &locale).yellow());
                token_clone.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    token
}
