//! # Parallel Execution Integration Tests / 并行执行集成测试
//!
//! This module tests the concurrency limit, deterministic result ordering and
//! the distributed split across CI runners.
//!
//! 此模块测试并发限制、确定性的结果顺序以及在 CI 运行器之间的分布式划分。
#![cfg(unix)]

mod common;

use common::{run_cmd, shell_project};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::time::{Duration, Instant};

/// Creates a matrix with `count` environments that each sleep for `sleep`.
fn sleeping_matrix(count: usize, sleep: &str) -> String {
    let mut content = String::new();
    for i in 0..count {
        content.push_str(&format!(
            "[env.sleep-{i}]\ncommands = [\"sleep {sleep}\", \"echo sleep-{i} done\"]\n\n"
        ));
    }
    content
}

#[test]
fn test_parallel_jobs_overlap() {
    let (_dir, config) = shell_project(&sleeping_matrix(4, "1"));

    let started = Instant::now();
    run_cmd(&config).arg("-j").arg("4").assert().success();
    let parallel = started.elapsed();

    // Four one-second environments in parallel take well under four seconds.
    assert!(
        parallel < Duration::from_millis(3500),
        "parallel run took {parallel:?}"
    );
}

#[test]
fn test_single_job_runs_sequentially() {
    let (_dir, config) = shell_project(&sleeping_matrix(3, "0.5"));

    let started = Instant::now();
    run_cmd(&config).arg("-j").arg("1").assert().success();
    assert!(started.elapsed() >= Duration::from_millis(1500));
}

#[test]
fn test_summary_follows_matrix_order() {
    let (_dir, config) = shell_project(
        r#"
[tox]
envlist = ["slow", "fast"]

[env.slow]
commands = ["sleep 1"]

[env.fast]
commands = ["true"]
"#,
    );

    let output = run_cmd(&config).arg("-j").arg("2").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    // Completion lines arrive fast-first, the summary stays in matrix order.
    let progress_fast = stdout.find("fast passed").unwrap();
    let progress_slow = stdout.find("slow passed").unwrap();
    assert!(progress_fast < progress_slow);

    let summary = stdout.split("--- Summary ---").nth(1).unwrap();
    assert!(summary.find("| slow").unwrap() < summary.find("| fast").unwrap());
}

#[test]
fn test_distributed_runners_partition_the_matrix() {
    let (_dir, config) = shell_project(&sleeping_matrix(4, "0"));

    let first = run_cmd(&config)
        .args(["--total-runners", "2", "--runner-index", "0"])
        .output()
        .unwrap();
    let second = run_cmd(&config)
        .args(["--total-runners", "2", "--runner-index", "1"])
        .output()
        .unwrap();
    assert!(first.status.success() && second.status.success());

    let first = String::from_utf8_lossy(&first.stdout);
    let second = String::from_utf8_lossy(&second.stdout);
    for i in 0..4 {
        let name = format!("| sleep-{i} ");
        assert!(
            first.contains(&name) ^ second.contains(&name),
            "sleep-{i} must run on exactly one runner"
        );
    }
    assert!(first.contains("runner 1 of 2"));
}

#[test]
fn test_runner_index_out_of_range() {
    let (_dir, config) = shell_project(&sleeping_matrix(1, "0"));
    run_cmd(&config)
        .args(["--total-runners", "2", "--runner-index", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Runner index must be less than total runners"));
}
