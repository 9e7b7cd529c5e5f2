//! # Result Aggregation / 结果汇总
//!
//! Combines per-environment results into a [`RunSummary`] and a process exit code.
//!
//! 将各环境的结果合并为 [`RunSummary`] 和进程退出码。

use crate::core::models::{ExecutionResult, ExecutionStatus};

/// Exit code of a run that was interrupted by the user.
pub const EXIT_INTERRUPTED: i32 = 130;

/// All results of one invocation, in matrix order.
/// 一次调用的所有结果，按矩阵顺序排列。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub results: Vec<ExecutionResult>,
    /// Set when the run was cancelled; in-flight environments have no result.
    /// 运行被取消时设置；正在运行的环境没有结果。
    pub interrupted: bool,
}

impl RunSummary {
    /// Builds the summary from per-position slots. Empty slots belong to
    /// environments cancelled mid-flight and are dropped.
    ///
    /// 从按位置排列的槽构建摘要。空槽属于中途被取消的环境，会被丢弃。
    pub fn from_slots(slots: Vec<Option<ExecutionResult>>, interrupted: bool) -> Self {
        Self {
            results: slots.into_iter().flatten().collect(),
            interrupted,
        }
    }

    /// `true` iff no environment Failed or Errored.
    pub fn success(&self) -> bool {
        !self.results.iter().any(|r| r.status.is_failure())
    }

    /// 0 on success, [`EXIT_INTERRUPTED`] after a cancellation, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else if self.success() {
            0
        } else {
            1
        }
    }

    pub fn count(&self, status: ExecutionStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.status.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(name: &str, status: ExecutionStatus) -> ExecutionResult {
        match status {
            ExecutionStatus::Passed => ExecutionResult::passed(name, String::new(), Duration::ZERO, false),
            ExecutionStatus::Failed => ExecutionResult::failed(name, 1, String::new(), Duration::ZERO, false),
            ExecutionStatus::Skipped => ExecutionResult::skipped(name, String::new()),
            ExecutionStatus::Errored => ExecutionResult::errored(name, -1, String::new(), Duration::ZERO),
        }
    }

    #[test]
    fn skipped_does_not_affect_success() {
        let summary = RunSummary::from_slots(
            vec![
                Some(result("a", ExecutionStatus::Passed)),
                Some(result("c", ExecutionStatus::Skipped)),
            ],
            false,
        );
        assert!(summary.success());
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn failed_or_errored_fails_the_run() {
        for status in [ExecutionStatus::Failed, ExecutionStatus::Errored] {
            let summary = RunSummary::from_slots(
                vec![Some(result("a", ExecutionStatus::Passed)), Some(result("b", status))],
                false,
            );
            assert!(!summary.success());
            assert_eq!(summary.exit_code(), 1);
            assert_eq!(summary.failures().count(), 1);
        }
    }

    #[test]
    fn empty_slots_are_dropped_and_order_kept() {
        let summary = RunSummary::from_slots(
            vec![
                Some(result("a", ExecutionStatus::Passed)),
                None,
                Some(result("c", ExecutionStatus::Skipped)),
            ],
            true,
        );
        let names: Vec<_> = summary.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(summary.exit_code(), EXIT_INTERRUPTED);
        assert_eq!(summary.count(ExecutionStatus::Skipped), 1);
    }
}
