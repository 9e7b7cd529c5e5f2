//! # Models Module Unit Tests / Models 模块单元测试
//!
//! This module tests the result types and the aggregation rules built on them.
//!
//! 此模块测试结果类型及基于它们的汇总规则。

use std::time::Duration;
use tox_matrix::core::summary::{EXIT_INTERRUPTED, RunSummary};
use tox_matrix::models::{ExecutionResult, ExecutionStatus};

#[cfg(test)]
mod execution_status_tests {
    use super::*;

    #[test]
    fn test_only_failed_and_errored_are_failures() {
        assert!(!ExecutionStatus::Passed.is_failure());
        assert!(!ExecutionStatus::Skipped.is_failure());
        assert!(ExecutionStatus::Failed.is_failure());
        assert!(ExecutionStatus::Errored.is_failure());
    }

    #[test]
    fn test_display_and_css_class() {
        assert_eq!(ExecutionStatus::Errored.to_string(), "errored");
        assert_eq!(ExecutionStatus::Skipped.css_class(), "status-Skipped");
    }

    #[test]
    fn test_labels_are_localised() {
        assert_eq!(ExecutionStatus::Passed.label("en"), "Passed");
        assert_eq!(ExecutionStatus::Passed.label("zh-CN"), "通过");
    }
}

#[cfg(test)]
mod execution_result_tests {
    use super::*;

    #[test]
    fn test_constructors_set_exit_codes() {
        let passed = ExecutionResult::passed("a", String::new(), Duration::from_secs(1), true);
        assert_eq!((passed.status, passed.exit_code, passed.cache_hit), (ExecutionStatus::Passed, 0, true));

        let skipped = ExecutionResult::skipped("c", "no interpreter".to_string());
        assert_eq!(skipped.exit_code, 0);
        assert_eq!(skipped.duration, Duration::ZERO);
        assert_eq!(skipped.output, "no interpreter");

        let errored = ExecutionResult::errored("d", -1, String::new(), Duration::ZERO);
        assert_eq!(errored.status, ExecutionStatus::Errored);
        assert!(!errored.cache_hit);
    }
}

#[cfg(test)]
mod run_summary_tests {
    use super::*;

    #[test]
    fn test_result_count_matches_filled_slots() {
        let slots = vec![
            Some(ExecutionResult::passed("a", String::new(), Duration::ZERO, false)),
            Some(ExecutionResult::failed("b", 2, String::new(), Duration::ZERO, false)),
            Some(ExecutionResult::skipped("c", String::new())),
        ];
        let summary = RunSummary::from_slots(slots, false);
        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.count(ExecutionStatus::Failed), 1);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_interrupted_run_exit_code() {
        let summary = RunSummary::from_slots(vec![None], true);
        assert!(summary.results.is_empty());
        assert!(summary.success());
        assert_eq!(summary.exit_code(), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_empty_run_succeeds() {
        let summary = RunSummary::default();
        assert_eq!(summary.exit_code(), 0);
    }
}
