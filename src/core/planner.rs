//! # Environment Selection Planner Module / 环境选择计划模块
//!
//! This module turns a loaded matrix and the user's selection into the list
//! of environments to run, including the split across multiple CI runners.
//!
//! 此模块将已加载的矩阵和用户的选择转换为要运行的环境列表，
//! 包括在多个 CI 运行器之间的划分。

use crate::core::config::Matrix;
use crate::core::models::EnvironmentDescriptor;
use anyhow::{Result, bail};

/// Selects every environment of the matrix.
pub const ALL_ENVIRONMENTS: &str = "ALL";

/// What the user asked to run.
/// 用户请求运行的内容。
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Names given with `-e`; `None` selects the `envlist`.
    pub envs: Option<Vec<String>>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
}

/// Represents a complete execution plan for a matrix.
/// 表示矩阵的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// Environments to run, in matrix order.
    /// 要运行的环境，按矩阵顺序排列。
    pub environments: Vec<EnvironmentDescriptor>,
    /// Whether the selection is split across multiple runners (CI environment).
    /// 选择是否分布在多个运行器上（CI 环境）。
    pub is_distributed: bool,
}

/// Creates an execution plan for the given matrix.
///
/// Without `-e` the `envlist` is run, or every environment when the
/// `envlist` is empty. Selection never reorders: environments keep their
/// matrix position, and the distributed split is round-robin by position.
///
/// 为给定矩阵创建执行计划。未指定 `-e` 时运行 `envlist`，
/// `envlist` 为空时运行所有环境。选择不会改变顺序。
pub fn plan_execution(matrix: &Matrix, selection: &Selection) -> Result<ExecutionPlan> {
    let wanted: Option<Vec<String>> = match &selection.envs {
        Some(names) if names.iter().any(|n| n == ALL_ENVIRONMENTS) => None,
        Some(names) => {
            for name in names {
                if matrix.get(name).is_none() {
                    let known: Vec<&str> = matrix.names().collect();
                    bail!(
                        "Unknown environment '{}'. Known environments: {}",
                        name,
                        known.join(", ")
                    );
                }
            }
            Some(names.clone())
        }
        None if matrix.envlist.is_empty() => None,
        None => Some(matrix.envlist.clone()),
    };

    let selected: Vec<EnvironmentDescriptor> = matrix
        .environments
        .iter()
        .filter(|env| wanted.as_ref().is_none_or(|names| names.contains(&env.name)))
        .cloned()
        .collect();

    let (environments, is_distributed) =
        match (selection.total_runners, selection.runner_index) {
            (Some(total), Some(index)) => {
                if total == 0 || index >= total {
                    bail!("Runner index must be less than total runners.");
                }
                let share = selected
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| i % total == index)
                    .map(|(_, env)| env)
                    .collect();
                (share, true)
            }
            (None, None) => (selected, false),
            _ => bail!("Both --total-runners and --runner-index must be provided."),
        };

    Ok(ExecutionPlan {
        environments,
        is_distributed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{LoadContext, parse_matrix};
    use std::path::PathBuf;

    fn matrix() -> Matrix {
        let text = r#"
            [tox]
            envlist = ["py311", "lint"]

            [testenv]
            commands = ["true"]

            [env.docs]
            [env.alpha]
        "#;
        let ctx = LoadContext {
            toxinidir: PathBuf::from("/project"),
            posargs: vec![],
        };
        parse_matrix(text, &ctx).unwrap()
    }

    fn names(plan: &ExecutionPlan) -> Vec<&str> {
        plan.environments.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn default_selection_is_the_envlist() {
        let plan = plan_execution(&matrix(), &Selection::default()).unwrap();
        assert_eq!(names(&plan), vec!["py311", "lint"]);
        assert!(!plan.is_distributed);
    }

    #[test]
    fn explicit_selection_keeps_matrix_order() {
        let selection = Selection {
            envs: Some(vec!["docs".to_string(), "py311".to_string()]),
            ..Selection::default()
        };
        let plan = plan_execution(&matrix(), &selection).unwrap();
        assert_eq!(names(&plan), vec!["py311", "docs"]);
    }

    #[test]
    fn all_selects_everything() {
        let selection = Selection {
            envs: Some(vec![ALL_ENVIRONMENTS.to_string()]),
            ..Selection::default()
        };
        let plan = plan_execution(&matrix(), &selection).unwrap();
        assert_eq!(names(&plan), vec!["py311", "lint", "alpha", "docs"]);
    }

    #[test]
    fn unknown_environment_is_an_error() {
        let selection = Selection {
            envs: Some(vec!["nope".to_string()]),
            ..Selection::default()
        };
        let err = plan_execution(&matrix(), &selection).unwrap_err();
        assert!(err.to_string().contains("nope"));
        assert!(err.to_string().contains("py311"));
    }

    #[test]
    fn distributed_split_is_round_robin() {
        let all = Some(vec![ALL_ENVIRONMENTS.to_string()]);
        let first = Selection {
            envs: all.clone(),
            total_runners: Some(2),
            runner_index: Some(0),
        };
        let second = Selection {
            envs: all,
            total_runners: Some(2),
            runner_index: Some(1),
        };
        let plan = plan_execution(&matrix(), &first).unwrap();
        assert!(plan.is_distributed);
        assert_eq!(names(&plan), vec!["py311", "alpha"]);
        let plan = plan_execution(&matrix(), &second).unwrap();
        assert_eq!(names(&plan), vec!["lint", "docs"]);
    }

    #[test]
    fn distributed_arguments_are_validated() {
        let half = Selection {
            total_runners: Some(2),
            ..Selection::default()
        };
        assert!(plan_execution(&matrix(), &half).is_err());
        let out_of_range = Selection {
            envs: None,
            total_runners: Some(2),
            runner_index: Some(2),
        };
        assert!(plan_execution(&matrix(), &out_of_range).is_err());
    }
}
