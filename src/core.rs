//! # Core Module / 核心模块
//!
//! This module contains the core functionality of tox-matrix: the matrix
//! loader, environment selection, context provisioning, command running and
//! result aggregation.
//!
//! 此模块包含 tox-matrix 的核心功能：矩阵加载、环境选择、
//! 上下文准备、命令运行和结果汇总。

pub mod config;
pub mod error;
pub mod execution;
pub mod models;
pub mod planner;
pub mod provision;
pub mod runner;
pub mod summary;

// Re-exports
pub use config::{Matrix, load_matrix};
pub use error::{ConfigError, ProvisionError};
pub use execution::{RunOptions, run_environment, run_matrix};
pub use models::{EnvironmentDescriptor, ExecutionResult, ExecutionStatus};
pub use summary::RunSummary;
