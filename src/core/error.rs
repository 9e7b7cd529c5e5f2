//! # Error Types / 错误类型
//!
//! Typed failures of the load and provisioning phases. Load-time errors
//! (`ConfigError`) abort the whole run before anything executes, while
//! `ProvisionError`s are confined to the environment that raised them.
//!
//! 加载阶段和环境准备阶段的类型化错误。`ConfigError` 会在执行前终止整个运行，
//! 而 `ProvisionError` 只影响产生它的环境。

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A malformed or inconsistent matrix configuration.
/// 格式错误或不一致的矩阵配置。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("section '{section}' refers to missing base section '{base}'")]
    MissingBase { section: String, base: String },

    #[error("base sections form a cycle: {}", chain.join(" -> "))]
    BaseCycle { chain: Vec<String> },

    #[error("environment '{env}': missing required field `{field}`")]
    MissingField { env: String, field: &'static str },

    #[error("environment '{0}' is declared more than once in `envlist`")]
    DuplicateEnvironment(String),

    #[error("environment '{env}': envdir '{envdir}' would contain the project directory")]
    EnvdirContainsProject { env: String, envdir: PathBuf },

    #[error("invalid environment name '{0}'")]
    InvalidName(String),

    #[error("environment '{env}': invalid command {command:?}: {reason}")]
    InvalidCommand {
        env: String,
        command: String,
        reason: String,
    },
}

/// Why an environment's execution context could not be prepared.
/// 无法准备环境执行上下文的原因。
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("interpreter '{0}' is not available")]
    InterpreterUnavailable(String),

    #[error("failed to create context in '{envdir}' (exit code {exit_code})")]
    ContextCreation {
        envdir: PathBuf,
        exit_code: i32,
        output: String,
    },

    #[error("dependency installation failed (exit code {exit_code})")]
    DependencyInstall { exit_code: i32, output: String },

    #[error("refusing to remove '{envdir}': it holds files but no provision record, so it was not created here")]
    UnmanagedDirectory { envdir: PathBuf },

    #[error("timed out after {waited:?} waiting for lock '{path}'")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("I/O error while provisioning: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// The exit code to record for an environment that errored for this reason.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::ContextCreation { exit_code, .. }
            | ProvisionError::DependencyInstall { exit_code, .. } => *exit_code,
            _ => -1,
        }
    }

    /// Captured subprocess output associated with the error, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ProvisionError::ContextCreation { output, .. }
            | ProvisionError::DependencyInstall { output, .. } => Some(output),
            _ => None,
        }
    }
}
