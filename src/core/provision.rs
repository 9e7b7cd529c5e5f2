//! # Context Provisioner / 上下文准备器
//!
//! Ensures an isolated context exists for an environment: discovers the
//! interpreter, then, under an exclusive lock, either reuses the cached
//! context (same dependency fingerprint) or recreates it and installs the
//! declared dependencies.
//!
//! 确保环境的隔离上下文存在：查找解释器，然后在独占锁保护下，
//! 要么复用缓存的上下文（依赖指纹相同），要么重新创建并安装声明的依赖。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::ProvisionError;
use crate::core::models::{ContextHandle, EnvironmentDescriptor};
use crate::core::runner::{HostEnv, command_environment};
use crate::infra::command::{self, CommandOutput, EXIT_NOT_FOUND, build_command, display_argv};
use crate::infra::fs::{LockFile, bin_dir, find_executable, interpreter_in, remove_dir_if_exists};

/// File inside each context recording what it was provisioned with.
pub const RECORD_FILE: &str = ".tox-matrix.json";
/// Default wait for another invocation provisioning the same context.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// Knobs for provisioning, shared by every environment of a run.
/// 环境准备的选项，由一次运行中的所有环境共享。
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Directories searched for bare interpreter names.
    pub search_path: OsString,
    /// Discard cached contexts and provision from scratch.
    pub recreate: bool,
    pub lock_timeout: Duration,
    pub host: HostEnv,
}

impl ProvisionOptions {
    pub fn new(host: HostEnv) -> Self {
        Self {
            search_path: host.search_path(),
            recreate: false,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            host,
        }
    }
}

/// Persisted next to the installed dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRecord {
    pub fingerprint: String,
    pub interpreter: PathBuf,
    pub provisioned_at: DateTime<Utc>,
}

/// Path of the lock guarding `envdir`. It sits beside the directory so that
/// wiping the context never removes a held lock.
pub fn lock_path(envdir: &Path) -> PathBuf {
    let name = envdir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "env".to_string());
    envdir.with_file_name(format!("{name}.lock"))
}

/// Provisions the context for `descriptor`.
///
/// Idempotent: when the recorded fingerprint matches, no subprocess runs and
/// the returned handle has `cache_hit` set.
///
/// 为 `descriptor` 准备上下文。幂等：当记录的指纹匹配时，不运行任何子进程，
/// 返回的句柄设置 `cache_hit`。
pub async fn provision(
    descriptor: &EnvironmentDescriptor,
    options: &ProvisionOptions,
) -> Result<ContextHandle, ProvisionError> {
    let interpreter = find_executable(&descriptor.interpreter, &options.search_path)
        .ok_or_else(|| ProvisionError::InterpreterUnavailable(descriptor.interpreter.clone()))?;
    tracing::debug!(env = %descriptor.name, interpreter = %interpreter.display(), "interpreter found");

    let envdir = descriptor.envdir.clone();
    let bin = bin_dir(&envdir);
    let fingerprint = fingerprint(descriptor, &interpreter).await;

    let _lock = LockFile::acquire(&lock_path(&envdir), options.lock_timeout).await?;

    if !options.recreate {
        if let Some(record) = read_record(&envdir).await {
            if record.fingerprint == fingerprint {
                tracing::info!(env = %descriptor.name, "reusing cached context");
                return Ok(ContextHandle {
                    envdir,
                    bin_dir: bin,
                    interpreter,
                    cache_hit: true,
                    provision_log: String::new(),
                });
            }
            tracing::info!(env = %descriptor.name, "dependency set changed, recreating context");
        }
    }

    ensure_disposable(&envdir).await?;
    remove_dir_if_exists(&envdir).await?;
    tokio::fs::create_dir_all(&envdir).await?;
    // Claims the directory before anything else lands in it. The empty
    // fingerprint never matches, so a half-built context is redone next time.
    write_record(
        &envdir,
        &ProvisionRecord {
            fingerprint: String::new(),
            interpreter: interpreter.clone(),
            provisioned_at: Utc::now(),
        },
    )
    .await?;

    let templates = Templates::new(descriptor, &interpreter);
    let env = command_environment(descriptor, &bin, &options.host);
    let mut log = String::new();

    if !descriptor.create_command.is_empty() {
        let argv = templates.expand(&descriptor.create_command, &[]);
        let out = run_step(&argv, &env, &descriptor.toxinidir, &mut log).await;
        if !out.success() {
            return Err(ProvisionError::ContextCreation {
                envdir,
                exit_code: out.exit_code,
                output: log,
            });
        }
    }

    let packages = install_arguments(descriptor);
    if !packages.is_empty() {
        let argv = templates.expand(&descriptor.install_command, &packages);
        let out = run_step(&argv, &env, &descriptor.toxinidir, &mut log).await;
        if !out.success() {
            return Err(ProvisionError::DependencyInstall {
                exit_code: out.exit_code,
                output: log,
            });
        }
    }

    write_record(
        &envdir,
        &ProvisionRecord {
            fingerprint,
            interpreter: interpreter.clone(),
            provisioned_at: Utc::now(),
        },
    )
    .await?;

    Ok(ContextHandle {
        envdir,
        bin_dir: bin,
        interpreter,
        cache_hit: false,
        provision_log: log,
    })
}

/// Arguments handed to the installer in place of `{packages}`: the
/// dependencies in order (requirement files become `-r <path>`), followed by
/// `-e <toxinidir>` when `usedevelop` is set.
///
/// 替换 `{packages}` 的安装参数：按顺序排列的依赖（依赖文件变为 `-r <path>`），
/// 设置 `usedevelop` 时再追加 `-e <toxinidir>`。
pub fn install_arguments(descriptor: &EnvironmentDescriptor) -> Vec<String> {
    let mut args = Vec::new();
    for dep in &descriptor.deps {
        match requirement_file(dep) {
            Some(file) => {
                args.push("-r".to_string());
                args.push(descriptor.toxinidir.join(file).display().to_string());
            }
            None => args.push(dep.clone()),
        }
    }
    if descriptor.usedevelop {
        args.push("-e".to_string());
        args.push(descriptor.toxinidir.display().to_string());
    }
    args
}

fn requirement_file(dep: &str) -> Option<&str> {
    let rest = dep.strip_prefix("-r")?.trim_start();
    (!rest.is_empty()).then_some(rest)
}

/// Hash of everything that determines what ends up installed in the context,
/// including the contents of referenced requirement files.
///
/// 决定上下文中安装内容的所有因素的哈希，包括所引用依赖文件的内容。
pub async fn fingerprint(descriptor: &EnvironmentDescriptor, interpreter: &Path) -> String {
    let mut requirement_contents = Vec::new();
    for file in descriptor.deps.iter().filter_map(|dep| requirement_file(dep)) {
        let text = tokio::fs::read_to_string(descriptor.toxinidir.join(file))
            .await
            .unwrap_or_else(|_| "<missing>".to_string());
        requirement_contents.push(text);
    }

    let payload = serde_json::json!({
        "interpreter": interpreter,
        "deps": descriptor.deps,
        "requirements": requirement_contents,
        "usedevelop": descriptor.usedevelop,
        "create_command": descriptor.create_command,
        "install_command": descriptor.install_command,
    });
    let data = serde_json::to_vec(&payload).unwrap_or_default();
    format!("{:x}", md5::compute(data))
}

/// Only a missing or empty directory, or one carrying our record, may be wiped.
/// 只有不存在、为空或带有准备记录的目录才能被清除。
async fn ensure_disposable(envdir: &Path) -> Result<(), ProvisionError> {
    let mut entries = match tokio::fs::read_dir(envdir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if entries.next_entry().await?.is_none() {
        return Ok(());
    }
    if tokio::fs::try_exists(envdir.join(RECORD_FILE)).await? {
        return Ok(());
    }
    Err(ProvisionError::UnmanagedDirectory {
        envdir: envdir.to_path_buf(),
    })
}

async fn read_record(envdir: &Path) -> Option<ProvisionRecord> {
    let text = tokio::fs::read_to_string(envdir.join(RECORD_FILE)).await.ok()?;
    match serde_json::from_str(&text) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(envdir = %envdir.display(), error = %e, "ignoring unreadable provision record");
            None
        }
    }
}

async fn write_record(envdir: &Path, record: &ProvisionRecord) -> Result<(), ProvisionError> {
    let text = serde_json::to_string_pretty(record).map_err(std::io::Error::other)?;
    tokio::fs::write(envdir.join(RECORD_FILE), text).await?;
    Ok(())
}

async fn run_step(
    argv: &[String],
    env: &std::collections::BTreeMap<String, String>,
    cwd: &Path,
    log: &mut String,
) -> CommandOutput {
    let shown = display_argv(argv);
    tracing::debug!(command = %shown, "provisioning step");
    log.push_str(&format!("$ {shown}\n"));

    if argv.is_empty() {
        return CommandOutput::default();
    }
    match command::spawn_and_capture(build_command(argv, env, cwd)).await {
        Ok(out) => {
            log.push_str(&out.combined);
            out
        }
        Err(e) => {
            log.push_str(&format!("{}: {e}\n", argv[0]));
            CommandOutput {
                exit_code: if e.kind() == std::io::ErrorKind::NotFound {
                    EXIT_NOT_FOUND
                } else {
                    -1
                },
                ..CommandOutput::default()
            }
        }
    }
}

/// Placeholders available in `create_command` and `install_command`.
struct Templates {
    pairs: Vec<(&'static str, String)>,
}

impl Templates {
    fn new(descriptor: &EnvironmentDescriptor, interpreter: &Path) -> Self {
        let bindir = bin_dir(&descriptor.envdir);
        Self {
            pairs: vec![
                ("{basepython}", interpreter.display().to_string()),
                ("{envdir}", descriptor.envdir.display().to_string()),
                ("{envbindir}", bindir.display().to_string()),
                ("{envpython}", interpreter_in(&bindir).display().to_string()),
                ("{toxinidir}", descriptor.toxinidir.display().to_string()),
                ("{envname}", descriptor.name.clone()),
            ],
        }
    }

    /// Expands a template. `{packages}` splices `packages`; `{opts}` is dropped.
    fn expand(&self, template: &[String], packages: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(template.len() + packages.len());
        for arg in template {
            match arg.as_str() {
                "{packages}" => out.extend(packages.iter().cloned()),
                "{opts}" => {}
                _ => {
                    let mut value = arg.clone();
                    for (key, replacement) in &self.pairs {
                        if value.contains(key) {
                            value = value.replace(key, replacement);
                        }
                    }
                    out.push(value);
                }
            }
        }
        out
    }
}
