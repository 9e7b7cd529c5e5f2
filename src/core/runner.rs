//! # Command Runner / 命令运行器
//!
//! Runs an environment's command list inside its provisioned context.
//! Commands never see the orchestrator's own environment directly: the host
//! variables are snapshotted once into a [`HostEnv`] and every child gets an
//! explicitly composed environment.
//!
//! 在已准备的上下文中运行环境的命令列表。命令不会直接看到编排器自身的环境：
//! 主机变量被一次性快照到 [`HostEnv`] 中，每个子进程都获得显式组合的环境。

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use crate::core::models::{ContextHandle, EnvironmentDescriptor};
use crate::infra::command::{self, EXIT_NOT_FOUND, build_command, display_argv};
use crate::infra::t;

/// Variables every command inherits from the host, in addition to `passenv`.
pub const DEFAULT_PASSENV: &[&str] = &[
    "PATH", "HOME", "USER", "LOGNAME", "LANG", "LANGUAGE", "LC_ALL", "LC_CTYPE", "TERM", "TMPDIR",
    "TEMP", "TMP", "SYSTEMROOT", "COMSPEC", "PATHEXT", "USERPROFILE", "APPDATA",
];

/// A read-only snapshot of the host process environment.
/// 主机进程环境的只读快照。
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    vars: BTreeMap<String, String>,
}

impl HostEnv {
    /// Snapshots the current process environment. Non-UTF-8 variables are dropped.
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }))
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The host `PATH`, used for interpreter discovery.
    pub fn search_path(&self) -> OsString {
        self.get("PATH").map(OsString::from).unwrap_or_default()
    }

    /// Host variables matching any pattern. A trailing `*` matches by prefix.
    fn matching<'a>(&'a self, patterns: &'a [String]) -> impl Iterator<Item = (&'a String, &'a String)> {
        self.vars.iter().filter(move |(key, _)| {
            DEFAULT_PASSENV.iter().any(|p| passenv_matches(p, key))
                || patterns.iter().any(|p| passenv_matches(p, key))
        })
    }
}

fn passenv_matches(pattern: &str, key: &str) -> bool {
    let same = |a: &str, b: &str| {
        if cfg!(windows) {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    };
    match pattern.strip_suffix('*') {
        Some(prefix) => key.get(..prefix.len()).is_some_and(|head| same(head, prefix)),
        None => same(pattern, key),
    }
}

/// Composes the environment a command runs with: passed-through host
/// variables, then the context activation (`VIRTUAL_ENV`, `PATH`), then `setenv`.
///
/// 组合命令运行所用的环境：透传的主机变量，然后是上下文激活变量，最后是 `setenv`。
pub fn command_environment(
    descriptor: &EnvironmentDescriptor,
    bin_dir: &Path,
    host: &HostEnv,
) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = host
        .matching(&descriptor.passenv)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut path_entries = vec![bin_dir.to_path_buf()];
    if let Some(host_path) = host.get("PATH") {
        path_entries.extend(std::env::split_paths(host_path));
    }
    if let Ok(joined) = std::env::join_paths(path_entries) {
        env.insert("PATH".to_string(), joined.to_string_lossy().into_owned());
    }
    env.insert(
        "VIRTUAL_ENV".to_string(),
        descriptor.envdir.display().to_string(),
    );
    env.insert("TOX_ENV_NAME".to_string(), descriptor.name.clone());
    env.insert(
        "TOX_ENV_DIR".to_string(),
        descriptor.envdir.display().to_string(),
    );

    for (key, value) in &descriptor.setenv {
        env.insert(key.clone(), value.clone());
    }
    env
}

/// What happened when an environment's commands were run.
/// 运行环境命令的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandsOutcome {
    /// 0 when every command succeeded, otherwise the first failing code.
    pub exit_code: i32,
    /// Transcript of every command run, each preceded by its argv.
    pub output: String,
    /// The first command that failed, if any.
    pub failed_command: Option<Vec<String>>,
}

impl CommandsOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs the descriptor's commands in order inside `ctx`. A command starts only
/// after its predecessor exits; the first non-zero exit stops the sequence
/// unless `ignore_errors` is set.
///
/// 在 `ctx` 中按顺序运行描述符的命令。命令只在前一个命令退出后启动；
/// 除非设置了 `ignore_errors`，第一个非零退出会停止执行。
pub async fn run_commands(
    ctx: &ContextHandle,
    descriptor: &EnvironmentDescriptor,
    host: &HostEnv,
) -> CommandsOutcome {
    let env = command_environment(descriptor, &ctx.bin_dir, host);
    let mut transcript = String::new();
    let mut first_failure: Option<(i32, Vec<String>)> = None;

    for argv in &descriptor.commands {
        let shown = display_argv(argv);
        tracing::debug!(env = %descriptor.name, command = %shown, "running command");
        transcript.push_str(&format!("{} {}\n", t!("run.command_prefix"), shown));

        let cmd = build_command(argv, &env, &descriptor.changedir);
        let exit_code = match command::spawn_and_capture(cmd).await {
            Ok(out) => {
                transcript.push_str(&out.combined);
                out.exit_code
            }
            Err(e) => {
                let code = if e.kind() == std::io::ErrorKind::NotFound {
                    EXIT_NOT_FOUND
                } else {
                    126
                };
                transcript.push_str(&format!(
                    "{}\n",
                    t!("run.spawn_failed", program = &argv[0], error = e)
                ));
                code
            }
        };

        if exit_code != 0 {
            tracing::debug!(env = %descriptor.name, command = %shown, exit_code, "command failed");
            if first_failure.is_none() {
                first_failure = Some((exit_code, argv.clone()));
            }
            if !descriptor.ignore_errors {
                break;
            }
        }
    }

    match first_failure {
        Some((exit_code, argv)) => CommandsOutcome {
            exit_code,
            output: transcript,
            failed_command: Some(argv),
        },
        None => CommandsOutcome {
            exit_code: 0,
            output: transcript,
            failed_command: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn descriptor(commands: Vec<Vec<&str>>) -> EnvironmentDescriptor {
        EnvironmentDescriptor {
            name: "unit".to_string(),
            description: None,
            interpreter: "sh".to_string(),
            deps: vec![],
            setenv: BTreeMap::new(),
            passenv: vec![],
            commands: commands
                .into_iter()
                .map(|c| c.into_iter().map(String::from).collect())
                .collect(),
            skip_missing_interpreters: false,
            usedevelop: false,
            toxinidir: PathBuf::from("."),
            envdir: PathBuf::from("/tmp/tox-matrix-unit"),
            changedir: PathBuf::from("."),
            install_command: vec![],
            create_command: vec![],
            ignore_errors: false,
        }
    }

    fn ctx() -> ContextHandle {
        ContextHandle {
            envdir: PathBuf::from("/tmp/tox-matrix-unit"),
            bin_dir: PathBuf::from("/tmp/tox-matrix-unit/bin"),
            interpreter: PathBuf::from("/bin/sh"),
            cache_hit: false,
            provision_log: String::new(),
        }
    }

    fn host() -> HostEnv {
        HostEnv::from_vars([
            ("PATH", "/usr/bin:/bin"),
            ("HOME", "/home/me"),
            ("SECRET_TOKEN", "hunter2"),
            ("CI_JOB", "42"),
        ])
    }

    #[test]
    fn environment_is_composed_explicitly() {
        let mut desc = descriptor(vec![vec!["true"]]);
        desc.passenv = vec!["CI_*".to_string()];
        desc.setenv.insert("HOME".to_string(), "/override".to_string());

        let env = command_environment(&desc, Path::new("/envs/unit/bin"), &host());
        assert_eq!(env.get("HOME").map(String::as_str), Some("/override"));
        assert_eq!(env.get("CI_JOB").map(String::as_str), Some("42"));
        assert!(!env.contains_key("SECRET_TOKEN"));
        assert!(env["PATH"].starts_with("/envs/unit/bin"));
        assert_eq!(env["VIRTUAL_ENV"], desc.envdir.display().to_string());
    }

    #[test]
    fn passenv_wildcard_matches_prefix_only() {
        assert!(passenv_matches("CI_*", "CI_JOB"));
        assert!(passenv_matches("CI_*", "CI_"));
        assert!(!passenv_matches("CI_*", "XCI_JOB"));
        assert!(passenv_matches("HOME", "HOME"));
        assert!(!passenv_matches("HOME", "HOMEDIR"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stops_at_first_failure() {
        let desc = descriptor(vec![
            vec!["sh", "-c", "echo first"],
            vec!["sh", "-c", "exit 4"],
            vec!["sh", "-c", "echo never"],
        ]);
        let outcome = run_commands(&ctx(), &desc, &host()).await;
        assert_eq!(outcome.exit_code, 4);
        assert!(outcome.output.contains("first"));
        assert!(!outcome.output.contains("never"));
        assert_eq!(
            outcome.failed_command,
            Some(vec!["sh".to_string(), "-c".to_string(), "exit 4".to_string()])
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ignore_errors_keeps_going_but_reports_first_failure() {
        let mut desc = descriptor(vec![
            vec!["sh", "-c", "exit 2"],
            vec!["sh", "-c", "echo still-ran"],
            vec!["sh", "-c", "exit 5"],
        ]);
        desc.ignore_errors = true;
        let outcome = run_commands(&ctx(), &desc, &host()).await;
        assert_eq!(outcome.exit_code, 2);
        assert!(outcome.output.contains("still-ran"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_program_fails_with_127() {
        let desc = descriptor(vec![vec!["no-such-tool-xyz-98765"]]);
        let outcome = run_commands(&ctx(), &desc, &host()).await;
        assert_eq!(outcome.exit_code, EXIT_NOT_FOUND);
        assert!(!outcome.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn all_commands_succeeding_passes() {
        let desc = descriptor(vec![vec!["echo", "ok"], vec!["true"]]);
        let outcome = run_commands(&ctx(), &desc, &host()).await;
        assert!(outcome.success());
        assert!(outcome.output.contains("ok\n"));
        assert_eq!(outcome.failed_command, None);
    }
}
