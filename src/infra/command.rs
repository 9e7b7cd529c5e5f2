//! # Command Execution Module / 命令执行模块
//!
//! Subprocess plumbing shared by the provisioner and the runner. Every
//! invocation gets an explicit environment and working directory and
//! yields a structured [`CommandOutput`].
//!
//! 环境准备器和运行器共享的子进程工具。每次调用都使用显式的环境和工作目录，
//! 并返回结构化的 [`CommandOutput`]。

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Exit code reported when a program could not be started at all.
pub const EXIT_NOT_FOUND: i32 = 127;

/// The structured result of one subprocess.
/// 单个子进程的结构化结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// stdout and stderr interleaved line by line in arrival order.
    /// 按到达顺序逐行交错的 stdout 和 stderr。
    pub combined: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builds a command whose environment is exactly `env`, running in `cwd`.
/// The child is killed if the returned future is dropped.
///
/// 构建一个环境完全为 `env`、在 `cwd` 中运行的命令。
/// 如果返回的 future 被丢弃，子进程将被终止。
pub fn build_command(argv: &[String], env: &BTreeMap<String, String>, cwd: &Path) -> Command {
    let (program, args) = match argv.split_first() {
        Some((program, args)) => (program.as_str(), args),
        None => ("", &[][..]),
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .env_clear()
        .envs(env)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Spawns a command, captures its stdout and stderr.
/// The output streams are read concurrently; each is kept separately and
/// also merged into a single combined transcript.
///
/// # Returns
/// The structured output, or the I/O error raised while spawning or waiting.
///
/// 派生一个命令，捕获其 stdout 和 stderr。
/// 输出流被并发读取，分别保存，并合并为一份完整记录。
pub async fn spawn_and_capture(mut cmd: Command) -> std::io::Result<CommandOutput> {
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("failed to capture stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("failed to capture stderr"))?;

    // Both readers append to the combined transcript as lines arrive.
    // 两个读取任务在行到达时追加到合并记录中。
    let combined = Arc::new(Mutex::new(String::new()));
    let stdout_handle = read_lines(stdout, Arc::clone(&combined));
    let stderr_handle = read_lines(stderr, Arc::clone(&combined));

    let status = child.wait().await?;

    let stdout = join_reader(stdout_handle).await;
    let stderr = join_reader(stderr_handle).await;
    let combined = combined.lock().await.clone();

    Ok(CommandOutput {
        exit_code: exit_code_of(status),
        stdout,
        stderr,
        combined,
    })
}

/// Drains `stream` to EOF. Lines are decoded lossily so a stray non-UTF-8
/// byte never stops the reader and leaves the child writing into a closed pipe.
///
/// 读取 `stream` 直到 EOF。按行有损解码，非 UTF-8 字节不会中断读取。
fn read_lines<R>(stream: R, combined: Arc<Mutex<String>>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut own = String::new();
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
                    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                    let line = String::from_utf8_lossy(raw);
                    own.push_str(&line);
                    own.push('\n');
                    let mut all = combined.lock().await;
                    all.push_str(&line);
                    all.push('\n');
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read subprocess output");
                    break;
                }
            }
        }
        own
    })
}

async fn join_reader(handle: JoinHandle<String>) -> String {
    match handle.await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "failed to join output reader task");
            String::new()
        }
    }
}

/// Maps an exit status to a shell-style code: signals become `128 + signal`.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Renders an argv for logs and transcripts, quoting where needed.
pub fn display_argv(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn env_with_path() -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        env
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_streams_separately_and_combined() {
        let cmd = build_command(
            &argv(&["sh", "-c", "echo out; echo err 1>&2; exit 3"]),
            &env_with_path(),
            Path::new("."),
        );
        let out = spawn_and_capture(cmd).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(out.combined.contains("out\n"));
        assert!(out.combined.contains("err\n"));
    }

    #[tokio::test]
    async fn environment_is_exactly_what_was_given() {
        let mut env = env_with_path();
        env.insert("ONLY_ME".to_string(), "yes".to_string());
        let cmd = build_command(&argv(&["sh", "-c", "env"]), &env, Path::new("."));
        let out = spawn_and_capture(cmd).await.unwrap();
        assert!(out.stdout.contains("ONLY_ME=yes"));
        assert!(!out.stdout.contains("HOME="));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let cmd = build_command(
            &argv(&["definitely-not-a-real-program-12345"]),
            &env_with_path(),
            Path::new("."),
        );
        let err = spawn_and_capture(cmd).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_stop_the_reader() {
        // 20000 lines is well past the pipe buffer, so a reader that gave up
        // early would leave the child blocked or killed by SIGPIPE.
        let cmd = build_command(
            &argv(&["sh", "-c", "printf 'caf\\351\\n'; seq 1 20000; echo done 1>&2"]),
            &env_with_path(),
            Path::new("."),
        );
        let out = spawn_and_capture(cmd).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.starts_with("caf\u{FFFD}\n1\n"));
        assert!(out.stdout.ends_with("\n20000\n"));
        assert_eq!(out.stdout.lines().count(), 20001);
        assert_eq!(out.stderr, "done\n");
    }

    #[tokio::test]
    async fn output_after_invalid_utf8_is_kept_on_failure() {
        let cmd = build_command(
            &argv(&["sh", "-c", "printf 'caf\\351\\n'; echo 'FAILED test_x'; exit 1"]),
            &env_with_path(),
            Path::new("."),
        );
        let out = spawn_and_capture(cmd).await.unwrap();
        assert_eq!(out.exit_code, 1);
        assert!(out.stdout.contains("FAILED test_x"));
        assert!(out.combined.contains("FAILED test_x"));
    }

    #[test]
    fn argv_display_quotes_spaces() {
        assert_eq!(display_argv(&argv(&["echo", "a b"])), "echo 'a b'");
    }
}
