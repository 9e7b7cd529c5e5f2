//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides the filesystem pieces of provisioning: context
//! directory layout, interpreter lookup on an explicit search path, and the
//! exclusive lock file that serialises provisioning of one context across
//! concurrent invocations.
//!
//! 此模块提供环境准备所需的文件系统功能：上下文目录布局、
//! 在显式搜索路径上查找解释器，以及在并发调用之间串行化同一上下文准备过程的独占锁文件。

use chrono::Utc;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::core::error::ProvisionError;

/// Interval between attempts to take a held lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Directory inside a context that holds its executables.
/// 上下文中存放可执行文件的目录。
pub fn bin_dir(envdir: &Path) -> PathBuf {
    if cfg!(windows) {
        envdir.join("Scripts")
    } else {
        envdir.join("bin")
    }
}

/// The interpreter a context exposes inside its bin directory.
pub fn interpreter_in(bin_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        bin_dir.join("python.exe")
    } else {
        bin_dir.join("python")
    }
}

/// Resolves `program` to an executable file.
///
/// A selector containing a path separator is checked as-is; a bare name is
/// looked up in each directory of `search_path`, which callers capture once
/// instead of reading the process environment here.
///
/// 将 `program` 解析为可执行文件。包含路径分隔符的选择器按原样检查；
/// 裸名称在 `search_path` 的每个目录中查找。
pub fn find_executable(program: &str, search_path: &OsStr) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    std::env::split_paths(search_path).find_map(|dir| {
        let full = dir.join(program);
        if is_executable(&full) {
            return Some(full);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{program}.exe"));
            if is_executable(&exe) {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Removes `path` and everything below it, if it exists.
pub async fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// An exclusively held lock file, removed when dropped.
/// 独占持有的锁文件，在被丢弃时删除。
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Takes the lock at `path`, waiting for another holder to release it for
    /// at most `timeout`.
    ///
    /// 获取 `path` 处的锁，最多等待 `timeout` 让其他持有者释放。
    pub async fn acquire(path: &Path, timeout: Duration) -> Result<Self, ProvisionError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let started = Instant::now();
        let mut announced = false;
        loop {
            match Self::try_acquire(path) {
                Ok(lock) => return Ok(lock),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if !announced {
                        tracing::info!(lock = %path.display(), "waiting for concurrent provisioning");
                        announced = true;
                    }
                    if started.elapsed() >= timeout {
                        return Err(ProvisionError::LockTimeout {
                            path: path.to_path_buf(),
                            waited: started.elapsed(),
                        });
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn try_acquire(path: &Path) -> io::Result<Self> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        // Owner details help when a crashed run leaves a stale lock behind.
        let payload = format!(
            "{{\"pid\":{},\"acquired_at\":\"{}\"}}\n",
            std::process::id(),
            Utc::now().to_rfc3339()
        );
        if let Err(e) = file.write_all(payload.as_bytes()) {
            tracing::warn!(lock = %path.display(), error = %e, "failed to write lock owner details");
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bin_dir_is_platform_specific() {
        let dir = bin_dir(Path::new("/envs/a"));
        if cfg!(windows) {
            assert!(dir.ends_with("Scripts"));
        } else {
            assert_eq!(dir, PathBuf::from("/envs/a/bin"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn finds_executables_on_explicit_search_path() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let exe = dir.path().join("fakepython");
        fs::write(&exe, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
        let plain = dir.path().join("notexec");
        fs::write(&plain, "").unwrap();

        let search = std::env::join_paths([dir.path()]).unwrap();
        assert_eq!(find_executable("fakepython", &search), Some(exe.clone()));
        assert_eq!(find_executable("notexec", &search), None);
        assert_eq!(find_executable("missing", &search), None);
        assert_eq!(
            find_executable(exe.to_str().unwrap(), OsStr::new("")),
            Some(exe)
        );
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env.lock");

        let first = LockFile::acquire(&path, Duration::from_secs(1)).await.unwrap();
        assert!(path.exists());

        let second = LockFile::acquire(&path, Duration::from_millis(250)).await;
        assert!(matches!(second, Err(ProvisionError::LockTimeout { .. })));

        drop(first);
        assert!(!path.exists());
        let third = LockFile::acquire(&path, Duration::from_millis(250)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn removing_a_missing_directory_is_not_an_error() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("ctx");
        remove_dir_if_exists(&target).await.unwrap();

        fs::create_dir_all(target.join("nested")).unwrap();
        fs::write(target.join("nested").join("f"), "x").unwrap();
        remove_dir_if_exists(&target).await.unwrap();
        assert!(!target.exists());
    }
}
