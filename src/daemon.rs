//! 单实例锁 - PID 文件加排他锁
//!
//! 录像快照不能被两个进程同时轮询，第二个实例启动时直接失败。

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 持有期间独占 PID 文件，drop 时清空内容并释放锁
///
/// 文件本身保留，所有实例始终锁同一个 inode。
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    file: File,
}

impl InstanceLock {
    /// 获取锁并写入当前进程 PID
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open pid file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            let pid = Self::read_pid(path)
                .ok()
                .flatten()
                .map_or_else(|| "unknown".to_string(), |pid| pid.to_string());
            bail!(
                "Another instance is already running (pid {}, lock {})",
                pid,
                path.display()
            );
        }

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;

        debug!(pid_file = %path.display(), "Instance lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取 PID 文件中的进程号
    pub fn read_pid(path: &Path) -> Result<Option<u32>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(content.trim().parse().ok())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            warn!(pid_file = %self.path.display(), error = %e, "Failed to clear pid file");
        }
        let _ = self.file.unlock();
    }
}
