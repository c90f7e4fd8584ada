//! 外部命令执行 - 通过 `sh -c` 运行并强制超时

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// 子进程输出的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// 丢弃 stdout/stderr
    Discard,
    /// 继承父进程的 stdout/stderr（verbose 模式）
    Inherit,
    /// 捕获 stdout，丢弃 stderr
    Capture,
}

/// 命令执行结果
#[derive(Debug)]
pub struct ShellOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to launch command: {0}")]
    Launch(#[source] std::io::Error),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}

/// 运行 shell 命令
///
/// 超时后子进程被 kill（`kill_on_drop`），不会留下挂起的进程阻塞调度。
pub async fn run_shell(
    command: &str,
    timeout: Duration,
    mode: OutputMode,
) -> Result<ShellOutput, ExecError> {
    debug!(command = %command, timeout = ?timeout, "Running external command");

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    match mode {
        OutputMode::Discard => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        OutputMode::Inherit => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        OutputMode::Capture => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        }
    }

    let child = cmd.spawn().map_err(ExecError::Launch)?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ShellOutput {
            status: output.status,
            stdout: output.stdout,
        }),
        Ok(Err(e)) => Err(ExecError::Launch(e)),
        Err(_) => Err(ExecError::Timeout(timeout)),
    }
}
