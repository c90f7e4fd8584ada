//! 外部命令校验 - 启动时检查可选的同步工具是否可用
//!
//! 运行校验命令，解析 JSON 输出，比较指定字段的值。任何失败都只记录日志，
//! 不会中止启动。

use crate::exec::{run_shell, OutputMode};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 字段值符合预期
    Valid,
    /// 字段存在但值不同
    Mismatch { actual: String },
    /// 命令或解析失败
    Failed(String),
}

impl ProbeOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ProbeOutcome::Valid)
    }
}

/// 检查命令输出中的字段
pub fn check_output(stdout: &[u8], key: &str, expected: &str) -> ProbeOutcome {
    let parsed: serde_json::Value = match serde_json::from_slice(stdout) {
        Ok(value) => value,
        Err(e) => return ProbeOutcome::Failed(format!("output is not JSON: {}", e)),
    };

    let Some(object) = parsed.as_object() else {
        return ProbeOutcome::Failed("output is not a JSON object".to_string());
    };

    let Some(value) = object.get(key) else {
        return ProbeOutcome::Failed(format!("key {} not found", key));
    };

    let matches = match value {
        // true 和配置里的 "True" 视为相同
        serde_json::Value::Bool(b) => b.to_string().eq_ignore_ascii_case(expected),
        serde_json::Value::String(s) => s == expected,
        other => other.to_string() == expected,
    };

    if matches {
        ProbeOutcome::Valid
    } else {
        let actual = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        ProbeOutcome::Mismatch { actual }
    }
}

/// 运行校验命令
pub async fn probe(command: &str, key: &str, expected: &str, timeout: Duration) -> ProbeOutcome {
    let output = match run_shell(command, timeout, OutputMode::Capture).await {
        Ok(output) => output,
        Err(e) => return ProbeOutcome::Failed(e.to_string()),
    };

    if !output.status.success() {
        return ProbeOutcome::Failed(format!("command exited with {}", output.status));
    }

    check_output(&output.stdout, key, expected)
}

/// 校验外部命令，返回是否可用
pub async fn validate(command: &str, key: &str, expected: &str, timeout: Duration) -> bool {
    debug!(command = %command, key = %key, "Validating external command");

    match probe(command, key, expected, timeout).await {
        ProbeOutcome::Valid => {
            info!(key = %key, value = %expected, "External command is valid");
            true
        }
        ProbeOutcome::Mismatch { actual } => {
            warn!(key = %key, expected = %expected, actual = %actual, "External command is not valid");
            false
        }
        ProbeOutcome::Failed(reason) => {
            error!(command = %command, reason = %reason, "Failed to validate external command");
            false
        }
    }
}
