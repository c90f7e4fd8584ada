//! 错误类型
//!
//! 核心模块中没有任何错误会让进程退出：配置错误走默认值，转换/发送错误按文件记录，
//! 持久化写入失败返回给触发它的命令。

use std::time::Duration;
use thiserror::Error;

/// 配置错误（加载时发现，回退到默认值）
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schedule {value}: {reason}")]
    Schedule { value: String, reason: String },

    #[error("unknown placeholder ${name} in command template")]
    UnknownPlaceholder { name: String },

    #[error("dangling '$' at offset {offset} in command template")]
    DanglingDollar { offset: usize },
}

/// 外部转换命令失败
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("failed to launch converter: {0}")]
    Launch(#[source] std::io::Error),

    #[error("converter timed out after {0:?}")]
    Timeout(Duration),

    #[error("converter exited with status {0}")]
    ExitStatus(String),

    #[error("converter produced no output file at {0}")]
    MissingArtifact(String),
}

/// 消息发送失败
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("http request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("telegram api error: {0}")]
    Api(String),

    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no recipient registered yet")]
    NoRecipient,
}

// 请求 URL 里带着 bot token，不能出现在错误信息和日志中
impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::Http(e.without_url())
    }
}

/// 身份存储读写失败
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("storage io error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode stored value for key {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
