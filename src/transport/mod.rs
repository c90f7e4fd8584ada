//! 消息传输抽象
//!
//! 编排器只依赖 [`Transport`] trait；具体实现见 [`telegram`]。

pub mod telegram;

pub use telegram::{TelegramConfig, TelegramTransport};

use crate::error::DeliveryError;
use crate::identity::{ChatId, UserId};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// 消息传输渠道
#[async_trait]
pub trait Transport: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 发送文本消息；`silent` 为 true 时不带提示音
    async fn send_text(&self, recipient: ChatId, text: &str, silent: bool) -> Result<(), DeliveryError>;

    /// 发送附件
    async fn send_attachment(
        &self,
        recipient: ChatId,
        path: &Path,
        caption: &str,
        silent: bool,
        timeout: Duration,
    ) -> Result<(), DeliveryError>;
}

/// 命令的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    /// 发送者
    pub sender: UserId,
    /// 所在会话（回复目标）
    pub chat: ChatId,
}

/// 收到的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    pub name: String,
    pub context: CommandContext,
}

/// 从消息文本解析命令名：`/start@my_bot arg` -> `start`
pub fn parse_command(text: &str) -> Option<String> {
    let first = text.trim_start().split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    let name = command.split('@').next().unwrap_or_default();
    if name.is_empty() {
        return None;
    }
    Some(name.to_ascii_lowercase())
}
