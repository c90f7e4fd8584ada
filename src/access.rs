//! 命令访问控制
//!
//! 第一个 `/start` 的用户成为管理员；之后只有管理员可以使用命令，
//! 其他人的命令被静默忽略（不回复）。

use crate::identity::{IdentityStore, UserId};
use crate::state::BotState;
use crate::transport::CommandContext;
use tracing::warn;

/// 授权结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// 尚未注册任何身份，允许并由 `/start` 完成注册
    Bootstrap,
    /// 发送者是管理员
    Granted,
    /// 拒绝（不是错误，静默处理）
    Denied,
}

impl Authorization {
    pub fn is_allowed(self) -> bool {
        !matches!(self, Authorization::Denied)
    }
}

/// 检查发送者是否可以执行命令
pub fn authorize(identity: &IdentityStore, sender: UserId) -> Authorization {
    if !identity.is_bootstrapped() {
        return Authorization::Bootstrap;
    }

    if identity.is_admin(sender) {
        Authorization::Granted
    } else {
        Authorization::Denied
    }
}

/// 命令处理函数：返回回复内容
pub type Handler = fn(&mut BotState, &CommandContext, Authorization) -> String;

/// 给处理函数套上访问控制
///
/// 被拒绝时返回 `None`，调用方不回复。
pub fn restricted(
    command: &'static str,
    handler: Handler,
) -> impl Fn(&mut BotState, &CommandContext) -> Option<String> {
    move |state, context| {
        let authorization = authorize(&state.identity, context.sender);
        if !authorization.is_allowed() {
            warn!(
                command = command,
                user_id = %context.sender,
                chat_id = %context.chat,
                "Unauthorized access denied"
            );
            return None;
        }
        Some(handler(state, context, authorization))
    }
}
