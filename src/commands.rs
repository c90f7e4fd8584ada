//! Bot 命令处理
//!
//! 每个开关命令都可以重复执行：已经处于目标状态时回复 "Already ..." 且不修改状态。

use crate::access::{restricted, Authorization, Handler};
use crate::state::BotState;
use crate::transport::CommandContext;
use std::collections::BTreeSet;
use tracing::{debug, error, info};

pub const MSG_HELP: &str = "\
/start: Starts a new session with this Bot or reset the previous session to the session you are using now.
/disable_sound : the notification of motion detection delivered without alert sound
/enable_sound : the notification of motion detection with alert sound
/disable_noti : stop the notification of motion detection.
/enable_noti : start the notification of motion detection.
/settings : display current settings of this bot";

pub const MSG_GREETING_FIRST: &str = "Hello!!, it's First time to see you.";
pub const MSG_GREETING_NEW_SESSION: &str =
    "Hi again!, Discard the old session and use the new session you are using now.";
pub const MSG_GREETING_SAME_SESSION: &str = "Hi again!, Now, the chat session is the same as the previous session. \
Resetting to a new session is not necessary.";
pub const MSG_SAVE_FAILED: &str =
    "Failed to save the session on this device, please try /start again.";

pub const MSG_ALERT_DISABLE: &str =
    "From now, Motion detection message will be delivered *WITHOUT* sound alert";
pub const MSG_ALERT_ALREADY_DISABLED: &str =
    "Already sound alert disabled, Motion detection message will be delivered *WITHOUT* sound alert";
pub const MSG_ALERT_ENABLE: &str =
    "From now, Motion detection message will be delivered *WITH* sound alert";
pub const MSG_ALERT_ALREADY_ENABLED: &str =
    "Already sound alert enabled, Motion detection message will be delivered *WITH* sound alert";

pub const MSG_NOTI_DISABLE: &str = "Motion detection message will *not* be delivered";
pub const MSG_NOTI_ALREADY_DISABLED: &str =
    "Already noti disabled, Motion detection message will *not* be delivered";
pub const MSG_NOTI_ENABLE: &str = "Motion detection message will be *delivered*";
pub const MSG_NOTI_ALREADY_ENABLED: &str =
    "Already noti enabled, Motion detection message will be *delivered*";

/// 支持的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    DisableSound,
    EnableSound,
    DisableNoti,
    EnableNoti,
    Settings,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Start,
        Command::Help,
        Command::DisableSound,
        Command::EnableSound,
        Command::DisableNoti,
        Command::EnableNoti,
        Command::Settings,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::DisableSound => "disable_sound",
            Command::EnableSound => "enable_sound",
            Command::DisableNoti => "disable_noti",
            Command::EnableNoti => "enable_noti",
            Command::Settings => "settings",
        }
    }

    fn handler(self) -> Handler {
        match self {
            Command::Start => start,
            Command::Help => help,
            Command::DisableSound => disable_sound,
            Command::EnableSound => enable_sound,
            Command::DisableNoti => disable_noti,
            Command::EnableNoti => enable_noti,
            Command::Settings => settings,
        }
    }
}

/// 分发命令，返回需要回复的内容
///
/// 未授权或未知命令返回 `None`。
pub fn dispatch(state: &mut BotState, name: &str, context: &CommandContext) -> Option<String> {
    let Some(command) = Command::from_name(name) else {
        debug!(command = %name, user_id = %context.sender, "Unknown command ignored");
        return None;
    };

    restricted(command.name(), command.handler())(state, context)
}

fn start(state: &mut BotState, context: &CommandContext, authorization: Authorization) -> String {
    if authorization == Authorization::Bootstrap {
        // 第一次 /start：保存接收者和管理员
        return match state.identity.bootstrap(context.sender, context.chat) {
            Ok(()) => {
                info!(user_id = %context.sender, chat_id = %context.chat, "First session registered");
                MSG_GREETING_FIRST.to_string()
            }
            Err(e) => {
                error!(error = %e, "Failed to register first session");
                MSG_SAVE_FAILED.to_string()
            }
        };
    }

    if state.identity.recipient() == Some(context.chat) {
        return MSG_GREETING_SAME_SESSION.to_string();
    }

    match state.identity.save_recipient(context.chat) {
        Ok(()) => {
            info!(user_id = %context.sender, chat_id = %context.chat, "Session switched");
            MSG_GREETING_NEW_SESSION.to_string()
        }
        Err(e) => {
            error!(error = %e, "Failed to switch session");
            MSG_SAVE_FAILED.to_string()
        }
    }
}

fn help(_: &mut BotState, _: &CommandContext, _: Authorization) -> String {
    MSG_HELP.to_string()
}

fn disable_sound(state: &mut BotState, context: &CommandContext, _: Authorization) -> String {
    if !state.notification.sound_enabled {
        return MSG_ALERT_ALREADY_DISABLED.to_string();
    }
    state.notification.sound_enabled = false;
    info!(user_id = %context.sender, "disable_sound issued");
    MSG_ALERT_DISABLE.to_string()
}

fn enable_sound(state: &mut BotState, context: &CommandContext, _: Authorization) -> String {
    if state.notification.sound_enabled {
        return MSG_ALERT_ALREADY_ENABLED.to_string();
    }
    state.notification.sound_enabled = true;
    info!(user_id = %context.sender, "enable_sound issued");
    MSG_ALERT_ENABLE.to_string()
}

fn disable_noti(state: &mut BotState, context: &CommandContext, _: Authorization) -> String {
    if !state.notification.notifications_enabled {
        return MSG_NOTI_ALREADY_DISABLED.to_string();
    }
    state.notification.notifications_enabled = false;
    info!(user_id = %context.sender, "disable_noti issued");
    MSG_NOTI_DISABLE.to_string()
}

fn enable_noti(state: &mut BotState, context: &CommandContext, _: Authorization) -> String {
    if state.notification.notifications_enabled {
        return MSG_NOTI_ALREADY_ENABLED.to_string();
    }
    state.notification.notifications_enabled = true;
    info!(user_id = %context.sender, "enable_noti issued");
    MSG_NOTI_ENABLE.to_string()
}

fn format_list(values: &BTreeSet<u8>) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}

fn settings(state: &mut BotState, _: &CommandContext, _: Authorization) -> String {
    let mut lines = Vec::new();

    if state.notification.notifications_enabled {
        lines.push("notice message enabled : /disable_noti to disable".to_string());
    } else {
        lines.push("notice message disabled : /enable_noti to enable".to_string());
    }

    if state.notification.sound_enabled {
        lines.push("sound alert enabled : /disable_sound to disable".to_string());
    } else {
        lines.push("sound alert disabled : /enable_sound to enable".to_string());
    }

    lines.push(format!("Alert day of week: {}", format_list(state.schedule.weekdays())));
    lines.push(format!("Alert hour of day: {}", format_list(state.schedule.hours())));
    lines.push(String::new());
    lines.push("Additional explanation -".to_string());
    lines.push("Day of week : 0 is Monday, 1 is Tuesday ... 6 is Sunday.".to_string());

    lines.join("\n")
}
