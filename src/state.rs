//! 进程内状态 - 命令处理和轮询任务共享
//!
//! 只存在于内存中，重启后恢复默认值。

use crate::cooldown::CooldownGate;
use crate::identity::IdentityStore;
use crate::schedule::ScheduleConfig;
use chrono::{DateTime, Local};

/// 通知开关和冷却时间
#[derive(Debug, Clone)]
pub struct NotificationState {
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
    pub cooldown: CooldownGate,
}

impl NotificationState {
    pub fn new(now: DateTime<Local>, cooling_period_secs: u64) -> Self {
        Self {
            notifications_enabled: true,
            sound_enabled: true,
            cooldown: CooldownGate::new(now, cooling_period_secs),
        }
    }
}

/// 机器人状态，由唯一的事件循环持有
pub struct BotState {
    pub identity: IdentityStore,
    pub notification: NotificationState,
    pub schedule: ScheduleConfig,
}
