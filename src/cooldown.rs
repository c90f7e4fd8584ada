//! 通知冷却 - 限制两批通知之间的最小间隔

use chrono::{DateTime, Duration, Local};
use tracing::warn;

/// 冷却时间上限（一年）
pub const MAX_INTERVAL_SECS: i64 = 365 * 24 * 60 * 60;

/// 距上次发送是否已超过最小间隔
///
/// 超出时间范围的间隔视为永远没有超过。
pub fn may_notify(now: DateTime<Local>, last_sent_at: DateTime<Local>, min_interval_secs: i64) -> bool {
    Duration::try_seconds(min_interval_secs).map_or(false, |min| now - last_sent_at >= min)
}

/// 冷却闸门
///
/// 每个轮询周期检查一次；被接受的一批文件只在开始时打一次时间戳。
#[derive(Debug, Clone)]
pub struct CooldownGate {
    min_interval_secs: i64,
    last_sent_at: DateTime<Local>,
}

impl CooldownGate {
    /// 创建闸门，上次发送时间初始化为 `now - min_interval`，启动后第一批不会被拦截
    ///
    /// 超过 [`MAX_INTERVAL_SECS`] 的配置值按上限处理。
    pub fn new(now: DateTime<Local>, min_interval_secs: u64) -> Self {
        let min_interval_secs = match i64::try_from(min_interval_secs) {
            Ok(secs) if secs <= MAX_INTERVAL_SECS => secs,
            _ => {
                warn!(
                    configured = min_interval_secs,
                    max = MAX_INTERVAL_SECS,
                    "Cooling period too large, clamped"
                );
                MAX_INTERVAL_SECS
            }
        };
        Self {
            min_interval_secs,
            last_sent_at: now - Duration::seconds(min_interval_secs),
        }
    }

    pub fn may_notify(&self, now: DateTime<Local>) -> bool {
        may_notify(now, self.last_sent_at, self.min_interval_secs)
    }

    /// 记录本批次发送时间
    pub fn stamp(&mut self, now: DateTime<Local>) {
        self.last_sent_at = now;
    }

    pub fn last_sent_at(&self) -> DateTime<Local> {
        self.last_sent_at
    }

    /// 剩余冷却秒数
    pub fn remaining_secs(&self, now: DateTime<Local>) -> i64 {
        (self.min_interval_secs - (now - self.last_sent_at).num_seconds()).max(0)
    }
}
