//! 通知日程 - 判断当前是否处于静默时段

use crate::error::ConfigError;
use chrono::{Datelike, Timelike};
use std::collections::BTreeSet;

/// 允许发送有声通知的星期和小时
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    weekdays: BTreeSet<u8>,
    hours: BTreeSet<u8>,
}

impl ScheduleConfig {
    /// 周一到周五
    pub const DEFAULT_WEEKDAYS: [u8; 5] = [0, 1, 2, 3, 4];
    /// 9 点到 18 点
    pub const DEFAULT_HOURS: [u8; 10] = [9, 10, 11, 12, 13, 14, 15, 16, 17, 18];

    pub fn new(weekdays: BTreeSet<u8>, hours: BTreeSet<u8>) -> Self {
        Self { weekdays, hours }
    }

    pub fn weekdays(&self) -> &BTreeSet<u8> {
        &self.weekdays
    }

    pub fn hours(&self) -> &BTreeSet<u8> {
        &self.hours
    }

    /// 解析日程列表
    ///
    /// 接受 JSON 整数数组，或内容为数组的字符串（如 `"[0,1,2]"`）。
    /// 每个元素必须在 `0..=max` 范围内。
    pub fn parse_list(value: &serde_json::Value, max: u8) -> Result<BTreeSet<u8>, ConfigError> {
        let invalid = |reason: String| ConfigError::Schedule {
            value: value.to_string(),
            reason,
        };

        let parsed;
        let items = match value {
            serde_json::Value::Array(items) => items,
            serde_json::Value::String(s) => {
                parsed = serde_json::from_str::<serde_json::Value>(s)
                    .map_err(|e| invalid(e.to_string()))?;
                parsed
                    .as_array()
                    .ok_or_else(|| invalid("not a list".to_string()))?
            }
            _ => return Err(invalid("not a list".to_string())),
        };

        items
            .iter()
            .map(|item| {
                item.as_u64()
                    .filter(|n| *n <= u64::from(max))
                    .map(|n| n as u8)
                    .ok_or_else(|| invalid(format!("{} is not in 0..={}", item, max)))
            })
            .collect()
    }

    /// 是否处于静默时段
    ///
    /// 只有星期和小时都在允许列表中才不算静默；关闭声音提醒时总是静默。
    pub fn is_quiet_hours<T: Datelike + Timelike>(&self, now: &T, alerts_disabled: bool) -> bool {
        if alerts_disabled {
            return true;
        }

        // 0 是周一，6 是周日
        let weekday = now.weekday().num_days_from_monday() as u8;
        let hour = now.hour() as u8;
        !(self.weekdays.contains(&weekday) && self.hours.contains(&hour))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_WEEKDAYS.into_iter().collect(),
            Self::DEFAULT_HOURS.into_iter().collect(),
        )
    }
}
