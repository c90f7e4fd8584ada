//! 配置加载 - JSON 配置文件
//!
//! 所有字段都有默认值，配置文件只需要写需要覆盖的键。
//! 日程和转换命令模板在加载时校验，无效时回退到默认值并记录 warning。

use crate::convert::CommandTemplate;
use crate::error::ConfigError;
use crate::schedule::ScheduleConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "/opt/rws/etc/telegramBot.conf";

/// 默认转换命令
pub const DEFAULT_CONVERTING_COMMAND: &str =
    "/opt/rws/tools/ffmpeg_neon -y -i $input_file $output_file";

/// 运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot token
    pub auth_token: String,
    /// 监控的录像目录
    pub motion_h264_path: PathBuf,
    /// 轮询间隔（秒）
    pub checking_interval: u64,
    /// 是否转换为 mp4 并作为附件发送
    pub mp4_upload_enable: bool,
    /// 上传超时（秒）
    pub upload_timeout: u64,
    /// 两批通知之间的最小间隔（秒）
    pub noti_cooling_period: u64,
    /// 转换命令模板
    pub converting_command: String,
    /// 非通知时段内完全不发送（否则静音发送）
    pub no_noti_in_schedule: bool,
    /// 允许通知的星期（0 = 周一）
    pub noti_schedule_day: serde_json::Value,
    /// 允许通知的小时
    pub noti_schedule_hour: serde_json::Value,
    /// 接收者 chat id 存储文件
    pub chat_id_filename: PathBuf,
    /// 管理员列表存储文件
    pub admin_list_filename: PathBuf,
    /// 是否启用外部同步命令
    pub external_command_enable: bool,
    pub validate_command: String,
    pub valid_json_key: String,
    pub valid_json_value: String,
    pub sync_command: String,
    /// 转换产物的临时目录
    pub temp_path: PathBuf,
    /// 转换命令超时（秒）
    pub conversion_timeout: u64,
    /// 校验/同步命令超时（秒）
    pub external_command_timeout: u64,
    /// PID / 单实例锁文件
    pub pid_filename: PathBuf,
    /// 输出转换命令的 stdout/stderr（由命令行 --verbose 设置）
    #[serde(skip)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_token: String::new(),
            motion_h264_path: PathBuf::from("/opt/rws/motion_captured"),
            checking_interval: 5,
            mp4_upload_enable: true,
            upload_timeout: 120,
            noti_cooling_period: 300,
            converting_command: DEFAULT_CONVERTING_COMMAND.to_string(),
            no_noti_in_schedule: false,
            noti_schedule_day: serde_json::json!(ScheduleConfig::DEFAULT_WEEKDAYS),
            noti_schedule_hour: serde_json::json!(ScheduleConfig::DEFAULT_HOURS),
            chat_id_filename: PathBuf::from("/opt/rws/etc/run/telegramBotChatId.json"),
            admin_list_filename: PathBuf::from("/opt/rws/etc/run/telegramBotAdminIdList.json"),
            external_command_enable: false,
            validate_command: "/opt/rws/tools/googleDrive.py about --json".to_string(),
            valid_json_key: "isAuthenticatedUser".to_string(),
            valid_json_value: "True".to_string(),
            sync_command: "/opt/rws/tools/googleDrive.py sync --json".to_string(),
            temp_path: PathBuf::from("/tmp"),
            conversion_timeout: 120,
            external_command_timeout: 30,
            pid_filename: PathBuf::from("/opt/rws/etc/run/motion-notifier.pid"),
            verbose: false,
        }
    }
}

impl Config {
    /// 从 JSON 文件加载配置
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// 从 JSON 字符串解析配置
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(content)?;
        debug!(
            capture_dir = %config.motion_h264_path.display(),
            interval = config.checking_interval,
            cooling = config.noti_cooling_period,
            "Config loaded"
        );
        Ok(config)
    }

    /// 解析通知日程，无效字段回退到默认值
    pub fn schedule(&self) -> ScheduleConfig {
        let weekdays = ScheduleConfig::parse_list(&self.noti_schedule_day, 6).unwrap_or_else(|e| {
            warn!(error = %e, default = ?ScheduleConfig::DEFAULT_WEEKDAYS, "Invalid day schedule, using default");
            ScheduleConfig::DEFAULT_WEEKDAYS.into_iter().collect()
        });
        let hours = ScheduleConfig::parse_list(&self.noti_schedule_hour, 23).unwrap_or_else(|e| {
            warn!(error = %e, default = ?ScheduleConfig::DEFAULT_HOURS, "Invalid hour schedule, using default");
            ScheduleConfig::DEFAULT_HOURS.into_iter().collect()
        });
        debug!(weekdays = ?weekdays, hours = ?hours, "Notification schedule");
        ScheduleConfig::new(weekdays, hours)
    }

    /// 解析转换命令模板，未知占位符回退到默认模板
    pub fn command_template(&self) -> CommandTemplate {
        CommandTemplate::parse(&self.converting_command).unwrap_or_else(|e| {
            warn!(
                error = %e,
                template = %self.converting_command,
                "Invalid converting command, using default"
            );
            CommandTemplate::default()
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.checking_interval.max(1))
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout)
    }

    pub fn external_command_timeout(&self) -> Duration {
        Duration::from_secs(self.external_command_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = Config::from_json(r#"{"auth_token": "123:abc"}"#).unwrap();
        assert_eq!(config.auth_token, "123:abc");
        assert_eq!(config.checking_interval, 5);
        assert_eq!(config.noti_cooling_period, 300);
        assert!(config.mp4_upload_enable);
        assert!(!config.no_noti_in_schedule);
        assert_eq!(config.converting_command, DEFAULT_CONVERTING_COMMAND);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = Config::from_json(r#"{"some_future_key": 1, "upload_timeout": 60}"#).unwrap();
        assert_eq!(config.upload_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_schedule_accepts_string_lists() {
        let config = Config::from_json(
            r#"{"noti_schedule_day": "[5, 6]", "noti_schedule_hour": [22, 23]}"#,
        )
        .unwrap();
        let schedule = config.schedule();
        assert_eq!(schedule.weekdays().iter().copied().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(schedule.hours().iter().copied().collect::<Vec<_>>(), vec![22, 23]);
    }

    #[test]
    fn test_malformed_schedule_falls_back() {
        let config = Config::from_json(
            r#"{"noti_schedule_day": "[0, 1", "noti_schedule_hour": [9, 24]}"#,
        )
        .unwrap();
        assert_eq!(config.schedule(), ScheduleConfig::default());
    }

    #[test]
    fn test_bad_template_falls_back() {
        let config = Config::from_json(r#"{"converting_command": "ffmpeg -i $source $output_file"}"#)
            .unwrap();
        assert_eq!(config.command_template().as_str(), DEFAULT_CONVERTING_COMMAND);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = Config::load(Path::new("/nonexistent/motion-notifier.conf")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = Config::from_json(r#"{"checking_interval": 0}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
