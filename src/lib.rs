//! Motion Notifier - 监控录像目录并通过 Telegram 发送移动侦测通知

pub mod access;
pub mod bot;
pub mod commands;
pub mod config;
pub mod convert;
pub mod cooldown;
pub mod daemon;
pub mod detector;
pub mod error;
pub mod exec;
pub mod identity;
pub mod orchestrator;
pub mod schedule;
pub mod service;
pub mod state;
pub mod store;
pub mod transport;
pub mod validator;

pub use access::{authorize, Authorization};
pub use commands::Command;
pub use config::Config;
pub use convert::{CommandTemplate, ConversionPipeline};
pub use cooldown::{may_notify, CooldownGate};
pub use daemon::InstanceLock;
pub use detector::ArrivalDetector;
pub use error::{ConfigError, ConversionError, DeliveryError, PersistenceError};
pub use identity::{ChatId, IdentityStore, UserId};
pub use orchestrator::{BatchOutcome, DeliveryBatch, FileOutcome, Orchestrator, PollReport, PollStep};
pub use schedule::ScheduleConfig;
pub use service::SystemdService;
pub use state::{BotState, NotificationState};
pub use store::{FileKvStore, KvStore, MemoryKvStore};
pub use transport::{CommandContext, InboundCommand, TelegramConfig, TelegramTransport, Transport};
pub use validator::ProbeOutcome;
