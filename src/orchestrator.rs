//! 通知编排 - 轮询任务和命令处理的入口
//!
//! 每个轮询周期：检测新录像 → 检查开关/冷却/日程 → 转换 → 发送 → 清理。
//! 检查阶段读写 [`BotState`]，在事件循环中执行；转换和发送由 [`DeliveryBatch`]
//! 完成，不接触状态，可以放到单独的任务里运行。
//! 单个文件的转换或发送失败只记录日志，不影响同批次的其他文件。

use crate::commands;
use crate::config::Config;
use crate::convert::{remove_artifact, ConversionPipeline};
use crate::detector::ArrivalDetector;
use crate::error::DeliveryError;
use crate::exec::{run_shell, OutputMode};
use crate::identity::{ChatId, IdentityStore};
use crate::state::{BotState, NotificationState};
use crate::store::KvStore;
use crate::transport::{CommandContext, Transport};
use crate::validator;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 本批次的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 没有新录像
    Idle,
    /// 列目录失败
    DetectFailed(String),
    /// 用户关闭了通知
    NotificationsDisabled,
    /// 还没有人 /start
    NoRecipient,
    /// 冷却中，整批跳过
    CoolingDown { remaining_secs: i64 },
    /// 静默时段且配置为不发送
    QuietHoursSuppressed,
    /// 已处理（逐个文件结果见 `files`）
    Processed { silent: bool },
}

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Delivered,
    ConversionFailed(String),
    DeliveryFailed(String),
}

/// 一次轮询的报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub arrivals: Vec<String>,
    pub outcome: BatchOutcome,
    pub files: Vec<(String, FileOutcome)>,
}

impl PollReport {
    fn new(arrivals: Vec<String>, outcome: BatchOutcome) -> Self {
        Self {
            arrivals,
            outcome,
            files: Vec::new(),
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, outcome)| *outcome == FileOutcome::Delivered)
            .count()
    }
}

/// 同步命令（外部命令校验通过后才启用）
#[derive(Debug, Clone)]
struct SyncCommand {
    command: String,
    timeout: Duration,
}

/// 转换和发送（批次之间共享，只读）
struct DeliveryWorker {
    /// `None` 表示不转换，只发文字
    pipeline: Option<ConversionPipeline>,
    transport: Arc<dyn Transport>,
    upload_timeout: Duration,
    sync: Option<SyncCommand>,
}

/// 通过检查、等待发送的一批录像
pub struct DeliveryBatch {
    worker: Arc<DeliveryWorker>,
    recipient: ChatId,
    arrivals: Vec<String>,
    silent: bool,
}

/// 检查阶段的结果
pub enum PollStep {
    /// 本周期到此结束
    Done(PollReport),
    /// 需要发送
    Deliver(DeliveryBatch),
}

/// 通知编排器
pub struct Orchestrator {
    state: BotState,
    detector: ArrivalDetector,
    worker: Arc<DeliveryWorker>,
    no_noti_in_schedule: bool,
}

impl Orchestrator {
    /// 初始化：加载身份、解析日程和模板、按需校验外部命令
    pub async fn initialize(
        config: &Config,
        store: Arc<dyn KvStore>,
        transport: Arc<dyn Transport>,
        now: DateTime<Local>,
    ) -> Self {
        let state = BotState {
            identity: IdentityStore::load(store),
            notification: NotificationState::new(now, config.noti_cooling_period),
            schedule: config.schedule(),
        };

        let pipeline = config.mp4_upload_enable.then(|| {
            ConversionPipeline::new(
                &config.motion_h264_path,
                &config.temp_path,
                config.command_template(),
                config.conversion_timeout(),
            )
            .with_verbose(config.verbose)
        });

        let sync = if config.external_command_enable {
            let valid = validator::validate(
                &config.validate_command,
                &config.valid_json_key,
                &config.valid_json_value,
                config.external_command_timeout(),
            )
            .await;
            if !valid {
                error!("External command is not valid or not configured properly, sync disabled");
            }
            valid.then(|| SyncCommand {
                command: config.sync_command.clone(),
                timeout: config.external_command_timeout(),
            })
        } else {
            None
        };

        info!(
            transport = transport.name(),
            capture_dir = %config.motion_h264_path.display(),
            convert = pipeline.is_some(),
            sync = sync.is_some(),
            bootstrapped = state.identity.is_bootstrapped(),
            "Orchestrator initialized"
        );

        Self {
            state,
            detector: ArrivalDetector::new(&config.motion_h264_path),
            worker: Arc::new(DeliveryWorker {
                pipeline,
                transport,
                upload_timeout: config.upload_timeout(),
                sync,
            }),
            no_noti_in_schedule: config.no_noti_in_schedule,
        }
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.worker.transport
    }

    /// 处理命令，返回回复内容；`None` 表示不回复
    pub fn handle_command(&mut self, name: &str, context: &CommandContext) -> Option<String> {
        commands::dispatch(&mut self.state, name, context)
    }

    fn recipient(&self) -> Result<ChatId, DeliveryError> {
        self.state.identity.recipient().ok_or(DeliveryError::NoRecipient)
    }

    /// 执行一个完整的轮询周期（检查并发送）
    pub async fn poll_once(&mut self, now: DateTime<Local>) -> PollReport {
        match self.begin_poll(now) {
            PollStep::Done(report) => report,
            PollStep::Deliver(batch) => batch.run().await,
        }
    }

    /// 检测新录像并做发送前的检查
    ///
    /// 只做目录列表和内存状态读写，不会阻塞。通过检查时冷却时间戳已经更新，
    /// 返回的批次由调用方运行。
    pub fn begin_poll(&mut self, now: DateTime<Local>) -> PollStep {
        let arrivals = match self.detector.detect_new_arrivals() {
            Ok(arrivals) => arrivals,
            Err(e) => {
                error!(dir = %self.detector.dir().display(), error = %e, "Failed to list capture directory");
                return PollStep::Done(PollReport::new(
                    Vec::new(),
                    BatchOutcome::DetectFailed(e.to_string()),
                ));
            }
        };

        if arrivals.is_empty() {
            return PollStep::Done(PollReport::new(arrivals, BatchOutcome::Idle));
        }
        info!(files = ?arrivals, "Newly added capture files");

        if !self.state.notification.notifications_enabled {
            debug!("Notifications disabled, skipping batch");
            return PollStep::Done(PollReport::new(arrivals, BatchOutcome::NotificationsDisabled));
        }

        let recipient = match self.recipient() {
            Ok(recipient) => recipient,
            Err(e) => {
                warn!(error = %e, "Skipping batch");
                return PollStep::Done(PollReport::new(arrivals, BatchOutcome::NoRecipient));
            }
        };

        let cooldown = &self.state.notification.cooldown;
        if !cooldown.may_notify(now) {
            let remaining_secs = cooldown.remaining_secs(now);
            debug!(remaining_secs = remaining_secs, "Within cooling period, skipping batch");
            return PollStep::Done(PollReport::new(
                arrivals,
                BatchOutcome::CoolingDown { remaining_secs },
            ));
        }

        // 关闭声音等同于静默时段：按配置不发送或静音发送
        let quiet = self
            .state
            .schedule
            .is_quiet_hours(&now, !self.state.notification.sound_enabled);
        if quiet && self.no_noti_in_schedule {
            debug!("Quiet hours, notification suppressed");
            return PollStep::Done(PollReport::new(arrivals, BatchOutcome::QuietHoursSuppressed));
        }

        // 整批只打一次时间戳
        self.state.notification.cooldown.stamp(now);

        PollStep::Deliver(DeliveryBatch {
            worker: self.worker.clone(),
            recipient,
            arrivals,
            silent: quiet,
        })
    }
}

impl DeliveryBatch {
    pub fn arrivals(&self) -> &[String] {
        &self.arrivals
    }

    /// 逐个转换、发送、清理；有文件发送成功时运行同步命令
    pub async fn run(self) -> PollReport {
        let worker = &self.worker;
        let mut report = PollReport::new(
            self.arrivals.clone(),
            BatchOutcome::Processed { silent: self.silent },
        );

        for name in &self.arrivals {
            let outcome = worker.process_file(self.recipient, name, self.silent).await;
            report.files.push((name.clone(), outcome));
        }

        if report.delivered_count() > 0 {
            worker.run_sync().await;
        }

        report
    }
}

impl DeliveryWorker {
    /// 转换、发送、清理单个文件
    async fn process_file(&self, recipient: ChatId, name: &str, silent: bool) -> FileOutcome {
        let caption = format!("Motion Detected : {}", name);

        let Some(pipeline) = &self.pipeline else {
            return match self.transport.send_text(recipient, &caption, silent).await {
                Ok(()) => FileOutcome::Delivered,
                Err(e) => {
                    error!(file = %name, error = %e, "Failed to send notification");
                    FileOutcome::DeliveryFailed(e.to_string())
                }
            };
        };

        let artifact = match pipeline.convert(name).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(file = %name, error = %e, "Failed to convert video");
                return FileOutcome::ConversionFailed(e.to_string());
            }
        };

        info!(chat_id = %recipient, silent = silent, file = %name, "Uploading video file");
        let result = self
            .transport
            .send_attachment(recipient, &artifact, &caption, silent, self.upload_timeout)
            .await;

        remove_artifact(&artifact);

        match result {
            Ok(()) => {
                debug!(file = %name, "File uploaded successfully");
                FileOutcome::Delivered
            }
            Err(e) => {
                error!(file = %name, error = %e, "Failed to upload video file");
                FileOutcome::DeliveryFailed(e.to_string())
            }
        }
    }

    async fn run_sync(&self) {
        let Some(sync) = &self.sync else {
            return;
        };

        match run_shell(&sync.command, sync.timeout, OutputMode::Discard).await {
            Ok(output) if output.status.success() => debug!("Sync command finished"),
            Ok(output) => warn!(status = %output.status, "Sync command failed"),
            Err(e) => warn!(error = %e, "Sync command failed"),
        }
    }
}
