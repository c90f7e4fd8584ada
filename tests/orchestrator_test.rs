//! 编排器集成测试 - 用记录型 Transport 替代 Telegram

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};
use motion_notifier::{
    BatchOutcome, ChatId, CommandContext, Config, DeliveryError, FileOutcome, MemoryKvStore,
    Orchestrator, Transport, UserId,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Text {
        chat: ChatId,
        text: String,
        silent: bool,
    },
    Attachment {
        chat: ChatId,
        file_name: String,
        caption: String,
        silent: bool,
    },
}

/// 记录所有发送请求，可配置为附件发送失败
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    fail_attachments: bool,
}

impl RecordingTransport {
    fn failing() -> Self {
        Self {
            fail_attachments: true,
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(&self, recipient: ChatId, text: &str, silent: bool) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat: recipient,
            text: text.to_string(),
            silent,
        });
        Ok(())
    }

    async fn send_attachment(
        &self,
        recipient: ChatId,
        path: &Path,
        caption: &str,
        silent: bool,
        _timeout: Duration,
    ) -> Result<(), DeliveryError> {
        assert!(path.is_file(), "artifact must exist while uploading");
        if self.fail_attachments {
            return Err(DeliveryError::Api("Bad Request: file too large".to_string()));
        }
        self.sent.lock().unwrap().push(Sent::Attachment {
            chat: recipient,
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            caption: caption.to_string(),
            silent,
        });
        Ok(())
    }
}

struct Fixture {
    captures: TempDir,
    temp: TempDir,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let captures = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            motion_h264_path: captures.path().to_path_buf(),
            temp_path: temp.path().to_path_buf(),
            converting_command: "case $input_file in */bad_*) exit 1;; esac; cp $input_file $output_file"
                .to_string(),
            conversion_timeout: 10,
            ..Config::default()
        };
        Self {
            captures,
            temp,
            config,
        }
    }

    fn capture(&self, name: &str) {
        fs::write(self.captures.path().join(format!("{}.h264", name)), b"h264").unwrap();
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        fs::read_dir(self.temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

/// 2026-10-19 是周一
fn monday_at(hour: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap()
}

fn sunday_at(hour: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 10, 25, hour, 0, 0).unwrap()
}

const OWNER: CommandContext = CommandContext {
    sender: UserId(1001),
    chat: ChatId(5001),
};

async fn bootstrapped(
    fixture: &Fixture,
    transport: Arc<RecordingTransport>,
    now: DateTime<Local>,
) -> Orchestrator {
    let mut orchestrator =
        Orchestrator::initialize(&fixture.config, Arc::new(MemoryKvStore::new()), transport, now).await;
    assert!(orchestrator.handle_command("start", &OWNER).is_some());
    // 第一次轮询只建立基线
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.outcome, BatchOutcome::Idle);
    orchestrator
}

#[tokio::test]
async fn test_existing_files_are_not_reported_on_startup() {
    let fixture = Fixture::new();
    fixture.capture("old");
    let transport = Arc::new(RecordingTransport::default());
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), monday_at(10)).await;

    let report = orchestrator.poll_once(monday_at(10)).await;
    assert!(report.arrivals.is_empty());
    assert_eq!(report.outcome, BatchOutcome::Idle);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_new_capture_is_converted_and_delivered() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("cam_20261019_100000");
    let report = orchestrator.poll_once(now).await;

    assert_eq!(report.outcome, BatchOutcome::Processed { silent: false });
    assert_eq!(report.delivered_count(), 1);
    assert_eq!(
        transport.sent(),
        vec![Sent::Attachment {
            chat: ChatId(5001),
            file_name: "cam_20261019_100000.mp4".to_string(),
            caption: "Motion Detected : cam_20261019_100000".to_string(),
            silent: false,
        }]
    );
    assert!(fixture.artifacts().is_empty());

    // 同一个文件不会再次报告
    let report = orchestrator.poll_once(now + ChronoDuration::seconds(600)).await;
    assert_eq!(report.outcome, BatchOutcome::Idle);
}

#[tokio::test]
async fn test_in_progress_captures_are_ignored() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("cam_saving");
    fs::write(fixture.captures.path().join("notes.txt"), b"").unwrap();

    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.outcome, BatchOutcome::Idle);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_no_recipient_skips_batch() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = Orchestrator::initialize(
        &fixture.config,
        Arc::new(MemoryKvStore::new()),
        transport.clone(),
        now,
    )
    .await;
    orchestrator.poll_once(now).await;

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.outcome, BatchOutcome::NoRecipient);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_only_first_user_becomes_admin() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    let stranger = CommandContext {
        sender: UserId(2002),
        chat: ChatId(6002),
    };
    assert_eq!(orchestrator.handle_command("start", &stranger), None);
    assert_eq!(orchestrator.handle_command("disable_noti", &stranger), None);

    assert_eq!(orchestrator.state().identity.recipient(), Some(ChatId(5001)));
    assert!(orchestrator.state().notification.notifications_enabled);
}

#[tokio::test]
async fn test_disabled_notifications_skip_batch() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;
    orchestrator.handle_command("disable_noti", &OWNER);

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.outcome, BatchOutcome::NotificationsDisabled);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_cooling_period_skips_whole_batch() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.delivered_count(), 1);

    fixture.capture("b");
    let report = orchestrator.poll_once(now + ChronoDuration::seconds(60)).await;
    assert_eq!(report.outcome, BatchOutcome::CoolingDown { remaining_secs: 240 });

    // 冷却期间跳过的文件不会补发
    fixture.capture("c");
    let report = orchestrator.poll_once(now + ChronoDuration::seconds(300)).await;
    assert_eq!(report.arrivals, vec!["c".to_string()]);
    assert_eq!(report.delivered_count(), 1);
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn test_quiet_hours_deliver_silently() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = sunday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.outcome, BatchOutcome::Processed { silent: true });
    assert!(matches!(&transport.sent()[0], Sent::Attachment { silent: true, .. }));
}

#[tokio::test]
async fn test_quiet_hours_suppressed_when_configured() {
    let mut fixture = Fixture::new();
    fixture.config.no_noti_in_schedule = true;
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(22);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.outcome, BatchOutcome::QuietHoursSuppressed);
    assert!(transport.sent().is_empty());

    // 被抑制的批次不占用冷却时间
    assert_eq!(
        orchestrator.state().notification.cooldown.last_sent_at(),
        now - ChronoDuration::seconds(300)
    );
}

#[tokio::test]
async fn test_disabled_sound_suppresses_when_configured() {
    let mut fixture = Fixture::new();
    fixture.config.no_noti_in_schedule = true;
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;
    orchestrator.handle_command("disable_sound", &OWNER);

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.outcome, BatchOutcome::QuietHoursSuppressed);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_disabled_sound_delivers_silently() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;
    orchestrator.handle_command("disable_sound", &OWNER);

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.outcome, BatchOutcome::Processed { silent: true });
    assert!(matches!(&transport.sent()[0], Sent::Attachment { silent: true, .. }));
}

#[tokio::test]
async fn test_failed_conversion_does_not_stop_batch() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("bad_clip");
    fixture.capture("good_clip");
    let report = orchestrator.poll_once(now).await;

    let mut files = report.files.clone();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    assert!(matches!(files[0], (ref name, FileOutcome::ConversionFailed(_)) if name == "bad_clip"));
    assert_eq!(files[1], ("good_clip".to_string(), FileOutcome::Delivered));
    assert_eq!(transport.sent().len(), 1);
    assert!(fixture.artifacts().is_empty());
}

#[tokio::test]
async fn test_artifact_removed_after_failed_upload() {
    let fixture = Fixture::new();
    let transport = Arc::new(RecordingTransport::failing());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;

    assert!(matches!(report.files[0].1, FileOutcome::DeliveryFailed(_)));
    assert_eq!(report.delivered_count(), 0);
    assert!(fixture.artifacts().is_empty());
    // 源录像保持不变
    assert!(fixture.captures.path().join("a.h264").exists());
}

#[tokio::test]
async fn test_text_only_mode_without_conversion() {
    let mut fixture = Fixture::new();
    fixture.config.mp4_upload_enable = false;
    let transport = Arc::new(RecordingTransport::failing());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;

    assert_eq!(report.delivered_count(), 1);
    assert_eq!(
        transport.sent(),
        vec![Sent::Text {
            chat: ChatId(5001),
            text: "Motion Detected : a".to_string(),
            silent: false,
        }]
    );
    assert!(fixture.artifacts().is_empty());
}

#[tokio::test]
async fn test_sync_runs_after_delivery_when_validated() {
    let mut fixture = Fixture::new();
    let marker = fixture.temp.path().join("synced");
    fixture.config.mp4_upload_enable = false;
    fixture.config.external_command_enable = true;
    fixture.config.validate_command = r#"echo '{"isAuthenticatedUser": true}'"#.to_string();
    fixture.config.sync_command = format!("touch {}", marker.display());

    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;
    assert!(!marker.exists());

    fixture.capture("a");
    orchestrator.poll_once(now).await;
    assert!(marker.exists());
}

#[tokio::test]
async fn test_sync_disabled_when_validation_fails() {
    let mut fixture = Fixture::new();
    let marker = fixture.temp.path().join("synced");
    fixture.config.mp4_upload_enable = false;
    fixture.config.external_command_enable = true;
    fixture.config.validate_command = r#"echo '{"isAuthenticatedUser": false}'"#.to_string();
    fixture.config.sync_command = format!("touch {}", marker.display());

    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("a");
    let report = orchestrator.poll_once(now).await;
    assert_eq!(report.delivered_count(), 1);
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_oversized_cooling_period_does_not_abort_startup() {
    let mut fixture = Fixture::new();
    fixture.config.noti_cooling_period = 10_000_000_000_000;
    let transport = Arc::new(RecordingTransport::default());
    let now = monday_at(10);
    let mut orchestrator = bootstrapped(&fixture, transport.clone(), now).await;

    fixture.capture("a");
    assert_eq!(orchestrator.poll_once(now).await.delivered_count(), 1);

    fixture.capture("b");
    let report = orchestrator.poll_once(now + ChronoDuration::days(30)).await;
    assert!(matches!(report.outcome, BatchOutcome::CoolingDown { .. }));
}
