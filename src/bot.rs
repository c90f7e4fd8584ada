//! 事件循环 - 定时轮询和命令处理在同一个上下文中串行执行
//!
//! 转换和上传可能持续数分钟，放在单独的任务中运行；期间命令照常处理，
//! 轮询暂停到该批次结束。

use crate::orchestrator::{BatchOutcome, Orchestrator, PollReport, PollStep};
use crate::transport::InboundCommand;
use chrono::Local;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

fn log_report(report: &PollReport) {
    match &report.outcome {
        BatchOutcome::Idle => {}
        BatchOutcome::Processed { silent } => info!(
            files = report.files.len(),
            delivered = report.delivered_count(),
            silent = silent,
            "Batch processed"
        ),
        outcome => debug!(outcome = ?outcome, "Batch not delivered"),
    }
}

/// 运行事件循环直到 `shutdown` 完成
///
/// 编排器状态由循环独占，命令和检查阶段不会并发执行。退出时等待
/// 进行中的批次在各自超时内完成。
pub async fn run(
    mut orchestrator: Orchestrator,
    mut commands: mpsc::Receiver<InboundCommand>,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) {
    let mut ticker = tokio::time::interval(interval);
    // 一次轮询超过间隔时丢弃错过的 tick，而不是连续补跑
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let (done_tx, mut done_rx) = mpsc::channel::<PollReport>(1);
    let mut in_flight: Option<JoinHandle<()>> = None;

    info!(interval = ?interval, "Event loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, event loop stopping");
                break;
            }
            // 上一批结束（包括异常退出）前不开始新的轮询
            _ = ticker.tick(), if in_flight.as_ref().map_or(true, JoinHandle::is_finished) => {
                match orchestrator.begin_poll(Local::now()) {
                    PollStep::Done(report) => log_report(&report),
                    PollStep::Deliver(batch) => {
                        debug!(files = ?batch.arrivals(), "Delivery batch started");
                        let done_tx = done_tx.clone();
                        in_flight = Some(tokio::spawn(async move {
                            let _ = done_tx.send(batch.run().await).await;
                        }));
                    }
                }
            }
            Some(report) = done_rx.recv() => log_report(&report),
            Some(command) = commands.recv() => {
                let Some(reply) = orchestrator.handle_command(&command.name, &command.context) else {
                    continue;
                };
                if let Err(e) = orchestrator
                    .transport()
                    .send_text(command.context.chat, &reply, false)
                    .await
                {
                    warn!(command = %command.name, error = %e, "Failed to send reply");
                }
            }
        }
    }

    if let Some(task) = in_flight.filter(|task| !task.is_finished()) {
        info!("Waiting for in-flight delivery batch");
        if let Err(e) = task.await {
            error!(error = %e, "Delivery batch task failed");
        }
    }
}

/// 等待 Ctrl-C 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
