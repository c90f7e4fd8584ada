//! Motion Notifier CLI
//!
//! 监控录像目录，把新的移动侦测录像发送到 Telegram

use anyhow::{Context, Result};
use clap::Parser;
use chrono::Local;
use motion_notifier::config::DEFAULT_CONFIG_PATH;
use motion_notifier::identity::{ADMINS_KEY, RECIPIENT_KEY};
use motion_notifier::{
    bot, Config, FileKvStore, InstanceLock, Orchestrator, SystemdService, TelegramConfig,
    TelegramTransport,
};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "motion-notifier")]
#[command(about = "Motion Notifier - 把移动侦测录像发送到 Telegram")]
#[command(version)]
struct Cli {
    /// 配置文件
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// 日志文件（默认输出到 stderr）
    #[arg(long, short)]
    log: Option<PathBuf>,
    /// 输出 debug 日志和转换命令输出
    #[arg(long, short)]
    verbose: bool,
    /// 安装 systemd service
    #[arg(long)]
    install_systemd_service: bool,
    /// 删除 systemd service
    #[arg(long)]
    remove_systemd_service: bool,
}

fn init_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose {
        "motion_notifier=debug"
    } else {
        "motion_notifier=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match &cli.log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            fmt()
                .with_writer(Mutex::new(file))
                .with_env_filter(filter)
                .with_ansi(false)
                .init();
        }
        None => {
            fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.install_systemd_service {
        let service = SystemdService::new();
        println!("installing systemd service file : {}", service.unit_path().display());
        service.install(&cli.config, cli.log.as_deref())?;
        println!("systemd service file installed successfully.");
        return Ok(());
    }

    if cli.remove_systemd_service {
        let service = SystemdService::new();
        println!("removing systemd service file : {}", service.unit_path().display());
        if service.remove()? {
            println!("systemd service file uninstalled successfully.");
        } else {
            println!("systemd service file is not installed.");
        }
        return Ok(());
    }

    init_logging(&cli)?;

    let mut config = Config::load(&cli.config)?;
    config.verbose = cli.verbose;

    let _lock = InstanceLock::acquire(&config.pid_filename)?;

    let store_root = config
        .chat_id_filename
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let store = FileKvStore::new(store_root)
        .with_path(RECIPIENT_KEY, &config.chat_id_filename)
        .with_path(ADMINS_KEY, &config.admin_list_filename);

    let telegram = Arc::new(TelegramTransport::new(TelegramConfig::new(&config.auth_token))?);
    let orchestrator =
        Orchestrator::initialize(&config, Arc::new(store), telegram.clone(), Local::now()).await;

    let (tx, rx) = mpsc::channel(32);
    let receiver = telegram.spawn_receiver(tx);

    bot::run(orchestrator, rx, config.poll_interval(), bot::shutdown_signal()).await;

    receiver.abort();
    info!("Motion notifier stopped");
    Ok(())
}
