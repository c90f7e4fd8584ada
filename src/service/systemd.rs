//! systemd service management for Linux

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::warn;

/// Default unit file location
pub const DEFAULT_UNIT_PATH: &str = "/lib/systemd/system/motion-notifier.service";

/// Directories systemd loads system units from
const SYSTEM_UNIT_DIRS: [&str; 3] = ["/etc/systemd/system", "/lib/systemd/system", "/usr/lib/systemd/system"];

/// systemd unit manager for the notifier daemon
pub struct SystemdService {
    unit_path: PathBuf,
}

impl SystemdService {
    pub fn new() -> Self {
        Self::with_unit_path(DEFAULT_UNIT_PATH)
    }

    pub fn with_unit_path(unit_path: impl Into<PathBuf>) -> Self {
        Self {
            unit_path: unit_path.into(),
        }
    }

    pub fn unit_path(&self) -> &Path {
        &self.unit_path
    }

    /// Generate unit content
    pub fn generate_unit(binary: &Path, config: &Path, log: Option<&Path>) -> String {
        let mut exec_start = format!("{} --config {}", binary.display(), config.display());
        if let Some(log) = log {
            exec_start.push_str(&format!(" --log {}", log.display()));
        }

        format!(
            r#"[Unit]
Description=Motion capture notifier, sends motion detection messages to Telegram
After=network-online.target
Wants=network-online.target

[Service]
Type=simple
ExecStart={exec_start}
StandardOutput=journal
StandardError=journal
Restart=always
RestartSec=5

[Install]
WantedBy=multi-user.target
"#,
            exec_start = exec_start,
        )
    }

    /// Install the unit file for the current executable
    pub fn install(&self, config: &Path, log: Option<&Path>) -> Result<()> {
        let binary = std::env::current_exe().context("Failed to get current executable path")?;
        let content = Self::generate_unit(&binary, config, log);

        if let Some(parent) = self.unit_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create systemd unit directory")?;
        }
        std::fs::write(&self.unit_path, content)
            .with_context(|| format!("Failed to write unit file {}", self.unit_path.display()))?;

        self.daemon_reload();
        Ok(())
    }

    /// Remove the unit file. Returns false when it was not installed.
    pub fn remove(&self) -> Result<bool> {
        if !self.unit_path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(&self.unit_path)
            .with_context(|| format!("Failed to remove unit file {}", self.unit_path.display()))?;

        self.daemon_reload();
        Ok(true)
    }

    /// Whether systemd reads units from this file's directory
    pub fn is_system_unit(&self) -> bool {
        self.unit_path
            .parent()
            .is_some_and(|dir| SYSTEM_UNIT_DIRS.iter().any(|d| dir == Path::new(d)))
    }

    /// Ask systemd to pick up unit changes; failure is not fatal
    fn daemon_reload(&self) {
        if !self.is_system_unit() {
            return;
        }
        match Command::new("systemctl").arg("daemon-reload").status() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(status = %status, "systemctl daemon-reload failed"),
            Err(e) => warn!(error = %e, "Failed to execute systemctl"),
        }
    }
}

impl Default for SystemdService {
    fn default() -> Self {
        Self::new()
    }
}
