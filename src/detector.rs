//! 新录像检测 - 对比目录快照找出新完成的录像文件

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 录像文件扩展名
pub const CAPTURE_EXTENSION: &str = ".h264";

/// 录制中文件的名称标记
pub const IN_PROGRESS_MARKER: &str = "saving";

/// 列出目录中已完成的录像（去掉扩展名）
pub fn list_captures(dir: &Path) -> io::Result<HashSet<String>> {
    let mut names = HashSet::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        if !name.contains(CAPTURE_EXTENSION) || name.contains(IN_PROGRESS_MARKER) {
            continue;
        }

        // 跟随符号链接，只接受普通文件
        match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => {}
            _ => continue,
        }

        names.insert(name.replace(CAPTURE_EXTENSION, ""));
    }

    Ok(names)
}

/// 新录像检测器
///
/// 必须由唯一的调度上下文调用（`&mut self`），没有并发轮询。
#[derive(Debug)]
pub struct ArrivalDetector {
    dir: PathBuf,
    /// 上一次的目录快照，`None` 表示还没有建立基线
    snapshot: Option<HashSet<String>>,
    /// 已经报告过的文件，保证每个文件在进程生命周期内最多报告一次
    reported: HashSet<String>,
}

impl ArrivalDetector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            snapshot: None,
            reported: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 是否已经建立基线
    pub fn has_baseline(&self) -> bool {
        self.snapshot.is_some()
    }

    /// 返回上次轮询之后新出现的录像
    ///
    /// 启动后第一次调用只记录基线并返回空列表，避免对已有文件批量通知。
    /// 列目录失败时保留旧快照。
    pub fn detect_new_arrivals(&mut self) -> io::Result<Vec<String>> {
        let current = list_captures(&self.dir)?;

        let Some(previous) = self.snapshot.replace(current) else {
            debug!(
                dir = %self.dir.display(),
                count = self.snapshot.as_ref().map_or(0, |s| s.len()),
                "First listing stored as baseline"
            );
            return Ok(Vec::new());
        };

        let arrivals: Vec<String> = self
            .snapshot
            .iter()
            .flatten()
            .filter(|name| !previous.contains(*name) && !self.reported.contains(*name))
            .cloned()
            .collect();

        self.reported.extend(arrivals.iter().cloned());

        if !arrivals.is_empty() {
            debug!(files = ?arrivals, "Newly added capture files");
        }
        Ok(arrivals)
    }
}
