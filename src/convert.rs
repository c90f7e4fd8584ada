//! 录像转换 - 调用外部命令把 .h264 转成可发送的 .mp4
//!
//! 命令模板支持 `$input_file` / `$output_file`（也可写成 `${input_file}`），
//! `$$` 表示字面量 `$`。其他占位符在加载配置时就会报错。

use crate::config::DEFAULT_CONVERTING_COMMAND;
use crate::detector::CAPTURE_EXTENSION;
use crate::error::{ConfigError, ConversionError};
use crate::exec::{run_shell, ExecError, OutputMode};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info};

/// 转换产物扩展名
pub const ARTIFACT_EXTENSION: &str = ".mp4";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("placeholder regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Input,
    Output,
}

/// 已校验的转换命令模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    /// 解析并校验模板
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(raw) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            Self::push_literal(&mut literal, &raw[last..whole.start()], last)?;
            last = whole.end();

            if caps.get(1).is_some() {
                literal.push('$');
                continue;
            }

            let name = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let segment = match name {
                "input_file" => Segment::Input,
                "output_file" => Segment::Output,
                other => {
                    return Err(ConfigError::UnknownPlaceholder {
                        name: other.to_string(),
                    })
                }
            };
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
        }

        Self::push_literal(&mut literal, &raw[last..], last)?;
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// 占位符之间的文本不允许再出现 `$`
    fn push_literal(literal: &mut String, text: &str, offset: usize) -> Result<(), ConfigError> {
        if let Some(pos) = text.find('$') {
            return Err(ConfigError::DanglingDollar {
                offset: offset + pos,
            });
        }
        literal.push_str(text);
        Ok(())
    }

    /// 用输入/输出路径渲染命令
    pub fn render(&self, input: &Path, output: &Path) -> String {
        let mut command = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => command.push_str(text),
                Segment::Input => command.push_str(&input.to_string_lossy()),
                Segment::Output => command.push_str(&output.to_string_lossy()),
            }
        }
        command
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_CONVERTING_COMMAND).expect("default template is valid")
    }
}

/// 转换流水线
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    source_dir: PathBuf,
    temp_dir: PathBuf,
    template: CommandTemplate,
    timeout: Duration,
    verbose: bool,
}

impl ConversionPipeline {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        template: CommandTemplate,
        timeout: Duration,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            temp_dir: temp_dir.into(),
            template,
            timeout,
            verbose: false,
        }
    }

    /// verbose 模式下保留转换命令的输出
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn source_path(&self, base_name: &str) -> PathBuf {
        self.source_dir.join(format!("{}{}", base_name, CAPTURE_EXTENSION))
    }

    pub fn output_path(&self, base_name: &str) -> PathBuf {
        self.temp_dir.join(format!("{}{}", base_name, ARTIFACT_EXTENSION))
    }

    /// 转换一个录像，成功时返回产物路径
    ///
    /// 产物由调用方在发送后通过 [`remove_artifact`] 删除。
    pub async fn convert(&self, base_name: &str) -> Result<PathBuf, ConversionError> {
        let input = self.source_path(base_name);
        let output = self.output_path(base_name);
        let command = self.template.render(&input, &output);

        // 旧产物会让缺失检测失效
        let _ = fs::remove_file(&output);

        let mode = if self.verbose {
            OutputMode::Inherit
        } else {
            OutputMode::Discard
        };
        debug!(command = %command, "Converting capture");

        let result = run_shell(&command, self.timeout, mode).await.map_err(|e| match e {
            ExecError::Launch(source) => ConversionError::Launch(source),
            ExecError::Timeout(timeout) => ConversionError::Timeout(timeout),
        })?;

        if !result.status.success() {
            let _ = fs::remove_file(&output);
            return Err(ConversionError::ExitStatus(result.status.to_string()));
        }

        if !output.is_file() {
            return Err(ConversionError::MissingArtifact(output.display().to_string()));
        }

        info!(file = %base_name, artifact = %output.display(), "Capture converted");
        Ok(output)
    }
}

/// 删除临时产物，失败只记录日志
pub fn remove_artifact(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(artifact = %path.display(), "Removed temporary artifact");
            true
        }
        Err(e) => {
            error!(artifact = %path.display(), error = %e, "Failed to remove temporary artifact");
            false
        }
    }
}
