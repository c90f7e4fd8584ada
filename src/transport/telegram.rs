//! Telegram Bot API 渠道
//!
//! 发送用 `sendMessage` / `sendVideo`，接收命令用 `getUpdates` 长轮询。

use super::{parse_command, CommandContext, InboundCommand, Transport};
use crate::error::DeliveryError;
use crate::identity::{ChatId, UserId};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Telegram API 地址
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram 渠道配置
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token
    pub token: String,
    /// API 地址（支持代理）
    pub api_url: String,
    /// 普通请求超时（秒）
    pub request_timeout_secs: u64,
    /// getUpdates 长轮询时长（秒）
    pub poll_timeout_secs: u64,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: TELEGRAM_API_URL.to_string(),
            request_timeout_secs: 30,
            poll_timeout_secs: 30,
        }
    }
}

/// API 响应
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

impl Update {
    /// 把更新转换为命令，不是命令的消息返回 `None`
    pub fn to_command(&self) -> Option<InboundCommand> {
        let message = self.message.as_ref()?;
        let name = parse_command(message.text.as_deref()?)?;
        let sender = message.from.as_ref()?;
        Some(InboundCommand {
            name,
            context: CommandContext {
                sender: UserId(sender.id),
                chat: ChatId(message.chat.id),
            },
        })
    }
}

/// Telegram 渠道
#[derive(Debug)]
pub struct TelegramTransport {
    client: Client,
    config: TelegramConfig,
}

impl TelegramTransport {
    /// 创建渠道
    pub fn new(config: TelegramConfig) -> Result<Self, DeliveryError> {
        if config.token.is_empty() {
            return Err(DeliveryError::Api("auth_token is required".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.token,
            method
        )
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, DeliveryError> {
        let body: ApiResponse<T> = response.json().await?;
        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(DeliveryError::Api(
                body.description.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }

    /// 拉取更新
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, DeliveryError> {
        let params = serde_json::json!({
            "offset": offset,
            "timeout": self.config.poll_timeout_secs,
            "allowed_updates": ["message"],
        });

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(self.config.poll_timeout_secs + 10))
            .json(&params)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// 启动后台接收任务，把命令送到事件循环
    ///
    /// 接收端关闭后任务退出。
    pub fn spawn_receiver(self: Arc<Self>, commands: mpsc::Sender<InboundCommand>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut offset = 0;
            info!("Telegram receiver started");

            loop {
                let updates = match self.get_updates(offset).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        warn!(error = %e, "getUpdates failed, retrying");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(command) = update.to_command() else {
                        continue;
                    };
                    debug!(command = %command.name, user_id = %command.context.sender, "Command received");
                    if commands.send(command).await.is_err() {
                        info!("Command channel closed, receiver stopping");
                        return;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, recipient: ChatId, text: &str, silent: bool) -> Result<(), DeliveryError> {
        let params = serde_json::json!({
            "chat_id": recipient.0,
            "text": text,
            "disable_notification": silent,
        });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&params)
            .send()
            .await?;

        Self::parse_response::<serde_json::Value>(response).await?;
        debug!(chat_id = %recipient, silent = silent, "Message sent");
        Ok(())
    }

    async fn send_attachment(
        &self,
        recipient: ChatId,
        path: &Path,
        caption: &str,
        silent: bool,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| DeliveryError::Attachment {
                path: path.display().to_string(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let form = Form::new()
            .text("chat_id", recipient.0.to_string())
            .text("caption", caption.to_string())
            .text("disable_notification", silent.to_string())
            .part("video", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.method_url("sendVideo"))
            .timeout(timeout)
            .multipart(form)
            .send()
            .await?;

        Self::parse_response::<serde_json::Value>(response).await?;
        info!(chat_id = %recipient, file = %path.display(), silent = silent, "Video uploaded");
        Ok(())
    }
}
