// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 推流协议 (JSON 文本帧)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Server -> Client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// 连接建立后的问候
    Info { message: String },
    /// 一帧标注后的画面, `data` 为 base64 JPEG
    Frame { data: String, timestamp: String },
    /// 命令确认
    Response { message: String },
    Error { message: String },
}

impl ServerMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
        }
    }

    pub fn response(message: impl Into<String>) -> Self {
        Self::Response {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_frame(&self) -> bool {
        matches!(self, Self::Frame { .. })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Client -> Server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Start,
    Stop,
    /// 未知命令, 保留原始 action 文本用于回复
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    action: Value,
}

impl ClientCommand {
    /// 解析 `{"action": ...}`, 非法 JSON 返回 `Error::Protocol("Invalid JSON format")`
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|_| Error::Protocol("Invalid JSON format".to_string()))?;

        Ok(match envelope.action {
            Value::String(action) => match action.as_str() {
                "start" => Self::Start,
                "stop" => Self::Stop,
                _ => Self::Unknown(action),
            },
            Value::Null => Self::Unknown("None".to_string()),
            other => Self::Unknown(other.to_string()),
        })
    }
}
