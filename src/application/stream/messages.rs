//! 流式接口的 JSON 消息
//!
//! Client → Server:
//! - `{"requestId": "...", "text": "...", "voice"?: "...", "language"?: "...", "speed"?: 1.0}`
//! - `{"type": "ping"}`
//!
//! Server → Client:
//! - `{"type": "audio", "data": "<base64 PCM>", "sample_rate": 24000, "requestId": "..."}`
//! - `{"type": "done", "requestId": "..."}`
//! - `{"type": "error", "message": "...", "requestId": "..."}`
//! - `{"type": "pong"}`

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 消息解析错误
#[derive(Debug, Error)]
#[error("Invalid message: {0}")]
pub struct MessageError(String);

/// 合成请求消息
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizeMessage {
    pub request_id: String,
    pub text: String,
    pub voice: Option<String>,
    pub language: Option<String>,
    pub speed: Option<f64>,
}

/// 客户端消息
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Ping,
    Synthesize(SynthesizeMessage),
}

#[derive(Debug, Deserialize)]
struct RawClientMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(rename = "requestId", default)]
    request_id: Option<serde_json::Value>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    speed: Option<f64>,
}

impl ClientMessage {
    /// 解析一条文本帧；除 `ping` 以外的消息都视为合成请求
    pub fn parse(raw: &str) -> Result<Self, MessageError> {
        let msg: RawClientMessage =
            serde_json::from_str(raw).map_err(|e| MessageError(e.to_string()))?;

        if msg.kind.as_deref() == Some("ping") {
            return Ok(ClientMessage::Ping);
        }

        let request_id = match msg.request_id {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Ok(ClientMessage::Synthesize(SynthesizeMessage {
            request_id,
            text: msg.text.unwrap_or_default(),
            voice: msg.voice.filter(|v| !v.trim().is_empty()),
            language: msg.language.filter(|l| !l.trim().is_empty()),
            speed: msg.speed,
        }))
    }
}

/// 服务端消息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Audio {
        data: String,
        sample_rate: u32,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Done {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Error {
        message: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Pong,
}

impl ServerMessage {
    pub fn audio(pcm: &[u8], sample_rate: u32, request_id: &str) -> Self {
        ServerMessage::Audio {
            data: base64::engine::general_purpose::STANDARD.encode(pcm),
            sample_rate,
            request_id: request_id.to_string(),
        }
    }

    pub fn done(request_id: &str) -> Self {
        ServerMessage::Done {
            request_id: request_id.to_string(),
        }
    }

    pub fn error(message: impl Into<String>, request_id: &str) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id: request_id.to_string(),
        }
    }

    /// done / error 是一次请求周期的最后一条消息
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerMessage::Done { .. } | ServerMessage::Error { .. })
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            ServerMessage::Audio { request_id, .. }
            | ServerMessage::Done { request_id }
            | ServerMessage::Error { request_id, .. } => Some(request_id),
            ServerMessage::Pong => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
