//! DashScope TTS Client - 调用 DashScope 多模态生成接口（SSE 流式）
//!
//! 实现 TtsEnginePort trait
//!
//! DashScope API:
//! POST {base_url}/services/aigc/multimodal-generation/generation
//! Headers: Authorization: Bearer <key>, X-DashScope-SSE: enable
//! Request: {"model": "...", "input": {"text": "...", "voice": "...", "language_type": "English"}}
//! Response: text/event-stream，每个事件的 data 为 JSON，`output.audio.data` 是 base64 PCM

use async_trait::async_trait;
use base64::Engine;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use crate::application::ports::{map_language, PcmStream, SynthesisRequest, TtsEnginePort, TtsError};

const GENERATION_PATH: &str = "/services/aigc/multimodal-generation/generation";
const HTTP_STATUS_PREFIX: &str = ":HTTP_STATUS/";

/// 生成请求体 (JSON)
#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: GenerationInput<'a>,
}

#[derive(Debug, Serialize)]
struct GenerationInput<'a> {
    text: &'a str,
    voice: &'a str,
    language_type: &'a str,
}

/// SSE 事件中的 JSON 负载
#[derive(Debug, Default, Deserialize)]
struct GenerationEvent {
    #[serde(default)]
    output: Option<EventOutput>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EventOutput {
    #[serde(default)]
    audio: Option<EventAudio>,
}

#[derive(Debug, Default, Deserialize)]
struct EventAudio {
    #[serde(default)]
    data: Option<String>,
}

/// DashScope 客户端配置
#[derive(Clone)]
pub struct DashScopeConfig {
    /// API 基础 URL
    pub base_url: String,
    /// API Key，为空表示未配置
    pub api_key: String,
    /// 模型名
    pub model: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for DashScopeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/api/v1".to_string(),
            api_key: String::new(),
            model: "qwen3-tts-flash".to_string(),
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for DashScopeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashScopeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl DashScopeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// DashScope TTS 客户端
pub struct DashScopeTtsClient {
    client: Client,
    config: DashScopeConfig,
}

impl DashScopeTtsClient {
    pub fn new(config: DashScopeConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn generation_url(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), GENERATION_PATH)
    }
}

fn map_request_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::NetworkError(format!("Cannot connect to DashScope: {}", e))
    } else {
        TtsError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl TtsEnginePort for DashScopeTtsClient {
    async fn synthesize_stream(&self, request: &SynthesisRequest) -> Result<PcmStream, TtsError> {
        if !self.is_configured() {
            return Err(TtsError::NotConfigured);
        }

        let body = GenerationRequest {
            model: &self.config.model,
            input: GenerationInput {
                text: &request.text,
                voice: &request.voice,
                language_type: map_language(&request.language),
            },
        };

        tracing::debug!(
            url = %self.generation_url(),
            text_len = request.text.len(),
            voice = %request.voice,
            language = %body.input.language_type,
            speed = request.speed,
            "Sending DashScope generation request"
        );

        let response = self
            .client
            .post(self.generation_url())
            .bearer_auth(&self.config.api_key)
            .header("X-DashScope-SSE", "enable")
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GenerationEvent>(&error_text)
                .ok()
                .and_then(|event| event.message)
                .unwrap_or(error_text);
            tracing::error!(status = status.as_u16(), message = %message, "DashScope request rejected");
            return Err(TtsError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(map_request_error))
            .boxed();

        Ok(pcm_stream(body))
    }

    fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }
}

/// 一个完整的 SSE 事件
#[derive(Debug, Default, PartialEq)]
struct SseEvent {
    /// `:HTTP_STATUS/<code>` 注释行给出的状态码
    status: Option<u16>,
    data: String,
}

/// 增量 SSE 解码器：按空行切分事件，容忍跨网络包的半行
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// 喂入新字节，返回其中所有已完整的事件
    fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some((end, sep_len)) = find_event_boundary(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + sep_len).take(end).collect();
            if let Some(event) = parse_event(&String::from_utf8_lossy(&raw)) {
                events.push(event);
            }
        }
        events
    }

    /// 流结束时，剩余未以空行结尾的内容也当作一个事件
    fn finish(&mut self) -> Option<SseEvent> {
        let raw = std::mem::take(&mut self.buffer);
        parse_event(&String::from_utf8_lossy(&raw))
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_event(raw: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut has_content = false;

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(code) = line.strip_prefix(HTTP_STATUS_PREFIX) {
            event.status = code.trim().parse().ok();
            has_content = true;
        } else if let Some(data) = line.strip_prefix("data:") {
            if !event.data.is_empty() {
                event.data.push('\n');
            }
            event.data.push_str(data.strip_prefix(' ').unwrap_or(data));
            has_content = true;
        }
    }

    has_content.then_some(event)
}

/// 把一个 SSE 事件翻译成 PCM 片段
///
/// `Ok(None)` 表示事件不携带音频（如结束事件）
fn decode_event(event: &SseEvent) -> Result<Option<Vec<u8>>, TtsError> {
    let status = event.status.unwrap_or(200);
    let payload: GenerationEvent = if event.data.trim().is_empty() {
        GenerationEvent::default()
    } else {
        serde_json::from_str(&event.data)
            .map_err(|e| TtsError::InvalidResponse(format!("Malformed event payload: {}", e)))?
    };

    let code = payload.code.as_deref().filter(|c| !c.is_empty());
    if status != 200 || code.is_some() {
        let message = payload
            .message
            .or_else(|| code.map(str::to_string))
            .unwrap_or_else(|| "Unknown provider error".to_string());
        return Err(TtsError::Provider {
            status: if status != 200 { status } else { 500 },
            message,
        });
    }

    let data = payload
        .output
        .and_then(|o| o.audio)
        .and_then(|a| a.data)
        .filter(|d| !d.is_empty());

    match data {
        Some(data) => base64::engine::general_purpose::STANDARD
            .decode(data.as_bytes())
            .map(Some)
            .map_err(|e| TtsError::Provider {
                status,
                message: format!("Failed to decode audio fragment: {}", e),
            }),
        None => Ok(None),
    }
}

struct SseState {
    body: BoxStream<'static, Result<Vec<u8>, TtsError>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<Vec<u8>, TtsError>>,
    finished: bool,
}

impl SseState {
    /// 把事件转成待发送的片段；遇到错误即停止后续处理
    fn enqueue(&mut self, events: impl IntoIterator<Item = SseEvent>) {
        for event in events {
            match decode_event(&event) {
                Ok(Some(pcm)) => self.pending.push_back(Ok(pcm)),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "DashScope stream reported an error");
                    self.pending.push_back(Err(e));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// 把 SSE 字节流转换为 PCM 片段流
fn pcm_stream(body: BoxStream<'static, Result<Vec<u8>, TtsError>>) -> PcmStream {
    let state = SseState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.feed(&bytes);
                    state.enqueue(events);
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(e));
                    state.finished = true;
                }
                None => {
                    let tail = state.decoder.finish();
                    state.enqueue(tail);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
