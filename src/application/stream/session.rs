//! Stream Session - 单个流式连接上的请求编排
//!
//! 每个连接一个 [`StreamSession`]，按顺序处理客户端消息：
//! 清理文本 → 分块 → 后台 worker 调用合成服务 → 经有界队列逐片转发 → done/error。
//! 单块请求在 done 之后异步写入缓存，不阻塞转发。

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::messages::{ClientMessage, ServerMessage, SynthesizeMessage};
use crate::application::commands::SynthesisLimits;
use crate::application::ports::{
    AudioCachePort, AudioEncoderPort, NewCacheMetadata, PcmFormat, SynthesisRequest, TtsEnginePort,
};
use crate::domain::{chunk_text, sanitize_text, CacheKey, SessionEvent, SessionState, DEFAULT_MAX_CHUNK_CHARS};
use crate::infrastructure::memory::ConcurrencyGate;

/// 流式接口配置
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// 每块最大字符数
    pub chunk_max_length: usize,
    /// worker → 连接 的片段队列容量
    pub queue_capacity: usize,
    /// 为 true 时依次合成所有分块，否则只合成第一块
    pub synthesize_all_chunks: bool,
    /// 是否把单块请求写入缓存
    pub cache_enabled: bool,
    pub default_voice: String,
    pub default_language: String,
    pub limits: SynthesisLimits,
    pub format: PcmFormat,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_max_length: DEFAULT_MAX_CHUNK_CHARS,
            queue_capacity: 64,
            synthesize_all_chunks: false,
            cache_enabled: true,
            default_voice: "Cherry".to_string(),
            default_language: "en-US".to_string(),
            limits: SynthesisLimits::default(),
            format: PcmFormat::default(),
        }
    }
}

/// 所有流式连接共享的依赖
pub struct StreamContext {
    pub tts_engine: Arc<dyn TtsEnginePort>,
    pub audio_cache: Arc<dyn AudioCachePort>,
    pub encoder: Arc<dyn AudioEncoderPort>,
    pub gate: ConcurrencyGate,
    pub settings: StreamSettings,
}

/// 处理完一条消息后连接是否还可用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Closed,
}

/// worker 发给连接循环的事件
#[derive(Debug)]
enum WorkerEvent {
    Fragment(Vec<u8>),
    Failed(String),
    Finished,
}

/// 一次请求周期的结局
enum Outcome {
    Finished,
    Failed(String),
    Disconnected,
}

/// 通过校验、准备提交的请求
struct PreparedRequest {
    request_id: String,
    /// 清理后的完整文本（缓存 key 基于它）
    text: String,
    voice: String,
    language: String,
    speed: f64,
    chunks: Vec<String>,
    /// 分块时被截断，合成内容少于 `text`
    truncated: bool,
}

impl PreparedRequest {
    /// 只有完整覆盖全文的单块请求才写缓存
    fn cache_eligible(&self) -> bool {
        self.chunks.len() == 1 && !self.truncated
    }
}

/// 单个连接的会话
pub struct StreamSession {
    ctx: Arc<StreamContext>,
    conn_id: String,
    state: SessionState,
    cancel: CancellationToken,
}

impl StreamSession {
    /// `cancel` 绑定连接生命周期，断开时由调用方取消
    pub fn new(ctx: Arc<StreamContext>, conn_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            ctx,
            conn_id: conn_id.into(),
            state: SessionState::Idle,
            cancel,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// 处理一条文本帧
    pub async fn handle_text(&mut self, raw: &str, out: &mpsc::Sender<ServerMessage>) -> Flow {
        if self.state == SessionState::Closed {
            return Flow::Closed;
        }

        match ClientMessage::parse(raw) {
            Ok(ClientMessage::Ping) => {
                self.advance(SessionEvent::Ping);
                self.send(out, ServerMessage::Pong).await
            }
            Ok(ClientMessage::Synthesize(msg)) => self.handle_request(msg, out).await,
            Err(e) => {
                tracing::warn!(conn_id = %self.conn_id, error = %e, "Malformed stream message");
                self.send(out, ServerMessage::error(e.to_string(), "")).await
            }
        }
    }

    /// 连接断开：取消进行中的合成
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.advance(SessionEvent::Disconnected);
    }

    fn advance(&mut self, event: SessionEvent) {
        let current = std::mem::take(&mut self.state);
        self.state = match current.on(event) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(conn_id = %self.conn_id, error = %e, "Unexpected session transition");
                SessionState::Idle
            }
        };
    }

    async fn send(&mut self, out: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> Flow {
        if out.send(message).await.is_err() {
            self.close();
            return Flow::Closed;
        }
        Flow::Continue
    }

    /// 拒绝请求：输出一条 error 并回到 Idle
    async fn reject(&mut self, request_id: String, reason: String, out: &mpsc::Sender<ServerMessage>) -> Flow {
        tracing::info!(conn_id = %self.conn_id, request_id = %request_id, reason = %reason, "Stream request rejected");
        self.advance(SessionEvent::Rejected {
            request_id: request_id.clone(),
            reason: reason.clone(),
        });
        let flow = self.send(out, ServerMessage::error(reason, &request_id)).await;
        if flow == Flow::Continue {
            self.advance(SessionEvent::Reset);
        }
        flow
    }

    fn prepare(&self, msg: SynthesizeMessage) -> Result<PreparedRequest, (String, String)> {
        let settings = &self.ctx.settings;
        let request_id = msg.request_id;

        let text = sanitize_text(&msg.text);
        if text.is_empty() {
            return Err((request_id, "Text cannot be empty".to_string()));
        }

        let speed = msg.speed.unwrap_or(1.0);
        if let Err(e) = settings.limits.check_speed(speed) {
            return Err((request_id, e.to_string()));
        }

        let chunked = chunk_text(&text, settings.chunk_max_length);
        if chunked.is_empty() {
            return Err((request_id, "Text cannot be empty".to_string()));
        }

        Ok(PreparedRequest {
            request_id,
            voice: msg.voice.unwrap_or_else(|| settings.default_voice.clone()),
            language: msg.language.unwrap_or_else(|| settings.default_language.clone()),
            text,
            speed,
            chunks: chunked.chunks,
            truncated: chunked.truncated,
        })
    }

    async fn handle_request(&mut self, msg: SynthesizeMessage, out: &mpsc::Sender<ServerMessage>) -> Flow {
        let request = match self.prepare(msg) {
            Ok(request) => request,
            Err((request_id, reason)) => return self.reject(request_id, reason, out).await,
        };

        let started = std::time::Instant::now();
        let request_id = request.request_id.clone();
        let cache_eligible = request.cache_eligible() && self.ctx.settings.cache_enabled;

        let submitted: Vec<String> = if self.ctx.settings.synthesize_all_chunks {
            request.chunks.clone()
        } else {
            request.chunks.iter().take(1).cloned().collect()
        };

        tracing::info!(
            conn_id = %self.conn_id,
            request_id = %request_id,
            text_len = request.text.chars().count(),
            chunks = request.chunks.len(),
            truncated = request.truncated,
            submitted = submitted.len(),
            voice = %request.voice,
            cache_eligible = cache_eligible,
            "Stream request"
        );

        self.advance(SessionEvent::Submitted {
            request_id: request_id.clone(),
        });

        let requests = submitted
            .into_iter()
            .map(|text| SynthesisRequest {
                text,
                voice: request.voice.clone(),
                language: request.language.clone(),
                speed: request.speed,
            })
            .collect();

        let (tx, mut rx) = mpsc::channel(self.ctx.settings.queue_capacity.max(1));
        let worker_cancel = self.cancel.child_token();
        tokio::spawn(run_worker(
            self.ctx.tts_engine.clone(),
            self.ctx.gate.clone(),
            requests,
            tx,
            worker_cancel.clone(),
        ));

        let sample_rate = self.ctx.settings.format.sample_rate;
        let mut pcm_buffer = cache_eligible.then(Vec::new);

        let outcome = loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Outcome::Disconnected,
                event = rx.recv() => event,
            };

            match event {
                Some(WorkerEvent::Fragment(pcm)) => {
                    self.advance(SessionEvent::Fragment);
                    if let Some(buffer) = pcm_buffer.as_mut() {
                        buffer.extend_from_slice(&pcm);
                    }
                    if out.send(ServerMessage::audio(&pcm, sample_rate, &request_id)).await.is_err() {
                        break Outcome::Disconnected;
                    }
                }
                Some(WorkerEvent::Failed(reason)) => break Outcome::Failed(reason),
                Some(WorkerEvent::Finished) => break Outcome::Finished,
                None => break Outcome::Failed("Synthesis worker stopped unexpectedly".to_string()),
            }
        };

        // worker 在 Finished/Failed 之后自行退出，其余情况需要取消
        worker_cancel.cancel();

        match outcome {
            Outcome::Finished => {
                self.advance(SessionEvent::EndOfStream);
                let flow = self.send(out, ServerMessage::done(&request_id)).await;

                if let Some(pcm) = pcm_buffer.filter(|pcm| !pcm.is_empty()) {
                    self.persist(&request, pcm);
                }

                tracing::info!(
                    conn_id = %self.conn_id,
                    request_id = %request_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Stream request complete"
                );

                if flow == Flow::Continue {
                    self.advance(SessionEvent::Reset);
                }
                flow
            }
            Outcome::Failed(reason) => {
                tracing::error!(
                    conn_id = %self.conn_id,
                    request_id = %request_id,
                    error = %reason,
                    "Stream synthesis failed"
                );
                self.advance(SessionEvent::ProviderFailed {
                    reason: reason.clone(),
                });
                let message = format!("TTS service error: {}", reason);
                let flow = self.send(out, ServerMessage::error(message, &request_id)).await;
                if flow == Flow::Continue {
                    self.advance(SessionEvent::Reset);
                }
                flow
            }
            Outcome::Disconnected => {
                tracing::info!(conn_id = %self.conn_id, request_id = %request_id, "Stream cancelled by disconnect");
                self.close();
                Flow::Closed
            }
        }
    }

    /// 后台写缓存，已存在则跳过；不受连接取消影响
    fn persist(&self, request: &PreparedRequest, pcm: Vec<u8>) {
        let key = CacheKey::derive(&request.text, &request.voice, &request.language, request.speed);
        let metadata = NewCacheMetadata {
            text: request.text.clone(),
            voice: request.voice.clone(),
            language: request.language.clone(),
            speed: request.speed,
        };
        let cache = self.ctx.audio_cache.clone();
        let encoder = self.ctx.encoder.clone();
        let format = self.ctx.settings.format;

        tokio::spawn(async move {
            if cache.exists(&key).await {
                tracing::info!(hash = %key, "Stream audio already cached");
                return;
            }
            let asset = match encoder.encode(&pcm, &format) {
                Ok(asset) => asset,
                Err(e) => {
                    tracing::error!(hash = %key, error = %e, "Failed to encode stream audio");
                    return;
                }
            };
            match cache.save(&key, &asset, Some(metadata)).await {
                Ok(_) => tracing::info!(hash = %key, size_bytes = asset.len(), "Stream audio saved"),
                Err(e) => tracing::error!(hash = %key, error = %e, "Failed to save stream audio"),
            }
        });
    }
}

/// 合成 worker：持有闸门许可，把片段推入有界队列
async fn run_worker(
    engine: Arc<dyn TtsEnginePort>,
    gate: ConcurrencyGate,
    requests: Vec<SynthesisRequest>,
    tx: mpsc::Sender<WorkerEvent>,
    cancel: CancellationToken,
) {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        permit = gate.acquire() => match permit {
            Ok(permit) => permit,
            Err(e) => {
                let _ = tx.send(WorkerEvent::Failed(e.to_string())).await;
                return;
            }
        },
    };

    for request in requests {
        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            started = engine.synthesize_stream(&request) => started,
        };
        let mut stream = match started {
            Ok(stream) => stream,
            Err(e) => {
                let _ = tx.send(WorkerEvent::Failed(e.to_string())).await;
                return;
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(pcm)) => {
                    if tx.send(WorkerEvent::Fragment(pcm)).await.is_err() {
                        return;
                    }
                }
                Some(Err(e)) => {
                    let _ = tx.send(WorkerEvent::Failed(e.to_string())).await;
                    return;
                }
                None => break,
            }
        }
    }

    let _ = tx.send(WorkerEvent::Finished).await;
}
