//! 流式会话状态机
//!
//! 每个 WebSocket 连接持有一个 [`SessionState`]，一次请求周期为：
//!
//! ```text
//! Idle ─Submitted─▶ AwaitingProvider ─Fragment─▶ Relaying ─EndOfStream─▶ Completed ─Reset─▶ Idle
//!   │                      │                        │
//!   │                      └──────ProviderFailed────┴──▶ Failed ─Reset─▶ Idle
//!   └─Rejected──────────────────────────────────────────▶ Failed
//! ```
//!
//! 任意状态收到 `Disconnected` 都进入终态 `Closed`

use thiserror::Error;

/// 会话状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// 空闲，等待下一条消息
    #[default]
    Idle,
    /// 已提交合成，尚未收到任何音频片段
    AwaitingProvider { request_id: String },
    /// 正在转发音频片段
    Relaying { request_id: String, fragments: usize },
    /// 本次请求成功结束
    Completed { request_id: String, fragments: usize },
    /// 本次请求失败
    Failed { request_id: String, reason: String },
    /// 连接已断开
    Closed,
}

/// 驱动状态变化的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 心跳
    Ping,
    /// 请求通过校验，开始合成
    Submitted { request_id: String },
    /// 请求在合成前被拒绝（如清理后文本为空）
    Rejected { request_id: String, reason: String },
    /// 收到一个音频片段
    Fragment,
    /// 合成结束
    EndOfStream,
    /// 合成失败
    ProviderFailed { reason: String },
    /// 结束一次请求周期，回到空闲
    Reset,
    /// 连接断开
    Disconnected,
}

/// 非法状态转换
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid transition: {event} in state {state}")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: &'static str,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingProvider { .. } => "awaiting_provider",
            SessionState::Relaying { .. } => "relaying",
            SessionState::Completed { .. } => "completed",
            SessionState::Failed { .. } => "failed",
            SessionState::Closed => "closed",
        }
    }

    /// 当前请求 ID（空闲与关闭状态没有）
    pub fn request_id(&self) -> Option<&str> {
        match self {
            SessionState::AwaitingProvider { request_id }
            | SessionState::Relaying { request_id, .. }
            | SessionState::Completed { request_id, .. }
            | SessionState::Failed { request_id, .. } => Some(request_id),
            SessionState::Idle | SessionState::Closed => None,
        }
    }

    /// 是否处于一次请求的进行中（尚未输出 done/error）
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingProvider { .. } | SessionState::Relaying { .. }
        )
    }

    /// 状态转换函数
    pub fn on(self, event: SessionEvent) -> Result<SessionState, InvalidTransition> {
        use SessionEvent as E;
        use SessionState as S;

        let invalid = |state: &S, event: &E| InvalidTransition {
            state: state.name(),
            event: event.name(),
        };

        match (self, event) {
            (_, E::Disconnected) => Ok(S::Closed),

            (S::Idle, E::Ping) => Ok(S::Idle),
            (S::Idle, E::Submitted { request_id }) => Ok(S::AwaitingProvider { request_id }),
            (S::Idle, E::Rejected { request_id, reason }) => Ok(S::Failed { request_id, reason }),

            (S::AwaitingProvider { request_id }, E::Fragment) => Ok(S::Relaying {
                request_id,
                fragments: 1,
            }),
            (S::Relaying { request_id, fragments }, E::Fragment) => Ok(S::Relaying {
                request_id,
                fragments: fragments + 1,
            }),

            (S::AwaitingProvider { request_id }, E::EndOfStream) => Ok(S::Completed {
                request_id,
                fragments: 0,
            }),
            (S::Relaying { request_id, fragments }, E::EndOfStream) => {
                Ok(S::Completed { request_id, fragments })
            }

            (S::AwaitingProvider { request_id }, E::ProviderFailed { reason })
            | (S::Relaying { request_id, .. }, E::ProviderFailed { reason }) => {
                Ok(S::Failed { request_id, reason })
            }

            (S::Completed { .. }, E::Reset) | (S::Failed { .. }, E::Reset) => Ok(S::Idle),

            (state, event) => Err(invalid(&state, &event)),
        }
    }
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Ping => "ping",
            SessionEvent::Submitted { .. } => "submitted",
            SessionEvent::Rejected { .. } => "rejected",
            SessionEvent::Fragment => "fragment",
            SessionEvent::EndOfStream => "end_of_stream",
            SessionEvent::ProviderFailed { .. } => "provider_failed",
            SessionEvent::Reset => "reset",
            SessionEvent::Disconnected => "disconnected",
        }
    }
}
