//! WebSocket Handler - 流式合成
//!
//! 每个连接三个任务：
//! - 读帧任务：持续读取 socket，文本帧排进入站队列，对端关闭或出错时取消连接
//! - 会话任务：按顺序把入站文本交给 [`StreamSession`]
//! - 转发任务：把会话输出序列化后写回 socket
//!
//! 会话在等待闸门或合成时，读帧任务仍在运行，断开能立即传到 worker。

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::{Flow, ServerMessage, StreamSession};
use crate::infrastructure::http::state::AppState;

/// 出站消息队列容量
const OUTBOUND_CAPACITY: usize = 64;

/// 入站文本帧队列容量
const INBOUND_CAPACITY: usize = 32;

/// `GET /ws/tts` 流式合成连接
pub async fn tts_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_tts_socket(socket, state))
}

async fn handle_tts_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = Uuid::new_v4().to_string();
    let (mut sender, receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(INBOUND_CAPACITY);
    let cancel = CancellationToken::new();

    tracing::info!(conn_id = %conn_id, "Stream WebSocket connected");

    // 出站转发任务：发送失败说明对端已断开
    let forward_cancel = cancel.clone();
    let conn_id_for_forward = conn_id.clone();
    let mut forward_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let msg = match message.to_json() {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize stream message");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(
                    conn_id = %conn_id_for_forward,
                    error = %e,
                    "Failed to send WebSocket message"
                );
                break;
            }
        }
        forward_cancel.cancel();
    });

    let reader_task = tokio::spawn(read_frames(
        receiver,
        inbound_tx,
        cancel.clone(),
        conn_id.clone(),
    ));

    let session = StreamSession::new(state.stream_context.clone(), conn_id.clone(), cancel.clone());
    let mut session_task = tokio::spawn(drive_session(session, inbound_rx, out_tx, cancel.clone()));

    tokio::select! {
        _ = &mut forward_task => {}
        _ = &mut session_task => {}
    }

    // 停止该连接上仍在运行的合成 worker
    cancel.cancel();
    reader_task.abort();
    forward_task.abort();
    session_task.abort();
    tracing::info!(conn_id = %conn_id, "Stream WebSocket disconnected");
}

/// 读取客户端帧直到连接结束
///
/// 结束时总会取消 `cancel`，包括 Close 帧、读错误和流结束。
async fn read_frames<S>(
    mut frames: S,
    inbound: mpsc::Sender<String>,
    cancel: CancellationToken,
    conn_id: String,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                // 队列满时背压，但仍然响应取消
                let queued = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    queued = inbound.send(text) => queued,
                };
                if queued.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                // 自动响应 pong（由 axum 处理）
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!(conn_id = %conn_id, "Ignoring binary frame");
            }
            Some(Ok(Message::Close(_))) => {
                tracing::info!(conn_id = %conn_id, "WebSocket closed by client");
                break;
            }
            Some(Err(e)) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
            None => break,
        }
    }
    cancel.cancel();
}

/// 按到达顺序处理入站文本，连接取消或会话关闭时退出
async fn drive_session(
    mut session: StreamSession,
    mut inbound: mpsc::Receiver<String>,
    out: mpsc::Sender<ServerMessage>,
    cancel: CancellationToken,
) -> StreamSession {
    loop {
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            text = inbound.recv() => match text {
                Some(text) => text,
                None => break,
            },
        };

        if session.handle_text(&text, &out).await == Flow::Closed {
            break;
        }
    }
    session.close();
    session
}
