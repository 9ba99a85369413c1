// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 连接处理: 握手 → 问候 → 命令分发 → 清理

use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::protocol::ServerMessage;
use super::session::{SharedDetector, StreamingSession};
use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::input::SourceOpener;

/// 处理一个已完成握手的 WebSocket 连接, 直到对端断开
///
/// 无论以何种方式结束, 会话都会回到 Idle 并释放采集源。
pub async fn handle_connection<S>(
    ws: WebSocketStream<S>,
    opener: Arc<dyn SourceOpener>,
    detector: SharedDetector,
    config: &StreamConfig,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (ws_sink, ws_stream) = ws.split();
    let (tx, rx) = mpsc::channel(config.outbound_capacity.max(1));

    let writer = tokio::spawn(forward_outgoing(ws_sink, rx));

    if tx.send(ServerMessage::info(&config.greeting)).await.is_err() {
        return;
    }

    let mut session = StreamingSession::new(opener, detector, tx, config);
    process_incoming(ws_stream, &mut session).await;

    session.shutdown().await;
    // 最后一个发送端随会话释放, 写任务随之结束
    drop(session);
    if let Err(e) = writer.await {
        error!("❌ 写任务异常退出: {}", e);
    }
}

async fn process_incoming<S>(
    mut ws_stream: SplitStream<WebSocketStream<S>>,
    session: &mut StreamingSession,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match session.handle_message(text.as_str()).await {
                Ok(()) => {}
                Err(Error::ConnectionClosed) => break,
                Err(e) => warn!("⚠️ 处理客户端消息失败: {}", e),
            },
            Ok(Message::Binary(_)) => {
                debug!("binary message ignored");
            }
            Ok(Message::Close(_)) => {
                debug!("close frame received");
                break;
            }
            // 协议层自动回复 ping
            Ok(_) => {}
            Err(e) => {
                debug!("websocket error: {}", e);
                break;
            }
        }
    }
}

/// 出站通道 → WebSocket
async fn forward_outgoing<S>(
    mut ws_sink: SplitSink<WebSocketStream<S>, Message>,
    mut outgoing_rx: mpsc::Receiver<ServerMessage>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg) = outgoing_rx.recv().await {
        match msg.to_json() {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => error!("❌ 消息序列化失败: {}", e),
        }
    }
    let _ = ws_sink.close().await;
}

/// 接受连接并为每个连接启动独立任务
pub async fn serve(
    listener: TcpListener,
    opener: Arc<dyn SourceOpener>,
    detector: SharedDetector,
    config: StreamConfig,
) -> Result<()> {
    info!("🚀 推流服务已启动: ws://{}", listener.local_addr()?);
    let config = Arc::new(config);

    loop {
        let (tcp, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("⚠️ 接受连接失败: {}", e);
                continue;
            }
        };

        let opener = Arc::clone(&opener);
        let detector = Arc::clone(&detector);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            match accept_async(tcp).await {
                Ok(ws) => {
                    info!("🔗 客户端已连接: {}", peer);
                    handle_connection(ws, opener, detector, &config).await;
                    info!("👋 客户端已断开: {}", peer);
                }
                Err(e) => warn!("⚠️ WebSocket 握手失败 {}: {}", peer, e),
            }
        });
    }
}
