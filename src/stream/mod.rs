// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// WebSocket 推流 (Streaming)
///
/// 每个连接三个任务:
/// - 分发任务: 解析客户端命令, 唯一修改会话状态的地方
/// - 推流任务: 读帧 → 检测 → 渲染 → 发送
/// - 写任务:   独占 WebSocket 发送端, 消费出站通道
pub mod connection;
pub mod protocol;
pub mod renderer;
pub mod session;

pub use connection::{handle_connection, serve};
pub use protocol::{ClientCommand, ServerMessage};
pub use session::{SessionState, SharedDetector, StreamingSession};
