//! `Transport` の実装
//!
//! ## 実装
//!
//! - `websocket`: tokio-tungstenite を使った実装
//! - `memory`: プロセス内チャンネルを使った実装（テスト・デモ用）

pub mod memory;
pub mod websocket;

pub use memory::{MemoryPeer, MemoryServer, MemoryTransport};
pub use websocket::WebSocketTransport;
