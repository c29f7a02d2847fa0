//! リアルタイム同期コア
//!
//! 単一の永続接続の上に、プレゼンス・メッセージ・通知・管理者操作の各コンポーネントを構築します。
//!
//! - `connection`: 接続のライフサイクル（acquire / release / 再接続）
//! - `router`: イベントの購読と送信
//! - `presence`: オンライン状態の追跡とハートビート
//! - `messaging`: 会話ルームへの参加とメッセージ操作
//! - `notification`: 通知一覧と未読数の同期
//! - `admin`: 管理者による強制ログアウト
//! - `core`: 上記を束ねるファサード

pub mod admin;
pub mod connection;
pub mod core;
pub mod messaging;
pub mod notification;
pub mod presence;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::AdminOverrideChannel;
pub use connection::{Connection, ConnectionManager};
pub use self::core::{CoreDependencies, RealtimeCore};
pub use messaging::{MessagingChannel, SendOptions};
pub use notification::NotificationSynchronizer;
pub use presence::PresenceTracker;
pub use router::{EventHandler, EventRouter, Handler, Subscription};
