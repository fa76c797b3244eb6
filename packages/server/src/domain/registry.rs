//! ConnectionRegistry trait 定義
//!
//! 接続中のコネクション集合へのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! ## 不変条件
//!
//! - コネクションが集合に含まれる ⇔ そのハンドラがまだ書き込みを受け付けられる
//! - 全ての操作は任意の数のハンドラから同時に呼ばれても安全

use async_trait::async_trait;

use super::{ConnectionId, DeliveryError, Message, PusherChannel};

/// Outcome of one broadcast.
///
/// Failures are collected rather than returned early so that one broken
/// recipient never cuts delivery to the rest short.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of recipients the message was handed to
    pub delivered: usize,
    /// Recipients whose outbound side had already stopped
    pub failures: Vec<DeliveryError>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Process-wide set of live connections.
///
/// One instance is owned by the server and injected into every handler.
/// ハンドラはこの trait に依存し、具体的な実装には依存しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Add a newly accepted connection together with its outbound channel.
    async fn register(&self, id: ConnectionId, channel: PusherChannel);

    /// Remove a connection.
    ///
    /// Idempotent: returns `false` and changes nothing when `id` is absent.
    async fn unregister(&self, id: &ConnectionId) -> bool;

    /// Deliver `message` to every registered connection except `excluding`.
    async fn broadcast(&self, message: &Message, excluding: &ConnectionId) -> BroadcastReport;

    /// Number of registered connections.
    async fn count(&self) -> usize;

    /// Whether `id` is currently registered.
    async fn contains(&self, id: &ConnectionId) -> bool;
}
