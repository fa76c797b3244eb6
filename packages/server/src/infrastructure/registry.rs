//! インメモリの ConnectionRegistry 実装
//!
//! ## 責務
//!
//! - 接続中のコネクションと対応する `PusherChannel` の管理
//! - ブロードキャスト（送信者を除く全員への配信）
//!
//! ## 設計ノート
//!
//! ブロードキャストはロック中に宛先の sender をスナップショットし、
//! ロックを解放してから配信します。配信中に他のハンドラが
//! register / unregister してもイテレーションは影響を受けません。
//!
//! 各 sender には `try_send` で渡すので配信がブロックすることはなく、
//! 実際のソケット書き込みは各コネクションの writer タスクが行います。
//! キューが満杯の宛先（読み込みを止めたピア）にはそのメッセージを配信しません。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use linecast_shared::time::{Clock, SystemClock};
use tokio::sync::{Mutex, mpsc::error::TrySendError};

use crate::domain::{
    BroadcastReport, ConnectionId, ConnectionRegistry, DeliveryError, Message, PusherChannel,
};

/// Registry entry for one live connection
struct RegisteredConnection {
    /// Outbound channel drained by the connection's writer task
    channel: PusherChannel,
    /// Unix timestamp when registered (in JST, milliseconds)
    connected_at: i64,
}

/// `HashMap` + `tokio::sync::Mutex` を使った ConnectionRegistry 実装
///
/// ## 使用例
///
/// ```ignore
/// let registry = Arc::new(InMemoryConnectionRegistry::new());
///
/// registry.register(id, tx).await;
/// registry.broadcast(&Message::from("A: hello"), &id).await;
/// ```
pub struct InMemoryConnectionRegistry {
    /// 接続中のコネクション
    ///
    /// Key: ConnectionId
    /// Value: RegisteredConnection
    connections: Mutex<HashMap<ConnectionId, RegisteredConnection>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryConnectionRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a registry stamping entries with the given clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(&self, id: ConnectionId, channel: PusherChannel) {
        let connected_at = self.clock.now_jst_millis();
        let mut connections = self.connections.lock().await;
        connections.insert(
            id,
            RegisteredConnection {
                channel,
                connected_at,
            },
        );
        tracing::debug!(
            connection_id = %id.short(),
            registered = connections.len(),
            "Connection registered"
        );
    }

    async fn unregister(&self, id: &ConnectionId) -> bool {
        let removed = {
            let mut connections = self.connections.lock().await;
            connections.remove(id).map(|entry| (entry, connections.len()))
        };

        match removed {
            Some((entry, remaining)) => {
                let session_millis = self.clock.now_jst_millis() - entry.connected_at;
                tracing::debug!(
                    connection_id = %id.short(),
                    remaining,
                    session_millis,
                    "Connection unregistered"
                );
                true
            }
            None => {
                tracing::debug!(
                    connection_id = %id.short(),
                    "Connection already unregistered, nothing to do"
                );
                false
            }
        }
    }

    async fn broadcast(&self, message: &Message, excluding: &ConnectionId) -> BroadcastReport {
        // スナップショットを取ってからロックを解放する
        let targets: Vec<(ConnectionId, PusherChannel)> = {
            let connections = self.connections.lock().await;
            connections
                .iter()
                .filter(|(id, _)| *id != excluding)
                .map(|(id, entry)| (*id, entry.channel.clone()))
                .collect()
        };

        let mut report = BroadcastReport::default();
        for (id, channel) in targets {
            // ブロードキャストでは一部の送信失敗を許容
            match channel.try_send(message.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    tracing::trace!(connection_id = %id.short(), "Delivered message");
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection_id = %id.short(),
                        "Failed to push message, recipient is not reading"
                    );
                    report.failures.push(DeliveryError::RecipientBacklogged(id));
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!(
                        connection_id = %id.short(),
                        "Failed to push message, recipient is closing"
                    );
                    report.failures.push(DeliveryError::RecipientClosed(id));
                }
            }
        }

        report
    }

    async fn count(&self) -> usize {
        self.connections.lock().await.len()
    }

    async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.lock().await.contains_key(id)
    }
}
