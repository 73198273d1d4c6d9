// Module: sync

pub mod cluster_manager;
pub mod connection_manager;
pub mod dedup;
pub mod events;
pub mod redis_pubsub;
pub mod room_hub;

pub use cluster_manager::{BroadcastResult, ClusterConfig, ClusterManager, ClusterMetrics};
pub use connection_manager::{
    ConnectionInfo, ConnectionLimits, ConnectionManager, ConnectionMetrics, DisconnectSignal,
};
pub use dedup::{DedupKey, MessageDeduplicator};
pub use events::{ClusterEvent, NotificationLevel};
pub use redis_pubsub::{PublishRequest, RedisPubSub};
pub use room_hub::{ConnectionId, MessageSender, RoomMessageHub, Subscriber};
