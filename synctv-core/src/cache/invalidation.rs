//! Cache invalidation service for multi-replica deployments
//!
//! Uses Redis Pub/Sub to broadcast cache invalidation messages across all nodes.
//! When one node invalidates a cache entry, all other nodes receive the message
//! and invalidate their local L1 caches accordingly.

use futures::StreamExt;
use redis::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::models::RoomId;
use crate::{Error, Result};

/// Redis channel name for cache invalidation messages
pub const CACHE_INVALIDATION_CHANNEL: &str = "synctv:cache:invalidation";

/// Cache invalidation message types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvalidationMessage {
    /// Invalidate permission cache for a specific user in a room
    UserPermission {
        room_id: String,
        user_id: String,
    },
    /// Invalidate permission cache for all users in a room
    RoomPermission {
        room_id: String,
    },
    /// Invalidate user cache
    User {
        user_id: String,
    },
    /// Invalidate room cache
    Room {
        room_id: String,
    },
    /// Invalidate all caches
    All,
}

/// Service for broadcasting and receiving cache invalidation messages
pub struct CacheInvalidationService {
    /// Redis client for pub/sub
    redis_client: Option<Client>,
    /// Local broadcast sender for invalidation events
    local_sender: broadcast::Sender<InvalidationMessage>,
    /// Node identifier for logging
    node_id: String,
    /// Shutdown flag
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl Clone for CacheInvalidationService {
    fn clone(&self) -> Self {
        Self {
            redis_client: self.redis_client.clone(),
            local_sender: self.local_sender.clone(),
            node_id: self.node_id.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl CacheInvalidationService {
    /// Create a new cache invalidation service
    ///
    /// # Arguments
    /// * `redis_client` - Optional Redis client. If None, only local invalidation is used.
    /// * `node_id` - Unique identifier for this node (for logging)
    pub fn new(redis_client: Option<Client>, node_id: String) -> Self {
        let (local_sender, _) = broadcast::channel(1024);

        Self {
            redis_client,
            local_sender,
            node_id,
            shutdown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Start listening for cache invalidation messages from Redis
    ///
    /// This spawns a background task that subscribes to the invalidation channel.
    /// When a message is received, it's broadcast locally to all cache instances.
    pub async fn start(&self) -> Result<()> {
        let Some(client) = self.redis_client.clone() else {
            info!("Redis not configured, cache invalidation is local-only");
            return Ok(());
        };

        let local_sender = self.local_sender.clone();
        let node_id = self.node_id.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                if shutdown.load(std::sync::atomic::Ordering::Relaxed) {
                    debug!("Cache invalidation listener shutting down");
                    break;
                }

                match Self::run_subscriber(&client, &local_sender, &node_id, shutdown.clone()).await {
                    Ok(()) => {
                        // Normal shutdown
                        break;
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            "Cache invalidation subscriber error, reconnecting in 5 seconds..."
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
            info!("Cache invalidation listener stopped");
        });

        Ok(())
    }

    /// Run the Redis subscriber loop
    async fn run_subscriber(
        client: &Client,
        local_sender: &broadcast::Sender<InvalidationMessage>,
        node_id: &str,
        shutdown: Arc<std::sync::atomic::AtomicBool>,
    ) -> Result<()> {
        // Get async pubsub connection
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::Internal(format!("Failed to get Redis Pub/Sub connection: {e}")))?;

        // Subscribe to the invalidation channel
        pubsub
            .subscribe(CACHE_INVALIDATION_CHANNEL)
            .await
            .map_err(|e| Error::Internal(format!("Failed to subscribe: {e}")))?;

        info!(
            node_id = %node_id,
            channel = %CACHE_INVALIDATION_CHANNEL,
            "Subscribed to cache invalidation channel"
        );

        // Process incoming messages
        let mut message_stream = pubsub.on_message();

        loop {
            if shutdown.load(std::sync::atomic::Ordering::Relaxed) {
                break;
            }

            // Use timeout to periodically check shutdown flag
            match tokio::time::timeout(
                std::time::Duration::from_secs(1),
                message_stream.next(),
            ).await {
                Ok(Some(msg)) => {
                    // Get the payload as string
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "Invalid payload in cache invalidation message");
                            continue;
                        }
                    };

                    match serde_json::from_str::<InvalidationMessage>(&payload) {
                        Ok(invalidation) => {
                            debug!(
                                node_id = %node_id,
                                ?invalidation,
                                "Received cache invalidation message"
                            );

                            // Broadcast locally
                            if let Err(e) = local_sender.send(invalidation) {
                                warn!(
                                    error = %e,
                                    "Failed to broadcast invalidation locally"
                                );
                            }
                        }
                        Err(e) => {
                            warn!(
                                error = %e,
                                json = %payload,
                                "Failed to parse invalidation message"
                            );
                        }
                    }
                }
                Ok(None) => {
                    // Stream ended
                    info!("Redis Pub/Sub stream ended, reconnecting...");
                    return Err(Error::Internal("Redis Pub/Sub stream ended".to_string()));
                }
                Err(_) => {
                    // Timeout, check shutdown flag and continue
                    continue;
                }
            }
        }

        Ok(())
    }

    /// Stop the cache invalidation service
    pub fn stop(&self) {
        self.shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    /// Subscribe to local cache invalidation events
    ///
    /// Returns a receiver that will receive invalidation messages from all nodes.
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationMessage> {
        self.local_sender.subscribe()
    }

    /// Broadcast a cache invalidation message to all OTHER nodes (remote only)
    ///
    /// This sends the message via Redis Pub/Sub (if configured).
    /// Note: This does NOT broadcast locally, as the caller is expected to
    /// invalidate its own local cache after calling this method.
    ///
    /// For local-only invalidation (when Redis is not configured), this is a no-op.
    pub async fn broadcast_remote(&self, message: InvalidationMessage) -> Result<()> {
        // Broadcast via Redis if available
        if let Some(ref client) = self.redis_client {
            let json = serde_json::to_string(&message).map_err(|e| {
                Error::Internal(format!("Failed to serialize invalidation message: {e}"))
            })?;

            let mut conn = client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| Error::Internal(format!("Redis connection failed: {e}")))?;

            redis::AsyncCommands::publish::<_, _, ()>(
                &mut conn,
                CACHE_INVALIDATION_CHANNEL,
                json,
            )
            .await
            .map_err(|e| Error::Internal(format!("Failed to publish invalidation: {e}")))?;

            debug!(
                node_id = %self.node_id,
                ?message,
                "Published cache invalidation message"
            );
        }

        Ok(())
    }

    /// Broadcast a cache invalidation message to ALL nodes including this one
    ///
    /// This sends the message via Redis Pub/Sub (if configured) and also
    /// broadcasts locally via the local channel.
    /// Use this when you want all nodes (including this one) to invalidate
    /// their caches via the subscription mechanism.
    pub async fn broadcast_all(&self, message: InvalidationMessage) -> Result<()> {
        // Broadcast locally first
        if let Err(e) = self.local_sender.send(message.clone()) {
            warn!(error = %e, "Failed to broadcast invalidation locally");
        }

        // Then broadcast via Redis
        self.broadcast_remote(message).await
    }

    /// Invalidate permission cache for a specific user in a room
    pub async fn invalidate_user_permission(
        &self,
        room_id: &RoomId,
        user_id: &crate::models::UserId,
    ) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::UserPermission {
            room_id: room_id.as_str().to_string(),
            user_id: user_id.as_str().to_string(),
        }).await
    }

    /// Invalidate permission cache for all users in a room
    pub async fn invalidate_room_permission(&self, room_id: &RoomId) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::RoomPermission {
            room_id: room_id.as_str().to_string(),
        }).await
    }

    /// Invalidate user cache
    pub async fn invalidate_user(&self, user_id: &crate::models::UserId) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::User {
            user_id: user_id.as_str().to_string(),
        }).await
    }

    /// Invalidate room cache
    pub async fn invalidate_room(&self, room_id: &RoomId) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::Room {
            room_id: room_id.as_str().to_string(),
        }).await
    }

    /// Invalidate all caches
    pub async fn invalidate_all(&self) -> Result<()> {
        self.broadcast_remote(InvalidationMessage::All).await
    }
}

impl std::fmt::Debug for CacheInvalidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInvalidationService")
            .field("redis_enabled", &self.redis_client.is_some())
            .field("node_id", &self.node_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidation_message_serialization() {
        let msg = InvalidationMessage::UserPermission {
            room_id: "room123".to_string(),
            user_id: "user456".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("user_permission"));

        let decoded: InvalidationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_room_permission_message() {
        let msg = InvalidationMessage::RoomPermission {
            room_id: "room123".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        let decoded: InvalidationMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, decoded);
    }

    #[tokio::test]
    async fn test_local_broadcast() {
        let service = CacheInvalidationService::new(None, "test-node".to_string());
        let mut receiver = service.subscribe();

        let msg = InvalidationMessage::User {
            user_id: "user123".to_string(),
        };

        // broadcast_all sends to local + Redis; broadcast only sends to Redis
        service.broadcast_all(msg.clone()).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(msg, received);
    }

    #[tokio::test]
    async fn test_broadcast_without_redis_is_noop() {
        let service = CacheInvalidationService::new(None, "test-node".to_string());

        // broadcast_remote() without Redis should be a no-op (no local broadcast)
        let msg = InvalidationMessage::All;
        service.broadcast_remote(msg).await.unwrap();
    }
}
