//! Fanout router: persist first, then deliver to the live recipient set.
//!
//! Every send follows the same sequence: the message is written through the
//! Persistence Gateway, the outbound event is built from the persisted row
//! (its id is the sole idempotency key), the audience is snapshotted from
//! the session registry, and the event is enqueued exactly once per
//! connection. A persistence failure aborts before anything is broadcast;
//! a dead connection in the audience is skipped, never retried.

use std::sync::Arc;

use crate::auth::Identity;
use crate::error::RelayError;
use crate::models::conversation::Conversation;
use crate::models::room::Room;
use crate::store::{ChatStore, StoredMessage};

use super::channel::ChannelRef;
use super::events::ServerEvent;
use super::registry::{ConnectionId, OutboundSender, SessionRegistry};

/// Outcome of one fanout: how many connections accepted the event and how
/// many were already gone when the send happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub missed: usize,
}

pub struct FanoutRouter {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn ChatStore>,
}

impl FanoutRouter {
    pub fn new(registry: Arc<SessionRegistry>, store: Arc<dyn ChatStore>) -> Self {
        Self { registry, store }
    }

    /// Send to the global channel: every live session, the sender included.
    pub async fn send_global(
        &self,
        sender: &Identity,
        content: &str,
    ) -> Result<(StoredMessage, DeliveryReport), RelayError> {
        let stored = self.store.create_message(sender.user_id, content).await?;
        let event = Arc::new(ServerEvent::message_received(&stored, sender, content));
        let targets = self.registry.snapshot_all();
        let report = deliver(ChannelRef::Global, targets, event);
        Ok((stored, report))
    }

    /// Send to a room: every session currently joined to it.
    pub async fn send_room(
        &self,
        sender: &Identity,
        room: &Room,
        content: &str,
    ) -> Result<(StoredMessage, DeliveryReport), RelayError> {
        let stored = self
            .store
            .create_room_message(room.id, sender.user_id, content)
            .await?;
        let event = Arc::new(ServerEvent::room_message_received(
            &stored, sender, content, room.id,
        ));
        let targets = self.registry.snapshot_room(room.id);
        let report = deliver(ChannelRef::Room(room.id), targets, event);
        Ok((stored, report))
    }

    /// Send to a direct conversation: every connection of both participants.
    pub async fn send_direct(
        &self,
        sender: &Identity,
        conversation: &Conversation,
        content: &str,
    ) -> Result<(StoredMessage, DeliveryReport), RelayError> {
        let stored = self
            .store
            .create_direct_message(conversation.id, sender.user_id, content)
            .await?;
        let event = Arc::new(ServerEvent::direct_message_received(
            &stored,
            sender,
            content,
            conversation.id,
        ));
        let targets = self
            .registry
            .snapshot_users(&[conversation.user_a, conversation.user_b]);
        let report = deliver(ChannelRef::Direct(conversation.id), targets, event);
        Ok((stored, report))
    }

    /// Send to a group: every connection of every durable member. The member
    /// list comes from the resolver; this path never reads storage for
    /// membership.
    pub async fn send_group(
        &self,
        sender: &Identity,
        group_id: i64,
        member_ids: &[i64],
        content: &str,
    ) -> Result<(StoredMessage, DeliveryReport), RelayError> {
        let stored = self
            .store
            .create_group_message(group_id, sender.user_id, content)
            .await?;
        let event = Arc::new(ServerEvent::group_message_received(
            &stored, sender, content, group_id,
        ));
        let targets = self.registry.snapshot_users(member_ids);
        let report = deliver(ChannelRef::Group(group_id), targets, event);
        Ok((stored, report))
    }
}

fn deliver(
    channel: ChannelRef,
    targets: Vec<(ConnectionId, OutboundSender)>,
    event: Arc<ServerEvent>,
) -> DeliveryReport {
    let mut delivered = 0;
    let mut missed = 0;
    for (connection_id, sender) in targets {
        if sender.send(event.clone()).is_ok() {
            delivered += 1;
        } else {
            // The connection closed between snapshot and send. Best-effort:
            // skip it, keep going.
            tracing::debug!(%connection_id, ?channel, "recipient gone before delivery");
            missed += 1;
        }
    }
    tracing::debug!(?channel, delivered, missed, "fanout complete");
    DeliveryReport { delivered, missed }
}
