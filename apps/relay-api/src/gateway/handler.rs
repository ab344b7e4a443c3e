//! Inbound event dispatch for an authenticated gateway connection.

use std::sync::Arc;

use crate::auth::Identity;
use crate::error::RelayError;
use crate::AppState;

use super::events::{ClientEvent, ConversationUpdatedPayload, ServerEvent};

/// Maximum accepted message length after trimming.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Trim and bound message content.
pub fn validate_content(raw: &str) -> Result<&str, RelayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RelayError::validation("Message content is required"));
    }
    if trimmed.len() > MAX_MESSAGE_LEN {
        return Err(RelayError::validation(format!(
            "Message content must be {MAX_MESSAGE_LEN} characters or fewer"
        )));
    }
    Ok(trimmed)
}

/// Apply one client event. Errors are returned to the caller, which reports
/// them to the originating connection only.
pub async fn dispatch(
    state: &AppState,
    connection_id: &str,
    identity: &Identity,
    event: ClientEvent,
) -> Result<(), RelayError> {
    match event {
        ClientEvent::Connect(_) => Err(RelayError::validation("Already connected")),

        ClientEvent::RoomCreate(name) => {
            let (room, created) = state.channels.resolve_or_create_room(&name).await?;
            let event = Arc::new(ServerEvent::RoomCreated(room));
            if created {
                state.registry.broadcast(event);
            } else if let Some(sender) = state.registry.sender_of(connection_id) {
                // Raced or repeated create: the caller still learns which
                // room their name resolved to, nobody else is re-notified.
                let _ = sender.send(event);
            }
            Ok(())
        }

        ClientEvent::RoomJoin(name) => {
            let room = state.channels.resolve_room(&name).await?;
            state
                .membership
                .join_room(connection_id, &identity.username, &room)
        }

        ClientEvent::MessageSend(content) => {
            let content = validate_content(&content)?;
            state.fanout.send_global(identity, content).await?;
            Ok(())
        }

        ClientEvent::RoomMessageSend(payload) => {
            let content = validate_content(&payload.content)?;
            let room = state.channels.resolve_room(&payload.room_name).await?;
            state.fanout.send_room(identity, &room, content).await?;
            Ok(())
        }

        ClientEvent::DirectMessageSend(payload) => {
            let content = validate_content(&payload.content)?;
            let conversation = state
                .channels
                .resolve_or_create_direct(identity.user_id, payload.recipient_id)
                .await?;
            state
                .fanout
                .send_direct(identity, &conversation, content)
                .await?;

            // Participants refresh their conversation lists off this.
            let update = Arc::new(ServerEvent::ConversationUpdated(
                ConversationUpdatedPayload {
                    conversation_id: conversation.id,
                },
            ));
            for (_, sender) in state
                .registry
                .snapshot_users(&[conversation.user_a, conversation.user_b])
            {
                let _ = sender.send(update.clone());
            }
            Ok(())
        }

        ClientEvent::GroupMessageSend(payload) => {
            let content = validate_content(&payload.content)?;
            let members = state
                .channels
                .resolve_group(payload.group_id, identity.user_id)
                .await?;
            state
                .fanout
                .send_group(identity, payload.group_id, &members, content)
                .await?;
            Ok(())
        }

        ClientEvent::GroupJoin(group_id) => {
            state
                .membership
                .join_group_channel(connection_id, identity.user_id, group_id)
                .await
        }
    }
}
