//! Chat delivery pipeline: validate → authorize → persist → fan out.
//!
//! Nothing is fanned out unless the store accepted the message.

use super::Context;
use crate::error::{HandlerError, HandlerResult};
use crate::services::NewMessage;
use crate::state::DeliveryReport;
use hub_proto::{
    ChatMessage, DeliveryStatus, OutboundEvent, Payload, ReadReceipt, UserId, validate_identifier,
};
use tracing::debug;

pub async fn handle_message(ctx: &Context<'_>, msg: ChatMessage) -> HandlerResult {
    validate_identifier("conversation_id", &msg.conversation_id)?;
    for attachment in &msg.attachments {
        validate_identifier("attachment", attachment)?;
    }
    if let Some(draft) = &msg.client_message_id {
        validate_identifier("client_message_id", draft)?;
    }
    if msg.content.trim().is_empty() && msg.attachments.is_empty() {
        return Err(HandlerError::EmptyMessage);
    }
    let max = ctx.hub.limits.max_message_length;
    if msg.content.chars().count() > max {
        return Err(HandlerError::MessageTooLong { max });
    }

    let participants = authorize(ctx, &msg.conversation_id).await?;

    let messages = &ctx.hub.services.messages;
    let stored = ctx
        .call
        .run(messages.create(
            &ctx.call,
            NewMessage {
                conversation_id: msg.conversation_id.clone(),
                sender_id: ctx.user_id().to_string(),
                content: msg.content,
                attachments: msg.attachments,
            },
        ))
        .await?;

    let event = OutboundEvent::ChatMessage {
        message: stored.clone(),
        sender_id: ctx.user_id().to_string(),
        timestamp: ctx.hub.server_time(),
    };
    let recipients = participants.iter().filter(|p| p.as_str() != ctx.user_id());
    let delivered = ctx
        .hub
        .broadcast_to_users(recipients, &Payload::from(&event));

    ctx.hub.push_delivery_status(
        ctx.user_id(),
        DeliveryReport {
            message_id: stored.id.clone(),
            conversation_id: stored.conversation_id.clone(),
            status: DeliveryStatus::Sent,
            client_message_id: msg.client_message_id,
            message: Some(stored),
        },
    );

    debug!(conversation = %msg.conversation_id, delivered, "Chat message fanned out");
    Ok(())
}

pub async fn handle_read_receipt(ctx: &Context<'_>, receipt: ReadReceipt) -> HandlerResult {
    validate_identifier("conversation_id", &receipt.conversation_id)?;
    validate_identifier("message_id", &receipt.message_id)?;

    let participants = authorize(ctx, &receipt.conversation_id).await?;

    let messages = &ctx.hub.services.messages;
    ctx.call
        .run(messages.mark_read(
            &ctx.call,
            &receipt.message_id,
            &receipt.conversation_id,
            ctx.user_id(),
        ))
        .await?;

    let event = OutboundEvent::ReadReceipt {
        conversation_id: receipt.conversation_id,
        message_id: receipt.message_id,
        user_id: ctx.user_id().to_string(),
        timestamp: ctx.hub.server_time(),
    };
    ctx.hub.broadcast_to_users(&participants, &Payload::from(&event));
    Ok(())
}

/// Participants of `conversation_id`, provided the sender is one of them.
pub(super) async fn authorize(
    ctx: &Context<'_>,
    conversation_id: &str,
) -> Result<Vec<UserId>, HandlerError> {
    let messages = &ctx.hub.services.messages;
    let participants = ctx
        .call
        .run(messages.participants_of(&ctx.call, conversation_id))
        .await?;

    if participants.iter().any(|p| p == ctx.user_id()) {
        Ok(participants)
    } else {
        Err(HandlerError::NotParticipant(conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::route;
    use super::*;
    use crate::config::LimitsConfig;
    use crate::services::{CallContext, Collaborators, MessageStore, ServiceError};
    use crate::state::test_support::{
        connect, drain_types, next_of_type, test_hub, test_hub_with, test_services,
    };
    use async_trait::async_trait;
    use hub_proto::StoredMessage;
    use std::sync::Arc;

    /// Knows the participants of every conversation but cannot persist.
    struct BrokenStore;

    #[async_trait]
    impl MessageStore for BrokenStore {
        async fn create(
            &self,
            _ctx: &CallContext,
            _message: NewMessage,
        ) -> Result<StoredMessage, ServiceError> {
            Err(ServiceError::Unavailable("store offline".to_string()))
        }

        async fn mark_read(
            &self,
            _ctx: &CallContext,
            _message_id: &str,
            _conversation_id: &str,
            _user_id: &str,
        ) -> Result<(), ServiceError> {
            Err(ServiceError::Unavailable("store offline".to_string()))
        }

        async fn participants_of(
            &self,
            _ctx: &CallContext,
            _conversation_id: &str,
        ) -> Result<Vec<UserId>, ServiceError> {
            Ok(vec!["alice".to_string(), "bob".to_string()])
        }
    }

    #[tokio::test]
    async fn message_reaches_recipient_and_sender_gets_one_status() {
        let hub = test_hub(LimitsConfig::default());
        let (alice, mut alice_rx) = connect(&hub, "alice").await;
        let (_bob, mut bob_rx) = connect(&hub, "bob").await;

        let ctx = Context::new(&hub, &alice);
        route(
            &ctx,
            r#"{"type":"chat_message","conversation_id":"c1","content":"hi","client_message_id":"draft-1"}"#,
        )
        .await;

        let event = next_of_type(&mut bob_rx, "chat_message").await;
        assert_eq!(event["sender_id"], "alice");
        assert_eq!(event["message"]["content"], "hi");
        assert!(event["timestamp"].is_string());

        let status = next_of_type(&mut alice_rx, "message_status").await;
        assert_eq!(status["status"], "sent");
        assert_eq!(status["client_message_id"], "draft-1");
        assert_eq!(status["message_id"], event["message"]["id"]);

        let rest = drain_types(&mut alice_rx).await;
        assert!(!rest.contains(&"message_status".to_string()));
        assert!(!rest.contains(&"chat_message".to_string()));
        assert!(!drain_types(&mut bob_rx).await.contains(&"message_status".to_string()));
    }

    #[tokio::test]
    async fn store_failure_means_no_fan_out() {
        let services = Collaborators {
            messages: Arc::new(BrokenStore),
            ..test_services()
        };
        let hub = test_hub_with(LimitsConfig::default(), services);
        let (alice, mut alice_rx) = connect(&hub, "alice").await;
        let (_bob, mut bob_rx) = connect(&hub, "bob").await;

        let ctx = Context::new(&hub, &alice);
        route(
            &ctx,
            r#"{"type":"chat_message","conversation_id":"c1","content":"hi"}"#,
        )
        .await;

        let error = next_of_type(&mut alice_rx, "error").await;
        assert_eq!(error["code"], "service_unavailable");
        assert!(!drain_types(&mut bob_rx).await.contains(&"chat_message".to_string()));
        assert!(!drain_types(&mut alice_rx).await.contains(&"message_status".to_string()));
    }

    #[tokio::test]
    async fn outsiders_and_empty_messages_are_rejected() {
        let hub = test_hub(LimitsConfig::default());
        let (dave, mut dave_rx) = connect(&hub, "dave").await;
        let ctx = Context::new(&hub, &dave);

        route(
            &ctx,
            r#"{"type":"chat_message","conversation_id":"c1","content":"let me in"}"#,
        )
        .await;
        assert_eq!(next_of_type(&mut dave_rx, "error").await["code"], "not_participant");

        route(
            &ctx,
            r#"{"type":"chat_message","conversation_id":"c1","content":"   "}"#,
        )
        .await;
        assert_eq!(next_of_type(&mut dave_rx, "error").await["code"], "empty_message");

        route(
            &ctx,
            r#"{"type":"chat_message","conversation_id":"bad id","content":"x"}"#,
        )
        .await;
        assert_eq!(next_of_type(&mut dave_rx, "error").await["code"], "invalid_identifier");
    }

    #[tokio::test]
    async fn overlong_message_is_rejected() {
        let limits = LimitsConfig {
            max_message_length: 4,
            ..LimitsConfig::default()
        };
        let hub = test_hub(limits);
        let (alice, mut alice_rx) = connect(&hub, "alice").await;
        let ctx = Context::new(&hub, &alice);

        route(
            &ctx,
            r#"{"type":"chat_message","conversation_id":"c1","content":"hello"}"#,
        )
        .await;
        assert_eq!(next_of_type(&mut alice_rx, "error").await["code"], "message_too_long");
    }

    #[tokio::test]
    async fn read_receipt_reaches_all_participants() {
        let hub = test_hub(LimitsConfig::default());
        let (alice, mut alice_rx) = connect(&hub, "alice").await;
        let (bob, mut bob_rx) = connect(&hub, "bob").await;

        let alice_ctx = Context::new(&hub, &alice);
        route(
            &alice_ctx,
            r#"{"type":"chat_message","conversation_id":"c1","content":"read me"}"#,
        )
        .await;
        let message = next_of_type(&mut bob_rx, "chat_message").await;
        let message_id = message["message"]["id"].as_str().unwrap().to_string();

        let bob_ctx = Context::new(&hub, &bob);
        route(
            &bob_ctx,
            &format!(
                r#"{{"type":"read_receipt","conversation_id":"c1","message_id":"{message_id}"}}"#
            ),
        )
        .await;

        for rx in [&mut alice_rx, &mut bob_rx] {
            let receipt = next_of_type(rx, "read_receipt").await;
            assert_eq!(receipt["user_id"], "bob");
            assert_eq!(receipt["message_id"], message_id.as_str());
        }
    }
}
