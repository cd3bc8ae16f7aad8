//! Config-seeded in-memory collaborators.
//!
//! Development backend for [`MessageStore`], [`ContactsResolver`] and
//! [`LiveStreamStore`]. Nothing here survives a restart.

use super::{
    CallContext, ContactsResolver, LiveStreamStore, MessageStore, NewMessage, ServiceError,
};
use crate::config::DirectoryConfig;
use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use hub_proto::{StoredMessage, StreamEvent, StreamEventKind, UserId};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

#[derive(Default)]
struct Store {
    messages: HashMap<String, StoredMessage>,
    reads: HashMap<String, HashSet<UserId>>,
    viewers: HashMap<String, HashSet<UserId>>,
    stream_events: HashMap<String, Vec<StreamEvent>>,
}

/// In-memory directory of conversations, contacts, messages and streams.
pub struct MemoryDirectory {
    conversations: HashMap<String, Vec<UserId>>,
    contacts: HashMap<UserId, Vec<UserId>>,
    store: Mutex<Store>,
}

impl MemoryDirectory {
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            conversations: config
                .conversations
                .iter()
                .map(|c| (c.id.clone(), c.participants.clone()))
                .collect(),
            contacts: config.contacts.clone(),
            store: Mutex::new(Store::default()),
        }
    }

    /// Users who have read `message_id`.
    #[cfg(test)]
    pub fn readers_of(&self, message_id: &str) -> Vec<UserId> {
        let store = self.store.lock();
        let mut readers: Vec<UserId> = store
            .reads
            .get(message_id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default();
        readers.sort();
        readers
    }

    /// Current viewers of a stream.
    #[cfg(test)]
    pub fn viewers_of(&self, stream_id: &str) -> usize {
        self.store
            .lock()
            .viewers
            .get(stream_id)
            .map_or(0, HashSet::len)
    }

    fn stream_event(
        &self,
        kind: StreamEventKind,
        stream_id: &str,
        user_id: &str,
        content: &str,
    ) -> StreamEvent {
        let event = StreamEvent {
            id: Uuid::new_v4().to_string(),
            stream_id: stream_id.to_string(),
            user_id: user_id.to_string(),
            kind,
            content: content.to_string(),
            created_at: Utc::now().trunc_subsecs(3),
        };
        self.store
            .lock()
            .stream_events
            .entry(stream_id.to_string())
            .or_default()
            .push(event.clone());
        event
    }
}

#[async_trait]
impl MessageStore for MemoryDirectory {
    async fn create(
        &self,
        _ctx: &CallContext,
        message: NewMessage,
    ) -> Result<StoredMessage, ServiceError> {
        if !self.conversations.contains_key(&message.conversation_id) {
            return Err(ServiceError::NotFound(format!(
                "conversation {}",
                message.conversation_id
            )));
        }

        let stored = StoredMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content,
            attachments: message.attachments,
            created_at: Utc::now().trunc_subsecs(3),
        };
        self.store
            .lock()
            .messages
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn mark_read(
        &self,
        _ctx: &CallContext,
        message_id: &str,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(), ServiceError> {
        let mut store = self.store.lock();
        match store.messages.get(message_id) {
            Some(message) if message.conversation_id == conversation_id => {}
            _ => return Err(ServiceError::NotFound(format!("message {message_id}"))),
        }
        store
            .reads
            .entry(message_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        Ok(())
    }

    async fn participants_of(
        &self,
        _ctx: &CallContext,
        conversation_id: &str,
    ) -> Result<Vec<UserId>, ServiceError> {
        self.conversations
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("conversation {conversation_id}")))
    }
}

#[async_trait]
impl ContactsResolver for MemoryDirectory {
    /// Configured contacts plus everyone sharing a conversation with the user.
    async fn interested_parties_of(
        &self,
        _ctx: &CallContext,
        user_id: &str,
    ) -> Result<Vec<UserId>, ServiceError> {
        let mut parties: BTreeSet<UserId> = self
            .contacts
            .get(user_id)
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        for participants in self.conversations.values() {
            if participants.iter().any(|p| p == user_id) {
                parties.extend(participants.iter().cloned());
            }
        }

        parties.remove(user_id);
        Ok(parties.into_iter().collect())
    }
}

#[async_trait]
impl LiveStreamStore for MemoryDirectory {
    async fn viewer_joined(
        &self,
        _ctx: &CallContext,
        stream_id: &str,
        user_id: &str,
    ) -> Result<(), ServiceError> {
        self.store
            .lock()
            .viewers
            .entry(stream_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        Ok(())
    }

    async fn viewer_left(
        &self,
        _ctx: &CallContext,
        stream_id: &str,
        user_id: &str,
    ) -> Result<(), ServiceError> {
        let mut store = self.store.lock();
        if let Some(viewers) = store.viewers.get_mut(stream_id) {
            viewers.remove(user_id);
            if viewers.is_empty() {
                store.viewers.remove(stream_id);
            }
        }
        Ok(())
    }

    async fn add_comment(
        &self,
        _ctx: &CallContext,
        stream_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<StreamEvent, ServiceError> {
        Ok(self.stream_event(StreamEventKind::Comment, stream_id, user_id, content))
    }

    async fn add_reaction(
        &self,
        _ctx: &CallContext,
        stream_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<StreamEvent, ServiceError> {
        Ok(self.stream_event(StreamEventKind::Reaction, stream_id, user_id, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversationEntry;
    use std::time::Duration;

    fn directory() -> MemoryDirectory {
        let mut contacts = HashMap::new();
        contacts.insert("alice".to_string(), vec!["carol".to_string()]);
        MemoryDirectory::from_config(&DirectoryConfig {
            conversations: vec![ConversationEntry {
                id: "c1".to_string(),
                participants: vec!["alice".to_string(), "bob".to_string()],
            }],
            contacts,
        })
    }

    fn ctx() -> CallContext {
        CallContext::with_timeout(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn create_assigns_ids_and_rejects_unknown_conversations() {
        let dir = directory();
        let msg = dir
            .create(
                &ctx(),
                NewMessage {
                    conversation_id: "c1".to_string(),
                    sender_id: "alice".to_string(),
                    content: "hi".to_string(),
                    attachments: vec![],
                },
            )
            .await
            .unwrap();
        assert!(!msg.id.is_empty());
        assert_eq!(msg.sender_id, "alice");

        let err = dir
            .create(
                &ctx(),
                NewMessage {
                    conversation_id: "nope".to_string(),
                    sender_id: "alice".to_string(),
                    content: "hi".to_string(),
                    attachments: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn mark_read_requires_matching_conversation() {
        let dir = directory();
        let msg = dir
            .create(
                &ctx(),
                NewMessage {
                    conversation_id: "c1".to_string(),
                    sender_id: "alice".to_string(),
                    content: "hi".to_string(),
                    attachments: vec![],
                },
            )
            .await
            .unwrap();

        dir.mark_read(&ctx(), &msg.id, "c1", "bob").await.unwrap();
        assert_eq!(dir.readers_of(&msg.id), vec!["bob".to_string()]);
        assert!(dir.mark_read(&ctx(), &msg.id, "c2", "bob").await.is_err());
    }

    #[tokio::test]
    async fn interested_parties_merge_contacts_and_conversations() {
        let dir = directory();
        let parties = dir.interested_parties_of(&ctx(), "alice").await.unwrap();
        assert_eq!(parties, vec!["bob".to_string(), "carol".to_string()]);

        let loner = dir.interested_parties_of(&ctx(), "zed").await.unwrap();
        assert!(loner.is_empty());
    }

    #[tokio::test]
    async fn viewers_are_tracked_per_stream() {
        let dir = directory();
        dir.viewer_joined(&ctx(), "s1", "alice").await.unwrap();
        dir.viewer_joined(&ctx(), "s1", "bob").await.unwrap();
        assert_eq!(dir.viewers_of("s1"), 2);
        dir.viewer_left(&ctx(), "s1", "alice").await.unwrap();
        dir.viewer_left(&ctx(), "s1", "bob").await.unwrap();
        assert_eq!(dir.viewers_of("s1"), 0);

        let reaction = dir.add_reaction(&ctx(), "s1", "alice", "fire").await.unwrap();
        assert_eq!(reaction.kind, StreamEventKind::Reaction);
        assert_eq!(reaction.stream_id, "s1");
    }
}
