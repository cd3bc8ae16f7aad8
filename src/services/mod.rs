//! External collaborators.
//!
//! The hub owns no business data. Authentication, message persistence,
//! conversation membership, contact lists and live-stream state live behind
//! the narrow async traits in this module. Every call carries a
//! [`CallContext`] with an explicit deadline.

use async_trait::async_trait;
use hub_proto::{StoredMessage, StreamEvent, UserId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub mod memory;
pub mod token;

pub use memory::MemoryDirectory;
pub use token::StaticTokenAuthenticator;

/// A collaborator call ran past its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

/// Per-call context. There is no constructor without a deadline.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    deadline: Instant,
}

impl CallContext {
    /// Context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Drive `fut` to completion or fail once the deadline passes.
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<DeadlineExceeded>,
    {
        match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(DeadlineExceeded.into()),
        }
    }
}

/// Collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("service call timed out")]
    Timeout,
}

impl ServiceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unavailable(_) => "service_unavailable",
            Self::Timeout => "service_timeout",
        }
    }
}

impl From<DeadlineExceeded> for ServiceError {
    fn from(_: DeadlineExceeded) -> Self {
        Self::Timeout
    }
}

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("authenticator unavailable: {0}")]
    Unavailable(String),
    #[error("authentication timed out")]
    Timeout,
}

impl From<DeadlineExceeded> for AuthError {
    fn from(_: DeadlineExceeded) -> Self {
        Self::Timeout
    }
}

/// A chat message before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: UserId,
    pub content: String,
    pub attachments: Vec<String>,
}

/// Resolves a bearer token to a user.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn validate(&self, ctx: &CallContext, token: &str) -> Result<UserId, AuthError>;
}

/// Message persistence and conversation membership.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return it with its assigned id.
    async fn create(&self, ctx: &CallContext, message: NewMessage)
    -> Result<StoredMessage, ServiceError>;

    /// Record that `user_id` has read `message_id`.
    async fn mark_read(
        &self,
        ctx: &CallContext,
        message_id: &str,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(), ServiceError>;

    /// Current participants of a conversation.
    async fn participants_of(
        &self,
        ctx: &CallContext,
        conversation_id: &str,
    ) -> Result<Vec<UserId>, ServiceError>;
}

/// Who should hear about a user's presence changes.
#[async_trait]
pub trait ContactsResolver: Send + Sync {
    async fn interested_parties_of(
        &self,
        ctx: &CallContext,
        user_id: &str,
    ) -> Result<Vec<UserId>, ServiceError>;
}

/// Live-stream viewer and interaction state.
#[async_trait]
pub trait LiveStreamStore: Send + Sync {
    async fn viewer_joined(
        &self,
        ctx: &CallContext,
        stream_id: &str,
        user_id: &str,
    ) -> Result<(), ServiceError>;

    async fn viewer_left(
        &self,
        ctx: &CallContext,
        stream_id: &str,
        user_id: &str,
    ) -> Result<(), ServiceError>;

    async fn add_comment(
        &self,
        ctx: &CallContext,
        stream_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<StreamEvent, ServiceError>;

    async fn add_reaction(
        &self,
        ctx: &CallContext,
        stream_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<StreamEvent, ServiceError>;
}

/// The set of collaborators the hub was started with.
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn Authenticator>,
    pub messages: Arc<dyn MessageStore>,
    pub contacts: Arc<dyn ContactsResolver>,
    pub streams: Arc<dyn LiveStreamStore>,
}

impl Collaborators {
    /// Wire every trait to one in-memory directory.
    pub fn in_memory(auth: StaticTokenAuthenticator, directory: Arc<MemoryDirectory>) -> Self {
        Self {
            auth: Arc::new(auth),
            messages: directory.clone(),
            contacts: directory.clone(),
            streams: directory,
        }
    }
}
