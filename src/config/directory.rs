//! Seed data for the in-memory collaborators.
//!
//! Production deployments put real services behind the collaborator traits;
//! these tables let a standalone hub authenticate users and resolve
//! conversations without any of them.

use serde::Deserialize;
use std::collections::HashMap;

/// Static bearer tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

/// One `[[auth.tokens]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: String,
}

/// Conversations and contact lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub conversations: Vec<ConversationEntry>,
    /// user id → users interested in that user's presence.
    #[serde(default)]
    pub contacts: HashMap<String, Vec<String>>,
}

/// One `[[directory.conversations]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationEntry {
    pub id: String,
    pub participants: Vec<String>,
}
