use indexmap::IndexMap;
use serde::Serialize;

use super::message::Message;

/// Bucket for messages that carry no thread-correlation key. Unrelated mail
/// lands in the same conversation, which overstates that thread's volume.
pub const UNTHREADED_KEY: &str = "no-conversation-id";

/// Messages sharing one thread key, oldest first. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    thread_key: String,
    messages: Vec<Message>,
    message_count: usize,
}

impl Conversation {
    /// Build a conversation from messages of one thread, sorting them
    /// chronologically. Ties and undated messages keep their fetch order,
    /// with undated messages first.
    pub fn from_messages(thread_key: impl Into<String>, mut messages: Vec<Message>) -> Option<Self> {
        if messages.is_empty() {
            return None;
        }
        messages.sort_by_key(|m| m.timestamp());
        let message_count = messages.len();
        Some(Self {
            thread_key: thread_key.into(),
            messages,
            message_count,
        })
    }

    pub fn thread_key(&self) -> &str {
        &self.thread_key
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    /// The most recent message of the thread
    pub fn latest(&self) -> &Message {
        // non-empty by construction
        &self.messages[self.messages.len() - 1]
    }

    /// The last `n` messages, oldest first
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

/// Partition messages into conversations by thread key, busiest first.
/// Conversations with equal counts keep the order their key was first seen.
pub fn group_into_conversations(messages: Vec<Message>) -> Vec<Conversation> {
    let mut buckets: IndexMap<String, Vec<Message>> = IndexMap::new();
    for msg in messages {
        let key = msg
            .thread_key
            .clone()
            .unwrap_or_else(|| UNTHREADED_KEY.to_string());
        buckets.entry(key).or_default().push(msg);
    }

    let mut conversations = buckets
        .into_iter()
        .filter_map(|(key, msgs)| Conversation::from_messages(key, msgs))
        .collect::<Vec<_>>();

    // stable, so encounter order breaks ties
    conversations.sort_by(|a, b| b.message_count.cmp(&a.message_count));

    tracing::debug!(
        "Grouped messages into {} conversations",
        conversations.len()
    );

    conversations
}
