//! Chat replies and per-user history.

use crate::dto::{ChatReply, ChatRequest, Link};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use trellis_middleware::envelope::timestamp;

/// Replies kept per user; older ones are dropped first.
pub const HISTORY_LIMIT: usize = 50;

/// Produces canned replies and remembers the latest ones per user.
#[derive(Debug, Default)]
pub struct ChatService {
    history: RwLock<HashMap<String, VecDeque<ChatReply>>>,
}

impl ChatService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies to `request` and records the exchange under `owner`.
    ///
    /// Guest replies (`owner` is `None`) are not recorded.
    pub fn reply(&self, owner: Option<&str>, request: &ChatRequest) -> ChatReply {
        let reply = ChatReply {
            context_id: request.context_id.clone(),
            date_time: timestamp(),
            question: request.message.clone(),
            reply_message: format!("Thanks for your message about \"{}\".", request.message),
            links: vec![Link {
                title: "Help Center".to_string(),
                url: "https://example.com/help".to_string(),
            }],
        };

        if let Some(owner) = owner {
            let mut history = self.history.write();
            let entries = history.entry(owner.to_string()).or_default();
            if entries.len() == HISTORY_LIMIT {
                entries.pop_front();
            }
            entries.push_back(reply.clone());
        }
        reply
    }

    /// Returns the number of users with recorded history.
    #[must_use]
    pub fn users(&self) -> usize {
        self.history.read().len()
    }

    /// Returns every reply recorded under `owner`, oldest first.
    #[must_use]
    pub fn history(&self, owner: &str) -> Vec<ChatReply> {
        self.history
            .read()
            .get(owner)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(context: &str, message: &str) -> ChatRequest {
        ChatRequest {
            context_id: context.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_history_is_per_owner() {
        let chat = ChatService::new();
        chat.reply(Some("a@b.com"), &ask("c-1", "first"));
        chat.reply(Some("a@b.com"), &ask("c-1", "second"));
        chat.reply(Some("c@d.com"), &ask("c-2", "other"));

        let history = chat.history("a@b.com");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "first");
        assert_eq!(history[1].question, "second");
        assert_eq!(chat.history("c@d.com").len(), 1);
        assert!(chat.history("nobody").is_empty());
    }

    #[test]
    fn test_guest_replies_are_not_kept() {
        let chat = ChatService::new();
        for i in 0..10 {
            let reply = chat.reply(None, &ask("g-1", &format!("hello {i}")));
            assert_eq!(reply.question, format!("hello {i}"));
        }
        assert_eq!(chat.users(), 0);
    }

    #[test]
    fn test_history_is_capped() {
        let chat = ChatService::new();
        for i in 0..HISTORY_LIMIT + 5 {
            chat.reply(Some("a@b.com"), &ask("c-1", &format!("m{i}")));
        }

        let history = chat.history("a@b.com");
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].question, "m5");
        assert_eq!(
            history[HISTORY_LIMIT - 1].question,
            format!("m{}", HISTORY_LIMIT + 4)
        );
    }
}
