//! Chat transcript entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a message is from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Error,
    System,
}

/// One bubble in the transcript. Assistant text grows while streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Role::Error, text)
    }

    /// Empty assistant message, filled in by token events.
    pub fn placeholder() -> Self {
        Self::new(Role::Assistant, String::new())
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_blank_assistant() {
        let message = ChatMessage::placeholder();
        assert_eq!(message.role, Role::Assistant);
        assert!(message.is_blank());
    }

    #[test]
    fn whitespace_counts_as_blank() {
        assert!(ChatMessage::new(Role::Assistant, " \n\t").is_blank());
        assert!(!ChatMessage::user("hi").is_blank());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("x")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["text"], "x");
        assert!(json["timestamp"].is_string());
    }
}
