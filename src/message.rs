use serde::{Deserialize, Serialize};

/// System prompt prepended to every chat request. Injected at request time,
/// never written to the conversation history.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer concisely. If you do not know the answer, say so.";

/// System prompt used instead of the default when developer mode is on.
pub const DEV_SYSTEM_PROMPT: &str =
    "You are a senior software engineer. Answer precisely and include code where it helps. \
     If you do not know the answer, say so.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in a conversation. Immutable once appended, except for the
/// in-progress assistant reply, which is replaced wholesale on every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let msg = Message::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn roles_deserialize_lowercase() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"assistant","content":"hello"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "hello");
    }
}
