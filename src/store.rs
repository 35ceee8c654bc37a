use anyhow::Result;

use crate::message::{Message, Role};
use crate::storage::Storage;

/// Storage key prefix for persisted conversations.
const MESSAGES_PREFIX: &str = "messages/";

/// A fresh conversation key derived from the local creation time.
pub fn new_conversation_key() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Holds the in-memory message list for the active conversation and mirrors
/// every mutation to storage in full (write-through). The persisted copy is
/// never the source of truth while a conversation is active; it is reloaded
/// only on `load`.
#[derive(Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Load the persisted sequence for `key` into memory. A missing entry or
    /// malformed JSON both yield an empty conversation; corruption is treated
    /// as "no data", never as an error.
    pub fn load<S: Storage>(&mut self, storage: &S, key: &str) -> &[Message] {
        self.messages = storage
            .get(&storage_key(key))
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        &self.messages
    }

    /// Append a message and persist the full updated sequence.
    pub fn append<S: Storage>(
        &mut self,
        storage: &mut S,
        key: &str,
        message: Message,
    ) -> Result<&[Message]> {
        self.messages.push(message);
        self.persist(storage, key)?;
        Ok(&self.messages)
    }

    /// Replace the trailing assistant message with `partial` (appending one
    /// if the sequence ends with the user's turn) and persist. Calling this
    /// repeatedly leaves exactly one trailing assistant entry equal to the
    /// last partial supplied.
    pub fn replace_trailing_assistant<S: Storage>(
        &mut self,
        storage: &mut S,
        key: &str,
        partial: &str,
    ) -> Result<&[Message]> {
        if self
            .messages
            .last()
            .is_some_and(|last| last.role != Role::User)
        {
            self.messages.pop();
        }
        self.messages.push(Message::assistant(partial));
        self.persist(storage, key)?;
        Ok(&self.messages)
    }

    /// Clear the in-memory sequence and remove the persisted entry.
    pub fn reset<S: Storage>(&mut self, storage: &mut S, key: &str) -> Result<()> {
        self.messages.clear();
        storage.remove(&storage_key(key))
    }

    fn persist<S: Storage>(&self, storage: &mut S, key: &str) -> Result<()> {
        let raw = serde_json::to_string(&self.messages)?;
        storage.set(&storage_key(key), &raw)
    }
}

/// All persisted conversation keys, oldest first. Timestamp keys sort
/// chronologically as plain strings.
pub fn conversation_keys<S: Storage>(storage: &S) -> Vec<String> {
    storage
        .keys(MESSAGES_PREFIX)
        .into_iter()
        .map(|k| k[MESSAGES_PREFIX.len()..].to_string())
        .collect()
}

fn storage_key(key: &str) -> String {
    format!("{MESSAGES_PREFIX}{key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    const KEY: &str = "2024-06-01 12:00:00";

    #[test]
    fn append_then_load_round_trips() {
        let mut storage = MemoryStorage::new();
        let mut store = ConversationStore::new();

        store
            .append(&mut storage, KEY, Message::user("hi"))
            .unwrap();

        let mut fresh = ConversationStore::new();
        let loaded = fresh.load(&storage, KEY);
        assert_eq!(loaded.last(), Some(&Message::user("hi")));
    }

    #[test]
    fn load_of_unknown_key_is_empty() {
        let storage = MemoryStorage::new();
        let mut store = ConversationStore::new();
        assert!(store.load(&storage, "never-used").is_empty());
    }

    #[test]
    fn malformed_persisted_json_loads_as_empty() {
        let mut storage = MemoryStorage::new();
        storage.set("messages/corrupt", "{not json").unwrap();

        let mut store = ConversationStore::new();
        assert!(store.load(&storage, "corrupt").is_empty());
    }

    #[test]
    fn chunks_collapse_into_one_trailing_assistant_message() {
        let mut storage = MemoryStorage::new();
        let mut store = ConversationStore::new();

        store
            .append(&mut storage, KEY, Message::user("hi"))
            .unwrap();
        store
            .replace_trailing_assistant(&mut storage, KEY, "He")
            .unwrap();
        store
            .replace_trailing_assistant(&mut storage, KEY, "Hello!")
            .unwrap();

        assert_eq!(
            store.messages(),
            &[Message::user("hi"), Message::assistant("Hello!")]
        );

        // The persisted copy matches the in-memory one after every mutation.
        let mut fresh = ConversationStore::new();
        assert_eq!(fresh.load(&storage, KEY), store.messages());
    }

    #[test]
    fn replace_is_structurally_idempotent() {
        let mut storage = MemoryStorage::new();
        let mut store = ConversationStore::new();

        store
            .append(&mut storage, KEY, Message::user("question"))
            .unwrap();
        for i in 0..5 {
            store
                .replace_trailing_assistant(&mut storage, KEY, &format!("partial {i}"))
                .unwrap();
        }

        let assistants = store
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        assert_eq!(assistants, 1);
        assert_eq!(store.messages().last(), Some(&Message::assistant("partial 4")));
    }

    #[test]
    fn replace_on_empty_conversation_appends() {
        let mut storage = MemoryStorage::new();
        let mut store = ConversationStore::new();

        store
            .replace_trailing_assistant(&mut storage, KEY, "orphan")
            .unwrap();
        assert_eq!(store.messages(), &[Message::assistant("orphan")]);
    }

    #[test]
    fn reset_removes_the_persisted_entry() {
        let mut storage = MemoryStorage::new();
        let mut store = ConversationStore::new();

        store
            .append(&mut storage, KEY, Message::user("a"))
            .unwrap();
        store
            .append(&mut storage, KEY, Message::assistant("b"))
            .unwrap();
        store.reset(&mut storage, KEY).unwrap();

        assert!(store.messages().is_empty());
        assert!(storage.get(&storage_key(KEY)).is_none());
        assert!(store.load(&storage, KEY).is_empty());
    }

    #[test]
    fn conversation_keys_list_oldest_first() {
        let mut storage = MemoryStorage::new();

        ConversationStore::new()
            .append(&mut storage, "2024-06-02 09:00:00", Message::user("b"))
            .unwrap();
        ConversationStore::new()
            .append(&mut storage, "2024-06-01 09:00:00", Message::user("a"))
            .unwrap();

        assert_eq!(
            conversation_keys(&storage),
            vec![
                "2024-06-01 09:00:00".to_string(),
                "2024-06-02 09:00:00".to_string()
            ]
        );
    }
}
