use crate::error::ChatError;
use crate::message::{Message, DEV_SYSTEM_PROMPT, SYSTEM_PROMPT};
use crate::storage::Storage;
use crate::store::ConversationStore;

/// Where the active exchange currently is. Completion and failure are
/// momentary: both `on_done` and `on_fail` land back on `Idle`, so the
/// loading indicator (derived from `is_busy`) clears on every exit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sending,
    Streaming,
}

/// Drives one outstanding chat turn: appends the user message, accumulates
/// streamed deltas, and republishes the growing assistant reply into the
/// conversation store. At most one turn is in flight; a second `begin` while
/// busy is rejected with `ChatError::Busy`.
pub struct Exchange {
    phase: Phase,
    turn: u64,
    accumulator: String,
    last_error: Option<String>,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            turn: 0,
            accumulator: String::new(),
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Identifier of the current turn. Each accepted `begin` issues a fresh
    /// one; a worker that outlives its exchange keeps the old id, letting the
    /// caller discard its remaining events.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn is_busy(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a new turn. The user message is appended to the store (and so
    /// persisted) before any request goes out. Returns the outbound message
    /// list: the request-time system prompt followed by the full history.
    /// The system prompt is never written to the store.
    pub fn begin<S: Storage>(
        &mut self,
        storage: &mut S,
        store: &mut ConversationStore,
        key: &str,
        user_text: &str,
        dev_mode: bool,
    ) -> Result<Vec<Message>, ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }

        self.last_error = None;
        self.accumulator.clear();

        let history = store
            .append(storage, key, Message::user(user_text.trim()))
            .map_err(|e| ChatError::Storage(e.to_string()))?;

        let prompt = if dev_mode {
            DEV_SYSTEM_PROMPT
        } else {
            SYSTEM_PROMPT
        };

        let mut outbound = Vec::with_capacity(history.len() + 1);
        outbound.push(Message::system(prompt));
        outbound.extend_from_slice(history);

        self.turn += 1;
        self.phase = Phase::Sending;
        Ok(outbound)
    }

    /// Apply one decoded chunk, in arrival order: extend the accumulator and
    /// replace the trailing assistant message with the whole accumulated text.
    pub fn on_delta<S: Storage>(
        &mut self,
        storage: &mut S,
        store: &mut ConversationStore,
        key: &str,
        delta: &str,
    ) -> Result<(), ChatError> {
        // A chunk arriving after the exchange already ended (for example
        // after a storage failure) is stale and must not revive it.
        if self.phase == Phase::Idle {
            return Ok(());
        }
        self.phase = Phase::Streaming;
        self.accumulator.push_str(delta);
        store
            .replace_trailing_assistant(storage, key, &self.accumulator)
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        Ok(())
    }

    /// End of stream: release the busy state and hand back the final reply.
    pub fn on_done(&mut self) -> String {
        self.phase = Phase::Idle;
        std::mem::take(&mut self.accumulator)
    }

    /// Failure on any path. Accumulated partial text stays persisted as-is;
    /// only the busy state and the error surface change.
    pub fn on_fail(&mut self, err: &ChatError) {
        self.phase = Phase::Idle;
        self.accumulator.clear();
        self.last_error = Some(err.to_string());
    }
}
