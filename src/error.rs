use thiserror::Error;

/// Failures of one chat or transcription exchange. Every variant is caught
/// at the boundary of the operation that raised it and turned into local UI
/// state; nothing here crashes the process.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A previous exchange is still in flight; new submissions are rejected.
    #[error("a request is already in flight")]
    Busy,

    /// The response carried no byte stream (no data ever arrived).
    #[error("response carried no body stream")]
    StreamUnavailable,

    /// Network failure, or a read failed mid-stream. Partial content that
    /// was already persisted stays in place.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("request failed with status {0}")]
    Request(u16),

    /// Local storage write failed; the in-memory conversation is ahead of
    /// the persisted copy.
    #[error("storage write failed: {0}")]
    Storage(String),
}
