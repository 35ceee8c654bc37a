use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::decode::StreamDecoder;
use crate::error::ChatError;
use crate::message::Message;

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
    model: &'a str,
}

/// Events delivered from the stream worker to the event loop. A worker sends
/// any number of `Delta`s followed by exactly one `Done` or `Failed`. Every
/// event carries the turn id it was spawned with, so the event loop can drop
/// leftovers from a worker whose turn has already ended.
#[derive(Debug)]
pub enum ChatEvent {
    Delta { turn: u64, text: String },
    Done { turn: u64 },
    Failed { turn: u64, error: ChatError },
}

impl ChatEvent {
    pub fn turn(&self) -> u64 {
        match self {
            ChatEvent::Delta { turn, .. }
            | ChatEvent::Done { turn }
            | ChatEvent::Failed { turn, .. } => *turn,
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Spawn a worker task that performs one streamed exchange, forwarding
    /// decoded text over `tx` in arrival order.
    pub fn spawn_stream(
        &self,
        turn: u64,
        messages: Vec<Message>,
        model: String,
        tx: mpsc::UnboundedSender<ChatEvent>,
    ) {
        let client = self.client.clone();
        let url = format!("{}/api/chat", self.base_url);

        tokio::spawn(async move {
            let event = match stream_reply(client, url, turn, messages, model, &tx).await {
                Ok(()) => ChatEvent::Done { turn },
                Err(error) => ChatEvent::Failed { turn, error },
            };
            // Receiver may already be gone if the app quit mid-stream.
            let _ = tx.send(event);
        });
    }
}

async fn stream_reply(
    client: Client,
    url: String,
    turn: u64,
    messages: Vec<Message>,
    model: String,
    tx: &mpsc::UnboundedSender<ChatEvent>,
) -> Result<(), ChatError> {
    let request = ChatRequest {
        messages: &messages,
        model: &model,
    };

    let response = client
        .post(&url)
        .json(&request)
        .send()
        .await
        .map_err(|e| ChatError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ChatError::Request(response.status().as_u16()));
    }

    let mut stream = response.bytes_stream();
    let mut decoder = StreamDecoder::new();
    let mut received_any = false;

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| ChatError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            continue;
        }
        received_any = true;

        let text = decoder.push(&bytes);
        if !text.is_empty() && tx.send(ChatEvent::Delta { turn, text }).is_err() {
            return Ok(());
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        let _ = tx.send(ChatEvent::Delta { turn, text: tail });
    }

    // A success status that never delivered a single byte means the server
    // answered without a reply stream.
    if !received_any {
        return Err(ChatError::StreamUnavailable);
    }

    Ok(())
}
