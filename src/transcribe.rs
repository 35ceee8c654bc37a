use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    url: &'a str,
    model: &'a str,
}

/// Result of transcribing one video: the full transcript plus a summary,
/// delivered as a single JSON payload (not streamed).
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    pub original_text: String,
    pub summary: String,
}

#[derive(Clone)]
pub struct TranscriptionClient {
    client: Client,
    base_url: String,
}

impl TranscriptionClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn youtube_to_text(
        &self,
        url: &str,
        model: &str,
    ) -> Result<Transcription, ChatError> {
        let endpoint = format!("{}/youtube-to-text", self.base_url);
        let request = TranscribeRequest { url, model };

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Request(response.status().as_u16()));
        }

        response
            .json::<Transcription>()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_url_and_model() {
        let request = TranscribeRequest {
            url: "https://www.youtube.com/watch?v=example",
            model: "openai/whisper-small",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["url"], "https://www.youtube.com/watch?v=example");
        assert_eq!(json["model"], "openai/whisper-small");
    }

    #[test]
    fn response_payload_deserializes() {
        let raw = r#"{"original_text":"full transcript","summary":"short version"}"#;
        let t: Transcription = serde_json::from_str(raw).unwrap();
        assert_eq!(t.original_text, "full transcript");
        assert_eq!(t.summary, "short version");
    }
}
