//! HTTP transcription backend for a wit.ai-style `/speech` endpoint.
//!
//! The captured utterance (left channel, 48 kHz, s16le) is posted as raw
//! audio with a bearer token. The response carries the recognised text,
//! intents and entities; entities are flattened into per-intent slots keyed
//! by role name (`"song:song"` → `"song"`).
//!
//! Newer API versions stream several JSON objects (partial transcripts
//! followed by the final one); the last complete object wins.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::capture::{capture_utterance, CaptureConfig};
use super::{Intent, Transcriber, Utterance};
use crate::audio::SOURCE_SAMPLE_RATE;
use crate::error::{DittiesError, Result};

#[derive(Debug, Clone)]
pub struct WitConfig {
    pub endpoint: String,
    /// Dated API version sent as the `v` query parameter.
    pub api_version: String,
    pub token: String,
    pub request_timeout: Duration,
    pub capture: CaptureConfig,
}

impl Default for WitConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.wit.ai/speech".into(),
            api_version: "20200513".into(),
            token: String::new(),
            request_timeout: Duration::from_secs(15),
            capture: CaptureConfig::default(),
        }
    }
}

pub struct WitTranscriber {
    client: reqwest::Client,
    config: WitConfig,
}

impl WitTranscriber {
    /// # Errors
    /// `DittiesError::Config` for an empty token or if the HTTP client cannot
    /// be built.
    pub fn new(config: WitConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(DittiesError::Config("wit.ai token is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DittiesError::Config(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn post(&self, body: Vec<u8>) -> Result<String> {
        let content_type = format!(
            "audio/raw;encoding=signed-integer;bits=16;rate={SOURCE_SAMPLE_RATE};endian=little"
        );
        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("v", self.config.api_version.as_str())])
            .bearer_auth(self.config.token.trim())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| DittiesError::Transcription(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DittiesError::Transcription(e.to_string()))?;
        if !status.is_success() {
            return Err(DittiesError::Transcription(format!(
                "speech endpoint returned {status}: {}",
                text.chars().take(200).collect::<String>()
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl Transcriber for WitTranscriber {
    async fn transcribe(
        &self,
        stream: &mut (dyn AsyncRead + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<Option<Utterance>> {
        let Some(captured) = capture_utterance(stream, &self.config.capture, cancel).await? else {
            return Ok(None);
        };
        debug!(duration_ms = captured.duration_ms(), "sending utterance for transcription");

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DittiesError::Cancelled),
            r = self.post(captured.to_le_bytes()) => r?,
        };
        let utterance = parse_response(&body)?;
        if let Some(ref u) = utterance {
            info!(text = %u.text, intents = u.intents.len(), "utterance transcribed");
        }
        Ok(utterance)
    }
}

#[derive(Debug, Deserialize)]
struct WitResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    intents: Vec<WitIntent>,
    #[serde(default)]
    entities: BTreeMap<String, Vec<WitEntity>>,
}

#[derive(Debug, Deserialize)]
struct WitIntent {
    name: String,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct WitEntity {
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    body: Option<String>,
}

/// Parse one or more concatenated JSON objects, keeping the last.
fn parse_response(body: &str) -> Result<Option<Utterance>> {
    let mut last: Option<WitResponse> = None;
    for item in serde_json::Deserializer::from_str(body).into_iter::<WitResponse>() {
        match item {
            Ok(resp) => last = Some(resp),
            Err(e) if last.is_none() => {
                return Err(DittiesError::Transcription(format!(
                    "malformed speech response: {e}"
                )))
            }
            // Trailing garbage after a complete object.
            Err(_) => break,
        }
    }
    let Some(resp) = last else {
        return Ok(None);
    };

    let slots: BTreeMap<String, String> = resp
        .entities
        .into_iter()
        .filter_map(|(key, values)| {
            let role = key.split(':').nth(1).unwrap_or(&key).to_string();
            let first = values.into_iter().next()?;
            let value = match first.value {
                Some(serde_json::Value::String(s)) => s,
                Some(other) => other.to_string(),
                None => first.body?,
            };
            Some((role, value))
        })
        .collect();

    Ok(Some(Utterance {
        text: resp.text.unwrap_or_default(),
        intents: resp
            .intents
            .into_iter()
            .map(|i| Intent {
                name: i.name,
                confidence: i.confidence,
                slots: slots.clone(),
            })
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_intents_and_entity_slots() {
        let body = r#"{
            "text": "play never gonna give you up",
            "intents": [{"id": "1", "name": "play_song", "confidence": 0.97}],
            "entities": {"song:song": [{"body": "never gonna give you up", "value": "never gonna give you up"}]},
            "traits": {}
        }"#;
        let u = parse_response(body).unwrap().unwrap();
        assert_eq!(u.text, "play never gonna give you up");
        let intent = u.intent("play_song").unwrap();
        assert_eq!(intent.confidence, Some(0.97));
        assert_eq!(
            intent.slots.get("song").map(String::as_str),
            Some("never gonna give you up")
        );
    }

    #[test]
    fn streamed_objects_resolve_to_the_last() {
        let body = r#"{"text":"play"}
{"text":"play all"}
{"text":"play all star","intents":[]}"#;
        let u = parse_response(body).unwrap().unwrap();
        assert_eq!(u.text, "play all star");
        assert!(u.intents.is_empty());
    }

    #[test]
    fn malformed_body_is_a_transcription_error() {
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(DittiesError::Transcription(_))
        ));
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(WitTranscriber::new(WitConfig::default()).is_err());
    }
}
