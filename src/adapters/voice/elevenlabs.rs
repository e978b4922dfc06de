//! ElevenLabs speech adapter. Implements VoicePort.
//!
//! STT: `POST /v1/speech-to-text` (multipart). TTS: `POST /v1/text-to-speech/{voice_id}`
//! returning MP3, transcoded to OGG/Opus when ffmpeg is available.

use crate::adapters::http;
use crate::adapters::voice::transcoder::OpusTranscoder;
use crate::domain::{AudioFormat, DomainError, SynthesizedAudio, VoiceSettings};
use crate::ports::VoicePort;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Maximum characters a TTS model accepts in one request.
pub fn tts_char_limit(model_id: &str) -> usize {
    match model_id {
        "eleven_v3" => 5_000,
        "eleven_multilingual_v2" => 10_000,
        "eleven_flash_v2_5" | "eleven_turbo_v2_5" => 40_000,
        _ => 5_000,
    }
}

pub struct ElevenLabsAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Where synthesized audio is written before upload.
    tmp_dir: PathBuf,
    transcoder: OpusTranscoder,
}

impl ElevenLabsAdapter {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        tmp_dir: PathBuf,
        transcoder: OpusTranscoder,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.unwrap_or_default(),
            tmp_dir,
            transcoder,
        }
    }

    fn require_key(&self) -> Result<(), DomainError> {
        if self.api_key.is_empty() {
            return Err(DomainError::Voice(
                "missing key: ElevenLabs API key not configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DomainError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %text, "ElevenLabs API returned error");
        Err(DomainError::Voice(format!(
            "API error {}: {}",
            status,
            text.chars().take(200).collect::<String>()
        )))
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
}

#[derive(Deserialize)]
struct SttResponse {
    #[serde(default)]
    text: String,
}

#[async_trait::async_trait]
impl VoicePort for ElevenLabsAdapter {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn transcribe(&self, audio_path: &Path, model_id: &str) -> Result<String, DomainError> {
        self.require_key()?;
        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| DomainError::Voice(format!("read {}: {}", audio_path.display(), e)))?;
        let filename = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "voice.ogg".to_string());
        let form = reqwest::multipart::Form::new()
            .text("model_id", model_id.to_string())
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            );

        let response = self
            .client
            .post(format!("{}/v1/speech-to-text", self.base_url))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::Voice(http::request_failed(e)))?;
        let parsed: SttResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| {
                DomainError::Voice(format!(
                    "Failed to parse STT response: {}",
                    e.without_url()
                ))
            })?;

        let text = parsed.text.trim().to_string();
        info!(model = model_id, chars = text.chars().count(), "voice transcribed");
        Ok(text)
    }

    async fn synthesize(
        &self,
        text: &str,
        settings: &VoiceSettings,
    ) -> Result<SynthesizedAudio, DomainError> {
        self.require_key()?;
        let limit = tts_char_limit(&settings.tts_model);
        let text: String = text.chars().take(limit).collect();
        let language_code = match settings.language.as_str() {
            "" | "auto" => None,
            lang => Some(lang),
        };
        let body = TtsRequest {
            text: &text,
            model_id: &settings.tts_model,
            language_code,
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{}",
                self.base_url, settings.voice_id
            ))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::Voice(http::request_failed(e)))?;
        let audio = Self::check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| {
                DomainError::Voice(format!(
                    "read audio body: {}",
                    e.without_url()
                ))
            })?;
        if audio.is_empty() {
            return Err(DomainError::Voice("empty response: no audio returned".to_string()));
        }

        tokio::fs::create_dir_all(&self.tmp_dir)
            .await
            .map_err(|e| DomainError::Voice(format!("create tmp dir: {}", e)))?;
        let mp3_path = self
            .tmp_dir
            .join(format!("tts-{}.mp3", uuid::Uuid::new_v4()));
        tokio::fs::write(&mp3_path, &audio)
            .await
            .map_err(|e| DomainError::Voice(format!("write {}: {}", mp3_path.display(), e)))?;

        let result = match self.transcoder.to_ogg(&mp3_path).await {
            Some(ogg_path) => {
                let _ = tokio::fs::remove_file(&mp3_path).await;
                SynthesizedAudio {
                    path: ogg_path,
                    format: AudioFormat::Ogg,
                }
            }
            None => SynthesizedAudio {
                path: mp3_path,
                format: AudioFormat::Mp3,
            },
        };
        info!(
            model = %settings.tts_model,
            chars = text.chars().count(),
            path = %result.path.display(),
            "voice synthesized"
        );
        Ok(result)
    }
}
