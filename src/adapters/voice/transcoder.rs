//! MP3 → OGG/Opus conversion through an external `ffmpeg` binary.
//!
//! Telegram only renders OGG/Opus as a voice note. When ffmpeg is missing,
//! fails or times out the caller keeps the MP3.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpusTranscoder {
    ffmpeg: String,
    timeout: Duration,
}

impl OpusTranscoder {
    pub fn new(ffmpeg: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            timeout,
        }
    }

    /// Convert `input` to a sibling `.ogg` file (64 kbit/s, 48 kHz, mono).
    /// Returns `None` if conversion is unavailable; `input` is left untouched.
    pub async fn to_ogg(&self, input: &Path) -> Option<PathBuf> {
        let output = input.with_extension("ogg");
        let run = tokio::process::Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(input)
            .args(["-c:a", "libopus", "-b:a", "64k", "-ar", "48000", "-ac", "1"])
            .arg(&output)
            .args(["-y", "-loglevel", "error"])
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(out)) if out.status.success() => {
                debug!(path = %output.display(), "transcoded to ogg/opus");
                Some(output)
            }
            Ok(Ok(out)) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                warn!(code = ?out.status.code(), stderr = %stderr.trim(), "ffmpeg failed, keeping mp3");
                let _ = tokio::fs::remove_file(&output).await;
                None
            }
            Ok(Err(e)) => {
                warn!(ffmpeg = %self.ffmpeg, error = %e, "ffmpeg not available, keeping mp3");
                None
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "ffmpeg timed out, keeping mp3");
                let _ = tokio::fs::remove_file(&output).await;
                None
            }
        }
    }
}

impl Default for OpusTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg", TRANSCODE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mp3 = dir.path().join("reply.mp3");
        tokio::fs::write(&mp3, b"ID3").await.unwrap();

        let transcoder = OpusTranscoder::new("/nonexistent/ffmpeg-binary", TRANSCODE_TIMEOUT);
        assert!(transcoder.to_ogg(&mp3).await.is_none());
        assert!(mp3.exists());
    }
}
