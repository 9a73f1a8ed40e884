//! Voice messages: speech-to-text, then a chat answer read back as audio.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::providers::{ApiClient, Host, MediaStore, ProviderError};

/// Voice the answers are read in
const SPEAKER: &str = "八重神子";

#[derive(Debug, Deserialize)]
struct Transcript {
    data: Option<TranscriptData>,
}

#[derive(Debug, Deserialize)]
struct TranscriptData {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Synthesis {
    music: Option<String>,
}

/// Recognize the speech in an audio file
pub async fn transcribe(api: &ApiClient, audio: &Path) -> Result<String> {
    let transcript: Transcript = api
        .upload_json(Host::Pearktrue, "/api/audiocr/", audio, "audio/mpeg")
        .await
        .with_context(|| format!("Failed to transcribe {}", audio.display()))?;
    let text = transcript
        .data
        .and_then(|d| d.content)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::Payload("empty transcript".to_string()))?;
    debug!("Transcribed {}: {}", audio.display(), text);
    Ok(text)
}

/// Read `text` aloud and save the audio under the media store
pub async fn synthesize(api: &ApiClient, media: &MediaStore, text: &str) -> Result<PathBuf> {
    let text = text.replace('\n', " ");
    let synthesis: Synthesis = api
        .get_json(
            Host::Lolimi,
            "/API/yyhc/y.php",
            &[
                ("msg", text.as_str()),
                ("speaker", SPEAKER),
                ("noise", "0.6"),
                ("noisew", "0.8"),
                ("sdp", "0.4"),
                ("Length", "1"),
            ],
        )
        .await?;
    let url = synthesis
        .music
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ProviderError::Payload("no audio url in reply".to_string()))?;

    let bytes = api.download(&url).await?;
    Ok(media.save("speech", "wav", &bytes).await?)
}
