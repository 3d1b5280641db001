use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::{info, warn};

use crate::{error::TranscriptionError, transcript::render_transcript, types::TranscriptLine};

#[cfg(feature = "whisper")]
pub mod whisper;

/// Black-box speech-to-text capability.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_path: &Path)
    -> Result<Vec<TranscriptLine>, TranscriptionError>;
}

/// Transcribe `audio_path` and write the result in the shared transcript
/// format, so later stages cannot tell it apart from caption transcripts.
pub async fn transcribe_to_file(
    stt: &dyn SpeechToText,
    audio_path: &Path,
    transcript_path: &Path,
) -> Result<Vec<TranscriptLine>, TranscriptionError> {
    let lines = match stt.transcribe(audio_path).await {
        Ok(lines) => lines,
        Err(e) => {
            warn!("transcription of {} failed: {}", audio_path.display(), e);
            return Err(e);
        }
    };

    let write_err = |source| TranscriptionError::Write {
        path: transcript_path.to_path_buf(),
        source,
    };
    if let Some(parent) = transcript_path.parent() {
        fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    fs::write(transcript_path, render_transcript(&lines))
        .await
        .map_err(write_err)?;

    info!(
        "wrote {} transcript lines to {}",
        lines.len(),
        transcript_path.display()
    );
    Ok(lines)
}

pub fn model_file_name(model: &str) -> String {
    format!("ggml-{}.bin", model)
}

/// Make sure the ggml model is present in `models_dir`, downloading it on
/// first use.
pub async fn ensure_model(models_dir: &Path, model: &str) -> Result<PathBuf, TranscriptionError> {
    let file_name = model_file_name(model);
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        file_name
    );

    let model_path = models_dir.join(&file_name);
    if model_path.exists() {
        return Ok(model_path);
    }

    let download_err = |reason: String| TranscriptionError::ModelDownload {
        url: download_url.clone(),
        reason,
    };

    fs::create_dir_all(models_dir)
        .await
        .map_err(|e| download_err(e.to_string()))?;

    info!("downloading speech model {}", download_url);
    let output = Command::new("curl")
        .arg("-fL")
        .arg(&download_url)
        .arg("-o")
        .arg(&model_path)
        .output()
        .await
        .map_err(|e| download_err(e.to_string()))?;

    if !output.status.success() {
        let _ = fs::remove_file(&model_path).await;
        return Err(download_err(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(model_path)
}

/// Decode any audio file to 16 kHz mono PCM WAV, the input the speech model
/// expects.
pub async fn prepare_audio(
    ffmpeg: &str,
    audio_path: &Path,
    wav_path: &Path,
) -> Result<(), TranscriptionError> {
    let output = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(audio_path)
        .arg("-vn")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg("16000")
        .arg("-ac")
        .arg("1")
        .arg(wav_path)
        .output()
        .await
        .map_err(|e| TranscriptionError::AudioPreparation {
            audio_path: audio_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(TranscriptionError::AudioPreparation {
            audio_path: audio_path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTranscriber(Vec<TranscriptLine>);

    #[async_trait]
    impl SpeechToText for FixedTranscriber {
        async fn transcribe(
            &self,
            _audio_path: &Path,
        ) -> Result<Vec<TranscriptLine>, TranscriptionError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl SpeechToText for BrokenModel {
        async fn transcribe(
            &self,
            _audio_path: &Path,
        ) -> Result<Vec<TranscriptLine>, TranscriptionError> {
            Err(TranscriptionError::ModelLoad {
                model: "tiny".into(),
                reason: "no such file".into(),
            })
        }
    }

    #[tokio::test]
    async fn writes_transcript_in_shared_format() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("downloads").join("transcript.txt");
        let stt = FixedTranscriber(vec![TranscriptLine {
            start: 0.0,
            end: 1.25,
            text: " hi ".into(),
        }]);

        let lines = transcribe_to_file(&stt, Path::new("audio.mp3"), &out)
            .await
            .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "00:00:00.000 --> 00:00:01.250\nhi\n\n"
        );
    }

    #[tokio::test]
    async fn model_failure_leaves_no_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("transcript.txt");

        let err = transcribe_to_file(&BrokenModel, Path::new("audio.mp3"), &out)
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::ModelLoad { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn model_file_names_follow_ggml_convention() {
        assert_eq!(model_file_name("tiny"), "ggml-tiny.bin");
    }
}
