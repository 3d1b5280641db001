use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{
    error::TranscriptionError,
    transcription::{SpeechToText, prepare_audio},
    types::TranscriptLine,
};

/// Local Whisper inference through whisper.cpp.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    model_path: PathBuf,
    use_gpu: bool,
    ffmpeg: String,
}

impl WhisperTranscriber {
    pub fn new(model_path: PathBuf, use_gpu: bool, ffmpeg: impl Into<String>) -> Self {
        Self {
            model_path,
            use_gpu,
            ffmpeg: ffmpeg.into(),
        }
    }
}

extern "C" fn discard_native_log(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
}

/// Keep whisper.cpp from writing its own progress to stderr.
pub fn silence_native_logs() {
    unsafe {
        whisper_rs::set_log_callback(Some(discard_native_log), std::ptr::null_mut());
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
    ) -> Result<Vec<TranscriptLine>, TranscriptionError> {
        let wav_path = audio_path.with_extension("wav");
        prepare_audio(&self.ffmpeg, audio_path, &wav_path).await?;

        let model_path = self.model_path.clone();
        let use_gpu = self.use_gpu;
        let audio = audio_path.to_path_buf();
        let wav = wav_path.clone();

        let result =
            tokio::task::spawn_blocking(move || run_whisper(&model_path, use_gpu, &wav, &audio))
                .await
                .map_err(|e| TranscriptionError::Inference {
                    audio_path: audio_path.to_path_buf(),
                    reason: e.to_string(),
                })?;

        if let Err(e) = fs::remove_file(&wav_path).await {
            warn!("could not remove {}: {}", wav_path.display(), e);
        }

        result
    }
}

fn read_samples(wav_path: &Path, audio_path: &Path) -> Result<Vec<f32>, TranscriptionError> {
    let prep_err = |reason: String| TranscriptionError::AudioPreparation {
        audio_path: audio_path.to_path_buf(),
        reason,
    };

    let mut reader = hound::WavReader::open(wav_path).map_err(|e| prep_err(e.to_string()))?;
    reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|e| prep_err(e.to_string()))
}

fn run_whisper(
    model_path: &Path,
    use_gpu: bool,
    wav_path: &Path,
    audio_path: &Path,
) -> Result<Vec<TranscriptLine>, TranscriptionError> {
    let samples = read_samples(wav_path, audio_path)?;

    let model = model_path.to_string_lossy();
    let load_err = |reason: String| TranscriptionError::ModelLoad {
        model: model.to_string(),
        reason,
    };

    let ctx_params = WhisperContextParameters {
        use_gpu,
        flash_attn: use_gpu,
        ..Default::default()
    };
    let ctx = WhisperContext::new_with_params(&model, ctx_params)
        .map_err(|e| load_err(e.to_string()))?;
    let mut state = ctx.create_state().map_err(|e| load_err(e.to_string()))?;

    let params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
    state
        .full(params, &samples)
        .map_err(|e| TranscriptionError::Inference {
            audio_path: audio_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut lines = Vec::new();
    for segment in state.as_iter() {
        let Ok(text) = segment.to_str() else {
            continue;
        };
        // whisper.cpp reports centiseconds
        lines.push(TranscriptLine {
            start: segment.start_timestamp() as f64 / 100.0,
            end: segment.end_timestamp() as f64 / 100.0,
            text: text.trim().to_string(),
        });
    }

    debug!("whisper produced {} segments", lines.len());
    Ok(lines)
}
