use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const DOWNLOADS_DIR: &str = "downloads";
pub const CLIPS_DIR: &str = "clips";
pub const AUDIO_FILE: &str = "audio.mp3";
pub const VIDEO_FILE: &str = "video.mp4";
pub const TRANSCRIPT_FILE: &str = "transcript.txt";

/// Storage namespace for one unit of work: a download directory holding the
/// source media and transcript, and a clip directory holding rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    downloads: PathBuf,
    clips: PathBuf,
    job_id: Option<Uuid>,
}

impl Workspace {
    /// Fixed layout: `<root>/downloads` and `<root>/clips`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            downloads: root.join(DOWNLOADS_DIR),
            clips: root.join(CLIPS_DIR),
            job_id: None,
        }
    }

    /// Per-job layout: `<root>/jobs/<job_id>/downloads` and `.../clips`.
    pub fn for_job(root: impl AsRef<Path>, job_id: Uuid) -> Self {
        let job_root = root.as_ref().join("jobs").join(job_id.to_string());
        Self {
            job_id: Some(job_id),
            ..Self::new(job_root)
        }
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads
    }

    pub fn clips_dir(&self) -> &Path {
        &self.clips
    }

    pub fn audio_path(&self) -> PathBuf {
        self.downloads.join(AUDIO_FILE)
    }

    pub fn video_path(&self) -> PathBuf {
        self.downloads.join(VIDEO_FILE)
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.downloads.join(TRANSCRIPT_FILE)
    }
}

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("uclips")
}

pub fn get_model_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_layout_matches_well_known_names() {
        let ws = Workspace::new("/work");
        assert_eq!(ws.downloads_dir(), Path::new("/work/downloads"));
        assert_eq!(ws.clips_dir(), Path::new("/work/clips"));
        assert_eq!(ws.audio_path(), PathBuf::from("/work/downloads/audio.mp3"));
        assert_eq!(ws.video_path(), PathBuf::from("/work/downloads/video.mp4"));
        assert_eq!(
            ws.transcript_path(),
            PathBuf::from("/work/downloads/transcript.txt")
        );
        assert!(ws.job_id().is_none());
    }

    #[test]
    fn job_layout_is_namespaced() {
        let id = Uuid::new_v4();
        let ws = Workspace::for_job("/work", id);
        let base = PathBuf::from("/work/jobs").join(id.to_string());
        assert_eq!(ws.downloads_dir(), base.join("downloads"));
        assert_eq!(ws.clips_dir(), base.join("clips"));
        assert_eq!(ws.job_id(), Some(id));
        assert_ne!(Workspace::for_job("/work", Uuid::new_v4()), ws);
    }
}
