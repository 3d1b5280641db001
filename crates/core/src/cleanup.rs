use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::{error::CleanupError, workspace::Workspace};

/// What a cleanup pass touched.
#[derive(Debug, Default)]
pub struct CleanupSummary {
    pub removed: Vec<PathBuf>,
    /// Subdirectories found and left in place.
    pub kept_dirs: Vec<PathBuf>,
}

/// Remove every file directly inside the download and clip directories.
///
/// Not recursive. A missing or unreadable directory, or any file that cannot
/// be removed, is an error.
pub async fn clear_files(workspace: &Workspace) -> Result<CleanupSummary, CleanupError> {
    let mut summary = CleanupSummary::default();
    for dir in [workspace.downloads_dir(), workspace.clips_dir()] {
        clear_dir(dir, &mut summary).await?;
    }
    info!(
        "removed {} files from {} and {}",
        summary.removed.len(),
        workspace.downloads_dir().display(),
        workspace.clips_dir().display()
    );
    Ok(summary)
}

async fn clear_dir(dir: &Path, summary: &mut CleanupSummary) -> Result<(), CleanupError> {
    let read_err = |source| CleanupError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir).await.map_err(read_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|source| CleanupError::Remove {
            path: path.clone(),
            source,
        })?;

        if file_type.is_dir() {
            warn!("leaving subdirectory {} in place", path.display());
            summary.kept_dirs.push(path);
            continue;
        }

        fs::remove_file(&path)
            .await
            .map_err(|source| CleanupError::Remove {
                path: path.clone(),
                source,
            })?;
        summary.removed.push(path);
    }

    Ok(())
}
