use uclips_core::{Workspace, clear_files, error::CleanupError};

fn populated_workspace() -> (tempfile::TempDir, Workspace) {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path());
    std::fs::create_dir_all(workspace.downloads_dir()).unwrap();
    std::fs::create_dir_all(workspace.clips_dir()).unwrap();
    (dir, workspace)
}

fn entries(path: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn clears_both_directories() {
    let (_dir, workspace) = populated_workspace();
    std::fs::write(workspace.audio_path(), b"a").unwrap();
    std::fs::write(workspace.video_path(), b"v").unwrap();
    std::fs::write(workspace.transcript_path(), b"t").unwrap();
    std::fs::write(workspace.clips_dir().join("clip_1.mp4"), b"c").unwrap();
    std::fs::write(workspace.clips_dir().join("clip_2.mp4"), b"c").unwrap();

    let summary = clear_files(&workspace).await.unwrap();

    assert_eq!(summary.removed.len(), 5);
    assert!(entries(workspace.downloads_dir()).is_empty());
    assert!(entries(workspace.clips_dir()).is_empty());
}

#[tokio::test]
async fn empty_directories_are_fine() {
    let (_dir, workspace) = populated_workspace();
    let summary = clear_files(&workspace).await.unwrap();
    assert!(summary.removed.is_empty());
    assert!(summary.kept_dirs.is_empty());
}

#[tokio::test]
async fn subdirectories_are_left_alone() {
    let (_dir, workspace) = populated_workspace();
    let nested = workspace.downloads_dir().join("old");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("keep.txt"), b"k").unwrap();
    std::fs::write(workspace.video_path(), b"v").unwrap();

    let summary = clear_files(&workspace).await.unwrap();

    assert_eq!(summary.removed, vec![workspace.video_path()]);
    assert_eq!(summary.kept_dirs, vec![nested.clone()]);
    assert!(nested.join("keep.txt").exists());
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path());
    std::fs::create_dir_all(workspace.downloads_dir()).unwrap();

    let err = clear_files(&workspace).await.unwrap_err();
    assert!(matches!(err, CleanupError::ReadDir { path, .. } if path == workspace.clips_dir()));
}
