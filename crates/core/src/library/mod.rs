use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{JukeboxError, Result};

/// Lists the playable files directly inside `folder`, sorted by path.
///
/// The order matters: the n-th track ends up on the n-th button. Only files
/// whose extension matches one of `extensions` (case-insensitively) are
/// returned; subdirectories are not searched.
pub fn discover_tracks(folder: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(JukeboxError::MusicFolderMissing(folder.to_path_buf()));
    }

    let mut tracks = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            tracks.push(path);
        }
    }
    tracks.sort();

    tracing::info!(count = tracks.len(), folder = %folder.display(), "found tracks");
    tracing::debug!(?tracks, "discovered track files");
    Ok(tracks)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
