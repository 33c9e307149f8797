// src/cache.rs - Track files on disk: naming, loading and flushing
use crate::config::CacheConfig;
use crate::error::{PoseError, Result};
use crate::joints::JOINT_COUNT;
use crate::track::Track;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Track file for `source`: its file stem plus the configured suffix, next to
/// the source unless a cache directory is configured.
pub fn cache_path_for(source: &Path, config: &CacheConfig) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    let name = format!("{}{}", stem, config.suffix);

    match &config.directory {
        Some(dir) => dir.join(name),
        None => source.with_file_name(name),
    }
}

/// Reads a track file exactly as written, without denoising.
pub fn load_raw(path: &Path) -> Result<Track> {
    let file = File::open(path).map_err(|source| PoseError::TrackUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let track = Track::read_from(BufReader::new(file), JOINT_COUNT)?;
    debug!("Read {} snapshots from {}", track.len(), path.display());
    Ok(track)
}

/// Reads and denoises a track for playback.
pub fn load_for_playback(path: &Path, config: &CacheConfig) -> Result<Track> {
    let mut track = load_raw(path)?;
    track.denoise(config.denoise_window)?;
    info!(
        "Cache loaded: {} snapshots over {:.2}s from {}",
        track.len(),
        track.duration(),
        path.display()
    );
    Ok(track)
}

/// Writes the track to a temp file beside `path`, then renames it into place.
pub fn flush(track: &Track, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let temp_path = dir.join(format!(".track_{}.tmp", uuid::Uuid::new_v4()));
    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        track.write_to(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    std::fs::rename(&temp_path, path)?;

    info!("Cache written to {} ({} snapshots)", path.display(), track.len());
    Ok(())
}
