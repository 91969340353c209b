use anyhow::{bail, Result};
use std::{fs, path::Path};
use walkdir::WalkDir;

use crate::models::AudioItem;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "aac", "opus", "webm"];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Reads the given files in order. Files that cannot be read are skipped.
pub fn load_files<I, P>(paths: I) -> Vec<AudioItem>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .filter_map(|path| {
            let path = path.as_ref();
            match fs::read(path) {
                Ok(data) => Some(AudioItem::new(display_name(path), data)),
                Err(err) => {
                    log_warn!("Skipping {}: {err}", path.display());
                    None
                }
            }
        })
        .collect()
}

/// Collects audio files under `dir`, sorted by file name. `max_depth` of 1
/// only looks at the directory itself.
pub fn load_directory(dir: &Path, max_depth: usize) -> Result<Vec<AudioItem>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    let paths: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth.max(1))
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log_warn!("Skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    let items = load_files(&paths);
    log_info!("Found {} audio files in {}", items.len(), dir.display());
    Ok(items)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recognises_audio_extensions_case_insensitively() {
        assert!(is_audio_file(Path::new("song.MP3")));
        assert!(is_audio_file(Path::new("dir/rain.flac")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("README")));
    }

    #[test]
    fn load_files_keeps_order_and_skips_missing() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("b-side.mp3");
        let second = dir.path().join("a-side.ogg");
        fs::write(&first, [1u8, 2, 3]).unwrap();
        fs::write(&second, [4u8]).unwrap();

        let items = load_files([
            first.clone(),
            dir.path().join("missing.mp3"),
            second.clone(),
        ]);

        let names: Vec<_> = items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["b-side.mp3", "a-side.ogg"]);
        assert_eq!(items[0].len(), 3);
    }

    #[test]
    fn load_directory_filters_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("02 second.mp3"), [0u8]).unwrap();
        fs::write(dir.path().join("01 first.wav"), [0u8]).unwrap();
        fs::write(dir.path().join("notes.txt"), [0u8]).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("00 deep.mp3"), [0u8]).unwrap();

        let shallow = load_directory(dir.path(), 1).unwrap();
        let names: Vec<_> = shallow.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["01 first.wav", "02 second.mp3"]);

        let deep = load_directory(dir.path(), 2).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn load_directory_rejects_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(load_directory(&dir.path().join("nope"), 1).is_err());
    }
}
