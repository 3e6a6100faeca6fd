use crate::config::AppPaths;
use crate::error::SlotError;
use crate::state::data::{ImagePaths, SLOT_COUNT};
use image::DynamicImage;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions accepted for reference images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// File name prefix of staged images that are not yet linked to a record
pub const TEMP_PREFIX: &str = "temp_";

/// Check if a path has one of the accepted image extensions
pub fn is_accepted_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a path names a staged (temporary) image
pub fn is_staged(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(TEMP_PREFIX))
}

/// Lowercased extension with its leading dot, or an empty string
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Check that `stem` can prefix a file name inside the images directory
/// without naming another directory
pub fn is_safe_file_stem(stem: &str) -> bool {
    !stem.contains(['/', '\\']) && !stem.contains("..")
}

/// Canonical name of a slot image: `<artist_id>-<slot + 1><ext>`
///
/// `ext` includes the leading dot (".png").
pub fn canonical_file_name(artist_id: &str, slot: usize, ext: &str) -> String {
    format!("{}-{}{}", artist_id, slot + 1, ext)
}

/// Owns the directory of original images.
///
/// Pure file-system operations; it knows the naming scheme but nothing about
/// records or the database.
#[derive(Debug, Clone)]
pub struct AssetStore {
    images_dir: PathBuf,
    thumbs_dir: PathBuf,
}

impl AssetStore {
    pub fn new(paths: &AppPaths) -> Self {
        Self {
            images_dir: paths.images_dir.clone(),
            thumbs_dir: paths.thumbs_dir.clone(),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn thumbs_dir(&self) -> &Path {
        &self.thumbs_dir
    }

    /// Create the originals and thumbnails directories if they are missing
    pub fn ensure_directories(&self) -> io::Result<()> {
        fs::create_dir_all(&self.images_dir)?;
        fs::create_dir_all(&self.thumbs_dir)?;
        Ok(())
    }

    /// Delete every `temp_*` file left behind by earlier sessions, except the
    /// ones in `keep` (staged files a record still points at).
    ///
    /// Best effort: failures are logged and skipped. Returns the number of
    /// files removed.
    pub fn sweep_temporary(&self, keep: &HashSet<PathBuf>) -> usize {
        let mut removed = 0;

        for entry in WalkDir::new(&self.images_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_staged(path) || keep.contains(path) {
                continue;
            }

            match fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Could not remove stale temp file {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            log::info!("🧹 Removed {} stale temp images", removed);
        }
        removed
    }

    /// A fresh, unused staged path with the given dotted extension
    pub fn new_staged_path(&self, ext: &str) -> PathBuf {
        loop {
            let token = uuid::Uuid::new_v4().simple().to_string();
            let candidate = self
                .images_dir
                .join(format!("{}{}{}", TEMP_PREFIX, &token[..8], ext));
            if !candidate.exists() {
                return candidate;
            }
        }
    }

    /// Persist a decoded bitmap (e.g. pasted from the clipboard) as a staged PNG
    pub fn stage_bitmap(&self, bitmap: &DynamicImage) -> Result<PathBuf, SlotError> {
        fs::create_dir_all(&self.images_dir).map_err(|source| SlotError::Io {
            path: self.images_dir.clone(),
            source,
        })?;

        let path = self.new_staged_path(".png");
        bitmap.save_with_format(&path, image::ImageFormat::Png)?;
        log::debug!("Staged clipboard image at {}", path.display());
        Ok(path)
    }

    /// Absolute path of a canonical slot image
    pub fn canonical_path(&self, artist_id: &str, slot: usize, ext: &str) -> PathBuf {
        self.images_dir.join(canonical_file_name(artist_id, slot, ext))
    }

    /// Turn a persisted path into an absolute one (relative names live in the images directory)
    pub fn resolve(&self, stored: &str) -> PathBuf {
        let path = Path::new(stored);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.images_dir.join(path)
        }
    }

    /// Inverse of [`resolve`](Self::resolve): files inside the images directory
    /// are stored by bare name, anything else keeps its full path.
    pub fn to_stored(&self, path: &Path) -> String {
        match path.strip_prefix(&self.images_dir) {
            Ok(relative) => relative.to_string_lossy().to_string(),
            Err(_) => path.to_string_lossy().to_string(),
        }
    }

    /// Probe for existing canonical images of `artist_id`.
    ///
    /// For each slot the first of `.png`, `.jpg`, `.jpeg` that exists wins.
    pub fn find_canonical(&self, artist_id: &str) -> ImagePaths {
        let mut found = ImagePaths::default();
        if artist_id.is_empty() {
            return found;
        }

        for slot in 0..SLOT_COUNT {
            for ext in IMAGE_EXTENSIONS {
                let name = canonical_file_name(artist_id, slot, &format!(".{}", ext));
                if self.images_dir.join(&name).is_file() {
                    found.set(slot, Some(name));
                    break;
                }
            }
        }
        found
    }
}
