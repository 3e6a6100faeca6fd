//! Application directories and tunable settings.
//!
//! Every component receives its directories from an [`AppPaths`] value built
//! once at startup, so tests can point the whole catalog at a scratch folder.

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default data directory
pub const DATA_DIR_ENV: &str = "ARTIST_CATALOG_DIR";

const IMAGES_DIR_NAME: &str = "artist_images";
const THUMBS_DIR_NAME: &str = "artist_thumbs";
const DB_FILE_NAME: &str = "artists.db";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Resolved on-disk layout of a catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub base_dir: PathBuf,
    /// Original images, staged (`temp_*`) or canonical (`<id>-<n>.<ext>`)
    pub images_dir: PathBuf,
    /// Derived thumbnails (`<basename>_thumb<ext>`)
    pub thumbs_dir: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    /// Build the layout rooted at `base_dir`. Nothing is created on disk.
    pub fn from_base(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            images_dir: base_dir.join(IMAGES_DIR_NAME),
            thumbs_dir: base_dir.join(THUMBS_DIR_NAME),
            db_path: base_dir.join(DB_FILE_NAME),
            base_dir,
        }
    }

    /// Pick the base directory: explicit override, then `ARTIST_CATALOG_DIR`,
    /// then the user's data directory.
    ///
    /// - Linux: ~/.local/share/artist-catalog
    /// - macOS: ~/Library/Application Support/artist-catalog
    /// - Windows: %APPDATA%\artist-catalog
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Ok(Self::from_base(dir));
        }
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return Ok(Self::from_base(PathBuf::from(dir)));
        }

        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| CatalogError::Config("Could not determine user data directory".into()))?;
        path.push("artist-catalog");
        Ok(Self::from_base(path))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE_NAME)
    }
}

/// User-tunable settings stored as JSON next to the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bounding box (pixels) of grid thumbnails
    pub grid_thumbnail_size: u32,
    /// Bounding box (pixels) of the editor preview
    pub preview_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grid_thumbnail_size: 80,
            preview_size: 240,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        if settings.grid_thumbnail_size == 0 || settings.preview_size == 0 {
            return Err(CatalogError::Config(format!(
                "Thumbnail sizes must be positive in {}",
                path.display()
            )));
        }
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
