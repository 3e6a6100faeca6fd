//! Editing session for a single artist record
//!
//! A session wraps the text fields being edited together with the image
//! slot editor. Saving validates the fields, commits the slot images to their
//! canonical names and only then writes the record. Every other way out of a
//! session (cancel, error, drop) deletes the staged images it created.

use super::data::{Artist, ImagePaths};
use super::library::Library;
use super::slots::{SlotEditor, SlotFailure};
use crate::assets::{store, AssetStore, ThumbnailCache};
use crate::error::{CatalogError, Result, ValidationError};

/// Result of a successful save
#[derive(Debug)]
pub struct SaveOutcome {
    /// The record as written to the database
    pub artist: Artist,
    /// Slots whose image kept a non-canonical name because the copy failed
    pub failures: Vec<SlotFailure>,
}

#[derive(Debug)]
pub struct EditSession {
    /// None while creating a new record
    row_key: Option<String>,
    created_at: Option<i64>,
    pub artist_id: String,
    pub display_name: String,
    pub biography: String,
    pub notes: String,
    pub marked: bool,
    assets: AssetStore,
    slots: SlotEditor,
    finished: bool,
}

impl EditSession {
    /// Start a session for a new record
    pub fn create(assets: AssetStore) -> Self {
        Self {
            row_key: None,
            created_at: None,
            artist_id: String::new(),
            display_name: String::new(),
            biography: String::new(),
            notes: String::new(),
            marked: false,
            slots: SlotEditor::new(assets.clone()),
            assets,
            finished: false,
        }
    }

    /// Start a session editing an existing record
    pub fn edit(assets: AssetStore, artist: &Artist) -> Self {
        Self {
            row_key: Some(artist.row_key.clone()),
            created_at: Some(artist.created_at),
            artist_id: artist.artist_id.clone(),
            display_name: artist.display_name.clone(),
            biography: artist.biography.clone(),
            notes: artist.notes.clone(),
            marked: artist.marked,
            slots: SlotEditor::from_paths(assets.clone(), &artist.images),
            assets,
            finished: false,
        }
    }

    pub fn is_new(&self) -> bool {
        self.row_key.is_none()
    }

    pub fn row_key(&self) -> Option<&str> {
        self.row_key.as_deref()
    }

    pub fn slots(&self) -> &SlotEditor {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut SlotEditor {
        &mut self.slots
    }

    /// Check the required fields.
    ///
    /// Identifiers are trimmed. A new record without a display name takes its
    /// artist id as the name.
    pub fn validate(&mut self) -> std::result::Result<(), ValidationError> {
        self.artist_id = self.artist_id.trim().to_string();
        self.display_name = self.display_name.trim().to_string();

        if self.is_new() && !self.artist_id.is_empty() && self.display_name.is_empty() {
            self.display_name = self.artist_id.clone();
        }

        if self.artist_id.is_empty() {
            return Err(ValidationError::MissingArtistId);
        }
        if !store::is_safe_file_stem(&self.artist_id) {
            return Err(ValidationError::InvalidArtistId);
        }
        if self.display_name.is_empty() {
            return Err(ValidationError::MissingDisplayName);
        }
        Ok(())
    }

    /// Validate, commit images, then insert or update the record.
    ///
    /// A validation error leaves the session open so the user can fix the
    /// fields and retry.
    pub fn save(&mut self, library: &Library, thumbs: &mut ThumbnailCache) -> Result<SaveOutcome> {
        self.validate()?;

        if self.is_new() {
            // Pick up images already named after this id
            let found: ImagePaths = self.assets.find_canonical(&self.artist_id);
            self.slots.fill_empty(&found);
        }

        let report = self.slots.commit(&self.artist_id, thumbs)?;

        let mut artist = Artist::new(self.artist_id.clone(), self.display_name.clone());
        artist.biography = self.biography.clone();
        artist.notes = self.notes.clone();
        artist.marked = self.marked;
        artist.images = report.paths;

        match self.row_key.clone() {
            Some(row_key) => {
                artist.row_key = row_key.clone();
                if let Some(created_at) = self.created_at {
                    artist.created_at = created_at;
                }
                if !library.update(&artist)? {
                    return Err(CatalogError::NotFound(row_key));
                }
                log::info!("✏️  Updated artist {}", artist.artist_id);
            }
            None => {
                library.insert(&artist)?;
                self.row_key = Some(artist.row_key.clone());
                self.created_at = Some(artist.created_at);
                log::info!("➕ Added artist {}", artist.artist_id);
            }
        }

        self.finished = true;
        Ok(SaveOutcome { artist, failures: report.failures })
    }

    /// Abandon the session, deleting staged images. Returns how many were removed.
    pub fn cancel(&mut self) -> usize {
        self.finished = true;
        self.slots.discard_staged()
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        if !self.finished {
            let removed = self.slots.discard_staged();
            if removed > 0 {
                log::debug!("Discarded {} staged images of an unfinished edit", removed);
            }
        }
    }
}
