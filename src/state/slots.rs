//! Per-record image slot editor.
//!
//! Holds the three optional image paths of the record being edited, the
//! selected slot, and which files are still staged (`temp_*`). Files only
//! receive their canonical `<artist_id>-<n>.<ext>` names in [`SlotEditor::commit`].

use super::data::{ImagePaths, SLOT_COUNT};
use crate::assets::store::{self, AssetStore};
use crate::assets::{ThumbnailCache, ThumbnailEvent, ThumbnailState};
use crate::error::SlotError;
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};

/// A slot whose file could not be copied to its canonical name during commit
#[derive(Debug)]
pub struct SlotFailure {
    pub slot: usize,
    pub source: PathBuf,
    pub error: std::io::Error,
}

/// Result of [`SlotEditor::commit`]
#[derive(Debug)]
pub struct CommitReport {
    /// Paths to persist (canonical names, or the old name for failed slots)
    pub paths: ImagePaths,
    pub failures: Vec<SlotFailure>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One slot file on its way to its canonical name
#[derive(Debug)]
struct Placement {
    slot: usize,
    current: PathBuf,
    canonical: PathBuf,
    /// Staged copy of `current`, read instead of it when `current` is another slot's target
    aside: Option<PathBuf>,
}

/// Outstanding thumbnail request for a slot
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingThumb {
    slot: usize,
    generation: u64,
    path: PathBuf,
}

pub struct SlotEditor {
    assets: AssetStore,
    slots: [Option<PathBuf>; SLOT_COUNT],
    selected: Option<usize>,
    /// Bumped whenever a slot's content changes; late thumbnails for an older
    /// generation are dropped
    generations: [u64; SLOT_COUNT],
    pending: Vec<PendingThumb>,
}

impl SlotEditor {
    /// An editor with three empty slots
    pub fn new(assets: AssetStore) -> Self {
        Self {
            assets,
            slots: Default::default(),
            selected: None,
            generations: [0; SLOT_COUNT],
            pending: Vec::new(),
        }
    }

    /// Load persisted paths. Entries whose file is gone become empty slots.
    pub fn from_paths(assets: AssetStore, paths: &ImagePaths) -> Self {
        let mut editor = Self::new(assets);
        for (slot, stored) in paths.iter().enumerate() {
            let Some(stored) = stored else { continue };
            let path = editor.assets.resolve(stored);
            if path.is_file() {
                editor.slots[slot] = Some(path);
            } else {
                log::debug!("Image for slot {} is missing: {}", slot + 1, path.display());
            }
        }
        editor
    }

    /// Select a slot; the next stage/delete applies to it.
    ///
    /// Returns `false` (and changes nothing) for an out-of-range index.
    pub fn select(&mut self, slot: usize) -> bool {
        if slot >= SLOT_COUNT {
            return false;
        }
        self.selected = Some(slot);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn slot(&self, slot: usize) -> Option<&Path> {
        self.slots.get(slot).and_then(|s| s.as_deref())
    }

    pub fn is_staged(&self, slot: usize) -> bool {
        self.slot(slot).is_some_and(store::is_staged)
    }

    pub fn has_staged(&self) -> bool {
        (0..SLOT_COUNT).any(|slot| self.is_staged(slot))
    }

    /// Put `path` into the selected slot.
    ///
    /// Returns `Ok(false)` when no slot is selected. A staged file previously
    /// held by the slot is deleted first.
    pub fn stage(&mut self, path: &Path) -> Result<bool, SlotError> {
        if !store::is_accepted_image(path) {
            return Err(SlotError::UnsupportedImage(path.to_path_buf()));
        }
        let Some(slot) = self.selected else {
            return Ok(false);
        };

        if let Some(previous) = self.slots[slot].take() {
            if store::is_staged(&previous) && previous != path {
                remove_best_effort(&previous);
            }
        }

        self.slots[slot] = Some(path.to_path_buf());
        self.touch(slot);
        Ok(true)
    }

    /// Persist a pasted bitmap as a staged PNG and put it into the selected slot
    pub fn stage_bitmap(&mut self, bitmap: &DynamicImage) -> Result<bool, SlotError> {
        if self.selected.is_none() {
            return Ok(false);
        }
        let path = self.assets.stage_bitmap(bitmap)?;
        self.stage(&path)
    }

    /// Clear the selected slot, deleting its file only if it is staged
    pub fn delete_selected(&mut self) -> bool {
        let Some(slot) = self.selected else {
            return false;
        };
        let Some(path) = self.slots[slot].take() else {
            return false;
        };

        if store::is_staged(&path) {
            remove_best_effort(&path);
        }
        self.touch(slot);
        true
    }

    /// Fill empty slots from already-stored paths (e.g. rediscovered canonical files)
    pub fn fill_empty(&mut self, found: &ImagePaths) {
        for (slot, stored) in found.iter().enumerate() {
            if self.slots[slot].is_some() {
                continue;
            }
            if let Some(stored) = stored {
                let path = self.assets.resolve(stored);
                if path.is_file() {
                    self.slots[slot] = Some(path);
                    self.touch(slot);
                }
            }
        }
    }

    /// Copy every slot file to its canonical name `<artist_id>-<slot + 1><ext>`.
    ///
    /// Slots already at their canonical path are left untouched. Staged sources
    /// are deleted after a successful copy, other sources are kept. A failed
    /// copy is reported per slot and the slot keeps its old path.
    ///
    /// A source that is also another slot's target (images swapped between
    /// slots) is copied aside first, so no file is overwritten before it is read.
    pub fn commit(
        &mut self,
        artist_id: &str,
        thumbs: &mut ThumbnailCache,
    ) -> Result<CommitReport, SlotError> {
        let artist_id = artist_id.trim();
        if artist_id.is_empty() {
            return Err(SlotError::EmptyKey);
        }
        if !store::is_safe_file_stem(artist_id) {
            return Err(SlotError::InvalidKey(artist_id.to_string()));
        }

        if let Err(e) = fs::create_dir_all(self.assets.images_dir()) {
            log::warn!("Could not create {}: {}", self.assets.images_dir().display(), e);
        }

        let mut placements = Vec::new();
        for slot in 0..SLOT_COUNT {
            let Some(current) = self.slots[slot].clone() else { continue };

            if !current.is_file() {
                log::warn!("Dropping missing image from slot {}: {}", slot + 1, current.display());
                self.slots[slot] = None;
                self.touch(slot);
                continue;
            }

            let ext = store::dotted_extension(&current);
            let canonical = self.assets.canonical_path(artist_id, slot, &ext);
            if same_file(&current, &canonical) {
                continue;
            }
            placements.push(Placement { slot, current, canonical, aside: None });
        }

        self.copy_aside_overlapping(&mut placements)?;

        let mut failures = Vec::new();
        for Placement { slot, current, canonical, aside } in placements {
            let source = aside.clone().unwrap_or_else(|| current.clone());

            match fs::copy(&source, &canonical) {
                Ok(_) => {
                    // Both the old name and the reused canonical name may have cached thumbnails
                    thumbs.invalidate(&current);
                    thumbs.invalidate(&canonical);
                    if let Some(aside) = &aside {
                        remove_best_effort(aside);
                    }
                    if store::is_staged(&current) {
                        remove_best_effort(&current);
                    }
                    log::debug!("Committed {} -> {}", current.display(), canonical.display());
                    self.slots[slot] = Some(canonical);
                    self.touch(slot);
                }
                Err(error) => {
                    log::warn!(
                        "Failed to copy {} to {}: {}",
                        source.display(),
                        canonical.display(),
                        error
                    );
                    // `current` may already hold another slot's image; the aside copy is the original
                    if aside.is_some() {
                        self.slots[slot] = Some(source.clone());
                        self.touch(slot);
                    }
                    failures.push(SlotFailure { slot, source, error });
                }
            }
        }

        Ok(CommitReport { paths: self.stored_paths(), failures })
    }

    /// Give every placement whose source is another placement's target a
    /// staged copy of that source. Fails (writing nothing else) if a copy fails.
    fn copy_aside_overlapping(&self, placements: &mut [Placement]) -> Result<(), SlotError> {
        let targets: Vec<(usize, PathBuf)> =
            placements.iter().map(|p| (p.slot, p.canonical.clone())).collect();

        for index in 0..placements.len() {
            let placement = &placements[index];
            let overlaps = targets
                .iter()
                .any(|(slot, target)| *slot != placement.slot && same_file(&placement.current, target));
            if !overlaps {
                continue;
            }

            let aside = self
                .assets
                .new_staged_path(&store::dotted_extension(&placement.current));
            if let Err(source) = fs::copy(&placement.current, &aside) {
                for earlier in placements[..index].iter().filter_map(|p| p.aside.as_deref()) {
                    remove_best_effort(earlier);
                }
                return Err(SlotError::Io { path: aside, source });
            }
            log::debug!("Set {} aside as {}", placement.current.display(), aside.display());
            placements[index].aside = Some(aside);
        }
        Ok(())
    }

    /// Delete every slot file that is still staged. Committed files are kept.
    ///
    /// Returns the number of slots cleared.
    pub fn discard_staged(&mut self) -> usize {
        let mut cleared = 0;
        for slot in 0..SLOT_COUNT {
            if !self.is_staged(slot) {
                continue;
            }
            if let Some(path) = self.slots[slot].take() {
                remove_best_effort(&path);
                self.touch(slot);
                cleared += 1;
            }
        }
        cleared
    }

    /// Current slot contents in persisted form
    pub fn stored_paths(&self) -> ImagePaths {
        let mut paths = ImagePaths::default();
        for (slot, path) in self.slots.iter().enumerate() {
            paths.set(slot, path.as_deref().map(|p| self.assets.to_stored(p)));
        }
        paths
    }

    /// Look up or schedule thumbnails for every non-empty slot
    pub fn request_thumbnails(
        &mut self,
        thumbs: &mut ThumbnailCache,
    ) -> [Option<ThumbnailState>; SLOT_COUNT] {
        let mut states: [Option<ThumbnailState>; SLOT_COUNT] = Default::default();
        for slot in 0..SLOT_COUNT {
            let Some(path) = self.slots[slot].clone() else { continue };
            let state = thumbs.get_or_generate(&path);
            if state == ThumbnailState::Pending {
                self.pending.push(PendingThumb {
                    slot,
                    generation: self.generations[slot],
                    path,
                });
            }
            states[slot] = Some(state);
        }
        states
    }

    /// Match a delivered thumbnail to the slot that asked for it.
    ///
    /// Returns the slot to refresh, or `None` when the slot has since been
    /// replaced, deleted or committed under a new name.
    pub fn apply_thumbnail(&mut self, event: &ThumbnailEvent) -> Option<usize> {
        let mut target = None;
        self.pending.retain(|pending| {
            if pending.path != event.original {
                return true;
            }
            let current = self.slots[pending.slot].as_deref() == Some(pending.path.as_path());
            if current && pending.generation == self.generations[pending.slot] {
                target = Some(pending.slot);
            }
            false
        });
        target
    }

    fn touch(&mut self, slot: usize) {
        self.generations[slot] += 1;
    }
}

impl std::fmt::Debug for SlotEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotEditor")
            .field("slots", &self.slots)
            .field("selected", &self.selected)
            .finish()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn remove_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed staged image {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove staged image {}: {}", path.display(), e),
    }
}
