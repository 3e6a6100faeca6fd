//! Application controller.
//!
//! Owns the catalog state and turns user actions ([`Message`]) into calls on
//! the library, the edit session and the thumbnail cache. Front ends (the CLI
//! in `main.rs`) only build messages and print the status line.

use crate::assets::{
    store, thumbnail, AssetStore, DisplaySource, ThumbnailCache, ThumbnailEvent, ThumbnailState,
};
use crate::config::{AppPaths, Settings};
use crate::error::{CatalogError, Result, SlotError};
use crate::state::data::{Artist, ArtistFilter, TextField, SLOT_COUNT};
use crate::state::edit::EditSession;
use crate::state::library::Library;
use crate::transfer::{self, ImportOutcome};
use image::DynamicImage;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

/// Change to one image slot inside an add/edit action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    /// Use an existing image file (drag and drop)
    File { slot: usize, path: PathBuf },
    /// Decode any image and store it as a staged PNG (clipboard paste)
    Bitmap { slot: usize, path: PathBuf },
    /// Empty the slot
    Clear { slot: usize },
}

/// Field values for an add/edit action; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistDraft {
    pub artist_id: Option<String>,
    pub display_name: Option<String>,
    pub biography: Option<String>,
    pub notes: Option<String>,
    pub marked: Option<bool>,
    pub images: Vec<ImageChange>,
}

/// Application messages (user actions and background completions)
#[derive(Debug, Clone)]
pub enum Message {
    Add(ArtistDraft),
    Edit { row_key: String, draft: ArtistDraft },
    Delete(String),
    SetText { row_key: String, field: TextField, value: String },
    SetMarked { row_key: String, marked: bool },
    SetFilter(ArtistFilter),
    Import(PathBuf),
    Export(PathBuf),
    ThumbnailReady(ThumbnailEvent),
}

/// Counts from a grid thumbnail pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThumbnailSummary {
    pub cached: usize,
    pub generated: usize,
    pub failed: usize,
}

pub struct App {
    paths: AppPaths,
    settings: Settings,
    library: Library,
    assets: AssetStore,
    thumbs: ThumbnailCache,
    events: UnboundedReceiver<ThumbnailEvent>,
    filter: ArtistFilter,
    status: String,
}

impl App {
    /// Prepare directories, reclaim stale temp files and open the database
    pub fn startup(paths: AppPaths, runtime: Handle) -> Result<Self> {
        let settings_path = paths.settings_path();
        let settings = Settings::load(&settings_path)?;
        if !settings_path.exists() {
            // Leave an editable file with the defaults behind
            if let Err(e) = settings.save(&settings_path) {
                log::warn!("Could not write {}: {}", settings_path.display(), e);
            }
        }

        let assets = AssetStore::new(&paths);
        assets.ensure_directories()?;

        let library = Library::open(&paths.db_path)?;
        assets.sweep_temporary(&referenced_staged(&library, &assets)?);
        let (thumbs, events) =
            ThumbnailCache::new(&paths.thumbs_dir, settings.grid_thumbnail_size, runtime);

        let count = library.artist_count()?;
        log::info!("🎨 Artist catalog initialized with {} artists", count);

        Ok(Self {
            paths,
            settings,
            library,
            assets,
            thumbs,
            events,
            filter: ArtistFilter::default(),
            status: format!("Ready. {} artists in catalog.", count),
        })
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Last status line
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Handle a message and update the status line
    pub fn update(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Add(draft) => {
                let mut session = EditSession::create(self.assets.clone());
                self.apply_draft(&mut session, &draft)?;
                let outcome = session.save(&self.library, &mut self.thumbs)?;
                self.status = format!("Added {}.", outcome.artist.artist_id);
                self.note_failures(outcome.failures.len());
            }
            Message::Edit { row_key, draft } => {
                let artist = self.find(&row_key)?;
                let mut session = EditSession::edit(self.assets.clone(), &artist);
                self.apply_draft(&mut session, &draft)?;
                let outcome = session.save(&self.library, &mut self.thumbs)?;
                self.status = format!("Saved {}.", outcome.artist.artist_id);
                self.note_failures(outcome.failures.len());
            }
            Message::Delete(row_key) => {
                let artist = self.find(&row_key)?;
                // Images stay on disk; they can be re-linked by name later
                self.library.delete(&artist.row_key)?;
                self.status = format!("Deleted {}.", artist.artist_id);
            }
            Message::SetText { row_key, field, value } => {
                let artist = self.find(&row_key)?;
                self.library.update_field(&artist.row_key, field, &value)?;
                self.status = format!("Updated {}.", artist.artist_id);
            }
            Message::SetMarked { row_key, marked } => {
                let artist = self.find(&row_key)?;
                self.library.set_marked(&artist.row_key, marked)?;
                self.status = format!(
                    "{} {}.",
                    if marked { "Marked" } else { "Unmarked" },
                    artist.artist_id
                );
            }
            Message::SetFilter(filter) => {
                self.filter = filter;
                self.status = format!("{} artists match.", self.visible()?.len());
            }
            Message::Import(path) => {
                let ImportOutcome { imported, linked_images, .. } =
                    transfer::import_tabular(&path, &mut self.library, &self.assets)?;
                self.status = format!(
                    "✅ Import complete! Added {} artists, linked {} images.",
                    imported, linked_images
                );
            }
            Message::Export(path) => {
                let visible = self.visible()?;
                let count = transfer::export_tabular(&path, &visible)?;
                self.status = format!("✅ Exported {} artists to {}.", count, path.display());
            }
            Message::ThumbnailReady(event) => {
                if self.thumbs.complete(&event) && !event.success {
                    self.status = format!("⚠️  No thumbnail for {}", event.original.display());
                }
            }
        }
        Ok(())
    }

    /// Look up by record key, falling back to the visible artist id
    pub fn find(&self, key: &str) -> Result<Artist> {
        if let Some(artist) = self.library.get(key)? {
            return Ok(artist);
        }
        self.library
            .find_by_artist_id(key)?
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))
    }

    /// Records passing the current filter, in creation order
    pub fn visible(&self) -> Result<Vec<Artist>> {
        Ok(self
            .library
            .get_all()?
            .into_iter()
            .filter(|a| self.filter.matches(a))
            .collect())
    }

    /// Previous and next records for sequential navigation
    pub fn neighbors(&self, row_key: &str) -> Result<(Option<Artist>, Option<Artist>)> {
        Ok((
            self.library.neighbor_before(row_key)?,
            self.library.neighbor_after(row_key)?,
        ))
    }

    /// What the grid should show for each slot of `artist`
    pub fn display_sources(&self, artist: &Artist) -> Vec<Option<DisplaySource>> {
        artist
            .images
            .iter()
            .map(|stored| stored.map(|s| self.thumbs.display_source(&self.assets.resolve(s))))
            .collect()
    }

    /// Ensure grid thumbnails for every visible record and wait for the
    /// background jobs to report back.
    pub async fn refresh_thumbnails(&mut self) -> Result<ThumbnailSummary> {
        let mut summary = ThumbnailSummary::default();
        let mut pending = HashSet::new();

        for artist in self.visible()? {
            for stored in artist.images.iter().flatten() {
                let original = self.assets.resolve(stored);
                match self.thumbs.get_or_generate(&original) {
                    ThumbnailState::Ready(_) => summary.cached += 1,
                    ThumbnailState::Pending => {
                        pending.insert(original);
                    }
                }
            }
        }

        while !pending.is_empty() {
            let Some(event) = self.events.recv().await else { break };
            if !self.thumbs.complete(&event) || !pending.remove(&event.original) {
                continue;
            }
            if event.success {
                summary.generated += 1;
            } else {
                summary.failed += 1;
            }
        }

        self.status = format!(
            "Thumbnails: {} cached, {} generated, {} failed.",
            summary.cached, summary.generated, summary.failed
        );
        Ok(summary)
    }

    /// Thumbnails for the editor view of one record.
    ///
    /// Requests go through the record's slot editor, and a delivered result is
    /// only taken for a slot that still shows the image it was requested for.
    /// Waits until every requested thumbnail has reported back.
    pub async fn editor_thumbnails(&mut self, key: &str) -> Result<Vec<Option<DisplaySource>>> {
        let artist = self.find(key)?;
        let mut session = EditSession::edit(self.assets.clone(), &artist);

        let states = session.slots_mut().request_thumbnails(&mut self.thumbs);
        let mut waiting: HashSet<PathBuf> = HashSet::new();
        for (slot, state) in states.iter().enumerate() {
            if *state == Some(ThumbnailState::Pending) {
                if let Some(path) = session.slots().slot(slot) {
                    waiting.insert(path.to_path_buf());
                }
            }
        }

        while !waiting.is_empty() {
            let Some(event) = self.events.recv().await else { break };
            if !self.thumbs.complete(&event) {
                continue;
            }
            waiting.remove(&event.original);
            if let Some(slot) = session.slots_mut().apply_thumbnail(&event) {
                log::debug!("Thumbnail for slot {} of {} is ready", slot + 1, artist.artist_id);
            }
        }

        let sources = (0..SLOT_COUNT)
            .map(|slot| session.slots().slot(slot).map(|path| self.thumbs.display_source(path)))
            .collect();
        session.cancel();
        Ok(sources)
    }

    /// Apply every thumbnail completion delivered so far without waiting
    pub fn poll_thumbnails(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.update(Message::ThumbnailReady(event))?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Editor-sized rendering of a stored image, decoded on demand
    pub fn render_preview(&self, stored: &str) -> Result<DynamicImage> {
        let original = self.assets.resolve(stored);
        Ok(thumbnail::render_reduced(&original, self.settings.preview_size)?)
    }

    /// Remove leftover staged images
    pub fn sweep(&mut self) -> Result<usize> {
        let keep = referenced_staged(&self.library, &self.assets)?;
        let removed = self.assets.sweep_temporary(&keep);
        self.status = format!("Removed {} temporary images.", removed);
        Ok(removed)
    }

    fn apply_draft(&self, session: &mut EditSession, draft: &ArtistDraft) -> Result<()> {
        if let Some(artist_id) = &draft.artist_id {
            session.artist_id = artist_id.clone();
        }
        if let Some(name) = &draft.display_name {
            session.display_name = name.clone();
        }
        if let Some(bio) = &draft.biography {
            session.biography = bio.clone();
        }
        if let Some(notes) = &draft.notes {
            session.notes = notes.clone();
        }
        if let Some(marked) = draft.marked {
            session.marked = marked;
        }

        let slots = session.slots_mut();
        for change in &draft.images {
            let (ImageChange::File { slot, .. }
            | ImageChange::Bitmap { slot, .. }
            | ImageChange::Clear { slot }) = change;
            if !slots.select(*slot) {
                return Err(SlotError::InvalidSlot(*slot).into());
            }

            match change {
                ImageChange::File { path, .. } => {
                    slots.stage(path)?;
                }
                ImageChange::Bitmap { path, .. } => {
                    let bitmap = image::open(path)?;
                    slots.stage_bitmap(&bitmap)?;
                }
                ImageChange::Clear { .. } => {
                    slots.delete_selected();
                }
            }
        }
        slots.clear_selection();
        Ok(())
    }

    fn note_failures(&mut self, failures: usize) {
        if failures > 0 {
            self.status
                .push_str(&format!(" ⚠️  {} image(s) kept their old name.", failures));
        }
    }
}

/// Staged files that a stored record points at, left there by a failed commit
fn referenced_staged(library: &Library, assets: &AssetStore) -> Result<HashSet<PathBuf>> {
    let mut referenced = HashSet::new();
    for artist in library.get_all()? {
        for stored in artist.images.iter().flatten() {
            let path = assets.resolve(stored);
            if store::is_staged(&path) {
                referenced.insert(path);
            }
        }
    }
    Ok(referenced)
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("paths", &self.paths)
            .field("filter", &self.filter)
            .finish()
    }
}
