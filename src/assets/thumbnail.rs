use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Suffix appended to the original's stem to name its thumbnail
const THUMB_SUFFIX: &str = "_thumb";

/// Delivered on the interactive side when a background generation finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailEvent {
    pub original: PathBuf,
    pub success: bool,
    /// Invalidation epoch of `original` when the job was scheduled
    pub epoch: u64,
}

/// Answer of [`ThumbnailCache::get_or_generate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailState {
    /// A fresh thumbnail is on disk
    Ready(PathBuf),
    /// Generation is scheduled; show a placeholder for now
    Pending,
}

/// What a display element should render for an original image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySource {
    Thumbnail(PathBuf),
    Placeholder,
    /// Thumbnail generation failed; try the original at reduced size
    Original(PathBuf),
    /// Nothing usable, render the error placeholder
    Broken,
}

/// Cache path of the thumbnail for `original`: `<thumbs_dir>/<stem>_thumb<ext>`
pub fn thumbnail_path_for(thumbs_dir: &Path, original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = original
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    thumbs_dir.join(format!("{}{}{}", stem, THUMB_SUFFIX, ext))
}

/// Decode `original`, scale it into a `max_size` square (keeping the aspect
/// ratio) and write it to `thumb_path`.
///
/// The image is written beside the target first and renamed into place, so
/// readers never see a half-written thumbnail.
pub fn generate_thumbnail(original: &Path, thumb_path: &Path, max_size: u32) -> image::ImageResult<()> {
    let scaled = render_reduced(original, max_size)?;
    let format = ImageFormat::from_path(thumb_path)?;

    let file_name = thumb_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let partial = thumb_path.with_file_name(format!(".{}.part", file_name));

    // JPEG has no alpha channel
    let result = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(scaled.to_rgb8()).save_with_format(&partial, format)
    } else {
        scaled.save_with_format(&partial, format)
    };
    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    fs::rename(&partial, thumb_path).map_err(image::ImageError::IoError)?;
    log::debug!("📸 Generated thumbnail: {}", thumb_path.display());
    Ok(())
}

/// Decode an original and scale it in memory; the fallback when no thumbnail
/// can be written.
pub fn render_reduced(original: &Path, max_size: u32) -> image::ImageResult<DynamicImage> {
    let img = image::open(original)?;
    Ok(img.resize(max_size, max_size, FilterType::Lanczos3))
}

/// Thumbnail cache for one bounding-box size.
///
/// Lookups are synchronous and cheap; generation runs on the runtime's
/// blocking pool and reports back through the event channel returned by
/// [`ThumbnailCache::new`]. The owner must pass every received event to
/// [`ThumbnailCache::complete`].
pub struct ThumbnailCache {
    thumbs_dir: PathBuf,
    max_size: u32,
    runtime: Handle,
    events: UnboundedSender<ThumbnailEvent>,
    in_flight: HashSet<PathBuf>,
    failed: HashSet<PathBuf>,
    epochs: HashMap<PathBuf, u64>,
    scheduled: u64,
}

impl ThumbnailCache {
    pub fn new(
        thumbs_dir: impl Into<PathBuf>,
        max_size: u32,
        runtime: Handle,
    ) -> (Self, UnboundedReceiver<ThumbnailEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let cache = Self {
            thumbs_dir: thumbs_dir.into(),
            max_size,
            runtime,
            events,
            in_flight: HashSet::new(),
            failed: HashSet::new(),
            epochs: HashMap::new(),
            scheduled: 0,
        };
        (cache, receiver)
    }

    pub fn thumbs_dir(&self) -> &Path {
        &self.thumbs_dir
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn thumbnail_path_for(&self, original: &Path) -> PathBuf {
        thumbnail_path_for(&self.thumbs_dir, original)
    }

    /// The cached thumbnail, if present and not older than its original
    pub fn cached(&self, original: &Path) -> Option<PathBuf> {
        let thumb = self.thumbnail_path_for(original);
        let thumb_modified = fs::metadata(&thumb).and_then(|m| m.modified()).ok()?;

        match fs::metadata(original).and_then(|m| m.modified()) {
            Ok(original_modified) if original_modified > thumb_modified => None,
            _ => Some(thumb),
        }
    }

    /// Return the cached thumbnail or schedule its generation.
    ///
    /// Never blocks on decoding. Repeated calls while a job is running do not
    /// schedule a second job.
    pub fn get_or_generate(&mut self, original: &Path) -> ThumbnailState {
        if let Some(thumb) = self.cached(original) {
            return ThumbnailState::Ready(thumb);
        }
        if self.in_flight.contains(original) {
            return ThumbnailState::Pending;
        }

        self.failed.remove(original);
        self.in_flight.insert(original.to_path_buf());
        self.scheduled += 1;

        let epoch = self.epoch(original);
        let original = original.to_path_buf();
        let thumb_path = self.thumbnail_path_for(&original);
        let max_size = self.max_size;
        let events = self.events.clone();

        self.runtime.spawn_blocking(move || {
            let success = match generate_thumbnail(&original, &thumb_path, max_size) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Thumbnail generation failed for {}: {}", original.display(), e);
                    false
                }
            };
            // Receiver gone means the application is shutting down
            let _ = events.send(ThumbnailEvent { original, success, epoch });
        });

        ThumbnailState::Pending
    }

    /// Drop the cached derivative of `original` so the next lookup regenerates it.
    ///
    /// Jobs already running for `original` become stale; their output is
    /// discarded in [`complete`](Self::complete).
    pub fn invalidate(&mut self, original: &Path) {
        let thumb = self.thumbnail_path_for(original);
        match fs::remove_file(&thumb) {
            Ok(()) => log::debug!("Invalidated thumbnail {}", thumb.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove thumbnail {}: {}", thumb.display(), e),
        }

        *self.epochs.entry(original.to_path_buf()).or_insert(0) += 1;
        self.in_flight.remove(original);
        self.failed.remove(original);
    }

    /// Book-keeping for a delivered event. Returns `false` when the event
    /// belongs to an invalidated generation and must be ignored.
    pub fn complete(&mut self, event: &ThumbnailEvent) -> bool {
        if event.epoch != self.epoch(&event.original) {
            if event.success {
                let stale = self.thumbnail_path_for(&event.original);
                // A newer job may already be writing here; it will re-check on lookup
                let _ = fs::remove_file(stale);
            }
            log::debug!("Ignoring stale thumbnail for {}", event.original.display());
            return false;
        }

        self.in_flight.remove(&event.original);
        if !event.success {
            self.failed.insert(event.original.clone());
        }
        true
    }

    /// Decide what to show for `original` without scheduling any work
    pub fn display_source(&self, original: &Path) -> DisplaySource {
        if let Some(thumb) = self.cached(original) {
            DisplaySource::Thumbnail(thumb)
        } else if self.failed.contains(original) {
            if original.is_file() {
                DisplaySource::Original(original.to_path_buf())
            } else {
                DisplaySource::Broken
            }
        } else if original.is_file() {
            DisplaySource::Placeholder
        } else {
            DisplaySource::Broken
        }
    }

    /// Total number of generation jobs scheduled so far
    pub fn scheduled_count(&self) -> u64 {
        self.scheduled
    }

    pub fn is_pending(&self, original: &Path) -> bool {
        self.in_flight.contains(original)
    }

    fn epoch(&self, original: &Path) -> u64 {
        self.epochs.get(original).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("thumbs_dir", &self.thumbs_dir)
            .field("max_size", &self.max_size)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}
