/// Image asset module
///
/// This module handles:
/// - The on-disk directory of original images (store.rs)
/// - Staged `temp_*` files and the canonical `<id>-<n>.<ext>` naming scheme
/// - Generating and caching thumbnails off the interactive thread (thumbnail.rs)

pub mod store;
pub mod thumbnail;

pub use store::AssetStore;
pub use thumbnail::{DisplaySource, ThumbnailCache, ThumbnailEvent, ThumbnailState};
