//! Shared data structures for the application state
//!
//! These structs represent the data model that flows between
//! the database layer, the image slot editor and the bulk transfer code.

use chrono::Utc;

/// Number of reference image slots per artist
pub const SLOT_COUNT: usize = 3;

/// Separator of the persisted `image_paths` column
const PATH_SEPARATOR: char = ';';

/// A single artist record
#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    /// Opaque unique key, never changes once assigned
    pub row_key: String,
    /// User-visible identifier (also the stem of canonical image names)
    pub artist_id: String,
    pub display_name: String,
    pub biography: String,
    pub notes: String,
    pub marked: bool,
    /// Stored image paths, relative to the images directory when possible
    pub images: ImagePaths,
    /// Unix timestamp of creation
    pub created_at: i64,
}

impl Artist {
    /// Create a new record with a freshly generated key and no images
    pub fn new(artist_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            row_key: Self::generate_key(),
            artist_id: artist_id.into(),
            display_name: display_name.into(),
            biography: String::new(),
            notes: String::new(),
            marked: false,
            images: ImagePaths::default(),
            created_at: Utc::now().timestamp(),
        }
    }

    /// Generate a new opaque record key
    pub fn generate_key() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// The three image slots of a record, as stored strings.
///
/// Wire format: always three `;`-separated tokens, an empty token for an
/// empty slot (`"A1-1.png;;A1-3.jpg"`). Older databases stored only the
/// present entries; [`ImagePaths::decode`] still accepts those.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePaths([Option<String>; SLOT_COUNT]);

impl ImagePaths {
    pub fn new(slots: [Option<String>; SLOT_COUNT]) -> Self {
        Self(slots)
    }

    pub fn get(&self, slot: usize) -> Option<&str> {
        self.0.get(slot).and_then(|s| s.as_deref())
    }

    /// Set a slot. Out-of-range indices are ignored.
    pub fn set(&mut self, slot: usize, value: Option<String>) {
        if let Some(entry) = self.0.get_mut(slot) {
            *entry = value.filter(|v| !v.is_empty());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().map(|s| s.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn present_count(&self) -> usize {
        self.0.iter().filter(|s| s.is_some()).count()
    }

    /// Encode to the positional wire format
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|s| s.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(&PATH_SEPARATOR.to_string())
    }

    /// Decode the wire format, accepting legacy sparse strings
    pub fn decode(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Self::default();
        }

        let tokens: Vec<&str> = raw.split(PATH_SEPARATOR).map(str::trim).collect();
        if tokens.len() == SLOT_COUNT {
            let mut paths = Self::default();
            for (slot, token) in tokens.into_iter().enumerate() {
                paths.set(slot, Some(token.to_string()));
            }
            return paths;
        }

        Self::decode_legacy(tokens.into_iter().filter(|t| !t.is_empty()))
    }

    /// Legacy strings omit empty slots. Canonical names carry their slot
    /// number; anything else takes the first free slot in order.
    fn decode_legacy<'a>(tokens: impl Iterator<Item = &'a str>) -> Self {
        let mut paths = Self::default();
        let mut loose = Vec::new();

        for token in tokens {
            match canonical_slot(token) {
                Some(slot) if paths.0[slot].is_none() => paths.0[slot] = Some(token.to_string()),
                _ => loose.push(token),
            }
        }

        for token in loose {
            match paths.0.iter().position(Option::is_none) {
                Some(slot) => paths.0[slot] = Some(token.to_string()),
                None => {
                    log::warn!("Dropping extra image path '{}' from legacy record", token);
                }
            }
        }
        paths
    }
}

/// Slot index encoded in a canonical name (`<id>-<n>.<ext>` with n in 1..=3)
fn canonical_slot(name: &str) -> Option<usize> {
    let file_name = std::path::Path::new(name).file_stem()?.to_str()?;
    let (_, number) = file_name.rsplit_once('-')?;
    match number.parse::<usize>() {
        Ok(n) if (1..=SLOT_COUNT).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Case-insensitive substring filter over id and display name
#[derive(Debug, Clone, Default)]
pub struct ArtistFilter {
    pub id: String,
    pub name: String,
}

impl ArtistFilter {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }

    pub fn matches(&self, artist: &Artist) -> bool {
        let contains = |haystack: &str, needle: &str| {
            needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
        };
        contains(&artist.artist_id, &self.id) && contains(&artist.display_name, &self.name)
    }
}

/// Scalar text fields that can be edited in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    DisplayName,
    Biography,
    Notes,
}

impl TextField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            TextField::DisplayName => "display_name",
            TextField::Biography => "biography",
            TextField::Notes => "notes",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(a: Option<&str>, b: Option<&str>, c: Option<&str>) -> ImagePaths {
        ImagePaths::new([a.map(String::from), b.map(String::from), c.map(String::from)])
    }

    #[test]
    fn test_encode_is_positional() {
        assert_eq!(paths(Some("A1-1.png"), None, Some("A1-3.jpg")).encode(), "A1-1.png;;A1-3.jpg");
        assert_eq!(ImagePaths::default().encode(), ";;");
    }

    #[test]
    fn test_decode_positional() {
        let decoded = ImagePaths::decode("A1-1.png;;A1-3.jpg");
        assert_eq!(decoded, paths(Some("A1-1.png"), None, Some("A1-3.jpg")));
        assert!(ImagePaths::decode(";;").is_empty());
        assert!(ImagePaths::decode("").is_empty());
    }

    #[test]
    fn test_decode_legacy_sparse() {
        // Slot 1 was empty and omitted
        let decoded = ImagePaths::decode("A1-1.png;A1-3.jpg");
        assert_eq!(decoded, paths(Some("A1-1.png"), None, Some("A1-3.jpg")));

        // Non-canonical names fill in order
        let decoded = ImagePaths::decode("photo.png");
        assert_eq!(decoded, paths(Some("photo.png"), None, None));

        let decoded = ImagePaths::decode("x.png;A1-1.png");
        assert_eq!(decoded, paths(Some("A1-1.png"), Some("x.png"), None));
    }

    #[test]
    fn test_set_ignores_out_of_range_and_empty() {
        let mut p = ImagePaths::default();
        p.set(7, Some("x.png".into()));
        p.set(0, Some(String::new()));
        assert!(p.is_empty());
    }

    #[test]
    fn test_filter() {
        let mut artist = Artist::new("Alpha01", "Blue Heron");
        artist.notes = "ignored".into();

        assert!(ArtistFilter::default().matches(&artist));
        assert!(ArtistFilter::new("alpha", "").matches(&artist));
        assert!(ArtistFilter::new("", "HERON").matches(&artist));
        assert!(!ArtistFilter::new("alpha", "crane").matches(&artist));
    }

    #[test]
    fn test_new_artists_get_distinct_keys() {
        let a = Artist::new("A", "a");
        let b = Artist::new("A", "a");
        assert_ne!(a.row_key, b.row_key);
        assert!(a.images.is_empty());
    }
}
