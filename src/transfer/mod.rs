//! Bulk import/export of artist records to tabular files.
//!
//! Only the scalar fields travel through the file. On import, images are
//! re-linked purely by file name: `<artist_id>-<n>.{png,jpg,jpeg}` in the
//! images directory.
//!
//! - `.xlsx` files go through the spreadsheet backend (excel.rs)
//! - anything else is tab-separated text (text.rs)

pub mod excel;
pub mod text;

use crate::assets::{store, AssetStore};
use crate::error::{ImportError, Result};
use crate::state::data::Artist;
use crate::state::library::Library;
use std::path::Path;

/// Column order of exported files
pub const COLUMNS: [&str; 5] = ["artist_id", "display_name", "biography", "notes", "marked"];

/// Columns an imported file must have; `marked` is optional
const REQUIRED_COLUMNS: usize = 4;

/// Headers written by earlier versions of the application
const LEGACY_HEADERS: [(&str, &str); 4] = [
    ("画师ID", "artist_id"),
    ("常用名", "display_name"),
    ("简介", "biography"),
    ("备注", "notes"),
];

/// File format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    /// Tab-separated UTF-8 text
    Text,
    /// Excel workbook (first worksheet)
    Spreadsheet,
}

impl TabularFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().map(|e| e.to_string_lossy().to_lowercase()) {
            Some(ext) if ext == "xlsx" => TabularFormat::Spreadsheet,
            _ => TabularFormat::Text,
        }
    }
}

/// Scalar fields of one data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularRow {
    pub artist_id: String,
    pub display_name: String,
    pub biography: String,
    pub notes: String,
    pub marked: bool,
}

impl TabularRow {
    pub fn from_artist(artist: &Artist) -> Self {
        Self {
            artist_id: artist.artist_id.clone(),
            display_name: artist.display_name.clone(),
            biography: artist.biography.clone(),
            notes: artist.notes.clone(),
            marked: artist.marked,
        }
    }

    /// Cells in [`COLUMNS`] order
    pub fn cells(&self) -> [String; 5] {
        [
            self.artist_id.clone(),
            self.display_name.clone(),
            self.biography.clone(),
            self.notes.clone(),
            if self.marked { "1".into() } else { "0".into() },
        ]
    }
}

/// Summary of a finished import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Records inserted
    pub imported: usize,
    /// Image files linked to the new records
    pub linked_images: usize,
    /// Empty lines ignored
    pub skipped_blank: usize,
}

/// Write the scalar fields of `artists` to `path`, header first.
///
/// Callers pass the records currently visible (after filtering).
pub fn export_tabular(path: &Path, artists: &[Artist]) -> Result<usize> {
    let rows: Vec<TabularRow> = artists.iter().map(TabularRow::from_artist).collect();

    match TabularFormat::from_path(path) {
        TabularFormat::Text => {
            let writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
            text::write_rows(writer, &rows)?;
        }
        TabularFormat::Spreadsheet => excel::write_rows(path, &rows)?,
    }

    log::info!("📤 Exported {} artists to {}", rows.len(), path.display());
    Ok(rows.len())
}

/// Import every row of `path` as a new record.
///
/// The whole file is parsed before anything is written, and all rows are
/// inserted in one transaction: a structural error anywhere means nothing is
/// imported.
pub fn import_tabular(path: &Path, library: &mut Library, assets: &AssetStore) -> Result<ImportOutcome> {
    let table = match TabularFormat::from_path(path) {
        TabularFormat::Text => {
            let reader = text::reader_builder().from_path(path)?;
            text::read_table(reader)?
        }
        TabularFormat::Spreadsheet => excel::read_table(path)?,
    };

    let (rows, skipped_blank) = parse_table(table)?;

    let mut linked_images = 0;
    let artists: Vec<Artist> = rows
        .into_iter()
        .map(|row| {
            let mut artist = Artist::new(row.artist_id, row.display_name);
            artist.biography = row.biography;
            artist.notes = row.notes;
            artist.marked = row.marked;
            artist.images = assets.find_canonical(&artist.artist_id);
            linked_images += artist.images.present_count();
            artist
        })
        .collect();

    let imported = library.insert_all(&artists)?;
    log::info!(
        "📥 Imported {} artists ({} images linked) from {}",
        imported,
        linked_images,
        path.display()
    );

    Ok(ImportOutcome { imported, linked_images, skipped_blank })
}

/// Position of each known column in the header row
#[derive(Debug)]
struct ColumnMap([Option<usize>; 5]);

fn map_header(header: &[String]) -> std::result::Result<ColumnMap, ImportError> {
    let mut map = [None; 5];
    for (index, raw) in header.iter().enumerate() {
        let name = raw.trim().trim_start_matches('\u{feff}');
        let name = LEGACY_HEADERS
            .iter()
            .find(|(legacy, _)| *legacy == name)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(name);

        if let Some(column) = COLUMNS.iter().position(|c| c.eq_ignore_ascii_case(name)) {
            map[column].get_or_insert(index);
        }
    }

    let missing: Vec<String> = COLUMNS[..REQUIRED_COLUMNS]
        .iter()
        .zip(map.iter())
        .filter(|(_, found)| found.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }
    Ok(ColumnMap(map))
}

fn parse_marked(value: &str, line: usize) -> std::result::Result<bool, ImportError> {
    match value.trim().to_lowercase().as_str() {
        "" | "0" | "false" | "no" | "n" => Ok(false),
        "1" | "true" | "yes" | "y" | "x" => Ok(true),
        other => Err(ImportError::MalformedRow {
            line,
            reason: format!("invalid marked value '{}'", other),
        }),
    }
}

/// Turn raw cells (header row first) into rows. Returns the rows and the
/// number of blank lines skipped.
pub(crate) fn parse_table(
    table: Vec<(usize, Vec<String>)>,
) -> std::result::Result<(Vec<TabularRow>, usize), ImportError> {
    let mut lines = table.into_iter();
    let Some((_, header)) = lines.next() else {
        let all = COLUMNS[..REQUIRED_COLUMNS].iter().map(|c| c.to_string()).collect();
        return Err(ImportError::MissingColumns(all));
    };
    let ColumnMap(map) = map_header(&header)?;

    let required_width = map[..REQUIRED_COLUMNS].iter().flatten().max().map_or(0, |m| m + 1);

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (line, cells) in lines {
        if cells.iter().all(|c| c.trim().is_empty()) {
            skipped += 1;
            continue;
        }
        if cells.len() < required_width {
            return Err(ImportError::MalformedRow {
                line,
                reason: format!("expected at least {} fields, found {}", required_width, cells.len()),
            });
        }

        let cell = |column: usize| -> String {
            map[column]
                .and_then(|index| cells.get(index))
                .cloned()
                .unwrap_or_default()
        };

        let artist_id = cell(0).trim().to_string();
        if artist_id.is_empty() {
            return Err(ImportError::MalformedRow { line, reason: "empty artist id".into() });
        }
        if !store::is_safe_file_stem(&artist_id) {
            return Err(ImportError::MalformedRow {
                line,
                reason: format!("artist id '{}' cannot be used in a file name", artist_id),
            });
        }

        // Same default as creating a record by hand
        let mut display_name = cell(1).trim().to_string();
        if display_name.is_empty() {
            display_name = artist_id.clone();
        }

        rows.push(TabularRow {
            artist_id,
            display_name,
            biography: cell(2),
            notes: cell(3),
            marked: parse_marked(&cell(4), line)?,
        });
    }
    Ok((rows, skipped))
}
