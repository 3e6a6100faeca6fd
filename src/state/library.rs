use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::{Path, PathBuf};
use super::data::{Artist, ImagePaths, TextField};

/// Columns selected for every artist query, in `row_to_artist` order
const ARTIST_COLUMNS: &str =
    "row_key, artist_id, display_name, biography, image_paths, notes, marked, created_at";

/// The Library manages the SQLite catalog database.
/// It stores artist records; image paths are kept as one opaque string column.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open (or create) the catalog database at `db_path` and initialize the schema.
    pub fn open(db_path: &Path) -> SqlResult<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create data directory {}: {}", parent.display(), e);
            }
        }

        let conn = Connection::open(db_path)?;
        log::info!("📁 Database opened at: {}", db_path.display());

        let library = Library { conn, db_path: db_path.to_path_buf() };
        library.init_schema()?;
        Ok(library)
    }

    /// In-memory catalog, mostly for tests
    pub fn open_in_memory() -> SqlResult<Self> {
        let library = Library {
            conn: Connection::open_in_memory()?,
            db_path: PathBuf::from(":memory:"),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&self) -> SqlResult<()> {
        // `id` gives the creation order used for neighbor lookups
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS artists (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                row_key         TEXT NOT NULL UNIQUE,
                artist_id       TEXT NOT NULL,
                display_name    TEXT NOT NULL,
                biography       TEXT NOT NULL DEFAULT '',
                image_paths     TEXT NOT NULL DEFAULT '',
                notes           TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;

        // Columns added after the first release. If the column already exists
        // the ALTER fails and is ignored.
        let _ = self.conn.execute(
            "ALTER TABLE artists ADD COLUMN marked INTEGER NOT NULL DEFAULT 0",
            [],
        );
        let _ = self.conn.execute(
            "ALTER TABLE artists ADD COLUMN created_at INTEGER NOT NULL DEFAULT 0",
            [],
        );

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_artists_artist_id ON artists(artist_id)",
            [],
        )?;

        log::debug!("✅ Database schema initialized");
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Get a count of artists in the library
    pub fn artist_count(&self) -> SqlResult<i64> {
        self.conn.query_row("SELECT COUNT(*) FROM artists", [], |row| row.get(0))
    }

    /// Insert a new artist
    pub fn insert(&self, artist: &Artist) -> SqlResult<()> {
        insert_artist(&self.conn, artist)
    }

    /// Insert many artists in one transaction: either all rows are stored or none
    pub fn insert_all(&mut self, artists: &[Artist]) -> SqlResult<usize> {
        let tx = self.conn.transaction()?;
        for artist in artists {
            insert_artist(&tx, artist)?;
        }
        tx.commit()?;
        Ok(artists.len())
    }

    /// Overwrite every mutable field of an existing artist.
    /// Returns false if no row has this key.
    pub fn update(&self, artist: &Artist) -> SqlResult<bool> {
        let changed = self.conn.execute(
            "UPDATE artists
             SET artist_id = ?1, display_name = ?2, biography = ?3,
                 image_paths = ?4, notes = ?5, marked = ?6
             WHERE row_key = ?7",
            params![
                artist.artist_id,
                artist.display_name,
                artist.biography,
                artist.images.encode(),
                artist.notes,
                artist.marked,
                artist.row_key,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Update one text column in place
    pub fn update_field(&self, row_key: &str, field: TextField, value: &str) -> SqlResult<bool> {
        let sql = format!("UPDATE artists SET {} = ?1 WHERE row_key = ?2", field.column());
        Ok(self.conn.execute(&sql, params![value, row_key])? > 0)
    }

    pub fn set_marked(&self, row_key: &str, marked: bool) -> SqlResult<bool> {
        Ok(self.conn.execute(
            "UPDATE artists SET marked = ?1 WHERE row_key = ?2",
            params![marked, row_key],
        )? > 0)
    }

    /// Delete an artist. Image files are left on disk.
    pub fn delete(&self, row_key: &str) -> SqlResult<bool> {
        Ok(self.conn.execute("DELETE FROM artists WHERE row_key = ?1", [row_key])? > 0)
    }

    pub fn get(&self, row_key: &str) -> SqlResult<Option<Artist>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM artists WHERE row_key = ?1", ARTIST_COLUMNS),
                [row_key],
                row_to_artist,
            )
            .optional()
    }

    /// First artist (in creation order) whose visible id matches exactly
    pub fn find_by_artist_id(&self, artist_id: &str) -> SqlResult<Option<Artist>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM artists WHERE artist_id = ?1 ORDER BY id LIMIT 1",
                    ARTIST_COLUMNS
                ),
                [artist_id],
                row_to_artist,
            )
            .optional()
    }

    /// Get all artists in creation order
    pub fn get_all(&self) -> SqlResult<Vec<Artist>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM artists ORDER BY id", ARTIST_COLUMNS))?;

        let artist_iter = stmt.query_map([], row_to_artist)?;

        let mut artists = Vec::new();
        for artist in artist_iter {
            artists.push(artist?);
        }
        Ok(artists)
    }

    /// The artist created just before `row_key`, or None at the start of the list
    pub fn neighbor_before(&self, row_key: &str) -> SqlResult<Option<Artist>> {
        self.neighbor(row_key, "<", "DESC")
    }

    /// The artist created just after `row_key`, or None at the end of the list
    pub fn neighbor_after(&self, row_key: &str) -> SqlResult<Option<Artist>> {
        self.neighbor(row_key, ">", "ASC")
    }

    fn neighbor(&self, row_key: &str, cmp: &str, order: &str) -> SqlResult<Option<Artist>> {
        let sql = format!(
            "SELECT {cols} FROM artists
             WHERE id {cmp} (SELECT id FROM artists WHERE row_key = ?1)
             ORDER BY id {order} LIMIT 1",
            cols = ARTIST_COLUMNS,
            cmp = cmp,
            order = order,
        );
        self.conn.query_row(&sql, [row_key], row_to_artist).optional()
    }
}

fn insert_artist(conn: &Connection, artist: &Artist) -> SqlResult<()> {
    conn.execute(
        "INSERT INTO artists
            (row_key, artist_id, display_name, biography, image_paths, notes, marked, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            artist.row_key,
            artist.artist_id,
            artist.display_name,
            artist.biography,
            artist.images.encode(),
            artist.notes,
            artist.marked,
            artist.created_at,
        ],
    )?;
    Ok(())
}

fn row_to_artist(row: &Row<'_>) -> SqlResult<Artist> {
    let image_paths: String = row.get(4)?;
    Ok(Artist {
        row_key: row.get(0)?,
        artist_id: row.get(1)?,
        display_name: row.get(2)?,
        biography: row.get(3)?,
        images: ImagePaths::decode(&image_paths),
        notes: row.get(5)?,
        marked: row.get(6)?,
        created_at: row.get(7)?,
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artist(id: &str) -> Artist {
        let mut a = Artist::new(id, format!("Name of {}", id));
        a.biography = "bio".into();
        a
    }

    #[test]
    fn test_crud_round_trip() {
        let lib = Library::open_in_memory().unwrap();
        let mut a = artist("A1");
        a.images.set(0, Some("A1-1.png".into()));
        lib.insert(&a).unwrap();
        assert_eq!(lib.artist_count().unwrap(), 1);

        let loaded = lib.get(&a.row_key).unwrap().unwrap();
        assert_eq!(loaded, a);

        a.artist_id = "A1-renamed".into();
        a.marked = true;
        a.images.set(2, Some("A1-renamed-3.jpg".into()));
        assert!(lib.update(&a).unwrap());
        assert_eq!(lib.get(&a.row_key).unwrap().unwrap(), a);

        assert!(lib.delete(&a.row_key).unwrap());
        assert!(lib.get(&a.row_key).unwrap().is_none());
        assert!(!lib.delete(&a.row_key).unwrap());
    }

    #[test]
    fn test_update_unknown_key() {
        let lib = Library::open_in_memory().unwrap();
        assert!(!lib.update(&artist("ghost")).unwrap());
    }

    #[test]
    fn test_inline_field_edit() {
        let lib = Library::open_in_memory().unwrap();
        let a = artist("A1");
        lib.insert(&a).unwrap();

        assert!(lib.update_field(&a.row_key, TextField::Notes, "new notes").unwrap());
        assert!(lib.update_field(&a.row_key, TextField::DisplayName, "Renamed").unwrap());
        assert!(lib.set_marked(&a.row_key, true).unwrap());

        let loaded = lib.get(&a.row_key).unwrap().unwrap();
        assert_eq!(loaded.notes, "new notes");
        assert_eq!(loaded.display_name, "Renamed");
        assert!(loaded.marked);
    }

    #[test]
    fn test_neighbors_follow_creation_order() {
        let lib = Library::open_in_memory().unwrap();
        let (a, b, c) = (artist("A"), artist("B"), artist("C"));
        for x in [&a, &b, &c] {
            lib.insert(x).unwrap();
        }

        assert_eq!(lib.neighbor_before(&b.row_key).unwrap().unwrap().artist_id, "A");
        assert_eq!(lib.neighbor_after(&b.row_key).unwrap().unwrap().artist_id, "C");
        assert!(lib.neighbor_before(&a.row_key).unwrap().is_none());
        assert!(lib.neighbor_after(&c.row_key).unwrap().is_none());
        assert!(lib.neighbor_after("no-such-key").unwrap().is_none());

        lib.delete(&b.row_key).unwrap();
        assert_eq!(lib.neighbor_after(&a.row_key).unwrap().unwrap().artist_id, "C");
    }

    #[test]
    fn test_insert_all_is_atomic() {
        let mut lib = Library::open_in_memory().unwrap();
        let a = artist("A");
        let dup = Artist { artist_id: "dup".into(), ..a.clone() };

        assert!(lib.insert_all(&[a.clone(), dup]).is_err());
        assert_eq!(lib.artist_count().unwrap(), 0);

        assert_eq!(lib.insert_all(&[a, artist("B")]).unwrap(), 2);
        assert_eq!(lib.get_all().unwrap().len(), 2);
    }

    #[test]
    fn test_legacy_rows_are_decoded() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("artists.db");
        {
            // Schema of the first release: no marked/created_at, sparse image list
            let conn = Connection::open(&db_path).unwrap();
            conn.execute_batch(
                "CREATE TABLE artists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    row_key TEXT NOT NULL UNIQUE,
                    artist_id TEXT NOT NULL,
                    display_name TEXT NOT NULL,
                    biography TEXT NOT NULL DEFAULT '',
                    image_paths TEXT NOT NULL DEFAULT '',
                    notes TEXT NOT NULL DEFAULT ''
                );
                INSERT INTO artists (row_key, artist_id, display_name, image_paths)
                VALUES ('k1', 'A1', 'Old', 'A1-1.png;A1-3.png');",
            )
            .unwrap();
        }

        let lib = Library::open(&db_path).unwrap();
        let old = lib.get("k1").unwrap().unwrap();
        assert!(!old.marked);
        assert_eq!(old.images.get(0), Some("A1-1.png"));
        assert_eq!(old.images.get(1), None);
        assert_eq!(old.images.get(2), Some("A1-3.png"));
    }

    #[test]
    fn test_find_by_artist_id() {
        let lib = Library::open_in_memory().unwrap();
        let a = artist("A1");
        lib.insert(&a).unwrap();
        assert_eq!(lib.find_by_artist_id("A1").unwrap().unwrap().row_key, a.row_key);
        assert!(lib.find_by_artist_id("a1").unwrap().is_none());
    }
}
