//! Record and image lifecycle through the application controller
//!
//! Each test runs against its own data directory.

use artist_catalog::app::{App, ArtistDraft, ImageChange, Message};
use artist_catalog::assets::DisplaySource;
use artist_catalog::config::{AppPaths, Settings};
use artist_catalog::error::{CatalogError, SlotError};
use artist_catalog::state::data::ArtistFilter;
use image::{GenericImageView, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use tokio::runtime::Handle;

fn start(dir: &TempDir) -> App {
    App::startup(AppPaths::from_base(dir.path().join("data")), Handle::current())
        .expect("startup failed")
}

fn write_image(path: &Path, width: u32, height: u32) -> PathBuf {
    RgbImage::new(width, height).save(path).expect("Failed to write image");
    path.to_path_buf()
}

fn add(app: &mut App, artist_id: &str, images: Vec<ImageChange>) {
    let draft = ArtistDraft {
        artist_id: Some(artist_id.to_string()),
        images,
        ..Default::default()
    };
    app.update(Message::Add(draft)).expect("add failed");
}

fn temp_files(images_dir: &Path) -> Vec<String> {
    fs::read_dir(images_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("temp_"))
        .collect()
}

/// Dropping a file into slot 1 of a new record stores it under the canonical name
#[tokio::test]
async fn test_add_with_image_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let photo = write_image(&dir.path().join("photo.png"), 16, 16);

    add(&mut app, "A1", vec![ImageChange::File { slot: 0, path: photo.clone() }]);

    let artist = app.find("A1").unwrap();
    assert_eq!(artist.display_name, "A1");
    assert_eq!(artist.images.get(0), Some("A1-1.png"));
    assert_eq!(artist.images.present_count(), 1);
    assert!(app.paths().images_dir.join("A1-1.png").is_file());
    // Files outside the staging area are copied, never moved
    assert!(photo.is_file());
}

/// A pasted bitmap goes through a temp file that disappears on commit
#[tokio::test]
async fn test_pasted_image_is_committed_and_temp_removed() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let clip = write_image(&dir.path().join("clip.jpg"), 30, 20);

    add(&mut app, "A1", vec![ImageChange::Bitmap { slot: 1, path: clip }]);

    let artist = app.find("A1").unwrap();
    assert_eq!(artist.images.get(0), None);
    assert_eq!(artist.images.get(1), Some("A1-2.png"));
    let committed = image::open(app.paths().images_dir.join("A1-2.png")).unwrap();
    assert_eq!(committed.dimensions(), (30, 20));
    assert!(temp_files(&app.paths().images_dir).is_empty());
}

/// Replacing an image drops the old thumbnail and the next pass rebuilds it
#[tokio::test]
async fn test_replacing_image_regenerates_thumbnail() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let first = write_image(&dir.path().join("first.png"), 64, 64);
    add(&mut app, "A1", vec![ImageChange::File { slot: 0, path: first }]);

    let summary = app.refresh_thumbnails().await.unwrap();
    assert_eq!(summary.generated, 1);
    let thumb = app.paths().thumbs_dir.join("A1-1_thumb.png");
    assert_eq!(image::open(&thumb).unwrap().dimensions(), (80, 80));

    let second = write_image(&dir.path().join("second.png"), 200, 100);
    let row_key = app.find("A1").unwrap().row_key;
    let draft = ArtistDraft {
        images: vec![ImageChange::File { slot: 0, path: second }],
        ..Default::default()
    };
    app.update(Message::Edit { row_key, draft }).unwrap();
    assert!(!thumb.exists());

    let summary = app.refresh_thumbnails().await.unwrap();
    assert_eq!(summary.generated, 1);
    assert_eq!(summary.cached, 0);
    assert_eq!(image::open(&thumb).unwrap().dimensions(), (80, 40));

    // Nothing left to do on a second pass
    let summary = app.refresh_thumbnails().await.unwrap();
    assert_eq!(summary.cached, 1);
    assert_eq!(summary.generated, 0);
}

#[tokio::test]
async fn test_unreadable_image_falls_back_to_original() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let bogus = dir.path().join("bogus.png");
    fs::write(&bogus, b"not an image").unwrap();

    add(&mut app, "A1", vec![ImageChange::File { slot: 2, path: bogus }]);

    let artist = app.find("A1").unwrap();
    let before = app.display_sources(&artist);
    assert_eq!(before[2], Some(DisplaySource::Placeholder));

    let summary = app.refresh_thumbnails().await.unwrap();
    assert_eq!(summary.failed, 1);

    let after = app.display_sources(&artist);
    assert_eq!(before[0], None);
    assert_eq!(after[2], Some(DisplaySource::Original(app.paths().images_dir.join("A1-3.png"))));
}

/// Clearing a slot only unlinks it; deleting a record keeps its files
#[tokio::test]
async fn test_clear_and_delete_keep_files() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let a = write_image(&dir.path().join("a.png"), 8, 8);
    let b = write_image(&dir.path().join("b.jpg"), 8, 8);
    add(
        &mut app,
        "A1",
        vec![
            ImageChange::File { slot: 0, path: a },
            ImageChange::File { slot: 2, path: b },
        ],
    );

    let row_key = app.find("A1").unwrap().row_key;
    let draft = ArtistDraft {
        images: vec![ImageChange::Clear { slot: 0 }],
        ..Default::default()
    };
    app.update(Message::Edit { row_key: row_key.clone(), draft }).unwrap();

    let artist = app.find(&row_key).unwrap();
    assert_eq!(artist.images.get(0), None);
    assert_eq!(artist.images.get(2), Some("A1-3.jpg"));
    assert!(app.paths().images_dir.join("A1-1.png").is_file());

    app.update(Message::Delete(row_key.clone())).unwrap();
    assert!(matches!(app.find(&row_key), Err(CatalogError::NotFound(_))));
    assert_eq!(app.library().artist_count().unwrap(), 0);
    assert!(app.paths().images_dir.join("A1-3.jpg").is_file());

    // A new record with the same id picks the files up again
    add(&mut app, "A1", Vec::new());
    let revived = app.find("A1").unwrap();
    assert_eq!(revived.images.get(0), Some("A1-1.png"));
    assert_eq!(revived.images.get(2), Some("A1-3.jpg"));
}

#[tokio::test]
async fn test_missing_artist_id_is_rejected_without_leftovers() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let clip = write_image(&dir.path().join("clip.png"), 8, 8);

    let draft = ArtistDraft {
        display_name: Some("Nameless".into()),
        images: vec![ImageChange::Bitmap { slot: 0, path: clip }],
        ..Default::default()
    };
    assert!(matches!(app.update(Message::Add(draft)), Err(CatalogError::Validation(_))));
    assert_eq!(app.library().artist_count().unwrap(), 0);
    assert!(temp_files(&app.paths().images_dir).is_empty());
}

#[tokio::test]
async fn test_inline_edits_and_navigation() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    for id in ["A", "B", "C"] {
        add(&mut app, id, Vec::new());
    }

    app.update(Message::SetText {
        row_key: "B".into(),
        field: artist_catalog::state::data::TextField::Notes,
        value: "check later".into(),
    })
    .unwrap();
    app.update(Message::SetMarked { row_key: "B".into(), marked: true }).unwrap();

    let b = app.find("B").unwrap();
    assert_eq!(b.notes, "check later");
    assert!(b.marked);

    let (previous, next) = app.neighbors(&b.row_key).unwrap();
    assert_eq!(previous.unwrap().artist_id, "A");
    assert_eq!(next.unwrap().artist_id, "C");

    let a = app.find("A").unwrap();
    assert!(app.neighbors(&a.row_key).unwrap().0.is_none());

    app.update(Message::SetFilter(ArtistFilter::new("", "b"))).unwrap();
    let visible = app.visible().unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].artist_id, "B");
}

/// Temp files left by an earlier crash are swept at startup
#[tokio::test]
async fn test_startup_sweeps_temp_files() {
    let dir = tempdir().expect("Failed to create temp dir");
    let images_dir = dir.path().join("data").join("artist_images");
    fs::create_dir_all(&images_dir).unwrap();
    let stale = write_image(&images_dir.join("temp_deadbeef.png"), 4, 4);
    let kept = write_image(&images_dir.join("A1-1.png"), 4, 4);

    let mut app = start(&dir);
    assert!(!stale.exists());
    assert!(kept.exists());

    write_image(&images_dir.join("temp_0badf00d.jpg"), 4, 4);
    assert_eq!(app.sweep().unwrap(), 1);
    assert!(temp_files(&images_dir).is_empty());
}

/// Swapping the images of two slots keeps both images
#[tokio::test]
async fn test_swapping_slots_keeps_both_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let a = write_image(&dir.path().join("a.png"), 10, 10);
    let b = write_image(&dir.path().join("b.png"), 20, 20);
    add(
        &mut app,
        "A1",
        vec![
            ImageChange::File { slot: 0, path: a },
            ImageChange::File { slot: 1, path: b },
        ],
    );

    let images_dir = app.paths().images_dir.clone();
    let row_key = app.find("A1").unwrap().row_key;
    let draft = ArtistDraft {
        images: vec![
            ImageChange::File { slot: 0, path: images_dir.join("A1-2.png") },
            ImageChange::File { slot: 1, path: images_dir.join("A1-1.png") },
        ],
        ..Default::default()
    };
    app.update(Message::Edit { row_key, draft }).unwrap();

    assert_eq!(image::open(images_dir.join("A1-1.png")).unwrap().dimensions(), (20, 20));
    assert_eq!(image::open(images_dir.join("A1-2.png")).unwrap().dimensions(), (10, 10));
    assert!(temp_files(&images_dir).is_empty());
}

#[tokio::test]
async fn test_out_of_range_slot_is_rejected() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let a = write_image(&dir.path().join("a.png"), 8, 8);
    let b = write_image(&dir.path().join("b.png"), 16, 16);

    let draft = ArtistDraft {
        artist_id: Some("A1".into()),
        images: vec![
            ImageChange::File { slot: 0, path: a },
            ImageChange::File { slot: 7, path: b },
        ],
        ..Default::default()
    };
    assert!(matches!(
        app.update(Message::Add(draft)),
        Err(CatalogError::Slot(SlotError::InvalidSlot(7)))
    ));
    assert_eq!(app.library().artist_count().unwrap(), 0);
    assert!(!app.paths().images_dir.join("A1-1.png").exists());
}

/// The editor view waits for its slot thumbnails
#[tokio::test]
async fn test_editor_thumbnails_for_each_slot() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut app = start(&dir);
    let a = write_image(&dir.path().join("a.png"), 40, 40);
    let b = write_image(&dir.path().join("b.jpg"), 40, 20);
    add(
        &mut app,
        "A1",
        vec![
            ImageChange::File { slot: 0, path: a },
            ImageChange::File { slot: 2, path: b },
        ],
    );

    let sources = app.editor_thumbnails("A1").await.unwrap();
    let thumbs_dir = app.paths().thumbs_dir.clone();
    assert_eq!(
        sources,
        vec![
            Some(DisplaySource::Thumbnail(thumbs_dir.join("A1-1_thumb.png"))),
            None,
            Some(DisplaySource::Thumbnail(thumbs_dir.join("A1-3_thumb.jpg"))),
        ]
    );
}

#[tokio::test]
async fn test_startup_writes_default_settings() {
    let dir = tempdir().expect("Failed to create temp dir");
    let app = start(&dir);
    let settings_path = app.paths().settings_path();
    assert!(settings_path.is_file());
    assert_eq!(Settings::load(&settings_path).unwrap(), *app.settings());
}
