use artist_catalog::app::{App, ArtistDraft, ImageChange, Message};
use artist_catalog::assets::DisplaySource;
use artist_catalog::cli::{Cli, Commands, FieldArgs};
use artist_catalog::config::AppPaths;
use artist_catalog::error::Result;
use artist_catalog::state::data::Artist;
use clap::Parser;
use std::process::ExitCode;
use tokio::runtime::Handle;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::resolve(cli.data_dir)?;
    let mut app = App::startup(paths, Handle::current())?;
    log::debug!("{:?}", app);

    match cli.command {
        Commands::List { filter } => {
            app.update(Message::SetFilter(filter.into()))?;
            for artist in app.visible()? {
                print_row(&artist, &app.display_sources(&artist));
            }
        }

        Commands::Show { key } => {
            let sources = app.editor_thumbnails(&key).await?;
            let artist = app.find(&key)?;
            print_details(&app, &artist, sources)?;
            return Ok(());
        }

        Commands::Add { fields } => {
            app.update(Message::Add(draft_from(fields)))?;
        }

        Commands::Edit { key, fields } => {
            let row_key = app.find(&key)?.row_key;
            app.update(Message::Edit { row_key, draft: draft_from(fields) })?;
        }

        Commands::Delete { key } => {
            app.update(Message::Delete(key))?;
        }

        Commands::Set { key, field, value } => {
            app.update(Message::SetText { row_key: key, field: field.into(), value })?;
        }

        Commands::Mark { key } => {
            app.update(Message::SetMarked { row_key: key, marked: true })?;
        }

        Commands::Unmark { key } => {
            app.update(Message::SetMarked { row_key: key, marked: false })?;
        }

        Commands::Import { file } => {
            println!("📥 Importing from {}...", file.display());
            app.update(Message::Import(file))?;
        }

        Commands::Export { file, filter } => {
            app.update(Message::SetFilter(filter.into()))?;
            app.update(Message::Export(file))?;
        }

        Commands::Thumbs { filter } => {
            app.update(Message::SetFilter(filter.into()))?;
            app.refresh_thumbnails().await?;
        }

        Commands::Sweep => {
            app.sweep()?;
        }
    }

    // Thumbnail jobs started by add/edit report back here
    app.poll_thumbnails()?;
    println!("{}", app.status());
    Ok(())
}

fn draft_from(fields: FieldArgs) -> ArtistDraft {
    let mut images = Vec::new();
    images.extend(fields.clears.into_iter().map(|slot| ImageChange::Clear { slot }));
    images.extend(
        fields
            .images
            .into_iter()
            .map(|(slot, path)| ImageChange::File { slot, path }),
    );
    images.extend(
        fields
            .pastes
            .into_iter()
            .map(|(slot, path)| ImageChange::Bitmap { slot, path }),
    );

    ArtistDraft {
        artist_id: fields.id,
        display_name: fields.name,
        biography: fields.bio,
        notes: fields.notes,
        marked: fields.marked,
        images,
    }
}

fn print_row(artist: &Artist, sources: &[Option<DisplaySource>]) {
    let slots: String = sources
        .iter()
        .map(|source| match source {
            None => '·',
            Some(DisplaySource::Thumbnail(_)) => '■',
            Some(DisplaySource::Placeholder) => '□',
            Some(DisplaySource::Original(_)) => '▣',
            Some(DisplaySource::Broken) => '✗',
        })
        .collect();
    println!(
        "{} {:<20} {:<30} {}",
        if artist.marked { '★' } else { ' ' },
        artist.artist_id,
        artist.display_name,
        slots
    );
}

fn print_details(app: &App, artist: &Artist, sources: Vec<Option<DisplaySource>>) -> Result<()> {
    println!("🎨 {} ({})", artist.display_name, artist.artist_id);
    println!("   key:     {}", artist.row_key);
    println!("   marked:  {}", if artist.marked { "yes" } else { "no" });
    if !artist.biography.is_empty() {
        println!("   bio:     {}", artist.biography);
    }
    if !artist.notes.is_empty() {
        println!("   notes:   {}", artist.notes);
    }

    for (slot, (stored, source)) in artist.images.iter().zip(sources).enumerate() {
        let (Some(stored), Some(source)) = (stored, source) else {
            println!("   image {}: (empty)", slot + 1);
            continue;
        };
        let shown = match source {
            DisplaySource::Thumbnail(path) => format!("thumbnail {}", path.display()),
            DisplaySource::Placeholder => "thumbnail pending".to_string(),
            DisplaySource::Original(_) => "no thumbnail, original shown".to_string(),
            DisplaySource::Broken => "unreadable".to_string(),
        };
        let preview = match app.render_preview(stored) {
            Ok(image) => format!("{}x{}", image.width(), image.height()),
            Err(e) => {
                log::warn!("⚠️  Cannot preview {}: {}", stored, e);
                "-".to_string()
            }
        };
        println!("   image {}: {} [{}] preview {}", slot + 1, stored, shown, preview);
    }

    let (previous, next) = app.neighbors(&artist.row_key)?;
    let label = |a: Option<Artist>| a.map_or("-".to_string(), |a| a.artist_id);
    println!("   ← {}   → {}", label(previous), label(next));
    Ok(())
}
