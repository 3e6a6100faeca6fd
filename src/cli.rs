use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::state::data::{ArtistFilter, TextField, SLOT_COUNT};

#[derive(Parser)]
#[command(name = "artist-catalog")]
#[command(about = "Catalog of artists with up to three reference images each", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory, overriding ARTIST_CATALOG_DIR
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List artists in creation order
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show one artist with its neighbours and image status
    Show {
        /// Record key or artist id
        key: String,
    },

    /// Add a new artist
    Add {
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Edit an existing artist
    Edit {
        /// Record key or artist id
        key: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Delete an artist record (image files are kept)
    Delete {
        /// Record key or artist id
        key: String,
    },

    /// Change one text field in place
    Set {
        /// Record key or artist id
        key: String,

        #[arg(value_enum)]
        field: FieldName,

        value: String,
    },

    /// Mark an artist
    Mark {
        key: String,
    },

    /// Remove the mark from an artist
    Unmark {
        key: String,
    },

    /// Import artists from a tab-separated or .xlsx file
    Import {
        file: PathBuf,
    },

    /// Export the listed artists to a tab-separated or .xlsx file
    Export {
        file: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Generate missing grid thumbnails
    Thumbs {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Delete leftover temporary images
    Sweep,
}

/// Text fields editable with `set`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FieldName {
    Name,
    Bio,
    Notes,
}

impl From<FieldName> for TextField {
    fn from(field: FieldName) -> Self {
        match field {
            FieldName::Name => TextField::DisplayName,
            FieldName::Bio => TextField::Biography,
            FieldName::Notes => TextField::Notes,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Only artists whose id contains this text
    #[arg(long = "filter-id", default_value = "")]
    pub id: String,

    /// Only artists whose display name contains this text
    #[arg(long = "filter-name", default_value = "")]
    pub name: String,
}

#[derive(Args, Debug, Default)]
pub struct FieldArgs {
    /// Artist id
    #[arg(long)]
    pub id: Option<String>,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Biography
    #[arg(long)]
    pub bio: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    /// Mark state (true/false)
    #[arg(long)]
    pub marked: Option<bool>,

    /// Put an image file into a slot, as SLOT=PATH (slots 1-3)
    #[arg(long = "image", value_parser = parse_slot_path)]
    pub images: Vec<(usize, PathBuf)>,

    /// Decode any image and store it as PNG in a slot, as SLOT=PATH
    #[arg(long = "paste", value_parser = parse_slot_path)]
    pub pastes: Vec<(usize, PathBuf)>,

    /// Empty a slot (1-3)
    #[arg(long = "clear-image", value_parser = parse_slot)]
    pub clears: Vec<usize>,
}

impl From<FilterArgs> for ArtistFilter {
    fn from(args: FilterArgs) -> Self {
        ArtistFilter::new(args.id, args.name)
    }
}

/// Parse a 1-based slot number into a slot index
fn parse_slot(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(n) if (1..=SLOT_COUNT).contains(&n) => Ok(n - 1),
        _ => Err(format!("slot must be a number from 1 to {}", SLOT_COUNT)),
    }
}

fn parse_slot_path(value: &str) -> Result<(usize, PathBuf), String> {
    let (slot, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=PATH, got '{}'", value))?;
    if path.is_empty() {
        return Err("image path is empty".to_string());
    }
    Ok((parse_slot(slot)?, PathBuf::from(path)))
}
