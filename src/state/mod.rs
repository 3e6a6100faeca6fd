/// State management module
///
/// This module handles all application state, including:
/// - Database connections and queries (library.rs)
/// - Shared data structures and the image path wire format (data.rs)
/// - The per-record image slot editor (slots.rs)
/// - Editing sessions with validation and cleanup (edit.rs)

pub mod library;
pub mod data;
pub mod slots;
pub mod edit;
