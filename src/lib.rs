//! Core of a replay viewer for EU4 save files: parses the game's static
//! data and a save's timeline of ownership changes, then renders the
//! political map as it stood on any day of the campaign.
//!
//! The GUI shell stays outside this crate. It is expected to run the load
//! functions on a worker thread (they block and report phases through a
//! callback) and to sequence loads against rendering; the renderer itself
//! is single-threaded and owns its state outright.

use std::path::Path;

use anyhow::Context;

pub mod assets;
pub mod countries;
pub mod country_history;
pub mod errors;
pub mod eu4_map;
pub mod map_history;
pub mod map_parsers;
pub mod province_index;
pub mod provinces;
pub mod save_parser;

pub use assets::{
    load_game_assets, load_game_assets_cached, FileSource, GameAssets, GameDirectory, ProgressFn,
};
pub use errors::ReplayError;
pub use eu4_map::{EU4Map, TickDelta};
pub use eu4_parser_core::{EU4Date, Month};
pub use save_parser::SaveGame;

/// Reads and parses a save from disk.
pub fn load_save_game(path: &Path, progress: ProgressFn) -> anyhow::Result<SaveGame> {
    progress("parsing save");
    let text = save_parser::read_save_file(path)
        .with_context(|| format!("reading save {}", path.display()))?;
    return Ok(SaveGame::from_text(&text)
        .with_context(|| format!("parsing save {}", path.display()))?);
}

/// Loads a save and installs its timeline into an existing map.
pub fn load_save_into_map(
    map: &mut EU4Map,
    path: &Path,
    progress: ProgressFn,
) -> anyhow::Result<()> {
    let save = load_save_game(path, progress)?;
    progress("building history");
    map.load_save(&save).context("building history")?;
    return Ok(());
}
