//! File resolution and load orchestration. Everything the core reads goes
//! through [`FileSource`] so a mod-overlay resolver can be slotted in by the
//! shell without the loaders knowing; [`GameDirectory`] is the plain
//! filesystem implementation.
//!
//! Long loads take a progress callback fired at coarse phase boundaries;
//! the GUI marshals it onto its own thread.

use anyhow::Context;
use image::RgbImage;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::countries::{load_countries, CountryTable};
use crate::errors::{ReplayError, Result};
use crate::eu4_map::EU4Map;
use crate::map_parsers::{from_cp1252, read_definition_csv, read_map_metadata, MapMetadata};
use crate::province_index::{read_province_index, write_province_index};
use crate::provinces::{
    index_province_regions, load_initial_owners, table_from_definitions, ProvinceTable,
};

/// Invoked with a short human-readable phase name ("parsing save",
/// "indexing regions", ...) as each long stretch of a load begins.
pub type ProgressFn<'a> = &'a mut dyn FnMut(&str);

/// Read access to the game data tree. Paths are relative components, so an
/// overlay implementation can reroute lookups file by file.
pub trait FileSource {
    fn read_bytes(&self, path: &[&str]) -> Result<Vec<u8>>;

    /// Game text files are Windows-1252.
    fn read_text(&self, path: &[&str]) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        return Ok(from_cp1252(Cursor::new(bytes))?);
    }

    /// Plain-file names directly inside a directory, sorted for determinism.
    fn list_dir(&self, path: &[&str]) -> Result<Vec<String>>;
}

/// The base game directory, no overlay.
pub struct GameDirectory {
    root: PathBuf,
}

impl GameDirectory {
    pub fn new(root: impl Into<PathBuf>) -> GameDirectory {
        return GameDirectory { root: root.into() };
    }

    fn resolve(&self, path: &[&str]) -> PathBuf {
        let mut full = self.root.clone();
        for component in path {
            full.push(component);
        }
        return full;
    }
}

impl FileSource for GameDirectory {
    fn read_bytes(&self, path: &[&str]) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        return fs::read(&full).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                ReplayError::missing(format!("{}", full.display()))
            }
            _ => ReplayError::Io(err),
        });
    }

    fn list_dir(&self, path: &[&str]) -> Result<Vec<String>> {
        let full = self.resolve(path);
        let entries = fs::read_dir(&full).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                ReplayError::missing(format!("{}", full.display()))
            }
            _ => ReplayError::Io(err),
        })?;

        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort_unstable();
        return Ok(names);
    }
}

/// Everything loaded from the static game data; feed it to
/// [`GameAssets::into_map`] once a start date is known.
#[derive(Debug)]
pub struct GameAssets {
    pub bitmap: RgbImage,
    pub map_meta: MapMetadata,
    pub countries: CountryTable,
    pub provinces: ProvinceTable,
}

impl GameAssets {
    pub fn into_map(self, start_date: eu4_parser_core::EU4Date) -> Result<EU4Map> {
        return EU4Map::new(
            self.bitmap,
            self.provinces,
            self.countries,
            self.map_meta,
            start_date,
        );
    }
}

fn load_bitmap(source: &dyn FileSource) -> Result<RgbImage> {
    let bytes = source.read_bytes(&["map", "provinces.bmp"])?;
    return Ok(image::load_from_memory(&bytes)?.into_rgb8());
}

/// Full cold load: country data, province definitions and owners, bitmap,
/// map metadata, and the bitmap scan.
pub fn load_game_assets(
    source: &dyn FileSource,
    progress: ProgressFn,
) -> anyhow::Result<GameAssets> {
    progress("loading country data");
    let countries = load_countries(source).context("loading country data")?;

    progress("loading province definitions");
    let definitions = read_definition_csv(&source.read_text(&["map", "definition.csv"])?)?;
    let mut provinces = table_from_definitions(definitions)?;

    progress("loading province owners");
    load_initial_owners(source, &mut provinces).context("loading province owners")?;

    progress("loading map file");
    let bitmap = load_bitmap(source)?;

    progress("loading map metadata");
    let map_meta = read_map_metadata(&source.read_text(&["map", "default.map"])?)?;

    progress("indexing regions");
    index_province_regions(&bitmap, &mut provinces);

    return Ok(GameAssets {
        bitmap,
        map_meta,
        countries,
        provinces,
    });
}

/// Like [`load_game_assets`], but the bitmap scan is skipped when a usable
/// province index sits at `index_path`. A missing or stale index is rebuilt
/// and written back; a corrupt one is surfaced.
pub fn load_game_assets_cached(
    source: &dyn FileSource,
    index_path: &Path,
    progress: ProgressFn,
) -> anyhow::Result<GameAssets> {
    progress("loading country data");
    let countries = load_countries(source).context("loading country data")?;

    progress("loading map file");
    let bitmap = load_bitmap(source)?;
    let (width, height) = bitmap.dimensions();

    progress("loading map metadata");
    let map_meta = read_map_metadata(&source.read_text(&["map", "default.map"])?)?;

    let mut provinces = match read_province_index(index_path, Some((width, height))) {
        Ok(table) => {
            log::info!("loaded province index from {}", index_path.display());
            table
        }
        Err(err @ (ReplayError::MissingResource(_) | ReplayError::StaleCache(_))) => {
            log::warn!("rebuilding province index: {}", err);

            progress("loading province definitions");
            let definitions =
                read_definition_csv(&source.read_text(&["map", "definition.csv"])?)?;
            let mut table = table_from_definitions(definitions)?;

            progress("indexing regions");
            index_province_regions(&bitmap, &mut table);

            write_province_index(index_path, &table, width, height)
                .context("writing province index")?;
            table
        }
        Err(err) => return Err(err).context("reading province index"),
    };

    progress("loading province owners");
    load_initial_owners(source, &mut provinces).context("loading province owners")?;

    return Ok(GameAssets {
        bitmap,
        map_meta,
        countries,
        provinces,
    });
}
