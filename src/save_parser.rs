//! Loading and light interpretation of a save file. The heavy lifting is the
//! raw parse; this wraps the resulting tree and answers the handful of
//! questions the history builder and the country loader ask of it.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use eu4_parser_core::raw_parser::{self, EU4Value, ObjectMap};
use eu4_parser_core::EU4Date;

use crate::errors::{ReplayError, Result};
use crate::map_parsers::from_cp1252;

/// A parsed save. Holds the raw top-level dict; accessors pull out the
/// sections the replay consumes.
#[derive(Debug, Clone)]
pub struct SaveGame {
    root: ObjectMap,
    /// The in-game date the save was written at; bounds the timeline.
    pub date: Option<EU4Date>,
}

impl SaveGame {
    /// Parses save text whose first line is the `EU4txt` header.
    pub fn from_text(text: &str) -> Result<SaveGame> {
        let parsed = raw_parser::parse_save_text(text)
            .ok_or_else(|| ReplayError::invalid("save file did not parse"))?;
        let EU4Value::Object(root) = parsed else {
            return Err(ReplayError::invalid("save file is not a dict at top level"));
        };

        let date = root.get_date("date");
        return Ok(SaveGame { root, date });
    }

    pub fn root(&self) -> &ObjectMap {
        return &self.root;
    }

    /// The `provinces` section. Keys in it are negated province ids.
    pub fn provinces(&self) -> Result<&ObjectMap> {
        return self
            .root
            .get_object("provinces")
            .ok_or_else(|| ReplayError::invalid("save has no 'provinces' section"));
    }

    pub fn countries(&self) -> Result<&ObjectMap> {
        return self
            .root
            .get_object("countries")
            .ok_or_else(|| ReplayError::invalid("save has no 'countries' section"));
    }

    /// Tags listed under `dynamic_countries`. An empty block is fine; a
    /// missing one is not.
    pub fn dynamic_countries(&self) -> Result<Vec<String>> {
        let value = self
            .root
            .get("dynamic_countries")
            .ok_or_else(|| ReplayError::invalid("save has no 'dynamic_countries' section"))?;
        return match value {
            EU4Value::None => Ok(Vec::new()),
            EU4Value::Array(items) => Ok(items
                .iter()
                .filter_map(|item| item.as_scalar()?.as_str())
                .map(str::to_string)
                .collect()),
            _ => Err(ReplayError::invalid("'dynamic_countries' is not a list")),
        };
    }

    /// subject tag -> overlord tag, from every country's `subjects` list.
    pub fn subject_masters(&self) -> HashMap<String, String> {
        let mut masters: HashMap<String, String> = HashMap::new();
        let Ok(countries) = self.countries() else {
            return masters;
        };
        for (tag, value) in countries.iter() {
            let Some(country) = value.as_object() else {
                continue;
            };
            let Some(subjects) = country.get("subjects") else {
                continue;
            };
            let Some(items) = subjects.as_array() else {
                continue;
            };
            for subject in items.iter().filter_map(|s| s.as_scalar()?.as_str()) {
                masters.insert(subject.to_string(), tag.to_string());
            }
        }
        return masters;
    }
}

fn decompress_save(bytes: &[u8]) -> Result<String> {
    let mut cursor = Cursor::new(bytes);
    let mut unzipper = zip::read::ZipArchive::new(&mut cursor)?;

    let unzipped_meta = unzipper.by_name("meta")?;
    let meta = from_cp1252(unzipped_meta)?;

    let unzipped_gamestate = unzipper.by_name("gamestate")?;
    let gamestate = from_cp1252(unzipped_gamestate)?;

    // both members carry their own header line; drop the gamestate's so the
    // combined text has exactly one header at the top
    let gamestate_body = gamestate
        .split_once('\n')
        .map_or("", |(_, rest)| rest);
    return Ok(meta + "\n" + gamestate_body);
}

/// Reads a save from disk, transparently handling the compressed container.
/// The result still starts with the header line; feed it to
/// [`SaveGame::from_text`].
pub fn read_save_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => {
            ReplayError::missing(format!("save file {}", path.display()))
        }
        _ => ReplayError::Io(err),
    })?;

    if bytes.starts_with(b"PK\x03\x04") {
        log::info!("detected compressed save file");
        return decompress_save(&bytes);
    }
    return Ok(from_cp1252(Cursor::new(bytes))?);
}
