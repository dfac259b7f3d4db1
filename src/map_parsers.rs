//! Line- and file-level readers for the static game data: the province
//! definition CSV, `default.map`, the country-tag index, country files, and
//! per-province history files.

use encoding_rs::WINDOWS_1252;
use encoding_rs_io::DecodeReaderBytesBuilder;
use image::Rgb;
use std::{fs::File, io::Read, path::Path};

use eu4_parser_core::raw_parser::{self, EU4Value};

use crate::errors::{ReplayError, Result};

/// Game text files are Windows-1252, never UTF-8.
pub fn from_cp1252<T: Read>(buffer: T) -> std::result::Result<String, std::io::Error> {
    let mut text = "".to_string();
    DecodeReaderBytesBuilder::new()
        .encoding(Some(WINDOWS_1252))
        .build(buffer)
        .read_to_string(&mut text)?;
    return Ok(text);
}

pub fn read_cp1252(path: &Path) -> std::result::Result<String, std::io::Error> {
    return from_cp1252(File::open(path)?);
}

/// One row of `map/definition.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvinceDefinition {
    pub id: u16,
    pub rgb: Rgb<u8>,
    pub name: String,
}

/// Parses `id;R;G;B;name;unused` rows. Rows whose id field is not a plain
/// number (the header, mostly) are skipped.
pub fn read_definition_csv(text: &str) -> Result<Vec<ProvinceDefinition>> {
    let mut out: Vec<ProvinceDefinition> = Vec::new();
    for line in text.lines() {
        let parts = line.trim().split(';').collect::<Vec<&str>>();
        let [id, r, g, b, name, ..] = parts.as_slice() else {
            continue;
        };
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let parse = |v: &str, what: &str| -> Result<u8> {
            return v.parse::<u8>().map_err(|_| {
                ReplayError::invalid(format!("bad {} in definition.csv line '{}'", what, line))
            });
        };
        let id = id
            .parse::<u16>()
            .map_err(|_| ReplayError::invalid(format!("province id out of range: '{}'", line)))?;

        out.push(ProvinceDefinition {
            id,
            rgb: Rgb([parse(r, "red")?, parse(g, "green")?, parse(b, "blue")?]),
            name: name.to_string(),
        });
    }
    return Ok(out);
}

/// The slice of `map/default.map` the replay needs: which provinces get the
/// fixed water colours.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapMetadata {
    pub lakes: Vec<u16>,
    pub sea_starts: Vec<u16>,
}

fn province_id_list(map: &eu4_parser_core::raw_parser::ObjectMap, key: &str) -> Result<Vec<u16>> {
    let value = map
        .get(key)
        .ok_or_else(|| ReplayError::invalid(format!("default.map has no '{}' list", key)))?;
    return match value {
        // `key = {}` parses to the empty marker
        EU4Value::None => Ok(Vec::new()),
        EU4Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_scalar()
                    .and_then(|s| s.as_int())
                    .and_then(|id| u16::try_from(id).ok())
                    .ok_or_else(|| {
                        ReplayError::invalid(format!("non-id entry in default.map '{}'", key))
                    })
            })
            .collect(),
        // `key = 123` without braces
        EU4Value::Scalar(scalar) => {
            let id = scalar
                .as_int()
                .and_then(|id| u16::try_from(id).ok())
                .ok_or_else(|| {
                    ReplayError::invalid(format!("non-id entry in default.map '{}'", key))
                })?;
            Ok(vec![id])
        }
        EU4Value::Object(_) => Err(ReplayError::invalid(format!(
            "default.map '{}' is not a list",
            key
        ))),
    };
}

pub fn read_map_metadata(text: &str) -> Result<MapMetadata> {
    let parsed = raw_parser::parse_text(text)
        .ok_or_else(|| ReplayError::invalid("default.map did not parse"))?;
    let map = parsed
        .as_object()
        .ok_or_else(|| ReplayError::invalid("default.map is not a dict"))?;

    return Ok(MapMetadata {
        lakes: province_id_list(map, "lakes")?,
        sea_starts: province_id_list(map, "sea_starts")?,
    });
}

/// Drops `#`-to-end-of-line comments. Only the files documented to carry
/// comments go through this; save files never do.
pub fn strip_line_comments(text: &str) -> String {
    return text
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(kept, _)| kept))
        .collect::<Vec<&str>>()
        .join("\n");
}

/// Parses a `common/country_tags` file: `TAG = "relative/path"` per line.
pub fn read_country_tags(text: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        let line = line.split_once('#').map_or(line, |(kept, _)| kept).trim();
        if line.is_empty() {
            continue;
        }
        let Some((tag, sub_path)) = line.split_once('=') else {
            continue;
        };
        let sub_path = sub_path.trim().trim_matches('"').trim();
        out.push((tag.trim().to_string(), sub_path.to_string()));
    }
    return out;
}

/// Pulls the display colour out of a country file. A missing colour is
/// tolerated here; the renderer treats it as fatal only if the country ends
/// up owning drawn provinces.
pub fn read_country_color(text: &str) -> Result<Option<Rgb<u8>>> {
    let cleaned = strip_line_comments(text);
    let parsed = raw_parser::parse_text(&cleaned)
        .ok_or_else(|| ReplayError::invalid("country file did not parse"))?;
    let map = parsed
        .as_object()
        .ok_or_else(|| ReplayError::invalid("country file is not a dict"))?;

    let Some(color) = map.get("color") else {
        return Ok(None);
    };
    let Some(items) = color.as_array() else {
        return Err(ReplayError::invalid("country 'color' is not a triple"));
    };
    let channels = items
        .iter()
        .map(|item| {
            item.as_scalar()
                .and_then(|s| s.as_int())
                .and_then(|c| u8::try_from(c).ok())
        })
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| ReplayError::invalid("country 'color' has non-byte channels"))?;
    let [r, g, b] = channels.as_slice() else {
        return Err(ReplayError::invalid("country 'color' is not a triple"));
    };
    return Ok(Some(Rgb([*r, *g, *b])));
}

/// Initial `owner=` / `controller=` lines from a province history file.
/// These use the bare-scalar controller form, unlike save events.
pub fn read_province_history(text: &str) -> (Option<String>, Option<String>) {
    let mut owner: Option<String> = None;
    let mut controller: Option<String> = None;
    for line in text.lines() {
        let target = if line.starts_with("owner") {
            &mut owner
        } else if line.starts_with("controller") {
            &mut controller
        } else {
            continue;
        };
        let Some((_, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.split_once('#').map_or(value, |(kept, _)| kept).trim();
        if !value.is_empty() {
            *target = Some(value.to_string());
        }
    }
    return (owner, controller);
}

/// Consumes leading decimal digits only; anything else stops the scan.
/// History filenames look like `151-Constantinople.txt`.
pub fn lazy_atoi(text: &str) -> u16 {
    let digits = text
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>();
    return digits.parse::<u16>().unwrap_or(0);
}

/// Display name of a country file, e.g. `countries/Sweden.txt` -> `Sweden`.
pub fn country_name_from_path(sub_path: &str) -> String {
    let basename = sub_path.rsplit(['/', '\\']).next().unwrap_or(sub_path);
    return basename
        .rsplit_once('.')
        .map_or(basename, |(stem, _)| stem)
        .to_string();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_csv_skips_header() {
        let text = "province;red;green;blue;x;x\n1;128;34;64;Stockholm;x\n2;0;36;128;Uppland;x\n";
        let defs = read_definition_csv(text).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].id, 1);
        assert_eq!(defs[0].rgb, Rgb([128, 34, 64]));
        assert_eq!(defs[0].name, "Stockholm");
    }

    #[test]
    fn test_definition_csv_rejects_bad_channel() {
        let text = "province;red;green;blue;x;x\n1;300;0;0;Broken;x\n";
        assert!(matches!(
            read_definition_csv(text),
            Err(ReplayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_map_metadata() {
        let text = "width = 5632\nlakes = {\n1050 1051\n}\nsea_starts = {\n1252\n}\n";
        let meta = read_map_metadata(text).unwrap();
        assert_eq!(meta.lakes, vec![1050, 1051]);
        assert_eq!(meta.sea_starts, vec![1252]);
    }

    #[test]
    fn test_map_metadata_empty_list() {
        let text = "lakes = {}\nsea_starts = {\n3\n}\n";
        let meta = read_map_metadata(text).unwrap();
        assert!(meta.lakes.is_empty());
        assert_eq!(meta.sea_starts, vec![3]);
    }

    #[test]
    fn test_map_metadata_missing_list_is_fatal() {
        assert!(matches!(
            read_map_metadata("lakes = { 1 }\n"),
            Err(ReplayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_country_tags_lines() {
        let text = "# comment line\nSWE = \"countries/Sweden.txt\"\nDAN = \"countries/Denmark.txt\" # trailing\n\n";
        let tags = read_country_tags(text);
        assert_eq!(
            tags,
            vec![
                ("SWE".to_string(), "countries/Sweden.txt".to_string()),
                ("DAN".to_string(), "countries/Denmark.txt".to_string()),
            ]
        );
    }

    #[test]
    fn test_country_color() {
        let text = "# Sweden\ngraphical_culture = westerngfx\ncolor = { 8 82 165 }\n";
        assert_eq!(
            read_country_color(text).unwrap(),
            Some(Rgb([8, 82, 165]))
        );
    }

    #[test]
    fn test_country_color_missing_is_tolerated() {
        let text = "graphical_culture = westerngfx\n";
        assert_eq!(read_country_color(text).unwrap(), None);
    }

    #[test]
    fn test_province_history_lines() {
        let text = "owner = SWE\ncontroller = DAN # occupied\nculture = swedish\n";
        let (owner, controller) = read_province_history(text);
        assert_eq!(owner.as_deref(), Some("SWE"));
        assert_eq!(controller.as_deref(), Some("DAN"));
    }

    #[test]
    fn test_province_history_ignores_dated_blocks() {
        let text = "owner = SWE\n1520.1.1 = {\n\towner = DAN\n}\n";
        let (owner, _) = read_province_history(text);
        assert_eq!(owner.as_deref(), Some("SWE"));
    }

    #[test]
    fn test_lazy_atoi() {
        assert_eq!(lazy_atoi("151-Constantinople.txt"), 151);
        assert_eq!(lazy_atoi("1.txt"), 1);
        assert_eq!(lazy_atoi("readme.txt"), 0);
    }

    #[test]
    fn test_country_name_from_path() {
        assert_eq!(country_name_from_path("countries/Sweden.txt"), "Sweden");
        assert_eq!(country_name_from_path("countries\\Sweden.txt"), "Sweden");
    }
}
