//! The country table: tags, display names and colours from the static game
//! data, plus the dynamic countries a save invents on the fly.

use image::Rgb;
use std::collections::HashMap;

use crate::assets::FileSource;
use crate::errors::{ReplayError, Result};
use crate::map_parsers::{country_name_from_path, read_country_color, read_country_tags};
use crate::save_parser::SaveGame;

pub const DYNAMIC_FALLBACK_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Country {
    pub tag: String,
    pub name: String,
    /// Some countries ship without a colour; that only becomes fatal if one
    /// of them ends up owning drawn provinces.
    pub color: Option<Rgb<u8>>,
}

pub type CountryTable = HashMap<String, Country>;

/// Reads every `common/country_tags` index file and the country files they
/// point at. A tag defined twice is corrupt input; a missing country file is
/// a missing resource, fatal for the load.
pub fn load_countries(source: &dyn FileSource) -> Result<CountryTable> {
    let mut countries = CountryTable::new();

    for index_file in source.list_dir(&["common", "country_tags"])? {
        let text = source.read_text(&["common", "country_tags", &index_file])?;
        for (tag, sub_path) in read_country_tags(&text) {
            if countries.contains_key(&tag) {
                return Err(ReplayError::invalid(format!(
                    "country tag {} defined twice in country_tags",
                    tag
                )));
            }

            let mut components: Vec<&str> = vec!["common"];
            components.extend(sub_path.split(['/', '\\']).filter(|c| !c.is_empty()));
            let country_text = source.read_text(&components)?;

            let color = read_country_color(&country_text).map_err(|err| {
                ReplayError::invalid(format!("country file for {}: {}", tag, err))
            })?;
            if color.is_none() {
                log::warn!("country {} has no colour; it cannot be drawn", tag);
            }

            countries.insert(
                tag.clone(),
                Country {
                    tag,
                    name: country_name_from_path(&sub_path),
                    color,
                },
            );
        }
    }
    return Ok(countries);
}

/// Registers the save's `dynamic_countries`. Colours are inherited from the
/// overlord where one exists in the save's subject lists, black otherwise.
pub fn create_dynamic_countries(save: &SaveGame, countries: &mut CountryTable) -> Result<()> {
    let masters = save.subject_masters();

    for tag in save.dynamic_countries()? {
        let color = masters
            .get(&tag)
            .and_then(|master| countries.get(master))
            .and_then(|master| master.color)
            .unwrap_or(DYNAMIC_FALLBACK_COLOR);

        let country = countries.entry(tag.clone()).or_insert_with(|| Country {
            tag: tag.clone(),
            name: tag.clone(),
            color: None,
        });
        country.color = Some(color);
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_country_inherits_overlord_colour() {
        let save = SaveGame::from_text(
            "EU4txt\n\
             countries={\n\
             SWE={\n\
             subjects={\n\
             D00\n\
             }\n\
             }\n\
             }\n\
             dynamic_countries={\n\
             D00 D01\n\
             }\n",
        )
        .unwrap();

        let mut countries = CountryTable::new();
        countries.insert(
            "SWE".to_string(),
            Country {
                tag: "SWE".to_string(),
                name: "Sweden".to_string(),
                color: Some(Rgb([8, 82, 165])),
            },
        );

        create_dynamic_countries(&save, &mut countries).unwrap();

        assert_eq!(countries["D00"].color, Some(Rgb([8, 82, 165])));
        // no overlord found: black
        assert_eq!(countries["D01"].color, Some(DYNAMIC_FALLBACK_COLOR));
    }

    #[test]
    fn test_missing_dynamic_section_is_fatal() {
        let save = SaveGame::from_text("EU4txt\ncountries={\nSWE={\nx=1\n}\n}\n").unwrap();
        let mut countries = CountryTable::new();
        assert!(create_dynamic_countries(&save, &mut countries).is_err());
    }
}
