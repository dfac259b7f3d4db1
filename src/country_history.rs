//! Country-level timeline events from the save. Tag changes are the one
//! kind the map cares about: they move every owned/controlled province to
//! the new tag without any per-province event being written.

use std::collections::{BTreeMap, HashMap};

use eu4_parser_core::EU4Date;

use crate::errors::Result;
use crate::save_parser::SaveGame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountryEvent {
    /// The country was formed out of `source_tag` on this date.
    TagChange { source_tag: String },
}

pub type CountryHistory = HashMap<String, BTreeMap<EU4Date, CountryEvent>>;

/// Walks `save.countries[*].history` for dated `changed_tag_from` entries.
/// Mods stuff non-dict values into the countries section; those are skipped.
pub fn build_country_history(save: &SaveGame) -> Result<CountryHistory> {
    let mut out = CountryHistory::new();

    for (tag, value) in save.countries()?.iter() {
        let Some(country) = value.as_object() else {
            continue;
        };
        let Some(history) = country.get_object("history") else {
            continue;
        };

        let mut events: BTreeMap<EU4Date, CountryEvent> = BTreeMap::new();
        for (key, entry) in history.iter() {
            let Ok(date) = key.parse::<EU4Date>() else {
                continue;
            };
            let Some(entry) = entry.as_object() else {
                continue;
            };
            let Some(source_tag) = entry.get_string("changed_tag_from") else {
                continue;
            };
            events.insert(
                date,
                CountryEvent::TagChange {
                    source_tag: source_tag.to_string(),
                },
            );
        }

        if !events.is_empty() {
            out.insert(tag.to_string(), events);
        }
    }
    return Ok(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use eu4_parser_core::Month;

    #[test]
    fn test_tag_change_extraction() {
        let save = SaveGame::from_text(
            "EU4txt\n\
             countries={\n\
             NEW={\n\
             history={\n\
             1500.6.1={\n\
             changed_tag_from=OLD\n\
             }\n\
             monarch=1\n\
             }\n\
             }\n\
             IDL={\n\
             history={\n\
             1470.1.1={\n\
             monarch=2\n\
             }\n\
             }\n\
             }\n\
             }\n",
        )
        .unwrap();

        let history = build_country_history(&save).unwrap();
        assert_eq!(history.len(), 1);

        let events = &history["NEW"];
        let date = EU4Date::new(1500, Month::JUN, 1).unwrap();
        assert_eq!(
            events.get(&date),
            Some(&CountryEvent::TagChange {
                source_tag: "OLD".to_string()
            })
        );
    }

    #[test]
    fn test_non_dict_country_entries_are_skipped() {
        let save = SaveGame::from_text(
            "EU4txt\n\
             countries={\n\
             oddball=3\n\
             SWE={\n\
             history={\n\
             1520.2.2={\n\
             changed_tag_from=SHL\n\
             }\n\
             }\n\
             }\n\
             }\n",
        )
        .unwrap();
        let history = build_country_history(&save).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.contains_key("SWE"));
    }
}
