//! Folds a parsed save into the three structures the renderer scrubs over:
//! per-province dated events, per-country tag changes, and the inverted
//! date -> {dirty provinces, dirty countries} index.

use std::collections::{BTreeMap, HashMap};

use eu4_parser_core::raw_parser::EU4Value;
use eu4_parser_core::EU4Date;

use crate::country_history::{build_country_history, CountryHistory};
use crate::errors::{ReplayError, Result};
use crate::provinces::ProvinceTable;
use crate::save_parser::SaveGame;

/// One dated ownership change. The outer `Option` is "field untouched"; the
/// inner one carries the tag. Only the synthesised start-date events ever
/// write an explicit `None` (a province that begins uncolonised).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvinceEvent {
    pub owner: Option<Option<String>>,
    pub controller: Option<Option<String>>,
}

impl ProvinceEvent {
    pub fn is_empty(&self) -> bool {
        return self.owner.is_none() && self.controller.is_none();
    }
}

pub type ProvinceHistory = HashMap<u16, BTreeMap<EU4Date, ProvinceEvent>>;

/// Everything that changes on one day. The hot-path structure while
/// scrubbing: a tick over N days only touches dates present here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayEvents {
    pub provinces: Vec<u16>,
    pub countries: Vec<String>,
}

pub type DatesWithEvents = BTreeMap<EU4Date, DayEvents>;

#[derive(Debug, Clone, Default)]
pub struct ReplayHistory {
    pub provinces: ProvinceHistory,
    pub countries: CountryHistory,
    pub dates: DatesWithEvents,
}

/// The save stores province ids negated in its `provinces` section. A
/// non-integer key is mod junk; an integer that does not negate into a
/// real id range is corrupt input.
fn negated_province_id(key: &str) -> Option<Result<u16>> {
    let negated = key.parse::<i64>().ok()?;
    return Some(
        u16::try_from(-negated)
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                ReplayError::invalid(format!("province key {} does not negate into an id", negated))
            }),
    );
}

fn extract_event(entry: &EU4Value) -> ProvinceEvent {
    let Some(entry) = entry.as_object() else {
        return ProvinceEvent::default();
    };

    let mut event = ProvinceEvent::default();
    if let Some(owner) = entry.get_string("owner") {
        event.owner = Some(Some(owner.to_string()));
    }
    // saves nest the controller one level deeper than history files do;
    // accept both shapes
    match entry.get("controller") {
        Some(EU4Value::Object(inner)) => {
            if let Some(tag) = inner.get_string("controller") {
                event.controller = Some(Some(tag.to_string()));
            }
        }
        Some(EU4Value::Scalar(scalar)) => {
            if let Some(tag) = scalar.as_str() {
                event.controller = Some(Some(tag.to_string()));
            }
        }
        _ => {}
    }
    return event;
}

/// Builds the full replay history. Every province the save mentions must
/// exist in the table; that failing means the inputs do not belong together.
pub fn build_history(
    save: &SaveGame,
    provinces: &ProvinceTable,
    start_date: EU4Date,
) -> Result<ReplayHistory> {
    let mut province_histories = ProvinceHistory::new();

    for (key, value) in save.provinces()?.iter() {
        let Some(id) = negated_province_id(key) else {
            log::warn!("skipping non-id key '{}' in save provinces section", key);
            continue;
        };
        let id = id?;
        let province = provinces.get(&id).ok_or_else(|| {
            ReplayError::invalid(format!("save references unknown province {}", id))
        })?;

        let events = province_histories.entry(id).or_default();

        // anchor the timeline with the pre-save state loaded from the
        // history files, explicit `None`s included
        events.insert(
            start_date,
            ProvinceEvent {
                owner: Some(province.owner.clone()),
                controller: Some(province.controller.clone()),
            },
        );

        let Some(history) = value.as_object().and_then(|p| p.get_object("history")) else {
            continue;
        };
        for (event_key, entry) in history.iter() {
            let Ok(date) = event_key.parse::<EU4Date>() else {
                continue;
            };
            let event = extract_event(entry);
            if !event.is_empty() {
                events.insert(date, event);
            }
        }
    }

    let country_histories = build_country_history(save)?;

    let mut dates = DatesWithEvents::new();
    for (id, events) in &province_histories {
        for date in events.keys() {
            dates.entry(*date).or_default().provinces.push(*id);
        }
    }
    for (tag, events) in &country_histories {
        for date in events.keys() {
            dates.entry(*date).or_default().countries.push(tag.clone());
        }
    }
    // table iteration order is arbitrary; fix it so replays are deterministic
    for day in dates.values_mut() {
        day.provinces.sort_unstable();
        day.countries.sort_unstable();
    }

    return Ok(ReplayHistory {
        provinces: province_histories,
        countries: country_histories,
        dates,
    });
}
