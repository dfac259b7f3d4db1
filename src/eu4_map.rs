//! The time-indexed political map. Owns the RGB buffer and the province and
//! country tables once loading is done, and answers `render_at_date` by
//! restoring the nearest cached snapshot at or before the target and
//! replaying only the dates the inverted event index names.

use image::{Rgb, RgbImage};
use imageproc::definitions::HasBlack;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;

use eu4_parser_core::{EU4Date, Month};

use crate::countries::{create_dynamic_countries, CountryTable};
use crate::country_history::{CountryEvent, CountryHistory};
use crate::errors::{ReplayError, Result};
use crate::map_history::{build_history, DatesWithEvents, ProvinceHistory};
use crate::map_parsers::MapMetadata;
use crate::provinces::ProvinceTable;
use crate::save_parser::SaveGame;

pub const LAKE_COLOR: Rgb<u8> = Rgb([50, 50, 150]);
pub const SEA_COLOR: Rgb<u8> = Rgb([0, 0, 100]);
pub const UNCOLONISED_COLOR: Rgb<u8> = Rgb([200, 200, 200]);

/// Width of the diagonal stripes that interleave controller colour over
/// owner colour in occupied provinces.
pub const STRIPE_WIDTH: u32 = 5;

#[inline]
fn controller_stripe(row: u32, col: u32) -> bool {
    return (row + col) % (2 * STRIPE_WIDTH) < STRIPE_WIDTH;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDelta {
    Day,
    Month,
    Year,
    Decade,
}

/// One province's `(controller, owner)` pair inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvinceState {
    pub controller: Option<String>,
    pub owner: Option<String>,
}

type Snapshot = HashMap<u16, ProvinceState>;

pub struct EU4Map {
    img: RgbImage,
    provinces: ProvinceTable,
    countries: CountryTable,
    map_meta: MapMetadata,
    province_histories: ProvinceHistory,
    country_histories: CountryHistory,
    dates_with_events: DatesWithEvents,
    start_date: EU4Date,
    end_date: Option<EU4Date>,
    date: EU4Date,
    /// Full snapshots at every event date already scrubbed past, so moving
    /// backwards never replays from the campaign start. The start date is
    /// always present.
    date_cache: BTreeMap<EU4Date, Snapshot>,
}

impl EU4Map {
    /// Takes ownership of the loaded tables and the image buffer (the decoded
    /// province bitmap doubles as the canvas; it gets blacked on reset).
    pub fn new(
        img: RgbImage,
        provinces: ProvinceTable,
        countries: CountryTable,
        map_meta: MapMetadata,
        start_date: EU4Date,
    ) -> Result<EU4Map> {
        for id in map_meta.lakes.iter().chain(map_meta.sea_starts.iter()) {
            if !provinces.contains_key(id) {
                return Err(ReplayError::invalid(format!(
                    "default.map references unknown province {}",
                    id
                )));
            }
        }
        let (width, height) = img.dimensions();
        for province in provinces.values() {
            if province.mask.iter().any(|(row, col)| row >= height || col >= width) {
                return Err(ReplayError::invalid(format!(
                    "province {} has mask pixels outside the {}x{} bitmap",
                    province.id, width, height
                )));
            }
        }

        let mut map = EU4Map {
            date_cache: BTreeMap::from([(start_date, Self::snapshot_of(&provinces))]),
            img,
            provinces,
            countries,
            map_meta,
            province_histories: ProvinceHistory::new(),
            country_histories: CountryHistory::new(),
            dates_with_events: DatesWithEvents::new(),
            start_date,
            end_date: None,
            date: start_date,
        };
        map.reset();
        return Ok(map);
    }

    pub fn image(&self) -> &RgbImage {
        return &self.img;
    }

    pub fn current_date(&self) -> EU4Date {
        return self.date;
    }

    pub fn start_date(&self) -> EU4Date {
        return self.start_date;
    }

    /// The save's own date, once one is loaded. Rendering past it is legal
    /// and simply finds no further events.
    pub fn end_date(&self) -> Option<EU4Date> {
        return self.end_date;
    }

    pub fn province(&self, id: u16) -> Option<&crate::provinces::Province> {
        return self.provinces.get(&id);
    }

    pub fn dates_with_events(&self) -> &DatesWithEvents {
        return &self.dates_with_events;
    }

    /// Installs a save's timeline: dynamic countries first, then the event
    /// structures, then a full reset. The snapshot cache is cleared down to
    /// the start date since it described the previous timeline.
    pub fn load_save(&mut self, save: &SaveGame) -> Result<()> {
        create_dynamic_countries(save, &mut self.countries)?;

        // anchor events must come from the pre-save state, so roll the table
        // back before folding the save in
        self.update_provinces_for_date(self.start_date);
        let history = build_history(save, &self.provinces, self.start_date)?;
        for tag in history.countries.keys() {
            if !self.countries.contains_key(tag) {
                return Err(ReplayError::invalid(format!(
                    "save changes tag to {} but no such country exists",
                    tag
                )));
            }
        }

        self.province_histories = history.provinces;
        self.country_histories = history.countries;
        self.dates_with_events = history.dates;
        self.end_date = save.date;

        let start_snapshot = self
            .date_cache
            .remove(&self.start_date)
            .expect("the start date is always cached");
        self.date_cache = BTreeMap::from([(self.start_date, start_snapshot)]);

        self.reset();
        return Ok(());
    }

    /// Back to the campaign start: provinces restored, canvas blacked, every
    /// province drawn, water painted over.
    pub fn reset(&mut self) {
        self.date = self.start_date;
        self.update_provinces_for_date(self.start_date);

        for pixel in self.img.pixels_mut() {
            *pixel = Rgb::black();
        }

        let ids = self.provinces.keys().copied().collect::<Vec<u16>>();
        for id in ids {
            self.draw_province(id);
        }
        self.paint_water();
    }

    /// The central scrub operation. Finds the newest cached snapshot at or
    /// before the target (clamping targets before the campaign start),
    /// restores it, replays only dates carrying events, and redraws exactly
    /// the provinces whose state moved.
    pub fn render_at_date(&mut self, target_date: EU4Date) {
        let earliest = *self
            .date_cache
            .keys()
            .next()
            .expect("the start date is always cached");
        let base_date = if target_date <= earliest {
            earliest
        } else {
            *self
                .date_cache
                .range(..=target_date)
                .next_back()
                .expect("the start date is always cached")
                .0
        };

        let mut dirty = self.update_provinces_for_date(base_date);

        if base_date < target_date {
            let event_dates = self
                .dates_with_events
                .range((Bound::Excluded(base_date), Bound::Included(target_date)))
                .map(|(date, _)| *date)
                .collect::<Vec<EU4Date>>();
            for date in event_dates {
                self.apply_events_on(date, &mut dirty);
                // remember this day so scrubbing back here is a restore
                self.date_cache
                    .insert(date, Self::snapshot_of(&self.provinces));
            }
        }

        self.redraw(dirty);
        self.date = target_date.max(earliest);
    }

    /// Steps the date by a coarse delta and renders. Day-of-month is clamped
    /// into the target month, so a month tick from Jan 31 lands on Feb 28.
    pub fn tick(&mut self, delta: TickDelta) {
        let EU4Date { year, month, day } = self.date;
        let target = match delta {
            TickDelta::Day => self.date.tomorrow(),
            TickDelta::Month => {
                let next = Month::from_number(month.number() % 12 + 1)
                    .expect("month arithmetic stays in 1..=12");
                EU4Date::clamped(year + (month.number() as u16) / 12, next, day)
            }
            TickDelta::Year => EU4Date::clamped(year + 1, month, day),
            TickDelta::Decade => EU4Date::clamped(year + 10, month, day),
        };
        self.render_at_date(target);
    }

    fn snapshot_of(provinces: &ProvinceTable) -> Snapshot {
        return provinces
            .values()
            .map(|p| {
                (
                    p.id,
                    ProvinceState {
                        controller: p.controller.clone(),
                        owner: p.owner.clone(),
                    },
                )
            })
            .collect();
    }

    /// Restores every province to a cached snapshot, returning the ids whose
    /// state actually changed.
    fn update_provinces_for_date(&mut self, date: EU4Date) -> HashSet<u16> {
        let snapshot = self
            .date_cache
            .get(&date)
            .expect("restoring a date that was never cached");

        let mut dirty: HashSet<u16> = HashSet::new();
        for (id, state) in snapshot {
            let province = self
                .provinces
                .get_mut(id)
                .expect("snapshots only name provinces in the table");
            if province.controller == state.controller && province.owner == state.owner {
                continue;
            }
            province.controller = state.controller.clone();
            province.owner = state.owner.clone();
            dirty.insert(*id);
        }
        return dirty;
    }

    fn apply_events_on(&mut self, date: EU4Date, dirty: &mut HashSet<u16>) {
        let Some(day) = self.dates_with_events.get(&date) else {
            return;
        };
        let day = day.clone();

        for id in &day.provinces {
            let event = self
                .province_histories
                .get(id)
                .and_then(|events| events.get(&date))
                .expect("the inverted index only points at recorded events")
                .clone();
            let province = self
                .provinces
                .get_mut(id)
                .expect("histories are validated against the table");
            if let Some(owner) = event.owner {
                province.owner = owner;
            }
            if let Some(controller) = event.controller {
                province.controller = controller;
            }
            dirty.insert(*id);
        }

        // a tag change moves every owned and every controlled province; the
        // save writes no per-province events for it
        for tag in &day.countries {
            let CountryEvent::TagChange { source_tag } = self
                .country_histories
                .get(tag)
                .and_then(|events| events.get(&date))
                .expect("the inverted index only points at recorded events")
                .clone();

            for (id, province) in self.provinces.iter_mut() {
                if province.owner.as_deref() == Some(source_tag.as_str()) {
                    province.owner = Some(tag.clone());
                    dirty.insert(*id);
                }
                if province.controller.as_deref() == Some(source_tag.as_str()) {
                    province.controller = Some(tag.clone());
                    dirty.insert(*id);
                }
            }
        }
    }

    fn redraw(&mut self, dirty: HashSet<u16>) {
        for id in dirty {
            self.draw_province(id);
        }
    }

    /// Writes one province's pixels: controller colour on the stripe mask,
    /// owner colour elsewhere. A country with no colour that gets drawn here
    /// is a data bug, not user error.
    fn draw_province(&mut self, id: u16) {
        let province = self
            .provinces
            .get(&id)
            .expect("drawing a province that is not in the table");

        let owner_color = match province
            .owner
            .as_deref()
            .and_then(|tag| self.countries.get(tag))
        {
            Some(owner) => owner
                .color
                .unwrap_or_else(|| panic!("{} has no colour set", owner.tag)),
            None => UNCOLONISED_COLOR,
        };

        let controller_color = match province.controller.as_deref() {
            None | Some("---") => owner_color,
            Some(tag) if Some(tag) == province.owner.as_deref() => owner_color,
            Some(tag) => {
                let controller = self
                    .countries
                    .get(tag)
                    .unwrap_or_else(|| panic!("controller {} is not in the country table", tag));
                controller
                    .color
                    .unwrap_or_else(|| panic!("{} has no colour set", controller.tag))
            }
        };

        for (row, col) in province.mask.iter() {
            let color = if controller_stripe(row, col) {
                controller_color
            } else {
                owner_color
            };
            self.img.put_pixel(col, row, color);
        }
    }

    /// Lakes and seas sit on top of whatever the provinces drew. They carry
    /// no events, so nothing ever redraws over them between resets.
    fn paint_water(&mut self) {
        for id in &self.map_meta.lakes {
            let province = &self.provinces[id];
            for (row, col) in province.mask.iter() {
                self.img.put_pixel(col, row, LAKE_COLOR);
            }
        }
        for id in &self.map_meta.sea_starts {
            let province = &self.provinces[id];
            for (row, col) in province.mask.iter() {
                self.img.put_pixel(col, row, SEA_COLOR);
            }
        }
    }
}
