//! The province table: identity and display colour from `definition.csv`,
//! pixel masks from the province bitmap, initial owner/controller from the
//! history files. The renderer takes ownership of the finished table and is
//! the only thing that mutates it afterwards.

use image::{Rgb, RgbImage};
use std::collections::HashMap;

use crate::assets::FileSource;
use crate::errors::{ReplayError, Result};
use crate::map_parsers::{lazy_atoi, read_province_history, ProvinceDefinition};

/// Pixel coordinates of one province in the bitmap, as parallel row/column
/// arrays. Kept split rather than flattened so the index file stays obvious.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvinceMask {
    pub rows: Vec<u32>,
    pub cols: Vec<u32>,
}

impl ProvinceMask {
    pub fn len(&self) -> usize {
        return self.rows.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.rows.is_empty();
    }

    pub fn push(&mut self, row: u32, col: u32) {
        self.rows.push(row);
        self.cols.push(col);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        return self.rows.iter().copied().zip(self.cols.iter().copied());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Province {
    pub id: u16,
    pub name: String,
    pub rgb: Rgb<u8>,
    pub mask: ProvinceMask,
    /// Country tag, or `None` while uncolonised.
    pub owner: Option<String>,
    /// Country tag; `"---"` means "same as owner".
    pub controller: Option<String>,
}

impl Province {
    pub fn new(id: u16, name: String, rgb: Rgb<u8>) -> Province {
        return Province {
            id,
            name,
            rgb,
            mask: ProvinceMask::default(),
            owner: None,
            controller: None,
        };
    }
}

pub type ProvinceTable = HashMap<u16, Province>;

/// Builds the table from CSV rows. Duplicate ids or duplicate colours are
/// corrupt input: the colour is the join key against the bitmap, so it must
/// be one-to-one.
pub fn table_from_definitions(definitions: Vec<ProvinceDefinition>) -> Result<ProvinceTable> {
    let mut by_color: HashMap<[u8; 3], u16> = HashMap::new();
    let mut table = ProvinceTable::new();

    for def in definitions {
        if let Some(other) = by_color.insert(def.rgb.0, def.id) {
            return Err(ReplayError::invalid(format!(
                "provinces {} and {} share colour {:?} in definition.csv",
                other, def.id, def.rgb.0
            )));
        }
        if table
            .insert(def.id, Province::new(def.id, def.name, def.rgb))
            .is_some()
        {
            return Err(ReplayError::invalid(format!(
                "province id {} appears twice in definition.csv",
                def.id
            )));
        }
    }
    return Ok(table);
}

#[inline]
fn pack_rgb(rgb: &Rgb<u8>) -> u32 {
    return ((rgb.0[0] as u32) << 16) | ((rgb.0[1] as u32) << 8) | (rgb.0[2] as u32);
}

/// Scans the bitmap once, bucketing pixel coordinates by packed colour, then
/// hands each province its bucket. Pixels whose colour matches no province
/// are legal and ignored. Row-major, so masks come out scanline-ordered.
pub fn index_province_regions(img: &RgbImage, provinces: &mut ProvinceTable) {
    let mut buckets: HashMap<u32, ProvinceMask> = HashMap::new();
    for (x, y, pixel) in img.enumerate_pixels() {
        buckets.entry(pack_rgb(pixel)).or_default().push(y, x);
    }

    let mut matched = 0usize;
    for province in provinces.values_mut() {
        province.mask = buckets.remove(&pack_rgb(&province.rgb)).unwrap_or_default();
        if !province.mask.is_empty() {
            matched += 1;
        }
    }
    log::debug!(
        "indexed {} of {} provinces on the bitmap ({} colours unclaimed)",
        matched,
        provinces.len(),
        buckets.len()
    );
}

/// Walks `history/provinces`, matching each file to a province by the
/// leading decimal digits of its filename, and records the pre-campaign
/// owner and controller. A filename naming no known province is fatal.
pub fn load_initial_owners(source: &dyn FileSource, provinces: &mut ProvinceTable) -> Result<()> {
    for file_name in source.list_dir(&["history", "provinces"])? {
        let id = lazy_atoi(&file_name);
        let Some(province) = provinces.get_mut(&id) else {
            return Err(ReplayError::invalid(format!(
                "history file '{}' names unknown province {}",
                file_name, id
            )));
        };

        let text = source.read_text(&["history", "provinces", &file_name])?;
        let (owner, controller) = read_province_history(&text);
        if owner.is_some() {
            province.owner = owner;
        }
        if controller.is_some() {
            province.controller = controller;
        }
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: u16, rgb: [u8; 3]) -> ProvinceDefinition {
        return ProvinceDefinition {
            id,
            rgb: Rgb(rgb),
            name: format!("Province{}", id),
        };
    }

    #[test]
    fn test_duplicate_colour_is_fatal() {
        let defs = vec![definition(1, [10, 20, 30]), definition(2, [10, 20, 30])];
        assert!(matches!(
            table_from_definitions(defs),
            Err(ReplayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let defs = vec![definition(1, [10, 20, 30]), definition(1, [1, 2, 3])];
        assert!(matches!(
            table_from_definitions(defs),
            Err(ReplayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_region_indexing_buckets_by_colour() {
        let mut table =
            table_from_definitions(vec![definition(1, [255, 0, 0]), definition(2, [0, 255, 0])])
                .unwrap();

        // left half red, right half green, one stray colour
        let mut img = RgbImage::new(4, 2);
        for y in 0..2 {
            for x in 0..2 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
                img.put_pixel(x + 2, y, Rgb([0, 255, 0]));
            }
        }
        img.put_pixel(3, 1, Rgb([7, 7, 7]));

        index_province_regions(&img, &mut table);

        let red = &table[&1].mask;
        assert_eq!(red.len(), 4);
        assert!(red.iter().all(|(_, col)| col < 2));

        let green = &table[&2].mask;
        assert_eq!(green.len(), 3);
        assert!(green.iter().all(|(_, col)| col >= 2));
    }

    #[test]
    fn test_region_indexing_is_row_major() {
        let mut table = table_from_definitions(vec![definition(1, [9, 9, 9])]).unwrap();
        let mut img = RgbImage::new(2, 2);
        for (_, _, px) in img.enumerate_pixels_mut() {
            *px = Rgb([9, 9, 9]);
        }
        index_province_regions(&img, &mut table);

        let mask = &table[&1].mask;
        assert_eq!(mask.rows, vec![0, 0, 1, 1]);
        assert_eq!(mask.cols, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_unmatched_province_gets_empty_mask() {
        let mut table = table_from_definitions(vec![definition(1, [1, 2, 3])]).unwrap();
        let img = RgbImage::new(2, 2);
        index_province_regions(&img, &mut table);
        assert!(table[&1].mask.is_empty());
    }
}
