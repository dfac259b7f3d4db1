//! On-disk cache of the province table so the bitmap scan does not have to
//! run on every launch. Structured text (JSON), one record per province,
//! sorted by id; mask coordinate arrays are packed big-endian and base64'd
//! to keep the file from ballooning.
//!
//! This is a cache, not an interchange format: the version field and the
//! recorded bitmap dimensions exist so a stale file is detected, not so the
//! format stays stable.

use std::fs;
use std::path::Path;

use base64::Engine;
use bitstream_io::{BigEndian, ByteRead, ByteReader, ByteWrite, ByteWriter};
use serde::{Deserialize, Serialize};

use crate::errors::{ReplayError, Result};
use crate::provinces::{Province, ProvinceMask, ProvinceTable};

const INDEX_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    map_width: u32,
    map_height: u32,
    provinces: Vec<IndexRecord>,
}

// serde rejects missing fields here, which is exactly the validation the
// cache needs
#[derive(Debug, Serialize, Deserialize)]
struct IndexRecord {
    id: u16,
    name: String,
    rgb: [u8; 3],
    mask_len: u32,
    mask_rows: String,
    mask_cols: String,
}

fn encode_coords(values: &[u32]) -> Result<String> {
    let mut writer = ByteWriter::endian(Vec::new(), BigEndian);
    for value in values {
        writer.write::<u32>(*value)?;
    }
    return Ok(base64::engine::general_purpose::STANDARD.encode(writer.into_writer()));
}

fn decode_coords(text: &str, expected: u32, what: &str) -> Result<Vec<u32>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|_| ReplayError::invalid(format!("province index: undecodable {}", what)))?;
    if bytes.len() != expected as usize * 4 {
        return Err(ReplayError::invalid(format!(
            "province index: {} holds {} bytes, expected {}",
            what,
            bytes.len(),
            expected * 4
        )));
    }

    let mut reader = ByteReader::endian(std::io::Cursor::new(bytes), BigEndian);
    let mut out: Vec<u32> = Vec::with_capacity(expected as usize);
    for _ in 0..expected {
        out.push(reader.read::<u32>()?);
    }
    return Ok(out);
}

pub fn encode_province_index(
    provinces: &ProvinceTable,
    map_width: u32,
    map_height: u32,
) -> Result<String> {
    let mut records = provinces
        .values()
        .map(|province| {
            return Ok(IndexRecord {
                id: province.id,
                name: province.name.clone(),
                rgb: province.rgb.0,
                mask_len: province.mask.len() as u32,
                mask_rows: encode_coords(&province.mask.rows)?,
                mask_cols: encode_coords(&province.mask.cols)?,
            });
        })
        .collect::<Result<Vec<IndexRecord>>>()?;
    records.sort_unstable_by_key(|record| record.id);

    let file = IndexFile {
        version: INDEX_VERSION,
        map_width,
        map_height,
        provinces: records,
    };
    return serde_json::to_string_pretty(&file)
        .map_err(|err| ReplayError::invalid(format!("province index encode: {}", err)));
}

/// Decodes a cache file back into a province table. `expected_dims` is the
/// size of the bitmap currently on disk; a mismatch means the cache was
/// built against something else.
pub fn decode_province_index(
    text: &str,
    expected_dims: Option<(u32, u32)>,
) -> Result<ProvinceTable> {
    let file: IndexFile = serde_json::from_str(text)
        .map_err(|err| ReplayError::invalid(format!("province index: {}", err)))?;

    if file.version != INDEX_VERSION {
        return Err(ReplayError::stale(format!(
            "index version {} (expected {})",
            file.version, INDEX_VERSION
        )));
    }
    if let Some((width, height)) = expected_dims {
        if (file.map_width, file.map_height) != (width, height) {
            return Err(ReplayError::stale(format!(
                "index built for a {}x{} bitmap, current one is {}x{}",
                file.map_width, file.map_height, width, height
            )));
        }
    }

    let mut table = ProvinceTable::new();
    for record in file.provinces {
        let what_rows = format!("mask rows of province {}", record.id);
        let what_cols = format!("mask cols of province {}", record.id);
        let mut province = Province::new(record.id, record.name, image::Rgb(record.rgb));
        province.mask = ProvinceMask {
            rows: decode_coords(&record.mask_rows, record.mask_len, &what_rows)?,
            cols: decode_coords(&record.mask_cols, record.mask_len, &what_cols)?,
        };
        if table.insert(record.id, province).is_some() {
            return Err(ReplayError::invalid(format!(
                "province index: id {} appears twice",
                record.id
            )));
        }
    }
    return Ok(table);
}

pub fn write_province_index(
    path: &Path,
    provinces: &ProvinceTable,
    map_width: u32,
    map_height: u32,
) -> Result<()> {
    let text = encode_province_index(provinces, map_width, map_height)?;
    fs::write(path, text)?;
    return Ok(());
}

pub fn read_province_index(path: &Path, expected_dims: Option<(u32, u32)>) -> Result<ProvinceTable> {
    let text = fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => {
            ReplayError::missing(format!("province index {}", path.display()))
        }
        _ => ReplayError::Io(err),
    })?;
    return decode_province_index(&text, expected_dims);
}
