/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 05/09/2026
Last Modified: 19/10/2026
License: MIT

Notes: The .shx index maps record numbers onto (offset, length) byte ranges
within the .shp file. Entries are stored big-endian, in 16-bit words.
*/
use super::error::{Result, ShapefileError};
use super::header::{file_size_from_words, HEADER_SIZE};
use super::{base_name, open_companion};
use log::debug;
use shpio_common::utils::{ByteOrderReader, ByteOrderWriter, Endianness};
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufReader, BufWriter, SeekFrom};

pub(crate) const ENTRY_SIZE: usize = 8;

/// The byte range of one record within the .shp file. `length` excludes the
/// 8-byte record header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordLocator {
    pub offset: u32,
    pub length: u32,
}

impl RecordLocator {
    /// Decodes a raw 8-byte .shx entry, converting word counts into bytes.
    /// The error message names what is wrong with the entry.
    pub(crate) fn from_entry(record: usize, entry: &mut [u8]) -> std::result::Result<RecordLocator, String> {
        let (offset_word, length_word) = entry.split_at_mut(4);
        Endianness::BigEndian.to_native_in_place(offset_word);
        Endianness::BigEndian.to_native_in_place(length_word);
        let offset = u32::from_ne_bytes([offset_word[0], offset_word[1], offset_word[2], offset_word[3]]);
        let length = u32::from_ne_bytes([length_word[0], length_word[1], length_word[2], length_word[3]]);
        if offset > i32::MAX as u32 {
            return Err(format!("Invalid offset for entity {}", record));
        }
        if length > (i32::MAX / 2 - 4) as u32 {
            return Err(format!("Invalid record length for entity {}", record));
        }
        Ok(RecordLocator {
            offset: offset * 2,
            length: length * 2,
        })
    }

    /// The size of the record on disk, header included.
    pub fn entity_size(&self) -> usize {
        self.length as usize + 8
    }
}

/// The in-memory record table. An unresolved slot holds `None` until the
/// entry is read from the .shx file.
#[derive(Debug, Default)]
pub(crate) struct RecordIndex {
    entries: Vec<Option<RecordLocator>>,
    lazy_reads: usize,
}

impl RecordIndex {
    /// Reads `num_records` entries from the .shx file in one pass.
    pub fn load(shx: &mut File, num_records: usize) -> Result<RecordIndex> {
        let mut raw = Vec::new();
        raw.try_reserve_exact(num_records * ENTRY_SIZE)
            .map_err(|_| ShapefileError::Allocation(num_records * ENTRY_SIZE))?;
        raw.resize(num_records * ENTRY_SIZE, 0u8);
        shx.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
        shx.read_exact(&mut raw).map_err(|e| {
            ShapefileError::CorruptIndex(format!(
                "failed to read all values for {} records in .shx file: {}",
                num_records, e
            ))
        })?;

        let mut entries = Vec::with_capacity(num_records.max(1));
        for (i, entry) in raw.chunks_exact_mut(ENTRY_SIZE).enumerate() {
            let locator = RecordLocator::from_entry(i, entry).map_err(ShapefileError::CorruptIndex)?;
            entries.push(Some(locator));
        }
        Ok(RecordIndex {
            entries: entries,
            lazy_reads: 0,
        })
    }

    /// A table of `num_records` slots, none of them resolved yet.
    pub fn unresolved(num_records: usize) -> RecordIndex {
        let mut entries = Vec::with_capacity(num_records.max(1));
        entries.resize(num_records, None);
        RecordIndex {
            entries: entries,
            lazy_reads: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the locator for `record`, reading its .shx entry on first use
    /// when the table was loaded lazily.
    pub fn resolve(&mut self, record: usize, shx: Option<&mut File>) -> Result<RecordLocator> {
        if let Some(locator) = self.entries[record] {
            return Ok(locator);
        }
        let index_read = |reason: String| ShapefileError::IndexRead {
            record: record,
            reason: reason,
        };
        let shx = shx.ok_or_else(|| index_read("the .shx file is not open".to_string()))?;
        let mut entry = [0u8; ENTRY_SIZE];
        shx.seek(SeekFrom::Start((HEADER_SIZE + ENTRY_SIZE * record) as u64))
            .and_then(|_| shx.read_exact(&mut entry))
            .map_err(|e| index_read(e.to_string()))?;
        let locator = RecordLocator::from_entry(record, &mut entry).map_err(index_read)?;
        self.lazy_reads += 1;
        debug!("Resolved .shx entry {} as {:?}", record, locator);
        self.entries[record] = Some(locator);
        Ok(locator)
    }

    pub fn push(&mut self, locator: RecordLocator) {
        self.entries.push(Some(locator));
    }

    pub fn set(&mut self, record: usize, locator: RecordLocator) {
        self.entries[record] = Some(locator);
    }

    /// Every slot, resolved or not. Unresolved slots are written as zeros.
    pub fn locators(&self) -> impl Iterator<Item = RecordLocator> + '_ {
        self.entries.iter().map(|e| e.unwrap_or_default())
    }

    /// How many entries have been read from the .shx file one at a time.
    pub fn lazy_reads(&self) -> usize {
        self.lazy_reads
    }
}

/// Rebuilds the .shx file for `file_name` by walking the record headers of
/// the .shp file. Returns the number of records indexed.
pub fn restore_shx(file_name: &str) -> Result<usize> {
    let base = base_name(file_name);
    let (shp, shp_path) = open_companion(&base, "shp", OpenOptions::new().read(true))
        .map_err(|e| ShapefileError::Open(format!("{}.shp: {}", base, e)))?;
    let rebuild_err = |msg: String| ShapefileError::IndexRebuild(msg);

    let mut bor = ByteOrderReader::new(BufReader::new(shp), Endianness::BigEndian)?;
    if bor.is_empty() {
        return Err(rebuild_err(format!("{} is empty", shp_path.display())));
    }
    let mut header = [0u8; HEADER_SIZE];
    bor.read_exact(&mut header)
        .map_err(|e| rebuild_err(format!("cannot read the header of {}: {}", shp_path.display(), e)))?;
    let words = u32::from_be_bytes([header[24], header[25], header[26], header[27]]);
    let shp_size = file_size_from_words(words) as u64;

    let shx_path = format!("{}.shx", base);
    let shx = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&shx_path)
        .map_err(|e| rebuild_err(format!("cannot create {}: {}", shx_path, e)))?;
    let mut writer = ByteOrderWriter::new(BufWriter::new(shx), Endianness::BigEndian);
    writer.write_bytes(&header)?;

    let mut num_records = 0usize;
    let mut record_offset_words = (HEADER_SIZE / 2) as u32;
    let mut shp_offset = HEADER_SIZE as u64;
    while shp_offset < shp_size {
        let content_words = bor
            .read_u32()
            .and_then(|_| bor.read_u32())
            .map_err(|e| {
                rebuild_err(format!(
                    "error parsing .shp to restore .shx: record {} at offset {}: {}",
                    num_records, shp_offset, e
                ))
            })?;
        writer.write_u32(record_offset_words)?;
        writer.write_u32(content_words)?;
        record_offset_words = record_offset_words.wrapping_add(content_words.wrapping_add(4));
        shp_offset += 8 + content_words as u64 * 2;
        num_records += 1;
        if shp_offset < shp_size {
            bor.inc_pos(content_words as usize * 2)?;
        }
    }

    let mut shx = writer
        .into_inner()
        .into_inner()
        .map_err(|e| rebuild_err(e.to_string()))?;
    let shx_words = ((HEADER_SIZE + ENTRY_SIZE * num_records) / 2) as u32;
    shx.seek(SeekFrom::Start(24))?;
    shx.write_all(&shx_words.to_be_bytes())?;
    shx.flush()?;
    debug!("Restored {} with {} records", shx_path, num_records);
    Ok(num_records)
}
