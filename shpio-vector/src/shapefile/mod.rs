/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 02/09/2026
Last Modified: 19/10/2026
License: MIT

Notes: The logic behind working with an ESRI Shapefile pair (.shp and .shx).
Records are read and written one at a time, by index, against the open
files; nothing beyond the record index is held in memory.
*/

pub mod error;
pub mod geometry;
pub mod header;
pub mod index;
pub mod record;
pub mod source;

use self::error::{Result, ShapefileError};
use self::geometry::{ShapeType, ShapefileGeometry};
use self::header::{file_size_from_words, has_valid_signature, ShapefileHeader, HEADER_SIZE};
use self::index::{restore_shx, RecordIndex, RecordLocator, ENTRY_SIZE};
use self::record::{RecordBuffer, RecordLimits, RecordView};
use log::{debug, warn};
use shpio_common::configs::Configs;
use shpio_common::utils::{ByteOrderWriter, Endianness};
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{ErrorKind, SeekFrom};
use std::path::PathBuf;

/// Record counts at or above this are checked against the real .shx length.
const LARGE_RECORD_COUNT: i64 = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl AccessMode {
    /// Interprets an fopen-style access string. "r+", "r+b" and "rb+" open
    /// for update; anything else opens read-only.
    pub fn from_str(access: &str) -> AccessMode {
        match access {
            "r+" | "r+b" | "rb+" => AccessMode::ReadWrite,
            _ => AccessMode::Read,
        }
    }
}

/// The file-wide summary returned by `Shapefile::get_info`.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapefileInfo {
    pub num_records: usize,
    pub shape_type: ShapeType,
    pub bounds_min: [f64; 4],
    pub bounds_max: [f64; 4],
}

/// An open shapefile pair.
///
/// Examples:
///
/// ```no_run
/// use shpio_vector::{AccessMode, Shapefile};
///
/// let mut input = Shapefile::open("roads.shp", AccessMode::Read)?;
/// let info = input.get_info();
/// for i in 0..info.num_records {
///     let record = input.read_record(i)?;
///     println!("{}: {} vertices", i, record.num_points());
/// }
/// input.close()?;
/// # Ok::<(), shpio_vector::ShapefileError>(())
/// ```
pub struct Shapefile {
    pub file_name: String,
    access: AccessMode,
    shp: File,
    shx: Option<File>,
    header: ShapefileHeader,
    file_size: u32,
    index: RecordIndex,
    buffer: RecordBuffer,
    configs: Configs,
    bounds_initialized: bool,
    updated: bool,
}

impl Shapefile {
    pub fn open(file_name: &str, access: AccessMode) -> Result<Shapefile> {
        Shapefile::open_with_configs(file_name, access, &Configs::default())
    }

    /// Opens read-only, deferring each .shx entry until its record is first
    /// requested.
    pub fn open_lazy(file_name: &str) -> Result<Shapefile> {
        let configs = Configs {
            lazy_index_loading: true,
            ..Configs::default()
        };
        Shapefile::open_with_configs(file_name, AccessMode::Read, &configs)
    }

    /// Opens the pair, rebuilding the .shx from the .shp first if it is
    /// missing.
    pub fn open_with_restore(file_name: &str, access: AccessMode) -> Result<Shapefile> {
        let configs = Configs {
            restore_index_if_missing: true,
            ..Configs::default()
        };
        Shapefile::open_with_configs(file_name, access, &configs)
    }

    /// Opens with an fopen-style access string. An `l` anywhere in a
    /// read-only access string requests lazy index loading.
    pub fn open_with_access(file_name: &str, access: &str, restore: bool) -> Result<Shapefile> {
        let mode = AccessMode::from_str(access);
        let configs = Configs {
            lazy_index_loading: mode == AccessMode::Read && access.contains('l'),
            restore_index_if_missing: restore,
            ..Configs::default()
        };
        Shapefile::open_with_configs(file_name, mode, &configs)
    }

    pub fn open_with_configs(file_name: &str, access: AccessMode, configs: &Configs) -> Result<Shapefile> {
        let base = base_name(file_name);
        let mut options = OpenOptions::new();
        options.read(true).write(access == AccessMode::ReadWrite);

        let (mut shp, shp_path) = open_companion(&base, "shp", &options)
            .map_err(|e| ShapefileError::Open(format!("{}.shp or {}.SHP: {}", base, base, e)))?;

        let mut shx = match open_companion(&base, "shx", &options) {
            Ok((f, _)) => f,
            Err(_) if configs.restore_index_if_missing => {
                warn!("{}.shx is missing; restoring it from {}", base, shp_path.display());
                restore_shx(file_name)?;
                open_companion(&base, "shx", &options)
                    .map_err(|_| ShapefileError::IndexMissing(base.clone()))?
                    .0
            }
            Err(_) => return Err(ShapefileError::IndexMissing(base)),
        };

        let mut shp_header = [0u8; HEADER_SIZE];
        shp.read_exact(&mut shp_header).map_err(|e| {
            ShapefileError::Open(format!("{}: unable to read header: {}", shp_path.display(), e))
        })?;
        if !has_valid_signature(&shp_header, false) {
            return Err(ShapefileError::Open(format!(
                "{} is not a shapefile",
                shp_path.display()
            )));
        }
        let file_size = file_size_from_words(u32::from_be_bytes([
            shp_header[24],
            shp_header[25],
            shp_header[26],
            shp_header[27],
        ]));

        let mut shx_header = [0u8; HEADER_SIZE];
        shx.read_exact(&mut shx_header)
            .map_err(|e| ShapefileError::CorruptIndex(format!("unable to read header: {}", e)))?;
        if !has_valid_signature(&shx_header, true) {
            return Err(ShapefileError::CorruptIndex("bad file signature".to_string()));
        }

        let words = ((shx_header[24] & 0x7f) as i64) << 24
            | (shx_header[25] as i64) << 16
            | (shx_header[26] as i64) << 8
            | shx_header[27] as i64;
        let mut num_records = (words - 50) / 4;
        if num_records < 0 || num_records > configs.max_record_count as i64 {
            return Err(ShapefileError::UnreasonableRecordCount(num_records));
        }
        if num_records >= LARGE_RECORD_COUNT {
            // the header may overstate the count; trust the file length instead
            let shx_size = shx.metadata()?.len() as i64;
            if shx_size > HEADER_SIZE as i64 && shx_size / 2 < num_records * 4 + 50 {
                let fitted = (shx_size - HEADER_SIZE as i64) / ENTRY_SIZE as i64;
                warn!(
                    ".shx header declares {} records but the file only holds {}",
                    num_records, fitted
                );
                num_records = fitted;
            }
        }
        let num_records = num_records as usize;

        let header = ShapefileHeader::from_bytes(&shx_header)
            .map_err(|e| ShapefileError::CorruptIndex(e.to_string()))?;

        let lazy = configs.lazy_index_loading && access == AccessMode::Read;
        let index = if lazy {
            RecordIndex::unresolved(num_records)
        } else {
            RecordIndex::load(&mut shx, num_records)?
        };
        let shx = if access == AccessMode::Read && !lazy {
            None
        } else {
            Some(shx)
        };

        debug!(
            "Opened {} ({} {} records, {} bytes, {} index)",
            shp_path.display(),
            num_records,
            header.shape_type,
            file_size,
            if lazy { "lazy" } else { "eager" }
        );

        Ok(Shapefile {
            file_name: base,
            access: access,
            shp: shp,
            shx: shx,
            header: header,
            file_size: file_size,
            index: index,
            buffer: RecordBuffer::default(),
            configs: configs.clone(),
            bounds_initialized: num_records > 0,
            updated: false,
        })
    }

    /// Creates an empty shapefile pair of the given type, replacing any
    /// existing files, and opens it for update.
    pub fn create(file_name: &str, shape_type: ShapeType) -> Result<Shapefile> {
        let base = base_name(file_name);
        let header = ShapefileHeader::new(shape_type).to_bytes()?;
        for ext in ["shp", "shx"] {
            let path = format!("{}.{}", base, ext);
            let mut f = File::create(&path)
                .map_err(|e| ShapefileError::Open(format!("unable to create {}: {}", path, e)))?;
            f.write_all(&header)
                .map_err(|e| ShapefileError::Write(format!("{}: {}", path, e)))?;
        }
        Shapefile::open(&base, AccessMode::ReadWrite)
    }

    pub fn get_info(&self) -> ShapefileInfo {
        ShapefileInfo {
            num_records: self.num_records(),
            shape_type: self.header.shape_type,
            bounds_min: self.header.bounds.min(),
            bounds_max: self.header.bounds.max(),
        }
    }

    pub fn num_records(&self) -> usize {
        self.index.len()
    }

    pub fn shape_type(&self) -> ShapeType {
        self.header.shape_type
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    /// Returns the file name without its directory, e.g. `roads`.
    pub fn get_short_filename(&self) -> String {
        PathBuf::from(&self.file_name)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Reads record `index` into an owned geometry.
    pub fn read_record(&mut self, index: usize) -> Result<ShapefileGeometry> {
        Ok(self.read_record_view(index)?.to_geometry())
    }

    /// Reads record `index` into the handle's scratch buffer and returns a
    /// view over it, without copying any vertex data. The view borrows the
    /// handle, so it must be dropped before the next read.
    pub fn read_record_view(&mut self, index: usize) -> Result<RecordView<'_>> {
        let num_records = self.index.len();
        if index >= num_records {
            return Err(ShapefileError::InvalidIndex {
                index: index,
                num_records: num_records,
            });
        }
        let locator = self.index.resolve(index, self.shx.as_mut())?;
        let mut entity_size = locator.entity_size();

        if entity_size > self.buffer.capacity() {
            if entity_size >= self.configs.large_record_size && !self.fits_in_file(locator, entity_size) {
                // don't trust the size in the header before allocating this much
                let real_size = self.shp.metadata()?.len().min(u32::MAX as u64) as u32;
                warn!(
                    "Record {} claims {} bytes at offset {}; checking the real .shp length ({} bytes)",
                    index, entity_size, locator.offset, real_size
                );
                self.file_size = real_size;
                if !self.fits_in_file(locator, entity_size) {
                    return Err(ShapefileError::TruncatedFile {
                        offset: locator.offset,
                        size: entity_size,
                    });
                }
            }
            self.buffer.ensure_capacity(entity_size)?;
        }

        self.shp
            .seek(SeekFrom::Start(locator.offset as u64))
            .map_err(|e| {
                ShapefileError::Read(format!(
                    "error in seek() reading object from .shp file at offset {}: {}",
                    locator.offset, e
                ))
            })?;
        let bytes_read = read_up_to(&mut self.shp, self.buffer.slice_mut(entity_size)).map_err(|e| {
            ShapefileError::Read(format!(
                "error reading object of size {} at offset {}: {}",
                entity_size, locator.offset, e
            ))
        })?;

        if bytes_read >= 8 && bytes_read == entity_size - 8 {
            // The .shx entry may be one 8-byte header larger than the record
            // the .shp holds. Accept it only if the record's own content
            // length accounts for exactly the bytes read.
            let buf = self.buffer.slice(bytes_read);
            let content_words = i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
            if content_words < 0
                || content_words > i32::MAX / 2 - 4
                || content_words as usize * 2 + 8 != bytes_read
            {
                return Err(ShapefileError::Read(format!(
                    "sanity check failed when trying to recover from an inconsistent .shx/.shp for record {}",
                    index
                )));
            }
            warn!(
                "Record {}: .shx declares {} bytes but the .shp record holds {}; using the .shp length",
                index, entity_size, bytes_read
            );
            entity_size = bytes_read;
        } else if bytes_read != entity_size {
            return Err(ShapefileError::Read(format!(
                "read {} of {} bytes for the object at offset {}",
                bytes_read, entity_size, locator.offset
            )));
        }

        let limits = RecordLimits {
            max_parts: self.configs.max_parts_per_record,
            max_points: self.configs.max_points_per_record,
        };
        RecordView::parse(self.buffer.slice(entity_size), index, limits)
    }

    fn fits_in_file(&self, locator: RecordLocator, entity_size: usize) -> bool {
        locator.offset < self.file_size && entity_size as u64 <= (self.file_size - locator.offset) as u64
    }

    /// Writes a record, appending it when `index` is `None` and replacing
    /// record `index` otherwise. A replacement that does not fit in the old
    /// record's space is moved to the end of the .shp file. Returns the index
    /// of the written record.
    pub fn write_record(&mut self, index: Option<usize>, geometry: &ShapefileGeometry) -> Result<usize> {
        if self.access != AccessMode::ReadWrite {
            return Err(ShapefileError::ReadOnly);
        }
        if geometry.shape_type != ShapeType::Null && geometry.shape_type != self.header.shape_type {
            return Err(ShapefileError::ShapeTypeMismatch {
                expected: self.header.shape_type,
                found: geometry.shape_type,
            });
        }
        let num_records = self.index.len();
        let record = match index {
            None => num_records,
            Some(i) if i < num_records => i,
            Some(i) => {
                return Err(ShapefileError::InvalidIndex {
                    index: i,
                    num_records: num_records,
                })
            }
        };
        if record >= i32::MAX as usize {
            return Err(ShapefileError::Write(format!("record number {} is too large", record + 1)));
        }

        let bytes = geometry.to_record_bytes(record as i32 + 1)?;
        let record_size = u32::try_from(bytes.len())
            .map_err(|_| ShapefileError::Write(format!("record of {} bytes is too large", bytes.len())))?;
        let old = match index {
            Some(_) => Some(self.index.resolve(record, self.shx.as_mut())?),
            None => None,
        };
        let (offset, file_size) = match old {
            Some(locator) if bytes.len() <= locator.entity_size() => (locator.offset, self.file_size),
            _ => {
                let end = self.file_size.checked_add(record_size).ok_or_else(|| {
                    ShapefileError::Write(format!(
                        "the maximum file size of {} bytes has been reached",
                        u32::MAX
                    ))
                })?;
                (self.file_size, end)
            }
        };

        self.shp
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.shp.write_all(&bytes))
            .map_err(|e| ShapefileError::Write(format!("record {} at offset {}: {}", record, offset, e)))?;
        self.file_size = file_size;

        let locator = RecordLocator {
            offset: offset,
            length: record_size - 8,
        };
        if record == num_records {
            self.index.push(locator);
        } else {
            self.index.set(record, locator);
        }

        if geometry.num_points() > 0 {
            if self.bounds_initialized {
                self.header.bounds.expand_to(&geometry.bounds);
            } else {
                self.header.bounds = geometry.bounds;
                self.bounds_initialized = true;
            }
        }
        self.updated = true;
        Ok(record)
    }

    /// Rewrites both file headers and the full .shx contents.
    pub fn flush(&mut self) -> Result<()> {
        if self.access != AccessMode::ReadWrite {
            return Err(ShapefileError::ReadOnly);
        }
        let write_err = |e: std::io::Error| ShapefileError::Write(e.to_string());
        let num_records = self.index.len();

        let mut header = self.header.clone();
        header.file_length = self.file_size / 2;
        let shp_header = header.to_bytes()?;
        header.file_length = ((HEADER_SIZE + ENTRY_SIZE * num_records) / 2) as u32;
        let shx_header = header.to_bytes()?;

        let mut entries = ByteOrderWriter::new(
            Vec::with_capacity(ENTRY_SIZE * num_records),
            Endianness::BigEndian,
        );
        for locator in self.index.locators() {
            entries.write_u32(locator.offset / 2)?;
            entries.write_u32(locator.length / 2)?;
        }
        let entries = entries.into_inner();

        self.shp
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.shp.write_all(&shp_header))
            .and_then(|_| self.shp.flush())
            .map_err(write_err)?;

        let shx = self
            .shx
            .as_mut()
            .ok_or_else(|| ShapefileError::Write("the .shx file is not open".to_string()))?;
        shx.seek(SeekFrom::Start(0))
            .and_then(|_| shx.write_all(&shx_header))
            .and_then(|_| shx.write_all(&entries))
            .and_then(|_| shx.set_len((HEADER_SIZE + entries.len()) as u64))
            .and_then(|_| shx.flush())
            .map_err(write_err)?;

        self.header = header;
        self.updated = false;
        debug!("Flushed {} ({} records)", self.file_name, num_records);
        Ok(())
    }

    /// Flushes any pending changes and closes both files.
    pub fn close(mut self) -> Result<()> {
        self.flush_pending()
    }

    /// Flushes pending changes once. A failure is returned to the caller and
    /// not retried when the handle drops.
    fn flush_pending(&mut self) -> Result<()> {
        if !self.updated {
            return Ok(());
        }
        let result = self.flush();
        self.updated = false;
        result
    }
}

impl Drop for Shapefile {
    fn drop(&mut self) {
        if self.updated {
            if let Err(e) = self.flush() {
                warn!("Unable to flush {} on close: {}", self.file_name, e);
            }
        }
    }
}

/// Strips any extension from a file name, e.g. `data/roads.shp` becomes
/// `data/roads`.
pub(crate) fn base_name(file_name: &str) -> String {
    let separator = file_name.rfind(|c| c == '/' || c == '\\');
    match file_name.rfind('.') {
        Some(dot) if separator.map_or(true, |s| dot > s) => file_name[..dot].to_string(),
        _ => file_name.to_string(),
    }
}

/// Opens `<base>.<ext>`, falling back to the upper-case extension.
pub(crate) fn open_companion(base: &str, ext: &str, options: &OpenOptions) -> std::io::Result<(File, PathBuf)> {
    let lower = PathBuf::from(format!("{}.{}", base, ext.to_lowercase()));
    match options.open(&lower) {
        Ok(f) => Ok((f, lower)),
        Err(e) => {
            let upper = PathBuf::from(format!("{}.{}", base, ext.to_uppercase()));
            match options.open(&upper) {
                Ok(f) => Ok((f, upper)),
                Err(_) => Err(e),
            }
        }
    }
}

/// Fills as much of `buf` as the reader can supply, stopping early only at
/// end of file.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match reader.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

#[cfg(test)]
mod test {
    use super::geometry::*;
    use super::*;
    use shpio_common::structures::Point2D;
    use std::fs;
    use std::path::Path;

    fn raw_header(file_words: u32, shape_type: i32, bounds: [f64; 8]) -> Vec<u8> {
        let mut h = vec![0u8; 24];
        h[0..4].copy_from_slice(&9994i32.to_be_bytes());
        h.extend_from_slice(&file_words.to_be_bytes());
        h.extend_from_slice(&1000i32.to_le_bytes());
        h.extend_from_slice(&shape_type.to_le_bytes());
        for v in bounds {
            h.extend_from_slice(&v.to_le_bytes());
        }
        h
    }

    fn point_record(number: i32, x: f64, y: f64) -> Vec<u8> {
        let mut r = vec![];
        r.extend_from_slice(&number.to_be_bytes());
        r.extend_from_slice(&10i32.to_be_bytes());
        r.extend_from_slice(&1i32.to_le_bytes());
        r.extend_from_slice(&x.to_le_bytes());
        r.extend_from_slice(&y.to_le_bytes());
        r
    }

    /// Writes a Point shapefile pair by hand. `shx_lengths` overrides the
    /// .shx length (in words) of each record.
    fn write_point_pair(dir: &Path, name: &str, points: &[(f64, f64)], shx_lengths: Option<&[u32]>) -> String {
        let base = dir.join(name).to_string_lossy().to_string();
        let bounds = [0.0, 0.0, 100.0, 100.0, 0.0, 0.0, 0.0, 0.0];
        let shp_words = (100 + 28 * points.len()) as u32 / 2;
        let mut shp = raw_header(shp_words, 1, bounds);
        let shx_words = (100 + 8 * points.len()) as u32 / 2;
        let mut shx = raw_header(shx_words, 1, bounds);
        for (i, (x, y)) in points.iter().enumerate() {
            shx.extend_from_slice(&((shp.len() / 2) as u32).to_be_bytes());
            let length = shx_lengths.map_or(10, |l| l[i]);
            shx.extend_from_slice(&length.to_be_bytes());
            shp.extend_from_slice(&point_record(i as i32 + 1, *x, *y));
        }
        fs::write(format!("{}.shp", base), shp).unwrap();
        fs::write(format!("{}.shx", base), shx).unwrap();
        base
    }

    fn sample_geometries() -> Vec<ShapefileGeometry> {
        let ring = vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(0.0, 10.0),
            Point2D::new(10.0, 10.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(0.0, 0.0),
        ];
        let hole = vec![
            Point2D::new(2.0, 2.0),
            Point2D::new(4.0, 2.0),
            Point2D::new(4.0, 4.0),
            Point2D::new(2.0, 4.0),
            Point2D::new(2.0, 2.0),
        ];
        let mut points = ring.clone();
        points.extend_from_slice(&hole);
        let z: Vec<f64> = (0..10).map(|i| i as f64 * 1.5).collect();
        let m: Vec<f64> = (0..10).map(|i| 100.0 - i as f64).collect();
        let line = vec![Point2D::new(-5.0, 3.0), Point2D::new(7.5, -2.25), Point2D::new(1.0, 1.0)];

        vec![
            ShapefileGeometry::new_point(ShapeType::Point, Point2D::new(1.0, 2.0), None, None).unwrap(),
            ShapefileGeometry::new_point(ShapeType::PointZ, Point2D::new(1.0, 2.0), Some(3.0), None).unwrap(),
            ShapefileGeometry::new_point(ShapeType::PointZ, Point2D::new(1.0, 2.0), Some(3.0), Some(4.0))
                .unwrap(),
            ShapefileGeometry::new_point(ShapeType::PointM, Point2D::new(-1.0, 2.0), None, Some(9.0)).unwrap(),
            ShapefileGeometry::new_multipoint(ShapeType::MultiPoint, line.clone(), None, None).unwrap(),
            ShapefileGeometry::new_multipoint(
                ShapeType::MultiPointZ,
                line.clone(),
                Some(vec![1.0, 2.0, 3.0]),
                Some(vec![0.5, 0.25, 0.125]),
            )
            .unwrap(),
            ShapefileGeometry::new_multipoint(ShapeType::MultiPointM, line.clone(), None, Some(vec![1.0, 2.0, 3.0]))
                .unwrap(),
            ShapefileGeometry::from_parts(ShapeType::PolyLine, &[line.clone(), ring.clone()]).unwrap(),
            ShapefileGeometry::from_parts(ShapeType::Polygon, &[ring.clone(), hole.clone()]).unwrap(),
            ShapefileGeometry::new_multipart(
                ShapeType::PolygonZ,
                vec![0, 5],
                vec![],
                points.clone(),
                Some(z.clone()),
                None,
            )
            .unwrap(),
            ShapefileGeometry::new_multipart(
                ShapeType::PolyLineZ,
                vec![0, 5],
                vec![],
                points.clone(),
                Some(z.clone()),
                Some(m.clone()),
            )
            .unwrap(),
            ShapefileGeometry::new_multipart(
                ShapeType::PolygonM,
                vec![0, 5],
                vec![],
                points.clone(),
                None,
                Some(m.clone()),
            )
            .unwrap(),
            ShapefileGeometry::new_multipart(
                ShapeType::MultiPatch,
                vec![0, 5],
                vec![PartType::OuterRing, PartType::InnerRing],
                points.clone(),
                Some(z.clone()),
                None,
            )
            .unwrap(),
            ShapefileGeometry::new_multipart(ShapeType::PolyLine, vec![], vec![], vec![], None, None).unwrap(),
        ]
    }

    #[test]
    fn test_point_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let points = [(1.5, 2.5), (-3.25, 40.0), (100.0, 0.0)];
        let base = write_point_pair(dir.path(), "points", &points, None);

        let mut sf = Shapefile::open(&format!("{}.shp", base), AccessMode::Read).unwrap();
        let info = sf.get_info();
        assert_eq!(info.num_records, 3);
        assert_eq!(info.shape_type, ShapeType::Point);
        assert_eq!(info.bounds_min, [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(info.bounds_max, [100.0, 100.0, 0.0, 0.0]);

        let raw = fs::read(format!("{}.shp", base)).unwrap();
        for (i, (x, y)) in points.iter().enumerate() {
            let record = sf.read_record(i).unwrap();
            assert_eq!(record.shape_type, ShapeType::Point);
            assert_eq!(record.num_points(), 1);
            assert_eq!(record.num_parts(), 0);
            assert_eq!(record.bounds.min(), [*x, *y, 0.0, 0.0]);
            assert_eq!(record.bounds.max(), [*x, *y, 0.0, 0.0]);

            // x and y sit 12 and 20 bytes into each 28-byte record
            let o = 100 + 28 * i;
            assert_eq!(&raw[o + 12..o + 20], &record.points()[0].x.to_le_bytes());
            assert_eq!(&raw[o + 20..o + 28], &record.points()[0].y.to_le_bytes());
        }
    }

    #[test]
    fn test_invalid_index() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_point_pair(dir.path(), "points", &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)], None);
        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        for index in [3, usize::MAX] {
            match sf.read_record(index) {
                Err(ShapefileError::InvalidIndex { index: i, num_records }) => {
                    assert_eq!(i, index);
                    assert_eq!(num_records, 3);
                }
                other => panic!("unexpected result {:?}", other),
            }
        }
        assert!(sf.read_record(2).is_ok());
    }

    #[test]
    fn test_round_trip_all_families() {
        let dir = tempfile::tempdir().unwrap();
        for (i, geometry) in sample_geometries().into_iter().enumerate() {
            let base = dir.path().join(format!("shape{}", i)).to_string_lossy().to_string();
            let mut sf = Shapefile::create(&base, geometry.shape_type).unwrap();
            sf.write_record(None, &ShapefileGeometry::null()).unwrap();
            assert_eq!(sf.write_record(None, &geometry).unwrap(), 1);
            sf.close().unwrap();

            let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
            assert_eq!(sf.num_records(), 2);
            assert_eq!(sf.read_record(0).unwrap(), ShapefileGeometry::null());
            let read_back = sf.read_record(1).unwrap();
            assert_eq!(read_back, geometry, "{} did not survive", geometry.shape_type);

            let info = sf.get_info();
            assert_eq!(info.bounds_min, geometry.bounds.min());
            assert_eq!(info.bounds_max, geometry.bounds.max());

            let view = sf.read_record_view(1).unwrap();
            assert_eq!(view.to_geometry(), geometry);
        }
    }

    #[test]
    fn test_empty_multipart_has_no_parts() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("empty").to_string_lossy().to_string();
        let mut sf = Shapefile::create(&base, ShapeType::Polygon).unwrap();
        let empty = ShapefileGeometry::new_multipart(ShapeType::Polygon, vec![], vec![], vec![], None, None).unwrap();
        sf.write_record(None, &empty).unwrap();
        let record = sf.read_record(0).unwrap();
        assert_eq!(record.num_points(), 0);
        assert_eq!(record.num_parts(), 0);
    }

    #[test]
    fn test_restore_missing_shx() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("restored").to_string_lossy().to_string();
        let mut sf = Shapefile::create(&base, ShapeType::PolyLineZ).unwrap();
        for geometry in sample_geometries() {
            if geometry.shape_type == ShapeType::PolyLineZ {
                sf.write_record(None, &geometry).unwrap();
                sf.write_record(None, &ShapefileGeometry::null()).unwrap();
                sf.write_record(None, &geometry).unwrap();
            }
        }
        sf.close().unwrap();

        let shx_path = format!("{}.shx", base);
        let written = fs::read(&shx_path).unwrap();
        fs::remove_file(&shx_path).unwrap();

        match Shapefile::open(&base, AccessMode::Read) {
            Err(ShapefileError::IndexMissing(_)) => {}
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("opened without an index"),
        }

        let mut sf = Shapefile::open_with_restore(&base, AccessMode::Read).unwrap();
        assert_eq!(sf.num_records(), 3);
        assert!(sf.read_record(2).is_ok());
        assert_eq!(fs::read(&shx_path).unwrap(), written);

        // re-derive every entry from the .shp record headers
        let shp = fs::read(format!("{}.shp", base)).unwrap();
        let mut offset = 100usize;
        for i in 0..3 {
            let entry = &written[100 + 8 * i..108 + 8 * i];
            let content_words = u32::from_be_bytes([shp[offset + 4], shp[offset + 5], shp[offset + 6], shp[offset + 7]]);
            assert_eq!(&entry[0..4], &((offset / 2) as u32).to_be_bytes());
            assert_eq!(&entry[4..8], &content_words.to_be_bytes());
            offset += 8 + 2 * content_words as usize;
        }
        assert_eq!(offset, shp.len());
    }

    #[test]
    fn test_restore_truncated_shp_fails() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_point_pair(dir.path(), "short", &[(1.0, 1.0), (2.0, 2.0)], None);
        let shp_path = format!("{}.shp", base);
        let mut shp = fs::read(&shp_path).unwrap();
        // the header still claims a third record
        shp[24..28].copy_from_slice(&((100 + 28 * 3) as u32 / 2).to_be_bytes());
        fs::write(&shp_path, shp).unwrap();
        fs::remove_file(format!("{}.shx", base)).unwrap();
        match restore_shx(&base) {
            Err(ShapefileError::IndexRebuild(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_lazy_loading() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_point_pair(dir.path(), "lazy", &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)], None);
        let mut sf = Shapefile::open_with_access(&base, "rbl", false).unwrap();
        assert_eq!(sf.index.lazy_reads(), 0);
        let first = sf.read_record(1).unwrap();
        let second = sf.read_record(1).unwrap();
        assert_eq!(first, second);
        assert_eq!(sf.index.lazy_reads(), 1);
        sf.read_record(0).unwrap();
        assert_eq!(sf.index.lazy_reads(), 2);

        // lazy loading is ignored for update access
        let sf = Shapefile::open_with_access(&base, "r+", false).unwrap();
        assert_eq!(sf.access_mode(), AccessMode::ReadWrite);
        assert_eq!(sf.index.lazy_reads(), 0);
    }

    #[test]
    fn test_shx_length_includes_record_header() {
        let dir = tempfile::tempdir().unwrap();
        // the last record's .shx length is 4 words too long
        let base = write_point_pair(dir.path(), "offby8", &[(1.0, 2.0), (3.0, 4.0)], Some(&[10, 14]));
        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        let record = sf.read_record(1).unwrap();
        assert_eq!(record.points()[0], Point2D::new(3.0, 4.0));

        // any other discrepancy is an error
        let base = write_point_pair(dir.path(), "offby16", &[(1.0, 2.0), (3.0, 4.0)], Some(&[10, 18]));
        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        match sf.read_record(1) {
            Err(ShapefileError::Read(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_record_length_fields_are_big_endian() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_point_pair(dir.path(), "endian", &[(1.0, 2.0)], Some(&[14]));
        // the content length 0x0000000A reads as 0x0A000000 if taken little-endian
        let shp = fs::read(format!("{}.shp", base)).unwrap();
        assert_eq!(&shp[104..108], &[0x00, 0x00, 0x00, 0x0a]);
        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        let record = sf.read_record(0).unwrap();
        assert_eq!(record.points()[0], Point2D::new(1.0, 2.0));
    }

    #[test]
    fn test_corrupt_point_count() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("corrupt").to_string_lossy().to_string();
        let mut sf = Shapefile::create(&base, ShapeType::PolyLine).unwrap();
        let line = ShapefileGeometry::from_parts(
            ShapeType::PolyLine,
            &[vec![Point2D::new(0.0, 0.0), Point2D::new(1.0, 1.0)]],
        )
        .unwrap();
        sf.write_record(None, &line).unwrap();
        sf.close().unwrap();

        let shp_path = format!("{}.shp", base);
        let mut shp = fs::read(&shp_path).unwrap();
        // nPoints sits 48 bytes into the record
        shp[148..152].copy_from_slice(&1000i32.to_le_bytes());
        fs::write(&shp_path, shp).unwrap();

        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        match sf.read_record(0) {
            Err(ShapefileError::CorruptRecord { record, .. }) => assert_eq!(record, 0),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_large_record_beyond_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_point_pair(dir.path(), "huge", &[(1.0, 2.0)], Some(&[100_000]));
        let configs = Configs {
            large_record_size: 1024,
            ..Configs::default()
        };
        let mut sf = Shapefile::open_with_configs(&base, AccessMode::Read, &configs).unwrap();
        match sf.read_record(0) {
            Err(ShapefileError::TruncatedFile { offset, size }) => {
                assert_eq!(offset, 100);
                assert_eq!(size, 200_008);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_upper_case_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_point_pair(dir.path(), "upper", &[(1.0, 2.0)], None);
        fs::rename(format!("{}.shp", base), format!("{}.SHP", base)).unwrap();
        fs::rename(format!("{}.shx", base), format!("{}.SHX", base)).unwrap();
        let mut sf = Shapefile::open(&format!("{}.SHP", base), AccessMode::Read).unwrap();
        assert_eq!(sf.read_record(0).unwrap().points()[0], Point2D::new(1.0, 2.0));
        assert_eq!(sf.get_short_filename(), "upper");
    }

    #[test]
    fn test_bad_headers() {
        let dir = tempfile::tempdir().unwrap();
        match Shapefile::open(&dir.path().join("missing").to_string_lossy(), AccessMode::Read) {
            Err(ShapefileError::Open(_)) => {}
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("opened a missing file"),
        }

        let base = write_point_pair(dir.path(), "badsig", &[(1.0, 2.0)], None);
        let shx_path = format!("{}.shx", base);
        let mut shx = fs::read(&shx_path).unwrap();
        shx[3] = 0x0d;
        fs::write(&shx_path, &shx).unwrap();
        assert!(Shapefile::open(&base, AccessMode::Read).is_ok());
        shx[2] = 0x28;
        fs::write(&shx_path, &shx).unwrap();
        match Shapefile::open(&base, AccessMode::Read) {
            Err(ShapefileError::CorruptIndex(_)) => {}
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("accepted a bad signature"),
        }

        let base = write_point_pair(dir.path(), "count", &[(1.0, 2.0), (3.0, 4.0)], None);
        let configs = Configs {
            max_record_count: 1,
            ..Configs::default()
        };
        match Shapefile::open_with_configs(&base, AccessMode::Read, &configs) {
            Err(ShapefileError::UnreasonableRecordCount(n)) => assert_eq!(n, 2),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("accepted too many records"),
        }
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_point_pair(dir.path(), "ro", &[(1.0, 2.0)], None);
        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        let p = ShapefileGeometry::new_point(ShapeType::Point, Point2D::new(0.0, 0.0), None, None).unwrap();
        assert!(matches!(sf.write_record(None, &p), Err(ShapefileError::ReadOnly)));
        assert!(matches!(sf.flush(), Err(ShapefileError::ReadOnly)));
    }

    #[test]
    fn test_write_validation() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("typed").to_string_lossy().to_string();
        let mut sf = Shapefile::create(&base, ShapeType::Point).unwrap();
        let line = ShapefileGeometry::from_parts(ShapeType::PolyLine, &[vec![Point2D::new(0.0, 0.0)]]).unwrap();
        assert!(matches!(
            sf.write_record(None, &line),
            Err(ShapefileError::ShapeTypeMismatch { .. })
        ));
        let p = ShapefileGeometry::new_point(ShapeType::Point, Point2D::new(0.0, 0.0), None, None).unwrap();
        assert!(matches!(
            sf.write_record(Some(0), &p),
            Err(ShapefileError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_overwrite_in_place_or_relocate() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("rewrite").to_string_lossy().to_string();
        let mut sf = Shapefile::create(&base, ShapeType::MultiPoint).unwrap();
        let pts = |n: usize| (0..n).map(|i| Point2D::new(i as f64, 1.0)).collect::<Vec<Point2D>>();
        let three = ShapefileGeometry::new_multipoint(ShapeType::MultiPoint, pts(3), None, None).unwrap();
        let two = ShapefileGeometry::new_multipoint(ShapeType::MultiPoint, pts(2), None, None).unwrap();
        let five = ShapefileGeometry::new_multipoint(ShapeType::MultiPoint, pts(5), None, None).unwrap();
        sf.write_record(None, &three).unwrap();
        sf.write_record(None, &three).unwrap();
        let first = sf.index.resolve(0, None).unwrap();

        // smaller; stays put
        sf.write_record(Some(0), &two).unwrap();
        let shrunk = sf.index.resolve(0, None).unwrap();
        assert_eq!(shrunk.offset, first.offset);
        assert_eq!(shrunk.length as usize, two.get_length());

        // larger; moves to the end of the file
        let end = sf.file_size;
        sf.write_record(Some(0), &five).unwrap();
        assert_eq!(sf.index.resolve(0, None).unwrap().offset, end);
        sf.close().unwrap();

        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        assert_eq!(sf.read_record(0).unwrap(), five);
        assert_eq!(sf.read_record(1).unwrap(), three);
        let raw = fs::read(format!("{}.shp", base)).unwrap();
        assert_eq!(&raw[end as usize..end as usize + 4], &1i32.to_be_bytes());
        assert_eq!(sf.get_info().bounds_max, [4.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_drop_flushes_changes() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("dropped").to_string_lossy().to_string();
        {
            let mut sf = Shapefile::create(&base, ShapeType::Point).unwrap();
            let p = ShapefileGeometry::new_point(ShapeType::Point, Point2D::new(5.0, 6.0), None, None).unwrap();
            sf.write_record(None, &p).unwrap();
        }
        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        assert_eq!(sf.num_records(), 1);
        assert_eq!(sf.read_record(0).unwrap().points()[0], Point2D::new(5.0, 6.0));
        let shp_len = fs::metadata(format!("{}.shp", base)).unwrap().len();
        assert_eq!(shp_len, 128);
    }

    #[test]
    fn test_access_strings_and_names() {
        assert_eq!(AccessMode::from_str("rb"), AccessMode::Read);
        assert_eq!(AccessMode::from_str("r"), AccessMode::Read);
        assert_eq!(AccessMode::from_str("rbl"), AccessMode::Read);
        assert_eq!(AccessMode::from_str("r+"), AccessMode::ReadWrite);
        assert_eq!(AccessMode::from_str("r+b"), AccessMode::ReadWrite);
        assert_eq!(AccessMode::from_str("rb+"), AccessMode::ReadWrite);
        assert_eq!(base_name("data/roads.shp"), "data/roads");
        assert_eq!(base_name("data.v2/roads"), "data.v2/roads");
        assert_eq!(base_name("roads"), "roads");
    }

    #[test]
    fn test_overstated_record_count_shrinks_to_fit() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_point_pair(dir.path(), "overstated", &[(1.0, 2.0)], None);
        // the header claims 2,000,000 entries but the file holds one
        let shx_path = format!("{}.shx", base);
        let mut shx = fs::read(&shx_path).unwrap();
        shx[24..28].copy_from_slice(&(50u32 + 4 * 2_000_000).to_be_bytes());
        fs::write(&shx_path, shx).unwrap();

        let mut sf = Shapefile::open(&base, AccessMode::Read).unwrap();
        assert_eq!(sf.num_records(), 1);
        let record = sf.read_record(0).unwrap();
        assert_eq!(record.points(), &[Point2D::new(1.0, 2.0)][..]);
    }

    #[test]
    fn test_failed_write_keeps_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("failing").to_string_lossy().to_string();
        let mut sf = Shapefile::create(&base, ShapeType::Point).unwrap();
        let p = ShapefileGeometry::new_point(ShapeType::Point, Point2D::new(1.0, 1.0), None, None).unwrap();
        sf.write_record(None, &p).unwrap();
        let file_size = sf.file_size;

        sf.shp = File::open(format!("{}.shp", base)).unwrap();
        match sf.write_record(None, &p) {
            Err(ShapefileError::Write(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(sf.file_size, file_size);
        assert_eq!(sf.num_records(), 1);
    }

    #[test]
    fn test_failed_close_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("unflushed").to_string_lossy().to_string();
        let mut sf = Shapefile::create(&base, ShapeType::Point).unwrap();
        let p = ShapefileGeometry::new_point(ShapeType::Point, Point2D::new(1.0, 1.0), None, None).unwrap();
        sf.write_record(None, &p).unwrap();

        sf.shx = Some(File::open(format!("{}.shx", base)).unwrap());
        assert!(sf.flush_pending().is_err());
        assert!(!sf.updated);
        // nothing left for drop to flush
        assert!(sf.flush_pending().is_ok());
    }
}
