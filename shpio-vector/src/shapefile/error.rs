/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 05/09/2026
Last Modified: 19/10/2026
License: MIT
*/

use crate::shapefile::geometry::ShapeType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShapefileError>;

/// Every way an operation on a shapefile pair can fail.
#[derive(Error, Debug)]
pub enum ShapefileError {
    #[error("Unable to open shapefile: {0}")]
    Open(String),

    #[error("Unable to open {0}.shx or {0}.SHX; try opening with index restoration enabled")]
    IndexMissing(String),

    #[error(".shx file is unreadable or corrupt: {0}")]
    CorruptIndex(String),

    #[error("Record count in .shx header is {0}, which seems unreasonable; assuming header is corrupt")]
    UnreasonableRecordCount(i64),

    #[error("Error restoring .shx from .shp: {0}")]
    IndexRebuild(String),

    #[error("Error reading entry for record {record} from .shx file: {reason}")]
    IndexRead { record: usize, reason: String },

    #[error("Record index {index} is out of range (file holds {num_records} records)")]
    InvalidIndex { index: usize, num_records: usize },

    #[error("Not enough memory to allocate {0} bytes; probably a broken .shp file")]
    Allocation(usize),

    #[error("Record of {size} bytes at offset {offset} extends past the end of the .shp file")]
    TruncatedFile { offset: u32, size: usize },

    #[error("Error reading .shp file: {0}")]
    Read(String),

    #[error("Error writing shapefile: {0}")]
    Write(String),

    #[error("Corrupted .shp file: shape {record}: {reason}")]
    CorruptRecord { record: usize, reason: String },

    #[error("The file was opened in read-only mode")]
    ReadOnly,

    #[error("Attempt to write a {found} record into a {expected} shapefile")]
    ShapeTypeMismatch { expected: ShapeType, found: ShapeType },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShapefileError {
    pub(crate) fn corrupt_record<S: Into<String>>(record: usize, reason: S) -> ShapefileError {
        ShapefileError::CorruptRecord {
            record: record,
            reason: reason.into(),
        }
    }
}
