/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 04/09/2026
Last Modified: 19/10/2026
License: MIT
*/
use crate::shapefile::geometry::ShapeType;
use shpio_common::structures::BoundingBox;
use shpio_common::utils::{ByteOrderReader, ByteOrderWriter, Endianness};
use std::fmt;
use std::io::{Cursor, Error, ErrorKind};

pub const HEADER_SIZE: usize = 100;
pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;

/// The 100-byte header shared by the .shp and .shx files.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShapefileHeader {
    pub file_code: i32,        // BigEndian; value is 9994
    pub file_length: u32,      // BigEndian; in 16-bit words
    pub version: i32,          // LittleEndian
    pub shape_type: ShapeType, // LittleEndian
    pub bounds: BoundingBox,   // LittleEndian; Xmin, Ymin, Xmax, Ymax, Zmin, Zmax, Mmin, Mmax
}

impl ShapefileHeader {
    pub fn new(shape_type: ShapeType) -> ShapefileHeader {
        ShapefileHeader {
            file_code: FILE_CODE,
            file_length: (HEADER_SIZE / 2) as u32,
            version: VERSION,
            shape_type: shape_type,
            bounds: BoundingBox::default(),
        }
    }

    /// Decodes a header. The signature is checked by the caller, which knows
    /// which of the two files the bytes came from.
    pub fn from_bytes(bytes: &[u8]) -> Result<ShapefileHeader, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("header holds {} of {} bytes", bytes.len(), HEADER_SIZE),
            ));
        }
        let mut bor = ByteOrderReader::new(Cursor::new(&bytes[0..HEADER_SIZE]), Endianness::BigEndian)?;
        let file_code = bor.read_i32()?;
        bor.seek(24)?;
        let file_length = bor.read_u32()?;

        // the rest of the header is in LittleEndian format
        bor.set_byte_order(Endianness::LittleEndian);
        let version = bor.read_i32()?;
        let st = bor.read_i32()?;
        let shape_type = ShapeType::from_int(st).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidData,
                format!("unrecognized shape type {} in file header", st),
            )
        })?;

        let x_min = bor.read_f64()?;
        let y_min = bor.read_f64()?;
        let x_max = bor.read_f64()?;
        let y_max = bor.read_f64()?;
        let z_min = bor.read_f64()?;
        let z_max = bor.read_f64()?;
        let m_min = bor.read_f64()?;
        let m_max = bor.read_f64()?;

        Ok(ShapefileHeader {
            file_code: file_code,
            file_length: file_length,
            version: version,
            shape_type: shape_type,
            bounds: BoundingBox::from_min_max(
                [x_min, y_min, z_min, m_min],
                [x_max, y_max, z_max, m_max],
            ),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut writer = ByteOrderWriter::new(Vec::with_capacity(HEADER_SIZE), Endianness::BigEndian);
        writer.write_i32(self.file_code)?;
        // unused; five BigEndian i32s
        writer.write_bytes(&[0u8; 20])?;
        writer.write_u32(self.file_length)?;

        writer.set_byte_order(Endianness::LittleEndian);
        writer.write_i32(self.version)?;
        writer.write_i32(self.shape_type.to_int())?;
        let bb = &self.bounds;
        for v in [
            bb.x_min, bb.y_min, bb.x_max, bb.y_max, bb.z_min, bb.z_max, bb.m_min, bb.m_max,
        ] {
            writer.write_f64(v)?;
        }
        Ok(writer.into_inner())
    }
}

/// Converts a header length in 16-bit words into bytes.
pub(crate) fn file_size_from_words(words: u32) -> u32 {
    if words < u32::MAX / 2 {
        words * 2
    } else {
        (u32::MAX / 2) * 2
    }
}

/// Whether the bytes start with the 9994 file code. The last byte may also
/// be 0x0D, which some writers produce for index files.
pub(crate) fn has_valid_signature(bytes: &[u8], allow_0d: bool) -> bool {
    bytes.len() >= 4
        && bytes[0] == 0
        && bytes[1] == 0
        && bytes[2] == 0x27
        && (bytes[3] == 0x0a || (allow_0d && bytes[3] == 0x0d))
}

impl fmt::Display for ShapefileHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = format!(
            "file_code: {}
file_length: {}
version: {}
shape_type: {}
x_min: {}
x_max: {}
y_min: {}
y_max: {}
z_min: {}
z_max: {}
m_min: {}
m_max: {}",
            self.file_code,
            self.file_length,
            self.version,
            self.shape_type,
            self.bounds.x_min,
            self.bounds.x_max,
            self.bounds.y_min,
            self.bounds.y_max,
            self.bounds.z_min,
            self.bounds.z_max,
            self.bounds.m_min,
            self.bounds.m_max
        );
        write!(f, "{}", s)
    }
}
