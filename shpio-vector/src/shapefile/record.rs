/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 06/09/2026
Last Modified: 19/10/2026
License: MIT

Notes: Decoding of raw .shp records. A record is validated once, when its
layout is parsed; after that every accessor reads straight out of the
record bytes.
*/
use super::error::{Result, ShapefileError};
use super::geometry::{GeometryData, PartType, ShapeType, ShapefileGeometry};
use byteorder::{ByteOrder, LittleEndian};
use shpio_common::structures::{BoundingBox, Point2D};

/// Scratch space for raw record bytes, owned by the handle and reused
/// between reads.
#[derive(Debug, Default)]
pub(crate) struct RecordBuffer {
    data: Vec<u8>,
}

impl RecordBuffer {
    /// Makes room for at least `size` bytes. Growth overshoots by a third so
    /// that a run of slowly increasing records does not reallocate each time.
    pub fn ensure_capacity(&mut self, size: usize) -> Result<()> {
        if self.data.len() >= size {
            return Ok(());
        }
        let new_size = size
            .saturating_add(size / 3)
            .min(i32::MAX as usize)
            .max(size);
        self.data
            .try_reserve_exact(new_size - self.data.len())
            .map_err(|_| ShapefileError::Allocation(new_size))?;
        self.data.resize(new_size, 0u8);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn slice(&self, len: usize) -> &[u8] {
        &self.data[0..len]
    }

    pub fn slice_mut(&mut self, len: usize) -> &mut [u8] {
        &mut self.data[0..len]
    }
}

/// Sanity ceilings applied to the counts declared inside a record.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RecordLimits {
    pub max_parts: u32,
    pub max_points: u32,
}

/// Where each block of a validated record lives, as byte offsets from the
/// start of the record header.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Layout {
    Null,
    Point {
        z: Option<usize>,
        m: Option<usize>,
    },
    MultiPoint {
        num_points: usize,
        z: Option<usize>,
        m: Option<usize>,
    },
    MultiPart {
        num_parts: usize,
        num_points: usize,
        part_types: Option<usize>,
        points: usize,
        z: Option<usize>,
        m: Option<usize>,
    },
}

const BOUNDS_OFFSET: usize = 12;
const POINT_XY_OFFSET: usize = 12;
const MULTIPOINT_XY_OFFSET: usize = 48;
const PART_STARTS_OFFSET: usize = 52;

/// A validated record, borrowed straight out of the handle's scratch
/// buffer. The borrow ends before the next read on the same handle can
/// start, so a view never observes bytes from a later record.
#[derive(Clone, Copy, Debug)]
pub struct RecordView<'a> {
    bytes: &'a [u8],
    record: usize,
    shape_type: ShapeType,
    layout: Layout,
}

impl<'a> RecordView<'a> {
    /// Parses and validates the layout of the record in `bytes`, which
    /// include the 8-byte record header.
    pub(crate) fn parse(bytes: &'a [u8], record: usize, limits: RecordLimits) -> Result<RecordView<'a>> {
        let size = bytes.len();
        let corrupt = |reason: String| Err(ShapefileError::corrupt_record(record, reason));
        if size < 12 {
            return corrupt(format!("record of {} bytes is too short", size));
        }
        let st = LittleEndian::read_i32(&bytes[8..12]);
        let shape_type = match ShapeType::from_int(st) {
            Some(s) => s,
            None => return corrupt(format!("unrecognized shape type {}", st)),
        };

        let layout = match shape_type.base_shape_type() {
            ShapeType::Null => Layout::Null,

            ShapeType::PolyLine | ShapeType::Polygon | ShapeType::MultiPatch => {
                if size < PART_STARTS_OFFSET {
                    return corrupt(format!("record of {} bytes is too short", size));
                }
                let num_parts = LittleEndian::read_u32(&bytes[44..48]);
                let num_points = LittleEndian::read_u32(&bytes[48..52]);
                if num_points > limits.max_points || num_parts > limits.max_parts {
                    return corrupt(format!(
                        "nPoints = {}, nParts = {}",
                        num_points, num_parts
                    ));
                }
                let (num_parts, num_points) = (num_parts as usize, num_points as usize);
                let is_multipatch = shape_type == ShapeType::MultiPatch;

                let mut required = (PART_STARTS_OFFSET + 4 * num_parts + 16 * num_points) as u64;
                if shape_type.has_z() {
                    required += 16 + 8 * num_points as u64;
                }
                if is_multipatch {
                    required += 4 * num_parts as u64;
                }
                if required > size as u64 {
                    return corrupt(format!(
                        "nPoints = {}, nParts = {}, record size = {}",
                        num_points, num_parts, size
                    ));
                }

                let mut previous = 0i32;
                for i in 0..num_parts {
                    let o = PART_STARTS_OFFSET + 4 * i;
                    let start = LittleEndian::read_i32(&bytes[o..o + 4]);
                    if start < 0
                        || (start as usize >= num_points && num_points > 0)
                        || (start > 0 && num_points == 0)
                    {
                        return corrupt(format!("panPartStart[{}] = {}, nVertices = {}", i, start, num_points));
                    }
                    if i > 0 && start <= previous {
                        return corrupt(format!(
                            "panPartStart[{}] = {}, panPartStart[{}] = {}",
                            i,
                            start,
                            i - 1,
                            previous
                        ));
                    }
                    previous = start;
                }

                let mut offset = PART_STARTS_OFFSET + 4 * num_parts;
                let part_types = if is_multipatch {
                    let o = offset;
                    offset += 4 * num_parts;
                    Some(o)
                } else {
                    None
                };
                let points = offset;
                offset += 16 * num_points;
                let z = block_at(&mut offset, shape_type.has_z(), num_points);
                let has_m = size >= offset + 16 + 8 * num_points;
                let m = block_at(&mut offset, has_m, num_points);
                Layout::MultiPart {
                    num_parts: num_parts,
                    num_points: num_points,
                    part_types: part_types,
                    points: points,
                    z: z,
                    m: m,
                }
            }

            ShapeType::MultiPoint => {
                if size < MULTIPOINT_XY_OFFSET {
                    return corrupt(format!("record of {} bytes is too short", size));
                }
                let num_points = LittleEndian::read_u32(&bytes[44..48]);
                if num_points > limits.max_points {
                    return corrupt(format!("nPoints = {}", num_points));
                }
                let num_points = num_points as usize;
                let mut required = (MULTIPOINT_XY_OFFSET + 16 * num_points) as u64;
                if shape_type.has_z() {
                    required += 16 + 8 * num_points as u64;
                }
                if required > size as u64 {
                    return corrupt(format!(
                        "nPoints = {}, record size = {}",
                        num_points, size
                    ));
                }
                let mut offset = MULTIPOINT_XY_OFFSET + 16 * num_points;
                let z = block_at(&mut offset, shape_type.has_z(), num_points);
                let has_m = size >= offset + 16 + 8 * num_points;
                let m = block_at(&mut offset, has_m, num_points);
                Layout::MultiPoint {
                    num_points: num_points,
                    z: z,
                    m: m,
                }
            }

            _ => {
                // Point family
                let mut offset = POINT_XY_OFFSET + 16;
                let required = offset + if shape_type.has_z() { 8 } else { 0 };
                if size < required {
                    return corrupt(format!("record of {} bytes is too short", size));
                }
                let z = if shape_type.has_z() {
                    offset += 8;
                    Some(offset - 8)
                } else {
                    None
                };
                let m = if size >= offset + 8 { Some(offset) } else { None };
                Layout::Point { z: z, m: m }
            }
        };

        Ok(RecordView {
            bytes: bytes,
            record: record,
            shape_type: shape_type,
            layout: layout,
        })
    }

    /// The zero-based record index this view was read from.
    pub fn record(&self) -> usize {
        self.record
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    pub fn num_points(&self) -> usize {
        match self.layout {
            Layout::Null => 0,
            Layout::Point { .. } => 1,
            Layout::MultiPoint { num_points, .. } => num_points,
            Layout::MultiPart { num_points, .. } => num_points,
        }
    }

    pub fn num_parts(&self) -> usize {
        match self.layout {
            Layout::MultiPart { num_parts, .. } => num_parts,
            _ => 0,
        }
    }

    fn f64_at(&self, offset: usize) -> f64 {
        LittleEndian::read_f64(&self.bytes[offset..offset + 8])
    }

    fn xy_offset(&self) -> usize {
        match self.layout {
            Layout::MultiPart { points, .. } => points,
            Layout::MultiPoint { .. } => MULTIPOINT_XY_OFFSET,
            _ => POINT_XY_OFFSET,
        }
    }

    fn z_block(&self) -> Option<usize> {
        match self.layout {
            Layout::Null => None,
            Layout::Point { z, .. } | Layout::MultiPoint { z, .. } | Layout::MultiPart { z, .. } => z,
        }
    }

    fn m_block(&self) -> Option<usize> {
        match self.layout {
            Layout::Null => None,
            Layout::Point { m, .. } | Layout::MultiPoint { m, .. } | Layout::MultiPart { m, .. } => m,
        }
    }

    /// Offset of the first per-vertex value in a Z or M block. Point records
    /// have no range pair ahead of the value.
    fn channel_values(&self, block: usize) -> usize {
        match self.layout {
            Layout::Point { .. } => block,
            _ => block + 16,
        }
    }

    fn check_vertex(&self, i: usize) {
        assert!(
            i < self.num_points(),
            "vertex index {} out of range for a record of {} vertices",
            i,
            self.num_points()
        );
    }

    fn check_part(&self, i: usize) {
        assert!(
            i < self.num_parts(),
            "part index {} out of range for a record of {} parts",
            i,
            self.num_parts()
        );
    }

    /// Panics if `i` is not below `num_points()`.
    pub fn point(&self, i: usize) -> Point2D {
        self.check_vertex(i);
        let o = self.xy_offset() + 16 * i;
        Point2D::new(self.f64_at(o), self.f64_at(o + 8))
    }

    pub fn points(&self) -> impl Iterator<Item = Point2D> + '_ {
        (0..self.num_points()).map(move |i| self.point(i))
    }

    pub fn has_z(&self) -> bool {
        self.z_block().is_some()
    }

    pub fn z(&self, i: usize) -> Option<f64> {
        self.check_vertex(i);
        self.z_block()
            .map(|block| self.f64_at(self.channel_values(block) + 8 * i))
    }

    /// True when the record carries a trailing block of measures.
    pub fn measure_is_used(&self) -> bool {
        self.m_block().is_some()
    }

    pub fn m(&self, i: usize) -> Option<f64> {
        self.check_vertex(i);
        self.m_block()
            .map(|block| self.f64_at(self.channel_values(block) + 8 * i))
    }

    /// Panics if `i` is not below `num_parts()`.
    pub fn part_start(&self, i: usize) -> usize {
        self.check_part(i);
        let o = PART_STARTS_OFFSET + 4 * i;
        LittleEndian::read_i32(&self.bytes[o..o + 4]) as usize
    }

    pub fn part_type(&self, i: usize) -> PartType {
        self.check_part(i);
        match self.layout {
            Layout::MultiPart {
                part_types: Some(o),
                ..
            } => PartType::from_int(LittleEndian::read_i32(&self.bytes[o + 4 * i..o + 4 * i + 4])),
            _ => PartType::Ring,
        }
    }

    /// The record's own extent. Point records carry none, so theirs is the
    /// point itself; absent Z and M ranges are zero.
    pub fn bounds(&self) -> BoundingBox {
        match self.layout {
            Layout::Null => BoundingBox::default(),
            Layout::Point { .. } => {
                let p = self.point(0);
                BoundingBox::from_point(p.x, p.y, self.z(0).unwrap_or(0f64), self.m(0).unwrap_or(0f64))
            }
            _ => {
                let range = |block: Option<usize>| {
                    block.map_or((0f64, 0f64), |o| (self.f64_at(o), self.f64_at(o + 8)))
                };
                let (z_min, z_max) = range(self.z_block());
                let (m_min, m_max) = range(self.m_block());
                BoundingBox::from_min_max(
                    [
                        self.f64_at(BOUNDS_OFFSET),
                        self.f64_at(BOUNDS_OFFSET + 8),
                        z_min,
                        m_min,
                    ],
                    [
                        self.f64_at(BOUNDS_OFFSET + 16),
                        self.f64_at(BOUNDS_OFFSET + 24),
                        z_max,
                        m_max,
                    ],
                )
            }
        }
    }

    /// Copies the record into an owned geometry.
    pub fn to_geometry(&self) -> ShapefileGeometry {
        let n = self.num_points();
        let z_array = self.z_block().map(|_| (0..n).filter_map(|i| self.z(i)).collect::<Vec<f64>>());
        let m_array = self.m_block().map(|_| (0..n).filter_map(|i| self.m(i)).collect::<Vec<f64>>());
        let data = match self.layout {
            Layout::Null => GeometryData::Null,
            Layout::Point { .. } => GeometryData::Point {
                point: self.point(0),
                z: self.z(0),
                m: self.m(0),
            },
            Layout::MultiPoint { .. } => GeometryData::MultiPoint {
                points: self.points().collect(),
                z_array: z_array,
                m_array: m_array,
            },
            Layout::MultiPart { num_parts, .. } => GeometryData::MultiPart {
                part_starts: (0..num_parts).map(|i| self.part_start(i)).collect(),
                part_types: (0..num_parts).map(|i| self.part_type(i)).collect(),
                points: self.points().collect(),
                z_array: z_array,
                m_array: m_array,
            },
        };
        ShapefileGeometry {
            shape_type: self.shape_type,
            bounds: self.bounds(),
            data: data,
        }
    }
}

/// Claims a Z or M block (range pair plus one value per vertex) at `offset`
/// when `present`, advancing the offset past it.
fn block_at(offset: &mut usize, present: bool, num_points: usize) -> Option<usize> {
    if !present {
        return None;
    }
    let o = *offset;
    *offset += 16 + 8 * num_points;
    Some(o)
}
