/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 03/09/2026
Last Modified: 19/10/2026
License: MIT
*/
use crate::shapefile::error::{Result, ShapefileError};
use shpio_common::algorithms::{is_clockwise_order, point_in_poly, signed_ring_area};
use shpio_common::structures::{BoundingBox, Point2D};
use shpio_common::utils::{ByteOrderWriter, Endianness};
use std::fmt;
use std::ops::Range;

/// One decoded shape. The shape type tag is kept alongside the family-specific
/// vertex data because a file may mix Null records in with its declared type,
/// and because the Z and M flavours of a family share one layout.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapefileGeometry {
    pub shape_type: ShapeType,
    pub bounds: BoundingBox,
    pub data: GeometryData,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GeometryData {
    Null,
    Point {
        point: Point2D,
        z: Option<f64>,
        m: Option<f64>,
    },
    MultiPoint {
        points: Vec<Point2D>,
        z_array: Option<Vec<f64>>,
        m_array: Option<Vec<f64>>,
    },
    /// PolyLine, Polygon and MultiPatch records. `part_starts` index into
    /// `points`; `part_types` runs parallel to `part_starts`.
    MultiPart {
        part_starts: Vec<usize>,
        part_types: Vec<PartType>,
        points: Vec<Point2D>,
        z_array: Option<Vec<f64>>,
        m_array: Option<Vec<f64>>,
    },
}

impl ShapefileGeometry {
    pub fn null() -> ShapefileGeometry {
        ShapefileGeometry {
            shape_type: ShapeType::Null,
            bounds: BoundingBox::default(),
            data: GeometryData::Null,
        }
    }

    /// Creates a Point, PointZ or PointM record.
    pub fn new_point(
        shape_type: ShapeType,
        point: Point2D,
        z: Option<f64>,
        m: Option<f64>,
    ) -> Result<ShapefileGeometry> {
        let mut sfg = ShapefileGeometry {
            shape_type: shape_type,
            bounds: BoundingBox::default(),
            data: GeometryData::Point {
                point: point,
                z: z,
                m: m,
            },
        };
        sfg.validate()?;
        sfg.compute_extents();
        Ok(sfg)
    }

    /// Creates a MultiPoint, MultiPointZ or MultiPointM record.
    pub fn new_multipoint(
        shape_type: ShapeType,
        points: Vec<Point2D>,
        z_array: Option<Vec<f64>>,
        m_array: Option<Vec<f64>>,
    ) -> Result<ShapefileGeometry> {
        let mut sfg = ShapefileGeometry {
            shape_type: shape_type,
            bounds: BoundingBox::default(),
            data: GeometryData::MultiPoint {
                points: points,
                z_array: z_array,
                m_array: m_array,
            },
        };
        sfg.validate()?;
        sfg.compute_extents();
        Ok(sfg)
    }

    /// Creates a multi-part record (PolyLine, Polygon or MultiPatch, in any
    /// flavour). An empty `part_types` means every part is a `Ring`.
    pub fn new_multipart(
        shape_type: ShapeType,
        part_starts: Vec<usize>,
        part_types: Vec<PartType>,
        points: Vec<Point2D>,
        z_array: Option<Vec<f64>>,
        m_array: Option<Vec<f64>>,
    ) -> Result<ShapefileGeometry> {
        let part_types = if part_types.is_empty() {
            vec![PartType::Ring; part_starts.len()]
        } else {
            part_types
        };
        let mut sfg = ShapefileGeometry {
            shape_type: shape_type,
            bounds: BoundingBox::default(),
            data: GeometryData::MultiPart {
                part_starts: part_starts,
                part_types: part_types,
                points: points,
                z_array: z_array,
                m_array: m_array,
            },
        };
        sfg.validate()?;
        sfg.compute_extents();
        Ok(sfg)
    }

    /// Builds a multi-part record from a list of vertex runs, one per part.
    pub fn from_parts(shape_type: ShapeType, parts: &[Vec<Point2D>]) -> Result<ShapefileGeometry> {
        let mut part_starts = Vec::with_capacity(parts.len());
        let mut points = vec![];
        for part in parts {
            part_starts.push(points.len());
            points.extend_from_slice(part);
        }
        ShapefileGeometry::new_multipart(shape_type, part_starts, vec![], points, None, None)
    }

    pub fn num_points(&self) -> usize {
        match &self.data {
            GeometryData::Null => 0,
            GeometryData::Point { .. } => 1,
            GeometryData::MultiPoint { points, .. } => points.len(),
            GeometryData::MultiPart { points, .. } => points.len(),
        }
    }

    pub fn num_parts(&self) -> usize {
        match &self.data {
            GeometryData::MultiPart { part_starts, .. } => part_starts.len(),
            _ => 0,
        }
    }

    pub fn points(&self) -> &[Point2D] {
        match &self.data {
            GeometryData::Null => &[],
            GeometryData::Point { point, .. } => std::slice::from_ref(point),
            GeometryData::MultiPoint { points, .. } => points,
            GeometryData::MultiPart { points, .. } => points,
        }
    }

    pub fn z_array(&self) -> Option<&[f64]> {
        match &self.data {
            GeometryData::Null => None,
            GeometryData::Point { z, .. } => z.as_ref().map(std::slice::from_ref),
            GeometryData::MultiPoint { z_array, .. } => z_array.as_deref(),
            GeometryData::MultiPart { z_array, .. } => z_array.as_deref(),
        }
    }

    pub fn m_array(&self) -> Option<&[f64]> {
        match &self.data {
            GeometryData::Null => None,
            GeometryData::Point { m, .. } => m.as_ref().map(std::slice::from_ref),
            GeometryData::MultiPoint { m_array, .. } => m_array.as_deref(),
            GeometryData::MultiPart { m_array, .. } => m_array.as_deref(),
        }
    }

    pub fn measure_is_used(&self) -> bool {
        self.m_array().is_some()
    }

    pub fn part_starts(&self) -> &[usize] {
        match &self.data {
            GeometryData::MultiPart { part_starts, .. } => part_starts,
            _ => &[],
        }
    }

    pub fn part_types(&self) -> &[PartType] {
        match &self.data {
            GeometryData::MultiPart { part_types, .. } => part_types,
            _ => &[],
        }
    }

    /// The range of vertex indices making up part `i`.
    pub fn part_range(&self, i: usize) -> Range<usize> {
        let starts = self.part_starts();
        let end = if i + 1 < starts.len() {
            starts[i + 1]
        } else {
            self.num_points()
        };
        starts[i]..end
    }

    /// The vertices of part `i`.
    pub fn part(&self, i: usize) -> &[Point2D] {
        &self.points()[self.part_range(i)]
    }

    /// Recomputes the record's four-axis bounds from its vertices. Absent Z
    /// or M channels contribute zero.
    pub fn compute_extents(&mut self) {
        let points = self.points();
        if points.is_empty() {
            self.bounds = BoundingBox::default();
            return;
        }
        let z = self.z_array();
        let m = self.m_array();
        let value = |channel: Option<&[f64]>, i: usize| channel.map_or(0f64, |c| c[i]);
        let mut bounds = BoundingBox::from_point(points[0].x, points[0].y, value(z, 0), value(m, 0));
        for (i, p) in points.iter().enumerate().skip(1) {
            bounds.expand_to_include(p.x, p.y, value(z, i), value(m, i));
        }
        self.bounds = bounds;
    }

    /// Checks that the vertex data agrees with the shape type and with the
    /// record invariants, so that the record can be encoded and read back
    /// unchanged.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ShapefileError::InvalidGeometry(msg));
        let st = self.shape_type;
        let family_ok = match (&self.data, st.base_shape_type()) {
            (GeometryData::Null, ShapeType::Null) => true,
            (GeometryData::Point { .. }, ShapeType::Point) => true,
            (GeometryData::MultiPoint { .. }, ShapeType::MultiPoint) => true,
            (GeometryData::MultiPart { .. }, ShapeType::PolyLine)
            | (GeometryData::MultiPart { .. }, ShapeType::Polygon)
            | (GeometryData::MultiPart { .. }, ShapeType::MultiPatch) => true,
            _ => false,
        };
        if !family_ok {
            return invalid(format!("vertex data does not match shape type {}", st));
        }

        let n = self.num_points();
        match (st.has_z(), self.z_array()) {
            (true, None) => return invalid(format!("{} records require Z values", st)),
            (false, Some(_)) => return invalid(format!("{} records cannot carry Z values", st)),
            (true, Some(z)) if z.len() != n => {
                return invalid(format!("{} Z values for {} vertices", z.len(), n))
            }
            _ => {}
        }
        match (st.dimension(), self.m_array()) {
            (ShapeTypeDimension::Measure, None) => {
                return invalid(format!("{} records require measures", st))
            }
            (_, Some(m)) if m.len() != n => {
                return invalid(format!("{} measures for {} vertices", m.len(), n))
            }
            _ => {}
        }

        if let GeometryData::MultiPart {
            part_starts,
            part_types,
            ..
        } = &self.data
        {
            if part_types.len() != part_starts.len() {
                return invalid(format!(
                    "{} part types for {} parts",
                    part_types.len(),
                    part_starts.len()
                ));
            }
            if n == 0 && !part_starts.is_empty() {
                return invalid("a record without vertices cannot have parts".to_string());
            }
            if part_starts.first().map_or(false, |&s| s != 0) {
                return invalid("the first part must start at vertex 0".to_string());
            }
            for (i, &start) in part_starts.iter().enumerate() {
                if start >= n || (i > 0 && start <= part_starts[i - 1]) {
                    return invalid(format!("part {} starts at invalid vertex {}", i, start));
                }
            }
            if n > i32::MAX as usize || part_starts.len() > i32::MAX as usize {
                return invalid("too many vertices or parts for one record".to_string());
            }
        }
        Ok(())
    }

    /// Reorders polygon rings so that outer rings run clockwise and holes run
    /// counter-clockwise. A ring is a hole when its first vertex lies inside
    /// an odd number of the other rings. Returns true if any ring was reversed.
    pub fn rewind(&mut self) -> bool {
        if self.shape_type.base_shape_type() != ShapeType::Polygon {
            return false;
        }
        let num_parts = self.num_parts();
        let mut to_reverse = vec![];
        for i in 0..num_parts {
            let ring = self.part(i);
            if ring.is_empty() {
                continue;
            }
            let test_point = ring[0];
            let mut is_inner = false;
            for j in 0..num_parts {
                if j != i && point_in_poly(&test_point, self.part(j)) {
                    is_inner = !is_inner;
                }
            }
            // degenerate rings have no orientation to fix
            if signed_ring_area(ring) == 0f64 {
                continue;
            }
            if is_clockwise_order(ring) == is_inner {
                to_reverse.push(self.part_range(i));
            }
        }

        if let GeometryData::MultiPart {
            points,
            z_array,
            m_array,
            ..
        } = &mut self.data
        {
            for range in &to_reverse {
                points[range.clone()].reverse();
                if let Some(z) = z_array {
                    z[range.clone()].reverse();
                }
                if let Some(m) = m_array {
                    m[range.clone()].reverse();
                }
            }
        }
        !to_reverse.is_empty()
    }

    /// Whether an M block is written for this record. M-typed records always
    /// carry one; Z-typed records carry one only when measures are present.
    fn writes_measures(&self) -> bool {
        match self.shape_type.dimension() {
            ShapeTypeDimension::Measure => true,
            ShapeTypeDimension::Z => self.measure_is_used(),
            ShapeTypeDimension::XY => false,
        }
    }

    /// The record content length in bytes, excluding the 8-byte record header.
    pub fn get_length(&self) -> usize {
        let n = self.num_points();
        let zm_block = 16 + 8 * n;
        let mut len = 4usize; // shape type
        match &self.data {
            GeometryData::Null => {}
            GeometryData::Point { .. } => {
                len += 16;
                if self.shape_type.has_z() {
                    len += 8;
                }
                if self.writes_measures() {
                    len += 8;
                }
            }
            GeometryData::MultiPoint { .. } | GeometryData::MultiPart { .. } => {
                len += 32 + 4 + 16 * n;
                if let GeometryData::MultiPart { part_starts, .. } = &self.data {
                    len += 4 + 4 * part_starts.len();
                    if self.shape_type == ShapeType::MultiPatch {
                        len += 4 * part_starts.len();
                    }
                }
                if self.shape_type.has_z() {
                    len += zm_block;
                }
                if self.writes_measures() {
                    len += zm_block;
                }
            }
        }
        len
    }

    /// Serialises the record, including its 8-byte record header. All header
    /// words are big-endian and all content words little-endian.
    pub fn to_record_bytes(&self, record_number: i32) -> Result<Vec<u8>> {
        self.validate()?;
        let content_length = self.get_length();
        let mut writer =
            ByteOrderWriter::new(Vec::with_capacity(8 + content_length), Endianness::BigEndian);
        writer.write_i32(record_number)?;
        writer.write_i32((content_length / 2) as i32)?; // in 16-bit words

        writer.set_byte_order(Endianness::LittleEndian);
        writer.write_i32(self.shape_type.to_int())?;

        let bb = &self.bounds;
        let write_zm = |writer: &mut ByteOrderWriter<Vec<u8>>, min: f64, max: f64, values: &[f64]| -> std::io::Result<()> {
            writer.write_f64(min)?;
            writer.write_f64(max)?;
            for v in values {
                writer.write_f64(*v)?;
            }
            Ok(())
        };

        match &self.data {
            GeometryData::Null => {}
            GeometryData::Point { point, z, m } => {
                writer.write_f64(point.x)?;
                writer.write_f64(point.y)?;
                if self.shape_type.has_z() {
                    writer.write_f64(z.unwrap_or(0f64))?;
                }
                if self.writes_measures() {
                    writer.write_f64(m.unwrap_or(0f64))?;
                }
            }
            GeometryData::MultiPoint { points, .. } | GeometryData::MultiPart { points, .. } => {
                writer.write_f64(bb.x_min)?;
                writer.write_f64(bb.y_min)?;
                writer.write_f64(bb.x_max)?;
                writer.write_f64(bb.y_max)?;

                if let GeometryData::MultiPart {
                    part_starts,
                    part_types,
                    ..
                } = &self.data
                {
                    writer.write_i32(part_starts.len() as i32)?;
                    writer.write_i32(points.len() as i32)?;
                    for start in part_starts {
                        writer.write_i32(*start as i32)?;
                    }
                    if self.shape_type == ShapeType::MultiPatch {
                        for pt in part_types {
                            writer.write_i32(pt.to_int())?;
                        }
                    }
                } else {
                    writer.write_i32(points.len() as i32)?;
                }

                for p in points {
                    writer.write_f64(p.x)?;
                    writer.write_f64(p.y)?;
                }

                if let Some(z) = self.z_array() {
                    write_zm(&mut writer, bb.z_min, bb.z_max, z)?;
                }
                // trailing measures read from an XY record are not written back
                if let (true, Some(m)) = (self.writes_measures(), self.m_array()) {
                    write_zm(&mut writer, bb.m_min, bb.m_max, m)?;
                }
            }
        }

        debug_assert_eq!(writer.get_num_bytes_written(), 8 + content_length);
        Ok(writer.into_inner())
    }
}

impl fmt::Display for ShapefileGeometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "shape_type: {}
bounds: {}
num_parts: {}
num_points: {}
parts: {:?}
part_types: {:?}
points: {:?}
z_array: {:?}
m_array: {:?}",
            self.shape_type,
            self.bounds,
            self.num_parts(),
            self.num_points(),
            self.part_starts(),
            self.part_types(),
            self.points(),
            self.z_array(),
            self.m_array()
        )
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShapeType {
    Null = 0,
    Point = 1,
    PolyLine = 3,
    Polygon = 5,
    MultiPoint = 8,
    PointZ = 11,
    PolyLineZ = 13,
    PolygonZ = 15,
    MultiPointZ = 18,
    PointM = 21,
    PolyLineM = 23,
    PolygonM = 25,
    MultiPointM = 28,
    MultiPatch = 31,
}

impl ShapeType {
    pub fn from_int(value: i32) -> Option<ShapeType> {
        match value {
            0 => Some(ShapeType::Null),
            1 => Some(ShapeType::Point),
            3 => Some(ShapeType::PolyLine),
            5 => Some(ShapeType::Polygon),
            8 => Some(ShapeType::MultiPoint),
            11 => Some(ShapeType::PointZ),
            13 => Some(ShapeType::PolyLineZ),
            15 => Some(ShapeType::PolygonZ),
            18 => Some(ShapeType::MultiPointZ),
            21 => Some(ShapeType::PointM),
            23 => Some(ShapeType::PolyLineM),
            25 => Some(ShapeType::PolygonM),
            28 => Some(ShapeType::MultiPointM),
            31 => Some(ShapeType::MultiPatch),
            _ => None,
        }
    }

    pub fn to_int(&self) -> i32 {
        *self as i32
    }

    pub fn base_shape_type(&self) -> ShapeType {
        match self {
            ShapeType::Null => ShapeType::Null,
            ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => ShapeType::Point,
            ShapeType::PolyLine | ShapeType::PolyLineZ | ShapeType::PolyLineM => {
                ShapeType::PolyLine
            }
            ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM => ShapeType::Polygon,
            ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM => {
                ShapeType::MultiPoint
            }
            ShapeType::MultiPatch => ShapeType::MultiPatch,
        }
    }

    pub fn dimension(&self) -> ShapeTypeDimension {
        match self {
            ShapeType::Null
            | ShapeType::MultiPoint
            | ShapeType::Point
            | ShapeType::Polygon
            | ShapeType::PolyLine => ShapeTypeDimension::XY,
            ShapeType::MultiPointM
            | ShapeType::PointM
            | ShapeType::PolygonM
            | ShapeType::PolyLineM => ShapeTypeDimension::Measure,
            ShapeType::MultiPointZ
            | ShapeType::PointZ
            | ShapeType::PolygonZ
            | ShapeType::PolyLineZ
            | ShapeType::MultiPatch => ShapeTypeDimension::Z,
        }
    }

    /// True for the types whose records carry a Z block.
    pub fn has_z(&self) -> bool {
        self.dimension() == ShapeTypeDimension::Z
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShapeTypeDimension {
    XY,
    Measure,
    Z,
}

impl Default for ShapeType {
    fn default() -> ShapeType {
        ShapeType::Null
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let printable = match *self {
            ShapeType::Null => "Null",
            ShapeType::Point => "Point",
            ShapeType::PolyLine => "PolyLine",
            ShapeType::Polygon => "Polygon",
            ShapeType::MultiPoint => "MultiPoint",
            ShapeType::PointZ => "PointZ",
            ShapeType::PolyLineZ => "PolyLineZ",
            ShapeType::PolygonZ => "PolygonZ",
            ShapeType::MultiPointZ => "MultiPointZ",
            ShapeType::PointM => "PointM",
            ShapeType::PolyLineM => "PolyLineM",
            ShapeType::PolygonM => "PolygonM",
            ShapeType::MultiPointM => "MultiPointM",
            ShapeType::MultiPatch => "MultiPatch",
        };
        write!(f, "{}", printable)
    }
}

/// MultiPatch part types. Parts of every other multi-part type are `Ring`s.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartType {
    TriangleStrip,
    TriangleFan,
    OuterRing,
    InnerRing,
    FirstRing,
    Ring,
    Other(i32),
}

impl PartType {
    pub fn from_int(value: i32) -> PartType {
        match value {
            0 => PartType::TriangleStrip,
            1 => PartType::TriangleFan,
            2 => PartType::OuterRing,
            3 => PartType::InnerRing,
            4 => PartType::FirstRing,
            5 => PartType::Ring,
            v => PartType::Other(v),
        }
    }

    pub fn to_int(&self) -> i32 {
        match self {
            PartType::TriangleStrip => 0,
            PartType::TriangleFan => 1,
            PartType::OuterRing => 2,
            PartType::InnerRing => 3,
            PartType::FirstRing => 4,
            PartType::Ring => 5,
            PartType::Other(v) => *v,
        }
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PartType::TriangleStrip => write!(f, "TriangleStrip"),
            PartType::TriangleFan => write!(f, "TriangleFan"),
            PartType::OuterRing => write!(f, "OuterRing"),
            PartType::InnerRing => write!(f, "InnerRing"),
            PartType::FirstRing => write!(f, "FirstRing"),
            PartType::Ring => write!(f, "Ring"),
            PartType::Other(v) => write!(f, "UnknownPartType({})", v),
        }
    }
}
