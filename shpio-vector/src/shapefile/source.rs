/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 11/09/2026
Last Modified: 19/10/2026
License: MIT
*/

use super::error::Result;
use super::geometry::{GeometryData, ShapefileGeometry};
use super::Shapefile;
use shpio_common::structures::Point3D;

/// Anything that hands out geometries by record index.
pub trait GeometrySource {
    fn num_records(&self) -> usize;
    fn read_geometry(&mut self, index: usize) -> Result<ShapefileGeometry>;
}

impl GeometrySource for Shapefile {
    fn num_records(&self) -> usize {
        Shapefile::num_records(self)
    }

    fn read_geometry(&mut self, index: usize) -> Result<ShapefileGeometry> {
        self.read_record(index)
    }
}

/// Gathers the location of every point record in the source, in record
/// order. Points without a Z value are placed at zero elevation. Records of
/// other families, including Null records, are skipped.
pub fn collect_point_locations<S: GeometrySource + ?Sized>(source: &mut S) -> Result<Vec<Point3D>> {
    let mut locations = Vec::with_capacity(source.num_records());
    for i in 0..source.num_records() {
        if let GeometryData::Point { point, z, .. } = source.read_geometry(i)?.data {
            locations.push(Point3D::new(point.x, point.y, z.unwrap_or(0f64)));
        }
    }
    Ok(locations)
}
