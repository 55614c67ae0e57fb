/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 02/09/2026
Last Modified: 11/10/2026
License: MIT
*/
use std::fmt;

/// A four-axis (X, Y, Z, M) extent.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub z_min: f64,
    pub m_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub z_max: f64,
    pub m_max: f64,
}

impl BoundingBox {
    /// Builds a box from `[x, y, z, m]` minimum and maximum arrays.
    pub fn from_min_max(min: [f64; 4], max: [f64; 4]) -> BoundingBox {
        BoundingBox {
            x_min: min[0],
            y_min: min[1],
            z_min: min[2],
            m_min: min[3],
            x_max: max[0],
            y_max: max[1],
            z_max: max[2],
            m_max: max[3],
        }
    }

    /// A degenerate box covering exactly one vertex.
    pub fn from_point(x: f64, y: f64, z: f64, m: f64) -> BoundingBox {
        BoundingBox::from_min_max([x, y, z, m], [x, y, z, m])
    }

    pub fn min(&self) -> [f64; 4] {
        [self.x_min, self.y_min, self.z_min, self.m_min]
    }

    pub fn max(&self) -> [f64; 4] {
        [self.x_max, self.y_max, self.z_max, self.m_max]
    }

    pub fn expand_to_include(&mut self, x: f64, y: f64, z: f64, m: f64) {
        self.x_min = self.x_min.min(x);
        self.y_min = self.y_min.min(y);
        self.z_min = self.z_min.min(z);
        self.m_min = self.m_min.min(m);
        self.x_max = self.x_max.max(x);
        self.y_max = self.y_max.max(y);
        self.z_max = self.z_max.max(z);
        self.m_max = self.m_max.max(m);
    }

    pub fn expand_to(&mut self, other: &BoundingBox) {
        self.expand_to_include(other.x_min, other.y_min, other.z_min, other.m_min);
        self.expand_to_include(other.x_max, other.y_max, other.z_max, other.m_max);
    }

    pub fn get_width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn get_height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "x: [{}, {}], y: [{}, {}], z: [{}, {}], m: [{}, {}]",
            self.x_min,
            self.x_max,
            self.y_min,
            self.y_max,
            self.z_min,
            self.z_max,
            self.m_min,
            self.m_max
        )
    }
}
