/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 02/09/2026
Last Modified: 12/10/2026
License: MIT
*/

// private sub-module defined in other files
pub mod shapefile;

// exports identifiers from private sub-modules in the current module namespace
pub use crate::shapefile::error::{Result, ShapefileError};
pub use crate::shapefile::geometry::*;
pub use crate::shapefile::header::ShapefileHeader;
pub use crate::shapefile::index::{restore_shx, RecordLocator};
pub use crate::shapefile::record::RecordView;
pub use crate::shapefile::source::{collect_point_locations, GeometrySource};
pub use crate::shapefile::{AccessMode, Shapefile, ShapefileInfo};
