/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 05/10/2026
Last Modified: 05/10/2026
License: MIT
*/
// private sub-module defined in other files
mod is_clockwise_order;
mod poly_ops;

// exports identifiers from private sub-modules in the current module namespace
pub use self::is_clockwise_order::{is_clockwise_order, signed_ring_area};
pub use self::poly_ops::{point_in_poly, winding_number};
