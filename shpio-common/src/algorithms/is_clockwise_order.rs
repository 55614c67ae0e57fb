/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 05/10/2026
Last Modified: 05/10/2026
License: MIT
*/
use crate::structures::Point2D;

/// Returns twice the signed area of a ring. Negative values indicate
/// clockwise order. A repeated closing vertex contributes nothing.
pub fn signed_ring_area(points: &[Point2D]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0f64;
    }
    let mut area = 0f64;
    for j in 0..n {
        let k = if j < n - 1 { j + 1 } else { 0 };
        area += (points[j].x * points[k].y) - (points[k].x * points[j].y);
    }
    area
}

/// Checks whether a sequence of Point2D are in clockwise order. Rings with
/// fewer than three distinct vertices are reported as not clockwise.
pub fn is_clockwise_order(points: &[Point2D]) -> bool {
    signed_ring_area(points) < 0f64
}
