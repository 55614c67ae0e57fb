/*
This code is part of the shpio shapefile library.
Authors: Dr. John Lindsay
Created: 05/10/2026
Last Modified: 05/10/2026
License: MIT
*/
use crate::structures::Point2D;

/// Tests if a point is Left|On|Right of an infinite line,
/// based on http://geomalgorithms.com/a03-_inclusion.html.
///
/// Return: > 0 for p2 left of the line through p0 and p1
///         = 0 for p2 on the line through p0 and p1
///         < 0 for p2 right of the line through p0 and p1
fn is_left(p0: &Point2D, p1: &Point2D, p2: &Point2D) -> f64 {
    (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y)
}

/// Calculates the winding number of a point with respect to a ring. The ring
/// is treated as closed whether or not its last vertex repeats the first.
pub fn winding_number(p: &Point2D, ring: &[Point2D]) -> i32 {
    let n = ring.len();
    if n < 3 {
        return 0i32;
    }
    let mut wn = 0i32;
    for i in 0..n {
        let a = &ring[i];
        let b = &ring[(i + 1) % n];
        if a.y <= p.y {
            // an upward crossing with p left of the edge
            if b.y > p.y && is_left(a, b, p) > 0f64 {
                wn += 1i32;
            }
        } else if b.y <= p.y && is_left(a, b, p) < 0f64 {
            // a downward crossing with p right of the edge
            wn -= 1i32;
        }
    }
    wn
}

/// Tests whether a point is within a ring. Points on the edge of the ring
/// may fall either way.
pub fn point_in_poly(p: &Point2D, ring: &[Point2D]) -> bool {
    winding_number(p, ring) % 2 != 0i32
}
