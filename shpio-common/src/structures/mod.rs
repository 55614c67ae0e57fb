// private sub-module defined in other files
mod bounding_box;
mod point2d;
mod point3d;

// exports identifiers from private sub-modules in the current module namespace
pub use self::bounding_box::BoundingBox;
pub use self::point2d::Point2D;
pub use self::point3d::Point3D;
