//! Plain data shared between the window manager core and the X11 backend.

pub mod geometry;

pub use geometry::Geometry;
