//! # Lens Core
//!
//! This crate provides the pieces of the lens modifier that every coordinate transform shares:
//! the normalized coordinate system and the pipeline of coordinate callbacks that turns a
//! destination pixel into the source position it must be sampled from.
//!
//! ## Normalized coordinates
//!
//! All geometric corrections work in a normalized space. Pixel coordinates are scaled so that
//! half of the shorter image side becomes one unit and translated so that the optical axis sits at
//! the origin. The focal length is expressed in the same units ([`NormalizedGeometry::f_normalized`]).
//! The X axis points right and the Y axis points down, like in the image itself.
//!
//! ```text
//!   (0, 0) pixel
//!      +--------------------------------+
//!      |                                |
//!      |            (0, -1)             |
//!      |               |                |
//!      |   (-1.5, 0) --O-- (1.5, 0)     |
//!      |               |                |
//!      |            (0, 1)              |
//!      |                                |
//!      +--------------------------------+
//! ```
//!
//! ## Coordinate callbacks
//!
//! A [`Modifier`] owns an ordered chain of [`CoordCallback`]s. Each callback is a plain function
//! together with the parameter block it was registered with. The chain works in reverse: it is fed
//! the normalized coordinates of pixels in the corrected image and rewrites them in place into the
//! coordinates of the original image. Callbacks only read their parameter block, so the chain can be
//! run on disjoint coordinate ranges from many threads at once.

mod geometry;
mod modifier;

pub use geometry::*;
pub use modifier::*;
pub use nalgebra;
