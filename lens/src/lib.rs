//! # `lens`
//!
//! Batteries-included lens correction crate
//!
//! This crate gathers the lens crates in one place. If you only need part of it, import the
//! crates individually or disable default features and enable the ones you want.
//!
//! The image [`Modifier`] and its [`NormalizedGeometry`] are in the root of the crate.
//!
//! ## Modules
//! * [`geom`] - projections, line intersections, the Jacobi SVD and conic fitting
//! * [`perspective`] - perspective correction from control points

pub use lens_core::*;

/// Geometry kernels
pub mod geom {
    #[cfg(feature = "lens-geom")]
    pub use lens_geom::*;
}

/// Perspective correction
pub mod perspective {
    #[cfg(feature = "lens-perspective")]
    pub use lens_perspective::{
        calculate_angles, determine_rho_h, effective_rotation_angle, generate_correction_rotation,
        generate_rotation_matrix, perspective_correction_callback, strength_factor,
        ControlPointMode, CorrectionAngles, PerspectiveCorrection, PerspectiveError,
        PerspectiveParameters, ReferenceCenter, PERSPECTIVE_CORRECTION_PRIORITY,
    };
}
