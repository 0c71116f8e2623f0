//! Static navigation of tracks through a detector geometry, with binned
//! surface material and material scans on top.

pub mod bins;
pub mod config;
pub mod context;
pub mod detector;
pub mod effects;
pub mod extrapolator;
pub mod geometry;
pub mod hierarchy;
pub mod material;
pub mod navigator;
pub mod output;
pub mod parameters;
pub mod propagator;
pub mod scan;
pub mod settings;
pub mod status;
pub mod surface_material;
