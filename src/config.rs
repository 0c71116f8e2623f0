/// Minimum path length to a boundary candidate. Intersections closer than this are ignored,
/// which stops a state sitting on a surface from re-selecting that surface.
pub const MINIMUM_STEP: f32 = 1e-3;
/// Tolerance (in geometry units) for volume containment and on-surface checks.
pub const CONTAINMENT_TOLERANCE: f32 = 1e-4;
/// Tolerance (in geometry units) on surface bounds when intersecting. Hits on the rim of
/// two touching surfaces must be accepted by at least one of them.
pub const BOUNDS_TOLERANCE: f32 = 1e-3;
/// Default maximum path length of a single boundary candidate.
pub const DEFAULT_PATH_CUTOFF: f32 = 1e5;
/// Minimum absolute value of a direction/normal dot product to be considered non-parallel.
pub const PARALLEL_THRESHOLD: f32 = 1e-6;
