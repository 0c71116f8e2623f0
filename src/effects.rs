use crate::geometry::Surface;
use crate::material::MaterialProperties;
use crate::parameters::{Direction, TrackState};

/// Material-effects collaborator of the navigator.
///
/// Called once per crossed boundary that carries valid material, with the
/// parameters already sitting on the surface. Implementations update the
/// parameters in place and cannot fail.
pub trait MaterialEffects<P: TrackState>: Send + Sync {
    fn update(
        &self,
        parameters: &mut P,
        surface: &Surface,
        material: &MaterialProperties,
        direction: Direction,
    );
}

/// Leaves the parameters untouched. The navigator still records the material
/// budget on the context, which is all a material scan needs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NoMaterialEffects;

impl<P: TrackState> MaterialEffects<P> for NoMaterialEffects {
    fn update(&self, _: &mut P, _: &Surface, _: &MaterialProperties, _: Direction) {}
}
