//! Transport of track parameters onto a target surface.
//!
//! The navigator only needs two answers from a propagator: how far away a
//! surface is, and the parameters on it. [`StraightLinePropagator`] answers
//! both for neutral tracks and for charged tracks without magnetic field.

use crate::config::MINIMUM_STEP;
use crate::geometry::Surface;
use crate::parameters::{Direction, TrackState};


/// Parameters on a target surface and the path length it took to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation<P> {
    pub parameters: P,
    pub path_length: f32,
}

/// Propagation collaborator of the navigator.
pub trait Propagator<P: TrackState>: Send + Sync {
    /// Path length to the next intersection with `surface` in `direction`,
    /// or `None` if it cannot be reached.
    fn path_to(&self, parameters: &P, surface: &Surface, direction: Direction) -> Option<f32>;

    /// Transports the parameters onto `surface`.
    fn propagate(
        &self,
        parameters: &P,
        surface: &Surface,
        direction: Direction,
    ) -> Option<Propagation<P>>;
}

/// Straight-line transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightLinePropagator {
    /// Intersections closer than this are ignored.
    pub min_distance: f32,
}

impl Default for StraightLinePropagator {
    fn default() -> Self {
        Self {
            min_distance: MINIMUM_STEP,
        }
    }
}

impl<P: TrackState> Propagator<P> for StraightLinePropagator {
    fn path_to(&self, parameters: &P, surface: &Surface, direction: Direction) -> Option<f32> {
        let heading = parameters.direction() * direction.sign();
        surface
            .intersections(parameters.position(), &heading)
            .into_iter()
            .find(|s| *s > self.min_distance)
    }

    fn propagate(
        &self,
        parameters: &P,
        surface: &Surface,
        direction: Direction,
    ) -> Option<Propagation<P>> {
        let path_length = self.path_to(parameters, surface, direction)?;
        let heading = parameters.direction() * direction.sign();
        let mut parameters = parameters.clone();
        let position = parameters.position() + heading * path_length;
        parameters.set_position(position);
        Some(Propagation {
            parameters,
            path_length,
        })
    }
}
