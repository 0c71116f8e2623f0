//! Track parameters carried through the geometry.
//!
//! Charged and neutral tracks share one navigation algorithm, so the
//! navigator only relies on the [`TrackState`] capability set.

use std::fmt;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn direction_is_normalised() {
        let params = ChargedParameters::new(Point3::origin(), Vector3::new(3.0, 0.0, 4.0), 1.0, -1.0);
        assert!((params.direction().norm() - 1.0).abs() < 1e-6);
        assert!((params.direction().x - 0.6).abs() < 1e-6);
        assert_eq!(params.charge(), -1.0);
    }

    #[test]
    fn neutral_has_no_charge() {
        let params = NeutralParameters::new(Point3::origin(), Vector3::z(), 2.0);
        assert_eq!(params.charge(), 0.0);
        assert_eq!(params.momentum(), 2.0);
    }

    #[test]
    fn signed_direction() {
        assert_eq!(Direction::Along.sign(), 1.0);
        assert_eq!(Direction::Opposite.sign(), -1.0);
        assert_eq!(Direction::Along.reversed(), Direction::Opposite);
    }
}

/// Propagation direction relative to the momentum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Along,
    Opposite,
}

impl Direction {
    pub fn sign(&self) -> f32 {
        match self {
            Direction::Along => 1.0,
            Direction::Opposite => -1.0,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            Direction::Along => Direction::Opposite,
            Direction::Opposite => Direction::Along,
        }
    }
}

/// Capabilities the navigator needs from a track state.
pub trait TrackState: Clone + fmt::Debug + Send + Sync {
    fn position(&self) -> &Point3<f32>;
    /// Unit vector along the momentum.
    fn direction(&self) -> &Vector3<f32>;
    fn momentum(&self) -> f32;
    fn charge(&self) -> f32;

    fn set_position(&mut self, position: Point3<f32>);
    /// Sets the direction, normalising it.
    fn set_direction(&mut self, direction: Vector3<f32>);
    fn set_momentum(&mut self, momentum: f32);
}

/// Parameters of a charged track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargedParameters {
    pub position: Point3<f32>,
    direction: Vector3<f32>,
    pub momentum: f32,
    pub charge: f32,
}

impl ChargedParameters {
    pub fn new(position: Point3<f32>, direction: Vector3<f32>, momentum: f32, charge: f32) -> Self {
        Self {
            position,
            direction: direction.normalize(),
            momentum,
            charge,
        }
    }
}

impl TrackState for ChargedParameters {
    fn position(&self) -> &Point3<f32> {
        &self.position
    }

    fn direction(&self) -> &Vector3<f32> {
        &self.direction
    }

    fn momentum(&self) -> f32 {
        self.momentum
    }

    fn charge(&self) -> f32 {
        self.charge
    }

    fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
    }

    fn set_direction(&mut self, direction: Vector3<f32>) {
        self.direction = direction.normalize();
    }

    fn set_momentum(&mut self, momentum: f32) {
        self.momentum = momentum;
    }
}

/// Parameters of a neutral track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutralParameters {
    pub position: Point3<f32>,
    direction: Vector3<f32>,
    pub momentum: f32,
}

impl NeutralParameters {
    pub fn new(position: Point3<f32>, direction: Vector3<f32>, momentum: f32) -> Self {
        Self {
            position,
            direction: direction.normalize(),
            momentum,
        }
    }
}

impl TrackState for NeutralParameters {
    fn position(&self) -> &Point3<f32> {
        &self.position
    }

    fn direction(&self) -> &Vector3<f32> {
        &self.direction
    }

    fn momentum(&self) -> f32 {
        self.momentum
    }

    fn charge(&self) -> f32 {
        0.0
    }

    fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
    }

    fn set_direction(&mut self, direction: Vector3<f32>) {
        self.direction = direction.normalize();
    }

    fn set_momentum(&mut self, momentum: f32) {
        self.momentum = momentum;
    }
}
