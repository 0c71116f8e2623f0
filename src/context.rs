//! Per-traversal navigation state.
//!
//! A [`NavigationContext`] is created by the caller for one track and handed
//! to the navigator on every call. Only the navigator and the collaborators it
//! invokes modify it; it is never shared between traversals.

use nalgebra::Point3;

use crate::geometry::{BoundaryId, VolumeId};
use crate::material::MaterialProperties;
use crate::parameters::{Direction, TrackState};
use crate::status::NavigationStatus;


/// Record of one boundary crossing.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationStep {
    pub boundary: BoundaryId,
    pub from: VolumeId,
    pub to: Option<VolumeId>,
    pub position: Point3<f32>,
    pub path_length: f32,                   // length of this step
    pub material: Option<MaterialProperties>, // material applied on the boundary
    pub path_correction: f32,
}

/// Mutable state of one traversal.
///
/// **Context**: The navigator itself holds no per-track state, so everything
/// that changes while a track is followed lives here: the parameters, where
/// the track is, where it has been and what it has crossed.
///
/// **How it Works**: The status field follows the navigation state machine.
/// Once it is terminal the context must not be handed to the navigator again.
/// The loop guard rejects entering any volume already in `visited`, the
/// optional step limit ends the traversal after that many crossings.
#[derive(Debug, Clone)]
pub struct NavigationContext<P: TrackState> {
    pub parameters: P,
    pub direction: Direction,
    pub current_volume: Option<VolumeId>,
    pub previous_volume: Option<VolumeId>,
    pub last_boundary: Option<BoundaryId>,
    pub path_length: f32,
    pub status: NavigationStatus,
    pub check_loops: bool,
    pub max_steps: Option<usize>,
    pub material_in_x0: f32,
    pub material_in_l0: f32,
    visited: Vec<VolumeId>,
    steps: Vec<NavigationStep>,
}

impl<P: TrackState> NavigationContext<P> {
    /// Creates a context at the start of a traversal. Without a volume the
    /// navigator locates the start volume from the position.
    pub fn new(parameters: P, volume: Option<VolumeId>) -> Self {
        Self {
            parameters,
            direction: Direction::Along,
            current_volume: volume,
            previous_volume: None,
            last_boundary: None,
            path_length: 0.0,
            status: NavigationStatus::Unset,
            check_loops: false,
            max_steps: None,
            material_in_x0: 0.0,
            material_in_l0: 0.0,
            visited: volume.into_iter().collect(),
            steps: Vec::new(),
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_loop_guard(mut self, check_loops: bool) -> Self {
        self.check_loops = check_loops;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Sets the status and hands it back, for `return ctx.finish(..)`.
    pub fn finish(&mut self, status: NavigationStatus) -> NavigationStatus {
        self.status = status;
        status
    }

    /// Moves the context into a new volume.
    pub fn enter_volume(&mut self, volume: VolumeId) {
        if self.current_volume != Some(volume) {
            self.previous_volume = self.current_volume;
        }
        self.current_volume = Some(volume);
        if !self.visited.contains(&volume) {
            self.visited.push(volume);
        }
    }

    pub fn has_visited(&self, volume: VolumeId) -> bool {
        self.visited.contains(&volume)
    }

    /// Volumes entered so far, in order of first entry.
    pub fn visited(&self) -> &[VolumeId] {
        &self.visited
    }

    pub fn steps(&self) -> &[NavigationStep] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_limit_reached(&self) -> bool {
        self.max_steps
            .is_some_and(|max_steps| self.steps.len() >= max_steps)
    }

    pub fn record_step(&mut self, step: NavigationStep) {
        self.steps.push(step);
    }

    /// Adds the material budget of a crossed slab, scaled by the path correction.
    pub fn add_material(&mut self, material: &MaterialProperties, path_correction: f32) {
        self.material_in_x0 += material.thickness_in_x0() * path_correction;
        self.material_in_l0 += material.thickness_in_l0() * path_correction;
    }
}
