//! Static navigation through the tracking geometry.
//!
//! The navigator resolves, one boundary at a time, where a track leaves its
//! current volume and which volume it enters next. It owns no per-track state:
//! every call works on a caller-owned [`NavigationContext`], so one navigator
//! can serve any number of tracks on any number of threads.
//!
//! The navigation state machine provides:
//! - Start volume lookup by containment, parent before children
//! - Deterministic selection of the nearest reachable boundary
//! - Material lookup and material effects on every crossed boundary
//! - Termination on leaving the geometry, loops, step limits and dead ends
//!
//! # Key Components
//!
//! - [`NavigationConfig`]: shared collaborators and limits
//! - [`StaticNavigator`]: the `resolve_boundary` / `resolve_position` operations

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{DEFAULT_PATH_CUTOFF, MINIMUM_STEP};
use crate::context::{NavigationContext, NavigationStep};
use crate::effects::MaterialEffects;
use crate::geometry::{BoundaryId, TrackingGeometry, VolumeId};
use crate::parameters::{Direction, TrackState};
use crate::propagator::Propagator;
use crate::status::NavigationStatus;

/// Read-only configuration shared by all traversals.
#[derive(Debug, Clone)]
pub struct NavigationConfig<Prop, Eff> {
    pub propagator: Prop,
    pub effects: Eff,
    pub geometry: Arc<TrackingGeometry>,
    /// Boundary candidates farther away than this are discarded.
    pub path_cutoff: f32,
    /// Boundary candidates closer than this are discarded.
    pub min_step: f32,
}

impl<Prop, Eff> NavigationConfig<Prop, Eff> {
    pub fn new(propagator: Prop, effects: Eff, geometry: Arc<TrackingGeometry>) -> Self {
        Self {
            propagator,
            effects,
            geometry,
            path_cutoff: DEFAULT_PATH_CUTOFF,
            min_step: MINIMUM_STEP,
        }
    }

    pub fn with_path_cutoff(mut self, path_cutoff: f32) -> Self {
        self.path_cutoff = path_cutoff;
        self
    }
}

/// Navigator for a geometry that does not move during navigation.
///
/// **Context**: Following a track through a detector means repeatedly
/// answering "which boundary comes next, and what is behind it". The
/// propagator and the material-effects engine do the physics; the navigator
/// makes the decisions and keeps the context consistent.
///
/// **How it Works**: `resolve_boundary` asks the propagator for the distance
/// to every boundary of the current volume, takes the nearest one (the first
/// declared on ties), propagates onto it, applies its material and moves the
/// context into the attached volume. `resolve_position` re-derives the
/// current volume from the position alone. Outcomes are reported as
/// [`NavigationStatus`] values stored on the context.
#[derive(Debug, Clone)]
pub struct StaticNavigator<Prop, Eff> {
    config: NavigationConfig<Prop, Eff>,
}

impl<Prop, Eff> StaticNavigator<Prop, Eff> {
    pub fn new(config: NavigationConfig<Prop, Eff>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NavigationConfig<Prop, Eff> {
        &self.config
    }

    pub fn geometry(&self) -> &TrackingGeometry {
        &self.config.geometry
    }

    /// Resolves the next boundary crossing of the track in `ctx`.
    ///
    /// Returns `BoundaryReached` after a successful crossing into another
    /// volume, or a terminal status. Panics if the context is already terminal.
    pub fn resolve_boundary<P>(
        &self,
        ctx: &mut NavigationContext<P>,
        direction: Direction,
    ) -> NavigationStatus
    where
        P: TrackState,
        Prop: Propagator<P>,
        Eff: MaterialEffects<P>,
    {
        assert!(
            !ctx.is_terminal(),
            "resolve_boundary called on a finished traversal (status {})",
            ctx.status
        );
        ctx.direction = direction;

        if ctx.step_limit_reached() {
            debug!("step limit of {:?} reached", ctx.max_steps);
            return ctx.finish(NavigationStatus::FailureStepLimit);
        }

        let volume_id = match ctx.current_volume {
            Some(volume_id) => volume_id,
            None => {
                let status = self.resolve_position(ctx, direction, false);
                if status.is_terminal() {
                    return status;
                }
                match ctx.current_volume {
                    Some(volume_id) => volume_id,
                    None => return ctx.finish(NavigationStatus::FailureNavigation),
                }
            }
        };
        ctx.status = NavigationStatus::InProgress;

        let geometry = &self.config.geometry;
        let volume = geometry.volume(volume_id);

        // boundaries closer than min_step cannot be propagated to, a track
        // already sitting on one that leads elsewhere crosses it in place
        let position = *ctx.parameters.position();
        let on_surface = volume.boundaries().iter().copied().find(|&id| {
            let boundary = geometry.boundary(id);
            Some(id) != ctx.last_boundary
                && boundary.surface.is_on(&position, self.config.min_step)
                && boundary.attached_volume(&position, ctx.parameters.direction(), direction)
                    != Some(volume_id)
        });
        if let Some(boundary_id) = on_surface {
            trace!("{} crossed in place in {}", boundary_id, volume.name);
            return self.handle_boundary(ctx, volume_id, boundary_id, direction, true);
        }

        // nearest reachable boundary, the first declared one wins ties
        let candidate = volume
            .boundaries()
            .iter()
            .filter_map(|&id| {
                let surface = &geometry.boundary(id).surface;
                let path = self
                    .config
                    .propagator
                    .path_to(&ctx.parameters, surface, direction)?;
                trace!("{} candidate {} at {:.4}", volume.name, id, path);
                (path >= self.config.min_step && path <= self.config.path_cutoff)
                    .then_some((id, path))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let Some((boundary_id, _)) = candidate else {
            debug!("no reachable boundary in {}", volume.name);
            return ctx.finish(NavigationStatus::FailureNavigation);
        };

        self.handle_boundary(ctx, volume_id, boundary_id, direction, false)
    }

    /// Crosses the chosen boundary: propagate, apply material, switch volume.
    /// With `in_place` the track already sits on the boundary and is not moved.
    fn handle_boundary<P>(
        &self,
        ctx: &mut NavigationContext<P>,
        from: VolumeId,
        boundary_id: BoundaryId,
        direction: Direction,
        in_place: bool,
    ) -> NavigationStatus
    where
        P: TrackState,
        Prop: Propagator<P>,
        Eff: MaterialEffects<P>,
    {
        let geometry = &self.config.geometry;
        let boundary = geometry.boundary(boundary_id);
        let surface = &boundary.surface;

        let step_length = if in_place {
            0.0
        } else {
            let Some(propagation) = self
                .config
                .propagator
                .propagate(&ctx.parameters, surface, direction)
            else {
                debug!("propagation to {} failed", boundary_id);
                return ctx.finish(NavigationStatus::FailureNavigation);
            };
            ctx.parameters = propagation.parameters;
            propagation.path_length
        };
        ctx.path_length += step_length;

        let position = *ctx.parameters.position();
        let next_volume =
            boundary.attached_volume(&position, ctx.parameters.direction(), direction);

        let path_correction = surface.path_correction(&position, ctx.parameters.direction());
        let material = boundary
            .material
            .as_ref()
            .map(|material| *material.material_local(&surface.local(&position)))
            .filter(|props| props.is_valid());
        if let Some(props) = &material {
            self.config
                .effects
                .update(&mut ctx.parameters, surface, props, direction);
            ctx.add_material(props, path_correction);
        }

        ctx.record_step(NavigationStep {
            boundary: boundary_id,
            from,
            to: next_volume,
            position,
            path_length: step_length,
            material,
            path_correction,
        });
        ctx.last_boundary = Some(boundary_id);

        let Some(next_volume) = next_volume else {
            debug!("left the geometry through {}", boundary_id);
            return ctx.finish(NavigationStatus::OutOfGeometry);
        };
        if ctx.check_loops && ctx.has_visited(next_volume) {
            debug!("loop detected, {} was visited before", next_volume);
            return ctx.finish(NavigationStatus::FailureLoop);
        }

        trace!(
            "{} -> {} through {} after {:.4}",
            from,
            next_volume,
            boundary_id,
            step_length
        );
        ctx.enter_volume(next_volume);
        ctx.finish(NavigationStatus::BoundaryReached)
    }

    /// Determines the current volume from the position alone.
    ///
    /// With `no_loop`, landing in the volume the track just left is a loop.
    /// Panics if the context is already terminal.
    pub fn resolve_position<P>(
        &self,
        ctx: &mut NavigationContext<P>,
        direction: Direction,
        no_loop: bool,
    ) -> NavigationStatus
    where
        P: TrackState,
    {
        assert!(
            !ctx.is_terminal(),
            "resolve_position called on a finished traversal (status {})",
            ctx.status
        );
        ctx.direction = direction;

        let Some(volume_id) = self.config.geometry.locate(ctx.parameters.position()) else {
            debug!(
                "position {:?} is outside the known geometry",
                ctx.parameters.position()
            );
            return ctx.finish(NavigationStatus::OutOfGeometry);
        };

        if no_loop && ctx.current_volume != Some(volume_id) && ctx.previous_volume == Some(volume_id)
        {
            debug!("position resolves back into {}", volume_id);
            return ctx.finish(NavigationStatus::FailureLoop);
        }

        trace!(
            "position resolved to {}",
            self.config.geometry.volume(volume_id).name
        );
        ctx.enter_volume(volume_id);
        ctx.finish(NavigationStatus::InProgress)
    }
}
