use tracing::{debug, trace};

use crate::context::NavigationContext;
use crate::effects::MaterialEffects;
use crate::navigator::StaticNavigator;
use crate::parameters::TrackState;
use crate::propagator::Propagator;
use crate::status::NavigationStatus;

/// Drives a track through the geometry until navigation ends.
///
/// **Context**: The navigator resolves one crossing per call and leaves the
/// decision of what to do with the outcome to its caller. The extrapolator is
/// that caller for the common case of following a track to the end.
///
/// **How it Works**: Locates the start volume if the context has none, then
/// calls `resolve_boundary` until the status is terminal. It never retries;
/// the terminal status and the recorded steps are left on the context.
#[derive(Debug, Clone)]
pub struct Extrapolator<Prop, Eff> {
    navigator: StaticNavigator<Prop, Eff>,
}

impl<Prop, Eff> Extrapolator<Prop, Eff> {
    pub fn new(navigator: StaticNavigator<Prop, Eff>) -> Self {
        Self { navigator }
    }

    pub fn navigator(&self) -> &StaticNavigator<Prop, Eff> {
        &self.navigator
    }

    pub fn extrapolate<P>(&self, ctx: &mut NavigationContext<P>) -> NavigationStatus
    where
        P: TrackState,
        Prop: Propagator<P>,
        Eff: MaterialEffects<P>,
    {
        let direction = ctx.direction;
        if ctx.current_volume.is_none() {
            let status = self.navigator.resolve_position(ctx, direction, false);
            if status.is_terminal() {
                debug!("track starts outside the geometry");
                return status;
            }
        }

        loop {
            let status = self.navigator.resolve_boundary(ctx, direction);
            trace!(
                "step {}: {} at path {:.4}",
                ctx.step_count(),
                status,
                ctx.path_length
            );
            if status.is_terminal() {
                debug!(
                    "track finished with {} after {} steps, {:.4} X0",
                    status,
                    ctx.step_count(),
                    ctx.material_in_x0
                );
                return status;
            }
        }
    }
}
