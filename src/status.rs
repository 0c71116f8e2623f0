use std::fmt;

use serde::Serialize;


/// Outcome of a navigation call, also stored on the context.
///
/// `Unset`, `InProgress` and `BoundaryReached` allow further calls, every
/// other status ends the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum NavigationStatus {
    #[default]
    Unset,
    InProgress,
    BoundaryReached,
    Success,
    FailureNavigation, // no reachable boundary
    FailureLoop,       // loop guard triggered
    FailureStepLimit,  // maximum number of steps exceeded
    OutOfGeometry,     // left the modelled volumes
}

impl NavigationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            NavigationStatus::Unset | NavigationStatus::InProgress | NavigationStatus::BoundaryReached
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            NavigationStatus::FailureNavigation
                | NavigationStatus::FailureLoop
                | NavigationStatus::FailureStepLimit
        )
    }

    pub fn all() -> [NavigationStatus; 8] {
        [
            NavigationStatus::Unset,
            NavigationStatus::InProgress,
            NavigationStatus::BoundaryReached,
            NavigationStatus::Success,
            NavigationStatus::FailureNavigation,
            NavigationStatus::FailureLoop,
            NavigationStatus::FailureStepLimit,
            NavigationStatus::OutOfGeometry,
        ]
    }
}

impl fmt::Display for NavigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NavigationStatus::Unset => "Unset",
            NavigationStatus::InProgress => "InProgress",
            NavigationStatus::BoundaryReached => "BoundaryReached",
            NavigationStatus::Success => "Success",
            NavigationStatus::FailureNavigation => "FailureNavigation",
            NavigationStatus::FailureLoop => "FailureLoop",
            NavigationStatus::FailureStepLimit => "FailureStepLimit",
            NavigationStatus::OutOfGeometry => "OutOfGeometry",
        };
        write!(f, "{}", name)
    }
}
