//! State marker components.
//!
//! These components mirror the traversal state of a character for other
//! systems to query. They are added and removed in `FixedPostUpdate` from
//! the controllers' state; never insert them yourself.

use bevy::prelude::*;

use crate::climb_point::ClimbPointId;
use crate::parkour::ParkourAction;

/// The character runs a parkour action.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct InParkourAction {
    /// The running action.
    pub action: ParkourAction,
}

/// The character hangs from a ledge.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct Hanging {
    /// Point the character hangs from.
    pub point: ClimbPointId,
}

/// The character climbs a wall.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct ClimbingWall;

/// The character skis.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Skiing;

/// The character failed setup validation; every traversal system skips it.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_traversal::prelude::*;
///
/// fn count_broken(q: Query<(), With<TraversalDisabled>>) -> usize {
///     q.iter().count()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct TraversalDisabled;
