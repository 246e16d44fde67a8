//! Discrete traversal transitions and commands.
//!
//! [`TraversalEvent`]s are what an authority broadcasts to observers: which
//! action started or ended and where it went, never continuous state.
//! [`TraversalCommand`]s drive a character from outside, for example with an
//! action a remote peer already decided.

use bevy::prelude::*;

use crate::climb::ClimbEvent;
use crate::parkour::{ParkourAction, ParkourDecision};

/// A discrete traversal transition of a character.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum TraversalEvent {
    /// A parkour action started.
    ParkourStarted {
        /// The character.
        entity: Entity,
        /// The action.
        action: ParkourAction,
        /// Root position the action ends at.
        target: Vec3,
    },
    /// A parkour action ended.
    ParkourEnded {
        /// The character.
        entity: Entity,
        /// The action.
        action: ParkourAction,
        /// False when it was cancelled.
        completed: bool,
    },
    /// A hang or climb transition.
    Climb {
        /// The character.
        entity: Entity,
        /// What happened.
        event: ClimbEvent,
    },
}

impl TraversalEvent {
    /// The character the event is about.
    pub fn entity(&self) -> Entity {
        match self {
            Self::ParkourStarted { entity, .. }
            | Self::ParkourEnded { entity, .. }
            | Self::Climb { entity, .. } => *entity,
        }
    }
}

/// An externally issued traversal command.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum TraversalCommand {
    /// Run a decided parkour action through the regular start path.
    ExecuteParkour {
        /// The character.
        entity: Entity,
        /// The action and its target.
        decision: ParkourDecision,
    },
    /// Cancel whatever the character is doing, restoring host control.
    ForceStop {
        /// The character.
        entity: Entity,
    },
}
