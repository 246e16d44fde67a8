//! Traversal input intent.
//!
//! [`TraversalIntent`] is the input surface of the traversal systems. Your
//! code (keyboard, gamepad, AI, network) writes the held state of each
//! button and the desired movement direction; the systems derive press
//! edges from it. Edges are latched once per fixed tick in
//! `FixedPostUpdate`, so a press written in `Update` is seen by exactly one
//! fixed tick however many run in a frame.

use bevy::prelude::*;

/// Held state of a button with edge detection.
///
/// # Example
///
/// ```rust
/// use msg_traversal::prelude::*;
///
/// let mut jump = ButtonState::default();
/// jump.set(true);
/// assert!(jump.just_pressed());
///
/// // A system that acts on the press consumes it.
/// jump.consume();
/// assert!(!jump.just_pressed());
/// assert!(jump.held());
/// ```
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    held: bool,
    previous: bool,
    consumed: bool,
}

impl ButtonState {
    /// Write the current held state.
    pub fn set(&mut self, held: bool) {
        self.held = held;
    }

    /// Whether the button is held.
    pub fn held(&self) -> bool {
        self.held
    }

    /// Whether the button went down since the last latch and nothing has
    /// acted on the press yet.
    pub fn just_pressed(&self) -> bool {
        self.held && !self.previous && !self.consumed
    }

    /// Mark the current press as handled.
    pub fn consume(&mut self) {
        self.consumed = true;
    }

    pub(crate) fn latch(&mut self) {
        self.previous = self.held;
        self.consumed = false;
    }
}

/// Desired traversal input of a character.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct TraversalIntent {
    /// Desired horizontal movement in world space, length up to 1.
    pub movement: Vec3,
    /// Jump: parkour, vertical jump, ski jump, climb up from a hang.
    pub jump: ButtonState,
    /// Grab the ledge ahead or start climbing the wall ahead.
    pub interact: ButtonState,
    /// Drop from the edge below into a hang.
    pub crouch: ButtonState,
    /// Let go of a ledge or wall.
    pub drop: ButtonState,
    /// Finish a wall climb at the top.
    pub finish: ButtonState,
    /// Jetpack thrust.
    pub thrust: ButtonState,
}

impl TraversalIntent {
    /// Create an empty intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the movement direction, flattened and clamped to unit length.
    pub fn set_movement(&mut self, direction: Vec3) {
        self.movement = Vec3::new(direction.x, 0.0, direction.z).clamp_length_max(1.0);
    }

    /// Whether there is movement input.
    pub fn is_moving(&self) -> bool {
        self.movement.length_squared() > 1e-6
    }

    /// Clear movement and release every button.
    pub fn clear(&mut self) {
        self.movement = Vec3::ZERO;
        for button in self.buttons_mut() {
            button.set(false);
        }
    }

    fn buttons_mut(&mut self) -> [&mut ButtonState; 6] {
        [
            &mut self.jump,
            &mut self.interact,
            &mut self.crouch,
            &mut self.drop,
            &mut self.finish,
            &mut self.thrust,
        ]
    }

    pub(crate) fn latch(&mut self) {
        for button in self.buttons_mut() {
            button.latch();
        }
    }
}
