//! Resumable multi-step sequences.
//!
//! Long-running traversal actions are explicit state objects stepped once
//! per tick. Each step reports a [`SequenceStatus`]; the primitives here are
//! the suspension points those state objects are built from.

use bevy::math::curve::{Curve, EaseFunction};
use bevy::prelude::*;

use crate::host::{TraversalAnimator, TraversalHost};

/// Result of stepping a sequence for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// The sequence is suspended and wants another tick.
    Continue,
    /// The sequence ran to its natural end.
    Completed,
    /// The sequence was abandoned.
    Cancelled,
}

impl SequenceStatus {
    /// Whether the sequence is over, either way.
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// Fixed time delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delay {
    remaining: f32,
}

impl Delay {
    /// A delay of `seconds`.
    pub fn new(seconds: f32) -> Self {
        Self {
            remaining: seconds.max(0.0),
        }
    }

    /// Seconds left.
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Advance by `dt`; completes once the delay has elapsed.
    pub fn tick(&mut self, dt: f32) -> SequenceStatus {
        self.remaining = (self.remaining - dt).max(0.0);
        if self.remaining <= 0.0 {
            SequenceStatus::Completed
        } else {
            SequenceStatus::Continue
        }
    }
}

/// Fixed-duration blend of the root pose toward a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    from: (Vec3, Quat),
    to: (Vec3, Quat),
    duration: f32,
    elapsed: f32,
}

impl Interpolation {
    /// Blend from `from` to `to` over `duration` seconds.
    pub fn new(from: (Vec3, Quat), to: (Vec3, Quat), duration: f32) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: 0.0,
        }
    }

    /// Target pose.
    pub fn target(&self) -> (Vec3, Quat) {
        self.to
    }

    /// Eased progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        EaseFunction::SmoothStep.sample_clamped(self.elapsed / self.duration)
    }

    /// Pose at the current progress.
    pub fn pose(&self) -> (Vec3, Quat) {
        let t = self.progress();
        if t >= 1.0 {
            return self.to;
        }
        (
            self.from.0.lerp(self.to.0, t),
            self.from.1.slerp(self.to.1, t),
        )
    }

    /// Advance by `dt` and place the host on the blended pose.
    pub fn tick(&mut self, dt: f32, host: &mut impl TraversalHost) -> SequenceStatus {
        self.elapsed += dt;
        let (position, rotation) = self.pose();
        host.set_position(position);
        host.set_rotation(rotation);
        if self.elapsed >= self.duration {
            SequenceStatus::Completed
        } else {
            SequenceStatus::Continue
        }
    }
}

/// Whether the current clip has played to its end.
///
/// A clip in the middle of a cross-fade is never finished, whatever its
/// normalized time says.
pub fn clip_finished(animator: &dyn TraversalAnimator) -> bool {
    !animator.is_in_transition() && animator.normalized_time() >= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless_animator::{AnimatorState, ClipLibrary};

    #[test]
    fn delay_completes_after_duration() {
        let mut delay = Delay::new(0.5);
        assert_eq!(delay.tick(0.25), SequenceStatus::Continue);
        assert_eq!(delay.tick(0.25), SequenceStatus::Completed);
        assert_eq!(delay.remaining(), 0.0);
    }

    #[test]
    fn interpolation_eases_and_lands_on_target() {
        let target = (Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY);
        let mut interpolation = Interpolation::new((Vec3::ZERO, Quat::IDENTITY), target, 1.0);

        interpolation.elapsed = 0.5;
        assert!((interpolation.pose().0.y - 1.0).abs() < 1e-5, "smoothstep midpoint");

        interpolation.elapsed = 0.25;
        assert!(interpolation.pose().0.y < 0.5, "eases in");

        let zero = Interpolation::new((Vec3::ZERO, Quat::IDENTITY), target, 0.0);
        assert_eq!(zero.progress(), 1.0);
    }

    #[test]
    fn clip_finished_ignores_transitions() {
        let clips = ClipLibrary::default();
        let mut animator = AnimatorState::playing("Run");
        animator.advance(1.5, &clips);
        assert!(clip_finished(&animator));

        animator.play("Vault", 0.2);
        assert!(!clip_finished(&animator), "cross-fade in progress");
    }

    #[test]
    fn status_finished() {
        assert!(!SequenceStatus::Continue.is_finished());
        assert!(SequenceStatus::Completed.is_finished());
        assert!(SequenceStatus::Cancelled.is_finished());
    }
}
