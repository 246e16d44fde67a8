//! Fuel-gated vertical thrust.

use bevy::prelude::*;

use crate::config::JetpackConfig;

/// Fraction of the thrust lost as vertical speed approaches its limit.
const THRUST_FALLOFF: f32 = 0.5;

/// Jetpack fuel and activity.
///
/// The jetpack never touches velocity: [`SlopeJetpack::thrust`] is read by
/// the slope integrator's airborne branch.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
#[require(JetpackConfig)]
pub struct SlopeJetpack {
    fuel: f32,
    time_since_use: f32,
    active: bool,
}

impl Default for SlopeJetpack {
    fn default() -> Self {
        Self::new(&JetpackConfig::default())
    }
}

impl SlopeJetpack {
    /// A full jetpack.
    pub fn new(config: &JetpackConfig) -> Self {
        Self {
            fuel: config.max_fuel,
            time_since_use: 0.0,
            active: false,
        }
    }

    /// Remaining fuel.
    pub fn fuel(&self) -> f32 {
        self.fuel
    }

    /// Fuel as a fraction of capacity.
    pub fn fuel_fraction(&self, config: &JetpackConfig) -> f32 {
        if config.max_fuel <= 0.0 {
            return 0.0;
        }
        self.fuel / config.max_fuel
    }

    /// Whether thrust was requested with fuel left on the last tick.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Seconds since thrust was last used.
    pub fn time_since_use(&self) -> f32 {
        self.time_since_use
    }

    /// Step fuel by `dt` with thrust requested or not.
    ///
    /// Returns whether the jetpack is active this tick.
    pub fn tick(&mut self, dt: f32, thrust_requested: bool, config: &JetpackConfig) -> bool {
        self.active = thrust_requested && self.fuel > 0.0;
        if self.active {
            self.fuel = (self.fuel - config.fuel_consume_rate * dt).max(0.0);
            self.time_since_use = 0.0;
        } else {
            self.time_since_use += dt;
            if self.time_since_use >= config.refill_delay {
                self.fuel = (self.fuel + config.fuel_refill_rate * dt).min(config.max_fuel);
            }
        }
        self.active
    }

    /// Upward acceleration at `vertical_speed`, zero while inactive.
    ///
    /// Full thrust at rest, falling linearly to half as the vertical speed
    /// approaches `max_vertical_speed`, and zero at or above it.
    pub fn thrust(&self, vertical_speed: f32, config: &JetpackConfig) -> f32 {
        if !self.active || vertical_speed >= config.max_vertical_speed {
            return 0.0;
        }
        let ratio = (vertical_speed / config.max_vertical_speed).clamp(0.0, 1.0);
        config.thrust_force * (1.0 - THRUST_FALLOFF * ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn fuel_stays_within_bounds() {
        let config = JetpackConfig::default().with_fuel(10.0, 25.0, 15.0);
        let mut jetpack = SlopeJetpack::new(&config);

        for _ in 0..120 {
            jetpack.tick(DT, true, &config);
            assert!(jetpack.fuel() >= 0.0);
        }
        assert_eq!(jetpack.fuel(), 0.0);
        assert!(!jetpack.tick(DT, true, &config), "empty tank cannot thrust");

        for _ in 0..600 {
            jetpack.tick(DT, false, &config);
            assert!(jetpack.fuel() <= config.max_fuel);
        }
        assert_eq!(jetpack.fuel(), config.max_fuel);
    }

    #[test]
    fn refill_waits_for_delay() {
        let config = JetpackConfig::default();
        let mut jetpack = SlopeJetpack::new(&config);
        for _ in 0..30 {
            jetpack.tick(DT, true, &config);
        }
        let spent = jetpack.fuel();

        for _ in 0..50 {
            jetpack.tick(DT, false, &config);
        }
        assert_eq!(jetpack.fuel(), spent, "no refill inside the delay");

        for _ in 0..30 {
            jetpack.tick(DT, false, &config);
        }
        assert!(jetpack.fuel() > spent);
    }

    #[test]
    fn thrust_fades_and_stops_at_vertical_cap() {
        let config = JetpackConfig::default().with_thrust(20.0, 8.0);
        let mut jetpack = SlopeJetpack::new(&config);
        assert_eq!(jetpack.thrust(0.0, &config), 0.0, "inactive");

        jetpack.tick(DT, true, &config);
        assert_eq!(jetpack.thrust(-3.0, &config), 20.0);
        assert_eq!(jetpack.thrust(0.0, &config), 20.0);
        assert!((jetpack.thrust(4.0, &config) - 15.0).abs() < 1e-5);
        assert!(jetpack.thrust(7.99, &config) >= 10.0);
        assert_eq!(jetpack.thrust(8.0, &config), 0.0);
        assert_eq!(jetpack.thrust(12.0, &config), 0.0);
    }
}
