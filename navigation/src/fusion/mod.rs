pub mod attitude;
pub mod orbit;

pub use attitude::{AttitudeFusion, AttitudeSolution};
pub use orbit::{PositionFusion, PositionSolution};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FusionErrors {
    #[error("rate divider must be at least 1")]
    ZeroRate,
}

/// Tick-count decimation. The counter advances on every tick and the
/// branch is sampled when it is a multiple of the rate, so a rate of 3
/// samples ticks 0, 3, 6, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDivider {
    rate: u32,
    counter: u64,
}

impl RateDivider {
    pub fn new(rate: u32) -> Result<Self, FusionErrors> {
        if rate == 0 {
            return Err(FusionErrors::ZeroRate);
        }
        Ok(Self { rate, counter: 0 })
    }

    /// Returns whether this tick is sampled, then advances the counter.
    pub fn tick(&mut self) -> bool {
        let sample = self.counter % u64::from(self.rate) == 0;
        self.counter += 1;
        sample
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

/// Per-field flags telling which parts of a solution were refreshed by a
/// measurement on this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Validity(u8);

impl Validity {
    pub const NONE: Self = Self(0);
    pub const POSITION: Self = Self(1 << 0);
    pub const VELOCITY: Self = Self(1 << 1);
    pub const ACCELERATION: Self = Self(1 << 2);
    pub const ATTITUDE: Self = Self(1 << 3);
    pub const ANGULAR_RATE: Self = Self(1 << 4);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn set(&mut self, flags: Validity) {
        self.0 |= flags.0;
    }

    pub fn contains(&self, flags: Validity) -> bool {
        self.0 & flags.0 == flags.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Validity {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_divider_rate_three() {
        let mut divider = RateDivider::new(3).unwrap();
        let sampled: Vec<u64> = (0..10)
            .filter_map(|tick| divider.tick().then_some(tick))
            .collect();
        assert_eq!(sampled, vec![0, 3, 6, 9]);
        assert_eq!(divider.counter(), 10);

        divider.reset();
        assert!(divider.tick());
        assert_eq!(divider.counter(), 1);
    }

    #[test]
    fn test_rate_divider_rate_one_samples_every_tick() {
        let mut divider = RateDivider::new(1).unwrap();
        assert!((0..5).all(|_| divider.tick()));
    }

    #[test]
    fn test_rate_divider_zero_rate() {
        assert_eq!(RateDivider::new(0), Err(FusionErrors::ZeroRate));
    }

    #[test]
    fn test_validity_flags() {
        let mut validity = Validity::POSITION | Validity::VELOCITY;
        assert!(validity.contains(Validity::POSITION));
        assert!(!validity.contains(Validity::ACCELERATION));
        validity.set(Validity::ACCELERATION);
        assert!(validity.contains(Validity::POSITION | Validity::ACCELERATION));
        assert_eq!(validity.bits(), 0b111);
        assert!(Validity::NONE.is_empty());
    }
}
