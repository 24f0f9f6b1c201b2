//! Dice abstraction for deterministic resolution.
//!
//! Every random decision in the trauma economy (resistance pools, trauma
//! selection, panic-table rolls, cascades, terminal-error survival) goes
//! through [`DiceSource`]. Production code injects [`RngDice`]; tests inject
//! a fixed sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Sides on a pool die.
pub const POOL_DIE_SIDES: u32 = 10;

/// Lowest face that counts as a success on a pool die.
pub const SUCCESS_FACE: u32 = 8;

/// Face that cancels one success.
pub const BOTCH_FACE: u32 = 1;

/// Source of dice results.
pub trait DiceSource: Send + Sync {
    /// Rolls `size` d10 and returns net successes.
    ///
    /// `dc` is the number of successes the caller needs; it is carried for
    /// roll logging and does not change how dice are counted.
    fn roll_pool(&mut self, size: u32, dc: u32) -> u32;

    /// Rolls one die with `sides` faces, returning a value in `[1, sides]`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Counts net successes over a set of d10 faces: faces of
/// [`SUCCESS_FACE`] or higher succeed, [`BOTCH_FACE`] cancels one success,
/// and the total never goes below zero.
#[must_use]
pub fn net_successes(faces: &[u32]) -> u32 {
    let (successes, botches) = faces.iter().fold((0u32, 0u32), |(s, b), &face| {
        if face >= SUCCESS_FACE {
            (s + 1, b)
        } else if face == BOTCH_FACE {
            (s, b + 1)
        } else {
            (s, b)
        }
    });
    successes.saturating_sub(botches)
}

/// Production dice backed by a `rand` generator.
#[derive(Debug)]
pub struct RngDice<R> {
    rng: R,
}

impl RngDice<StdRng> {
    /// Dice seeded from a fixed value, for replays.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Dice seeded from the operating system.
    #[must_use]
    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl<R: Rng> RngDice<R> {
    /// Wraps an existing generator.
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send + Sync> DiceSource for RngDice<R> {
    fn roll_pool(&mut self, size: u32, dc: u32) -> u32 {
        let faces: Vec<u32> = (0..size)
            .map(|_| self.rng.random_range(1..=POOL_DIE_SIDES))
            .collect();
        let net = net_successes(&faces);
        tracing::trace!(size, dc, ?faces, net, "rolled dice pool");
        net
    }

    fn roll_die(&mut self, sides: u32) -> u32 {
        let value = self.rng.random_range(1..=sides.max(1));
        tracing::trace!(sides, value, "rolled die");
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_successes_counts_eight_through_ten() {
        assert_eq!(net_successes(&[8, 9, 10, 7, 2]), 3);
    }

    #[test]
    fn test_net_successes_botches_cancel_successes() {
        assert_eq!(net_successes(&[10, 1, 9]), 1);
    }

    #[test]
    fn test_net_successes_never_negative() {
        assert_eq!(net_successes(&[1, 1, 8]), 0);
        assert_eq!(net_successes(&[]), 0);
    }

    #[test]
    fn test_seeded_dice_replay_identically() {
        let mut first = RngDice::seeded(42);
        let mut second = RngDice::seeded(42);
        let a: Vec<u32> = (0..20).map(|_| first.roll_die(10)).collect();
        let b: Vec<u32> = (0..20).map(|_| second.roll_die(10)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_roll_die_stays_in_range() {
        let mut dice = RngDice::seeded(7);
        for _ in 0..200 {
            let value = dice.roll_die(6);
            assert!((1..=6).contains(&value));
        }
    }

    #[test]
    fn test_roll_pool_bounded_by_size() {
        let mut dice = RngDice::seeded(3);
        for _ in 0..50 {
            assert!(dice.roll_pool(4, 2) <= 4);
        }
    }

    #[test]
    fn test_roll_die_with_zero_sides_returns_one() {
        let mut dice = RngDice::seeded(1);
        assert_eq!(dice.roll_die(0), 1);
    }
}
