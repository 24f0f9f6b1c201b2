//! Test dice: deterministic `DiceSource` implementations for tests.

use blightward_core::dice::DiceSource;

/// Dice that never succeed: every pool yields zero successes and every die
/// shows 1. Suitable for tests that do not depend on specific rolls.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDice;

impl DiceSource for MockDice {
    fn roll_pool(&mut self, _size: u32, _dc: u32) -> u32 {
        0
    }

    fn roll_die(&mut self, _sides: u32) -> u32 {
        1
    }
}

/// Dice that return values from a predetermined sequence. Pool rolls and
/// single dice draw from the same sequence in call order. Panics if the
/// sequence is exhausted.
#[derive(Debug, Clone)]
pub struct SequenceDice {
    values: Vec<u32>,
    index: usize,
}

impl SequenceDice {
    /// Create a new `SequenceDice` with the given values.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, index: 0 }
    }

    /// Values not yet drawn.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.values.len() - self.index
    }

    fn next(&mut self) -> u32 {
        let value = self.values[self.index];
        self.index += 1;
        value
    }
}

impl DiceSource for SequenceDice {
    fn roll_pool(&mut self, _size: u32, _dc: u32) -> u32 {
        self.next()
    }

    fn roll_die(&mut self, _sides: u32) -> u32 {
        self.next()
    }
}
