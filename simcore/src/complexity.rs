//! The complexity interface shared by all four engine kinds (FR §4.6).
//!
//! Each engine crate defines its own `bitflags!` feature set (e.g.
//! `CpuFeatures`, `MemoryFeatures`) and implements [`LeveledFeatures`] for
//! it so that `set_complexity_level` can recompute the flag set from the
//! four-valued fidelity dial. Pipeline stages query
//! [`ComplexityState::should_enable`] and compose identity when disabled —
//! never a dynamically built stage list (§9).

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Fidelity level, `0..=3` (FR §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ComplexityLevel {
    /// Essential physics only: language, complexity tag, basic caching.
    Minimal = 0,
    /// Adds SIMD/thermal/boost or protocol overhead/bandwidth limits.
    Basic = 1,
    /// Default. Adds NUMA, prefetching, branch prediction, contention, or
    /// the full storage/network pipeline.
    Advanced = 2,
    /// All features, including expensive optional simulations.
    Maximum = 3,
}

impl Default for ComplexityLevel {
    fn default() -> Self {
        Self::Advanced
    }
}

impl ComplexityLevel {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn try_from_u8(v: u8) -> EngineResult<Self> {
        match v {
            0 => Ok(Self::Minimal),
            1 => Ok(Self::Basic),
            2 => Ok(Self::Advanced),
            3 => Ok(Self::Maximum),
            _ => Err(EngineError::InvalidComplexity),
        }
    }
}

/// Implemented by each engine's `bitflags!` feature set so the generic
/// [`ComplexityState`] can derive the flags unlocked at a given level.
///
/// Implementations should OR in flags monotonically: everything unlocked at
/// `Basic` stays unlocked at `Advanced` and `Maximum`.
pub trait LeveledFeatures: bitflags::Flags + Copy {
    fn for_level(level: ComplexityLevel) -> Self;
}

/// Generic complexity dial + feature set, parameterized over an engine's
/// concrete `bitflags!` type.
#[derive(Debug, Clone, Copy)]
pub struct ComplexityState<F: LeveledFeatures> {
    level: ComplexityLevel,
    /// Flags may diverge from `F::for_level(level)` after post-hoc
    /// individual toggling (§4.6 last sentence).
    flags: F,
}

impl<F: LeveledFeatures> Default for ComplexityState<F> {
    fn default() -> Self {
        let level = ComplexityLevel::default();
        Self { level, flags: F::for_level(level) }
    }
}

impl<F: LeveledFeatures> ComplexityState<F> {
    pub fn new(level: ComplexityLevel) -> Self {
        Self { level, flags: F::for_level(level) }
    }

    pub fn level(&self) -> ComplexityLevel {
        self.level
    }

    /// Set the level from a raw integer; rejects anything outside `0..=3`
    /// and leaves the previous level untouched (FR §4.6, §7).
    pub fn set_level_from_u8(&mut self, raw: u8) -> EngineResult<()> {
        let level = ComplexityLevel::try_from_u8(raw)?;
        self.level = level;
        self.flags = F::for_level(level);
        Ok(())
    }

    pub fn should_enable(&self, flag: F) -> bool {
        self.flags.contains(flag)
    }

    /// Enable an individual feature regardless of level (§4.6 post-hoc
    /// toggling).
    pub fn enable(&mut self, flag: F) {
        self.flags.insert(flag);
    }

    /// Disable an individual feature regardless of level.
    pub fn disable(&mut self, flag: F) {
        self.flags.remove(flag);
    }

    pub fn flags(&self) -> F {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitflags::bitflags;

    bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct TestFeatures: u8 {
            const A = 0b0001;
            const B = 0b0010;
            const C = 0b0100;
        }
    }

    impl LeveledFeatures for TestFeatures {
        fn for_level(level: ComplexityLevel) -> Self {
            match level {
                ComplexityLevel::Minimal => TestFeatures::A,
                ComplexityLevel::Basic => TestFeatures::A | TestFeatures::B,
                ComplexityLevel::Advanced | ComplexityLevel::Maximum => TestFeatures::A | TestFeatures::B | TestFeatures::C,
            }
        }
    }

    #[test]
    fn default_is_advanced() {
        let state = ComplexityState::<TestFeatures>::default();
        assert_eq!(state.level(), ComplexityLevel::Advanced);
        assert!(state.should_enable(TestFeatures::C));
    }

    #[test]
    fn invalid_level_preserves_previous() {
        let mut state = ComplexityState::<TestFeatures>::new(ComplexityLevel::Basic);
        assert!(state.set_level_from_u8(10).is_err());
        assert_eq!(state.level(), ComplexityLevel::Basic);
    }

    #[test]
    fn valid_level_updates_flags() {
        let mut state = ComplexityState::<TestFeatures>::new(ComplexityLevel::Minimal);
        assert!(!state.should_enable(TestFeatures::B));
        state.set_level_from_u8(1).unwrap();
        assert_eq!(state.level(), ComplexityLevel::Basic);
        assert!(state.should_enable(TestFeatures::B));
        assert!(!state.should_enable(TestFeatures::C));
    }

    #[test]
    fn post_hoc_toggle_overrides_level() {
        let mut state = ComplexityState::<TestFeatures>::new(ComplexityLevel::Minimal);
        state.enable(TestFeatures::C);
        assert!(state.should_enable(TestFeatures::C));
        state.disable(TestFeatures::A);
        assert!(!state.should_enable(TestFeatures::A));
    }
}
