//! CPU feature-flag set gated by the complexity dial (FR §4.6).

use bitflags::bitflags;
use simcore::{ComplexityLevel, LeveledFeatures};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuFeatures: u32 {
        /// Language multiplier and algorithmic complexity factor.
        const LANGUAGE_COMPLEXITY      = 1 << 0;
        /// L1 hit-rate modeling.
        const L1_CACHE                 = 1 << 1;
        /// SIMD vectorization bonus.
        const SIMD                     = 1 << 2;
        /// Thermal throttling from simulated die temperature.
        const THERMAL                  = 1 << 3;
        /// Boost-clock scaling under low utilization.
        const BOOST_CLOCK              = 1 << 4;
        /// L2/L3 hit-rate modeling (full cache hierarchy).
        const L2_L3_CACHE              = 1 << 5;
        /// NUMA cross-socket penalty.
        const NUMA                     = 1 << 6;
        /// Hyperthreading efficiency bonus.
        const HYPERTHREADING           = 1 << 7;
        /// Branch-prediction hit rate.
        const BRANCH_PREDICTION        = 1 << 8;
        /// Hardware prefetcher benefit.
        const PREFETCHER               = 1 << 9;
        /// Shared memory-bandwidth contention under load.
        const MEMORY_BANDWIDTH_CONTENTION = 1 << 10;
        /// Multi-core parallel-processing speedup for large operations.
        const PARALLEL_SPEEDUP         = 1 << 11;
        /// Cross-core L3 contention modeling (expensive, Maximum only).
        const DEEP_CACHE_CONTENTION    = 1 << 12;
    }
}

impl LeveledFeatures for CpuFeatures {
    fn for_level(level: ComplexityLevel) -> Self {
        let mut flags = Self::LANGUAGE_COMPLEXITY | Self::L1_CACHE;
        if level >= ComplexityLevel::Basic {
            flags |= Self::SIMD | Self::THERMAL | Self::BOOST_CLOCK;
        }
        if level >= ComplexityLevel::Advanced {
            flags |= Self::L2_L3_CACHE
                | Self::NUMA
                | Self::HYPERTHREADING
                | Self::BRANCH_PREDICTION
                | Self::PREFETCHER
                | Self::MEMORY_BANDWIDTH_CONTENTION
                | Self::PARALLEL_SPEEDUP;
        }
        if level >= ComplexityLevel::Maximum {
            flags |= Self::DEEP_CACHE_CONTENTION;
        }
        flags
    }
}
