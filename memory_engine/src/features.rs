//! Memory feature-flag set gated by the complexity dial (FR §4.6).

use bitflags::bitflags;
use simcore::{ComplexityLevel, LeveledFeatures};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemoryFeatures: u32 {
        /// DDR row-buffer hit/miss timing (tRCD/tRP).
        const DDR_TIMING                = 1 << 0;
        /// Bandwidth-saturation curve.
        const BANDWIDTH_SATURATION      = 1 << 1;
        /// Cross-socket NUMA penalty (single distance value).
        const BASIC_NUMA                = 1 << 2;
        /// Language-keyed GC pauses.
        const GC_PAUSES                 = 1 << 3;
        /// Heap fragmentation penalty above 0.6 utilization.
        const HEAP_FRAGMENTATION         = 1 << 4;
        /// Memory pressure scaling (swap simulation above 0.9).
        const MEMORY_PRESSURE           = 1 << 5;
        /// Hardware prefetcher accuracy by access pattern.
        const HARDWARE_PREFETCH         = 1 << 6;
        /// Cache-line conflict / false-sharing detection.
        const CACHE_LINE_CONFLICT       = 1 << 7;
        /// Multi-controller arbitration and per-controller queueing.
        const MEMORY_CONTROLLER_ARBITRATION = 1 << 8;
        /// Distance/bandwidth-matrix NUMA with page migration tracking.
        const ADVANCED_NUMA             = 1 << 9;
        /// Page-access pattern tracking for migration decisions.
        const PAGE_ACCESS_TRACKING      = 1 << 10;
        /// TLB and page-walk, with optional swap-fault latency.
        const TLB_PAGE_WALK             = 1 << 11;
        /// ECC single-/multi-bit error correction.
        const ECC_ERRORS                = 1 << 12;
        /// Power-state transitions with wakeup latency.
        const POWER_STATE               = 1 << 13;
        /// Memory-ordering reordering window with dependency checks
        /// (expensive, Maximum only per design decision).
        const MEMORY_ORDERING           = 1 << 14;
        /// Multi-zone enhanced thermal model.
        const ENHANCED_THERMAL          = 1 << 15;
    }
}

impl LeveledFeatures for MemoryFeatures {
    fn for_level(level: ComplexityLevel) -> Self {
        let mut flags = Self::DDR_TIMING;
        if level >= ComplexityLevel::Basic {
            flags |= Self::BANDWIDTH_SATURATION | Self::BASIC_NUMA | Self::GC_PAUSES | Self::HEAP_FRAGMENTATION;
        }
        if level >= ComplexityLevel::Advanced {
            flags |= Self::MEMORY_PRESSURE
                | Self::HARDWARE_PREFETCH
                | Self::CACHE_LINE_CONFLICT
                | Self::MEMORY_CONTROLLER_ARBITRATION
                | Self::ADVANCED_NUMA
                | Self::PAGE_ACCESS_TRACKING
                | Self::TLB_PAGE_WALK
                | Self::ECC_ERRORS
                | Self::POWER_STATE;
        }
        if level >= ComplexityLevel::Maximum {
            flags |= Self::MEMORY_ORDERING | Self::ENHANCED_THERMAL;
        }
        flags
    }
}
