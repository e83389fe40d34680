//! Storage feature-flag set gated by the complexity dial (FR §4.6).

use bitflags::bitflags;
use simcore::{ComplexityLevel, LeveledFeatures};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StorageFeatures: u32 {
        /// Sequential/random access-pattern multiplier.
        const ACCESS_PATTERN_OPTIMIZATION = 1 << 0;
        /// NCQ/TCQ queue-depth parallelism bonus.
        const QUEUE_DEPTH_MANAGEMENT      = 1 << 1;
        /// Controller write-back/write-through/read cache hits.
        const CONTROLLER_CACHE            = 1 << 2;
        /// Filesystem metadata overhead and small-file penalty.
        const FILESYSTEM_METADATA_OVERHEAD = 1 << 3;
        /// HDD seek fragmentation growth.
        const HDD_FRAGMENTATION           = 1 << 4;
        /// SSD wear-leveling overhead as wear increases.
        const SSD_WEAR_LEVELING           = 1 << 5;
        /// HDD active/idle/standby/sleep power states with spin-up cost.
        const HDD_POWER_STATES            = 1 << 6;
        /// Thermal throttling with inertia toward a load-driven target.
        const THERMAL_THROTTLING          = 1 << 7;
        /// SSD TRIM/garbage-collection overhead.
        const SSD_TRIM_GC                 = 1 << 8;
        /// Payload compression (large-op benefit, small-op overhead).
        const COMPRESSION                 = 1 << 9;
        /// Hardware encryption overhead (NVMe vs SATA rates).
        const HARDWARE_ENCRYPTION         = 1 << 10;
        /// ECC overhead scaling with wear and degraded health.
        const ECC_OVERHEAD                = 1 << 11;
        /// Advanced read-ahead prefetching.
        const ADVANCED_PREFETCHING        = 1 << 12;
        /// Multi-stream SSD write steering.
        const MULTI_STREAM_SSD            = 1 << 13;
        /// Zoned-namespace SSD sequential-write discipline.
        const ZONED_NAMESPACE             = 1 << 14;
    }
}

impl LeveledFeatures for StorageFeatures {
    fn for_level(level: ComplexityLevel) -> Self {
        let mut flags = Self::ACCESS_PATTERN_OPTIMIZATION;
        if level >= ComplexityLevel::Basic {
            flags |= Self::QUEUE_DEPTH_MANAGEMENT | Self::CONTROLLER_CACHE | Self::FILESYSTEM_METADATA_OVERHEAD;
        }
        if level >= ComplexityLevel::Advanced {
            flags |= Self::HDD_FRAGMENTATION
                | Self::SSD_WEAR_LEVELING
                | Self::HDD_POWER_STATES
                | Self::THERMAL_THROTTLING
                | Self::SSD_TRIM_GC
                | Self::COMPRESSION
                | Self::HARDWARE_ENCRYPTION
                | Self::ECC_OVERHEAD;
        }
        if level >= ComplexityLevel::Maximum {
            flags |= Self::ADVANCED_PREFETCHING | Self::MULTI_STREAM_SSD | Self::ZONED_NAMESPACE;
        }
        flags
    }
}
