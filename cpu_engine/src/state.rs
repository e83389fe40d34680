//! CPU-specific physical state (FR §4.2).
//!
//! Defaults below are the single fallback location for each profile-driven
//! field (an engine may load a profile that omits any of them).

use simcore::types::EngineProfile;

pub const DEFAULT_CORE_COUNT: u32 = 8;
pub const DEFAULT_BASE_CLOCK_GHZ: f64 = 3.0;
pub const DEFAULT_BOOST_CLOCK_GHZ: f64 = 4.2;
pub const DEFAULT_L1_HIT_RATE: f64 = 0.95;
pub const DEFAULT_L2_HIT_RATE: f64 = 0.85;
pub const DEFAULT_L3_HIT_RATE: f64 = 0.70;
pub const DEFAULT_NUMA_NODES: u32 = 1;
pub const DEFAULT_CROSS_SOCKET_PENALTY: f64 = 1.3;
pub const DEFAULT_SIMD_BONUS: f64 = 0.3;
pub const DEFAULT_THERMAL_THRESHOLD_C: f64 = 80.0;
pub const DEFAULT_BRANCH_PREDICTION_HIT_RATE: f64 = 0.92;
pub const DEFAULT_PREFETCHER_ACCURACY: f64 = 0.75;
pub const DEFAULT_HYPERTHREADING_EFFICIENCY: f64 = 0.3;
/// Operations larger than this consume two cores instead of one (FR §4.2).
pub const DEFAULT_MULTI_CORE_THRESHOLD_BYTES: u64 = 1_048_576;

/// Physical state of the modeled CPU: core pool, cache hierarchy, clocks,
/// and the thermal/NUMA parameters the pipeline stages read and mutate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuState {
    pub core_count: u32,
    pub base_clock_ghz: f64,
    pub boost_clock_ghz: f64,
    pub l1_hit_rate: f64,
    pub l2_hit_rate: f64,
    pub l3_hit_rate: f64,
    pub numa_nodes: u32,
    pub cross_socket_penalty: f64,
    pub simd_bonus: f64,
    pub thermal_threshold_c: f64,
    pub die_temp_c: f64,
    pub branch_prediction_hit_rate: f64,
    pub prefetcher_accuracy: f64,
    pub hyperthreading_efficiency: f64,
    pub max_new_ops_per_tick: u32,
    pub multi_core_threshold_bytes: u64,
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            core_count: DEFAULT_CORE_COUNT,
            base_clock_ghz: DEFAULT_BASE_CLOCK_GHZ,
            boost_clock_ghz: DEFAULT_BOOST_CLOCK_GHZ,
            l1_hit_rate: DEFAULT_L1_HIT_RATE,
            l2_hit_rate: DEFAULT_L2_HIT_RATE,
            l3_hit_rate: DEFAULT_L3_HIT_RATE,
            numa_nodes: DEFAULT_NUMA_NODES,
            cross_socket_penalty: DEFAULT_CROSS_SOCKET_PENALTY,
            simd_bonus: DEFAULT_SIMD_BONUS,
            thermal_threshold_c: DEFAULT_THERMAL_THRESHOLD_C,
            die_temp_c: 40.0,
            branch_prediction_hit_rate: DEFAULT_BRANCH_PREDICTION_HIT_RATE,
            prefetcher_accuracy: DEFAULT_PREFETCHER_ACCURACY,
            hyperthreading_efficiency: DEFAULT_HYPERTHREADING_EFFICIENCY,
            max_new_ops_per_tick: DEFAULT_CORE_COUNT,
            multi_core_threshold_bytes: DEFAULT_MULTI_CORE_THRESHOLD_BYTES,
        }
    }
}

impl CpuState {
    /// Overlay profile-driven fields on top of the defaults; anything the
    /// profile doesn't carry keeps its default.
    pub fn apply_profile(&mut self, profile: &EngineProfile) {
        if let Some(v) = profile.baseline("core_count") {
            self.core_count = v as u32;
            self.max_new_ops_per_tick = v as u32;
        }
        if let Some(v) = profile.baseline("base_clock_ghz") {
            self.base_clock_ghz = v;
        }
        if let Some(v) = profile.baseline("boost_clock_ghz") {
            self.boost_clock_ghz = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "l1_hit_rate") {
            self.l1_hit_rate = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "l2_hit_rate") {
            self.l2_hit_rate = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "l3_hit_rate") {
            self.l3_hit_rate = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "numa_nodes") {
            self.numa_nodes = v as u32;
        }
        if let Some(v) = profile.specific_f64("cpu", "cross_socket_penalty") {
            self.cross_socket_penalty = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "simd_bonus") {
            self.simd_bonus = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "thermal_threshold_c") {
            self.thermal_threshold_c = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "branch_prediction_hit_rate") {
            self.branch_prediction_hit_rate = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "prefetcher_accuracy") {
            self.prefetcher_accuracy = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "hyperthreading_efficiency") {
            self.hyperthreading_efficiency = v;
        }
        if let Some(v) = profile.specific_f64("cpu", "multi_core_threshold_bytes") {
            self.multi_core_threshold_bytes = v as u64;
        }
    }
}
