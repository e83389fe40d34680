//! Memory-specific physical state (FR §4.3).

use heapless::Deque;
use simcore::types::EngineProfile;
use std::collections::BTreeMap;

pub const DEFAULT_CAPACITY_GB: f64 = 16.0;
pub const DEFAULT_BANDWIDTH_GBPS: f64 = 21.3;
pub const DEFAULT_FREQUENCY_MHZ: f64 = 2666.0;
pub const DEFAULT_NORMALIZATION_BASELINE_MHZ: f64 = 1600.0;
pub const DEFAULT_TRCD_CYCLES: f64 = 16.0;
pub const DEFAULT_TRP_CYCLES: f64 = 16.0;
pub const DEFAULT_NUMA_NODES: u32 = 1;
pub const DEFAULT_CROSS_SOCKET_PENALTY: f64 = 1.4;
pub const DEFAULT_PREFETCH_SEQUENTIAL_ACCURACY: f64 = 0.9;
pub const DEFAULT_PREFETCH_STRIDE_ACCURACY: f64 = 0.6;
pub const DEFAULT_PREFETCH_RANDOM_ACCURACY: f64 = 0.1;
pub const DEFAULT_TLB_HIT_RATE: f64 = 0.97;
pub const DEFAULT_PAGE_WALK_PENALTY_NS: f64 = 120.0;
pub const DEFAULT_SWAP_FAULT_PROBABILITY: f64 = 0.02;
pub const DEFAULT_SWAP_FAULT_LATENCY_US: f64 = 150.0;
pub const DEFAULT_ECC_SINGLE_BIT_RATE: f64 = 0.0005;
pub const DEFAULT_ECC_MULTI_BIT_RATE: f64 = 0.00001;
pub const DEFAULT_ECC_CORRECTION_LATENCY_NS: f64 = 5.0;
pub const DEFAULT_CONTROLLER_COUNT: u32 = 2;
pub const DEFAULT_CONTROLLER_QUEUE_DEPTH: u32 = 32;
pub const DEFAULT_CHANNEL_COUNT: u32 = 4;
/// Operations larger than this occupy two in-flight channels (FR §4.3).
pub const DEFAULT_LARGE_OP_THRESHOLD_BYTES: u64 = 10 * 1_048_576;

/// Capacity of the bounded cache-line / recent-access tracking structures
/// (ring buffer, overwrite-oldest eviction).
pub const RECENT_LINES_CAPACITY: usize = 256;

/// Fixed-capacity recency tracker for cache-line conflict / false-sharing
/// detection (FR §4.3, §9 "bounded ring buffers ... never unbounded").
pub struct RecentLines {
    lines: Deque<u64, RECENT_LINES_CAPACITY>,
}

impl RecentLines {
    pub fn new() -> Self {
        Self { lines: Deque::new() }
    }

    /// Record a touched cache line; returns `true` if it was already in
    /// the recent window (a conflict / potential false-sharing hit).
    pub fn touch(&mut self, line: u64) -> bool {
        let conflict = self.lines.iter().any(|&l| l == line);
        if self.lines.is_full() {
            self.lines.pop_front();
        }
        let _ = self.lines.push_back(line);
        conflict
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Default for RecentLines {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryState {
    pub capacity_gb: f64,
    pub bandwidth_gbps: f64,
    pub frequency_mhz: f64,
    pub normalization_baseline_mhz: f64,
    pub trcd_cycles: f64,
    pub trp_cycles: f64,
    pub numa_nodes: u32,
    pub cross_socket_penalty: f64,
    pub prefetch_sequential_accuracy: f64,
    pub prefetch_stride_accuracy: f64,
    pub prefetch_random_accuracy: f64,
    pub tlb_hit_rate: f64,
    pub page_walk_penalty_ns: f64,
    pub swap_fault_probability: f64,
    pub swap_fault_latency_us: f64,
    pub ecc_single_bit_rate: f64,
    pub ecc_multi_bit_rate: f64,
    pub ecc_correction_latency_ns: f64,
    pub controller_count: u32,
    pub controller_queue_depth: u32,
    pub channel_count: u32,
    pub large_op_threshold_bytes: u64,
    pub recent_lines: RecentLines,
    pub thermal_zone_temps_c: [f64; 4],
    /// Addresses of operations admitted but not yet completed, keyed by
    /// the same proxy `pipeline::ordering_address` checks against, with
    /// a refcount since two in-flight ops can share an address.
    pub pending_addresses: BTreeMap<u64, u32>,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            capacity_gb: DEFAULT_CAPACITY_GB,
            bandwidth_gbps: DEFAULT_BANDWIDTH_GBPS,
            frequency_mhz: DEFAULT_FREQUENCY_MHZ,
            normalization_baseline_mhz: DEFAULT_NORMALIZATION_BASELINE_MHZ,
            trcd_cycles: DEFAULT_TRCD_CYCLES,
            trp_cycles: DEFAULT_TRP_CYCLES,
            numa_nodes: DEFAULT_NUMA_NODES,
            cross_socket_penalty: DEFAULT_CROSS_SOCKET_PENALTY,
            prefetch_sequential_accuracy: DEFAULT_PREFETCH_SEQUENTIAL_ACCURACY,
            prefetch_stride_accuracy: DEFAULT_PREFETCH_STRIDE_ACCURACY,
            prefetch_random_accuracy: DEFAULT_PREFETCH_RANDOM_ACCURACY,
            tlb_hit_rate: DEFAULT_TLB_HIT_RATE,
            page_walk_penalty_ns: DEFAULT_PAGE_WALK_PENALTY_NS,
            swap_fault_probability: DEFAULT_SWAP_FAULT_PROBABILITY,
            swap_fault_latency_us: DEFAULT_SWAP_FAULT_LATENCY_US,
            ecc_single_bit_rate: DEFAULT_ECC_SINGLE_BIT_RATE,
            ecc_multi_bit_rate: DEFAULT_ECC_MULTI_BIT_RATE,
            ecc_correction_latency_ns: DEFAULT_ECC_CORRECTION_LATENCY_NS,
            controller_count: DEFAULT_CONTROLLER_COUNT,
            controller_queue_depth: DEFAULT_CONTROLLER_QUEUE_DEPTH,
            channel_count: DEFAULT_CHANNEL_COUNT,
            large_op_threshold_bytes: DEFAULT_LARGE_OP_THRESHOLD_BYTES,
            recent_lines: RecentLines::new(),
            thermal_zone_temps_c: [40.0; 4],
            pending_addresses: BTreeMap::new(),
        }
    }
}

impl MemoryState {
    pub fn apply_profile(&mut self, profile: &EngineProfile) {
        if let Some(v) = profile.baseline("capacity_gb") {
            self.capacity_gb = v;
        }
        if let Some(v) = profile.baseline("bandwidth_gbps") {
            self.bandwidth_gbps = v;
        }
        if let Some(v) = profile.baseline("frequency_mhz") {
            self.frequency_mhz = v;
        }
        if let Some(v) = profile.specific_f64("ddr_timings", "trcd") {
            self.trcd_cycles = v;
        }
        if let Some(v) = profile.specific_f64("ddr_timings", "trp") {
            self.trp_cycles = v;
        }
        if let Some(v) = profile.specific_f64("numa", "nodes") {
            self.numa_nodes = v as u32;
        }
        if let Some(v) = profile.specific_f64("numa", "cross_socket_penalty") {
            self.cross_socket_penalty = v;
        }
        if let Some(v) = profile.specific_f64("hardware_prefetch", "sequential_accuracy") {
            self.prefetch_sequential_accuracy = v;
        }
        if let Some(v) = profile.specific_f64("hardware_prefetch", "stride_accuracy") {
            self.prefetch_stride_accuracy = v;
        }
        if let Some(v) = profile.specific_f64("hardware_prefetch", "random_accuracy") {
            self.prefetch_random_accuracy = v;
        }
        if let Some(v) = profile.specific_f64("tlb", "hit_rate") {
            self.tlb_hit_rate = v;
        }
        if let Some(v) = profile.specific_f64("ecc", "single_bit_rate") {
            self.ecc_single_bit_rate = v;
        }
        if let Some(v) = profile.specific_f64("ecc", "multi_bit_rate") {
            self.ecc_multi_bit_rate = v;
        }
        if let Some(v) = profile.specific_f64("controllers", "count") {
            self.controller_count = v as u32;
        }
        if let Some(v) = profile.specific_f64("controllers", "queue_depth") {
            self.controller_queue_depth = v as u32;
        }
        if let Some(v) = profile.specific_f64("channels", "count") {
            self.channel_count = v as u32;
        }
    }
}
