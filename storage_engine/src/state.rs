//! Storage-specific physical state (FR §4.4).

use simcore::types::EngineProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageDeviceType {
    Hdd,
    #[default]
    Ssd,
    Nvme,
}

impl StorageDeviceType {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "hdd" => Some(Self::Hdd),
            "ssd" => Some(Self::Ssd),
            "nvme" => Some(Self::Nvme),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheWritePolicy {
    #[default]
    WriteBack,
    WriteThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HddPowerState {
    #[default]
    Active,
    Idle,
    Standby,
    Sleep,
}

pub const DEFAULT_IOPS_READ: f64 = 100_000.0;
pub const DEFAULT_IOPS_WRITE: f64 = 90_000.0;
pub const DEFAULT_LATENCY_READ_US: f64 = 100.0;
pub const DEFAULT_LATENCY_WRITE_US: f64 = 120.0;
pub const DEFAULT_BANDWIDTH_MBPS: f64 = 550.0;
pub const DEFAULT_QUEUE_DEPTH: u32 = 32;
pub const DEFAULT_BLOCK_SIZE_BYTES: u64 = 4096;
pub const DEFAULT_CACHE_READ_HIT_RATE: f64 = 0.3;
pub const DEFAULT_CACHE_WRITE_BACK_HIT_RATE: f64 = 0.2;
pub const DEFAULT_CACHE_WRITE_THROUGH_HIT_RATE: f64 = 0.15;
pub const DEFAULT_WEAR_LEVEL: f64 = 0.0;
pub const DEFAULT_WRITE_RATIO: f64 = 0.5;
pub const DEFAULT_SPIN_UP_LATENCY_US: f64 = 8_000.0;
pub const DEFAULT_THERMAL_THRESHOLD_C: f64 = 70.0;
pub const DEFAULT_THERMAL_INERTIA: f64 = 0.2;
pub const DEFAULT_MULTI_STREAM_COUNT: u32 = 1;
/// Operations larger than this consume two IOPS budget units (FR §4.4: "> 16 blocks").
pub const LARGE_OP_BLOCK_THRESHOLD: u64 = 16;
/// Up to three operations admitted per tick, fixed by FR §4.4 (not profile-tunable).
pub const MAX_NEW_OPS_PER_TICK: u32 = 3;

pub struct StorageState {
    pub device_type: StorageDeviceType,
    pub iops_read: f64,
    pub iops_write: f64,
    pub latency_read_us: f64,
    pub latency_write_us: f64,
    pub bandwidth_mbps: f64,
    pub queue_depth: u32,
    pub block_size_bytes: u64,
    pub cache_write_policy: CacheWritePolicy,
    pub cache_read_hit_rate: f64,
    pub cache_write_back_hit_rate: f64,
    pub cache_write_through_hit_rate: f64,
    pub wear_level: f64,
    pub write_ratio: f64,
    pub fragmentation_level: f64,
    pub hdd_power_state: HddPowerState,
    pub idle_ticks: u64,
    pub spin_up_latency_us: f64,
    pub thermal_threshold_c: f64,
    pub thermal_inertia: f64,
    pub die_temp_c: f64,
    pub multi_stream_count: u32,
    pub zns_enabled: bool,
    pub encryption_enabled: bool,
    pub compression_enabled: bool,
}

impl Default for StorageState {
    fn default() -> Self {
        Self {
            device_type: StorageDeviceType::default(),
            iops_read: DEFAULT_IOPS_READ,
            iops_write: DEFAULT_IOPS_WRITE,
            latency_read_us: DEFAULT_LATENCY_READ_US,
            latency_write_us: DEFAULT_LATENCY_WRITE_US,
            bandwidth_mbps: DEFAULT_BANDWIDTH_MBPS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            block_size_bytes: DEFAULT_BLOCK_SIZE_BYTES,
            cache_write_policy: CacheWritePolicy::default(),
            cache_read_hit_rate: DEFAULT_CACHE_READ_HIT_RATE,
            cache_write_back_hit_rate: DEFAULT_CACHE_WRITE_BACK_HIT_RATE,
            cache_write_through_hit_rate: DEFAULT_CACHE_WRITE_THROUGH_HIT_RATE,
            wear_level: DEFAULT_WEAR_LEVEL,
            write_ratio: DEFAULT_WRITE_RATIO,
            fragmentation_level: 0.0,
            hdd_power_state: HddPowerState::default(),
            idle_ticks: 0,
            spin_up_latency_us: DEFAULT_SPIN_UP_LATENCY_US,
            thermal_threshold_c: DEFAULT_THERMAL_THRESHOLD_C,
            thermal_inertia: DEFAULT_THERMAL_INERTIA,
            die_temp_c: 35.0,
            multi_stream_count: DEFAULT_MULTI_STREAM_COUNT,
            zns_enabled: false,
            encryption_enabled: false,
            compression_enabled: false,
        }
    }
}

impl StorageState {
    /// Maximum concurrent IOPS admission budget (FR §4.4, literal formula).
    pub fn max_concurrent_iops(&self) -> f64 {
        (self.iops_read + self.iops_write).min(self.queue_depth as f64)
    }

    pub fn apply_profile(&mut self, profile: &EngineProfile) {
        if let Some(v) = profile.specific_str("device", "type").and_then(StorageDeviceType::from_str) {
            self.device_type = v;
        }
        if let Some(v) = profile.baseline("iops_read") {
            self.iops_read = v;
        }
        if let Some(v) = profile.baseline("iops_write") {
            self.iops_write = v;
        }
        if let Some(v) = profile.baseline("latency_read_us") {
            self.latency_read_us = v;
        }
        if let Some(v) = profile.baseline("latency_write_us") {
            self.latency_write_us = v;
        }
        if let Some(v) = profile.baseline("bandwidth_mbps") {
            self.bandwidth_mbps = v;
        }
        if let Some(v) = profile.specific_f64("queue", "depth") {
            self.queue_depth = v as u32;
        }
        if let Some(v) = profile.specific_f64("block", "size_bytes") {
            self.block_size_bytes = v as u64;
        }
        if let Some(v) = profile.specific_f64("cache", "read_hit_rate") {
            self.cache_read_hit_rate = v;
        }
        if let Some(v) = profile.specific_f64("cache", "write_back_hit_rate") {
            self.cache_write_back_hit_rate = v;
        }
        if let Some(v) = profile.specific_f64("cache", "write_through_hit_rate") {
            self.cache_write_through_hit_rate = v;
        }
        if let Some(v) = profile.specific_f64("wear", "level") {
            self.wear_level = v;
        }
        if let Some(v) = profile.specific_f64("workload", "write_ratio") {
            self.write_ratio = v;
        }
        if let Some(v) = profile.specific_f64("thermal", "threshold_c") {
            self.thermal_threshold_c = v;
        }
        if let Some(v) = profile.specific_f64("ssd", "multi_stream_count") {
            self.multi_stream_count = v as u32;
        }
        if let Some(v) = profile.specific_str("ssd", "zns_enabled") {
            self.zns_enabled = v == "true";
        }
        if let Some(v) = profile.specific_str("security", "encryption_enabled") {
            self.encryption_enabled = v == "true";
        }
        if let Some(v) = profile.specific_str("compression", "enabled") {
            self.compression_enabled = v == "true";
        }
    }
}
