//! The storage effect pipeline: a fixed sequence of stages (FR §4.4, §9).

use crate::access::{is_seek, is_write};
use crate::features::StorageFeatures;
use crate::state::{CacheWritePolicy, HddPowerState, StorageDeviceType, StorageState};
use simcore::types::{AccessPattern, Operation};
use simcore::{hash, ComplexityState};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct StageInput {
    pub duration: Duration,
    pub tick: u64,
    pub utilization: f64,
    pub access_pattern: AccessPattern,
    pub health_score: f64,
}

fn stage_access_pattern(input: StageInput, state: &StorageState) -> Duration {
    let factor = match (state.device_type, input.access_pattern) {
        (StorageDeviceType::Hdd, AccessPattern::Sequential) => 0.6,
        (StorageDeviceType::Hdd, _) => 1.8,
        (_, AccessPattern::Sequential) => 0.9,
        (_, _) => 1.1,
    };
    input.duration.mul_f64(factor)
}

fn stage_queue_depth_management(input: StageInput) -> (Duration, f64) {
    let u = input.utilization.max(0.0);
    let factor = if u < 0.5 {
        0.8
    } else if u < 0.8 {
        0.9
    } else if u < 0.95 {
        1.2
    } else {
        1.5
    };
    (input.duration.mul_f64(factor), factor)
}

fn stage_controller_cache(input: StageInput, op: &Operation, state: &StorageState) -> Duration {
    if is_write(&op.op_type) {
        let (hit_rate, factor) = match state.cache_write_policy {
            CacheWritePolicy::WriteBack => (state.cache_write_back_hit_rate, 0.05),
            CacheWritePolicy::WriteThrough => (state.cache_write_through_hit_rate, 0.1),
        };
        if hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 30, hit_rate) {
            return input.duration.mul_f64(factor);
        }
    } else if hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 31, state.cache_read_hit_rate) {
        return input.duration.mul_f64(0.2);
    }
    input.duration
}

fn stage_filesystem_metadata(input: StageInput, op: &Operation) -> Duration {
    let mut factor = if is_write(&op.op_type) {
        1.15
    } else if is_seek(&op.op_type) {
        1.10
    } else {
        1.05
    };
    if op.data_size < 4096 {
        factor *= 1.2;
    }
    input.duration.mul_f64(factor)
}

fn stage_hdd_fragmentation(input: StageInput, state: &mut StorageState) -> Duration {
    if state.device_type != StorageDeviceType::Hdd {
        return input.duration;
    }
    state.fragmentation_level = (state.fragmentation_level + 0.001).min(0.3);
    input.duration.mul_f64(1.0 + state.fragmentation_level)
}

fn stage_ssd_wear_leveling(input: StageInput, op: &Operation, state: &mut StorageState) -> Duration {
    if state.device_type == StorageDeviceType::Hdd {
        return input.duration;
    }
    if is_write(&op.op_type) {
        state.wear_level = (state.wear_level + 0.0001).min(1.0);
    }
    input.duration.mul_f64(1.0 + state.wear_level * 0.15)
}

fn stage_hdd_power_states(input: StageInput, state: &mut StorageState) -> (Duration, f64) {
    if state.device_type != StorageDeviceType::Hdd {
        return (input.duration, 1.0);
    }
    let spin_up = match state.hdd_power_state {
        HddPowerState::Active => 1.0,
        HddPowerState::Idle => 1.0 + state.spin_up_latency_us * 0.1 / input.duration.as_nanos().max(1) as f64 * 1000.0,
        HddPowerState::Standby => 1.0 + state.spin_up_latency_us * 1000.0 / input.duration.as_nanos().max(1) as f64,
        HddPowerState::Sleep => 1.0 + state.spin_up_latency_us * 3000.0 / input.duration.as_nanos().max(1) as f64,
    };
    state.hdd_power_state = HddPowerState::Active;
    state.idle_ticks = 0;
    (input.duration.mul_f64(spin_up), spin_up)
}

fn stage_thermal_throttling(input: StageInput, state: &mut StorageState) -> (Duration, f64) {
    let target = 35.0 + input.utilization.clamp(0.0, 1.0) * 40.0;
    state.die_temp_c += (target - state.die_temp_c) * state.thermal_inertia;
    let factor = if state.die_temp_c > state.thermal_threshold_c {
        1.0 + (state.die_temp_c - state.thermal_threshold_c) / 50.0
    } else {
        1.0
    };
    (input.duration.mul_f64(factor), factor)
}

fn stage_ssd_trim_gc(input: StageInput, state: &StorageState) -> Duration {
    if state.device_type == StorageDeviceType::Hdd {
        return input.duration;
    }
    let zns_relief = if state.zns_enabled { 0.3 } else { 1.0 };
    let factor = 1.0 + state.write_ratio * state.wear_level * 0.3 * zns_relief;
    input.duration.mul_f64(factor)
}

fn stage_compression(input: StageInput, op: &Operation, state: &StorageState) -> Duration {
    if !state.compression_enabled {
        return input.duration;
    }
    if op.data_size > 65_536 {
        input.duration.mul_f64(0.7)
    } else if op.data_size < 4096 {
        input.duration.mul_f64(1.1)
    } else {
        input.duration
    }
}

fn stage_hardware_encryption(input: StageInput, op: &Operation, state: &StorageState) -> Duration {
    if !state.encryption_enabled {
        return input.duration;
    }
    let (write_rate, read_rate) = if state.device_type == StorageDeviceType::Nvme { (0.02, 0.015) } else { (0.05, 0.03) };
    let rate = if is_write(&op.op_type) { write_rate } else { read_rate };
    input.duration.mul_f64(1.0 + rate)
}

fn stage_ecc_overhead(input: StageInput, state: &StorageState) -> Duration {
    let factor = 1.0 + state.wear_level * 0.1 + (1.0 - input.health_score.clamp(0.0, 1.0)) * 0.1;
    input.duration.mul_f64(factor)
}

fn stage_advanced_prefetching(input: StageInput) -> Duration {
    if input.access_pattern == AccessPattern::Sequential {
        input.duration.mul_f64(0.95)
    } else {
        input.duration
    }
}

fn stage_multi_stream_ssd(state: &StorageState) -> f64 {
    if state.device_type == StorageDeviceType::Hdd || state.multi_stream_count <= 1 {
        1.0
    } else {
        1.0 / (1.0 + 0.1 * (state.multi_stream_count - 1) as f64)
    }
}

fn stage_zoned_namespace(input: StageInput, op: &Operation, state: &StorageState) -> Duration {
    if state.zns_enabled && is_write(&op.op_type) {
        input.duration.mul_f64(0.95)
    } else {
        input.duration
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOutcome {
    pub duration: Duration,
    pub thermal_throttling: f64,
    pub power_state_impact: f64,
    pub contention_factor: f64,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    base_duration: Duration,
    op: &Operation,
    state: &mut StorageState,
    complexity: &ComplexityState<StorageFeatures>,
    tick: u64,
    utilization: f64,
    access_pattern: AccessPattern,
    health_score: f64,
) -> PipelineOutcome {
    let mut duration = base_duration;
    let input = |d: Duration| StageInput { duration: d, tick, utilization, access_pattern, health_score };

    let mut thermal_throttling = 1.0;
    let mut power_state_impact = 1.0;
    let mut contention_factor = 1.0;

    if complexity.should_enable(StorageFeatures::ACCESS_PATTERN_OPTIMIZATION) {
        duration = stage_access_pattern(input(duration), state);
    }
    if complexity.should_enable(StorageFeatures::QUEUE_DEPTH_MANAGEMENT) {
        let (d, factor) = stage_queue_depth_management(input(duration));
        duration = d;
        contention_factor *= factor;
    }
    if complexity.should_enable(StorageFeatures::CONTROLLER_CACHE) {
        duration = stage_controller_cache(input(duration), op, state);
    }
    if complexity.should_enable(StorageFeatures::FILESYSTEM_METADATA_OVERHEAD) {
        duration = stage_filesystem_metadata(input(duration), op);
    }
    if complexity.should_enable(StorageFeatures::HDD_FRAGMENTATION) {
        duration = stage_hdd_fragmentation(input(duration), state);
    }
    if complexity.should_enable(StorageFeatures::SSD_WEAR_LEVELING) {
        duration = stage_ssd_wear_leveling(input(duration), op, state);
    }
    if complexity.should_enable(StorageFeatures::HDD_POWER_STATES) {
        let (d, impact) = stage_hdd_power_states(input(duration), state);
        duration = d;
        power_state_impact = impact;
    }
    if complexity.should_enable(StorageFeatures::THERMAL_THROTTLING) {
        let (d, factor) = stage_thermal_throttling(input(duration), state);
        duration = d;
        thermal_throttling = factor;
    }
    if complexity.should_enable(StorageFeatures::SSD_TRIM_GC) {
        duration = stage_ssd_trim_gc(input(duration), state);
    }
    if complexity.should_enable(StorageFeatures::COMPRESSION) {
        duration = stage_compression(input(duration), op, state);
    }
    if complexity.should_enable(StorageFeatures::HARDWARE_ENCRYPTION) {
        duration = stage_hardware_encryption(input(duration), op, state);
    }
    if complexity.should_enable(StorageFeatures::ECC_OVERHEAD) {
        duration = stage_ecc_overhead(input(duration), state);
    }
    if complexity.should_enable(StorageFeatures::ADVANCED_PREFETCHING) {
        duration = stage_advanced_prefetching(input(duration));
    }
    if complexity.should_enable(StorageFeatures::MULTI_STREAM_SSD) {
        contention_factor *= stage_multi_stream_ssd(state);
    }
    if complexity.should_enable(StorageFeatures::ZONED_NAMESPACE) {
        duration = stage_zoned_namespace(input(duration), op, state);
    }

    PipelineOutcome { duration, thermal_throttling, power_state_impact, contention_factor: contention_factor.max(0.01) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcore::ComplexityLevel;

    fn op(op_type: &str, data_size: u64) -> Operation {
        Operation::new("s1", op_type, data_size, 0)
    }

    #[test]
    fn sequential_hdd_gets_speedup_minimal_level() {
        let mut state = StorageState { device_type: StorageDeviceType::Hdd, ..StorageState::default() };
        let complexity = ComplexityState::<StorageFeatures>::new(ComplexityLevel::Minimal);
        let out = run(Duration::from_micros(100), &op("storage_read", 1_000_000), &mut state, &complexity, 1, 0.2, AccessPattern::Sequential, 1.0);
        assert!(out.duration < Duration::from_micros(100));
    }

    #[test]
    fn random_hdd_gets_penalty() {
        let mut state = StorageState { device_type: StorageDeviceType::Hdd, ..StorageState::default() };
        let complexity = ComplexityState::<StorageFeatures>::new(ComplexityLevel::Minimal);
        let out = run(Duration::from_micros(100), &op("storage_read", 512), &mut state, &complexity, 1, 0.2, AccessPattern::Random, 1.0);
        assert!(out.duration > Duration::from_micros(100));
    }

    #[test]
    fn pipeline_result_always_positive_and_finite() {
        let mut state = StorageState::default();
        let complexity = ComplexityState::<StorageFeatures>::new(ComplexityLevel::Maximum);
        let out = run(Duration::from_micros(50), &op("storage_write", 8192), &mut state, &complexity, 500, 0.9, AccessPattern::Random, 0.5);
        assert!(out.duration.as_secs_f64() > 0.0);
        assert!(out.duration.as_secs_f64().is_finite());
        assert!(out.contention_factor > 0.0);
    }
}
