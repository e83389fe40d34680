//! The memory effect pipeline: a fixed sequence of stages (FR §4.3, §9).

use crate::features::MemoryFeatures;
use crate::state::MemoryState;
use simcore::types::{AccessPattern, Operation};
use simcore::{hash, ComplexityState};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct StageInput {
    pub duration: Duration,
    pub tick: u64,
    pub utilization: f64,
    pub access_pattern: AccessPattern,
    /// Row-buffer hit probability for this tick, resolved from the
    /// convergence model before the pipeline runs (FR §4.1 "Convergence
    /// bookkeeping" is owned by the common core, not engine state).
    pub row_buffer_hit_probability: f64,
}

fn gc_pause_ns(language: &str, utilization: f64) -> f64 {
    let base = match language {
        "java" | "csharp" | "c#" => 2000.0,
        "python" | "ruby" => 1500.0,
        "javascript" | "typescript" => 1000.0,
        "go" => 300.0,
        _ => 0.0,
    };
    base * utilization.clamp(0.0, 1.0)
}

fn stage_ddr_timing(input: StageInput, op: &Operation, state: &mut MemoryState) -> (Duration, bool) {
    let hit = hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 10, input.row_buffer_hit_probability);
    if hit {
        (input.duration, true)
    } else {
        let cycle_ns = 1000.0 / state.frequency_mhz.max(1.0);
        let extra_ns = (state.trcd_cycles + state.trp_cycles) * cycle_ns;
        (input.duration + Duration::from_nanos(extra_ns.max(0.0) as u64), false)
    }
}

fn stage_bandwidth_saturation(input: StageInput, _op: &Operation, _state: &mut MemoryState) -> Duration {
    let u = input.utilization.clamp(0.0, 2.0);
    let factor = if u < 0.6 {
        1.0
    } else if u < 0.8 {
        1.0 + (u - 0.6) / 0.2 * 0.3
    } else if u < 1.0 {
        1.3 + (u - 0.8) / 0.2 * 0.7
    } else {
        2.0 * (1.0 + (u - 1.0) * 5.0)
    };
    input.duration.mul_f64(factor)
}

fn stage_basic_numa(input: StageInput, op: &Operation, state: &mut MemoryState) -> (Duration, bool) {
    if state.numa_nodes <= 1 {
        return (input.duration, false);
    }
    let cross = hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 11, 1.0 / state.numa_nodes as f64);
    if cross {
        (input.duration.mul_f64(state.cross_socket_penalty), true)
    } else {
        (input.duration, false)
    }
}

fn stage_gc_pauses(input: StageInput, op: &Operation, _state: &mut MemoryState) -> Duration {
    input.duration + Duration::from_nanos(gc_pause_ns(&op.language, input.utilization) as u64)
}

fn stage_heap_fragmentation(input: StageInput, _op: &Operation, _state: &mut MemoryState) -> Duration {
    if input.utilization > 0.6 {
        input.duration.mul_f64(1.0 + (input.utilization - 0.6) * 0.5)
    } else {
        input.duration
    }
}

fn stage_memory_pressure(input: StageInput, _op: &Operation, _state: &mut MemoryState) -> (Duration, f64) {
    let u = input.utilization;
    let factor = if u > 0.9 {
        4.0
    } else if u > 0.7 {
        1.0 + (u - 0.7) * 1.5
    } else {
        1.0
    };
    (input.duration.mul_f64(factor), factor)
}

fn prefetch_accuracy(state: &MemoryState, pattern: AccessPattern) -> f64 {
    match pattern {
        AccessPattern::Sequential => state.prefetch_sequential_accuracy,
        AccessPattern::Stride => state.prefetch_stride_accuracy,
        AccessPattern::Random => state.prefetch_random_accuracy,
    }
}

fn stage_hardware_prefetch(input: StageInput, op: &Operation, state: &mut MemoryState) -> Duration {
    let accuracy = prefetch_accuracy(state, input.access_pattern);
    let hit = hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 12, accuracy);
    if hit {
        input.duration
    } else {
        input.duration.mul_f64(1.0 + (1.0 - accuracy) * 0.1)
    }
}

fn stage_cache_line_conflict(input: StageInput, op: &Operation, state: &mut MemoryState) -> Duration {
    let line = hash::deterministic_hash(&op.id, op.data_size, op.op_type.len(), input.tick, 13) % 4096;
    if state.recent_lines.touch(line) {
        input.duration.mul_f64(1.15)
    } else {
        input.duration
    }
}

fn stage_controller_arbitration(input: StageInput, _op: &Operation, state: &mut MemoryState) -> Duration {
    let per_controller_load = input.utilization / state.controller_count.max(1) as f64;
    let inflight_per_controller = per_controller_load * state.channel_count.max(1) as f64;
    let queue_fill = inflight_per_controller / state.controller_queue_depth.max(1) as f64;
    let saturation = (queue_fill - 0.75).max(0.0) * 4.0;
    input.duration.mul_f64(1.0 + per_controller_load * 0.1 + saturation)
}

fn stage_advanced_numa(input: StageInput, _op: &Operation, state: &mut MemoryState) -> Duration {
    input.duration.mul_f64(1.0 + 0.05 * state.numa_nodes.saturating_sub(1) as f64)
}

fn stage_page_access_tracking(input: StageInput, op: &Operation, state: &mut MemoryState) -> Duration {
    let page = hash::deterministic_hash(&op.id, op.data_size, op.op_type.len(), input.tick, 14) % 1024;
    state.recent_lines.touch(page);
    input.duration
}

fn stage_tlb_page_walk(input: StageInput, op: &Operation, state: &mut MemoryState) -> (Duration, bool) {
    let hit = hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 15, state.tlb_hit_rate);
    let mut duration = input.duration;
    if !hit {
        duration += Duration::from_nanos(state.page_walk_penalty_ns.max(0.0) as u64);
    }
    let fault = !hit
        && hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 16, state.swap_fault_probability);
    if fault {
        duration += Duration::from_nanos((state.swap_fault_latency_us * 1000.0).max(0.0) as u64);
    }
    (duration, fault)
}

fn stage_ecc(input: StageInput, op: &Operation, state: &mut MemoryState) -> (Duration, bool) {
    let mut duration = input.duration;
    let single = hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 17, state.ecc_single_bit_rate);
    if single {
        duration += Duration::from_nanos(state.ecc_correction_latency_ns.max(0.0) as u64);
    }
    let multi = hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 18, state.ecc_multi_bit_rate);
    (duration, multi)
}

fn stage_power_state(input: StageInput, op: &Operation, _state: &mut MemoryState) -> Duration {
    if input.utilization < 0.1
        && hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 19, 0.05)
    {
        input.duration + Duration::from_nanos(200)
    } else {
        input.duration
    }
}

/// Address proxy used to line up an operation against the reordering
/// window's pending set (FR §4.3 "memory-ordering reordering window").
/// Shared with the engine so admission/completion can track the same
/// addresses the stage checks against.
pub fn ordering_address(op: &Operation) -> u64 {
    hash::deterministic_hash(&op.id, op.data_size, op.op_type.len(), op.start_tick, 20) % 8192
}

fn stage_memory_ordering(input: StageInput, op: &Operation, state: &mut MemoryState) -> Duration {
    let hazard = state.pending_addresses.contains_key(&ordering_address(op));
    if hazard {
        input.duration + Duration::from_nanos(2)
    } else {
        input.duration
    }
}

fn stage_enhanced_thermal(input: StageInput, _op: &Operation, state: &mut MemoryState) -> Duration {
    for (i, temp) in state.thermal_zone_temps_c.iter_mut().enumerate() {
        *temp = 35.0 + input.utilization.clamp(0.0, 1.0) * (20.0 + i as f64 * 5.0);
    }
    let hottest = state.thermal_zone_temps_c.iter().cloned().fold(f64::MIN, f64::max);
    if hottest > 75.0 {
        input.duration.mul_f64(1.0 + (hottest - 75.0) / 100.0)
    } else {
        input.duration
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOutcome {
    pub duration: Duration,
    pub row_buffer_hit: bool,
    pub numa_penalty: f64,
    pub memory_pressure_factor: f64,
    pub channel_contention: f64,
    pub ecc_multi_bit: bool,
    pub swap_fault: bool,
}

pub fn run(
    base_duration: Duration,
    op: &Operation,
    state: &mut MemoryState,
    complexity: &ComplexityState<MemoryFeatures>,
    tick: u64,
    utilization: f64,
    access_pattern: AccessPattern,
    row_buffer_hit_probability: f64,
) -> PipelineOutcome {
    let mut duration = base_duration;
    let input = |d: Duration| StageInput { duration: d, tick, utilization, access_pattern, row_buffer_hit_probability };

    let mut row_buffer_hit = true;
    let mut numa_penalty = 1.0;
    let mut memory_pressure_factor = 1.0;
    let mut ecc_multi_bit = false;
    let mut swap_fault = false;

    if complexity.should_enable(MemoryFeatures::DDR_TIMING) {
        let (d, hit) = stage_ddr_timing(input(duration), op, state);
        duration = d;
        row_buffer_hit = hit;
    }
    if complexity.should_enable(MemoryFeatures::BANDWIDTH_SATURATION) {
        duration = stage_bandwidth_saturation(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::BASIC_NUMA) {
        let (d, crossed) = stage_basic_numa(input(duration), op, state);
        duration = d;
        if crossed {
            numa_penalty = state.cross_socket_penalty;
        }
    }
    if complexity.should_enable(MemoryFeatures::GC_PAUSES) {
        duration = stage_gc_pauses(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::HEAP_FRAGMENTATION) {
        duration = stage_heap_fragmentation(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::MEMORY_PRESSURE) {
        let (d, factor) = stage_memory_pressure(input(duration), op, state);
        duration = d;
        memory_pressure_factor = factor;
    }
    if complexity.should_enable(MemoryFeatures::HARDWARE_PREFETCH) {
        duration = stage_hardware_prefetch(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::CACHE_LINE_CONFLICT) {
        duration = stage_cache_line_conflict(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::MEMORY_CONTROLLER_ARBITRATION) {
        duration = stage_controller_arbitration(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::ADVANCED_NUMA) {
        duration = stage_advanced_numa(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::PAGE_ACCESS_TRACKING) {
        duration = stage_page_access_tracking(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::TLB_PAGE_WALK) {
        let (d, fault) = stage_tlb_page_walk(input(duration), op, state);
        duration = d;
        swap_fault = fault;
    }
    if complexity.should_enable(MemoryFeatures::ECC_ERRORS) {
        let (d, multi) = stage_ecc(input(duration), op, state);
        duration = d;
        ecc_multi_bit = multi;
    }
    if complexity.should_enable(MemoryFeatures::POWER_STATE) {
        duration = stage_power_state(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::MEMORY_ORDERING) {
        duration = stage_memory_ordering(input(duration), op, state);
    }
    if complexity.should_enable(MemoryFeatures::ENHANCED_THERMAL) {
        duration = stage_enhanced_thermal(input(duration), op, state);
    }

    PipelineOutcome {
        duration,
        row_buffer_hit,
        numa_penalty,
        memory_pressure_factor,
        channel_contention: 1.0 + utilization.clamp(0.0, 1.0) * 0.1,
        ecc_multi_bit,
        swap_fault,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcore::ComplexityLevel;

    fn op() -> Operation {
        Operation::new("m1", "memory_read", 4096, 0)
    }

    #[test]
    fn row_buffer_hit_skips_timing_penalty() {
        let mut state = MemoryState::default();
        let complexity = ComplexityState::<MemoryFeatures>::new(ComplexityLevel::Minimal);
        let hit = run(Duration::from_nanos(10), &op(), &mut state, &complexity, 1, 0.2, AccessPattern::Random, 1.0);
        assert!(hit.row_buffer_hit);
        assert_eq!(hit.duration, Duration::from_nanos(10));
    }

    #[test]
    fn row_buffer_miss_adds_timing_penalty() {
        let mut state = MemoryState::default();
        let complexity = ComplexityState::<MemoryFeatures>::new(ComplexityLevel::Minimal);
        let miss = run(Duration::from_nanos(10), &op(), &mut state, &complexity, 1, 0.2, AccessPattern::Random, 0.0);
        assert!(!miss.row_buffer_hit);
        assert!(miss.duration > Duration::from_nanos(10));
    }

    #[test]
    fn pipeline_result_always_positive_and_finite() {
        let mut state = MemoryState::default();
        let complexity = ComplexityState::<MemoryFeatures>::new(ComplexityLevel::Maximum);
        let out = run(Duration::from_nanos(1), &op(), &mut state, &complexity, 500, 0.95, AccessPattern::Sequential, 0.85);
        assert!(out.duration.as_secs_f64() > 0.0);
        assert!(out.duration.as_secs_f64().is_finite());
    }
}
