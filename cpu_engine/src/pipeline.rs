//! The CPU effect pipeline: a fixed sequence of stages, each
//! `fn(StageInput, &Operation, &mut CpuState) -> Duration` (FR §9).
//!
//! Stages never build a dynamic list; `run` calls each one in a fixed
//! order, skipping it outright when the complexity interface disables it.

use crate::features::CpuFeatures;
use crate::state::CpuState;
use simcore::types::Operation;
use simcore::{hash, ComplexityState};
use std::time::Duration;

/// Per-stage context threaded through the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct StageInput {
    pub duration: Duration,
    pub tick: u64,
    /// Core-pool utilization in `[0, 1]` at admission time.
    pub utilization: f64,
}

fn language_multiplier(lang: &str) -> f64 {
    match lang {
        "rust" | "c" | "cpp" | "c++" => 0.9,
        "go" => 1.1,
        "java" | "csharp" | "c#" => 1.5,
        "python" | "ruby" => 3.0,
        "javascript" | "typescript" => 2.2,
        _ => 1.2,
    }
}

fn stage_language_complexity(input: StageInput, op: &Operation, _state: &mut CpuState) -> Duration {
    let lang_factor = language_multiplier(&op.language);
    let elements = (op.data_size as f64 / 8.0).max(1.0);
    let complexity_factor = 1.0 + op.complexity.factor(elements).ln().max(0.0) * 0.05;
    input.duration.mul_f64(lang_factor * complexity_factor)
}

fn stage_cache_hierarchy(input: StageInput, _op: &Operation, state: &mut CpuState, l2_l3_enabled: bool) -> Duration {
    let miss_l1 = 1.0 - state.l1_hit_rate;
    let deeper_penalty = if l2_l3_enabled {
        state.l2_hit_rate * 1.5 + (1.0 - state.l2_hit_rate) * (state.l3_hit_rate * 3.0 + (1.0 - state.l3_hit_rate) * 8.0)
    } else {
        4.0
    };
    let factor = state.l1_hit_rate * 1.0 + miss_l1 * deeper_penalty;
    input.duration.mul_f64(factor.max(1.0))
}

fn stage_simd(input: StageInput, op: &Operation, state: &mut CpuState) -> Duration {
    if op.data_size >= 64 {
        input.duration.mul_f64(1.0 - state.simd_bonus)
    } else {
        input.duration
    }
}

fn stage_boost_clock(input: StageInput, _op: &Operation, state: &mut CpuState) -> Duration {
    if input.utilization < 0.6 && state.boost_clock_ghz > 0.0 {
        input.duration.mul_f64(state.base_clock_ghz / state.boost_clock_ghz)
    } else {
        input.duration
    }
}

fn stage_thermal(input: StageInput, _op: &Operation, state: &mut CpuState) -> Duration {
    state.die_temp_c = 40.0 + input.utilization.clamp(0.0, 1.0) * 50.0;
    if state.die_temp_c > state.thermal_threshold_c {
        let excess = state.die_temp_c - state.thermal_threshold_c;
        input.duration.mul_f64(1.0 + excess / 100.0)
    } else {
        input.duration
    }
}

fn stage_numa(input: StageInput, op: &Operation, state: &mut CpuState) -> Duration {
    if state.numa_nodes <= 1 {
        return input.duration;
    }
    if hash::decide(&op.id, op.data_size, op.op_type.len(), input.tick, 1, 1.0 / state.numa_nodes as f64) {
        input.duration.mul_f64(state.cross_socket_penalty)
    } else {
        input.duration
    }
}

fn stage_hyperthreading(input: StageInput, _op: &Operation, state: &mut CpuState) -> Duration {
    let bonus = state.hyperthreading_efficiency * input.utilization.clamp(0.0, 1.0) * 0.1;
    input.duration.mul_f64((1.0 - bonus).max(0.1))
}

fn stage_branch_prediction(input: StageInput, _op: &Operation, state: &mut CpuState) -> Duration {
    input.duration.mul_f64(1.0 + (1.0 - state.branch_prediction_hit_rate) * 0.2)
}

fn stage_prefetcher(input: StageInput, _op: &Operation, state: &mut CpuState) -> Duration {
    input.duration.mul_f64((1.0 - state.prefetcher_accuracy * 0.05).max(0.1))
}

fn stage_memory_bandwidth_contention(input: StageInput, _op: &Operation, _state: &mut CpuState) -> Duration {
    input.duration.mul_f64(1.0 + input.utilization.clamp(0.0, 1.0) * 0.15)
}

fn stage_parallel_speedup(input: StageInput, op: &Operation, state: &mut CpuState) -> Duration {
    if op.data_size > state.multi_core_threshold_bytes {
        input.duration.mul_f64(0.6)
    } else {
        input.duration
    }
}

fn stage_deep_cache_contention(input: StageInput, _op: &Operation, _state: &mut CpuState) -> Duration {
    input.duration.mul_f64(1.0 + input.utilization.clamp(0.0, 1.0) * 0.1)
}

/// Outcome of running the pipeline: the final duration plus the factors a
/// caller needs to build `PenaltyInformation`.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOutcome {
    pub duration: Duration,
    pub cache_hit_ratio: f64,
    pub thermal_throttling: f64,
    pub memory_contention: f64,
}

/// Run the fixed CPU pipeline over `base_duration`, skipping any stage the
/// complexity interface disables (FR §4.2, §4.6, §9).
pub fn run(
    base_duration: Duration,
    op: &Operation,
    state: &mut CpuState,
    complexity: &ComplexityState<CpuFeatures>,
    tick: u64,
    utilization: f64,
) -> PipelineOutcome {
    let mut duration = base_duration;
    let input = |d: Duration| StageInput { duration: d, tick, utilization };

    if complexity.should_enable(CpuFeatures::LANGUAGE_COMPLEXITY) {
        duration = stage_language_complexity(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::L1_CACHE) {
        let l2_l3 = complexity.should_enable(CpuFeatures::L2_L3_CACHE);
        duration = stage_cache_hierarchy(input(duration), op, state, l2_l3);
    }
    if complexity.should_enable(CpuFeatures::SIMD) {
        duration = stage_simd(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::BOOST_CLOCK) {
        duration = stage_boost_clock(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::THERMAL) {
        duration = stage_thermal(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::NUMA) {
        duration = stage_numa(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::HYPERTHREADING) {
        duration = stage_hyperthreading(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::BRANCH_PREDICTION) {
        duration = stage_branch_prediction(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::PREFETCHER) {
        duration = stage_prefetcher(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::MEMORY_BANDWIDTH_CONTENTION) {
        duration = stage_memory_bandwidth_contention(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::PARALLEL_SPEEDUP) {
        duration = stage_parallel_speedup(input(duration), op, state);
    }
    if complexity.should_enable(CpuFeatures::DEEP_CACHE_CONTENTION) {
        duration = stage_deep_cache_contention(input(duration), op, state);
    }

    PipelineOutcome {
        duration,
        cache_hit_ratio: state.l1_hit_rate,
        thermal_throttling: (state.die_temp_c - state.thermal_threshold_c).max(0.0) / 100.0 + 1.0,
        memory_contention: 1.0 + utilization.clamp(0.0, 1.0) * 0.15,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcore::ComplexityLevel;

    fn op(size: u64) -> Operation {
        Operation::new("op", "cpu_compute", size, 0)
    }

    #[test]
    fn minimal_level_only_runs_language_and_l1() {
        let mut state = CpuState::default();
        let complexity = ComplexityState::<CpuFeatures>::new(ComplexityLevel::Minimal);
        let outcome = run(Duration::from_micros(100), &op(1024), &mut state, &complexity, 1, 0.3);
        assert!(outcome.duration > Duration::ZERO);
        // thermal stage disabled at Minimal, die temp stays at its initial value
        assert_eq!(state.die_temp_c, 40.0);
    }

    #[test]
    fn thermal_enabled_from_basic_and_mutates_state() {
        let mut state = CpuState::default();
        let complexity = ComplexityState::<CpuFeatures>::new(ComplexityLevel::Basic);
        run(Duration::from_micros(100), &op(1024), &mut state, &complexity, 1, 0.9);
        assert!(state.die_temp_c > 40.0);
    }

    #[test]
    fn large_operation_gets_parallel_speedup_at_advanced() {
        let mut state = CpuState::default();
        let complexity = ComplexityState::<CpuFeatures>::new(ComplexityLevel::Advanced);
        let small = run(Duration::from_micros(1000), &op(100), &mut state, &complexity, 1, 0.2);
        let mut state2 = CpuState::default();
        let large = run(Duration::from_micros(1000), &op(2_000_000), &mut state2, &complexity, 1, 0.2);
        assert!(large.duration < small.duration);
    }

    #[test]
    fn pipeline_output_always_positive_and_finite() {
        let mut state = CpuState::default();
        let complexity = ComplexityState::<CpuFeatures>::new(ComplexityLevel::Maximum);
        let outcome = run(Duration::from_nanos(1), &op(4096), &mut state, &complexity, 500, 0.95);
        assert!(outcome.duration.as_secs_f64() > 0.0);
        assert!(outcome.duration.as_secs_f64().is_finite());
    }
}
