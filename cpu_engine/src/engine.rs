//! The concrete CPU engine: [`CommonEngineCore`] embedded by composition,
//! plus the core pool's in-flight tracking (FR §4.2, §9).

use crate::features::CpuFeatures;
use crate::pipeline;
use crate::state::CpuState;
use serde_json::json;
use simcore::types::{
    DynamicState, EngineDetail, EngineId, EngineKind, EngineProfile, GradingBands, HealthMetrics, Operation,
    OperationResult, PenaltyInformation,
};
use simcore::{CommonEngineCore, ComplexityState, Engine, EngineResult};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use tracing::{debug, trace};

/// A completed operation waiting for its completion tick to arrive; the
/// result is fully computed at admission time, `process_tick` only decides
/// *when* to release it (FR §5 ordering guarantees).
#[derive(Debug, Clone)]
struct InFlightOp {
    completion_tick: u64,
    push_seq: u64,
    cores: u32,
    result: OperationResult,
}

impl PartialEq for InFlightOp {
    fn eq(&self, other: &Self) -> bool {
        self.completion_tick == other.completion_tick && self.push_seq == other.push_seq
    }
}
impl Eq for InFlightOp {}
impl PartialOrd for InFlightOp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for InFlightOp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.completion_tick, self.push_seq).cmp(&(other.completion_tick, other.push_seq))
    }
}

pub struct CpuEngine {
    core: CommonEngineCore,
    complexity: ComplexityState<CpuFeatures>,
    state: CpuState,
    in_flight: BinaryHeap<Reverse<InFlightOp>>,
    busy_cores: u32,
}

impl CpuEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            core: CommonEngineCore::new(EngineKind::Cpu, capacity),
            complexity: ComplexityState::default(),
            state: CpuState::default(),
            in_flight: BinaryHeap::new(),
            busy_cores: 0,
        }
    }

    fn cores_for(&self, op: &Operation) -> u32 {
        if op.data_size > self.state.multi_core_threshold_bytes {
            2
        } else {
            1
        }
    }

    fn build_result(&mut self, op: &Operation, tick: u64, completion_tick: u64) -> OperationResult {
        let utilization = self.busy_cores as f64 / self.state.core_count.max(1) as f64;
        let base = Duration::from_micros(50).max(Duration::from_nanos((op.data_size * 10).max(1)));
        let outcome = pipeline::run(base, op, &mut self.state, &self.complexity, tick, utilization);
        let (_, factors) = self.core.composite_performance_factor(outcome.duration, utilization);

        let detail = EngineDetail::Cpu {
            cache_hit_ratio: outcome.cache_hit_ratio,
            vectorization_ratio: self.state.simd_bonus,
            thermal_throttling: outcome.thermal_throttling,
            core_utilization: utilization,
            memory_contention: outcome.memory_contention,
        };
        let total_factor = factors.load_factor
            * factors.queue_factor
            * outcome.thermal_throttling
            * outcome.memory_contention
            * factors.health_factor;
        let scaled = outcome.duration.mul_f64(total_factor.max(f64::MIN_POSITIVE));
        let penalty = PenaltyInformation::new(
            EngineKind::Cpu,
            self.core.id(),
            outcome.duration,
            scaled,
            factors.load_factor,
            factors.queue_factor,
            outcome.thermal_throttling,
            outcome.memory_contention,
            factors.health_factor,
            total_factor,
            detail,
            GradingBands::CPU_MEMORY,
        );

        OperationResult {
            operation_id: op.id.clone(),
            operation_type: op.op_type.clone(),
            processing_time: scaled,
            completion_tick,
            success: true,
            error: None,
            next_component: op.next_component.clone(),
            penalty: Some(penalty),
            metrics: Default::default(),
        }
    }

    /// Admit queued operations up to the profile-configured per-tick limit
    /// and the available core budget (FR §4.2).
    fn admit(&mut self, tick: u64) {
        let mut admitted = 0;
        while admitted < self.state.max_new_ops_per_tick {
            if self.busy_cores >= self.state.core_count {
                break;
            }
            let Some(queued) = self.core.dequeue_operation() else { break };
            let cores_needed = self.cores_for(&queued.operation);
            if self.busy_cores + cores_needed > self.state.core_count {
                self.core.requeue_front(queued);
                break;
            }
            self.busy_cores += cores_needed;
            admitted += 1;

            let mut result = self.build_result(&queued.operation, tick, tick);
            let ticks = self.core.duration_to_ticks(result.processing_time);
            let completion_tick = tick + ticks;
            result.completion_tick = completion_tick;
            let push_seq = self.core.next_push_seq();
            trace!(op_id = %queued.operation.id, completion_tick, "cpu op admitted");
            self.in_flight.push(Reverse(InFlightOp { completion_tick, push_seq, cores: cores_needed, result }));
        }
    }

    fn drain_completed(&mut self, tick: u64) -> Vec<OperationResult> {
        let mut out = Vec::new();
        while let Some(Reverse(top)) = self.in_flight.peek() {
            if top.completion_tick > tick {
                break;
            }
            let Reverse(item) = self.in_flight.pop().unwrap();
            self.busy_cores = self.busy_cores.saturating_sub(item.cores);
            self.core.record_completion(item.result.processing_time, item.result.success, tick);
            out.push(item.result);
        }
        out
    }
}

impl Engine for CpuEngine {
    fn process_operation(&mut self, op: Operation, tick: u64) -> OperationResult {
        let completion_tick = tick.max(op.start_tick + 1);
        let mut result = self.build_result(&op, tick, completion_tick);
        result.completion_tick = completion_tick;
        self.core.advance_tick(tick);
        self.core.record_completion(result.processing_time, result.success, tick);
        result
    }

    fn process_tick(&mut self, tick: u64) -> Vec<OperationResult> {
        self.core.advance_tick(tick);
        self.core.record_load_sample(self.busy_cores as f64 / self.state.core_count.max(1) as f64);
        self.admit(tick);
        let results = self.drain_completed(tick);
        if !results.is_empty() {
            debug!(tick, completed = results.len(), "cpu tick completed operations");
        }
        results
    }

    fn queue_operation(&self, op: Operation) -> EngineResult<()> {
        self.core.queue_operation(op)
    }

    fn queue_length(&self) -> usize {
        self.core.queue_len()
    }

    fn queue_capacity(&self) -> usize {
        self.core.queue_capacity()
    }

    fn engine_type(&self) -> EngineKind {
        EngineKind::Cpu
    }

    fn engine_id(&self) -> EngineId {
        self.core.id()
    }

    fn set_tick_duration(&mut self, duration: Duration) {
        self.core.set_tick_duration(duration);
    }

    fn get_tick_duration(&self) -> Duration {
        self.core.tick_duration()
    }

    fn load_profile(&mut self, profile: Option<EngineProfile>) -> EngineResult<()> {
        let profile_clone = profile.clone();
        self.core.ingest_profile(profile)?;
        if let Some(p) = profile_clone {
            self.state.apply_profile(&p);
        }
        Ok(())
    }

    fn get_profile(&self) -> Option<&EngineProfile> {
        self.core.profile()
    }

    fn set_complexity_level(&mut self, raw_level: u8) -> EngineResult<()> {
        self.complexity.set_level_from_u8(raw_level)
    }

    fn get_complexity_level(&self) -> u8 {
        self.complexity.level().as_u8()
    }

    fn get_health(&self) -> HealthMetrics {
        self.core.health()
    }

    fn update_health(&mut self, tick: u64) {
        self.core.update_health(tick);
    }

    fn get_dynamic_state(&self) -> serde_json::Value {
        let health = self.core.health();
        let (_, factors) = self.core.composite_performance_factor(Duration::from_millis(1), health.utilization);
        let dynamic = DynamicState {
            current_utilization: health.utilization,
            composite_performance_factor: factors.product(),
            convergence_progress: self.core.convergence_metrics().overall_progress,
            engine_specific: [
                ("busy_cores".to_string(), json!(self.busy_cores)),
                ("core_count".to_string(), json!(self.state.core_count)),
                ("die_temp_c".to_string(), json!(self.state.die_temp_c)),
                ("in_flight".to_string(), json!(self.in_flight.len())),
            ]
            .into_iter()
            .collect(),
        };
        serde_json::to_value(dynamic).unwrap_or_else(|_| json!({}))
    }

    fn get_convergence_metrics(&self) -> simcore::types::ConvergenceMetrics {
        self.core.convergence_metrics()
    }

    fn reset(&mut self) {
        self.core.reset();
        self.in_flight.clear();
        self.busy_cores = 0;
        self.state.die_temp_c = 40.0;
    }

    fn get_current_state(&self) -> serde_json::Value {
        let mut map = self.core.base_state_fields();
        map.insert("complexity_level".into(), json!(self.complexity.level().as_u8()));
        map.insert("core_count".into(), json!(self.state.core_count));
        map.insert("base_clock_ghz".into(), json!(self.state.base_clock_ghz));
        map.insert("boost_clock_ghz".into(), json!(self.state.boost_clock_ghz));
        map.insert("busy_cores".into(), json!(self.busy_cores));
        map.insert("die_temp_c".into(), json!(self.state.die_temp_c));
        map.insert("in_flight_count".into(), json!(self.in_flight.len()));
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simcore::types::Priority;

    #[test]
    fn process_operation_succeeds_and_completion_after_start() {
        let mut engine = CpuEngine::new(10);
        let op = Operation::new("op1", "cpu_compute", 1024, 0);
        let result = engine.process_operation(op, 1);
        assert!(result.success);
        assert!(result.completion_tick >= 1);
        assert!(result.penalty.unwrap().total_factor >= 1.0);
    }

    #[test]
    fn queue_full_at_capacity() {
        let engine = CpuEngine::new(2);
        engine.queue_operation(Operation::new("a", "cpu_compute", 1, 0)).unwrap();
        engine.queue_operation(Operation::new("b", "cpu_compute", 1, 0)).unwrap();
        assert!(engine.queue_operation(Operation::new("c", "cpu_compute", 1, 0)).is_err());
    }

    #[test]
    fn process_tick_admits_and_eventually_completes() {
        let mut engine = CpuEngine::new(10);
        engine.queue_operation(Operation::new("a", "cpu_compute", 1024, 0)).unwrap();
        let mut all = Vec::new();
        for tick in 1..=20 {
            all.extend(engine.process_tick(tick));
        }
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].operation_id, "a");
    }

    #[test]
    fn reset_clears_dynamic_state_preserves_config() {
        let mut engine = CpuEngine::new(10);
        engine.set_tick_duration(Duration::from_millis(5));
        engine.queue_operation(Operation::new("a", "cpu_compute", 1024, 0)).unwrap();
        for tick in 1..=5 {
            engine.process_tick(tick);
        }
        engine.reset();
        let state = engine.get_current_state();
        assert_eq!(state["operations_processed"], 0);
        assert_eq!(state["queue_length"], 0);
        assert_eq!(engine.get_tick_duration(), Duration::from_millis(5));
    }

    #[test]
    fn invalid_complexity_preserves_level() {
        let mut engine = CpuEngine::new(10);
        engine.set_complexity_level(1).unwrap();
        assert!(engine.set_complexity_level(10).is_err());
        assert_eq!(engine.get_complexity_level(), 1);
    }

    #[test]
    fn profile_mismatch_rejected() {
        let mut engine = CpuEngine::new(10);
        let profile = EngineProfile {
            name: "mem".into(),
            engine_kind: EngineKind::Memory,
            description: String::new(),
            version: "1".into(),
            baseline_performance: Default::default(),
            technology_specs: Default::default(),
            load_curves: Default::default(),
            engine_specific: Default::default(),
        };
        assert!(engine.load_profile(Some(profile)).is_err());
    }

    #[test]
    fn priority_is_recorded_but_does_not_reject() {
        let mut engine = CpuEngine::new(10);
        let op = Operation::new("low", "cpu_compute", 10, 0).with_priority(Priority::Low);
        let result = engine.process_operation(op, 1);
        assert!(result.success);
    }
}
