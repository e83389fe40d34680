//! The concrete storage engine (FR §4.4, §9).

use crate::access;
use crate::features::StorageFeatures;
use crate::pipeline;
use crate::state::StorageState;
use serde_json::json;
use simcore::types::{
    ConvergenceMetrics, DynamicState, EngineDetail, EngineId, EngineKind, EngineProfile, GradingBands, HealthMetrics,
    Operation, OperationResult, PenaltyInformation,
};
use simcore::{CommonEngineCore, ComplexityState, Engine, EngineResult};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct InFlightOp {
    completion_tick: u64,
    push_seq: u64,
    iops: u32,
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

pub struct StorageEngine {
    core: CommonEngineCore,
    complexity: ComplexityState<StorageFeatures>,
    state: StorageState,
    in_flight: BinaryHeap<Reverse<InFlightOp>>,
    busy_iops: u32,
}

impl StorageEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            core: CommonEngineCore::new(EngineKind::Storage, capacity),
            complexity: ComplexityState::default(),
            state: StorageState::default(),
            in_flight: BinaryHeap::new(),
            busy_iops: 0,
        }
    }

    fn iops_for(&self, op: &Operation) -> u32 {
        if op.data_size > self.state.block_size_bytes * crate::state::LARGE_OP_BLOCK_THRESHOLD {
            2
        } else {
            1
        }
    }

    fn heap_cap(&self) -> usize {
        let avg_latency_ms = self.core.health().average_latency_ms;
        let avg_ticks = if avg_latency_ms > 0.0 {
            self.core.duration_to_ticks(Duration::from_secs_f64(avg_latency_ms / 1000.0))
        } else {
            1
        };
        let raw = self.state.max_concurrent_iops() as u64 * avg_ticks * 2;
        raw.clamp(50, 5000) as usize
    }

    fn build_result(&mut self, op: &Operation, tick: u64, completion_tick: u64) -> OperationResult {
        let utilization = self.busy_iops as f64 / self.state.max_concurrent_iops().max(1.0);
        let pattern = access::classify(op, self.state.block_size_bytes);

        let base_latency_us = if access::is_write(&op.op_type) { self.state.latency_write_us } else { self.state.latency_read_us };
        let mut base = Duration::from_secs_f64(base_latency_us / 1_000_000.0);
        if access::is_seek(&op.op_type) {
            base = base.mul_f64(2.0);
        }
        let blocks = op.data_size / self.state.block_size_bytes.max(1);
        if blocks > 1 {
            let bandwidth_bytes_per_sec = self.state.bandwidth_mbps * 1_000_000.0 / 8.0;
            base += Duration::from_secs_f64(op.data_size as f64 / bandwidth_bytes_per_sec.max(1.0));
        }

        let health_score = self.core.health().score;
        let outcome = pipeline::run(base, op, &mut self.state, &self.complexity, tick, utilization, pattern, health_score);
        let (_, factors) = self.core.composite_performance_factor(outcome.duration, utilization);

        let detail = EngineDetail::Storage {
            iops_utilization: utilization,
            queue_depth: self.state.queue_depth,
            access_pattern: pattern,
            thermal_throttling: outcome.thermal_throttling,
            power_state_impact: outcome.power_state_impact,
        };
        let total_factor =
            factors.load_factor * factors.queue_factor * outcome.thermal_throttling * outcome.contention_factor * factors.health_factor;
        let scaled = outcome.duration.mul_f64(total_factor.max(f64::MIN_POSITIVE));
        let penalty = PenaltyInformation::new(
            EngineKind::Storage,
            self.core.id(),
            outcome.duration,
            scaled,
            factors.load_factor,
            factors.queue_factor,
            outcome.thermal_throttling,
            outcome.contention_factor,
            factors.health_factor,
            total_factor,
            detail,
            GradingBands::STORAGE_NETWORK,
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

    fn admit(&mut self, tick: u64) {
        let cap = self.heap_cap();
        let mut admitted = 0u32;
        while self.in_flight.len() < cap && admitted < crate::state::MAX_NEW_OPS_PER_TICK {
            if self.busy_iops as f64 >= self.state.max_concurrent_iops() {
                break;
            }
            let Some(queued) = self.core.dequeue_operation() else { break };
            let iops = self.iops_for(&queued.operation);
            if self.busy_iops as f64 + iops as f64 > self.state.max_concurrent_iops() {
                self.core.requeue_front(queued);
                break;
            }
            self.busy_iops += iops;
            let mut result = self.build_result(&queued.operation, tick, tick);
            let ticks = self.core.duration_to_ticks(result.processing_time);
            let completion_tick = tick + ticks;
            result.completion_tick = completion_tick;
            let push_seq = self.core.next_push_seq();
            admitted += 1;
            trace!(op_id = %queued.operation.id, completion_tick, "storage op admitted");
            self.in_flight.push(Reverse(InFlightOp { completion_tick, push_seq, iops, result }));
        }
    }

    fn drain_completed(&mut self, tick: u64) -> Vec<OperationResult> {
        let mut out = Vec::new();
        while let Some(Reverse(top)) = self.in_flight.peek() {
            if top.completion_tick > tick {
                break;
            }
            let Reverse(item) = self.in_flight.pop().unwrap();
            self.busy_iops = self.busy_iops.saturating_sub(item.iops);
            self.core.record_completion(item.result.processing_time, item.result.success, tick);
            out.push(item.result);
        }
        out
    }
}

impl Engine for StorageEngine {
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
        self.core.record_load_sample(self.busy_iops as f64 / self.state.max_concurrent_iops().max(1.0));
        self.admit(tick);
        let results = self.drain_completed(tick);
        if !results.is_empty() {
            debug!(tick, completed = results.len(), "storage tick completed operations");
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
        EngineKind::Storage
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
                ("busy_iops".to_string(), json!(self.busy_iops)),
                ("max_concurrent_iops".to_string(), json!(self.state.max_concurrent_iops())),
                ("in_flight".to_string(), json!(self.in_flight.len())),
                ("heap_cap".to_string(), json!(self.heap_cap())),
            ]
            .into_iter()
            .collect(),
        };
        serde_json::to_value(dynamic).unwrap_or_else(|_| json!({}))
    }

    fn get_convergence_metrics(&self) -> ConvergenceMetrics {
        self.core.convergence_metrics()
    }

    fn reset(&mut self) {
        self.core.reset();
        self.in_flight.clear();
        self.busy_iops = 0;
        self.state.fragmentation_level = 0.0;
    }

    fn get_current_state(&self) -> serde_json::Value {
        let mut map = self.core.base_state_fields();
        map.insert("complexity_level".into(), json!(self.complexity.level().as_u8()));
        map.insert("bandwidth_mbps".into(), json!(self.state.bandwidth_mbps));
        map.insert("queue_depth".into(), json!(self.state.queue_depth));
        map.insert("busy_iops".into(), json!(self.busy_iops));
        map.insert("iops_utilization".into(), json!(self.busy_iops as f64 / self.state.max_concurrent_iops().max(1.0)));
        map.insert("in_flight_count".into(), json!(self.in_flight.len()));
        serde_json::Value::Object(map)
    }
}
