//! The concrete memory engine (FR §4.3, §9).

use crate::access::{self, default_row_buffer_hit_rate};
use crate::features::MemoryFeatures;
use crate::pipeline;
use crate::state::MemoryState;
use serde_json::json;
use simcore::types::{
    ConvergenceMetrics, DynamicState, EngineDetail, EngineId, EngineKind, EngineProfile, GradingBands, HealthMetrics,
    Operation, OperationResult, PenaltyInformation, StatisticalModel,
};
use simcore::{CommonEngineCore, ComplexityState, Engine, EngineResult};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use tracing::{debug, trace};

const ROW_BUFFER_MIN_OPS: u64 = 50;
const ROW_BUFFER_BASE_VARIANCE: f64 = 0.02;

#[derive(Debug, Clone)]
struct InFlightOp {
    completion_tick: u64,
    push_seq: u64,
    channels: u32,
    ordering_address: u64,
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

pub struct MemoryEngine {
    core: CommonEngineCore,
    complexity: ComplexityState<MemoryFeatures>,
    state: MemoryState,
    in_flight: BinaryHeap<Reverse<InFlightOp>>,
    busy_channels: u32,
}

impl MemoryEngine {
    pub fn new(capacity: usize) -> Self {
        let mut core = CommonEngineCore::new(EngineKind::Memory, capacity);
        for pattern in [
            simcore::types::AccessPattern::Sequential,
            simcore::types::AccessPattern::Random,
            simcore::types::AccessPattern::Stride,
        ] {
            core.convergence_mut().register(StatisticalModel::new(
                access::model_name(pattern),
                default_row_buffer_hit_rate(pattern),
                ROW_BUFFER_BASE_VARIANCE,
                ROW_BUFFER_MIN_OPS,
            ));
        }
        Self {
            core,
            complexity: ComplexityState::default(),
            state: MemoryState::default(),
            in_flight: BinaryHeap::new(),
            busy_channels: 0,
        }
    }

    fn channels_for(&self, op: &Operation) -> u32 {
        if op.data_size > self.state.large_op_threshold_bytes {
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
        let raw = self.state.channel_count as u64 * avg_ticks * 2;
        raw.clamp(50, 5000) as usize
    }

    fn build_result(&mut self, op: &Operation, tick: u64, completion_tick: u64) -> OperationResult {
        let utilization = self.busy_channels as f64 / self.state.channel_count.max(1) as f64;
        let pattern = access::classify(op);
        let model_name = access::model_name(pattern);
        let row_buffer_hit_probability =
            self.core.convergence().models.get(model_name).map(|m| m.current_value).unwrap_or_else(|| default_row_buffer_hit_rate(pattern));

        let base_latency_ns = 50.0 * (self.state.normalization_baseline_mhz / self.state.frequency_mhz.max(1.0));
        let mut base = Duration::from_nanos(base_latency_ns.max(1.0) as u64);
        if op.data_size > 4096 {
            let bandwidth_bytes_per_sec = self.state.bandwidth_gbps * 1e9 / 8.0;
            base += Duration::from_secs_f64(op.data_size as f64 / bandwidth_bytes_per_sec.max(1.0));
        }

        let outcome = pipeline::run(base, op, &mut self.state, &self.complexity, tick, utilization, pattern, row_buffer_hit_probability);
        let (_, factors) = self.core.composite_performance_factor(outcome.duration, utilization);

        self.core.convergence_mut().observe(model_name, if outcome.row_buffer_hit { 1.0 } else { 0.0 }, op.data_size, tick);

        let detail = EngineDetail::Memory {
            bandwidth_utilization: utilization,
            numa_penalty: outcome.numa_penalty,
            row_buffer_hit_rate: row_buffer_hit_probability,
            memory_pressure: outcome.memory_pressure_factor,
            channel_contention: outcome.channel_contention,
        };
        let contention_factor = outcome.numa_penalty * outcome.channel_contention;
        let total_factor =
            factors.load_factor * factors.queue_factor * outcome.memory_pressure_factor * contention_factor * factors.health_factor;
        let scaled = outcome.duration.mul_f64(total_factor.max(f64::MIN_POSITIVE));
        let penalty = PenaltyInformation::new(
            EngineKind::Memory,
            self.core.id(),
            outcome.duration,
            scaled,
            factors.load_factor,
            factors.queue_factor,
            outcome.memory_pressure_factor,
            contention_factor,
            factors.health_factor,
            total_factor,
            detail,
            GradingBands::CPU_MEMORY,
        );

        let mut result = OperationResult {
            operation_id: op.id.clone(),
            operation_type: op.op_type.clone(),
            processing_time: scaled,
            completion_tick,
            success: !outcome.ecc_multi_bit,
            error: None,
            next_component: op.next_component.clone(),
            penalty: Some(penalty),
            metrics: Default::default(),
        };
        if outcome.ecc_multi_bit {
            result = result.with_metric("ecc_multi_bit", true);
        }
        if outcome.swap_fault {
            result = result.with_metric("swap_fault", true);
        }
        result
    }

    fn admit(&mut self, tick: u64) {
        let cap = self.heap_cap();
        while self.in_flight.len() < cap {
            if self.busy_channels >= self.state.channel_count {
                break;
            }
            let Some(queued) = self.core.dequeue_operation() else { break };
            let channels = self.channels_for(&queued.operation);
            if self.busy_channels + channels > self.state.channel_count {
                self.core.requeue_front(queued);
                break;
            }
            self.busy_channels += channels;
            let ordering_address = pipeline::ordering_address(&queued.operation);
            let mut result = self.build_result(&queued.operation, tick, tick);
            let ticks = self.core.duration_to_ticks(result.processing_time);
            let completion_tick = tick + ticks;
            result.completion_tick = completion_tick;
            let push_seq = self.core.next_push_seq();
            *self.state.pending_addresses.entry(ordering_address).or_insert(0) += 1;
            trace!(op_id = %queued.operation.id, completion_tick, "memory op admitted");
            self.in_flight.push(Reverse(InFlightOp { completion_tick, push_seq, channels, ordering_address, result }));
        }
    }

    fn drain_completed(&mut self, tick: u64) -> Vec<OperationResult> {
        let mut out = Vec::new();
        while let Some(Reverse(top)) = self.in_flight.peek() {
            if top.completion_tick > tick {
                break;
            }
            let Reverse(item) = self.in_flight.pop().unwrap();
            self.busy_channels = self.busy_channels.saturating_sub(item.channels);
            if let Some(count) = self.state.pending_addresses.get_mut(&item.ordering_address) {
                *count -= 1;
                if *count == 0 {
                    self.state.pending_addresses.remove(&item.ordering_address);
                }
            }
            self.core.record_completion(item.result.processing_time, item.result.success, tick);
            out.push(item.result);
        }
        out
    }
}

impl Engine for MemoryEngine {
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
        self.core.record_load_sample(self.busy_channels as f64 / self.state.channel_count.max(1) as f64);
        self.admit(tick);
        let results = self.drain_completed(tick);
        if !results.is_empty() {
            debug!(tick, completed = results.len(), "memory tick completed operations");
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
        EngineKind::Memory
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
                ("busy_channels".to_string(), json!(self.busy_channels)),
                ("channel_count".to_string(), json!(self.state.channel_count)),
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
        self.busy_channels = 0;
        self.state.recent_lines.clear();
    }

    fn get_current_state(&self) -> serde_json::Value {
        let mut map = self.core.base_state_fields();
        map.insert("complexity_level".into(), json!(self.complexity.level().as_u8()));
        map.insert("capacity_gb".into(), json!(self.state.capacity_gb));
        map.insert("bandwidth_gbps".into(), json!(self.state.bandwidth_gbps));
        map.insert("frequency_mhz".into(), json!(self.state.frequency_mhz));
        map.insert("busy_channels".into(), json!(self.busy_channels));
        map.insert("bandwidth_utilization".into(), json!(self.busy_channels as f64 / self.state.channel_count.max(1) as f64));
        map.insert("in_flight_count".into(), json!(self.in_flight.len()));
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddr4_profile_processes_five_ops_then_reset_clears_counter() {
        let mut engine = MemoryEngine::new(100);
        let profile = EngineProfile {
            name: "ddr4_3200_dual_channel".into(),
            engine_kind: EngineKind::Memory,
            description: String::new(),
            version: "1".into(),
            baseline_performance: [("capacity_gb".to_string(), 32.0), ("bandwidth_gbps".to_string(), 25.6), ("frequency_mhz".to_string(), 3200.0)]
                .into_iter()
                .collect(),
            technology_specs: Default::default(),
            load_curves: Default::default(),
            engine_specific: Default::default(),
        };
        engine.load_profile(Some(profile)).unwrap();
        assert_eq!(engine.get_profile().unwrap().name, "ddr4_3200_dual_channel");

        for tick in 1..=5u64 {
            let op = Operation::new(format!("read{tick}"), "memory_read", 4096, tick);
            engine.queue_operation(op).unwrap();
        }
        let mut all = Vec::new();
        for tick in 1..=20u64 {
            all.extend(engine.process_tick(tick));
        }
        assert_eq!(all.len(), 5);
        let state = engine.get_current_state();
        assert_eq!(state["operations_processed"], 5);

        engine.reset();
        let state = engine.get_current_state();
        assert_eq!(state["operations_processed"], 0);
        assert_eq!(state["bandwidth_utilization"], 0.0);
        assert_eq!(engine.get_profile().unwrap().name, "ddr4_3200_dual_channel");
    }

    #[test]
    fn reset_clears_bandwidth_and_connection_style_counters() {
        let mut engine = MemoryEngine::new(50);
        for tick in 1..=5u64 {
            engine.queue_operation(Operation::new(format!("op{tick}"), "memory_write", 8192, tick)).unwrap();
        }
        for tick in 1..=10u64 {
            engine.process_tick(tick);
        }
        assert!(engine.get_health().utilization >= 0.0);
        engine.reset();
        let state = engine.get_dynamic_state();
        assert_eq!(state["engine_specific"]["busy_channels"], 0);
    }

    #[test]
    fn profile_mismatch_rejected() {
        let mut engine = MemoryEngine::new(10);
        let profile = EngineProfile {
            name: "net".into(),
            engine_kind: EngineKind::Network,
            description: String::new(),
            version: "1".into(),
            baseline_performance: Default::default(),
            technology_specs: Default::default(),
            load_curves: Default::default(),
            engine_specific: Default::default(),
        };
        assert!(engine.load_profile(Some(profile)).is_err());
    }
}
