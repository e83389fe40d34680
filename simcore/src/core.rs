//! The common engine core: shared state every engine embeds via composition
//! (FR §4.1, §9 "prefer composition over inheritance").

use crate::error::{EngineError, EngineResult};
use crate::types::{
    ConvergenceMetrics, ConvergenceState, EngineId, EngineKind, EngineProfile, HealthMetrics, LoadCurvePoints,
    Operation, QueuedOperation,
};
use heapless::HistoryBuffer;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::time::Duration;

/// Bounded-history capacity (FR §4.1 "History windows": last 1,000 samples).
/// Rounded up slightly so the 1,000-sample guarantee holds with headroom.
pub const HISTORY_CAPACITY: usize = 1024;

/// Default tick duration (FR §6 "Tick semantics").
pub const DEFAULT_TICK_DURATION: Duration = Duration::from_millis(1);

/// Profile-driven parameters of the variance factor (FR §4.1 item 4).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarianceCurve {
    pub base_variance: f64,
    pub load_multiplier: f64,
    pub scale_reduction: f64,
}

impl Default for VarianceCurve {
    fn default() -> Self {
        Self { base_variance: 0.1, load_multiplier: 0.5, scale_reduction: 0.1 }
    }
}

/// The four composite-performance-factor components plus the product,
/// returned alongside the scaled duration so callers can populate
/// `PenaltyInformation` without recomputing anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeFactors {
    pub load_factor: f64,
    pub queue_factor: f64,
    pub health_factor: f64,
    pub variance_factor: f64,
}

impl CompositeFactors {
    pub fn product(&self) -> f64 {
        self.load_factor * self.queue_factor * self.health_factor * self.variance_factor
    }
}

/// Shared state and logic embedded (by composition, never inheritance) in
/// every engine implementation (FR §4.1).
pub struct CommonEngineCore {
    id: EngineId,
    kind: EngineKind,
    tick_duration: Duration,
    capacity: usize,
    queue: Mutex<VecDeque<QueuedOperation>>,
    profile: Option<EngineProfile>,
    load_curve: LoadCurvePoints,
    variance_curve: VarianceCurve,
    health: HealthMetrics,
    convergence: ConvergenceState,
    op_duration_history_ms: HistoryBuffer<f64, HISTORY_CAPACITY>,
    load_history: HistoryBuffer<f64, HISTORY_CAPACITY>,
    current_tick: u64,
    start_tick: u64,
    completed_ops: u64,
    failed_ops: u64,
    push_seq: u64,
}

impl CommonEngineCore {
    pub fn new(kind: EngineKind, capacity: usize) -> Self {
        Self {
            id: EngineId::next(),
            kind,
            tick_duration: DEFAULT_TICK_DURATION,
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            profile: None,
            load_curve: LoadCurvePoints::default(),
            variance_curve: VarianceCurve::default(),
            health: HealthMetrics::default(),
            convergence: ConvergenceState::new(0),
            op_duration_history_ms: HistoryBuffer::new(),
            load_history: HistoryBuffer::new(),
            current_tick: 0,
            start_tick: 0,
            completed_ops: 0,
            failed_ops: 0,
            push_seq: 0,
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    // ── Queue management (FR §4.1, §5) ──────────────────────────────

    /// Enqueue an operation. Fails with `QueueFull` when `length ==
    /// capacity` (FR §4.1, §7).
    pub fn queue_operation(&self, op: Operation) -> EngineResult<()> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            return Err(EngineError::QueueFull);
        }
        let enqueued_tick = self.current_tick;
        queue.push_back(QueuedOperation { operation: op, enqueued_tick });
        Ok(())
    }

    pub fn dequeue_operation(&self) -> Option<QueuedOperation> {
        self.queue.lock().pop_front()
    }

    /// Put a dequeued operation back at the front of the queue. Used by a
    /// per-tick admission loop that dequeued an operation to check it
    /// against an admission limit (core/IOPS/bandwidth budget) and found it
    /// didn't fit this tick.
    pub fn requeue_front(&self, op: QueuedOperation) {
        self.queue.lock().push_front(op);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.capacity
    }

    // ── Tick / duration conversion (FR §4.1) ────────────────────────

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn set_tick_duration(&mut self, duration: Duration) {
        self.tick_duration = duration;
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Advance the engine's owned tick counter. Never moves backward (FR §3
    /// invariant vi); callers must supply non-decreasing ticks (FR §6).
    pub fn advance_tick(&mut self, tick: u64) {
        if tick > self.current_tick {
            self.current_tick = tick;
        }
    }

    /// Ceiling-divide a duration by the tick duration, clamped to a minimum
    /// of 1 tick (FR §4.1).
    pub fn duration_to_ticks(&self, duration: Duration) -> u64 {
        let tick_nanos = self.tick_duration.as_nanos().max(1);
        let dur_nanos = duration.as_nanos();
        let ticks = dur_nanos.div_ceil(tick_nanos);
        ticks.max(1) as u64
    }

    pub fn next_push_seq(&mut self) -> u64 {
        let seq = self.push_seq;
        self.push_seq += 1;
        seq
    }

    // ── Profile ingestion (shared fields only, FR §4.1) ─────────────

    /// Verify the profile's engine kind matches, store it, and populate the
    /// load-degradation curve from `load_curves.default` if present.
    /// Engine-specific fields are the caller's responsibility to ingest.
    pub fn ingest_profile(&mut self, profile: Option<EngineProfile>) -> EngineResult<()> {
        let profile = profile.ok_or(EngineError::NilProfile)?;
        if profile.engine_kind != self.kind {
            return Err(EngineError::ProfileMismatch);
        }
        if let Some(curve) = profile.load_curves.get("default") {
            self.load_curve = *curve;
        }
        if let Some(v) = profile.baseline("base_variance") {
            self.variance_curve.base_variance = v;
        }
        if let Some(v) = profile.baseline("variance_load_multiplier") {
            self.variance_curve.load_multiplier = v;
        }
        if let Some(v) = profile.baseline("variance_scale_reduction") {
            self.variance_curve.scale_reduction = v;
        }
        self.profile = Some(profile);
        Ok(())
    }

    pub fn profile(&self) -> Option<&EngineProfile> {
        self.profile.as_ref()
    }

    // ── Composite performance factor (FR §4.1 item) ─────────────────

    /// Piecewise load-degradation factor (FR §4.1 item 1).
    pub fn load_degradation_factor(&self, utilization: f64) -> f64 {
        let c = self.load_curve;
        let u = utilization.max(0.0);
        if u <= c.optimal_threshold {
            c.optimal_factor
        } else if u <= c.warning_threshold {
            lerp(u, c.optimal_threshold, c.warning_threshold, c.optimal_factor, c.warning_factor)
        } else if u <= c.critical_threshold {
            lerp(u, c.warning_threshold, c.critical_threshold, c.warning_factor, c.critical_factor)
        } else {
            let excess = u - c.critical_threshold;
            c.critical_factor * (1.0 + 10.0 * excess)
        }
    }

    /// Piecewise queue-penalty factor (FR §4.1 item 2). Utilization here is
    /// queue utilization (`len / capacity`), independent of the load curve.
    pub fn queue_penalty_factor(utilization: f64) -> f64 {
        let u = utilization.max(0.0);
        if u < 0.5 {
            1.0
        } else if u < 0.8 {
            1.0 + (u - 0.5) * 0.4
        } else {
            1.12 + (u - 0.8) * 2.0
        }
    }

    /// Piecewise health-penalty factor (FR §4.1 item 3).
    pub fn health_penalty_factor(&self) -> f64 {
        let s = self.health.score;
        if s >= 0.8 {
            1.0
        } else if s >= 0.5 {
            1.0 + (0.8 - s) * 0.5
        } else {
            1.15 + (0.5 - s) * 2.0
        }
    }

    /// Variance factor (FR §4.1 item 4). Deterministic: driven entirely by
    /// `utilization` and the number of operations processed so far, never
    /// by RNG.
    pub fn variance_factor(&self, utilization: f64) -> f64 {
        let v = self.variance_curve;
        let ops = self.completed_ops;
        let reduction = if ops > 100 {
            (v.scale_reduction * ((ops as f64) / 100.0).ln()).min(0.8).max(0.0)
        } else {
            0.0
        };
        1.0 + v.base_variance * (1.0 + utilization * v.load_multiplier) * (1.0 - reduction)
    }

    /// Compose all four factors and scale `base` by their product, per FR
    /// §4.1. Returns the scaled duration and the per-component breakdown for
    /// `PenaltyInformation`.
    pub fn composite_performance_factor(&self, base: Duration, utilization: f64) -> (Duration, CompositeFactors) {
        let factors = CompositeFactors {
            load_factor: self.load_degradation_factor(utilization),
            queue_factor: Self::queue_penalty_factor(self.queue_len() as f64 / self.capacity.max(1) as f64),
            health_factor: self.health_penalty_factor(),
            variance_factor: self.variance_factor(utilization),
        };
        let scaled = base.mul_f64(factors.product().max(f64::MIN_POSITIVE));
        (scaled, factors)
    }

    // ── History & health (FR §4.1) ───────────────────────────────────

    pub fn record_load_sample(&mut self, utilization: f64) {
        self.load_history.write(utilization);
    }

    /// Record one completed operation's outcome: folds the duration into
    /// the bounded history, updates completion/failure counters, and
    /// recomputes health.
    pub fn record_completion(&mut self, processing_time: Duration, success: bool, tick: u64) {
        self.op_duration_history_ms.write(processing_time.as_secs_f64() * 1000.0);
        self.completed_ops += 1;
        if !success {
            self.failed_ops += 1;
        }
        self.update_health(tick);
    }

    /// Recompute `HealthMetrics` from current queue state and history (FR
    /// §4.1 "Health update").
    pub fn update_health(&mut self, tick: u64) {
        let queue_utilization = self.queue_len() as f64 / self.capacity.max(1) as f64;
        let error_rate = if self.completed_ops > 0 {
            self.failed_ops as f64 / self.completed_ops as f64
        } else {
            0.0
        };
        let average_latency_ms = if self.op_duration_history_ms.is_empty() {
            0.0
        } else {
            self.op_duration_history_ms.oldest_ordered().sum::<f64>() / self.op_duration_history_ms.len() as f64
        };
        let elapsed_ticks = tick.saturating_sub(self.start_tick).max(1);
        let elapsed_secs = (elapsed_ticks as f64) * self.tick_duration.as_secs_f64();
        let throughput_ops_per_sec = if elapsed_secs > 0.0 {
            self.completed_ops as f64 / elapsed_secs
        } else {
            0.0
        };
        let utilization = self.load_history.recent().copied().unwrap_or(0.0);

        let mut score = 1.0_f64;
        score -= (utilization - 0.8).max(0.0) * 0.5;
        score -= (queue_utilization - 0.7).max(0.0) * 0.3;
        score -= error_rate * 0.5;
        if average_latency_ms > 10.0 {
            score -= ((average_latency_ms - 10.0) / 100.0).min(0.3);
        }

        self.health = HealthMetrics {
            score: score.clamp(0.0, 1.0),
            utilization,
            queue_utilization,
            error_rate,
            average_latency_ms,
            throughput_ops_per_sec,
            last_updated_tick: tick,
        };
    }

    pub fn health(&self) -> HealthMetrics {
        self.health
    }

    // ── Convergence (FR §4.1) ────────────────────────────────────────

    pub fn convergence_mut(&mut self) -> &mut ConvergenceState {
        &mut self.convergence
    }

    pub fn convergence(&self) -> &ConvergenceState {
        &self.convergence
    }

    pub fn convergence_metrics(&self) -> ConvergenceMetrics {
        ConvergenceMetrics::from(&self.convergence)
    }

    pub fn completed_ops(&self) -> u64 {
        self.completed_ops
    }

    pub fn failed_ops(&self) -> u64 {
        self.failed_ops
    }

    // ── Lifecycle (FR §3 "Reset") ────────────────────────────────────

    /// Clear the queue, history, cumulative counters, and convergence/
    /// dynamic substate, while preserving configuration (capacity, tick
    /// duration) and the loaded profile. `current_tick` is itself
    /// configuration-adjacent state owned by the tick loop and is *not*
    /// rewound, preserving invariant (vi)'s monotonicity across a reset.
    pub fn reset(&mut self) {
        self.queue.lock().clear();
        self.op_duration_history_ms = HistoryBuffer::new();
        self.load_history = HistoryBuffer::new();
        self.completed_ops = 0;
        self.failed_ops = 0;
        self.health = HealthMetrics::default();
        self.start_tick = self.current_tick;
        self.convergence.reset(self.current_tick);
    }

    // ── State snapshot (FR §6 "get_current_state") ──────────────────

    /// Base fields common to every engine's `get_current_state` map;
    /// engine crates extend this with their own fields (FR §3, §6).
    pub fn base_state_fields(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("engine_kind".into(), Value::String(self.kind.label().to_string()));
        map.insert("engine_id".into(), Value::Number(self.id.0.into()));
        map.insert("current_tick".into(), Value::Number(self.current_tick.into()));
        map.insert("queue_length".into(), Value::Number(self.queue_len().into()));
        map.insert("queue_capacity".into(), Value::Number(self.capacity.into()));
        map.insert("operations_processed".into(), Value::Number(self.completed_ops.into()));
        map.insert("operations_failed".into(), Value::Number(self.failed_ops.into()));
        map.insert("health_score".into(), f64_value(self.health.score));
        map.insert("health_utilization".into(), f64_value(self.health.utilization));
        map.insert("error_rate".into(), f64_value(self.health.error_rate));
        map.insert("convergence_progress".into(), f64_value(self.convergence.progress()));
        map
    }
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn f64_value(v: f64) -> Value {
    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operation;

    #[test]
    fn queue_full_on_capacity() {
        let core = CommonEngineCore::new(EngineKind::Cpu, 5);
        for i in 0..5 {
            core.queue_operation(Operation::new(format!("op{i}"), "cpu_compute", 1024, 0)).unwrap();
        }
        assert_eq!(core.queue_operation(Operation::new("op5", "cpu_compute", 1024, 0)), Err(EngineError::QueueFull));
    }

    #[test]
    fn dequeue_is_fifo() {
        let core = CommonEngineCore::new(EngineKind::Cpu, 5);
        core.queue_operation(Operation::new("a", "cpu_compute", 1, 0)).unwrap();
        core.queue_operation(Operation::new("b", "cpu_compute", 1, 0)).unwrap();
        assert_eq!(core.dequeue_operation().unwrap().operation.id, "a");
        assert_eq!(core.dequeue_operation().unwrap().operation.id, "b");
    }

    #[test]
    fn duration_to_ticks_ceiling_and_min_one() {
        let mut core = CommonEngineCore::new(EngineKind::Cpu, 5);
        core.set_tick_duration(Duration::from_millis(1));
        assert_eq!(core.duration_to_ticks(Duration::from_micros(1)), 1);
        assert_eq!(core.duration_to_ticks(Duration::from_millis(1)), 1);
        assert_eq!(core.duration_to_ticks(Duration::from_micros(1001)), 2);
        assert_eq!(core.duration_to_ticks(Duration::from_millis(10)), 10);
    }

    #[test]
    fn profile_mismatch_rejected() {
        use crate::types::EngineProfile;
        let mut core = CommonEngineCore::new(EngineKind::Cpu, 5);
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
        assert_eq!(core.ingest_profile(Some(profile)), Err(EngineError::ProfileMismatch));
    }

    #[test]
    fn nil_profile_rejected() {
        let mut core = CommonEngineCore::new(EngineKind::Cpu, 5);
        assert_eq!(core.ingest_profile(None), Err(EngineError::NilProfile));
    }

    #[test]
    fn load_degradation_continuous_at_boundaries() {
        let core = CommonEngineCore::new(EngineKind::Cpu, 5);
        let at_optimal = core.load_degradation_factor(0.6);
        let just_above = core.load_degradation_factor(0.6 + 1e-9);
        assert!((at_optimal - just_above).abs() < 1e-6);

        let at_warning = core.load_degradation_factor(0.8);
        let just_above_warning = core.load_degradation_factor(0.8 + 1e-9);
        assert!((at_warning - just_above_warning).abs() < 1e-6);
    }

    #[test]
    fn queue_penalty_continuous_at_boundaries() {
        let a = CommonEngineCore::queue_penalty_factor(0.5 - 1e-9);
        let b = CommonEngineCore::queue_penalty_factor(0.5);
        assert!((a - b).abs() < 1e-6);
        let c = CommonEngineCore::queue_penalty_factor(0.8 - 1e-9);
        let d = CommonEngineCore::queue_penalty_factor(0.8);
        assert!((c - d).abs() < 1e-6);
    }

    #[test]
    fn composite_factor_positive_and_finite() {
        let core = CommonEngineCore::new(EngineKind::Cpu, 10);
        let (scaled, factors) = core.composite_performance_factor(Duration::from_millis(5), 0.5);
        assert!(scaled.as_secs_f64() > 0.0);
        assert!(factors.product().is_finite());
        assert!(factors.product() > 0.0);
    }

    #[test]
    fn reset_clears_counters_preserves_config() {
        let mut core = CommonEngineCore::new(EngineKind::Cpu, 10);
        core.set_tick_duration(Duration::from_millis(2));
        core.queue_operation(Operation::new("a", "cpu_compute", 1, 0)).unwrap();
        core.record_completion(Duration::from_millis(1), true, 5);
        assert_eq!(core.completed_ops(), 1);
        core.reset();
        assert_eq!(core.completed_ops(), 0);
        assert_eq!(core.queue_len(), 0);
        assert_eq!(core.tick_duration(), Duration::from_millis(2));
    }
}
