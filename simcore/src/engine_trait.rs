//! The external interface every engine implements (component 5, FR §6).
//!
//! This is the contract a caller programs against; a thin dispatch wrapper
//! that type-erases over the four concrete engines is a documented
//! capability of this crate, not something implemented here — callers that
//! need dynamic dispatch hold `Box<dyn Engine>` directly.

use crate::error::EngineResult;
use crate::types::{ConvergenceMetrics, EngineId, EngineKind, EngineProfile, HealthMetrics, Operation, OperationResult};
use std::time::Duration;

/// Capability surface shared by the CPU, memory, storage, and network
/// engines (FR §6).
pub trait Engine: Send {
    /// Run one operation to completion immediately, bypassing the queue and
    /// in-flight tracking. Used for synchronous single-shot callers and
    /// tests; `process_tick` is the normal driving path.
    fn process_operation(&mut self, op: Operation, tick: u64) -> OperationResult;

    /// Advance the engine by one tick: admit queued operations up to this
    /// engine's per-tick admission rule, progress in-flight operations, and
    /// return results for everything that completed this tick.
    fn process_tick(&mut self, tick: u64) -> Vec<OperationResult>;

    /// Enqueue an operation for later processing by `process_tick`. Fails
    /// with [`crate::error::EngineError::QueueFull`] at capacity.
    fn queue_operation(&self, op: Operation) -> EngineResult<()>;

    fn queue_length(&self) -> usize;

    fn queue_capacity(&self) -> usize;

    fn engine_type(&self) -> EngineKind;

    fn engine_id(&self) -> EngineId;

    fn set_tick_duration(&mut self, duration: Duration);

    fn get_tick_duration(&self) -> Duration;

    /// Ingest a profile. Fails with `NilProfile` if `None`, or
    /// `ProfileMismatch` if the profile's `EngineKind` disagrees with this
    /// engine's own.
    fn load_profile(&mut self, profile: Option<EngineProfile>) -> EngineResult<()>;

    fn get_profile(&self) -> Option<&EngineProfile>;

    /// Set the fidelity dial, `0..=3`. Fails with `InvalidComplexity` and
    /// leaves the previous level untouched otherwise.
    fn set_complexity_level(&mut self, raw_level: u8) -> EngineResult<()>;

    fn get_complexity_level(&self) -> u8;

    fn get_health(&self) -> HealthMetrics;

    /// Recompute health from current state; normally called internally by
    /// `process_tick`, exposed for callers driving the engine manually.
    fn update_health(&mut self, tick: u64);

    /// Serialized [`crate::types::DynamicState`] snapshot: current
    /// utilization, composite performance factor, convergence progress, and
    /// whatever dynamic, engine-specific sub-state this engine tracks
    /// (cache occupancy, connection pool, spin state, ...) folded into
    /// `engine_specific`.
    fn get_dynamic_state(&self) -> serde_json::Value;

    fn get_convergence_metrics(&self) -> ConvergenceMetrics;

    /// Clear the queue, in-flight set, history, cumulative counters, and
    /// dynamic sub-state while preserving configuration and the loaded
    /// profile (FR §3 "Reset").
    fn reset(&mut self);

    /// Free-form snapshot map consumed by dashboards/tests: at least engine
    /// kind, id, complexity level, key configuration, dynamic counters,
    /// queue length/capacity, health fields, convergence progress,
    /// operations processed, and current tick (FR §6).
    fn get_current_state(&self) -> serde_json::Value;
}
