//! Statistical convergence machinery (FR §3 "StatisticalModel",
//! "ConvergenceState", §4.1 "Convergence bookkeeping").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single statistical model tracked toward a target convergence point
/// (e.g. "row buffer hit rate should settle near 0.85 for sequential
/// access").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalModel {
    pub name: String,
    pub convergence_point: f64,
    pub base_variance: f64,
    pub minimum_operations: u64,
    pub current_value: f64,
    pub converged: bool,
    ops_observed: u64,
}

impl StatisticalModel {
    pub fn new(name: impl Into<String>, convergence_point: f64, base_variance: f64, minimum_operations: u64) -> Self {
        Self {
            name: name.into(),
            convergence_point,
            base_variance,
            minimum_operations,
            current_value: convergence_point,
            converged: false,
            ops_observed: 0,
        }
    }

    /// Fold in one more observed sample (incremental mean) and re-check
    /// convergence: `|current - point| < 0.01` once `ops_observed` exceeds
    /// `minimum_operations` (FR §4.1).
    pub fn observe(&mut self, value: f64) {
        self.ops_observed += 1;
        let n = self.ops_observed as f64;
        self.current_value += (value - self.current_value) / n;
        if self.ops_observed >= self.minimum_operations && (self.current_value - self.convergence_point).abs() < 0.01 {
            self.converged = true;
        }
    }

    /// Progress toward convergence in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        if self.converged {
            return 1.0;
        }
        if self.minimum_operations == 0 {
            return 1.0;
        }
        (self.ops_observed as f64 / self.minimum_operations as f64).min(1.0)
    }
}

/// Aggregated convergence bookkeeping for one engine (FR §3
/// "ConvergenceState").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvergenceState {
    pub models: BTreeMap<String, StatisticalModel>,
    pub cumulative_operations: u64,
    pub cumulative_data_processed: u64,
    pub start_tick: u64,
    /// `-1` until every registered model has converged.
    pub converged_tick: i64,
}

impl ConvergenceState {
    pub fn new(start_tick: u64) -> Self {
        Self {
            models: BTreeMap::new(),
            cumulative_operations: 0,
            cumulative_data_processed: 0,
            start_tick,
            converged_tick: -1,
        }
    }

    pub fn register(&mut self, model: StatisticalModel) {
        self.models.insert(model.name.clone(), model);
    }

    /// Record one operation's contribution to a named model, and update the
    /// engine-wide cumulative counters. Marks `converged_tick` the first
    /// time every registered model has converged.
    pub fn observe(&mut self, model_name: &str, value: f64, data_size: u64, tick: u64) {
        self.cumulative_operations += 1;
        self.cumulative_data_processed += data_size;
        if let Some(model) = self.models.get_mut(model_name) {
            model.observe(value);
        }
        if self.converged_tick < 0 && !self.models.is_empty() && self.models.values().all(|m| m.converged) {
            self.converged_tick = tick as i64;
        }
    }

    pub fn all_converged(&self) -> bool {
        !self.models.is_empty() && self.models.values().all(|m| m.converged)
    }

    /// Overall convergence progress in `[0.0, 1.0]`, averaged across models.
    pub fn progress(&self) -> f64 {
        if self.models.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.models.values().map(StatisticalModel::progress).sum();
        sum / self.models.len() as f64
    }

    pub fn reset(&mut self, start_tick: u64) {
        for model in self.models.values_mut() {
            model.current_value = model.convergence_point;
            model.converged = false;
            model.ops_observed = 0;
        }
        self.cumulative_operations = 0;
        self.cumulative_data_processed = 0;
        self.start_tick = start_tick;
        self.converged_tick = -1;
    }
}

/// Aggregated view returned by `get_convergence_metrics` (FR §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceMetrics {
    pub models: BTreeMap<String, StatisticalModel>,
    pub cumulative_operations: u64,
    pub cumulative_data_processed: u64,
    pub start_tick: u64,
    pub converged_tick: i64,
    pub overall_progress: f64,
}

impl From<&ConvergenceState> for ConvergenceMetrics {
    fn from(state: &ConvergenceState) -> Self {
        Self {
            models: state.models.clone(),
            cumulative_operations: state.cumulative_operations,
            cumulative_data_processed: state.cumulative_data_processed,
            start_tick: state.start_tick,
            converged_tick: state.converged_tick,
            overall_progress: state.progress(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_after_minimum_ops_near_point() {
        let mut model = StatisticalModel::new("row_buffer_hit", 0.85, 0.02, 10);
        for _ in 0..20 {
            model.observe(0.85);
        }
        assert!(model.converged);
    }

    #[test]
    fn does_not_converge_before_minimum_ops() {
        let mut model = StatisticalModel::new("row_buffer_hit", 0.85, 0.02, 100);
        for _ in 0..5 {
            model.observe(0.85);
        }
        assert!(!model.converged);
    }

    #[test]
    fn state_marks_converged_tick_once() {
        let mut state = ConvergenceState::new(0);
        state.register(StatisticalModel::new("m1", 1.0, 0.01, 2));
        state.observe("m1", 1.0, 10, 1);
        assert_eq!(state.converged_tick, -1);
        state.observe("m1", 1.0, 10, 2);
        assert_eq!(state.converged_tick, 2);
        state.observe("m1", 1.0, 10, 3);
        assert_eq!(state.converged_tick, 2, "must not move once set");
    }
}
