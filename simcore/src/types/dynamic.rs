//! Dynamic state snapshot (FR §3 "DynamicState").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicState {
    pub current_utilization: f64,
    pub composite_performance_factor: f64,
    /// `[0.0, 1.0]`; see [`crate::types::convergence::ConvergenceState`].
    pub convergence_progress: f64,
    #[serde(default)]
    pub engine_specific: BTreeMap<String, serde_json::Value>,
}

impl Default for DynamicState {
    fn default() -> Self {
        Self {
            current_utilization: 0.0,
            composite_performance_factor: 1.0,
            convergence_progress: 0.0,
            engine_specific: BTreeMap::new(),
        }
    }
}
