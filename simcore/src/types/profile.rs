//! Engine profile descriptor (FR §3 "EngineProfile", §4.1 "Profile
//! ingestion", §6 "Profile file shape").
//!
//! Loading a profile *file* is an external collaborator's concern (§1); this
//! crate only consumes an already-parsed [`EngineProfile`] value.

use super::engine_kind::EngineKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One point on a load-degradation curve: a utilization threshold and the
/// performance-factor value to use at/below that threshold (FR §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadCurvePoints {
    pub optimal_threshold: f64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub optimal_factor: f64,
    pub warning_factor: f64,
    pub critical_factor: f64,
}

impl Default for LoadCurvePoints {
    fn default() -> Self {
        Self {
            optimal_threshold: 0.6,
            warning_threshold: 0.8,
            critical_threshold: 0.95,
            optimal_factor: 1.0,
            warning_factor: 2.0,
            critical_factor: 5.0,
        }
    }
}

/// A named profile for one engine (FR §3 "EngineProfile").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineProfile {
    pub name: String,
    pub engine_kind: EngineKind,
    pub description: String,
    pub version: String,
    /// e.g. `bandwidth_gbps`, `latency_ns`, `capacity_gb`.
    #[serde(default)]
    pub baseline_performance: BTreeMap<String, f64>,
    /// e.g. `protocol`, `memory_type`.
    #[serde(default)]
    pub technology_specs: BTreeMap<String, serde_json::Value>,
    /// Keyed by curve name; `"default"` feeds the common engine core.
    #[serde(default)]
    pub load_curves: BTreeMap<String, LoadCurvePoints>,
    /// Nested `category -> key -> value` (e.g. `ddr_timings.trcd`,
    /// `hardware_prefetch.sequential_accuracy`).
    #[serde(default)]
    pub engine_specific: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl EngineProfile {
    pub fn baseline(&self, key: &str) -> Option<f64> {
        self.baseline_performance.get(key).copied()
    }

    pub fn specific_f64(&self, category: &str, key: &str) -> Option<f64> {
        self.engine_specific.get(category)?.get(key)?.as_f64()
    }

    pub fn specific_str<'a>(&'a self, category: &str, key: &str) -> Option<&'a str> {
        self.engine_specific.get(category)?.get(key)?.as_str()
    }
}
