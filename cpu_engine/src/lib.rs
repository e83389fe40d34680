//! CPU engine: a core pool modeled with cache hierarchy, clock/thermal
//! behavior, NUMA, and parallel-processing speedup, gated by the shared
//! complexity interface (FR §4.2).

pub mod engine;
pub mod features;
pub mod pipeline;
pub mod state;

pub use engine::CpuEngine;
pub use features::CpuFeatures;

static_assertions::assert_impl_all!(CpuEngine: Send);
