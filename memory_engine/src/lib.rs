//! Memory engine: DDR timing, NUMA, GC pauses, cache-line conflicts, TLB/
//! page-walk, ECC, and thermal modeling, gated by the shared complexity
//! interface (FR §4.3).

pub mod access;
pub mod engine;
pub mod features;
pub mod pipeline;
pub mod state;

pub use engine::MemoryEngine;
pub use features::MemoryFeatures;

static_assertions::assert_impl_all!(MemoryEngine: Send);
