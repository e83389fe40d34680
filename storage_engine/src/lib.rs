//! Storage engine: IOPS/queue-depth admission, access-pattern optimization,
//! controller caching, HDD/SSD physical effects, and thermal modeling,
//! gated by the shared complexity interface (FR §4.4).

pub mod access;
pub mod engine;
pub mod features;
pub mod pipeline;
pub mod state;

pub use engine::StorageEngine;
pub use features::StorageFeatures;

static_assertions::assert_impl_all!(StorageEngine: Send);
