//! Node port management
//!
//! - `registry`: persisted, cluster-reconciled in-use set per range
//! - `allocator`: lowest-free-port allocation over both ranges

pub mod allocator;
pub mod registry;

pub use allocator::{AllocationError, PortAllocator};
pub use registry::PortRegistry;
