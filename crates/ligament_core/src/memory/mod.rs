//! # Memory Management
//!
//! Budgeted scratch space and generational pools.
//!
//! ## Design Philosophy
//!
//! - Per-step scratch memory has a hard byte budget set at startup
//! - Pool handles carry a generation so stale handles fail lookups

mod arena;
mod pool;

pub use arena::ScratchArena;
pub use pool::{PoolAllocator, PoolHandle};
