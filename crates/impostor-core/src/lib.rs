//! Impostor Core
//!
//! Leaf utilities shared by the impostor crates: generational storage,
//! glam based math for culling, logging and profiling setup.

pub mod alloc;
pub mod logging;
pub mod math;
pub mod profiling;
