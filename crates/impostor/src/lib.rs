//! Dynamic billboard impostors.
//!
//! Far away or small objects are replaced by a camera-facing billboard showing
//! a snapshot of the object, re-rendered only when the camera moved enough to
//! make the snapshot visibly wrong. Snapshots live in a shared pool of render
//! targets that is recycled across objects.
//!
//! # Overview
//!
//! - [`ImpostorManager`] - Owns every impostor and drives the per-frame pass
//! - [`Impostor`] - Per-object LOD decision and staleness tracking
//! - [`ImpostorProxy`] - The billboard and its snapshot texture
//! - [`TextureCache`] - Shared pool of square render targets
//!
//! The host engine is reached only through
//! [`RenderHost`](impostor_test_utils::RenderHost). A wgpu backed host can use
//! [`create_wgpu_render_target`] to allocate targets.

pub mod camera;
pub mod config;
pub mod error;
pub mod impostor;
pub mod manager;
pub mod proxy;
pub mod target;
pub mod texture_cache;

pub use camera::Camera;
pub use config::{
    CachingPolicy, ImpostorSettings, LightKind, LodMethod, MainLight, ManagerConfig,
    floor_power_of_two,
};
pub use error::{ImpostorError, ImpostorResult};
pub use impostor::{Impostor, ImpostorId, texture_size_for};
pub use manager::{FrameStats, ImpostorManager};
pub use proxy::ImpostorProxy;
pub use target::create_wgpu_render_target;
pub use texture_cache::{ImpostorTexture, ReclaimStats, TextureCache, TextureCacheStats, TextureId};
