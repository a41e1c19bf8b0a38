//! Host boundary for the impostor system.
//!
//! The impostor core never talks to a scene graph or a GPU directly. Everything
//! it needs from the host engine goes through the object-safe [`RenderHost`]
//! trait defined here, which keeps the core testable without a GPU.
//!
//! # Overview
//!
//! - [`RenderHost`] - Trait the host engine implements
//! - [`GpuRenderTarget`] - Opaque render target handle, real (wgpu) or mock
//! - [`ObjectId`], [`RendererId`], [`RenderGroup`] - Host scene identifiers
//! - `MockRenderHost` - Call-recording scene for tests (requires `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use impostor_test_utils::{MockRenderHost, RenderHost, RenderTargetDescriptor};
//!
//! let host = MockRenderHost::new();
//! let target = host.create_render_target(&RenderTargetDescriptor::square(128));
//!
//! assert!(target.is_mock());
//! assert_eq!(host.count_target_creates(), 1);
//! # }
//! ```
//!
//! # Design
//!
//! Handles are owned and cheap to clone, and trait methods take `&self`, so a
//! single host can be shared behind an `Arc<dyn RenderHost>`. The mock uses
//! `parking_lot` mutexes to record calls through `&self`.

pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_host;
pub mod render_host;
pub mod scene_types;

// Re-export main types at crate root
pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_host::*;
pub use render_host::*;
pub use scene_types::*;
