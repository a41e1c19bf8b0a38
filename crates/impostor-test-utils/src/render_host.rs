//! Trait abstracting the host engine.
//!
//! The `RenderHost` trait is everything the impostor core consumes from the
//! engine it runs in: render target allocation, off-screen snapshots of real
//! geometry, and the few scene queries and toggles needed to swap an object
//! between its real renderers and its billboard.

use crate::gpu_types::*;
use crate::scene_types::*;
use glam::{Mat4, Vec3};
use impostor_core::math::Aabb;

/// Shadow parameters for a snapshot whose billboard casts a shadow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSnapshot {
    /// Depth offset used when the billboard is drawn into a shadow map.
    pub z_offset: f32,
    /// Shadow resolution divider (`1 << downsampling`).
    pub divider: u32,
    /// Distance past which the billboard stops casting.
    pub max_distance: f32,
}

/// A request to re-render an object's appearance into a render target.
#[derive(Debug, Clone)]
pub struct SnapshotRequest<'a> {
    pub object: ObjectId,
    /// The real renderers to draw, in capture order.
    pub renderers: &'a [RendererId],
    /// Virtual camera position (the primary camera's position).
    pub eye: Vec3,
    /// Point the virtual camera looks at (the centre of the object's bounds).
    pub center: Vec3,
    pub up: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    /// Where and how the host should draw the billboard showing this snapshot.
    pub billboard: BillboardInstance,
    pub shadow: Option<ShadowSnapshot>,
}

/// Trait abstracting the host scene and GPU.
///
/// # Borrow Checking Pattern
///
/// Methods take `&self` and return owned values, so one host can be shared by
/// the manager and the driver loop behind an `Arc<dyn RenderHost>`. Mock
/// implementations use interior mutability to record calls.
///
/// # Example
///
/// ```rust,no_run
/// use impostor_test_utils::{RenderHost, RenderTargetDescriptor};
///
/// fn warm_up(host: &dyn RenderHost) {
///     let target = host.create_render_target(&RenderTargetDescriptor::square(64));
///     host.destroy_render_target(target);
/// }
/// ```
pub trait RenderHost: Send + Sync {
    // Render targets

    /// Allocate a square colour + depth target.
    fn create_render_target(&self, desc: &RenderTargetDescriptor) -> GpuRenderTarget;

    /// Free a target's GPU memory.
    fn destroy_render_target(&self, target: GpuRenderTarget);

    /// Render the requested renderers into `target` and update the object's
    /// billboard to show it.
    fn render_snapshot(&self, request: &SnapshotRequest<'_>, target: &GpuRenderTarget);

    // Scene queries

    /// World position of an object, or `None` once the object is destroyed.
    fn object_position(&self, object: ObjectId) -> Option<Vec3>;

    /// Renderers of the object itself followed by those of its children.
    fn object_renderers(&self, object: ObjectId) -> Vec<RendererId>;

    /// World-space bounds of a renderer, or `None` if it no longer exists.
    fn renderer_bounds(&self, renderer: RendererId) -> Option<Aabb>;

    /// Current render group of a renderer.
    fn render_group(&self, renderer: RendererId) -> RenderGroup;

    // Scene toggles

    fn set_render_group(&self, renderer: RendererId, group: RenderGroup);

    /// Enable or disable drawing of the real renderers.
    fn set_renderers_enabled(&self, renderers: &[RendererId], enabled: bool);

    /// Show or hide the object's billboard.
    fn set_billboard_visible(&self, object: ObjectId, visible: bool);

    /// Destroy a scene object (used when the scene is torn down).
    fn destroy_object(&self, object: ObjectId);
}
