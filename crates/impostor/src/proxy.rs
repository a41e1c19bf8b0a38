//! The billboard stand-in of one impostor.
//!
//! A proxy owns at most one texture from the [`TextureCache`] and knows how to
//! re-render the object's appearance into it. Whether the proxy is shown at
//! all is decided by its [`Impostor`](crate::Impostor).

use crate::camera::Camera;
use crate::config::ImpostorSettings;
use crate::impostor::ImpostorId;
use crate::texture_cache::{TextureCache, TextureId};
use glam::{Mat4, Quat, Vec3};
use impostor_core::math::{Aabb, Frustum, MIN_LENGTH};
use impostor_core::profiling::profile_function;
use impostor_test_utils::{
    BillboardInstance, ObjectId, RenderHost, RendererId, ShadowSnapshot, SnapshotRequest,
};

/// Smallest billboard edge length, so empty or flat bounds still get a texel.
pub const MIN_PROXY_SIZE: f32 = 1.0e-3;

#[derive(Debug)]
pub struct ImpostorProxy {
    object: ObjectId,
    texture: Option<TextureId>,
    /// The texture holds a snapshot taken from the current baseline.
    valid: bool,
    /// The billboard replaces the real geometry.
    active: bool,
    visible: bool,
    visible_in_cache: bool,
    /// Edge length of the billboard: the diagonal of the combined bounds.
    max_size: f32,
    /// Centre of the combined bounds relative to the object position.
    local_center: Vec3,
    z_offset: f32,
    shadow_z_offset: f32,
    shadow_divider: u32,
    max_shadow_distance: f32,
    cast_shadow: bool,
}

impl ImpostorProxy {
    pub fn new(object: ObjectId, settings: &ImpostorSettings) -> Self {
        Self {
            object,
            texture: None,
            valid: false,
            active: false,
            visible: false,
            visible_in_cache: false,
            max_size: MIN_PROXY_SIZE,
            local_center: Vec3::ZERO,
            z_offset: settings.z_offset,
            shadow_z_offset: settings.shadow_z_offset,
            shadow_divider: settings.shadow_divider(),
            max_shadow_distance: settings.max_shadow_distance,
            cast_shadow: false,
        }
    }

    /// Fit the billboard to the combined bounds of `renderers`.
    pub fn init(
        &mut self,
        host: &dyn RenderHost,
        renderers: &[RendererId],
        position: Vec3,
        shadow_enabled: bool,
    ) {
        let bounds = Aabb::union_all(renderers.iter().filter_map(|r| host.renderer_bounds(*r)));
        match bounds {
            Some(bounds) => {
                self.max_size = bounds.diagonal().max(MIN_PROXY_SIZE);
                self.local_center = bounds.center() - position;
            }
            None => {
                tracing::warn!(object = %self.object, "Impostor has no renderer bounds, using a minimal billboard");
                self.max_size = MIN_PROXY_SIZE;
                self.local_center = Vec3::ZERO;
            }
        }
        self.cast_shadow = shadow_enabled;
        self.valid = false;
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn max_size(&self) -> f32 {
        self.max_size
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn casts_shadow(&self) -> bool {
        self.cast_shadow
    }

    /// Change shadow casting. The current snapshot becomes stale.
    pub fn set_shadow_enabled(&mut self, enabled: bool) {
        if self.cast_shadow != enabled {
            self.cast_shadow = enabled;
            self.valid = false;
        }
    }

    /// World-space box enclosing the billboard at any orientation.
    pub fn bounds(&self, position: Vec3) -> Aabb {
        Aabb::from_center_half_extents(
            position + self.local_center,
            Vec3::splat(self.max_size * 0.5),
        )
    }

    pub fn intersects(&self, frustum: &Frustum, position: Vec3) -> bool {
        frustum.intersects_aabb(&self.bounds(position))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Hide the billboard and stop replacing the real geometry.
    pub fn deactivate(&mut self, host: &dyn RenderHost) {
        self.set_visibility(host, false);
        self.active = false;
    }

    pub fn set_visibility(&mut self, host: &dyn RenderHost, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            host.set_billboard_visible(self.object, visible);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible_in_cache(&mut self, visible: bool) {
        self.visible_in_cache = visible;
    }

    pub fn is_visible_in_cache(&self) -> bool {
        self.visible_in_cache
    }

    /// The proxy holds a texture that is still handed out to `owner`.
    fn holds_texture(&self, cache: &TextureCache, owner: ImpostorId) -> bool {
        self.texture
            .is_some_and(|id| Self::owned_by(cache, id, owner))
    }

    /// True when the proxy must be re-rendered before it can be shown.
    pub fn is_texture_invalid(&self, cache: &TextureCache, owner: ImpostorId) -> bool {
        !self.valid || !self.holds_texture(cache, owner)
    }

    /// Make sure the proxy holds a `new_size` texture. Always invalidates.
    pub fn adjust_texture_size(
        &mut self,
        host: &dyn RenderHost,
        cache: &mut TextureCache,
        owner: ImpostorId,
        new_size: u32,
    ) {
        let current = self
            .texture
            .filter(|_| self.holds_texture(cache, owner))
            .and_then(|id| cache.get(id).map(|texture| texture.size()));

        if current != Some(new_size) {
            self.release_texture(cache, owner);
            self.texture = Some(cache.acquire(host, owner, new_size));
        }
        self.valid = false;
    }

    /// Give the texture back to the cache and mark the proxy stale.
    pub fn invalidate_texture(&mut self, cache: &mut TextureCache, owner: ImpostorId) {
        self.release_texture(cache, owner);
        self.valid = false;
    }

    fn release_texture(&mut self, cache: &mut TextureCache, owner: ImpostorId) {
        if let Some(id) = self.texture.take() {
            // A texture taken away through the manager is no longer ours to return.
            if Self::owned_by(cache, id, owner)
                && let Err(err) = cache.release(id)
            {
                tracing::trace!(object = %self.object, %err, "Proxy texture release failed");
            }
        }
    }

    fn owned_by(cache: &TextureCache, id: TextureId, owner: ImpostorId) -> bool {
        cache
            .get(id)
            .is_some_and(|texture| texture.owner() == Some(owner))
    }

    /// Re-render the object into the held texture as seen from `camera`.
    ///
    /// Does nothing when no texture is held; callers size the texture first.
    pub fn render(
        &mut self,
        host: &dyn RenderHost,
        cache: &mut TextureCache,
        owner: ImpostorId,
        renderers: &[RendererId],
        camera: &Camera,
        position: Vec3,
    ) {
        profile_function!();
        let Some(id) = self.texture.filter(|_| self.holds_texture(cache, owner)) else {
            tracing::warn!(object = %self.object, "Impostor render skipped, no texture held");
            return;
        };
        let Some(target) = cache.target(id) else {
            return;
        };

        let center = position + self.local_center;
        let eye = camera.position();
        let to_eye = eye - center;
        let distance = to_eye.length().max(MIN_LENGTH);
        let facing = to_eye.normalize_or(Vec3::Z);
        let up = if camera.up().cross(facing).length_squared() > f32::EPSILON {
            camera.up()
        } else {
            Vec3::Z
        };

        // Frame the billboard square exactly from the camera position.
        let half = self.max_size * 0.5;
        let fov = 2.0 * (half / distance).atan();
        let near = (distance - half).max(MIN_LENGTH);
        let far = (distance + half).max(near + MIN_LENGTH);

        let model = Mat4::from_scale_rotation_translation(
            Vec3::new(self.max_size, self.max_size, 1.0),
            Quat::from_rotation_arc(Vec3::Z, facing),
            center + facing * self.z_offset,
        );

        let request = SnapshotRequest {
            object: self.object,
            renderers,
            eye,
            center,
            up,
            view: Mat4::look_at_rh(eye, center, up),
            projection: Mat4::perspective_rh(fov, 1.0, near, far),
            billboard: BillboardInstance {
                model: model.to_cols_array_2d(),
                depth_bias: self.z_offset,
                shadow_depth_bias: self.shadow_z_offset,
                size: self.max_size,
                _padding: 0.0,
            },
            shadow: self.cast_shadow.then_some(ShadowSnapshot {
                z_offset: self.shadow_z_offset,
                divider: self.shadow_divider,
                max_distance: self.max_shadow_distance,
            }),
        };

        host.render_snapshot(&request, target);
        cache.touch(id);
        self.valid = true;
    }
}
