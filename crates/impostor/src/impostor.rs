//! Per-object impostor state and the per-frame decision.

use crate::camera::Camera;
use crate::config::{CachingPolicy, ImpostorSettings, LodMethod};
use crate::error::{ImpostorError, ImpostorResult};
use crate::manager::{FrameStats, PreloadThrottle};
use crate::proxy::ImpostorProxy;
use crate::texture_cache::TextureCache;
use glam::Vec3;
use impostor_core::alloc::HashMap;
use impostor_core::alloc::sparse_set::IndexSlot;
use impostor_core::math::{Frustum, MIN_LENGTH, angle_between_degrees};
use impostor_test_utils::{ObjectId, RenderGroup, RenderHost, RendererId};
use std::fmt;

/// Handle to an impostor registered with an [`ImpostorManager`](crate::ImpostorManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImpostorId(IndexSlot);

impl ImpostorId {
    pub(crate) fn from_slot(slot: IndexSlot) -> Self {
        Self(slot)
    }

    pub(crate) fn slot(self) -> IndexSlot {
        self.0
    }
}

impl fmt::Display for ImpostorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Impostor({}v{})", self.0.index(), self.0.generation())
    }
}

/// Everything one impostor needs from the manager during a frame pass.
pub(crate) struct FrameContext<'a> {
    pub host: &'a dyn RenderHost,
    pub cache: &'a mut TextureCache,
    pub throttle: &'a mut PreloadThrottle,
    pub camera: &'a Camera,
    pub primary: &'a Frustum,
    pub caching: &'a Frustum,
    pub policy: CachingPolicy,
    pub active: bool,
    pub impostor_group: RenderGroup,
    pub stats: &'a mut FrameStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateOutcome {
    Updated,
    /// The object no longer exists in the host scene.
    Stale,
}

/// Largest power-of-two texture size worth rendering for `pixel_size`
/// on-screen pixels, capped at `max_texture_size`.
pub fn texture_size_for(pixel_size: f32, max_texture_size: u32) -> u32 {
    let max = max_texture_size.max(1);
    let pixels = if pixel_size >= 1.0 {
        // Saturating cast, NaN is excluded by the comparison.
        pixel_size as u32
    } else {
        1
    };
    pixels.checked_next_power_of_two().unwrap_or(max).min(max)
}

/// An object that is drawn as a billboard while it is far away or small.
#[derive(Debug)]
pub struct Impostor {
    object: ObjectId,
    settings: ImpostorSettings,
    renderers: Vec<RendererId>,
    /// Groups the renderers had before they were first captured.
    original_groups: HashMap<RendererId, RenderGroup>,
    proxy: ImpostorProxy,
    /// Object position minus camera position at the last snapshot.
    last_camera_vector: Vec3,
    last_texture_size: u32,
    pixel_size: f32,
}

impl Impostor {
    pub(crate) fn new(object: ObjectId, settings: ImpostorSettings) -> Self {
        let proxy = ImpostorProxy::new(object, &settings);
        Self {
            object,
            settings,
            renderers: Vec::new(),
            original_groups: HashMap::new(),
            proxy,
            last_camera_vector: Vec3::ZERO,
            last_texture_size: 0,
            pixel_size: 0.0,
        }
    }

    /// Capture the object's renderers and rebuild the proxy.
    ///
    /// Leaves the object showing its real geometry. On error nothing changes.
    pub(crate) fn initialize(
        &mut self,
        id: ImpostorId,
        host: &dyn RenderHost,
        cache: &mut TextureCache,
        camera: &Camera,
        shadows_enabled: bool,
    ) -> ImpostorResult<()> {
        let Some(position) = host.object_position(self.object) else {
            tracing::error!(object = %self.object, "Impostor object not found");
            return Err(ImpostorError::ObjectNotFound(self.object));
        };
        let renderers = host.object_renderers(self.object);
        if renderers.is_empty() {
            tracing::warn!(object = %self.object, "Impostor object has no renderers");
            return Err(ImpostorError::NoRenderers(self.object));
        }

        if self.proxy.is_active() {
            self.deactivate(host);
        }
        self.proxy.invalidate_texture(cache, id);

        for renderer in &renderers {
            self.original_groups
                .entry(*renderer)
                .or_insert_with(|| host.render_group(*renderer));
        }
        self.original_groups.retain(|renderer, _| renderers.contains(renderer));
        self.renderers = renderers;

        let mut proxy = ImpostorProxy::new(self.object, &self.settings);
        proxy.init(
            host,
            &self.renderers,
            position,
            self.settings.cast_shadow && shadows_enabled,
        );
        self.proxy = proxy;

        self.restore_renderers(host);
        self.last_camera_vector = position - camera.position();
        self.last_texture_size = 0;
        self.pixel_size = 0.0;

        tracing::debug!(
            %id,
            object = %self.object,
            renderers = self.renderers.len(),
            size = self.proxy.max_size(),
            "Initialized impostor"
        );
        Ok(())
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn settings(&self) -> &ImpostorSettings {
        &self.settings
    }

    /// Swap in new settings. They take effect on the next [`initialize`](Self::initialize).
    pub(crate) fn replace_settings(&mut self, settings: ImpostorSettings) -> ImpostorSettings {
        std::mem::replace(&mut self.settings, settings)
    }

    pub fn renderers(&self) -> &[RendererId] {
        &self.renderers
    }

    pub fn proxy(&self) -> &ImpostorProxy {
        &self.proxy
    }

    /// The billboard currently replaces the real geometry.
    pub fn is_showing_proxy(&self) -> bool {
        self.proxy.is_active()
    }

    /// Estimated on-screen height in pixels from the last update.
    pub fn pixel_size(&self) -> f32 {
        self.pixel_size
    }

    pub fn last_camera_vector(&self) -> Vec3 {
        self.last_camera_vector
    }

    pub fn last_texture_size(&self) -> u32 {
        self.last_texture_size
    }

    /// Approximate on-screen height in pixels at `distance` from `camera`.
    pub fn estimate_pixel_size(&self, distance: f32, camera: &Camera) -> f32 {
        let angular_size = (self.proxy.max_size() / distance.max(MIN_LENGTH)).to_degrees();
        angular_size * camera.viewport_height() / camera.fov_y_degrees()
    }

    /// Whether the billboard should replace the real geometry.
    pub fn is_in_range(&self, distance: f32, pixel_size: f32) -> bool {
        match self.settings.lod {
            LodMethod::Distance { max_distance } => distance > max_distance,
            LodMethod::ScreenSize => pixel_size < self.settings.max_texture_size as f32,
        }
    }

    /// Whether the camera moved far enough since the last snapshot.
    pub fn needs_update(&self, camera_vector: Vec3) -> bool {
        let angle = angle_between_degrees(camera_vector, self.last_camera_vector);
        let last_distance = self.last_camera_vector.length();
        let distance_change = (camera_vector.length() - last_distance).abs();
        angle > self.settings.angle_tolerance
            || distance_change > last_distance * self.settings.distance_tolerance / 100.0
    }

    fn restore_renderers(&self, host: &dyn RenderHost) {
        host.set_renderers_enabled(&self.renderers, true);
        for renderer in &self.renderers {
            if let Some(group) = self.original_groups.get(renderer) {
                host.set_render_group(*renderer, *group);
            }
        }
    }

    /// Hide the real geometry behind the billboard.
    fn activate(&mut self, host: &dyn RenderHost, group: RenderGroup) {
        host.set_renderers_enabled(&self.renderers, false);
        for renderer in &self.renderers {
            host.set_render_group(*renderer, group);
        }
        self.proxy.activate();
    }

    /// Bring back the real geometry and hide the billboard.
    fn deactivate(&mut self, host: &dyn RenderHost) {
        self.restore_renderers(host);
        self.proxy.deactivate(host);
    }

    pub(crate) fn set_shadow_enabled(&mut self, shadows_enabled: bool) {
        self.proxy
            .set_shadow_enabled(self.settings.cast_shadow && shadows_enabled);
    }

    /// Let go of the texture and, if the object still exists, show it again.
    pub(crate) fn release(
        &mut self,
        id: ImpostorId,
        host: &dyn RenderHost,
        cache: &mut TextureCache,
        object_alive: bool,
    ) {
        self.proxy.invalidate_texture(cache, id);
        if object_alive && self.proxy.is_active() {
            self.deactivate(host);
        }
    }

    /// Size the texture for the current pixel estimate and re-render it.
    fn refresh(&mut self, id: ImpostorId, ctx: &mut FrameContext<'_>, position: Vec3, camera_vector: Vec3) {
        let size = texture_size_for(self.pixel_size, self.settings.max_texture_size);
        if self.proxy.is_texture_invalid(ctx.cache, id) || self.last_texture_size != size {
            self.proxy.adjust_texture_size(ctx.host, ctx.cache, id, size);
            self.last_texture_size = size;
        }
        self.proxy
            .render(ctx.host, ctx.cache, id, &self.renderers, ctx.camera, position);
        self.last_camera_vector = camera_vector;
        ctx.stats.rendered += 1;
    }

    fn drop_texture(&mut self, id: ImpostorId, ctx: &mut FrameContext<'_>) {
        if self.proxy.texture().is_some() {
            ctx.stats.invalidated += 1;
        }
        self.proxy.invalidate_texture(ctx.cache, id);
    }

    /// Run the per-frame decision for this impostor.
    pub(crate) fn update(&mut self, id: ImpostorId, ctx: &mut FrameContext<'_>) -> UpdateOutcome {
        let Some(position) = ctx.host.object_position(self.object) else {
            return UpdateOutcome::Stale;
        };

        if !ctx.active {
            if self.proxy.is_active() {
                self.drop_texture(id, ctx);
                self.deactivate(ctx.host);
                ctx.stats.deactivated += 1;
            }
            return UpdateOutcome::Updated;
        }

        let camera_vector = position - ctx.camera.position();
        let distance = camera_vector.length().max(MIN_LENGTH);
        self.pixel_size = self.estimate_pixel_size(distance, ctx.camera);

        if !self.is_in_range(distance, self.pixel_size) {
            if self.proxy.is_active() {
                self.drop_texture(id, ctx);
                self.deactivate(ctx.host);
                ctx.stats.deactivated += 1;
            }
            return UpdateOutcome::Updated;
        }

        if !self.proxy.is_active() {
            self.activate(ctx.host, ctx.impostor_group);
            ctx.stats.activated += 1;
        }

        let needs_update = self.needs_update(camera_vector);
        let stale = needs_update || self.proxy.is_texture_invalid(ctx.cache, id);
        let in_cache = self.proxy.intersects(ctx.caching, position);
        self.proxy.set_visible_in_cache(in_cache);

        if self.proxy.intersects(ctx.primary, position) {
            self.proxy.set_visibility(ctx.host, true);
            if stale {
                self.refresh(id, ctx, position, camera_vector);
            }
            return UpdateOutcome::Updated;
        }

        self.proxy.set_visibility(ctx.host, false);
        if in_cache && ctx.policy == CachingPolicy::PreloadAndCache {
            if stale {
                if ctx.throttle.try_acquire() {
                    ctx.stats.preload_granted += 1;
                    self.refresh(id, ctx, position, camera_vector);
                } else {
                    ctx.stats.preload_denied += 1;
                }
            }
        } else if ctx.policy == CachingPolicy::Discard || needs_update || !in_cache {
            self.drop_texture(id, ctx);
        }
        UpdateOutcome::Updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impostor_core::math::Aabb;
    use impostor_test_utils::{MockRenderHost, RenderTargetDescriptor};

    fn camera() -> Camera {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 1000.0, 720.0);
        camera.look_at(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        camera
    }

    fn unit_cube() -> Aabb {
        Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    fn impostor_at(host: &MockRenderHost, position: Vec3, settings: ImpostorSettings) -> Impostor {
        let object = host.spawn_object(position, &[unit_cube()]);
        let mut cache = TextureCache::new(RenderTargetDescriptor::square(1));
        let mut impostor = Impostor::new(object, settings);
        impostor
            .initialize(
                ImpostorId::from_slot(IndexSlot::new(0, 0)),
                host,
                &mut cache,
                &camera(),
                false,
            )
            .unwrap();
        impostor
    }

    #[test]
    fn test_texture_size_for() {
        assert_eq!(texture_size_for(0.0, 256), 1);
        assert_eq!(texture_size_for(f32::NAN, 256), 1);
        assert_eq!(texture_size_for(1.0, 256), 1);
        assert_eq!(texture_size_for(3.5, 256), 4);
        assert_eq!(texture_size_for(64.0, 256), 64);
        assert_eq!(texture_size_for(200.7, 256), 256);
        assert_eq!(texture_size_for(10_000.0, 256), 256);
        assert_eq!(texture_size_for(f32::INFINITY, 256), 256);
    }

    #[test]
    fn test_texture_size_covers_pixels_up_to_max() {
        for pixels in [1.0f32, 2.0, 7.0, 33.0, 100.0, 255.0, 256.0, 1000.0] {
            let size = texture_size_for(pixels, 256);
            assert!(size.is_power_of_two());
            assert!(size <= 256);
            assert!(size as f32 >= pixels.min(256.0).floor());
        }
    }

    #[test]
    fn test_initialize_requires_object() {
        let host = MockRenderHost::new();
        let object = host.spawn_object(Vec3::ZERO, &[]);
        let mut cache = TextureCache::new(RenderTargetDescriptor::square(1));
        let mut impostor = Impostor::new(object, ImpostorSettings::default());
        let id = ImpostorId::from_slot(IndexSlot::new(0, 0));

        let err = impostor.initialize(id, &host, &mut cache, &camera(), false);
        assert_eq!(err, Err(ImpostorError::NoRenderers(object)));

        host.despawn_object(object);
        let err = impostor.initialize(id, &host, &mut cache, &camera(), false);
        assert_eq!(err, Err(ImpostorError::ObjectNotFound(object)));
    }

    #[test]
    fn test_distance_lod() {
        let host = MockRenderHost::new();
        let settings = ImpostorSettings::default().with_lod(LodMethod::Distance { max_distance: 30.0 });
        let impostor = impostor_at(&host, Vec3::new(0.0, 0.0, -40.0), settings);

        assert!(impostor.is_in_range(40.0, 0.0));
        assert!(!impostor.is_in_range(30.0, 0.0));
        assert!(!impostor.is_in_range(10.0, 0.0));
    }

    #[test]
    fn test_screen_size_boundary() {
        let host = MockRenderHost::new();
        let impostor = impostor_at(&host, Vec3::new(0.0, 0.0, -40.0), ImpostorSettings::default());

        assert!(impostor.is_in_range(1.0, 255.9));
        assert!(!impostor.is_in_range(1.0, 256.0));
    }

    #[test]
    fn test_pixel_estimate_shrinks_with_distance() {
        let host = MockRenderHost::new();
        let impostor = impostor_at(&host, Vec3::new(0.0, 0.0, -40.0), ImpostorSettings::default());
        let camera = camera();

        let near = impostor.estimate_pixel_size(10.0, &camera);
        let far = impostor.estimate_pixel_size(20.0, &camera);
        assert!((near - 2.0 * far).abs() < 1.0e-3);
        assert!(impostor.estimate_pixel_size(0.0, &camera).is_finite());
    }

    #[test]
    fn test_needs_update() {
        let host = MockRenderHost::new();
        let impostor = impostor_at(&host, Vec3::new(0.0, 0.0, -40.0), ImpostorSettings::default());

        let baseline = impostor.last_camera_vector();
        assert_eq!(baseline, Vec3::new(0.0, 0.0, -40.0));
        assert!(!impostor.needs_update(baseline));

        // 5 degrees around Y is past the 2.5 degree tolerance
        let rotated = glam::Quat::from_rotation_y(5f32.to_radians()) * baseline;
        assert!(impostor.needs_update(rotated));

        // 10% closer stays within 15%, 20% closer does not
        assert!(!impostor.needs_update(baseline * 0.9));
        assert!(impostor.needs_update(baseline * 0.8));
    }

    #[test]
    fn test_initialize_records_original_groups() {
        let host = MockRenderHost::new();
        let object = host.spawn_object_in_group(Vec3::ZERO, &[unit_cube()], RenderGroup(3));
        let mut cache = TextureCache::new(RenderTargetDescriptor::square(1));
        let mut impostor = Impostor::new(object, ImpostorSettings::default());
        let id = ImpostorId::from_slot(IndexSlot::new(0, 0));
        impostor.initialize(id, &host, &mut cache, &camera(), false).unwrap();

        impostor.activate(&host, RenderGroup(30));
        let renderer = impostor.renderers()[0];
        assert_eq!(host.render_group(renderer), RenderGroup(30));
        assert_eq!(host.renderer_enabled(renderer), Some(false));

        impostor.deactivate(&host);
        assert_eq!(host.render_group(renderer), RenderGroup(3));
        assert_eq!(host.renderer_enabled(renderer), Some(true));
    }
}
