//! The impostor manager: registration, the per-frame pass and texture brokering.

use crate::camera::Camera;
use crate::config::{CachingPolicy, ImpostorSettings, MainLight, ManagerConfig};
use crate::error::{ImpostorError, ImpostorResult};
use crate::impostor::{FrameContext, Impostor, ImpostorId, UpdateOutcome};
use crate::texture_cache::{ReclaimStats, TextureCache, TextureId};
use impostor_core::alloc::HashMap;
use impostor_core::alloc::sparse_set::SparseSet;
use impostor_core::math::Frustum;
use impostor_core::profiling::{profile_function, profile_scope};
use impostor_test_utils::{ObjectId, RenderHost};
use std::sync::Arc;

/// Per-frame budget of off-screen re-renders.
///
/// Every request counts against the budget, granted or not.
#[derive(Debug, Clone)]
pub(crate) struct PreloadThrottle {
    budget: u32,
    counter: u32,
}

impl PreloadThrottle {
    fn new(budget: u32) -> Self {
        Self { budget, counter: 0 }
    }

    fn reset(&mut self) {
        self.counter = 0;
    }

    pub(crate) fn try_acquire(&mut self) -> bool {
        let granted = self.counter < self.budget;
        self.counter = self.counter.saturating_add(1);
        granted
    }
}

/// Counters of one [`ImpostorManager::per_frame`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Impostors evaluated.
    pub updated: usize,
    /// Snapshots taken, preloads included.
    pub rendered: usize,
    pub preload_granted: usize,
    pub preload_denied: usize,
    /// Textures given back to the cache.
    pub invalidated: usize,
    /// Impostors that switched to their billboard.
    pub activated: usize,
    /// Impostors that switched back to real geometry.
    pub deactivated: usize,
    /// Impostors dropped because their object was destroyed.
    pub pruned: usize,
    /// Textures destroyed by the periodic reclaim.
    pub reclaimed: usize,
}

/// The driver's camera and what is derived from it once per frame.
#[derive(Debug, Clone)]
struct CameraState {
    camera: Camera,
    caching_camera: Camera,
    primary_frustum: Frustum,
    caching_frustum: Frustum,
}

impl CameraState {
    fn new(camera: Camera, preload_fov_factor: f32) -> Self {
        let caching_camera = camera.with_fov_scaled(preload_fov_factor);
        Self {
            primary_frustum: camera.frustum(),
            caching_frustum: caching_camera.frustum(),
            camera,
            caching_camera,
        }
    }
}

/// Owns every impostor and the texture cache they share.
///
/// Driven by the host once per frame through [`per_frame`](Self::per_frame),
/// after the camera has moved and before the scene is rendered.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use glam::Vec3;
/// use impostor::{Camera, ImpostorManager, ImpostorSettings, ManagerConfig};
/// use impostor_core::math::Aabb;
/// use impostor_test_utils::MockRenderHost;
///
/// let host = Arc::new(MockRenderHost::new());
/// let tree = host.spawn_object(Vec3::new(0.0, 0.0, -200.0), &[Aabb::new(Vec3::splat(-1.0), Vec3::ONE)]);
///
/// let mut camera = Camera::perspective(60.0, 1.0, 0.1, 1000.0, 720.0);
/// camera.look_at(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
///
/// let mut manager = ImpostorManager::new(ManagerConfig::default(), host.clone()).unwrap();
/// manager.init(camera.clone());
/// let id = manager.register(tree, ImpostorSettings::default()).unwrap();
///
/// manager.per_frame(&camera);
/// assert!(manager.impostor(id).unwrap().is_showing_proxy());
/// ```
pub struct ImpostorManager {
    config: ManagerConfig,
    host: Arc<dyn RenderHost>,
    impostors: SparseSet<Impostor>,
    objects: HashMap<ObjectId, ImpostorId>,
    cache: TextureCache,
    view: Option<CameraState>,
    throttle: PreloadThrottle,
    main_light: Option<MainLight>,
    shadows_enabled: bool,
    frame: u64,
}

impl ImpostorManager {
    pub fn new(config: ManagerConfig, host: Arc<dyn RenderHost>) -> ImpostorResult<Self> {
        config.validate()?;
        let cache = TextureCache::new(config.target_descriptor(1));

        tracing::info!(
            caching = ?config.caching,
            antialiasing = config.antialiasing,
            preload_rate = config.preload_rate,
            "Created impostor manager"
        );

        Ok(Self {
            throttle: PreloadThrottle::new(config.preload_rate),
            config,
            host,
            impostors: SparseSet::new(),
            objects: HashMap::new(),
            cache,
            view: None,
            main_light: None,
            shadows_enabled: false,
            frame: 0,
        })
    }

    /// Give the manager its camera. Registration fails until this is called.
    pub fn init(&mut self, camera: Camera) {
        self.view = Some(CameraState::new(camera, self.config.preload_fov_factor));
        self.shadows_enabled = self.compute_shadows_enabled();
        tracing::debug!("Impostor manager initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.view.is_some()
    }

    fn compute_shadows_enabled(&self) -> bool {
        self.config.cast_shadows
            && self
                .main_light
                .is_some_and(|light| light.supports_billboard_shadows())
    }

    /// Start managing `object`.
    ///
    /// Registering an object twice re-initializes the existing impostor with
    /// the new settings and returns its id. If that fails the old settings
    /// are kept.
    pub fn register(
        &mut self,
        object: ObjectId,
        settings: ImpostorSettings,
    ) -> ImpostorResult<ImpostorId> {
        profile_function!();
        if self.view.is_none() {
            tracing::error!(%object, "Can't find a camera for impostor manager");
            return Err(ImpostorError::NotInitialized);
        }
        settings.validate()?;

        if let Some(id) = self.impostor_for(object) {
            let previous = self
                .impostors
                .get_mut(id.slot())
                .map(|impostor| impostor.replace_settings(settings.sanitized()));
            if let Err(err) = self.reinitialize(id) {
                if let (Some(previous), Some(impostor)) =
                    (previous, self.impostors.get_mut(id.slot()))
                {
                    impostor.replace_settings(previous);
                }
                return Err(err);
            }
            tracing::debug!(%id, %object, "Re-registered impostor");
            return Ok(id);
        }

        let slot = self
            .impostors
            .push(Impostor::new(object, settings.sanitized()));
        let id = ImpostorId::from_slot(slot);
        if let Err(err) = self.reinitialize(id) {
            self.impostors.remove(slot);
            return Err(err);
        }
        self.objects.insert(object, id);

        tracing::debug!(%id, %object, "Registered impostor");
        Ok(id)
    }

    /// Re-capture the renderers of an impostor after its object changed.
    pub fn reinitialize(&mut self, id: ImpostorId) -> ImpostorResult<()> {
        let Some(view) = &self.view else {
            return Err(ImpostorError::NotInitialized);
        };
        let impostor = self
            .impostors
            .get_mut(id.slot())
            .ok_or(ImpostorError::StaleImpostor(id))?;
        impostor.initialize(
            id,
            self.host.as_ref(),
            &mut self.cache,
            &view.camera,
            self.shadows_enabled,
        )
    }

    /// Stop managing an impostor. A live object gets its real geometry back.
    pub fn unregister(&mut self, id: ImpostorId) -> ImpostorResult<()> {
        let mut impostor = self
            .impostors
            .remove(id.slot())
            .ok_or(ImpostorError::StaleImpostor(id))?;
        let alive = self.host.object_position(impostor.object()).is_some();
        impostor.release(id, self.host.as_ref(), &mut self.cache, alive);
        self.objects.remove(&impostor.object());
        tracing::debug!(%id, object = %impostor.object(), "Unregistered impostor");
        Ok(())
    }

    fn prune(&mut self, id: ImpostorId) {
        if let Some(mut impostor) = self.impostors.remove(id.slot()) {
            impostor.release(id, self.host.as_ref(), &mut self.cache, false);
            self.objects.remove(&impostor.object());
            tracing::debug!(%id, object = %impostor.object(), "Pruned impostor of destroyed object");
        }
    }

    /// Run one frame: decide for every impostor whether it shows its billboard
    /// and refresh the snapshots that went stale.
    pub fn per_frame(&mut self, camera: &Camera) -> FrameStats {
        profile_function!();
        self.frame += 1;
        self.cache.set_frame(self.frame);
        self.throttle.reset();

        let view = CameraState::new(camera.clone(), self.config.preload_fov_factor);

        let shadows_enabled = self.compute_shadows_enabled();
        if shadows_enabled != self.shadows_enabled {
            tracing::debug!(shadows_enabled, "Billboard shadows toggled");
            self.shadows_enabled = shadows_enabled;
            for (_, impostor) in self.impostors.iter_mut() {
                impostor.set_shadow_enabled(shadows_enabled);
            }
        }

        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };
        let mut stale = Vec::new();
        {
            profile_scope!("update_impostors");
            let mut ctx = FrameContext {
                host: self.host.as_ref(),
                cache: &mut self.cache,
                throttle: &mut self.throttle,
                camera: &view.camera,
                primary: &view.primary_frustum,
                caching: &view.caching_frustum,
                policy: self.config.caching,
                active: self.config.active,
                impostor_group: self.config.impostor_group,
                stats: &mut stats,
            };
            for (slot, impostor) in self.impostors.iter_mut() {
                let id = ImpostorId::from_slot(slot);
                match impostor.update(id, &mut ctx) {
                    UpdateOutcome::Updated => ctx.stats.updated += 1,
                    UpdateOutcome::Stale => stale.push(id),
                }
            }
        }

        stats.pruned = stale.len();
        for id in stale {
            self.prune(id);
        }

        if let Some(interval) = self.config.reclaim_interval
            && self.frame % interval.get() == 0
        {
            stats.reclaimed = self.reclaim().destroyed;
        }

        self.view = Some(view);
        tracing::trace!(?stats, "Impostor frame done");
        stats
    }

    /// Ask for one off-screen re-render from this frame's preload budget.
    pub fn get_preload_lock(&mut self, id: ImpostorId) -> bool {
        let granted = self.throttle.try_acquire();
        tracing::trace!(%id, granted, "Preload lock requested");
        granted
    }

    /// Hand out a `size`×`size` texture from the shared cache.
    pub fn get_render_texture(&mut self, owner: ImpostorId, size: u32) -> TextureId {
        self.cache.acquire(self.host.as_ref(), owner, size)
    }

    /// Return a texture to the cache's free list.
    pub fn give_back_render_texture(&mut self, id: TextureId) -> ImpostorResult<()> {
        self.cache.release(id)
    }

    /// Destroy every texture currently on the free list.
    pub fn reclaim(&mut self) -> ReclaimStats {
        self.cache.reclaim(self.host.as_ref())
    }

    /// Destroy every impostor, its object and every texture.
    pub fn teardown(&mut self) -> ReclaimStats {
        profile_function!();
        let impostors = self.impostors.drain();
        for impostor in &impostors {
            if self.host.object_position(impostor.object()).is_some() {
                self.host.destroy_object(impostor.object());
            }
        }
        self.objects.clear();
        let stats = self.cache.clear(self.host.as_ref());

        tracing::info!(
            impostors = impostors.len(),
            textures = stats.destroyed,
            freed_bytes = stats.freed_bytes,
            "Impostor manager torn down"
        );
        stats
    }

    pub fn set_active(&mut self, active: bool) {
        if self.config.active != active {
            tracing::info!(active, "Impostors toggled");
        }
        self.config.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.config.active
    }

    pub fn set_caching_policy(&mut self, caching: CachingPolicy) {
        self.config.caching = caching;
    }

    pub fn set_preload_rate(&mut self, preload_rate: u32) {
        self.config.preload_rate = preload_rate;
        self.throttle.budget = preload_rate;
    }

    /// Set the light that gates billboard shadows. Applied on the next frame.
    pub fn set_main_light(&mut self, light: Option<MainLight>) {
        self.main_light = light;
    }

    pub fn shadows_enabled(&self) -> bool {
        self.shadows_enabled
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn RenderHost> {
        &self.host
    }

    pub fn impostor(&self, id: ImpostorId) -> Option<&Impostor> {
        self.impostors.get(id.slot())
    }

    pub fn impostor_for(&self, object: ObjectId) -> Option<ImpostorId> {
        self.objects
            .get(&object)
            .copied()
            .filter(|id| self.impostors.contains(id.slot()))
    }

    pub fn ids(&self) -> Vec<ImpostorId> {
        self.impostors
            .slots()
            .into_iter()
            .map(ImpostorId::from_slot)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.impostors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impostors.is_empty()
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.cache
    }

    /// Bytes of GPU memory held by impostor textures, free ones included.
    pub fn texture_memory(&self) -> u64 {
        self.cache.memory_usage()
    }

    /// Frames run so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The camera of the last frame, or the one given to [`init`](Self::init).
    pub fn camera(&self) -> Option<&Camera> {
        self.view.as_ref().map(|view| &view.camera)
    }

    /// The wider camera that bounds the texture cache.
    pub fn caching_camera(&self) -> Option<&Camera> {
        self.view.as_ref().map(|view| &view.caching_camera)
    }
}
