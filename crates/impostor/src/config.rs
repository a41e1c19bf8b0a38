//! Global and per-object impostor configuration.
//!
//! Both are plain values set once at initialization. [`ManagerConfig`] is
//! validated by [`ImpostorManager::new`](crate::ImpostorManager::new),
//! [`ImpostorSettings`] when an object is registered.

use crate::error::{ImpostorError, ImpostorResult};
use impostor_test_utils::{RenderGroup, RenderTargetDescriptor};
use std::num::NonZeroU64;

/// What happens to the texture of an impostor that leaves the primary frustum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachingPolicy {
    /// Release the texture as soon as the impostor leaves the primary frustum.
    #[default]
    Discard,
    /// Keep the texture while the impostor is inside the caching frustum, but
    /// never re-render it off-screen.
    Cache,
    /// Keep the texture and re-render stale off-screen impostors inside the
    /// caching frustum, throttled per frame.
    PreloadAndCache,
}

/// How an impostor decides between real geometry and its billboard.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LodMethod {
    /// Billboard when the camera is further away than `max_distance`.
    Distance { max_distance: f32 },
    /// Billboard when the estimated on-screen size drops below the maximum
    /// texture size.
    #[default]
    ScreenSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

/// The scene's main light, used to decide whether billboards cast shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainLight {
    pub kind: LightKind,
    pub enabled: bool,
    pub casts_shadows: bool,
}

impl MainLight {
    pub fn directional(casts_shadows: bool) -> Self {
        Self {
            kind: LightKind::Directional,
            enabled: true,
            casts_shadows,
        }
    }

    /// Billboard shadows are only approximated for an enabled, shadow-casting
    /// directional light.
    pub fn supports_billboard_shadows(&self) -> bool {
        self.enabled && self.casts_shadows && self.kind == LightKind::Directional
    }
}

/// Largest power of two not greater than `n` (`0` maps to `1`).
pub fn floor_power_of_two(n: u32) -> u32 {
    if n == 0 {
        1
    } else {
        1 << (31 - n.leading_zeros())
    }
}

/// Configuration shared by every impostor of a manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Global kill-switch. When off, every impostor shows its real geometry.
    pub active: bool,
    /// Render group captured renderers are moved to while their billboard is shown.
    pub impostor_group: RenderGroup,
    /// Sample count of impostor render targets.
    pub antialiasing: u32,
    /// Allow billboards to cast shadows (still gated by the main light).
    pub cast_shadows: bool,
    pub caching: CachingPolicy,
    /// Field of view multiplier of the caching camera.
    pub preload_fov_factor: f32,
    /// Off-screen re-renders allowed per frame under [`CachingPolicy::PreloadAndCache`].
    pub preload_rate: u32,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    /// Reclaim free textures every this many frames. `None` leaves reclamation
    /// to explicit [`reclaim`](crate::ImpostorManager::reclaim) calls.
    pub reclaim_interval: Option<NonZeroU64>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            active: true,
            impostor_group: RenderGroup(30),
            antialiasing: 2,
            cast_shadows: false,
            caching: CachingPolicy::Discard,
            preload_fov_factor: 2.0,
            preload_rate: 5,
            color_format: RenderTargetDescriptor::COLOR_FORMAT,
            depth_format: RenderTargetDescriptor::DEPTH_FORMAT,
            reclaim_interval: None,
        }
    }
}

impl ManagerConfig {
    pub fn with_caching(mut self, caching: CachingPolicy) -> Self {
        self.caching = caching;
        self
    }

    pub fn with_preload_rate(mut self, preload_rate: u32) -> Self {
        self.preload_rate = preload_rate;
        self
    }

    pub fn with_preload_fov_factor(mut self, factor: f32) -> Self {
        self.preload_fov_factor = factor;
        self
    }

    pub fn with_antialiasing(mut self, samples: u32) -> Self {
        self.antialiasing = samples;
        self
    }

    pub fn with_cast_shadows(mut self, cast_shadows: bool) -> Self {
        self.cast_shadows = cast_shadows;
        self
    }

    pub fn with_impostor_group(mut self, group: RenderGroup) -> Self {
        self.impostor_group = group;
        self
    }

    pub fn with_reclaim_interval(mut self, frames: u64) -> Self {
        self.reclaim_interval = NonZeroU64::new(frames);
        self
    }

    pub fn validate(&self) -> ImpostorResult<()> {
        if !matches!(self.antialiasing, 1 | 2 | 4 | 8) {
            return Err(ImpostorError::InvalidConfig(format!(
                "antialiasing must be 1, 2, 4 or 8 samples, got {}",
                self.antialiasing
            )));
        }
        if !self.preload_fov_factor.is_finite() || self.preload_fov_factor <= 0.0 {
            return Err(ImpostorError::InvalidConfig(format!(
                "preload_fov_factor must be positive, got {}",
                self.preload_fov_factor
            )));
        }
        Ok(())
    }

    /// Descriptor for a render target of edge length `size`.
    pub fn target_descriptor(&self, size: u32) -> RenderTargetDescriptor {
        RenderTargetDescriptor::square(size)
            .with_sample_count(self.antialiasing)
            .with_formats(self.color_format, self.depth_format)
    }
}

/// Per-object impostor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpostorSettings {
    /// Upper bound of the snapshot resolution; rounded down to a power of two.
    pub max_texture_size: u32,
    pub lod: LodMethod,
    /// Camera angle change in degrees that makes a snapshot stale.
    pub angle_tolerance: f32,
    /// Camera distance change, in percent of the last distance, that makes a
    /// snapshot stale.
    pub distance_tolerance: f32,
    /// Billboard offset towards the camera.
    pub z_offset: f32,
    pub cast_shadow: bool,
    pub shadow_z_offset: f32,
    pub max_shadow_distance: f32,
    /// Shadow resolution is divided by `1 << shadow_downsampling`.
    pub shadow_downsampling: u32,
}

impl Default for ImpostorSettings {
    fn default() -> Self {
        Self {
            max_texture_size: 256,
            lod: LodMethod::ScreenSize,
            angle_tolerance: 2.5,
            distance_tolerance: 15.0,
            z_offset: 0.25,
            cast_shadow: false,
            shadow_z_offset: 0.25,
            max_shadow_distance: 1.0,
            shadow_downsampling: 2,
        }
    }
}

impl ImpostorSettings {
    pub fn with_lod(mut self, lod: LodMethod) -> Self {
        self.lod = lod;
        self
    }

    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    pub fn with_tolerances(mut self, angle_degrees: f32, distance_percent: f32) -> Self {
        self.angle_tolerance = angle_degrees;
        self.distance_tolerance = distance_percent;
        self
    }

    pub fn with_cast_shadow(mut self, cast_shadow: bool) -> Self {
        self.cast_shadow = cast_shadow;
        self
    }

    pub fn shadow_divider(&self) -> u32 {
        1 << self.shadow_downsampling.min(31)
    }

    pub fn validate(&self) -> ImpostorResult<()> {
        let finite_non_negative = [
            ("angle_tolerance", self.angle_tolerance),
            ("distance_tolerance", self.distance_tolerance),
            ("max_shadow_distance", self.max_shadow_distance),
        ];
        for (name, value) in finite_non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ImpostorError::InvalidConfig(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if !self.z_offset.is_finite() || !self.shadow_z_offset.is_finite() {
            return Err(ImpostorError::InvalidConfig("z offsets must be finite".into()));
        }
        if let LodMethod::Distance { max_distance } = self.lod
            && (!max_distance.is_finite() || max_distance < 0.0)
        {
            return Err(ImpostorError::InvalidConfig(format!(
                "max_distance must be finite and non-negative, got {}",
                max_distance
            )));
        }
        Ok(())
    }

    /// Copy with `max_texture_size` forced to a power of two.
    pub fn sanitized(&self) -> Self {
        Self {
            max_texture_size: floor_power_of_two(self.max_texture_size),
            ..self.clone()
        }
    }
}
