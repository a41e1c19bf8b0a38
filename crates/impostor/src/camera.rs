//! Camera snapshot used by the impostor pass.
//!
//! The driver hands the manager a [`Camera`] every frame. The manager derives
//! the wider caching camera from it and extracts both frustums once, so every
//! impostor evaluated in a pass sees the same camera.
//!
//! # Example
//!
//! ```
//! use impostor::Camera;
//! use glam::Vec3;
//!
//! let mut camera = Camera::perspective(60.0, 16.0 / 9.0, 0.1, 1000.0, 1080.0);
//! camera.look_at(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y);
//!
//! let caching = camera.with_fov_scaled(2.0);
//! assert_eq!(caching.fov_y_degrees(), 120.0);
//! ```

use glam::{Mat4, Vec3};
use impostor_core::math::Frustum;

/// Largest vertical field of view a derived camera may get, in degrees.
pub const MAX_FOV_DEGREES: f32 = 179.0;

/// A perspective camera with the viewport height used for screen-size estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    position: Vec3,
    /// Target position to look at
    target: Vec3,
    /// Up vector (typically Vec3::Y)
    up: Vec3,
    fov_y_degrees: f32,
    aspect_ratio: f32,
    near: f32,
    far: f32,
    /// Viewport height in pixels
    viewport_height: f32,
}

impl Camera {
    /// Create a perspective camera.
    ///
    /// # Arguments
    ///
    /// * `fov_y_degrees` - Vertical field of view in degrees
    /// * `aspect_ratio` - Aspect ratio (width / height)
    /// * `near` - Near clip plane
    /// * `far` - Far clip plane
    /// * `viewport_height` - Height of the rendered viewport in pixels
    pub fn perspective(
        fov_y_degrees: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
        viewport_height: f32,
    ) -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 10.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: fov_y_degrees.clamp(f32::EPSILON, MAX_FOV_DEGREES),
            aspect_ratio,
            near,
            far,
            viewport_height,
        }
    }

    /// Set the camera to look at a target from a position.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.position = eye;
        self.target = target;
        self.up = up;
    }

    /// Move the camera, keeping its viewing direction.
    pub fn set_position(&mut self, position: Vec3) {
        let direction = self.target - self.position;
        self.position = position;
        self.target = position + direction;
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Get the forward direction (normalized vector from position to target).
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn fov_y_degrees(&self) -> f32 {
        self.fov_y_degrees
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn set_viewport(&mut self, aspect_ratio: f32, viewport_height: f32) {
        self.aspect_ratio = aspect_ratio;
        self.viewport_height = viewport_height;
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// A camera with the same pose and clip planes and a scaled field of view.
    pub fn with_fov_scaled(&self, factor: f32) -> Self {
        Self {
            fov_y_degrees: (self.fov_y_degrees * factor).clamp(f32::EPSILON, MAX_FOV_DEGREES),
            ..self.clone()
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect_ratio,
            self.near,
            self.far,
        )
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection_matrix())
    }
}
