//! Math types for culling and level-of-detail estimation.
//!
//! Vector and matrix types come from [`glam`]; this module adds the bounding
//! volume and frustum types used to test impostor visibility.
//!
//! ```
//! use impostor_core::math::{Aabb, Frustum, Mat4, Vec3};
//!
//! let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
//! let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
//! let frustum = Frustum::from_view_projection(proj * view);
//!
//! let ahead = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE);
//! assert!(frustum.intersects_aabb(&ahead));
//! ```

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

/// Smallest length treated as non-zero by distance and angle helpers.
pub const MIN_LENGTH: f32 = 1.0e-4;

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half_extents = half_extents.abs();
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Smallest box enclosing every box in `boxes`, or `None` if it is empty.
    pub fn union_all<I>(boxes: I) -> Option<Self>
    where
        I: IntoIterator<Item = Aabb>,
    {
        boxes.into_iter().reduce(|acc, b| acc.union(&b))
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> f32 {
        self.size().length()
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// A plane `normal · p + constant = 0`, with the normal pointing inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f32,
}

impl Plane {
    /// Builds a plane from `(a, b, c, d)` coefficients and normalizes it.
    pub fn from_coefficients(v: Vec4) -> Self {
        let normal = v.truncate();
        let length = normal.length();
        if length <= f32::EPSILON {
            return Self {
                normal,
                constant: v.w,
            };
        }
        Self {
            normal: normal / length,
            constant: v.w / length,
        }
    }

    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }
}

/// A view frustum defined by 6 inward-facing planes.
///
/// Order: left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes of a view-projection matrix.
    ///
    /// Expects the 0..1 clip depth range produced by glam's `*_rh` projections
    /// (the wgpu convention).
    pub fn from_view_projection(m: Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(center) >= -radius)
    }

    /// Conservative box test: tests the corner furthest along each plane normal.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let p = Vec3::new(
                if plane.normal.x > 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y > 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z > 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.distance_to_point(p) >= 0.0
        })
    }
}

/// Angle between two vectors in degrees.
///
/// Returns `0.0` when either vector is shorter than [`MIN_LENGTH`], so a
/// degenerate vector never produces NaN.
pub fn angle_between_degrees(a: Vec3, b: Vec3) -> f32 {
    let la = a.length();
    let lb = b.length();
    if la < MIN_LENGTH || lb < MIN_LENGTH {
        return 0.0;
    }
    let cos = (a.dot(b) / (la * lb)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}
