//! Identifiers for host scene objects.
//!
//! These are plain values handed out by the host. The impostor system never
//! assumes they stay valid: liveness is always re-checked through
//! [`RenderHost::object_position`](crate::RenderHost::object_position).

use std::fmt;

/// A host scene object that may be displayed as an impostor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

/// A renderable component belonging to an object (or one of its children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RendererId(pub u64);

/// Visibility/render group tag of a renderer (a "layer").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RenderGroup(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl fmt::Display for RendererId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "renderer#{}", self.0)
    }
}
