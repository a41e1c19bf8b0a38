//! Error types for the impostor system.

use crate::impostor::ImpostorId;
use crate::texture_cache::TextureId;
use impostor_test_utils::ObjectId;
use std::fmt;

/// Errors reported by the manager and the texture cache.
///
/// None of these abort a frame: the failing operation is skipped and the
/// condition is logged where it is detected.
#[derive(Debug, Clone, PartialEq)]
pub enum ImpostorError {
    /// An impostor was registered before the manager received a camera.
    NotInitialized,

    /// The host does not know the object.
    ObjectNotFound(ObjectId),

    /// The object has no renderers to capture.
    NoRenderers(ObjectId),

    /// The impostor handle refers to an impostor that no longer exists.
    StaleImpostor(ImpostorId),

    /// The texture handle refers to a texture that no longer exists.
    TextureNotFound(TextureId),

    /// A texture was given back with an empty render target.
    EmptyTexture(TextureId),

    /// A texture was given back while already on the free list.
    TextureAlreadyReleased(TextureId),

    /// A configuration value is out of range.
    InvalidConfig(String),
}

impl fmt::Display for ImpostorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpostorError::NotInitialized => {
                write!(f, "Impostor manager has no camera yet, call init() first")
            }
            ImpostorError::ObjectNotFound(object) => write!(f, "Object not found: {}", object),
            ImpostorError::NoRenderers(object) => {
                write!(f, "Object has no renderers to capture: {}", object)
            }
            ImpostorError::StaleImpostor(id) => write!(f, "Impostor {:?} no longer exists", id),
            ImpostorError::TextureNotFound(id) => write!(f, "Texture {:?} not found", id),
            ImpostorError::EmptyTexture(id) => write!(f, "Texture given back is empty: {:?}", id),
            ImpostorError::TextureAlreadyReleased(id) => {
                write!(f, "Texture {:?} was already given back", id)
            }
            ImpostorError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ImpostorError {}

/// Result type alias for impostor operations.
pub type ImpostorResult<T> = Result<T, ImpostorError>;
