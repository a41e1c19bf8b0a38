//! Shared pool of square impostor render targets.
//!
//! Textures are handed out by exact size and come back to a free list when a
//! proxy lets go of them. Nothing is destroyed on release: GPU memory is only
//! freed by an explicit [`TextureCache::reclaim`] pass, so objects flickering
//! in and out of view recycle targets instead of reallocating them.

use crate::error::{ImpostorError, ImpostorResult};
use crate::impostor::ImpostorId;
use impostor_core::alloc::sparse_set::{IndexSlot, SparseSet};
use impostor_core::profiling::profile_function;
use impostor_test_utils::{GpuRenderTarget, RenderHost, RenderTargetDescriptor};

/// Handle to a texture owned by a [`TextureCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(IndexSlot);

/// A render target tracked by the cache.
#[derive(Debug)]
pub struct ImpostorTexture {
    /// Impostor whose proxy currently holds the texture. `None` while free.
    owner: Option<ImpostorId>,
    /// Edge length in pixels.
    size: u32,
    target: Option<GpuRenderTarget>,
    /// Bytes accounted for this texture in the cache's memory counter.
    memory: u64,
    created_at: u64,
    last_used_at: u64,
}

impl ImpostorTexture {
    pub fn owner(&self) -> Option<ImpostorId> {
        self.owner
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn target(&self) -> Option<&GpuRenderTarget> {
        self.target.as_ref()
    }

    pub fn memory_size(&self) -> u64 {
        self.memory
    }

    /// Frame the texture was allocated in.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Last frame the texture was handed out or rendered into.
    pub fn last_used_at(&self) -> u64 {
        self.last_used_at
    }
}

/// Point-in-time counters of a [`TextureCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureCacheStats {
    pub textures: usize,
    pub in_use: usize,
    pub free: usize,
    pub memory_bytes: u64,
}

/// Result of a reclamation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReclaimStats {
    pub destroyed: usize,
    pub freed_bytes: u64,
}

/// Pool of square render targets shared by every proxy of a manager.
pub struct TextureCache {
    textures: SparseSet<ImpostorTexture>,
    /// Released textures in release order. Everything else is in use.
    free: Vec<TextureId>,
    /// Running GPU memory estimate of every tracked texture, in bytes.
    memory: u64,
    frame: u64,
    /// Descriptor new targets are created from; only the size changes.
    template: RenderTargetDescriptor,
}

impl TextureCache {
    pub fn new(template: RenderTargetDescriptor) -> Self {
        Self {
            textures: SparseSet::new(),
            free: Vec::new(),
            memory: 0,
            frame: 0,
            template,
        }
    }

    /// Set the frame counter used to stamp textures.
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    /// Hand out a texture of exactly `size`×`size` pixels to `owner`.
    ///
    /// Reuses the oldest free texture of that size, otherwise allocates a new
    /// render target through the host.
    pub fn acquire(&mut self, host: &dyn RenderHost, owner: ImpostorId, size: u32) -> TextureId {
        profile_function!();
        let size = size.max(1);

        let reusable = self.free.iter().position(|id| {
            self.textures
                .get(id.0)
                .is_some_and(|texture| texture.size == size)
        });
        if let Some(position) = reusable {
            let id = self.free.remove(position);
            if let Some(texture) = self.textures.get_mut(id.0) {
                texture.owner = Some(owner);
                texture.last_used_at = self.frame;
            }
            tracing::trace!(?id, size, ?owner, "Reusing impostor texture");
            return id;
        }

        let desc = RenderTargetDescriptor {
            size,
            ..self.template.clone()
        };
        let memory = desc.memory_size();
        let target = host.create_render_target(&desc);
        let id = TextureId(self.textures.push(ImpostorTexture {
            owner: Some(owner),
            size,
            target: Some(target),
            memory,
            created_at: self.frame,
            last_used_at: self.frame,
        }));
        self.memory += memory;

        tracing::debug!(
            ?id,
            size,
            bytes = memory,
            total_bytes = self.memory,
            "Allocated impostor texture"
        );
        id
    }

    /// Put a texture back on the free list. The render target is kept alive.
    ///
    /// Releasing an unknown, empty or already free texture is reported and
    /// leaves the cache untouched.
    pub fn release(&mut self, id: TextureId) -> ImpostorResult<()> {
        let Some(texture) = self.textures.get_mut(id.0) else {
            tracing::error!(?id, "Texture given back is unknown");
            return Err(ImpostorError::TextureNotFound(id));
        };
        if texture.target.is_none() {
            tracing::error!(?id, "Texture given back is empty!");
            return Err(ImpostorError::EmptyTexture(id));
        }
        if texture.owner.is_none() {
            tracing::error!(?id, "Texture given back twice");
            return Err(ImpostorError::TextureAlreadyReleased(id));
        }

        texture.owner = None;
        self.free.push(id);
        tracing::trace!(?id, size = texture.size, "Released impostor texture");
        Ok(())
    }

    /// Destroy every free texture and drop it from the cache.
    ///
    /// Textures in use are never touched. Meant to run rarely (on demand or
    /// every few hundred frames) since GPU deallocation is expensive.
    pub fn reclaim(&mut self, host: &dyn RenderHost) -> ReclaimStats {
        profile_function!();
        let mut stats = ReclaimStats::default();

        for id in std::mem::take(&mut self.free) {
            if let Some(texture) = self.textures.remove(id.0) {
                stats.destroyed += 1;
                stats.freed_bytes += texture.memory;
                self.memory -= texture.memory;
                if let Some(target) = texture.target {
                    host.destroy_render_target(target);
                }
            }
        }

        if stats.destroyed > 0 {
            tracing::debug!(
                destroyed = stats.destroyed,
                freed_bytes = stats.freed_bytes,
                remaining_bytes = self.memory,
                "Reclaimed impostor textures"
            );
        }
        stats
    }

    /// Destroy every texture, in use or free.
    pub fn clear(&mut self, host: &dyn RenderHost) -> ReclaimStats {
        let mut stats = ReclaimStats::default();
        for texture in self.textures.drain() {
            stats.destroyed += 1;
            stats.freed_bytes += texture.memory;
            if let Some(target) = texture.target {
                host.destroy_render_target(target);
            }
        }
        self.free.clear();
        self.memory = 0;
        stats
    }

    /// Mark a texture as used in the current frame.
    pub fn touch(&mut self, id: TextureId) {
        if let Some(texture) = self.textures.get_mut(id.0) {
            texture.last_used_at = self.frame;
        }
    }

    pub fn get(&self, id: TextureId) -> Option<&ImpostorTexture> {
        self.textures.get(id.0)
    }

    pub fn target(&self, id: TextureId) -> Option<&GpuRenderTarget> {
        self.get(id).and_then(ImpostorTexture::target)
    }

    pub fn is_free(&self, id: TextureId) -> bool {
        self.free.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.textures.len() - self.free.len()
    }

    /// Estimated GPU memory of all tracked textures, in bytes.
    pub fn memory_usage(&self) -> u64 {
        self.memory
    }

    /// Memory of the textures currently handed out.
    pub fn in_use_memory(&self) -> u64 {
        self.textures
            .iter()
            .filter(|(_, texture)| texture.owner.is_some())
            .map(|(_, texture)| texture.memory)
            .sum()
    }

    pub fn stats(&self) -> TextureCacheStats {
        TextureCacheStats {
            textures: self.len(),
            in_use: self.in_use_count(),
            free: self.free_count(),
            memory_bytes: self.memory,
        }
    }
}
