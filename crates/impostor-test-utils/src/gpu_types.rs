//! GPU resource wrappers that can be real or mock.
//!
//! These types wrap WGPU resources and allow for both real GPU operations
//! and mock implementations for testing.

use bytemuck::{Pod, Zeroable};

/// Square colour + depth render target that holds one impostor snapshot.
///
/// # Design Pattern: Opaque Wrapper
///
/// This type hides whether it contains real `wgpu::Texture`s or a mock.
/// Cloning is cheap: wgpu textures are reference counted internally.
#[derive(Clone, Debug)]
pub struct GpuRenderTarget {
    inner: GpuRenderTargetInner,
}

#[derive(Clone, Debug)]
enum GpuRenderTargetInner {
    Real {
        color: wgpu::Texture,
        msaa: Option<wgpu::Texture>,
        depth: wgpu::Texture,
    },
    #[cfg(feature = "mock")]
    Mock {
        id: usize,
        size: u32,
        sample_count: u32,
    },
}

impl GpuRenderTarget {
    /// Create from real WGPU textures.
    ///
    /// `msaa` is the multisampled colour attachment that resolves into `color`,
    /// present only when the target is antialiased.
    pub fn from_wgpu(color: wgpu::Texture, msaa: Option<wgpu::Texture>, depth: wgpu::Texture) -> Self {
        Self {
            inner: GpuRenderTargetInner::Real { color, msaa, depth },
        }
    }

    /// Create mock render target (for testing)
    #[cfg(feature = "mock")]
    pub fn mock(id: usize, size: u32, sample_count: u32) -> Self {
        Self {
            inner: GpuRenderTargetInner::Mock {
                id,
                size,
                sample_count,
            },
        }
    }

    /// Edge length in pixels.
    pub fn size(&self) -> u32 {
        match &self.inner {
            GpuRenderTargetInner::Real { color, .. } => color.width(),
            #[cfg(feature = "mock")]
            GpuRenderTargetInner::Mock { size, .. } => *size,
        }
    }

    /// Sample count of the attachments that are rendered into.
    pub fn sample_count(&self) -> u32 {
        match &self.inner {
            GpuRenderTargetInner::Real { depth, .. } => depth.sample_count(),
            #[cfg(feature = "mock")]
            GpuRenderTargetInner::Mock { sample_count, .. } => *sample_count,
        }
    }

    /// Get the resolved colour texture the billboard samples from.
    ///
    /// # Panics
    /// Panics if this is a mock target (test code should never call this)
    pub fn color_texture(&self) -> &wgpu::Texture {
        match &self.inner {
            GpuRenderTargetInner::Real { color, .. } => color,
            #[cfg(feature = "mock")]
            GpuRenderTargetInner::Mock { .. } => {
                panic!("Attempted to get wgpu::Texture from mock render target")
            }
        }
    }

    /// Get the multisampled colour texture, if the target is antialiased.
    ///
    /// # Panics
    /// Panics if this is a mock target
    pub fn msaa_texture(&self) -> Option<&wgpu::Texture> {
        match &self.inner {
            GpuRenderTargetInner::Real { msaa, .. } => msaa.as_ref(),
            #[cfg(feature = "mock")]
            GpuRenderTargetInner::Mock { .. } => {
                panic!("Attempted to get wgpu::Texture from mock render target")
            }
        }
    }

    /// Get the depth texture.
    ///
    /// # Panics
    /// Panics if this is a mock target
    pub fn depth_texture(&self) -> &wgpu::Texture {
        match &self.inner {
            GpuRenderTargetInner::Real { depth, .. } => depth,
            #[cfg(feature = "mock")]
            GpuRenderTargetInner::Mock { .. } => {
                panic!("Attempted to get wgpu::Texture from mock render target")
            }
        }
    }

    /// Releases the GPU memory now instead of when the last clone drops.
    pub fn destroy(&self) {
        match &self.inner {
            GpuRenderTargetInner::Real { color, msaa, depth } => {
                color.destroy();
                if let Some(msaa) = msaa {
                    msaa.destroy();
                }
                depth.destroy();
            }
            #[cfg(feature = "mock")]
            GpuRenderTargetInner::Mock { .. } => {}
        }
    }

    /// Check if this is a mock
    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuRenderTargetInner::Mock { .. })
    }

    /// Get mock ID (for test assertions)
    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuRenderTargetInner::Mock { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Describes a square impostor render target.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDescriptor {
    pub label: Option<&'static str>,
    /// Edge length in pixels.
    pub size: u32,
    /// Antialiasing sample count (1, 2, 4 or 8).
    pub sample_count: u32,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
}

impl RenderTargetDescriptor {
    /// Default colour format of impostor targets.
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
    /// Default depth format of impostor targets (16 bit is plenty for a snapshot).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth16Unorm;

    pub fn square(size: u32) -> Self {
        Self {
            label: Some("Impostor Target"),
            size,
            sample_count: 1,
            color_format: Self::COLOR_FORMAT,
            depth_format: Self::DEPTH_FORMAT,
        }
    }

    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_formats(mut self, color: wgpu::TextureFormat, depth: wgpu::TextureFormat) -> Self {
        self.color_format = color;
        self.depth_format = depth;
        self
    }

    /// Approximate GPU memory in bytes: `size² × (colour + depth bytes) × samples`.
    pub fn memory_size(&self) -> u64 {
        let pixels = self.size as u64 * self.size as u64;
        let per_pixel = bytes_per_pixel(self.color_format) + bytes_per_pixel(self.depth_format);
        pixels * per_pixel * self.sample_count.max(1) as u64
    }
}

fn bytes_per_pixel(format: wgpu::TextureFormat) -> u64 {
    // Packed depth formats have no defined copy size; count them as 4 bytes.
    format.block_copy_size(None).unwrap_or(4) as u64
}

/// Per-proxy billboard data the host uploads to draw the stand-in quad.
///
/// ```wgsl
/// struct BillboardInstance {
///     model: mat4x4<f32>,
///     depth_bias: f32,
///     shadow_depth_bias: f32,
///     size: f32,
///     _padding: f32,
/// }
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BillboardInstance {
    /// Quad transform: centred on the object, facing the snapshot camera.
    pub model: [[f32; 4]; 4],
    /// Offset towards the camera to avoid z-fighting with the real geometry.
    pub depth_bias: f32,
    /// Offset applied when the quad is drawn into a shadow map.
    pub shadow_depth_bias: f32,
    /// Edge length of the quad in world units.
    pub size: f32,
    pub _padding: f32,
}
