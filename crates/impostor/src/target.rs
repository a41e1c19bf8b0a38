//! Render target creation for wgpu-backed hosts.
//!
//! A host implementing [`RenderHost`](impostor_test_utils::RenderHost) on top
//! of wgpu can forward `create_render_target` to [`create_wgpu_render_target`].

use impostor_test_utils::{GpuRenderTarget, RenderTargetDescriptor};

/// Create the textures of an impostor render target.
///
/// The colour texture is single-sampled so the billboard can sample it. With
/// `sample_count > 1` an extra multisampled colour attachment is created that
/// resolves into it, and the depth attachment is multisampled to match.
pub fn create_wgpu_render_target(
    device: &wgpu::Device,
    desc: &RenderTargetDescriptor,
) -> GpuRenderTarget {
    let size = wgpu::Extent3d {
        width: desc.size.max(1),
        height: desc.size.max(1),
        depth_or_array_layers: 1,
    };
    let sample_count = desc.sample_count.max(1);

    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: desc.label,
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: desc.color_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });

    let msaa = (sample_count > 1).then(|| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Impostor MSAA Texture"),
            size,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: desc.color_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    });

    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Impostor Depth Texture"),
        size,
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: desc.depth_format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });

    tracing::debug!(
        size = desc.size,
        sample_count,
        bytes = desc.memory_size(),
        "Created impostor render target"
    );

    GpuRenderTarget::from_wgpu(color, msaa, depth)
}
