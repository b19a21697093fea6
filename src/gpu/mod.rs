//! wgpu backend
//!
//! Concrete implementations of the effect's collaborators:
//! - `TexturePool` - temporary texture allocator keyed by buffer descriptor
//! - `Blitter` - fullscreen copy pipeline, one per target format
//! - `GpuFrame` - per-frame context tying device, encoder, pool and blitter
//! - `DatamoshKernel` - the three-pass WGSL corruption kernel

mod blit;
mod frame;
mod kernel;
mod texture_pool;

pub use blit::Blitter;
pub use frame::GpuFrame;
pub use kernel::DatamoshKernel;
pub use texture_pool::{check_budget, TexturePool};

use crate::buffer::{BufferDesc, Extent, PixelFormat};

impl PixelFormat {
    /// Matching wgpu texture format
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

/// A GPU image: host frame or pooled temporary
pub struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    extent: Extent,
    /// Descriptor the pool created it for (None for host frames)
    pooled: Option<BufferDesc>,
}

impl GpuImage {
    /// Wrap a host texture (source or destination frame)
    ///
    /// Sources need `TEXTURE_BINDING`, destinations `RENDER_ATTACHMENT`.
    pub fn from_texture(texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let extent = Extent::new(texture.width(), texture.height());
        Self {
            texture,
            view,
            extent,
            pooled: None,
        }
    }

    fn pooled(texture: wgpu::Texture, desc: BufferDesc) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            extent: desc.extent,
            pooled: Some(desc),
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    /// Whether the image came from a `TexturePool`
    pub fn is_pooled(&self) -> bool {
        self.pooled.is_some()
    }

    fn into_pooled(self) -> Result<(wgpu::Texture, BufferDesc), Self> {
        match self.pooled {
            Some(desc) => Ok((self.texture, desc)),
            None => Err(self),
        }
    }
}

impl std::fmt::Debug for GpuImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuImage")
            .field("extent", &self.extent)
            .field("format", &self.texture.format())
            .field("pooled", &self.pooled.is_some())
            .finish()
    }
}
