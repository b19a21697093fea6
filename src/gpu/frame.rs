//! Per-frame GPU context
//!
//! Borrowed for the duration of one `process_frame` call. Every command the
//! effect records lands in the caller's encoder in call order, and pooled
//! textures released mid-frame stay alive until wgpu finishes with them.

use crate::buffer::{BufferAllocator, BufferDesc, Extent, RenderContext};
use crate::error::AllocError;

use super::{Blitter, GpuImage, TexturePool};

pub struct GpuFrame<'a> {
    device: &'a wgpu::Device,
    encoder: &'a mut wgpu::CommandEncoder,
    pool: &'a mut TexturePool,
    blitter: &'a mut Blitter,
}

impl<'a> GpuFrame<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        encoder: &'a mut wgpu::CommandEncoder,
        pool: &'a mut TexturePool,
        blitter: &'a mut Blitter,
    ) -> Self {
        Self {
            device,
            encoder,
            pool,
            blitter,
        }
    }

    pub fn device(&self) -> &'a wgpu::Device {
        self.device
    }

    pub fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        &mut *self.encoder
    }
}

impl BufferAllocator for GpuFrame<'_> {
    type Buffer = GpuImage;

    fn acquire(&mut self, desc: &BufferDesc) -> Result<GpuImage, AllocError> {
        self.pool.acquire(self.device, desc)
    }

    fn release(&mut self, buffer: GpuImage) {
        self.pool.release(buffer);
    }
}

impl RenderContext for GpuFrame<'_> {
    fn extent(&self, image: &GpuImage) -> Extent {
        image.extent()
    }

    fn blit(&mut self, source: &GpuImage, destination: &GpuImage) {
        self.blitter.blit(self.device, &mut *self.encoder, source, destination);
    }
}
