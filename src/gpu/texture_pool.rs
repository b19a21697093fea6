//! GPU texture pool for effect temporaries
//!
//! Released textures go back on a free list keyed by their descriptor and are
//! handed out again by the next matching `acquire`, so steady-state frames
//! rotate through the same few textures without creating new ones.

use std::collections::HashMap;

use crate::buffer::BufferDesc;
use crate::config::PoolConfig;
use crate::error::AllocError;

use super::GpuImage;

/// Check a request against an optional byte budget
pub fn check_budget(budget: Option<u64>, held_bytes: u64, requested: u64) -> Result<(), AllocError> {
    match budget {
        Some(budget) if held_bytes.saturating_add(requested) > budget => Err(AllocError::BudgetExceeded {
            requested,
            available: budget.saturating_sub(held_bytes),
        }),
        _ => Ok(()),
    }
}

/// Pool of temporary textures
#[derive(Default)]
pub struct TexturePool {
    free: HashMap<BufferDesc, Vec<wgpu::Texture>>,
    config: PoolConfig,
    /// Bytes held by textures currently handed out
    live_bytes: u64,
    /// Bytes held by textures waiting on the free list
    idle_bytes: u64,
    created: u64,
}

impl TexturePool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn live_bytes(&self) -> u64 {
        self.live_bytes
    }

    pub fn idle_bytes(&self) -> u64 {
        self.idle_bytes
    }

    /// Bytes held by the pool in total, live and idle
    pub fn held_bytes(&self) -> u64 {
        self.live_bytes + self.idle_bytes
    }

    /// Textures waiting to be reused
    pub fn idle_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Textures created over the pool's lifetime
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Hand out a texture matching `desc`, reusing a released one if possible
    ///
    /// A new texture that would push held bytes past the budget first drops
    /// the idle textures; if live textures alone leave no room the request
    /// fails with `AllocError::BudgetExceeded`.
    pub fn acquire(&mut self, device: &wgpu::Device, desc: &BufferDesc) -> Result<GpuImage, AllocError> {
        if desc.extent.is_empty() {
            return Err(AllocError::ZeroSized {
                width: desc.extent.width,
                height: desc.extent.height,
            });
        }

        let bytes = desc.size_in_bytes();
        if let Some(texture) = self.free.get_mut(desc).and_then(Vec::pop) {
            // Idle -> live, total held bytes unchanged
            self.idle_bytes -= bytes;
            self.live_bytes += bytes;
            return Ok(GpuImage::pooled(texture, *desc));
        }

        let budget = self.config.budget_bytes;
        if self.idle_bytes > 0 && check_budget(budget, self.held_bytes(), bytes).is_err() {
            log::debug!("Texture pool over budget, dropping {} idle bytes", self.idle_bytes);
            self.clear();
        }
        check_budget(budget, self.held_bytes(), bytes)?;

        let texture = self.create_texture(device, desc)?;
        self.live_bytes += bytes;
        Ok(GpuImage::pooled(texture, *desc))
    }

    /// Return a texture to the free list
    ///
    /// Host frames that did not come from the pool are dropped with a warning.
    pub fn release(&mut self, image: GpuImage) {
        match image.into_pooled() {
            Ok((texture, desc)) => {
                let bytes = desc.size_in_bytes();
                self.live_bytes = self.live_bytes.saturating_sub(bytes);
                self.idle_bytes += bytes;
                self.free.entry(desc).or_default().push(texture);
            }
            Err(image) => {
                log::warn!("Ignoring release of non-pooled image {:?}", image);
            }
        }
    }

    /// Drop idle textures beyond the configured per-descriptor retention
    ///
    /// Call once per frame after submission.
    pub fn trim(&mut self) {
        let keep = self.config.max_idle_per_desc;
        let mut freed = 0;
        for (desc, textures) in self.free.iter_mut() {
            while textures.len() > keep {
                textures.pop();
                freed += desc.size_in_bytes();
            }
        }
        self.free.retain(|_, textures| !textures.is_empty());
        if freed > 0 {
            self.idle_bytes = self.idle_bytes.saturating_sub(freed);
            log::debug!("Texture pool trimmed {} bytes", freed);
        }
    }

    /// Drop every idle texture
    pub fn clear(&mut self) {
        self.free.clear();
        self.idle_bytes = 0;
    }

    fn create_texture(&mut self, device: &wgpu::Device, desc: &BufferDesc) -> Result<wgpu::Texture, AllocError> {
        let label = format!("Datamosh Temporary {}", self.created);

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: wgpu::Extent3d {
                width: desc.extent.width,
                height: desc.extent.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.to_wgpu(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            log::warn!("Texture allocation failed for {}: {}", desc, error);
            return Err(AllocError::OutOfMemory(*desc));
        }

        self.created += 1;
        Ok(texture)
    }
}
