//! Buffer descriptors and the host-facing resource traits
//!
//! The effect never creates textures itself. It asks a `BufferAllocator` for
//! temporaries and records copies through a `RenderContext`; the `gpu` module
//! implements both on wgpu.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AllocError;

/// Width and height of an image in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Extent of a per-macroblock buffer: integer division by the block size.
    ///
    /// Axes that would divide to zero are clamped to one texel so frames
    /// smaller than a macroblock still get a single displacement cell.
    pub fn per_block(self, block_size: u32) -> Self {
        let block = block_size.max(1);
        Self {
            width: (self.width / block).max(1),
            height: (self.height / block).max(1),
        }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn texel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel formats the effect allocates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit normalized RGBA (work buffer default)
    #[default]
    Rgba8Unorm,
    /// Half-precision RGBA (displacement buffer)
    Rgba16Float,
}

impl PixelFormat {
    pub fn bytes_per_texel(self) -> u64 {
        match self {
            PixelFormat::Rgba8Unorm => 4,
            PixelFormat::Rgba16Float => 8,
        }
    }
}

/// Sampling filter a buffer is read with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Linear,
    Nearest,
}

/// Everything an allocator needs to hand out a temporary buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub extent: Extent,
    pub format: PixelFormat,
    pub filter: FilterMode,
}

impl BufferDesc {
    /// Full-resolution accumulation buffer
    pub fn work(source: Extent, format: PixelFormat) -> Self {
        Self {
            extent: source,
            format,
            filter: FilterMode::Linear,
        }
    }

    /// One texel per macroblock, point-sampled, half-float vectors
    pub fn displacement(source: Extent, block_size: u32) -> Self {
        Self {
            extent: source.per_block(block_size),
            format: PixelFormat::Rgba16Float,
            filter: FilterMode::Nearest,
        }
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.extent.texel_count() * self.format.bytes_per_texel()
    }
}

impl fmt::Display for BufferDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} ({:?})", self.extent, self.format, self.filter)
    }
}

/// Temporary-buffer allocator
///
/// `release` takes the handle by value: once released, the effect can no
/// longer name the buffer. Implementations may recycle it for a later
/// `acquire` in the same frame, provided command order is respected.
pub trait BufferAllocator {
    /// Handle to a GPU-resident image
    type Buffer;

    fn acquire(&mut self, desc: &BufferDesc) -> Result<Self::Buffer, AllocError>;

    fn release(&mut self, buffer: Self::Buffer);
}

/// Per-frame command recording context
///
/// Source and destination frames supplied by the host use the same handle
/// type as allocated buffers.
pub trait RenderContext: BufferAllocator {
    /// Dimensions of an image
    fn extent(&self, image: &Self::Buffer) -> Extent;

    /// Record a plain copy of `source` into `destination`
    fn blit(&mut self, source: &Self::Buffer, destination: &Self::Buffer);
}
