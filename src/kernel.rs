//! Corruption kernel interface
//!
//! The kernel is the image-transform capability that does the actual pixel
//! work. It is assumed pure given its inputs; all temporal state lives in the
//! buffers the pipeline feeds it.

use std::fmt;

use crate::buffer::RenderContext;
use crate::error::KernelError;
use crate::params::DatamoshParams;

/// Kernel pass selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelPass {
    /// Seed the displacement field from the motion source. No inputs.
    Seed,
    /// Advance the displacement field. Inputs: `[previous displacement]`.
    UpdateDisplacement,
    /// Displace and blend blocks onto the work buffer.
    /// Inputs: `[source, previous work, current displacement]`.
    Mosh,
}

impl KernelPass {
    pub const ALL: [KernelPass; 3] = [KernelPass::Seed, KernelPass::UpdateDisplacement, KernelPass::Mosh];

    /// Numeric pass index (0 = seed, 1 = update, 2 = mosh)
    pub fn index(self) -> u32 {
        match self {
            KernelPass::Seed => 0,
            KernelPass::UpdateDisplacement => 1,
            KernelPass::Mosh => 2,
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(KernelPass::Seed),
            1 => Some(KernelPass::UpdateDisplacement),
            2 => Some(KernelPass::Mosh),
            _ => None,
        }
    }

    /// Number of input images the pass reads
    pub fn input_count(self) -> usize {
        match self {
            KernelPass::Seed => 0,
            KernelPass::UpdateDisplacement => 1,
            KernelPass::Mosh => 3,
        }
    }
}

impl fmt::Display for KernelPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelPass::Seed => "seed",
            KernelPass::UpdateDisplacement => "update",
            KernelPass::Mosh => "mosh",
        };
        f.write_str(name)
    }
}

/// Scalar inputs for one frame's kernel passes
///
/// Laid out for direct upload as a uniform buffer (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelParams {
    /// Macroblock edge length in pixels
    pub block_size: u32,
    /// `1 - entropy`; lower quality means stronger degradation
    pub quality: f32,
    /// Multiplier applied to motion vectors on each update
    pub velocity_scale: f32,
    /// Amount of random displacement added on each update
    pub diffusion: f32,
    /// Frames processed since activation
    pub frame: u32,
    /// Per-instance noise seed in [0, 1)
    pub seed: f32,
    pub _pad: [u32; 2],
}

impl KernelParams {
    /// Snapshot the clamped parameter set for a frame
    pub fn from_params(params: &DatamoshParams, frame: u32, seed: f32) -> Self {
        Self {
            block_size: params.block_size(),
            quality: params.quality(),
            velocity_scale: params.velocity_scale(),
            diffusion: params.diffusion(),
            frame,
            seed,
            _pad: [0; 2],
        }
    }
}

/// The external corruption kernel
///
/// Generic over the render context so a backend can record passes into its
/// own command stream.
pub trait CorruptionKernel<C: RenderContext> {
    /// Record one kernel pass writing `output`
    ///
    /// `inputs` must hold exactly `pass.input_count()` images in the order
    /// documented on `KernelPass`.
    fn apply(
        &mut self,
        ctx: &mut C,
        pass: KernelPass,
        inputs: &[&C::Buffer],
        params: &KernelParams,
        output: &C::Buffer,
    ) -> Result<(), KernelError>;
}

/// Check the input arity for a pass
pub fn check_inputs(pass: KernelPass, got: usize) -> Result<(), KernelError> {
    let expected = pass.input_count();
    if got != expected {
        return Err(KernelError::MissingInput { pass, expected, got });
    }
    Ok(())
}
