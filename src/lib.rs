//! Datamosh - real-time "datamoshing" post-processing effect
//!
//! Simulates the glitch produced when a video decoder keeps applying motion
//! compensation without ever being refreshed by an intra-frame: image content
//! smears along motion vectors, block by block.
//!
//! # Architecture
//!
//! - **Parameters** (`params.rs`): clamped, host-tunable effect inputs
//! - **Buffers** (`buffer.rs`): buffer descriptors plus the allocator and
//!   render-context traits the effect is written against
//! - **Controller** (`controller.rs`): owns the work/displacement buffer pair
//!   and the COLD/WARM state machine
//! - **Kernel** (`kernel.rs`): the corruption kernel trait and its per-frame
//!   scalar parameters
//! - **Pipeline** (`pipeline.rs`): `DatamoshEffect`, the per-frame driver
//! - **GPU** (`gpu/`): wgpu implementation of the allocator, blit and kernel
//!
//! # Usage
//!
//! ```ignore
//! let kernel = DatamoshKernel::new(&device, config.work_format.to_wgpu());
//! let mut effect = DatamoshEffect::new(kernel, &config);
//! effect.params_mut().set_enabled(true);
//! effect.activate();
//!
//! // every frame
//! let mut frame = GpuFrame::new(&device, &mut encoder, &mut pool, &mut blitter);
//! effect.process_frame(&mut frame, &source, &destination);
//!
//! // shutdown
//! effect.deactivate(&mut frame);
//! ```

pub mod buffer;
pub mod config;
pub mod controller;
pub mod error;
pub mod gpu;
pub mod kernel;
pub mod params;
pub mod pipeline;

pub use buffer::{BufferAllocator, BufferDesc, Extent, FilterMode, PixelFormat, RenderContext};
pub use config::{EffectConfig, PoolConfig};
pub use controller::{BufferController, BufferPair, ControllerStats, Phase, PipelineState};
pub use error::{AllocError, ConfigError, FrameError, KernelError};
pub use kernel::{CorruptionKernel, KernelParams, KernelPass};
pub use params::{DatamoshParams, ParameterMeta, ParameterValue};
pub use pipeline::{DatamoshEffect, EffectStats, FrameOutcome, PassthroughReason};
