//! Frame pipeline
//!
//! `DatamoshEffect` is the explicit state object a host drives once per
//! frame. It reads the parameter store, asks the controller for buffers and
//! records the kernel passes in order:
//!
//! ```text
//! COLD: source -> work -> destination, seed -> displacement        => WARM
//! WARM: update(displacement) -> displacement'
//!       mosh(source, work, displacement') -> work' -> destination
//! ```
//!
//! Every failure degrades to a passthrough of the source frame.

use crate::buffer::{Extent, PixelFormat, RenderContext};
use crate::config::EffectConfig;
use crate::controller::{BufferController, Phase};
use crate::error::{FrameError, KernelError};
use crate::kernel::{CorruptionKernel, KernelParams, KernelPass};
use crate::params::DatamoshParams;

/// Why a frame was forwarded untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    /// `activate()` has not been called (or `deactivate()` was)
    NotActivated,
    /// The `enabled` parameter is off
    Disabled,
    /// The corruption kernel failed to resolve at construction
    KernelUnavailable,
}

/// What happened to a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Cold frame: buffers initialised, output equals source
    Seeded,
    /// Warm frame: moshed output
    Moshed,
    /// Effect inactive; output equals source
    Passthrough(PassthroughReason),
    /// The frame failed and was forwarded; the loop restarts cold next frame
    Degraded(FrameError),
}

impl FrameOutcome {
    /// Whether the destination holds an unmodified copy of the source
    pub fn is_passthrough(&self) -> bool {
        !matches!(self, FrameOutcome::Moshed)
    }
}

/// Per-effect frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectStats {
    pub frames: u64,
    pub cold_frames: u64,
    pub warm_frames: u64,
    pub passthrough_frames: u64,
    pub degraded_frames: u64,
}

/// The datamosh post-processing effect
///
/// Generic over the image handle type `B` and the corruption kernel `K`.
/// Each instance owns an independent buffer pair; viewports that need the
/// effect each get their own instance.
pub struct DatamoshEffect<B, K> {
    params: DatamoshParams,
    kernel: Option<K>,
    controller: BufferController<B>,
    work_format: PixelFormat,
    activated: bool,
    /// Frames processed since the last activation
    frame: u32,
    seed: f32,
    stats: EffectStats,
}

impl<B, K> DatamoshEffect<B, K> {
    /// Create an effect from a kernel resolution result
    ///
    /// An unresolved kernel is not an error here: the effect is constructed
    /// permanently inactive and passes frames through.
    pub fn new(kernel: Result<K, KernelError>, config: &EffectConfig) -> Self {
        let kernel = match kernel {
            Ok(kernel) => Some(kernel),
            Err(e) => {
                log::warn!("Datamosh kernel unavailable, effect will pass frames through: {}", e);
                None
            }
        };

        Self {
            params: DatamoshParams::default(),
            kernel,
            controller: BufferController::new(),
            work_format: config.work_format,
            activated: false,
            frame: 0,
            seed: rand::random::<f32>(),
            stats: EffectStats::default(),
        }
    }

    /// Create an effect around an already resolved kernel
    pub fn with_kernel(kernel: K, config: &EffectConfig) -> Self {
        Self::new(Ok(kernel), config)
    }

    pub fn params(&self) -> &DatamoshParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut DatamoshParams {
        &mut self.params
    }

    pub fn kernel(&self) -> Option<&K> {
        self.kernel.as_ref()
    }

    pub fn kernel_mut(&mut self) -> Option<&mut K> {
        self.kernel.as_mut()
    }

    pub fn controller(&self) -> &BufferController<B> {
        &self.controller
    }

    pub fn phase(&self) -> Phase {
        self.controller.phase()
    }

    pub fn stats(&self) -> EffectStats {
        self.stats
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Whether frames would be moshed: enabled, kernel resolved, block size set
    pub fn is_active(&self) -> bool {
        self.params.enabled() && self.kernel.is_some() && self.params.block_size() > 0
    }

    fn inactive_reason(&self) -> Option<PassthroughReason> {
        if !self.activated {
            Some(PassthroughReason::NotActivated)
        } else if self.kernel.is_none() {
            Some(PassthroughReason::KernelUnavailable)
        } else if !self.is_active() {
            Some(PassthroughReason::Disabled)
        } else {
            None
        }
    }

    /// Start accepting frames; the first active frame runs cold
    pub fn activate(&mut self) {
        if !self.activated {
            log::debug!("Datamosh activated");
        }
        self.activated = true;
        self.frame = 0;
    }

    /// Release all buffers and stop processing
    pub fn deactivate<C>(&mut self, ctx: &mut C)
    where
        C: RenderContext<Buffer = B>,
    {
        self.controller.teardown(ctx);
        if self.activated {
            log::debug!("Datamosh deactivated after {} frames", self.frame);
        }
        self.activated = false;
    }

    /// Drop the feedback state so the next frame starts cold (e.g. camera cut)
    pub fn reset<C>(&mut self, ctx: &mut C)
    where
        C: RenderContext<Buffer = B>,
    {
        self.controller.teardown(ctx);
    }

    /// Process one frame, fully populating `destination`
    pub fn process_frame<C>(&mut self, ctx: &mut C, source: &B, destination: &B) -> FrameOutcome
    where
        C: RenderContext<Buffer = B>,
        K: CorruptionKernel<C>,
    {
        self.stats.frames += 1;

        if let Some(reason) = self.inactive_reason() {
            ctx.blit(source, destination);
            self.stats.passthrough_frames += 1;
            return FrameOutcome::Passthrough(reason);
        }

        let extent = ctx.extent(source);
        let block_size = self.params.block_size();
        if self.controller.is_allocated() && !self.controller.matches(extent, block_size, self.work_format) {
            log::debug!("Datamosh frame shape changed to {} / block {}, restarting cold", extent, block_size);
            self.controller.teardown(ctx);
        }

        let frame = self.frame;
        let params = KernelParams::from_params(&self.params, frame, self.seed);
        let result = match self.controller.phase() {
            Phase::Cold => self.cold_frame(ctx, extent, source, destination, &params),
            Phase::Warm => self.warm_frame(ctx, source, destination, &params),
        };
        self.frame = frame.wrapping_add(1);

        match result {
            Ok(Phase::Cold) => {
                self.stats.cold_frames += 1;
                FrameOutcome::Seeded
            }
            Ok(Phase::Warm) => {
                self.stats.warm_frames += 1;
                FrameOutcome::Moshed
            }
            Err(e) => {
                log::warn!("Datamosh frame {} failed, passing source through: {}", frame, e);
                self.controller.teardown(ctx);
                ctx.blit(source, destination);
                self.stats.degraded_frames += 1;
                FrameOutcome::Degraded(e)
            }
        }
    }

    /// Returns the phase the frame ran in
    fn cold_frame<C>(
        &mut self,
        ctx: &mut C,
        extent: Extent,
        source: &B,
        destination: &B,
        params: &KernelParams,
    ) -> Result<Phase, FrameError>
    where
        C: RenderContext<Buffer = B>,
        K: CorruptionKernel<C>,
    {
        let kernel = self
            .kernel
            .as_mut()
            .ok_or_else(|| KernelError::Unavailable("kernel not resolved".into()))?;

        let pair = self
            .controller
            .ensure_cold(ctx, extent, params.block_size, self.work_format)?;

        // Motion data may be garbage on the first frame (camera cut, fresh
        // activation), so the cold frame forwards the source unmodified.
        ctx.blit(source, pair.work());
        ctx.blit(pair.work(), destination);
        kernel.apply(ctx, KernelPass::Seed, &[], params, pair.displacement())?;

        self.controller.mark_warm();
        Ok(Phase::Cold)
    }

    fn warm_frame<C>(&mut self, ctx: &mut C, source: &B, destination: &B, params: &KernelParams) -> Result<Phase, FrameError>
    where
        C: RenderContext<Buffer = B>,
        K: CorruptionKernel<C>,
    {
        let kernel = self
            .kernel
            .as_mut()
            .ok_or_else(|| KernelError::Unavailable("kernel not resolved".into()))?;

        self.controller.rotate_displacement(ctx, |ctx, previous, next| {
            kernel.apply(ctx, KernelPass::UpdateDisplacement, &[previous], params, next)
        })?;

        self.controller.rotate_work(ctx, |ctx, previous, next, displacement| {
            kernel.apply(ctx, KernelPass::Mosh, &[source, previous, displacement], params, next)
        })?;

        let work = self.controller.warm_work()?;
        ctx.blit(work, destination);
        Ok(Phase::Warm)
    }
}
