//! Buffer lifecycle controller
//!
//! Owns the work and displacement buffers across frames and decides when they
//! are allocated, replaced and released. Buffers are never written in place:
//! every update acquires a replacement, lets the caller write it while the
//! previous buffer is still readable, then releases the previous one.

use crate::buffer::{BufferAllocator, BufferDesc, Extent, PixelFormat};
use crate::error::{AllocError, FrameError, KernelError};

/// Lifecycle phase of the feedback loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No valid prior-frame buffers
    Cold,
    /// Both buffers hold valid prior-frame content
    Warm,
}

/// Borrowed view of the controller state
#[derive(Debug)]
pub enum PipelineState<'a, B> {
    Cold,
    Warm { work: &'a B, displacement: &'a B },
}

/// The work/displacement buffers, always held together
#[derive(Debug)]
pub struct BufferPair<B> {
    work: B,
    displacement: B,
    source: Extent,
    block_size: u32,
    work_format: PixelFormat,
}

impl<B> BufferPair<B> {
    pub fn work(&self) -> &B {
        &self.work
    }

    pub fn displacement(&self) -> &B {
        &self.displacement
    }

    /// Source dimensions the pair was sized for
    pub fn source_extent(&self) -> Extent {
        self.source
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn work_desc(&self) -> BufferDesc {
        BufferDesc::work(self.source, self.work_format)
    }

    pub fn displacement_desc(&self) -> BufferDesc {
        BufferDesc::displacement(self.source, self.block_size)
    }

    /// Whether the pair can serve a frame of this shape
    pub fn matches(&self, source: Extent, block_size: u32, work_format: PixelFormat) -> bool {
        self.source == source && self.block_size == block_size && self.work_format == work_format
    }
}

/// Allocation bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Buffers acquired from the allocator
    pub acquired: u64,
    /// Buffers handed back to the allocator
    pub released: u64,
    /// Successful buffer replacements on warm frames
    pub rotations: u64,
}

impl ControllerStats {
    /// Buffers currently held
    pub fn live(&self) -> u64 {
        self.acquired - self.released
    }
}

/// Owns the buffer pair and the COLD/WARM state
///
/// The pair is either fully present or absent. `written` marks a pair that a
/// completed cold frame has populated; a pair allocated this frame but not yet
/// written still counts as cold.
#[derive(Debug)]
pub struct BufferController<B> {
    pair: Option<BufferPair<B>>,
    written: bool,
    stats: ControllerStats,
}

impl<B> Default for BufferController<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> BufferController<B> {
    pub fn new() -> Self {
        Self {
            pair: None,
            written: false,
            stats: ControllerStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.written && self.pair.is_some() {
            Phase::Warm
        } else {
            Phase::Cold
        }
    }

    pub fn state(&self) -> PipelineState<'_, B> {
        match (&self.pair, self.written) {
            (Some(pair), true) => PipelineState::Warm {
                work: &pair.work,
                displacement: &pair.displacement,
            },
            _ => PipelineState::Cold,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.pair.is_some()
    }

    /// Currently held buffers, warm or freshly allocated
    pub fn buffers(&self) -> Option<&BufferPair<B>> {
        self.pair.as_ref()
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Whether held buffers (if any) still fit the frame
    pub fn matches(&self, source: Extent, block_size: u32, work_format: PixelFormat) -> bool {
        self.pair
            .as_ref()
            .is_some_and(|pair| pair.matches(source, block_size, work_format))
    }

    fn acquire<A>(stats: &mut ControllerStats, alloc: &mut A, desc: &BufferDesc) -> Result<B, AllocError>
    where
        A: BufferAllocator<Buffer = B>,
    {
        let buffer = alloc.acquire(desc)?;
        stats.acquired += 1;
        Ok(buffer)
    }

    fn release<A>(stats: &mut ControllerStats, alloc: &mut A, buffer: B)
    where
        A: BufferAllocator<Buffer = B>,
    {
        alloc.release(buffer);
        stats.released += 1;
    }

    /// Allocate a fresh, unwritten pair for a cold frame
    ///
    /// Whatever was held before is released first. If the second allocation
    /// fails the first is released too, leaving the controller empty.
    pub fn ensure_cold<A>(
        &mut self,
        alloc: &mut A,
        source: Extent,
        block_size: u32,
        work_format: PixelFormat,
    ) -> Result<&BufferPair<B>, AllocError>
    where
        A: BufferAllocator<Buffer = B>,
    {
        self.teardown(alloc);

        if source.is_empty() {
            return Err(AllocError::ZeroSized {
                width: source.width,
                height: source.height,
            });
        }

        let work_desc = BufferDesc::work(source, work_format);
        let disp_desc = BufferDesc::displacement(source, block_size);

        let work = Self::acquire(&mut self.stats, alloc, &work_desc)?;
        let displacement = match Self::acquire(&mut self.stats, alloc, &disp_desc) {
            Ok(buffer) => buffer,
            Err(e) => {
                Self::release(&mut self.stats, alloc, work);
                return Err(e);
            }
        };

        log::debug!(
            "Datamosh buffers allocated: work {}, displacement {}",
            work_desc,
            disp_desc
        );

        Ok(self.pair.insert(BufferPair {
            work,
            displacement,
            source,
            block_size,
            work_format,
        }))
    }

    /// Mark the freshly allocated pair as written (COLD -> WARM)
    ///
    /// Returns the resulting phase; without a held pair this stays cold.
    pub fn mark_warm(&mut self) -> Phase {
        self.written = self.pair.is_some();
        self.phase()
    }

    fn warm_pair(&mut self) -> Result<&mut BufferPair<B>, FrameError> {
        match (&mut self.pair, self.written) {
            (Some(pair), true) => Ok(pair),
            _ => Err(FrameError::NotWarm),
        }
    }

    /// Replace the displacement buffer
    ///
    /// `writer(alloc, previous, next)` must fill `next`. On writer failure the
    /// replacement is released and the previous buffer stays current.
    pub fn rotate_displacement<A, F>(&mut self, alloc: &mut A, writer: F) -> Result<(), FrameError>
    where
        A: BufferAllocator<Buffer = B>,
        F: FnOnce(&mut A, &B, &B) -> Result<(), KernelError>,
    {
        // Split borrows: the pair and the counters are disjoint fields.
        let pair = match (&mut self.pair, self.written) {
            (Some(pair), true) => pair,
            _ => return Err(FrameError::NotWarm),
        };
        let stats = &mut self.stats;

        let next = Self::acquire(stats, alloc, &pair.displacement_desc())?;
        if let Err(e) = writer(alloc, &pair.displacement, &next) {
            Self::release(stats, alloc, next);
            return Err(e.into());
        }

        let previous = std::mem::replace(&mut pair.displacement, next);
        Self::release(stats, alloc, previous);
        stats.rotations += 1;
        Ok(())
    }

    /// Replace the work buffer
    ///
    /// `writer(alloc, previous, next, displacement)` must fill `next`, reading
    /// the current displacement buffer. Failure handling as for displacement.
    pub fn rotate_work<A, F>(&mut self, alloc: &mut A, writer: F) -> Result<(), FrameError>
    where
        A: BufferAllocator<Buffer = B>,
        F: FnOnce(&mut A, &B, &B, &B) -> Result<(), KernelError>,
    {
        let pair = match (&mut self.pair, self.written) {
            (Some(pair), true) => pair,
            _ => return Err(FrameError::NotWarm),
        };
        let stats = &mut self.stats;

        let next = Self::acquire(stats, alloc, &pair.work_desc())?;
        if let Err(e) = writer(alloc, &pair.work, &next, &pair.displacement) {
            Self::release(stats, alloc, next);
            return Err(e.into());
        }

        let previous = std::mem::replace(&mut pair.work, next);
        Self::release(stats, alloc, previous);
        stats.rotations += 1;
        Ok(())
    }

    /// Current work buffer of a warm pair
    pub fn warm_work(&mut self) -> Result<&B, FrameError> {
        self.warm_pair().map(|pair| &pair.work)
    }

    /// Release everything and return to COLD. Safe to call repeatedly.
    pub fn teardown<A>(&mut self, alloc: &mut A)
    where
        A: BufferAllocator<Buffer = B>,
    {
        if let Some(pair) = self.pair.take() {
            Self::release(&mut self.stats, alloc, pair.work);
            Self::release(&mut self.stats, alloc, pair.displacement);
            log::debug!("Datamosh buffers released ({} source)", pair.source);
        }
        self.written = false;
    }
}

impl<B> Drop for BufferController<B> {
    fn drop(&mut self) {
        if let Some(pair) = &self.pair {
            log::warn!(
                "Datamosh controller dropped while holding {} buffers; call deactivate() to return them to the pool",
                pair.source
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Hands out numbered handles and tracks which are live
    #[derive(Default)]
    struct CountingAllocator {
        next: u32,
        live: HashSet<u32>,
        fail_after: Option<usize>,
    }

    impl BufferAllocator for CountingAllocator {
        type Buffer = u32;

        fn acquire(&mut self, desc: &BufferDesc) -> Result<u32, AllocError> {
            if let Some(remaining) = self.fail_after.as_mut() {
                if *remaining == 0 {
                    return Err(AllocError::OutOfMemory(*desc));
                }
                *remaining -= 1;
            }
            self.next += 1;
            self.live.insert(self.next);
            Ok(self.next)
        }

        fn release(&mut self, buffer: u32) {
            assert!(self.live.remove(&buffer), "double release of {buffer}");
        }
    }

    fn warm_controller(alloc: &mut CountingAllocator) -> BufferController<u32> {
        let mut controller = BufferController::new();
        controller
            .ensure_cold(alloc, Extent::new(64, 32), 8, PixelFormat::Rgba8Unorm)
            .unwrap();
        assert_eq!(controller.mark_warm(), Phase::Warm);
        controller
    }

    #[test]
    fn test_new_controller_is_cold() {
        let controller = BufferController::<u32>::new();
        assert_eq!(controller.phase(), Phase::Cold);
        assert!(!controller.is_allocated());
        assert!(matches!(controller.state(), PipelineState::Cold));
    }

    #[test]
    fn test_ensure_cold_allocates_unwritten_pair() {
        let mut alloc = CountingAllocator::default();
        let mut controller = BufferController::new();
        let pair = controller
            .ensure_cold(&mut alloc, Extent::new(64, 32), 8, PixelFormat::Rgba8Unorm)
            .unwrap();
        assert_eq!(pair.displacement_desc().extent, Extent::new(8, 4));

        assert_eq!(controller.phase(), Phase::Cold);
        assert!(controller.is_allocated());
        assert_eq!(alloc.live.len(), 2);
        controller.teardown(&mut alloc);
    }

    #[test]
    fn test_ensure_cold_failure_leaves_no_half_pair() {
        let mut alloc = CountingAllocator {
            fail_after: Some(1),
            ..Default::default()
        };
        let mut controller = BufferController::new();
        let result = controller.ensure_cold(&mut alloc, Extent::new(64, 32), 8, PixelFormat::Rgba8Unorm);

        assert!(matches!(result, Err(AllocError::OutOfMemory(_))));
        assert!(!controller.is_allocated());
        assert!(alloc.live.is_empty());
        assert_eq!(controller.stats().live(), 0);
    }

    #[test]
    fn test_ensure_cold_rejects_empty_source() {
        let mut alloc = CountingAllocator::default();
        let mut controller = BufferController::new();
        let result = controller.ensure_cold(&mut alloc, Extent::new(0, 32), 8, PixelFormat::Rgba8Unorm);
        assert_eq!(result.err(), Some(AllocError::ZeroSized { width: 0, height: 32 }));
    }

    #[test]
    fn test_mark_warm_without_pair_stays_cold() {
        let mut controller = BufferController::<u32>::new();
        assert_eq!(controller.mark_warm(), Phase::Cold);
    }

    #[test]
    fn test_rotate_requires_warm() {
        let mut alloc = CountingAllocator::default();
        let mut controller = BufferController::new();
        let result = controller.rotate_displacement(&mut alloc, |_, _, _| Ok(()));
        assert_eq!(result, Err(FrameError::NotWarm));
        assert_eq!(alloc.next, 0);
    }

    #[test]
    fn test_rotate_displacement_swaps_and_releases_previous() {
        let mut alloc = CountingAllocator::default();
        let mut controller = warm_controller(&mut alloc);
        let before = *controller.buffers().unwrap().displacement();

        let mut seen = None;
        controller
            .rotate_displacement(&mut alloc, |alloc, previous, next| {
                assert!(alloc.live.contains(previous));
                seen = Some((*previous, *next));
                Ok(())
            })
            .unwrap();

        let (previous, next) = seen.unwrap();
        assert_eq!(previous, before);
        assert_eq!(*controller.buffers().unwrap().displacement(), next);
        assert!(!alloc.live.contains(&before));
        assert_eq!(controller.stats().rotations, 1);
        controller.teardown(&mut alloc);
    }

    #[test]
    fn test_failed_writer_keeps_previous_buffer() {
        let mut alloc = CountingAllocator::default();
        let mut controller = warm_controller(&mut alloc);
        let before = *controller.buffers().unwrap().work();

        let result = controller.rotate_work(&mut alloc, |_, _, _, _| {
            Err(KernelError::Unavailable("lost device".into()))
        });

        assert!(matches!(result, Err(FrameError::Kernel(_))));
        assert_eq!(*controller.buffers().unwrap().work(), before);
        assert_eq!(controller.phase(), Phase::Warm);
        assert_eq!(alloc.live.len(), 2);
        controller.teardown(&mut alloc);
    }

    #[test]
    fn test_rotate_work_reads_current_displacement() {
        let mut alloc = CountingAllocator::default();
        let mut controller = warm_controller(&mut alloc);
        let displacement = *controller.buffers().unwrap().displacement();

        controller
            .rotate_work(&mut alloc, |_, previous, next, disp| {
                assert_ne!(previous, next);
                assert_eq!(*disp, displacement);
                Ok(())
            })
            .unwrap();
        controller.teardown(&mut alloc);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut alloc = CountingAllocator::default();
        let mut controller = warm_controller(&mut alloc);

        controller.teardown(&mut alloc);
        controller.teardown(&mut alloc);

        assert_eq!(controller.phase(), Phase::Cold);
        assert!(alloc.live.is_empty());
        let stats = controller.stats();
        assert_eq!((stats.acquired, stats.released), (2, 2));
    }

    #[test]
    fn test_matches_tracks_shape() {
        let mut alloc = CountingAllocator::default();
        let mut controller = warm_controller(&mut alloc);
        assert!(controller.matches(Extent::new(64, 32), 8, PixelFormat::Rgba8Unorm));
        assert!(!controller.matches(Extent::new(64, 33), 8, PixelFormat::Rgba8Unorm));
        assert!(!controller.matches(Extent::new(64, 32), 16, PixelFormat::Rgba8Unorm));
        assert!(!controller.matches(Extent::new(64, 32), 8, PixelFormat::Rgba16Float));
        controller.teardown(&mut alloc);
    }
}
