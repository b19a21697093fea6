//! Instrumented in-memory render context and a deterministic kernel
//!
//! Images hold a single fill value instead of pixels. Every handle the
//! context hands out is checked on use: reading, writing, blitting or
//! releasing a handle after release panics, as does a blit between images
//! of different sizes.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use datamosh::{
    BufferAllocator, BufferDesc, CorruptionKernel, Extent, KernelError, KernelParams, KernelPass, RenderContext,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Opaque image handle; deliberately not `Clone`
#[derive(Debug, PartialEq, Eq)]
pub struct MockImage {
    id: u32,
}

impl MockImage {
    pub fn id(&self) -> u32 {
        self.id
    }
}

#[derive(Debug)]
struct ImageData {
    extent: Extent,
    value: u32,
    host: bool,
}

#[derive(Default)]
pub struct MockContext {
    next_id: u32,
    images: HashMap<u32, ImageData>,
    live: HashSet<u32>,
    released: HashSet<u32>,
    /// Descriptors of every successful acquisition, in order
    pub requests: Vec<BufferDesc>,
    pub acquisitions: usize,
    pub releases: usize,
    pub blits: usize,
    /// Fail this many upcoming acquisitions
    pub fail_acquires: usize,
}

impl MockContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, extent: Extent, value: u32, host: bool) -> MockImage {
        self.next_id += 1;
        let id = self.next_id;
        self.images.insert(id, ImageData { extent, value, host });
        MockImage { id }
    }

    /// A host-owned frame the effect may read or write but never release
    pub fn host_image(&mut self, extent: Extent, fill: u32) -> MockImage {
        self.insert(extent, fill, true)
    }

    fn data(&self, image: &MockImage) -> &ImageData {
        assert!(!self.released.contains(&image.id), "use after release of image {}", image.id);
        self.images
            .get(&image.id)
            .unwrap_or_else(|| panic!("unknown image {}", image.id))
    }

    pub fn value(&self, image: &MockImage) -> u32 {
        self.data(image).value
    }

    pub fn extent_of(&self, image: &MockImage) -> Extent {
        self.data(image).extent
    }

    pub fn write(&mut self, image: &MockImage, value: u32) {
        self.data(image);
        if let Some(data) = self.images.get_mut(&image.id) {
            data.value = value;
        }
    }

    /// Pool images currently checked out
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, image: &MockImage) -> bool {
        self.live.contains(&image.id)
    }
}

impl BufferAllocator for MockContext {
    type Buffer = MockImage;

    fn acquire(&mut self, desc: &BufferDesc) -> Result<MockImage, datamosh::AllocError> {
        if self.fail_acquires > 0 {
            self.fail_acquires -= 1;
            return Err(datamosh::AllocError::OutOfMemory(*desc));
        }
        let image = self.insert(desc.extent, 0xdead_beef, false);
        self.live.insert(image.id);
        self.requests.push(*desc);
        self.acquisitions += 1;
        Ok(image)
    }

    fn release(&mut self, buffer: MockImage) {
        let data = self.data(&buffer);
        assert!(!data.host, "host image {} released by the effect", buffer.id);
        assert!(self.live.remove(&buffer.id), "double release of image {}", buffer.id);
        self.released.insert(buffer.id);
        self.releases += 1;
    }
}

impl RenderContext for MockContext {
    fn extent(&self, image: &MockImage) -> Extent {
        self.data(image).extent
    }

    fn blit(&mut self, source: &MockImage, destination: &MockImage) {
        let (from, to) = (self.data(source), self.data(destination));
        assert_eq!(
            from.extent, to.extent,
            "blit size mismatch {} -> {}",
            from.extent, to.extent
        );
        let value = from.value;
        self.write(destination, value);
        self.blits += 1;
    }
}

/// Kernel with predictable output
///
/// Seed writes 1, update increments the previous displacement, and mosh sets
/// the high bit so moshed content never equals a host source fill.
#[derive(Debug, Default)]
pub struct MockKernel {
    pub calls: Vec<KernelPass>,
    pub last_params: Option<KernelParams>,
    /// Fail the next call of this pass
    pub fail_on: Option<KernelPass>,
}

pub const MOSH_BIT: u32 = 0x8000_0000;

impl CorruptionKernel<MockContext> for MockKernel {
    fn apply(
        &mut self,
        ctx: &mut MockContext,
        pass: KernelPass,
        inputs: &[&MockImage],
        params: &KernelParams,
        output: &MockImage,
    ) -> Result<(), KernelError> {
        datamosh::kernel::check_inputs(pass, inputs.len())?;
        self.calls.push(pass);
        self.last_params = Some(*params);

        if self.fail_on == Some(pass) {
            self.fail_on = None;
            return Err(KernelError::PassFailed {
                pass,
                reason: "injected".into(),
            });
        }

        let value = match pass {
            KernelPass::Seed => 1,
            KernelPass::UpdateDisplacement => ctx.value(inputs[0]).wrapping_add(1),
            KernelPass::Mosh => {
                let source = ctx.value(inputs[0]);
                let work = ctx.value(inputs[1]);
                let displacement = ctx.value(inputs[2]);
                assert_eq!(ctx.extent(inputs[0]), ctx.extent(output));
                (source ^ work.rotate_left(3) ^ displacement) | MOSH_BIT
            }
        };
        ctx.write(output, value);
        Ok(())
    }
}
