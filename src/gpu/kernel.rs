//! wgpu corruption kernel
//!
//! One shader module and bind-group layout shared by three pipelines. Each
//! pass binds all four texture slots; slots a pass does not read are filled
//! with a 1x1 zero texture.

use wgpu::util::DeviceExt;

use crate::error::KernelError;
use crate::kernel::{check_inputs, CorruptionKernel, KernelParams, KernelPass};

use super::{GpuFrame, GpuImage};

const DATAMOSH_SHADER: &str = include_str!("datamosh.wgsl");

const DISPLACEMENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

pub struct DatamoshKernel {
    bind_group_layout: wgpu::BindGroupLayout,
    seed_pipeline: wgpu::RenderPipeline,
    update_pipeline: wgpu::RenderPipeline,
    mosh_pipeline: wgpu::RenderPipeline,
    linear_sampler: wgpu::Sampler,
    point_sampler: wgpu::Sampler,
    /// Stand-in for unused texture slots and missing motion vectors
    placeholder: wgpu::TextureView,
    /// Host motion vectors (RG = screen-space motion in UV units)
    motion: Option<wgpu::TextureView>,
    work_format: wgpu::TextureFormat,
}

impl DatamoshKernel {
    /// Build the kernel for a given work buffer format
    ///
    /// Shader or pipeline validation errors are captured and returned as
    /// `KernelError::Unavailable` instead of reaching the device error handler.
    pub fn new(device: &wgpu::Device, work_format: wgpu::TextureFormat) -> Result<Self, KernelError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let kernel = Self::build(device, work_format);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(KernelError::Unavailable(error.to_string()));
        }
        log::debug!("Datamosh kernel ready (work format {:?})", work_format);
        Ok(kernel)
    }

    fn build(device: &wgpu::Device, work_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Datamosh Shader"),
            source: wgpu::ShaderSource::Wgsl(DATAMOSH_SHADER.into()),
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Datamosh Bind Group Layout"),
            entries: &[
                // Source, work, displacement, motion
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                // Linear and point samplers
                sampler_entry(4),
                sampler_entry(5),
                // Parameters uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Datamosh Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label: &str, entry_point: &str, format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let seed_pipeline = pipeline("Datamosh Seed Pipeline", "fs_seed", DISPLACEMENT_FORMAT);
        let update_pipeline = pipeline("Datamosh Update Pipeline", "fs_update", DISPLACEMENT_FORMAT);
        let mosh_pipeline = pipeline("Datamosh Mosh Pipeline", "fs_mosh", work_format);

        let sampler = |label: &str, filter: wgpu::FilterMode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear_sampler = sampler("Datamosh Linear Sampler", wgpu::FilterMode::Linear);
        let point_sampler = sampler("Datamosh Point Sampler", wgpu::FilterMode::Nearest);

        // wgpu zero-initialises new textures, so this reads as "no motion".
        let placeholder = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Datamosh Placeholder Texture"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DISPLACEMENT_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            bind_group_layout,
            seed_pipeline,
            update_pipeline,
            mosh_pipeline,
            linear_sampler,
            point_sampler,
            placeholder,
            motion: None,
            work_format,
        }
    }

    /// Bind host motion vectors for the seed/update passes (None = no motion)
    pub fn set_motion_vectors(&mut self, motion: Option<wgpu::TextureView>) {
        self.motion = motion;
    }

    pub fn work_format(&self) -> wgpu::TextureFormat {
        self.work_format
    }

    /// Format the pass pipeline renders to
    pub fn target_format(&self, pass: KernelPass) -> wgpu::TextureFormat {
        match pass {
            KernelPass::Seed | KernelPass::UpdateDisplacement => DISPLACEMENT_FORMAT,
            KernelPass::Mosh => self.work_format,
        }
    }

    fn pipeline(&self, pass: KernelPass) -> &wgpu::RenderPipeline {
        match pass {
            KernelPass::Seed => &self.seed_pipeline,
            KernelPass::UpdateDisplacement => &self.update_pipeline,
            KernelPass::Mosh => &self.mosh_pipeline,
        }
    }
}

/// Reject an output the pass pipeline cannot render to
///
/// Drawing into a mismatched attachment is a wgpu validation error, which the
/// default device handler turns into a panic.
fn check_target(pass: KernelPass, expected: wgpu::TextureFormat, got: wgpu::TextureFormat) -> Result<(), KernelError> {
    if got != expected {
        return Err(KernelError::PassFailed {
            pass,
            reason: format!("output is {:?} but the pipeline targets {:?}", got, expected),
        });
    }
    Ok(())
}

impl<'a> CorruptionKernel<GpuFrame<'a>> for DatamoshKernel {
    fn apply(
        &mut self,
        frame: &mut GpuFrame<'a>,
        pass: KernelPass,
        inputs: &[&GpuImage],
        params: &KernelParams,
        output: &GpuImage,
    ) -> Result<(), KernelError> {
        check_inputs(pass, inputs.len())?;
        check_target(pass, self.target_format(pass), output.format())?;

        let placeholder = &self.placeholder;
        let motion = self.motion.as_ref().unwrap_or(placeholder);
        let (source, work, displacement) = match pass {
            KernelPass::Seed => (placeholder, placeholder, placeholder),
            KernelPass::UpdateDisplacement => (placeholder, placeholder, inputs[0].view()),
            KernelPass::Mosh => (inputs[0].view(), inputs[1].view(), inputs[2].view()),
        };

        let device = frame.device();

        // A fresh uniform per pass: queue writes would all land before the
        // encoder runs and every pass would see the last one.
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Datamosh Params Buffer"),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Datamosh Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(work),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(displacement),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(motion),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let label = format!("Datamosh {} Pass", pass);
        let mut render_pass = frame.encoder().begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(self.pipeline(pass));
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }
}
