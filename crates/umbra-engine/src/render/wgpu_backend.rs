use std::collections::HashMap;

use anyhow::{ensure, Context, Result};
use wgpu::util::DeviceExt;

use super::backend::RenderBackend;
use super::ctx::RenderCtx;
use super::desc::{
    Bindings, BufferDesc, BufferKind, ImageDesc, PassAction, PassDesc, PipelineDesc, ShaderStage,
    UniformBlockDesc,
};
use crate::shading::PackedDepthMap;

/// Bind groups are cached per (pipeline, images); drop the cache past this size.
const MAX_CACHED_BIND_GROUPS: usize = 64;

/// Texture plus its default view.
#[derive(Debug, Clone)]
pub struct GpuImage {
    id: u64,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
}

impl GpuImage {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Render pipeline plus the uniform buffers backing its group-0 blocks.
#[derive(Debug, Clone)]
pub struct GpuPipeline {
    id: u64,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    vs_ubos: Vec<wgpu::Buffer>,
    fs_ubos: Vec<wgpu::Buffer>,
    image_slots: usize,
    index_format: wgpu::IndexFormat,
}

#[derive(Debug, Clone)]
pub struct GpuPass {
    label: &'static str,
    color: GpuImage,
    depth: GpuImage,
}

struct Recording {
    encoder: wgpu::CommandEncoder,
    pass: wgpu::RenderPass<'static>,
    pipeline: Option<GpuPipeline>,
}

/// [`RenderBackend`] on top of wgpu.
///
/// Each `begin_pass`/`end_pass` pair records into its own command encoder and
/// is submitted on `end_pass`. Uniform uploads go through `Queue::write_buffer`,
/// so the last upload before `end_pass` is what every draw of that pass sees.
pub struct WgpuBackend<'a> {
    ctx: RenderCtx<'a>,
    next_id: u64,

    /// Nearest, clamp-to-edge: packed depth must not be filtered.
    image_sampler: wgpu::Sampler,
    bind_groups: HashMap<(u64, Vec<u64>), wgpu::BindGroup>,

    recording: Option<Recording>,
}

impl<'a> WgpuBackend<'a> {
    pub fn new(ctx: RenderCtx<'a>) -> Self {
        let image_sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("umbra image sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        Self {
            ctx,
            next_id: 0,
            image_sampler,
            bind_groups: HashMap::new(),
            recording: None,
        }
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Allocates a depth attachment for a pass of the given size.
    pub fn make_depth_target(
        &mut self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<GpuImage> {
        ensure!(format.is_depth_stencil_format(), "{format:?} is not a depth format");
        self.make_image(&ImageDesc {
            label: "umbra depth target",
            width,
            height,
            format,
            render_target: true,
        })
    }

    /// Clears a depth image to `depth` outside of any pass.
    ///
    /// Stands in for the depth pre-pass when nothing else populates the buffer.
    pub fn clear_depth(&mut self, image: &GpuImage, depth: f32) {
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("umbra depth clear encoder"),
            });
        {
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("umbra depth clear"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &image.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Uploads a packed depth map as an `Rgba8Unorm` shadow-map texture.
    pub fn make_shadow_map(&mut self, map: &PackedDepthMap) -> Result<GpuImage> {
        let image = self.make_image(&ImageDesc {
            label: "umbra shadow map",
            width: map.width(),
            height: map.height(),
            format: wgpu::TextureFormat::Rgba8Unorm,
            render_target: false,
        })?;
        self.write_shadow_map(&image, map)?;
        Ok(image)
    }

    /// Replaces the contents of a shadow map created by [`Self::make_shadow_map`].
    pub fn write_shadow_map(&mut self, image: &GpuImage, map: &PackedDepthMap) -> Result<()> {
        ensure!(
            image.size() == (map.width(), map.height()),
            "shadow map is {:?}, data is {}x{}",
            image.size(),
            map.width(),
            map.height()
        );
        self.ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &image.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            map.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * map.width()),
                rows_per_image: Some(map.height()),
            },
            wgpu::Extent3d {
                width: map.width(),
                height: map.height(),
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn bind_group(&mut self, pipeline: &GpuPipeline, images: &[&GpuImage]) -> wgpu::BindGroup {
        let key = (pipeline.id, images.iter().map(|i| i.id).collect::<Vec<_>>());
        if let Some(bg) = self.bind_groups.get(&key) {
            return bg.clone();
        }

        let mut entries = Vec::new();
        for ubo in pipeline.vs_ubos.iter().chain(&pipeline.fs_ubos) {
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource: ubo.as_entire_binding(),
            });
        }
        for image in images {
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource: wgpu::BindingResource::TextureView(&image.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: entries.len() as u32,
                resource: wgpu::BindingResource::Sampler(&self.image_sampler),
            });
        }

        let bg = self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("umbra bind group"),
            layout: &pipeline.bind_group_layout,
            entries: &entries,
        });

        if self.bind_groups.len() >= MAX_CACHED_BIND_GROUPS {
            log::debug!("bind group cache full; clearing");
            self.bind_groups.clear();
        }
        self.bind_groups.insert(key, bg.clone());
        bg
    }
}

fn uniform_entry(
    binding: u32,
    size: u64,
    visibility: wgpu::ShaderStages,
) -> Result<wgpu::BindGroupLayoutEntry> {
    Ok(wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: Some(
                std::num::NonZeroU64::new(size).context("uniform block has zero size")?,
            ),
        },
        count: None,
    })
}

impl<'a> RenderBackend for WgpuBackend<'a> {
    type Image = GpuImage;
    type Buffer = wgpu::Buffer;
    type Pipeline = GpuPipeline;
    type Pass = GpuPass;

    fn make_image(&mut self, desc: &ImageDesc) -> Result<GpuImage> {
        ensure!(
            desc.width > 0 && desc.height > 0,
            "image {:?} has zero size",
            desc.label
        );

        let usage = if desc.render_target {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
        } else {
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
        };

        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(GpuImage {
            id: self.alloc_id(),
            texture,
            view,
            format: desc.format,
            width: desc.width,
            height: desc.height,
        })
    }

    fn make_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<wgpu::Buffer> {
        ensure!(desc.size > 0, "buffer {:?} has zero size", desc.label);

        let usage = match desc.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };

        let buffer = match desc.contents {
            Some(contents) => self
                .ctx
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(desc.label),
                    contents,
                    usage,
                }),
            None => self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(desc.label),
                size: desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        };
        Ok(buffer)
    }

    fn make_pipeline(&mut self, desc: &PipelineDesc) -> Result<GpuPipeline> {
        let device = self.ctx.device;
        let shader_desc = &desc.shader;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(shader_desc.source.into()),
        });

        let mut layout_entries = Vec::new();
        let mut make_ubos = |blocks: &[UniformBlockDesc],
                             stage: ShaderStage,
                             visibility: wgpu::ShaderStages|
         -> Result<Vec<wgpu::Buffer>> {
            let mut ubos = Vec::with_capacity(blocks.len());
            for (slot, block) in blocks.iter().enumerate() {
                let binding = shader_desc.uniform_binding(stage, slot as u32);
                layout_entries.push(uniform_entry(binding, block.size, visibility)?);
                ubos.push(device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(block.name),
                    size: block.size,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }));
            }
            Ok(ubos)
        };
        let vs_ubos = make_ubos(
            &shader_desc.vs_uniform_blocks,
            ShaderStage::Vertex,
            wgpu::ShaderStages::VERTEX,
        )?;
        let fs_ubos = make_ubos(
            &shader_desc.fs_uniform_blocks,
            ShaderStage::Fragment,
            wgpu::ShaderStages::FRAGMENT,
        )?;

        for slot in 0..shader_desc.fs_images.len() {
            let (texture_binding, sampler_binding) = shader_desc.image_bindings(slot as u32);
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: texture_binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler_binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = desc
            .vertex_buffers
            .iter()
            .map(|b| wgpu::VertexBufferLayout {
                array_stride: b.stride,
                step_mode: b.step_mode,
                attributes: &b.attributes,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_formats
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(shader_desc.vs_entry),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(shader_desc.fs_entry),
                compilation_options: Default::default(),
                targets: &targets,
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: desc.front_face,
                cull_mode: desc.cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: desc.depth.format,
                depth_write_enabled: desc.depth.write_enabled,
                depth_compare: desc.depth.compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        Ok(GpuPipeline {
            id: self.alloc_id(),
            pipeline,
            bind_group_layout,
            vs_ubos,
            fs_ubos,
            image_slots: shader_desc.fs_images.len(),
            index_format: desc.index_format,
        })
    }

    fn make_pass(&mut self, desc: &PassDesc<'_, GpuImage>) -> Result<GpuPass> {
        ensure!(
            desc.color.size() == desc.depth.size(),
            "pass {:?}: color target is {:?} but depth target is {:?}",
            desc.label,
            desc.color.size(),
            desc.depth.size()
        );
        ensure!(
            desc.depth.format.is_depth_stencil_format(),
            "pass {:?}: {:?} is not a depth format",
            desc.label,
            desc.depth.format
        );
        Ok(GpuPass {
            label: desc.label,
            color: desc.color.clone(),
            depth: desc.depth.clone(),
        })
    }

    fn update_buffer(&mut self, buffer: &wgpu::Buffer, data: &[u8]) {
        self.ctx.queue.write_buffer(buffer, 0, data);
    }

    fn begin_pass(&mut self, pass: &GpuPass, action: &PassAction) {
        if self.recording.is_some() {
            log::warn!("begin_pass {:?} while another pass is recording; ignored", pass.label);
            return;
        }

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(pass.label),
            });

        let rpass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pass.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &pass.color.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: action.color,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &pass.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: action.depth,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();

        self.recording = Some(Recording {
            encoder,
            pass: rpass,
            pipeline: None,
        });
    }

    fn apply_pipeline(&mut self, pipeline: &GpuPipeline) {
        let Some(rec) = self.recording.as_mut() else {
            log::warn!("apply_pipeline outside of a pass; ignored");
            return;
        };
        rec.pass.set_pipeline(&pipeline.pipeline);
        rec.pipeline = Some(pipeline.clone());
    }

    fn apply_uniforms(&mut self, stage: ShaderStage, slot: u32, data: &[u8]) {
        let Some(pipeline) = self.recording.as_ref().and_then(|r| r.pipeline.as_ref()) else {
            log::warn!("apply_uniforms without a pipeline; ignored");
            return;
        };
        let ubos = match stage {
            ShaderStage::Vertex => &pipeline.vs_ubos,
            ShaderStage::Fragment => &pipeline.fs_ubos,
        };
        let Some(ubo) = ubos.get(slot as usize) else {
            log::warn!("no {stage:?} uniform block in slot {slot}; ignored");
            return;
        };
        self.ctx.queue.write_buffer(ubo, 0, data);
    }

    fn apply_bindings(&mut self, bindings: &Bindings<'_, wgpu::Buffer, GpuImage>) {
        let Some(pipeline) = self.recording.as_ref().and_then(|r| r.pipeline.clone()) else {
            log::warn!("apply_bindings without a pipeline; ignored");
            return;
        };
        if bindings.fs_images.len() != pipeline.image_slots {
            log::warn!(
                "pipeline expects {} images, got {}; ignored",
                pipeline.image_slots,
                bindings.fs_images.len()
            );
            return;
        }

        let bind_group = self.bind_group(&pipeline, bindings.fs_images);

        let Some(rec) = self.recording.as_mut() else { return };
        rec.pass.set_bind_group(0, &bind_group, &[]);
        for (slot, buffer) in bindings.vertex_buffers.iter().enumerate() {
            rec.pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        rec.pass
            .set_index_buffer(bindings.index_buffer.slice(..), pipeline.index_format);
    }

    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32) {
        let Some(rec) = self.recording.as_mut() else {
            log::warn!("draw outside of a pass; ignored");
            return;
        };
        rec.pass
            .draw_indexed(base_element..base_element + num_elements, 0, 0..num_instances);
    }

    fn end_pass(&mut self) {
        let Some(Recording { encoder, pass, .. }) = self.recording.take() else {
            log::warn!("end_pass without begin_pass; ignored");
            return;
        };
        // The pass must be dropped before the encoder can finish.
        drop(pass);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
    }
}
