use anyhow::{ensure, Context, Result};

use crate::color::Rgb;
use crate::render::{Bindings, ImageDesc, PassAction, PassDesc, RenderBackend, ShaderStage};
use crate::scene::{Geometry, GeometryQuery, InstanceGroup, RenderState};

use super::pipeline::scene_pipeline_desc;
use super::uniforms::{SceneFsUniforms, SceneVsUniforms};

/// Formats and label of a [`ScenePass`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePassConfig {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub label: &'static str,
}

impl Default for ScenePassConfig {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Rgba16Float,
            depth_format: wgpu::TextureFormat::Depth32Float,
            label: "umbra scene pass",
        }
    }
}

/// Offscreen pass drawing every geometry record's solid and emissive
/// instances, lit by one directional light and its packed shadow map.
///
/// Color is cleared to the background each frame; depth is loaded as-is
/// (the depth prepass owns it) and only tested against.
#[derive(Debug)]
pub struct ScenePass<B: RenderBackend> {
    config: ScenePassConfig,
    action: PassAction,
    pipeline: B::Pipeline,
    pass: B::Pass,
    color_target: B::Image,
    depth_target: B::Image,
    size: (u32, u32),
    warned_shadow_size: bool,
}

impl<B: RenderBackend> ScenePass<B> {
    /// Allocates the color target, binds it with `depth_target` and builds
    /// the pipeline.
    pub fn new(
        backend: &mut B,
        config: ScenePassConfig,
        background: Rgb,
        depth_target: B::Image,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let (color_target, pass) =
            Self::make_targets(backend, &config, &depth_target, width, height)?;

        log::trace!("initialize scene pipeline");
        let pipeline = backend
            .make_pipeline(&scene_pipeline_desc(config.color_format, config.depth_format))
            .context("failed to build scene pipeline")?;

        log::debug!("{}: {width}x{height}, background {background:?}", config.label);

        Ok(Self {
            config,
            action: PassAction::clear_color(background),
            pipeline,
            pass,
            color_target,
            depth_target,
            size: (width, height),
            warned_shadow_size: false,
        })
    }

    /// Reallocates the color target and pass for a new size. The pipeline
    /// is kept.
    pub fn resize(
        &mut self,
        backend: &mut B,
        depth_target: B::Image,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let (color_target, pass) =
            Self::make_targets(backend, &self.config, &depth_target, width, height)?;

        log::debug!(
            "{}: resize {}x{} -> {width}x{height}",
            self.config.label,
            self.size.0,
            self.size.1
        );

        self.color_target = color_target;
        self.depth_target = depth_target;
        self.pass = pass;
        self.size = (width, height);
        Ok(())
    }

    fn make_targets(
        backend: &mut B,
        config: &ScenePassConfig,
        depth_target: &B::Image,
        width: u32,
        height: u32,
    ) -> Result<(B::Image, B::Pass)> {
        ensure!(
            width > 0 && height > 0,
            "{}: invalid target size {width}x{height}",
            config.label
        );

        let color_target = backend
            .make_image(&ImageDesc {
                label: "umbra scene color",
                width,
                height,
                format: config.color_format,
                render_target: true,
            })
            .context("failed to allocate scene color target")?;

        let pass = backend
            .make_pass(&PassDesc {
                label: config.label,
                color: &color_target,
                depth: depth_target,
            })
            .context("failed to create scene pass")?;

        Ok((color_target, pass))
    }

    /// Records one frame. Returns the number of draws issued.
    pub fn run<Q>(&mut self, backend: &mut B, state: &RenderState<'_, B::Image, Q>) -> u32
    where
        Q: GeometryQuery<B::Buffer> + ?Sized,
    {
        let uniforms = &state.uniforms;
        if uniforms.shadow_map_size <= 0.0 && !self.warned_shadow_size {
            log::warn!(
                "{}: shadow map size {} is not positive; PCF offsets are meaningless",
                self.config.label,
                uniforms.shadow_map_size
            );
            self.warned_shadow_size = true;
        }

        let vs = SceneVsUniforms::from(uniforms);
        let fs = SceneFsUniforms::from(uniforms);

        backend.begin_pass(&self.pass, &self.action);
        backend.apply_pipeline(&self.pipeline);
        backend.apply_uniforms(ShaderStage::Vertex, 0, bytemuck::bytes_of(&vs));
        backend.apply_uniforms(ShaderStage::Fragment, 0, bytemuck::bytes_of(&fs));

        let mut draws = 0;
        for geometry in state.query.geometries() {
            for group in [&geometry.solid, &geometry.emissive] {
                if draw_instances(backend, geometry, group, state.shadow_map) {
                    draws += 1;
                }
            }
        }

        backend.end_pass();
        draws
    }

    #[inline]
    pub fn color_target(&self) -> &B::Image {
        &self.color_target
    }

    #[inline]
    pub fn depth_target(&self) -> &B::Image {
        &self.depth_target
    }

    #[inline]
    pub fn pipeline(&self) -> &B::Pipeline {
        &self.pipeline
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// Draws one instance group of `geometry`; `false` when there was nothing to draw.
fn draw_instances<B: RenderBackend>(
    backend: &mut B,
    geometry: &Geometry<B::Buffer>,
    group: &InstanceGroup<B::Buffer>,
    shadow_map: &B::Image,
) -> bool {
    if group.is_empty() {
        return false;
    }
    let Some(instances) = group.buffers() else {
        return false;
    };

    backend.apply_bindings(&Bindings {
        vertex_buffers: &[
            &geometry.vertex_buffer,
            &geometry.normal_buffer,
            &instances.color,
            &instances.material,
            &instances.transform,
        ],
        index_buffer: &geometry.index_buffer,
        fs_images: &[shadow_map],
    });
    backend.draw(0, geometry.index_count, group.instance_count());
    true
}
