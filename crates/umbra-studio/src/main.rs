//! Headless driver for the scene pass.
//!
//! Brings up a GPU without a surface, records a few frames of an animated
//! demo scene and logs what was drawn. Without a usable adapter it records
//! the same frames into a [`RecordingBackend`] instead.

mod scene;

use anyhow::{Context, Result};
use umbra_engine::color::Rgb;
use umbra_engine::device::{Gpu, GpuInit};
use umbra_engine::logging::{init_logging, LoggingConfig};
use umbra_engine::render::scene_pass::{ScenePass, ScenePassConfig};
use umbra_engine::render::{ImageDesc, RecordingBackend, RenderBackend, WgpuBackend};
use umbra_engine::scene::{Geometry, MeshData, RenderState};

use scene::DemoScene;

/// Seconds between recorded frames.
const FRAME_STEP: f32 = 1.0 / 60.0;

#[derive(Debug, Clone)]
struct StudioConfig {
    width: u32,
    height: u32,
    frames: u32,
    shadow_map_size: u32,
    ring: usize,
    background: Rgb,
    pass: ScenePassConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frames: 120,
            shadow_map_size: 1024,
            ring: 12,
            background: Rgb::new(0.02, 0.02, 0.03),
            pass: ScenePassConfig::default(),
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let config = StudioConfig::default();

    match Gpu::new_blocking(GpuInit::default()) {
        Ok(gpu) => run_gpu(&gpu, &config),
        Err(err) => {
            log::warn!("no GPU available ({err:#}); recording commands only");
            run_recorded(&config)
        }
    }
}

fn run_gpu(gpu: &Gpu, config: &StudioConfig) -> Result<()> {
    let info = gpu.adapter_info();
    log::info!("rendering on {} ({:?})", info.name, info.backend);

    let scene = DemoScene::new(config.width as f32 / config.height as f32, config.ring);
    let mut backend = WgpuBackend::new(gpu.render_ctx());

    let depth = backend.make_depth_target(config.width, config.height, config.pass.depth_format)?;
    backend.clear_depth(&depth, 1.0);

    let casters = scene.solid_instances(0.0);
    let map = scene.bake_shadow_map(config.shadow_map_size, &casters[1..]);
    let shadow_map = backend.make_shadow_map(&map)?;

    run_frames(&mut backend, &scene, depth, &shadow_map, config)?;
    gpu.device()
        .poll(wgpu::PollType::wait_indefinitely())
        .context("failed to wait for queued frames")?;
    Ok(())
}

fn run_recorded(config: &StudioConfig) -> Result<()> {
    let scene = DemoScene::new(config.width as f32 / config.height as f32, config.ring);
    let mut backend = RecordingBackend::new();

    let depth = backend.make_image(&ImageDesc {
        label: "studio depth",
        width: config.width,
        height: config.height,
        format: config.pass.depth_format,
        render_target: true,
    })?;
    let shadow_map = backend.make_image(&ImageDesc {
        label: "studio shadow map",
        width: config.shadow_map_size,
        height: config.shadow_map_size,
        format: wgpu::TextureFormat::Rgba8Unorm,
        render_target: false,
    })?;

    run_frames(&mut backend, &scene, depth, &shadow_map, config)?;
    log::info!(
        "recorded {} commands, {} draws",
        backend.commands().len(),
        backend.draw_count()
    );
    Ok(())
}

fn run_frames<B: RenderBackend>(
    backend: &mut B,
    scene: &DemoScene,
    depth: B::Image,
    shadow_map: &B::Image,
    config: &StudioConfig,
) -> Result<()> {
    let mut pass = ScenePass::new(
        backend,
        config.pass.clone(),
        config.background,
        depth,
        config.width,
        config.height,
    )?;
    let mut geometries = vec![Geometry::new(backend, &MeshData::cube())?];

    let mut total_draws = 0;
    for frame in 0..config.frames {
        let t = frame as f32 * FRAME_STEP;
        let cube = &mut geometries[0];
        cube.solid.write(backend, &scene.solid_instances(t))?;
        cube.emissive.write(backend, &scene.emissive_instances(t))?;

        let state = RenderState {
            uniforms: scene.uniforms(config.shadow_map_size),
            shadow_map,
            query: &geometries,
        };
        let draws = pass.run(backend, &state);
        log::trace!("frame {frame}: {draws} draws");
        total_draws += draws;
    }

    log::info!(
        "{} frames at {}x{}, {total_draws} draws",
        config.frames,
        config.width,
        config.height
    );
    Ok(())
}
