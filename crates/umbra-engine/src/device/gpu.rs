use anyhow::{Context, Result};

use super::GpuInit;
use crate::render::RenderCtx;

/// Owns wgpu core objects for headless rendering.
///
/// This type is the low-level rendering context:
/// - requests an adapter, then stores it with its Device/Queue
/// - hands out a [`RenderCtx`] borrowing device and queue
pub struct Gpu {
    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,
}

impl Gpu {
    /// Creates a GPU context with no presentation surface.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let GpuInit {
            backends,
            power_preference,
            force_fallback_adapter,
            required_features,
            required_limits,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::debug!(
            "selected adapter {:?} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("umbra-engine device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }

    /// Blocking variant of [`Gpu::new`] for tools without an async runtime.
    pub fn new_blocking(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new(init))
    }

    /// Returns information about the selected adapter.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a renderer-facing context borrowing this device.
    pub fn render_ctx(&self) -> RenderCtx<'_> {
        RenderCtx::new(&self.device, &self.queue)
    }
}
