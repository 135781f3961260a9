/// Initialization parameters for the GPU layer.
///
/// Defaults accept any backend, prefer a discrete GPU and request no
/// optional features.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Backends wgpu may pick an adapter from.
    pub backends: wgpu::Backends,

    /// Adapter power preference.
    pub power_preference: wgpu::PowerPreference,

    /// Accept only a software (fallback) adapter.
    ///
    /// Useful on CI machines without a GPU.
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// The scene pass needs none; keep this empty for portability.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    ///
    /// The scene pipeline binds five vertex buffers, within the default limit of eight.
    pub required_limits: wgpu::Limits,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        }
    }
}
