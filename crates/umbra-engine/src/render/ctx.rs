/// Device and queue a backend records and uploads through.
#[derive(Clone, Copy)]
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }
}
