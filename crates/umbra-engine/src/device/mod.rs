//! GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - exposing them to renderers through [`crate::render::RenderCtx`]
//!
//! The scene pass renders offscreen, so no swapchain is involved here.

mod gpu;
mod init;

pub use gpu::Gpu;
pub use init::GpuInit;
