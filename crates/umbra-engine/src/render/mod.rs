//! GPU rendering subsystem.
//!
//! Passes are written against [`RenderBackend`], a small immediate-mode command
//! interface (make resources, begin pass, apply pipeline/uniforms/bindings,
//! draw, end pass). [`WgpuBackend`] submits to a real device;
//! [`RecordingBackend`] records the command stream for inspection.
//!
//! Convention:
//! - resources are described by plain descriptor structs (`desc`)
//! - bind group 0 holds every uniform block and image a shader declares

mod backend;
mod ctx;
mod desc;
mod recording;
mod wgpu_backend;

pub mod scene_pass;

pub use backend::RenderBackend;
pub use ctx::RenderCtx;
pub use desc::{
    Bindings, BufferDesc, BufferKind, DepthDesc, ImageDesc, ImageSlotDesc, PassAction, PassDesc,
    PipelineDesc, ShaderDesc, ShaderStage, UniformBlockDesc, VertexBufferDesc,
};
pub use recording::{Command, RecordingBackend, ResourceId};
pub use wgpu_backend::{GpuImage, GpuPass, GpuPipeline, WgpuBackend};
