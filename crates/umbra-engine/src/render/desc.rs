//! Backend-independent resource and state descriptors.
//!
//! wgpu's plain-data enums (formats, compare functions, step modes) are used as
//! vocabulary; nothing here touches a device.

use crate::color::Rgb;

/// Shader stage a uniform block belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// 2D image (texture) description.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    /// Usable as a pass attachment (otherwise sampled only).
    pub render_target: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// GPU buffer description.
///
/// With `contents` the buffer is immutable and sized to the data; without,
/// it is `size` bytes and updatable through `RenderBackend::update_buffer`.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc<'a> {
    pub label: &'static str,
    pub kind: BufferKind,
    pub size: u64,
    pub contents: Option<&'a [u8]>,
}

impl<'a> BufferDesc<'a> {
    /// Immutable buffer initialized with `contents`.
    pub fn immutable(label: &'static str, kind: BufferKind, contents: &'a [u8]) -> Self {
        Self {
            label,
            kind,
            size: contents.len() as u64,
            contents: Some(contents),
        }
    }

    /// Updatable buffer of `size` bytes.
    pub fn dynamic(label: &'static str, kind: BufferKind, size: u64) -> Self {
        Self {
            label,
            kind,
            size,
            contents: None,
        }
    }
}

/// Offscreen pass: one color attachment plus a depth attachment.
#[derive(Debug)]
pub struct PassDesc<'a, Img> {
    pub label: &'static str,
    pub color: &'a Img,
    pub depth: &'a Img,
}

/// What happens to the attachments when a pass begins.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PassAction {
    pub color: wgpu::LoadOp<wgpu::Color>,
    pub depth: wgpu::LoadOp<f32>,
}

impl PassAction {
    /// Clears color to `background` and keeps the existing depth contents.
    pub fn clear_color(background: Rgb) -> Self {
        Self {
            color: wgpu::LoadOp::Clear(background.to_wgpu()),
            depth: wgpu::LoadOp::Load,
        }
    }
}

/// Uniform block declared by a shader stage.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlockDesc {
    pub name: &'static str,
    pub size: u64,
}

/// Sampled image declared by the fragment stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSlotDesc {
    pub name: &'static str,
}

/// Shader program description (WGSL, one module with both entry points).
///
/// Bindings in group 0 are numbered in declaration order: vertex uniform
/// blocks, fragment uniform blocks, then a texture + sampler pair per image.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderDesc {
    pub source: &'static str,
    pub vs_entry: &'static str,
    pub fs_entry: &'static str,
    pub vs_uniform_blocks: Vec<UniformBlockDesc>,
    pub fs_uniform_blocks: Vec<UniformBlockDesc>,
    pub fs_images: Vec<ImageSlotDesc>,
}

impl ShaderDesc {
    /// Binding index of uniform block `slot` of `stage`.
    pub fn uniform_binding(&self, stage: ShaderStage, slot: u32) -> u32 {
        match stage {
            ShaderStage::Vertex => slot,
            ShaderStage::Fragment => self.vs_uniform_blocks.len() as u32 + slot,
        }
    }

    /// Binding indices `(texture, sampler)` of fragment image `slot`.
    pub fn image_bindings(&self, slot: u32) -> (u32, u32) {
        let base = (self.vs_uniform_blocks.len() + self.fs_uniform_blocks.len()) as u32;
        (base + 2 * slot, base + 2 * slot + 1)
    }
}

/// One vertex buffer slot and the attributes it feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferDesc {
    pub stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthDesc {
    pub format: wgpu::TextureFormat,
    pub compare: wgpu::CompareFunction,
    pub write_enabled: bool,
}

/// Immutable pipeline state: shader, vertex layout and fixed-function state.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    pub label: &'static str,
    pub shader: ShaderDesc,
    pub vertex_buffers: Vec<VertexBufferDesc>,
    pub index_format: wgpu::IndexFormat,
    pub depth: DepthDesc,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
}

/// Resources bound for the next draw.
///
/// `vertex_buffers[i]` feeds vertex buffer slot `i` of the applied pipeline.
#[derive(Debug)]
pub struct Bindings<'a, Buf, Img> {
    pub vertex_buffers: &'a [&'a Buf],
    pub index_buffer: &'a Buf,
    pub fs_images: &'a [&'a Img],
}
