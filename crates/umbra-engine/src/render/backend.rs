use anyhow::Result;

use super::desc::{Bindings, BufferDesc, ImageDesc, PassAction, PassDesc, PipelineDesc, ShaderStage};

/// Immediate-mode graphics interface passes are recorded through.
///
/// Resource creation is fallible. Command recording is not: invalid usage is
/// reported by the implementation's own diagnostics (wgpu validation, or a
/// panic in [`super::RecordingBackend`]).
///
/// Recording protocol, one pass at a time:
/// `begin_pass → apply_pipeline → apply_uniforms* → (apply_bindings → draw)* → end_pass`.
pub trait RenderBackend {
    type Image: Clone;
    type Buffer;
    type Pipeline;
    type Pass;

    fn make_image(&mut self, desc: &ImageDesc) -> Result<Self::Image>;
    fn make_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<Self::Buffer>;
    fn make_pipeline(&mut self, desc: &PipelineDesc) -> Result<Self::Pipeline>;
    fn make_pass(&mut self, desc: &PassDesc<'_, Self::Image>) -> Result<Self::Pass>;

    /// Overwrites the start of a dynamic buffer with `data`.
    fn update_buffer(&mut self, buffer: &Self::Buffer, data: &[u8]);

    fn begin_pass(&mut self, pass: &Self::Pass, action: &PassAction);
    fn apply_pipeline(&mut self, pipeline: &Self::Pipeline);

    /// Uploads uniform block `slot` of `stage` for the applied pipeline.
    fn apply_uniforms(&mut self, stage: ShaderStage, slot: u32, data: &[u8]);
    fn apply_bindings(&mut self, bindings: &Bindings<'_, Self::Buffer, Self::Image>);

    /// Indexed, instanced draw of `num_elements` indices from `base_element`.
    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32);
    fn end_pass(&mut self);
}
