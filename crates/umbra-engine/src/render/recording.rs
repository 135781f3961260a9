use std::collections::HashMap;

use anyhow::{ensure, Result};

use super::backend::RenderBackend;
use super::desc::{Bindings, BufferDesc, ImageDesc, PassAction, PassDesc, PipelineDesc, ShaderStage};

/// Opaque handle handed out by [`RecordingBackend`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResourceId(pub u32);

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BeginPass {
        pass: ResourceId,
        action: PassAction,
    },
    ApplyPipeline {
        pipeline: ResourceId,
    },
    ApplyUniforms {
        stage: ShaderStage,
        slot: u32,
        data: Vec<u8>,
    },
    ApplyBindings {
        vertex_buffers: Vec<ResourceId>,
        index_buffer: ResourceId,
        fs_images: Vec<ResourceId>,
    },
    Draw {
        base_element: u32,
        num_elements: u32,
        num_instances: u32,
    },
    EndPass,
}

/// Backend that records every call instead of talking to a GPU.
///
/// Resource descriptors are kept so callers can inspect what was created.
/// Protocol violations (drawing outside a pass, drawing without bindings,
/// nested passes) panic.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    images: HashMap<ResourceId, ImageDesc>,
    buffers: HashMap<ResourceId, Vec<u8>>,
    pipelines: HashMap<ResourceId, PipelineDesc>,
    passes: HashMap<ResourceId, (ResourceId, ResourceId)>,
    commands: Vec<Command>,

    in_pass: bool,
    pipeline_applied: bool,
    bindings_applied: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> ResourceId {
        self.next_id += 1;
        ResourceId(self.next_id)
    }

    /// Commands recorded so far, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drains recorded commands, keeping resources.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Recorded draws as `(base_element, num_elements, num_instances)`.
    pub fn draws(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.commands.iter().filter_map(|c| match *c {
            Command::Draw {
                base_element,
                num_elements,
                num_instances,
            } => Some((base_element, num_elements, num_instances)),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    /// Number of pipelines created over the backend's lifetime.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn pipeline(&self, id: ResourceId) -> Option<&PipelineDesc> {
        self.pipelines.get(&id)
    }

    pub fn image(&self, id: ResourceId) -> Option<&ImageDesc> {
        self.images.get(&id)
    }

    /// Current contents of a buffer.
    pub fn buffer(&self, id: ResourceId) -> Option<&[u8]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    /// `(color, depth)` attachments of a pass.
    pub fn pass_attachments(&self, id: ResourceId) -> Option<(ResourceId, ResourceId)> {
        self.passes.get(&id).copied()
    }
}

impl RenderBackend for RecordingBackend {
    type Image = ResourceId;
    type Buffer = ResourceId;
    type Pipeline = ResourceId;
    type Pass = ResourceId;

    fn make_image(&mut self, desc: &ImageDesc) -> Result<ResourceId> {
        ensure!(
            desc.width > 0 && desc.height > 0,
            "image {:?} has zero size",
            desc.label
        );
        let id = self.alloc();
        self.images.insert(id, desc.clone());
        Ok(id)
    }

    fn make_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<ResourceId> {
        ensure!(desc.size > 0, "buffer {:?} has zero size", desc.label);
        let id = self.alloc();
        let data = match desc.contents {
            Some(bytes) => bytes.to_vec(),
            None => vec![0; desc.size as usize],
        };
        self.buffers.insert(id, data);
        Ok(id)
    }

    fn make_pipeline(&mut self, desc: &PipelineDesc) -> Result<ResourceId> {
        let id = self.alloc();
        self.pipelines.insert(id, desc.clone());
        Ok(id)
    }

    fn make_pass(&mut self, desc: &PassDesc<'_, ResourceId>) -> Result<ResourceId> {
        let (Some(color), Some(depth)) = (self.images.get(desc.color), self.images.get(desc.depth))
        else {
            anyhow::bail!("pass {:?} references unknown images", desc.label);
        };
        ensure!(
            (color.width, color.height) == (depth.width, depth.height),
            "pass {:?}: color target is {}x{} but depth target is {}x{}",
            desc.label,
            color.width,
            color.height,
            depth.width,
            depth.height
        );
        let id = self.alloc();
        self.passes.insert(id, (*desc.color, *desc.depth));
        Ok(id)
    }

    fn update_buffer(&mut self, buffer: &ResourceId, data: &[u8]) {
        let Some(dst) = self.buffers.get_mut(buffer) else {
            panic!("update of unknown buffer {buffer:?}");
        };
        assert!(data.len() <= dst.len(), "buffer {buffer:?} overflow");
        dst[..data.len()].copy_from_slice(data);
    }

    fn begin_pass(&mut self, pass: &ResourceId, action: &PassAction) {
        assert!(!self.in_pass, "begin_pass inside a pass");
        assert!(self.passes.contains_key(pass), "unknown pass {pass:?}");
        self.in_pass = true;
        self.pipeline_applied = false;
        self.bindings_applied = false;
        self.commands.push(Command::BeginPass {
            pass: *pass,
            action: *action,
        });
    }

    fn apply_pipeline(&mut self, pipeline: &ResourceId) {
        assert!(self.in_pass, "apply_pipeline outside a pass");
        self.pipeline_applied = true;
        self.commands.push(Command::ApplyPipeline {
            pipeline: *pipeline,
        });
    }

    fn apply_uniforms(&mut self, stage: ShaderStage, slot: u32, data: &[u8]) {
        assert!(self.pipeline_applied, "apply_uniforms without a pipeline");
        self.commands.push(Command::ApplyUniforms {
            stage,
            slot,
            data: data.to_vec(),
        });
    }

    fn apply_bindings(&mut self, bindings: &Bindings<'_, ResourceId, ResourceId>) {
        assert!(self.pipeline_applied, "apply_bindings without a pipeline");
        self.bindings_applied = true;
        self.commands.push(Command::ApplyBindings {
            vertex_buffers: bindings.vertex_buffers.iter().map(|b| **b).collect(),
            index_buffer: *bindings.index_buffer,
            fs_images: bindings.fs_images.iter().map(|i| **i).collect(),
        });
    }

    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32) {
        assert!(self.bindings_applied, "draw without bindings");
        self.commands.push(Command::Draw {
            base_element,
            num_elements,
            num_instances,
        });
    }

    fn end_pass(&mut self) {
        assert!(self.in_pass, "end_pass outside a pass");
        self.in_pass = false;
        self.commands.push(Command::EndPass);
    }
}
