use crate::render::{
    DepthDesc, ImageSlotDesc, PipelineDesc, ShaderDesc, UniformBlockDesc, VertexBufferDesc,
};

use super::uniforms::{SceneFsUniforms, SceneVsUniforms};

/// WGSL source of the scene shader.
pub const SCENE_SHADER_SOURCE: &str = include_str!("shaders/scene.wgsl");

const POSITION_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const NORMAL_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const COLOR_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x4];
const MATERIAL_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![3 => Float32x3];
const TRANSFORM_ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    4 => Float32x4, // column 0
    5 => Float32x4,
    6 => Float32x4,
    7 => Float32x4  // column 3 (translation)
];

fn stream(
    stride: u64,
    step_mode: wgpu::VertexStepMode,
    attributes: &[wgpu::VertexAttribute],
) -> VertexBufferDesc {
    VertexBufferDesc {
        stride,
        step_mode,
        attributes: attributes.to_vec(),
    }
}

/// Pipeline description of the scene pass.
///
/// Vertex buffer slots, in bind order: positions, normals (per vertex);
/// colors, materials, transforms (per instance).
pub fn scene_pipeline_desc(
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
) -> PipelineDesc {
    use wgpu::VertexStepMode::{Instance, Vertex};

    PipelineDesc {
        label: "umbra scene pipeline",
        shader: ShaderDesc {
            source: SCENE_SHADER_SOURCE,
            vs_entry: "vs_main",
            fs_entry: "fs_main",
            vs_uniform_blocks: vec![UniformBlockDesc {
                name: "umbra scene vs uniforms",
                size: size_of::<SceneVsUniforms>() as u64,
            }],
            fs_uniform_blocks: vec![UniformBlockDesc {
                name: "umbra scene fs uniforms",
                size: size_of::<SceneFsUniforms>() as u64,
            }],
            fs_images: vec![ImageSlotDesc { name: "shadow_map" }],
        },
        vertex_buffers: vec![
            stream(12, Vertex, &POSITION_ATTRS),
            stream(12, Vertex, &NORMAL_ATTRS),
            stream(16, Instance, &COLOR_ATTRS),
            stream(12, Instance, &MATERIAL_ATTRS),
            stream(64, Instance, &TRANSFORM_ATTRS),
        ],
        index_format: wgpu::IndexFormat::Uint16,
        depth: DepthDesc {
            format: depth_format,
            compare: wgpu::CompareFunction::LessEqual,
            write_enabled: false,
        },
        color_formats: vec![color_format],
        cull_mode: Some(wgpu::Face::Back),
        front_face: wgpu::FrontFace::Ccw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> PipelineDesc {
        scene_pipeline_desc(
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureFormat::Depth32Float,
        )
    }

    // ── vertex layout ─────────────────────────────────────────────────────

    #[test]
    fn five_streams_two_per_vertex_three_per_instance() {
        let d = desc();
        let steps: Vec<_> = d.vertex_buffers.iter().map(|b| b.step_mode).collect();
        assert_eq!(
            steps,
            [
                wgpu::VertexStepMode::Vertex,
                wgpu::VertexStepMode::Vertex,
                wgpu::VertexStepMode::Instance,
                wgpu::VertexStepMode::Instance,
                wgpu::VertexStepMode::Instance,
            ]
        );
        let strides: Vec<_> = d.vertex_buffers.iter().map(|b| b.stride).collect();
        assert_eq!(strides, [12, 12, 16, 12, 64]);
    }

    #[test]
    fn attribute_locations_match_shader_inputs() {
        let d = desc();
        let attrs: Vec<(u32, u64, wgpu::VertexFormat)> = d
            .vertex_buffers
            .iter()
            .flat_map(|b| b.attributes.iter())
            .map(|a| (a.shader_location, a.offset, a.format))
            .collect();

        use wgpu::VertexFormat::{Float32x3, Float32x4};
        assert_eq!(
            attrs,
            [
                (0, 0, Float32x3),
                (1, 0, Float32x3),
                (2, 0, Float32x4),
                (3, 0, Float32x3),
                (4, 0, Float32x4),
                (5, 16, Float32x4),
                (6, 32, Float32x4),
                (7, 48, Float32x4),
            ]
        );
    }

    // ── fixed-function state ──────────────────────────────────────────────

    #[test]
    fn depth_is_read_only_less_equal() {
        let d = desc();
        assert_eq!(d.depth.compare, wgpu::CompareFunction::LessEqual);
        assert!(!d.depth.write_enabled);
        assert_eq!(d.depth.format, wgpu::TextureFormat::Depth32Float);
    }

    #[test]
    fn back_faces_are_culled_with_u16_indices() {
        let d = desc();
        assert_eq!(d.cull_mode, Some(wgpu::Face::Back));
        assert_eq!(d.front_face, wgpu::FrontFace::Ccw);
        assert_eq!(d.index_format, wgpu::IndexFormat::Uint16);
        assert_eq!(d.color_formats, [wgpu::TextureFormat::Rgba16Float]);
    }

    // ── shader interface ──────────────────────────────────────────────────

    #[test]
    fn uniform_blocks_match_uniform_structs() {
        let d = desc();
        assert_eq!(d.shader.vs_uniform_blocks[0].size, 128);
        assert_eq!(d.shader.fs_uniform_blocks[0].size, 64);
        assert_eq!(d.shader.fs_images[0].name, "shadow_map");
    }

    #[test]
    fn shader_declares_inputs_output_and_bindings() {
        let src = SCENE_SHADER_SOURCE;
        for location in 0..=7 {
            assert!(src.contains(&format!("@location({location})")), "location {location}");
        }
        assert!(src.contains("var shadow_map: texture_2d<f32>"));
        assert!(src.contains("frag_color: vec4<f32>"));
        assert!(src.contains("fn vs_main") && src.contains("fn fs_main"));

        let d = desc();
        let (tex, smp) = d.shader.image_bindings(0);
        assert!(src.contains(&format!("@binding({tex}) var shadow_map")));
        assert!(src.contains(&format!("@binding({smp}) var shadow_map_sampler")));
    }

    #[test]
    fn shader_matches_cpu_depth_weights_and_bias() {
        let src = SCENE_SHADER_SOURCE;
        assert!(src.contains("1.0 / 160581375.0"));
        assert!(src.contains("SHADOW_BIAS: f32 = 0.00001"));
        assert!(src.contains("PCF_RADIUS: i32 = 2"));
    }

    // ── shader validation ─────────────────────────────────────────────────

    fn parsed_shader() -> naga::Module {
        let module = naga::front::wgsl::parse_str(SCENE_SHADER_SOURCE)
            .unwrap_or_else(|e| panic!("{}", e.emit_to_string(SCENE_SHADER_SOURCE)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .unwrap_or_else(|e| panic!("{e:?}"));
        module
    }

    #[test]
    fn shader_parses_and_validates() {
        let module = parsed_shader();
        let stages: Vec<_> = module
            .entry_points
            .iter()
            .map(|ep| (ep.name.as_str(), ep.stage))
            .collect();
        assert!(stages.contains(&("vs_main", naga::ShaderStage::Vertex)));
        assert!(stages.contains(&("fs_main", naga::ShaderStage::Fragment)));
    }

    #[test]
    fn shader_group_zero_matches_descriptor_bindings() {
        use crate::render::ShaderStage;

        let module = parsed_shader();
        let d = desc();
        let (tex, smp) = d.shader.image_bindings(0);
        let expected = [
            ("vs_u", d.shader.uniform_binding(ShaderStage::Vertex, 0)),
            ("fs_u", d.shader.uniform_binding(ShaderStage::Fragment, 0)),
            ("shadow_map", tex),
            ("shadow_map_sampler", smp),
        ];

        for (name, binding) in expected {
            let (_, var) = module
                .global_variables
                .iter()
                .find(|(_, v)| v.name.as_deref() == Some(name))
                .unwrap_or_else(|| panic!("{name} not declared"));
            let rb = var.binding.as_ref().unwrap();
            assert_eq!((rb.group, rb.binding), (0, binding), "{name}");
        }
    }

    #[test]
    fn shader_uniform_blocks_have_descriptor_sizes() {
        let module = parsed_shader();
        let d = desc();
        let size_of_global = |name: &str| {
            let (_, var) = module
                .global_variables
                .iter()
                .find(|(_, v)| v.name.as_deref() == Some(name))
                .unwrap();
            module.types[var.ty].inner.size(module.to_ctx()) as u64
        };
        assert_eq!(size_of_global("vs_u"), d.shader.vs_uniform_blocks[0].size);
        assert_eq!(size_of_global("fs_u"), d.shader.fs_uniform_blocks[0].size);
    }

    #[test]
    fn vertex_inputs_cover_every_attribute_location() {
        let module = parsed_shader();
        let vs = module
            .entry_points
            .iter()
            .find(|ep| ep.name == "vs_main")
            .unwrap();
        let arg = &vs.function.arguments[0];
        let naga::TypeInner::Struct { members, .. } = &module.types[arg.ty].inner else {
            panic!("vs_main takes a struct");
        };
        let mut locations: Vec<u32> = members
            .iter()
            .filter_map(|m| match m.binding {
                Some(naga::Binding::Location { location, .. }) => Some(location),
                _ => None,
            })
            .collect();
        locations.sort_unstable();

        let mut expected: Vec<u32> = desc()
            .vertex_buffers
            .iter()
            .flat_map(|b| b.attributes.iter().map(|a| a.shader_location))
            .collect();
        expected.sort_unstable();
        assert_eq!(locations, expected);
    }
}
