//! CPU reference of the scene shader's lighting math.
//!
//! Everything here mirrors `render/scene_pass/shaders/scene.wgsl` function for
//! function, so the numeric contracts (packed depth weights, shadow bias, PCF
//! kernel, lighting terms) can be exercised without a GPU.

pub mod depth;
pub mod model;
pub mod shadow;

pub use depth::{decode_depth, decode_depth_bytes, encode_depth, encode_depth_bytes};
pub use model::{emissive_floor, shade_fragment, transform_vertex, Fragment, Lighting};
pub use shadow::{
    sample_shadow, sample_shadow_pcf, PackedDepthMap, ShadowMapSampler, PCF_RADIUS, PCF_SAMPLES,
    SHADOW_BIAS,
};
