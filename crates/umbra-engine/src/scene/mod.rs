//! Scene-side inputs of the scene pass.
//!
//! Geometry records and their instance groups are owned by the caller (the
//! scene graph); the pass only reads them through [`GeometryQuery`].

mod camera;
mod geometry;
mod light;
mod query;
mod state;

pub use camera::Camera;
pub use geometry::{
    Geometry, Instance, InstanceBuffers, InstanceGroup, Material, MeshData,
    INSTANCE_CAPACITY_MIN,
};
pub use light::DirectionalLight;
pub use query::GeometryQuery;
pub use state::{FrameUniforms, RenderState};
