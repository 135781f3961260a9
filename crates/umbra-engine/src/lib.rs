//! Umbra engine crate.
//!
//! This crate owns the shadow-lit scene pass and the GPU runtime pieces it is
//! recorded through: device bring-up, the backend seam and its wgpu
//! implementation, and the CPU reference of the scene shader's lighting math.

pub mod color;
pub mod device;
pub mod logging;
pub mod render;
pub mod scene;
pub mod shading;
