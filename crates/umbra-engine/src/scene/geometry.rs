use anyhow::{ensure, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::render::{BufferDesc, BufferKind, RenderBackend};

/// Smallest instance capacity allocated for a group.
pub const INSTANCE_CAPACITY_MIN: u32 = 64;

/// Per-instance surface parameters, as fed to vertex location 3.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Material {
    /// Scale of the specular highlight.
    pub specular_power: f32,
    /// Specular exponent; values below 1 are treated as 1.
    pub shininess: f32,
    /// Emissive factor; only values above 1 brighten the lit term.
    pub emissive: f32,
}

impl Material {
    #[inline]
    pub const fn new(specular_power: f32, shininess: f32, emissive: f32) -> Self {
        Self {
            specular_power,
            shininess,
            emissive,
        }
    }

    #[inline]
    pub const fn matte() -> Self {
        Self::new(0.0, 1.0, 0.0)
    }
}

/// One instance of a geometry record.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Instance {
    pub color: Vec4,
    pub material: Material,
    pub transform: Mat4,
}

/// CPU mesh: per-vertex positions and normals, 16-bit triangle list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u16>,
}

impl MeshData {
    /// Axis-aligned unit cube centered at the origin, counter-clockwise outward faces.
    pub fn cube() -> Self {
        // (normal, u, v) with u × v = normal.
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];

        let mut mesh = Self::default();
        for (n, u, v) in FACES {
            let base = mesh.positions.len() as u16;
            let c = n * 0.5;
            let (u, v) = (u * 0.5, v * 0.5);
            mesh.positions
                .extend([c - u - v, c + u - v, c + u + v, c - u + v]);
            mesh.normals.extend([n; 4]);
            mesh.indices
                .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Checks the mesh can be drawn as an indexed `u16` triangle list.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.positions.is_empty(), "mesh has no vertices");
        ensure!(
            self.positions.len() == self.normals.len(),
            "mesh has {} positions but {} normals",
            self.positions.len(),
            self.normals.len()
        );
        ensure!(
            self.positions.len() <= u16::MAX as usize + 1,
            "mesh has {} vertices; 16-bit indices address at most 65536",
            self.positions.len()
        );
        ensure!(
            !self.indices.is_empty() && self.indices.len() % 3 == 0,
            "mesh index count {} is not a non-empty multiple of 3",
            self.indices.len()
        );
        if let Some(&bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            anyhow::bail!("mesh index {bad} out of range ({} vertices)", self.positions.len());
        }
        Ok(())
    }
}

/// GPU streams of an instance group.
#[derive(Debug)]
pub struct InstanceBuffers<Buf> {
    /// `vec4` color per instance (stride 16).
    pub color: Buf,
    /// [`Material`] per instance (stride 12).
    pub material: Buf,
    /// Column-major model matrix per instance (stride 64).
    pub transform: Buf,
}

/// Batch of instances drawn with one instanced call.
///
/// Buffers are allocated on the first non-empty [`write`](Self::write) and
/// grown to the next power of two (at least [`INSTANCE_CAPACITY_MIN`]) when
/// outgrown.
#[derive(Debug)]
pub struct InstanceGroup<Buf> {
    buffers: Option<InstanceBuffers<Buf>>,
    instance_count: u32,
    capacity: u32,
}

impl<Buf> Default for InstanceGroup<Buf> {
    fn default() -> Self {
        Self {
            buffers: None,
            instance_count: 0,
            capacity: 0,
        }
    }
}

impl<Buf> InstanceGroup<Buf> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instance_count == 0
    }

    /// Streams to bind; `None` until the group first held instances.
    #[inline]
    pub fn buffers(&self) -> Option<&InstanceBuffers<Buf>> {
        self.buffers.as_ref()
    }

    /// Replaces the group's instances, uploading the three streams.
    pub fn write<B>(&mut self, backend: &mut B, instances: &[Instance]) -> Result<()>
    where
        B: RenderBackend<Buffer = Buf>,
    {
        let count = u32::try_from(instances.len()).context("too many instances")?;
        if count == 0 {
            self.instance_count = 0;
            return Ok(());
        }

        self.ensure_capacity(backend, count)?;
        let Some(buffers) = self.buffers.as_ref() else {
            anyhow::bail!("instance buffers missing after allocation");
        };

        let colors: Vec<Vec4> = instances.iter().map(|i| i.color).collect();
        let materials: Vec<Material> = instances.iter().map(|i| i.material).collect();
        let transforms: Vec<Mat4> = instances.iter().map(|i| i.transform).collect();

        backend.update_buffer(&buffers.color, bytemuck::cast_slice(&colors));
        backend.update_buffer(&buffers.material, bytemuck::cast_slice(&materials));
        backend.update_buffer(&buffers.transform, bytemuck::cast_slice(&transforms));

        self.instance_count = count;
        Ok(())
    }

    fn ensure_capacity<B>(&mut self, backend: &mut B, required: u32) -> Result<()>
    where
        B: RenderBackend<Buffer = Buf>,
    {
        if required <= self.capacity && self.buffers.is_some() {
            return Ok(());
        }

        let new_cap = grown_capacity(required)?;
        let bytes = |stride: usize| new_cap as u64 * stride as u64;

        let buffers = InstanceBuffers {
            color: backend.make_buffer(&BufferDesc::dynamic(
                "umbra instance colors",
                BufferKind::Vertex,
                bytes(size_of::<Vec4>()),
            ))?,
            material: backend.make_buffer(&BufferDesc::dynamic(
                "umbra instance materials",
                BufferKind::Vertex,
                bytes(size_of::<Material>()),
            ))?,
            transform: backend.make_buffer(&BufferDesc::dynamic(
                "umbra instance transforms",
                BufferKind::Vertex,
                bytes(size_of::<Mat4>()),
            ))?,
        };

        log::debug!("instance group capacity {} -> {}", self.capacity, new_cap);
        self.buffers = Some(buffers);
        self.capacity = new_cap;
        Ok(())
    }
}

/// Capacity holding `required` instances: the next power of two, at least
/// [`INSTANCE_CAPACITY_MIN`].
fn grown_capacity(required: u32) -> Result<u32> {
    let cap = required
        .checked_next_power_of_two()
        .with_context(|| format!("instance capacity for {required} overflows u32"))?;
    Ok(cap.max(INSTANCE_CAPACITY_MIN))
}

/// Static mesh buffers plus the two instance groups drawn with them.
#[derive(Debug)]
pub struct Geometry<Buf> {
    pub vertex_buffer: Buf,
    pub normal_buffer: Buf,
    pub index_buffer: Buf,
    pub index_count: u32,

    pub solid: InstanceGroup<Buf>,
    pub emissive: InstanceGroup<Buf>,
}

impl<Buf> Geometry<Buf> {
    /// Uploads `mesh` into immutable buffers; both instance groups start empty.
    pub fn new<B>(backend: &mut B, mesh: &MeshData) -> Result<Self>
    where
        B: RenderBackend<Buffer = Buf>,
    {
        mesh.validate()?;

        let vertex_buffer = backend.make_buffer(&BufferDesc::immutable(
            "umbra mesh positions",
            BufferKind::Vertex,
            bytemuck::cast_slice(&mesh.positions),
        ))?;
        let normal_buffer = backend.make_buffer(&BufferDesc::immutable(
            "umbra mesh normals",
            BufferKind::Vertex,
            bytemuck::cast_slice(&mesh.normals),
        ))?;
        let index_buffer = backend.make_buffer(&BufferDesc::immutable(
            "umbra mesh indices",
            BufferKind::Index,
            bytemuck::cast_slice(&mesh.indices),
        ))?;

        Ok(Self {
            vertex_buffer,
            normal_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            solid: InstanceGroup::new(),
            emissive: InstanceGroup::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingBackend;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn instance(x: f32) -> Instance {
        Instance {
            color: Vec4::ONE,
            material: Material::new(1.0, 8.0, 0.0),
            transform: Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
        }
    }

    // ── mesh ──────────────────────────────────────────────────────────────

    #[test]
    fn cube_faces_wind_counter_clockwise_outward() {
        let mesh = MeshData::cube();
        mesh.validate().unwrap();
        assert_eq!(mesh.positions.len(), 24);
        assert_eq!(mesh.indices.len(), 36);

        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|k| mesh.positions[tri[k] as usize]);
            let n = mesh.normals[tri[0] as usize];
            assert!((b - a).cross(c - a).dot(n) > 0.0);
        }
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut mesh = MeshData::cube();
        mesh.indices[5] = 99;
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn mismatched_normals_are_rejected() {
        let mut mesh = MeshData::cube();
        mesh.normals.pop();
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn material_matches_three_float_stream() {
        assert_eq!(size_of::<Material>(), 12);
        assert_eq!(size_of::<Mat4>(), 64);
        assert_eq!(size_of::<Vec4>(), 16);
    }

    // ── upload ────────────────────────────────────────────────────────────

    #[test]
    fn geometry_upload_starts_with_empty_groups() {
        let mut backend = RecordingBackend::new();
        let geo = Geometry::new(&mut backend, &MeshData::cube()).unwrap();
        assert_eq!(geo.index_count, 36);
        assert!(geo.solid.is_empty() && geo.emissive.is_empty());
        assert!(geo.solid.buffers().is_none());

        let positions = backend.buffer(geo.vertex_buffer).unwrap();
        assert_eq!(positions.len(), 24 * 12);
    }

    #[test]
    fn instance_streams_are_split_per_attribute() {
        let mut backend = RecordingBackend::new();
        let mut group = InstanceGroup::new();
        group
            .write(&mut backend, &[instance(1.0), instance(2.0)])
            .unwrap();
        assert_eq!(group.instance_count(), 2);

        let buffers = group.buffers().unwrap();
        let materials = floats(backend.buffer(buffers.material).unwrap());
        assert_eq!(&materials[..6], &[1.0, 8.0, 0.0, 1.0, 8.0, 0.0]);

        let transforms = floats(backend.buffer(buffers.transform).unwrap());
        // Translation lives in the fourth column.
        assert_eq!(transforms[12], 1.0);
        assert_eq!(transforms[16 + 12], 2.0);
    }

    #[test]
    fn capacity_grows_to_next_power_of_two() {
        let mut backend = RecordingBackend::new();
        let mut group = InstanceGroup::new();

        group.write(&mut backend, &[instance(0.0); 3]).unwrap();
        assert_eq!(group.capacity(), INSTANCE_CAPACITY_MIN);
        let first = group.buffers().unwrap().color;

        group.write(&mut backend, &[instance(0.0); 10]).unwrap();
        assert_eq!(group.buffers().unwrap().color, first, "no realloc within capacity");

        group.write(&mut backend, &vec![instance(0.0); 100]).unwrap();
        assert_eq!(group.capacity(), 128);
        assert_ne!(group.buffers().unwrap().color, first);
    }

    #[test]
    fn capacity_beyond_u32_is_an_error() {
        assert_eq!(grown_capacity(1).unwrap(), INSTANCE_CAPACITY_MIN);
        assert_eq!(grown_capacity(1 << 31).unwrap(), 1 << 31);
        assert!(grown_capacity((1 << 31) + 1).is_err());
        assert!(grown_capacity(u32::MAX).is_err());
    }

    #[test]
    fn empty_write_resets_count_without_allocating() {
        let mut backend = RecordingBackend::new();
        let mut group: InstanceGroup<_> = InstanceGroup::new();
        group.write(&mut backend, &[]).unwrap();
        assert!(group.is_empty());
        assert!(group.buffers().is_none());
    }
}
