use super::Geometry;

/// Source of the geometry records drawn by a pass.
///
/// Stands in for an ECS query: the pass iterates whatever matches, once per
/// frame, and never mutates it.
pub trait GeometryQuery<Buf> {
    fn geometries<'a>(&'a self) -> impl Iterator<Item = &'a Geometry<Buf>>
    where
        Buf: 'a;
}

impl<Buf> GeometryQuery<Buf> for [Geometry<Buf>] {
    fn geometries<'a>(&'a self) -> impl Iterator<Item = &'a Geometry<Buf>>
    where
        Buf: 'a,
    {
        self.iter()
    }
}

impl<Buf> GeometryQuery<Buf> for Vec<Geometry<Buf>> {
    fn geometries<'a>(&'a self) -> impl Iterator<Item = &'a Geometry<Buf>>
    where
        Buf: 'a,
    {
        self.as_slice().geometries()
    }
}
