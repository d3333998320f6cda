//! Geometry descriptors attached to data containers.
//!
//! A geometry says what a tuple of the container's element-level matrices
//! physically is: a voxel of an image, a vertex of a point cloud, a face of
//! a triangle mesh. Stages ask for a concrete descriptor through
//! [`GeometryType`] and get `None` when the container carries something else.

use std::fmt;

/// Capability class of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    GridLike,
    MeshLike,
    PointCloudLike,
}

/// Regular voxel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeom {
    pub dims: [usize; 3],
    pub spacing: [f32; 3],
    pub origin: [f32; 3],
}

impl ImageGeom {
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            spacing: [1.0; 3],
            origin: [0.0; 3],
        }
    }

    pub fn with_spacing(mut self, spacing: [f32; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_origin(mut self, origin: [f32; 3]) -> Self {
        self.origin = origin;
        self
    }

    /// Number of voxels, saturating at `usize::MAX`.
    pub fn voxel_count(&self) -> usize {
        self.dims.iter().fold(1usize, |acc, &d| acc.saturating_mul(d))
    }

    /// Number of voxels, or `None` when the dimensions overflow `usize`.
    pub fn checked_voxel_count(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Linear index of voxel `(x, y, z)`, x fastest.
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    pub fn coords(&self, index: usize) -> [usize; 3] {
        let [nx, ny, _] = self.dims;
        let x = index % nx.max(1);
        let y = (index / nx.max(1)) % ny.max(1);
        let z = index / (nx * ny).max(1);
        [x, y, z]
    }

    /// Physical center of a voxel.
    pub fn voxel_center(&self, index: usize) -> [f32; 3] {
        let c = self.coords(index);
        [
            self.origin[0] + (c[0] as f32 + 0.5) * self.spacing[0],
            self.origin[1] + (c[1] as f32 + 0.5) * self.spacing[1],
            self.origin[2] + (c[2] as f32 + 0.5) * self.spacing[2],
        ]
    }

    /// Face-sharing (6-connected) neighbors of a voxel, in -z, -y, -x, +x, +y, +z order.
    pub fn face_neighbors(&self, index: usize) -> impl Iterator<Item = usize> {
        let [x, y, z] = self.coords(index);
        let [nx, ny, nz] = self.dims;
        let plane = nx * ny;
        let candidates = [
            (z > 0).then(|| index - plane),
            (y > 0).then(|| index - nx),
            (x > 0).then(|| index - 1),
            (x + 1 < nx).then(|| index + 1),
            (y + 1 < ny).then(|| index + nx),
            (z + 1 < nz).then(|| index + plane),
        ];
        candidates.into_iter().flatten()
    }
}

/// Rectilinear grid given by cell bounds along each axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RectGridGeom {
    pub x_bounds: Vec<f32>,
    pub y_bounds: Vec<f32>,
    pub z_bounds: Vec<f32>,
}

impl RectGridGeom {
    pub fn dims(&self) -> [usize; 3] {
        [
            self.x_bounds.len().saturating_sub(1),
            self.y_bounds.len().saturating_sub(1),
            self.z_bounds.len().saturating_sub(1),
        ]
    }
}

/// Unconnected points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexGeom {
    pub vertices: Vec<[f32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeGeom {
    pub vertices: Vec<[f32; 3]>,
    pub edges: Vec<[usize; 2]>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriangleGeom {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[usize; 3]>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuadGeom {
    pub vertices: Vec<[f32; 3]>,
    pub quads: Vec<[usize; 4]>,
}

/// Geometry attached to a [`DataContainer`](crate::store::DataContainer).
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Image(ImageGeom),
    RectGrid(RectGridGeom),
    Vertex(VertexGeom),
    Edge(EdgeGeom),
    Triangle(TriangleGeom),
    Quad(QuadGeom),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Image(_) | Geometry::RectGrid(_) => GeometryKind::GridLike,
            Geometry::Vertex(_) => GeometryKind::PointCloudLike,
            Geometry::Edge(_) | Geometry::Triangle(_) | Geometry::Quad(_) => GeometryKind::MeshLike,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Image(_) => ImageGeom::NAME,
            Geometry::RectGrid(_) => RectGridGeom::NAME,
            Geometry::Vertex(_) => VertexGeom::NAME,
            Geometry::Edge(_) => EdgeGeom::NAME,
            Geometry::Triangle(_) => TriangleGeom::NAME,
            Geometry::Quad(_) => QuadGeom::NAME,
        }
    }

    /// Number of elements (voxels, vertices, edges, faces) the geometry defines.
    pub fn element_count(&self) -> usize {
        match self {
            Geometry::Image(g) => g.element_count(),
            Geometry::RectGrid(g) => g.element_count(),
            Geometry::Vertex(g) => g.element_count(),
            Geometry::Edge(g) => g.element_count(),
            Geometry::Triangle(g) => g.element_count(),
            Geometry::Quad(g) => g.element_count(),
        }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} elements)", self.type_name(), self.element_count())
    }
}

/// A concrete geometry descriptor that can be borrowed out of a [`Geometry`].
pub trait GeometryType: Sized + Into<Geometry> {
    const NAME: &'static str;
    const KIND: GeometryKind;

    fn element_count(&self) -> usize;

    fn from_geometry(geometry: &Geometry) -> Option<&Self>;

    fn from_geometry_mut(geometry: &mut Geometry) -> Option<&mut Self>;
}

macro_rules! impl_geometry_type {
    ($ty:ident, $variant:ident, $name:expr, $kind:ident, |$g:ident| $count:expr) => {
        impl GeometryType for $ty {
            const NAME: &'static str = $name;
            const KIND: GeometryKind = GeometryKind::$kind;

            fn element_count(&self) -> usize {
                let $g = self;
                $count
            }

            fn from_geometry(geometry: &Geometry) -> Option<&Self> {
                match geometry {
                    Geometry::$variant(g) => Some(g),
                    _ => None,
                }
            }

            fn from_geometry_mut(geometry: &mut Geometry) -> Option<&mut Self> {
                match geometry {
                    Geometry::$variant(g) => Some(g),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Geometry {
            fn from(g: $ty) -> Self {
                Geometry::$variant(g)
            }
        }
    };
}

impl_geometry_type!(ImageGeom, Image, "ImageGeometry", GridLike, |g| g.voxel_count());
impl_geometry_type!(RectGridGeom, RectGrid, "RectGridGeometry", GridLike, |g| g
    .dims()
    .iter()
    .fold(1usize, |acc, &d| acc.saturating_mul(d)));
impl_geometry_type!(VertexGeom, Vertex, "VertexGeometry", PointCloudLike, |g| g
    .vertices
    .len());
impl_geometry_type!(EdgeGeom, Edge, "EdgeGeometry", MeshLike, |g| g.edges.len());
impl_geometry_type!(TriangleGeom, Triangle, "TriangleGeometry", MeshLike, |g| g
    .triangles
    .len());
impl_geometry_type!(QuadGeom, Quad, "QuadGeometry", MeshLike, |g| g.quads.len());
