//! Hierarchical, type-erased data store.
//!
//! ```text
//! Registry
//! └── DataContainer "Volume"        (+ optional Geometry)
//!     ├── AttributeMatrix "Cells"   (Cell, 8000 tuples)
//!     │   ├── NamedArray "FeatureIds"   i32 [1]
//!     │   └── NamedArray "Quats"        f32 [4]
//!     └── AttributeMatrix "Grains"  (CellFeature, 42 tuples)
//!         └── NamedArray "Neighbors"    i32 neighbor list
//! ```
//!
//! Arrays are addressed by [`ArrayPath`] and handed to stages as weak
//! [`ArrayRef`]s.

pub mod array;
pub mod container;
pub mod geometry;
pub mod matrix;
pub mod path;
pub mod registry;

pub use array::{ArrayLayout, ArrayView, ArrayViewMut, NamedArray, SharedArray};
pub use container::DataContainer;
pub use geometry::{
    EdgeGeom, Geometry, GeometryKind, GeometryType, ImageGeom, QuadGeom, RectGridGeom,
    TriangleGeom, VertexGeom,
};
pub use matrix::{AttributeMatrix, MatrixCategory, RenameOutcome};
pub use path::ArrayPath;
pub use registry::{ArrayDescription, ArrayRef, Registry, StatusSink};
