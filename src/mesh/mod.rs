//! Core mesh data structures.
//!
//! This module provides the half-edge mesh representation, the attribute
//! buffers attached to its elements, and construction helpers.
//!
//! # Overview
//!
//! [`HalfEdgeMesh`] stores bare polygonal topology: vertices, directed
//! half-edges grouped into face loops, and the optional opposite-edge,
//! next-manifold and opposite-face relations between them.
//!
//! [`AttributedMesh`] wraps the topology and adds typed per-vertex, per-face
//! and per-region buffers (positions, regions, face types, Burgers vectors,
//! crystallographic normals, phases) plus the periodic domain.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`EdgeId`] - Identifies a half-edge
//! - [`FaceId`] - Identifies a face
//! - [`RegionId`] - Identifies a region (crystallite)
//!
//! These indices are generic over the underlying integer type ([`MeshIndex`] trait),
//! allowing you to choose `u16`, `u32`, or `u64` based on mesh size.
//!
//! # Construction
//!
//! ```
//! use crystmesh::mesh::{AttributedMesh, FaceType};
//! use nalgebra::Point3;
//!
//! let mut mesh: AttributedMesh = AttributedMesh::new();
//! let grain = mesh.create_region(0);
//! let a = mesh.create_vertex(Point3::new(0.0, 0.0, 0.0));
//! let b = mesh.create_vertex(Point3::new(1.0, 0.0, 0.0));
//! let c = mesh.create_vertex(Point3::new(0.0, 1.0, 0.0));
//!
//! let face = mesh.create_face(&[a, b, c], grain).unwrap();
//! assert_eq!(mesh.face_type(face), FaceType::Interface);
//! assert_eq!(mesh.topology().count_face_edges(face), 3);
//! ```

mod attributed;
mod builder;
mod halfedge;
mod index;
mod property;

pub use attributed::{AttributedMesh, FaceType};
pub use builder::{build_from_polygons, to_face_vertex};
pub use halfedge::{Face, FaceEdgeIter, HalfEdge, HalfEdgeMesh, Vertex, VertexEdgeIter};
pub use index::{EdgeId, FaceId, MeshIndex, RegionId, VertexId};
pub use property::{
    InitPolicy, PropertyContainer, PropertyData, PropertyHandle, PropertyKey, PropertyValue,
};
