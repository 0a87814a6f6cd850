//! # Crystmesh
//!
//! A half-edge mesh topology engine for crystal defect microstructures.
//!
//! Crystmesh stores polygonal surfaces as half-edge meshes with typed
//! per-element attributes, models dislocation lines, slip facets and grain
//! interfaces on top of them, and replicates whole microstructures across the
//! periodic images of a simulation cell.
//!
//! ## Features
//!
//! - **Half-edge data structure**: opposite-edge, next-manifold and
//!   opposite-face relations with type-safe indices
//! - **Flexible indexing**: Support for 16-bit, 32-bit, and 64-bit indices
//! - **Attribute buffers**: typed per-vertex, per-face and per-region
//!   properties kept in step with the topology
//! - **Dislocation networks**: segment construction, merging of 2-nodes into
//!   continuous lines, line tracing and Burgers vector conservation checks
//! - **Periodic replication**: minimum-image unwrapping with link repair
//!
//! ## Quick Start
//!
//! ```
//! use crystmesh::prelude::*;
//! use nalgebra::{Point3, Vector3};
//!
//! let cell = SimulationCell::orthorhombic(Vector3::repeat(10.0), [true; 3]);
//! let mut micro = Microstructure::from(AttributedMesh::<u32>::with_domain(cell));
//! let grain = micro.create_region(0);
//!
//! let a = micro.create_vertex(Point3::new(1.0, 1.0, 1.0));
//! let b = micro.create_vertex(Point3::new(9.0, 1.0, 1.0));
//! micro.create_dislocation_segment(a, b, Vector3::x(), grain).unwrap();
//! assert_eq!(micro.face_count(), 2);
//!
//! // Two images along x
//! micro.replicate(&ReplicateOptions::default().with_images([2, 1, 1])).unwrap();
//! assert_eq!(micro.vertex_count(), 4);
//! assert_eq!(micro.face_count(), 4);
//!
//! let network = micro.trace_dislocation_lines().unwrap();
//! assert_eq!(network.lines.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod cell;
pub mod error;
pub mod mesh;
pub mod microstructure;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use crystmesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{replicate_periodic, Progress, ReplicateOptions};
    pub use crate::cell::{ImageRange, SimulationCell};
    pub use crate::error::{ElementKind, MeshError, Result};
    pub use crate::mesh::{
        build_from_polygons, to_face_vertex, AttributedMesh, EdgeId, FaceId, FaceType,
        HalfEdgeMesh, MeshIndex, PropertyKey, RegionId, VertexId,
    };
    pub use crate::microstructure::{DislocationNetwork, LineMergeReport, Microstructure};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];

        let faces = vec![
            vec![0, 2, 1], // bottom
            vec![0, 1, 3], // front
            vec![1, 2, 3], // right
            vec![2, 0, 3], // left
        ];

        let mesh: AttributedMesh = build_from_polygons(&vertices, &faces, None).unwrap();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.edge_count(), 12);
        assert!(mesh.topology().is_valid());
        assert!(mesh.topology().is_closed());
    }

    #[test]
    fn test_segment_in_replicated_cell() {
        let cell = SimulationCell::orthorhombic(Vector3::repeat(10.0), [true; 3]);
        let mut micro = Microstructure::from(AttributedMesh::<u32>::with_domain(cell));
        let grain = micro.create_region(0);
        let a = micro.create_vertex(Point3::new(1.0, 1.0, 1.0));
        let b = micro.create_vertex(Point3::new(9.0, 1.0, 1.0));
        micro.create_dislocation_segment(a, b, Vector3::x(), grain).unwrap();

        let report = micro
            .replicate(&ReplicateOptions::default().with_images([2, 1, 1]))
            .unwrap();
        assert_eq!(report.merged_nodes, 0);
        assert_eq!(micro.conservation_violations(1e-6, false).len(), 4);
    }
}
