//! Crystal microstructure topology.
//!
//! A [`Microstructure`] is an [`AttributedMesh`] whose faces describe the defects
//! of a crystalline sample:
//!
//! - **Dislocation faces** come in opposite pairs. Each dislocation segment is a
//!   pair of two-vertex faces whose first edges are linked as opposite edges.
//!   Those linked edges are the *physical* dislocation edges; the remaining edges
//!   only close the face polygons and are *virtual*.
//! - **Slip facets** come in opposite pairs carrying antisymmetric slip vectors.
//! - **Interface faces** separate crystallites (regions).
//!
//! # Example
//!
//! ```
//! use crystmesh::microstructure::Microstructure;
//! use nalgebra::{Point3, Vector3};
//!
//! let mut micro: Microstructure = Microstructure::new();
//! let grain = micro.create_region(1);
//! let a = micro.create_vertex(Point3::new(0.0, 0.0, 0.0));
//! let b = micro.create_vertex(Point3::new(1.0, 0.0, 0.0));
//! let c = micro.create_vertex(Point3::new(2.0, 0.0, 0.0));
//!
//! let burgers = Vector3::new(0.5, 0.5, 0.0);
//! micro.create_dislocation_segment(a, b, burgers, grain).unwrap();
//! micro.create_dislocation_segment(b, c, burgers, grain).unwrap();
//!
//! let report = micro.make_continuous_dislocation_lines().unwrap();
//! assert_eq!(report.merged_nodes, 1);
//! assert_eq!(micro.face_count(), 2);
//! ```

mod lines;
mod network;

use std::ops::{Deref, DerefMut};

use nalgebra::Vector3;

use crate::algo::replicate::{replicate_periodic, ReplicateOptions};
use crate::error::{MeshError, Result};
use crate::mesh::{AttributedMesh, EdgeId, FaceId, FaceType, MeshIndex, RegionId, VertexId};

pub use lines::LineMergeReport;
pub use network::{ConservationViolation, DislocationLine, DislocationNetwork, Junction, LineEnd};

/// Tolerance below which a Burgers vector component counts as zero.
pub const BURGERS_EPSILON: f64 = 1e-6;

/// A mesh describing dislocations, slip surfaces and grain interfaces.
#[derive(Debug, Clone)]
pub struct Microstructure<I: MeshIndex = u32> {
    mesh: AttributedMesh<I>,
}

impl<I: MeshIndex> Default for Microstructure<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> Deref for Microstructure<I> {
    type Target = AttributedMesh<I>;

    fn deref(&self) -> &Self::Target {
        &self.mesh
    }
}

impl<I: MeshIndex> DerefMut for Microstructure<I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.mesh
    }
}

impl<I: MeshIndex> From<AttributedMesh<I>> for Microstructure<I> {
    fn from(mesh: AttributedMesh<I>) -> Self {
        Self { mesh }
    }
}

impl<I: MeshIndex> Microstructure<I> {
    /// Creates an empty microstructure.
    pub fn new() -> Self {
        Self {
            mesh: AttributedMesh::new(),
        }
    }

    /// Unwraps the underlying attributed mesh.
    pub fn into_mesh(self) -> AttributedMesh<I> {
        self.mesh
    }

    // ==================== Classification ====================

    /// Whether `f` is one side of a dislocation line.
    #[inline]
    pub fn is_dislocation_face(&self, f: FaceId<I>) -> bool {
        self.face_type(f) == FaceType::Dislocation
    }

    /// Whether `f` is one side of a slip facet.
    #[inline]
    pub fn is_slip_surface_face(&self, f: FaceId<I>) -> bool {
        self.face_type(f) == FaceType::SlipFacet
    }

    /// Whether `e` is a real dislocation segment rather than a polygon-closing edge.
    #[inline]
    pub fn is_physical_dislocation_edge(&self, e: EdgeId<I>) -> bool {
        let topo = self.topology();
        self.is_dislocation_face(topo.adjacent_face(e)) && topo.has_opposite_edge(e)
    }

    /// Iterate over the physical dislocation edges leaving `v`.
    pub fn dislocation_arms(&self, v: VertexId<I>) -> impl Iterator<Item = EdgeId<I>> + '_ {
        self.topology()
            .vertex_edges(v)
            .filter(move |&e| self.is_physical_dislocation_edge(e))
    }

    /// Number of physical dislocation edges leaving `v`.
    pub fn count_dislocation_arms(&self, v: VertexId<I>) -> usize {
        self.dislocation_arms(v).count()
    }

    // ==================== Construction ====================

    /// Creates a dislocation segment from `v1` to `v2`.
    ///
    /// Two opposite two-vertex faces are created: `[v1, v2]` carrying `burgers`
    /// and `[v2, v1]` carrying `-burgers`. Only their first edges are linked as
    /// opposite edges. Returns the first edge of the first face, which runs
    /// from `v1` to `v2`.
    ///
    /// # Errors
    /// - [`MeshError::DegenerateFace`] if `v1 == v2`
    /// - [`MeshError::InvalidIndex`] if a vertex or the region is out of range
    pub fn create_dislocation_segment(
        &mut self,
        v1: VertexId<I>,
        v2: VertexId<I>,
        burgers: Vector3<f64>,
        region: RegionId<I>,
    ) -> Result<EdgeId<I>> {
        if v1 == v2 {
            return Err(MeshError::DegenerateFace { vertices: 1 });
        }
        let face1 = self.mesh.create_face(&[v1, v2], region)?;
        let face2 = self.mesh.create_face(&[v2, v1], region)?;
        for (face, b) in [(face1, burgers), (face2, -burgers)] {
            self.mesh.set_face_type(face, FaceType::Dislocation)?;
            self.mesh.set_burgers_vector(face, b)?;
        }

        let edge1 = self.topology().first_face_edge(face1);
        let edge2 = self.topology().first_face_edge(face2);
        self.mesh.link_opposite_edges(edge1, edge2)?;
        self.mesh.link_opposite_faces(face1, face2)?;
        Ok(edge1)
    }

    /// Creates a slip facet bounded by `vertices`.
    ///
    /// Two faces are created: one along `vertices` carrying `slip_vector` and
    /// `normal`, and one with the reversed loop carrying the negated vectors. The
    /// faces are linked as opposite faces; their edges are left for linking with
    /// neighbouring facets. Returns the first face.
    pub fn create_slip_facet(
        &mut self,
        vertices: &[VertexId<I>],
        slip_vector: Vector3<f64>,
        normal: Vector3<f64>,
        region: RegionId<I>,
    ) -> Result<FaceId<I>> {
        let face = self.mesh.create_face(vertices, region)?;

        // The reverse loop starts with the reverse of the first edge.
        let n = vertices.len();
        let reversed: Vec<_> = (0..n).map(|i| vertices[(n + 1 - i) % n]).collect();
        let opposite = self.mesh.create_face(&reversed, region)?;

        for (f, slip, n) in [(face, slip_vector, normal), (opposite, -slip_vector, -normal)] {
            self.mesh.set_face_type(f, FaceType::SlipFacet)?;
            self.mesh.set_burgers_vector(f, slip)?;
            self.mesh.set_crystallographic_normal(f, n)?;
        }
        self.mesh.link_opposite_faces(face, opposite)?;
        Ok(face)
    }

    // ==================== Periodic Replication ====================

    /// Replicates the microstructure across periodic images and merges the
    /// dislocation lines that now continue across former cell boundaries.
    pub fn replicate(&mut self, options: &ReplicateOptions) -> Result<LineMergeReport<I>> {
        replicate_periodic(&mut self.mesh, options)?;
        self.make_continuous_dislocation_lines()
    }
}
