//! Replication of a mesh across periodic images.
//!
//! The mesh is duplicated once per image of its simulation cell. Faces that
//! crossed a periodic boundary in the original cell are then unwrapped so that
//! each of their edges connects minimum-image neighbours in the enlarged cell,
//! and the opposite-edge, next-manifold and opposite-face relations broken by
//! that unwrapping are re-resolved among the image copies.
//!
//! # Example
//!
//! ```
//! use crystmesh::algo::replicate::{replicate_periodic, ReplicateOptions};
//! use crystmesh::cell::SimulationCell;
//! use crystmesh::mesh::AttributedMesh;
//! use nalgebra::{Point3, Vector3};
//!
//! let cell = SimulationCell::orthorhombic(Vector3::repeat(10.0), [true; 3]);
//! let mut mesh: AttributedMesh = AttributedMesh::with_domain(cell);
//! let region = mesh.create_region(0);
//! let a = mesh.create_vertex(Point3::new(1.0, 1.0, 1.0));
//! let b = mesh.create_vertex(Point3::new(2.0, 1.0, 1.0));
//! let c = mesh.create_vertex(Point3::new(1.0, 2.0, 1.0));
//! mesh.create_face(&[a, b, c], region).unwrap();
//!
//! replicate_periodic(&mut mesh, &ReplicateOptions::default().with_images([2, 1, 3])).unwrap();
//! assert_eq!(mesh.vertex_count(), 18);
//! assert_eq!(mesh.face_count(), 6);
//! ```

use log::debug;
use nalgebra::Matrix3;
use rayon::prelude::*;

use super::Progress;
use crate::cell::{round_half_up, ImageRange, SimulationCell};
use crate::error::{ElementKind, MeshError, Result};
use crate::mesh::{AttributedMesh, EdgeId, FaceId, HalfEdgeMesh, MeshIndex, VertexId};

/// Options for periodic replication.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicateOptions {
    /// Number of images along each cell vector; each must be at least 1.
    pub num_images: [usize; 3],

    /// Image indices to populate. Defaults to `0..=n-1` along each axis.
    /// The extent along each axis must equal `num_images`.
    pub image_range: Option<ImageRange>,

    /// Whether to run the final consistency check in parallel (default: true).
    pub parallel: bool,
}

impl Default for ReplicateOptions {
    fn default() -> Self {
        Self {
            num_images: [1; 3],
            image_range: None,
            parallel: true,
        }
    }
}

impl ReplicateOptions {
    /// Create options with the given image counts.
    pub fn with_images(mut self, num_images: [usize; 3]) -> Self {
        self.num_images = num_images;
        self
    }

    /// Create options with an explicit image window.
    pub fn with_image_range(mut self, range: ImageRange) -> Self {
        self.image_range = Some(range);
        self
    }

    /// Create options whose image window is centred on the primary image.
    pub fn centered(mut self) -> Self {
        self.image_range = Some(ImageRange::centered(self.num_images));
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// The image window after validation.
    fn resolved_range(&self) -> Result<ImageRange> {
        if self.num_images.contains(&0) {
            return Err(MeshError::invalid_param(
                "num_images",
                format!("{:?}", self.num_images),
                "each image count must be at least 1",
            ));
        }
        let range = self
            .image_range
            .unwrap_or_else(|| ImageRange::from_counts(self.num_images));
        if (0..3).any(|dim| range.extent(dim) != self.num_images[dim]) {
            return Err(MeshError::invalid_param(
                "image_range",
                format!("{:?}..={:?}", range.min, range.max),
                "extent must match the image counts",
            ));
        }
        Ok(range)
    }
}

const STAGES: usize = 4;

/// Replicates a mesh across the periodic images of its domain.
///
/// See [`replicate_periodic_with_progress`].
pub fn replicate_periodic<I: MeshIndex>(mesh: &mut AttributedMesh<I>, options: &ReplicateOptions) -> Result<()> {
    replicate_periodic_with_progress(mesh, options, &Progress::none())
}

/// Replicates a mesh across the periodic images of its domain, reporting progress.
///
/// Vertex and face attributes are duplicated block by block, one block per
/// image, and the vertex positions of each block are translated to their image.
/// The face loops and their links are then copied into every image. On
/// periodic axes, faces that wrapped around the original cell are re-attached
/// to the vertices of the neighbouring image and their links repaired. Finally
/// the domain is replaced by the cell covering all images.
///
/// With a single image the mesh is left unchanged. A failed call leaves the
/// mesh unchanged as well.
///
/// # Errors
/// - [`MeshError::InvalidParameter`] if an image count is zero or the image
///   range does not match the counts
/// - [`MeshError::MissingDomain`] if the mesh has no simulation cell
/// - [`MeshError::SingularCell`] if the cell cannot be inverted
/// - [`MeshError::UnresolvedEdgeMatch`] if a link cannot be re-resolved
/// - [`MeshError::InconsistentOppositeFace`] if the replicated mesh violates
///   opposite-face closure
pub fn replicate_periodic_with_progress<I: MeshIndex>(
    mesh: &mut AttributedMesh<I>,
    options: &ReplicateOptions,
    progress: &Progress,
) -> Result<()> {
    let range = options.resolved_range()?;
    if range.count() <= 1 {
        return Ok(());
    }
    let cell = *mesh.domain().ok_or(MeshError::MissingDomain)?;
    let inverse = cell.inverse()?;

    let lattice = ImageLattice {
        counts: options.num_images,
        vertices: mesh.vertex_count(),
        edges: mesh.edge_count(),
        faces: mesh.face_count(),
    };
    let mut work = mesh.clone();

    progress.report(0, STAGES, "Replicating attributes");
    replicate_attributes(&mut work, &cell, &range)?;

    progress.report(1, STAGES, "Replicating topology");
    lattice.copy_topology(&mut work.topology)?;

    if cell.has_any_pbc() {
        progress.report(2, STAGES, "Unwrapping faces");
        lattice.unwrap_faces(&mut work, &cell, &inverse)?;
        lattice.repair_links(&mut work.topology)?;
    }

    progress.report(3, STAGES, "Checking opposite faces");
    check_closure(&work.topology, options.parallel)?;

    work.set_domain(Some(cell.extended(&range)));
    debug_assert!(work.buffers_consistent());
    debug!(
        "replicated mesh into {} images: {} vertices, {} faces",
        range.count(),
        work.vertex_count(),
        work.face_count()
    );
    *mesh = work;
    progress.finish(STAGES, "Replication complete");
    Ok(())
}

/// Duplicates vertex and face attributes and moves each vertex block to its image.
fn replicate_attributes<I: MeshIndex>(
    mesh: &mut AttributedMesh<I>,
    cell: &SimulationCell,
    range: &ImageRange,
) -> Result<()> {
    let block = mesh.vertex_count();
    mesh.replicate(ElementKind::Vertex, range.count())?;
    mesh.replicate(ElementKind::Face, range.count())?;

    let positions = mesh.positions_mut()?;
    for (chunk, image) in positions.chunks_mut(block.max(1)).zip(range.images()) {
        let translation = cell.image_translation(image);
        for p in chunk {
            *p += translation;
        }
    }
    Ok(())
}

/// Layout of the replicated element arrays: image `s` owns the `s`-th block of
/// vertices and faces, with `s = ix * ny * nz + iy * nz + iz`.
struct ImageLattice {
    counts: [usize; 3],
    vertices: usize,
    edges: usize,
    faces: usize,
}

impl ImageLattice {
    fn copies(&self) -> usize {
        self.counts.iter().product()
    }

    fn shift_index(&self, image: [usize; 3]) -> usize {
        let [_, ny, nz] = self.counts;
        image[0] * ny * nz + image[1] * nz + image[2]
    }

    fn image(&self, shift: usize) -> [usize; 3] {
        let [_, ny, nz] = self.counts;
        [shift / (ny * nz), (shift / nz) % ny, shift % nz]
    }

    fn vertex<I: MeshIndex>(&self, v: VertexId<I>, shift: usize) -> VertexId<I> {
        v.offset(shift * self.vertices)
    }

    fn face<I: MeshIndex>(&self, f: FaceId<I>, shift: usize) -> FaceId<I> {
        f.offset(shift * self.faces)
    }

    /// All image copies of the original face underlying `f`.
    fn face_copies<I: MeshIndex>(&self, f: FaceId<I>) -> impl Iterator<Item = FaceId<I>> + '_ {
        let base = FaceId::new(f.index() % self.faces);
        (0..self.copies()).map(move |s| self.face(base, s))
    }

    /// Creates the face loops of every image and copies the links of the
    /// original faces into them.
    fn copy_topology<I: MeshIndex>(&self, topo: &mut HalfEdgeMesh<I>) -> Result<()> {
        let mut loop_vertices = Vec::new();
        for shift in 1..self.copies() {
            for f in (0..self.faces).map(FaceId::new) {
                loop_vertices.clear();
                loop_vertices.extend(topo.face_vertices(f).map(|v| self.vertex(v, shift)));
                let copy = topo.create_face(&loop_vertices)?;
                debug_assert_eq!(copy, self.face(f, shift));
            }
        }

        for shift in 1..self.copies() {
            for edge in (0..self.edges).map(EdgeId::new) {
                let v1 = self.vertex(topo.vertex1(edge), shift);
                let v2 = self.vertex(topo.vertex2(edge), shift);
                let face = self.face(topo.adjacent_face(edge), shift);
                let copy = find_edge(topo, face, v1, v2)?;

                if let Some(opposite) = topo.opposite_edge(edge) {
                    if !topo.has_opposite_edge(copy) {
                        let face = self.face(topo.adjacent_face(opposite), shift);
                        let partner = find_edge(topo, face, v2, v1)?;
                        topo.link_opposite_edges(copy, partner)?;
                    }
                }
                if let Some(manifold) = topo.next_manifold_edge(edge) {
                    let face = self.face(topo.adjacent_face(manifold), shift);
                    let next = find_edge(topo, face, v1, v2)?;
                    topo.set_next_manifold_edge(copy, Some(next))?;
                }
            }

            for f in (0..self.faces).map(FaceId::new) {
                if let Some(opposite) = topo.opposite_face(f) {
                    topo.link_opposite_faces(self.face(f, shift), self.face(opposite, shift))?;
                }
            }
        }
        Ok(())
    }

    /// Walks every face loop and moves the end vertex of each edge into the
    /// image that makes the edge a minimum-image connection.
    fn unwrap_faces<I: MeshIndex>(
        &self,
        mesh: &mut AttributedMesh<I>,
        cell: &SimulationCell,
        inverse: &Matrix3<f64>,
    ) -> Result<()> {
        // Relative positions are the same in every block.
        let positions = mesh.positions()[..self.vertices].to_vec();
        let topo = &mut mesh.topology;

        for f in (0..topo.face_count()).map(FaceId::new) {
            let first = topo.first_face_edge(f);
            let mut edge = first;
            let mut shift = [0i64; 3];
            loop {
                let v1 = topo.vertex1(edge).index() % self.vertices;
                let v2 = topo.vertex2(edge);
                let wrapped = v2.index() % self.vertices;
                let delta = inverse * (positions[wrapped] - positions[v1]);
                for dim in (0..3).filter(|&dim| cell.has_pbc(dim)) {
                    shift[dim] -= round_half_up(delta[dim]) as i64;
                }

                if shift != [0; 3] {
                    let image = self.image(v2.index() / self.vertices);
                    let target =
                        [0, 1, 2].map(|dim| SimulationCell::modulo(image[dim] as i64 + shift[dim], self.counts[dim]));
                    let vertex = VertexId::new(wrapped + self.shift_index(target) * self.vertices);
                    topo.transfer_face_boundary_to_vertex(edge, vertex)?;
                }

                edge = topo.next_face_edge(edge);
                if edge == first {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Re-resolves every link whose partner no longer runs between the right
    /// vertices by searching the image copies of the partner's face.
    fn repair_links<I: MeshIndex>(&self, topo: &mut HalfEdgeMesh<I>) -> Result<()> {
        let mut edges = Vec::new();
        for f in (0..topo.face_count()).map(FaceId::new) {
            if let Some(opposite) = topo.opposite_face(f) {
                let first = topo.first_face_edge(f);
                let (v1, v2) = (topo.vertex1(first), topo.vertex2(first));
                if topo.find_edge(opposite, v2, v1).is_none() {
                    let partner = self
                        .face_copies(opposite)
                        .find(|&c| topo.find_edge(c, v2, v1).is_some())
                        .ok_or(MeshError::UnresolvedEdgeMatch { edge: first.index() })?;
                    topo.set_opposite_face(f, Some(partner));
                    topo.set_opposite_face(partner, Some(f));
                }
            }

            edges.clear();
            edges.extend(topo.face_edges(f));
            for &edge in &edges {
                let (v1, v2) = (topo.vertex1(edge), topo.vertex2(edge));

                if let Some(opposite) = topo.opposite_edge(edge) {
                    if topo.vertex1(opposite) != v2 || topo.vertex2(opposite) != v1 {
                        let partner = self.find_in_copies(topo, topo.adjacent_face(opposite), v2, v1, edge)?;
                        topo.set_opposite_edge(edge, Some(partner));
                    }
                }
                if let Some(manifold) = topo.next_manifold_edge(edge) {
                    if topo.vertex1(manifold) != v1 || topo.vertex2(manifold) != v2 {
                        let next = self.find_in_copies(topo, topo.adjacent_face(manifold), v1, v2, edge)?;
                        topo.set_next_manifold_edge(edge, Some(next))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn find_in_copies<I: MeshIndex>(
        &self,
        topo: &HalfEdgeMesh<I>,
        face: FaceId<I>,
        v1: VertexId<I>,
        v2: VertexId<I>,
        edge: EdgeId<I>,
    ) -> Result<EdgeId<I>> {
        self.face_copies(face)
            .find_map(|c| topo.find_edge(c, v1, v2))
            .ok_or(MeshError::UnresolvedEdgeMatch { edge: edge.index() })
    }
}

fn find_edge<I: MeshIndex>(
    topo: &HalfEdgeMesh<I>,
    face: FaceId<I>,
    v1: VertexId<I>,
    v2: VertexId<I>,
) -> Result<EdgeId<I>> {
    topo.find_edge(face, v1, v2).ok_or_else(|| MeshError::UnresolvedEdgeMatch {
        edge: topo.first_face_edge(face).index(),
    })
}

/// Verifies that opposite-edge links are symmetric and that every edge of a
/// face with an opposite face has a reverse edge on that face.
fn check_closure<I: MeshIndex>(topo: &HalfEdgeMesh<I>, parallel: bool) -> Result<()> {
    let check = |f: usize| -> Result<()> {
        let face = FaceId::new(f);
        let opposite = topo.opposite_face(face);
        let consistent = opposite.map_or(true, |o| topo.opposite_face(o) == Some(face))
            && topo.face_edges(face).all(|e| {
                let symmetric = topo.opposite_edge(e).map_or(true, |o| topo.opposite_edge(o) == Some(e));
                let closed = opposite.map_or(true, |o| topo.find_edge(o, topo.vertex2(e), topo.vertex1(e)).is_some());
                symmetric && closed
            });
        if consistent {
            Ok(())
        } else {
            Err(MeshError::InconsistentOppositeFace { face: f })
        }
    };

    if parallel {
        (0..topo.face_count()).into_par_iter().try_for_each(check)
    } else {
        (0..topo.face_count()).try_for_each(check)
    }
}
