//! Half-edge mesh data structure.
//!
//! This module provides the bare topology of a polygonal mesh stored as a
//! half-edge (doubly-connected edge list) structure. It knows nothing about
//! coordinates or face semantics; those live in [`AttributedMesh`](super::AttributedMesh).
//!
//! # Structure
//!
//! - Every half-edge belongs to exactly one face and knows its **origin** vertex,
//!   its **next**/**prev** neighbours in the face loop, an optional **opposite**
//!   half-edge (same vertices, reversed), and an optional **next manifold** half-edge
//!   (same ordered vertex pair, used when several sheets share an edge)
//! - Each vertex keeps a singly linked list of its outgoing half-edges
//! - Each face stores one half-edge on its boundary and an optional opposite face
//!
//! # Deletion
//!
//! Faces are deleted by moving the last face into the freed slot. The index of the
//! former last face therefore changes. When deleting several faces in one pass,
//! delete them in strictly descending index order.

use super::index::{EdgeId, FaceId, MeshIndex, VertexId};
use crate::error::{ElementKind, MeshError, Result};

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Vertex<I: MeshIndex = u32> {
    /// Head of the list of half-edges originating at this vertex.
    pub(crate) first_edge: Option<EdgeId<I>>,
}

impl<I: MeshIndex> Vertex<I> {
    /// Create an isolated vertex.
    pub fn new() -> Self {
        Self { first_edge: None }
    }
}

impl<I: MeshIndex> Default for Vertex<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// The vertex this half-edge originates from.
    pub(crate) origin: VertexId<I>,

    /// The face this half-edge belongs to.
    pub(crate) face: FaceId<I>,

    /// The next half-edge around the face.
    pub(crate) next: EdgeId<I>,

    /// The previous half-edge around the face.
    pub(crate) prev: EdgeId<I>,

    /// The reverse half-edge on an adjacent face, if any.
    pub(crate) opposite: Option<EdgeId<I>>,

    /// The next half-edge with the same ordered vertex pair on another manifold.
    pub(crate) next_manifold: Option<EdgeId<I>>,

    /// The next half-edge in the outgoing list of `origin`.
    pub(crate) next_vertex_edge: Option<EdgeId<I>>,
}

/// A face in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face<I: MeshIndex = u32> {
    /// One half-edge on the boundary of this face.
    pub(crate) first_edge: EdgeId<I>,

    /// The face on the other side of this sheet, if any.
    pub(crate) opposite: Option<FaceId<I>>,
}

/// A polygonal half-edge mesh.
///
/// Vertices, half-edges and faces are stored in flat arrays and refer to each
/// other through typed indices.
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh<I: MeshIndex = u32> {
    pub(crate) vertices: Vec<Vertex<I>>,
    pub(crate) edges: Vec<HalfEdge<I>>,
    pub(crate) faces: Vec<Face<I>>,
}

impl<I: MeshIndex> Default for HalfEdgeMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_edges: usize, num_faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(num_vertices),
            edges: Vec::with_capacity(num_edges),
            faces: Vec::with_capacity(num_faces),
        }
    }

    /// Removes all faces, edges and vertices.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.faces.clear();
    }

    // ==================== Accessors ====================

    /// Get the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of half-edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get the number of faces.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns an error unless `v` is a valid vertex index.
    pub fn check_vertex(&self, v: VertexId<I>) -> Result<()> {
        check_range(ElementKind::Vertex, v.index(), self.vertices.len())
    }

    /// Returns an error unless `e` is a valid half-edge index.
    pub fn check_edge(&self, e: EdgeId<I>) -> Result<()> {
        check_range(ElementKind::Edge, e.index(), self.edges.len())
    }

    /// Returns an error unless `f` is a valid face index.
    pub fn check_face(&self, f: FaceId<I>) -> Result<()> {
        check_range(ElementKind::Face, f.index(), self.faces.len())
    }

    #[inline]
    fn edge(&self, e: EdgeId<I>) -> &HalfEdge<I> {
        &self.edges[e.index()]
    }

    #[inline]
    fn edge_mut(&mut self, e: EdgeId<I>) -> &mut HalfEdge<I> {
        &mut self.edges[e.index()]
    }

    // ==================== Topology Queries ====================
    //
    // The accessors below panic on out-of-range indices, like slice indexing.

    /// Returns the first half-edge of a face's boundary loop.
    #[inline]
    pub fn first_face_edge(&self, f: FaceId<I>) -> EdgeId<I> {
        self.faces[f.index()].first_edge
    }

    /// Returns the half-edge following `e` in its face loop.
    #[inline]
    pub fn next_face_edge(&self, e: EdgeId<I>) -> EdgeId<I> {
        self.edge(e).next
    }

    /// Returns the half-edge preceding `e` in its face loop.
    #[inline]
    pub fn prev_face_edge(&self, e: EdgeId<I>) -> EdgeId<I> {
        self.edge(e).prev
    }

    /// Returns the vertex `e` originates from.
    #[inline]
    pub fn vertex1(&self, e: EdgeId<I>) -> VertexId<I> {
        self.edge(e).origin
    }

    /// Returns the vertex `e` leads to.
    #[inline]
    pub fn vertex2(&self, e: EdgeId<I>) -> VertexId<I> {
        self.edge(self.edge(e).next).origin
    }

    /// Returns the face `e` belongs to.
    #[inline]
    pub fn adjacent_face(&self, e: EdgeId<I>) -> FaceId<I> {
        self.edge(e).face
    }

    /// Returns the opposite half-edge of `e`, if linked.
    #[inline]
    pub fn opposite_edge(&self, e: EdgeId<I>) -> Option<EdgeId<I>> {
        self.edge(e).opposite
    }

    /// Returns whether `e` is linked to an opposite half-edge.
    #[inline]
    pub fn has_opposite_edge(&self, e: EdgeId<I>) -> bool {
        self.edge(e).opposite.is_some()
    }

    /// Returns the next manifold half-edge around the edge `e`, if any.
    #[inline]
    pub fn next_manifold_edge(&self, e: EdgeId<I>) -> Option<EdgeId<I>> {
        self.edge(e).next_manifold
    }

    /// Returns the opposite face of `f`, if linked.
    #[inline]
    pub fn opposite_face(&self, f: FaceId<I>) -> Option<FaceId<I>> {
        self.faces[f.index()].opposite
    }

    /// Returns whether `f` is linked to an opposite face.
    #[inline]
    pub fn has_opposite_face(&self, f: FaceId<I>) -> bool {
        self.opposite_face(f).is_some()
    }

    /// Returns the head of the outgoing half-edge list of `v`.
    #[inline]
    pub fn first_vertex_edge(&self, v: VertexId<I>) -> Option<EdgeId<I>> {
        self.vertices[v.index()].first_edge
    }

    /// Returns the half-edge following `e` in the outgoing list of its origin vertex.
    #[inline]
    pub fn next_vertex_edge(&self, e: EdgeId<I>) -> Option<EdgeId<I>> {
        self.edge(e).next_vertex_edge
    }

    /// Counts the outgoing half-edges of a vertex.
    pub fn vertex_edge_count(&self, v: VertexId<I>) -> usize {
        self.vertex_edges(v).count()
    }

    /// Counts the half-edges (and vertices) of a face.
    pub fn count_face_edges(&self, f: FaceId<I>) -> usize {
        self.face_edges(f).count()
    }

    /// Determines the number of manifolds sharing the edge `e`.
    ///
    /// Returns 0 if `e` has no next-manifold link.
    pub fn count_manifolds(&self, e: EdgeId<I>) -> usize {
        let Some(mut current) = self.next_manifold_edge(e) else {
            return 0;
        };
        let mut count = 1;
        while current != e && count <= self.edges.len() {
            match self.next_manifold_edge(current) {
                Some(next) => current = next,
                None => break,
            }
            count += 1;
        }
        count
    }

    /// Searches the boundary loop of `face` for the half-edge running from `v1` to `v2`.
    pub fn find_edge(&self, face: FaceId<I>, v1: VertexId<I>, v2: VertexId<I>) -> Option<EdgeId<I>> {
        self.face_edges(face)
            .find(|&e| self.vertex1(e) == v1 && self.vertex2(e) == v2)
    }

    /// Determines whether every half-edge is linked to an opposite half-edge.
    pub fn is_closed(&self) -> bool {
        self.edges.iter().all(|e| e.opposite.is_some())
    }

    // ==================== Iteration ====================

    /// Iterate over all vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        (0..self.vertices.len()).map(VertexId::new)
    }

    /// Iterate over all half-edge IDs.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId<I>> + '_ {
        (0..self.edges.len()).map(EdgeId::new)
    }

    /// Iterate over all face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        (0..self.faces.len()).map(FaceId::new)
    }

    /// Iterate over the half-edges of a face, starting at its first edge.
    pub fn face_edges(&self, f: FaceId<I>) -> FaceEdgeIter<'_, I> {
        FaceEdgeIter::new(self, f)
    }

    /// Iterate over the vertices of a face, starting at the origin of its first edge.
    pub fn face_vertices(&self, f: FaceId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.face_edges(f).map(|e| self.vertex1(e))
    }

    /// Iterate over the half-edges originating at a vertex.
    pub fn vertex_edges(&self, v: VertexId<I>) -> VertexEdgeIter<'_, I> {
        VertexEdgeIter {
            mesh: self,
            current: self.first_vertex_edge(v),
        }
    }

    // ==================== Construction ====================

    /// Add a new isolated vertex and return its ID.
    pub fn create_vertex(&mut self) -> VertexId<I> {
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::new());
        id
    }

    /// Add `n` isolated vertices.
    pub fn create_vertices(&mut self, n: usize) {
        self.vertices.resize(self.vertices.len() + n, Vertex::new());
    }

    /// Creates a new face bounded by the given vertices, in order.
    ///
    /// One half-edge is allocated per vertex and the edges form a closed
    /// next/prev loop. The first edge of the face starts at `vertices[0]`.
    /// No opposite-edge links are established.
    ///
    /// # Errors
    /// - [`MeshError::DegenerateFace`] if fewer than two distinct vertices are given
    /// - [`MeshError::InvalidIndex`] if any vertex index is out of range
    pub fn create_face(&mut self, vertices: &[VertexId<I>]) -> Result<FaceId<I>> {
        let distinct = count_distinct(vertices);
        if distinct < 2 {
            return Err(MeshError::DegenerateFace { vertices: distinct });
        }
        for &v in vertices {
            self.check_vertex(v)?;
        }

        let face = FaceId::new(self.faces.len());
        let base = self.edges.len();
        let n = vertices.len();
        self.edges.reserve(n);

        for (i, &v) in vertices.iter().enumerate() {
            let id = EdgeId::new(base + i);
            let vertex = &mut self.vertices[v.index()];
            self.edges.push(HalfEdge {
                origin: v,
                face,
                next: EdgeId::new(base + (i + 1) % n),
                prev: EdgeId::new(base + (i + n - 1) % n),
                opposite: None,
                next_manifold: None,
                next_vertex_edge: vertex.first_edge,
            });
            vertex.first_edge = Some(id);
        }

        self.faces.push(Face {
            first_edge: EdgeId::new(base),
            opposite: None,
        });

        debug_assert_eq!(self.face_vertices(face).next(), Some(vertices[0]));
        Ok(face)
    }

    /// Creates the reverse of `edge` and links the two as opposite half-edges.
    ///
    /// With `face = None` the new half-edge starts a new face on its own. With
    /// `Some(face)` it is appended to the boundary of `face`, just before the
    /// face's first edge. A face built this way is consistent once its last
    /// appended edge ends where the first edge starts, i.e. when the reversed
    /// edges are appended walking a boundary backwards.
    ///
    /// # Errors
    /// - [`MeshError::InvalidIndex`] if `edge` or `face` is out of range
    /// - [`MeshError::InconsistentOppositeFace`] if `edge` already has an opposite
    pub fn create_opposite_edge(&mut self, edge: EdgeId<I>, face: Option<FaceId<I>>) -> Result<EdgeId<I>> {
        self.check_edge(edge)?;
        if let Some(f) = face {
            self.check_face(f)?;
        }
        if self.has_opposite_edge(edge) {
            return Err(MeshError::InconsistentOppositeFace {
                face: self.adjacent_face(edge).index(),
            });
        }

        let id = EdgeId::new(self.edges.len());
        let origin = self.vertex2(edge);
        let (face, next, prev) = match face {
            Some(f) => {
                let first = self.first_face_edge(f);
                (f, first, self.prev_face_edge(first))
            }
            None => {
                let f = FaceId::new(self.faces.len());
                self.faces.push(Face {
                    first_edge: id,
                    opposite: None,
                });
                (f, id, id)
            }
        };
        self.edges.push(HalfEdge {
            origin,
            face,
            next,
            prev,
            opposite: Some(edge),
            next_manifold: None,
            next_vertex_edge: None,
        });
        self.edge_mut(prev).next = id;
        self.edge_mut(next).prev = id;
        self.edge_mut(edge).opposite = Some(id);
        self.add_edge_to_vertex(origin, id);
        Ok(id)
    }

    /// Links two half-edges running between the same vertices in reverse order.
    ///
    /// Linking edges that are already linked to each other is a no-op.
    ///
    /// # Errors
    /// Returns [`MeshError::InconsistentOppositeFace`] if the vertex pairs do not
    /// match or if either edge is already linked to a different edge.
    pub fn link_opposite_edges(&mut self, e1: EdgeId<I>, e2: EdgeId<I>) -> Result<()> {
        self.check_edge(e1)?;
        self.check_edge(e2)?;
        let inconsistent = MeshError::InconsistentOppositeFace {
            face: self.adjacent_face(e1).index(),
        };
        if self.vertex1(e1) != self.vertex2(e2) || self.vertex2(e1) != self.vertex1(e2) {
            return Err(inconsistent);
        }
        match (self.opposite_edge(e1), self.opposite_edge(e2)) {
            (None, None) => {
                self.edge_mut(e1).opposite = Some(e2);
                self.edge_mut(e2).opposite = Some(e1);
                Ok(())
            }
            (Some(a), Some(b)) if a == e2 && b == e1 => Ok(()),
            _ => Err(inconsistent),
        }
    }

    /// Records that two faces form the two sides of one sheet.
    ///
    /// Does not verify that the boundaries of the two faces match.
    /// Linking faces that are already linked to each other is a no-op.
    ///
    /// # Errors
    /// Returns [`MeshError::InconsistentOppositeFace`] if either face is already
    /// linked to a different face.
    pub fn link_opposite_faces(&mut self, f1: FaceId<I>, f2: FaceId<I>) -> Result<()> {
        self.check_face(f1)?;
        self.check_face(f2)?;
        match (self.opposite_face(f1), self.opposite_face(f2)) {
            (None, None) => {
                self.faces[f1.index()].opposite = Some(f2);
                self.faces[f2.index()].opposite = Some(f1);
                Ok(())
            }
            (Some(a), Some(b)) if a == f2 && b == f1 => Ok(()),
            (Some(_), _) => Err(MeshError::InconsistentOppositeFace { face: f1.index() }),
            (None, Some(_)) => Err(MeshError::InconsistentOppositeFace { face: f2.index() }),
        }
    }

    /// Dissolves the opposite-face relation of `f`, if any.
    pub fn unlink_from_opposite_face(&mut self, f: FaceId<I>) {
        if let Some(other) = self.faces[f.index()].opposite.take() {
            self.faces[other.index()].opposite = None;
        }
    }

    /// Sets the next manifold half-edge of `e`.
    ///
    /// # Errors
    /// Returns [`MeshError::InconsistentOppositeFace`] if `next` does not run
    /// between the same ordered vertex pair as `e`.
    pub fn set_next_manifold_edge(&mut self, e: EdgeId<I>, next: Option<EdgeId<I>>) -> Result<()> {
        self.check_edge(e)?;
        if let Some(n) = next {
            self.check_edge(n)?;
            if self.vertex1(e) != self.vertex1(n) || self.vertex2(e) != self.vertex2(n) {
                return Err(MeshError::InconsistentOppositeFace {
                    face: self.adjacent_face(e).index(),
                });
            }
        }
        self.edge_mut(e).next_manifold = next;
        Ok(())
    }

    /// Re-targets the end vertex of `edge` to `vertex`.
    ///
    /// The successor edge in the face loop moves from the outgoing list of the old
    /// end vertex to that of the new one.
    pub fn transfer_face_boundary_to_vertex(&mut self, edge: EdgeId<I>, vertex: VertexId<I>) -> Result<()> {
        self.check_edge(edge)?;
        self.check_vertex(vertex)?;
        let old_vertex = self.vertex2(edge);
        if old_vertex != vertex {
            let successor = self.next_face_edge(edge);
            self.remove_edge_from_vertex(old_vertex, successor);
            self.add_edge_to_vertex(vertex, successor);
            self.edge_mut(successor).origin = vertex;
        }
        Ok(())
    }

    /// Tries to link each half-edge with an unlinked reverse half-edge.
    ///
    /// Returns `true` if every half-edge has an opposite afterwards, i.e. the mesh is closed.
    pub fn connect_opposite_halfedges(&mut self) -> bool {
        let mut closed = true;
        for i in 0..self.edges.len() {
            let edge = EdgeId::new(i);
            if self.has_opposite_edge(edge) {
                continue;
            }
            let v1 = self.vertex1(edge);
            let v2 = self.vertex2(edge);
            let partner = self
                .vertex_edges(v2)
                .find(|&e| e != edge && self.vertex2(e) == v1 && !self.has_opposite_edge(e));
            match partner {
                Some(partner) => {
                    self.edge_mut(edge).opposite = Some(partner);
                    self.edge_mut(partner).opposite = Some(edge);
                }
                None => closed = false,
            }
        }
        closed
    }

    /// Reverses the orientation of every face.
    ///
    /// Each half-edge keeps its index, face and links but runs the other way.
    /// Opposite pairs stay reverse to each other and manifold chains keep a
    /// common vertex pair.
    pub fn flip_faces(&mut self) {
        let targets: Vec<_> = self.edge_ids().map(|e| self.vertex2(e)).collect();
        for v in &mut self.vertices {
            v.first_edge = None;
        }
        for (edge, target) in self.edges.iter_mut().zip(targets) {
            edge.origin = target;
            std::mem::swap(&mut edge.next, &mut edge.prev);
            edge.next_vertex_edge = None;
        }
        // Prepending in reverse keeps each vertex list in ascending edge order.
        for i in (0..self.edges.len()).rev() {
            let e = EdgeId::new(i);
            self.add_edge_to_vertex(self.edge(e).origin, e);
        }
    }

    // ==================== Deletion ====================

    /// Deletes a face.
    ///
    /// The face is unlinked from its opposite face and the last face of the mesh is
    /// moved into its slot, so the index `f` afterwards identifies what used to be
    /// the last face.
    ///
    /// The caller must have re-assigned or discarded every half-edge of `f` and
    /// every opposite-edge link pointing at it. In a batch, delete faces in
    /// descending index order.
    pub fn delete_face(&mut self, f: FaceId<I>) -> Result<()> {
        self.check_face(f)?;
        self.unlink_from_opposite_face(f);
        debug_assert!(
            self.edges.iter().all(|e| e.face != f),
            "face {:?} is still referenced by half-edges",
            f
        );

        let last = self.faces.len() - 1;
        self.faces.swap_remove(f.index());
        if f.index() < last {
            // Renumber the face that was moved into the freed slot.
            let moved = self.faces[f.index()];
            let start = moved.first_edge;
            let mut e = start;
            loop {
                self.edge_mut(e).face = f;
                e = self.next_face_edge(e);
                if e == start {
                    break;
                }
            }
            if let Some(o) = moved.opposite {
                self.faces[o.index()].opposite = Some(f);
            }
        }
        Ok(())
    }

    /// Deletes an isolated vertex.
    ///
    /// The last vertex moves into the freed slot, so the index `v` afterwards
    /// identifies what used to be the last vertex.
    ///
    /// # Errors
    /// - [`MeshError::InvalidIndex`] if `v` is out of range
    /// - [`MeshError::InvalidParameter`] if half-edges still start at `v`
    pub fn delete_vertex(&mut self, v: VertexId<I>) -> Result<()> {
        self.check_vertex(v)?;
        if self.vertices[v.index()].first_edge.is_some() {
            return Err(MeshError::invalid_param(
                "vertex",
                v,
                "vertex is still connected to half-edges",
            ));
        }

        let last = self.vertices.len() - 1;
        self.vertices.swap_remove(v.index());
        if v.index() < last {
            let mut current = self.vertices[v.index()].first_edge;
            while let Some(e) = current {
                self.edge_mut(e).origin = v;
                current = self.edge(e).next_vertex_edge;
            }
        }
        Ok(())
    }

    // ==================== Raw link updates ====================
    //
    // These leave the mesh in an intermediate state; callers restore the
    // invariants before returning.

    pub(crate) fn set_next_face_edge(&mut self, e: EdgeId<I>, next: EdgeId<I>) {
        self.edge_mut(e).next = next;
    }

    pub(crate) fn set_prev_face_edge(&mut self, e: EdgeId<I>, prev: EdgeId<I>) {
        self.edge_mut(e).prev = prev;
    }

    pub(crate) fn set_adjacent_face(&mut self, e: EdgeId<I>, f: FaceId<I>) {
        self.edge_mut(e).face = f;
    }

    pub(crate) fn set_first_face_edge(&mut self, f: FaceId<I>, e: EdgeId<I>) {
        self.faces[f.index()].first_edge = e;
    }

    pub(crate) fn set_opposite_edge(&mut self, e: EdgeId<I>, opposite: Option<EdgeId<I>>) {
        self.edge_mut(e).opposite = opposite;
    }

    pub(crate) fn set_opposite_face(&mut self, f: FaceId<I>, opposite: Option<FaceId<I>>) {
        self.faces[f.index()].opposite = opposite;
    }

    fn add_edge_to_vertex(&mut self, v: VertexId<I>, e: EdgeId<I>) {
        debug_assert!(self.edge(e).next_vertex_edge.is_none());
        let head = self.vertices[v.index()].first_edge;
        self.edge_mut(e).next_vertex_edge = head;
        self.vertices[v.index()].first_edge = Some(e);
    }

    fn remove_edge_from_vertex(&mut self, v: VertexId<I>, e: EdgeId<I>) {
        let successor = self.edge(e).next_vertex_edge;
        if self.vertices[v.index()].first_edge == Some(e) {
            self.vertices[v.index()].first_edge = successor;
        } else {
            let mut current = self.vertices[v.index()].first_edge;
            while let Some(c) = current {
                if self.edge(c).next_vertex_edge == Some(e) {
                    self.edge_mut(c).next_vertex_edge = successor;
                    break;
                }
                current = self.edge(c).next_vertex_edge;
            }
            debug_assert!(current.is_some(), "edge {:?} not in list of {:?}", e, v);
        }
        self.edge_mut(e).next_vertex_edge = None;
    }

    // ==================== Conversion ====================

    /// Fan-triangulates every face with three or more vertices.
    ///
    /// Two-vertex faces (dislocation segments) produce no triangles.
    pub fn triangulate(&self) -> Vec<[VertexId<I>; 3]> {
        let mut triangles = Vec::new();
        for f in self.face_ids() {
            let first = self.first_face_edge(f);
            let base = self.vertex1(first);
            let mut e1 = self.next_face_edge(first);
            let mut e2 = self.next_face_edge(e1);
            while e2 != first {
                triangles.push([base, self.vertex1(e1), self.vertex1(e2)]);
                e1 = e2;
                e2 = self.next_face_edge(e2);
            }
        }
        triangles
    }

    // ==================== Validation ====================

    /// Check if the mesh is valid (all connectivity is consistent).
    pub fn is_valid(&self) -> bool {
        let num_edges = self.edges.len();

        for (i, he) in self.edges.iter().enumerate() {
            let id = EdgeId::new(i);
            if he.next.index() >= num_edges || he.prev.index() >= num_edges {
                return false;
            }
            if self.edge(he.next).prev != id || self.edge(he.prev).next != id {
                return false;
            }
            if he.face.index() >= self.faces.len() || he.origin.index() >= self.vertices.len() {
                return false;
            }
            if let Some(o) = he.opposite {
                if o.index() >= num_edges || self.edge(o).opposite != Some(id) {
                    return false;
                }
                if self.vertex1(o) != self.vertex2(id) || self.vertex2(o) != self.vertex1(id) {
                    return false;
                }
            }
        }

        for (i, face) in self.faces.iter().enumerate() {
            let f = FaceId::new(i);
            if face.first_edge.index() >= num_edges {
                return false;
            }
            // Every loop must close within the number of existing edges.
            let mut e = face.first_edge;
            let mut steps = 0;
            loop {
                if self.edge(e).face != f {
                    return false;
                }
                e = self.edge(e).next;
                steps += 1;
                if e == face.first_edge {
                    break;
                }
                if steps > num_edges {
                    return false;
                }
            }
            if let Some(o) = face.opposite {
                if o.index() >= self.faces.len() || self.faces[o.index()].opposite != Some(f) {
                    return false;
                }
            }
        }

        let mut listed = 0;
        for (i, v) in self.vertices.iter().enumerate() {
            let mut current = v.first_edge;
            while let Some(e) = current {
                if self.edge(e).origin.index() != i || listed > num_edges {
                    return false;
                }
                listed += 1;
                current = self.edge(e).next_vertex_edge;
            }
        }
        listed == num_edges
    }
}

fn check_range(kind: ElementKind, index: usize, count: usize) -> Result<()> {
    if index < count {
        Ok(())
    } else {
        Err(MeshError::invalid_index(kind, index, count))
    }
}

fn count_distinct<T: Ord + Copy>(items: &[T]) -> usize {
    let mut sorted = items.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

/// Iterator over the half-edges of a face loop.
pub struct FaceEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: EdgeId<I>,
    current: EdgeId<I>,
    done: bool,
}

impl<'a, I: MeshIndex> FaceEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, f: FaceId<I>) -> Self {
        let start = mesh.first_face_edge(f);
        Self {
            mesh,
            start,
            current: start,
            done: false,
        }
    }
}

impl<'a, I: MeshIndex> Iterator for FaceEdgeIter<'a, I> {
    type Item = EdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;
        self.current = self.mesh.next_face_edge(self.current);

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}

/// Iterator over the outgoing half-edges of a vertex.
pub struct VertexEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    current: Option<EdgeId<I>>,
}

impl<'a, I: MeshIndex> Iterator for VertexEdgeIter<'a, I> {
    type Item = EdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = self.mesh.next_vertex_edge(result);
        Some(result)
    }
}
