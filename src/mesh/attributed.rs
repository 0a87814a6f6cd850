//! Half-edge mesh with attribute buffers.
//!
//! [`AttributedMesh`] couples a [`HalfEdgeMesh`] with one [`PropertyContainer`]
//! per element kind. Creating or deleting elements through this type keeps every
//! buffer exactly as long as the element count it belongs to.

use nalgebra::{Point3, Vector3};

use super::halfedge::HalfEdgeMesh;
use super::index::{EdgeId, FaceId, MeshIndex, RegionId, VertexId};
use super::property::{InitPolicy, PropertyContainer, PropertyHandle, PropertyKey, PropertyValue};
use crate::cell::SimulationCell;
use crate::error::{ElementKind, MeshError, Result};

/// Classification of a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FaceType {
    /// A grain boundary or free surface.
    #[default]
    Interface,
    /// One side of a dislocation line.
    Dislocation,
    /// One side of a slipped crystal plane.
    SlipFacet,
}

impl FaceType {
    /// The integer code stored in the face type buffer.
    pub fn code(self) -> i32 {
        match self {
            FaceType::Interface => 0,
            FaceType::Dislocation => 1,
            FaceType::SlipFacet => 2,
        }
    }

    /// Decodes a stored face type.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(FaceType::Interface),
            1 => Some(FaceType::Dislocation),
            2 => Some(FaceType::SlipFacet),
            _ => None,
        }
    }
}

/// A half-edge mesh with per-vertex, per-face and per-region attributes.
#[derive(Debug, Clone)]
pub struct AttributedMesh<I: MeshIndex = u32> {
    pub(crate) topology: HalfEdgeMesh<I>,
    pub(crate) vertices: PropertyContainer,
    pub(crate) faces: PropertyContainer,
    pub(crate) regions: PropertyContainer,
    domain: Option<SimulationCell>,
}

impl<I: MeshIndex> Default for AttributedMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> AttributedMesh<I> {
    /// Creates an empty mesh carrying the standard properties.
    pub fn new() -> Self {
        let mut vertices = PropertyContainer::new(ElementKind::Vertex);
        let mut faces = PropertyContainer::new(ElementKind::Face);
        let mut regions = PropertyContainer::new(ElementKind::Region);

        // Containers are empty, so creating properties cannot conflict.
        let created = [
            vertices
                .create::<Point3<f64>>(PropertyKey::Position, false, InitPolicy::Zeroed)
                .map(drop),
            faces
                .create::<i32>(PropertyKey::Region, false, InitPolicy::Zeroed)
                .map(drop),
            faces
                .create::<i32>(PropertyKey::FaceType, false, InitPolicy::Zeroed)
                .map(drop),
            faces
                .create::<Vector3<f64>>(PropertyKey::BurgersVector, false, InitPolicy::Zeroed)
                .map(drop),
            faces
                .create::<Vector3<f64>>(PropertyKey::CrystallographicNormal, false, InitPolicy::Zeroed)
                .map(drop),
            regions
                .create::<i32>(PropertyKey::Phase, false, InitPolicy::Zeroed)
                .map(drop),
        ];
        debug_assert!(created.iter().all(|r| r.is_ok()), "standard properties: {:?}", created);

        Self {
            topology: HalfEdgeMesh::new(),
            vertices,
            faces,
            regions,
            domain: None,
        }
    }

    /// Creates an empty mesh embedded in the given cell.
    pub fn with_domain(domain: SimulationCell) -> Self {
        let mut mesh = Self::new();
        mesh.domain = Some(domain);
        mesh
    }

    // ==================== Accessors ====================

    /// The bare topology.
    #[inline]
    pub fn topology(&self) -> &HalfEdgeMesh<I> {
        &self.topology
    }

    /// The simulation cell the mesh is embedded in, if any.
    #[inline]
    pub fn domain(&self) -> Option<&SimulationCell> {
        self.domain.as_ref()
    }

    /// Replaces the simulation cell.
    pub fn set_domain(&mut self, domain: Option<SimulationCell>) {
        self.domain = domain;
    }

    /// Get the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.topology.vertex_count()
    }

    /// Get the number of half-edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.topology.edge_count()
    }

    /// Get the number of faces.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.topology.face_count()
    }

    /// Get the number of regions.
    #[inline]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// The property container of an element kind.
    ///
    /// # Errors
    /// [`MeshError::InvalidParameter`] for [`ElementKind::Edge`]; half-edges carry no attributes.
    pub fn properties(&self, kind: ElementKind) -> Result<&PropertyContainer> {
        match kind {
            ElementKind::Vertex => Ok(&self.vertices),
            ElementKind::Face => Ok(&self.faces),
            ElementKind::Region => Ok(&self.regions),
            ElementKind::Edge => Err(no_edge_properties()),
        }
    }

    fn properties_mut(&mut self, kind: ElementKind) -> Result<&mut PropertyContainer> {
        match kind {
            ElementKind::Vertex => Ok(&mut self.vertices),
            ElementKind::Face => Ok(&mut self.faces),
            ElementKind::Region => Ok(&mut self.regions),
            ElementKind::Edge => Err(no_edge_properties()),
        }
    }

    // ==================== Generic Properties ====================

    /// Creates a property for an element kind, or returns the existing one.
    ///
    /// See [`PropertyContainer::create`].
    pub fn create_property<T: PropertyValue>(
        &mut self,
        kind: ElementKind,
        key: PropertyKey,
        keep_existing: bool,
        init: InitPolicy<T>,
    ) -> Result<PropertyHandle<T>> {
        self.properties_mut(kind)?.create(key, keep_existing, init)
    }

    /// Reads a property value.
    pub fn get<T: PropertyValue>(&self, kind: ElementKind, key: &PropertyKey, index: usize) -> Result<T> {
        self.properties(kind)?.get(key, index)
    }

    /// Writes a property value.
    pub fn set<T: PropertyValue>(
        &mut self,
        kind: ElementKind,
        key: &PropertyKey,
        index: usize,
        value: T,
    ) -> Result<()> {
        self.properties_mut(kind)?.set(key, index, value)
    }

    /// Borrows the buffer behind a typed handle.
    pub fn property<T: PropertyValue>(&self, handle: &PropertyHandle<T>) -> Result<&[T]> {
        self.properties(handle.kind())?.values(handle.key())
    }

    /// Mutably borrows the buffer behind a typed handle.
    pub fn property_mut<T: PropertyValue>(&mut self, handle: &PropertyHandle<T>) -> Result<&mut [T]> {
        self.properties_mut(handle.kind())?.values_mut(handle.key())
    }

    /// Duplicates every buffer of `kind` `factor` times, block by block.
    ///
    /// For vertices, the matching number of isolated vertices is added to the
    /// topology. For faces, only the buffers grow: the caller must create one
    /// topological face per new buffer entry before handing the mesh out.
    pub(crate) fn replicate(&mut self, kind: ElementKind, factor: usize) -> Result<()> {
        if factor == 0 {
            return Err(MeshError::invalid_param("factor", factor, "must be at least 1"));
        }
        let old_count = self.properties(kind)?.len();
        self.properties_mut(kind)?.replicate(factor);
        if kind == ElementKind::Vertex {
            self.topology.create_vertices(old_count * (factor - 1));
        }
        Ok(())
    }

    // ==================== Standard Properties ====================
    //
    // The standard buffers exist from construction on and cannot be replaced by
    // buffers of another type, so the lookups below always succeed.

    fn standard<'a, T: PropertyValue>(container: &'a PropertyContainer, key: &PropertyKey) -> &'a [T] {
        container.values::<T>(key).unwrap_or(&[])
    }

    /// All vertex positions.
    pub fn positions(&self) -> &[Point3<f64>] {
        Self::standard(&self.vertices, &PropertyKey::Position)
    }

    pub(crate) fn positions_mut(&mut self) -> Result<&mut [Point3<f64>]> {
        self.vertices.values_mut(&PropertyKey::Position)
    }

    /// Position of a vertex.
    ///
    /// # Panics
    /// Panics if `v` is out of range.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> Point3<f64> {
        self.positions()[v.index()]
    }

    /// Moves a vertex.
    pub fn set_position(&mut self, v: VertexId<I>, position: Point3<f64>) -> Result<()> {
        self.vertices.set(&PropertyKey::Position, v.index(), position)
    }

    /// Region of a face.
    ///
    /// # Errors
    /// [`MeshError::InvalidIndex`] if the stored code does not name an existing
    /// region. Negative codes are reported with index `usize::MAX`.
    ///
    /// # Panics
    /// Panics if `f` is out of range.
    #[inline]
    pub fn face_region(&self, f: FaceId<I>) -> Result<RegionId<I>> {
        let region: &[i32] = Self::standard(&self.faces, &PropertyKey::Region);
        let code = region[f.index()];
        let count = self.regions.len();
        match usize::try_from(code) {
            Ok(index) if index < count => Ok(RegionId::new(index)),
            Ok(index) => Err(MeshError::invalid_index(ElementKind::Region, index, count)),
            Err(_) => Err(MeshError::invalid_index(ElementKind::Region, usize::MAX, count)),
        }
    }

    /// Classification of a face. Unknown codes read as [`FaceType::Interface`].
    ///
    /// # Panics
    /// Panics if `f` is out of range.
    #[inline]
    pub fn face_type(&self, f: FaceId<I>) -> FaceType {
        let types: &[i32] = Self::standard(&self.faces, &PropertyKey::FaceType);
        FaceType::from_code(types[f.index()]).unwrap_or_default()
    }

    /// Sets the classification of a face.
    pub fn set_face_type(&mut self, f: FaceId<I>, face_type: FaceType) -> Result<()> {
        self.faces.set(&PropertyKey::FaceType, f.index(), face_type.code())
    }

    /// Burgers vector (or slip vector) of a face.
    ///
    /// # Panics
    /// Panics if `f` is out of range.
    #[inline]
    pub fn burgers_vector(&self, f: FaceId<I>) -> Vector3<f64> {
        let burgers: &[Vector3<f64>] = Self::standard(&self.faces, &PropertyKey::BurgersVector);
        burgers[f.index()]
    }

    /// Sets the Burgers vector (or slip vector) of a face.
    pub fn set_burgers_vector(&mut self, f: FaceId<I>, burgers: Vector3<f64>) -> Result<()> {
        self.faces.set(&PropertyKey::BurgersVector, f.index(), burgers)
    }

    /// Crystallographic normal of a face.
    ///
    /// # Panics
    /// Panics if `f` is out of range.
    #[inline]
    pub fn crystallographic_normal(&self, f: FaceId<I>) -> Vector3<f64> {
        let normals: &[Vector3<f64>] =
            Self::standard(&self.faces, &PropertyKey::CrystallographicNormal);
        normals[f.index()]
    }

    /// Sets the crystallographic normal of a face.
    pub fn set_crystallographic_normal(&mut self, f: FaceId<I>, normal: Vector3<f64>) -> Result<()> {
        self.faces
            .set(&PropertyKey::CrystallographicNormal, f.index(), normal)
    }

    /// Phase of a region.
    ///
    /// # Panics
    /// Panics if `region` is out of range.
    #[inline]
    pub fn phase(&self, region: RegionId<I>) -> i32 {
        let phases: &[i32] = Self::standard(&self.regions, &PropertyKey::Phase);
        phases[region.index()]
    }

    /// Region of the face a half-edge belongs to. See [`Self::face_region`].
    #[inline]
    pub fn edge_region(&self, e: EdgeId<I>) -> Result<RegionId<I>> {
        self.face_region(self.topology.adjacent_face(e))
    }

    // ==================== Construction ====================

    /// Adds a vertex at the given position.
    pub fn create_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        let v = self.topology.create_vertex();
        let index = self.vertices.push();
        debug_assert_eq!(index, v.index());
        let stored = self.vertices.set(&PropertyKey::Position, index, position);
        debug_assert!(stored.is_ok(), "{:?}", stored);
        v
    }

    /// Adds a region with the given phase.
    pub fn create_region(&mut self, phase: i32) -> RegionId<I> {
        let index = self.regions.push();
        let stored = self.regions.set(&PropertyKey::Phase, index, phase);
        debug_assert!(stored.is_ok(), "{:?}", stored);
        RegionId::new(index)
    }

    /// Adds an [`FaceType::Interface`] face belonging to `region`.
    ///
    /// # Errors
    /// - [`MeshError::InvalidIndex`] if `region` or a vertex is out of range
    /// - [`MeshError::DegenerateFace`] if fewer than two distinct vertices are given
    pub fn create_face(&mut self, vertices: &[VertexId<I>], region: RegionId<I>) -> Result<FaceId<I>> {
        if region.index() >= self.regions.len() {
            return Err(MeshError::invalid_index(
                ElementKind::Region,
                region.index(),
                self.regions.len(),
            ));
        }
        let face = self.topology.create_face(vertices)?;
        let index = self.faces.push();
        debug_assert_eq!(index, face.index());
        self.faces
            .set(&PropertyKey::Region, index, region.index() as i32)?;
        Ok(face)
    }

    /// Deletes a face and its attribute entries.
    ///
    /// The last face moves into the freed slot. See [`HalfEdgeMesh::delete_face`].
    pub fn delete_face(&mut self, f: FaceId<I>) -> Result<()> {
        self.topology.delete_face(f)?;
        self.faces.swap_remove(f.index());
        Ok(())
    }

    /// Deletes an isolated vertex and its attribute entries.
    ///
    /// The last vertex moves into the freed slot. See [`HalfEdgeMesh::delete_vertex`].
    pub fn delete_vertex(&mut self, v: VertexId<I>) -> Result<()> {
        self.topology.delete_vertex(v)?;
        self.vertices.swap_remove(v.index());
        Ok(())
    }

    /// Creates the reverse of `edge`. See [`HalfEdgeMesh::create_opposite_edge`].
    ///
    /// A face started by this call belongs to the region of `edge`'s face and
    /// is otherwise zero-initialised.
    pub fn create_opposite_edge(&mut self, edge: EdgeId<I>, face: Option<FaceId<I>>) -> Result<EdgeId<I>> {
        self.topology.check_edge(edge)?;
        let source = self.topology.adjacent_face(edge);
        let region: i32 = self.faces.get(&PropertyKey::Region, source.index())?;

        let new_edge = self.topology.create_opposite_edge(edge, face)?;
        if face.is_none() {
            let index = self.faces.push();
            debug_assert_eq!(index, self.topology.adjacent_face(new_edge).index());
            self.faces.set(&PropertyKey::Region, index, region)?;
        }
        Ok(new_edge)
    }

    // ==================== Topology Edits ====================

    /// See [`HalfEdgeMesh::flip_faces`].
    pub fn flip_faces(&mut self) {
        self.topology.flip_faces();
    }


    /// See [`HalfEdgeMesh::link_opposite_edges`].
    pub fn link_opposite_edges(&mut self, e1: EdgeId<I>, e2: EdgeId<I>) -> Result<()> {
        self.topology.link_opposite_edges(e1, e2)
    }

    /// See [`HalfEdgeMesh::link_opposite_faces`].
    pub fn link_opposite_faces(&mut self, f1: FaceId<I>, f2: FaceId<I>) -> Result<()> {
        self.topology.link_opposite_faces(f1, f2)
    }

    /// See [`HalfEdgeMesh::set_next_manifold_edge`].
    pub fn set_next_manifold_edge(&mut self, e: EdgeId<I>, next: Option<EdgeId<I>>) -> Result<()> {
        self.topology.set_next_manifold_edge(e, next)
    }

    /// See [`HalfEdgeMesh::connect_opposite_halfedges`].
    pub fn connect_opposite_halfedges(&mut self) -> bool {
        self.topology.connect_opposite_halfedges()
    }

    /// Checks that every buffer has as many entries as there are elements.
    pub fn buffers_consistent(&self) -> bool {
        self.vertices.len() == self.topology.vertex_count()
            && self.faces.len() == self.topology.face_count()
            && [&self.vertices, &self.faces, &self.regions]
                .iter()
                .all(|c| c.keys().all(|k| c.data(k).map_or(false, |d| d.len() == c.len())))
    }
}

fn no_edge_properties() -> MeshError {
    MeshError::invalid_param("kind", ElementKind::Edge, "half-edges carry no attributes")
}
