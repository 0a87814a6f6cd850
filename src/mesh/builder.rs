//! Mesh construction utilities.
//!
//! This module builds attributed meshes from face-vertex lists, the form in
//! which surface data usually arrives from importers, and converts them back.

use nalgebra::Point3;

use super::attributed::AttributedMesh;
use super::index::{MeshIndex, VertexId};
use crate::cell::SimulationCell;
use crate::error::{ElementKind, MeshError, Result};

/// Build an attributed mesh from vertex positions and polygon faces.
///
/// All faces are placed in a single region of phase 0 and typed
/// [`FaceType::Interface`](super::FaceType::Interface). Half-edges that have a
/// reverse partner on another face are linked as opposite edges.
///
/// # Arguments
/// * `positions` - List of vertex positions
/// * `polygons` - List of faces, each an ordered list of vertex indices
/// * `domain` - Optional simulation cell the mesh lives in
///
/// # Example
/// ```
/// use crystmesh::mesh::{build_from_polygons, AttributedMesh};
/// use nalgebra::Point3;
///
/// let positions = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let polygons = vec![vec![0, 1, 2, 3]];
///
/// let mesh: AttributedMesh = build_from_polygons(&positions, &polygons, None).unwrap();
/// assert_eq!(mesh.vertex_count(), 4);
/// assert_eq!(mesh.face_count(), 1);
/// assert_eq!(mesh.edge_count(), 4);
/// ```
pub fn build_from_polygons<I: MeshIndex>(
    positions: &[Point3<f64>],
    polygons: &[Vec<usize>],
    domain: Option<SimulationCell>,
) -> Result<AttributedMesh<I>> {
    // Validate vertex indices
    for polygon in polygons {
        if let Some(&vi) = polygon.iter().find(|&&vi| vi >= positions.len()) {
            return Err(MeshError::invalid_index(ElementKind::Vertex, vi, positions.len()));
        }
    }

    let mut mesh = AttributedMesh::new();
    mesh.set_domain(domain);

    let vertex_ids: Vec<VertexId<I>> = positions.iter().map(|&p| mesh.create_vertex(p)).collect();
    let region = mesh.create_region(0);

    let mut face_vertices = Vec::new();
    for polygon in polygons {
        face_vertices.clear();
        face_vertices.extend(polygon.iter().map(|&vi| vertex_ids[vi]));
        mesh.create_face(&face_vertices, region)?;
    }

    mesh.connect_opposite_halfedges();
    Ok(mesh)
}

/// Convert an attributed mesh to vertex positions and polygon index lists.
pub fn to_face_vertex<I: MeshIndex>(mesh: &AttributedMesh<I>) -> (Vec<Point3<f64>>, Vec<Vec<usize>>) {
    let positions = mesh.positions().to_vec();

    let topology = mesh.topology();
    let polygons = topology
        .face_ids()
        .map(|f| topology.face_vertices(f).map(|v| v.index()).collect())
        .collect();

    (positions, polygons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn tetrahedron() -> (Vec<Point3<f64>>, Vec<Vec<usize>>) {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let polygons = vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3], vec![2, 0, 3]];
        (positions, polygons)
    }

    #[test]
    fn test_single_polygon() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
        ];
        let mesh: AttributedMesh = build_from_polygons(&positions, &[vec![0, 1, 2]], None).unwrap();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.edge_count(), 3);
        assert_eq!(mesh.region_count(), 1);
        assert!(!mesh.topology().is_closed());
        assert!(mesh.topology().is_valid());
    }

    #[test]
    fn test_closed_surface() {
        let (positions, polygons) = tetrahedron();
        let mesh: AttributedMesh = build_from_polygons(&positions, &polygons, None).unwrap();
        assert!(mesh.topology().is_closed());
        assert!(mesh.topology().is_valid());
        assert_eq!(mesh.topology().triangulate().len(), 4);
    }

    #[test]
    fn test_roundtrip() {
        let (positions, polygons) = tetrahedron();
        let cell = SimulationCell::orthorhombic(Vector3::repeat(2.0), [true; 3]);
        let mesh: AttributedMesh = build_from_polygons(&positions, &polygons, Some(cell)).unwrap();
        assert_eq!(mesh.domain(), Some(&cell));

        let (out_positions, out_polygons) = to_face_vertex(&mesh);
        assert_eq!(out_positions, positions);
        assert_eq!(out_polygons, polygons);
    }

    #[test]
    fn test_invalid_vertex_index() {
        let (positions, _) = tetrahedron();
        let result: Result<AttributedMesh> = build_from_polygons(&positions, &[vec![0, 1, 9]], None);
        assert!(matches!(
            result,
            Err(MeshError::InvalidIndex { kind: ElementKind::Vertex, index: 9, count: 4 })
        ));
    }

    #[test]
    fn test_degenerate_face() {
        let (positions, _) = tetrahedron();
        let result: Result<AttributedMesh> = build_from_polygons(&positions, &[vec![1, 1, 1]], None);
        assert!(matches!(result, Err(MeshError::DegenerateFace { .. })));
    }
}
