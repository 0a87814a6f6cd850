//! Periodic replication of meshes and microstructures.

use crystmesh::prelude::*;
use nalgebra::{Point3, Vector3};

fn periodic_cube(size: f64) -> SimulationCell {
    SimulationCell::orthorhombic(Vector3::repeat(size), [true; 3])
}

/// A closed octahedron around the centre of a cube of size 4.
fn octahedron() -> AttributedMesh {
    octahedron_at(Point3::new(2.0, 2.0, 2.0))
}

/// A closed octahedron with unit half-diagonals around `c`, with every corner
/// mapped into the primary cell of a periodic cube of size 4.
fn octahedron_at(c: Point3<f64>) -> AttributedMesh {
    let cell = periodic_cube(4.0);
    let positions: Vec<_> = [
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(-1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, -1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(0.0, 0.0, -1.0),
    ]
    .iter()
    .map(|d| cell.wrap_point(&(c + d)).unwrap())
    .collect();
    let polygons = vec![
        vec![0, 2, 4],
        vec![2, 1, 4],
        vec![1, 3, 4],
        vec![3, 0, 4],
        vec![2, 0, 5],
        vec![1, 2, 5],
        vec![3, 1, 5],
        vec![0, 3, 5],
    ];
    build_from_polygons(&positions, &polygons, Some(cell)).unwrap()
}

/// A two-sided sheet: each triangle of the octahedron paired with its reverse.
fn two_sided_octahedron() -> AttributedMesh {
    two_sided(&octahedron())
}

fn two_sided(outer: &AttributedMesh) -> AttributedMesh {
    let (positions, polygons) = to_face_vertex(outer);
    let mut mesh = AttributedMesh::with_domain(periodic_cube(4.0));
    let region = mesh.create_region(0);
    let v: Vec<_> = positions.iter().map(|&p| mesh.create_vertex(p)).collect();
    for polygon in &polygons {
        let front: Vec<_> = polygon.iter().map(|&i| v[i]).collect();
        let back = [front[1], front[0], front[2]];
        let f = mesh.create_face(&front, region).unwrap();
        let b = mesh.create_face(&back, region).unwrap();
        mesh.link_opposite_faces(f, b).unwrap();
    }
    mesh
}

fn closure_holds(mesh: &AttributedMesh) -> bool {
    let topo = mesh.topology();
    topo.face_ids().all(|f| match topo.opposite_face(f) {
        None => true,
        Some(o) => {
            topo.opposite_face(o) == Some(f)
                && topo
                    .face_edges(f)
                    .all(|e| topo.find_edge(o, topo.vertex2(e), topo.vertex1(e)).is_some())
        }
    })
}

#[test]
fn test_identity_replication() {
    let mut mesh = two_sided_octahedron();
    mesh.set_burgers_vector(FaceId::new(3), Vector3::new(0.0, 0.0, 1.0))
        .unwrap();
    let before = mesh.clone();

    replicate_periodic(&mut mesh, &ReplicateOptions::default().with_images([1, 1, 1])).unwrap();
    assert_eq!(mesh.vertex_count(), before.vertex_count());
    assert_eq!(mesh.face_count(), before.face_count());
    assert_eq!(mesh.positions(), before.positions());
    for f in mesh.topology().face_ids() {
        assert_eq!(mesh.burgers_vector(f), before.burgers_vector(f));
        assert_eq!(mesh.face_type(f), before.face_type(f));
        assert_eq!(mesh.face_region(f).unwrap(), before.face_region(f).unwrap());
    }
}

#[test]
fn test_counts_scale_with_images() {
    for counts in [[2, 1, 1], [1, 3, 1], [2, 2, 2]] {
        let mut mesh = octahedron();
        let (v, f, e) = (mesh.vertex_count(), mesh.face_count(), mesh.edge_count());
        replicate_periodic(&mut mesh, &ReplicateOptions::default().with_images(counts)).unwrap();

        let n: usize = counts.iter().product();
        assert_eq!(mesh.vertex_count(), v * n);
        assert_eq!(mesh.face_count(), f * n);
        assert_eq!(mesh.edge_count(), e * n);
        assert!(mesh.topology().is_closed());
        assert!(mesh.buffers_consistent());
    }
}

#[test]
fn test_closure_after_replication() {
    let mut mesh = two_sided_octahedron();
    assert!(closure_holds(&mesh));
    let options = ReplicateOptions::default().with_images([2, 2, 1]).sequential();
    replicate_periodic(&mut mesh, &options).unwrap();
    assert_eq!(mesh.face_count(), 64);
    assert!(closure_holds(&mesh));
}

/// Every edge has its octahedron length under the minimum image convention
/// of the mesh's own cell.
fn edges_are_short(mesh: &AttributedMesh) -> bool {
    let cell = mesh.domain().unwrap();
    let topo = mesh.topology();
    topo.edge_ids().all(|e| {
        let delta = mesh.position(topo.vertex2(e)) - mesh.position(topo.vertex1(e));
        (cell.wrap_vector(&delta).unwrap().norm() - 2f64.sqrt()).abs() < 1e-9
    })
}

#[test]
fn test_surface_wrapped_across_corner() {
    let corner = Point3::new(0.5, 0.5, 0.5);
    for counts in [[2, 1, 1], [2, 2, 2], [3, 2, 1]] {
        let n: usize = counts.iter().product();
        let options = ReplicateOptions::default().with_images(counts);

        let mut one_sided = octahedron_at(corner);
        let inside = |p: &Point3<f64>| p.coords.iter().all(|&x| (0.0..4.0).contains(&x));
        assert!(one_sided.positions().iter().all(inside));
        replicate_periodic(&mut one_sided, &options).unwrap();
        assert_eq!(one_sided.face_count(), 8 * n);
        assert!(one_sided.topology().is_valid());
        assert!(one_sided.topology().is_closed());
        assert!(one_sided.buffers_consistent());
        assert!(edges_are_short(&one_sided), "one-sided {:?}", counts);

        let mut sheet = two_sided(&octahedron_at(corner));
        replicate_periodic(&mut sheet, &options.clone().sequential()).unwrap();
        assert_eq!(sheet.face_count(), 16 * n);
        assert!(sheet.topology().is_valid());
        assert!(closure_holds(&sheet), "two-sided {:?}", counts);
        assert!(edges_are_short(&sheet), "two-sided {:?}", counts);
    }
}

#[test]
fn test_dislocation_across_boundary() {
    let mut micro = Microstructure::from(AttributedMesh::<u32>::with_domain(periodic_cube(10.0)));
    let region = micro.create_region(0);
    let a = micro.create_vertex(Point3::new(1.0, 1.0, 1.0));
    let b = micro.create_vertex(Point3::new(9.0, 1.0, 1.0));
    micro
        .create_dislocation_segment(a, b, Vector3::new(1.0, 0.0, 0.0), region)
        .unwrap();
    assert_eq!(micro.vertex_count(), 2);
    assert_eq!(micro.face_count(), 2);

    micro
        .replicate(&ReplicateOptions::default().with_images([2, 1, 1]))
        .unwrap();
    assert_eq!(micro.vertex_count(), 4);
    assert_eq!(micro.face_count(), 4);
    assert_eq!(micro.position(VertexId::new(2)), Point3::new(11.0, 1.0, 1.0));
    assert_eq!(micro.position(VertexId::new(3)), Point3::new(19.0, 1.0, 1.0));

    let topo = micro.topology();
    let physical: Vec<_> = topo
        .edge_ids()
        .filter(|&e| micro.is_physical_dislocation_edge(e))
        .collect();
    // Two segments, each a pair of half-edges.
    assert_eq!(physical.len(), 4);
    for f in topo.face_ids() {
        let b = micro.burgers_vector(f);
        assert!(b == Vector3::new(1.0, 0.0, 0.0) || b == Vector3::new(-1.0, 0.0, 0.0));
    }
    assert!(closure_holds(&micro));

    // Every segment is short once unwrapped.
    let network = micro.trace_dislocation_lines().unwrap();
    for line in &network.lines {
        assert!((line.points[1] - line.points[0]).norm() < 2.0 + 1e-9);
    }
}

#[test]
fn test_two_dimensional_cell_ignores_z() {
    let cell = periodic_cube(10.0).with_2d(true);
    let mut micro = Microstructure::from(AttributedMesh::<u32>::with_domain(cell));
    let region = micro.create_region(0);
    let a = micro.create_vertex(Point3::new(1.0, 1.0, 1.0));
    let b = micro.create_vertex(Point3::new(1.0, 1.0, 9.0));
    micro
        .create_dislocation_segment(a, b, Vector3::z(), region)
        .unwrap();

    micro
        .replicate(&ReplicateOptions::default().with_images([1, 1, 2]))
        .unwrap();
    let topo = micro.topology();
    let first: Vec<_> = topo.face_vertices(FaceId::new(0)).collect();
    assert_eq!(first, vec![VertexId::new(0), VertexId::new(1)]);
}
