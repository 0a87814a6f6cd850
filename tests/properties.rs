//! Randomized checks on dislocation chains and replication.

use crystmesh::prelude::*;
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;

/// A chain of `reversed.len()` segments created in `order`; segment `i` joins
/// vertices `i` and `i + 1`, running backwards when `reversed[i]` is set.
fn build_chain(reversed: &[bool], order: &[usize], burgers: Vector3<f64>) -> Microstructure {
    let mut micro: Microstructure = Microstructure::new();
    let region = micro.create_region(0);
    let v: Vec<_> = (0..=reversed.len())
        .map(|i| micro.create_vertex(Point3::new(i as f64, (i % 2) as f64, 0.0)))
        .collect();
    for &i in order {
        let (a, b, burgers) = if reversed[i] {
            (v[i + 1], v[i], -burgers)
        } else {
            (v[i], v[i + 1], burgers)
        };
        micro
            .create_dislocation_segment(a, b, burgers, region)
            .unwrap();
    }
    micro
}

fn chain_strategy() -> impl Strategy<Value = (Vec<bool>, Vec<usize>)> {
    prop::collection::vec(any::<bool>(), 1..10).prop_flat_map(|reversed| {
        let order = Just((0..reversed.len()).collect::<Vec<_>>()).prop_shuffle();
        (Just(reversed), order)
    })
}

fn arm_counts(micro: &Microstructure) -> Vec<usize> {
    micro
        .topology()
        .vertex_ids()
        .map(|v| micro.count_dislocation_arms(v))
        .collect()
}

proptest! {
    #[test]
    fn test_chain_merges_into_one_line(
        (reversed, order) in chain_strategy(),
        bx in -2i32..=2,
        by in -2i32..=2,
    ) {
        let burgers = Vector3::new(bx as f64, by as f64, 1.0);
        let mut micro = build_chain(&reversed, &order, burgers);
        let arms = arm_counts(&micro);

        let report = micro.make_continuous_dislocation_lines().unwrap();
        prop_assert_eq!(report.merged_nodes, reversed.len() - 1);
        prop_assert!(report.junction_nodes.is_empty());
        prop_assert_eq!(micro.face_count(), 2);
        prop_assert_eq!(arm_counts(&micro), arms);
        prop_assert!(micro.topology().is_valid());
        prop_assert!(micro.buffers_consistent());

        // Only the two line ends carry a net Burgers vector.
        let ends: Vec<_> = micro
            .conservation_violations(1e-6, false)
            .into_iter()
            .map(|c| c.vertex.index())
            .collect();
        prop_assert_eq!(ends, vec![0, reversed.len()]);

        let network = micro.trace_dislocation_lines().unwrap();
        prop_assert_eq!(network.lines.len(), 1);
        prop_assert_eq!(network.lines[0].points.len(), reversed.len() + 1);
    }

    #[test]
    fn test_merge_twice_changes_nothing((reversed, order) in chain_strategy()) {
        let mut micro = build_chain(&reversed, &order, Vector3::x());
        micro.make_continuous_dislocation_lines().unwrap();
        let faces = micro.face_count();
        let arms = arm_counts(&micro);

        let report = micro.make_continuous_dislocation_lines().unwrap();
        prop_assert_eq!(report.merged_nodes, 0);
        prop_assert_eq!(micro.face_count(), faces);
        prop_assert_eq!(arm_counts(&micro), arms);
    }

    #[test]
    fn test_replication_scales_counts(nx in 1usize..4, ny in 1usize..4, nz in 1usize..3) {
        let cell = SimulationCell::orthorhombic(Vector3::repeat(10.0), [true; 3]);
        let mut micro = Microstructure::from(AttributedMesh::<u32>::with_domain(cell));
        let region = micro.create_region(0);
        let a = micro.create_vertex(Point3::new(1.0, 2.0, 3.0));
        let b = micro.create_vertex(Point3::new(8.5, 2.0, 3.0));
        micro.create_dislocation_segment(a, b, Vector3::y(), region).unwrap();

        let options = ReplicateOptions::default().with_images([nx, ny, nz]);
        replicate_periodic(&mut *micro, &options).unwrap();
        let n = nx * ny * nz;
        prop_assert_eq!(micro.vertex_count(), 2 * n);
        prop_assert_eq!(micro.face_count(), 2 * n);
        prop_assert!(micro.buffers_consistent());
        prop_assert_eq!(micro.conservation_violations(1e-6, true).len(), 2 * n);
    }
}
