//! Tracing dislocation lines and checking Burgers vector conservation.

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};
use nalgebra::{Matrix3, Point3, Vector3};
use rayon::prelude::*;

use super::Microstructure;
use crate::cell::SimulationCell;
use crate::error::{MeshError, Result};
use crate::mesh::{EdgeId, MeshIndex, RegionId, VertexId};

/// A polyline following a chain of physical dislocation edges.
#[derive(Debug, Clone, PartialEq)]
pub struct DislocationLine<I: MeshIndex = u32> {
    /// Burgers vector of the line, in the direction of `points`.
    pub burgers_vector: Vector3<f64>,
    /// Region (crystallite) the line is embedded in.
    pub region: RegionId<I>,
    /// Unwrapped vertex positions along the line.
    pub points: Vec<Point3<f64>>,
    /// Whether the line closes onto itself.
    pub is_closed: bool,
}

/// One end of a [`DislocationLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    /// The first point of the line with this index.
    Start(usize),
    /// The last point of the line with this index.
    End(usize),
}

/// A node where three or more lines meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction<I: MeshIndex = u32> {
    /// The mesh vertex at the junction.
    pub vertex: VertexId<I>,
    /// The line ends attached to the junction.
    pub arms: Vec<LineEnd>,
}

/// The dislocation lines of a microstructure.
#[derive(Debug, Clone, PartialEq)]
pub struct DislocationNetwork<I: MeshIndex = u32> {
    /// All traced lines.
    pub lines: Vec<DislocationLine<I>>,
    /// All junction nodes.
    pub junctions: Vec<Junction<I>>,
}

/// A vertex whose physical arms do not sum to a zero Burgers vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ConservationViolation<I: MeshIndex = u32> {
    /// The offending vertex.
    pub vertex: VertexId<I>,
    /// Number of physical arms at the vertex.
    pub arms: usize,
    /// Sum of the Burgers vectors of all arms.
    pub delta: Vector3<f64>,
}

/// Line id stored per visited edge; negative if the edge runs against the line.
type Visit = isize;

impl<I: MeshIndex> Microstructure<I> {
    /// Sums the Burgers vectors of the physical arms at every vertex and reports
    /// the vertices where the sum exceeds `tolerance` in any component.
    ///
    /// With `parallel` set the vertices are checked on the rayon thread pool.
    pub fn conservation_violations(&self, tolerance: f64, parallel: bool) -> Vec<ConservationViolation<I>> {
        let check = |i: usize| {
            let vertex = VertexId::new(i);
            let mut delta = Vector3::zeros();
            let mut arms = 0;
            for e in self.dislocation_arms(vertex) {
                delta += self.burgers_vector(self.topology().adjacent_face(e));
                arms += 1;
            }
            (delta.amax() > tolerance).then_some(ConservationViolation { vertex, arms, delta })
        };

        let count = self.vertex_count();
        let violations: Vec<_> = if parallel {
            (0..count).into_par_iter().filter_map(check).collect()
        } else {
            (0..count).filter_map(check).collect()
        };

        for violation in &violations {
            warn!(
                "Burgers vector not conserved at {:?} ({} arms; delta_b = {:?})",
                self.position(violation.vertex),
                violation.arms,
                violation.delta
            );
        }
        violations
    }

    /// Converts the physical dislocation edges into a network of polylines.
    ///
    /// Lines run between nodes that do not have exactly two arms, or form closed
    /// loops. Each line starts at an arbitrary unvisited edge and is extended in
    /// both directions. When the mesh has a domain, consecutive points are
    /// unwrapped with the minimum image convention.
    ///
    /// # Errors
    /// - [`MeshError::InvalidNetworkTopology`] if the arms at a node are linked
    ///   inconsistently
    /// - [`MeshError::SingularCell`] if the domain cannot be inverted
    /// - [`MeshError::InvalidIndex`] if a line's face stores an unknown region code
    pub fn trace_dislocation_lines(&self) -> Result<DislocationNetwork<I>> {
        let topo = self.topology();
        let wrap = match self.domain() {
            Some(cell) => Some((cell, cell.inverse()?)),
            None => None,
        };
        let mut visited: HashMap<EdgeId<I>, Visit> = HashMap::new();
        let mut lines = Vec::new();

        for start in topo.edge_ids() {
            if !self.is_physical_dislocation_edge(start) || visited.contains_key(&start) {
                continue;
            }
            let id = lines.len() as Visit + 1;
            let mut points = VecDeque::new();
            points.push_back(self.position(topo.vertex1(start)));
            let mut is_closed = false;

            // Forward along the line.
            let mut current = start;
            loop {
                let last = points.back().copied().unwrap_or_else(Point3::origin);
                points.push_back(self.unwrapped(wrap.as_ref(), last, topo.vertex2(current)));
                self.visit(&mut visited, current, id);

                let Some(next) = self.continuation(current) else {
                    break;
                };
                if let Some(&seen) = visited.get(&next) {
                    if seen != id {
                        return Err(MeshError::InvalidNetworkTopology { edge: next.index() });
                    }
                    is_closed = true;
                    break;
                }
                current = next;
            }

            // Backward from the start edge.
            if !is_closed {
                if let Some(mut current) = topo.opposite_edge(start) {
                    while let Some(next) = self.continuation(current) {
                        if let Some(&seen) = visited.get(&next) {
                            if seen != -id {
                                return Err(MeshError::InvalidNetworkTopology { edge: next.index() });
                            }
                            break;
                        }
                        current = next;
                        let first = points.front().copied().unwrap_or_else(Point3::origin);
                        let point = self.unwrapped(wrap.as_ref(), first, topo.vertex2(current));
                        points.push_front(point);
                        self.visit(&mut visited, current, -id);
                    }
                }
            }

            lines.push(DislocationLine {
                burgers_vector: self.burgers_vector(topo.adjacent_face(start)),
                region: self.edge_region(start)?,
                points: points.into(),
                is_closed,
            });
        }

        let mut junctions = Vec::new();
        for vertex in topo.vertex_ids() {
            if self.dislocation_arms(vertex).nth(2).is_none() {
                continue;
            }
            let arms = self
                .dislocation_arms(vertex)
                .map(|e| match visited.get(&e).copied().unwrap_or(0) {
                    id if id > 0 => Ok(LineEnd::Start(id as usize - 1)),
                    id if id < 0 => Ok(LineEnd::End((-id) as usize - 1)),
                    _ => Err(MeshError::InvalidNetworkTopology { edge: e.index() }),
                })
                .collect::<Result<Vec<_>>>()?;
            junctions.push(Junction { vertex, arms });
        }

        debug!(
            "traced {} dislocation line(s) and {} junction(s)",
            lines.len(),
            junctions.len()
        );
        Ok(DislocationNetwork { lines, junctions })
    }

    /// The edge continuing the line through the end vertex of `edge`, if that
    /// vertex has exactly two arms.
    fn continuation(&self, edge: EdgeId<I>) -> Option<EdgeId<I>> {
        let topo = self.topology();
        let back = topo.opposite_edge(edge);
        let mut arms = 0;
        let mut next = None;
        for e in self.dislocation_arms(topo.vertex2(edge)) {
            arms += 1;
            if Some(e) != back {
                next = Some(e);
            }
        }
        if arms == 2 {
            next
        } else {
            None
        }
    }

    fn visit(&self, visited: &mut HashMap<EdgeId<I>, Visit>, edge: EdgeId<I>, id: Visit) {
        visited.insert(edge, id);
        if let Some(opposite) = self.topology().opposite_edge(edge) {
            visited.insert(opposite, -id);
        }
    }

    /// Position of `vertex` as seen from `from` under the minimum image convention.
    fn unwrapped(
        &self,
        wrap: Option<&(&SimulationCell, Matrix3<f64>)>,
        from: Point3<f64>,
        vertex: VertexId<I>,
    ) -> Point3<f64> {
        let delta = self.position(vertex) - from;
        match wrap {
            Some((cell, inverse)) => from + cell.wrap_vector_with(inverse, &delta),
            None => from + delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::SimulationCell;
    use crate::error::ElementKind;
    use crate::mesh::PropertyKey;

    fn add_vertices(micro: &mut Microstructure<u32>, points: &[[f64; 3]]) -> Vec<VertexId<u32>> {
        points
            .iter()
            .map(|p| micro.create_vertex(Point3::new(p[0], p[1], p[2])))
            .collect()
    }

    #[test]
    fn test_conservation_on_chain() {
        let mut micro: Microstructure = Microstructure::new();
        let region = micro.create_region(0);
        let v = add_vertices(&mut micro, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        micro
            .create_dislocation_segment(v[0], v[1], Vector3::x(), region)
            .unwrap();
        micro
            .create_dislocation_segment(v[1], v[2], Vector3::x(), region)
            .unwrap();

        // Only the two line ends violate conservation.
        let violations = micro.conservation_violations(1e-6, false);
        let vertices: Vec<_> = violations.iter().map(|c| c.vertex).collect();
        assert_eq!(vertices, vec![v[0], v[2]]);
        assert_eq!(violations[0].arms, 1);
        assert_eq!(micro.conservation_violations(1e-6, true), violations);
    }

    #[test]
    fn test_conservation_at_junction() {
        let mut micro: Microstructure = Microstructure::new();
        let region = micro.create_region(0);
        let v = add_vertices(
            &mut micro,
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, -1.0, 0.0]],
        );
        // b1 + b2 = b3 flowing out of the node.
        micro
            .create_dislocation_segment(v[1], v[0], Vector3::x(), region)
            .unwrap();
        micro
            .create_dislocation_segment(v[2], v[0], Vector3::y(), region)
            .unwrap();
        micro
            .create_dislocation_segment(v[0], v[3], Vector3::new(1.0, 1.0, 0.0), region)
            .unwrap();
        let violations = micro.conservation_violations(1e-6, false);
        assert!(violations.iter().all(|c| c.vertex != v[0]));
    }

    #[test]
    fn test_trace_open_line() {
        let mut micro: Microstructure = Microstructure::new();
        let region = micro.create_region(0);
        let v = add_vertices(
            &mut micro,
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]],
        );
        // Start tracing in the middle of the line.
        micro
            .create_dislocation_segment(v[1], v[2], Vector3::x(), region)
            .unwrap();
        micro
            .create_dislocation_segment(v[0], v[1], Vector3::x(), region)
            .unwrap();
        micro
            .create_dislocation_segment(v[2], v[3], Vector3::x(), region)
            .unwrap();

        let network = micro.trace_dislocation_lines().unwrap();
        assert_eq!(network.lines.len(), 1);
        assert!(network.junctions.is_empty());
        let line = &network.lines[0];
        assert!(!line.is_closed);
        assert_eq!(line.burgers_vector, Vector3::x());
        let xs: Vec<_> = line.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_trace_closed_loop() {
        let mut micro: Microstructure = Microstructure::new();
        let region = micro.create_region(0);
        let v = add_vertices(&mut micro, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        for i in 0..3 {
            micro
                .create_dislocation_segment(v[i], v[(i + 1) % 3], Vector3::z(), region)
                .unwrap();
        }
        let network = micro.trace_dislocation_lines().unwrap();
        assert_eq!(network.lines.len(), 1);
        let line = &network.lines[0];
        assert!(line.is_closed);
        assert_eq!(line.points.len(), 4);
        assert_eq!(line.points.first(), line.points.last());
    }

    #[test]
    fn test_trace_junction() {
        let mut micro: Microstructure = Microstructure::new();
        let region = micro.create_region(0);
        let v = add_vertices(
            &mut micro,
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        );
        for &end in &v[1..] {
            micro
                .create_dislocation_segment(v[0], end, Vector3::x(), region)
                .unwrap();
        }
        let network = micro.trace_dislocation_lines().unwrap();
        assert_eq!(network.lines.len(), 3);
        assert_eq!(network.junctions.len(), 1);
        let junction = &network.junctions[0];
        assert_eq!(junction.vertex, v[0]);
        assert_eq!(junction.arms.len(), 3);
        assert!(junction.arms.iter().all(|a| matches!(a, LineEnd::Start(_))));
    }

    #[test]
    fn test_trace_unwraps_periodic_line() {
        let cell = SimulationCell::orthorhombic(Vector3::repeat(10.0), [true; 3]);
        let mut micro = Microstructure::from(crate::mesh::AttributedMesh::<u32>::with_domain(cell));
        let region = micro.create_region(0);
        let v = add_vertices(&mut micro, &[[9.0, 5.0, 5.0], [1.0, 5.0, 5.0]]);
        micro
            .create_dislocation_segment(v[0], v[1], Vector3::x(), region)
            .unwrap();

        let network = micro.trace_dislocation_lines().unwrap();
        let points = &network.lines[0].points;
        assert_eq!(points[0], Point3::new(9.0, 5.0, 5.0));
        assert!((points[1] - Point3::new(11.0, 5.0, 5.0)).norm() < 1e-12);
    }

    #[test]
    fn test_trace_unwraps_loop_around_cell() {
        let cell = SimulationCell::orthorhombic(Vector3::repeat(10.0), [true; 3]);
        let mut micro = Microstructure::from(crate::mesh::AttributedMesh::<u32>::with_domain(cell));
        let region = micro.create_region(0);
        let v = add_vertices(&mut micro, &[[1.0, 5.0, 5.0], [4.0, 5.0, 5.0], [7.0, 5.0, 5.0]]);
        for i in 0..3 {
            micro
                .create_dislocation_segment(v[i], v[(i + 1) % 3], Vector3::x(), region)
                .unwrap();
        }

        let network = micro.trace_dislocation_lines().unwrap();
        assert_eq!(network.lines.len(), 1);
        let line = &network.lines[0];
        assert!(line.is_closed);
        let xs: Vec<_> = line.points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 4.0, 7.0, 11.0]);

        let flat = SimulationCell::orthorhombic(Vector3::new(10.0, 0.0, 10.0), [true; 3]);
        micro.set_domain(Some(flat));
        assert_eq!(micro.trace_dislocation_lines(), Err(MeshError::SingularCell));
    }

    #[test]
    fn test_trace_rejects_unknown_region_code() {
        let mut micro: Microstructure = Microstructure::new();
        let region = micro.create_region(0);
        let v = add_vertices(&mut micro, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        micro
            .create_dislocation_segment(v[0], v[1], Vector3::x(), region)
            .unwrap();
        micro
            .set(ElementKind::Face, &PropertyKey::Region, 0, -7i32)
            .unwrap();

        assert!(matches!(
            micro.trace_dislocation_lines(),
            Err(MeshError::InvalidIndex { kind: ElementKind::Region, index: usize::MAX, .. })
        ));
    }
}
