//! Merging dislocation segments into continuous lines.
//!
//! Dislocation segments are created one at a time, each as a pair of opposite
//! two-vertex faces. At a vertex where exactly two physical arms meet, the two
//! segments belong to the same line: their forward faces are joined into one
//! face loop, and so are their backward faces.
//!
//! # Splice
//!
//! Let `arm1` and `arm2` be the two physical edges leaving the node. For
//! `(a, b)` in `[(arm1, arm2), (arm2, arm1)]` the edge arriving along `a`
//! (`opposite(a)`) is connected to `b`, and the edge preceding `b` is connected
//! to the edge that followed `opposite(a)`. Every edge keeps its origin, so the
//! per-vertex edge lists stay untouched.

use log::{debug, trace, warn};

use super::{Microstructure, BURGERS_EPSILON};
use crate::error::{MeshError, Result};
use crate::mesh::{EdgeId, FaceId, MeshIndex, VertexId};

/// Outcome of [`Microstructure::make_continuous_dislocation_lines`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMergeReport<I: MeshIndex = u32> {
    /// Number of two-arm nodes at which segments were joined.
    pub merged_nodes: usize,
    /// Nodes with three or more arms. These are left untouched.
    pub junction_nodes: Vec<VertexId<I>>,
}

/// How a node takes part in line merging.
enum Node<I: MeshIndex> {
    /// Fewer than two arms, arms in different regions, or already joined.
    Skip,
    /// Exactly two arms that can be joined.
    Mergeable(EdgeId<I>, EdgeId<I>),
    /// Three or more arms.
    Junction,
}

/// The faces joined at a node: `(incoming, outgoing)` for each direction.
struct FacePairs<I: MeshIndex> {
    forward: (FaceId<I>, FaceId<I>),
    backward: (FaceId<I>, FaceId<I>),
}

impl<I: MeshIndex> Microstructure<I> {
    /// Joins dislocation segments meeting at two-arm nodes into continuous lines.
    ///
    /// Vertices are visited in ascending order. A vertex is merged when it has
    /// exactly two physical arms in the same region whose faces are not joined
    /// yet. Vertices with three or more arms are reported in
    /// [`LineMergeReport::junction_nodes`] and left as they are.
    ///
    /// Running the operation a second time changes nothing.
    ///
    /// # Errors
    /// - [`MeshError::BurgersVectorMismatch`] if the two arms at a mergeable node do
    ///   not carry opposite Burgers vectors. The mesh is left unchanged.
    /// - [`MeshError::InvalidNetworkTopology`] if the faces around a mergeable node
    ///   do not form two separate directions. The mesh is left unchanged.
    /// - [`MeshError::InvalidIndex`] if a face at a two-arm node stores a region
    ///   code that names no region. The mesh is left unchanged.
    pub fn make_continuous_dislocation_lines(&mut self) -> Result<LineMergeReport<I>> {
        // Validate every node before touching the mesh.
        let mut candidates = Vec::new();
        let mut junction_nodes = Vec::new();
        for v in self.topology().vertex_ids() {
            match self.classify_node(v)? {
                Node::Skip => {}
                Node::Junction => junction_nodes.push(v),
                Node::Mergeable(arm1, arm2) => {
                    self.check_mergeable(v, arm1, arm2)?;
                    candidates.push(v);
                }
            }
        }

        let mut merged_nodes = 0;
        for v in candidates {
            // Earlier merges may have closed a loop through this node.
            if let Node::Mergeable(arm1, arm2) = self.classify_node(v)? {
                trace!("joining dislocation segments at vertex {}", v);
                self.join_segments(arm1, arm2)?;
                merged_nodes += 1;
            }
        }

        if !junction_nodes.is_empty() {
            warn!(
                "{} dislocation junction node(s) with three or more arms were not merged",
                junction_nodes.len()
            );
        }
        debug!(
            "merged dislocation segments at {} node(s); {} faces remain",
            merged_nodes,
            self.face_count()
        );

        Ok(LineMergeReport {
            merged_nodes,
            junction_nodes,
        })
    }

    fn classify_node(&self, v: VertexId<I>) -> Result<Node<I>> {
        // Never look further than three arms.
        let mut arms = self.dislocation_arms(v);
        let node = match (arms.next(), arms.next(), arms.next()) {
            (Some(_), Some(_), Some(_)) => Node::Junction,
            (Some(arm1), Some(arm2), None) => {
                let pairs = self.face_pairs(arm1, arm2);
                let same_region = self.edge_region(arm1)? == self.edge_region(arm2)?;
                let open = pairs.forward.0 != pairs.forward.1 && pairs.backward.0 != pairs.backward.1;
                if same_region && open {
                    Node::Mergeable(arm1, arm2)
                } else {
                    Node::Skip
                }
            }
            _ => Node::Skip,
        };
        Ok(node)
    }

    fn face_pairs(&self, arm1: EdgeId<I>, arm2: EdgeId<I>) -> FacePairs<I> {
        let topo = self.topology();
        let incoming = |arm| {
            let e = topo.opposite_edge(arm).unwrap_or(arm);
            topo.adjacent_face(e)
        };
        FacePairs {
            forward: (incoming(arm1), topo.adjacent_face(arm2)),
            backward: (incoming(arm2), topo.adjacent_face(arm1)),
        }
    }

    fn check_mergeable(&self, v: VertexId<I>, arm1: EdgeId<I>, arm2: EdgeId<I>) -> Result<()> {
        let first = self.burgers_vector(self.topology().adjacent_face(arm1));
        let second = self.burgers_vector(self.topology().adjacent_face(arm2));
        if (first + second).amax() > BURGERS_EPSILON {
            return Err(MeshError::BurgersVectorMismatch {
                vertex: v.index(),
                first,
                second,
            });
        }

        let FacePairs { forward, backward } = self.face_pairs(arm1, arm2);
        let shared = [forward.0, forward.1]
            .iter()
            .any(|f| *f == backward.0 || *f == backward.1);
        if shared {
            return Err(MeshError::InvalidNetworkTopology { edge: arm1.index() });
        }
        Ok(())
    }

    /// Joins the segments of `arm1` and `arm2` into one forward and one backward face.
    fn join_segments(&mut self, arm1: EdgeId<I>, arm2: EdgeId<I>) -> Result<()> {
        let FacePairs { forward, backward } = self.face_pairs(arm1, arm2);
        let topo = self.topology();
        // The incoming face carries the start of the line.
        let forward_first = topo.first_face_edge(forward.0);
        let backward_first = topo.first_face_edge(backward.0);

        for (a, b) in [(arm1, arm2), (arm2, arm1)] {
            let topo = &mut self.mesh.topology;
            let Some(incoming) = topo.opposite_edge(a) else {
                return Err(MeshError::InvalidNetworkTopology { edge: a.index() });
            };
            let outgoing = topo.next_face_edge(incoming);
            let tail = topo.prev_face_edge(b);
            topo.set_next_face_edge(incoming, b);
            topo.set_prev_face_edge(b, incoming);
            topo.set_next_face_edge(tail, outgoing);
            topo.set_prev_face_edge(outgoing, tail);
        }

        let mut survivors = [
            forward.0.min(forward.1),
            backward.0.min(backward.1),
        ];
        for (survivor, first) in survivors.iter().zip([forward_first, backward_first]) {
            self.relabel_face_loop(first, *survivor);
        }

        for f in [forward.0, forward.1, backward.0, backward.1] {
            self.mesh.topology.unlink_from_opposite_face(f);
        }

        let mut redundant = [forward.0.max(forward.1), backward.0.max(backward.1)];
        redundant.sort_unstable_by(|a, b| b.cmp(a));
        for dead in redundant {
            let last = FaceId::new(self.face_count() - 1);
            self.delete_face(dead)?;
            for survivor in &mut survivors {
                if *survivor == last {
                    *survivor = dead;
                }
            }
        }

        self.link_opposite_faces(survivors[0], survivors[1])
    }

    /// Makes `first` the first edge of `face` and assigns its whole loop to `face`.
    fn relabel_face_loop(&mut self, first: EdgeId<I>, face: FaceId<I>) {
        let topo = &mut self.mesh.topology;
        topo.set_first_face_edge(face, first);
        let mut e = first;
        loop {
            topo.set_adjacent_face(e, face);
            e = topo.next_face_edge(e);
            if e == first {
                break;
            }
        }
    }
}
