//! Error types for crystmesh.
//!
//! This module defines all error types used throughout the library.
//!
//! Errors fall into two groups. Contract violations ([`MeshError::InvalidIndex`],
//! [`MeshError::DegenerateFace`], property access errors) indicate a bug in the
//! calling code. Data errors ([`MeshError::SingularCell`],
//! [`MeshError::InconsistentOppositeFace`], [`MeshError::UnresolvedEdgeMatch`],
//! [`MeshError::BurgersVectorMismatch`], ...) can be caused by imported data and
//! allow the owning pipeline stage to abort a single evaluation.

use nalgebra::Vector3;
use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// The kind of mesh element an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Mesh vertices.
    Vertex,
    /// Half-edges.
    Edge,
    /// Faces.
    Face,
    /// Regions (crystallites, grains).
    Region,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
            ElementKind::Face => "face",
            ElementKind::Region => "region",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during mesh operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// An index lies outside the current element range.
    #[error("{kind} index {index} is out of range (count = {count})")]
    InvalidIndex {
        /// Kind of element that was indexed.
        kind: ElementKind,
        /// The offending index.
        index: usize,
        /// Number of elements of that kind.
        count: usize,
    },

    /// A face or segment was requested with too few distinct vertices.
    #[error("degenerate face with {vertices} distinct vertices")]
    DegenerateFace {
        /// Number of distinct vertices supplied.
        vertices: usize,
    },

    /// The simulation cell matrix cannot be inverted.
    #[error("simulation cell matrix is singular")]
    SingularCell,

    /// An opposite-face or opposite-edge relation is inconsistent.
    #[error("face {face} is inconsistently linked to its opposite face")]
    InconsistentOppositeFace {
        /// The face whose link is broken.
        face: usize,
    },

    /// The periodic repair pass could not find a partner edge among the image copies.
    #[error("no matching partner found for half-edge {edge} among periodic images")]
    UnresolvedEdgeMatch {
        /// The half-edge whose partner could not be resolved.
        edge: usize,
    },

    /// Two dislocation arms meeting at a 2-node do not conserve the Burgers vector.
    #[error("Burgers vector not conserved at vertex {vertex}: {first:?} vs {second:?}")]
    BurgersVectorMismatch {
        /// The 2-node.
        vertex: usize,
        /// Burgers vector of the first arm's face.
        first: Vector3<f64>,
        /// Burgers vector of the second arm's face.
        second: Vector3<f64>,
    },

    /// The dislocation network cannot be traced into consistent lines.
    #[error("invalid dislocation network topology at half-edge {edge}")]
    InvalidNetworkTopology {
        /// The half-edge at which the contradiction was detected.
        edge: usize,
    },

    /// The operation requires a simulation cell but the mesh has none.
    #[error("mesh is not embedded in a simulation cell")]
    MissingDomain,

    /// No property with the given key exists for the element kind.
    #[error("{kind} property '{key}' does not exist")]
    PropertyNotFound {
        /// Element kind that was queried.
        kind: ElementKind,
        /// Property key.
        key: String,
    },

    /// A property exists but stores a different value type.
    #[error("{kind} property '{key}' stores {actual}, not {requested}")]
    PropertyTypeMismatch {
        /// Element kind that was queried.
        kind: ElementKind,
        /// Property key.
        key: String,
        /// Stored value type.
        actual: &'static str,
        /// Requested value type.
        requested: &'static str,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create an out-of-range index error.
    pub fn invalid_index(kind: ElementKind, index: usize, count: usize) -> Self {
        MeshError::InvalidIndex { kind, index, count }
    }

    /// Returns true for errors that can originate from imported data rather than
    /// from a bug in the calling code.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            MeshError::SingularCell
                | MeshError::InconsistentOppositeFace { .. }
                | MeshError::UnresolvedEdgeMatch { .. }
                | MeshError::BurgersVectorMismatch { .. }
                | MeshError::InvalidNetworkTopology { .. }
                | MeshError::MissingDomain
        )
    }
}
