//! Error types for the subdiv-mesh crate.
//!
//! Only buffer-shape problems supplied by the caller are errors. Defects that
//! are local to a face (degenerate cycles, out-of-range vertex indices,
//! non-manifold edges) are contained during construction and reported through
//! [`TopologyReport`](crate::topology::TopologyReport) instead.

use thiserror::Error;

/// Main error type for subdiv-mesh operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The topology buffers do not describe a mesh.
    #[error("Invalid topology descriptor: {0}")]
    InvalidTopology(String),

    /// Index out of bounds.
    #[error("Index {index} out of bounds (max: {max})")]
    IndexOutOfBounds { index: usize, max: usize },

    /// Invalid buffer size.
    #[error("Invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    /// A buffer view whose stride or offset cannot address its elements.
    #[error("Invalid buffer view: {0}")]
    InvalidBufferView(String),

    /// At least one vertex buffer (time step) is required.
    #[error("A mesh needs at least one vertex buffer")]
    MissingVertexBuffer,

    /// A time step that the mesh does not have.
    #[error("Time step {time_step} out of range ({time_steps} time steps)")]
    TimeStepOutOfRange { time_step: usize, time_steps: usize },

    /// An interpolation slot past the slot count of the source buffer.
    #[error("Interpolation slot {slot} out of range ({slots} slots)")]
    SlotOutOfRange { slot: usize, slots: usize },

    /// A user buffer slot that was never set.
    #[error("User buffer {0} is not set")]
    UserBufferNotSet(usize),

    /// The primitive is flagged invalid and cannot be evaluated.
    #[error("Primitive {0} is invalid")]
    InvalidPrimitive(usize),

    /// The evaluation engine could not produce patch data.
    #[error("Patch evaluation failed: {0}")]
    Evaluation(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an [`Error::IndexOutOfBounds`] when `index >= len`.
    pub fn check_index(index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(Error::IndexOutOfBounds {
                index,
                max: len.saturating_sub(1),
            })
        }
    }

    /// Create an [`Error::InvalidBufferSize`] when `actual != expected`.
    pub fn check_len(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Error::InvalidBufferSize { expected, actual })
        }
    }
}
