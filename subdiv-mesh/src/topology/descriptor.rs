//! A container holding references to raw topology data.
//!
//! ## Example
//! ```
//! # use subdiv_mesh::topology::TopologyDescriptor;
//! // Describe the basic topology of a tetrahedron.
//! let mut tetrahedron = TopologyDescriptor::new(
//!     4,
//!     // Four triangles.
//!     &[3; 4],
//!     // Vertex indices for each triangle.
//!     &[2, 1, 0, 3, 2, 0, 1, 3, 0, 2, 3, 1],
//! );
//!
//! // Make all edges creased with sharpness 8.0.
//! tetrahedron.creases(&[0, 2, 0, 3, 1, 3, 0, 1, 2, 3, 1, 2], &[8.0; 6]);
//! assert!(tetrahedron.validate().is_ok());
//! ```
//!
//! ## Semi-Sharp Creases
//! Edges and vertices can carry a sharpness value that locally sharpens the
//! subdivided surface. A value of 0 has no effect, a value of 10 or more makes
//! the feature completely sharp. Values in between give semi-sharp features
//! akin to fillets without adding extra rows of vertices.
//!
//! Creases that reference vertices or edges the mesh does not contain are
//! not an error; they never match anything during topology construction.
use crate::{Error, Result};

/// Borrowed flat buffers describing the faces, creases and holes of a mesh.
///
/// Nothing is checked when the descriptor is assembled; the buffer shapes are
/// checked once by [`validate()`](TopologyDescriptor::validate()) when a
/// [`TopologyBuilder`](super::TopologyBuilder) or
/// [`SubdivMesh`](crate::SubdivMesh) is created from it. Per-face defects
/// such as out-of-range vertex indices are tolerated and only invalidate the
/// affected face.
#[derive(Debug, Clone, Copy)]
pub struct TopologyDescriptor<'a> {
    pub(crate) vertex_count: usize,
    pub(crate) face_vertex_counts: &'a [u32],
    pub(crate) vertex_indices: &'a [u32],
    pub(crate) crease_pairs: &'a [u32],
    pub(crate) crease_weights: &'a [f32],
    pub(crate) corner_vertices: &'a [u32],
    pub(crate) corner_weights: &'a [f32],
    pub(crate) holes: &'a [u32],
}

impl<'a> TopologyDescriptor<'a> {
    /// Describes a mesh topology.
    ///
    /// # Arguments
    ///
    /// * `vertex_count` - The number of vertices in the mesh.
    /// * `face_vertex_counts` - The number of vertices for each face in the
    ///   mesh. The length of this is the number of faces in the mesh.
    /// * `vertex_indices` - A flat list of the vertex indices for each face in
    ///   the mesh.
    #[inline]
    pub fn new(
        vertex_count: usize,
        face_vertex_counts: &'a [u32],
        vertex_indices: &'a [u32],
    ) -> TopologyDescriptor<'a> {
        TopologyDescriptor {
            vertex_count,
            face_vertex_counts,
            vertex_indices,
            crease_pairs: &[],
            crease_weights: &[],
            corner_vertices: &[],
            corner_weights: &[],
            holes: &[],
        }
    }

    /// Add creases as vertex index pairs with corresponding sharpness.
    #[inline]
    pub fn creases(&mut self, creases: &'a [u32], sharpness: &'a [f32]) -> &mut Self {
        self.crease_pairs = creases;
        self.crease_weights = sharpness;
        self
    }

    /// Add corners (vertex creases) as vertex indices with corresponding
    /// sharpness.
    #[inline]
    pub fn corners(&mut self, corners: &'a [u32], sharpness: &'a [f32]) -> &mut Self {
        self.corner_vertices = corners;
        self.corner_weights = sharpness;
        self
    }

    /// Add holes as face indices.
    #[inline]
    pub fn holes(&mut self, holes: &'a [u32]) -> &mut Self {
        self.holes = holes;
        self
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }

    /// Returns the per-face vertex counts.
    #[inline]
    pub fn face_vertex_counts(&self) -> &'a [u32] {
        self.face_vertex_counts
    }

    /// Returns the flat vertex index buffer.
    #[inline]
    pub fn vertex_indices(&self) -> &'a [u32] {
        self.vertex_indices
    }

    #[inline]
    pub fn hole_faces(&self) -> &'a [u32] {
        self.holes
    }

    /// Returns `true` if any edge or vertex crease was given.
    #[inline]
    pub fn has_creases(&self) -> bool {
        !self.crease_weights.is_empty() || !self.corner_weights.is_empty()
    }

    /// Checks the shapes of the buffers.
    ///
    /// The number of vertex indices must equal the sum of the face arities and
    /// every crease buffer must have one weight per entry. Out-of-range vertex
    /// indices are *not* rejected here.
    pub fn validate(&self) -> Result<()> {
        let arity_sum = self
            .face_vertex_counts
            .iter()
            .map(|&count| count as usize)
            .sum::<usize>();
        if self.vertex_indices.len() != arity_sum {
            return Err(Error::InvalidTopology(format!(
                "The number of vertex indices ({}) is not equal to the sum of face arities ({}).",
                self.vertex_indices.len(),
                arity_sum
            )));
        }

        if u32::MAX as usize <= arity_sum {
            return Err(Error::InvalidTopology(format!(
                "{} half-edges exceed the 32 bit index range.",
                arity_sum
            )));
        }

        if 0 != self.crease_pairs.len() % 2 {
            return Err(Error::InvalidTopology(format!(
                "The crease buffer holds {} indices, which is not a list of pairs.",
                self.crease_pairs.len()
            )));
        }
        Error::check_len(self.crease_pairs.len() / 2, self.crease_weights.len())?;
        Error::check_len(self.corner_vertices.len(), self.corner_weights.len())?;

        Ok(())
    }
}
