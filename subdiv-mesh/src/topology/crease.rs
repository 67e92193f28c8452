//! Lookup maps for semi-sharp creases.
//!
//! Sharpness values range from 0–10, with a value of 0 (or less) having no
//! effect on the surface and a value of 10 (or more) making the feature
//! completely sharp. Entries that name vertices or edges the mesh does not
//! have are accepted and simply never matched.
use std::collections::HashMap;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::EdgeKey;
use crate::{Error, Result};

/// Vertex crease and edge crease weights of a mesh, keyed by vertex id and by
/// [`EdgeKey`].
#[derive(Debug, Clone, Default)]
pub struct CreaseRegistry {
    vertex_creases: HashMap<u32, f32>,
    edge_creases: HashMap<EdgeKey, f32>,
}

impl CreaseRegistry {
    /// Collects crease weights from flat buffers.
    ///
    /// # Arguments
    ///
    /// * `edge_pairs` - Vertex index pairs, two entries per creased edge.
    /// * `edge_weights` - One sharpness per pair.
    /// * `vertices` - Creased (corner) vertices.
    /// * `vertex_weights` - One sharpness per creased vertex.
    ///
    /// Later entries for the same vertex or edge overwrite earlier ones. The
    /// parallel collection keeps input order when it extends the maps, so this
    /// holds with the `rayon` feature too.
    pub fn new(
        edge_pairs: &[u32],
        edge_weights: &[f32],
        vertices: &[u32],
        vertex_weights: &[f32],
    ) -> Result<Self> {
        if 0 != edge_pairs.len() % 2 {
            return Err(Error::InvalidTopology(format!(
                "The edge crease buffer holds {} indices, which is not a list of pairs.",
                edge_pairs.len()
            )));
        }
        Error::check_len(edge_pairs.len() / 2, edge_weights.len())?;
        Error::check_len(vertices.len(), vertex_weights.len())?;

        #[cfg(feature = "rayon")]
        let (vertex_creases, edge_creases) = (
            vertices
                .par_iter()
                .copied()
                .zip(vertex_weights.par_iter().copied())
                .collect(),
            edge_pairs
                .par_chunks_exact(2)
                .map(|pair| EdgeKey::new(pair[0], pair[1]))
                .zip(edge_weights.par_iter().copied())
                .collect(),
        );

        #[cfg(not(feature = "rayon"))]
        let (vertex_creases, edge_creases) = (
            vertices
                .iter()
                .copied()
                .zip(vertex_weights.iter().copied())
                .collect(),
            edge_pairs
                .chunks_exact(2)
                .map(|pair| EdgeKey::new(pair[0], pair[1]))
                .zip(edge_weights.iter().copied())
                .collect(),
        );

        Ok(Self {
            vertex_creases,
            edge_creases,
        })
    }

    /// Returns the sharpness of an edge or `0.0` if it is not creased.
    #[inline]
    pub fn edge_weight(&self, key: EdgeKey) -> f32 {
        self.edge_creases.get(&key).copied().unwrap_or(0.0)
    }

    /// Returns the sharpness of a vertex or `0.0` if it is not creased.
    #[inline]
    pub fn vertex_weight(&self, vertex: u32) -> f32 {
        self.vertex_creases.get(&vertex).copied().unwrap_or(0.0)
    }

    /// Returns the number of distinct creased edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_creases.len()
    }

    /// Returns the number of distinct creased vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_creases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edge_creases.is_empty() && self.vertex_creases.is_empty()
    }
}
