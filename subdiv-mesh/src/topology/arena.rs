//! The built half-edge structure and queries on it.
use std::ops::Range;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{BoundaryMode, EdgeLevels, HalfEdge, PatchType};
use crate::{BoundingBox, BufferView, Error, Result};

/// Aggregate status of a topology build.
///
/// Per-face defects never abort construction; they are counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologyReport {
    pub faces: usize,
    pub half_edges: usize,
    /// Half-edges without a twin (this includes half-edges of non-manifold
    /// edges and of malformed faces).
    pub boundary_half_edges: usize,
    /// Edges referenced by more than two half-edges or by two half-edges with
    /// the same direction.
    pub non_manifold_edges: usize,
    /// Faces with fewer than three vertices or a repeated vertex.
    pub degenerate_faces: usize,
    /// Faces referencing a vertex index past the vertex count.
    pub out_of_range_faces: usize,
    pub hole_faces: usize,
    /// Faces that are invalid in at least one time step.
    pub invalid_faces: usize,
}

impl TopologyReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        0 == self.invalid_faces
    }
}

/// Half-edge arena, face lookup table and validity flags of a mesh.
///
/// Created by a [`TopologyBuilder`](super::TopologyBuilder). The half-edges
/// of face `f` occupy the contiguous range
/// `face_start_edge(f)..face_start_edge(f + 1)` of the arena, in the order of
/// the face's vertex indices.
#[derive(Debug, Clone)]
pub struct HalfEdgeTopology {
    pub(crate) half_edges: Vec<HalfEdge>,
    pub(crate) face_start_edge: Vec<u32>,
    pub(crate) invalid_face: Vec<bool>,
    pub(crate) patch_types: Vec<PatchType>,
    pub(crate) boundary_mode: BoundaryMode,
    pub(crate) time_steps: usize,
    pub(crate) has_creases: bool,
    pub(crate) report: TopologyReport,
}

/// ### Inventory
impl HalfEdgeTopology {
    #[inline]
    pub fn face_count(&self) -> usize {
        self.face_start_edge.len() - 1
    }

    #[inline]
    pub fn half_edge_count(&self) -> usize {
        self.half_edges.len()
    }

    #[inline]
    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    #[inline]
    pub fn boundary_mode(&self) -> BoundaryMode {
        self.boundary_mode
    }

    /// Returns `true` if the mesh was built with edge or vertex creases.
    #[inline]
    pub fn has_creases(&self) -> bool {
        self.has_creases
    }

    #[inline]
    pub fn report(&self) -> &TopologyReport {
        &self.report
    }

    /// Returns the whole arena.
    #[inline]
    pub fn half_edges(&self) -> &[HalfEdge] {
        &self.half_edges
    }

    #[inline]
    pub fn half_edge(&self, index: usize) -> Option<&HalfEdge> {
        self.half_edges.get(index)
    }
}

/// ### Faces
impl HalfEdgeTopology {
    /// Returns the arena index of the first half-edge of `face`.
    #[inline]
    pub fn face_start_edge(&self, face: usize) -> Option<usize> {
        if face < self.face_count() {
            Some(self.face_start_edge[face] as usize)
        } else {
            None
        }
    }

    /// Returns the first half-edge of `face`, or `None` if the face is out of
    /// range or has no vertices.
    #[inline]
    pub fn face_half_edge(&self, face: usize) -> Option<&HalfEdge> {
        let range = self.face_half_edges(face);
        if range.is_empty() {
            None
        } else {
            self.half_edges.get(range.start)
        }
    }

    /// Returns the arena range holding the half-edges of `face`. Empty for an
    /// out-of-range face.
    #[inline]
    pub fn face_half_edges(&self, face: usize) -> Range<usize> {
        if face < self.face_count() {
            self.face_start_edge[face] as usize..self.face_start_edge[face + 1] as usize
        } else {
            0..0
        }
    }

    #[inline]
    pub fn face_vertex_count(&self, face: usize) -> usize {
        self.face_half_edges(face).len()
    }

    /// Returns the vertex indices of `face` in cycle order.
    pub fn face_vertices(&self, face: usize) -> impl Iterator<Item = u32> + '_ {
        self.half_edges[self.face_half_edges(face)]
            .iter()
            .map(|half_edge| half_edge.origin)
    }

    /// Returns `true` if any half-edge of `face` has no twin.
    #[inline]
    pub fn face_has_border(&self, face: usize) -> bool {
        self.half_edges[self.face_half_edges(face)]
            .iter()
            .any(HalfEdge::is_boundary)
    }

    /// Returns `true` if `face` is valid in the first time step.
    #[inline]
    pub fn is_valid(&self, face: usize) -> bool {
        self.is_valid_at(face, 0)
    }

    /// Returns `true` if `face` is valid in `time_step`. Out-of-range faces
    /// and time steps are never valid.
    #[inline]
    pub fn is_valid_at(&self, face: usize, time_step: usize) -> bool {
        face < self.face_count()
            && time_step < self.time_steps
            && !self.invalid_face[face * self.time_steps + time_step]
    }

    /// Returns `true` if `face` is valid in every time step.
    #[inline]
    pub fn is_valid_in_all_time_steps(&self, face: usize) -> bool {
        (0..self.time_steps).all(|time_step| self.is_valid_at(face, time_step))
    }

    #[inline]
    pub fn patch_type(&self, face: usize) -> PatchType {
        self.patch_types
            .get(face)
            .copied()
            .unwrap_or(PatchType::Invalid)
    }
}

/// ### Vertex neighborhoods
impl HalfEdgeTopology {
    /// Returns the half-edges leaving the origin of `half_edge`, one per
    /// incident face, starting with `half_edge` itself, and whether the fan
    /// around the vertex is closed.
    pub fn vertex_ring(&self, half_edge: usize) -> (Vec<usize>, bool) {
        let mut ring = vec![half_edge];

        // Rotate one way: the twin of the incoming half-edge leaves the same
        // vertex in the neighboring face.
        let mut current = half_edge;
        loop {
            let incoming = self.half_edges[current].prev();
            match self.half_edges[incoming].opposite() {
                Some(outgoing) if outgoing == half_edge => return (ring, true),
                Some(outgoing) if ring.len() < self.half_edges.len() => {
                    ring.push(outgoing);
                    current = outgoing;
                }
                _ => break,
            }
        }

        // Open fan: collect the faces on the other side as well.
        let mut current = half_edge;
        while let Some(twin) = self.half_edges[current].opposite() {
            let outgoing = self.half_edges[twin].next();
            if ring.len() >= self.half_edges.len() || ring.contains(&outgoing) {
                break;
            }
            ring.push(outgoing);
            current = outgoing;
        }
        (ring, false)
    }

    /// Returns the number of edges incident to the origin of `half_edge`.
    pub fn vertex_valence(&self, half_edge: usize) -> usize {
        let (ring, closed) = self.vertex_ring(half_edge);
        if closed {
            ring.len()
        } else {
            ring.len() + 1
        }
    }

    /// Returns conservative bounds of the patch of `face`: every vertex of
    /// every face in the one-ring of the face's corners.
    ///
    /// Vertices missing from `positions` are skipped.
    pub fn face_bounds(&self, face: usize, positions: &BufferView<'_, [f32; 3]>) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for corner in self.face_half_edges(face) {
            let (ring, _) = self.vertex_ring(corner);
            for outgoing in ring {
                let ring_face = self.half_edges[outgoing].face as usize;
                for vertex in self.face_vertices(ring_face) {
                    if let Some(position) = positions.get(vertex as usize) {
                        bounds.extend(position);
                    }
                }
            }
        }
        bounds
    }
}

/// ### Maintenance
impl HalfEdgeTopology {
    /// Rewrites the edge levels of all half-edges. The links of the arena are
    /// not touched.
    pub fn refresh_levels(&mut self, levels: &EdgeLevels<'_>) -> Result<()> {
        if let EdgeLevels::Buffer(buffer) = levels {
            Error::check_len(self.half_edges.len(), buffer.len())?;
        }

        #[cfg(feature = "rayon")]
        self.half_edges
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, half_edge)| half_edge.edge_level = levels.level(index));

        #[cfg(not(feature = "rayon"))]
        self.half_edges
            .iter_mut()
            .enumerate()
            .for_each(|(index, half_edge)| half_edge.edge_level = levels.level(index));

        Ok(())
    }

    /// Checks the structural invariants of the arena:
    ///
    /// * `next` followed *k* times returns to the start of a *k*-gon and
    ///   `prev` undoes `next`.
    /// * `opposite(opposite(e)) == e`, and twins run in opposite directions.
    pub fn check_invariants(&self) -> Result<()> {
        for face in 0..self.face_count() {
            let range = self.face_half_edges(face);
            for start in range.clone() {
                let mut current = start;
                for _ in 0..range.len() {
                    let half_edge = &self.half_edges[current];
                    if half_edge.face as usize != face
                        || self.half_edges[half_edge.next()].prev() != current
                    {
                        return Err(Error::InvalidTopology(format!(
                            "Half-edge {} breaks the cycle of face {}.",
                            current, face
                        )));
                    }
                    current = half_edge.next();
                }
                if current != start {
                    return Err(Error::InvalidTopology(format!(
                        "The cycle of face {} starting at half-edge {} does not close.",
                        face, start
                    )));
                }
            }
        }

        for (index, half_edge) in self.half_edges.iter().enumerate() {
            if let Some(twin) = half_edge.opposite() {
                let other = self.half_edges.get(twin).ok_or(Error::IndexOutOfBounds {
                    index: twin,
                    max: self.half_edges.len().saturating_sub(1),
                })?;
                let end = self.half_edges[half_edge.next()].origin;
                let other_end = self.half_edges[other.next()].origin;
                if other.opposite() != Some(index)
                    || other.origin != end
                    || other_end != half_edge.origin
                {
                    return Err(Error::InvalidTopology(format!(
                        "Half-edges {} and {} are not mutual twins.",
                        index, twin
                    )));
                }
            }
        }

        Ok(())
    }
}
