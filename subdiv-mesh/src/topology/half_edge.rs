//! The half-edge record and the unordered edge key.
use bytemuck::{Pod, Zeroable};
use derive_more::{Display, From, Into};

/// Sentinel stored in [`HalfEdge::opposite`] for boundary half-edges.
pub const INVALID_INDEX: u32 = u32::MAX;

/// A 64 bit identifier that is the same for both directions of an edge.
///
/// The larger of the two vertex ids lives in the high 32 bits, so `(a, b)` and
/// `(b, a)` produce the same key.
///
/// ```
/// # use subdiv_mesh::topology::EdgeKey;
/// assert_eq!(EdgeKey::new(1, 2), EdgeKey::new(2, 1));
/// assert_eq!(u64::from(EdgeKey::new(1, 2)), (2u64 << 32) | 1);
/// ```
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
#[display("EdgeKey({_0:#018x})")]
pub struct EdgeKey(u64);

impl EdgeKey {
    #[inline]
    pub fn new(v0: u32, v1: u32) -> Self {
        let (high, low) = if v0 < v1 { (v1, v0) } else { (v0, v1) };
        EdgeKey(((high as u64) << 32) | low as u64)
    }

    /// Returns the two vertex ids, larger one first.
    #[inline]
    pub fn vertices(&self) -> (u32, u32) {
        ((self.0 >> 32) as u32, self.0 as u32)
    }
}

/// One directed step around the boundary of a face.
///
/// All links are absolute indices into the half-edge arena of a
/// [`HalfEdgeTopology`](super::HalfEdgeTopology).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct HalfEdge {
    /// The vertex this half-edge starts at.
    pub origin: u32,
    /// The face this half-edge bounds.
    pub face: u32,
    /// The next half-edge in the face cycle.
    pub next: u32,
    /// The previous half-edge in the face cycle.
    pub prev: u32,
    /// The twin on the adjacent face or [`INVALID_INDEX`] on a boundary.
    pub opposite: u32,
    /// Tessellation level of the edge, already clamped.
    pub edge_level: f32,
    /// Crease sharpness of the edge. Boundary edges are infinitely sharp
    /// unless the boundary mode discards boundary faces.
    pub edge_crease_weight: f32,
    /// Crease sharpness of the origin vertex.
    pub vertex_crease_weight: f32,
}

impl HalfEdge {
    #[inline]
    pub fn is_boundary(&self) -> bool {
        INVALID_INDEX == self.opposite
    }

    #[inline]
    pub fn has_opposite(&self) -> bool {
        !self.is_boundary()
    }

    #[inline]
    pub fn opposite(&self) -> Option<usize> {
        if self.is_boundary() {
            None
        } else {
            Some(self.opposite as usize)
        }
    }

    #[inline]
    pub fn next(&self) -> usize {
        self.next as usize
    }

    #[inline]
    pub fn prev(&self) -> usize {
        self.prev as usize
    }

    /// Returns `true` if the edge or its origin vertex carries a crease.
    #[inline]
    pub fn has_crease(&self) -> bool {
        (0.0 < self.edge_crease_weight && !self.is_boundary()) || 0.0 < self.vertex_crease_weight
    }
}

/// Classification of a face for the evaluation engine.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchType {
    /// Four interior vertices of valence four and no creases.
    Quad,
    /// A quad with at least one extraordinary, boundary or creased corner.
    IrregularQuad,
    Triangle,
    /// Any other arity.
    Polygon,
    /// The face is invalid in every time step.
    Invalid,
}
