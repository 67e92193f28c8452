//! Per-edge tessellation levels.
use crate::BufferView;

/// Lower bound every edge level is clamped to.
pub const MIN_EDGE_LEVEL: f32 = 1.0;

/// Upper bound every edge level is clamped to.
// FIXME: Is a hard upper limit what we want? Kept for parity with the level
// range renderers expect.
pub const MAX_EDGE_LEVEL: f32 = 4096.0;

/// Where the tessellation level of a half-edge comes from.
///
/// Out-of-range values are clamped to
/// [`MIN_EDGE_LEVEL`]`..=`[`MAX_EDGE_LEVEL`], never rejected.
///
/// ```
/// # use subdiv_mesh::topology::EdgeLevels;
/// assert_eq!(EdgeLevels::Constant(-1.0).level(0), 1.0);
/// assert_eq!(EdgeLevels::Constant(5000.0).level(0), 4096.0);
/// assert_eq!(EdgeLevels::Constant(7.5).level(0), 7.5);
/// ```
#[derive(Debug, Clone, Copy)]
pub enum EdgeLevels<'a> {
    /// One level per half-edge, in vertex index buffer order.
    Buffer(BufferView<'a, f32>),
    /// The same rate for every edge.
    Constant(f32),
}

impl EdgeLevels<'_> {
    /// Returns the clamped level of half-edge `half_edge`.
    ///
    /// A buffer that is too short yields [`MIN_EDGE_LEVEL`] for the missing
    /// entries.
    #[inline]
    pub fn level(&self, half_edge: usize) -> f32 {
        let level = match self {
            EdgeLevels::Buffer(levels) => levels.get(half_edge).unwrap_or(MIN_EDGE_LEVEL),
            EdgeLevels::Constant(rate) => *rate,
        };
        clamp_level(level)
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self, EdgeLevels::Constant(_))
    }
}

impl Default for EdgeLevels<'_> {
    fn default() -> Self {
        EdgeLevels::Constant(MIN_EDGE_LEVEL)
    }
}

#[inline]
fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        MIN_EDGE_LEVEL
    } else {
        level.clamp(MIN_EDGE_LEVEL, MAX_EDGE_LEVEL)
    }
}
