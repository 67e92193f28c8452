//! The seam between the patch cache and the engine that evaluates patches.
//!
//! The cache never evaluates anything itself. On a miss it hands a
//! [`PatchRequest`] to a [`PatchEvaluator`], stores the opaque patch the
//! engine returns and later asks the engine to evaluate that patch at
//! parametric coordinates.
//!
//! The vector width of the engine is a value, [`EvalWidth`], fixed when the
//! mesh is created. It decides how many float lanes of a vertex record one
//! interpolation slot covers.
use num_enum::TryFromPrimitive;
use std::ops::Range;

use crate::{buffer::SlotSource, topology::HalfEdgeTopology, Error, Result};

/// Number of float lanes an engine evaluates at once.
#[repr(u32)]
#[derive(TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EvalWidth {
    Four = 4,
    Eight = 8,
}

impl EvalWidth {
    #[inline]
    pub fn lanes(&self) -> usize {
        *self as usize
    }
}

impl Default for EvalWidth {
    fn default() -> Self {
        EvalWidth::Four
    }
}

/// Everything an engine gets to build the patch of one cache entry.
#[derive(Debug, Clone, Copy)]
pub struct PatchRequest<'r> {
    pub topology: &'r HalfEdgeTopology,
    pub face: usize,
    /// The vertex time step, or `0` for user buffers.
    pub time_step: usize,
    pub slot: usize,
    /// The float lanes of the slot, for every vertex.
    pub source: SlotSource<'r>,
}

impl PatchRequest<'_> {
    /// Returns the vertex indices of the requested face in cycle order.
    pub fn face_vertices(&self) -> impl Iterator<Item = u32> + '_ {
        self.topology.face_vertices(self.face)
    }
}

/// Output buffers of an evaluation. Any of them may be left out.
///
/// Every present buffer receives one float per lane, starting at index `0`.
#[derive(Debug, Default)]
pub struct Derivatives<'o> {
    pub p: Option<&'o mut [f32]>,
    pub dp_du: Option<&'o mut [f32]>,
    pub dp_dv: Option<&'o mut [f32]>,
    pub dp_dudu: Option<&'o mut [f32]>,
    pub dp_dvdv: Option<&'o mut [f32]>,
    pub dp_dudv: Option<&'o mut [f32]>,
}

impl<'o> Derivatives<'o> {
    /// Requests only the value.
    pub fn value(p: &'o mut [f32]) -> Self {
        Self {
            p: Some(p),
            ..Default::default()
        }
    }

    /// Requests the value and the first derivatives.
    pub fn first_order(p: &'o mut [f32], dp_du: &'o mut [f32], dp_dv: &'o mut [f32]) -> Self {
        Self {
            p: Some(p),
            dp_du: Some(dp_du),
            dp_dv: Some(dp_dv),
            ..Default::default()
        }
    }

    /// Returns the outputs restricted to `lanes`. Buffers shorter than the
    /// range are clipped.
    pub fn lanes(&mut self, lanes: Range<usize>) -> Derivatives<'_> {
        Derivatives {
            p: clip(&mut self.p, &lanes),
            dp_du: clip(&mut self.dp_du, &lanes),
            dp_dv: clip(&mut self.dp_dv, &lanes),
            dp_dudu: clip(&mut self.dp_dudu, &lanes),
            dp_dvdv: clip(&mut self.dp_dvdv, &lanes),
            dp_dudv: clip(&mut self.dp_dudv, &lanes),
        }
    }
}

#[inline]
fn clip<'b>(buffer: &'b mut Option<&mut [f32]>, lanes: &Range<usize>) -> Option<&'b mut [f32]> {
    buffer.as_deref_mut().map(|buffer| {
        let end = lanes.end.min(buffer.len());
        let start = lanes.start.min(end);
        &mut buffer[start..end]
    })
}

/// An evaluation engine.
///
/// Implementations must be shareable between the threads that fetch from a
/// mesh concurrently.
pub trait PatchEvaluator: Send + Sync {
    /// The opaque per-entry result stored by the cache.
    type Patch: Send + Sync;

    fn width(&self) -> EvalWidth;

    /// Builds the patch for one cache entry.
    ///
    /// `recycled` is the stale patch the entry held before, if no reader
    /// still shares it; its allocations may be reused.
    fn build_patch(
        &self,
        request: &PatchRequest<'_>,
        recycled: Option<Self::Patch>,
    ) -> Result<Self::Patch>;

    /// Evaluates `patch` at `(u, v)` into the requested outputs.
    fn evaluate(&self, patch: &Self::Patch, u: f32, v: f32, out: &mut Derivatives<'_>);
}

/// The corner data of one face slot, as built by [`BilinearEvaluator`].
#[derive(Debug, Clone, PartialEq)]
pub struct BilinearPatch {
    corners: Vec<f32>,
    corner_count: usize,
    lanes: usize,
}

impl BilinearPatch {
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.corner_count
    }

    #[inline]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Returns the slot lanes of corner `corner`.
    #[inline]
    pub fn corner(&self, corner: usize) -> &[f32] {
        &self.corners[corner * self.lanes..(corner + 1) * self.lanes]
    }
}

/// A reference engine that interpolates the corners of a face linearly.
///
/// Quads are interpolated bilinearly with the corners in cycle order at
/// `(0, 0)`, `(1, 0)`, `(1, 1)` and `(0, 1)`. Triangles are interpolated
/// barycentrically with `(u, v)` weighting the second and third corner.
/// Other arities are not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct BilinearEvaluator {
    width: EvalWidth,
}

impl BilinearEvaluator {
    pub fn new(width: EvalWidth) -> Self {
        Self { width }
    }
}

impl PatchEvaluator for BilinearEvaluator {
    type Patch = BilinearPatch;

    fn width(&self) -> EvalWidth {
        self.width
    }

    fn build_patch(
        &self,
        request: &PatchRequest<'_>,
        recycled: Option<BilinearPatch>,
    ) -> Result<BilinearPatch> {
        let corner_count = request.topology.face_vertex_count(request.face);
        if !(3..=4).contains(&corner_count) {
            return Err(Error::Evaluation(format!(
                "Face {} has {} vertices; only triangles and quads can be interpolated.",
                request.face, corner_count
            )));
        }

        let lanes = request.source.lane_count();
        if 0 == lanes {
            return Err(Error::Evaluation(format!(
                "Slot {} of face {} carries no float lanes.",
                request.slot, request.face
            )));
        }
        let mut corners = recycled.map(|patch| patch.corners).unwrap_or_default();
        corners.clear();
        corners.resize(corner_count * lanes, 0.0);

        for (vertex, corner) in request.face_vertices().zip(corners.chunks_exact_mut(lanes)) {
            request.source.read(vertex as usize, corner)?;
        }

        Ok(BilinearPatch {
            corners,
            corner_count,
            lanes,
        })
    }

    fn evaluate(&self, patch: &BilinearPatch, u: f32, v: f32, out: &mut Derivatives<'_>) {
        let lanes = patch.lanes;
        let p = |corner: usize, lane: usize| patch.corners[corner * lanes + lane];

        if 3 == patch.corner_count {
            let w = 1.0 - u - v;
            write(&mut out.p, lanes, |l| w * p(0, l) + u * p(1, l) + v * p(2, l));
            write(&mut out.dp_du, lanes, |l| p(1, l) - p(0, l));
            write(&mut out.dp_dv, lanes, |l| p(2, l) - p(0, l));
            write(&mut out.dp_dudv, lanes, |_| 0.0);
        } else {
            write(&mut out.p, lanes, |l| {
                (1.0 - u) * (1.0 - v) * p(0, l)
                    + u * (1.0 - v) * p(1, l)
                    + u * v * p(2, l)
                    + (1.0 - u) * v * p(3, l)
            });
            write(&mut out.dp_du, lanes, |l| {
                (1.0 - v) * (p(1, l) - p(0, l)) + v * (p(2, l) - p(3, l))
            });
            write(&mut out.dp_dv, lanes, |l| {
                (1.0 - u) * (p(3, l) - p(0, l)) + u * (p(2, l) - p(1, l))
            });
            write(&mut out.dp_dudv, lanes, |l| p(0, l) - p(1, l) + p(2, l) - p(3, l));
        }
        write(&mut out.dp_dudu, lanes, |_| 0.0);
        write(&mut out.dp_dvdv, lanes, |_| 0.0);
    }
}

#[inline]
fn write(out: &mut Option<&mut [f32]>, lanes: usize, value: impl Fn(usize) -> f32) {
    if let Some(out) = out {
        out.iter_mut()
            .take(lanes)
            .enumerate()
            .for_each(|(lane, out)| *out = value(lane));
    }
}
