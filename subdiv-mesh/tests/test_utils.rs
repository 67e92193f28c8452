#![allow(dead_code)]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use subdiv_mesh::{
    cache::{
        BilinearEvaluator, BilinearPatch, Derivatives, EvalWidth, PatchEvaluator, PatchRequest,
    },
    Error, Result,
};

/// Two triangles sharing the edge (1, 2).
pub static TWO_TRIANGLE_COUNTS: [u32; 2] = [3, 3];
pub static TWO_TRIANGLE_INDICES: [u32; 6] = [0, 1, 2, 1, 3, 2];
pub static TWO_TRIANGLE_POSITIONS: [[f32; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 2.0],
];

/// A unit cube with consistently oriented quads.
pub static CUBE_COUNTS: [u32; 6] = [4; 6];
#[rustfmt::skip]
pub static CUBE_INDICES: [u32; 24] = [
    0, 1, 3, 2,
    2, 3, 5, 4,
    4, 5, 7, 6,
    6, 7, 1, 0,
    1, 7, 5, 3,
    6, 0, 2, 4,
];

/// The unit square.
pub static QUAD_POSITIONS: [[f32; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
];

/// Faces of an `n` × `n` quad grid wrapped into a torus. Every vertex has
/// valence four.
pub fn torus(n: u32) -> (Vec<u32>, Vec<u32>) {
    let vertex = |i: u32, j: u32| (i % n) * n + j % n;
    let indices = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .flat_map(|(i, j)| {
            [
                vertex(i, j),
                vertex(i + 1, j),
                vertex(i + 1, j + 1),
                vertex(i, j + 1),
            ]
        })
        .collect();
    (vec![4; (n * n) as usize], indices)
}

/// Wraps the bilinear engine, counting patch builds and failing on demand.
#[derive(Debug, Default)]
pub struct CountingEvaluator {
    inner: BilinearEvaluator,
    pub builds: AtomicUsize,
    pub recycled: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingEvaluator {
    pub fn new(width: EvalWidth) -> Self {
        Self {
            inner: BilinearEvaluator::new(width),
            ..Default::default()
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl PatchEvaluator for CountingEvaluator {
    type Patch = BilinearPatch;

    fn width(&self) -> EvalWidth {
        self.inner.width()
    }

    fn build_patch(
        &self,
        request: &PatchRequest<'_>,
        recycled: Option<BilinearPatch>,
    ) -> Result<BilinearPatch> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if recycled.is_some() {
            self.recycled.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Evaluation("forced failure".to_string()));
        }
        self.inner.build_patch(request, recycled)
    }

    fn evaluate(&self, patch: &BilinearPatch, u: f32, v: f32, out: &mut Derivatives<'_>) {
        self.inner.evaluate(patch, u, v, out)
    }
}

pub fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-6, "{:?} != {:?}", actual, expected);
    }
}
