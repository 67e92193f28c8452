//! Construction of a [`HalfEdgeTopology`] from flat face buffers.
//!
//! The build runs in these phases:
//!
//! 1. A prefix sum over the face arities yields the face start table.
//! 2. One half-edge per face corner is written, faces in parallel.
//! 3. Every well-formed face contributes one `(EdgeKey, half-edge)` record
//!    per edge; the records are radix sorted by key.
//! 4. Runs of equal keys are paired into twins, left as boundary or flagged
//!    as non-manifold.
//! 5. Crease weights and boundary sharpness are written per face.
//! 6. Validity is decided per face and time step.
//!
//! Defects local to a face never abort the build. They invalidate the face
//! and are counted in the [`TopologyReport`].
use itertools::Itertools;
use num_enum::TryFromPrimitive;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{
    CreaseRegistry, EdgeKey, EdgeLevels, HalfEdge, HalfEdgeTopology, HoleSet, PatchType,
    TopologyDescriptor, TopologyReport, INVALID_INDEX,
};
use crate::{BufferView, Error, Result};

/// Vertex positions with a coordinate magnitude above this invalidate the
/// faces using them.
pub const MAX_COORDINATE: f32 = 1.8e19;

/// Policy for faces that touch the border of an open mesh.
#[repr(u32)]
#[derive(TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BoundaryMode {
    /// Faces with a boundary edge are not rendered. Their vertices still
    /// support the adjacent interior faces.
    None = 0,
    /// Boundary edges are infinitely sharp; the limit surface extends to a
    /// smooth boundary curve.
    EdgeOnly = 1,
    /// Like [`EdgeOnly`](BoundaryMode::EdgeOnly), and vertices with exactly
    /// one incident face are made infinitely sharp corners.
    EdgeAndCorner = 2,
}

impl Default for BoundaryMode {
    fn default() -> Self {
        BoundaryMode::EdgeOnly
    }
}

impl BoundaryMode {
    /// Returns `true` if faces touching a border may be rendered.
    #[inline]
    pub fn allows_borders(&self) -> bool {
        BoundaryMode::None != *self
    }
}

/// Turns a [`TopologyDescriptor`] into a [`HalfEdgeTopology`].
///
/// ## Example
/// ```
/// # use subdiv_mesh::topology::{BoundaryMode, TopologyBuilder, TopologyDescriptor};
/// // Two triangles sharing the edge (1, 2).
/// let descriptor = TopologyDescriptor::new(4, &[3, 3], &[0, 1, 2, 1, 3, 2]);
///
/// let topology = TopologyBuilder::new(descriptor)
///     .boundary_mode(BoundaryMode::EdgeOnly)
///     .build()
///     .unwrap();
///
/// assert_eq!(topology.half_edge_count(), 6);
/// assert_eq!(topology.report().boundary_half_edges, 4);
/// assert!(topology.is_valid(0) && topology.is_valid(1));
/// ```
#[derive(Debug, Clone)]
pub struct TopologyBuilder<'a> {
    descriptor: TopologyDescriptor<'a>,
    boundary_mode: BoundaryMode,
    time_steps: usize,
    positions: &'a [BufferView<'a, [f32; 3]>],
    levels: EdgeLevels<'a>,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(descriptor: TopologyDescriptor<'a>) -> Self {
        Self {
            descriptor,
            boundary_mode: BoundaryMode::default(),
            time_steps: 1,
            positions: &[],
            levels: EdgeLevels::default(),
        }
    }

    #[inline]
    pub fn boundary_mode(&mut self, boundary_mode: BoundaryMode) -> &mut Self {
        self.boundary_mode = boundary_mode;
        self
    }

    /// Sets the number of time steps when no positions are given.
    #[inline]
    pub fn time_steps(&mut self, time_steps: usize) -> &mut Self {
        self.time_steps = time_steps;
        self
    }

    /// Supplies one position buffer per time step. Faces using a non-finite
    /// or huge position are invalidated in that time step only.
    #[inline]
    pub fn positions(&mut self, positions: &'a [BufferView<'a, [f32; 3]>]) -> &mut Self {
        self.time_steps = positions.len();
        self.positions = positions;
        self
    }

    #[inline]
    pub fn levels(&mut self, levels: EdgeLevels<'a>) -> &mut Self {
        self.levels = levels;
        self
    }

    /// Runs the build.
    ///
    /// Only buffer shape mismatches are errors: see
    /// [`TopologyDescriptor::validate()`], a level buffer whose length is not
    /// the half-edge count, a position buffer shorter than the vertex count
    /// or zero time steps.
    pub fn build(&self) -> Result<HalfEdgeTopology> {
        let descriptor = &self.descriptor;
        descriptor.validate()?;

        if 0 == self.time_steps {
            return Err(Error::MissingVertexBuffer);
        }
        for positions in self.positions {
            if positions.len() < descriptor.vertex_count {
                return Err(Error::InvalidBufferSize {
                    expected: descriptor.vertex_count,
                    actual: positions.len(),
                });
            }
        }

        let half_edge_count = descriptor.vertex_indices.len();
        if let EdgeLevels::Buffer(levels) = &self.levels {
            Error::check_len(half_edge_count, levels.len())?;
        }

        let creases = CreaseRegistry::new(
            descriptor.crease_pairs,
            descriptor.crease_weights,
            descriptor.corner_vertices,
            descriptor.corner_weights,
        )?;
        let holes = HoleSet::new(descriptor.holes, descriptor.face_count());

        let face_start_edge = face_start_table(descriptor.face_vertex_counts);
        let defects = classify_faces(descriptor, &face_start_edge);

        let mut half_edges = fill_arena(descriptor, &face_start_edge, &self.levels);

        let mut keys = edge_keys(descriptor, &face_start_edge, &defects);
        let mut scratch = Vec::new();
        radix_sort(&mut keys, &mut scratch);
        drop(scratch);

        let non_manifold = link_twins(&keys, &mut half_edges, descriptor.face_count());
        drop(keys);

        let incident = incident_faces(&half_edges, descriptor.vertex_count);
        apply_creases(
            &mut half_edges,
            &face_start_edge,
            &creases,
            &incident,
            self.boundary_mode,
        );

        let invalid_face = self.validity(
            &half_edges,
            &face_start_edge,
            &defects,
            &non_manifold.faces,
            &holes,
        );

        let report = TopologyReport {
            faces: descriptor.face_count(),
            half_edges: half_edge_count,
            boundary_half_edges: half_edges.iter().filter(|h| h.is_boundary()).count(),
            non_manifold_edges: non_manifold.edges,
            degenerate_faces: defects
                .iter()
                .filter(|&&d| FaceDefect::Degenerate == d)
                .count(),
            out_of_range_faces: defects
                .iter()
                .filter(|&&d| FaceDefect::OutOfRange == d)
                .count(),
            hole_faces: holes.len(),
            invalid_faces: invalid_face
                .chunks_exact(self.time_steps)
                .filter(|flags| flags.iter().any(|&invalid| invalid))
                .count(),
        };

        let mut topology = HalfEdgeTopology {
            half_edges,
            face_start_edge,
            invalid_face,
            patch_types: Vec::new(),
            boundary_mode: self.boundary_mode,
            time_steps: self.time_steps,
            has_creases: descriptor.has_creases(),
            report,
        };
        topology.patch_types = (0..topology.face_count())
            .map(|face| classify_patch(&topology, face))
            .collect();

        #[cfg(feature = "topology_validation")]
        topology.check_invariants()?;

        log::debug!(
            "Built half-edge topology: {} faces, {} half-edges, {} boundary half-edges, {} time step(s).",
            report.faces,
            report.half_edges,
            report.boundary_half_edges,
            self.time_steps
        );
        if 0 < report.non_manifold_edges {
            log::warn!(
                "{} non-manifold edge(s); the faces using them were invalidated.",
                report.non_manifold_edges
            );
        }
        if !report.is_clean() {
            log::warn!(
                "Mesh has {} invalid face(s) ({} degenerate, {} out of range, {} hole(s)).",
                report.invalid_faces,
                report.degenerate_faces,
                report.out_of_range_faces,
                report.hole_faces
            );
        }

        Ok(topology)
    }

    /// Flags `(face, time_step)` pairs, laid out `face * time_steps + t`.
    fn validity(
        &self,
        half_edges: &[HalfEdge],
        face_start_edge: &[u32],
        defects: &[FaceDefect],
        non_manifold: &[bool],
        holes: &HoleSet,
    ) -> Vec<bool> {
        let time_steps = self.time_steps;
        let face_count = defects.len();
        let mut invalid_face = vec![false; face_count * time_steps];

        let flag_face = |(face, flags): (usize, &mut [bool])| {
            let cycle = &half_edges[face_start_edge[face] as usize..face_start_edge[face + 1] as usize];
            let topology_invalid = holes.contains(face)
                || FaceDefect::Sound != defects[face]
                || non_manifold[face]
                || (!self.boundary_mode.allows_borders() && cycle.iter().any(HalfEdge::is_boundary));

            for (time_step, invalid) in flags.iter_mut().enumerate() {
                *invalid = topology_invalid
                    || self.positions.get(time_step).is_some_and(|positions| {
                        cycle.iter().any(|half_edge| {
                            positions
                                .get(half_edge.origin as usize)
                                .is_none_or(|position| !is_valid_position(position))
                        })
                    });
            }
        };

        #[cfg(feature = "rayon")]
        invalid_face
            .par_chunks_mut(time_steps)
            .enumerate()
            .for_each(flag_face);

        #[cfg(not(feature = "rayon"))]
        invalid_face
            .chunks_mut(time_steps)
            .enumerate()
            .for_each(flag_face);

        invalid_face
    }
}

#[inline]
fn is_valid_position(position: [f32; 3]) -> bool {
    position
        .iter()
        .all(|coordinate| coordinate.is_finite() && coordinate.abs() <= MAX_COORDINATE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaceDefect {
    Sound,
    /// Fewer than three vertices or a repeated vertex.
    Degenerate,
    /// A vertex index past the vertex count.
    OutOfRange,
}

fn face_start_table(face_vertex_counts: &[u32]) -> Vec<u32> {
    std::iter::once(0)
        .chain(face_vertex_counts.iter().scan(0u32, |start, &count| {
            *start += count;
            Some(*start)
        }))
        .collect()
}

#[inline]
fn face_indices<'a>(descriptor: &TopologyDescriptor<'a>, face_start_edge: &[u32], face: usize) -> &'a [u32] {
    &descriptor.vertex_indices[face_start_edge[face] as usize..face_start_edge[face + 1] as usize]
}

fn classify_faces(descriptor: &TopologyDescriptor<'_>, face_start_edge: &[u32]) -> Vec<FaceDefect> {
    let classify = |face: usize| {
        let indices = face_indices(descriptor, face_start_edge, face);
        if indices
            .iter()
            .any(|&vertex| descriptor.vertex_count <= vertex as usize)
        {
            FaceDefect::OutOfRange
        } else if indices.len() < 3 || !indices.iter().all_unique() {
            FaceDefect::Degenerate
        } else {
            FaceDefect::Sound
        }
    };

    #[cfg(feature = "rayon")]
    let defects = (0..descriptor.face_count()).into_par_iter().map(classify).collect();
    #[cfg(not(feature = "rayon"))]
    let defects = (0..descriptor.face_count()).map(classify).collect();

    defects
}

/// Writes the half-edges of every face with their in-face links. Twins are
/// linked later.
fn fill_arena(
    descriptor: &TopologyDescriptor<'_>,
    face_start_edge: &[u32],
    levels: &EdgeLevels<'_>,
) -> Vec<HalfEdge> {
    let face_cycle = |face: usize| {
        let start = face_start_edge[face];
        let count = face_start_edge[face + 1] - start;
        face_indices(descriptor, face_start_edge, face)
            .iter()
            .enumerate()
            .map(move |(local, &origin)| {
                let local = local as u32;
                let index = start + local;
                HalfEdge {
                    origin,
                    face: face as u32,
                    next: start + (local + 1) % count,
                    prev: start + (local + count - 1) % count,
                    opposite: INVALID_INDEX,
                    edge_level: levels.level(index as usize),
                    edge_crease_weight: 0.0,
                    vertex_crease_weight: 0.0,
                }
            })
    };

    #[cfg(feature = "rayon")]
    let half_edges = (0..descriptor.face_count())
        .into_par_iter()
        .flat_map_iter(face_cycle)
        .collect();
    #[cfg(not(feature = "rayon"))]
    let half_edges = (0..descriptor.face_count()).flat_map(face_cycle).collect();

    half_edges
}

/// A sort record: the unordered key of an edge and the half-edge that
/// references it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct KeyHalfEdge {
    key: u64,
    half_edge: u32,
}

/// Collects one record per edge of every sound face. Malformed faces do not
/// take part in pairing.
fn edge_keys(
    descriptor: &TopologyDescriptor<'_>,
    face_start_edge: &[u32],
    defects: &[FaceDefect],
) -> Vec<KeyHalfEdge> {
    let face_keys = |face: usize| {
        let start = face_start_edge[face];
        let indices = if FaceDefect::Sound == defects[face] {
            face_indices(descriptor, face_start_edge, face)
        } else {
            &[]
        };
        indices
            .iter()
            .circular_tuple_windows()
            .enumerate()
            .map(move |(local, (&v0, &v1))| KeyHalfEdge {
                key: EdgeKey::new(v0, v1).into(),
                half_edge: start + local as u32,
            })
    };

    #[cfg(feature = "rayon")]
    let keys = (0..descriptor.face_count())
        .into_par_iter()
        .flat_map_iter(face_keys)
        .collect();
    #[cfg(not(feature = "rayon"))]
    let keys = (0..descriptor.face_count()).flat_map(face_keys).collect();

    keys
}

const RADIX_BITS: u32 = 8;
const RADIX_BUCKETS: usize = 1 << RADIX_BITS;

#[inline]
fn digit(key: u64, shift: u32) -> usize {
    (key >> shift) as usize & (RADIX_BUCKETS - 1)
}

#[cfg(feature = "rayon")]
fn digit_histogram(keys: &[KeyHalfEdge], shift: u32) -> [usize; RADIX_BUCKETS] {
    const CHUNK: usize = 1 << 14;
    keys.par_chunks(CHUNK)
        .fold(
            || [0usize; RADIX_BUCKETS],
            |mut histogram, chunk| {
                for record in chunk {
                    histogram[digit(record.key, shift)] += 1;
                }
                histogram
            },
        )
        .reduce(
            || [0usize; RADIX_BUCKETS],
            |mut total, partial| {
                total
                    .iter_mut()
                    .zip(partial)
                    .for_each(|(total, partial)| *total += partial);
                total
            },
        )
}

#[cfg(not(feature = "rayon"))]
fn digit_histogram(keys: &[KeyHalfEdge], shift: u32) -> [usize; RADIX_BUCKETS] {
    let mut histogram = [0usize; RADIX_BUCKETS];
    for record in keys {
        histogram[digit(record.key, shift)] += 1;
    }
    histogram
}

/// Stable LSD radix sort of `keys` by key, ping-ponging between `keys` and
/// `scratch`. Passes where every record has the same digit are skipped.
fn radix_sort(keys: &mut Vec<KeyHalfEdge>, scratch: &mut Vec<KeyHalfEdge>) {
    scratch.clear();
    scratch.resize(keys.len(), KeyHalfEdge::default());

    for pass in 0..u64::BITS / RADIX_BITS {
        let shift = pass * RADIX_BITS;
        let histogram = digit_histogram(keys, shift);
        if histogram.iter().any(|&count| count == keys.len()) {
            continue;
        }

        let mut offsets = [0usize; RADIX_BUCKETS];
        let mut start = 0;
        for (offset, count) in offsets.iter_mut().zip(histogram) {
            *offset = start;
            start += count;
        }

        for record in keys.iter() {
            let bucket = &mut offsets[digit(record.key, shift)];
            scratch[*bucket] = *record;
            *bucket += 1;
        }
        std::mem::swap(keys, scratch);
    }
}

#[derive(Debug)]
enum EdgeRun<'k> {
    Boundary,
    Twins(u32, u32),
    NonManifold(&'k [KeyHalfEdge]),
}

fn classify_run<'k>(run: &'k [KeyHalfEdge], half_edges: &[HalfEdge]) -> EdgeRun<'k> {
    match run {
        [_] => EdgeRun::Boundary,
        [a, b] if half_edges[a.half_edge as usize].origin != half_edges[b.half_edge as usize].origin => {
            EdgeRun::Twins(a.half_edge, b.half_edge)
        }
        // Same direction twice means the faces disagree on orientation.
        _ => EdgeRun::NonManifold(run),
    }
}

struct NonManifold {
    edges: usize,
    faces: Vec<bool>,
}

/// Scans the sorted records for runs of equal keys and links twins.
fn link_twins(keys: &[KeyHalfEdge], half_edges: &mut [HalfEdge], face_count: usize) -> NonManifold {
    let same_key = |a: &KeyHalfEdge, b: &KeyHalfEdge| a.key == b.key;
    let arena: &[HalfEdge] = half_edges;

    #[cfg(feature = "rayon")]
    let runs: Vec<EdgeRun<'_>> = keys
        .par_chunk_by(same_key)
        .map(|run| classify_run(run, arena))
        .collect();
    #[cfg(not(feature = "rayon"))]
    let runs: Vec<EdgeRun<'_>> = keys
        .chunk_by(same_key)
        .map(|run| classify_run(run, arena))
        .collect();

    let mut non_manifold = NonManifold {
        edges: 0,
        faces: vec![false; face_count],
    };
    for run in runs {
        match run {
            EdgeRun::Boundary => {}
            EdgeRun::Twins(a, b) => {
                half_edges[a as usize].opposite = b;
                half_edges[b as usize].opposite = a;
            }
            EdgeRun::NonManifold(records) => {
                non_manifold.edges += 1;
                for record in records {
                    non_manifold.faces[half_edges[record.half_edge as usize].face as usize] = true;
                }
            }
        }
    }
    non_manifold
}

/// Splits the arena into one mutable slice per face.
fn face_slices_mut<'h>(mut half_edges: &'h mut [HalfEdge], face_start_edge: &[u32]) -> Vec<&'h mut [HalfEdge]> {
    face_start_edge
        .windows(2)
        .map(|bounds| {
            let (face, rest) = std::mem::take(&mut half_edges).split_at_mut((bounds[1] - bounds[0]) as usize);
            half_edges = rest;
            face
        })
        .collect()
}

/// Counts the face corners at each vertex. Out-of-range origins are skipped.
fn incident_faces(half_edges: &[HalfEdge], vertex_count: usize) -> Vec<u32> {
    let mut incident = vec![0u32; vertex_count];
    for half_edge in half_edges {
        if let Some(count) = incident.get_mut(half_edge.origin as usize) {
            *count += 1;
        }
    }
    incident
}

fn apply_creases(
    half_edges: &mut [HalfEdge],
    face_start_edge: &[u32],
    creases: &CreaseRegistry,
    incident: &[u32],
    boundary_mode: BoundaryMode,
) {
    let crease_face = |face: &mut [HalfEdge]| {
        let count = face.len();
        for local in 0..count {
            let end = face[(local + 1) % count].origin;
            let prev_is_boundary = face[(local + count - 1) % count].is_boundary();

            let half_edge = &mut face[local];
            half_edge.edge_crease_weight = if half_edge.is_boundary() && boundary_mode.allows_borders() {
                f32::INFINITY
            } else {
                creases.edge_weight(EdgeKey::new(half_edge.origin, end))
            };
            // A corner has both of its edges on the boundary and no other
            // face around it; a bowtie vertex is not a corner.
            let is_corner = half_edge.is_boundary()
                && prev_is_boundary
                && Some(&1) == incident.get(half_edge.origin as usize);
            half_edge.vertex_crease_weight =
                if BoundaryMode::EdgeAndCorner == boundary_mode && is_corner {
                    f32::INFINITY
                } else {
                    creases.vertex_weight(half_edge.origin)
                };
        }
    };

    let faces = face_slices_mut(half_edges, face_start_edge);

    #[cfg(feature = "rayon")]
    faces.into_par_iter().for_each(crease_face);
    #[cfg(not(feature = "rayon"))]
    faces.into_iter().for_each(crease_face);
}

fn classify_patch(topology: &HalfEdgeTopology, face: usize) -> PatchType {
    if !(0..topology.time_steps()).any(|time_step| topology.is_valid_at(face, time_step)) {
        return PatchType::Invalid;
    }

    match topology.face_vertex_count(face) {
        3 => PatchType::Triangle,
        4 => {
            let regular = topology.face_half_edges(face).all(|corner| {
                let half_edge = &topology.half_edges()[corner];
                let (ring, closed) = topology.vertex_ring(corner);
                !half_edge.is_boundary() && !half_edge.has_crease() && closed && 4 == ring.len()
            });
            if regular {
                PatchType::Quad
            } else {
                PatchType::IrregularQuad
            }
        }
        _ => PatchType::Polygon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(keys: &[u64]) -> Vec<KeyHalfEdge> {
        keys.iter()
            .enumerate()
            .map(|(half_edge, &key)| KeyHalfEdge {
                key,
                half_edge: half_edge as u32,
            })
            .collect()
    }

    #[test]
    fn radix_sort_matches_stable_sort() {
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let keys = (0..5000)
            .map(|_| {
                // xorshift, folded onto few distinct keys to get long runs.
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                u64::from(EdgeKey::new((state % 97) as u32, (state >> 32) as u32 % 89))
            })
            .collect::<Vec<u64>>();

        let mut sorted = records(&keys);
        radix_sort(&mut sorted, &mut Vec::new());

        let mut expected = records(&keys);
        expected.sort_by_key(|record| record.key);

        assert_eq!(sorted, expected);
    }

    #[test]
    fn radix_sort_handles_constant_and_empty_input() {
        let mut sorted = records(&[7, 7, 7]);
        radix_sort(&mut sorted, &mut Vec::new());
        assert_eq!(sorted, records(&[7, 7, 7]));

        let mut empty = Vec::new();
        radix_sort(&mut empty, &mut Vec::new());
        assert!(empty.is_empty());
    }

    #[test]
    fn face_start_table_is_a_prefix_sum() {
        assert_eq!(face_start_table(&[3, 4, 0, 5]), vec![0, 3, 7, 7, 12]);
        assert_eq!(face_start_table(&[]), vec![0]);
    }

    #[test]
    fn runs_are_classified_by_length_and_direction() {
        let descriptor = TopologyDescriptor::new(3, &[2, 2], &[0, 1, 1, 0]);
        let face_start_edge = face_start_table(descriptor.face_vertex_counts);
        let half_edges = fill_arena(&descriptor, &face_start_edge, &EdgeLevels::default());

        let key = u64::from(EdgeKey::new(0, 1));
        let twins = [
            KeyHalfEdge { key, half_edge: 0 },
            KeyHalfEdge { key, half_edge: 2 },
        ];
        assert!(matches!(classify_run(&twins, &half_edges), EdgeRun::Twins(0, 2)));

        let same_direction = [
            KeyHalfEdge { key, half_edge: 0 },
            KeyHalfEdge { key, half_edge: 3 },
        ];
        assert!(matches!(
            classify_run(&same_direction, &half_edges),
            EdgeRun::NonManifold(_)
        ));
        assert!(matches!(classify_run(&twins[..1], &half_edges), EdgeRun::Boundary));
    }
}
