//! The mesh a renderer talks to.
//!
//! A [`SubdivMesh`] borrows the application's buffers, owns the half-edge
//! topology built from them and the [`PatchCache`] of evaluated patches, and
//! routes buffer mutations through an [`UpdateDetector`].
use std::sync::Arc;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    cache::{CacheTable, Derivatives, EvalWidth, PatchCache, PatchEvaluator, PatchRequest},
    topology::{
        BoundaryMode, EdgeLevels, HalfEdge, HalfEdgeTopology, PatchType, TopologyBuilder,
        TopologyDescriptor, TopologyReport,
    },
    update::{BufferKind, UpdateDetector, UpdatePlan},
    BoundingBox, BufferView, Error, Result,
};

/// Number of user attribute buffers a mesh can carry.
pub const USER_BUFFER_COUNT: usize = 2;

/// Options of a [`SubdivMesh`].
///
/// # Examples
///
/// ```
/// use subdiv_mesh::{cache::EvalWidth, topology::BoundaryMode, SubdivMeshOptions};
///
/// let options = SubdivMeshOptions {
///     boundary_mode: BoundaryMode::EdgeAndCorner,
///     tessellation_rate: 4.0,
///     ..Default::default()
/// };
/// assert_eq!(options.eval_width, EvalWidth::Four);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SubdivMeshOptions {
    pub boundary_mode: BoundaryMode,
    /// Level of every edge when no level buffer is set.
    pub tessellation_rate: f32,
    /// Must match the width of the evaluator.
    pub eval_width: EvalWidth,
}

impl Default for SubdivMeshOptions {
    /// Create options with the following defaults:
    ///
    /// | Property            | Value                                    |
    /// |---------------------|------------------------------------------|
    /// | `boundary_mode`     | [`EdgeOnly`](BoundaryMode::EdgeOnly)     |
    /// | `tessellation_rate` | `1.0`                                    |
    /// | `eval_width`        | [`Four`](EvalWidth::Four)                |
    fn default() -> Self {
        Self {
            boundary_mode: BoundaryMode::EdgeOnly,
            tessellation_rate: 1.0,
            eval_width: EvalWidth::Four,
        }
    }
}

/// A parametric location on one primitive.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SurfacePoint {
    pub primitive: usize,
    pub u: f32,
    pub v: f32,
}

/// A subdivision mesh over caller-owned buffers.
///
/// Mutations take `&mut self` and are applied by [`commit()`](Self::commit).
/// Queries and evaluation take `&self`, so any number of threads can fetch
/// patches at once while no mutation can overlap them.
///
/// ## Example
/// ```
/// use subdiv_mesh::{
///     cache::{BilinearEvaluator, CacheTable, Derivatives},
///     topology::TopologyDescriptor,
///     BufferView, SubdivMesh, SubdivMeshOptions,
/// };
///
/// let positions: [[f32; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
/// let descriptor = TopologyDescriptor::new(4, &[4], &[0, 1, 2, 3]);
///
/// let mesh = SubdivMesh::new(
///     descriptor,
///     &[BufferView::from_slice(&positions)],
///     SubdivMeshOptions::default(),
///     BilinearEvaluator::default(),
/// )?;
///
/// let mut p = [0.0f32; 3];
/// mesh.interpolate(0, 0.5, 0.5, CacheTable::Vertex(0), &mut Derivatives::value(&mut p))?;
/// assert_eq!(p, [0.5, 0.5, 0.0]);
/// # Ok::<(), subdiv_mesh::Error>(())
/// ```
pub struct SubdivMesh<'a, E: PatchEvaluator> {
    descriptor: TopologyDescriptor<'a>,
    vertex_buffers: Vec<BufferView<'a, [f32; 3]>>,
    user_buffers: [Option<BufferView<'a, f32>>; USER_BUFFER_COUNT],
    levels: Option<BufferView<'a, f32>>,
    options: SubdivMeshOptions,
    evaluator: E,
    topology: HalfEdgeTopology,
    cache: PatchCache<E::Patch>,
    updates: UpdateDetector,
}

impl<'a, E: PatchEvaluator> SubdivMesh<'a, E> {
    /// Builds the topology and an empty patch cache.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Faces, creases and holes.
    /// * `vertex_buffers` - One position buffer per time step; at least one.
    /// * `options` - See [`SubdivMeshOptions`].
    /// * `evaluator` - The engine run on cache misses.
    pub fn new(
        descriptor: TopologyDescriptor<'a>,
        vertex_buffers: &[BufferView<'a, [f32; 3]>],
        options: SubdivMeshOptions,
        evaluator: E,
    ) -> Result<Self> {
        if vertex_buffers.is_empty() {
            return Err(Error::MissingVertexBuffer);
        }
        if evaluator.width() != options.eval_width {
            return Err(Error::Evaluation(format!(
                "The evaluator works on {} lanes but the mesh was set up for {}.",
                evaluator.width().lanes(),
                options.eval_width.lanes()
            )));
        }

        let topology = build_topology(
            descriptor,
            vertex_buffers,
            EdgeLevels::Constant(options.tessellation_rate),
            options.boundary_mode,
        )?;

        let mut mesh = Self {
            descriptor,
            vertex_buffers: vertex_buffers.to_vec(),
            user_buffers: [None; USER_BUFFER_COUNT],
            levels: None,
            options,
            evaluator,
            topology,
            cache: PatchCache::default(),
            updates: UpdateDetector::new(),
        };
        mesh.reset_cache_layout();
        Ok(mesh)
    }
}

/// ### Queries
impl<'a, E: PatchEvaluator> SubdivMesh<'a, E> {
    /// Returns the number of primitives (faces), holes and invalid faces
    /// included.
    #[inline]
    pub fn len(&self) -> usize {
        self.topology.face_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }

    #[inline]
    pub fn time_steps(&self) -> usize {
        self.vertex_buffers.len()
    }

    /// Returns conservative bounds of the patch of `primitive` in
    /// `time_step`.
    pub fn bounds(&self, primitive: usize, time_step: usize) -> Result<BoundingBox> {
        Error::check_index(primitive, self.len())?;
        let positions = self.vertex_buffer(time_step)?;
        Ok(self.topology.face_bounds(primitive, positions))
    }

    /// Returns `true` if `primitive` is valid in every time step.
    #[inline]
    pub fn is_valid(&self, primitive: usize) -> bool {
        self.topology.is_valid_in_all_time_steps(primitive)
    }

    #[inline]
    pub fn is_valid_at(&self, primitive: usize, time_step: usize) -> bool {
        self.topology.is_valid_at(primitive, time_step)
    }

    /// Returns the number of faces that are invalid in at least one time
    /// step.
    #[inline]
    pub fn invalid_face_count(&self) -> usize {
        self.topology.report().invalid_faces
    }

    #[inline]
    pub fn face_half_edge(&self, face: usize) -> Option<&HalfEdge> {
        self.topology.face_half_edge(face)
    }

    pub fn vertex_buffer(&self, time_step: usize) -> Result<&BufferView<'a, [f32; 3]>> {
        self.vertex_buffers
            .get(time_step)
            .ok_or(Error::TimeStepOutOfRange {
                time_step,
                time_steps: self.vertex_buffers.len(),
            })
    }

    pub fn user_buffer(&self, buffer: usize) -> Option<&BufferView<'a, f32>> {
        self.user_buffers.get(buffer).and_then(Option::as_ref)
    }

    /// Returns the clamped tessellation level stored on half-edge
    /// `half_edge`.
    #[inline]
    pub fn edge_level(&self, half_edge: usize) -> Option<f32> {
        self.topology.half_edge(half_edge).map(|h| h.edge_level)
    }

    /// Returns `true` if the last commit only changed tessellation levels.
    #[inline]
    pub fn is_level_update(&self) -> bool {
        self.updates.is_level_update()
    }

    #[inline]
    pub fn topology(&self) -> &HalfEdgeTopology {
        &self.topology
    }

    #[inline]
    pub fn report(&self) -> &TopologyReport {
        self.topology.report()
    }

    /// Returns the patch cache, e.g. to hand it to a consumer that fetches
    /// on its own or to read its statistics.
    #[inline]
    pub fn cache(&self) -> &PatchCache<E::Patch> {
        &self.cache
    }

    #[inline]
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    #[inline]
    pub fn options(&self) -> &SubdivMeshOptions {
        &self.options
    }

    /// Checks that valid faces only reference existing vertices and that
    /// the half-edge arena is consistent.
    #[cfg(feature = "topology_validation")]
    pub fn verify(&self) -> Result<()> {
        let vertex_count = self.descriptor.vertex_count();
        for face in (0..self.len()).filter(|&face| PatchType::Invalid != self.topology.patch_type(face)) {
            for vertex in self.topology.face_vertices(face) {
                Error::check_index(vertex as usize, vertex_count)?;
            }
        }
        self.topology.check_invariants()
    }
}

/// ### Mutations
///
/// Setters only record what changed; [`commit()`](Self::commit) applies it.
impl<'a, E: PatchEvaluator> SubdivMesh<'a, E> {
    /// Replaces the positions of `time_step`.
    pub fn set_vertex_buffer(&mut self, time_step: usize, positions: BufferView<'a, [f32; 3]>) -> Result<()> {
        let time_steps = self.time_steps();
        let slot = self
            .vertex_buffers
            .get_mut(time_step)
            .ok_or(Error::TimeStepOutOfRange {
                time_step,
                time_steps,
            })?;
        *slot = positions;
        self.updates.record(BufferKind::Vertices);
        Ok(())
    }

    /// Sets a per-half-edge level buffer, or falls back to the constant
    /// tessellation rate with `None`. The buffer must hold one level per
    /// half-edge when the change is committed.
    pub fn set_levels(&mut self, levels: Option<BufferView<'a, f32>>) {
        self.levels = levels;
        self.updates.record(BufferKind::Levels);
    }

    pub fn set_tessellation_rate(&mut self, rate: f32) {
        self.options.tessellation_rate = rate;
        self.updates.record(BufferKind::Levels);
    }

    pub fn set_boundary_mode(&mut self, boundary_mode: BoundaryMode) {
        self.options.boundary_mode = boundary_mode;
        self.updates.record(BufferKind::BoundaryMode);
    }

    /// Replaces faces, creases and holes. Buffer shapes are checked right
    /// away.
    pub fn set_topology(&mut self, descriptor: TopologyDescriptor<'a>) -> Result<()> {
        descriptor.validate()?;
        self.descriptor = descriptor;
        for kind in [
            BufferKind::FaceVertexCounts,
            BufferKind::VertexIndices,
            BufferKind::EdgeCreases,
            BufferKind::VertexCreases,
            BufferKind::Holes,
        ] {
            self.updates.record(kind);
        }
        Ok(())
    }

    /// Sets or clears user attribute buffer `buffer`. One record per vertex;
    /// the stride must be a multiple of 4 bytes.
    pub fn set_user_buffer(&mut self, buffer: usize, data: Option<BufferView<'a, f32>>) -> Result<()> {
        Error::check_index(buffer, USER_BUFFER_COUNT)?;
        if let Some(data) = &data {
            if 0 != data.stride() % 4 {
                return Err(Error::InvalidBufferView(format!(
                    "user data stride {} is not a whole number of floats",
                    data.stride()
                )));
            }
            if data.len() < self.descriptor.vertex_count() {
                return Err(Error::InvalidBufferSize {
                    expected: self.descriptor.vertex_count(),
                    actual: data.len(),
                });
            }
        }
        self.user_buffers[buffer] = data;
        self.updates.record(BufferKind::UserData);
        Ok(())
    }

    /// Notifies the mesh that the contents of a buffer changed in place.
    #[inline]
    pub fn update_buffer(&mut self, kind: BufferKind) {
        self.updates.record(kind);
    }

    /// Marks every buffer as changed.
    #[inline]
    pub fn update(&mut self) {
        self.updates.record_all();
    }

    /// Applies the recorded changes along the cheapest sufficient path.
    ///
    /// On error the previous topology stays in place and the recorded
    /// changes stay pending, so the next commit after fixing the input
    /// applies all of them.
    pub fn commit(&mut self) -> Result<UpdatePlan> {
        let plan = self.updates.plan(self.topology.has_creases());
        log::debug!("Committing mesh changes: {:?}.", plan);

        match plan {
            UpdatePlan::Nothing => {}
            UpdatePlan::CacheOnly => {
                self.reset_cache_layout();
                self.cache.invalidate_levels_only();
            }
            UpdatePlan::LevelsOnly => {
                let levels = self.edge_levels();
                self.topology.refresh_levels(&levels)?;
                self.reset_cache_layout();
                self.cache.invalidate_levels_only();
            }
            UpdatePlan::Rebuild => self.rebuild_topology()?,
        }

        self.updates.applied(plan);
        Ok(plan)
    }

    /// Rebuilds the topology and invalidates every cached patch, whatever
    /// was recorded.
    pub fn rebuild(&mut self) -> Result<()> {
        self.updates.record_all();
        self.commit().map(|_| ())
    }

    fn rebuild_topology(&mut self) -> Result<()> {
        self.topology = build_topology(
            self.descriptor,
            &self.vertex_buffers,
            self.edge_levels(),
            self.options.boundary_mode,
        )?;
        self.cache.invalidate_topology();
        self.reset_cache_layout();
        Ok(())
    }

    fn reset_cache_layout(&mut self) {
        let (primitives, vertex_slots, user_slots) = (self.len(), self.vertex_slots(), self.user_slots());
        self.cache.reset_layout(primitives, &vertex_slots, &user_slots);
    }

    fn edge_levels(&self) -> EdgeLevels<'a> {
        match self.levels {
            Some(levels) => EdgeLevels::Buffer(levels),
            None => EdgeLevels::Constant(self.options.tessellation_rate),
        }
    }

    fn vertex_slots(&self) -> Vec<usize> {
        let width = self.options.eval_width.lanes();
        self.vertex_buffers
            .iter()
            .map(|positions| positions.slot_count(width))
            .collect()
    }

    fn user_slots(&self) -> Vec<usize> {
        let width = self.options.eval_width.lanes();
        self.user_buffers
            .iter()
            .map(|data| data.map_or(0, |data| data.slot_count(width)))
            .collect()
    }
}

/// ### Evaluation
impl<'a, E: PatchEvaluator> SubdivMesh<'a, E> {
    /// Returns the patch of `(primitive, time_step, slot)` from the cache,
    /// evaluating it on a miss.
    pub fn fetch(&self, primitive: usize, time_step: usize, slot: usize) -> Result<Arc<E::Patch>> {
        self.fetch_slot(CacheTable::Vertex(time_step), primitive, slot)
    }

    /// Returns the patch of slot `slot` of user buffer `buffer`.
    pub fn fetch_user(&self, primitive: usize, buffer: usize, slot: usize) -> Result<Arc<E::Patch>> {
        self.fetch_slot(CacheTable::User(buffer), primitive, slot)
    }

    /// Evaluates every slot of `source` on `primitive` at `(u, v)`.
    ///
    /// The outputs hold one float per 4 bytes of the source stride; slot `s`
    /// fills the lanes starting at `s * width`.
    pub fn interpolate(
        &self,
        primitive: usize,
        u: f32,
        v: f32,
        source: CacheTable,
        out: &mut Derivatives<'_>,
    ) -> Result<()> {
        let width = self.options.eval_width.lanes();
        for slot in 0..self.cache.slots(source)? {
            let patch = self.fetch_slot(source, primitive, slot)?;
            let first = slot * width;
            self.evaluator
                .evaluate(&patch, u, v, &mut out.lanes(first..first + width));
        }
        Ok(())
    }

    /// Evaluates the values of `source` at many points. `p` receives one
    /// record of [`record_floats()`](Self::record_floats) floats per point.
    ///
    /// With a `valid` mask, points whose flag is `false` are skipped and
    /// their records in `p` are left untouched. The mask needs one flag per
    /// point.
    pub fn interpolate_n(
        &self,
        source: CacheTable,
        points: &[SurfacePoint],
        valid: Option<&[bool]>,
        p: &mut [f32],
    ) -> Result<()> {
        let floats = self.record_floats(source)?;
        if 0 == floats {
            return Err(Error::InvalidBufferView(
                "records of the source buffer hold no float".to_string(),
            ));
        }
        Error::check_len(points.len() * floats, p.len())?;
        if let Some(valid) = valid {
            Error::check_len(points.len(), valid.len())?;
        }

        let evaluate = |(out, (index, point)): (&mut [f32], (usize, &SurfacePoint))| {
            if valid.is_some_and(|valid| !valid[index]) {
                return Ok(());
            }
            self.interpolate(
                point.primitive,
                point.u,
                point.v,
                source,
                &mut Derivatives::value(out),
            )
        };

        #[cfg(feature = "rayon")]
        let result = p
            .par_chunks_mut(floats)
            .zip(points.par_iter().enumerate())
            .try_for_each(evaluate);
        #[cfg(not(feature = "rayon"))]
        let result = p
            .chunks_mut(floats)
            .zip(points.iter().enumerate())
            .try_for_each(evaluate);

        result
    }

    /// Returns the number of floats in one record of `source`.
    pub fn record_floats(&self, source: CacheTable) -> Result<usize> {
        match source {
            CacheTable::Vertex(time_step) => Ok(self.vertex_buffer(time_step)?.stride() / 4),
            CacheTable::User(buffer) => self
                .user_buffer(buffer)
                .map(|data| data.stride() / 4)
                .ok_or(Error::UserBufferNotSet(buffer)),
        }
    }

    fn fetch_slot(&self, table: CacheTable, primitive: usize, slot: usize) -> Result<Arc<E::Patch>> {
        Error::check_index(primitive, self.len())?;
        let width = self.options.eval_width.lanes();

        let (time_step, source) = match table {
            CacheTable::Vertex(time_step) => {
                let positions = self.vertex_buffer(time_step)?;
                if !self.topology.is_valid_at(primitive, time_step) {
                    return Err(Error::InvalidPrimitive(primitive));
                }
                (time_step, positions.slot_source(slot, width)?)
            }
            CacheTable::User(buffer) => {
                let data = self.user_buffer(buffer).ok_or(Error::UserBufferNotSet(buffer))?;
                if PatchType::Invalid == self.topology.patch_type(primitive) {
                    return Err(Error::InvalidPrimitive(primitive));
                }
                (0, data.slot_source(slot, width)?)
            }
        };

        let request = PatchRequest {
            topology: &self.topology,
            face: primitive,
            time_step,
            slot,
            source,
        };
        self.cache.fetch(table, primitive, slot, |recycled| {
            self.evaluator.build_patch(&request, recycled)
        })
    }
}

fn build_topology(
    descriptor: TopologyDescriptor<'_>,
    vertex_buffers: &[BufferView<'_, [f32; 3]>],
    levels: EdgeLevels<'_>,
    boundary_mode: BoundaryMode,
) -> Result<HalfEdgeTopology> {
    TopologyBuilder::new(descriptor)
        .boundary_mode(boundary_mode)
        .positions(vertex_buffers)
        .levels(levels)
        .build()
}
