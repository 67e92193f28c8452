//#![warn(missing_docs)]
//! # Subdivision Surface Mesh Topology & Patch Cache
//!
//! This crate builds and maintains the connectivity of a [subdivision
//! surface](https://en.wikipedia.org/wiki/Subdivision_surface) mesh from
//! flat, application-supplied arrays and caches the results of evaluating
//! that surface.
//!
//! It is split into two subsystems:
//!
//! * [`topology`] turns per-face vertex counts, vertex indices, creases and
//!   holes into a linked half-edge arena. Degenerate faces, out-of-range
//!   indices and non-manifold edges invalidate only the faces they touch.
//! * [`cache`] stores one evaluated patch per primitive, time step and
//!   interpolation slot, tagged with a generation counter, and calls out to
//!   an evaluation engine on a miss.
//!
//! [`SubdivMesh`] ties both together and routes buffer mutations through an
//! [`UpdateDetector`](update::UpdateDetector) so that a change of
//! tessellation levels alone does not rebuild the topology.
//!
//! The code is optimized for meshes with static topology that are evaluated
//! over and over again, e.g. across many rendering passes.
//!
//! ## Example
//! ```
//! use subdiv_mesh::{
//!     cache::BilinearEvaluator, topology::TopologyDescriptor, BufferView, SubdivMesh,
//!     SubdivMeshOptions,
//! };
//!
//! // Two triangles sharing the edge (1, 2).
//! let positions: [[f32; 3]; 4] = [
//!     [0.0, 0.0, 0.0],
//!     [1.0, 0.0, 0.0],
//!     [0.0, 1.0, 0.0],
//!     [1.0, 1.0, 0.0],
//! ];
//! let descriptor = TopologyDescriptor::new(4, &[3, 3], &[0, 1, 2, 1, 3, 2]);
//!
//! let mesh = SubdivMesh::new(
//!     descriptor,
//!     &[BufferView::from_slice(&positions)],
//!     SubdivMeshOptions::default(),
//!     BilinearEvaluator::default(),
//! )?;
//!
//! assert_eq!(mesh.len(), 2);
//! assert!(mesh.is_valid(0) && mesh.is_valid(1));
//! assert_eq!(mesh.report().boundary_half_edges, 4);
//! # Ok::<(), subdiv_mesh::Error>(())
//! ```
//!
//! ## Cargo Features
#![doc = document_features::document_features!()]
//!
//! ## Error Handling
//!
//! Only buffer shapes supplied by the caller are hard errors: wrong array
//! lengths, an odd crease pair buffer, a level buffer that does not have one
//! entry per half-edge, a buffer view that does not fit its memory. Defects
//! local to a face are counted in a
//! [`TopologyReport`](topology::TopologyReport) instead. A failing patch
//! evaluation is returned from that one fetch and retried on the next.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade. Install
//! any logger to see build summaries and cache invalidations (`debug`),
//! per-entry cache misses (`trace`) and meshes with invalid faces (`warn`).

pub mod bounds;
pub mod buffer;
pub mod cache;
pub mod error;
pub mod mesh;
pub mod topology;
pub mod update;

pub use bounds::BoundingBox;
pub use buffer::BufferView;
pub use error::{Error, Result};
pub use mesh::{SubdivMesh, SubdivMeshOptions, SurfacePoint};
