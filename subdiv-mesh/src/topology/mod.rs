//! # Topology
//! `topology` turns the flat buffers an application hands in into a linked
//! half-edge structure that the evaluation side walks. Its roles are:
//! * **Description**
//!
//!   Borrow the face, crease and hole buffers without copying them
//!   ([`TopologyDescriptor`]).
//! * **Construction**
//!
//!   Link every face corner to its neighbors and twins, detect boundaries,
//!   degenerate faces and non-manifold edges ([`TopologyBuilder`]).
//! * **Annotation**
//!
//!   Carry crease sharpness and tessellation levels on the half-edges
//!   ([`CreaseRegistry`], [`EdgeLevels`]).
//! * **Validity**
//!
//!   Decide per face and time step whether a primitive may be generated.
//!
//! The builder never fails because of a single bad face. Faces with defects
//! are flagged invalid and counted in a [`TopologyReport`]; the rest of the
//! mesh is built as usual.
pub mod arena;
pub use arena::*;

pub mod builder;
pub use builder::*;

pub mod crease;
pub use crease::*;

pub mod descriptor;
pub use descriptor::*;

pub mod half_edge;
pub use half_edge::*;

pub mod holes;
pub use holes::*;

pub mod level;
pub use level::*;
