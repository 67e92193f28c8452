//! # Cache
//! `cache` holds evaluated patches so that repeated evaluation of an
//! unchanged mesh, e.g. across many rendering passes, costs a lookup. Its
//! roles are:
//! * **Storage**
//!
//!   Keep one entry per primitive, time step and interpolation slot, tagged
//!   with the generation it was built in ([`PatchCache`]).
//! * **Invalidation**
//!
//!   Distinguish a level-only change, which keeps the half-edge structure,
//!   from a topology change.
//! * **Evaluation seam**
//!
//!   Call out to an engine on a miss ([`PatchEvaluator`]). A reference engine
//!   that interpolates corners linearly is included ([`BilinearEvaluator`]).
pub mod evaluator;
pub use evaluator::*;

pub mod patch_cache;
pub use patch_cache::*;
