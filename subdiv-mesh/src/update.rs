//! Routing of buffer mutations to the cheapest sufficient update.
//!
//! Callers notify a mesh about every buffer they changed. The notifications
//! are collected until the next commit, which picks one [`UpdatePlan`]:
//!
//! | Recorded changes                               | Plan                                   |
//! |------------------------------------------------|----------------------------------------|
//! | nothing                                        | [`Nothing`](UpdatePlan::Nothing)       |
//! | only user data                                 | [`CacheOnly`](UpdatePlan::CacheOnly)   |
//! | levels (plus user data), mesh without creases  | [`LevelsOnly`](UpdatePlan::LevelsOnly) |
//! | anything else                                  | [`Rebuild`](UpdatePlan::Rebuild)       |
//!
//! Levels on a creased mesh force a rebuild because crease sharpness and
//! levels are resolved together when the surface is evaluated.
use bitflags::bitflags;
use num_enum::TryFromPrimitive;

/// The buffers of a mesh a caller can change.
#[repr(u32)]
#[derive(TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    FaceVertexCounts = 0,
    VertexIndices = 1,
    /// Vertex positions of any time step.
    Vertices = 2,
    EdgeCreases = 3,
    VertexCreases = 4,
    Holes = 5,
    /// The per-edge level buffer or the constant tessellation rate.
    Levels = 6,
    /// Any user attribute buffer.
    UserData = 7,
    BoundaryMode = 8,
}

bitflags! {
    /// Set of buffers changed since the last commit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mutations: u32 {
        const FACE_VERTEX_COUNTS = 1 << 0;
        const VERTEX_INDICES = 1 << 1;
        const VERTICES = 1 << 2;
        const EDGE_CREASES = 1 << 3;
        const VERTEX_CREASES = 1 << 4;
        const HOLES = 1 << 5;
        const LEVELS = 1 << 6;
        const USER_DATA = 1 << 7;
        const BOUNDARY_MODE = 1 << 8;
    }
}

impl From<BufferKind> for Mutations {
    fn from(kind: BufferKind) -> Self {
        Mutations::from_bits_truncate(1 << kind as u32)
    }
}

/// What a commit has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePlan {
    Nothing,
    /// Invalidate cached patches; topology and levels stay.
    CacheOnly,
    /// Rewrite the levels on the half-edges and invalidate cached patches.
    /// Arena links are kept verbatim.
    LevelsOnly,
    /// Rebuild the topology from scratch and invalidate everything.
    Rebuild,
}

/// Collects mutation notifications and decides the update path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateDetector {
    pending: Mutations,
    level_update: bool,
}

impl UpdateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&mut self, kind: BufferKind) {
        self.pending |= Mutations::from(kind);
    }

    /// Marks every buffer as changed.
    #[inline]
    pub fn record_all(&mut self) {
        self.pending = Mutations::all();
    }

    #[inline]
    pub fn pending(&self) -> Mutations {
        self.pending
    }

    /// Returns the plan for the pending changes without consuming them.
    pub fn plan(&self, has_creases: bool) -> UpdatePlan {
        let pending = self.pending;
        if pending.is_empty() {
            UpdatePlan::Nothing
        } else if Mutations::USER_DATA == pending {
            UpdatePlan::CacheOnly
        } else if pending.contains(Mutations::LEVELS)
            && (Mutations::LEVELS | Mutations::USER_DATA).contains(pending)
            && !has_creases
        {
            UpdatePlan::LevelsOnly
        } else {
            UpdatePlan::Rebuild
        }
    }

    /// Decides the plan, clears the pending set and remembers whether this
    /// was a level-only update until the next commit.
    ///
    /// Use [`plan()`](Self::plan) and [`applied()`](Self::applied) instead
    /// when applying the plan can fail.
    pub fn commit(&mut self, has_creases: bool) -> UpdatePlan {
        let plan = self.plan(has_creases);
        self.applied(plan);
        plan
    }

    /// Acknowledges that `plan` was carried out. Until then the pending set
    /// is kept, so a failed update is planned again on the next commit.
    pub fn applied(&mut self, plan: UpdatePlan) {
        self.level_update = UpdatePlan::LevelsOnly == plan;
        self.pending = Mutations::empty();
    }

    /// Returns `true` if the last commit only touched tessellation levels.
    #[inline]
    pub fn is_level_update(&self) -> bool {
        self.level_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_its_own_flag() {
        let all = (0..9u32)
            .map(|value| Mutations::from(BufferKind::try_from(value).unwrap()))
            .fold(Mutations::empty(), |all, flag| {
                assert_eq!(1, flag.bits().count_ones());
                assert!(!all.intersects(flag));
                all | flag
            });
        assert_eq!(all, Mutations::all());
        assert!(BufferKind::try_from(9).is_err());
    }
}
