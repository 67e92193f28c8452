//! Faces excluded from rendering.
use std::collections::HashSet;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// The set of face ids marked as holes.
///
/// Hole faces keep their place in the topology, so their vertices continue to
/// support the adjacent faces, but no primitive is generated for them.
#[derive(Debug, Clone, Default)]
pub struct HoleSet(HashSet<u32>);

impl HoleSet {
    /// Collects the hole buffer. Duplicates collapse and ids not below
    /// `face_count` are dropped.
    pub fn new(faces: &[u32], face_count: usize) -> Self {
        let in_range = |face: &u32| (*face as usize) < face_count;

        #[cfg(feature = "rayon")]
        let set = faces.par_iter().copied().filter(in_range).collect();
        #[cfg(not(feature = "rayon"))]
        let set = faces.iter().copied().filter(in_range).collect();

        HoleSet(set)
    }

    #[inline]
    pub fn contains(&self, face: usize) -> bool {
        u32::try_from(face).is_ok_and(|face| self.0.contains(&face))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
