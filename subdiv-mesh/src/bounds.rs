//! Axis-aligned bounding boxes.
use ultraviolet::Vec3;

/// An axis-aligned box. An empty box has `min > max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Returns a box that contains nothing and grows from the first point it
    /// is extended by.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Vec3::broadcast(f32::INFINITY),
            max: Vec3::broadcast(f32::NEG_INFINITY),
        }
    }

    #[inline]
    pub fn from_point(point: [f32; 3]) -> Self {
        let point = Vec3::from(point);
        Self {
            min: point,
            max: point,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn extend(&mut self, point: [f32; 3]) {
        let point = Vec3::from(point);
        self.min = self.min.min_by_component(point);
        self.max = self.max.max_by_component(point);
    }

    #[inline]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min_by_component(other.min),
            max: self.max.max_by_component(other.max),
        }
    }

    /// Returns `true` if `point` lies inside or on the box.
    #[inline]
    pub fn contains(&self, point: [f32; 3]) -> bool {
        let point = Vec3::from(point);
        self.min.x <= point.x
            && self.min.y <= point.y
            && self.min.z <= point.z
            && point.x <= self.max.x
            && point.y <= self.max.y
            && point.z <= self.max.z
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::zero()
        } else {
            self.max - self.min
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
