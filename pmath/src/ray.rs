use crate::numbers::Float;
use crate::vector::Vec3;

/// A ray used to intersect a scene.
#[derive(Clone, Copy, Debug)]
pub struct Ray<T: Float> {
    /// The origin point of the ray.
    pub org: Vec3<T>,
    /// The direction vector of the ray.
    pub dir: Vec3<T>,
}

impl<T: Float> Ray<T> {
    pub fn new(org: Vec3<T>, dir: Vec3<T>) -> Self {
        Ray { org, dir }
    }

    /// Constructs a ray whose origin is pushed along `dir` by `bias`. Used when a ray leaves
    /// a surface so that it doesn't immediately hit the surface it started from.
    pub fn new_offset(org: Vec3<T>, dir: Vec3<T>, bias: T) -> Self {
        Ray {
            org: org + dir.scale(bias),
            dir,
        }
    }

    /// Calculates a point along the ray given a parametric parameter.
    pub fn point_at(self, t: T) -> Vec3<T> {
        self.org + self.dir.scale(t)
    }
}
