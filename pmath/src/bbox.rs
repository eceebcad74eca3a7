use crate::numbers::Float;
use crate::ray::Ray;
use crate::vector::Vec3;
use crate::gamma_f64;
use std::ops::Index;

/// A 3d bounding box.
#[derive(Clone, Copy, Debug)]
pub struct BBox3<T: Float> {
    pub pmin: Vec3<T>,
    pub pmax: Vec3<T>,
}

impl<T: Float> BBox3<T> {
    /// Constructs an empty `BBox3`: any combination with it yields the other operand.
    pub fn new() -> Self {
        BBox3 {
            pmin: Vec3 {
                x: T::infinity(),
                y: T::infinity(),
                z: T::infinity(),
            },
            pmax: Vec3 {
                x: T::neg_infinity(),
                y: T::neg_infinity(),
                z: T::neg_infinity(),
            },
        }
    }

    /// Creates a new `BBox3` from a single point (box has no volume).
    pub fn from_pnt(pnt: Vec3<T>) -> Self {
        BBox3 {
            pmin: pnt,
            pmax: pnt,
        }
    }

    /// Creates a new `BBox3` that encompases the box and another point.
    pub fn combine_pnt(self, pnt: Vec3<T>) -> Self {
        BBox3 {
            pmin: self.pmin.min(pnt),
            pmax: self.pmax.max(pnt),
        }
    }

    /// Creates a new `BBox3` that encompases the box and another box.
    pub fn combine_bnd(self, bnd: BBox3<T>) -> Self {
        BBox3 {
            pmin: self.pmin.min(bnd.pmin),
            pmax: self.pmax.max(bnd.pmax),
        }
    }

    /// Returns a vector spanning the diagonal of the bounding box.
    pub fn diagonal(self) -> Vec3<T> {
        self.pmax - self.pmin
    }

    pub fn centroid(self) -> Vec3<T> {
        (self.pmin + self.pmax).scale(T::half())
    }

    /// Returns the index of the dimension with the highest extent.
    pub fn max_dim(self) -> usize {
        self.diagonal().max_dim()
    }

    /// Continious position of a point relative to the corners of the BBox.
    /// That is, if `pnt` is at `pmin`, then it's (0,0,0); if `pnt` is at `pmax`, then it's (1,1,1)
    pub fn offset(self, pnt: Vec3<T>) -> Vec3<T> {
        let o = pnt - self.pmin;
        Vec3 {
            x: if self.pmax.x > self.pmin.x {
                o.x / (self.pmax.x - self.pmin.x)
            } else {
                o.x
            },
            y: if self.pmax.y > self.pmin.y {
                o.y / (self.pmax.y - self.pmin.y)
            } else {
                o.y
            },
            z: if self.pmax.z > self.pmin.z {
                o.z / (self.pmax.z - self.pmin.z)
            } else {
                o.z
            },
        }
    }

    /// Returns the surface area of the bounding box.
    pub fn surface_area(self) -> T {
        let d = self.diagonal();
        T::two() * (d.x * d.y + d.x * d.z + d.y * d.z)
    }
}

impl BBox3<f64> {
    /// Slab test against the ray. `inv_dir` and `is_dir_neg` are precomputed once per ray.
    pub fn intersect_test(
        &self,
        ray: Ray<f64>,
        t_far: f64,
        inv_dir: Vec3<f64>,
        is_dir_neg: Vec3<bool>,
    ) -> bool {
        let neg = |b: bool| if b { 1 } else { 0 };

        // Scaling t_max by this factor makes the test conservative:
        let err = 1. + 2. * gamma_f64(3);

        let mut t_min = (self[neg(is_dir_neg.x)].x - ray.org.x) * inv_dir.x;
        let mut t_max = (self[1 - neg(is_dir_neg.x)].x - ray.org.x) * inv_dir.x * err;
        let ty_min = (self[neg(is_dir_neg.y)].y - ray.org.y) * inv_dir.y;
        let ty_max = (self[1 - neg(is_dir_neg.y)].y - ray.org.y) * inv_dir.y * err;

        if t_min > ty_max || ty_min > t_max {
            return false;
        }
        if ty_min > t_min {
            t_min = ty_min;
        }
        if ty_max < t_max {
            t_max = ty_max;
        }

        let tz_min = (self[neg(is_dir_neg.z)].z - ray.org.z) * inv_dir.z;
        let tz_max = (self[1 - neg(is_dir_neg.z)].z - ray.org.z) * inv_dir.z * err;

        if t_min > tz_max || tz_min > t_max {
            return false;
        }
        if tz_min > t_min {
            t_min = tz_min;
        }
        if tz_max < t_max {
            t_max = tz_max;
        }

        t_min < t_far && t_max > 0.
    }
}

impl<T: Float> Index<usize> for BBox3<T> {
    type Output = Vec3<T>;

    fn index(&self, i: usize) -> &Vec3<T> {
        match i {
            0 => &self.pmin,
            1 => &self.pmax,
            _ => panic!("Index out of range for BBox3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slab_test_hits_and_misses() {
        let bbox = BBox3::from_pnt(Vec3 {
            x: -1.,
            y: -1.,
            z: -1.,
        })
        .combine_pnt(Vec3 {
            x: 1.,
            y: 1.,
            z: 1.,
        });

        let hit = Ray::new(
            Vec3 {
                x: -5.,
                y: 0.2,
                z: 0.1,
            },
            Vec3 {
                x: 1.,
                y: 0.,
                z: 0.,
            },
        );
        let miss = Ray::new(
            Vec3 {
                x: -5.,
                y: 3.,
                z: 0.,
            },
            Vec3 {
                x: 1.,
                y: 0.,
                z: 0.,
            },
        );

        for (ray, expected) in [(hit, true), (miss, false)].iter() {
            let inv_dir = ray.dir.inv_scale(1.);
            let is_dir_neg = ray.dir.comp_wise_is_neg();
            assert_eq!(
                bbox.intersect_test(*ray, f64::INFINITY, inv_dir, is_dir_neg),
                *expected
            );
        }
    }

    #[test]
    fn surface_area_of_box() {
        let bbox = BBox3::from_pnt(Vec3::zero()).combine_pnt(Vec3 {
            x: 1.,
            y: 2.,
            z: 3.,
        });
        approx::assert_relative_eq!(bbox.surface_area(), 2. * (2. + 3. + 6.));
    }
}
