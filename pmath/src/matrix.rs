use crate::numbers::Float;
use crate::vector::Vec3;
use std::ops::{Index, Mul};

/// A row-major 3x3 matrix. Only used for rotations, so there is no general inverse: the
/// inverse of a rotation is its transpose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3<T: Float> {
    m: [Vec3<T>; 3],
}

impl<T: Float> Mat3<T> {
    pub fn new_identity() -> Self {
        let (o, z) = (T::one(), T::zero());
        Mat3 {
            m: [
                Vec3 { x: o, y: z, z },
                Vec3 { x: z, y: o, z },
                Vec3 { x: z, y: z, z: o },
            ],
        }
    }

    /// A rotation of `deg` degrees around `axis` (right handed, need not be normalized).
    pub fn new_rotate(deg: T, axis: Vec3<T>) -> Self {
        let a = axis.normalize();
        let theta = deg.to_radians();
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();
        let one_minus_cos = T::one() - cos_theta;

        let r0 = Vec3 {
            x: a.x * a.x + (T::one() - a.x * a.x) * cos_theta,
            y: a.x * a.y * one_minus_cos - a.z * sin_theta,
            z: a.x * a.z * one_minus_cos + a.y * sin_theta,
        };
        let r1 = Vec3 {
            x: a.x * a.y * one_minus_cos + a.z * sin_theta,
            y: a.y * a.y + (T::one() - a.y * a.y) * cos_theta,
            z: a.y * a.z * one_minus_cos - a.x * sin_theta,
        };
        let r2 = Vec3 {
            x: a.x * a.z * one_minus_cos - a.y * sin_theta,
            y: a.y * a.z * one_minus_cos + a.x * sin_theta,
            z: a.z * a.z + (T::one() - a.z * a.z) * cos_theta,
        };

        Mat3 { m: [r0, r1, r2] }
    }

    pub fn transpose(self) -> Self {
        let m = &self.m;
        Mat3 {
            m: [
                Vec3 {
                    x: m[0].x,
                    y: m[1].x,
                    z: m[2].x,
                },
                Vec3 {
                    x: m[0].y,
                    y: m[1].y,
                    z: m[2].y,
                },
                Vec3 {
                    x: m[0].z,
                    y: m[1].z,
                    z: m[2].z,
                },
            ],
        }
    }

    pub fn column(self, i: usize) -> Vec3<T> {
        Vec3 {
            x: self.m[0][i],
            y: self.m[1][i],
            z: self.m[2][i],
        }
    }

    /// Multiplies the matrix with a column vector.
    pub fn vector(self, v: Vec3<T>) -> Vec3<T> {
        Vec3 {
            x: self.m[0].dot(v),
            y: self.m[1].dot(v),
            z: self.m[2].dot(v),
        }
    }
}

impl<T: Float> Mul for Mat3<T> {
    type Output = Mat3<T>;

    fn mul(self, o: Mat3<T>) -> Self {
        let c = [o.column(0), o.column(1), o.column(2)];
        let row = |r: Vec3<T>| Vec3 {
            x: r.dot(c[0]),
            y: r.dot(c[1]),
            z: r.dot(c[2]),
        };
        Mat3 {
            m: [row(self.m[0]), row(self.m[1]), row(self.m[2])],
        }
    }
}

impl<T: Float> Index<usize> for Mat3<T> {
    type Output = Vec3<T>;

    fn index(&self, i: usize) -> &Vec3<T> {
        &self.m[i]
    }
}
