//! Small math library shared by the precomputation pipeline: vectors, a 3x3 matrix for
//! rotations, rays and bounding boxes.

pub mod bbox;
pub mod matrix;
pub mod numbers;
pub mod ray;
pub mod vector;

use std::cmp::PartialOrd;

// This is used so that we can have efficient comparisons
// with PartialOrd types:

pub fn min<T: PartialOrd>(v0: T, v1: T) -> T {
    if v0 < v1 {
        v0
    } else {
        v1
    }
}

pub fn max<T: PartialOrd>(v0: T, v1: T) -> T {
    if v0 > v1 {
        v0
    } else {
        v1
    }
}

/// Bounds the rounding error of `n` floating point operations (see pbrt, 3.9.1).
pub fn gamma_f64(n: i64) -> f64 {
    let n = n as f64;
    let half_eps = std::f64::EPSILON / 2.;
    (n * half_eps) / (1. - n * half_eps)
}
