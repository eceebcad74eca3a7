//! Real spherical harmonics.
//!
//! Coefficients are stored in a flat array where the basis function of degree `l` and order
//! `m` (`-l <= m <= l`) lives at `l * (l + 1) + m`. The basis includes the Condon-Shortley
//! phase, so for example `Y_1^1(d) = -sqrt(3 / 4pi) * d.x`.

pub mod project;
pub mod rotation;

use pmath::numbers::Float;
use pmath::vector::Vec3;

/// Number of coefficients of an expansion up to and including degree `order`.
pub fn coefficient_count(order: u32) -> usize {
    let n = order as usize + 1;
    n * n
}

/// Flat index of the basis function `(l, m)`.
pub fn index(l: u32, m: i32) -> usize {
    debug_assert!(m.unsigned_abs() <= l);
    let l = l as i64;
    (l * (l + 1) + m as i64) as usize
}

/// Inverse of `index`.
pub fn degree_order(index: usize) -> (u32, i32) {
    let mut l = (index as f64).sqrt() as usize;
    // Guard against the square root landing on the wrong side of an integer:
    while l * l > index {
        l -= 1;
    }
    while (l + 1) * (l + 1) <= index {
        l += 1;
    }
    let m = index as i64 - (l * (l + 1)) as i64;
    (l as u32, m as i32)
}

/// Direction of the spherical coordinates, `phi` being the azimuth around `z` and `theta`
/// the angle from `+z`.
pub fn to_vector(phi: f64, theta: f64) -> Vec3<f64> {
    let r = theta.sin();
    Vec3 {
        x: r * phi.cos(),
        y: r * phi.sin(),
        z: theta.cos(),
    }
}

/// Spherical coordinates `(phi, theta)` of a direction. `phi` is in `[0, 2pi)`.
pub fn to_spherical(dir: Vec3<f64>) -> (f64, f64) {
    let dir = dir.normalize();
    let theta = dir.z.max(-1.).min(1.).acos();
    let mut phi = dir.y.atan2(dir.x);
    if phi < 0. {
        phi += 2. * f64::PI;
    }
    (phi, theta)
}

/// Evaluates `Y_l^m` in the direction `dir` (need not be normalized).
pub fn eval_sh(l: u32, m: i32, dir: Vec3<f64>) -> f64 {
    debug_assert!(m.unsigned_abs() <= l);
    let dir = dir.normalize();
    if l <= 2 {
        eval_sh_hardcoded(l, m, dir)
    } else {
        let (phi, theta) = to_spherical(dir);
        eval_sh_slow(l, m, phi, theta)
    }
}

/// Writes every basis function up to degree `order` evaluated at `dir` into `out`.
pub fn eval_sh_all(order: u32, dir: Vec3<f64>, out: &mut [f64]) {
    debug_assert!(out.len() >= coefficient_count(order));
    for l in 0..=(order as i32) {
        for m in -l..=l {
            out[index(l as u32, m)] = eval_sh(l as u32, m, dir);
        }
    }
}

// sqrt(1 / 4pi)
const K00: f64 = 0.28209479177387814;
// sqrt(3 / 4pi)
const K1: f64 = 0.4886025119029199;
// sqrt(15 / pi) / 2
const K2_2: f64 = 1.0925484305920792;
// sqrt(5 / pi) / 4
const K20: f64 = 0.31539156525252005;
// sqrt(15 / pi) / 4
const K22: f64 = 0.5462742152960396;

// Polynomial forms for the low degrees, `d` must be normalized.
fn eval_sh_hardcoded(l: u32, m: i32, d: Vec3<f64>) -> f64 {
    match (l, m) {
        (0, 0) => K00,
        (1, -1) => -K1 * d.y,
        (1, 0) => K1 * d.z,
        (1, 1) => -K1 * d.x,
        (2, -2) => K2_2 * d.x * d.y,
        (2, -1) => -K2_2 * d.y * d.z,
        (2, 0) => K20 * (-d.x * d.x - d.y * d.y + 2. * d.z * d.z),
        (2, 1) => -K2_2 * d.x * d.z,
        (2, 2) => K22 * (d.x * d.x - d.y * d.y),
        _ => 0.,
    }
}

fn factorial(n: u32) -> f64 {
    (2..=n).fold(1., |acc, i| acc * i as f64)
}

fn double_factorial(n: i64) -> f64 {
    let mut r = 1.;
    let mut i = n;
    while i > 1 {
        r *= i as f64;
        i -= 2;
    }
    r
}

// Associated Legendre polynomial P_l^m(x) for m >= 0 via the standard recurrence in l.
fn legendre(l: u32, m: u32, x: f64) -> f64 {
    let m_i = m as i64;
    // P_m^m = (-1)^m (2m - 1)!! (1 - x^2)^(m/2)
    let mut pmm = double_factorial(2 * m_i - 1) * (1. - x * x).max(0.).powf(m as f64 / 2.);
    if m % 2 == 1 {
        pmm = -pmm;
    }
    if l == m {
        return pmm;
    }

    // P_{m+1}^m = x (2m + 1) P_m^m
    let mut pmm1 = x * (2 * m_i + 1) as f64 * pmm;
    if l == m + 1 {
        return pmm1;
    }

    // (l - m) P_l^m = x (2l - 1) P_{l-1}^m - (l + m - 1) P_{l-2}^m
    let mut pml = 0.;
    for n in (m + 2)..=l {
        let n_i = n as i64;
        pml = ((2 * n_i - 1) as f64 * x * pmm1 - (n_i + m_i - 1) as f64 * pmm) / (n_i - m_i) as f64;
        pmm = pmm1;
        pmm1 = pml;
    }
    pml
}

fn normalization(l: u32, m: u32) -> f64 {
    ((2 * l + 1) as f64 * factorial(l - m) / (4. * f64::PI * factorial(l + m))).sqrt()
}

fn eval_sh_slow(l: u32, m: i32, phi: f64, theta: f64) -> f64 {
    let k = m.unsigned_abs();
    let kml = normalization(l, k);
    let p = legendre(l, k, theta.cos());
    if m > 0 {
        f64::SQRT_2 * kml * (m as f64 * phi).cos() * p
    } else if m < 0 {
        f64::SQRT_2 * kml * (-m as f64 * phi).sin() * p
    } else {
        kml * p
    }
}

/// Evaluates the expansion `coeffs` in the direction `dir`.
pub fn reconstruct(coeffs: &[f64], dir: Vec3<f64>) -> f64 {
    coeffs
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let (l, m) = degree_order(i);
            c * eval_sh(l, m, dir)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::StratifiedSphere;
    use approx::assert_abs_diff_eq;

    #[test]
    fn index_is_a_bijection() {
        let mut next = 0;
        for l in 0..6u32 {
            for m in -(l as i32)..=(l as i32) {
                assert_eq!(index(l, m), next);
                assert_eq!(degree_order(next), (l, m));
                next += 1;
            }
        }
        assert_eq!(next, coefficient_count(5));
    }

    #[test]
    fn hardcoded_matches_recurrence() {
        let mut sampler = StratifiedSphere::new(64, 1, 0);
        sampler.for_each(|s| {
            for l in 0..=2u32 {
                for m in -(l as i32)..=(l as i32) {
                    let fast = eval_sh_hardcoded(l, m, s.dir);
                    let slow = eval_sh_slow(l, m, s.phi, s.theta);
                    assert_abs_diff_eq!(fast, slow, epsilon = 1e-12);
                }
            }
        });
    }

    #[test]
    fn condon_shortley_phase() {
        let x = Vec3 { x: 1., y: 0., z: 0. };
        assert!(eval_sh(1, 1, x) < 0.);
        let (phi, theta) = to_spherical(x);
        assert_abs_diff_eq!(eval_sh_slow(3, 1, phi, theta), eval_sh(3, 1, x), epsilon = 1e-12);
    }

    #[test]
    fn spherical_round_trip() {
        let d = Vec3 { x: -0.3, y: 0.4, z: 0.5 }.normalize();
        let (phi, theta) = to_spherical(d);
        let back = to_vector(phi, theta);
        assert_abs_diff_eq!(back.x, d.x, epsilon = 1e-12);
        assert_abs_diff_eq!(back.y, d.y, epsilon = 1e-12);
        assert_abs_diff_eq!(back.z, d.z, epsilon = 1e-12);
    }

    #[test]
    fn basis_is_orthonormal() {
        let order = 3;
        let n = coefficient_count(order);
        let mut gram = vec![0.; n * n];
        let mut basis = vec![0.; n];
        let mut sampler = StratifiedSphere::new(200 * 200, 7, 0);
        let weight = sampler.weight();
        sampler.for_each(|s| {
            eval_sh_all(order, s.dir, &mut basis);
            for i in 0..n {
                for j in 0..n {
                    gram[i * n + j] += basis[i] * basis[j] * weight;
                }
            }
        });
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1. } else { 0. };
                assert_abs_diff_eq!(gram[i * n + j], expected, epsilon = 1e-2);
            }
        }
    }
}
