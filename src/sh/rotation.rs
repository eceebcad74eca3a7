//! Rotation of SH expansions.
//!
//! Rotations never mix bands, so each band `l` gets its own `(2l+1)x(2l+1)` matrix. It's found
//! by evaluating the band at `2l+1` fixed directions `n_i` before and after rotating them:
//! with `A[i][j] = Y_l^j(n_i)` and `B[i][j] = Y_l^j(R^-1 n_i)`, the rotated coefficients
//! satisfy `A c' = B c`, so `c' = A^-1 B c`.

use super::{eval_sh, index};
use pmath::matrix::Mat3;
use pmath::numbers::Float;
use pmath::vector::Vec3;
use simple_error::{bail, SimpleResult};

// Pivots smaller than this mark the sample directions as degenerate for a band:
const SINGULAR_EPS: f64 = 1e-10;

pub struct ShRotation {
    // One row-major matrix per band, band 0 is always [1]:
    bands: Vec<Vec<f64>>,
}

impl ShRotation {
    /// Builds the per-band matrices for rotating expansions up to degree `order` by `rot`.
    pub fn new(order: u32, rot: Mat3<f64>) -> SimpleResult<Self> {
        let inv_rot = rot.transpose();
        let mut bands = Vec::with_capacity(order as usize + 1);
        bands.push(vec![1.]);
        for l in 1..=order {
            bands.push(band_matrix(l, inv_rot)?);
        }
        Ok(ShRotation { bands })
    }

    /// Rotates `coeffs` in place. Coefficients beyond `order` are left alone.
    pub fn apply(&self, coeffs: &mut [f64]) {
        for (l, m) in self.bands.iter().enumerate() {
            let l = l as u32;
            let n = 2 * l as usize + 1;
            let start = index(l, -(l as i32));
            if start + n > coeffs.len() {
                break;
            }
            let band: Vec<f64> = coeffs[start..start + n].to_vec();
            for i in 0..n {
                coeffs[start + i] = (0..n).map(|j| m[i * n + j] * band[j]).sum();
            }
        }
    }
}

// Directions used to sample band `l`. The low bands use small hand picked sets, higher bands
// use points on a spiral. The spiral is shifted so it isn't mirror symmetric about z = 0, a
// symmetric set is singular for the odd bands.
fn sample_dirs(l: u32) -> Vec<Vec3<f64>> {
    let k = 1. / f64::SQRT_2;
    match l {
        1 => vec![
            Vec3 { x: 1., y: 0., z: 0. },
            Vec3 { x: 0., y: 0., z: 1. },
            Vec3 { x: 0., y: 1., z: 0. },
        ],
        2 => vec![
            Vec3 { x: 1., y: 0., z: 0. },
            Vec3 { x: 0., y: 0., z: 1. },
            Vec3 { x: k, y: k, z: 0. },
            Vec3 { x: k, y: 0., z: k },
            Vec3 { x: 0., y: k, z: k },
        ],
        _ => {
            let n = 2 * l + 1;
            let golden_angle = f64::PI * (3. - 5f64.sqrt());
            (0..n)
                .map(|i| {
                    let z = 1. - 2. * (i as f64 + 0.3) / n as f64;
                    let r = (1. - z * z).sqrt();
                    let phi = 0.3 + golden_angle * i as f64;
                    Vec3 {
                        x: r * phi.cos(),
                        y: r * phi.sin(),
                        z,
                    }
                })
                .collect()
        }
    }
}

fn band_matrix(l: u32, inv_rot: Mat3<f64>) -> SimpleResult<Vec<f64>> {
    let n = 2 * l as usize + 1;
    let dirs = sample_dirs(l);
    let li = l as i32;

    let mut a = vec![0.; n * n];
    let mut b = vec![0.; n * n];
    for (i, dir) in dirs.iter().enumerate() {
        let rotated = inv_rot.vector(*dir);
        for (j, m) in (-li..=li).enumerate() {
            a[i * n + j] = eval_sh(l, m, *dir);
            b[i * n + j] = eval_sh(l, m, rotated);
        }
    }

    let a_inv = invert(a, n, l)?;
    let mut out = vec![0.; n * n];
    for i in 0..n {
        for j in 0..n {
            out[i * n + j] = (0..n).map(|k| a_inv[i * n + k] * b[k * n + j]).sum();
        }
    }
    Ok(out)
}

// Gauss-Jordan elimination with partial pivoting.
fn invert(mut m: Vec<f64>, n: usize, l: u32) -> SimpleResult<Vec<f64>> {
    let mut inv = vec![0.; n * n];
    for i in 0..n {
        inv[i * n + i] = 1.;
    }

    for col in 0..n {
        let mut pivot = col;
        for row in (col + 1)..n {
            if m[row * n + col].abs() > m[pivot * n + col].abs() {
                pivot = row;
            }
        }
        if m[pivot * n + col].abs() < SINGULAR_EPS {
            bail!("Sample directions for SH band {} produce a singular matrix.", l);
        }
        if pivot != col {
            for k in 0..n {
                m.swap(col * n + k, pivot * n + k);
                inv.swap(col * n + k, pivot * n + k);
            }
        }

        let inv_p = 1. / m[col * n + col];
        for k in 0..n {
            m[col * n + k] *= inv_p;
            inv[col * n + k] *= inv_p;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let f = m[row * n + col];
            if f == 0. {
                continue;
            }
            for k in 0..n {
                m[row * n + k] -= f * m[col * n + k];
                inv[row * n + k] -= f * inv[col * n + k];
            }
        }
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::super::{coefficient_count, reconstruct};
    use super::*;
    use approx::assert_abs_diff_eq;

    fn test_coeffs(order: u32) -> Vec<f64> {
        (0..coefficient_count(order))
            .map(|i| ((i as f64) * 0.7).sin() + 0.1)
            .collect()
    }

    #[test]
    fn rotated_expansion_is_rotated_function() {
        let order = 3;
        let rot = Mat3::new_rotate(37., Vec3 { x: 0.3, y: 1., z: -0.5 });
        let rotation = ShRotation::new(order, rot).unwrap();

        let coeffs = test_coeffs(order);
        let mut rotated = coeffs.clone();
        rotation.apply(&mut rotated);

        let dirs = [
            Vec3 { x: 0.2, y: 0.9, z: 0.1 },
            Vec3 { x: -0.7, y: 0.1, z: 0.4 },
            Vec3 { x: 0.1, y: -0.3, z: -0.9 },
        ];
        for d in dirs.iter() {
            let d = d.normalize();
            let expected = reconstruct(&coeffs, rot.transpose().vector(d));
            assert_abs_diff_eq!(reconstruct(&rotated, d), expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn identity_leaves_coefficients_alone() {
        let rotation = ShRotation::new(2, Mat3::new_identity()).unwrap();
        let coeffs = test_coeffs(2);
        let mut rotated = coeffs.clone();
        rotation.apply(&mut rotated);
        for (a, b) in coeffs.iter().zip(rotated.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn dc_is_invariant() {
        let rot = Mat3::new_rotate(90., Vec3 { x: 1., y: 0., z: 0. });
        let rotation = ShRotation::new(2, rot).unwrap();
        let mut coeffs = test_coeffs(2);
        let dc = coeffs[0];
        rotation.apply(&mut coeffs);
        assert_eq!(coeffs[0], dc);
    }

    #[test]
    fn singular_matrix_is_an_error() {
        let m = vec![1., 2., 2., 4.];
        assert!(invert(m, 2, 1).is_err());
    }
}
