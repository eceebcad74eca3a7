//! Monte-Carlo projection of functions on the sphere onto the SH basis.

use super::{coefficient_count, eval_sh_all};
use crate::sampler::{SphereSample, StratifiedSphere};

/// Projects a scalar function onto the basis up to degree `order`. Samples where `func`
/// returns exactly zero don't evaluate the basis at all.
pub fn project_function<F>(order: u32, sampler: &mut StratifiedSphere, mut func: F) -> Vec<f64>
where
    F: FnMut(&SphereSample) -> f64,
{
    let n = coefficient_count(order);
    let mut coeffs = vec![0.; n];
    let mut basis = vec![0.; n];
    let weight = sampler.weight();

    sampler.for_each(|sample| {
        let value = func(&sample);
        if value == 0. {
            return;
        }
        eval_sh_all(order, sample.dir, &mut basis);
        for (c, y) in coeffs.iter_mut().zip(basis.iter()) {
            *c += value * y;
        }
    });

    for c in coeffs.iter_mut() {
        *c *= weight;
    }
    coeffs
}

/// Integrates a function that already produces coefficient vectors of length `len`. `func`
/// adds its contribution for a sample to the accumulator it is handed; the accumulated sum is
/// scaled by the sample weight at the end.
pub fn project_vector_function<F>(
    len: usize,
    sampler: &mut StratifiedSphere,
    mut func: F,
) -> Vec<f64>
where
    F: FnMut(&SphereSample, &mut [f64]),
{
    let mut coeffs = vec![0.; len];
    let weight = sampler.weight();
    sampler.for_each(|sample| func(&sample, &mut coeffs));
    for c in coeffs.iter_mut() {
        *c *= weight;
    }
    coeffs
}

#[cfg(test)]
mod tests {
    use super::super::{eval_sh, index, reconstruct};
    use super::*;
    use approx::assert_abs_diff_eq;
    use pmath::numbers::Float;
    use pmath::vector::Vec3;

    #[test]
    fn constant_projects_onto_dc() {
        let mut sampler = StratifiedSphere::new(50 * 50, 0, 0);
        let coeffs = project_function(2, &mut sampler, |_| 1.);
        assert_abs_diff_eq!(coeffs[0], (4. * f64::PI).sqrt(), epsilon = 1e-9);
        for c in &coeffs[1..] {
            assert_abs_diff_eq!(*c, 0., epsilon = 2e-2);
        }
    }

    #[test]
    fn basis_function_projects_onto_itself() {
        let mut sampler = StratifiedSphere::new(100 * 100, 11, 0);
        let coeffs = project_function(2, &mut sampler, |s| eval_sh(2, 1, s.dir));
        for (i, c) in coeffs.iter().enumerate() {
            let expected = if i == index(2, 1) { 1. } else { 0. };
            assert_abs_diff_eq!(*c, expected, epsilon = 1e-2);
        }
    }

    #[test]
    fn clamped_cosine_matches_analytic() {
        // Zonal coefficients of max(0, cos) for l = 0, 1, 2:
        let zonal = [f64::PI.sqrt() / 2., (f64::PI / 3.).sqrt(), (5. * f64::PI).sqrt() / 8.];
        let n = Vec3 { x: 0.2, y: -0.5, z: 0.7 }.normalize();

        let mut sampler = StratifiedSphere::new(200 * 200, 5, 0);
        let coeffs = project_function(2, &mut sampler, |s| n.dot(s.dir).max(0.));

        for l in 0..=2u32 {
            let scale = (4. * f64::PI / (2 * l + 1) as f64).sqrt() * zonal[l as usize];
            for m in -(l as i32)..=(l as i32) {
                let expected = scale * eval_sh(l, m, n);
                assert_abs_diff_eq!(coeffs[index(l, m)], expected, epsilon = 5e-3);
            }
        }
        assert_abs_diff_eq!(coeffs[0], f64::PI.sqrt() / 2., epsilon = 5e-3);
    }

    #[test]
    fn vector_projection_sums_contributions() {
        let mut sampler = StratifiedSphere::new(10 * 10, 0, 0);
        let coeffs = project_vector_function(2, &mut sampler, |_, acc| {
            acc[0] += 1.;
            acc[1] += 2.;
        });
        assert_abs_diff_eq!(coeffs[0], 4. * f64::PI, epsilon = 1e-12);
        assert_abs_diff_eq!(coeffs[1], 8. * f64::PI, epsilon = 1e-12);
    }

    #[test]
    fn reconstruction_of_projection_is_close() {
        let mut sampler = StratifiedSphere::new(100 * 100, 2, 0);
        let f = |d: Vec3<f64>| 0.5 + d.z - 0.25 * d.x * d.y;
        let coeffs = project_function(2, &mut sampler, |s| f(s.dir));
        let d = Vec3 { x: 0.3, y: 0.6, z: -0.2 }.normalize();
        assert_abs_diff_eq!(reconstruct(&coeffs, d), f(d), epsilon = 2e-2);
    }
}
