//! Projection of the environment cubemap onto the SH basis.

use super::LightCoeffs;
use crate::cubemap::{texel_direction, texel_solid_angle, CubeMap, FACES};
use crate::sh::{coefficient_count, eval_sh_all};
use crate::spectrum::Color;
use crate::threading::{parallel_for, ThreadParam};
use simple_error::SimpleResult;

/// Integrates the cubemap's radiance against every basis function up to `order`, weighting
/// each texel by the solid angle it subtends. Rows are summed in parallel into their own
/// slots and merged in a fixed order afterwards, so the result doesn't depend on threading.
///
/// With `skip_first_face` the first face in `FACES` order is left out entirely.
pub fn project_environment(
    cubemap: &CubeMap,
    order: u32,
    skip_first_face: bool,
    threads: ThreadParam,
) -> SimpleResult<LightCoeffs> {
    let n = coefficient_count(order);
    let width = cubemap.width();
    let height = cubemap.height();

    let mut rows = vec![vec![Color::black(); n]; FACES.len() * height];
    parallel_for(&mut rows, threads, |slot, row| {
        let face_index = slot / height;
        let y = slot % height;
        if skip_first_face && face_index == 0 {
            return;
        }

        let face = FACES[face_index];
        let mut basis = vec![0.; n];
        for x in 0..width {
            let dir = texel_direction(face, x, y, width, height);
            let radiance = cubemap
                .texel(face_index, x, y)
                .scale(texel_solid_angle(x, y, width, height));
            eval_sh_all(order, dir, &mut basis);
            for (c, b) in row.iter_mut().zip(basis.iter()) {
                *c += radiance.scale(*b);
            }
        }
    })?;

    let mut light = LightCoeffs::new_zero(order);
    for row in rows.iter() {
        for (l, c) in light.as_mut_slice().iter_mut().zip(row.iter()) {
            *l += *c;
        }
    }
    Ok(light)
}
