//! Diffuse interreflection on top of the direct transport.
//!
//! Bounce level `k` of a vertex gathers level `k - 1` from whatever its hemisphere sees:
//!
//! `L_k(v) = 4pi/N * sum over samples wi of interp(L_{k-1}, hit, bary) * max(0, n . wi) / 2pi`
//!
//! for the samples whose ray hits a surface that faces back at the vertex. Every level only
//! reads the finished level before it, so the order vertices are processed in doesn't matter.

use super::transport::TransportParam;
use super::TransportCoeffs;
use crate::mesh::{Mesh, Triangle};
use crate::sampler::{stream_id, SamplePass, StratifiedSphere};
use crate::scene::RayCaster;
use crate::sh::project::project_vector_function;
use crate::threading::parallel_for;
use log::info;
use pmath::numbers::Float;
use pmath::ray::Ray;
use simple_error::SimpleResult;
use std::time::Instant;

/// Computes one bounce level for every mesh from the level before it (`prev`, one table per
/// mesh in the same order as `meshes`).
pub fn project_bounce<S: RayCaster>(
    scene: &S,
    meshes: &[Mesh],
    prev: &[TransportCoeffs],
    depth: u32,
    param: &TransportParam,
) -> SimpleResult<Vec<TransportCoeffs>> {
    let mut levels = Vec::with_capacity(meshes.len());
    for (mesh_id, mesh) in meshes.iter().enumerate() {
        let sh_len = prev[mesh_id].sh_len();
        let mut level = TransportCoeffs::new_zero(sh_len, mesh.num_vert());
        let mut columns = level.columns_mut();

        parallel_for(&mut columns, param.threads, |vertex, column| {
            let p = mesh.get_pos(vertex as u32);
            let n = mesh.get_nrm(vertex as u32);
            let mut sampler = StratifiedSphere::new(
                param.sample_count,
                param.seed,
                stream_id(SamplePass::Bounce(depth), mesh_id as u32, vertex as u32),
            );

            let coeffs = project_vector_function(sh_len, &mut sampler, |sample, acc| {
                let h = n.dot(sample.dir);
                if h <= 0. {
                    return;
                }
                let ray = Ray::new_offset(p, sample.dir, param.ray_bias);
                let hit = match scene.intersect(&ray) {
                    Some(hit) => hit,
                    None => return,
                };

                // Only the front of the hit surface reflects towards us:
                let hit_mesh = &meshes[hit.mesh_id as usize];
                let hit_n = hit_mesh.interp_nrm(
                    Triangle {
                        indices: hit.indices,
                    },
                    hit.bary,
                );
                if hit_n.dot(-sample.dir) <= 0. {
                    return;
                }

                prev[hit.mesh_id as usize].add_interp(hit.indices, hit.bary, h * f64::INV_2PI, acc);
            });
            column.copy_from_slice(&coeffs);
        })?;

        drop(columns);
        levels.push(level);
    }
    Ok(levels)
}

/// Adds `bounce` levels of interreflection onto `direct`, returning the total transport per mesh.
pub fn add_interreflection<S: RayCaster>(
    scene: &S,
    meshes: &[Mesh],
    direct: Vec<TransportCoeffs>,
    bounce: u32,
    param: &TransportParam,
) -> SimpleResult<Vec<TransportCoeffs>> {
    let mut total = direct.clone();
    let mut prev = direct;
    for depth in 1..=bounce {
        let start = Instant::now();
        let level = project_bounce(scene, meshes, &prev, depth, param)?;
        for (t, l) in total.iter_mut().zip(level.iter()) {
            t.add_assign(l);
        }
        info!(
            "Interreflection bounce {} took {:.2?}",
            depth,
            start.elapsed()
        );
        prev = level;
    }
    Ok(total)
}
