//! Direct transport: per-vertex projection of the (optionally shadowed) clamped cosine.

use super::TransportCoeffs;
use crate::mesh::Mesh;
use crate::sampler::{stream_id, SamplePass, StratifiedSphere};
use crate::scene::RayCaster;
use crate::sh::coefficient_count;
use crate::sh::project::project_function;
use crate::threading::{parallel_for, ThreadParam};
use pmath::ray::Ray;
use simple_error::SimpleResult;

/// Everything the transport passes need besides the scene.
#[derive(Clone, Copy, Debug)]
pub struct TransportParam {
    /// Highest SH degree
    pub order: u32,
    /// Requested samples per vertex (rounded down to a square)
    pub sample_count: u32,
    /// Seed of every per-vertex generator
    pub seed: u64,
    /// Whether rays blocked by the scene count
    pub shadowed: bool,
    /// How far rays are pushed off the surface they leave
    pub ray_bias: f64,
    pub threads: ThreadParam,
}

/// Projects `H(wi) = max(0, n . wi)`, times the visibility if `param.shadowed`, for every
/// vertex of `mesh`.
pub fn project_direct<S: RayCaster>(
    scene: &S,
    mesh_id: u32,
    mesh: &Mesh,
    param: &TransportParam,
) -> SimpleResult<TransportCoeffs> {
    let sh_len = coefficient_count(param.order);
    let mut transport = TransportCoeffs::new_zero(sh_len, mesh.num_vert());
    let mut columns = transport.columns_mut();

    parallel_for(&mut columns, param.threads, |vertex, column| {
        let p = mesh.get_pos(vertex as u32);
        let n = mesh.get_nrm(vertex as u32);
        let mut sampler = StratifiedSphere::new(
            param.sample_count,
            param.seed,
            stream_id(SamplePass::Direct, mesh_id, vertex as u32),
        );

        let coeffs = project_function(param.order, &mut sampler, |sample| {
            let h = n.dot(sample.dir);
            if h <= 0. {
                return 0.;
            }
            if param.shadowed {
                let ray = Ray::new_offset(p, sample.dir, param.ray_bias);
                if scene.intersect_test(&ray) {
                    return 0.;
                }
            }
            h
        });
        column.copy_from_slice(&coeffs);
    })?;

    drop(columns);
    Ok(transport)
}
