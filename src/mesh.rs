use pmath::gamma_f64;
use pmath::ray::Ray;
use pmath::vector::Vec3;
use simple_error::{bail, SimpleResult};

// The triangle itself doesn't store the mesh, it just stores the indices:
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub indices: [u32; 3],
}

/// An indexed triangle mesh with one normal per vertex.
pub struct Mesh {
    poss: Vec<Vec3<f64>>,
    nrms: Vec<Vec3<f64>>,
    tris: Vec<Triangle>,
}

impl Mesh {
    /// Creates a mesh, generating area weighted vertex normals if `nrms` is `None`.
    pub fn new(
        poss: Vec<Vec3<f64>>,
        nrms: Option<Vec<Vec3<f64>>>,
        tris: Vec<Triangle>,
    ) -> SimpleResult<Self> {
        let num_vert = poss.len();
        for (i, tri) in tris.iter().enumerate() {
            if tri.indices.iter().any(|&j| j as usize >= num_vert) {
                bail!(
                    "Triangle {} references a vertex past the end of the mesh ({} vertices).",
                    i,
                    num_vert
                );
            }
        }

        let nrms = match nrms {
            Some(nrms) => {
                if nrms.len() != num_vert {
                    bail!(
                        "Mesh has {} normals for {} vertices.",
                        nrms.len(),
                        num_vert
                    );
                }
                nrms.into_iter().map(normalize_or_up).collect()
            }
            None => generate_normals(&poss, &tris),
        };

        Ok(Mesh { poss, nrms, tris })
    }

    pub fn num_tri(&self) -> usize {
        self.tris.len()
    }

    pub fn num_vert(&self) -> usize {
        self.poss.len()
    }

    pub fn get_tri(&self, index: usize) -> Triangle {
        self.tris[index]
    }

    pub fn get_pos(&self, index: u32) -> Vec3<f64> {
        self.poss[index as usize]
    }

    pub fn get_nrm(&self, index: u32) -> Vec3<f64> {
        self.nrms[index as usize]
    }

    pub fn tris(&self) -> &[Triangle] {
        &self.tris
    }

    pub fn poss(&self) -> &[Vec3<f64>] {
        &self.poss
    }

    pub fn nrms(&self) -> &[Vec3<f64>] {
        &self.nrms
    }

    /// The vertex normal blended with barycentric weights and renormalized.
    pub fn interp_nrm(&self, tri: Triangle, bary: [f64; 3]) -> Vec3<f64> {
        let n = self.get_nrm(tri.indices[0]).scale(bary[0])
            + self.get_nrm(tri.indices[1]).scale(bary[1])
            + self.get_nrm(tri.indices[2]).scale(bary[2]);
        normalize_or_up(n)
    }
}

// Degenerate normals get replaced instead of turning into NaNs:
fn normalize_or_up(n: Vec3<f64>) -> Vec3<f64> {
    let len = n.length();
    if len > 0. && len.is_finite() {
        n.scale(1. / len)
    } else {
        Vec3 {
            x: 0.,
            y: 0.,
            z: 1.,
        }
    }
}

// The unnormalized cross product is proportional to the area, so summing it weighs larger
// triangles more:
fn generate_normals(poss: &[Vec3<f64>], tris: &[Triangle]) -> Vec<Vec3<f64>> {
    let mut nrms = vec![Vec3::zero(); poss.len()];
    for tri in tris {
        let [i0, i1, i2] = tri.indices;
        let p0 = poss[i0 as usize];
        let n = (poss[i1 as usize] - p0).cross(poss[i2 as usize] - p0);
        for &i in tri.indices.iter() {
            nrms[i as usize] += n;
        }
    }
    nrms.into_iter().map(normalize_or_up).collect()
}

/// The result of a successful ray-triangle test.
#[derive(Clone, Copy, Debug)]
pub struct TriHit {
    pub t: f64,
    /// Weights of the triangle's three vertices at the hit point.
    pub bary: [f64; 3],
}

// Stores extra information used to speed up ray intersection calculations:
pub struct RayIntInfo {
    shear: Vec3<f64>,
    perm: [usize; 3],
}

// Given a ray, calculates the ray intersection information used for
// efficient ray-triangle intersection.
pub fn calc_rayintinfo(ray: &Ray<f64>) -> RayIntInfo {
    let z = ray.dir.abs().max_dim();
    let x = if z == 2 { 0 } else { z + 1 };
    let y = if x == 2 { 0 } else { x + 1 };

    let perm = [x, y, z];
    let perm_dir = permute(ray.dir, perm);

    let inv_perm_dir_z = 1. / perm_dir.z;
    let shear = Vec3 {
        x: -perm_dir.x * inv_perm_dir_z,
        y: -perm_dir.y * inv_perm_dir_z,
        z: inv_perm_dir_z,
    };

    RayIntInfo { shear, perm }
}

fn permute(v: Vec3<f64>, perm: [usize; 3]) -> Vec3<f64> {
    Vec3 {
        x: v[perm[0]],
        y: v[perm[1]],
        z: v[perm[2]],
    }
}

impl Triangle {
    /// Watertight ray-triangle intersection (pbrt, 3.6.2). Hits past `t_far` are ignored.
    pub fn intersect(
        &self,
        ray: &Ray<f64>,
        t_far: f64,
        int_info: &RayIntInfo,
        mesh: &Mesh,
    ) -> Option<TriHit> {
        let poss = [
            mesh.get_pos(self.indices[0]),
            mesh.get_pos(self.indices[1]),
            mesh.get_pos(self.indices[2]),
        ];

        // Translate to the ray origin, permute so z is the dominant direction and shear:
        let pt = [
            permute(poss[0] - ray.org, int_info.perm),
            permute(poss[1] - ray.org, int_info.perm),
            permute(poss[2] - ray.org, int_info.perm),
        ];
        let shear = |p: Vec3<f64>| Vec3 {
            x: int_info.shear.x * p.z + p.x,
            y: int_info.shear.y * p.z + p.y,
            z: p.z,
        };
        let pt = [shear(pt[0]), shear(pt[1]), shear(pt[2])];

        // Calculate the edge function results:
        let e = [
            pt[1].x * pt[2].y - pt[1].y * pt[2].x,
            pt[2].x * pt[0].y - pt[2].y * pt[0].x,
            pt[0].x * pt[1].y - pt[0].y * pt[1].x,
        ];

        // Check if our ray lands outside of the edges of the triangle:
        if (e[0] < 0. || e[1] < 0. || e[2] < 0.) && (e[0] > 0. || e[1] > 0. || e[2] > 0.) {
            return None;
        }

        let sum_e = e[0] + e[1] + e[2];
        // Checks if it's a degenerate triangle:
        if sum_e == 0. {
            return None;
        }

        // Now we finish transforming the z value:
        let pz = [
            pt[0].z * int_info.shear.z,
            pt[1].z * int_info.shear.z,
            pt[2].z * int_info.shear.z,
        ];
        let t_scaled = e[0] * pz[0] + e[1] * pz[1] + e[2] * pz[2];

        // If the sign of sum is different from the sign of t_scaled, then no good:
        if (sum_e < 0. && (t_scaled >= 0. || t_scaled < t_far * sum_e))
            || (sum_e > 0. && (t_scaled <= 0. || t_scaled > t_far * sum_e))
        {
            return None;
        }

        let inv_sum_e = 1. / sum_e;
        let t = t_scaled * inv_sum_e;

        // Make sure t is conservatively greater than zero:
        let max_z = pz[0].abs().max(pz[1].abs().max(pz[2].abs()));
        let delta_z = gamma_f64(3) * max_z;

        let max_x = pt[0].x.abs().max(pt[1].x.abs().max(pt[2].x.abs()));
        let delta_x = gamma_f64(5) * (max_x + max_z);

        let max_y = pt[0].y.abs().max(pt[1].y.abs().max(pt[2].y.abs()));
        let delta_y = gamma_f64(5) * (max_y + max_z);

        let delta_e = 2. * (gamma_f64(2) * max_x * max_y + delta_y * max_x + delta_x * max_y);

        let max_e = e[0].abs().max(e[1].abs().max(e[2].abs()));
        let delta_t = 3.
            * (gamma_f64(3) * max_e * max_z + delta_e * max_z + delta_z * max_e)
            * inv_sum_e.abs();

        if t <= delta_t {
            return None;
        }

        Some(TriHit {
            t,
            bary: [e[0] * inv_sum_e, e[1] * inv_sum_e, e[2] * inv_sum_e],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn v(x: f64, y: f64, z: f64) -> Vec3<f64> {
        Vec3 { x, y, z }
    }

    fn quad() -> Mesh {
        let poss = vec![v(0., 0., 0.), v(1., 0., 0.), v(1., 1., 0.), v(0., 1., 0.)];
        let tris = vec![
            Triangle { indices: [0, 1, 2] },
            Triangle { indices: [0, 2, 3] },
        ];
        Mesh::new(poss, None, tris).unwrap()
    }

    #[test]
    fn generated_normals_follow_winding() {
        let mesh = quad();
        for n in mesh.nrms() {
            assert_abs_diff_eq!(n.length(), 1., epsilon = 1e-12);
            assert_abs_diff_eq!(n.x, 0., epsilon = 1e-12);
            assert_abs_diff_eq!(n.y, 0., epsilon = 1e-12);
            assert_abs_diff_eq!(n.z, 1., epsilon = 1e-12);
        }
    }

    #[test]
    fn given_normals_are_normalized() {
        let poss = vec![v(0., 0., 0.), v(1., 0., 0.), v(0., 1., 0.)];
        let nrms = vec![v(0., 0., 2.), v(3., 0., 4.), v(0., 0., 0.)];
        let tris = vec![Triangle { indices: [0, 1, 2] }];
        let mesh = Mesh::new(poss, Some(nrms), tris).unwrap();

        let n0 = mesh.get_nrm(0);
        assert_eq!((n0.x, n0.y, n0.z), (0., 0., 1.));
        let n1 = mesh.get_nrm(1);
        assert_abs_diff_eq!(n1.x, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(n1.y, 0., epsilon = 1e-12);
        assert_abs_diff_eq!(n1.z, 0.8, epsilon = 1e-12);
        // A zero normal can't be normalized and falls back to +z:
        let n2 = mesh.get_nrm(2);
        assert_eq!((n2.x, n2.y, n2.z), (0., 0., 1.));

        let blended = mesh.interp_nrm(mesh.get_tri(0), [0.5, 0.5, 0.]);
        assert_abs_diff_eq!(blended.length(), 1., epsilon = 1e-12);
        assert!(blended.x > 0. && blended.z > 0.);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let poss = vec![v(0., 0., 0.), v(1., 0., 0.), v(1., 1., 0.)];
        let tris = vec![Triangle { indices: [0, 1, 3] }];
        assert!(Mesh::new(poss, None, tris).is_err());
    }

    #[test]
    fn normal_count_must_match() {
        let poss = vec![v(0., 0., 0.), v(1., 0., 0.), v(1., 1., 0.)];
        let tris = vec![Triangle { indices: [0, 1, 2] }];
        assert!(Mesh::new(poss, Some(vec![v(0., 0., 1.)]), tris).is_err());
    }

    #[test]
    fn hit_barycentrics_reproduce_the_hit_point() {
        let mesh = quad();
        let ray = Ray::new(v(0.7, 0.2, 1.), v(0., 0., -1.));
        let info = calc_rayintinfo(&ray);
        let tri = mesh.get_tri(0);
        let hit = tri.intersect(&ray, f64::INFINITY, &info, &mesh).unwrap();
        assert_abs_diff_eq!(hit.t, 1., epsilon = 1e-12);

        let p = mesh.get_pos(tri.indices[0]).scale(hit.bary[0])
            + mesh.get_pos(tri.indices[1]).scale(hit.bary[1])
            + mesh.get_pos(tri.indices[2]).scale(hit.bary[2]);
        assert_abs_diff_eq!(p.x, 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 0.2, epsilon = 1e-12);

        // The other half of the quad is missed:
        assert!(mesh.get_tri(1).intersect(&ray, f64::INFINITY, &info, &mesh).is_none());
    }

    #[test]
    fn hits_behind_the_origin_or_past_t_far_are_ignored() {
        let mesh = quad();
        let tri = mesh.get_tri(0);
        let away = Ray::new(v(0.7, 0.2, 1.), v(0., 0., 1.));
        assert!(tri
            .intersect(&away, f64::INFINITY, &calc_rayintinfo(&away), &mesh)
            .is_none());
        let short = Ray::new(v(0.7, 0.2, 1.), v(0., 0., -1.));
        assert!(tri
            .intersect(&short, 0.5, &calc_rayintinfo(&short), &mesh)
            .is_none());
    }
}
