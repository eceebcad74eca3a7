use crate::bvh::Bvh;
use crate::mesh::Mesh;
use log::info;
use pmath::ray::Ray;
use pmath::vector::Vec3;

/// Everything the precomputation needs to know about a ray hitting a triangle.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceHit {
    pub mesh_id: u32,
    /// Vertex indices of the hit triangle, in the mesh's own order.
    pub indices: [u32; 3],
    /// Weight of each of the three vertices at the hit point.
    pub bary: [f64; 3],
    /// The hit point itself.
    pub p: Vec3<f64>,
}

/// The ray queries the precomputation and the shading need from a scene.
pub trait RayCaster: Sync {
    /// Returns true if the ray hits anything.
    fn intersect_test(&self, ray: &Ray<f64>) -> bool;
    /// Returns the closest hit, if any.
    fn intersect(&self, ray: &Ray<f64>) -> Option<SurfaceHit>;
}

pub struct Scene {
    meshes: Vec<Mesh>,
    bvh: Bvh,
    ray_bias: f64,
}

impl Scene {
    const MAX_PRIM_PER_NODE: u32 = 4;
    // Relative to the diagonal of the scene's bound:
    const RAY_BIAS_SCALE: f64 = 1e-5;

    pub fn new(meshes: Vec<Mesh>) -> Self {
        let bvh = Bvh::new(&meshes, Self::MAX_PRIM_PER_NODE);
        let bound = bvh.bound();
        let ray_bias = if meshes.iter().any(|m| m.num_tri() > 0) {
            (bound.diagonal().length() * Self::RAY_BIAS_SCALE).max(1e-9)
        } else {
            1e-9
        };
        info!(
            "Built scene: {} meshes, {} BVH nodes",
            meshes.len(),
            bvh.num_nodes()
        );
        Scene {
            meshes,
            bvh,
            ray_bias,
        }
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// How far rays leaving a surface are pushed along their direction.
    pub fn ray_bias(&self) -> f64 {
        self.ray_bias
    }
}

impl RayCaster for Scene {
    fn intersect_test(&self, ray: &Ray<f64>) -> bool {
        self.bvh.intersect_test(&self.meshes, ray, f64::INFINITY)
    }

    fn intersect(&self, ray: &Ray<f64>) -> Option<SurfaceHit> {
        let (prim, hit) = self.bvh.intersect(&self.meshes, ray, f64::INFINITY)?;
        let mesh = &self.meshes[prim.mesh_id as usize];
        Some(SurfaceHit {
            mesh_id: prim.mesh_id,
            indices: mesh.get_tri(prim.tri_index as usize).indices,
            bary: hit.bary,
            p: ray.point_at(hit.t),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Triangle;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hit_carries_point_and_indices() {
        let poss = vec![
            Vec3 { x: -1., y: -1., z: 0. },
            Vec3 { x: 3., y: -1., z: 0. },
            Vec3 { x: -1., y: 3., z: 0. },
        ];
        let mesh = Mesh::new(poss, None, vec![Triangle { indices: [2, 0, 1] }]).unwrap();
        let scene = Scene::new(vec![mesh]);

        let ray = Ray::new(Vec3 { x: 0.25, y: 0.5, z: 2. }, Vec3 { x: 0., y: 0., z: -1. });
        let hit = scene.intersect(&ray).unwrap();
        assert_eq!(hit.indices, [2, 0, 1]);
        assert_abs_diff_eq!(hit.p.x, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.p.y, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.bary.iter().sum::<f64>(), 1., epsilon = 1e-12);
        assert!(scene.intersect_test(&ray));

        let miss = Ray::new(Vec3 { x: 5., y: 5., z: 2. }, Vec3 { x: 0., y: 0., z: -1. });
        assert!(scene.intersect(&miss).is_none());
        assert!(!scene.intersect_test(&miss));
    }

    #[test]
    fn bias_scales_with_the_scene() {
        let poss = vec![
            Vec3 { x: 0., y: 0., z: 0. },
            Vec3 { x: 100., y: 0., z: 0. },
            Vec3 { x: 0., y: 100., z: 0. },
        ];
        let mesh = Mesh::new(poss, None, vec![Triangle { indices: [0, 1, 2] }]).unwrap();
        let scene = Scene::new(vec![mesh]);
        assert_abs_diff_eq!(scene.ray_bias(), 100. * 2f64.sqrt() * 1e-5, epsilon = 1e-12);
    }
}
