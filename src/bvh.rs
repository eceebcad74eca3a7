// The BVH is used to efficiently intersect every triangle of every mesh in the scene.

use crate::mesh::{calc_rayintinfo, Mesh, TriHit};
use pmath::bbox::BBox3;
use pmath::ray::Ray;
use pmath::vector::Vec3;

use arrayvec::ArrayVec;
use order_stat::kth_by;
use partition::partition;
use std::cmp::Ordering;

/// A single triangle of a single mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimRef {
    pub mesh_id: u32,
    pub tri_index: u32,
}

pub struct Bvh {
    prims: Vec<PrimRef>,     // Primitives, ordered so every leaf covers a contiguous range
    nodes: Vec<LinearNode>,  // The nodes that make up the tree, depth first
}

impl Bvh {
    // Number of buckets used for SAH:
    const BUCKET_COUNT: usize = 12;

    // Constructs a BVH over all of the triangles of `meshes` given the max number of triangles
    // per leaf node.
    pub fn new(meshes: &[Mesh], max_prim_per_node: u32) -> Self {
        let mut prim_infos = Vec::new();
        for (mesh_id, mesh) in meshes.iter().enumerate() {
            for (tri_index, tri) in mesh.tris().iter().enumerate() {
                let bound = tri
                    .indices
                    .iter()
                    .fold(BBox3::new(), |b, &i| b.combine_pnt(mesh.get_pos(i)));
                prim_infos.push(PrimInfo {
                    prim: PrimRef {
                        mesh_id: mesh_id as u32,
                        tri_index: tri_index as u32,
                    },
                    centroid: bound.centroid(),
                    bound,
                });
            }
        }

        let mut prims = Vec::with_capacity(prim_infos.len());
        let mut nodes = Vec::with_capacity(2 * prim_infos.len());
        if !prim_infos.is_empty() {
            Self::recursive_construct_tree(
                max_prim_per_node.max(1),
                &mut prim_infos,
                &mut prims,
                &mut nodes,
            );
        }

        Bvh { prims, nodes }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn bound(&self) -> BBox3<f64> {
        match self.nodes.first() {
            Some(node) => node.bound,
            None => BBox3::new(),
        }
    }

    /// Returns true if the ray hits anything before `t_far`.
    pub fn intersect_test(&self, meshes: &[Mesh], ray: &Ray<f64>, t_far: f64) -> bool {
        let mut found = false;
        self.traverse(ray, t_far, |prim, t_far, info| {
            let mesh = &meshes[prim.mesh_id as usize];
            let tri = mesh.get_tri(prim.tri_index as usize);
            if tri.intersect(ray, t_far, info, mesh).is_some() {
                found = true;
                return None;
            }
            Some(t_far)
        });
        found
    }

    /// Returns the closest hit before `t_far`.
    pub fn intersect(
        &self,
        meshes: &[Mesh],
        ray: &Ray<f64>,
        t_far: f64,
    ) -> Option<(PrimRef, TriHit)> {
        let mut closest = None;
        self.traverse(ray, t_far, |prim, t_far, info| {
            let mesh = &meshes[prim.mesh_id as usize];
            let tri = mesh.get_tri(prim.tri_index as usize);
            // Unlike the test, we can't return instantly, because there might be a closer
            // intersection:
            match tri.intersect(ray, t_far, info, mesh) {
                Some(hit) => {
                    closest = Some((prim, hit));
                    Some(hit.t)
                }
                None => Some(t_far),
            }
        });
        closest
    }

    // Visits the primitives of every leaf the ray passes through. `visit` returns the new
    // `t_far`, or `None` to stop traversal altogether.
    fn traverse<F>(&self, ray: &Ray<f64>, mut t_far: f64, mut visit: F)
    where
        F: FnMut(PrimRef, f64, &crate::mesh::RayIntInfo) -> Option<f64>,
    {
        if self.nodes.is_empty() {
            return;
        }

        let info = calc_rayintinfo(ray);
        let inv_dir = Vec3 {
            x: 1. / ray.dir.x,
            y: 1. / ray.dir.y,
            z: 1. / ray.dir.z,
        };
        // Taken from the inverse so that -0 directions count as negative:
        let is_dir_neg = inv_dir.comp_wise_is_neg();

        // This is the stack used to traverse the tree:
        let mut node_index_stack = ArrayVec::<[usize; 64]>::new();
        let mut curr_node_index = 0usize;
        loop {
            let curr_node = &self.nodes[curr_node_index];
            let mut next = None;
            if curr_node
                .bound
                .intersect_test(*ray, t_far, inv_dir, is_dir_neg)
            {
                match curr_node.kind {
                    NodeKind::Leaf { prim_index, num_prim } => {
                        let begin = prim_index as usize;
                        let end = begin + num_prim as usize;
                        for prim in self.prims[begin..end].iter() {
                            t_far = match visit(*prim, t_far, &info) {
                                Some(t) => t,
                                None => return,
                            };
                        }
                    }
                    NodeKind::Interior {
                        right_child_index,
                        split_axis,
                    } => {
                        // Visit the child closer to the ray origin first:
                        let left = curr_node_index + 1;
                        let right = right_child_index as usize;
                        let (first, second) = if is_dir_neg[split_axis as usize] {
                            (right, left)
                        } else {
                            (left, right)
                        };
                        node_index_stack.push(second);
                        next = Some(first);
                    }
                }
            }

            curr_node_index = match next.or_else(|| node_index_stack.pop()) {
                Some(val) => val,
                None => return,
            };
        }
    }

    // Recursively constructs the tree, writing nodes depth first. Returns the index of the
    // node that was written.
    fn recursive_construct_tree(
        max_prim_per_node: u32,
        prim_infos: &mut [PrimInfo],
        prims: &mut Vec<PrimRef>,
        nodes: &mut Vec<LinearNode>,
    ) -> usize {
        // A bound over all of the triangles we are currently working with:
        let all_bound = prim_infos
            .iter()
            .fold(BBox3::new(), |all_bound, info| all_bound.combine_bnd(info.bound));

        // The bound covering all of the centroids (used for SAH BVH construction):
        let centroid_bound = prim_infos
            .iter()
            .fold(BBox3::new(), |centroid_bound, info| {
                centroid_bound.combine_pnt(info.centroid)
            });
        let max_dim = centroid_bound.max_dim();

        // One triangle, or all of the centroids in the same spot, makes a leaf:
        if prim_infos.len() == 1 || centroid_bound.pmax[max_dim] == centroid_bound.pmin[max_dim] {
            return Self::push_leaf(all_bound, prim_infos, prims, nodes);
        }

        let bucket_of = |info: &PrimInfo| {
            let bucket_ratio = centroid_bound.offset(info.centroid)[max_dim];
            (((Self::BUCKET_COUNT as f64) * bucket_ratio) as usize).min(Self::BUCKET_COUNT - 1)
        };

        // If we have few triangles, just split it evenly:
        let (left_infos, right_infos) = if prim_infos.len() <= 4 {
            // kth_by is essentially nth_element from C++:
            let mid = prim_infos.len() / 2;
            kth_by(prim_infos, mid, |a, b| {
                a.centroid[max_dim]
                    .partial_cmp(&b.centroid[max_dim])
                    .unwrap_or(Ordering::Equal)
            });
            prim_infos.split_at_mut(mid)
        } else {
            // Otherwise, we perform this split based on surface-area heuristics:
            let mut buckets = [Bucket {
                count: 0,
                bound: BBox3::new(),
            }; Self::BUCKET_COUNT];
            for info in prim_infos.iter() {
                let bucket = &mut buckets[bucket_of(info)];
                bucket.count += 1;
                bucket.bound = bucket.bound.combine_bnd(info.bound);
            }

            // Cost of splitting after bucket i:
            let total_sa = all_bound.surface_area();
            let mut costs = [0f64; Self::BUCKET_COUNT - 1];
            for (i, cost) in costs.iter_mut().enumerate() {
                let (left, right) = buckets.split_at(i + 1);
                let sum = |bs: &[Bucket]| {
                    bs.iter().fold((BBox3::new(), 0u32), |(b, c), bucket| {
                        (b.combine_bnd(bucket.bound), c + bucket.count)
                    })
                };
                let (left_bound, left_count) = sum(left);
                let (right_bound, right_count) = sum(right);
                let left_cost = if left_count > 0 {
                    left_count as f64 * left_bound.surface_area()
                } else {
                    0.
                };
                let right_cost = if right_count > 0 {
                    right_count as f64 * right_bound.surface_area()
                } else {
                    0.
                };
                *cost = 0.125 + (left_cost + right_cost) / total_sa;
            }

            let (min_cost_index, min_cost) = costs
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |(bi, bc), (i, &c)| {
                    if c < bc {
                        (i, c)
                    } else {
                        (bi, bc)
                    }
                });

            if prim_infos.len() > max_prim_per_node as usize || min_cost < prim_infos.len() as f64 {
                partition(prim_infos, |info| bucket_of(info) <= min_cost_index)
            } else {
                // It isn't worth splitting any further:
                return Self::push_leaf(all_bound, prim_infos, prims, nodes);
            }
        };

        // Reserve our spot first so the left child always directly follows us:
        let curr_index = nodes.len();
        nodes.push(LinearNode {
            bound: all_bound,
            kind: NodeKind::Interior {
                right_child_index: 0,
                split_axis: max_dim as u8,
            },
        });
        Self::recursive_construct_tree(max_prim_per_node, left_infos, prims, nodes);
        let right = Self::recursive_construct_tree(max_prim_per_node, right_infos, prims, nodes);
        nodes[curr_index].kind = NodeKind::Interior {
            right_child_index: right as u32,
            split_axis: max_dim as u8,
        };
        curr_index
    }

    fn push_leaf(
        bound: BBox3<f64>,
        prim_infos: &[PrimInfo],
        prims: &mut Vec<PrimRef>,
        nodes: &mut Vec<LinearNode>,
    ) -> usize {
        let prim_index = prims.len() as u32;
        prims.extend(prim_infos.iter().map(|info| info.prim));
        nodes.push(LinearNode {
            bound,
            kind: NodeKind::Leaf {
                prim_index,
                num_prim: prim_infos.len() as u32,
            },
        });
        nodes.len() - 1
    }
}

// This is the bucket used for SAH splitting:
#[derive(Clone, Copy)]
struct Bucket {
    count: u32,
    bound: BBox3<f64>,
}

// Structure used to construct the BVH:
#[derive(Clone, Copy)]
struct PrimInfo {
    prim: PrimRef,
    centroid: Vec3<f64>,
    bound: BBox3<f64>,
}

#[derive(Clone, Copy)]
enum NodeKind {
    Leaf {
        prim_index: u32,
        num_prim: u32,
    },
    Interior {
        // The left child is always next to it in the array
        right_child_index: u32,
        split_axis: u8,
    },
}

#[derive(Clone, Copy)]
struct LinearNode {
    bound: BBox3<f64>,
    kind: NodeKind,
}
