//! Spherical harmonic precomputed radiance transfer.
//!
//! A cubemap's lighting and the per-vertex transport of a set of meshes are projected onto
//! spherical harmonics; shading a point is then a dot product between the two.

pub mod bvh;
pub mod config;
pub mod cubemap;
pub mod file_io;
pub mod integrator;
pub mod mesh;
pub mod sampler;
pub mod scene;
pub mod sh;
pub mod spectrum;
pub mod threading;
