pub mod environment;
pub mod interreflection;
pub mod prt;
pub mod transport;

use crate::config::PropertyList;
use crate::scene::Scene;
use crate::sh::rotation::ShRotation;
use crate::sh::coefficient_count;
use crate::spectrum::Color;
use pmath::ray::Ray;
use simple_error::{bail, SimpleResult};

pub trait Integrator {
    /// Runs once per scene, before any call to `li`.
    fn preprocess(&mut self, scene: &Scene) -> SimpleResult<()>;
    /// Radiance arriving along the ray.
    fn li(&self, scene: &Scene, ray: &Ray<f64>) -> Color;
}

/// Which transfer function the vertex transport integrates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The clamped cosine only.
    Unshadowed,
    /// The clamped cosine, zero where the scene blocks the direction.
    Shadowed,
    /// Shadowed transport plus `bounce` levels of diffuse interreflection.
    Interreflection { bounce: u32 },
}

impl Mode {
    pub fn from_props(props: &PropertyList) -> SimpleResult<Self> {
        let name = props.get_string("type", "unshadowed")?;
        match name.as_str() {
            "unshadowed" => Ok(Mode::Unshadowed),
            "shadowed" => Ok(Mode::Shadowed),
            "interreflection" => {
                let bounce = props.get_integer("bounce", 1)?;
                if bounce < 0 {
                    bail!("The bounce count can't be negative ({})", bounce);
                }
                Ok(Mode::Interreflection {
                    bounce: bounce as u32,
                })
            }
            _ => bail!(
                "Unsupported PRT type \"{}\" (expected unshadowed, shadowed or interreflection)",
                name
            ),
        }
    }

    pub fn is_shadowed(self) -> bool {
        self != Mode::Unshadowed
    }
}

/// Lighting coefficients, one color per SH index.
#[derive(Clone, Debug, PartialEq)]
pub struct LightCoeffs {
    coeffs: Vec<Color>,
}

impl LightCoeffs {
    pub fn new_zero(order: u32) -> Self {
        LightCoeffs {
            coeffs: vec![Color::black(); coefficient_count(order)],
        }
    }

    pub fn from_vec(coeffs: Vec<Color>) -> Self {
        LightCoeffs { coeffs }
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn as_slice(&self) -> &[Color] {
        &self.coeffs
    }

    pub fn as_mut_slice(&mut self) -> &mut [Color] {
        &mut self.coeffs
    }

    /// `dot(L_channel, t)` for every channel.
    pub fn dot(&self, t: &[f64]) -> Color {
        self.coeffs
            .iter()
            .zip(t.iter())
            .fold(Color::black(), |acc, (l, &t)| acc + l.scale(t))
    }

    /// Rotates every channel.
    pub fn rotate(&mut self, rotation: &ShRotation) {
        for c in 0..3 {
            let mut channel: Vec<f64> = self.coeffs.iter().map(|l| l[c]).collect();
            rotation.apply(&mut channel);
            for (l, v) in self.coeffs.iter_mut().zip(channel) {
                l[c] = v;
            }
        }
    }
}

/// Transport coefficients of one mesh: one column of `sh_len` values per vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportCoeffs {
    sh_len: usize,
    data: Vec<f64>,
}

impl TransportCoeffs {
    pub fn new_zero(sh_len: usize, num_vert: usize) -> Self {
        TransportCoeffs {
            sh_len,
            data: vec![0.; sh_len * num_vert],
        }
    }

    pub fn from_columns(sh_len: usize, columns: Vec<Vec<f64>>) -> SimpleResult<Self> {
        let mut data = Vec::with_capacity(sh_len * columns.len());
        for (i, col) in columns.iter().enumerate() {
            if col.len() != sh_len {
                bail!(
                    "Transport column {} has {} coefficients, expected {}",
                    i,
                    col.len(),
                    sh_len
                );
            }
            data.extend_from_slice(col);
        }
        Ok(TransportCoeffs { sh_len, data })
    }

    pub fn sh_len(&self) -> usize {
        self.sh_len
    }

    pub fn num_vert(&self) -> usize {
        if self.sh_len == 0 {
            0
        } else {
            self.data.len() / self.sh_len
        }
    }

    pub fn vertex(&self, index: u32) -> &[f64] {
        let start = index as usize * self.sh_len;
        &self.data[start..start + self.sh_len]
    }

    /// One mutable column per vertex, for filling them in parallel.
    pub fn columns_mut(&mut self) -> Vec<&mut [f64]> {
        let sh_len = self.sh_len.max(1);
        self.data.chunks_mut(sh_len).collect()
    }

    /// Adds the three columns of a triangle, weighted by `bary` and `scale`, to `out`.
    pub fn add_interp(&self, indices: [u32; 3], bary: [f64; 3], scale: f64, out: &mut [f64]) {
        for (&index, &b) in indices.iter().zip(bary.iter()) {
            let w = b * scale;
            for (o, t) in out.iter_mut().zip(self.vertex(index)) {
                *o += w * t;
            }
        }
    }

    pub fn add_assign(&mut self, other: &TransportCoeffs) {
        debug_assert_eq!(self.data.len(), other.data.len());
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a += b;
        }
    }
}
