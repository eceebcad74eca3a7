//! Cubemap faces, texel directions and texel solid angles.

use crate::spectrum::Color;
use image::ColorType;
use log::debug;
use pmath::vector::Vec3;
use simple_error::{bail, try_with, SimpleResult};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CubeFace {
    NegX,
    PosX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

/// The order the faces are loaded and stored in.
pub const FACES: [CubeFace; 6] = [
    CubeFace::NegX,
    CubeFace::PosX,
    CubeFace::PosY,
    CubeFace::NegY,
    CubeFace::PosZ,
    CubeFace::NegZ,
];

/// The axes a face's texel grid is laid out along, and the face's outward normal.
#[derive(Clone, Copy, Debug)]
pub struct FaceBasis {
    pub x_axis: Vec3<f64>,
    pub y_axis: Vec3<f64>,
    pub normal: Vec3<f64>,
}

const fn v(x: f64, y: f64, z: f64) -> Vec3<f64> {
    Vec3 { x, y, z }
}

impl CubeFace {
    /// File stem of the face inside a cubemap directory.
    pub fn name(self) -> &'static str {
        match self {
            CubeFace::NegX => "negx",
            CubeFace::PosX => "posx",
            CubeFace::PosY => "posy",
            CubeFace::NegY => "negy",
            CubeFace::PosZ => "posz",
            CubeFace::NegZ => "negz",
        }
    }

    pub fn basis(self) -> FaceBasis {
        let (x_axis, y_axis, normal) = match self {
            CubeFace::NegX => (v(0., 0., 1.), v(0., -1., 0.), v(-1., 0., 0.)),
            CubeFace::PosX => (v(0., 0., 1.), v(0., -1., 0.), v(1., 0., 0.)),
            CubeFace::NegY => (v(1., 0., 0.), v(0., 0., -1.), v(0., -1., 0.)),
            CubeFace::PosY => (v(1., 0., 0.), v(0., 0., 1.), v(0., 1., 0.)),
            CubeFace::NegZ => (v(-1., 0., 0.), v(0., -1., 0.), v(0., 0., -1.)),
            CubeFace::PosZ => (v(1., 0., 0.), v(0., -1., 0.), v(0., 0., 1.)),
        };
        FaceBasis {
            x_axis,
            y_axis,
            normal,
        }
    }
}

/// Direction through the center of texel `(x, y)` of `face`.
pub fn texel_direction(
    face: CubeFace,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> Vec3<f64> {
    let u = 2. * (x as f64 + 0.5) / width as f64 - 1.;
    let v = 2. * (y as f64 + 0.5) / height as f64 - 1.;
    let basis = face.basis();
    (basis.x_axis.scale(u) + basis.y_axis.scale(v) + basis.normal).normalize()
}

// Solid angle of the region of a face between its center and (x, y) on the [-1, 1] plane.
fn area_element(x: f64, y: f64) -> f64 {
    (x * y).atan2((x * x + y * y + 1.).sqrt())
}

/// Solid angle subtended by texel `(x, y)`. It's the same on every face.
pub fn texel_solid_angle(x: usize, y: usize, width: usize, height: usize) -> f64 {
    let u = 2. * (x as f64 + 0.5) / width as f64 - 1.;
    let v = 2. * (y as f64 + 0.5) / height as f64 - 1.;
    let inv_w = 1. / width as f64;
    let inv_h = 1. / height as f64;

    let x0 = u - inv_w;
    let y0 = v - inv_h;
    let x1 = u + inv_w;
    let y1 = v + inv_h;
    area_element(x0, y0) - area_element(x0, y1) - area_element(x1, y0) + area_element(x1, y1)
}

/// Six faces of linear radiance, stored in `FACES` order.
pub struct CubeMap {
    width: usize,
    height: usize,
    faces: Vec<Vec<Color>>,
}

impl CubeMap {
    /// Builds a cubemap from already decoded faces. Every face needs `width * height` texels.
    pub fn from_faces(width: usize, height: usize, faces: Vec<Vec<Color>>) -> SimpleResult<Self> {
        if faces.len() != FACES.len() {
            bail!("A cubemap needs 6 faces, got {}.", faces.len());
        }
        if width == 0 || height == 0 {
            bail!("Cubemap faces can't be empty.");
        }
        for (face, texels) in FACES.iter().zip(faces.iter()) {
            if texels.len() != width * height {
                bail!(
                    "Cubemap face {} has {} texels, expected {}.",
                    face.name(),
                    texels.len(),
                    width * height
                );
            }
        }
        Ok(CubeMap {
            width,
            height,
            faces,
        })
    }

    /// Loads `<dir>/<face>.<extension>` for all six faces. LDR images are converted to linear
    /// with a 2.2 gamma, HDR images are taken as they are. Every face must have the same
    /// resolution and channel count.
    pub fn load(dir: &Path, extension: &str) -> SimpleResult<Self> {
        let mut faces = Vec::with_capacity(FACES.len());
        let mut format: Option<(u32, u32, u8)> = None;

        for face in FACES.iter() {
            let path = dir.join(format!("{}.{}", face.name(), extension));
            if !path.is_file() {
                bail!("Missing cubemap face: {}", path.display());
            }
            let img = try_with!(
                image::open(&path),
                "could not read cubemap face {}",
                path.display()
            );

            let channels = img.color().channel_count();
            let is_hdr = matches!(img.color(), ColorType::Rgb32F | ColorType::Rgba32F);
            let rgb = img.to_rgb32f();
            let (width, height) = rgb.dimensions();

            match format {
                None => format = Some((width, height, channels)),
                Some((w, h, c)) if (w, h, c) != (width, height, channels) => bail!(
                    "Cubemap face {} is {}x{} with {} channels, expected {}x{} with {} channels.",
                    path.display(),
                    width,
                    height,
                    channels,
                    w,
                    h,
                    c
                ),
                _ => (),
            }

            let texels = rgb
                .pixels()
                .map(|p| {
                    let c = Color::new(p[0] as f64, p[1] as f64, p[2] as f64);
                    if is_hdr {
                        c
                    } else {
                        c.pow(2.2)
                    }
                })
                .collect::<Vec<_>>();

            debug!("Loaded cubemap face {} ({}x{})", path.display(), width, height);
            faces.push(texels);
        }

        match format {
            Some((width, height, _)) => CubeMap::from_faces(width as usize, height as usize, faces),
            None => bail!("No cubemap faces were loaded."),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn texel(&self, face: usize, x: usize, y: usize) -> Color {
        self.faces[face][y * self.width + x]
    }
}
