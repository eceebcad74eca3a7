//! The precomputed radiance transfer integrator.
//!
//! `preprocess` projects the environment lighting and the transport of every mesh vertex onto
//! SH, and writes both to text files. Afterwards `li` shades a hit with one dot product per
//! corner vertex and color channel.

use super::environment::project_environment;
use super::interreflection::add_interreflection;
use super::transport::{project_direct, TransportParam};
use super::{Integrator, LightCoeffs, Mode, TransportCoeffs};
use crate::config::PropertyList;
use crate::cubemap::CubeMap;
use crate::file_io;
use crate::scene::{RayCaster, Scene};
use crate::sh::rotation::ShRotation;
use crate::spectrum::Color;
use crate::threading::ThreadParam;
use log::info;
use pmath::ray::Ray;
use simple_error::{bail, SimpleResult};
use std::path::{Path, PathBuf};
use std::time::Instant;

// Vertices per batch handed to a thread, texel rows are handed out one at a time:
const VERTEX_BATCH: usize = 64;

pub struct PrtIntegrator {
    mode: Mode,
    order: u32,
    sample_count: u32,
    seed: u64,
    num_threads: u32,
    cubemap_dir: PathBuf,
    extension: String,
    skip_first_face: bool,
    output_dir: PathBuf,
    rotation: Option<ShRotation>,

    // Lighting as projected, before any rotation:
    light: Option<LightCoeffs>,
    // What `li` actually uses:
    shading_light: Option<LightCoeffs>,
    transport: Vec<TransportCoeffs>,
}

impl PrtIntegrator {
    /// Reads the integrator's properties. Fails on an unknown mode or a bad value before any
    /// work is done.
    pub fn new(props: &PropertyList) -> SimpleResult<Self> {
        let mode = Mode::from_props(props)?;

        let order = props.get_integer("order", 2)?;
        if order < 0 || order > 16 {
            bail!("SH order must be between 0 and 16, got {}", order);
        }
        let order = order as u32;

        let sample_count = props.get_integer("sample_count", 100)?;
        if sample_count < 1 || sample_count > u32::MAX as i64 {
            bail!("sample_count must be positive, got {}", sample_count);
        }

        let seed = props.get_integer("seed", 0)? as u64;
        let num_threads = match props.get_integer("threads", 0)? {
            t if t < 0 => bail!("threads can't be negative, got {}", t),
            0 => ThreadParam::all_cores(VERTEX_BATCH).num_threads,
            t => t as u32,
        };

        let cubemap_dir = match props.get_path("cubemap")? {
            Some(dir) => dir,
            None => bail!("The PRT integrator needs a cubemap directory"),
        };
        let extension = props.get_string("extension", "jpg")?;
        let skip_first_face = props.get_bool("skip_first_face", false)?;
        let output_dir = props.get_path("output")?.unwrap_or_else(|| cubemap_dir.clone());

        let rotation = match props.get_rotation("light_rotation")? {
            Some(rot) => Some(ShRotation::new(order, rot)?),
            None => None,
        };

        info!(
            "PRT integrator: {:?}, order {}, {} samples, seed {}, {} threads",
            mode, order, sample_count, seed, num_threads
        );

        Ok(PrtIntegrator {
            mode,
            order,
            sample_count: sample_count as u32,
            seed,
            num_threads,
            cubemap_dir,
            extension,
            skip_first_face,
            output_dir,
            rotation,
            light: None,
            shading_light: None,
            transport: Vec::new(),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// The lighting as projected from the cubemap.
    pub fn light(&self) -> Option<&LightCoeffs> {
        self.light.as_ref()
    }

    /// One transport table per mesh, in scene order.
    pub fn transport(&self) -> &[TransportCoeffs] {
        &self.transport
    }

    /// Sets the coefficients `li` works with, rotating the lighting if the integrator was
    /// configured with a `light_rotation`.
    pub fn set_coeffs(&mut self, light: LightCoeffs, transport: Vec<TransportCoeffs>) {
        let mut shading_light = light.clone();
        if let Some(rotation) = self.rotation.as_ref() {
            shading_light.rotate(rotation);
        }
        self.light = Some(light);
        self.shading_light = Some(shading_light);
        self.transport = transport;
    }

    fn threads(&self, batch_size: usize) -> ThreadParam {
        ThreadParam {
            num_threads: self.num_threads,
            batch_size,
        }
    }

    /// Computes the lighting and transport coefficients without touching the file system.
    pub fn compute(&mut self, scene: &Scene, cubemap: &CubeMap) -> SimpleResult<()> {
        let start = Instant::now();
        let light = project_environment(
            cubemap,
            self.order,
            self.skip_first_face,
            self.threads(1),
        )?;
        info!("Projected the environment in {:.2?}", start.elapsed());

        let param = TransportParam {
            order: self.order,
            sample_count: self.sample_count,
            seed: self.seed,
            shadowed: self.mode.is_shadowed(),
            ray_bias: scene.ray_bias(),
            threads: self.threads(VERTEX_BATCH),
        };

        let start = Instant::now();
        let mut direct = Vec::with_capacity(scene.meshes().len());
        for (mesh_id, mesh) in scene.meshes().iter().enumerate() {
            direct.push(project_direct(scene, mesh_id as u32, mesh, &param)?);
        }
        info!("Projected the direct transport in {:.2?}", start.elapsed());

        let transport = match self.mode {
            Mode::Interreflection { bounce } => {
                add_interreflection(scene, scene.meshes(), direct, bounce, &param)?
            }
            _ => direct,
        };

        self.set_coeffs(light, transport);
        Ok(())
    }

    /// Writes `light.txt` and one transport file per mesh (`transport.txt` for the first,
    /// `transport_<i>.txt` for the rest) into the output directory. Returns the written paths.
    pub fn write_outputs(&self, scene: &Scene) -> SimpleResult<Vec<PathBuf>> {
        let light = match self.light.as_ref() {
            Some(light) => light,
            None => bail!("Nothing to write, the integrator hasn't been run yet"),
        };
        write_outputs(&self.output_dir, scene, light, &self.transport)
    }
}

/// Paths of the coefficient files for a scene with `num_meshes` meshes.
pub fn output_paths(dir: &Path, num_meshes: usize) -> (PathBuf, Vec<PathBuf>) {
    let transport = (0..num_meshes)
        .map(|i| {
            if i == 0 {
                dir.join("transport.txt")
            } else {
                dir.join(format!("transport_{}.txt", i))
            }
        })
        .collect();
    (dir.join("light.txt"), transport)
}

fn write_outputs(
    dir: &Path,
    scene: &Scene,
    light: &LightCoeffs,
    transport: &[TransportCoeffs],
) -> SimpleResult<Vec<PathBuf>> {
    if transport.len() != scene.meshes().len() {
        bail!(
            "Have transport for {} meshes, the scene has {}",
            transport.len(),
            scene.meshes().len()
        );
    }
    if let Err(e) = std::fs::create_dir_all(dir) {
        bail!("could not create {}: {}", dir.display(), e);
    }

    let (light_path, transport_paths) = output_paths(dir, transport.len());
    file_io::prt::write_light(&light_path, light)?;
    info!("Wrote {}", light_path.display());

    for ((path, mesh), t) in transport_paths
        .iter()
        .zip(scene.meshes().iter())
        .zip(transport.iter())
    {
        file_io::prt::write_transport(path, mesh, t)?;
        info!("Wrote {}", path.display());
    }

    let mut written = vec![light_path];
    written.extend(transport_paths);
    Ok(written)
}

impl PrtIntegrator {
    /// Shades the first surface the ray hits, black if it hits nothing (or if there are no
    /// coefficients yet).
    pub fn radiance<S: RayCaster>(&self, scene: &S, ray: &Ray<f64>) -> Color {
        let light = match self.shading_light.as_ref() {
            Some(light) => light,
            None => return Color::black(),
        };
        let hit = match scene.intersect(ray) {
            Some(hit) => hit,
            None => return Color::black(),
        };
        let transport = match self.transport.get(hit.mesh_id as usize) {
            Some(transport) => transport,
            None => return Color::black(),
        };

        hit.indices
            .iter()
            .zip(hit.bary.iter())
            .fold(Color::black(), |acc, (&index, &b)| {
                acc + light.dot(transport.vertex(index)).scale(b)
            })
    }
}

impl Integrator for PrtIntegrator {
    fn preprocess(&mut self, scene: &Scene) -> SimpleResult<()> {
        info!("Loading cubemap from {}", self.cubemap_dir.display());
        let cubemap = CubeMap::load(&self.cubemap_dir, &self.extension)?;
        self.compute(scene, &cubemap)?;
        self.write_outputs(scene)?;
        Ok(())
    }

    fn li(&self, scene: &Scene, ray: &Ray<f64>) -> Color {
        self.radiance(scene, ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_scene_desc_str;
    use crate::cubemap::FACES;
    use crate::integrator::transport::tests::{square, v};
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};

    fn integrator_props(base_dir: &Path, body: &str) -> PropertyList {
        let script = format!("#{{ meshes: [\"unused.ply\"], integrator: #{{ {} }} }}", body);
        load_scene_desc_str(&script, base_dir).unwrap().integrator
    }

    // A small cubemap where every face (and every texel) is different:
    fn write_cubemap(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        for (i, face) in FACES.iter().enumerate() {
            let img = RgbImage::from_fn(4, 4, |x, y| {
                Rgb([(40 * i) as u8, (x * 50) as u8, (y * 60 + 10) as u8])
            });
            img.save(dir.join(format!("{}.png", face.name()))).unwrap();
        }
    }

    #[test]
    fn bad_properties_are_errors() {
        let dir = Path::new("/scenes");
        let bad = [
            r#"type: "glossy", cubemap: "cube""#,
            r#"type: "shadowed""#,
            r#"type: "interreflection", bounce: -1, cubemap: "cube""#,
            r#"cubemap: "cube", sample_count: 0"#,
            r#"cubemap: "cube", threads: -2"#,
            r#"cubemap: "cube", order: -1"#,
        ];
        for body in bad.iter() {
            assert!(PrtIntegrator::new(&integrator_props(dir, body)).is_err(), "{}", body);
        }

        let prt = PrtIntegrator::new(&integrator_props(dir, r#"cubemap: "cube""#)).unwrap();
        assert_eq!(prt.mode(), Mode::Unshadowed);
        assert_eq!(prt.order(), 2);
        assert_eq!(prt.output_dir, PathBuf::from("/scenes/cube"));
        assert_eq!(prt.extension, "jpg");
    }

    #[test]
    fn radiance_blends_vertex_shading() {
        let scene = Scene::new(vec![square(1., 0., 1.)]);
        let mut prt =
            PrtIntegrator::new(&integrator_props(Path::new("."), r#"cubemap: "cube""#)).unwrap();

        let down = Ray::new(v(0.1, -0.5, 1.), v(0., 0., -1.));
        // Nothing computed yet:
        assert!(prt.li(&scene, &down).is_black());

        let light = LightCoeffs::from_vec(vec![Color::new(1., 2., 3.)]);
        let columns = vec![vec![1.], vec![2.], vec![0.], vec![0.], vec![4.]];
        let transport = TransportCoeffs::from_columns(1, columns).unwrap();
        prt.set_coeffs(light, vec![transport]);

        // (0.1, -0.5) is 0.2 of vertex 0, 0.3 of vertex 1 and 0.5 of the center:
        let c = prt.li(&scene, &down);
        assert_abs_diff_eq!(c.r, 2.8, epsilon = 1e-9);
        assert_abs_diff_eq!(c.g, 5.6, epsilon = 1e-9);
        assert_abs_diff_eq!(c.b, 8.4, epsilon = 1e-9);

        let miss = Ray::new(v(3., 0., 1.), v(0., 0., -1.));
        assert!(prt.li(&scene, &miss).is_black());
    }

    #[test]
    fn rotation_only_changes_shading_light() {
        let dir = Path::new(".");
        let mut plain = PrtIntegrator::new(&integrator_props(dir, r#"cubemap: "cube""#)).unwrap();
        let mut rotated = PrtIntegrator::new(&integrator_props(
            dir,
            r#"cubemap: "cube", light_rotation: rotate(90.0, vec3(0.0, 0.0, 1.0))"#,
        ))
        .unwrap();

        // A light that is all along x, and a transport that only picks up x:
        let mut coeffs = vec![Color::black(); 9];
        coeffs[3] = Color::from_scalar(1.);
        let mut column = vec![0.; 9];
        column[3] = 1.;
        let transport = TransportCoeffs::from_columns(9, vec![column; 5]).unwrap();

        let light = LightCoeffs::from_vec(coeffs);
        plain.set_coeffs(light.clone(), vec![transport.clone()]);
        rotated.set_coeffs(light.clone(), vec![transport]);
        assert_eq!(rotated.light(), Some(&light));

        let scene = Scene::new(vec![square(1., 0., 1.)]);
        let down = Ray::new(v(0.1, -0.5, 1.), v(0., 0., -1.));
        assert_abs_diff_eq!(plain.li(&scene, &down).r, 1., epsilon = 1e-9);
        assert_abs_diff_eq!(rotated.li(&scene, &down).r, 0., epsilon = 1e-8);
    }

    fn run_pipeline(dir: &Path, output: &str, threads: u32) -> Vec<Vec<u8>> {
        let body = format!(
            r#"type: "interreflection", bounce: 1, cubemap: "cube", extension: "png",
               sample_count: 12 * 12, seed: 3, threads: {}, output: "{}""#,
            threads, output
        );
        let mut prt = PrtIntegrator::new(&integrator_props(dir, &body)).unwrap();
        let scene = Scene::new(vec![square(1., 0., 1.), square(1., 1., -1.)]);
        prt.preprocess(&scene).unwrap();

        let (light_path, transport_paths) = output_paths(&dir.join(output), 2);
        assert_eq!(transport_paths[0].file_name().unwrap(), "transport.txt");
        assert_eq!(transport_paths[1].file_name().unwrap(), "transport_1.txt");

        let mut files = vec![std::fs::read(light_path).unwrap()];
        for path in transport_paths {
            files.push(std::fs::read(path).unwrap());
        }
        files
    }

    #[test]
    fn pipeline_output_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        write_cubemap(&dir.path().join("cube"));

        let first = run_pipeline(dir.path(), "a", 1);
        let again = run_pipeline(dir.path(), "b", 1);
        let threaded = run_pipeline(dir.path(), "c", 3);
        assert_eq!(first, again);
        assert_eq!(first, threaded);

        // The written light reads back as what was computed:
        let light = file_io::prt::read_light(&dir.path().join("a").join("light.txt")).unwrap();
        assert_eq!(light.len(), 9);
        assert!(!light.as_slice()[0].is_black());

        // The transport reads back as finite numbers, and both squares see some of the sky:
        let scene = Scene::new(vec![square(1., 0., 1.), square(1., 1., -1.)]);
        let (_, transport_paths) = output_paths(&dir.path().join("a"), 2);
        for (path, mesh) in transport_paths.iter().zip(scene.meshes().iter()) {
            let transport = file_io::prt::read_transport(path)
                .unwrap()
                .into_coeffs(mesh)
                .unwrap();
            assert_eq!(transport.num_vert(), 5);
            assert_eq!(transport.sh_len(), 9);
            for vertex in 0..5 {
                let column = transport.vertex(vertex);
                assert!(column.iter().all(|t| t.is_finite()));
                assert!(column[0] > 0.);
            }
        }
    }

    #[test]
    fn writing_before_computing_is_an_error() {
        let prt =
            PrtIntegrator::new(&integrator_props(Path::new("."), r#"cubemap: "cube""#)).unwrap();
        let scene = Scene::new(vec![square(1., 0., 1.)]);
        assert!(prt.write_outputs(&scene).is_err());
    }
}
