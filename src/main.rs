use env_logger::Env;
use log::{error, info};
use prt::config::load_scene_desc;
use prt::file_io::ply;
use prt::integrator::prt::PrtIntegrator;
use prt::integrator::Integrator;
use prt::scene::Scene;
use simple_error::SimpleResult;
use std::path::Path;
use std::time::Instant;

fn run(script: &Path) -> SimpleResult<()> {
    let desc = load_scene_desc(script)?;

    let mut meshes = Vec::with_capacity(desc.mesh_paths.len());
    for path in desc.mesh_paths.iter() {
        meshes.push(ply::load_path(path)?);
    }

    let start = Instant::now();
    let scene = Scene::new(meshes);
    info!("Built the BVH in {:.2?}", start.elapsed());

    let mut integrator = PrtIntegrator::new(&desc.integrator)?;
    let start = Instant::now();
    integrator.preprocess(&scene)?;
    info!("Precomputation finished in {:.2?}", start.elapsed());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let script = match std::env::args().nth(1) {
        Some(script) => script,
        None => {
            error!("usage: prism-prt <scene.rhai>");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(Path::new(&script)) {
        error!("{}", e);
        std::process::exit(1);
    }
}
