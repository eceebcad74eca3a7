//! Scene files are Rhai scripts that evaluate to an object map:
//!
//! ```text
//! #{
//!     meshes: ["mary.ply"],
//!     integrator: #{
//!         type: "shadowed",
//!         cubemap: "cubemap/GraceCathedral",
//!         sample_count: 100,
//!         light_rotation: rotate(90.0, vec3(0.0, 1.0, 0.0)),
//!     },
//! }
//! ```
//!
//! Being a script, a scene can compute its values instead of listing them. Relative paths are
//! resolved against the directory the script is in.

use pmath::matrix::Mat3;
use pmath::vector::Vec3;
use rhai::{Dynamic, Engine, Map};
use simple_error::{bail, try_with, SimpleResult};
use std::path::{Path, PathBuf};

/// Creates an engine with the math types scene scripts can use.
pub fn create_engine() -> Engine {
    let mut engine = Engine::new();
    register_math_types(&mut engine);
    engine
}

/// Given a scripting Engine, registers the math types.
pub fn register_math_types(engine: &mut Engine) {
    engine
        .register_type_with_name::<Vec3<f64>>("Vec3")
        .register_fn("vec3", |x: f64, y: f64, z: f64| Vec3 { x, y, z })
        .register_fn("vec3", |x: i64, y: i64, z: i64| Vec3 {
            x: x as f64,
            y: y as f64,
            z: z as f64,
        })
        .register_fn("scale", |v: Vec3<f64>, s: f64| v.scale(s))
        .register_get_set(
            "x",
            |v: &mut Vec3<f64>| v.x,
            |v: &mut Vec3<f64>, s: f64| {
                v.x = s;
            },
        )
        .register_get_set(
            "y",
            |v: &mut Vec3<f64>| v.y,
            |v: &mut Vec3<f64>, s: f64| {
                v.y = s;
            },
        )
        .register_get_set(
            "z",
            |v: &mut Vec3<f64>| v.z,
            |v: &mut Vec3<f64>, s: f64| {
                v.z = s;
            },
        );

    engine
        .register_type_with_name::<Mat3<f64>>("Rotation")
        .register_fn("identity", Mat3::<f64>::new_identity)
        .register_fn("rotate", |deg: f64, axis: Vec3<f64>| Mat3::new_rotate(deg, axis))
        .register_fn("rotate", |deg: i64, axis: Vec3<f64>| {
            Mat3::new_rotate(deg as f64, axis)
        })
        .register_fn("*", |r0: Mat3<f64>, r1: Mat3<f64>| r0 * r1);
}

/// A list of named values with typed getters. Getters fall back to a default when the value
/// is absent and fail when it has the wrong type.
#[derive(Clone, Debug)]
pub struct PropertyList {
    map: Map,
    base_dir: PathBuf,
}

impl PropertyList {
    pub fn new(map: Map, base_dir: PathBuf) -> Self {
        PropertyList { map, base_dir }
    }

    pub fn get_integer(&self, name: &str, default: i64) -> SimpleResult<i64> {
        match self.map.get(name) {
            None => Ok(default),
            Some(v) => match v.as_int() {
                Ok(i) => Ok(i),
                Err(t) => bail!("Property \"{}\" must be an integer, got {}", name, t),
            },
        }
    }

    /// Integers are accepted for floats as well.
    pub fn get_float(&self, name: &str, default: f64) -> SimpleResult<f64> {
        match self.map.get(name) {
            None => Ok(default),
            Some(v) => match (v.as_float(), v.as_int()) {
                (Ok(f), _) => Ok(f),
                (_, Ok(i)) => Ok(i as f64),
                _ => bail!("Property \"{}\" must be a number, got {}", name, v.type_name()),
            },
        }
    }

    pub fn get_bool(&self, name: &str, default: bool) -> SimpleResult<bool> {
        match self.map.get(name) {
            None => Ok(default),
            Some(v) => match v.as_bool() {
                Ok(b) => Ok(b),
                Err(t) => bail!("Property \"{}\" must be a bool, got {}", name, t),
            },
        }
    }

    pub fn get_string(&self, name: &str, default: &str) -> SimpleResult<String> {
        match self.map.get(name) {
            None => Ok(default.to_string()),
            Some(v) => string_of(name, v),
        }
    }

    /// A path relative to the scene script, if the property exists.
    pub fn get_path(&self, name: &str) -> SimpleResult<Option<PathBuf>> {
        match self.map.get(name) {
            None => Ok(None),
            Some(v) => Ok(Some(self.resolve(&string_of(name, v)?))),
        }
    }

    pub fn get_path_array(&self, name: &str) -> SimpleResult<Vec<PathBuf>> {
        let v = match self.map.get(name) {
            None => return Ok(Vec::new()),
            Some(v) => v,
        };
        let array = match v.clone().into_array() {
            Ok(array) => array,
            Err(t) => bail!("Property \"{}\" must be an array, got {}", name, t),
        };
        let mut paths = Vec::with_capacity(array.len());
        for item in array.iter() {
            paths.push(self.resolve(&string_of(name, item)?));
        }
        Ok(paths)
    }

    pub fn get_rotation(&self, name: &str) -> SimpleResult<Option<Mat3<f64>>> {
        match self.map.get(name) {
            None => Ok(None),
            Some(v) => match v.clone().try_cast::<Mat3<f64>>() {
                Some(m) => Ok(Some(m)),
                None => bail!(
                    "Property \"{}\" must be a rotation, got {}",
                    name,
                    v.type_name()
                ),
            },
        }
    }

    /// A nested object map, sharing the same base directory.
    pub fn get_child(&self, name: &str) -> SimpleResult<Option<PropertyList>> {
        match self.map.get(name) {
            None => Ok(None),
            Some(v) => match v.clone().try_cast::<Map>() {
                Some(map) => Ok(Some(PropertyList::new(map, self.base_dir.clone()))),
                None => bail!(
                    "Property \"{}\" must be an object map, got {}",
                    name,
                    v.type_name()
                ),
            },
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

fn string_of(name: &str, v: &Dynamic) -> SimpleResult<String> {
    match v.clone().into_string() {
        Ok(s) => Ok(s),
        Err(t) => bail!("Property \"{}\" must be a string, got {}", name, t),
    }
}

/// What a scene script describes: the meshes to load and how to run the integrator.
pub struct SceneDesc {
    pub mesh_paths: Vec<PathBuf>,
    pub integrator: PropertyList,
}

impl SceneDesc {
    fn from_props(props: PropertyList) -> SimpleResult<Self> {
        let mesh_paths = props.get_path_array("meshes")?;
        if mesh_paths.is_empty() {
            bail!("The scene doesn't list any meshes");
        }
        let integrator = match props.get_child("integrator")? {
            Some(integrator) => integrator,
            None => bail!("The scene doesn't describe an integrator"),
        };
        Ok(SceneDesc {
            mesh_paths,
            integrator,
        })
    }
}

/// Runs the scene script at `path`.
pub fn load_scene_desc(path: &Path) -> SimpleResult<SceneDesc> {
    let engine = create_engine();
    let map = try_with!(
        engine.eval_file::<Map>(path.to_path_buf()),
        "problem when running scene script {}",
        path.display()
    );
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    SceneDesc::from_props(PropertyList::new(map, base_dir))
}

/// Runs a scene script given as a string, resolving relative paths against `base_dir`.
pub fn load_scene_desc_str(script: &str, base_dir: &Path) -> SimpleResult<SceneDesc> {
    let engine = create_engine();
    let map = try_with!(engine.eval::<Map>(script), "problem when running scene script");
    SceneDesc::from_props(PropertyList::new(map, base_dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SCENE: &str = r#"
        let axis = vec3(0.0, 1.0, 0.0);
        #{
            meshes: ["mary.ply", "/abs/floor.ply"],
            integrator: #{
                type: "interreflection",
                cubemap: "cubemap/Room",
                sample_count: 10 * 10,
                bounce: 2,
                scale: 3,
                skip_first_face: true,
                light_rotation: rotate(45.0, axis) * rotate(45, axis),
            },
        }
    "#;

    #[test]
    fn reads_a_scene_script() {
        let desc = load_scene_desc_str(SCENE, Path::new("/scenes")).unwrap();
        assert_eq!(
            desc.mesh_paths,
            vec![PathBuf::from("/scenes/mary.ply"), PathBuf::from("/abs/floor.ply")]
        );

        let props = &desc.integrator;
        assert_eq!(props.get_string("type", "unshadowed").unwrap(), "interreflection");
        assert_eq!(props.get_integer("sample_count", 1).unwrap(), 100);
        assert_eq!(props.get_integer("bounce", 1).unwrap(), 2);
        assert_eq!(props.get_integer("seed", 7).unwrap(), 7);
        assert_eq!(props.get_float("scale", 1.).unwrap(), 3.);
        assert!(props.get_bool("skip_first_face", false).unwrap());
        assert_eq!(
            props.get_path("cubemap").unwrap(),
            Some(PathBuf::from("/scenes/cubemap/Room"))
        );

        let rot = props.get_rotation("light_rotation").unwrap().unwrap();
        let v = rot.vector(Vec3 { x: 1., y: 0., z: 0. });
        assert_abs_diff_eq!(v.z, -1., epsilon = 1e-12);
    }

    #[test]
    fn wrong_types_are_errors() {
        let desc = load_scene_desc_str(SCENE, Path::new("/scenes")).unwrap();
        let props = &desc.integrator;
        assert!(props.get_integer("type", 0).is_err());
        assert!(props.get_string("bounce", "").is_err());
        assert!(props.get_rotation("cubemap").is_err());
    }

    #[test]
    fn missing_integrator_is_an_error() {
        assert!(load_scene_desc_str(r#"#{ meshes: ["a.ply"] }"#, Path::new(".")).is_err());
        assert!(load_scene_desc_str(r#"#{ integrator: #{} }"#, Path::new(".")).is_err());
    }

    #[test]
    fn script_errors_are_reported() {
        assert!(load_scene_desc_str("#{ meshes: [", Path::new(".")).is_err());
    }
}
